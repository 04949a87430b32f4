#[cfg(test)]
mod repository_tests {
    use aws_sdk_dynamodb::types::{AttributeValue, TransactWriteItem};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    use crate::models::{
        CartEntry, Category, MenuItem, Order, OrderChanges, RepositoryError, User,
    };
    use crate::observability::Metrics;
    use crate::repositories::*;

    fn create_test_client() -> Arc<aws_sdk_dynamodb::Client> {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        Arc::new(aws_sdk_dynamodb::Client::from_conf(config))
    }

    fn telemetry() -> dynamodb::DynamoDbTelemetry {
        dynamodb::DynamoDbTelemetry::new(Arc::new(Metrics::new().unwrap()), "us-east-1")
    }

    fn order_repository() -> DynamoDbOrderRepository {
        DynamoDbOrderRepository::new(
            create_test_client(),
            "orders".to_string(),
            "order-items".to_string(),
            "carts".to_string(),
            telemetry(),
        )
    }

    fn sample_cart() -> Vec<CartEntry> {
        let salad = MenuItem::new("Greek Salad", dec!(12.50), true, "C1");
        let cake = MenuItem::new("Lemon Cake", dec!(6.75), false, "C2");
        vec![CartEntry::new("U1", &salad, 2), CartEntry::new("U1", &cake, 1)]
    }

    #[test]
    fn test_menu_item_conversion() {
        let repo = DynamoDbMenuRepository::new(
            create_test_client(),
            "categories".to_string(),
            "menu-items".to_string(),
            telemetry(),
        );
        let menu_item = MenuItem::new("Greek Salad", dec!(12.50), true, "C1");

        let item = repo.menu_item_to_item(&menu_item);
        assert_eq!(item.get("price"), Some(&AttributeValue::N("12.50".to_string())));
        assert_eq!(item.get("featured"), Some(&AttributeValue::Bool(true)));

        let converted = repo.item_to_menu_item(item).unwrap();
        assert_eq!(converted, menu_item);

        let category = Category::new("mains", "Mains");
        let converted = repo
            .item_to_category(repo.category_to_item(&category))
            .unwrap();
        assert_eq!(converted, category);
    }

    #[test]
    fn test_user_conversion_omits_empty_group_set() {
        let repo = DynamoDbUserRepository::new(
            create_test_client(),
            "users".to_string(),
            "groups".to_string(),
            telemetry(),
        );

        let customer = User::new("ana", "ana@example.com");
        let item = repo.user_to_item(&customer);
        assert!(!item.contains_key("groups"));
        let converted = repo.item_to_user(item).unwrap();
        assert!(converted.groups.is_empty());
        assert_eq!(converted.username, "ana");

        let manager = User::new("maria", "maria@example.com").with_group("manager");
        let item = repo.user_to_item(&manager);
        assert_eq!(
            item.get("groups"),
            Some(&AttributeValue::Ss(vec!["manager".to_string()]))
        );
        assert_eq!(repo.username_index(), "users-UsernameIndex");
    }

    #[test]
    fn test_user_conversion_rejects_bad_date() {
        let repo = DynamoDbUserRepository::new(
            create_test_client(),
            "users".to_string(),
            "groups".to_string(),
            telemetry(),
        );
        let mut item = repo.user_to_item(&User::new("ana", "ana@example.com"));
        item.insert(
            "date_joined".to_string(),
            AttributeValue::S("yesterday".to_string()),
        );

        assert!(matches!(
            repo.item_to_user(item),
            Err(RepositoryError::InvalidData { .. })
        ));
    }

    #[test]
    fn test_cart_entry_conversion() {
        let repo = DynamoDbCartRepository::new(
            create_test_client(),
            "carts".to_string(),
            telemetry(),
        );
        let entry = sample_cart().remove(0);

        let item = repo.entry_to_item(&entry);
        assert_eq!(item.get("user_id"), Some(&AttributeValue::S("U1".to_string())));
        assert_eq!(item.get("quantity"), Some(&AttributeValue::N("2".to_string())));

        let converted = repo.item_to_entry(item).unwrap();
        assert_eq!(converted, entry);
        assert_eq!(repo.table_name(), "carts");
    }

    #[test]
    fn test_order_conversion() {
        let repo = order_repository();
        let mut order = Order::from_cart("U1", &sample_cart()).0;
        order.date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();

        let item = repo.order_to_item(&order);
        assert!(!item.contains_key("delivery_crew"));
        assert_eq!(item.get("date"), Some(&AttributeValue::S("2024-03-09".to_string())));
        assert_eq!(repo.item_to_order(item).unwrap(), order);

        order.delivery_crew = Some("U9".to_string());
        order.status = true;
        let converted = repo.item_to_order(repo.order_to_item(&order)).unwrap();
        assert_eq!(converted.delivery_crew.as_deref(), Some("U9"));
        assert!(converted.status);
    }

    #[test]
    fn test_order_update_touches_only_changed_fields() {
        let status_only = OrderChanges {
            status: Some(true),
            delivery_crew: None,
        };
        assert_eq!(order_update_expression(&status_only), "SET #status = :status");

        let assign = OrderChanges {
            status: None,
            delivery_crew: Some(Some("U9".to_string())),
        };
        assert_eq!(order_update_expression(&assign), "SET delivery_crew = :crew");

        let unassign_and_deliver = OrderChanges {
            status: Some(false),
            delivery_crew: Some(None),
        };
        assert_eq!(
            order_update_expression(&unassign_and_deliver),
            "SET #status = :status REMOVE delivery_crew"
        );
    }

    #[test]
    fn test_placement_actions() {
        let repo = order_repository();
        let entries = sample_cart();
        let (order, items) = Order::from_cart("U1", &entries);

        let actions: Vec<TransactWriteItem> =
            repo.placement_actions(&order, &items, &entries).unwrap();

        assert_eq!(actions.len(), 1 + 2 * entries.len());

        let order_put = actions[0].put().unwrap();
        assert_eq!(order_put.table_name(), "orders");
        assert_eq!(
            order_put.condition_expression(),
            Some("attribute_not_exists(id)")
        );

        let item_puts = actions.iter().filter_map(|a| a.put()).count();
        assert_eq!(item_puts, 3);

        let deletes: Vec<_> = actions.iter().filter_map(|a| a.delete()).collect();
        assert_eq!(deletes.len(), 2);
        for delete in deletes {
            assert_eq!(delete.table_name(), "carts");
            assert_eq!(delete.condition_expression(), Some("attribute_exists(id)"));
            assert!(delete.key().contains_key("user_id"));
        }
    }
}
