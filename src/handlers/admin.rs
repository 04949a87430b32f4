use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

use super::api::{error_response, ApiError};
use crate::config::DatabaseConfig;
use crate::models::{
    Category, Group, MenuItem, RepositoryResult, User, DELIVERY_CREW_GROUP, MANAGER_GROUP,
};
use crate::observability::DatabaseTracingMiddleware;
use crate::repositories::{table_specs, MenuRepository, TableManager, UserRepository};

/// State for the operator endpoints, mounted only when admin endpoints are enabled
#[derive(Clone)]
pub struct AdminState {
    /// Absent when running on the in-memory store
    pub table_manager: Option<Arc<TableManager>>,
    pub database: DatabaseConfig,
    pub user_repository: Arc<dyn UserRepository>,
    pub menu_repository: Arc<dyn MenuRepository>,
    pub database_tracing: Arc<DatabaseTracingMiddleware>,
}

#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

/// Records written by one seeding run; existing records are left alone
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SeedSummary {
    pub groups_created: usize,
    pub users_created: usize,
    pub categories_created: usize,
    pub menu_items_created: usize,
}

#[derive(Debug, Serialize)]
pub struct SeedResponse {
    pub message: String,
    #[serde(flatten)]
    pub summary: SeedSummary,
    pub timestamp: String,
}

pub fn create_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/api/admin/setup-tables", post(setup_tables))
        .route("/api/admin/seed", post(seed_database))
        .with_state(state)
}

/// Create any missing DynamoDB table
#[instrument(name = "setup_tables", skip(state))]
pub async fn setup_tables(
    State(state): State<AdminState>,
) -> Result<Json<SetupTablesResponse>, ApiError> {
    let table_manager = state.table_manager.as_ref().ok_or_else(|| {
        error_response(
            StatusCode::BAD_REQUEST,
            "Table setup requires the dynamodb storage backend",
        )
    })?;

    let mut tables_created = Vec::new();
    for spec in table_specs(&state.database) {
        state
            .database_tracing
            .trace_operation("create_table", &spec.name, table_manager.create_table(&spec))
            .await
            .map_err(|err| {
                crate::error_with_trace!("Failed to create table {}: {}", spec.name, err);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Failed to create table {}", spec.name),
                )
            })?;
        tables_created.push(spec.name);
    }

    info!("Tables ready: {:?}", tables_created);
    Ok(Json(SetupTablesResponse {
        message: format!("{} tables ready", tables_created.len()),
        tables_created,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

/// Load the demo groups, accounts and menu
#[instrument(name = "seed_database", skip(state))]
pub async fn seed_database(State(state): State<AdminState>) -> Result<Json<SeedResponse>, ApiError> {
    let summary = state
        .database_tracing
        .trace_operation(
            "seed",
            &state.database.menu_items_table,
            seed_demo_data(
                state.user_repository.as_ref(),
                state.menu_repository.as_ref(),
            ),
        )
        .await
        .map_err(|err| {
            crate::error_with_trace!("Failed to seed database: {}", err);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to seed database")
        })?;

    Ok(Json(SeedResponse {
        message: "Demo data loaded".to_string(),
        summary,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}

struct DemoUser {
    username: &'static str,
    group: Option<&'static str>,
    is_staff: bool,
}

const DEMO_USERS: [DemoUser; 5] = [
    DemoUser {
        username: "admin",
        group: None,
        is_staff: true,
    },
    DemoUser {
        username: "maria",
        group: Some(MANAGER_GROUP),
        is_staff: false,
    },
    DemoUser {
        username: "rui",
        group: Some(DELIVERY_CREW_GROUP),
        is_staff: false,
    },
    DemoUser {
        username: "ana",
        group: None,
        is_staff: false,
    },
    DemoUser {
        username: "ben",
        group: None,
        is_staff: false,
    },
];

/// (slug, title, [(item title, price, featured)])
fn demo_menu() -> Vec<(&'static str, &'static str, Vec<(&'static str, Decimal, bool)>)> {
    vec![
        (
            "starters",
            "Starters",
            vec![
                ("Greek Salad", dec!(12.50), true),
                ("Bruschetta", dec!(7.99), false),
            ],
        ),
        (
            "mains",
            "Mains",
            vec![
                ("Grilled Fish", dec!(20.00), true),
                ("Lamb Souvlaki", dec!(18.50), false),
            ],
        ),
        (
            "desserts",
            "Desserts",
            vec![("Lemon Dessert", dec!(6.99), true)],
        ),
        (
            "drinks",
            "Drinks",
            vec![("Fresh Lemonade", dec!(3.50), false)],
        ),
    ]
}

/// Insert whatever part of the demo data set is missing
pub async fn seed_demo_data(
    users: &dyn UserRepository,
    menu: &dyn MenuRepository,
) -> RepositoryResult<SeedSummary> {
    let mut summary = SeedSummary::default();

    for name in [MANAGER_GROUP, DELIVERY_CREW_GROUP] {
        if users.find_group(name).await?.is_none() {
            users.save_group(Group::new(name)).await?;
            summary.groups_created += 1;
        }
    }

    for demo in DEMO_USERS.iter() {
        if users.find_by_username(demo.username).await?.is_some() {
            continue;
        }
        let mut user = User::new(demo.username, format!("{}@littlelemon.test", demo.username))
            .with_staff(demo.is_staff);
        if let Some(group) = demo.group {
            user = user.with_group(group);
        }
        users.save_user(user).await?;
        summary.users_created += 1;
    }

    for (slug, title, items) in demo_menu() {
        let category = match menu.find_category_by_slug(slug).await? {
            Some(category) => category,
            None => {
                summary.categories_created += 1;
                menu.create_category(Category::new(slug, title)).await?
            }
        };

        let existing = menu.list_menu_items(Some(&category.id), None).await?;
        for (item_title, price, featured) in items {
            if existing.iter().any(|item| item.title == item_title) {
                continue;
            }
            menu.create_menu_item(MenuItem::new(item_title, price, featured, &category.id))
                .await?;
            summary.menu_items_created += 1;
        }
    }

    crate::info_with_trace!(?summary, "Demo data seeded");
    Ok(summary)
}
