use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    Projection, ProjectionType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::dynamodb::map_dynamodb_error;
use super::user_repository::username_index_name;
use crate::config::DatabaseConfig;
use crate::models::{RepositoryError, RepositoryResult};

/// Key layout of one table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSpec {
    pub name: String,
    pub hash_key: &'static str,
    pub range_key: Option<&'static str>,
    /// Optional global secondary index as (index name, hash key)
    pub index: Option<(String, &'static str)>,
}

impl TableSpec {
    fn simple(name: &str, hash_key: &'static str) -> Self {
        Self {
            name: name.to_string(),
            hash_key,
            range_key: None,
            index: None,
        }
    }

    fn composite(name: &str, hash_key: &'static str, range_key: &'static str) -> Self {
        Self {
            range_key: Some(range_key),
            ..Self::simple(name, hash_key)
        }
    }
}

/// Layout of every table the service uses
pub fn table_specs(config: &DatabaseConfig) -> Vec<TableSpec> {
    vec![
        TableSpec {
            index: Some((username_index_name(&config.users_table), "username")),
            ..TableSpec::simple(&config.users_table, "id")
        },
        TableSpec::simple(&config.groups_table, "name"),
        TableSpec::simple(&config.categories_table, "id"),
        TableSpec::simple(&config.menu_items_table, "id"),
        TableSpec::composite(&config.carts_table, "user_id", "id"),
        TableSpec::simple(&config.orders_table, "id"),
        TableSpec::composite(&config.order_items_table, "order_id", "id"),
    ]
}

fn build_failure(what: &str, e: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::AwsSdk {
        message: format!("Failed to build {}: {}", what, e),
    }
}

fn string_attribute_definition(name: &str) -> RepositoryResult<AttributeDefinition> {
    AttributeDefinition::builder()
        .attribute_name(name)
        .attribute_type(ScalarAttributeType::S)
        .build()
        .map_err(|e| build_failure("attribute definition", e))
}

fn key_element(name: &str, key_type: KeyType) -> RepositoryResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(name)
        .key_type(key_type)
        .build()
        .map_err(|e| build_failure("key schema", e))
}

/// Manages DynamoDB table creation
pub struct TableManager {
    client: Arc<DynamoDbClient>,
    poll_interval: Duration,
    max_attempts: u32,
}

impl TableManager {
    /// Create a new table manager
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self {
            client,
            poll_interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }

    /// Create one table unless it already exists
    #[instrument(skip(self, spec), fields(table_name = %spec.name))]
    pub async fn create_table(&self, spec: &TableSpec) -> RepositoryResult<()> {
        if self.table_exists(&spec.name).await? {
            info!("Table {} already exists", spec.name);
            return Ok(());
        }

        let mut attribute_definitions = vec![string_attribute_definition(spec.hash_key)?];
        let mut key_schema = vec![key_element(spec.hash_key, KeyType::Hash)?];
        if let Some(range_key) = spec.range_key {
            attribute_definitions.push(string_attribute_definition(range_key)?);
            key_schema.push(key_element(range_key, KeyType::Range)?);
        }

        let mut request = self
            .client
            .create_table()
            .table_name(&spec.name)
            .billing_mode(BillingMode::PayPerRequest);

        if let Some((index_name, index_key)) = &spec.index {
            attribute_definitions.push(string_attribute_definition(index_key)?);
            let index = GlobalSecondaryIndex::builder()
                .index_name(index_name)
                .key_schema(key_element(index_key, KeyType::Hash)?)
                .projection(
                    Projection::builder()
                        .projection_type(ProjectionType::All)
                        .build(),
                )
                .build()
                .map_err(|e| build_failure("GSI", e))?;
            request = request.global_secondary_indexes(index);
        }

        request
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema))
            .send()
            .await
            .map_err(|e| map_dynamodb_error(e.into(), &spec.name))?;

        info!("Table creation initiated, waiting for table to become active");
        self.wait_for_table_active(&spec.name).await?;
        info!("Table {} created", spec.name);

        Ok(())
    }

    /// Check if a table exists
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self.client.describe_table().table_name(table_name).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_resource_not_found_exception() {
                    info!("Table {} does not exist", table_name);
                    Ok(false)
                } else {
                    error!("Error checking table existence: {}", service_error);
                    Err(RepositoryError::ConnectionFailed)
                }
            }
        }
    }

    /// Wait for a table to become active
    async fn wait_for_table_active(&self, table_name: &str) -> RepositoryResult<()> {
        for _ in 0..self.max_attempts {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| map_dynamodb_error(e.into(), table_name))?;

            match response.table.and_then(|table| table.table_status) {
                Some(TableStatus::Active) => {
                    info!("Table {} is now active", table_name);
                    return Ok(());
                }
                Some(status) => info!("Table {} status: {:?}, waiting...", table_name, status),
                None => warn!("Table {} status unknown, waiting...", table_name),
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        error!("Timeout waiting for table {} to become active", table_name);
        Err(RepositoryError::Timeout)
    }

    /// Create every table the service needs, returning their names
    #[instrument(skip(self, config))]
    pub async fn create_all_tables(&self, config: &DatabaseConfig) -> RepositoryResult<Vec<String>> {
        let specs = table_specs(config);

        for spec in &specs {
            self.create_table(spec).await?;
        }

        info!("All tables ready");
        Ok(specs.into_iter().map(|spec| spec.name).collect())
    }
}
