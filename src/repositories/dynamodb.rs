//! Helpers shared by the DynamoDB repositories: call telemetry, attribute
//! parsing and SDK error mapping.

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Error as DynamoDbError;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, Instrument};

use crate::models::{RepositoryError, RepositoryResult};
use crate::observability::{DatabaseTracingMiddleware, Metrics};

pub type Item = HashMap<String, AttributeValue>;

/// Create a DynamoDB client span carrying X-Ray and OpenTelemetry attributes
pub fn dynamodb_span(operation: &str, table_name: &str, region: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        // AWS X-Ray specific attributes
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.request_id" = tracing::field::Empty,
        "aws.agent" = "rust-aws-sdk",

        // Resource identification for X-Ray
        "aws.remote.service" = "AWS::DynamoDB",
        "aws.remote.operation" = operation,
        "aws.remote.resource.type" = "AWS::DynamoDB::Table",
        "aws.remote.resource.identifier" = %table_name,

        // OpenTelemetry semantic conventions
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "AmazonDynamoDBv2",
        "rpc.method" = operation,

        // Database semantic conventions
        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,

        "component" = "aws-sdk-dynamodb",
    )
}

/// Wraps each DynamoDB call in a client span and feeds the
/// `database_operations_*` series
#[derive(Clone)]
pub struct DynamoDbTelemetry {
    database: Arc<DatabaseTracingMiddleware>,
    region: String,
}

impl DynamoDbTelemetry {
    pub fn new(metrics: Arc<Metrics>, region: impl Into<String>) -> Self {
        Self {
            database: Arc::new(DatabaseTracingMiddleware::new(metrics)),
            region: region.into(),
        }
    }

    /// `operation` is the DynamoDB API name, e.g. `GetItem`
    pub async fn call<T, F>(&self, operation: &str, table_name: &str, call: F) -> RepositoryResult<T>
    where
        F: Future<Output = RepositoryResult<T>>,
    {
        let span = dynamodb_span(operation, table_name, &self.region);
        self.database
            .trace_operation(operation, table_name, call.instrument(span))
            .await
    }
}

/// Convert a DynamoDB error to a RepositoryError
pub fn map_dynamodb_error(error: DynamoDbError, table_name: &str) -> RepositoryError {
    error!("DynamoDB error on {}: {:?}", table_name, error);

    match error {
        DynamoDbError::ResourceNotFoundException(_) => RepositoryError::TableNotFound {
            table_name: table_name.to_string(),
        },
        DynamoDbError::ConditionalCheckFailedException(e) => {
            RepositoryError::ConstraintViolation {
                message: e.to_string(),
            }
        }
        DynamoDbError::TransactionCanceledException(e) => RepositoryError::TransactionFailed {
            message: e.to_string(),
        },
        DynamoDbError::TransactionConflictException(e) => RepositoryError::TransactionFailed {
            message: e.to_string(),
        },
        DynamoDbError::ProvisionedThroughputExceededException(_)
        | DynamoDbError::RequestLimitExceeded(_) => RepositoryError::RateLimitExceeded,
        other => RepositoryError::AwsSdk {
            message: other.to_string(),
        },
    }
}

fn invalid(message: String) -> RepositoryError {
    RepositoryError::InvalidData { message }
}

pub fn get_string(item: &Item, field: &str) -> RepositoryResult<String> {
    item.get(field)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| invalid(format!("Missing {}", field)))
}

pub fn get_optional_string(item: &Item, field: &str) -> Option<String> {
    item.get(field).and_then(|v| v.as_s().ok()).cloned()
}

pub fn get_bool(item: &Item, field: &str) -> RepositoryResult<bool> {
    item.get(field)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| invalid(format!("Invalid {}", field)))
}

pub fn get_number<T: FromStr>(item: &Item, field: &str) -> RepositoryResult<T> {
    item.get(field)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse::<T>().ok())
        .ok_or_else(|| invalid(format!("Invalid {}", field)))
}

pub fn get_decimal(item: &Item, field: &str) -> RepositoryResult<Decimal> {
    item.get(field)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| invalid(format!("Invalid {}", field)))
}

/// String sets are omitted by DynamoDB when empty, so absence means empty
pub fn get_string_set(item: &Item, field: &str) -> BTreeSet<String> {
    item.get(field)
        .and_then(|v| v.as_ss().ok())
        .map(|values| values.iter().cloned().collect())
        .unwrap_or_default()
}

/// Numbers are stored with two decimal places so they read back unchanged
pub fn decimal_attribute(value: Decimal) -> AttributeValue {
    AttributeValue::N(value.round_dp(2).to_string())
}

pub fn string_attribute(value: impl Into<String>) -> AttributeValue {
    AttributeValue::S(value.into())
}

/// Parse every item in a page, skipping (and logging) the ones that fail
pub fn parse_items<T>(
    items: Option<Vec<Item>>,
    parse: impl Fn(Item) -> RepositoryResult<T>,
    kind: &str,
) -> Vec<T> {
    let mut parsed = Vec::new();
    for item in items.unwrap_or_default() {
        match parse(item) {
            Ok(value) => parsed.push(value),
            Err(e) => {
                tracing::warn!("Failed to parse {} item: {}", kind, e);
            }
        }
    }
    parsed
}
