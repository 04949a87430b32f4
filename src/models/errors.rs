use thiserror::Error;

/// Service-level errors that can occur in business logic
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Forbidden { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Category not found: {id}")]
    CategoryNotFound { id: String },

    #[error("Menu item not found: {id}")]
    MenuItemNotFound { id: String },

    #[error("Order not found: {id}")]
    OrderNotFound { id: String },

    #[error("User not found: {identifier}")]
    UserNotFound { identifier: String },

    #[error("Group not found: {name}")]
    GroupNotFound { name: String },

    #[error("Repository error: {source}")]
    Repository {
        #[from]
        source: RepositoryError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl ServiceError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::ValidationError {
            message: message.into(),
        }
    }

    /// Whether the error means the referenced entity is absent or not visible to the caller
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::CategoryNotFound { .. }
                | ServiceError::MenuItemNotFound { .. }
                | ServiceError::OrderNotFound { .. }
                | ServiceError::UserNotFound { .. }
                | ServiceError::GroupNotFound { .. }
                | ServiceError::Repository {
                    source: RepositoryError::NotFound
                }
        )
    }
}

/// Repository-level errors for data access operations
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database connection failed")]
    ConnectionFailed,

    #[error("Item not found")]
    NotFound,

    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    #[error("AWS SDK error: {message}")]
    AwsSdk { message: String },

    #[error("DynamoDB table not found: {table_name}. Ensure the table exists and IAM permissions are correct.")]
    TableNotFound { table_name: String },

    #[error("Invalid stored data: {message}")]
    InvalidData { message: String },

    #[error("Transaction failed: {message}")]
    TransactionFailed { message: String },

    #[error("Timeout occurred during operation")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

/// Validation errors for input data
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredField { field: String },

    #[error("Invalid field value: {field}={value}, reason={reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Field too long: {field}, max_length={max_length}, actual_length={actual_length}")]
    TooLong {
        field: String,
        max_length: usize,
        actual_length: usize,
    },

    #[error("Invalid format: {field}, expected={expected}")]
    InvalidFormat { field: String, expected: String },

    #[error("Value out of range: {field}, min={min}, max={max}, value={value}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        value: String,
    },
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::ValidationError {
            message: err.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result type alias for repository operations
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result type alias for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;
