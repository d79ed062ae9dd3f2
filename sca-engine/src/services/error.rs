use thiserror::Error;
use uuid::Uuid;

use crate::models::{InstanceStatus, OperationStatus};
use crate::services::providers::ProviderError;

#[derive(Error, Debug)]
pub enum ScaError {
    #[error("Operation not found: {0}")]
    OperationNotFound(String),

    #[error("Authorization instance not found: {0}")]
    InstanceNotFound(Uuid),

    #[error("Authentication method not found: {0}")]
    MethodNotFound(Uuid),

    #[error("Authentication method is disabled: {0}")]
    MethodDisabled(Uuid),

    #[error("Operation already registered: {0}")]
    DuplicateOperation(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid method enrollment: {0}")]
    InvalidMethod(String),

    #[error("Active authorization for operation {operation_id} already exists: {instance_id}")]
    DuplicateActiveInstance {
        operation_id: String,
        instance_id: Uuid,
    },

    #[error("User has no enabled authentication methods: {0}")]
    NoEnabledMethods(Uuid),

    #[error("{action} is not permitted while the instance is {status}")]
    InvalidState {
        action: &'static str,
        status: InstanceStatus,
    },

    #[error("Operation {operation_id} is {status}, expected pending")]
    InvalidOperationState {
        operation_id: String,
        status: OperationStatus,
    },

    #[error("Challenge delivery failed: {0}")]
    DeliveryFailed(#[from] ProviderError),

    #[error("Challenge resend limit reached")]
    ResendLimitReached,

    #[error("Invalid code, {attempts_remaining} attempts remaining")]
    CodeMismatch { attempts_remaining: i32 },

    #[error("Maximum validation attempts exceeded")]
    AttemptsExhausted,

    #[error("Authorization has expired")]
    Expired,

    #[error("Operation has expired: {0}")]
    OperationExpired(String),

    #[error("Authorization already resolved: {0}")]
    AlreadyResolved(Uuid),

    #[error("Operation already released: {0}")]
    AlreadyReleased(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Configuration error: {0}")]
    Config(anyhow::Error),
}
