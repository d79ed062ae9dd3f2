//! Authorization operation model - one protected business action.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of business action an authorization protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Payment,
    PaymentCancellation,
    UserDataChange,
    Consent,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Payment => "payment",
            OperationKind::PaymentCancellation => "payment_cancellation",
            OperationKind::UserDataChange => "user_data_change",
            OperationKind::Consent => "consent",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation status.
///
/// `Pending` is the only non-terminal status. `Released` means the
/// authorized verdict has been consumed by the owning subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Pending,
    Authorized,
    AuthorizationFailed,
    Expired,
    Released,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Authorized => "authorized",
            OperationStatus::AuthorizationFailed => "authorization_failed",
            OperationStatus::Expired => "expired",
            OperationStatus::Released => "released",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OperationStatus::Pending)
    }

    /// Verdict exposed to the owning business subsystem.
    pub fn verdict(&self) -> Verdict {
        match self {
            OperationStatus::Pending => Verdict::Pending,
            OperationStatus::Authorized | OperationStatus::Released => Verdict::Authorized,
            OperationStatus::AuthorizationFailed => Verdict::Failed,
            OperationStatus::Expired => Verdict::Expired,
        }
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Externally visible authorization verdict for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pending,
    Authorized,
    Failed,
    Expired,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pending => write!(f, "pending"),
            Verdict::Authorized => write!(f, "authorized"),
            Verdict::Failed => write!(f, "failed"),
            Verdict::Expired => write!(f, "expired"),
        }
    }
}

/// One protected business action awaiting authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationOperation {
    pub operation_id: String,
    pub kind: OperationKind,
    pub initiator_user_id: Uuid,
    /// Fixed at registration, never decreases.
    pub required_confirmations: u32,
    pub status: OperationStatus,
    pub created_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorized_utc: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_utc: Option<DateTime<Utc>>,
}

impl AuthorizationOperation {
    pub fn new(input: NewOperation, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            operation_id: input.operation_id,
            kind: input.kind,
            initiator_user_id: input.initiator_user_id,
            required_confirmations: input.required_confirmations,
            status: OperationStatus::Pending,
            created_utc: now,
            expires_utc: now + Duration::seconds(ttl_secs),
            authorized_utc: None,
            released_utc: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_utc
    }
}

/// Input for registering an operation with the engine.
#[derive(Debug, Clone)]
pub struct NewOperation {
    pub operation_id: String,
    pub kind: OperationKind,
    pub initiator_user_id: Uuid,
    pub required_confirmations: u32,
}
