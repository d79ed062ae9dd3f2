//! Authorization instance model - one user's attempt against an operation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Instance status.
///
/// `Started` and `MethodSelected` are transient; the remaining statuses
/// are terminal for the instance. The owning operation may still be
/// pending when an instance reaches a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Started,
    MethodSelected,
    ChallengeSent,
    Confirmed,
    Failed,
    Expired,
    Cancelled,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Started => "started",
            InstanceStatus::MethodSelected => "method_selected",
            InstanceStatus::ChallengeSent => "challenge_sent",
            InstanceStatus::Confirmed => "confirmed",
            InstanceStatus::Failed => "failed",
            InstanceStatus::Expired => "expired",
            InstanceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Confirmed
                | InstanceStatus::Failed
                | InstanceStatus::Expired
                | InstanceStatus::Cancelled
        )
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single issued code, owned exclusively by its instance.
///
/// Only the SHA-256 hash of the code is retained; the cleartext does not
/// outlive generation and dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub code_hash: String,
    pub issued_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
    pub attempt_max: i32,
    pub attempt_count: i32,
}

impl Challenge {
    pub fn new(code_hash: String, ttl_secs: i64, attempt_max: i32) -> Self {
        let now = Utc::now();
        Self {
            code_hash,
            issued_utc: now,
            expires_utc: now + Duration::seconds(ttl_secs),
            attempt_max,
            attempt_count: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_utc
    }

    pub fn attempts_remaining(&self) -> i32 {
        self.attempt_max - self.attempt_count
    }
}

/// One user's authorization attempt against an operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationInstance {
    pub instance_id: Uuid,
    /// Back-reference by id only; the operation is never owned here.
    pub operation_id: String,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_id: Option<Uuid>,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<Challenge>,
    /// Challenge deliveries consumed, successful or not.
    pub send_count: i32,
    pub created_utc: DateTime<Utc>,
    pub expires_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_utc: Option<DateTime<Utc>>,
}

impl AuthorizationInstance {
    pub fn new(operation_id: &str, user_id: Uuid, ttl_secs: i64) -> Self {
        let now = Utc::now();
        Self {
            instance_id: Uuid::new_v4(),
            operation_id: operation_id.to_string(),
            user_id,
            method_id: None,
            status: InstanceStatus::Started,
            challenge: None,
            send_count: 0,
            created_utc: now,
            expires_utc: now + Duration::seconds(ttl_secs),
            confirmed_utc: None,
        }
    }

    /// A live challenge carries its own window; before one is issued the
    /// instance creation window applies.
    pub fn is_expired(&self) -> bool {
        match &self.challenge {
            Some(challenge) => challenge.is_expired(),
            None => Utc::now() > self.expires_utc,
        }
    }
}
