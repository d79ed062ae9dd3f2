//! Enrolled authentication method model.

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery channel for a one-time code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Sms,
    Email,
    Push,
    StaticTan,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Sms => "sms",
            ChannelKind::Email => "email",
            ChannelKind::Push => "push",
            ChannelKind::StaticTan => "static_tan",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One enrolled factor for a user.
///
/// Owns an id back-reference to its user; lookup by user goes through the
/// registry index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticationMethod {
    pub method_id: Uuid,
    pub user_id: Uuid,
    pub channel: ChannelKind,
    pub destination: String,
    pub uses_static_tan: bool,
    /// Enrolled static TAN, stored hashed and never serialized out.
    #[serde(skip_serializing, default)]
    pub static_tan_hash: Option<String>,
    pub valid: bool,
    pub created_utc: DateTime<Utc>,
}

impl AuthenticationMethod {
    /// Destination with the middle elided, safe for logs.
    pub fn masked_destination(&self) -> String {
        mask_destination(&self.destination)
    }
}

/// Input for enrolling a method; driven by the user-management subsystem.
pub struct NewMethod {
    pub user_id: Uuid,
    pub channel: ChannelKind,
    pub destination: String,
    pub static_tan: Option<SecretString>,
}

fn mask_destination(destination: &str) -> String {
    match destination.split_once('@') {
        Some((local, domain)) => {
            let head: String = local.chars().take(1).collect();
            format!("{}***@{}", head, domain)
        }
        None => {
            let chars: Vec<char> = destination.chars().collect();
            if chars.len() <= 4 {
                return "****".to_string();
            }
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("****{}", tail)
        }
    }
}
