pub mod email;
pub mod push;
pub mod sms;
pub mod static_tan;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ChannelKind, OperationKind};

pub use email::{MockEmailSender, SmtpSender};
pub use push::{FcmSender, MockPushSender};
pub use sms::{GatewaySmsSender, MockSmsSender};
pub use static_tan::StaticTanSender;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider not enabled: {0}")]
    NotEnabled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Send error: {0}")]
    SendFailed(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Authentication error: {0}")]
    Authentication(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub provider_id: Option<String>,
    pub success: bool,
    pub message: Option<String>,
}

impl ProviderResponse {
    pub fn success(provider_id: Option<String>) -> Self {
        Self {
            provider_id,
            success: true,
            message: None,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            provider_id: None,
            success: false,
            message: Some(message),
        }
    }
}

/// One challenge dispatch: where to deliver, what to deliver, and enough
/// context for the sender to word the message.
///
/// For static-TAN methods the code is empty; the user already holds the
/// enrolled value and nothing travels over the channel.
#[derive(Debug, Clone)]
pub struct ChallengeMessage {
    pub destination: String,
    pub code: String,
    pub kind: OperationKind,
    pub expires_in_secs: i64,
}

/// Capability interface over one delivery channel.
#[async_trait]
pub trait ScaSender: Send + Sync {
    async fn send(&self, message: &ChallengeMessage) -> Result<ProviderResponse, ProviderError>;
    async fn health_check(&self) -> Result<(), ProviderError>;
    fn kind(&self) -> ChannelKind;
    fn is_enabled(&self) -> bool;
}
