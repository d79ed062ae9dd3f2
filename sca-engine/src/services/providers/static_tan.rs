use super::{ChallengeMessage, ProviderError, ProviderResponse, ScaSender};
use crate::models::ChannelKind;
use async_trait::async_trait;

/// Sender for static-TAN methods.
///
/// The user already holds the enrolled value, so arming the challenge
/// involves no outbound transport at all.
#[derive(Default)]
pub struct StaticTanSender;

impl StaticTanSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ScaSender for StaticTanSender {
    async fn send(&self, message: &ChallengeMessage) -> Result<ProviderResponse, ProviderError> {
        tracing::info!(
            kind = %message.kind,
            "Static TAN challenge armed, nothing dispatched"
        );

        Ok(ProviderResponse::success(None))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::StaticTan
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
