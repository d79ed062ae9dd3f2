use super::{ChallengeMessage, ProviderError, ProviderResponse, ScaSender};
use crate::config::SmsGatewayConfig;
use crate::models::ChannelKind;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct GatewaySmsSender {
    config: SmsGatewayConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GatewayRequest {
    sender: String,
    to: String,
    message: String,
}

#[derive(Debug, Deserialize)]
struct GatewayResponse {
    status: String,
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl GatewaySmsSender {
    pub fn new(config: SmsGatewayConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl ScaSender for GatewaySmsSender {
    async fn send(&self, message: &ChallengeMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotEnabled(
                "SMS gateway sender is not enabled".to_string(),
            ));
        }

        // Normalize phone number (digits plus leading +)
        let normalized_phone = message
            .destination
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect::<String>();

        if normalized_phone.is_empty() {
            return Err(ProviderError::InvalidRecipient(
                "Phone number is empty".to_string(),
            ));
        }

        let request = GatewayRequest {
            sender: self.config.sender_id.clone(),
            to: normalized_phone,
            message: format!("{} is your authorization code. Never share it.", message.code),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("authkey", &self.config.auth_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ProviderError::Connection(format!("Failed to connect to SMS gateway: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "SMS gateway returned error status {}: {}",
                status, body
            )));
        }

        let gateway_response: GatewayResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse SMS gateway response: {}", e))
        })?;

        if gateway_response.status != "ok" {
            return Err(ProviderError::SendFailed(format!(
                "SMS gateway error: {}",
                gateway_response.error.unwrap_or(gateway_response.status)
            )));
        }

        tracing::info!(
            kind = %message.kind,
            "Authorization code SMS sent"
        );

        Ok(ProviderResponse::success(gateway_response.message_id))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if !self.config.enabled {
            return Ok(());
        }

        if self.config.api_url.is_empty() {
            return Err(ProviderError::Configuration(
                "SMS gateway api_url is not configured".to_string(),
            ));
        }

        if self.config.auth_key.is_empty() {
            return Err(ProviderError::Configuration(
                "SMS gateway auth_key is not configured".to_string(),
            ));
        }

        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Mock SMS sender for testing; captures delivered messages.
pub struct MockSmsSender {
    enabled: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<ChallengeMessage>>,
}

impl MockSmsSender {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            send_count: AtomicU64::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn send_count(&self) -> u64 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn last_message(&self) -> Option<ChallengeMessage> {
        self.sent.lock().expect("mock sent lock").last().cloned()
    }
}

#[async_trait]
impl ScaSender for MockSmsSender {
    async fn send(&self, message: &ChallengeMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock SMS sender is not enabled".to_string(),
            ));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().expect("mock sent lock").push(message.clone());

        tracing::info!(
            to = %message.destination,
            kind = %message.kind,
            "[MOCK] Authorization code SMS would be sent"
        );

        Ok(ProviderResponse::success(Some(format!(
            "mock-sms-{}",
            self.send_count.load(Ordering::SeqCst)
        ))))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
