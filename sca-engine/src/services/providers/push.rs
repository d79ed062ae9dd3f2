use super::{ChallengeMessage, ProviderError, ProviderResponse, ScaSender};
use crate::config::FcmConfig;
use crate::models::ChannelKind;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const FCM_API_URL: &str = "https://fcm.googleapis.com/v1/projects";

pub struct FcmSender {
    config: FcmConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct FcmRequest {
    message: FcmMessage,
}

#[derive(Debug, Serialize)]
struct FcmMessage {
    token: String,
    notification: FcmNotification,
    android: FcmAndroidConfig,
}

#[derive(Debug, Serialize)]
struct FcmNotification {
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct FcmAndroidConfig {
    priority: String,
}

#[derive(Debug, Deserialize)]
struct FcmResponse {
    name: Option<String>,
    #[serde(default)]
    error: Option<FcmError>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct FcmError {
    code: i32,
    message: String,
    status: String,
}

impl FcmSender {
    pub fn new(config: FcmConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    async fn get_access_token(&self) -> Result<String, ProviderError> {
        // Exchanging the service account key for an OAuth2 token is the
        // bootstrap layer's concern; the key doubles as a bearer token here.
        if self.config.service_account_key.is_empty() {
            return Err(ProviderError::Authentication(
                "FCM service account key not configured".to_string(),
            ));
        }

        Ok(self.config.service_account_key.clone())
    }
}

#[async_trait]
impl ScaSender for FcmSender {
    async fn send(&self, message: &ChallengeMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.config.enabled {
            return Err(ProviderError::NotEnabled(
                "FCM push sender is not enabled".to_string(),
            ));
        }

        if self.config.project_id.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM project_id is not configured".to_string(),
            ));
        }

        let access_token = self.get_access_token().await?;

        let request = FcmRequest {
            message: FcmMessage {
                token: message.destination.clone(),
                notification: FcmNotification {
                    title: "Authorization code".to_string(),
                    body: format!("Your authorization code is {}", message.code),
                },
                android: FcmAndroidConfig {
                    priority: "high".to_string(),
                },
            },
        };

        let url = format!("{}/{}/messages:send", FCM_API_URL, self.config.project_id);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&access_token)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Connection(format!("Failed to connect to FCM: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SendFailed(format!(
                "FCM API returned error status {}: {}",
                status, body
            )));
        }

        let fcm_response: FcmResponse = response.json().await.map_err(|e| {
            ProviderError::SendFailed(format!("Failed to parse FCM response: {}", e))
        })?;

        if let Some(error) = fcm_response.error {
            return Err(ProviderError::SendFailed(format!(
                "FCM error ({}): {}",
                error.status, error.message
            )));
        }

        tracing::info!(
            kind = %message.kind,
            "Authorization code push sent"
        );

        Ok(ProviderResponse::success(fcm_response.name))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if !self.config.enabled {
            return Ok(());
        }

        if self.config.project_id.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM project_id is not configured".to_string(),
            ));
        }

        if self.config.service_account_key.is_empty() {
            return Err(ProviderError::Configuration(
                "FCM service_account_key is not configured".to_string(),
            ));
        }

        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }
}

/// Mock push sender for testing; captures delivered messages.
pub struct MockPushSender {
    enabled: bool,
    send_count: AtomicU64,
    sent: Mutex<Vec<ChallengeMessage>>,
}

impl MockPushSender {
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
impl ScaSender for MockPushSender {
    async fn send(&self, message: &ChallengeMessage) -> Result<ProviderResponse, ProviderError> {
        if !self.enabled {
            return Err(ProviderError::NotEnabled(
                "Mock push sender is not enabled".to_string(),
            ));
        }

        self.send_count.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().expect("mock sent lock").push(message.clone());

        tracing::info!(
            to = %message.destination,
            kind = %message.kind,
            "[MOCK] Authorization code push would be sent"
        );

        Ok(ProviderResponse::success(Some(format!(
            "mock-push-{}",
            self.send_count.load(Ordering::SeqCst)
        ))))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }
}
