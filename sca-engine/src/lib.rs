//! Strong customer authentication engine for ledger operations.
//!
//! Gates sensitive business actions (payment initiation, payment
//! cancellation, consent grants, user security data changes) behind one or
//! more verified authentication factors. A consuming subsystem registers an
//! operation, each approver runs an authorization instance through method
//! selection, challenge delivery, and code validation, and the engine
//! aggregates confirmations into an operation verdict that is released to
//! the owner exactly once.
//!
//! Transport, persistence, and token issuance stay with the surrounding
//! collaborators; the engine exposes a plain async API and publishes
//! verdict transitions on a broadcast channel.

pub mod config;
pub mod models;
pub mod services;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::ScaConfig;
use crate::models::{
    AuthorizationInstance, AuthorizationOperation, ChannelKind, InstanceStatus, NewOperation,
    Verdict,
};
use crate::services::aggregator::{MultilevelAggregator, OperationEvent};
use crate::services::authorization::{AuthContext, AuthorizationService, ValidationOutcome};
use crate::services::binding::OperationBinding;
use crate::services::challenge::ChallengeService;
use crate::services::error::ScaError;
use crate::services::providers::{
    FcmSender, GatewaySmsSender, MockEmailSender, MockPushSender, MockSmsSender, ProviderError,
    ScaSender, SmtpSender, StaticTanSender,
};
use crate::services::registry::{CredentialVerifier, MethodRegistry};
use crate::services::store::EngineStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// The engine facade wiring store, registry, senders, and services.
pub struct ScaEngine {
    config: ScaConfig,
    registry: Arc<MethodRegistry>,
    authorization: AuthorizationService,
    binding: OperationBinding,
    senders: HashMap<ChannelKind, Arc<dyn ScaSender>>,
}

impl ScaEngine {
    pub fn builder(config: ScaConfig) -> ScaEngineBuilder {
        ScaEngineBuilder {
            config,
            senders: HashMap::new(),
            credentials: None,
        }
    }

    /// Build an engine with real or mock senders per the config's enabled
    /// flags.
    pub fn from_config(config: ScaConfig) -> Self {
        let email: Arc<dyn ScaSender> = if config.smtp.enabled {
            match SmtpSender::new(config.smtp.clone()) {
                Ok(sender) => {
                    tracing::info!("SMTP sender initialized");
                    Arc::new(sender)
                }
                Err(e) => {
                    tracing::warn!("Failed to initialize SMTP sender: {}. Using mock.", e);
                    Arc::new(MockEmailSender::new(true))
                }
            }
        } else {
            tracing::info!("SMTP sender disabled, using mock email sender");
            Arc::new(MockEmailSender::new(true))
        };

        let sms: Arc<dyn ScaSender> = if config.sms.enabled {
            tracing::info!("SMS gateway sender initialized");
            Arc::new(GatewaySmsSender::new(config.sms.clone()))
        } else {
            tracing::info!("SMS gateway disabled, using mock SMS sender");
            Arc::new(MockSmsSender::new(true))
        };

        let push: Arc<dyn ScaSender> = if config.push.enabled {
            tracing::info!("FCM push sender initialized");
            Arc::new(FcmSender::new(config.push.clone()))
        } else {
            tracing::info!("FCM push disabled, using mock push sender");
            Arc::new(MockPushSender::new(true))
        };

        Self::builder(config)
            .sender(email)
            .sender(sms)
            .sender(push)
            .build()
    }

    /// Enrollment and validity-toggle surface for the user-management
    /// collaborator.
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ScaConfig {
        &self.config
    }

    pub fn register_operation(
        &self,
        input: NewOperation,
    ) -> Result<AuthorizationOperation, ScaError> {
        self.binding.register_operation(input)
    }

    /// Read-only snapshot of an operation.
    pub fn operation(&self, operation_id: &str) -> Result<AuthorizationOperation, ScaError> {
        self.binding.operation(operation_id)
    }

    /// Read-only snapshot of an instance.
    pub fn instance(&self, instance_id: Uuid) -> Result<AuthorizationInstance, ScaError> {
        self.authorization.instance(instance_id)
    }

    pub async fn start(
        &self,
        ctx: &AuthContext,
        operation_id: &str,
    ) -> Result<AuthorizationInstance, ScaError> {
        self.authorization.start(ctx, operation_id).await
    }

    pub async fn select_method(
        &self,
        instance_id: Uuid,
        method_id: Uuid,
    ) -> Result<AuthorizationInstance, ScaError> {
        self.authorization.select_method(instance_id, method_id).await
    }

    pub async fn validate_code(
        &self,
        instance_id: Uuid,
        submitted_code: &str,
    ) -> Result<ValidationOutcome, ScaError> {
        self.authorization
            .validate_code(instance_id, submitted_code)
            .await
    }

    pub async fn cancel(&self, instance_id: Uuid) -> Result<InstanceStatus, ScaError> {
        self.authorization.cancel(instance_id).await
    }

    pub fn verdict(&self, operation_id: &str) -> Result<Verdict, ScaError> {
        self.binding.verdict(operation_id)
    }

    pub async fn release(&self, operation_id: &str) -> Result<AuthorizationOperation, ScaError> {
        self.binding.release(operation_id).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.binding.subscribe()
    }

    pub async fn reconcile_expired(&self) -> usize {
        self.authorization.reconcile_expired().await
    }

    /// Check every wired sender's configuration and connectivity.
    pub async fn health_check(&self) -> Result<(), ProviderError> {
        for sender in self.senders.values() {
            sender.health_check().await?;
        }
        Ok(())
    }
}

pub struct ScaEngineBuilder {
    config: ScaConfig,
    senders: HashMap<ChannelKind, Arc<dyn ScaSender>>,
    credentials: Option<Arc<dyn CredentialVerifier>>,
}

impl ScaEngineBuilder {
    /// Wire a sender; its channel kind keys the senders map.
    pub fn sender(mut self, sender: Arc<dyn ScaSender>) -> Self {
        self.senders.insert(sender.kind(), sender);
        self
    }

    pub fn credential_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.credentials = Some(verifier);
        self
    }

    pub fn build(mut self) -> ScaEngine {
        // Static TAN involves no transport; wire the no-op sender unless
        // the caller supplied an override.
        self.senders
            .entry(ChannelKind::StaticTan)
            .or_insert_with(|| Arc::new(StaticTanSender::new()));

        let store = Arc::new(EngineStore::new());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let registry = Arc::new(MethodRegistry::new());
        let aggregator = MultilevelAggregator::new(store.clone(), events.clone());
        let challenges = ChallengeService::new(self.config.policy.clone());
        let authorization = AuthorizationService::new(
            store.clone(),
            registry.clone(),
            challenges,
            self.senders.clone(),
            aggregator,
            self.credentials,
        );
        let binding = OperationBinding::new(store, events, self.config.policy.clone());

        ScaEngine {
            config: self.config,
            registry,
            authorization,
            binding,
            senders: self.senders,
        }
    }
}
