//! The per-operation authorization lifecycle controller.
//!
//! Drives one instance through
//! `started -> method_selected -> challenge_sent -> terminal`, with method
//! resolution, challenge dispatch, attempt accounting, and lazy expiry.
//! Every transition runs under the owning operation's lock; the only I/O
//! held under it is the single outbound sender call, and the transition
//! commits only once that call's outcome is known.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use secrecy::SecretString;
use uuid::Uuid;

use crate::models::{
    AuthorizationInstance, Challenge, ChannelKind, InstanceStatus, OperationKind,
    OperationStatus, Verdict,
};
use crate::services::aggregator::MultilevelAggregator;
use crate::services::challenge::{hash_code, verify_code, ChallengeService};
use crate::services::error::ScaError;
use crate::services::metrics;
use crate::services::providers::{ChallengeMessage, ProviderError, ScaSender};
use crate::services::registry::{CredentialVerifier, MethodRegistry};
use crate::services::store::EngineStore;

/// Explicit per-call caller identity. The engine holds no ambient request
/// context; every entry point receives the authorizing user explicitly.
#[derive(Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub credential: Option<SecretString>,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            credential: None,
        }
    }

    pub fn with_credential(user_id: Uuid, credential: SecretString) -> Self {
        Self {
            user_id,
            credential: Some(credential),
        }
    }
}

/// Outcome of a successful code validation.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub instance_status: InstanceStatus,
    pub operation_verdict: Verdict,
}

pub struct AuthorizationService {
    store: Arc<EngineStore>,
    registry: Arc<MethodRegistry>,
    challenges: ChallengeService,
    senders: HashMap<ChannelKind, Arc<dyn ScaSender>>,
    aggregator: MultilevelAggregator,
    credentials: Option<Arc<dyn CredentialVerifier>>,
}

impl AuthorizationService {
    pub fn new(
        store: Arc<EngineStore>,
        registry: Arc<MethodRegistry>,
        challenges: ChallengeService,
        senders: HashMap<ChannelKind, Arc<dyn ScaSender>>,
        aggregator: MultilevelAggregator,
        credentials: Option<Arc<dyn CredentialVerifier>>,
    ) -> Self {
        Self {
            store,
            registry,
            challenges,
            senders,
            aggregator,
            credentials,
        }
    }

    /// Read-only snapshot of an instance.
    pub fn instance(&self, instance_id: Uuid) -> Result<AuthorizationInstance, ScaError> {
        self.store.find_instance(instance_id)
    }

    /// Open a new authorization instance for one user against an operation.
    #[tracing::instrument(skip(self, ctx), fields(user_id = %ctx.user_id))]
    pub async fn start(
        &self,
        ctx: &AuthContext,
        operation_id: &str,
    ) -> Result<AuthorizationInstance, ScaError> {
        let lock = self.store.operation_lock(operation_id);
        let _guard = lock.lock().await;

        let operation = self.store.find_operation(operation_id)?;
        if operation.status != OperationStatus::Pending {
            return Err(ScaError::InvalidOperationState {
                operation_id: operation_id.to_string(),
                status: operation.status,
            });
        }

        if operation.is_expired() {
            self.store.update_operation(operation_id, |op| {
                op.status = OperationStatus::Expired;
            })?;
            metrics::record_operation_outcome(operation.kind.as_str(), "expired");
            return Err(ScaError::OperationExpired(operation_id.to_string()));
        }

        if let Some(existing) = self.store.active_instance_for(operation_id, ctx.user_id) {
            return Err(ScaError::DuplicateActiveInstance {
                operation_id: operation_id.to_string(),
                instance_id: existing.instance_id,
            });
        }

        if !self.registry.is_eligible(ctx.user_id) {
            return Err(ScaError::NoEnabledMethods(ctx.user_id));
        }

        // Security-data edits re-check the base credential when a verifier
        // collaborator is wired.
        if operation.kind == OperationKind::UserDataChange {
            if let Some(verifier) = &self.credentials {
                let credential = ctx
                    .credential
                    .as_ref()
                    .ok_or(ScaError::InvalidCredentials)?;
                if !verifier.is_valid_credential(ctx.user_id, credential).await {
                    return Err(ScaError::InvalidCredentials);
                }
            }
        }

        let policy = self.challenges.policy_for(operation.kind);
        let instance = AuthorizationInstance::new(operation_id, ctx.user_id, policy.code_ttl_secs);
        self.store.insert_instance(instance.clone());

        tracing::info!(
            instance_id = %instance.instance_id,
            operation_id = %operation_id,
            kind = %operation.kind,
            "Authorization instance started"
        );

        Ok(instance)
    }

    /// Choose (or re-choose) a method and dispatch a challenge.
    ///
    /// Permitted from any non-terminal status, so a caller can re-send a
    /// challenge without restarting the whole authorization. Each dispatch,
    /// successful or not, consumes the resend budget.
    #[tracing::instrument(skip(self))]
    pub async fn select_method(
        &self,
        instance_id: Uuid,
        method_id: Uuid,
    ) -> Result<AuthorizationInstance, ScaError> {
        let operation_id = self.store.find_instance(instance_id)?.operation_id;
        let lock = self.store.operation_lock(&operation_id);
        let _guard = lock.lock().await;

        let instance = self.store.find_instance(instance_id)?;
        match instance.status {
            InstanceStatus::Confirmed => return Err(ScaError::AlreadyResolved(instance_id)),
            status if status.is_terminal() => {
                return Err(ScaError::InvalidState {
                    action: "select_method",
                    status,
                })
            }
            _ => {}
        }

        if instance.is_expired() {
            self.store.update_instance(instance_id, |i| {
                i.status = InstanceStatus::Expired;
            })?;
            self.aggregator.record_closure(&operation_id)?;
            return Err(ScaError::Expired);
        }

        let operation = self.store.find_operation(&operation_id)?;
        let policy = self.challenges.policy_for(operation.kind).clone();

        if instance.send_count >= policy.max_resends {
            self.store.update_instance(instance_id, |i| {
                i.status = InstanceStatus::Failed;
            })?;
            self.aggregator.record_closure(&operation_id)?;
            tracing::warn!(
                instance_id = %instance_id,
                send_count = instance.send_count,
                "Resend limit reached, instance failed"
            );
            return Err(ScaError::ResendLimitReached);
        }

        let method = self.registry.resolve(instance.user_id, method_id)?;

        // Static TAN reuses the enrolled value; everything else gets a
        // fresh code that never outlives this scope.
        let static_tan = method.uses_static_tan || method.channel == ChannelKind::StaticTan;
        let (code_hash, code) = if static_tan {
            let hash = method.static_tan_hash.clone().ok_or_else(|| {
                ScaError::InvalidMethod("static TAN method has no enrolled value".to_string())
            })?;
            (hash, String::new())
        } else {
            let code = self.challenges.generate_code(policy.code_length);
            (hash_code(&code), code)
        };

        let channel = if static_tan {
            ChannelKind::StaticTan
        } else {
            method.channel
        };
        let sender = self.senders.get(&channel).ok_or_else(|| {
            ScaError::DeliveryFailed(ProviderError::NotEnabled(format!(
                "No sender wired for channel {}",
                channel
            )))
        })?;

        let message = ChallengeMessage {
            destination: method.destination.clone(),
            code,
            kind: operation.kind,
            expires_in_secs: policy.code_ttl_secs,
        };

        match sender.send(&message).await {
            Ok(response) => {
                let challenge =
                    Challenge::new(code_hash, policy.code_ttl_secs, policy.max_attempts);
                let challenge_expiry = challenge.expires_utc;
                let updated = self.store.update_instance(instance_id, |i| {
                    i.method_id = Some(method_id);
                    i.status = InstanceStatus::ChallengeSent;
                    i.send_count += 1;
                    i.expires_utc = challenge_expiry;
                    i.challenge = Some(challenge);
                })?;

                metrics::record_challenge_sent(channel.as_str(), "sent");
                tracing::info!(
                    instance_id = %instance_id,
                    channel = %channel,
                    destination = %method.masked_destination(),
                    provider_id = ?response.provider_id,
                    "Challenge dispatched"
                );

                Ok(updated)
            }
            Err(err) => {
                // The instance survives a delivery failure; the method stays
                // chosen and the caller may retry within the resend budget.
                self.store.update_instance(instance_id, |i| {
                    i.method_id = Some(method_id);
                    i.status = InstanceStatus::MethodSelected;
                    i.send_count += 1;
                    i.challenge = None;
                })?;

                metrics::record_challenge_sent(channel.as_str(), "failed");
                tracing::warn!(
                    instance_id = %instance_id,
                    channel = %channel,
                    error = %err,
                    "Challenge delivery failed"
                );

                Err(ScaError::DeliveryFailed(err))
            }
        }
    }

    /// Check a submitted code against the live challenge.
    #[tracing::instrument(skip(self, submitted_code))]
    pub async fn validate_code(
        &self,
        instance_id: Uuid,
        submitted_code: &str,
    ) -> Result<ValidationOutcome, ScaError> {
        let operation_id = self.store.find_instance(instance_id)?.operation_id;
        let lock = self.store.operation_lock(&operation_id);
        let _guard = lock.lock().await;

        let instance = self.store.find_instance(instance_id)?;
        match instance.status {
            InstanceStatus::ChallengeSent => {}
            InstanceStatus::Confirmed => return Err(ScaError::AlreadyResolved(instance_id)),
            status => {
                return Err(ScaError::InvalidState {
                    action: "validate_code",
                    status,
                })
            }
        }

        let challenge = instance.challenge.clone().ok_or(ScaError::InvalidState {
            action: "validate_code",
            status: instance.status,
        })?;

        // Expiry wins over code correctness.
        if challenge.is_expired() {
            self.store.update_instance(instance_id, |i| {
                i.status = InstanceStatus::Expired;
            })?;
            self.aggregator.record_closure(&operation_id)?;
            metrics::record_validation("expired");
            tracing::info!(instance_id = %instance_id, "Challenge expired");
            return Err(ScaError::Expired);
        }

        if !verify_code(&challenge.code_hash, submitted_code) {
            let updated = self.store.update_instance(instance_id, |i| {
                if let Some(c) = i.challenge.as_mut() {
                    c.attempt_count += 1;
                }
            })?;
            let attempts = updated
                .challenge
                .as_ref()
                .map(|c| c.attempt_count)
                .unwrap_or(challenge.attempt_max);

            if attempts >= challenge.attempt_max {
                self.store.update_instance(instance_id, |i| {
                    i.status = InstanceStatus::Failed;
                })?;
                self.aggregator.record_closure(&operation_id)?;
                metrics::record_validation("exhausted");
                tracing::info!(
                    instance_id = %instance_id,
                    attempts = attempts,
                    "Validation attempts exhausted, instance failed"
                );
                return Err(ScaError::AttemptsExhausted);
            }

            metrics::record_validation("mismatch");
            return Err(ScaError::CodeMismatch {
                attempts_remaining: challenge.attempt_max - attempts,
            });
        }

        let updated = self.store.update_instance(instance_id, |i| {
            i.status = InstanceStatus::Confirmed;
            i.confirmed_utc = Some(Utc::now());
        })?;
        metrics::record_validation("confirmed");

        // The confirmed transition is recorded before the aggregate recount.
        let verdict = self.aggregator.record_confirmation(&operation_id)?;

        tracing::info!(
            instance_id = %instance_id,
            operation_id = %operation_id,
            verdict = %verdict,
            "Authorization confirmed"
        );

        Ok(ValidationOutcome {
            instance_status: updated.status,
            operation_verdict: verdict,
        })
    }

    /// Explicit abort. Idempotent no-op on an already-terminal instance.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, instance_id: Uuid) -> Result<InstanceStatus, ScaError> {
        let operation_id = self.store.find_instance(instance_id)?.operation_id;
        let lock = self.store.operation_lock(&operation_id);
        let _guard = lock.lock().await;

        let instance = self.store.find_instance(instance_id)?;
        if instance.status.is_terminal() {
            return Ok(instance.status);
        }

        let updated = self.store.update_instance(instance_id, |i| {
            i.status = InstanceStatus::Cancelled;
        })?;

        tracing::info!(instance_id = %instance_id, "Authorization instance cancelled");
        Ok(updated.status)
    }

    /// Advisory sweep: eagerly mark lapsed instances and operations so the
    /// one-active-instance slot frees up without waiting for a validate
    /// call. Correctness never depends on this running.
    pub async fn reconcile_expired(&self) -> usize {
        let mut reclaimed = 0;

        for operation_id in self.store.operation_ids() {
            let lock = self.store.operation_lock(&operation_id);
            let _guard = lock.lock().await;

            for instance in self.store.instances_for(&operation_id) {
                if !instance.status.is_terminal() && instance.is_expired() {
                    if self
                        .store
                        .update_instance(instance.instance_id, |i| {
                            i.status = InstanceStatus::Expired;
                        })
                        .is_ok()
                    {
                        let _ = self.aggregator.record_closure(&operation_id);
                        reclaimed += 1;
                    }
                }
            }

            if let Ok(operation) = self.store.find_operation(&operation_id) {
                if operation.status == OperationStatus::Pending && operation.is_expired() {
                    let _ = self.store.update_operation(&operation_id, |op| {
                        op.status = OperationStatus::Expired;
                    });
                    metrics::record_operation_outcome(operation.kind.as_str(), "expired");
                }
            }
        }

        if reclaimed > 0 {
            tracing::info!(reclaimed = reclaimed, "Expired authorization instances reclaimed");
        }

        reclaimed
    }
}
