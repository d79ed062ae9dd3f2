//! Binding between business operations and their authorization verdicts.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;

use crate::config::PolicySet;
use crate::models::{AuthorizationOperation, NewOperation, OperationStatus, Verdict};
use crate::services::aggregator::OperationEvent;
use crate::services::error::ScaError;
use crate::services::metrics;
use crate::services::store::EngineStore;

pub struct OperationBinding {
    store: Arc<EngineStore>,
    events: broadcast::Sender<OperationEvent>,
    policies: PolicySet,
}

impl OperationBinding {
    pub fn new(
        store: Arc<EngineStore>,
        events: broadcast::Sender<OperationEvent>,
        policies: PolicySet,
    ) -> Self {
        Self {
            store,
            events,
            policies,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.events.subscribe()
    }

    /// Register a business action for protection.
    #[tracing::instrument(skip(self, input), fields(operation_id = %input.operation_id))]
    pub fn register_operation(
        &self,
        input: NewOperation,
    ) -> Result<AuthorizationOperation, ScaError> {
        if input.required_confirmations == 0 {
            return Err(ScaError::InvalidOperation(
                "required confirmations must be at least 1".to_string(),
            ));
        }

        let policy = self.policies.for_kind(input.kind);
        let operation = AuthorizationOperation::new(input, policy.operation_ttl_secs);
        self.store.insert_operation(operation.clone())?;

        tracing::info!(
            kind = %operation.kind,
            required_confirmations = operation.required_confirmations,
            "Authorization operation registered"
        );

        Ok(operation)
    }

    /// Read-only snapshot of an operation.
    pub fn operation(&self, operation_id: &str) -> Result<AuthorizationOperation, ScaError> {
        self.store.find_operation(operation_id)
    }

    /// Current verdict; a lapsed pending operation is marked expired here.
    pub fn verdict(&self, operation_id: &str) -> Result<Verdict, ScaError> {
        let operation = self.store.find_operation(operation_id)?;

        if operation.status == OperationStatus::Pending && operation.is_expired() {
            let updated = self.store.update_operation(operation_id, |op| {
                // Re-checked under the entry guard; a concurrent
                // confirmation wins over lazy expiry.
                if op.status == OperationStatus::Pending {
                    op.status = OperationStatus::Expired;
                }
            })?;
            if updated.status == OperationStatus::Expired {
                metrics::record_operation_outcome(updated.kind.as_str(), "expired");
                tracing::info!(operation_id = %operation_id, "Operation expired without resolution");
            }
            return Ok(updated.status.verdict());
        }

        Ok(operation.status.verdict())
    }

    /// Hand the authorized operation back to its owning subsystem.
    ///
    /// Callable exactly once. Engine-held instances are dropped; the
    /// operation record stays behind so a repeat call reports
    /// `AlreadyReleased` rather than `OperationNotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, operation_id: &str) -> Result<AuthorizationOperation, ScaError> {
        let lock = self.store.operation_lock(operation_id);
        let _guard = lock.lock().await;

        let operation = self.store.find_operation(operation_id)?;
        match operation.status {
            OperationStatus::Authorized => {
                let updated = self.store.update_operation(operation_id, |op| {
                    op.status = OperationStatus::Released;
                    op.released_utc = Some(Utc::now());
                })?;
                self.store.clear_operation_instances(operation_id);

                tracing::info!(
                    operation_id = %operation_id,
                    kind = %updated.kind,
                    "Operation released to owning subsystem"
                );

                Ok(updated)
            }
            OperationStatus::Released => {
                Err(ScaError::AlreadyReleased(operation_id.to_string()))
            }
            status => Err(ScaError::InvalidOperationState {
                operation_id: operation_id.to_string(),
                status,
            }),
        }
    }
}
