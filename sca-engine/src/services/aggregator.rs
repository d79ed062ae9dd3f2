//! Multilevel confirmation aggregation.
//!
//! For operations requiring more than one approver, tracks which distinct
//! users currently stand confirmed and computes the combined verdict. All
//! entry points run under the caller-held operation lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{InstanceStatus, OperationKind, OperationStatus, Verdict};
use crate::services::error::ScaError;
use crate::services::metrics;
use crate::services::store::EngineStore;

/// Verdict transition published to the owning business subsystem.
#[derive(Debug, Clone)]
pub enum OperationEvent {
    Authorized {
        operation_id: String,
        kind: OperationKind,
        confirmed_by: Vec<Uuid>,
    },
    Failed {
        operation_id: String,
        kind: OperationKind,
    },
}

pub struct MultilevelAggregator {
    store: Arc<EngineStore>,
    events: broadcast::Sender<OperationEvent>,
}

impl MultilevelAggregator {
    pub fn new(store: Arc<EngineStore>, events: broadcast::Sender<OperationEvent>) -> Self {
        Self { store, events }
    }

    /// Distinct users whose most recent instance against the operation is
    /// confirmed. A user confirming twice counts once.
    fn confirmed_users(&self, operation_id: &str) -> Vec<Uuid> {
        let mut latest: HashMap<Uuid, InstanceStatus> = HashMap::new();
        for instance in self.store.instances_for(operation_id) {
            latest.insert(instance.user_id, instance.status);
        }

        latest
            .into_iter()
            .filter(|(_, status)| *status == InstanceStatus::Confirmed)
            .map(|(user_id, _)| user_id)
            .collect()
    }

    /// Recompute after an instance confirmed. The confirmed transition is
    /// already recorded; the operation transition commits to the store
    /// before the event goes out.
    pub fn record_confirmation(&self, operation_id: &str) -> Result<Verdict, ScaError> {
        let operation = self.store.find_operation(operation_id)?;
        if operation.status != OperationStatus::Pending {
            return Ok(operation.status.verdict());
        }

        let confirmed = self.confirmed_users(operation_id);
        if (confirmed.len() as u32) < operation.required_confirmations {
            tracing::debug!(
                operation_id = %operation_id,
                confirmed = confirmed.len(),
                required = operation.required_confirmations,
                "Confirmation recorded, operation still pending"
            );
            return Ok(Verdict::Pending);
        }

        let updated = self.store.update_operation(operation_id, |op| {
            op.status = OperationStatus::Authorized;
            op.authorized_utc = Some(Utc::now());
        })?;

        metrics::record_operation_outcome(updated.kind.as_str(), "authorized");
        tracing::info!(
            operation_id = %operation_id,
            kind = %updated.kind,
            approvers = confirmed.len(),
            "Operation authorized"
        );

        let _ = self.events.send(OperationEvent::Authorized {
            operation_id: operation_id.to_string(),
            kind: updated.kind,
            confirmed_by: confirmed,
        });

        Ok(Verdict::Authorized)
    }

    /// Recompute after an instance closed without confirming. The operation
    /// fails only once its own window has lapsed; before that, remaining or
    /// retrying approvers can still complete the set.
    pub fn record_closure(&self, operation_id: &str) -> Result<Verdict, ScaError> {
        let operation = self.store.find_operation(operation_id)?;
        if operation.status != OperationStatus::Pending {
            return Ok(operation.status.verdict());
        }

        if !operation.is_expired() {
            return Ok(Verdict::Pending);
        }

        let updated = self.store.update_operation(operation_id, |op| {
            op.status = OperationStatus::AuthorizationFailed;
        })?;

        metrics::record_operation_outcome(updated.kind.as_str(), "failed");
        tracing::info!(
            operation_id = %operation_id,
            kind = %updated.kind,
            "Operation authorization failed"
        );

        let _ = self.events.send(OperationEvent::Failed {
            operation_id: operation_id.to_string(),
            kind: updated.kind,
        });

        Ok(Verdict::Failed)
    }
}
