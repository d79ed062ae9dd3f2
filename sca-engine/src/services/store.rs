//! Engine-held working state.
//!
//! Durable persistence belongs to the owning subsystems; this is the
//! engine's in-memory working set, sharded per operation. The per-operation
//! mutex serializes every lifecycle transition and aggregation recompute
//! for that operation while distinct operations proceed independently.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{AuthorizationInstance, AuthorizationOperation};
use crate::services::error::ScaError;

#[derive(Default)]
pub struct EngineStore {
    operations: DashMap<String, AuthorizationOperation>,
    instances: DashMap<Uuid, AuthorizationInstance>,
    op_instances: DashMap<String, Vec<Uuid>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl EngineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock guarding all transitions for one operation.
    pub fn operation_lock(&self, operation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(operation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    pub fn insert_operation(&self, operation: AuthorizationOperation) -> Result<(), ScaError> {
        if self.operations.contains_key(&operation.operation_id) {
            return Err(ScaError::DuplicateOperation(operation.operation_id));
        }
        self.operations
            .insert(operation.operation_id.clone(), operation);
        Ok(())
    }

    pub fn find_operation(&self, operation_id: &str) -> Result<AuthorizationOperation, ScaError> {
        self.operations
            .get(operation_id)
            .map(|op| op.clone())
            .ok_or_else(|| ScaError::OperationNotFound(operation_id.to_string()))
    }

    pub fn update_operation(
        &self,
        operation_id: &str,
        apply: impl FnOnce(&mut AuthorizationOperation),
    ) -> Result<AuthorizationOperation, ScaError> {
        let mut entry = self
            .operations
            .get_mut(operation_id)
            .ok_or_else(|| ScaError::OperationNotFound(operation_id.to_string()))?;
        apply(entry.value_mut());
        Ok(entry.value().clone())
    }

    pub fn operation_ids(&self) -> Vec<String> {
        self.operations.iter().map(|e| e.key().clone()).collect()
    }

    pub fn insert_instance(&self, instance: AuthorizationInstance) {
        self.op_instances
            .entry(instance.operation_id.clone())
            .or_default()
            .push(instance.instance_id);
        self.instances.insert(instance.instance_id, instance);
    }

    pub fn find_instance(&self, instance_id: Uuid) -> Result<AuthorizationInstance, ScaError> {
        self.instances
            .get(&instance_id)
            .map(|i| i.clone())
            .ok_or(ScaError::InstanceNotFound(instance_id))
    }

    pub fn update_instance(
        &self,
        instance_id: Uuid,
        apply: impl FnOnce(&mut AuthorizationInstance),
    ) -> Result<AuthorizationInstance, ScaError> {
        let mut entry = self
            .instances
            .get_mut(&instance_id)
            .ok_or(ScaError::InstanceNotFound(instance_id))?;
        apply(entry.value_mut());
        Ok(entry.value().clone())
    }

    pub fn instances_for(&self, operation_id: &str) -> Vec<AuthorizationInstance> {
        let ids = self
            .op_instances
            .get(operation_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        ids.iter()
            .filter_map(|id| self.instances.get(id).map(|i| i.clone()))
            .collect()
    }

    /// The non-terminal instance of one user against one operation, if any.
    pub fn active_instance_for(
        &self,
        operation_id: &str,
        user_id: Uuid,
    ) -> Option<AuthorizationInstance> {
        self.instances_for(operation_id)
            .into_iter()
            .find(|i| i.user_id == user_id && !i.status.is_terminal())
    }

    /// Drop all instances held for an operation. The operation record
    /// itself stays behind as a tombstone.
    pub fn clear_operation_instances(&self, operation_id: &str) {
        if let Some((_, ids)) = self.op_instances.remove(operation_id) {
            for id in ids {
                self.instances.remove(&id);
            }
        }
    }
}
