//! Enrolled authentication methods, read-mostly from the engine's side.
//!
//! Enrollment, removal, and validity toggling are driven by the external
//! user-management subsystem; the authorization engine only resolves and
//! lists methods. A method toggled invalid becomes unselectable for any
//! in-flight instance immediately, since selection resolves live state.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::models::{AuthenticationMethod, ChannelKind, NewMethod};
use crate::services::challenge::hash_code;
use crate::services::error::ScaError;

/// Credential check consumed from the user/credential collaborator.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn is_valid_credential(&self, user_id: Uuid, secret: &SecretString) -> bool;
}

#[derive(Default)]
pub struct MethodRegistry {
    methods: DashMap<Uuid, AuthenticationMethod>,
    by_user: DashMap<Uuid, Vec<Uuid>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enroll a method for a user.
    pub fn enroll(&self, input: NewMethod) -> Result<AuthenticationMethod, ScaError> {
        let uses_static_tan =
            input.channel == ChannelKind::StaticTan || input.static_tan.is_some();
        if uses_static_tan && input.static_tan.is_none() {
            return Err(ScaError::InvalidMethod(
                "static TAN method requires an enrolled TAN value".to_string(),
            ));
        }

        let method = AuthenticationMethod {
            method_id: Uuid::new_v4(),
            user_id: input.user_id,
            channel: input.channel,
            destination: input.destination,
            uses_static_tan,
            static_tan_hash: input
                .static_tan
                .map(|tan| hash_code(tan.expose_secret())),
            valid: true,
            created_utc: Utc::now(),
        };

        self.methods.insert(method.method_id, method.clone());
        self.by_user
            .entry(method.user_id)
            .or_default()
            .push(method.method_id);

        tracing::info!(
            method_id = %method.method_id,
            user_id = %method.user_id,
            channel = %method.channel,
            destination = %method.masked_destination(),
            "Authentication method enrolled"
        );

        Ok(method)
    }

    /// Remove a method entirely.
    pub fn remove(&self, method_id: Uuid) -> Result<(), ScaError> {
        let (_, method) = self
            .methods
            .remove(&method_id)
            .ok_or(ScaError::MethodNotFound(method_id))?;

        if let Some(mut ids) = self.by_user.get_mut(&method.user_id) {
            ids.retain(|id| *id != method_id);
        }

        tracing::info!(method_id = %method_id, user_id = %method.user_id, "Authentication method removed");
        Ok(())
    }

    /// Validity toggle callback for the user-management subsystem.
    pub fn set_validity(&self, method_id: Uuid, valid: bool) -> Result<(), ScaError> {
        let mut method = self
            .methods
            .get_mut(&method_id)
            .ok_or(ScaError::MethodNotFound(method_id))?;
        method.valid = valid;

        tracing::info!(method_id = %method_id, valid = valid, "Authentication method validity toggled");
        Ok(())
    }

    pub fn list_enabled_methods(&self, user_id: Uuid) -> Vec<AuthenticationMethod> {
        let ids = self
            .by_user
            .get(&user_id)
            .map(|ids| ids.clone())
            .unwrap_or_default();

        ids.iter()
            .filter_map(|id| self.methods.get(id).map(|m| m.clone()))
            .filter(|m| m.valid)
            .collect()
    }

    /// True if the user has at least one enabled method.
    pub fn is_eligible(&self, user_id: Uuid) -> bool {
        !self.list_enabled_methods(user_id).is_empty()
    }

    /// Resolve a method for the authorizing user.
    pub fn resolve(
        &self,
        user_id: Uuid,
        method_id: Uuid,
    ) -> Result<AuthenticationMethod, ScaError> {
        let method = self
            .methods
            .get(&method_id)
            .map(|m| m.clone())
            .ok_or(ScaError::MethodNotFound(method_id))?;

        // A method enrolled to another user is indistinguishable from an
        // unknown one.
        if method.user_id != user_id {
            return Err(ScaError::MethodNotFound(method_id));
        }

        if !method.valid {
            return Err(ScaError::MethodDisabled(method_id));
        }

        Ok(method)
    }
}
