//! Cross-component authorization workflow tests library.
//!
//! Provides test infrastructure for driving complete authorization flows
//! through the engine's public API: operation registration, method
//! selection, challenge delivery over mock senders, code validation,
//! multilevel aggregation, and release.

use std::sync::Arc;
use std::sync::Once;

use async_trait::async_trait;
use sca_engine::config::{
    ChallengePolicy, FcmConfig, PolicySet, ScaConfig, SmsGatewayConfig, SmtpConfig,
};
use sca_engine::models::{ChannelKind, NewMethod, NewOperation, OperationKind};
use sca_engine::services::authorization::AuthContext;
use sca_engine::services::providers::{MockEmailSender, MockPushSender, MockSmsSender};
use sca_engine::services::registry::CredentialVerifier;
use sca_engine::ScaEngine;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,workflow_tests=debug,sca_engine=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Context for workflow tests: an engine wired with mock senders plus
/// handles to inspect what those senders delivered.
pub struct WorkflowTestContext {
    pub engine: ScaEngine,
    pub sms: Arc<MockSmsSender>,
    pub email: Arc<MockEmailSender>,
    pub push: Arc<MockPushSender>,
}

impl WorkflowTestContext {
    pub fn new() -> Self {
        Self::with_policies(uniform_policies(default_policy()), None)
    }

    pub fn with_policy(policy: ChallengePolicy) -> Self {
        Self::with_policies(uniform_policies(policy), None)
    }

    pub fn with_verifier(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self::with_policies(uniform_policies(default_policy()), Some(verifier))
    }

    fn with_policies(
        policies: PolicySet,
        verifier: Option<Arc<dyn CredentialVerifier>>,
    ) -> Self {
        init_tracing();

        let sms = Arc::new(MockSmsSender::new(true));
        let email = Arc::new(MockEmailSender::new(true));
        let push = Arc::new(MockPushSender::new(true));

        let mut builder = ScaEngine::builder(test_config(policies))
            .sender(sms.clone())
            .sender(email.clone())
            .sender(push.clone());
        if let Some(verifier) = verifier {
            builder = builder.credential_verifier(verifier);
        }

        tracing::debug!("Workflow test engine wired with mock senders");

        Self {
            engine: builder.build(),
            sms,
            email,
            push,
        }
    }

    pub fn enroll(&self, user_id: Uuid, channel: ChannelKind, destination: &str) -> Uuid {
        self.engine
            .registry()
            .enroll(NewMethod {
                user_id,
                channel,
                destination: destination.to_string(),
                static_tan: None,
            })
            .expect("Failed to enroll method")
            .method_id
    }

    pub fn enroll_static_tan(&self, user_id: Uuid, tan: &str) -> Uuid {
        self.engine
            .registry()
            .enroll(NewMethod {
                user_id,
                channel: ChannelKind::StaticTan,
                destination: "card-reader".to_string(),
                static_tan: Some(SecretString::new(tan.to_string())),
            })
            .expect("Failed to enroll static TAN method")
            .method_id
    }

    pub fn register(&self, kind: OperationKind, operation_id: &str, user_id: Uuid, required: u32) {
        self.engine
            .register_operation(NewOperation {
                operation_id: operation_id.to_string(),
                kind,
                initiator_user_id: user_id,
                required_confirmations: required,
            })
            .expect("Failed to register operation");
    }

    pub fn last_sms_code(&self) -> String {
        self.sms.last_message().expect("No SMS was delivered").code
    }

    pub fn last_email_code(&self) -> String {
        self.email
            .last_message()
            .expect("No email was delivered")
            .code
    }
}

impl Default for WorkflowTestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_policy() -> ChallengePolicy {
    ChallengePolicy {
        code_length: 6,
        code_ttl_secs: 300,
        max_attempts: 3,
        max_resends: 3,
        operation_ttl_secs: 3600,
    }
}

pub fn uniform_policies(policy: ChallengePolicy) -> PolicySet {
    PolicySet {
        payment: policy.clone(),
        payment_cancellation: policy.clone(),
        user_data_change: policy.clone(),
        consent: policy,
    }
}

pub fn test_config(policies: PolicySet) -> ScaConfig {
    ScaConfig {
        policy: policies,
        smtp: SmtpConfig {
            host: "smtp.test.local".to_string(),
            port: 587,
            user: "test".to_string(),
            password: "test".to_string(),
            from_email: "test@example.com".to_string(),
            from_name: "Test Service".to_string(),
            enabled: false, // Use mock
        },
        sms: SmsGatewayConfig {
            api_url: String::new(),
            auth_key: "test-key".to_string(),
            sender_id: "TEST".to_string(),
            enabled: false, // Use mock
        },
        push: FcmConfig {
            project_id: "test-project".to_string(),
            service_account_key: "test-key".to_string(),
            enabled: false, // Use mock
        },
    }
}

/// Credential verifier accepting one fixed PIN, standing in for the
/// user/credential collaborator.
pub struct FixedPinVerifier {
    pin: String,
}

impl FixedPinVerifier {
    pub fn new(pin: &str) -> Self {
        Self {
            pin: pin.to_string(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for FixedPinVerifier {
    async fn is_valid_credential(&self, _user_id: Uuid, secret: &SecretString) -> bool {
        secret.expose_secret() == &self.pin
    }
}

/// Convenience wrapper for the explicit caller context.
pub fn as_user(user_id: Uuid) -> AuthContext {
    AuthContext::new(user_id)
}
