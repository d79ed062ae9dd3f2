#![allow(dead_code)]

use std::sync::Arc;

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

pub struct TestEngine {
    pub engine: ScaEngine,
    pub sms: Arc<MockSmsSender>,
    pub email: Arc<MockEmailSender>,
    pub push: Arc<MockPushSender>,
}

impl TestEngine {
    pub fn spawn() -> Self {
        Self::build(uniform_policies(test_policy()), true, None)
    }

    pub fn with_policy(policy: ChallengePolicy) -> Self {
        Self::build(uniform_policies(policy), true, None)
    }

    /// SMS deliveries fail; email still works.
    pub fn with_failing_sms(policy: ChallengePolicy) -> Self {
        Self::build(uniform_policies(policy), false, None)
    }

    pub fn with_verifier(verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self::build(uniform_policies(test_policy()), true, Some(verifier))
    }

    fn build(
        policies: PolicySet,
        sms_enabled: bool,
        verifier: Option<Arc<dyn CredentialVerifier>>,
    ) -> Self {
        let config = test_config(policies);
        let sms = Arc::new(MockSmsSender::new(sms_enabled));
        let email = Arc::new(MockEmailSender::new(true));
        let push = Arc::new(MockPushSender::new(true));

        let mut builder = ScaEngine::builder(config)
            .sender(sms.clone())
            .sender(email.clone())
            .sender(push.clone());
        if let Some(verifier) = verifier {
            builder = builder.credential_verifier(verifier);
        }

        Self {
            engine: builder.build(),
            sms,
            email,
            push,
        }
    }

    pub fn enroll_sms(&self, user_id: Uuid) -> Uuid {
        self.engine
            .registry()
            .enroll(NewMethod {
                user_id,
                channel: ChannelKind::Sms,
                destination: "+15550100200".to_string(),
                static_tan: None,
            })
            .expect("Failed to enroll SMS method")
            .method_id
    }

    pub fn enroll_email(&self, user_id: Uuid) -> Uuid {
        self.engine
            .registry()
            .enroll(NewMethod {
                user_id,
                channel: ChannelKind::Email,
                destination: "user@example.com".to_string(),
                static_tan: None,
            })
            .expect("Failed to enroll email method")
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

    pub fn register_payment(&self, operation_id: &str, user_id: Uuid, required: u32) {
        self.register(OperationKind::Payment, operation_id, user_id, required);
    }

    pub fn last_sms_code(&self) -> String {
        self.sms
            .last_message()
            .expect("No SMS was delivered")
            .code
    }

    pub fn last_email_code(&self) -> String {
        self.email
            .last_message()
            .expect("No email was delivered")
            .code
    }

    /// Full single-approver flow over SMS: start, select, validate.
    pub async fn confirm_via_sms(&self, user_id: Uuid, method_id: Uuid, operation_id: &str) {
        let instance = self
            .engine
            .start(&ctx(user_id), operation_id)
            .await
            .expect("Failed to start instance");
        self.engine
            .select_method(instance.instance_id, method_id)
            .await
            .expect("Failed to select method");
        self.engine
            .validate_code(instance.instance_id, &self.last_sms_code())
            .await
            .expect("Failed to validate code");
    }
}

pub fn ctx(user_id: Uuid) -> AuthContext {
    AuthContext::new(user_id)
}

pub fn test_policy() -> ChallengePolicy {
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

/// Credential verifier accepting a single fixed PIN.
pub struct StaticPinVerifier {
    pin: String,
}

impl StaticPinVerifier {
    pub fn new(pin: &str) -> Self {
        Self {
            pin: pin.to_string(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for StaticPinVerifier {
    async fn is_valid_credential(&self, _user_id: Uuid, secret: &SecretString) -> bool {
        secret.expose_secret() == &self.pin
    }
}
