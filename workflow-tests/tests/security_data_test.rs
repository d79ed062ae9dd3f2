//! User-security-data change workflow tests.
//!
//! Security-data edits re-check the base credential through the wired
//! verifier before SCA starts, and static-TAN methods complete the flow
//! without any channel traffic.

mod common;

use std::sync::Arc;

use sca_engine::config::ScaConfig;
use sca_engine::models::{ChannelKind, NewMethod, NewOperation, OperationKind, Verdict};
use sca_engine::ScaEngine;
use sca_engine::services::authorization::AuthContext;
use sca_engine::services::ScaError;
use secrecy::SecretString;
use uuid::Uuid;
use workflow_tests::{as_user, FixedPinVerifier, WorkflowTestContext};

#[tokio::test]
async fn data_change_with_wrong_pin_never_starts() {
    common::setup();
    let ctx = WorkflowTestContext::with_verifier(Arc::new(FixedPinVerifier::new("2580")));

    let user = Uuid::new_v4();
    ctx.enroll(user, ChannelKind::Email, "user@example.com");
    ctx.register(OperationKind::UserDataChange, "SCA-EDIT-1", user, 1);

    let wrong = AuthContext::with_credential(user, SecretString::new("1111".to_string()));
    let err = ctx.engine.start(&wrong, "SCA-EDIT-1").await.unwrap_err();
    assert!(matches!(err, ScaError::InvalidCredentials));
    assert_eq!(ctx.engine.verdict("SCA-EDIT-1").unwrap(), Verdict::Pending);
}

#[tokio::test]
async fn data_change_with_valid_pin_completes_over_email() {
    common::setup();
    let ctx = WorkflowTestContext::with_verifier(Arc::new(FixedPinVerifier::new("2580")));

    let user = Uuid::new_v4();
    let method = ctx.enroll(user, ChannelKind::Email, "user@example.com");
    ctx.register(OperationKind::UserDataChange, "SCA-EDIT-1", user, 1);

    let right = AuthContext::with_credential(user, SecretString::new("2580".to_string()));
    let instance = ctx.engine.start(&right, "SCA-EDIT-1").await.unwrap();
    ctx.engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();

    let outcome = ctx
        .engine
        .validate_code(instance.instance_id, &ctx.last_email_code())
        .await
        .unwrap();
    assert_eq!(outcome.operation_verdict, Verdict::Authorized);
}

#[tokio::test]
async fn static_tan_authorizes_a_consent_without_channel_traffic() {
    common::setup();
    let ctx = WorkflowTestContext::new();

    let user = Uuid::new_v4();
    let method = ctx.enroll_static_tan(user, "246802");
    ctx.register(OperationKind::Consent, "CONSENT-1", user, 1);

    let instance = ctx.engine.start(&as_user(user), "CONSENT-1").await.unwrap();
    ctx.engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();

    assert_eq!(ctx.sms.send_count(), 0);
    assert_eq!(ctx.email.send_count(), 0);
    assert_eq!(ctx.push.send_count(), 0);

    let outcome = ctx
        .engine
        .validate_code(instance.instance_id, "246802")
        .await
        .unwrap();
    assert_eq!(outcome.operation_verdict, Verdict::Authorized);
}

#[tokio::test]
async fn engine_built_from_env_config_serves_a_static_tan_flow() {
    common::setup();

    // Outside production the loader falls back to defaults and every
    // provider flag is off, so mock senders get wired.
    let engine = ScaEngine::from_config(ScaConfig::load().unwrap());
    engine.health_check().await.unwrap();

    let user = Uuid::new_v4();
    let method = engine
        .registry()
        .enroll(NewMethod {
            user_id: user,
            channel: ChannelKind::StaticTan,
            destination: "card-reader".to_string(),
            static_tan: Some(SecretString::new("135791".to_string())),
        })
        .unwrap()
        .method_id;

    engine
        .register_operation(NewOperation {
            operation_id: "CONSENT-ENV-1".to_string(),
            kind: OperationKind::Consent,
            initiator_user_id: user,
            required_confirmations: 1,
        })
        .unwrap();

    let instance = engine.start(&as_user(user), "CONSENT-ENV-1").await.unwrap();
    engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();
    let outcome = engine
        .validate_code(instance.instance_id, "135791")
        .await
        .unwrap();
    assert_eq!(outcome.operation_verdict, Verdict::Authorized);
}

#[tokio::test]
async fn push_channel_delivers_the_code() {
    common::setup();
    let ctx = WorkflowTestContext::new();

    let user = Uuid::new_v4();
    let method = ctx.enroll(user, ChannelKind::Push, "device-token-1");
    ctx.register(OperationKind::UserDataChange, "SCA-EDIT-2", user, 1);

    // No verifier wired; the credential collaborator is optional.
    let instance = ctx.engine.start(&as_user(user), "SCA-EDIT-2").await.unwrap();
    ctx.engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();
    assert_eq!(ctx.push.send_count(), 1);

    let code = ctx.push.last_message().unwrap().code;
    let outcome = ctx
        .engine
        .validate_code(instance.instance_id, &code)
        .await
        .unwrap();
    assert_eq!(outcome.operation_verdict, Verdict::Authorized);
}
