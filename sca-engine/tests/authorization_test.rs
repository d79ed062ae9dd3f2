mod common;

use common::{ctx, TestEngine};
use sca_engine::models::{InstanceStatus, Verdict};
use sca_engine::services::ScaError;
use uuid::Uuid;

#[tokio::test]
async fn start_unknown_operation_is_rejected() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    harness.enroll_sms(user);

    let err = harness
        .engine
        .start(&ctx(user), "MISSING-1")
        .await
        .unwrap_err();

    assert!(matches!(err, ScaError::OperationNotFound(_)));
}

#[tokio::test]
async fn start_requires_an_enabled_method() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    harness.register_payment("PAY-1", user, 1);

    let err = harness
        .engine
        .start(&ctx(user), "PAY-1")
        .await
        .unwrap_err();

    assert!(matches!(err, ScaError::NoEnabledMethods(_)));
}

#[tokio::test]
async fn duplicate_start_surfaces_the_existing_instance() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let first = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    let err = harness
        .engine
        .start(&ctx(user), "PAY-1")
        .await
        .unwrap_err();

    match err {
        ScaError::DuplicateActiveInstance { instance_id, .. } => {
            assert_eq!(instance_id, first.instance_id);
        }
        other => panic!("Expected DuplicateActiveInstance, got {:?}", other),
    }
}

#[tokio::test]
async fn single_approver_payment_flow() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    let method = harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    assert_eq!(instance.status, InstanceStatus::Started);

    let sent = harness
        .engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();
    assert_eq!(sent.status, InstanceStatus::ChallengeSent);
    assert_eq!(harness.sms.send_count(), 1);

    // Two wrong submissions consume attempts without closing the instance.
    let err = harness
        .engine
        .validate_code(instance.instance_id, "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, ScaError::CodeMismatch { attempts_remaining: 2 }));

    let err = harness
        .engine
        .validate_code(instance.instance_id, "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, ScaError::CodeMismatch { attempts_remaining: 1 }));

    let snapshot = harness.engine.instance(instance.instance_id).unwrap();
    assert_eq!(snapshot.status, InstanceStatus::ChallengeSent);
    assert_eq!(snapshot.challenge.unwrap().attempt_count, 2);

    let outcome = harness
        .engine
        .validate_code(instance.instance_id, &harness.last_sms_code())
        .await
        .unwrap();
    assert_eq!(outcome.instance_status, InstanceStatus::Confirmed);
    assert_eq!(outcome.operation_verdict, Verdict::Authorized);
    assert_eq!(harness.engine.verdict("PAY-1").unwrap(), Verdict::Authorized);
}

#[tokio::test]
async fn three_wrong_codes_fail_the_instance_for_good() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    let method = harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    harness
        .engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();
    let correct = harness.last_sms_code();

    for _ in 0..2 {
        let err = harness
            .engine
            .validate_code(instance.instance_id, "000000")
            .await
            .unwrap_err();
        assert!(matches!(err, ScaError::CodeMismatch { .. }));
    }

    let err = harness
        .engine
        .validate_code(instance.instance_id, "000000")
        .await
        .unwrap_err();
    assert!(matches!(err, ScaError::AttemptsExhausted));
    assert_eq!(
        harness.engine.instance(instance.instance_id).unwrap().status,
        InstanceStatus::Failed
    );

    // A correct fourth submission no longer matters.
    let err = harness
        .engine
        .validate_code(instance.instance_id, &correct)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScaError::InvalidState {
            status: InstanceStatus::Failed,
            ..
        }
    ));
    assert_eq!(harness.engine.verdict("PAY-1").unwrap(), Verdict::Pending);
}

#[tokio::test]
async fn validate_without_a_challenge_is_invalid_state() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    let err = harness
        .engine
        .validate_code(instance.instance_id, "123456")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ScaError::InvalidState {
            status: InstanceStatus::Started,
            ..
        }
    ));
}

#[tokio::test]
async fn confirmed_instance_cannot_be_revalidated() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    let method = harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    harness
        .engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap();
    let code = harness.last_sms_code();
    harness
        .engine
        .validate_code(instance.instance_id, &code)
        .await
        .unwrap();

    let err = harness
        .engine
        .validate_code(instance.instance_id, &code)
        .await
        .unwrap_err();
    assert!(matches!(err, ScaError::AlreadyResolved(_)));
}

#[tokio::test]
async fn cancel_is_idempotent() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    let status = harness.engine.cancel(instance.instance_id).await.unwrap();
    assert_eq!(status, InstanceStatus::Cancelled);

    // A second cancel is a no-op, not an error.
    let status = harness.engine.cancel(instance.instance_id).await.unwrap();
    assert_eq!(status, InstanceStatus::Cancelled);
}

#[tokio::test]
async fn cancelled_slot_frees_up_for_a_fresh_start() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    harness.engine.cancel(instance.instance_id).await.unwrap();

    let second = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    assert_ne!(second.instance_id, instance.instance_id);
}

#[tokio::test]
async fn another_users_method_reads_as_unknown() {
    let harness = TestEngine::spawn();
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    harness.enroll_sms(alice);
    let bobs_method = harness.enroll_sms(bob);
    harness.register_payment("PAY-1", alice, 1);

    let instance = harness.engine.start(&ctx(alice), "PAY-1").await.unwrap();
    let err = harness
        .engine
        .select_method(instance.instance_id, bobs_method)
        .await
        .unwrap_err();

    assert!(matches!(err, ScaError::MethodNotFound(_)));
}

#[tokio::test]
async fn method_toggled_invalid_mid_flight_is_unselectable() {
    let harness = TestEngine::spawn();
    let user = Uuid::new_v4();
    let method = harness.enroll_sms(user);
    harness.register_payment("PAY-1", user, 1);

    let instance = harness.engine.start(&ctx(user), "PAY-1").await.unwrap();
    harness.engine.registry().set_validity(method, false).unwrap();

    let err = harness
        .engine
        .select_method(instance.instance_id, method)
        .await
        .unwrap_err();
    assert!(matches!(err, ScaError::MethodDisabled(_)));
}
