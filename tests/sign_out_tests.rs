//! 登出协调器集成测试

use fleet_console::{
    error::AppError,
    models::role::Role,
    session::{AuthAction, LifecyclePhase},
};

mod common;
use common::{FakeIdentityProvider, Harness};

#[tokio::test]
async fn test_sign_out_clears_session_and_state() {
    let h = Harness::signed_in(Role::Dispatcher).await;
    let user_id = h.identity.profile().id;

    let signed_out = h
        .lifecycle
        .sign_out_coordinator()
        .sign_out(Some("/console/bookings"))
        .await
        .unwrap();

    assert_eq!(signed_out.previous_path.as_deref(), Some("/console/bookings"));
    assert_eq!(signed_out.user_id, Some(user_id));

    let state = h.lifecycle.snapshot();
    assert_eq!(state.phase, LifecyclePhase::Unauthenticated);
    assert!(!state.is_authenticated);
    assert!(!state.is_logging_out);
    assert!(state.user.is_none());

    assert!(!h.lifecycle.has_stored_session());
    assert_eq!(h.kv.removes(), 1);
    assert_eq!(h.lifecycle.permissions().role(), None);
    assert!(!h.lifecycle.permissions().has_permission("bookings.view"));
    assert_eq!(FakeIdentityProvider::calls(&h.identity.sign_out_calls), 1);
}

#[tokio::test]
async fn test_concurrent_sign_out_runs_once() {
    let h = Harness::signed_in(Role::Admin).await;
    let coordinator = h.lifecycle.sign_out_coordinator();
    let gate = h.identity.hold_next();

    let first_coordinator = coordinator.clone();
    let first = tokio::spawn(async move { first_coordinator.sign_out(None).await });
    gate.wait_entered().await;

    assert!(h.lifecycle.snapshot().is_logging_out);

    let second = coordinator.sign_out(None).await;
    assert!(matches!(
        second,
        Err(AppError::ActionInProgress(AuthAction::SignOut))
    ));

    gate.open();
    assert!(first.await.unwrap().is_ok());

    assert_eq!(FakeIdentityProvider::calls(&h.identity.sign_out_calls), 1);
    assert_eq!(h.kv.removes(), 1);
    assert!(!h.lifecycle.snapshot().is_logging_out);
}

#[tokio::test]
async fn test_remote_failure_keeps_local_session() {
    let h = Harness::signed_in(Role::Fleet).await;
    h.identity.fail_sign_out(true);
    let coordinator = h.lifecycle.sign_out_coordinator();

    let result = coordinator.sign_out(Some("/console/vehicles")).await;

    assert!(matches!(result, Err(AppError::Remote(_))));
    let state = h.lifecycle.snapshot();
    assert!(state.is_authenticated);
    assert!(!state.is_logging_out);
    assert_eq!(
        state.last_error.as_deref(),
        Some("Identity service unavailable, please retry")
    );
    assert!(h.lifecycle.has_stored_session());
    assert_eq!(h.kv.removes(), 0);
    assert_eq!(h.lifecycle.permissions().role(), Some(Role::Fleet));

    // 重试成功
    h.identity.fail_sign_out(false);
    assert!(coordinator.sign_out(None).await.is_ok());
    assert!(!h.lifecycle.has_stored_session());
}

#[tokio::test]
async fn test_navigate_only_after_successful_sign_out() {
    let h = Harness::signed_in(Role::Driver).await;
    let coordinator = h.lifecycle.sign_out_coordinator();

    h.identity.fail_sign_out(true);
    let mut navigated_to: Option<String> = None;
    let result = coordinator
        .sign_out_and_navigate(Some("/console/bookings"), |out| {
            navigated_to = out.previous_path.clone();
        })
        .await;
    assert!(result.is_err());
    assert!(navigated_to.is_none());

    h.identity.fail_sign_out(false);
    coordinator
        .sign_out_and_navigate(Some("/console/bookings"), |out| {
            navigated_to = out.previous_path.clone();
        })
        .await
        .unwrap();
    assert_eq!(navigated_to.as_deref(), Some("/console/bookings"));
}

#[tokio::test]
async fn test_sign_in_and_refresh_rejected_during_sign_out() {
    let h = Harness::signed_in(Role::Dispatcher).await;
    let coordinator = h.lifecycle.sign_out_coordinator();
    let gate = h.identity.hold_next();

    let sign_out = tokio::spawn(async move { coordinator.sign_out(None).await });
    gate.wait_entered().await;

    let sign_in = h.lifecycle.sign_in(h.identity.credentials()).await;
    assert!(matches!(
        sign_in,
        Err(AppError::ActionInProgress(AuthAction::SignOut))
    ));

    let refresh = h.lifecycle.refresh().await;
    assert!(matches!(
        refresh,
        Err(AppError::ActionInProgress(AuthAction::SignOut))
    ));

    gate.open();
    assert!(sign_out.await.unwrap().is_ok());
    assert_eq!(FakeIdentityProvider::calls(&h.identity.sign_in_calls), 1);
    assert_eq!(FakeIdentityProvider::calls(&h.identity.refresh_calls), 0);
}

#[tokio::test]
async fn test_sign_out_without_session_skips_remote_call() {
    let h = Harness::new(Role::Customer);
    h.lifecycle.start();

    let signed_out = h
        .lifecycle
        .sign_out_coordinator()
        .sign_out(None)
        .await
        .unwrap();

    assert_eq!(signed_out.user_id, None);
    assert_eq!(FakeIdentityProvider::calls(&h.identity.sign_out_calls), 0);
    assert_eq!(h.lifecycle.snapshot().phase, LifecyclePhase::Unauthenticated);
}
