use super::*;
use crate::escalation::ResolutionCause;
use crate::rule::RuleAction;
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Default)]
struct RecordingInjector {
    requests: Mutex<Vec<InjectionRequest>>,
}

impl RecordingInjector {
    fn requests(&self) -> Vec<InjectionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageInjector for RecordingInjector {
    async fn inject(&self, request: &InjectionRequest) -> ApprovalResult<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("frame-{}", requests.len()))
    }
}

struct FailingInjector;

#[async_trait]
impl MessageInjector for FailingInjector {
    async fn inject(&self, _request: &InjectionRequest) -> ApprovalResult<String> {
        Err(ApprovalError::Injection("session closed".to_string()))
    }
}

/// Never finishes delivering the form.
struct HangingInjector;

#[async_trait]
impl MessageInjector for HangingInjector {
    async fn inject(&self, _request: &InjectionRequest) -> ApprovalResult<String> {
        std::future::pending().await
    }
}

/// Takes `delay` to deliver the form.
struct SlowInjector {
    delay: Duration,
}

#[async_trait]
impl MessageInjector for SlowInjector {
    async fn inject(&self, _request: &InjectionRequest) -> ApprovalResult<String> {
        tokio::time::sleep(self.delay).await;
        Ok("frame-slow".to_string())
    }
}

/// The human answers before delivery reports failure.
#[derive(Default)]
struct AnsweredThenFailingInjector {
    coordinator: std::sync::OnceLock<Arc<EscalationCoordinator>>,
}

#[async_trait]
impl MessageInjector for AnsweredThenFailingInjector {
    async fn inject(&self, request: &InjectionRequest) -> ApprovalResult<String> {
        let coordinator = self.coordinator.get().unwrap();
        coordinator
            .submit_answer(request.prompt_id.as_str(), "allow_always")
            .unwrap();
        Err(ApprovalError::Injection("delivery receipt lost".to_string()))
    }
}

fn coordinator() -> (EscalationCoordinator, Arc<RecordingInjector>) {
    let injector = Arc::new(RecordingInjector::default());
    let engine = Arc::new(PermissionEngine::in_memory());
    (
        EscalationCoordinator::new(engine, injector.clone()),
        injector,
    )
}

fn agent() -> Subject {
    Subject::agent("claude")
}

fn ls() -> Resource {
    Resource::command("ls")
}

fn ctx() -> EvalContext {
    EvalContext::new().with_session("s-1").with_owner("alice")
}

async fn request(coordinator: &EscalationCoordinator) -> PendingApproval {
    coordinator
        .request_approval(agent(), ls(), ctx(), None)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_request_injects_form() {
    let (coordinator, injector) = coordinator();
    let pending = request(&coordinator).await;

    let requests = injector.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(&requests[0].prompt_id, pending.prompt_id());
    assert_eq!(requests[0].session_id.as_deref(), Some("s-1"));
    assert!(requests[0].markup.contains(pending.prompt_id().as_str()));
    assert!(requests[0].markup.contains(r#"default="deny""#));
    assert_eq!(pending.frame_id(), "frame-1");

    let id = pending.prompt_id().as_str();
    assert!(id.starts_with("perm_"));
    assert!(coordinator.is_pending(id));
    assert_eq!(coordinator.pending_count(), 1);
    assert_eq!(
        coordinator.request_hash(id),
        Some(request_hash(&agent(), &ls()))
    );
}

#[tokio::test]
async fn test_allow_once_creates_no_rule() {
    let (coordinator, _) = coordinator();
    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();

    let receipt = coordinator.submit_answer(&id, "allow_once").unwrap();
    assert_eq!(receipt.answer, ApprovalAnswer::AllowOnce);

    let resolution = pending.await;
    assert_eq!(resolution.action, RuleAction::Allow);
    assert_eq!(resolution.scope, Some(RuleScope::Once));
    assert_eq!(resolution.cause, ResolutionCause::Answered);
    assert!(resolution.rule_id.is_none());
    assert!(coordinator.engine().rules().unwrap().is_empty());
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test]
async fn test_allow_always_stops_reprompting() {
    let (coordinator, _) = coordinator();
    let engine = Arc::clone(coordinator.engine());
    assert!(engine.evaluate(&agent(), &ls(), &ctx()).needs_prompt());

    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();
    coordinator.submit_answer(&id, "allow_always").unwrap();
    let resolution = pending.await;

    assert!(resolution.is_allowed());
    assert_eq!(resolution.scope, Some(RuleScope::Permanent));
    let rules = engine.rules().unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(resolution.rule_id, Some(rules[0].id));
    assert_eq!(rules[0].scope, RuleScope::Permanent);
    assert_eq!(rules[0].session_id, None);
    assert_eq!(rules[0].owner_id.as_deref(), Some("alice"));

    let decision = engine.evaluate(&agent(), &ls(), &ctx());
    assert!(decision.is_allowed());
    // Permanent rules outlive the session they were granted in.
    let later = EvalContext::new().with_session("s-2").with_owner("alice");
    assert!(engine.evaluate(&agent(), &ls(), &later).is_allowed());
}

#[tokio::test]
async fn test_allow_session_binds_rule_to_session() {
    let (coordinator, _) = coordinator();
    let engine = Arc::clone(coordinator.engine());
    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();
    coordinator.submit_answer(&id, "allow_session").unwrap();
    assert!(pending.await.is_allowed());

    let rules = engine.rules().unwrap();
    assert_eq!(rules[0].scope, RuleScope::Session);
    assert_eq!(rules[0].session_id.as_deref(), Some("s-1"));

    assert!(engine.evaluate(&agent(), &ls(), &ctx()).is_allowed());
    let other = EvalContext::new().with_session("s-2").with_owner("alice");
    assert!(engine.evaluate(&agent(), &ls(), &other).needs_prompt());
}

#[tokio::test]
async fn test_rule_failure_still_allows() {
    let (coordinator, _) = coordinator();
    // No session id, so a session rule cannot be created.
    let pending = coordinator
        .request_approval(agent(), ls(), EvalContext::new(), None)
        .await
        .unwrap();
    let id = pending.prompt_id().to_string();

    let receipt = coordinator.submit_answer(&id, "allow_session").unwrap();
    assert!(receipt.resolution.is_allowed());
    assert!(receipt.resolution.rule_id.is_none());
    assert!(pending.await.is_allowed());
    assert!(coordinator.engine().rules().unwrap().is_empty());
}

#[tokio::test]
async fn test_unrecognized_answer_denies() {
    let (coordinator, _) = coordinator();
    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();
    coordinator.submit_answer(&id, "whatever").unwrap();

    let resolution = pending.await;
    assert_eq!(resolution.action, RuleAction::Deny);
    assert_eq!(resolution.scope, Some(RuleScope::Once));
    assert_eq!(resolution.reason.as_deref(), Some("denied by user"));
    assert!(coordinator.engine().rules().unwrap().is_empty());
}

#[tokio::test]
async fn test_second_submit_is_unknown() {
    let (coordinator, _) = coordinator();
    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();

    coordinator.submit_answer(&id, "allow_always").unwrap();
    let err = coordinator.submit_answer(&id, "allow_always").unwrap_err();
    assert!(matches!(err, ApprovalError::UnknownPrompt { ref prompt_id } if *prompt_id == id));
    assert_eq!(coordinator.engine().rules().unwrap().len(), 1);
    assert!(pending.await.is_allowed());
}

#[tokio::test]
async fn test_unknown_prompt_is_rejected() {
    let (coordinator, _) = coordinator();
    assert!(matches!(
        coordinator.submit_answer("perm_nope", "allow_once"),
        Err(ApprovalError::UnknownPrompt { .. })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_answers_resolve_once() {
    let (coordinator, _) = coordinator();
    let coordinator = Arc::new(coordinator);
    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            let id = id.clone();
            tokio::spawn(async move { coordinator.submit_answer(&id, "allow_always").is_ok() })
        })
        .collect();
    let mut outcomes = Vec::new();
    for task in tasks {
        outcomes.push(task.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(coordinator.engine().rules().unwrap().len(), 1);
    assert!(pending.await.is_allowed());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_denies_once() {
    let (coordinator, _) = coordinator();
    let pending = coordinator
        .request_approval(agent(), ls(), ctx(), Some(Duration::from_secs(30)))
        .await
        .unwrap();
    let id = pending.prompt_id().to_string();

    let started = tokio::time::Instant::now();
    let resolution = pending.await;
    assert!(started.elapsed() >= Duration::from_secs(30));
    assert_eq!(resolution.action, RuleAction::Deny);
    assert_eq!(resolution.reason.as_deref(), Some("timed out"));
    assert_eq!(resolution.cause, ResolutionCause::TimedOut);

    assert!(matches!(
        coordinator.submit_answer(&id, "allow_once"),
        Err(ApprovalError::UnknownPrompt { .. })
    ));
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_timeout_is_five_minutes() {
    let (coordinator, _) = coordinator();
    let pending = request(&coordinator).await;

    let started = tokio::time::Instant::now();
    let resolution = pending.await;
    assert_eq!(resolution.cause, ResolutionCause::TimedOut);
    assert!(started.elapsed() >= Duration::from_secs(300));
}

#[tokio::test(start_paused = true)]
async fn test_configured_default_timeout() {
    let (coordinator, _) = coordinator();
    let coordinator = coordinator.with_default_timeout(Duration::from_secs(5));
    let pending = request(&coordinator).await;

    let resolution = tokio::time::timeout(Duration::from_secs(6), pending)
        .await
        .unwrap();
    assert_eq!(resolution.cause, ResolutionCause::TimedOut);
}

#[tokio::test(start_paused = true)]
async fn test_answer_beats_timer() {
    let (coordinator, _) = coordinator();
    let pending = coordinator
        .request_approval(agent(), ls(), ctx(), Some(Duration::from_secs(10)))
        .await
        .unwrap();
    let id = pending.prompt_id().to_string();

    tokio::time::sleep(Duration::from_secs(5)).await;
    coordinator.submit_answer(&id, "allow_once").unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let resolution = pending.await;
    assert_eq!(resolution.cause, ResolutionCause::Answered);
    assert!(resolution.is_allowed());
}

#[tokio::test]
async fn test_cancel_prompt() {
    let (coordinator, _) = coordinator();
    let pending = request(&coordinator).await;
    let id = pending.prompt_id().to_string();

    coordinator.cancel_prompt(&id).unwrap();
    assert!(coordinator.cancel_prompt(&id).is_err());
    assert!(coordinator.submit_answer(&id, "allow_once").is_err());

    let resolution = pending.await;
    assert_eq!(resolution.action, RuleAction::Deny);
    assert_eq!(resolution.reason.as_deref(), Some("cancelled"));
    assert_eq!(resolution.cause, ResolutionCause::Cancelled);
}

#[tokio::test]
async fn test_cancel_session_only_touches_that_session() {
    let (coordinator, _) = coordinator();
    let a = request(&coordinator).await;
    let b = request(&coordinator).await;
    let other = coordinator
        .request_approval(
            agent(),
            ls(),
            EvalContext::new().with_session("s-2"),
            None,
        )
        .await
        .unwrap();

    assert_eq!(coordinator.cancel_session("s-1"), 2);
    assert_eq!(coordinator.cancel_session("s-1"), 0);
    assert_eq!(a.await.cause, ResolutionCause::Cancelled);
    assert_eq!(b.await.cause, ResolutionCause::Cancelled);
    assert!(coordinator.is_pending(other.prompt_id().as_str()));
}

#[tokio::test]
async fn test_injection_failure_leaves_nothing_pending() {
    let engine = Arc::new(PermissionEngine::in_memory());
    let coordinator = EscalationCoordinator::new(engine, Arc::new(FailingInjector));

    let err = coordinator
        .request_approval(agent(), ls(), ctx(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApprovalError::Injection(_)));
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test]
async fn test_custom_prefix_and_shared_store() {
    let shared = Arc::new(PendingPromptStore::new());
    let (coordinator, _) = coordinator();
    let coordinator = coordinator
        .with_prompt_prefix("ask_")
        .with_pending_store(Arc::clone(&shared));

    let pending = request(&coordinator).await;
    assert!(pending.prompt_id().as_str().starts_with("ask_"));
    assert_eq!(coordinator.prompt_prefix(), "ask_");
    assert_eq!(shared.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_request_leaves_nothing_pending() {
    let engine = Arc::new(PermissionEngine::in_memory());
    let coordinator = EscalationCoordinator::new(engine, Arc::new(HangingInjector));

    let gave_up = tokio::time::timeout(
        Duration::from_secs(2),
        coordinator.request_approval(agent(), ls(), ctx(), Some(Duration::from_secs(1))),
    )
    .await
    .is_err();
    assert!(gave_up);
    assert_eq!(coordinator.pending_count(), 0);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_includes_injection_time() {
    let engine = Arc::new(PermissionEngine::in_memory());
    let injector = Arc::new(SlowInjector {
        delay: Duration::from_secs(10),
    });
    let coordinator = EscalationCoordinator::new(engine, injector);

    let started = tokio::time::Instant::now();
    let pending = coordinator
        .request_approval(agent(), ls(), ctx(), Some(Duration::from_secs(1)))
        .await
        .unwrap();
    let resolution = pending.await;

    assert_eq!(resolution.cause, ResolutionCause::TimedOut);
    assert!(started.elapsed() < Duration::from_secs(11));
    assert_eq!(coordinator.pending_count(), 0);
}

#[tokio::test]
async fn test_answer_during_failed_injection_is_kept() {
    let injector = Arc::new(AnsweredThenFailingInjector::default());
    let engine = Arc::new(PermissionEngine::in_memory());
    let coordinator = Arc::new(EscalationCoordinator::new(engine, injector.clone()));
    assert!(injector.coordinator.set(Arc::clone(&coordinator)).is_ok());

    let pending = coordinator
        .request_approval(agent(), ls(), ctx(), None)
        .await
        .unwrap();
    let resolution = pending.await;

    assert!(resolution.is_allowed());
    assert_eq!(resolution.cause, ResolutionCause::Answered);
    assert!(resolution.rule_id.is_some());
    assert_eq!(coordinator.pending_count(), 0);
}
