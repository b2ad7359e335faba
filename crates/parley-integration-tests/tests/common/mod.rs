//! Shared test harness for integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use parley_approval::{
    ApprovalResult, EscalationCoordinator, InjectionRequest, MemoryAuditSink, MemoryRuleStore,
    MessageInjector, PermissionEngine,
};

/// Injector that records every approval form it is asked to deliver.
#[derive(Default)]
pub struct ChatInjector {
    requests: Mutex<Vec<InjectionRequest>>,
}

#[allow(dead_code)]
impl ChatInjector {
    /// Every form delivered so far.
    pub fn requests(&self) -> Vec<InjectionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Prompt id of the most recent form.
    pub fn last_prompt(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.prompt_id.to_string())
            .expect("no approval form delivered")
    }
}

#[async_trait]
impl MessageInjector for ChatInjector {
    async fn inject(&self, request: &InjectionRequest) -> ApprovalResult<String> {
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("msg-{}", requests.len()))
    }
}

/// Engine, audit trail, injector and coordinator wired together.
#[allow(dead_code)]
pub struct Hub {
    /// The permission engine shared with the coordinator.
    pub engine: Arc<PermissionEngine>,
    /// Every decision the engine made.
    pub audit: Arc<MemoryAuditSink>,
    /// The chat the approval forms land in.
    pub chat: Arc<ChatInjector>,
    /// The escalation coordinator.
    pub coordinator: Arc<EscalationCoordinator>,
}

#[allow(dead_code)]
impl Hub {
    /// Build a hub with an empty rule store.
    pub fn new() -> Self {
        let audit = Arc::new(MemoryAuditSink::new());
        let engine = Arc::new(PermissionEngine::new(
            Arc::new(MemoryRuleStore::new()),
            audit.clone(),
        ));
        let chat = Arc::new(ChatInjector::default());
        let coordinator = Arc::new(EscalationCoordinator::new(
            Arc::clone(&engine),
            chat.clone(),
        ));
        Self {
            engine,
            audit,
            chat,
            coordinator,
        }
    }
}
