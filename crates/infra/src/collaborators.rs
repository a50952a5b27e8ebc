//! External collaborator ports: audit sink and identity directory.
//!
//! Both are injected into the engine as explicit dependencies so it stays
//! testable with fakes; there is no ambient/global sink.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use opsforge_core::UserId;
use opsforge_rbac::AuditEvent;

/// Audit collaborator: notified after every successful mutation.
///
/// Failed mutations are not reported.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

/// Emits audit events as structured log lines.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            action = %event.action,
            resource_type = %event.resource_type,
            resource_id = %event.resource_id,
            actor = %event.actor,
            "audit"
        );
    }
}

/// Collects events for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().expect("audit sink lock poisoned").clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .expect("audit sink lock poisoned")
            .push(event);
    }
}

/// Identity collaborator: confirms that a user id refers to a real user.
///
/// User records are owned outside this engine; this port is consulted before
/// linking a role to a user.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn user_exists(&self, user_id: UserId) -> bool;
}

/// Directory for deployments without an identity backend: every id is
/// accepted, matching the "trust the already-authenticated id" posture.
#[derive(Debug, Default)]
pub struct AllowAllDirectory;

#[async_trait]
impl IdentityDirectory for AllowAllDirectory {
    async fn user_exists(&self, _user_id: UserId) -> bool {
        true
    }
}

/// Fixed set of known users (tests/dev).
#[derive(Debug, Default)]
pub struct StaticDirectory {
    users: HashSet<UserId>,
}

impl StaticDirectory {
    pub fn new(users: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn user_exists(&self, user_id: UserId) -> bool {
        self.users.contains(&user_id)
    }
}
