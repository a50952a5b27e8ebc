//! Audit event model.
//!
//! Every successful mutation is reported to the audit collaborator with the
//! acting user, the affected resource, and before/after snapshots where
//! applicable. Failed mutations are not reported.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsforge_core::UserId;

/// Action names reported to the audit collaborator.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PermissionCreated,
    PermissionUpdated,
    PermissionDeleted,
    RoleCreated,
    RoleUpdated,
    RoleDeleted,
    RolePermissionAssigned,
    RolePermissionRemoved,
    UserRoleAssigned,
    UserRoleRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PermissionCreated => "PERMISSION_CREATED",
            AuditAction::PermissionUpdated => "PERMISSION_UPDATED",
            AuditAction::PermissionDeleted => "PERMISSION_DELETED",
            AuditAction::RoleCreated => "ROLE_CREATED",
            AuditAction::RoleUpdated => "ROLE_UPDATED",
            AuditAction::RoleDeleted => "ROLE_DELETED",
            AuditAction::RolePermissionAssigned => "ROLE_PERMISSION_ASSIGNED",
            AuditAction::RolePermissionRemoved => "ROLE_PERMISSION_REMOVED",
            AuditAction::UserRoleAssigned => "USER_ROLE_ASSIGNED",
            AuditAction::UserRoleRemoved => "USER_ROLE_REMOVED",
        }
    }
}

impl core::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    /// Resource class the mutation touched ("permission", "role",
    /// "role_permission", "user_role").
    pub resource_type: String,
    /// Identifier of the touched resource; for links, "roleId:permissionId"
    /// or "userId:roleId".
    pub resource_id: String,
    /// The authenticated user the identity collaborator supplied.
    pub actor: UserId,
    /// Snapshot before the mutation (updates/deletes).
    pub before: Option<serde_json::Value>,
    /// Snapshot after the mutation (creates/updates).
    pub after: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actor: UserId,
    ) -> Self {
        Self {
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            actor,
            before: None,
            after: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_before(mut self, before: serde_json::Value) -> Self {
        self.before = Some(before);
        self
    }

    pub fn with_after(mut self, after: serde_json::Value) -> Self {
        self.after = Some(after);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_are_stable() {
        assert_eq!(AuditAction::PermissionUpdated.as_str(), "PERMISSION_UPDATED");
        assert_eq!(
            serde_json::to_value(AuditAction::UserRoleAssigned).unwrap(),
            serde_json::json!("USER_ROLE_ASSIGNED")
        );
    }

    #[test]
    fn snapshots_attach() {
        let event = AuditEvent::new(
            AuditAction::RoleDeleted,
            "role",
            "some-id",
            UserId::new(),
        )
        .with_before(serde_json::json!({"name": "editor"}));

        assert!(event.before.is_some());
        assert!(event.after.is_none());
    }
}
