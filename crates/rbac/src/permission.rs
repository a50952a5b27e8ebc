//! Permission entity: an atomic allowed (resource type, action) pair.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use opsforge_core::{Entity, PermissionId};

use crate::error::{RbacError, RbacResult};

const MAX_NAME_LEN: usize = 128;

/// A single allowed operation on a resource class.
///
/// `name` is globally unique (e.g. "read:documents"); `resource_type` and
/// `action` identify what the permission allows (e.g. "DOCUMENT" / "READ").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to create a permission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDraft {
    pub name: String,
    pub description: Option<String>,
    pub resource_type: String,
    pub action: String,
}

/// Partial update: `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub resource_type: Option<String>,
    pub action: Option<String>,
}

impl PermissionPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.resource_type.is_none()
            && self.action.is_none()
    }
}

impl Permission {
    /// Validate a draft and mint a new permission with a fresh id.
    pub fn new(draft: PermissionDraft) -> RbacResult<Self> {
        let now = Utc::now();
        Ok(Self {
            id: PermissionId::new(),
            name: validate_name(&draft.name)?,
            description: draft.description,
            resource_type: normalize_selector("resource_type", &draft.resource_type)?,
            action: normalize_selector("action", &draft.action)?,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update, bumping `updated_at`.
    ///
    /// Uniqueness of the new name is not checked here; the store's unique
    /// index is the authority on collisions.
    pub fn apply(&mut self, patch: PermissionPatch) -> RbacResult<()> {
        if let Some(name) = patch.name {
            self.name = validate_name(&name)?;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(resource_type) = patch.resource_type {
            self.resource_type = normalize_selector("resource_type", &resource_type)?;
        }
        if let Some(action) = patch.action {
            self.action = normalize_selector("action", &action)?;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Exact (resource type, action) match. No wildcards, no partial matches.
    pub fn allows(&self, resource_type: &str, action: &str) -> bool {
        self.resource_type == resource_type && self.action == action
    }
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> &PermissionId {
        &self.id
    }
}

/// Validate a unique entity name: trimmed, non-empty, bounded.
pub(crate) fn validate_name(raw: &str) -> RbacResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(RbacError::validation("name must not be empty"));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(RbacError::validation(format!(
            "name exceeds {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// Normalize a resource-type/action selector to UPPER_SNAKE.
///
/// Matching in the resolver is exact string equality, so every selector,
/// stored or queried, must go through this normalization.
pub fn normalize_selector(field: &str, raw: &str) -> RbacResult<String> {
    let value = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
    if value.is_empty() {
        return Err(RbacError::validation(format!("{field} must not be empty")));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(RbacError::validation(format!(
            "{field} may only contain letters, digits and underscores: '{raw}'"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> PermissionDraft {
        PermissionDraft {
            name: "read:documents".to_string(),
            description: Some("Read any document".to_string()),
            resource_type: "document".to_string(),
            action: "read".to_string(),
        }
    }

    #[test]
    fn new_normalizes_selectors() {
        let perm = Permission::new(draft()).unwrap();
        assert_eq!(perm.resource_type, "DOCUMENT");
        assert_eq!(perm.action, "READ");
        assert!(perm.allows("DOCUMENT", "READ"));
        assert!(!perm.allows("DOCUMENT", "WRITE"));
    }

    #[test]
    fn empty_name_rejected() {
        let mut d = draft();
        d.name = "   ".to_string();
        assert!(matches!(
            Permission::new(d),
            Err(RbacError::Validation(_))
        ));
    }

    #[test]
    fn selector_with_punctuation_rejected() {
        let mut d = draft();
        d.action = "re@d".to_string();
        assert!(matches!(Permission::new(d), Err(RbacError::Validation(_))));
    }

    #[test]
    fn patch_updates_only_provided_fields() {
        let mut perm = Permission::new(draft()).unwrap();
        let before = perm.clone();

        perm.apply(PermissionPatch {
            action: Some("write".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(perm.name, before.name);
        assert_eq!(perm.resource_type, before.resource_type);
        assert_eq!(perm.action, "WRITE");
        assert!(perm.updated_at >= before.updated_at);
    }

    #[test]
    fn patch_can_clear_description() {
        let mut perm = Permission::new(draft()).unwrap();
        perm.apply(PermissionPatch {
            description: Some(None),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(perm.description, None);
    }
}
