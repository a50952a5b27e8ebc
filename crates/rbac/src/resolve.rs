//! Effective-permission computation.
//!
//! Pure set math over current relational state. There is no caching layer:
//! every resolution reflects the associations the caller just loaded.

use std::collections::HashSet;

use serde::Serialize;

use opsforge_core::PermissionId;

use crate::permission::Permission;
use crate::role::RoleWithPermissions;

/// The deduplicated union of permissions across all roles a user holds.
///
/// Derived at query time, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectivePermissionSet {
    permissions: Vec<Permission>,
}

impl EffectivePermissionSet {
    /// Union the permission lists of the given roles, deduplicated by
    /// permission identity. Empty input yields the empty set.
    pub fn from_roles(roles: &[RoleWithPermissions]) -> Self {
        let mut seen: HashSet<PermissionId> = HashSet::new();
        let mut permissions = Vec::new();
        for role in roles {
            for perm in &role.permissions {
                if seen.insert(perm.id) {
                    permissions.push(perm.clone());
                }
            }
        }
        Self { permissions }
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn contains(&self, id: PermissionId) -> bool {
        self.permissions.iter().any(|p| p.id == id)
    }

    /// Exact (resource type, action) lookup. No wildcard or partial matching.
    pub fn find_by_action(&self, resource_type: &str, action: &str) -> Option<&Permission> {
        self.permissions
            .iter()
            .find(|p| p.allows(resource_type, action))
    }

    /// Point query by permission identity, with a denial explanation.
    pub fn check_id(&self, id: PermissionId) -> AccessDecision {
        if self.contains(id) {
            AccessDecision::granted()
        } else {
            AccessDecision::denied(format!(
                "permission {id} is not granted by any role the user holds"
            ))
        }
    }

    /// Point query by (resource type, action), with a denial explanation.
    pub fn check_action(&self, resource_type: &str, action: &str) -> AccessDecision {
        if self.find_by_action(resource_type, action).is_some() {
            AccessDecision::granted()
        } else {
            AccessDecision::denied(format!(
                "no role held by the user grants action '{action}' on resource type '{resource_type}'"
            ))
        }
    }
}

/// Outcome of a point authorization query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub granted: bool,
    /// Human-readable denial explanation; `None` when granted.
    pub reason: Option<String>,
}

impl AccessDecision {
    pub fn granted() -> Self {
        Self {
            granted: true,
            reason: None,
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            reason: Some(reason.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionDraft;
    use crate::role::{Role, RoleDraft};

    fn perm(name: &str, resource: &str, action: &str) -> Permission {
        Permission::new(PermissionDraft {
            name: name.to_string(),
            description: None,
            resource_type: resource.to_string(),
            action: action.to_string(),
        })
        .unwrap()
    }

    fn role(name: &str, permissions: Vec<Permission>) -> RoleWithPermissions {
        RoleWithPermissions {
            role: Role::new(RoleDraft {
                name: name.to_string(),
                description: None,
            })
            .unwrap(),
            permissions,
        }
    }

    #[test]
    fn union_deduplicates_shared_permissions() {
        let a = perm("a", "DOCUMENT", "READ");
        let b = perm("b", "DOCUMENT", "WRITE");
        let c = perm("c", "INVOICE", "READ");

        // R1 grants {A, B}, R2 grants {B, C} => effective is exactly {A, B, C}.
        let roles = vec![
            role("r1", vec![a.clone(), b.clone()]),
            role("r2", vec![b.clone(), c.clone()]),
        ];

        let effective = EffectivePermissionSet::from_roles(&roles);
        assert_eq!(effective.len(), 3);
        assert!(effective.contains(a.id));
        assert!(effective.contains(b.id));
        assert!(effective.contains(c.id));
    }

    #[test]
    fn no_roles_means_empty_set() {
        let effective = EffectivePermissionSet::from_roles(&[]);
        assert!(effective.is_empty());
    }

    #[test]
    fn check_action_requires_exact_match() {
        let effective =
            EffectivePermissionSet::from_roles(&[role("r", vec![perm("p", "DOCUMENT", "READ")])]);

        assert!(effective.check_action("DOCUMENT", "READ").granted);

        let denied = effective.check_action("DOCUMENT", "DELETE");
        assert!(!denied.granted);
        let reason = denied.reason.unwrap();
        assert!(reason.contains("DELETE"));
        assert!(reason.contains("DOCUMENT"));
    }

    #[test]
    fn check_id_denies_unknown_permission() {
        let effective = EffectivePermissionSet::from_roles(&[]);
        let decision = effective.check_id(opsforge_core::PermissionId::new());
        assert!(!decision.granted);
        assert!(decision.reason.is_some());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The effective set equals the deduplicated union of the per-role
            /// permission lists, regardless of how permissions fan out.
            #[test]
            fn union_matches_naive_dedup(assignment in proptest::collection::vec(
                proptest::collection::vec(0usize..8, 0..6),
                0..5,
            )) {
                let pool: Vec<Permission> = (0..8)
                    .map(|i| perm(&format!("perm-{i}"), "DOCUMENT", &format!("ACTION_{i}")))
                    .collect();

                let roles: Vec<RoleWithPermissions> = assignment
                    .iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        role(
                            &format!("role-{i}"),
                            picks.iter().map(|&p| pool[p].clone()).collect(),
                        )
                    })
                    .collect();

                let effective = EffectivePermissionSet::from_roles(&roles);

                let expected: std::collections::HashSet<_> = assignment
                    .iter()
                    .flatten()
                    .map(|&p| pool[p].id)
                    .collect();

                let actual: std::collections::HashSet<_> =
                    effective.permissions().iter().map(|p| p.id).collect();

                prop_assert_eq!(actual, expected);
                // No duplicates survive the union.
                prop_assert_eq!(effective.len(), effective.permissions().iter().map(|p| p.id).collect::<std::collections::HashSet<_>>().len());
            }
        }
    }
}
