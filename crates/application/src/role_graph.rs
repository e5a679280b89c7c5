use std::collections::{HashMap, HashSet, VecDeque};

use shopfloor_core::{AppError, AppResult};
use shopfloor_domain::{PermissionDefinition, RoleDefinition};

use crate::access_ports::AccessRepositories;

/// Permission reached while expanding a role, with the role that holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPermission {
    /// Role that directly attaches the permission.
    pub role_id: String,
    /// Catalog entry.
    pub permission: PermissionDefinition,
}

/// Catalog integrity finding surfaced outside the check path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleIntegrityIssue {
    /// A role references a permission missing from the catalog.
    UnknownPermission {
        /// Referencing role.
        role_id: String,
        /// Missing permission identifier.
        permission_id: String,
    },
    /// A role inherits from a role that does not exist.
    UnknownParent {
        /// Referencing role.
        role_id: String,
        /// Missing parent identifier.
        parent_id: String,
    },
    /// A role can reach itself through its parents.
    InheritanceCycle {
        /// Role on the cycle.
        role_id: String,
    },
}

impl RoleIntegrityIssue {
    /// Returns a human-readable description.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::UnknownPermission {
                role_id,
                permission_id,
            } => format!("role '{role_id}' references unknown permission '{permission_id}'"),
            Self::UnknownParent { role_id, parent_id } => {
                format!("role '{role_id}' inherits from unknown role '{parent_id}'")
            }
            Self::InheritanceCycle { role_id } => {
                format!("role '{role_id}' participates in an inheritance cycle")
            }
        }
    }
}

/// Snapshot of roles and the permission catalog, indexed for resolution.
///
/// Roles live in an arena addressed by position; inheritance edges are
/// resolved to arena indices once at construction.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    roles: Vec<RoleDefinition>,
    parents: Vec<Vec<usize>>,
    index: HashMap<String, usize>,
    permissions: HashMap<String, PermissionDefinition>,
}

impl RoleGraph {
    /// Builds a graph from stored roles and catalog entries.
    #[must_use]
    pub fn new(roles: Vec<RoleDefinition>, catalog: Vec<PermissionDefinition>) -> Self {
        let mut index = HashMap::with_capacity(roles.len());
        let mut arena = Vec::with_capacity(roles.len());
        for role in roles {
            if index.contains_key(role.role_id()) {
                tracing::warn!(role_id = role.role_id(), "ignoring duplicate role definition");
                continue;
            }
            index.insert(role.role_id().to_owned(), arena.len());
            arena.push(role);
        }

        let parents = arena
            .iter()
            .map(|role| {
                role.inherits_from()
                    .iter()
                    .filter_map(|parent_id| index.get(parent_id).copied())
                    .collect()
            })
            .collect();

        let permissions = catalog
            .into_iter()
            .map(|permission| (permission.permission_id(), permission))
            .collect();

        Self {
            roles: arena,
            parents,
            index,
            permissions,
        }
    }

    /// Loads a fresh snapshot from the stores.
    pub async fn load(repositories: &AccessRepositories) -> AppResult<Self> {
        let roles = repositories.roles.list_roles().await?;
        let catalog = repositories.catalog.list_permissions().await?;
        Ok(Self::new(roles, catalog))
    }

    /// Finds a role by identifier.
    #[must_use]
    pub fn role(&self, role_id: &str) -> Option<&RoleDefinition> {
        self.index.get(role_id).map(|position| &self.roles[*position])
    }

    /// Finds a catalog entry by identifier.
    #[must_use]
    pub fn permission(&self, permission_id: &str) -> Option<&PermissionDefinition> {
        self.permissions.get(permission_id)
    }

    /// Returns every role in insertion order.
    #[must_use]
    pub fn roles(&self) -> &[RoleDefinition] {
        &self.roles
    }

    /// Returns active roles reachable from `role_id`, breadth-first, starting with itself.
    ///
    /// Inactive roles are neither included nor expanded. Each role appears
    /// at most once, so cyclic inheritance terminates.
    #[must_use]
    pub fn reachable_roles(&self, role_id: &str) -> Vec<&RoleDefinition> {
        let Some(&start) = self.index.get(role_id) else {
            tracing::debug!(role_id, "skipping unknown role during resolution");
            return Vec::new();
        };

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut reachable = Vec::new();

        while let Some(position) = queue.pop_front() {
            let role = &self.roles[position];
            if !role.is_active() {
                continue;
            }

            reachable.push(role);
            for parent in &self.parents[position] {
                if visited.insert(*parent) {
                    queue.push_back(*parent);
                }
            }
        }

        reachable
    }

    /// Resolves the union of permissions reachable from `role_id`.
    ///
    /// Order is breadth-first over roles, then permission identifier order
    /// within a role. Each permission is reported once, attributed to the
    /// first role that attaches it. References missing from the catalog are
    /// skipped.
    #[must_use]
    pub fn resolve(&self, role_id: &str) -> Vec<ResolvedPermission> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::new();

        for role in self.reachable_roles(role_id) {
            for permission_id in role.permissions() {
                if !seen.insert(permission_id.as_str()) {
                    continue;
                }

                match self.permissions.get(permission_id) {
                    Some(permission) => resolved.push(ResolvedPermission {
                        role_id: role.role_id().to_owned(),
                        permission: permission.clone(),
                    }),
                    None => tracing::debug!(
                        role_id = role.role_id(),
                        permission_id = permission_id.as_str(),
                        "skipping unknown permission reference"
                    ),
                }
            }
        }

        resolved
    }

    /// Rejects a new or replacement role whose references are unknown or
    /// whose parents would close an inheritance cycle.
    pub fn validate(&self, candidate: &RoleDefinition) -> AppResult<()> {
        let candidate_id = candidate.role_id();

        for parent_id in candidate.inherits_from() {
            if parent_id == candidate_id {
                return Err(AppError::Validation(format!(
                    "role '{candidate_id}' cannot inherit from itself"
                )));
            }
            if !self.index.contains_key(parent_id) {
                return Err(AppError::Validation(format!(
                    "role '{candidate_id}' inherits from unknown role '{parent_id}'"
                )));
            }
        }

        if let Some(permission_id) = candidate
            .permissions()
            .iter()
            .find(|permission_id| !self.permissions.contains_key(permission_id.as_str()))
        {
            return Err(AppError::Validation(format!(
                "role '{candidate_id}' references unknown permission '{permission_id}'"
            )));
        }

        if self.parents_reach(candidate, candidate_id) {
            return Err(AppError::Validation(format!(
                "role '{candidate_id}' would create an inheritance cycle"
            )));
        }

        Ok(())
    }

    /// Lists dangling references and roles sitting on inheritance cycles.
    #[must_use]
    pub fn integrity_issues(&self) -> Vec<RoleIntegrityIssue> {
        let mut issues = Vec::new();

        for role in &self.roles {
            let role_id = role.role_id();
            for permission_id in role.permissions() {
                if !self.permissions.contains_key(permission_id) {
                    issues.push(RoleIntegrityIssue::UnknownPermission {
                        role_id: role_id.to_owned(),
                        permission_id: permission_id.clone(),
                    });
                }
            }
            for parent_id in role.inherits_from() {
                if !self.index.contains_key(parent_id) {
                    issues.push(RoleIntegrityIssue::UnknownParent {
                        role_id: role_id.to_owned(),
                        parent_id: parent_id.clone(),
                    });
                }
            }
            if self.parents_reach(role, role_id) {
                issues.push(RoleIntegrityIssue::InheritanceCycle {
                    role_id: role_id.to_owned(),
                });
            }
        }

        issues.sort();
        issues
    }

    /// Returns whether `target` is reachable from the parents of `role`,
    /// with `role` taking the place of any stored role sharing its id.
    fn parents_reach(&self, role: &RoleDefinition, target: &str) -> bool {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = role.inherits_from().iter().map(String::as_str).collect();

        while let Some(current) = queue.pop_front() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }

            let parents = if current == role.role_id() {
                role.inherits_from()
            } else {
                match self.role(current) {
                    Some(stored) => stored.inherits_from(),
                    None => continue,
                }
            };
            queue.extend(parents.iter().map(String::as_str));
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use shopfloor_domain::{
        PermissionAction, PermissionDefinition, PermissionDefinitionInput, PermissionLevel,
        RoleDefinition, RoleDefinitionInput, RoleLevel,
    };

    use super::{RoleGraph, RoleIntegrityIssue};

    fn permission(resource: &str, action: PermissionAction) -> PermissionDefinition {
        let result = PermissionDefinition::new(PermissionDefinitionInput {
            resource: resource.to_owned(),
            action,
            description: String::new(),
            category: "operations".to_owned(),
            level: PermissionLevel::Basic,
            conditions: Vec::new(),
        });
        result.unwrap_or_else(|_| unreachable!())
    }

    fn role(role_id: &str, permissions: &[&str], parents: &[&str]) -> RoleDefinition {
        let result = RoleDefinition::new(
            RoleDefinitionInput {
                role_id: role_id.to_owned(),
                display_name: String::new(),
                description: String::new(),
                level: RoleLevel::User,
                permissions: permissions.iter().map(|id| (*id).to_owned()).collect(),
                inherits_from: parents.iter().map(|id| (*id).to_owned()).collect(),
                is_system: false,
            },
            Utc::now(),
        );
        result.unwrap_or_else(|_| unreachable!())
    }

    fn catalog() -> Vec<PermissionDefinition> {
        vec![
            permission("production", PermissionAction::Read),
            permission("production", PermissionAction::Delete),
            permission("inventory", PermissionAction::Read),
        ]
    }

    #[test]
    fn mutual_inheritance_resolves_union_once() {
        let graph = RoleGraph::new(
            vec![
                role("a", &["production:read"], &["b"]),
                role("b", &["inventory:read"], &["a"]),
            ],
            catalog(),
        );

        for start in ["a", "b"] {
            let mut permission_ids: Vec<String> = graph
                .resolve(start)
                .into_iter()
                .map(|resolved| resolved.permission.permission_id())
                .collect();
            permission_ids.sort();
            assert_eq!(
                permission_ids,
                vec!["inventory:read".to_owned(), "production:read".to_owned()]
            );
        }
    }

    #[test]
    fn resolution_is_breadth_first_and_attributed() {
        let graph = RoleGraph::new(
            vec![
                role("manager", &["production:delete"], &["user"]),
                role("user", &["production:read", "production:delete"], &[]),
            ],
            catalog(),
        );

        let resolved = graph.resolve("manager");
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].role_id, "manager");
        assert_eq!(resolved[0].permission.permission_id(), "production:delete");
        assert_eq!(resolved[1].role_id, "user");
        assert_eq!(resolved[1].permission.permission_id(), "production:read");
    }

    #[test]
    fn inactive_roles_contribute_nothing() {
        let inactive = role("user", &["production:read"], &[]).deactivated(Utc::now());
        let graph = RoleGraph::new(
            vec![role("manager", &["inventory:read"], &["user"]), inactive],
            catalog(),
        );

        let resolved = graph.resolve("manager");
        assert_eq!(resolved.len(), 1);
        assert!(graph.resolve("user").is_empty());
    }

    #[test]
    fn dangling_references_are_skipped() {
        let graph = RoleGraph::new(
            vec![role("manager", &["production:read", "ghost:read"], &["missing"])],
            catalog(),
        );

        let resolved = graph.resolve("manager");
        assert_eq!(resolved.len(), 1);
        assert!(graph.resolve("unknown").is_empty());
    }

    #[test]
    fn validate_rejects_cycle_closing_edges() {
        let graph = RoleGraph::new(
            vec![role("a", &[], &["b"]), role("b", &[], &[])],
            catalog(),
        );

        assert!(graph.validate(&role("b", &[], &["a"])).is_err());
        assert!(graph.validate(&role("c", &[], &["a"])).is_ok());
    }

    #[test]
    fn validate_rejects_unknown_references() {
        let graph = RoleGraph::new(vec![role("a", &[], &[])], catalog());

        assert!(graph.validate(&role("c", &[], &["nope"])).is_err());
        assert!(graph.validate(&role("c", &["ghost:read"], &[])).is_err());
        assert!(graph.validate(&role("c", &["production:read"], &["a"])).is_ok());
    }

    #[test]
    fn integrity_issues_report_cycles_and_dangling_references() {
        let graph = RoleGraph::new(
            vec![
                role("a", &["ghost:read"], &["b"]),
                role("b", &[], &["a", "missing"]),
            ],
            catalog(),
        );

        let issues = graph.integrity_issues();
        assert!(issues.contains(&RoleIntegrityIssue::UnknownPermission {
            role_id: "a".to_owned(),
            permission_id: "ghost:read".to_owned(),
        }));
        assert!(issues.contains(&RoleIntegrityIssue::UnknownParent {
            role_id: "b".to_owned(),
            parent_id: "missing".to_owned(),
        }));
        assert!(issues.contains(&RoleIntegrityIssue::InheritanceCycle {
            role_id: "a".to_owned(),
        }));
        assert!(issues.contains(&RoleIntegrityIssue::InheritanceCycle {
            role_id: "b".to_owned(),
        }));
    }
}
