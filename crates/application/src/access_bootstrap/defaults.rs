use shopfloor_domain::{
    AUDIT_RESOURCE, PermissionAction, PermissionDefinitionInput, PermissionLevel,
    RoleDefinitionInput, RoleLevel, SECURITY_RESOURCE, permission_id,
};

use PermissionAction::{Approve, Create, Delete, Export, Import, Manage, Read, Update};

/// Role granted to the bootstrap administrator.
pub const SUPER_ADMIN_ROLE: &str = "super_admin";

const USER_ROLE: &str = "user";
const MANAGER_ROLE: &str = "manager";
const ADMIN_ROLE: &str = "admin";

const BUSINESS_RESOURCES: [(&str, &str); 5] = [
    ("production", "Production"),
    ("inventory", "Inventory"),
    ("costs", "Costs"),
    ("master_data", "Master data"),
    ("reports", "Reports"),
];

fn level_for(action: PermissionAction) -> PermissionLevel {
    match action {
        Read => PermissionLevel::Basic,
        Create | Update | Export => PermissionLevel::Advanced,
        Delete | Import | Approve => PermissionLevel::Administrative,
        Manage => PermissionLevel::System,
    }
}

fn business_actions(resource: &str) -> &'static [PermissionAction] {
    match resource {
        "reports" => &[Read, Create, Export],
        "costs" => &[Read, Create, Update, Delete, Export, Approve],
        _ => &[Read, Create, Update, Delete, Export, Import],
    }
}

pub(super) fn permissions() -> Vec<PermissionDefinitionInput> {
    let mut inputs = Vec::new();
    for (resource, label) in BUSINESS_RESOURCES {
        for action in business_actions(resource) {
            inputs.push(PermissionDefinitionInput {
                resource: resource.to_owned(),
                action: *action,
                description: format!("{} {}", action.as_str(), label.to_lowercase()),
                category: resource.to_owned(),
                level: level_for(*action),
                conditions: Vec::new(),
            });
        }
    }

    let administrative = [
        (SECURITY_RESOURCE, Manage, "manage roles, grants and the permission catalog"),
        (AUDIT_RESOURCE, Read, "read the audit log"),
        (AUDIT_RESOURCE, Export, "export the audit log"),
        (AUDIT_RESOURCE, Manage, "purge the audit log"),
    ];
    for (resource, action, description) in administrative {
        inputs.push(PermissionDefinitionInput {
            resource: resource.to_owned(),
            action,
            description: description.to_owned(),
            category: "administration".to_owned(),
            level: PermissionLevel::System,
            conditions: Vec::new(),
        });
    }

    inputs
}

fn ids(resources: &[&str], actions: &[PermissionAction]) -> Vec<String> {
    resources
        .iter()
        .flat_map(|resource| {
            actions
                .iter()
                .filter(move |action| business_actions(resource).contains(action))
                .map(move |action| permission_id(resource, *action))
        })
        .collect()
}

pub(super) fn roles() -> Vec<RoleDefinitionInput> {
    let resources: Vec<&str> = BUSINESS_RESOURCES
        .iter()
        .map(|(resource, _)| *resource)
        .collect();

    let mut admin_permissions = ids(&resources, &[Delete, Import]);
    admin_permissions.push(permission_id(SECURITY_RESOURCE, Manage));
    admin_permissions.push(permission_id(AUDIT_RESOURCE, Read));

    vec![
        RoleDefinitionInput {
            role_id: USER_ROLE.to_owned(),
            display_name: "User".to_owned(),
            description: "Reads operational data".to_owned(),
            level: RoleLevel::User,
            permissions: ids(&resources, &[Read]),
            inherits_from: Vec::new(),
            is_system: false,
        },
        RoleDefinitionInput {
            role_id: MANAGER_ROLE.to_owned(),
            display_name: "Manager".to_owned(),
            description: "Maintains operational data and approves costs".to_owned(),
            level: RoleLevel::Manager,
            permissions: ids(&resources, &[Create, Update, Export, Approve]),
            inherits_from: vec![USER_ROLE.to_owned()],
            is_system: false,
        },
        RoleDefinitionInput {
            role_id: ADMIN_ROLE.to_owned(),
            display_name: "Administrator".to_owned(),
            description: "Deletes and imports data and administers access".to_owned(),
            level: RoleLevel::Admin,
            permissions: admin_permissions,
            inherits_from: vec![MANAGER_ROLE.to_owned()],
            is_system: false,
        },
        RoleDefinitionInput {
            role_id: SUPER_ADMIN_ROLE.to_owned(),
            display_name: "Super administrator".to_owned(),
            description: "Full access including audit export and retention".to_owned(),
            level: RoleLevel::SuperAdmin,
            permissions: vec![
                permission_id(AUDIT_RESOURCE, Export),
                permission_id(AUDIT_RESOURCE, Manage),
            ],
            inherits_from: vec![ADMIN_ROLE.to_owned()],
            is_system: true,
        },
    ]
}
