//! MongoDB roles.
use serde::{Deserialize, Serialize};

use crate::{
    identity::{Identified, PrincipalKind, format_id},
    merge::{ApplyFetched, MergeError, decode_privileges, merge_role_refs, refresh_if_declared},
    privilege::{Privilege, PrivilegeConfigError, PrivilegeDocument, PrivilegeState, to_privileges},
    role_ref::{RoleDbRef, RoleRefState, RoleReference, to_references},
    validation,
};

/// A role as reported by `rolesInfo` with privileges shown.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "role")]
    pub name: String,

    pub db: String,

    #[serde(default)]
    pub privileges: Vec<PrivilegeDocument>,

    #[serde(default)]
    pub is_builtin: bool,

    #[serde(default)]
    pub roles: Vec<RoleDbRef>,

    #[serde(default)]
    pub inherited_roles: Vec<RoleDbRef>,

    #[serde(default)]
    pub inherited_privileges: Vec<PrivilegeDocument>,
}

/// The payload of a `createRole` command.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct NewRole {
    #[serde(rename = "createRole")]
    pub name: String,

    /// Always sent, the server requires the field even when empty.
    pub privileges: Vec<Privilege>,

    /// Always sent, the server requires the field even when empty.
    pub roles: Vec<RoleReference>,
}

/// The payload of an `updateRole` command. Unset fields are left unchanged,
/// empty lists remove everything.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RoleUpdate {
    #[serde(rename = "updateRole")]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub privileges: Option<Vec<Privilege>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleReference>>,
}

/// Server-computed attributes of a role. Never part of a write.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleStatus {
    pub builtin: bool,

    /// Every role this role inherits from, directly or transitively.
    pub inherited_roles: Vec<RoleDbRef>,

    /// Every privilege this role grants, including inherited ones.
    pub inherited_privileges: Vec<PrivilegeState>,
}

/// The declarative state of a role.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, rename = "role", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, rename = "db", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleRefState>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileges: Option<Vec<PrivilegeState>>,

    /// Replaced on every read, ignored on writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RoleStatus>,
}

impl Identified for RoleState {
    const KIND: PrincipalKind = PrincipalKind::Role;

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl RoleState {
    /// Checks the attributes that would be rejected by the server.
    pub fn validate(&self) -> Result<(), (&'static str, validation::Errors)> {
        if let Some(name) = &self.name {
            validation::validate_role_name(name).map_err(|errors| ("role", errors))?;
        }
        if let Some(database) = &self.database {
            validation::validate_role_database_name(database).map_err(|errors| ("db", errors))?;
        }
        for role in self.roles.iter().flatten() {
            validation::validate_role_name(&role.role).map_err(|errors| ("roles", errors))?;
            if let Some(database) = &role.db {
                validation::validate_database_name(database).map_err(|errors| ("roles", errors))?;
            }
        }
        for privilege in self.privileges.iter().flatten() {
            if let Some(database) = &privilege.resource.db {
                validation::validate_optional_database_name(database)
                    .map_err(|errors| ("privileges", errors))?;
            }
        }
        Ok(())
    }

    pub fn to_new_role(&self, name: &str) -> Result<NewRole, PrivilegeConfigError> {
        Ok(NewRole {
            name: name.to_owned(),
            privileges: self
                .privileges
                .as_deref()
                .map(to_privileges)
                .transpose()?
                .unwrap_or_default(),
            roles: self.roles.as_deref().map(to_references).unwrap_or_default(),
        })
    }

    pub fn to_update(&self, name: &str) -> Result<RoleUpdate, PrivilegeConfigError> {
        Ok(RoleUpdate {
            name: name.to_owned(),
            privileges: self.privileges.as_deref().map(to_privileges).transpose()?,
            roles: self.roles.as_deref().map(to_references),
        })
    }
}

impl RoleStatus {
    fn fetched(role: &Role) -> Result<Self, MergeError> {
        Ok(Self {
            builtin: role.is_builtin,
            inherited_roles: role.inherited_roles.clone(),
            inherited_privileges: decode_privileges(&role.inherited_privileges)?,
        })
    }
}

impl ApplyFetched<Role> for RoleState {
    fn apply_fetched(&mut self, role: &Role) -> Result<(), MergeError> {
        self.id = Some(format_id(&role.name, &role.db));
        self.name = Some(role.name.clone());
        self.database = Some(role.db.clone());

        refresh_if_declared(&mut self.roles, |declared| {
            merge_role_refs(declared, &role.roles)
        })?;
        refresh_if_declared(&mut self.privileges, |_| decode_privileges(&role.privileges))?;
        self.status = Some(RoleStatus::fetched(role)?);
        Ok(())
    }
}
