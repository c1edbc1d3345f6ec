//! MongoDB users.
use std::collections::BTreeMap;

use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::{
    identity::{Identified, PrincipalKind, format_id},
    merge::{ApplyFetched, MergeError, merge_role_refs, refresh_if_declared},
    role_ref::{RoleDbRef, RoleRefState, RoleReference, to_references},
    validation,
};

/// Free-form metadata attached to a user.
pub type CustomData = BTreeMap<String, String>;

/// The mechanisms a user can authenticate with.
///
/// See <https://www.mongodb.com/docs/manual/reference/parameters/#mongodb-parameter-param.authenticationMechanisms>
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Serialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
)]
pub enum Mechanism {
    /// RFC 5802 Salted Challenge Response Authentication Mechanism using
    /// SHA-1.
    #[serde(rename = "SCRAM-SHA-1")]
    #[strum(serialize = "SCRAM-SHA-1")]
    ScramSha1,

    /// RFC 7677 Salted Challenge Response Authentication Mechanism using
    /// SHA-256. Requires the feature compatibility version 4.0.
    #[serde(rename = "SCRAM-SHA-256")]
    #[strum(serialize = "SCRAM-SHA-256")]
    ScramSha256,

    /// TLS client certificates.
    #[serde(rename = "MONGODB-X509")]
    #[strum(serialize = "MONGODB-X509")]
    MongodbX509,

    /// LDAP proxy authentication. Enterprise only.
    #[serde(rename = "PLAIN")]
    #[strum(serialize = "PLAIN")]
    Plain,

    /// Kerberos. Enterprise only.
    #[serde(rename = "GSSAPI")]
    #[strum(serialize = "GSSAPI")]
    Gssapi,
}

/// A user as reported by `usersInfo`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The server-side ID, `<database>.<name>`.
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "user")]
    pub name: String,

    pub db: String,

    #[serde(default)]
    pub custom_data: CustomData,

    #[serde(default)]
    pub roles: Vec<RoleDbRef>,

    #[serde(default)]
    pub mechanisms: Vec<Mechanism>,
}

/// The payload of a `createUser` command.
#[derive(Clone, Educe, Serialize, PartialEq, Eq)]
#[educe(Debug)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(rename = "createUser")]
    pub name: String,

    #[serde(rename = "pwd", skip_serializing_if = "Option::is_none")]
    #[educe(Debug(ignore))]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,

    /// Always sent, an empty list creates a user without roles.
    pub roles: Vec<RoleReference>,

    /// The server picks its default mechanisms when this is empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mechanisms: Vec<Mechanism>,
}

/// The payload of an `updateUser` command. Unset fields are left unchanged.
#[derive(Clone, Educe, Serialize, PartialEq, Eq)]
#[educe(Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(rename = "updateUser")]
    pub name: String,

    #[serde(rename = "pwd", skip_serializing_if = "Option::is_none")]
    #[educe(Debug(ignore))]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,

    /// An empty list removes all roles from the user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleReference>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mechanisms: Option<Vec<Mechanism>>,
}

/// The declarative state of a user.
///
/// `id` is computed from `database` and `name`. The password is never
/// reported back by the server and is kept as declared.
#[derive(Clone, Default, Deserialize, Serialize, Educe, PartialEq, Eq)]
#[educe(Debug)]
pub struct UserState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, rename = "user", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, rename = "db", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, rename = "pwd", skip_serializing_if = "Option::is_none")]
    #[educe(Debug(ignore))]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_data: Option<CustomData>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<RoleRefState>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanisms: Option<Vec<Mechanism>>,
}

impl Identified for UserState {
    const KIND: PrincipalKind = PrincipalKind::User;

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

impl UserState {
    /// Checks the attributes that would be rejected by the server.
    ///
    /// Returns the first invalid attribute along with everything wrong with
    /// it.
    pub fn validate(&self) -> Result<(), (&'static str, validation::Errors)> {
        if let Some(database) = &self.database {
            validation::validate_database_name(database).map_err(|errors| ("db", errors))?;
        }
        for role in self.roles.iter().flatten() {
            validation::validate_role_name(&role.role).map_err(|errors| ("roles", errors))?;
            if let Some(database) = &role.db {
                validation::validate_database_name(database).map_err(|errors| ("roles", errors))?;
            }
        }
        Ok(())
    }

    pub fn to_new_user(&self, name: &str) -> NewUser {
        NewUser {
            name: name.to_owned(),
            password: self.declared_password(),
            custom_data: self.custom_data.clone(),
            roles: self.roles.as_deref().map(to_references).unwrap_or_default(),
            mechanisms: self.mechanisms.clone().unwrap_or_default(),
        }
    }

    pub fn to_update(&self, name: &str) -> UserUpdate {
        UserUpdate {
            name: name.to_owned(),
            password: self.declared_password(),
            custom_data: self.custom_data.clone(),
            roles: self.roles.as_deref().map(to_references),
            mechanisms: self
                .mechanisms
                .clone()
                .filter(|mechanisms| !mechanisms.is_empty()),
        }
    }

    fn declared_password(&self) -> Option<String> {
        self.password
            .clone()
            .filter(|password| !password.is_empty())
    }
}

impl ApplyFetched<User> for UserState {
    fn apply_fetched(&mut self, user: &User) -> Result<(), MergeError> {
        self.id = Some(format_id(&user.name, &user.db));
        self.name = Some(user.name.clone());
        self.database = Some(user.db.clone());

        refresh_if_declared(&mut self.custom_data, |_| {
            Ok::<_, MergeError>(user.custom_data.clone())
        })?;
        refresh_if_declared(&mut self.roles, |declared| {
            merge_role_refs(declared, &user.roles)
        })?;
        refresh_if_declared(&mut self.mechanisms, |_| {
            Ok::<_, MergeError>(user.mechanisms.clone())
        })?;
        Ok(())
    }
}
