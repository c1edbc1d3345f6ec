//! References from users and roles to the roles they inherit.
use std::{borrow::Cow, fmt::Display};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A reference to a role, as written into commands.
///
/// Encoded as `{"role": <name>}` when the role lives in the same database as
/// the principal referencing it, and as `{"role": <name>, "db": <database>}`
/// otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RoleReference {
    SameDatabase(String),
    CrossDatabase { role: String, database: String },
}

impl RoleReference {
    pub fn role(&self) -> &str {
        match self {
            Self::SameDatabase(role) | Self::CrossDatabase { role, .. } => role,
        }
    }

    /// The database of the referenced role, with `referencer_database` filled
    /// in for same-database references.
    pub fn database<'a>(&'a self, referencer_database: &'a str) -> &'a str {
        match self {
            Self::SameDatabase(_) => referencer_database,
            Self::CrossDatabase { database, .. } => database,
        }
    }
}

#[derive(Deserialize, Serialize)]
struct RoleReferenceFields<'a> {
    role: Cow<'a, str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    db: Option<Cow<'a, str>>,
}

impl Serialize for RoleReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = match self {
            Self::SameDatabase(role) => RoleReferenceFields {
                role: role.into(),
                db: None,
            },
            Self::CrossDatabase { role, database } => RoleReferenceFields {
                role: role.into(),
                db: Some(database.into()),
            },
        };
        fields.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RoleReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let RoleReferenceFields { role, db } = RoleReferenceFields::deserialize(deserializer)?;
        Ok(match db {
            None => Self::SameDatabase(role.into_owned()),
            Some(database) => Self::CrossDatabase {
                role: role.into_owned(),
                database: database.into_owned(),
            },
        })
    }
}

/// A role reference as reported by the database, which always names the
/// database explicitly.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct RoleDbRef {
    pub role: String,
    pub db: String,
}

impl Display for RoleDbRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.db, self.role)
    }
}

/// The declarative form of a role reference.
///
/// An unset `db` means the role lives in the same database as the principal,
/// which is different from an explicitly empty database.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct RoleRefState {
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<String>,
}

impl RoleRefState {
    pub fn same_database(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: None,
        }
    }

    pub fn in_database(role: impl Into<String>, db: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            db: Some(db.into()),
        }
    }

    pub fn to_reference(&self) -> RoleReference {
        match &self.db {
            None => RoleReference::SameDatabase(self.role.clone()),
            Some(database) => RoleReference::CrossDatabase {
                role: self.role.clone(),
                database: database.clone(),
            },
        }
    }
}

pub fn to_references(roles: &[RoleRefState]) -> Vec<RoleReference> {
    roles.iter().map(RoleRefState::to_reference).collect()
}
