//! Privileges granted by roles.
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    document::Document,
    resource::{DecodeResourceError, ResourceConfigError, ResourceSpec, ResourceState},
};

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum PrivilegeConfigError {
    #[snafu(display("invalid resource of privilege #{index}"))]
    InvalidResource {
        index: usize,
        source: ResourceConfigError,
    },

    #[snafu(display("privilege #{index} must grant at least one action"))]
    NoActions { index: usize },
}

/// A set of actions allowed on a resource, as sent to and received from the
/// database.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Privilege {
    pub resource: ResourceSpec,
    pub actions: Vec<String>,
}

/// A privilege as reported by `rolesInfo`, with the resource left undecoded.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PrivilegeDocument {
    pub resource: Document,

    #[serde(default)]
    pub actions: Vec<String>,
}

impl PrivilegeDocument {
    pub fn decode(&self) -> Result<Privilege, DecodeResourceError> {
        Ok(Privilege {
            resource: ResourceSpec::from_document(&self.resource)?,
            actions: self.actions.clone(),
        })
    }
}

/// The declarative form of a [`Privilege`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct PrivilegeState {
    pub resource: ResourceState,
    pub actions: Vec<String>,
}

impl From<&Privilege> for PrivilegeState {
    fn from(privilege: &Privilege) -> Self {
        Self {
            resource: ResourceState::from(&privilege.resource),
            actions: privilege.actions.clone(),
        }
    }
}

/// Converts declared privileges into their wire form, keeping the declared
/// order.
pub fn to_privileges(privileges: &[PrivilegeState]) -> Result<Vec<Privilege>, PrivilegeConfigError> {
    privileges
        .iter()
        .enumerate()
        .map(|(index, privilege)| {
            ensure!(!privilege.actions.is_empty(), NoActionsSnafu { index });
            Ok(Privilege {
                resource: privilege
                    .resource
                    .to_spec()
                    .context(InvalidResourceSnafu { index })?,
                actions: privilege.actions.clone(),
            })
        })
        .collect()
}
