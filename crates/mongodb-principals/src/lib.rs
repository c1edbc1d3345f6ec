//! Declarative management of MongoDB users and roles.
//!
//! The resources in [`principal`] implement create, read, update, delete and
//! import of users and roles on top of a [`client::Client`]. The
//! [`users`] data source lists existing users.
//!
//! Declared state is compared against what the server reports after every
//! command. Optional collections such as roles, privileges and mechanisms are
//! only refreshed from the server when they were declared in the first place,
//! see [`merge`].
//!
//! Errors of every operation can be turned into a
//! [`diagnostics::Diagnostic`] pointing at the offending attribute.

pub mod client;
pub mod config;
pub mod diagnostics;
pub mod document;
pub mod identity;
pub mod logging;
pub mod merge;
pub mod principal;
pub mod privilege;
pub mod resource;
pub mod role;
pub mod role_ref;
pub mod user;
pub mod users;
pub mod validation;

pub use client::{Client, CommandExecutor, Connector, SharedClient};
pub use config::{ConnectionOptions, ConnectionSettings, ProviderConfig};
pub use identity::{PrincipalIdentity, PrincipalKind};
pub use principal::{RoleResource, UserResource};
pub use role::RoleState;
pub use user::UserState;
pub use users::{UsersDataSource, UsersQuery};
