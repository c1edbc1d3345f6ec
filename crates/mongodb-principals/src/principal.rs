//! Lifecycle operations of the user and role resources.
//!
//! Every operation resolves the identity of the principal, runs the matching
//! commands and folds the principal as stored by the server back into the
//! declarative state.
use snafu::{IntoError, ResultExt, Snafu};
use tracing::{info, instrument};

use crate::{
    client::{self, Client, SharedClient},
    identity::{IdentityError, PrincipalIdentity, PrincipalKind},
    merge::{ApplyFetched, MergeError},
    privilege::PrivilegeConfigError,
    role::RoleState,
    user::UserState,
    validation,
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// The lifecycle step that failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Import,
}

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to resolve the identity"))]
    ResolveIdentity { source: IdentityError },

    #[snafu(display("invalid value for attribute {attribute:?}"))]
    InvalidAttribute {
        attribute: &'static str,
        source: validation::Errors,
    },

    #[snafu(display("invalid privileges"))]
    InvalidPrivileges { source: PrivilegeConfigError },

    #[snafu(display("failed to connect"))]
    Connect { source: client::Error },

    #[snafu(display("failed to {operation} {kind} {identity}"))]
    Command {
        operation: Operation,
        kind: PrincipalKind,
        identity: PrincipalIdentity,
        source: client::Error,
    },

    #[snafu(display("failed to interpret {kind} {identity} as reported by the server"))]
    Merge {
        kind: PrincipalKind,
        identity: PrincipalIdentity,
        source: MergeError,
    },
}

async fn connect(client: &SharedClient) -> Result<&Client> {
    client.get().await.context(ConnectSnafu)
}

fn check_attributes(result: Result<(), (&'static str, validation::Errors)>) -> Result<()> {
    result.map_err(|(attribute, errors)| InvalidAttributeSnafu { attribute }.into_error(errors))
}

/// The `user` resource.
#[derive(Clone, Debug)]
pub struct UserResource {
    client: SharedClient,
}

impl UserResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    #[instrument(name = "create_user", skip_all)]
    pub async fn create(&self, mut plan: UserState) -> Result<UserState> {
        check_attributes(plan.validate())?;
        let identity = PrincipalIdentity::resolve(&plan).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        let user = client
            .create_user(&identity.database, &plan.to_new_user(&identity.name))
            .await
            .with_context(|_| CommandSnafu {
                operation: Operation::Create,
                kind: PrincipalKind::User,
                identity: identity.clone(),
            })?;
        plan.apply_fetched(&user).context(MergeSnafu {
            kind: PrincipalKind::User,
            identity: identity.clone(),
        })?;

        info!(%identity, "created user");
        Ok(plan)
    }

    /// Refreshes `state` from the server. Returns [`None`] if the user no
    /// longer exists.
    #[instrument(name = "read_user", skip_all)]
    pub async fn read(&self, mut state: UserState) -> Result<Option<UserState>> {
        let identity = PrincipalIdentity::resolve(&state).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        let user = match client.get_user(&identity).await {
            Ok(user) => user,
            Err(err) if err.is_not_found() => {
                info!(%identity, "user no longer exists");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).context(CommandSnafu {
                    operation: Operation::Read,
                    kind: PrincipalKind::User,
                    identity,
                });
            }
        };
        state.apply_fetched(&user).context(MergeSnafu {
            kind: PrincipalKind::User,
            identity,
        })?;
        Ok(Some(state))
    }

    #[instrument(name = "update_user", skip_all)]
    pub async fn update(&self, mut plan: UserState) -> Result<UserState> {
        check_attributes(plan.validate())?;
        let identity = PrincipalIdentity::resolve(&plan).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        let user = client
            .update_user(&identity.database, &plan.to_update(&identity.name))
            .await
            .with_context(|_| CommandSnafu {
                operation: Operation::Update,
                kind: PrincipalKind::User,
                identity: identity.clone(),
            })?;
        plan.apply_fetched(&user).context(MergeSnafu {
            kind: PrincipalKind::User,
            identity: identity.clone(),
        })?;

        info!(%identity, "updated user");
        Ok(plan)
    }

    /// Drops the user. A user that is already gone counts as deleted.
    #[instrument(name = "delete_user", skip_all)]
    pub async fn delete(&self, state: &UserState) -> Result<()> {
        let identity = PrincipalIdentity::resolve(state).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        if let Err(err) = client.drop_user(&identity).await {
            // The server reports a missing user as a plain command failure.
            if client
                .get_user(&identity)
                .await
                .is_err_and(|lookup| lookup.is_not_found())
            {
                info!(%identity, "user was already deleted");
                return Ok(());
            }
            return Err(err).context(CommandSnafu {
                operation: Operation::Delete,
                kind: PrincipalKind::User,
                identity,
            });
        }

        info!(%identity, "deleted user");
        Ok(())
    }

    /// Imports an existing user by its `<database>.<name>` ID.
    ///
    /// Only the identity attributes are filled in, like a read of a state
    /// that declares nothing but the ID.
    #[instrument(name = "import_user", skip(self))]
    pub async fn import(&self, id: &str) -> Result<UserState> {
        let mut state = UserState {
            id: Some(id.to_owned()),
            ..UserState::default()
        };
        let identity = PrincipalIdentity::resolve(&state).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        let user = client
            .get_user(&identity)
            .await
            .with_context(|_| CommandSnafu {
                operation: Operation::Import,
                kind: PrincipalKind::User,
                identity: identity.clone(),
            })?;
        state.apply_fetched(&user).context(MergeSnafu {
            kind: PrincipalKind::User,
            identity: identity.clone(),
        })?;

        info!(%identity, "imported user");
        Ok(state)
    }
}

/// The `role` resource.
#[derive(Clone, Debug)]
pub struct RoleResource {
    client: SharedClient,
}

impl RoleResource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    #[instrument(name = "create_role", skip_all)]
    pub async fn create(&self, mut plan: RoleState) -> Result<RoleState> {
        check_attributes(plan.validate())?;
        let identity = PrincipalIdentity::resolve(&plan).context(ResolveIdentitySnafu)?;
        let new_role = plan
            .to_new_role(&identity.name)
            .context(InvalidPrivilegesSnafu)?;
        let client = connect(&self.client).await?;

        let role = client
            .create_role(&identity.database, &new_role)
            .await
            .with_context(|_| CommandSnafu {
                operation: Operation::Create,
                kind: PrincipalKind::Role,
                identity: identity.clone(),
            })?;
        plan.apply_fetched(&role).context(MergeSnafu {
            kind: PrincipalKind::Role,
            identity: identity.clone(),
        })?;

        info!(%identity, "created role");
        Ok(plan)
    }

    /// Refreshes `state` from the server. Returns [`None`] if the role no
    /// longer exists.
    #[instrument(name = "read_role", skip_all)]
    pub async fn read(&self, mut state: RoleState) -> Result<Option<RoleState>> {
        let identity = PrincipalIdentity::resolve(&state).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        let role = match client.get_role(&identity).await {
            Ok(role) => role,
            Err(err) if err.is_not_found() => {
                info!(%identity, "role no longer exists");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).context(CommandSnafu {
                    operation: Operation::Read,
                    kind: PrincipalKind::Role,
                    identity,
                });
            }
        };
        state.apply_fetched(&role).context(MergeSnafu {
            kind: PrincipalKind::Role,
            identity,
        })?;
        Ok(Some(state))
    }

    #[instrument(name = "update_role", skip_all)]
    pub async fn update(&self, mut plan: RoleState) -> Result<RoleState> {
        check_attributes(plan.validate())?;
        let identity = PrincipalIdentity::resolve(&plan).context(ResolveIdentitySnafu)?;
        let update = plan.to_update(&identity.name).context(InvalidPrivilegesSnafu)?;
        let client = connect(&self.client).await?;

        let role = client
            .update_role(&identity.database, &update)
            .await
            .with_context(|_| CommandSnafu {
                operation: Operation::Update,
                kind: PrincipalKind::Role,
                identity: identity.clone(),
            })?;
        plan.apply_fetched(&role).context(MergeSnafu {
            kind: PrincipalKind::Role,
            identity: identity.clone(),
        })?;

        info!(%identity, "updated role");
        Ok(plan)
    }

    /// Drops the role. A role that is already gone counts as deleted.
    #[instrument(name = "delete_role", skip_all)]
    pub async fn delete(&self, state: &RoleState) -> Result<()> {
        let identity = PrincipalIdentity::resolve(state).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        if let Err(err) = client.drop_role(&identity).await {
            // The server reports a missing role as a plain command failure.
            if client
                .get_role(&identity)
                .await
                .is_err_and(|lookup| lookup.is_not_found())
            {
                info!(%identity, "role was already deleted");
                return Ok(());
            }
            return Err(err).context(CommandSnafu {
                operation: Operation::Delete,
                kind: PrincipalKind::Role,
                identity,
            });
        }

        info!(%identity, "deleted role");
        Ok(())
    }

    /// Imports an existing role by its `<database>.<name>` ID.
    #[instrument(name = "import_role", skip(self))]
    pub async fn import(&self, id: &str) -> Result<RoleState> {
        let mut state = RoleState {
            id: Some(id.to_owned()),
            ..RoleState::default()
        };
        let identity = PrincipalIdentity::resolve(&state).context(ResolveIdentitySnafu)?;
        let client = connect(&self.client).await?;

        let role = client
            .get_role(&identity)
            .await
            .with_context(|_| CommandSnafu {
                operation: Operation::Import,
                kind: PrincipalKind::Role,
                identity: identity.clone(),
            })?;
        state.apply_fetched(&role).context(MergeSnafu {
            kind: PrincipalKind::Role,
            identity: identity.clone(),
        })?;

        info!(%identity, "imported role");
        Ok(state)
    }
}
