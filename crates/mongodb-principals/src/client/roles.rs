use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

use super::{Client, NotFoundSnafu, ReadBackSnafu, Result};
use crate::{
    identity::{PrincipalIdentity, PrincipalKind},
    role::{NewRole, Role, RoleUpdate},
};

#[derive(Serialize)]
#[serde(untagged)]
enum RolesInfoTarget<'a> {
    Name(&'a str),
    /// `1` selects every role of the database the command runs on.
    AllInDatabase(u8),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RolesInfo<'a> {
    roles_info: RolesInfoTarget<'a>,
    show_privileges: bool,
    show_builtin_roles: bool,
}

impl<'a> RolesInfo<'a> {
    fn new(roles_info: RolesInfoTarget<'a>) -> Self {
        Self {
            roles_info,
            show_privileges: true,
            show_builtin_roles: true,
        }
    }
}

#[derive(Deserialize)]
struct RolesInfoResponse {
    roles: Vec<Role>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DropRole<'a> {
    drop_role: &'a str,
}

impl Client {
    /// Looks up a single role, including builtin ones.
    #[instrument(skip(self, identity), fields(%identity))]
    pub async fn get_role(&self, identity: &PrincipalIdentity) -> Result<Role> {
        let query = RolesInfo::new(RolesInfoTarget::Name(&identity.name));
        self.roles_info(&identity.database, &query)
            .await?
            .into_iter()
            .next()
            .with_context(|| NotFoundSnafu {
                kind: PrincipalKind::Role,
                identity: identity.clone(),
            })
    }

    /// Lists the custom and builtin roles of `database`.
    #[instrument(skip(self))]
    pub async fn list_roles(&self, database: &str) -> Result<Vec<Role>> {
        let query = RolesInfo::new(RolesInfoTarget::AllInDatabase(1));
        self.roles_info(database, &query).await
    }

    /// Creates a role in `database` and returns it as stored by the server.
    #[instrument(skip(self, role), fields(role = %role.name))]
    pub async fn create_role(&self, database: &str, role: &NewRole) -> Result<Role> {
        self.run_acknowledged(database, "createRole", role).await?;
        self.get_role(&PrincipalIdentity::new(&role.name, database))
            .await
            .context(ReadBackSnafu {
                operation: "get created role",
            })
    }

    /// Updates a role in `database` and returns it as stored by the server.
    #[instrument(skip(self, update), fields(role = %update.name))]
    pub async fn update_role(&self, database: &str, update: &RoleUpdate) -> Result<Role> {
        self.run_acknowledged(database, "updateRole", update).await?;
        self.get_role(&PrincipalIdentity::new(&update.name, database))
            .await
            .context(ReadBackSnafu {
                operation: "get updated role",
            })
    }

    #[instrument(skip(self, identity), fields(%identity))]
    pub async fn drop_role(&self, identity: &PrincipalIdentity) -> Result<()> {
        let command = DropRole {
            drop_role: &identity.name,
        };
        self.run_acknowledged(&identity.database, "dropRole", &command)
            .await
    }

    async fn roles_info(&self, database: &str, query: &RolesInfo<'_>) -> Result<Vec<Role>> {
        let response: RolesInfoResponse = self.run(database, "rolesInfo", query).await?;
        Ok(response.roles)
    }
}
