use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::instrument;

use super::{ADMIN_DATABASE, Client, NotFoundSnafu, ReadBackSnafu, Result};
use crate::{
    document::Document,
    identity::{PrincipalIdentity, PrincipalKind},
    user::{NewUser, User, UserUpdate},
};

#[derive(Serialize)]
#[serde(untagged)]
enum UsersInfoTarget<'a> {
    Name(&'a str),
    /// `1` selects every user of the database the command runs on.
    AllInDatabase(u8),
    AllDatabases {
        #[serde(rename = "forAllDBs")]
        for_all_dbs: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UsersInfo<'a> {
    users_info: UsersInfoTarget<'a>,

    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Document>,
}

#[derive(Deserialize)]
struct UsersInfoResponse {
    users: Vec<User>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUser<'a> {
    #[serde(flatten)]
    user: &'a NewUser,

    /// The server hashes the password, it is never digested client side.
    digest_password: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DropUser<'a> {
    drop_user: &'a str,
}

impl Client {
    /// Looks up a single user.
    #[instrument(skip(self, identity), fields(%identity))]
    pub async fn get_user(&self, identity: &PrincipalIdentity) -> Result<User> {
        let query = UsersInfo {
            users_info: UsersInfoTarget::Name(&identity.name),
            filter: None,
        };
        self.users_info(&identity.database, &query)
            .await?
            .into_iter()
            .next()
            .with_context(|| NotFoundSnafu {
                kind: PrincipalKind::User,
                identity: identity.clone(),
            })
    }

    /// Lists the users of `database`, optionally narrowed down by `filter`
    /// (a match expression on the user documents).
    #[instrument(skip(self))]
    pub async fn list_users(&self, database: &str, filter: Option<&Document>) -> Result<Vec<User>> {
        let query = UsersInfo {
            users_info: UsersInfoTarget::AllInDatabase(1),
            filter,
        };
        self.users_info(database, &query).await
    }

    /// Lists the users of every database.
    #[instrument(skip(self))]
    pub async fn list_all_users(&self, filter: Option<&Document>) -> Result<Vec<User>> {
        let query = UsersInfo {
            users_info: UsersInfoTarget::AllDatabases { for_all_dbs: true },
            filter,
        };
        self.users_info(ADMIN_DATABASE, &query).await
    }

    /// Creates a user in `database` and returns it as stored by the server.
    #[instrument(skip(self, user), fields(user = %user.name))]
    pub async fn create_user(&self, database: &str, user: &NewUser) -> Result<User> {
        let command = CreateUser {
            user,
            digest_password: true,
        };
        self.run_acknowledged(database, "createUser", &command)
            .await?;
        self.get_user(&PrincipalIdentity::new(&user.name, database))
            .await
            .context(ReadBackSnafu {
                operation: "get created user",
            })
    }

    /// Updates a user in `database` and returns it as stored by the server.
    #[instrument(skip(self, update), fields(user = %update.name))]
    pub async fn update_user(&self, database: &str, update: &UserUpdate) -> Result<User> {
        self.run_acknowledged(database, "updateUser", update)
            .await?;
        self.get_user(&PrincipalIdentity::new(&update.name, database))
            .await
            .context(ReadBackSnafu {
                operation: "get updated user",
            })
    }

    #[instrument(skip(self, identity), fields(%identity))]
    pub async fn drop_user(&self, identity: &PrincipalIdentity) -> Result<()> {
        let command = DropUser {
            drop_user: &identity.name,
        };
        self.run_acknowledged(&identity.database, "dropUser", &command)
            .await
    }

    async fn users_info(&self, database: &str, query: &UsersInfo<'_>) -> Result<Vec<User>> {
        let response: UsersInfoResponse = self.run(database, "usersInfo", query).await?;
        Ok(response.users)
    }
}
