//! The `users` data source, listing existing users.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ResultExt, Snafu};
use tracing::{debug, instrument};

use crate::{
    client::{self, SharedClient},
    document::Document,
    identity::format_id,
    role_ref::RoleDbRef,
    user::{CustomData, Mechanism, User},
    validation,
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid database {database:?}"))]
    InvalidDatabase {
        database: String,
        source: validation::Errors,
    },

    #[snafu(display("failed to connect"))]
    Connect { source: client::Error },

    #[snafu(display("failed to list users"))]
    ListUsers { source: client::Error },
}

/// Which users to list.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct UsersQuery {
    /// Lists the users of every database when unset.
    #[serde(default, rename = "db", skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Additional equality filters on the user documents.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filter: BTreeMap<String, String>,
}

/// A listed user, with every attribute as reported by the server.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: String,

    #[serde(rename = "user")]
    pub name: String,

    #[serde(rename = "db")]
    pub database: String,

    pub custom_data: CustomData,

    pub roles: Vec<RoleDbRef>,

    pub mechanisms: Vec<Mechanism>,
}

impl From<User> for UserSummary {
    fn from(user: User) -> Self {
        Self {
            id: format_id(&user.name, &user.db),
            name: user.name,
            database: user.db,
            custom_data: user.custom_data,
            roles: user.roles,
            mechanisms: user.mechanisms,
        }
    }
}

impl UsersQuery {
    fn filter_document(&self) -> Option<Document> {
        (!self.filter.is_empty()).then(|| {
            self.filter
                .iter()
                .map(|(field, value)| (field.clone(), Value::from(value.as_str())))
                .collect()
        })
    }
}

#[derive(Clone, Debug)]
pub struct UsersDataSource {
    client: SharedClient,
}

impl UsersDataSource {
    pub fn new(client: SharedClient) -> Self {
        Self { client }
    }

    #[instrument(name = "list_users", skip(self))]
    pub async fn read(&self, query: &UsersQuery) -> Result<Vec<UserSummary>, Error> {
        if let Some(database) = &query.database {
            validation::validate_database_name(database)
                .context(InvalidDatabaseSnafu { database })?;
        }
        let client = self.client.get().await.context(ConnectSnafu)?;

        let filter = query.filter_document();
        let users = match &query.database {
            Some(database) => client.list_users(database, filter.as_ref()).await,
            None => client.list_all_users(filter.as_ref()).await,
        }
        .context(ListUsersSnafu)?;

        debug!(count = users.len(), "listed users");
        Ok(users.into_iter().map(UserSummary::from).collect())
    }
}
