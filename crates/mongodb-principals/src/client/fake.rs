//! An in-memory stand-in for a MongoDB deployment, understanding just enough
//! of the user and role management commands to exercise the client.
use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{BoxError, CommandExecutor, Connector, SharedClient};
use crate::{
    config::ConnectionSettings,
    document::Document,
    identity::format_id,
    role_ref::{RoleDbRef, RoleReference},
};

type Principals = BTreeMap<(String, String), Document>;

/// Mechanisms the server enables when a user is created without any.
const DEFAULT_MECHANISMS: [&str; 2] = ["SCRAM-SHA-1", "SCRAM-SHA-256"];

#[derive(Clone)]
pub(crate) struct FakeDatabase {
    /// How often a connection was established.
    pub connections: Arc<AtomicUsize>,

    /// Responses report `ok: 0` while this is unset.
    pub acknowledge: Arc<AtomicBool>,

    /// Commands never finish while this is set.
    pub stall: Arc<AtomicBool>,

    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    users: Principals,
    roles: Principals,
    commands: Vec<(String, Document)>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self {
            connections: Arc::default(),
            acknowledge: Arc::new(AtomicBool::new(true)),
            stall: Arc::default(),
            state: Arc::default(),
        }
    }

    pub fn shared_client(&self) -> SharedClient {
        SharedClient::new(
            ConnectionSettings::new("mongodb://fake:27017"),
            Arc::new(self.clone()),
        )
    }

    /// The last command with the given name, as received.
    pub fn last_command(&self, name: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .commands
            .iter()
            .rev()
            .find(|(command, _)| command == name)
            .map(|(_, document)| Value::Object(document.clone()))
    }

    pub fn commands_run(&self, name: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .commands
            .iter()
            .filter(|(command, _)| command == name)
            .count()
    }

    /// Stores a user directly, bypassing the commands.
    pub fn insert_user(&self, user: Value) {
        let Value::Object(user) = user else {
            panic!("user must be a document");
        };
        let key = (
            user["db"].as_str().unwrap().to_owned(),
            user["user"].as_str().unwrap().to_owned(),
        );
        self.state.lock().unwrap().users.insert(key, user);
    }
}

#[async_trait]
impl Connector for FakeDatabase {
    async fn connect(
        &self,
        _settings: &ConnectionSettings,
    ) -> Result<Arc<dyn CommandExecutor>, BoxError> {
        self.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl CommandExecutor for FakeDatabase {
    async fn run_command(&self, database: &str, command: Document) -> Result<Document, BoxError> {
        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        // The command name is always the first field.
        let name = command.keys().next().cloned().ok_or("empty command")?;
        let mut state = self.state.lock().unwrap();
        state.commands.push((name.clone(), command.clone()));

        let mut response = match name.as_str() {
            "ping" => Document::new(),
            "createUser" => state.create_user(database, &command)?,
            "updateUser" => state.update_user(database, &command)?,
            "dropUser" => drop_principal(&mut state.users, "User", database, &command, &name)?,
            "usersInfo" => state.users_info(database, &command)?,
            "createRole" => state.create_role(database, &command)?,
            "updateRole" => state.update_role(database, &command)?,
            "dropRole" => drop_principal(&mut state.roles, "Role", database, &command, &name)?,
            "rolesInfo" => state.roles_info(database, &command)?,
            other => return Err(format!("no such command: {other}").into()),
        };

        let ok = i32::from(self.acknowledge.load(Ordering::SeqCst));
        response.insert("ok".to_owned(), json!(ok));
        Ok(response)
    }
}

impl State {
    fn create_user(&mut self, database: &str, command: &Document) -> Result<Document, BoxError> {
        let name = str_field(command, "createUser")?;
        let key = (database.to_owned(), name.to_owned());
        if self.users.contains_key(&key) {
            return Err(format!("User \"{name}@{database}\" already exists").into());
        }

        let mut user = Document::new();
        user.insert("_id".into(), json!(format_id(name, database)));
        user.insert("user".into(), json!(name));
        user.insert("db".into(), json!(database));
        if let Some(custom_data) = command.get("customData") {
            user.insert("customData".into(), custom_data.clone());
        }
        user.insert("roles".into(), resolve_roles(database, command.get("roles"))?);
        user.insert(
            "mechanisms".into(),
            command
                .get("mechanisms")
                .cloned()
                .unwrap_or_else(|| json!(DEFAULT_MECHANISMS)),
        );
        self.users.insert(key, user);
        Ok(Document::new())
    }

    fn update_user(&mut self, database: &str, command: &Document) -> Result<Document, BoxError> {
        let name = str_field(command, "updateUser")?;
        let user = self
            .users
            .get_mut(&(database.to_owned(), name.to_owned()))
            .ok_or_else(|| format!("Could not find user \"{name}\" for db \"{database}\""))?;

        if let Some(custom_data) = command.get("customData") {
            user.insert("customData".into(), custom_data.clone());
        }
        if let Some(roles) = command.get("roles") {
            user.insert("roles".into(), resolve_roles(database, Some(roles))?);
        }
        if let Some(mechanisms) = command.get("mechanisms") {
            user.insert("mechanisms".into(), mechanisms.clone());
        }
        Ok(Document::new())
    }

    fn users_info(&self, database: &str, command: &Document) -> Result<Document, BoxError> {
        let target = &command["usersInfo"];
        let users = self
            .users
            .iter()
            .filter(|((db, name), _)| match target {
                Value::String(target) => db == database && name == target,
                Value::Object(target) if target.get("forAllDBs") == Some(&json!(true)) => true,
                _ => db == database,
            })
            .map(|(_, user)| user)
            .filter(|user| matches_filter(user, command.get("filter")))
            .cloned()
            .map(Value::Object)
            .collect::<Vec<_>>();

        let mut response = Document::new();
        response.insert("users".into(), Value::Array(users));
        Ok(response)
    }

    fn create_role(&mut self, database: &str, command: &Document) -> Result<Document, BoxError> {
        let name = str_field(command, "createRole")?;
        let key = (database.to_owned(), name.to_owned());
        if self.roles.contains_key(&key) {
            return Err(format!("Role \"{name}@{database}\" already exists").into());
        }
        let privileges = command
            .get("privileges")
            .ok_or("\"createRole\" command requires a \"privileges\" array")?;

        let mut role = Document::new();
        role.insert("_id".into(), json!(format_id(name, database)));
        role.insert("role".into(), json!(name));
        role.insert("db".into(), json!(database));
        role.insert("privileges".into(), privileges.clone());
        role.insert("roles".into(), resolve_roles(database, command.get("roles"))?);
        role.insert("isBuiltin".into(), json!(false));
        refresh_inherited(&mut role);
        self.roles.insert(key, role);
        Ok(Document::new())
    }

    fn update_role(&mut self, database: &str, command: &Document) -> Result<Document, BoxError> {
        let name = str_field(command, "updateRole")?;
        let role = self
            .roles
            .get_mut(&(database.to_owned(), name.to_owned()))
            .ok_or_else(|| format!("Role \"{name}@{database}\" not found"))?;

        if let Some(privileges) = command.get("privileges") {
            role.insert("privileges".into(), privileges.clone());
        }
        if let Some(roles) = command.get("roles") {
            role.insert("roles".into(), resolve_roles(database, Some(roles))?);
        }
        refresh_inherited(role);
        Ok(Document::new())
    }

    fn roles_info(&self, database: &str, command: &Document) -> Result<Document, BoxError> {
        let target = &command["rolesInfo"];
        let roles = self
            .roles
            .iter()
            .filter(|((db, name), _)| {
                db == database && target.as_str().is_none_or(|target| name == target)
            })
            .map(|(_, role)| Value::Object(role.clone()))
            .collect::<Vec<_>>();

        let mut response = Document::new();
        response.insert("roles".into(), Value::Array(roles));
        Ok(response)
    }
}

fn drop_principal(
    principals: &mut Principals,
    kind: &str,
    database: &str,
    command: &Document,
    name_field: &str,
) -> Result<Document, BoxError> {
    let name = str_field(command, name_field)?;
    principals
        .remove(&(database.to_owned(), name.to_owned()))
        .ok_or_else(|| format!("{kind} \"{name}@{database}\" not found"))?;
    Ok(Document::new())
}

fn str_field<'a>(command: &'a Document, field: &str) -> Result<&'a str, BoxError> {
    command
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("\"{field}\" must be a string").into())
}

/// Role references as stored by the server, always naming the database.
fn resolve_roles(database: &str, roles: Option<&Value>) -> Result<Value, BoxError> {
    let references: Vec<RoleReference> = match roles {
        Some(roles) => serde_json::from_value(roles.clone())?,
        None => Vec::new(),
    };
    let resolved = references
        .iter()
        .map(|reference| RoleDbRef {
            role: reference.role().to_owned(),
            db: reference.database(database).to_owned(),
        })
        .collect::<Vec<_>>();
    Ok(serde_json::to_value(resolved)?)
}

/// Only direct inheritance is tracked.
fn refresh_inherited(role: &mut Document) {
    let roles = role["roles"].clone();
    let privileges = role["privileges"].clone();
    role.insert("inheritedRoles".into(), roles);
    role.insert("inheritedPrivileges".into(), privileges);
}

fn matches_filter(document: &Document, filter: Option<&Value>) -> bool {
    match filter.and_then(Value::as_object) {
        Some(filter) => filter
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected)),
        None => true,
    }
}
