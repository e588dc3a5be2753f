//! In-process stand-in for a SQL Server instance
//!
//! Interprets the administrative statements dbforge issues against real
//! files in a temporary directory, and counts connections so tests can
//! check that none are left open.

#![allow(dead_code)]

use async_trait::async_trait;
use dbforge::database::{AdminConnection, ConnectionResolver, ConnectionString, DriverFactory, EngineRegistry};
use dbforge::lifecycle::LifecycleOrchestrator;
use dbforge::provider::{EngineKind, ProviderDescriptor, ProviderId, ProviderMechanism};
use dbforge::schema::SchemaTranslator;
use dbforge::{ForgeError, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct SimulatedDatabase {
    pub name: String,
    /// (logical name, path)
    pub files: Vec<(String, PathBuf)>,
    pub online: bool,
    pub single_user: bool,
}

#[derive(Default)]
struct ServerState {
    databases: BTreeMap<String, SimulatedDatabase>,
    open_connections: usize,
    executed: Vec<String>,
    fail_on: Option<String>,
}

#[derive(Clone, Default)]
pub struct SimulatedServer {
    state: Arc<Mutex<ServerState>>,
}

impl SimulatedServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next statement containing `fragment`
    pub fn fail_on(&self, fragment: &str) {
        self.state.lock().unwrap().fail_on = Some(fragment.to_string());
    }

    pub fn open_connections(&self) -> usize {
        self.state.lock().unwrap().open_connections
    }

    pub fn executed(&self) -> Vec<String> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn database(&self, name: &str) -> Option<SimulatedDatabase> {
        self.state.lock().unwrap().databases.get(&name.to_lowercase()).cloned()
    }

    pub fn database_names(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .databases
            .values()
            .map(|db| db.name.clone())
            .collect()
    }
}

#[async_trait]
impl DriverFactory for SimulatedServer {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn AdminConnection>> {
        if connection_string.get("Data Source").is_none() {
            return Err(ForgeError::connection("simulated", "no data source"));
        }
        self.state.lock().unwrap().open_connections += 1;
        Ok(Box::new(SimulatedConnection {
            server: self.clone(),
        }))
    }
}

struct SimulatedConnection {
    server: SimulatedServer,
}

#[async_trait]
impl AdminConnection for SimulatedConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut state = self.server.state.lock().unwrap();
        state.executed.push(sql.to_string());
        if let Some(fragment) = state.fail_on.clone() {
            if sql.contains(&fragment) {
                state.fail_on = None;
                return Err(ForgeError::connection("simulated", format!("injected failure on '{}'", fragment)));
            }
        }
        apply(&mut state, sql)?;
        Ok(0)
    }

    async fn query_column(&mut self, sql: &str) -> Result<Vec<String>> {
        let state = self.server.state.lock().unwrap();
        let rows = if sql.contains("sys.databases WHERE Name=") {
            let name = literals(sql).into_iter().next().unwrap_or_default();
            state
                .databases
                .get(&name.to_lowercase())
                .map(|db| vec![db.name.clone()])
                .unwrap_or_default()
        } else if sql.contains("sys.databases") {
            state.databases.values().map(|db| db.name.clone()).collect()
        } else if sql.contains("sys.servers") {
            vec!["LOCAL".to_string()]
        } else if sql.contains("sys.master_files") {
            state
                .databases
                .values()
                .flat_map(|db| db.files.iter().map(|(_, path)| path.display().to_string()))
                .collect()
        } else if sql.contains("INFORMATION_SCHEMA.TABLES") {
            vec!["Customers".to_string(), "Orders".to_string()]
        } else if sql.contains("INFORMATION_SCHEMA.COLUMNS") {
            vec!["Id".to_string(), "Name".to_string()]
        } else {
            return Err(ForgeError::connection("simulated", format!("unexpected query: {}", sql)));
        };
        Ok(rows)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.server.state.lock().unwrap().open_connections -= 1;
        Ok(())
    }
}

fn failure(message: impl std::fmt::Display) -> ForgeError {
    ForgeError::connection("simulated", message)
}

/// Bracketed identifiers in statement order, with `]]` unescaped
fn brackets(sql: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '[' {
            continue;
        }
        let mut name = String::new();
        while let Some(c) = chars.next() {
            if c == ']' {
                if chars.peek() == Some(&']') {
                    chars.next();
                    name.push(']');
                } else {
                    break;
                }
            } else {
                name.push(c);
            }
        }
        names.push(name);
    }
    names
}

/// Single-quoted literals in statement order, with `''` unescaped
fn literals(sql: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\'' {
            continue;
        }
        let mut value = String::new();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    value.push('\'');
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        values.push(value);
    }
    values
}

fn database_mut<'a>(state: &'a mut ServerState, name: &str) -> Result<&'a mut SimulatedDatabase> {
    state
        .databases
        .get_mut(&name.to_lowercase())
        .ok_or_else(|| failure(format!("database '{}' does not exist", name)))
}

fn apply(state: &mut ServerState, sql: &str) -> Result<()> {
    let names = brackets(sql);
    let first = names.first().cloned().unwrap_or_default();

    if sql.starts_with("CREATE DATABASE") {
        let for_attach = sql.ends_with("FOR ATTACH");
        if state.databases.contains_key(&first.to_lowercase()) {
            return Err(failure(format!("database '{}' already exists", first)));
        }
        let values = literals(sql);
        let files: Vec<(String, PathBuf)> = values
            .chunks(2)
            .map(|pair| (pair[0].clone(), PathBuf::from(&pair[1])))
            .collect();
        for (_, path) in &files {
            if for_attach && !path.is_file() {
                return Err(failure(format!("cannot attach missing file {}", path.display())));
            }
            if !for_attach {
                if path.exists() {
                    return Err(failure(format!("file {} already exists", path.display())));
                }
                std::fs::write(path, format!("data of {}", first))?;
            }
        }
        state.databases.insert(
            first.to_lowercase(),
            SimulatedDatabase {
                name: first,
                files,
                online: true,
                single_user: false,
            },
        );
    } else if sql.contains("SET SINGLE_USER") {
        database_mut(state, &first)?.single_user = true;
    } else if sql.contains("SET MULTI_USER") {
        database_mut(state, &first)?.single_user = false;
    } else if sql.contains("MODIFY NAME") {
        let new_name = names.get(1).cloned().unwrap_or_default();
        let mut db = state
            .databases
            .remove(&first.to_lowercase())
            .ok_or_else(|| failure(format!("database '{}' does not exist", first)))?;
        db.name = new_name.clone();
        state.databases.insert(new_name.to_lowercase(), db);
    } else if sql.contains("MODIFY FILE") {
        let logical = names.get(1).cloned().unwrap_or_default();
        let new_logical = if sql.contains("NEWNAME") {
            names.get(2).cloned()
        } else {
            None
        };
        let new_path = literals(sql).into_iter().next().map(PathBuf::from);
        let db = database_mut(state, &first)?;
        let file = db
            .files
            .iter_mut()
            .find(|(name, _)| *name == logical)
            .ok_or_else(|| failure(format!("no file named '{}'", logical)))?;
        if let Some(new_logical) = new_logical {
            file.0 = new_logical;
        }
        if let Some(new_path) = new_path {
            file.1 = new_path;
        }
    } else if sql.contains("SET OFFLINE") {
        database_mut(state, &first)?.online = false;
    } else if sql.contains("SET ONLINE") {
        let db = database_mut(state, &first)?;
        if let Some((_, missing)) = db.files.iter().find(|(_, path)| !path.is_file()) {
            return Err(failure(format!("file {} not found", missing.display())));
        }
        db.online = true;
    } else if sql.starts_with("DROP DATABASE") {
        let db = state
            .databases
            .remove(&first.to_lowercase())
            .ok_or_else(|| failure(format!("database '{}' does not exist", first)))?;
        for (_, path) in &db.files {
            let _ = std::fs::remove_file(path);
        }
    } else if sql.contains("sp_detach_db") {
        let name = literals(sql).into_iter().next().unwrap_or_default();
        state
            .databases
            .remove(&name.to_lowercase())
            .ok_or_else(|| failure(format!("database '{}' does not exist", name)))?;
    } else {
        return Err(failure(format!("unexpected statement: {}", sql)));
    }
    Ok(())
}

/// Orchestrator whose SQL Server engine talks to `server`
pub fn orchestrator(server: &SimulatedServer) -> (LifecycleOrchestrator, ProviderId) {
    let mut resolver = ConnectionResolver::new();
    resolver.register_factory(EngineKind::SqlServer, ProviderMechanism::Native, Arc::new(server.clone()));
    let sqlserver = resolver
        .register_provider(ProviderDescriptor::new(EngineKind::SqlServer, ProviderMechanism::Native))
        .unwrap();
    resolver
        .register_provider(ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native))
        .unwrap();
    resolver
        .register_provider(ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::Native))
        .unwrap();

    let registry = EngineRegistry::new(Arc::new(resolver), SchemaTranslator::default());
    (LifecycleOrchestrator::new(Arc::new(registry)), sqlserver)
}

pub fn sqlite_provider() -> ProviderId {
    ProviderDescriptor::new(EngineKind::Sqlite, ProviderMechanism::Native)
        .identity()
        .unwrap()
}

/// Access provider with no driver bound; file operations only
pub fn access_provider() -> ProviderId {
    ProviderDescriptor::new(EngineKind::Access, ProviderMechanism::Native)
        .identity()
        .unwrap()
}
