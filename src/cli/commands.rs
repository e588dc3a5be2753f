//! Command handlers for CLI
//!
//! This module implements all `/` commands for the dbforge CLI.

use crate::config::{AppState, SharedState};
use crate::database::{CopyTarget, Credentials, DatabaseHandle, RenameTarget};
use crate::error::{ForgeError, Result};
use crate::provider::{EngineKind, Hosting};
use crate::schema::TableSchema;
use comfy_table::{presets::UTF8_FULL, Table};
use std::path::PathBuf;

/// Environment variables holding server credentials for `/open`
const USER_VAR: &str = "DBFORGE_USER";
const PASSWORD_VAR: &str = "DBFORGE_PASSWORD";

/// Command types
#[derive(Debug, Clone, PartialEq)]
pub enum CommandType {
    /// List engines and their capabilities
    Engines,
    /// List registered providers
    Providers,
    /// Describe a database and remember it under an alias
    Open {
        alias: String,
        engine: EngineKind,
        name: String,
        location: Option<PathBuf>,
        data_source: Option<String>,
    },
    Create { alias: String },
    Attach { alias: String },
    Exists { alias: String },
    Delete { alias: String },
    Rename { alias: String, new_name: String },
    Copy { alias: String, target: String, copy_alias: Option<String> },
    /// Show the physical-file manifest
    Files { alias: String },
    Tables { alias: String },
    /// Generate DDL from a JSON table schema
    Ddl { engine: EngineKind, schema_path: PathBuf },
    /// Show help message
    Help,
    /// Exit the application
    Quit,
}

/// Parsed command
#[derive(Debug, Clone)]
pub struct Command {
    /// The type of command
    pub command_type: CommandType,
}

fn syntax(command: &str, expected: &str) -> ForgeError {
    ForgeError::InvalidCommandSyntax {
        command: command.to_string(),
        expected: expected.to_string(),
    }
}

impl Command {
    /// Parse a command from user input
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return Err(ForgeError::CommandParse(format!(
                "'{}' is not a command. Commands start with '/'",
                input
            )));
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        let cmd = parts[0];
        let args = &parts[1..];

        let alias_only = |expected: &str| -> Result<String> {
            match args {
                [alias] => Ok(alias.to_string()),
                _ => Err(syntax(cmd, expected)),
            }
        };

        let command_type = match cmd {
            "/engines" => CommandType::Engines,
            "/providers" => CommandType::Providers,
            "/open" => {
                let expected = "/open <alias> <engine> <name> [location] [data_source]";
                if !(3..=5).contains(&args.len()) {
                    return Err(syntax(cmd, expected));
                }
                CommandType::Open {
                    alias: args[0].to_string(),
                    engine: args[1].parse()?,
                    name: args[2].to_string(),
                    location: args.get(3).map(PathBuf::from),
                    data_source: args.get(4).map(|s| s.to_string()),
                }
            }
            "/create" => CommandType::Create { alias: alias_only("/create <alias>")? },
            "/attach" => CommandType::Attach { alias: alias_only("/attach <alias>")? },
            "/exists" => CommandType::Exists { alias: alias_only("/exists <alias>")? },
            "/delete" => CommandType::Delete { alias: alias_only("/delete <alias>")? },
            "/files" => CommandType::Files { alias: alias_only("/files <alias>")? },
            "/tables" => CommandType::Tables { alias: alias_only("/tables <alias>")? },
            "/rename" => match args {
                [alias, new_name] => CommandType::Rename {
                    alias: alias.to_string(),
                    new_name: new_name.to_string(),
                },
                _ => return Err(syntax(cmd, "/rename <alias> <new_name>")),
            },
            "/copy" => match args {
                [alias, target] | [alias, target, _] => CommandType::Copy {
                    alias: alias.to_string(),
                    target: target.to_string(),
                    copy_alias: args.get(2).map(|s| s.to_string()),
                },
                _ => return Err(syntax(cmd, "/copy <alias> <target_name> [copy_alias]")),
            },
            "/ddl" => match args {
                [engine, path] => CommandType::Ddl {
                    engine: engine.parse()?,
                    schema_path: PathBuf::from(path),
                },
                _ => return Err(syntax(cmd, "/ddl <engine> <schema.json>")),
            },
            "/help" => CommandType::Help,
            "/quit" | "/exit" => CommandType::Quit,
            _ => return Err(ForgeError::UnknownCommand(cmd.to_string())),
        };

        Ok(Command { command_type })
    }
}

fn engines_table(state: &AppState) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Id", "Engine", "Hosting", "Extension", "Capabilities", "Enabled"]);

    for kind in EngineKind::ALL {
        let descriptor = kind.descriptor();
        let caps = &descriptor.capabilities;
        let flags: Vec<&str> = [
            (caps.can_enumerate_servers, "servers"),
            (caps.can_enumerate_databases, "databases"),
            (caps.can_enumerate_potential_databases, "potential"),
            (caps.can_enumerate_tables, "tables"),
            (caps.can_enumerate_columns, "columns"),
            (caps.can_attach, "attach"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();

        table.add_row(vec![
            kind.id().to_string(),
            descriptor.name.to_string(),
            match descriptor.hosting {
                Hosting::Server => "server".to_string(),
                Hosting::File => "file".to_string(),
            },
            descriptor.default_extension.to_string(),
            flags.join(", "),
            if state.registry.is_enabled(kind) { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

fn providers_table(state: &AppState) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Id", "Name", "Engine", "Mechanism", "Extension"]);

    let resolver = state.registry.resolver();
    for (id, descriptor) in resolver.providers() {
        table.add_row(vec![
            id.short(),
            descriptor.display_name(),
            descriptor.engine.map(|e| e.id().to_string()).unwrap_or_default(),
            descriptor.mechanism.map(|m| m.to_string()).unwrap_or_default(),
            resolver.default_file_ext(id).unwrap_or_default(),
        ]);
    }
    table.to_string()
}

fn files_table(handle: &DatabaseHandle) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Role", "Logical name", "Path", "Present"]);
    for file in handle.physical_files() {
        table.add_row(vec![
            file.role.to_string(),
            file.logical_name.clone(),
            file.path.display().to_string(),
            if file.path.exists() { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.to_string()
}

/// Handle a command and return the result message
pub async fn handle_command(command: &Command, state: SharedState) -> Result<String> {
    match &command.command_type {
        CommandType::Engines => Ok(engines_table(&*state.read().await)),
        CommandType::Providers => Ok(providers_table(&*state.read().await)),
        CommandType::Open {
            alias,
            engine,
            name,
            location,
            data_source,
        } => {
            let mut guard = state.write().await;
            guard.registry.engine(*engine)?;
            let provider = guard.default_provider(*engine)?;
            let directory = location.clone().unwrap_or_else(|| match engine.descriptor().hosting {
                Hosting::Server => guard.data_directory(),
                Hosting::File => PathBuf::from("."),
            });

            let mut handle = DatabaseHandle::new(*engine, provider, name.as_str(), directory);
            if let Some(ds) = data_source {
                handle = handle.with_data_source(ds.as_str());
            }
            if let Ok(user) = std::env::var(USER_VAR) {
                let password = std::env::var(PASSWORD_VAR).unwrap_or_default();
                handle = handle.with_credentials(Credentials::new(user, password));
            }
            let primary = handle.primary_file().path.display().to_string();
            guard.insert_handle(alias.as_str(), handle);
            Ok(format!("✓ Opened {} as '{}' ({})", name, alias, primary))
        }
        CommandType::Create { alias } => {
            let (orchestrator, handle) = {
                let guard = state.read().await;
                (guard.orchestrator.clone(), guard.handle(alias)?.clone())
            };
            orchestrator.create(&handle).await?;
            Ok(format!("✓ Created database {}", handle.name))
        }
        CommandType::Attach { alias } => {
            let (orchestrator, handle) = {
                let guard = state.read().await;
                (guard.orchestrator.clone(), guard.handle(alias)?.clone())
            };
            orchestrator.attach(&handle).await?;
            Ok(format!("✓ Attached database {}", handle.name))
        }
        CommandType::Exists { alias } => {
            let (orchestrator, handle) = {
                let guard = state.read().await;
                (guard.orchestrator.clone(), guard.handle(alias)?.clone())
            };
            let exists = orchestrator.exists(&handle).await?;
            Ok(format!(
                "{} {}",
                handle.name,
                if exists { "exists" } else { "does not exist" }
            ))
        }
        CommandType::Delete { alias } => {
            let (orchestrator, handle) = {
                let guard = state.read().await;
                (guard.orchestrator.clone(), guard.handle(alias)?.clone())
            };
            orchestrator.delete(&handle).await?;
            Ok(format!("✓ Deleted database {}", handle.name))
        }
        CommandType::Rename { alias, new_name } => {
            let (orchestrator, mut handle) = {
                let guard = state.read().await;
                (guard.orchestrator.clone(), guard.handle(alias)?.clone())
            };
            let old_name = handle.name.clone();
            let result = orchestrator.rename(&mut handle, &RenameTarget::new(new_name.as_str())).await;
            // the handle reflects every completed step, even on failure
            *state.write().await.handle_mut(alias)? = handle;
            result?;
            Ok(format!("✓ Renamed {} to {}", old_name, new_name))
        }
        CommandType::Copy {
            alias,
            target,
            copy_alias,
        } => {
            let (orchestrator, handle) = {
                let guard = state.read().await;
                (guard.orchestrator.clone(), guard.handle(alias)?.clone())
            };
            let copy = orchestrator.copy(&handle, &CopyTarget::new(target.as_str())).await?;
            let copy_alias = copy_alias.clone().unwrap_or_else(|| target.clone());
            state.write().await.insert_handle(copy_alias.as_str(), copy);
            Ok(format!("✓ Copied {} to {} (opened as '{}')", handle.name, target, copy_alias))
        }
        CommandType::Files { alias } => {
            let guard = state.read().await;
            Ok(files_table(guard.handle(alias)?))
        }
        CommandType::Tables { alias } => {
            let (engine, handle) = {
                let guard = state.read().await;
                let handle = guard.handle(alias)?.clone();
                (guard.registry.engine(handle.engine)?, handle)
            };
            let tables = engine.enumerate_tables(&handle).await?;
            if tables.is_empty() {
                Ok(format!("{} has no tables", handle.name))
            } else {
                Ok(tables.join("\n"))
            }
        }
        CommandType::Ddl { engine, schema_path } => {
            let content = std::fs::read_to_string(schema_path)?;
            let schema: TableSchema = serde_json::from_str(&content)?;
            let engine = state.read().await.registry.engine(*engine)?;
            engine.create_table_ddl(&schema)
        }
        CommandType::Help => Ok(HELP.to_string()),
        CommandType::Quit => Ok("Goodbye!".to_string()),
    }
}

const HELP: &str = r#"
dbforge Commands

Engines and providers:
  /engines                                   List engines and capabilities
  /providers                                 List registered providers

Databases:
  /open <alias> <engine> <name> [dir] [ds]   Describe a database (server credentials
                                             come from DBFORGE_USER / DBFORGE_PASSWORD)
  /create <alias>                            Create the database
  /attach <alias>                            Attach existing files (server engines)
  /exists <alias>                            Check whether the database exists
  /delete <alias>                            Drop the database and delete its files
  /rename <alias> <new_name>                 Rename the database and its files
  /copy <alias> <target> [copy_alias]        Copy the database
  /files <alias>                             Show the physical files
  /tables <alias>                            List tables

Schema:
  /ddl <engine> <schema.json>                Generate CREATE TABLE for an engine

Session:
  /help                                      Show this help message
  /quit, /exit                               Exit dbforge

Examples:
  /open app sqlite Catalog ./data
  /create app
  /copy app CatalogBackup backup
  /ddl access customers.json
"#;

/// Format an error for display
pub fn format_error(error: &ForgeError) -> String {
    error.format_detailed()
}
