//! Integration test for the dbforge CLI
//!
//! Drives the slash commands end to end against SQLite files in a temporary
//! directory.

use dbforge::cli::commands::{handle_command, Command, CommandType};
use dbforge::config::{create_shared_state, AppState, ForgeConfig, SharedState};
use dbforge::provider::EngineKind;
use dbforge::ForgeError;
use std::fs;
use tempfile::tempdir;

fn state() -> SharedState {
    create_shared_state(AppState::from_config(ForgeConfig::new()).unwrap())
}

async fn run(state: &SharedState, input: &str) -> dbforge::Result<String> {
    let command = Command::parse(input)?;
    handle_command(&command, state.clone()).await
}

#[tokio::test]
async fn test_command_parsing() {
    let cmd = Command::parse("/open orders sqlserver Orders /data db01").unwrap();
    assert!(matches!(
        cmd.command_type,
        CommandType::Open {
            engine: EngineKind::SqlServer,
            ..
        }
    ));

    let cmd = Command::parse("/ddl jet customers.json").unwrap();
    assert!(matches!(
        cmd.command_type,
        CommandType::Ddl {
            engine: EngineKind::Access,
            ..
        }
    ));

    assert!(Command::parse("show all users").is_err());
}

#[tokio::test]
async fn test_sqlite_session() {
    let dir = tempdir().unwrap();
    let state = state();
    let location = dir.path().display().to_string();

    let opened = run(&state, &format!("/open app sqlite Catalog {}", location)).await.unwrap();
    assert!(opened.contains("Catalog.db"));

    assert_eq!(run(&state, "/exists app").await.unwrap(), "Catalog does not exist");
    run(&state, "/create app").await.unwrap();
    assert_eq!(run(&state, "/exists app").await.unwrap(), "Catalog exists");
    assert_eq!(run(&state, "/tables app").await.unwrap(), "Catalog has no tables");

    run(&state, "/copy app CatalogBackup backup").await.unwrap();
    assert!(dir.path().join("CatalogBackup.db").is_file());
    assert_eq!(run(&state, "/exists backup").await.unwrap(), "CatalogBackup exists");

    run(&state, "/rename app Inventory").await.unwrap();
    assert!(dir.path().join("Inventory.db").is_file());
    assert!(!dir.path().join("Catalog.db").exists());
    assert_eq!(state.read().await.handle("app").unwrap().name, "Inventory");

    let files = run(&state, "/files app").await.unwrap();
    assert!(files.contains("Inventory.db"));

    run(&state, "/delete backup").await.unwrap();
    assert!(!dir.path().join("CatalogBackup.db").exists());
    run(&state, "/delete backup").await.unwrap();
}

#[tokio::test]
async fn test_unknown_alias_and_unsupported_attach() {
    let dir = tempdir().unwrap();
    let state = state();

    let err = run(&state, "/create nothing").await.unwrap_err();
    assert!(matches!(err, ForgeError::NotFound(_)));

    run(&state, &format!("/open app sqlite Catalog {}", dir.path().display()))
        .await
        .unwrap();
    let err = run(&state, "/attach app").await.unwrap_err();
    assert!(matches!(err, ForgeError::UnsupportedOperation { .. }));
}

#[tokio::test]
async fn test_ddl_command() {
    let dir = tempdir().unwrap();
    let schema_path = dir.path().join("customers.json");
    fs::write(
        &schema_path,
        r#"{
            "name": "Customers",
            "columns": [
                {"name": "Id", "type": "int32", "nullable": false, "identity": {"seed": 1, "step": 1}},
                {"name": "Notes", "type": "string"}
            ],
            "constraints": [{"kind": "primary-key", "columns": ["Id"]}]
        }"#,
    )
    .unwrap();

    let state = state();
    let ddl = run(&state, &format!("/ddl access {}", schema_path.display())).await.unwrap();
    assert!(ddl.contains("Id COUNTER NOT NULL PRIMARY KEY"));
    assert!(ddl.contains("Notes MEMO"));

    let ddl = run(&state, &format!("/ddl sqlserver {}", schema_path.display())).await.unwrap();
    assert!(ddl.contains("Id INT IDENTITY NOT NULL PRIMARY KEY"));
    assert!(ddl.contains("Notes NVARCHAR(MAX)"));
}

#[tokio::test]
async fn test_disabled_engine_rejected() {
    let mut config = ForgeConfig::new();
    config.engines.disabled.push(EngineKind::Access);
    let state = create_shared_state(AppState::from_config(config).unwrap());

    let err = run(&state, "/open nw access Northwind").await.unwrap_err();
    assert!(matches!(err, ForgeError::UnsupportedOperation { .. }));
    assert!(run(&state, "/engines").await.unwrap().contains("SQLite"));
}
