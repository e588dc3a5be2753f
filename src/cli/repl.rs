//! REPL implementation
//!
//! This module implements the interactive Read-Eval-Print Loop for dbforge.

use crate::cli::commands::{self, format_error, Command};
use crate::config::SharedState;
use crate::error::{ForgeError, Result};
use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::Context;
use rustyline::Helper;
use rustyline::{CompletionType, Config, Editor};
use std::path::PathBuf;
use tracing::debug;

const COMMANDS: [&str; 16] = [
    "/engines",
    "/providers",
    "/open",
    "/create",
    "/attach",
    "/exists",
    "/delete",
    "/rename",
    "/copy",
    "/files",
    "/tables",
    "/ddl",
    "/help",
    "/quit",
    "/exit",
    "/",
];

/// dbforge command completer
struct ForgeCompleter;

impl Completer for ForgeCompleter {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        _pos: usize,
        _ctx: &Context<'_>,
    ) -> std::result::Result<(usize, Vec<String>), ReadlineError> {
        if line.starts_with('/') && !line.contains(' ') {
            let matches: Vec<String> = COMMANDS
                .iter()
                .filter(|cmd| cmd.len() > 1 && cmd.starts_with(line))
                .map(|s| s.to_string())
                .collect();
            Ok((0, matches))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Hinter for ForgeCompleter {
    type Hint = String;
}

impl Highlighter for ForgeCompleter {}

impl Validator for ForgeCompleter {}

impl Helper for ForgeCompleter {}

/// dbforge REPL
pub struct Repl {
    /// The rustyline editor
    editor: Editor<ForgeCompleter, DefaultHistory>,
    /// Whether the REPL should continue running
    running: bool,
    /// Shared application state
    state: SharedState,
    history_path: PathBuf,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(state: SharedState) -> Result<Self> {
        let config = Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .auto_add_history(true)
            .build();

        let mut editor = Editor::<ForgeCompleter, DefaultHistory>::with_config(config)
            .map_err(|e| ForgeError::Config(format!("Failed to initialize editor: {}", e)))?;
        editor.set_helper(Some(ForgeCompleter));

        let history_path = dirs::home_dir()
            .map(|p| p.join(".dbforge").join("history"))
            .unwrap_or_else(|| ".dbforge-history".into());

        if let Err(e) = editor.load_history(&history_path) {
            debug!(error = %e, "No REPL history loaded");
        }

        Ok(Self {
            editor,
            running: true,
            state,
            history_path,
        })
    }

    /// Run the REPL loop
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        while self.running {
            match self.editor.readline("dbforge> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    if line == "/" {
                        self.show_all_commands();
                        continue;
                    }

                    match Command::parse(line) {
                        Ok(command) => self.handle_command(command).await,
                        Err(e) => println!("{}", format_error(&e)),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!();
                    self.running = false;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    self.running = false;
                }
            }
        }

        self.save_history();
        Ok(())
    }

    fn save_history(&mut self) {
        if let Some(parent) = self.history_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = self.editor.save_history(&self.history_path) {
            debug!(error = %e, "Could not save REPL history");
        }
    }

    fn print_welcome(&self) {
        println!();
        println!("dbforge v{}", env!("CARGO_PKG_VERSION"));
        println!("Database lifecycle and schema translation");
        println!();
        println!("Type / for available commands, or /help for more information.");
        println!();
    }

    fn show_all_commands(&self) {
        println!();
        println!("Available Commands:");
        for cmd in COMMANDS.iter().filter(|c| c.len() > 1) {
            println!("  {}", cmd);
        }
        println!();
    }

    /// Handle a command
    async fn handle_command(&mut self, command: Command) {
        if command.command_type == commands::CommandType::Quit {
            self.running = false;
        }
        match commands::handle_command(&command, self.state.clone()).await {
            Ok(msg) => println!("{}", msg),
            Err(e) => println!("{}", format_error(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{create_shared_state, AppState, ForgeConfig};

    #[test]
    fn test_repl_creation() {
        let state = create_shared_state(AppState::from_config(ForgeConfig::new()).unwrap());
        let repl = Repl::new(state).unwrap();
        assert!(repl.running);
    }

    #[test]
    fn test_completion_lists_matching_commands() {
        let history = DefaultHistory::new();
        let ctx = Context::new(&history);
        let (_, matches) = ForgeCompleter.complete("/co", 3, &ctx).unwrap();
        assert_eq!(matches, vec!["/copy".to_string()]);
    }
}
