//! REPL commands prefixed with `/`.
//!
//! Commands implement the [`Command`] trait and are registered in a
//! [`CommandRegistry`], which handles dispatch, alias resolution and the
//! generated `/help` listing. Anything that is not a command is sent to the
//! agent.

mod clear;
mod error;
mod help;
mod logout;
mod quit;
mod whoami;

use async_trait::async_trait;
use std::sync::Arc;

use crate::chat::ChatSession;
use crate::store::TokenStore;

/// What commands can see of the running session.
pub struct SessionInfo<'a> {
    pub agent: &'a str,
    pub relay: &'a str,
    pub auth_status: &'a str,
    pub session_id: &'a str,
    pub chat: Option<&'a ChatSession>,
    pub store: Option<&'a dyn TokenStore>,
}

/// What the REPL should do after a command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Not a command; send the input to the agent.
    NotACommand,
    /// Command handled, keep reading input.
    Handled,
    /// The stored token is gone. The REPL cannot continue without one.
    LoggedOut,
    Quit,
}

#[async_trait]
pub trait Command: Send + Sync {
    /// Primary name, e.g. `"/whoami"`.
    fn name(&self) -> &str;

    fn aliases(&self) -> &[&str] {
        &[]
    }

    /// One-line description for `/help`.
    fn description(&self) -> &str;

    async fn execute(&self, info: &SessionInfo<'_>) -> CommandResult;
}

pub struct CommandRegistry {
    commands: Vec<Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Registry with all built-in commands.
    pub fn new() -> Self {
        let commands: Vec<Arc<dyn Command>> = vec![
            Arc::new(help::HelpCommand),
            Arc::new(whoami::WhoamiCommand),
            Arc::new(clear::ClearCommand),
            Arc::new(error::ErrorCommand),
            Arc::new(logout::LogoutCommand),
            Arc::new(quit::QuitCommand),
        ];
        Self { commands }
    }

    pub fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.push(command);
    }

    /// Run the command matching `input`, or return `NotACommand`.
    pub async fn dispatch(&self, input: &str, info: &SessionInfo<'_>) -> CommandResult {
        let cmd = input.trim();

        for command in &self.commands {
            if cmd == command.name() || command.aliases().contains(&cmd) {
                // /help lists the registry itself
                if command.name() == help::NAME {
                    print!("{}", self.help_text());
                    return CommandResult::Handled;
                }
                return command.execute(info).await;
            }
        }

        if cmd.starts_with('/') {
            println!("unknown command: {cmd}");
            println!("type /help for available commands");
            return CommandResult::Handled;
        }

        CommandResult::NotACommand
    }

    pub fn help_text(&self) -> String {
        let entries: Vec<(String, &str)> = self
            .commands
            .iter()
            .map(|c| (format_label(c.name(), c.aliases()), c.description()))
            .collect();

        let width = entries
            .iter()
            .map(|(label, _)| label.len())
            .max()
            .unwrap_or(10);

        entries
            .iter()
            .map(|(label, desc)| format!("  {label:<width$}  {desc}\n"))
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name()).collect()
    }

    /// Every name and alias, for duplicate detection.
    pub fn all_triggers(&self) -> Vec<&str> {
        let mut triggers = Vec::new();
        for cmd in &self.commands {
            triggers.push(cmd.name());
            triggers.extend_from_slice(cmd.aliases());
        }
        triggers
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn format_label(name: &str, aliases: &[&str]) -> String {
    if aliases.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, aliases.join(", "))
    }
}
