use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};
use crate::auth;

pub struct LogoutCommand;

#[async_trait]
impl Command for LogoutCommand {
    fn name(&self) -> &str {
        "/logout"
    }

    fn description(&self) -> &str {
        "forget the stored token and exit"
    }

    async fn execute(&self, info: &SessionInfo<'_>) -> CommandResult {
        let Some(store) = info.store else {
            eprintln!("  ✗ token storage not available");
            return CommandResult::Handled;
        };
        if let Err(e) = auth::logout(store) {
            eprintln!("  ✗ failed to remove token: {e}");
            return CommandResult::Handled;
        }
        println!("  ✓ logged out");
        CommandResult::LoggedOut
    }
}
