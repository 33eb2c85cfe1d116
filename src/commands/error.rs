use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

/// The transcript only ever shows a generic failure; this shows why.
pub struct ErrorCommand;

#[async_trait]
impl Command for ErrorCommand {
    fn name(&self) -> &str {
        "/error"
    }

    fn description(&self) -> &str {
        "show why the last message failed"
    }

    async fn execute(&self, info: &SessionInfo<'_>) -> CommandResult {
        match info.chat.and_then(|chat| chat.last_error()) {
            Some(reason) => println!("  last error  {reason}"),
            None => println!("  no errors"),
        }
        CommandResult::Handled
    }
}
