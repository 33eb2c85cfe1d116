use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct ClearCommand;

#[async_trait]
impl Command for ClearCommand {
    fn name(&self) -> &str {
        "/clear"
    }

    fn aliases(&self) -> &[&str] {
        &["/new"]
    }

    fn description(&self) -> &str {
        "clear the conversation (you stay logged in)"
    }

    async fn execute(&self, info: &SessionInfo<'_>) -> CommandResult {
        let Some(chat) = info.chat else {
            eprintln!("  ✗ no conversation to clear");
            return CommandResult::Handled;
        };
        if chat.is_in_flight() {
            eprintln!("  ✗ still waiting on the agent");
            return CommandResult::Handled;
        }

        chat.clear_chat();
        println!("  ✓ conversation cleared");
        CommandResult::Handled
    }
}
