use async_trait::async_trait;

use super::{Command, CommandResult, SessionInfo};

pub struct WhoamiCommand;

#[async_trait]
impl Command for WhoamiCommand {
    fn name(&self) -> &str {
        "/whoami"
    }

    fn description(&self) -> &str {
        "show agent, relay, session and auth status"
    }

    async fn execute(&self, info: &SessionInfo<'_>) -> CommandResult {
        println!("  agent     {}", info.agent);
        println!("  relay     {}", info.relay);
        println!("  session   {}", info.session_id);
        println!("  auth      {}", info.auth_status);
        if let Some(chat) = info.chat {
            println!("  messages  {}", chat.len());
        }
        CommandResult::Handled
    }
}
