//! Welcome screen, startup banner and farewell.

use crate::consts::{AUTHOR, HOMEPAGE, REPO};

/// Session details for the banner shown once the gate opens.
pub struct BannerInfo<'a> {
    pub agent: &'a str,
    pub relay: &'a str,
    pub auth_status: &'a str,
    pub session_id: &'a str,
    pub store: &'a str,
}

/// Shown while the gate is closed.
pub fn print_welcome() {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║             T A P G U N               ║
   ╚═══════════════════════════════════════╝

   Thanks for loading the TAPGUN
   Before continuing you must login
"#
    );
}

pub fn print_banner(info: &BannerInfo) {
    println!(
        r#"
   ╔═══════════════════════════════════════╗
   ║             T A P G U N               ║
   ║        talk to your agent, safely     ║
   ╚═══════════════════════════════════════╝

   version   {}
   by        {}
   home      {}
   repo      {}
   agent     {}
   relay     {}
   auth      {}
   session   {}
   token     {}

   type /help for commands, /clear to start over
"#,
        env!("CARGO_PKG_VERSION"),
        AUTHOR,
        HOMEPAGE,
        REPO,
        info.agent,
        info.relay,
        info.auth_status,
        info.session_id,
        info.store,
    );
}

/// Print how many messages were exchanged, then say goodbye.
pub fn print_session_summary(messages: usize) {
    if messages > 0 {
        println!("session: {messages} messages");
    }
    println!("goodbye.");
}
