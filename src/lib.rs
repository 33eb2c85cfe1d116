//! tapgun: a terminal chat client for a hosted agent, gated behind an
//! identity login, plus the token relay that keeps the secrets server-side.

pub mod agent;
pub mod auth;
pub mod banner;
pub mod chat;
pub mod commands;
pub mod config;
pub mod consts;
pub mod error;
pub mod events;
pub mod gate;
pub mod relay;
pub mod spinner;
pub mod store;

pub use error::{Error, Result};
