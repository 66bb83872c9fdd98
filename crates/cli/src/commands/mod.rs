//! CLI command implementations.

pub mod demo;
pub mod orders;

use forkful_client::config::ConfigError;
use forkful_client::gateway::GatewayError;
use forkful_client::session::Session;
use forkful_client::AppError;
use forkful_core::{Email, EmailError, Role, UserId};
use thiserror::Error;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Environment configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP gateway could not be built.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Invalid email on the command line.
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// An order operation failed.
    #[error(transparent)]
    App(#[from] AppError),
}

/// Build the session the external auth flow would have issued.
///
/// # Errors
///
/// Returns [`CommandError::InvalidEmail`] for a malformed email.
pub fn session(user_id: UserId, email: &str, role: Role) -> Result<Session, CommandError> {
    let email = Email::parse(email)?;
    Ok(Session::new(user_id, email, [role.authority().to_string()]))
}
