//! One-time-token prompting.
//!
//! The portal's login requires a token from the account holder's phone app.
//! Acquisition blocks on this prompt with no timeout; a human is expected to
//! answer.

use async_trait::async_trait;

use crate::error::{Error, Result};

#[async_trait]
pub trait OtpPrompter: Send + Sync {
    async fn one_time_token(&self) -> Result<String>;
}

/// Reads the token from the terminal.
pub struct TerminalOtpPrompter;

#[async_trait]
impl OtpPrompter for TerminalOtpPrompter {
    async fn one_time_token(&self) -> Result<String> {
        let token = tokio::task::spawn_blocking(|| {
            dialoguer::Input::<String>::new()
                .with_prompt("Enter the iToken shown in your Itaú app")
                .interact_text()
        })
        .await
        .map_err(|e| Error::Acquisition(format!("token prompt task failed: {e}")))?
        .map_err(|e| Error::Acquisition(format!("token prompt failed: {e}")))?;

        Ok(token.trim().to_string())
    }
}

/// Returns a canned token. Used by tests and non-interactive callers.
pub struct FixedOtpPrompter(pub String);

#[async_trait]
impl OtpPrompter for FixedOtpPrompter {
    async fn one_time_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
