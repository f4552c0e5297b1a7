//! Failure taxonomy for the scraper.
//!
//! The variants mirror how each failure is handled: validation and
//! acquisition failures are fatal, expiry is recoverable by re-acquisition
//! (up to a bound), and payload failures are surfaced without retry since a
//! structurally malformed response will not change on a second attempt.

use crate::session::Operation;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed account identity. Reported immediately, never retried.
    #[error("invalid account identity: {0}")]
    Validation(String),

    /// A UI step's target never appeared, or a required artifact was never
    /// observed before navigation finished. The browser state is unknown, so
    /// there is no automatic retry.
    #[error("session acquisition failed: {0}")]
    Acquisition(String),

    /// The portal rejected the session artifacts. The client converts this
    /// into a re-acquisition and retry, up to the bound.
    #[error("session expired (status {status})")]
    SessionExpired { status: u16 },

    /// Re-acquisition was attempted the maximum number of times and the
    /// portal still rejected the call.
    #[error("gave up after {attempts} re-authentications (last status {last_status})")]
    MaxRetriesExceeded { attempts: u32, last_status: u16 },

    /// The opcode for this operation was never harvested. Fails the single
    /// operation, not the whole session.
    #[error("no opcode was captured for the {0} operation; re-run login")]
    MissingOperationCode(Operation),

    /// The embedded-JSON sentinel was not found in the response text.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The endpoint returned success but the body is missing expected fields
    /// or carries values this system cannot interpret.
    #[error("unexpected response shape: {0}")]
    Parse(String),

    #[error("http transport error")]
    Http(#[from] reqwest::Error),

    /// Reading or writing the on-disk session files failed.
    #[error("session store error: {0}")]
    Store(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
