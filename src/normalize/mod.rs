//! Pure transforms from raw portal responses to domain records.
//!
//! Nothing here performs I/O; every function takes response text and either
//! returns records or fails with `Parse`/`MalformedPayload`. Retrying a
//! structurally malformed payload cannot help, so these failures propagate
//! unchanged.

pub mod cards;
pub mod investments;
pub mod statement;
