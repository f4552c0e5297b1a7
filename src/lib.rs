pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod models;
pub mod normalize;
pub mod service;
pub mod session;
