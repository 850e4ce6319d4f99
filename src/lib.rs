pub mod audit;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod logging;
pub mod policy;
pub mod redact;
pub mod sandbox;
pub mod sanitize;
pub mod secrets;
pub mod shield;
pub mod vault;

#[cfg(feature = "keyring-store")]
pub mod keyring;
