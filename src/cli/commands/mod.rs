pub mod audit_cmd;
pub mod policy_cmd;
pub mod sandbox_cmd;
pub mod sanitize_cmd;
pub mod secret;
