//! Security policy — profile baselines resolved against per-site overrides.

pub mod profile;
pub mod resolver;

pub use profile::{PolicyOverride, PolicySnapshot, SecurityProfile, MAX_LOGIN_DURATION_SECS};
pub use resolver::SecurityPolicy;
