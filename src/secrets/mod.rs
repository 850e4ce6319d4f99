//! Secrets façade — cached site credentials and the companion cookie store.

pub mod cache;
pub mod cookies;
pub mod facade;

pub use cache::{SecretCache, DEFAULT_CAPACITY, DEFAULT_TTL, MAX_TTL};
pub use cookies::{Cookie, CookieStore, VaultCookieStore};
pub use facade::SecretsFacade;
