// src/auth/mod.rs
//
// Credential checks and bearer-token sessions used by the HTTP layer.

pub mod extract;
pub mod password;
pub mod sessions;

pub use extract::{AdminUser, CurrentUser};
pub use password::{generate_password, hash_password, verify_password};
pub use sessions::SessionStore;
