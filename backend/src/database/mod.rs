pub mod manager;
pub mod models;
pub mod repositories;
pub mod setup;

pub use manager::DatabaseManager;
