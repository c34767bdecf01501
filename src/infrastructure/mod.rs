pub mod config;
pub mod credential_store;
pub mod error;
pub mod memory_store;
pub mod rest_client;
pub mod sqlite_store;
pub mod table_client;
