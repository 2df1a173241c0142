pub mod checker;
pub mod config;
pub mod redis;
pub mod types;
