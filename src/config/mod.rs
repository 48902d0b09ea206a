// src/config/mod.rs
pub mod server;
pub mod settings;

pub use server::ServerConfig;
pub use settings::{AppSettings, SettingsStore};
