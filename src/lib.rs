// Core modules
pub mod alerts;
pub mod api;
pub mod config;
pub mod indicators;
pub mod models;
pub mod persistence;
pub mod report;
pub mod scanner;
pub mod strategy;
pub mod universe;

// Re-export commonly used types
pub use api::{DataError, PriceProvider, YahooClient};
pub use models::*;
pub use strategy::{generate_signal, SignalConfig, Strategy};

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
