// sketchdb Engine - Core module structure
pub mod cli;
pub mod config;
pub mod store;

pub use config::StoreConfig;
pub use store::Store;
