pub mod config;
pub mod mode;
pub mod models;
pub mod optimize;
pub mod sessions;
pub mod template;
