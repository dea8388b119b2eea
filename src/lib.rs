pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod handler;
pub mod logging;
pub mod models;
pub mod output;
pub mod random;
pub mod request;
pub mod server;
pub mod state;
