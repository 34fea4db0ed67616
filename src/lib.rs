pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod executor;
pub mod logging;
pub mod projection;
pub mod session;
pub mod settings;
pub mod store;
pub mod types;
pub mod views;
