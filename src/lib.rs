pub mod app;
pub mod cli;
pub mod config;
pub mod feedback;
pub mod storage;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use feedback::{EditSession, FeedbackCollection, FeedbackSink, Locator};
