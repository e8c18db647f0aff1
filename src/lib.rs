pub mod category;
pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod generator;
pub mod icons;
pub mod model;
pub mod refresh;
pub mod scanner;
pub mod watcher;

pub use error::{Error, Result};
