pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod languages;
pub mod logging;
pub mod model;
pub mod parser;
pub mod symbols;
pub mod util;
pub mod watch;

pub use error::{IndexError, Result};
