//! Configuration module for SpiderFrog
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use spiderfrog::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spiderfrog.toml")).unwrap();
//! println!("Politeness delay: {}ms", config.crawler.politeness_delay_ms);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, FetchConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
