//! Configuration Module
//!
//! Configuration loading for the feed client and its binary.

mod settings;

pub use settings::{
    AccessToken, AppConfig, ConfigError, FeedClientConfig, ServerSettings, TOKEN_QUERY_PARAM,
};
