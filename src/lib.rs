pub mod config;
pub mod error;
pub mod extractor;
pub mod fetch;
pub mod model;
pub mod output;
pub mod search;
