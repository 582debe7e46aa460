pub mod analyzers;
pub mod config;
pub mod error;
pub mod fetch;
pub mod forecast;
pub mod geo;
pub mod loader;
pub mod output;
pub mod parser;
pub mod product;
pub mod stats;
