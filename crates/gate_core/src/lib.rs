pub mod config;
pub mod http;
pub mod paths;

pub use config::Config;
pub use http::build_client;
