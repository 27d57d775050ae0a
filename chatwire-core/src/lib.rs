pub mod config;
pub mod decoder;
pub mod error;
pub mod http_client;
pub mod model;
pub mod normalizer;
pub mod reducer;
pub mod session;
pub mod stream;
pub mod telemetry;
pub mod transcript;
pub mod transport;
