//! Transport layer for the submission client.

pub mod http;

pub use http::HttpTransport;
