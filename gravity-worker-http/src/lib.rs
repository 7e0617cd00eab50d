#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod json;
pub mod transport;
mod types;

pub use client::Gravity;
pub use config::HttpConfig;
pub use json::{encode_json, PayloadJsonExt};
pub use transport::HttpTransport;
