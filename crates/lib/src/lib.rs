//! hookchat core library — webhook relay, response normalization, gateway, and chat client
//! used by the CLI.

pub mod client;
pub mod config;
pub mod gateway;
pub mod relay;
