pub mod cli;
pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod scheduler;
pub mod server;
pub mod task;
pub mod verify;

#[cfg(test)]
mod testutil;
