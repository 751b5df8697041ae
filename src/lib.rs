pub mod api;
pub mod backend;
pub mod cli;
pub mod config;
pub mod experiment;
pub mod prompt;
pub mod template;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use api::client::Client;
pub use api::id::{ClusterId, RunId};
