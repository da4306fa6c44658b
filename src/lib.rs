//! Keep English copies of forge issues, pull requests and discussions.
//!
//! The webhook listener ([`server`]) accepts deliveries, translates the
//! objects they reference in place on the forge ([`orchestrator`]) and relays
//! the rewritten payloads to downstream sinks ([`forward`]). The same
//! pipeline backs the one-shot binaries under `src/bin`.

pub mod classifier;
pub mod cli;
pub mod completion;
pub mod config;
pub mod dispatch;
pub mod events;
pub mod forward;
pub mod github;
pub mod marker;
pub mod orchestrator;
pub mod refine;
pub mod retry;
pub mod security;
pub mod segment;
pub mod server;
pub mod translate;

#[cfg(test)]
pub(crate) mod test_support;
