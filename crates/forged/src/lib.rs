//! forged - autonomous software-development workflow engine daemon.
//!
//! Library components for the daemon process: the workflow coordinator
//! (C7) and its collaborators (C2-C6), plus the HTTP control-plane server.

pub mod agent_factory;
pub mod agent_runtime;
pub mod alignment;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod events;
pub mod server;
pub mod store;
