//! Deployment progress simulator
//!
//! Tracks deployments of GitHub repositories to cloud providers and
//! simulates their progress tick by tick, with a local HTTP surface for
//! creating and polling them.

pub mod app;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod polling;
pub mod registry;
pub mod server;
pub mod simulator;
pub mod storage;
pub mod store;
pub mod utils;
