//! Wire models served by the deploysim HTTP API

pub mod models;
