//! Local HTTP read/write surface

pub mod handlers;
pub mod responses;
pub mod serve;
pub mod state;
