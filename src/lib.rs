//! Library crate for pitchlive-back: phase machine, broadcast hubs, SSE streams and storage.

pub mod config;
pub mod dao;
pub mod dto;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
