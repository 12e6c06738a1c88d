pub mod api;
pub mod config;
pub mod engine;
pub mod entities;
pub mod error;
pub mod store;
pub mod sync;

pub mod simulation;
