//! NUHire classroom simulation server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod notes;
pub mod offers;
pub mod progress;
pub mod realtime;
pub mod routes;
pub mod state;
pub mod users;
pub mod votes;
