//! returns-hex: returns admin core (workflow, analytics) plus the inbound HTTP adapter

pub mod config;
pub mod errors;

pub mod application;

pub use returns_types::{domain, ports};

pub mod inbound; // HTTP adapter (server + handlers)
