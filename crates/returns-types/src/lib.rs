//! returns-types: domain entities and ports shared by the returns service adapters.

pub mod domain;
pub mod ports;
