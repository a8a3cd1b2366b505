pub mod analytics;
pub mod return_service;
