pub mod commerce_platform;
pub mod returns_repository;
