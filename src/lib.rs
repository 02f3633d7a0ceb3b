pub mod api;
pub mod config;
pub mod generator;
pub mod readings;
pub mod store;
