pub mod auth;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod limits;
pub mod maintenance;
pub mod model;
pub mod notify;
pub mod observability;
pub mod tenant;
pub mod wal;
