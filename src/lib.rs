pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod handlers;
pub mod model;
pub mod server;
pub mod slug;
