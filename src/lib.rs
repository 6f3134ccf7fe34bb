pub mod cache;
pub mod config;
pub mod nws;
pub mod render;
pub mod schema;
pub mod update;
pub mod web;
