pub mod config;
pub mod db;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod storage;
pub mod types;
pub mod utils;
