pub mod commands;
pub mod config;
pub mod db;
pub mod queries;
pub mod routes;
pub mod tasks;
pub mod types;
