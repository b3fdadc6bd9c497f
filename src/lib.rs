pub mod auth;
pub mod clients;
pub mod common;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod openapi;

pub mod database;
pub mod server;
pub mod services;
