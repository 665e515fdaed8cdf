// src/lib.rs
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod message;
pub mod routes;
pub mod services;
pub mod state;
