pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod filters;
pub mod fingerprint;
pub mod keys;
pub mod models;
pub mod security;
pub mod service;
