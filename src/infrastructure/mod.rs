//! Infrastructure layer modules
//!
//! This module contains shared infrastructure components:
//! - `config`: Application configuration and settings
//! - `error`: HTTP-facing error type
//! - `postgres`: PostgreSQL connection pool and migrations

pub mod config;
pub mod error;
pub mod postgres;
