// Blog CMS - articles, threaded comments and taxonomy over SQLite

// Ent Framework - privacy rules
pub mod ent_framework;

// Core utilities
pub mod core;

// Infrastructure - identity, auth, audit, middleware
pub mod infrastructure;

// Persistence and entities
pub mod database;
pub mod entities;

// Business logic
pub mod services;

// HTTP surface and wiring
pub mod app_state;
pub mod blog_interface;
pub mod config;

// Common utilities
pub mod error;

// Re-exports for convenience
pub use error::{AppError, AppResult};
