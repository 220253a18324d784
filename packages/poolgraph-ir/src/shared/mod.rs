//! Shared models and utilities
//!
//! `models` is the single source of truth for the program representation
//! every feature operates on.

pub mod models;
