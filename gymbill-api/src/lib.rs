//! # GymBill API Server Library
//!
//! HTTP surface of the GymBill billing engine: cash drawers, member and
//! supplier payments, enrollment, payables and the manual billing trigger.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
