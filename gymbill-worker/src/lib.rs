///! # GymBill Worker Library
///!
///! Runs the daily billing job: the overdue sweep followed by recurring
///! invoice generation, once per day at a configured local time.
///!
///! ## Modules
///!
///! - `config`: Worker configuration from the environment
///! - `scheduler`: Daily scheduler with a manual trigger
///! - `jobs`: The daily billing job

pub mod config;
pub mod jobs;
pub mod scheduler;
