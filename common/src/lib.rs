// Common library for shared code across scheduler and API

pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod db;
pub mod dispatcher;
pub mod errors;
pub mod mail;
pub mod models;
pub mod recipients;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod telemetry;
