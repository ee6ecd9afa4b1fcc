// Scheduler module for due-event polling and dispatch

pub mod engine;

pub use engine::{PollReport, PollingScheduler, Scheduler, SchedulerConfig, SchedulerState};
