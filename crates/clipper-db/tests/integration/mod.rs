mod clip_tests;
pub mod common;
mod event_log_tests;
