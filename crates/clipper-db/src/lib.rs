pub mod config;
pub mod database;
pub mod event_log;
pub mod repository;

pub use config::DatabaseConfig;
pub use database::Database;
pub use event_log::EventLogRepository;
pub use repository::ClipRepository;
