pub mod classifier;
pub mod config;
pub mod enhance;
pub mod error;
pub mod keywords;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod resilience;
pub mod template;
pub mod testutil;
pub mod traits;
pub mod vault;

pub use classifier::classify;
pub use config::PipelineConfig;
pub use error::{AppError, ErrorKind};
pub use keywords::{KeywordCorpus, rank_keywords};
pub use models::{ClipResult, ExtractedContent, Genre, ParsedDocument, compute_hash};
pub use pipeline::{Analysis, ClipRequest, ClipService, ClipSource};
pub use render::TemplateStore;
pub use resilience::{ErrorContext, FallbackRegistry, Guard, GuardError, RecoveryPolicy};
pub use template::{load_candidates, select_template};
pub use traits::{
    Cleaner, ClipStore, ContentExtractor, DocumentParser, DocumentWriter, EventLog, Fetcher,
    NullStore, TracingEventLog,
};
