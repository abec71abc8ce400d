use clipper_client::{
    DefaultClipService, FsVaultWriter, HtmdCleaner, HtmlSignalExtractor, ReqwestFetcher,
    StrategyChainExtractor, default_fallbacks,
};
use clipper_core::PipelineConfig;
use clipper_core::error::AppError;
use clipper_core::keywords::KeywordCorpus;
use clipper_core::pipeline::ClipService;
use clipper_core::render::TemplateStore;
use clipper_core::resilience::Guard;
use tokio_util::sync::CancellationToken;

use crate::store::Storage;

/// Clip service as wired by the server.
pub type ServerClipService = DefaultClipService<Storage, Storage>;

/// Shared application state, available to all route handlers via `State<Arc<AppState>>`.
pub struct AppState {
    pub storage: Storage,
    pub api_key: String,
    /// Expose error causes in responses.
    pub development: bool,
    /// Cancelled on shutdown; in-flight recovery waits are abandoned.
    pub shutdown: CancellationToken,
    fetcher: ReqwestFetcher,
    guard: Guard<Storage>,
    templates: TemplateStore,
    corpus: KeywordCorpus,
    writer: Option<FsVaultWriter>,
}

impl AppState {
    /// Load templates and register fallbacks. The fetcher keeps SSRF
    /// protection on.
    pub fn new(
        storage: Storage,
        api_key: impl Into<String>,
        config: &PipelineConfig,
    ) -> Result<Self, AppError> {
        let fetcher = ReqwestFetcher::new()?;
        let templates = TemplateStore::load(&config.templates_dir)?;
        let guard = Guard::new(storage.clone())
            .with_policy(config.recovery.clone())
            .with_fallbacks(default_fallbacks(fetcher.clone(), config.temp_dir.clone()));

        Ok(Self {
            storage,
            api_key: api_key.into(),
            development: config.development,
            shutdown: CancellationToken::new(),
            fetcher,
            guard,
            templates,
            corpus: KeywordCorpus::new(),
            writer: config.vault_path.clone().map(FsVaultWriter::new),
        })
    }

    /// A clip service sharing this state's templates, corpus, and fallbacks.
    /// With `save` off nothing reaches the vault or the content store.
    pub fn clip_service(&self, save: bool) -> ServerClipService {
        let service = ClipService::new(
            self.fetcher.clone(),
            HtmlSignalExtractor::new(),
            StrategyChainExtractor::new(),
            HtmdCleaner::new(),
            self.guard.clone(),
        )
        .with_templates(self.templates.clone())
        .with_corpus(self.corpus.clone());

        if !save {
            return service;
        }
        let service = match &self.writer {
            Some(writer) => service.with_writer(writer.clone()),
            None => service,
        };
        if self.storage.is_enabled() {
            service.with_store(self.storage.clone())
        } else {
            service
        }
    }
}
