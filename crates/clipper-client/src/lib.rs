pub mod cleaner;
pub mod extract;
pub mod fallback;
pub mod fetcher;
pub mod signals;
pub mod writer;

use clipper_core::pipeline::ClipService;

pub use cleaner::HtmdCleaner;
pub use extract::StrategyChainExtractor;
pub use fallback::default_fallbacks;
pub use fetcher::ReqwestFetcher;
pub use signals::HtmlSignalExtractor;
pub use writer::FsVaultWriter;

/// [`ClipService`] wired with the HTTP, HTML and filesystem adapters.
pub type DefaultClipService<S, L> = ClipService<
    ReqwestFetcher,
    HtmlSignalExtractor,
    StrategyChainExtractor,
    HtmdCleaner,
    FsVaultWriter,
    S,
    L,
>;
