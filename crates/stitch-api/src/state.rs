//! Application state.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use stitch_catalog::ClipCatalog;
use stitch_pipeline::PipelineConfig;

use crate::config::ApiConfig;
use crate::error::ApiResult;

/// Delegated full-text caption search. The composition service itself
/// does not implement search; a deployment may inject a provider backed
/// by the shared catalog.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        lang: Option<&str>,
        limit: u32,
    ) -> ApiResult<serde_json::Value>;
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub catalog: Arc<ClipCatalog>,
    /// Base pipeline settings; per-request options are layered on top
    pub base_pipeline: PipelineConfig,
    pub search: Option<Arc<dyn SearchProvider>>,
}

impl AppState {
    /// Create new application state.
    ///
    /// Fatal when the catalog is unreachable, the media tools are
    /// missing, or the output/temp roots cannot be created.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        stitch_media::check_ffmpeg()?;
        stitch_media::check_ffprobe()?;

        let base_pipeline = PipelineConfig::from_env();
        tokio::fs::create_dir_all(&base_pipeline.output_dir).await?;
        tokio::fs::create_dir_all(&base_pipeline.temp_dir).await?;

        let catalog = Arc::new(ClipCatalog::open(&config.db_path).await?);
        let stats = catalog.stats().await?;
        info!(
            words = stats.words,
            videos = stats.videos,
            has_transcripts = stats.has_transcripts,
            has_phrase_index = stats.has_phrase_index,
            "Catalog ready"
        );

        Ok(Self {
            config,
            catalog,
            base_pipeline,
            search: None,
        })
    }

    /// Attach a search provider.
    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = Some(search);
        self
    }
}
