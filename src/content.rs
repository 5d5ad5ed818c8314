use std::fs;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::{ContentConfig, ContentSourceType};
use crate::error::ContentError;

/// One playable question with its secret answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPair {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    questions: Vec<QuestionPair>,
}

/// In-process cache of the question catalog, loaded from a file or an HTTP
/// source. Refreshable at runtime without touching running games.
pub struct QuestionCatalog {
    entries: RwLock<Arc<Vec<QuestionPair>>>,
    config: ContentConfig,
}

impl QuestionCatalog {
    pub async fn new(config: ContentConfig) -> Self {
        let initial = Self::fetch_from_source(&config).await.unwrap_or_else(|err| {
            tracing::warn!(
                error = %err,
                "Initial question catalog load failed. Starting with an empty catalog"
            );
            Vec::new()
        });
        tracing::info!(catalog.questions = initial.len(), "Question catalog loaded");
        Self {
            entries: RwLock::new(Arc::new(initial)),
            config,
        }
    }

    async fn fetch_from_source(config: &ContentConfig) -> Result<Vec<QuestionPair>, ContentError> {
        let raw = match config.source_type {
            ContentSourceType::File => {
                let path = config.file_path.as_ref().ok_or_else(|| {
                    ContentError::Config("file_path missing for file source type".to_string())
                })?;
                fs::read_to_string(path).map_err(|e| ContentError::FileRead {
                    path: path.clone(),
                    source: e,
                })?
            }
            ContentSourceType::Http => {
                let url = config.http_url.as_ref().ok_or_else(|| {
                    ContentError::Config("http_url missing for http source type".to_string())
                })?;
                reqwest::get(url)
                    .await
                    .map_err(|e| ContentError::HttpFetch {
                        url: url.clone(),
                        source: e,
                    })?
                    .text()
                    .await
                    .map_err(|e| ContentError::HttpFetch {
                        url: url.clone(),
                        source: e,
                    })?
            }
            ContentSourceType::None => return Ok(Vec::new()),
        };

        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<Vec<QuestionPair>, ContentError> {
        let catalog: CatalogFile =
            serde_json::from_str(raw).map_err(|e| ContentError::Parse(e.to_string()))?;
        Ok(catalog
            .questions
            .into_iter()
            .map(|pair| QuestionPair {
                question: pair.question.trim().to_string(),
                answer: pair.answer.trim().to_string(),
            })
            .filter(|pair| !pair.question.is_empty() && !pair.answer.is_empty())
            .collect())
    }

    pub async fn refresh(&self) -> Result<(), ContentError> {
        let fresh = Self::fetch_from_source(&self.config).await?;
        let mut guard = self.entries.write().await;
        *guard = Arc::new(fresh);
        tracing::info!(catalog.questions = guard.len(), "Question catalog refreshed");
        Ok(())
    }

    pub async fn pick_random(&self) -> Option<QuestionPair> {
        let entries = self.entries.read().await.clone();
        entries.choose(&mut rand::thread_rng()).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    #[cfg(test)]
    pub async fn with_entries(entries: Vec<QuestionPair>) -> Self {
        let catalog = Self::new(ContentConfig {
            source_type: ContentSourceType::None,
            file_path: None,
            http_url: None,
            refresh_interval_secs: 0,
        })
        .await;
        *catalog.entries.write().await = Arc::new(entries);
        catalog
    }
}
