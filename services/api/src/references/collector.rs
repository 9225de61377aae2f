//! Once-per-video reference collection

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::CollectError;
use super::strategy::{CollectionStrategy, CollectionTarget};
use crate::repositories::ReferenceRepository;

/// What a collection run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// References already existed for the video
    AlreadyCollected(i64),
    /// The backend found nothing citable
    NoSources,
    Stored { reference_id: i64, items: usize },
    TimedOut,
    Disabled,
}

/// Collects references for videos through the configured strategy
#[derive(Clone)]
pub struct ReferenceCollector {
    references: ReferenceRepository,
    strategy: Option<Arc<dyn CollectionStrategy>>,
}

impl ReferenceCollector {
    pub fn new(references: ReferenceRepository, strategy: Arc<dyn CollectionStrategy>) -> Self {
        Self {
            references,
            strategy: Some(strategy),
        }
    }

    /// A collector that never searches
    pub fn disabled(references: ReferenceRepository) -> Self {
        Self {
            references,
            strategy: None,
        }
    }

    /// Collect references for a video, logging instead of failing
    pub async fn collect(&self, target: CollectionTarget) {
        match self.try_collect(&target).await {
            Ok(CollectionOutcome::Stored {
                reference_id,
                items,
            }) => info!(
                video_id = %target.video_id,
                reference_id,
                items,
                "Stored video reference"
            ),
            Ok(CollectionOutcome::NoSources) => warn!(
                video_id = %target.video_id,
                "No sources found, nothing stored"
            ),
            Ok(outcome) => info!(
                video_id = %target.video_id,
                ?outcome,
                "Reference collection skipped"
            ),
            Err(e) => error!(
                video_id = %target.video_id,
                error = %e,
                "Reference collection failed"
            ),
        }
    }

    /// Run one collection
    ///
    /// Existing references short-circuit the run and a backend timeout ends
    /// it without writing anything.
    pub async fn try_collect(
        &self,
        target: &CollectionTarget,
    ) -> Result<CollectionOutcome, CollectError> {
        let Some(strategy) = &self.strategy else {
            return Ok(CollectionOutcome::Disabled);
        };

        let existing = self.references.count_by_video(&target.video_id).await?;
        if existing > 0 {
            return Ok(CollectionOutcome::AlreadyCollected(existing));
        }

        info!(
            video_id = %target.video_id,
            title = %target.title,
            strategy = strategy.name(),
            "Collecting video references"
        );

        let collected = match strategy.search(target).await {
            Ok(Some(collected)) => collected,
            Ok(None) => return Ok(CollectionOutcome::NoSources),
            Err(CollectError::Timeout(service)) => {
                warn!(
                    video_id = %target.video_id,
                    "{} timed out, continuing without references",
                    service
                );
                return Ok(CollectionOutcome::TimedOut);
            }
            Err(e) => return Err(e),
        };

        let reference_id = self
            .references
            .create(&target.video_id, &collected.document, &collected.metadata)
            .await?;

        Ok(CollectionOutcome::Stored {
            reference_id,
            items: collected.document.items.len(),
        })
    }

    /// Start a detached collection
    pub fn spawn(&self, target: CollectionTarget) -> JoinHandle<()> {
        let collector = self.clone();
        tokio::spawn(async move { collector.collect(target).await })
    }
}
