//! Application state shared across handlers

use auth::{jwt::JwtService, middleware::SessionVerifier, repositories::SessionRepository};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::clients::GenerationClient;
use crate::explanations::ExplanationService;
use crate::references::{CollectionStrategy, ReferenceCollector};
use crate::repositories::{
    ImageRepository, ReferenceRepository, RequestRepository, SettingsRepository, VideoRepository,
};
use crate::storage::{ImageStorage, StorageConfig};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub videos: VideoRepository,
    pub images: ImageRepository,
    pub settings: SettingsRepository,
    pub requests: RequestRepository,
    pub verifier: SessionVerifier,
    pub collector: ReferenceCollector,
    pub explainer: ExplanationService,
    pub storage: ImageStorage,
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Wire repositories and services over one pool
    ///
    /// Without a strategy, reference collection is disabled.
    pub fn new(
        db_pool: SqlitePool,
        jwt_service: JwtService,
        generator: Arc<dyn GenerationClient>,
        strategy: Option<Arc<dyn CollectionStrategy>>,
        storage_config: &StorageConfig,
    ) -> Self {
        let references = ReferenceRepository::new(db_pool.clone());
        let collector = match strategy {
            Some(strategy) => ReferenceCollector::new(references, strategy),
            None => ReferenceCollector::disabled(references),
        };
        let storage = ImageStorage::new(&storage_config.upload_path);

        Self {
            videos: VideoRepository::new(db_pool.clone()),
            images: ImageRepository::new(db_pool.clone()),
            settings: SettingsRepository::new(db_pool.clone()),
            requests: RequestRepository::new(db_pool.clone()),
            verifier: SessionVerifier::new(jwt_service, SessionRepository::new(db_pool.clone())),
            explainer: ExplanationService::new(
                db_pool.clone(),
                storage.clone(),
                generator,
                collector.clone(),
            ),
            collector,
            storage,
            max_upload_bytes: storage_config.max_bytes,
            db_pool,
        }
    }
}
