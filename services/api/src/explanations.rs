//! Explanation of subtitle lines
//!
//! Composes the prompt from the stored template, the video metadata, the
//! collected references, the preceding subtitles and an optional
//! screenshot, then asks the generation model for the explanation.

pub mod prompt;

use common::error::DatabaseError;
use serde_json::{Map, Value, json};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::clients::{GenerationClient, GenerationError, GenerationRequest, InlineImage};
use crate::error::ApiError;
use crate::models::{
    ExplainRequest, Explanation, ExplanationSource, NewRequestRecord, NewVideo, SourceKind,
    SubtitleLine, Video,
};
use crate::references::{CollectionTarget, ReferenceCollector};
use crate::repositories::{
    ImageRepository, ReferenceRepository, RequestRepository, SettingsRepository, VideoRepository,
};
use crate::storage::{ImageStorage, mime_type};
use prompt::{PromptTemplate, PromptVariables, TemplateError};

/// Settings key of the explanation prompt template
pub const EXPLAIN_PROMPT_KEY: &str = "explain_prompt";

const EXPLANATION_TEMPERATURE: f32 = 0.7;

const UNKNOWN_PLATFORM: &str = "unknown";

/// Body of every 500 answer, details stay in the server log
const GENERIC_FAILURE: &str = "Failed to generate explanation";

/// Explanation errors
#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("Prompt template not found. Please check the settings table.")]
    MissingTemplate,

    #[error("Invalid prompt template: {0}")]
    Template(#[from] TemplateError),

    #[error("Image not found: {0}")]
    ImageNotFound(String),

    #[error("Image file not found at: {0}")]
    ImageFileMissing(String),

    #[error("Video title is required to generate an explanation")]
    MissingTitle,

    #[error("Generation timed out, please retry")]
    Timeout,

    #[error("Failed to generate explanation: {0}")]
    Generation(#[source] GenerationError),

    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<GenerationError> for ExplainError {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::Timeout => ExplainError::Timeout,
            other => ExplainError::Generation(other),
        }
    }
}

impl From<ExplainError> for ApiError {
    fn from(error: ExplainError) -> Self {
        match error {
            ExplainError::ImageNotFound(_) | ExplainError::ImageFileMissing(_) => {
                ApiError::NotFound(error.to_string())
            }
            ExplainError::MissingTitle => ApiError::BadRequest(error.to_string()),
            ExplainError::Timeout => ApiError::GatewayTimeout(error.to_string()),
            ExplainError::Database(e) => ApiError::from(e),
            ExplainError::MissingTemplate
            | ExplainError::Template(_)
            | ExplainError::Generation(_)
            | ExplainError::Io(_) => {
                error!("Explanation failed: {}", error);
                ApiError::InternalServerError(GENERIC_FAILURE.to_string())
            }
        }
    }
}

/// Builds prompts and asks the generation model for explanations
#[derive(Clone)]
pub struct ExplanationService {
    videos: VideoRepository,
    images: ImageRepository,
    references: ReferenceRepository,
    requests: RequestRepository,
    settings: SettingsRepository,
    storage: ImageStorage,
    generator: Arc<dyn GenerationClient>,
    collector: ReferenceCollector,
}

impl ExplanationService {
    pub fn new(
        pool: SqlitePool,
        storage: ImageStorage,
        generator: Arc<dyn GenerationClient>,
        collector: ReferenceCollector,
    ) -> Self {
        Self {
            videos: VideoRepository::new(pool.clone()),
            images: ImageRepository::new(pool.clone()),
            references: ReferenceRepository::new(pool.clone()),
            requests: RequestRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool),
            storage,
            generator,
            collector,
        }
    }

    /// Explain a subtitle line for the given session
    pub async fn explain(
        &self,
        session_id: &str,
        request: &ExplainRequest,
    ) -> Result<Explanation, ExplainError> {
        // The audit record precedes every other step, including failing ones.
        self.requests
            .create(&NewRequestRecord {
                video_id: request.video_id.clone(),
                image_id: request.image_id.clone(),
                session_id: session_id.to_string(),
                lang: request.language.clone(),
            })
            .await?;

        let template = self
            .settings
            .get_value(EXPLAIN_PROMPT_KEY)
            .await?
            .ok_or(ExplainError::MissingTemplate)?;
        let template = PromptTemplate::parse(&template)?;

        let video = self.resolve_video(request).await?;
        let title = resolve_title(video.as_ref(), request.title.as_deref());
        let metadata = match &video {
            Some(video) => Some(&video.metadata),
            None => request.metadata.as_ref(),
        };

        let reference_context = self
            .references
            .get_reference_content(&request.video_id)
            .await?
            .map(|content| reference_block(&content))
            .unwrap_or_default();

        let image = self.load_image(request.image_id.as_deref()).await?;

        if title.trim().is_empty() {
            return Err(ExplainError::MissingTitle);
        }

        let variables = PromptVariables {
            video_title: title.clone(),
            language: request.language.clone(),
            subtitle_text: request.selected_text.clone(),
            metadata_context: metadata.map(metadata_block).unwrap_or_default(),
            reference_context,
            context_subtitles: context_block(request.context_lines()),
            non_verbal_cues: cues_block(request.current_cues()),
        };

        info!(
            video_id = %request.video_id,
            with_image = image.is_some(),
            context_lines = request.context_lines().len(),
            "Generating explanation"
        );

        let response = self
            .generator
            .generate(GenerationRequest {
                prompt: template.render(&variables),
                image,
                temperature: EXPLANATION_TEMPERATURE,
                grounding: false,
            })
            .await
            .map_err(|e| {
                match &e {
                    GenerationError::Timeout => {
                        warn!(video_id = %request.video_id, "Explanation generation timed out")
                    }
                    other => {
                        error!(video_id = %request.video_id, error = %other, "Explanation generation failed")
                    }
                }
                ExplainError::from(e)
            })?;

        Ok(Explanation {
            text: response.text,
            sources: vec![
                ExplanationSource {
                    kind: SourceKind::AiAnalysis,
                    title: "Gemini AI analysis".to_string(),
                },
                ExplanationSource {
                    kind: SourceKind::VideoContext,
                    title: format!("{} - {:.1}s", title, request.timestamp),
                },
            ],
            references: Vec::new(),
        })
    }

    /// Load the stored video, creating it from the request when unknown
    ///
    /// A failed creation is logged and the explanation goes on without it.
    async fn resolve_video(&self, request: &ExplainRequest) -> Result<Option<Video>, ExplainError> {
        if let Some(video) = self.videos.get(&request.video_id).await? {
            return Ok(Some(video));
        }

        let payload = NewVideo {
            video_id: request.video_id.clone(),
            platform: request
                .platform
                .clone()
                .filter(|platform| !platform.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_PLATFORM.to_string()),
            title: request.title.clone().unwrap_or_default(),
            lang: request.language.clone(),
            metadata: request.metadata.clone().unwrap_or_default(),
        };

        match self.videos.create(&payload).await {
            Ok(video) => {
                info!(video_id = %video.video_id, "Created video from explanation request");
                self.collector.spawn(CollectionTarget::new(
                    &video.video_id,
                    &video.title,
                    &video.platform,
                ));
                Ok(Some(video))
            }
            Err(e) => {
                error!(video_id = %request.video_id, error = %e, "Failed to create video");
                Ok(None)
            }
        }
    }

    async fn load_image(&self, image_id: Option<&str>) -> Result<Option<InlineImage>, ExplainError> {
        let Some(image_id) = image_id else {
            return Ok(None);
        };

        let image = self
            .images
            .get(image_id)
            .await?
            .ok_or_else(|| ExplainError::ImageNotFound(image_id.to_string()))?;

        let path = Path::new(&image.file_path);
        let data = self
            .storage
            .read(path)
            .await?
            .ok_or_else(|| ExplainError::ImageFileMissing(image.file_path.clone()))?;

        Ok(Some(InlineImage {
            mime_type: mime_type(path).to_string(),
            data,
        }))
    }
}

/// Store the explanation prompt read from a file unless the setting exists
///
/// Returns whether the setting was created. The file is parsed first so a
/// broken template never reaches the settings table.
pub async fn seed_prompt(settings: &SettingsRepository, path: &Path) -> Result<bool, ExplainError> {
    let source = tokio::fs::read_to_string(path).await?;
    let template = PromptTemplate::parse(&source)?;
    debug!(
        placeholders = ?template.placeholders().map(|p| p.name()).collect::<Vec<_>>(),
        "Parsed explanation prompt"
    );

    let metadata = json!({
        "description": "Prompt for subtitle explanations",
        "version": "1.0",
    });
    let created = settings
        .create_if_absent(EXPLAIN_PROMPT_KEY, &source, &metadata)
        .await?;

    if created {
        info!("Seeded {} from {}", EXPLAIN_PROMPT_KEY, path.display());
    } else {
        info!("{} already stored, keeping it", EXPLAIN_PROMPT_KEY);
    }
    Ok(created)
}

/// Stored title first, then the one sent with the request
fn resolve_title(video: Option<&Video>, requested: Option<&str>) -> String {
    video
        .map(|video| video.title.trim())
        .filter(|title| !title.is_empty())
        .or_else(|| requested.map(str::trim))
        .unwrap_or_default()
        .to_string()
}

fn metadata_block(metadata: &Map<String, Value>) -> String {
    let lines: Vec<String> = metadata
        .iter()
        .filter_map(|(key, value)| {
            let value = display_value(value)?;
            Some(format!("- {}: {}", label(key), value))
        })
        .collect();

    if lines.is_empty() {
        return String::new();
    }
    format!("## Video Metadata\n{}\n", lines.join("\n"))
}

fn display_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(map) if map.is_empty() => return None,
        other => other.to_string(),
    };

    (!text.is_empty()).then_some(text)
}

fn label(key: &str) -> String {
    match key {
        "url" => "URL".to_string(),
        "lang" => "Language".to_string(),
        _ => {
            let words = key.replace('_', " ");
            let mut chars = words.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => words,
            }
        }
    }
}

fn reference_block(content: &str) -> String {
    format!(
        "## Reference Material\n{}\n\nUse the reference material above to make the explanation accurate and specific.\n",
        content
    )
}

fn context_block(lines: &[SubtitleLine]) -> String {
    if lines.is_empty() {
        return String::new();
    }

    let lines: Vec<String> = lines
        .iter()
        .map(|line| {
            let cues = line.cues();
            if cues.is_empty() {
                format!("[{:.1}s] {}", line.timestamp, line.text)
            } else {
                format!("[{:.1}s] {} [{}]", line.timestamp, line.text, cues.join(", "))
            }
        })
        .collect();

    format!("## Previous Subtitles\n{}\n", lines.join("\n"))
}

fn cues_block(cues: &[String]) -> String {
    let cues: Vec<&str> = cues
        .iter()
        .map(|cue| cue.trim())
        .filter(|cue| !cue.is_empty())
        .collect();

    if cues.is_empty() {
        return String::new();
    }
    format!("## Non-verbal Cues\n{}\n", cues.join(", "))
}
