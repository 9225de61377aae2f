//! Video models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stored video
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub platform: String,
    pub title: String,
    pub lang: String,
    /// Descriptive fields such as season, episode, duration or url
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    fn metadata_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(Value::as_i64)
    }
}

/// Video creation or update payload
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub video_id: String,
    pub platform: String,
    pub title: String,
    pub lang: String,
    pub metadata: Map<String, Value>,
}

/// Video registration request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRegisterRequest {
    pub video_id: String,
    pub platform: String,
    pub title: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    /// Duration in seconds
    pub duration: Option<i64>,
    pub url: Option<String>,
}

fn default_lang() -> String {
    "en".to_string()
}

impl VideoRegisterRequest {
    pub fn into_new_video(self) -> NewVideo {
        let mut metadata = Map::new();
        if let Some(season) = self.season {
            metadata.insert("season".to_string(), season.into());
        }
        if let Some(episode) = self.episode {
            metadata.insert("episode".to_string(), episode.into());
        }
        if let Some(duration) = self.duration {
            metadata.insert("duration".to_string(), duration.into());
        }
        if let Some(url) = self.url.filter(|url| !url.is_empty()) {
            metadata.insert("url".to_string(), url.into());
        }

        NewVideo {
            video_id: self.video_id,
            platform: self.platform,
            title: self.title,
            lang: self.lang,
            metadata,
        }
    }
}

/// Video as returned by the API
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    pub video_id: String,
    pub platform: String,
    pub title: String,
    pub lang: String,
    pub season: Option<i64>,
    pub episode: Option<i64>,
    pub duration: Option<i64>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Video> for VideoData {
    fn from(video: Video) -> Self {
        Self {
            season: video.metadata_i64("season"),
            episode: video.metadata_i64("episode"),
            duration: video.metadata_i64("duration"),
            url: video
                .metadata
                .get("url")
                .and_then(Value::as_str)
                .map(str::to_string),
            video_id: video.video_id,
            platform: video.platform,
            title: video.title,
            lang: video.lang,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}
