//! Background collection of web references for videos
//!
//! A video gets its references at most once. Collection runs detached from
//! the request that created the video and its failures only reach the logs.

pub mod collector;
pub mod extract;
pub mod strategy;

pub use collector::{CollectionOutcome, ReferenceCollector};
pub use strategy::{
    CollectedReference, CollectionStrategy, CollectionTarget, CustomSearchStrategy,
    GroundedSearchStrategy,
};

use common::error::DatabaseError;
use thiserror::Error;

use crate::clients::{GenerationError, SearchError};

/// Titles that only name the platform and say nothing about the video
const PLACEHOLDER_TITLES: &[&str] = &["netflix", "youtube", "넷플릭스", "유튜브"];

/// Reference collection errors
#[derive(Error, Debug)]
pub enum CollectError {
    /// The backend did not answer in time
    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("Generation failed: {0}")]
    Generation(#[source] GenerationError),

    #[error("Search failed: {0}")]
    Search(#[source] SearchError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<GenerationError> for CollectError {
    fn from(error: GenerationError) -> Self {
        match error {
            GenerationError::Timeout => CollectError::Timeout("Grounded search"),
            other => CollectError::Generation(other),
        }
    }
}

impl From<SearchError> for CollectError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::Timeout => CollectError::Timeout("Custom search"),
            other => CollectError::Search(other),
        }
    }
}

/// Whether a title actually names the video
pub fn is_usable_title(title: &str) -> bool {
    let title = title.trim();
    !title.is_empty()
        && !PLACEHOLDER_TITLES
            .iter()
            .any(|placeholder| title.eq_ignore_ascii_case(placeholder))
}

/// Build the search query for a video
pub fn derive_search_query(video_id: &str, title: &str, platform: &str) -> String {
    let title = title.trim();
    let platform = platform.trim();

    if is_usable_title(title) {
        format!("{} {} plot characters background", platform, title)
    } else if platform.eq_ignore_ascii_case("netflix") {
        format!("{} {} plot characters", platform, video_id)
    } else {
        format!("{} {} plot", title, platform).trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_titles() {
        assert!(is_usable_title("Knives Out"));
        assert!(!is_usable_title("  "));
        assert!(!is_usable_title("Netflix"));
        assert!(!is_usable_title("넷플릭스"));
    }

    #[test]
    fn test_query_derivation() {
        assert_eq!(
            derive_search_query("81234", "Knives Out", "netflix"),
            "netflix Knives Out plot characters background"
        );
        assert_eq!(
            derive_search_query("81234", "Netflix", "netflix"),
            "netflix 81234 plot characters"
        );
        assert_eq!(
            derive_search_query("abc", "YouTube", "youtube"),
            "YouTube youtube plot"
        );
        assert_eq!(derive_search_query("abc", "", "vimeo"), "vimeo plot");
    }

    #[test]
    fn test_timeouts_are_classified() {
        assert!(matches!(
            CollectError::from(GenerationError::Timeout),
            CollectError::Timeout(_)
        ));
        assert!(matches!(
            CollectError::from(SearchError::Timeout),
            CollectError::Timeout(_)
        ));
        assert!(matches!(
            CollectError::from(GenerationError::MissingApiKey),
            CollectError::Generation(_)
        ));
    }
}
