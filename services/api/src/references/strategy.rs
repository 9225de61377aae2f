//! Reference search backends

use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::extract::extract_sources;
use super::{CollectError, derive_search_query};
use crate::clients::{GenerationClient, GenerationRequest, SearchClient};
use crate::models::{
    Extraction, ReferenceDocument, ReferenceItem, ReferenceMetadata, ReferenceSource,
};

/// Items kept from a grounded answer
const MAX_GROUNDED_ITEMS: usize = 3;

const GROUNDED_TEMPERATURE: f32 = 0.3;

const DEFAULT_SEARCH_INSTRUCTION: &str = "Perform a web search and list the titles and URLs of the relevant results.
Do not reason about or summarise the results.";

/// Video a collection runs for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    pub video_id: String,
    pub title: String,
    pub platform: String,
}

impl CollectionTarget {
    pub fn new(
        video_id: impl Into<String>,
        title: impl Into<String>,
        platform: impl Into<String>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            title: title.into(),
            platform: platform.into(),
        }
    }

    pub fn search_query(&self) -> String {
        derive_search_query(&self.video_id, &self.title, &self.platform)
    }
}

/// Reference ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct CollectedReference {
    pub document: ReferenceDocument,
    pub metadata: ReferenceMetadata,
}

/// A way of finding web references for a video
#[async_trait]
pub trait CollectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Search for the video, `None` when nothing citable was found
    async fn search(
        &self,
        target: &CollectionTarget,
    ) -> Result<Option<CollectedReference>, CollectError>;
}

/// Search through the generation model with the search tool attached
pub struct GroundedSearchStrategy {
    client: Arc<dyn GenerationClient>,
    instruction: String,
}

impl GroundedSearchStrategy {
    pub fn new(client: Arc<dyn GenerationClient>, instruction: impl Into<String>) -> Self {
        Self {
            client,
            instruction: instruction.into(),
        }
    }

    /// Use the instruction stored in a file, or the built-in one when unreadable
    pub fn with_instruction_file(client: Arc<dyn GenerationClient>, path: &Path) -> Self {
        let instruction = match std::fs::read_to_string(path) {
            Ok(instruction) => instruction,
            Err(e) => {
                warn!(
                    "Search instruction file {} unavailable ({}), using the default",
                    path.display(),
                    e
                );
                DEFAULT_SEARCH_INSTRUCTION.to_string()
            }
        };

        Self::new(client, instruction)
    }

    fn prompt(&self, query: &str) -> String {
        format!(
            "{}\n\nPerform a web search on the following topic:\n\n{}\n\nList the titles and URLs of the relevant results.\n",
            self.instruction.trim(),
            query
        )
    }
}

#[async_trait]
impl CollectionStrategy for GroundedSearchStrategy {
    fn name(&self) -> &'static str {
        "grounded"
    }

    async fn search(
        &self,
        target: &CollectionTarget,
    ) -> Result<Option<CollectedReference>, CollectError> {
        let query = target.search_query();
        info!(video_id = %target.video_id, query = %query, "Running grounded search");

        let response = self
            .client
            .generate(GenerationRequest {
                grounding: true,
                ..GenerationRequest::text(self.prompt(&query), GROUNDED_TEMPERATURE)
            })
            .await?;

        let Some(extracted) = extract_sources(&response) else {
            return Ok(None);
        };

        let source = if extracted.extraction == Extraction::GroundingMetadata {
            ReferenceSource::GeminiGrounding
        } else {
            ReferenceSource::GeminiTextFallback
        };
        let results_count = extracted.sources.len();

        Ok(Some(CollectedReference {
            document: ReferenceDocument {
                query: query.clone(),
                timestamp: Utc::now(),
                search_queries: extracted.search_queries.clone(),
                items: extracted
                    .sources
                    .into_iter()
                    .take(MAX_GROUNDED_ITEMS)
                    .map(|source| ReferenceItem {
                        title: source.title,
                        url: source.uri,
                        snippet: source.snippet,
                    })
                    .collect(),
            },
            metadata: ReferenceMetadata {
                source,
                extraction: extracted.extraction,
                query,
                results_count,
                search_queries: extracted.search_queries,
            },
        }))
    }
}

/// Search through the custom search API
pub struct CustomSearchStrategy {
    client: Arc<dyn SearchClient>,
}

impl CustomSearchStrategy {
    pub fn new(client: Arc<dyn SearchClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CollectionStrategy for CustomSearchStrategy {
    fn name(&self) -> &'static str {
        "custom_search"
    }

    async fn search(
        &self,
        target: &CollectionTarget,
    ) -> Result<Option<CollectedReference>, CollectError> {
        let query = target.search_query();
        info!(video_id = %target.video_id, query = %query, "Running custom search");

        let items = self.client.search(&query).await?;
        if items.is_empty() {
            return Ok(None);
        }

        let results_count = items.len();
        Ok(Some(CollectedReference {
            document: ReferenceDocument {
                query: query.clone(),
                timestamp: Utc::now(),
                search_queries: vec![query.clone()],
                items: items
                    .into_iter()
                    .map(|item| ReferenceItem {
                        title: item.title,
                        url: item.link,
                        snippet: item.snippet,
                    })
                    .collect(),
            },
            metadata: ReferenceMetadata {
                source: ReferenceSource::GoogleCustomSearch,
                extraction: Extraction::SearchApi,
                query: query.clone(),
                results_count,
                search_queries: vec![query],
            },
        }))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clients::gemini::{GroundingChunk, GroundingMetadata, WebChunk};
    use crate::clients::{GenerationError, GenerationResponse, SearchError, SearchItem};
    use std::sync::Mutex;

    /// Generation client answering from a script and recording prompts
    pub(crate) struct ScriptedGenerator {
        pub answer: fn() -> Result<GenerationResponse, GenerationError>,
        pub requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedGenerator {
        pub(crate) fn new(answer: fn() -> Result<GenerationResponse, GenerationError>) -> Self {
            Self {
                answer,
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedGenerator {
        async fn generate(
            &self,
            request: GenerationRequest,
        ) -> Result<GenerationResponse, GenerationError> {
            self.requests.lock().unwrap().push(request);
            (self.answer)()
        }
    }

    pub(crate) fn grounded_answer() -> Result<GenerationResponse, GenerationError> {
        let chunk = |n: usize| GroundingChunk {
            web: Some(WebChunk {
                uri: Some(format!("https://site{}.example", n)),
                title: Some(format!("site{}.example", n)),
            }),
        };
        Ok(GenerationResponse {
            text: "Show A is a drama.".to_string(),
            grounding: Some(GroundingMetadata {
                web_search_queries: vec!["Show A plot".to_string()],
                grounding_chunks: (1..=5).map(chunk).collect(),
                grounding_supports: Vec::new(),
            }),
        })
    }

    struct FixedSearch(Vec<SearchItem>);

    #[async_trait]
    impl SearchClient for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<SearchItem>, SearchError> {
            Ok(self.0.clone())
        }
    }

    fn target() -> CollectionTarget {
        CollectionTarget::new("v1", "Show A", "netflix")
    }

    #[tokio::test]
    async fn test_grounded_search_keeps_three_items() {
        let generator = Arc::new(ScriptedGenerator::new(grounded_answer));
        let strategy = GroundedSearchStrategy::new(generator.clone(), "List sources.");

        let collected = strategy.search(&target()).await.unwrap().unwrap();

        assert_eq!(collected.document.items.len(), 3);
        assert_eq!(collected.document.query, "netflix Show A plot characters background");
        assert_eq!(collected.metadata.source, ReferenceSource::GeminiGrounding);
        assert_eq!(collected.metadata.results_count, 5);
        assert_eq!(collected.metadata.search_queries, vec!["Show A plot"]);

        let requests = generator.requests.lock().unwrap();
        assert!(requests[0].grounding);
        assert_eq!(requests[0].temperature, GROUNDED_TEMPERATURE);
        assert!(requests[0].prompt.starts_with("List sources."));
        assert!(requests[0].prompt.contains("netflix Show A plot characters background"));
    }

    #[tokio::test]
    async fn test_grounded_search_text_fallback() {
        let generator = Arc::new(ScriptedGenerator::new(|| {
            Ok(GenerationResponse {
                text: "1. Show A\nURL: https://a.example".to_string(),
                grounding: None,
            })
        }));
        let strategy = GroundedSearchStrategy::new(generator, "List sources.");

        let collected = strategy.search(&target()).await.unwrap().unwrap();
        assert_eq!(collected.metadata.source, ReferenceSource::GeminiTextFallback);
        assert_eq!(collected.metadata.extraction, Extraction::NumberedList);
        assert_eq!(collected.document.items[0].url, "https://a.example");
    }

    #[tokio::test]
    async fn test_grounded_search_without_sources() {
        let generator = Arc::new(ScriptedGenerator::new(|| {
            Ok(GenerationResponse {
                text: "I could not find anything.".to_string(),
                grounding: None,
            })
        }));
        let strategy = GroundedSearchStrategy::new(generator, "List sources.");

        assert_eq!(strategy.search(&target()).await.unwrap(), None);
    }

    #[test]
    fn test_missing_instruction_file_uses_default() {
        let generator = Arc::new(ScriptedGenerator::new(grounded_answer));
        let strategy =
            GroundedSearchStrategy::with_instruction_file(generator, Path::new("/nonexistent/file"));
        assert_eq!(strategy.instruction, DEFAULT_SEARCH_INSTRUCTION);
    }

    #[tokio::test]
    async fn test_custom_search_keeps_all_items() {
        let items = (1..=4)
            .map(|n| SearchItem {
                title: format!("Result {}", n),
                link: format!("https://r{}.example", n),
                snippet: format!("Snippet {}", n),
            })
            .collect();
        let strategy = CustomSearchStrategy::new(Arc::new(FixedSearch(items)));

        let collected = strategy.search(&target()).await.unwrap().unwrap();
        assert_eq!(collected.document.items.len(), 4);
        assert_eq!(collected.document.items[3].snippet, "Snippet 4");
        assert_eq!(collected.metadata.source, ReferenceSource::GoogleCustomSearch);
        assert_eq!(collected.metadata.extraction, Extraction::SearchApi);
    }

    #[tokio::test]
    async fn test_custom_search_without_items() {
        let strategy = CustomSearchStrategy::new(Arc::new(FixedSearch(Vec::new())));
        assert_eq!(strategy.search(&target()).await.unwrap(), None);
    }
}
