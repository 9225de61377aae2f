//! Clients for the external generation and search services

pub mod gemini;
pub mod search;

pub use gemini::{
    GeminiClient, GeminiConfig, GenerationClient, GenerationError, GenerationRequest,
    GenerationResponse, GroundingMetadata, InlineImage,
};
pub use search::{CustomSearchClient, SearchClient, SearchConfig, SearchError, SearchItem};
