//! API models for request and response payloads

pub mod explanation;
pub mod image;
pub mod reference;
pub mod request;
pub mod setting;
pub mod video;

pub use explanation::{
    ExplainRequest, ExplainResponseData, Explanation, ExplanationReference, ExplanationSource,
    SourceKind, SubtitleLine,
};
pub use image::{Image, NewImage, UploadResponse};
pub use reference::{
    Extraction, Reference, ReferenceDocument, ReferenceItem, ReferenceMetadata, ReferenceSource,
};
pub use request::{LanguageCount, NewRequestRecord, RequestRecord, RequestStatistics};
pub use setting::{Setting, SettingUpdateRequest};
pub use video::{NewVideo, Video, VideoData, VideoRegisterRequest};
