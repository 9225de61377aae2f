//! Repositories for database operations

pub mod image;
pub mod reference;
pub mod request;
pub mod setting;
pub mod video;

pub use image::ImageRepository;
pub use reference::ReferenceRepository;
pub use request::RequestRepository;
pub use setting::SettingsRepository;
pub use video::VideoRepository;

use common::error::{DatabaseError, DatabaseResult};
use serde_json::{Map, Value};

/// Decode a JSON object column
fn json_object(raw: &str) -> DatabaseResult<Map<String, Value>> {
    serde_json::from_str(raw).map_err(DatabaseError::decode)
}
