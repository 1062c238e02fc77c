//! Object-store path layout and media type detection for generated assets.

use crate::error::CoreError;
use crate::types::DbId;

/// Content type recorded for generated videos.
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Asset kind segment used in object paths.
pub const KIND_IMAGE: &str = "image";
/// Asset kind segment used in object paths.
pub const KIND_VIDEO: &str = "video";

/// An image container recognised from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }
}

/// Detect the image container from magic bytes.
///
/// Formats outside the set the backends produce are reported as unknown.
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Png => Some(ImageFormat::Png),
        image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
        image::ImageFormat::WebP => Some(ImageFormat::Webp),
        _ => None,
    }
}

/// Build the object path for a generated asset.
///
/// Layout: `shot-lists/{shot_list_id}/scene-{order:03}/{kind}-{uuid}.{ext}`.
/// A fresh suffix per upload keeps regenerated assets from being served
/// from a stale cache entry.
pub fn asset_object_path(shot_list_id: DbId, order_index: i32, kind: &str, ext: &str) -> String {
    format!(
        "shot-lists/{shot_list_id}/scene-{order_index:03}/{kind}-{}.{ext}",
        uuid::Uuid::new_v4().simple()
    )
}

/// Reject object paths that could escape the storage root.
pub fn validate_object_path(path: &str) -> Result<(), CoreError> {
    if path.is_empty() {
        return Err(CoreError::Validation("Object path must not be empty".into()));
    }
    if path.starts_with('/') || path.split('/').any(|seg| seg == ".." || seg.is_empty()) {
        return Err(CoreError::Validation(format!(
            "Object path '{path}' must be relative without empty or '..' segments"
        )));
    }
    Ok(())
}
