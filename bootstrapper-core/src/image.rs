//! Container image reference parsing: `host[:port]/repo/name[:tag][@digest]`.

use serde::Serialize;

use crate::error::ImageRefError;

/// The parts of an image reference. Absent parts are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub image: String,
    pub tag: String,
    pub digest: String,
}

impl ImageRef {
    /// Split `reference` into image name, tag and digest.
    ///
    /// A colon only separates a tag when it appears after the last `/`, so a
    /// registry port (`localhost:5000/app`) stays part of the name.
    pub fn parse(reference: &str) -> Result<Self, ImageRefError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ImageRefError::Empty);
        }

        let (rest, digest) = match reference.split_once('@') {
            Some((rest, digest)) => (rest, digest),
            None => (reference, ""),
        };

        let last_slash = rest.rfind('/').map_or(0, |i| i + 1);
        let (image, tag) = match rest[last_slash..].rfind(':') {
            Some(i) => (&rest[..last_slash + i], &rest[last_slash + i + 1..]),
            None => (rest, ""),
        };

        if image.is_empty() {
            return Err(ImageRefError::MissingName(reference.to_string()));
        }

        Ok(Self {
            image: image.to_string(),
            tag: tag.to_string(),
            digest: digest.to_string(),
        })
    }

    /// Template input shape shared by every image entry: `{version, image, tag, digest}`.
    pub fn to_template_value(&self) -> serde_json::Value {
        serde_json::json!({
            "version": self.tag,
            "image": self.image,
            "tag": self.tag,
            "digest": self.digest,
        })
    }
}
