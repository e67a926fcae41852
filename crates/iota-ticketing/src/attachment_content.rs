//! Closed attachment file-type mapping for ticket uploads.
//!
//! The upload content type and the re-appended extension come from this map,
//! never from the caller-supplied file name. Anything outside the map is
//! rejected before any download or upload attempt.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `AttachmentFileType` values.
pub enum AttachmentFileType {
    Png,
    Jpg,
    Image,
    Pdf,
    Docx,
}

impl AttachmentFileType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpg),
            "image" => Some(Self::Image),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Image => "image",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    /// Content type sent with the attachment upload. All image variants are
    /// posted as `image/png`, matching the upstream attachment endpoint.
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png | Self::Jpg | Self::Image => "image/png",
            Self::Pdf => "application/pdf",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
        }
    }

    /// Extension appended to the stripped file name on upload.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png | Self::Jpg | Self::Image => "png",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::Png | Self::Jpg | Self::Image)
    }
}

/// Returns the text before the first `.` of the supplied name; the typed
/// extension is re-appended by the uploader. Blank names fall back to
/// `attachment`.
pub fn file_name_stem(raw: &str) -> String {
    let stem = raw.trim().split('.').next().unwrap_or("").trim();
    if stem.is_empty() {
        "attachment".to_string()
    } else {
        stem.to_string()
    }
}
