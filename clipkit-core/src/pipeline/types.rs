/// Closed media classification resolved once at job entry from the
/// declared content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Unsupported,
}

impl MediaKind {
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(value) if value.starts_with("video/") => MediaKind::Video,
            Some(value) if value.starts_with("image/") => MediaKind::Image,
            _ => MediaKind::Unsupported,
        }
    }
}

/// Local source descriptor: an uploaded byte payload with its declared
/// content type and original name.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaUpload {
    pub fn kind(&self) -> MediaKind {
        MediaKind::from_content_type(self.content_type.as_deref())
    }

    /// Extension of the uploaded name, for the scratch copy. Only
    /// alphanumeric suffixes are trusted; anything else (including an
    /// embedded path separator) falls back to `bin`.
    pub fn extension(&self) -> &str {
        self.file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin")
    }
}
