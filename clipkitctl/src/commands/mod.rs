pub mod degrade;
pub mod download;
pub mod gif;

use std::path::Path;

use clipkit_core::MediaUpload;

use crate::Result;

/// Reads a local file into the pipeline's upload descriptor, guessing the
/// content type from the extension when the caller did not declare one.
pub async fn upload_from_file(path: &Path, content_type: Option<String>) -> Result<MediaUpload> {
    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.bin".to_string());
    let content_type = content_type.or_else(|| guess_content_type(&file_name));
    Ok(MediaUpload {
        file_name,
        content_type,
        bytes,
    })
}

fn guess_content_type(file_name: &str) -> Option<String> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let guessed = match extension.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        "gif" => "image/gif",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(guessed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guesses_common_extensions() {
        assert_eq!(guess_content_type("clip.MP4").as_deref(), Some("video/mp4"));
        assert_eq!(guess_content_type("pic.jpeg").as_deref(), Some("image/jpeg"));
        assert_eq!(guess_content_type("notes.txt"), None);
        assert_eq!(guess_content_type("noext"), None);
    }
}
