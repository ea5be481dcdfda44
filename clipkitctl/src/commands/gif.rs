use std::path::PathBuf;

use clap::Args;

use clipkit_core::{Delivery, MediaPipeline};

use crate::Result;

use super::upload_from_file;

#[derive(Args, Debug)]
pub struct GifArgs {
    /// Local video or image file to convert
    pub file: PathBuf,
    /// Declared content type, overriding the extension guess
    #[arg(long)]
    pub content_type: Option<String>,
}

pub async fn run(pipeline: &MediaPipeline, args: GifArgs) -> Result<Delivery> {
    let upload = upload_from_file(&args.file, args.content_type).await?;
    Ok(pipeline.render_gif(&upload).await?)
}
