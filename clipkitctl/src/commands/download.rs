use clap::Args;

use clipkit_core::{Delivery, MediaPipeline};

use crate::Result;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// URL of the remote media asset
    pub url: String,
}

pub async fn run(pipeline: &MediaPipeline, args: DownloadArgs) -> Result<Delivery> {
    Ok(pipeline.download(&args.url).await?)
}
