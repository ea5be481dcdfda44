pub mod acquire;
pub mod config;
pub mod deliver;
pub mod error;
pub mod exec;
pub mod pipeline;
pub mod scratch;
pub mod transform;

pub use config::{load_pipeline_config, PipelineConfig};
pub use deliver::{ArtifactHost, Delivery, DeliveryResolver, HostedFile, UguuHost};
pub use error::{ConfigError, Result};
pub use exec::{CommandExecutor, SystemCommandExecutor};
pub use pipeline::{MediaKind, MediaPipeline, MediaUpload, PipelineError, PipelineResult};
