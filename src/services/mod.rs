//! External service integrations and thumbnail pipeline stages

pub mod credentials;
pub mod filename_codec;
pub mod image_style;
pub mod logging;
pub mod materializer;
pub mod rate_limiter;
pub mod resolver;
pub mod vimeo;

pub use credentials::{CredentialStore, Credentials, MISSING_CREDENTIALS_WARNING, RebuildTrigger};
pub use filename_codec::ThumbnailDescriptor;
pub use image_style::{ImageStyle, ScaleMode};
pub use logging::{DatabaseLoggerConfig, LogWriterHandle, create_database_layer, init_tracing};
pub use materializer::{ArtifactMaterializer, ThumbnailMaterializer};
pub use rate_limiter::{RateLimitConfig, RateLimitedClient};
pub use resolver::{
    ApiPictureResolver, OEmbedPictureResolver, ResolverKind, ThumbnailUrlResolver, build_resolver,
};
pub use vimeo::VimeoClient;
