//! Thumbnail materialization: download, store, derive, re-point
//!
//! Both images land in the style's namespace below the files root:
//! - the full-size download under its own filename
//! - the derivative under `{video_id}_{style}.{extension}`
//!
//! A single file record is kept per item. It is saved for the download and
//! then pointed at the derivative.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::filename_codec::ThumbnailDescriptor;
use super::image_style::ImageStyle;
use crate::db::{FileRepository, ImageArtifact, NewFile};
use crate::error::{ThumbnailError, ThumbnailResult};

#[async_trait]
pub trait ArtifactMaterializer: Send + Sync {
    async fn materialize(
        &self,
        url: &str,
        descriptor: &ThumbnailDescriptor,
        style: &ImageStyle,
    ) -> ThumbnailResult<ImageArtifact>;
}

/// Stores thumbnails on the local filesystem
pub struct ThumbnailMaterializer {
    http_client: reqwest::Client,
    files: FileRepository,
    files_root: PathBuf,
}

impl ThumbnailMaterializer {
    pub fn new(
        files: FileRepository,
        files_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create download client")?;

        Ok(Self {
            http_client,
            files,
            files_root: files_root.into(),
        })
    }

    async fn download(&self, url: &str) -> ThumbnailResult<Vec<u8>> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ThumbnailError::download(url, e))?;

        if !response.status().is_success() {
            return Err(ThumbnailError::download(
                url,
                format!("status {}", response.status()),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ThumbnailError::download(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// MIME type sniffed from content, falling back to the filename
fn detect_mime(bytes: &[u8], filename: &str) -> String {
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| {
            mime_guess::from_path(filename)
                .first_or_octet_stream()
                .to_string()
        })
}

#[async_trait]
impl ArtifactMaterializer for ThumbnailMaterializer {
    async fn materialize(
        &self,
        url: &str,
        descriptor: &ThumbnailDescriptor,
        style: &ImageStyle,
    ) -> ThumbnailResult<ImageArtifact> {
        info!(url = %url, style = %style.name, "Materializing thumbnail");

        let bytes = self.download(url).await?;

        if descriptor.filename.is_empty() {
            return Err(ThumbnailError::storage(url, "picture URL has no filename"));
        }

        style.prepare_directory(&self.files_root).await?;
        let full_uri = style.build_uri(&descriptor.filename);
        let full_path = self.files_root.join(&full_uri);
        tokio::fs::write(&full_path, &bytes)
            .await
            .map_err(|e| ThumbnailError::storage(full_path.display(), e))?;
        debug!(path = %full_path.display(), size = bytes.len(), "Full-size picture written");

        let artifact = self
            .files
            .save_replace(NewFile {
                uri: full_uri.clone(),
                filename: descriptor.filename.clone(),
                mime_type: detect_mime(&bytes, &descriptor.filename),
                size_bytes: bytes.len() as i64,
            })
            .await
            .map_err(|e| ThumbnailError::storage(&full_uri, format!("{:#}", e)))?;

        if !descriptor.is_complete() {
            warn!(
                filename = %descriptor.filename,
                "Picture filename did not decode fully, derivative name will be partial"
            );
        }

        let derived_name = format!(
            "{}_{}.{}",
            descriptor.video_id_or_empty(),
            style.name,
            descriptor.extension_or_empty()
        );
        let derived_uri = style.build_uri(&derived_name);
        let size = style
            .create_derivative(&full_path, &self.files_root.join(&derived_uri))
            .await?;

        let artifact = self
            .files
            .update_location(&artifact.id, &derived_uri, size as i64)
            .await
            .map_err(|e| ThumbnailError::storage(&derived_uri, format!("{:#}", e)))?;

        info!(file_id = %artifact.id, uri = %artifact.uri, "Thumbnail stored");
        Ok(artifact)
    }
}
