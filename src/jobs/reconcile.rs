//! Thumbnail reconciliation job
//!
//! A tick-based state machine over a snapshot of video records. Each call to
//! [`ReconciliationJob::step`] handles exactly one item and returns the
//! updated [`Sandbox`], which the caller persists between ticks. Item-level
//! failures are counted and logged, never returned.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::db::{FileRepository, MediaRepository, VideoRecord};
use crate::services::filename_codec::ThumbnailDescriptor;
use crate::services::image_style::ImageStyle;
use crate::services::materializer::ArtifactMaterializer;
use crate::services::resolver::{ResolverKind, ThumbnailUrlResolver};

/// Filename of the placeholder image attached to videos without a picture
pub const PLACEHOLDER_FILENAME: &str = "video.png";

/// Which items a run rebuilds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// Only items without a thumbnail or with the placeholder
    #[default]
    #[value(name = "missing", alias = "missing_only")]
    MissingOnly,
    /// Every video record
    All,
}

impl ScopePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopePolicy::MissingOnly => "missing",
            ScopePolicy::All => "all",
        }
    }

    /// Whether an item whose current thumbnail has `filename` is rebuilt
    pub fn admits(&self, filename: &str) -> bool {
        match self {
            ScopePolicy::All => true,
            ScopePolicy::MissingOnly => filename.is_empty() || filename == PLACEHOLDER_FILENAME,
        }
    }
}

impl fmt::Display for ScopePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "missing" | "missing_only" => Ok(ScopePolicy::MissingOnly),
            "all" => Ok(ScopePolicy::All),
            other => anyhow::bail!("Unknown scope '{}' (expected missing or all)", other),
        }
    }
}

/// A video record plus the thumbnail id it had when the run was planned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub video: VideoRecord,
    pub original_thumbnail_id: Option<String>,
}

impl JobItem {
    pub fn snapshot(video: VideoRecord) -> Self {
        Self {
            original_thumbnail_id: video.thumbnail_id.clone(),
            video,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub progress: usize,
    pub max: usize,
}

impl ProgressCursor {
    pub fn new(max: usize) -> Self {
        Self { progress: 0, max }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= self.max
    }

    /// Share of items handled, 1.0 for an empty run
    pub fn fraction(&self) -> f64 {
        if self.max == 0 {
            1.0
        } else {
            self.progress as f64 / self.max as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultCounters {
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
}

impl ResultCounters {
    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.errored
    }

    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Processed { .. } => self.processed += 1,
            ItemOutcome::Skipped { .. } => self.skipped += 1,
            ItemOutcome::Errored { .. } => self.errored += 1,
        }
    }
}

/// Progress state carried between ticks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sandbox {
    pub cursor: Option<ProgressCursor>,
    pub results: ResultCounters,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    NotStarted,
    Running,
    Complete,
}

impl Sandbox {
    pub fn status(&self) -> JobStatus {
        match self.cursor {
            None => JobStatus::NotStarted,
            Some(cursor) if cursor.is_complete() => JobStatus::Complete,
            Some(_) => JobStatus::Running,
        }
    }

    pub fn fraction(&self) -> f64 {
        self.cursor.map(|c| c.fraction()).unwrap_or(0.0)
    }
}

/// What happened to the item handled by a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Processed { media_id: String, file_id: String },
    Skipped { media_id: String },
    Errored { media_id: String, reason: String },
}

/// Result of one call to [`ReconciliationJob::step`]
#[derive(Debug, Clone)]
pub struct Tick {
    pub sandbox: Sandbox,
    pub done: bool,
    pub fraction: f64,
    /// `None` when the tick had no item to handle
    pub outcome: Option<ItemOutcome>,
}

impl Tick {
    fn new(sandbox: Sandbox, outcome: Option<ItemOutcome>) -> Self {
        Self {
            done: sandbox.status() == JobStatus::Complete,
            fraction: sandbox.fraction(),
            sandbox,
            outcome,
        }
    }
}

pub struct ReconciliationJob {
    scope: ScopePolicy,
    style: ImageStyle,
    resolver: Arc<dyn ThumbnailUrlResolver>,
    materializer: Arc<dyn ArtifactMaterializer>,
    media: MediaRepository,
    files: FileRepository,
}

impl ReconciliationJob {
    pub fn new(
        scope: ScopePolicy,
        style: ImageStyle,
        resolver: Arc<dyn ThumbnailUrlResolver>,
        materializer: Arc<dyn ArtifactMaterializer>,
        media: MediaRepository,
        files: FileRepository,
    ) -> Self {
        Self {
            scope,
            style,
            resolver,
            materializer,
            media,
            files,
        }
    }

    pub fn scope(&self) -> ScopePolicy {
        self.scope
    }

    pub fn style(&self) -> &ImageStyle {
        &self.style
    }

    pub fn resolver_kind(&self) -> ResolverKind {
        self.resolver.kind()
    }

    /// Handle the item under the cursor and advance it by one
    pub async fn step(&self, items: &[JobItem], mut sandbox: Sandbox) -> Tick {
        let mut cursor = match sandbox.cursor {
            Some(cursor) => cursor,
            None => {
                sandbox.results = ResultCounters::default();
                ProgressCursor::new(items.len())
            }
        };

        if cursor.is_complete() {
            sandbox.cursor = Some(cursor);
            return Tick::new(sandbox, None);
        }

        let index = cursor.progress;
        let outcome = match items.get(index) {
            Some(item) => self.process(item).await,
            None => {
                let reason = format!("item {} is missing from the run snapshot", index);
                warn!(index, reason = %reason, "Thumbnail rebuild failed");
                ItemOutcome::Errored {
                    media_id: String::new(),
                    reason,
                }
            }
        };

        sandbox.results.record(&outcome);
        cursor.progress += 1;
        sandbox.cursor = Some(cursor);

        Tick::new(sandbox, Some(outcome))
    }

    async fn process(&self, item: &JobItem) -> ItemOutcome {
        let media_id = item.video.id.clone();

        match self.rebuild(item).await {
            Ok(Some(file_id)) => ItemOutcome::Processed { media_id, file_id },
            Ok(None) => ItemOutcome::Skipped { media_id },
            Err(e) => {
                let reason = format!("{:#}", e);
                warn!(
                    media_id = %media_id,
                    name = %item.video.name,
                    reason = %reason,
                    "Thumbnail rebuild failed"
                );
                ItemOutcome::Errored { media_id, reason }
            }
        }
    }

    /// Returns the new file id, or `None` when the item is out of scope
    async fn rebuild(&self, item: &JobItem) -> anyhow::Result<Option<String>> {
        let current_filename = match &item.original_thumbnail_id {
            Some(id) => self
                .files
                .get(id)
                .await?
                .map(|file| file.filename)
                .unwrap_or_default(),
            None => String::new(),
        };

        if !self.scope.admits(&current_filename) {
            debug!(
                media_id = %item.video.id,
                filename = %current_filename,
                "Thumbnail present, skipping"
            );
            return Ok(None);
        }

        let remote_ref = item
            .video
            .source_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| anyhow!("video has no remote reference"))?;

        let url = self
            .resolver
            .resolve(remote_ref)
            .await?
            .ok_or_else(|| anyhow!("video API returned no picture for {}", remote_ref))?;

        let descriptor = ThumbnailDescriptor::decode(&url);
        let artifact = self
            .materializer
            .materialize(&url, &descriptor, &self.style)
            .await?;

        if !self.media.set_thumbnail(&item.video.id, &artifact.id).await? {
            anyhow::bail!("media record {} no longer exists", item.video.id);
        }

        Ok(Some(artifact.id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{CreateVideo, Database, ImageArtifact, NewFile};
    use crate::error::{ThumbnailError, ThumbnailResult};
    use crate::services::image_style::ScaleMode;

    /// Maps remote references to picture URLs; unknown references fail
    struct FakeResolver(HashMap<String, Option<String>>);

    #[async_trait]
    impl ThumbnailUrlResolver for FakeResolver {
        fn kind(&self) -> ResolverKind {
            ResolverKind::Api
        }

        async fn resolve(&self, remote_ref: &str) -> ThumbnailResult<Option<String>> {
            self.0
                .get(remote_ref)
                .cloned()
                .ok_or_else(|| ThumbnailError::remote_api(remote_ref, "HTTP 500"))
        }
    }

    /// Records a file row without touching the network or disk
    struct FakeMaterializer(FileRepository);

    #[async_trait]
    impl ArtifactMaterializer for FakeMaterializer {
        async fn materialize(
            &self,
            _url: &str,
            descriptor: &ThumbnailDescriptor,
            style: &ImageStyle,
        ) -> ThumbnailResult<ImageArtifact> {
            let uri = style.build_uri(&format!(
                "{}_{}.{}",
                descriptor.video_id_or_empty(),
                style.name,
                descriptor.extension_or_empty()
            ));
            self.0
                .save_replace(NewFile {
                    uri: uri.clone(),
                    filename: descriptor.filename.clone(),
                    mime_type: "image/jpeg".to_string(),
                    size_bytes: 1,
                })
                .await
                .map_err(|e| ThumbnailError::storage(uri, e))
        }
    }

    fn style() -> ImageStyle {
        ImageStyle {
            name: "thumbnail".to_string(),
            label: "Thumbnail".to_string(),
            width: 100,
            height: 100,
            mode: ScaleMode::Scale,
        }
    }

    fn job(db: &Database, scope: ScopePolicy, pictures: &[(&str, Option<&str>)]) -> ReconciliationJob {
        let resolver = FakeResolver(
            pictures
                .iter()
                .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                .collect(),
        );
        ReconciliationJob::new(
            scope,
            style(),
            Arc::new(resolver),
            Arc::new(FakeMaterializer(db.files())),
            db.media(),
            db.files(),
        )
    }

    async fn video(db: &Database, name: &str, source_url: &str, thumbnail_id: Option<String>) -> JobItem {
        let record = db
            .media()
            .create(CreateVideo {
                bundle: "vimeo".to_string(),
                name: name.to_string(),
                source_url: Some(source_url.to_string()),
                thumbnail_id,
            })
            .await
            .unwrap();
        JobItem::snapshot(record)
    }

    async fn file(db: &Database, filename: &str) -> String {
        db.files()
            .save_replace(NewFile {
                uri: format!("public/{}", filename),
                filename: filename.to_string(),
                mime_type: "image/png".to_string(),
                size_bytes: 1,
            })
            .await
            .unwrap()
            .id
    }

    async fn run(job: &ReconciliationJob, items: &[JobItem]) -> (Sandbox, Vec<ItemOutcome>) {
        let mut sandbox = Sandbox::default();
        let mut outcomes = Vec::new();
        loop {
            let tick = job.step(items, sandbox).await;
            sandbox = tick.sandbox;
            let cursor = sandbox.cursor.unwrap();
            assert_eq!(sandbox.results.total(), cursor.progress);
            outcomes.extend(tick.outcome);
            if tick.done {
                return (sandbox, outcomes);
            }
        }
    }

    #[test]
    fn test_scope_policy() {
        assert!(ScopePolicy::MissingOnly.admits(""));
        assert!(ScopePolicy::MissingOnly.admits("video.png"));
        assert!(!ScopePolicy::MissingOnly.admits("42_640x360.jpg"));
        assert!(ScopePolicy::All.admits("42_640x360.jpg"));
        assert_eq!("missing".parse::<ScopePolicy>().unwrap(), ScopePolicy::MissingOnly);
        assert_eq!("all".parse::<ScopePolicy>().unwrap(), ScopePolicy::All);
        assert!("some".parse::<ScopePolicy>().is_err());
    }

    #[test]
    fn test_cursor_fraction() {
        assert_eq!(ProgressCursor::new(0).fraction(), 1.0);
        assert_eq!(ProgressCursor { progress: 1, max: 4 }.fraction(), 0.25);
        assert_eq!(Sandbox::default().status(), JobStatus::NotStarted);
    }

    #[test]
    fn test_sandbox_serializes() {
        let sandbox = Sandbox {
            cursor: Some(ProgressCursor { progress: 2, max: 3 }),
            results: ResultCounters {
                processed: 1,
                skipped: 1,
                errored: 0,
            },
        };
        let json = serde_json::to_string(&sandbox).unwrap();
        assert_eq!(serde_json::from_str::<Sandbox>(&json).unwrap(), sandbox);
    }

    #[tokio::test]
    async fn test_empty_list_completes_on_first_tick() {
        let db = Database::in_memory().await.unwrap();
        let job = job(&db, ScopePolicy::All, &[]);

        let tick = job.step(&[], Sandbox::default()).await;
        assert!(tick.done);
        assert_eq!(tick.fraction, 1.0);
        assert!(tick.outcome.is_none());
        assert_eq!(tick.sandbox.results, ResultCounters::default());
    }

    #[tokio::test]
    async fn test_missing_only_skips_real_thumbnails() {
        let db = Database::in_memory().await.unwrap();
        let real = file(&db, "42_640x360.jpg").await;
        let placeholder = file(&db, "video.png").await;
        let items = vec![
            video(&db, "Has thumbnail", "https://vimeo.com/1", Some(real)).await,
            video(&db, "Placeholder", "https://vimeo.com/2", Some(placeholder)).await,
            video(&db, "Nothing", "https://vimeo.com/3", None).await,
            video(&db, "Dangling", "https://vimeo.com/4", Some("gone".to_string())).await,
        ];
        let job = job(
            &db,
            ScopePolicy::MissingOnly,
            &[
                ("https://vimeo.com/2", Some("https://cdn/2_640x360.jpg")),
                ("https://vimeo.com/3", Some("https://cdn/3_640x360.jpg")),
                ("https://vimeo.com/4", Some("https://cdn/4_640x360.jpg")),
            ],
        );

        let (sandbox, outcomes) = run(&job, &items).await;
        assert_eq!(
            sandbox.results,
            ResultCounters {
                processed: 3,
                skipped: 1,
                errored: 0,
            }
        );
        assert!(matches!(outcomes[0], ItemOutcome::Skipped { .. }));

        let updated = db.media().get(&items[1].video.id).await.unwrap().unwrap();
        let file = db.files().get(updated.thumbnail_id.as_deref().unwrap()).await.unwrap().unwrap();
        assert_eq!(file.uri, "styles/thumbnail/2_thumbnail.jpg");
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_propagated() {
        let db = Database::in_memory().await.unwrap();
        let items = vec![
            video(&db, "Ok", "https://vimeo.com/1", None).await,
            video(&db, "No picture", "https://vimeo.com/2", None).await,
            video(&db, "API down", "https://vimeo.com/3", None).await,
        ];
        let job = job(
            &db,
            ScopePolicy::All,
            &[
                ("https://vimeo.com/1", Some("https://cdn/1_640x360.jpg")),
                ("https://vimeo.com/2", None),
            ],
        );

        let (sandbox, outcomes) = run(&job, &items).await;
        assert_eq!(
            sandbox.results,
            ResultCounters {
                processed: 1,
                skipped: 0,
                errored: 2,
            }
        );
        assert!(matches!(
            &outcomes[2],
            ItemOutcome::Errored { reason, .. } if reason.contains("HTTP 500")
        ));

        // The failed item keeps its old thumbnail
        let untouched = db.media().get(&items[2].video.id).await.unwrap().unwrap();
        assert_eq!(untouched.thumbnail_id, None);
    }

    #[tokio::test]
    async fn test_step_on_complete_sandbox_is_noop() {
        let db = Database::in_memory().await.unwrap();
        let items = vec![video(&db, "Ok", "https://vimeo.com/1", None).await];
        let job = job(&db, ScopePolicy::All, &[("https://vimeo.com/1", Some("https://cdn/1_a.jpg"))]);

        let (sandbox, _) = run(&job, &items).await;
        let again = job.step(&items, sandbox.clone()).await;
        assert!(again.done);
        assert!(again.outcome.is_none());
        assert_eq!(again.sandbox, sandbox);
    }

    #[tokio::test]
    async fn test_cursor_past_snapshot_counts_as_error() {
        let db = Database::in_memory().await.unwrap();
        let job = job(&db, ScopePolicy::All, &[]);
        let sandbox = Sandbox {
            cursor: Some(ProgressCursor { progress: 0, max: 1 }),
            results: ResultCounters::default(),
        };

        let tick = job.step(&[], sandbox).await;
        assert!(tick.done);
        assert_eq!(tick.sandbox.results.errored, 1);
    }
}
