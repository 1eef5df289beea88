//! Command dispatch and job wiring.
//!
//! Used by [main](crate) to run one CLI command against the configured
//! database, and by integration tests to drive whole batches.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{Command, StylesAction};
use crate::config::Config;
use crate::db::{Database, StyleRecord, VideoRecord};
use crate::jobs::{BatchReport, BatchRunner, JobItem, ReconciliationJob, ScopePolicy};
use crate::services::credentials::{CredentialStore, Credentials, RebuildTrigger};
use crate::services::image_style::{ImageStyle, ScaleMode};
use crate::services::materializer::ThumbnailMaterializer;
use crate::services::rate_limiter::RateLimitedClient;
use crate::services::resolver::{ResolverKind, build_resolver};
use crate::services::vimeo::VimeoClient;

/// Settings key of the style used when a command names none
pub const DEFAULT_STYLE_KEY: &str = "settings.default_style";

/// Style used when no default has been configured
pub const FALLBACK_STYLE: &str = "thumbnail";

pub struct App {
    config: Config,
    db: Database,
}

impl App {
    pub fn new(config: Config, db: Database) -> Self {
        Self { config, db }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Run one command, printing its result
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Rebuild {
                resume: Some(batch_id),
                ..
            } => {
                let report = self
                    .resume(&batch_id)
                    .await?
                    .context("Rebuild not resumed")?;
                print_report(&report);
            }
            Command::Rebuild {
                scope,
                style,
                resolver,
                resume: None,
            } => {
                let report = self
                    .rebuild(scope, style, resolver)
                    .await?
                    .context("Rebuild not started")?;
                print_report(&report);
            }
            Command::Update {
                media_id,
                style,
                resolver,
            } => {
                let report = self
                    .update(&media_id, style, resolver)
                    .await?
                    .context("Update not started")?;
                print_report(&report);
            }
            Command::Credentials {
                client_id,
                client_secret,
                api_token,
            } => {
                let store = CredentialStore::new(self.db.settings());
                store
                    .save(&Credentials {
                        client_id,
                        client_secret,
                        api_token,
                    })
                    .await?;
                println!("Credentials saved.");
            }
            Command::DefaultStyle { name } => {
                let style = self.style(Some(name)).await?;
                self.db.settings().set(DEFAULT_STYLE_KEY, &style.name).await?;
                println!("Default style set to {}.", style.name);
            }
            Command::Styles { action: None } => {
                let default = self.default_style_name().await?;
                for record in self.db.styles().list().await? {
                    let marker = if record.name == default { "*" } else { " " };
                    println!(
                        "{} {:<16} {:>5}x{:<5} {:<15} {}",
                        marker, record.name, record.width, record.height, record.mode, record.label
                    );
                }
            }
            Command::Styles {
                action:
                    Some(StylesAction::Add {
                        name,
                        width,
                        height,
                        crop,
                    }),
            } => {
                let style = ImageStyle {
                    label: format!("{} ({}x{})", name, width, height),
                    name,
                    width,
                    height,
                    mode: if crop {
                        ScaleMode::ScaleAndCrop
                    } else {
                        ScaleMode::Scale
                    },
                };
                self.db.styles().upsert(&StyleRecord::from(&style)).await?;
                println!("Style {} saved.", style.name);
            }
            Command::Logs { limit } => {
                for log in self.db.logs().list_recent(limit).await? {
                    println!(
                        "{} {:<5} {} {} {}",
                        log.timestamp,
                        log.level,
                        log.target,
                        log.message,
                        log.fields.unwrap_or_default()
                    );
                }
            }
        }
        Ok(())
    }

    /// Rebuild thumbnails of every video record in the configured bundle.
    ///
    /// Returns `None` without touching any item when credentials are missing.
    pub async fn rebuild(
        &self,
        scope: ScopePolicy,
        style: Option<String>,
        resolver: ResolverKind,
    ) -> Result<Option<BatchReport>> {
        let Some(credentials) = self.preflight().await? else {
            return Ok(None);
        };

        let style = self.style(style).await?;
        let items: Vec<JobItem> = self
            .db
            .media()
            .list_videos(&self.config.video_bundle)
            .await?
            .into_iter()
            .map(JobItem::snapshot)
            .collect();

        info!(
            bundle = %self.config.video_bundle,
            scope = %scope,
            style = %style.name,
            resolver = %resolver,
            items = items.len(),
            "Rebuilding thumbnails"
        );

        let job = self.job(scope, style, resolver, credentials)?;
        let report = BatchRunner::new(self.db.batches()).start(&job, items).await?;
        Ok(Some(report))
    }

    /// Continue an interrupted batch with the options it was started with
    pub async fn resume(&self, batch_id: &str) -> Result<Option<BatchReport>> {
        let Some(credentials) = self.preflight().await? else {
            return Ok(None);
        };

        let runner = BatchRunner::new(self.db.batches());
        let batch = runner.load(batch_id).await?;
        let style = self.style(Some(batch.record.style.clone())).await?;
        let job = self.job(batch.scope, style, batch.resolver, credentials)?;

        Ok(Some(runner.resume(&job, batch).await?))
    }

    /// Rebuild the thumbnail of a single video record, whatever its current state
    pub async fn update(
        &self,
        media_id: &str,
        style: Option<String>,
        resolver: ResolverKind,
    ) -> Result<Option<BatchReport>> {
        let Some(credentials) = self.preflight().await? else {
            return Ok(None);
        };

        let video = self
            .db
            .media()
            .get(media_id)
            .await?
            .with_context(|| format!("Media {} not found", media_id))?;
        if !self.is_video(&video) {
            anyhow::bail!("Media {} is not a video", media_id);
        }
        let name = video.name.clone();

        let style = self.style(style).await?;
        let job = self.job(ScopePolicy::All, style, resolver, credentials)?;
        let report = BatchRunner::new(self.db.batches())
            .start(&job, vec![JobItem::snapshot(video)])
            .await?;

        if report.success && report.counters.processed == 1 {
            println!("Thumbnail {} updated.", name);
        }
        Ok(Some(report))
    }

    async fn preflight(&self) -> Result<Option<Credentials>> {
        let store = CredentialStore::new(self.db.settings());
        let trigger = RebuildTrigger::evaluate(&store).await?;
        if let Some(warning) = &trigger.warning {
            println!("{}", warning);
        }
        Ok(trigger.credentials.filter(|_| trigger.enabled))
    }

    /// Same filter as the full rebuild listing
    fn is_video(&self, record: &VideoRecord) -> bool {
        record.bundle == self.config.video_bundle
            && record.source_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    async fn default_style_name(&self) -> Result<String> {
        self.db
            .settings()
            .get_or_default(DEFAULT_STYLE_KEY, FALLBACK_STYLE.to_string())
            .await
    }

    /// Named style, or the configured default
    async fn style(&self, name: Option<String>) -> Result<ImageStyle> {
        let name = match name {
            Some(name) => name,
            None => self.default_style_name().await?,
        };

        let record = self
            .db
            .styles()
            .get(&name)
            .await?
            .with_context(|| format!("Image style '{}' does not exist", name))?;
        ImageStyle::try_from(record)
    }

    fn job(
        &self,
        scope: ScopePolicy,
        style: ImageStyle,
        resolver: ResolverKind,
        credentials: Credentials,
    ) -> Result<ReconciliationJob> {
        let http = RateLimitedClient::for_video_api(
            self.config.api_requests_per_second,
            self.config.http_timeout,
        )?;
        let vimeo = VimeoClient::new(
            Arc::new(http),
            self.config.video_api_url.clone(),
            self.config.oembed_url.clone(),
            credentials.api_token,
        );
        let resolver = build_resolver(
            resolver,
            Arc::new(vimeo),
            self.config.target_picture_width,
        );
        let materializer = ThumbnailMaterializer::new(
            self.db.files(),
            self.config.files_path.clone(),
            self.config.http_timeout,
        )?;

        Ok(ReconciliationJob::new(
            scope,
            style,
            resolver,
            Arc::new(materializer),
            self.db.media(),
            self.db.files(),
        ))
    }
}

fn print_report(report: &BatchReport) {
    println!("{}", report.message);
    if !report.success {
        println!("Resume with: thumbnail-rebuilder rebuild --resume {}", report.batch_id);
    }
}
