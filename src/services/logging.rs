//! Logging: stdout output and database persistence of log events.
//!
//! Events at or above the configured level are copied into `app_logs`, the
//! error log that batch summaries point operators at. The tracing layer never
//! blocks: it hands rows to a writer task over a bounded channel, and the
//! writer inserts them in batches. [`LogWriterHandle::shutdown`] drains the
//! channel and flushes what is left.

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use time::OffsetDateTime;
use tokio::sync::{mpsc, oneshot};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use uuid::Uuid;

use crate::db::{AppLog, Database, LogsRepository};

/// Configuration for database log persistence
#[derive(Debug, Clone)]
pub struct DatabaseLoggerConfig {
    pub min_level: Level,
    pub batch_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for DatabaseLoggerConfig {
    fn default() -> Self {
        Self {
            min_level: Level::WARN,
            batch_size: 100,
            flush_interval_ms: 2000,
        }
    }
}

/// Handle on the background writer; call [`shutdown`](Self::shutdown) before exit
pub struct LogWriterHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<()>,
}

impl LogWriterHandle {
    /// Stop the writer after flushing every queued event
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = self.handle.await;
    }
}

/// Create the database layer and spawn its writer task
pub fn create_database_layer(
    db: &Database,
    config: DatabaseLoggerConfig,
) -> (DatabaseLoggingLayer, LogWriterHandle) {
    let batch_size = config.batch_size.max(1);
    let (db_tx, db_rx) = mpsc::channel::<AppLog>(batch_size * 10);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let handle = tokio::spawn(database_writer_task(
        db_rx,
        db.logs(),
        batch_size,
        config.flush_interval_ms,
        shutdown_rx,
    ));

    (
        DatabaseLoggingLayer::new(config.min_level, db_tx),
        LogWriterHandle {
            shutdown_tx: Some(shutdown_tx),
            handle,
        },
    )
}

/// Install the global subscriber: env filter, JSON stdout, database layer
pub fn init_tracing(db: &Database, min_db_level: Level) -> LogWriterHandle {
    let (db_layer, handle) = create_database_layer(
        db,
        DatabaseLoggerConfig {
            min_level: min_db_level,
            ..Default::default()
        },
    );

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("thumbnail_rebuilder=info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .with(db_layer)
        .init();

    handle
}

async fn flush(logs: &LogsRepository, batch: &mut Vec<AppLog>) {
    if batch.is_empty() {
        return;
    }
    if let Err(e) = logs.insert_batch(batch).await {
        // Written to stderr, re-logging would feed the failure back into the channel
        eprintln!("Failed to write logs to database: {:#}", e);
    }
    batch.clear();
}

async fn database_writer_task(
    mut rx: mpsc::Receiver<AppLog>,
    logs: LogsRepository,
    batch_size: usize,
    flush_interval_ms: u64,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut batch: Vec<AppLog> = Vec::with_capacity(batch_size);
    let mut interval = tokio::time::interval(tokio::time::Duration::from_millis(flush_interval_ms));

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            maybe_log = rx.recv() => match maybe_log {
                Some(log) => {
                    batch.push(log);
                    if batch.len() >= batch_size {
                        flush(&logs, &mut batch).await;
                    }
                }
                None => break,
            },
            _ = interval.tick() => flush(&logs, &mut batch).await,
        }
    }

    while let Ok(log) = rx.try_recv() {
        batch.push(log);
    }
    flush(&logs, &mut batch).await;
}

/// Tracing layer that queues events for the database writer
#[derive(Clone)]
pub struct DatabaseLoggingLayer {
    min_level: Level,
    db_tx: mpsc::Sender<AppLog>,
}

impl DatabaseLoggingLayer {
    pub fn new(min_level: Level, db_tx: mpsc::Sender<AppLog>) -> Self {
        Self { min_level, db_tx }
    }
}

#[derive(Default)]
struct FieldVisitor {
    fields: HashMap<String, JsonValue>,
    message: Option<String>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let value_str = format!("{:?}", value);
        if field.name() == "message" {
            self.message = Some(value_str);
        } else {
            self.fields
                .insert(field.name().to_string(), JsonValue::String(value_str));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(
                field.name().to_string(),
                JsonValue::String(value.to_string()),
            );
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.fields
            .insert(field.name().to_string(), JsonValue::Number(value.into()));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.fields
            .insert(field.name().to_string(), JsonValue::Number(value.into()));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.fields
            .insert(field.name().to_string(), JsonValue::Bool(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.fields
                .insert(field.name().to_string(), JsonValue::Number(n));
        }
    }
}

impl<S> Layer<S> for DatabaseLoggingLayer
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > self.min_level {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let span = ctx.event_span(event);
        let span_name = span.as_ref().map(|s| s.name().to_string());
        let span_id = span.as_ref().map(|s| format!("{:?}", s.id()));

        let fields = if visitor.fields.is_empty() {
            None
        } else {
            serde_json::to_string(&visitor.fields).ok()
        };

        let timestamp = OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default();

        let app_log = AppLog {
            id: Uuid::new_v4().to_string(),
            timestamp: timestamp.clone(),
            level: level.as_str().to_uppercase(),
            target: event.metadata().target().to_string(),
            message: visitor.message.unwrap_or_default(),
            fields,
            span_name,
            span_id,
            created_at: timestamp,
        };

        // Dropped when the channel is full
        let _ = self.db_tx.try_send(app_log);
    }
}
