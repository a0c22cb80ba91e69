//! Directory spool event source
//!
//! Events are JSON files laid out by topic:
//!
//! ```text
//! <spool_dir>/publish/<trigger>/<ResourceType>/*.json
//! <spool_dir>/load/<ResourceType>/*.json
//! ```
//!
//! A file holds one event or a JSON array of events. Files are consumed in
//! name order and deleted once read. Unparseable files are renamed with an
//! `.invalid` suffix so they are not read again.
//!
//! Messages that fail processing are written back under
//! `<spool_dir>/failed/<topic>/` and stay there until requeued.

use super::traits::EventSource;
use crate::domain::{
    DataTrigger, InboundMessage, InteropResourceLoadV1, InteropResourcePublishV1, RelayError,
    Result, Topic,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

const FAILED_DIR: &str = "failed";

/// File-backed [`EventSource`]
#[derive(Debug)]
pub struct SpoolEventSource {
    root: PathBuf,
    max_files_per_poll: usize,
    rejected: AtomicUsize,
}

impl SpoolEventSource {
    pub fn new(root: impl Into<PathBuf>, max_files_per_poll: usize) -> Self {
        Self {
            root: root.into(),
            max_files_per_poll: max_files_per_poll.max(1),
            rejected: AtomicUsize::new(0),
        }
    }

    /// Directory holding rejected messages for a topic
    pub fn failed_dir(&self, topic: &Topic) -> PathBuf {
        self.root.join(FAILED_DIR).join(topic_path(topic))
    }

    /// Directory holding publish events for a resource type and trigger
    pub fn publish_dir(&self, resource_type: &str, trigger: DataTrigger) -> PathBuf {
        self.root
            .join("publish")
            .join(trigger.as_str())
            .join(resource_type)
    }

    /// Directory holding load events for a resource type
    pub fn load_dir(&self, resource_type: &str) -> PathBuf {
        self.root.join("load").join(resource_type)
    }

    async fn drain<T: DeserializeOwned>(&self, dir: &Path) -> Result<Vec<T>> {
        if !tokio::fs::try_exists(dir).await? {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        files.truncate(self.max_files_per_poll);

        let mut events = Vec::new();
        for path in files {
            let contents = tokio::fs::read_to_string(&path).await?;
            match parse_file::<T>(&contents) {
                Ok(parsed) => {
                    events.extend(parsed);
                    tokio::fs::remove_file(&path).await?;
                }
                Err(e) => {
                    tracing::error!(
                        path = %path.display(),
                        error = %e,
                        "Unparseable event file, setting aside"
                    );
                    let mut invalid = path.clone().into_os_string();
                    invalid.push(".invalid");
                    tokio::fs::rename(&path, PathBuf::from(invalid)).await?;
                }
            }
        }

        Ok(events)
    }
}

fn topic_path(topic: &Topic) -> PathBuf {
    match topic {
        Topic::Publish {
            resource_type,
            trigger,
        } => Path::new("publish").join(trigger.as_str()).join(resource_type),
        Topic::Load { resource_type } => Path::new("load").join(resource_type),
    }
}

async fn json_files_under(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
            } else if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

fn parse_file<T: DeserializeOwned>(contents: &str) -> serde_json::Result<Vec<T>> {
    match serde_json::from_str::<Value>(contents)? {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

#[async_trait]
impl EventSource for SpoolEventSource {
    async fn retrieve_publish_events(
        &self,
        resource_type: &str,
        trigger: DataTrigger,
    ) -> Result<Vec<InteropResourcePublishV1>> {
        self.drain(&self.publish_dir(resource_type, trigger)).await
    }

    async fn retrieve_load_events(&self, resource_type: &str) -> Result<Vec<InteropResourceLoadV1>> {
        self.drain(&self.load_dir(resource_type)).await
    }

    async fn reject(&self, message: &InboundMessage) -> Result<()> {
        let topic = message.topic.as_ref().ok_or_else(|| {
            RelayError::EventSource(format!(
                "Cannot reject message for tenant {} without a topic",
                message.tenant_mnemonic
            ))
        })?;

        let dir = self.failed_dir(topic);
        tokio::fs::create_dir_all(&dir).await?;
        let seq = self.rejected.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{seq:06}.json", Utc::now().format("%Y%m%dT%H%M%S%6f"));
        let path = dir.join(name);
        tokio::fs::write(&path, &message.body).await?;

        tracing::warn!(
            topic = %topic,
            tenant = %message.tenant_mnemonic,
            path = %path.display(),
            "Message kept for redelivery"
        );
        Ok(())
    }

    async fn requeue_rejected(&self) -> Result<usize> {
        let failed_root = self.root.join(FAILED_DIR);
        if !tokio::fs::try_exists(&failed_root).await? {
            return Ok(0);
        }

        let mut moved = 0;
        for path in json_files_under(&failed_root).await? {
            let relative = path.strip_prefix(&failed_root).map_err(|e| {
                RelayError::EventSource(format!("Bad failed path {}: {e}", path.display()))
            })?;
            let target = self.root.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::rename(&path, &target).await?;
            moved += 1;
        }

        if moved > 0 {
            tracing::info!(count = moved, "Requeued rejected messages");
        }
        Ok(moved)
    }
}
