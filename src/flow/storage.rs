/// File-based persistence for flow definitions
///
/// Each flow lives in `<dir>/<id>.json`. Writes go to a temporary file that
/// is renamed over the target, so readers never see a half-written document.

use crate::flow::types::FlowDefinition;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

/// Directory-backed flow storage
#[derive(Debug, Clone)]
pub struct FlowStorage {
    dir: PathBuf,
}

/// Listing entry for a stored flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowMetadata {
    pub id: String,
    pub name: String,
    pub actors: usize,
    pub events: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Flow ids become file names, so only a safe subset is allowed
pub fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid flow id '{}': use letters, digits, '-' and '_'",
            id
        ))
    }
}

impl FlowStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the storage directory if needed
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tracing::debug!("📁 Flow storage at {}", self.dir.display());
        Ok(())
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{}.json", id)))
    }

    /// Store a new flow or replace an existing one
    pub async fn save_flow(&self, flow: &FlowDefinition) -> Result<()> {
        let path = self.path_for(&flow.id)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", flow.id));
        let json = serde_json::to_vec_pretty(flow)?;

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::debug!("💾 Saved flow '{}' to {}", flow.id, path.display());
        Ok(())
    }

    pub async fn get_flow(&self, id: &str) -> Result<Option<FlowDefinition>> {
        let path = self.path_for(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let flow: FlowDefinition = serde_json::from_slice(&bytes)
                    .map_err(|e| anyhow::anyhow!("Corrupt flow file {}: {}", path.display(), e))?;
                Ok(Some(flow))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load every stored flow, keyed by id
    ///
    /// Files that cannot be parsed are skipped with a warning.
    pub async fn load_all_flows(&self) -> Result<HashMap<String, FlowDefinition>> {
        let mut flows = HashMap::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(flows),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(id) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            if validate_id(id).is_err() {
                continue;
            }
            match self.get_flow(id).await {
                Ok(Some(flow)) if flow.id == id => {
                    flows.insert(id.to_string(), flow);
                }
                Ok(Some(flow)) => {
                    tracing::warn!("⚠️ Skipping {}: contains flow id '{}'", path.display(), flow.id);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("⚠️ Skipping {}: {}", path.display(), e),
            }
        }

        Ok(flows)
    }

    /// Listing sorted by id
    pub async fn list_flows(&self) -> Result<Vec<FlowMetadata>> {
        let flows = self.load_all_flows().await?;
        let mut listing = Vec::with_capacity(flows.len());
        for (id, flow) in flows {
            let updated_at = tokio::fs::metadata(self.path_for(&id)?)
                .await
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::<Utc>::from);
            listing.push(FlowMetadata {
                id,
                name: flow.name,
                actors: flow.actors.iter().map(|a| a.walk().len()).sum(),
                events: flow.events.len(),
                updated_at,
            });
        }
        listing.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listing)
    }

    /// Returns whether a flow was deleted
    pub async fn delete_flow(&self, id: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(id)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
