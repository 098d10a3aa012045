//! On-disk form of a document store
//!
//! A saved index is a directory holding `manifest.json` and
//! `items.json.zst` (zstd-compressed JSON of every item with its vector).
//! Item data is deserialized as-is, so loading requires an explicit
//! [`Trust`] decision from the caller.

use super::{Store, StoreOptions, StoredItem};
use crate::error::{QueryError, Result};
use crate::store::DistanceMetric;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const ITEMS_FILE: &str = "items.json.zst";
const COMPRESSION_LEVEL: i32 = 3;

/// Whether the caller accepts the contents of a saved index without checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    /// Deserialize the saved items as they are
    TrustSerialized,
    /// Do not read the index
    Refuse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub format_version: u32,
    pub index_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub embedding_model: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub item_count: usize,
    /// BLAKE3 of the uncompressed item payload
    pub fingerprint: String,
}

impl Store {
    /// Write the store to `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<IndexManifest> {
        fs::create_dir_all(dir).map_err(|e| {
            QueryError::io(e, format!("Failed to create index directory: {}", dir.display()))
        })?;

        let payload = serde_json::to_vec(&self.items)
            .map_err(|e| QueryError::json(e, "Failed to serialize index items"))?;
        let manifest = IndexManifest {
            format_version: FORMAT_VERSION,
            index_id: Uuid::new_v4(),
            created_at: Utc::now(),
            embedding_model: self.embedding_model.clone(),
            dimension: self.dimension,
            metric: self.options.metric,
            item_count: self.items.len(),
            fingerprint: blake3::hash(&payload).to_hex().to_string(),
        };

        let compressed = zstd::encode_all(&payload[..], COMPRESSION_LEVEL)
            .map_err(|e| QueryError::io(e, "Failed to compress index items"))?;
        write_atomic(&dir.join(ITEMS_FILE), &compressed)?;

        let manifest_json = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| QueryError::json(e, "Failed to serialize index manifest"))?;
        write_atomic(&dir.join(MANIFEST_FILE), &manifest_json)?;

        tracing::info!(
            "Saved index {} ({} items) to {}",
            manifest.index_id,
            manifest.item_count,
            dir.display()
        );
        Ok(manifest)
    }

    /// Load a store saved with [`Store::save`]
    ///
    /// `Trust::Refuse` fails with `UntrustedIndex` before any file is read.
    /// The metric comes from the manifest; `options` only choose the index
    /// kind.
    pub fn load(dir: &Path, trust: Trust, options: StoreOptions) -> Result<Self> {
        if trust == Trust::Refuse {
            return Err(QueryError::UntrustedIndex {
                path: dir.to_path_buf(),
            });
        }

        let manifest = read_manifest(dir)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(QueryError::Ingestion(format!(
                "Unsupported index format version {} (expected {})",
                manifest.format_version, FORMAT_VERSION
            )));
        }

        let items_path = dir.join(ITEMS_FILE);
        let compressed = fs::read(&items_path).map_err(|e| {
            QueryError::io(e, format!("Failed to read index items: {}", items_path.display()))
        })?;
        let payload = zstd::decode_all(&compressed[..])
            .map_err(|e| QueryError::io(e, "Failed to decompress index items"))?;

        if blake3::hash(&payload).to_hex().as_str() != manifest.fingerprint {
            tracing::warn!(
                "Index {} content does not match its manifest fingerprint",
                manifest.index_id
            );
        }

        let items: Vec<StoredItem> = serde_json::from_slice(&payload)
            .map_err(|e| QueryError::json(e, "Failed to parse index items"))?;
        if items.len() != manifest.item_count {
            return Err(QueryError::Ingestion(format!(
                "Index manifest lists {} items but {} were found",
                manifest.item_count,
                items.len()
            )));
        }

        tracing::info!(
            "Loaded index {} ({} items, created {})",
            manifest.index_id,
            items.len(),
            manifest.created_at.format("%Y-%m-%d %H:%M:%S")
        );

        let options = StoreOptions {
            metric: manifest.metric,
            index: options.index,
        };
        Store::from_items(items, &manifest.embedding_model, options)
    }
}

/// Read only the manifest of a saved index
pub fn read_manifest(dir: &Path) -> Result<IndexManifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = fs::read(&path)
        .map_err(|e| QueryError::io(e, format!("Failed to read manifest: {}", path.display())))?;
    serde_json::from_slice(&content)
        .map_err(|e| QueryError::json(e, format!("Invalid manifest: {}", path.display())))
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).map_err(|e| {
        QueryError::io(e, format!("Failed to create temp file: {}", temp_path.display()))
    })?;
    file.write_all(data)
        .map_err(|e| QueryError::io(e, format!("Failed to write: {}", temp_path.display())))?;
    file.sync_all()
        .map_err(|e| QueryError::io(e, format!("Failed to sync: {}", temp_path.display())))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|e| {
        QueryError::io(
            e,
            format!(
                "Failed to move {} into place at {}",
                temp_path.display(),
                path.display()
            ),
        )
    })
}
