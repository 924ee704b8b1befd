//! Simple file-based collection backend.
//!
//! Passages live in a JSONL file and are searched by linear scan. Suitable
//! for tests and corpora of a few thousand passages.

use super::super::config::VectorIndexConfig;
use super::super::metadata::PassageMetadata;
use super::super::traits::{PassageInsert, PassageMatch, VectorIndexBackend, VectorMetric};
use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, trace, warn};

const DATA_FILENAME: &str = "passages.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredPassage {
    id: String,
    vector: Vec<f32>,
    #[serde(default)]
    document: Option<String>,
    #[serde(default)]
    metadata: PassageMetadata,
}

impl From<&PassageInsert> for StoredPassage {
    fn from(insert: &PassageInsert) -> Self {
        Self {
            id: insert.id.clone(),
            vector: insert.vector.clone(),
            document: Some(insert.document.clone()),
            metadata: insert.metadata.clone(),
        }
    }
}

/// JSONL-backed collection with exact linear-scan search.
pub struct SimpleFileVectorIndex {
    collection: String,
    path: PathBuf,
    dimension: usize,
    metric: VectorMetric,
    passages: RwLock<HashMap<String, StoredPassage>>,
}

impl SimpleFileVectorIndex {
    pub fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        debug!("Opening SimpleFileVectorIndex at {:?}", config.path);

        let index = Self {
            collection: config.collection.clone(),
            path: config.path.clone(),
            dimension: config.dimension,
            metric: config.metric,
            passages: RwLock::new(HashMap::new()),
        };

        let data_path = config.path.join(DATA_FILENAME);
        if data_path.exists() {
            index.load_from_file(&data_path)?;
        }

        Ok(index)
    }

    fn load_from_file(&self, path: &Path) -> DbResult<()> {
        let reader = BufReader::new(File::open(path)?);
        let mut passages = self
            .passages
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let mut skipped = 0usize;
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredPassage>(&line) {
                Ok(stored) if stored.vector.len() == self.dimension => {
                    passages.insert(stored.id.clone(), stored);
                }
                Ok(stored) => {
                    skipped += 1;
                    debug!(
                        "Skipping passage '{}' on line {}: dimension {}",
                        stored.id,
                        line_num + 1,
                        stored.vector.len()
                    );
                }
                Err(e) => {
                    skipped += 1;
                    debug!("Skipping invalid line {}: {}", line_num + 1, e);
                }
            }
        }

        if skipped > 0 {
            warn!(
                collection = %self.collection,
                skipped,
                "some stored passages could not be loaded"
            );
        }
        debug!("Loaded {} passages", passages.len());
        Ok(())
    }

    fn save_to_file(&self) -> DbResult<()> {
        let data_path = self.path.join(DATA_FILENAME);
        let passages = self
            .passages
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        // Sorted so rewrites of an unchanged collection are byte-identical
        let mut ordered: Vec<&StoredPassage> = passages.values().collect();
        ordered.sort_by(|a, b| a.id.cmp(&b.id));

        let mut writer = BufWriter::new(File::create(&data_path)?);
        for stored in ordered {
            serde_json::to_writer(&mut writer, stored)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        debug!("Saved {} passages to {:?}", passages.len(), data_path);
        Ok(())
    }
}

impl VectorIndexBackend for SimpleFileVectorIndex {
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<PassageMatch>> {
        trace!(collection = %self.collection, limit, "querying simple collection");

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let passages = self
            .passages
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut scored: Vec<(f32, &StoredPassage)> = passages
            .values()
            .map(|p| (self.metric.distance(embedding, &p.vector), p))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(distance, stored)| PassageMatch {
                id: stored.id.clone(),
                document: stored.document.clone(),
                metadata: stored.metadata.clone(),
                distance: Some(distance),
            })
            .collect())
    }

    fn upsert(&self, passages: &[PassageInsert]) -> DbResult<()> {
        debug!("Upserting {} passages", passages.len());

        if let Some(bad) = passages.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        {
            let mut stored = self
                .passages
                .write()
                .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;
            for insert in passages {
                stored.insert(insert.id.clone(), StoredPassage::from(insert));
            }
        }

        self.save_to_file()
    }

    fn delete(&self, ids: &[String]) -> DbResult<()> {
        debug!("Deleting {} passages", ids.len());

        {
            let mut stored = self
                .passages
                .write()
                .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;
            for id in ids {
                stored.remove(id);
            }
        }

        self.save_to_file()
    }

    fn flush(&self) -> DbResult<()> {
        self.save_to_file()
    }

    fn len(&self) -> DbResult<usize> {
        let stored = self
            .passages
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(stored.len())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> VectorMetric {
        self.metric
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(temp: &TempDir) -> SimpleFileVectorIndex {
        let config = VectorIndexConfig::for_collection(temp.path(), "nail_kb", 3)
            .with_backend("simple");
        std::fs::create_dir_all(&config.path).unwrap();
        SimpleFileVectorIndex::open(&config).unwrap()
    }

    fn passage(id: &str, vector: [f32; 3]) -> PassageInsert {
        PassageInsert::new(id, vector.to_vec(), format!("text of {id}"))
            .with_metadata(PassageMetadata::new().with_source(format!("{id}.md")))
    }

    #[test]
    fn test_query_orders_by_ascending_distance() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp);
        index
            .upsert(&[
                passage("far", [0.0, 1.0, 0.0]),
                passage("near", [1.0, 0.1, 0.0]),
                passage("exact", [1.0, 0.0, 0.0]),
            ])
            .unwrap();

        let matches = index.query(&[1.0, 0.0, 0.0], 2).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(matches[0].distance.unwrap() < matches[1].distance.unwrap());
        assert_eq!(matches[0].metadata.source.as_deref(), Some("exact.md"));
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        open(&temp)
            .upsert(&[passage("a", [1.0, 0.0, 0.0]), passage("b", [0.0, 1.0, 0.0])])
            .unwrap();

        let reopened = open(&temp);
        assert_eq!(reopened.len().unwrap(), 2);
        reopened.delete(&["a".to_string()]).unwrap();
        assert_eq!(open(&temp).len().unwrap(), 1);
    }

    #[test]
    fn test_rows_without_document_are_kept() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("nail_kb");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(DATA_FILENAME),
            "{\"id\":\"x\",\"vector\":[1.0,0.0,0.0]}\nnot json\n",
        )
        .unwrap();

        let index = open(&temp);
        let matches = index.query(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(matches.len(), 1);
        assert!(matches[0].document.is_none());
    }

    #[test]
    fn test_dimension_mismatch() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp);
        let err = index
            .upsert(&[PassageInsert::new("bad", vec![1.0], "x")])
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::DimensionMismatch {
                expected: 3,
                actual: 1
            }
        ));
        assert!(index.query(&[1.0, 0.0], 1).is_err());
    }
}
