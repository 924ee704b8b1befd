//! LanceDB collection backend.
//!
//! One LanceDB database per collection directory, holding a single
//! `passages` table. Async LanceDB calls are driven by a private runtime so
//! the trait stays synchronous.

use super::super::config::{VectorIndexConfig, LANCEDB_TABLE_NAME};
use super::super::metadata::PassageMetadata;
use super::super::traits::{PassageInsert, PassageMatch, VectorIndexBackend, VectorMetric};
use crate::error::{DbError, DbResult};
use arrow_array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, Int64Array, RecordBatch,
    RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lance_arrow::FixedSizeListArrayExt;
use lancedb::{
    connect,
    query::{ExecutableQuery, QueryBase, Select},
    Connection, DistanceType, Table,
};
use std::sync::{Arc, RwLock};
use tokio::runtime::Runtime;
use tracing::{debug, trace};

const RESULT_COLUMNS: &[&str] = &["id", "document", "source", "label", "citation", "chunk_index"];

/// LanceDB-backed passage collection.
pub struct LanceDbVectorIndex {
    collection: String,
    dimension: usize,
    metric: VectorMetric,
    connection: Connection,
    table: RwLock<Option<Table>>,
    runtime: Runtime,
}

impl LanceDbVectorIndex {
    pub fn open(config: &VectorIndexConfig) -> DbResult<Self> {
        debug!("Opening LanceDbVectorIndex at {:?}", config.path);

        let runtime = Runtime::new()
            .map_err(|e| DbError::internal(format!("Failed to create runtime: {}", e)))?;

        let connection = runtime
            .block_on(async {
                connect(config.path.to_string_lossy().as_ref())
                    .execute()
                    .await
            })
            .map_err(|e| DbError::LanceDb {
                message: format!("Failed to connect: {}", e),
            })?;

        let index = Self {
            collection: config.collection.clone(),
            dimension: config.dimension,
            metric: config.metric,
            connection,
            table: RwLock::new(None),
            runtime,
        };
        index.ensure_table()?;

        Ok(index)
    }

    fn ensure_table(&self) -> DbResult<()> {
        let mut guard = self
            .table
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire table lock: {}", e)))?;

        if guard.is_some() {
            return Ok(());
        }

        let table_names = self
            .runtime
            .block_on(async { self.connection.table_names().execute().await })?;

        let table = if table_names.iter().any(|name| name == LANCEDB_TABLE_NAME) {
            debug!("Opening existing table '{}'", LANCEDB_TABLE_NAME);
            self.runtime.block_on(async {
                self.connection
                    .open_table(LANCEDB_TABLE_NAME)
                    .execute()
                    .await
            })?
        } else {
            debug!("Creating empty table '{}'", LANCEDB_TABLE_NAME);
            let schema = Arc::new(self.schema());
            let batch = self.to_batch(&[])?;
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.runtime.block_on(async {
                self.connection
                    .create_table(LANCEDB_TABLE_NAME, Box::new(batches))
                    .execute()
                    .await
            })?
        };

        *guard = Some(table);
        Ok(())
    }

    fn table(&self) -> DbResult<Table> {
        self.ensure_table()?;
        let guard = self
            .table
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire table lock: {}", e)))?;
        guard
            .clone()
            .ok_or_else(|| DbError::internal("Table not initialized"))
    }

    fn schema(&self) -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("document", DataType::Utf8, true),
            Field::new("source", DataType::Utf8, true),
            Field::new("label", DataType::Utf8, true),
            Field::new("citation", DataType::Utf8, true),
            Field::new("chunk_index", DataType::Int64, true),
            Field::new("created_at", DataType::Utf8, true),
        ])
    }

    fn to_batch(&self, passages: &[PassageInsert]) -> DbResult<RecordBatch> {
        let strings = |f: fn(&PassageInsert) -> Option<&str>| -> ArrayRef {
            Arc::new(StringArray::from(
                passages.iter().map(f).collect::<Vec<Option<&str>>>(),
            ))
        };

        let ids: ArrayRef = Arc::new(StringArray::from(
            passages.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        ));

        let flat: Vec<f32> = passages
            .iter()
            .flat_map(|p| p.vector.iter().copied())
            .collect();
        let vectors: ArrayRef = Arc::new(
            FixedSizeListArray::try_new_from_values(Float32Array::from(flat), self.dimension as i32)
                .map_err(|e| DbError::internal(format!("Failed to create vector array: {}", e)))?,
        );

        let chunk_indices: ArrayRef = Arc::new(Int64Array::from(
            passages
                .iter()
                .map(|p| p.metadata.chunk_index.map(i64::from))
                .collect::<Vec<_>>(),
        ));

        let now = chrono::Utc::now().to_rfc3339();
        let created_at: ArrayRef = Arc::new(StringArray::from(
            passages
                .iter()
                .map(|_| Some(now.as_str()))
                .collect::<Vec<_>>(),
        ));

        RecordBatch::try_new(
            Arc::new(self.schema()),
            vec![
                ids,
                vectors,
                strings(|p| Some(p.document.as_str())),
                strings(|p| p.metadata.source.as_deref()),
                strings(|p| p.metadata.label.as_deref()),
                strings(|p| p.metadata.citation.as_deref()),
                chunk_indices,
                created_at,
            ],
        )
        .map_err(|e| DbError::internal(format!("Failed to create batch: {}", e)))
    }

    fn distance_type(&self) -> DistanceType {
        match self.metric {
            VectorMetric::Cosine => DistanceType::Cosine,
            VectorMetric::Dot => DistanceType::Dot,
            VectorMetric::L2 => DistanceType::L2,
        }
    }

    fn matches_from_batch(batch: &RecordBatch) -> Vec<PassageMatch> {
        let strings = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        };
        let optional = |col: Option<&StringArray>, i: usize| -> Option<String> {
            col.filter(|c| !c.is_null(i)).map(|c| c.value(i).to_string())
        };

        let Some(ids) = strings("id") else {
            return Vec::new();
        };
        let documents = strings("document");
        let sources = strings("source");
        let labels = strings("label");
        let citations = strings("citation");
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|c| c.as_any().downcast_ref::<Int64Array>());
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        (0..batch.num_rows())
            .map(|i| PassageMatch {
                id: ids.value(i).to_string(),
                document: optional(documents, i),
                metadata: PassageMetadata {
                    source: optional(sources, i),
                    label: optional(labels, i),
                    citation: optional(citations, i),
                    chunk_index: chunk_indices
                        .filter(|c| !c.is_null(i))
                        .and_then(|c| u32::try_from(c.value(i)).ok()),
                },
                distance: distances
                    .filter(|c| !c.is_null(i))
                    .map(|c| c.value(i)),
            })
            .collect()
    }
}

/// SQL `IN (...)` list of quoted ids.
fn id_filter(ids: impl Iterator<Item = impl AsRef<str>>) -> String {
    let quoted = ids
        .map(|id| format!("'{}'", id.as_ref().replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(", ");
    format!("id IN ({})", quoted)
}

impl VectorIndexBackend for LanceDbVectorIndex {
    fn query(&self, embedding: &[f32], limit: usize) -> DbResult<Vec<PassageMatch>> {
        trace!(collection = %self.collection, limit, "querying lancedb collection");

        if embedding.len() != self.dimension {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        if limit == 0 {
            return Ok(Vec::new());
        }

        let table = self.table()?;
        self.runtime.block_on(async {
            let stream = table
                .vector_search(embedding.to_vec())?
                .distance_type(self.distance_type())
                .select(Select::columns(RESULT_COLUMNS))
                .limit(limit)
                .execute()
                .await?;

            let batches: Vec<RecordBatch> = stream.try_collect().await?;
            Ok(batches.iter().flat_map(Self::matches_from_batch).collect())
        })
    }

    fn upsert(&self, passages: &[PassageInsert]) -> DbResult<()> {
        if passages.is_empty() {
            return Ok(());
        }
        if let Some(bad) = passages.iter().find(|p| p.vector.len() != self.dimension) {
            return Err(DbError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.vector.len(),
            });
        }

        debug!("Upserting {} passages", passages.len());
        let table = self.table()?;
        let delete_filter = id_filter(passages.iter().map(|p| p.id.as_str()));
        let batch = self.to_batch(passages)?;

        self.runtime.block_on(async {
            if let Err(e) = table.delete(&delete_filter).await {
                debug!("Delete before upsert returned error (may be ok): {}", e);
            }

            let schema = batch.schema();
            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            table.add(Box::new(batches)).execute().await?;
            Ok(())
        })
    }

    fn delete(&self, ids: &[String]) -> DbResult<()> {
        if ids.is_empty() {
            return Ok(());
        }

        debug!("Deleting {} passages", ids.len());
        let table = self.table()?;
        let filter = id_filter(ids.iter());
        self.runtime.block_on(async {
            table.delete(&filter).await?;
            Ok(())
        })
    }

    fn flush(&self) -> DbResult<()> {
        // LanceDB writes are durable once `add`/`delete` return
        Ok(())
    }

    fn len(&self) -> DbResult<usize> {
        let table = self.table()?;
        self.runtime
            .block_on(async { Ok(table.count_rows(None).await?) })
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
