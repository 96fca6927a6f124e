//! libSQL persistence for the knowledge base.
//!
//! The [`Store`] wraps an embedded libSQL database holding two collections:
//! `mw_pages` (full-page documents keyed by canonical URL) and `mw_chunks`
//! (per-view embeddings keyed by a deterministic digest). Vectors are stored
//! as little-endian `f32` blobs; nearest-neighbor queries are a flat cosine
//! scan, which is plenty for per-domain documentation corpora.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};

use mwkb_shared::{DocumentMeta, KbError, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Store {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

/// A chunk row ready to be written.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    /// Deterministic 128-bit hex id.
    pub id: String,
    /// URL of the owning document.
    pub parent_url: String,
    pub title: String,
    pub breadcrumb: String,
    /// One of the view labels.
    pub view_type: String,
    pub domain: String,
    /// The view text the embedding was computed from.
    pub body: String,
    pub embedding: Vec<f32>,
}

/// A nearest-neighbor hit from the chunks collection.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub parent_url: String,
    pub title: String,
    pub breadcrumb: String,
    pub view_type: String,
    pub domain: String,
    pub body: String,
    /// Cosine distance; similarity is `1 − distance`.
    pub distance: f64,
}

impl Store {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| KbError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| KbError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        KbError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Documents collection (mw_pages)
    // -----------------------------------------------------------------------

    /// Insert or overwrite the document for `meta.url`.
    pub async fn upsert_document(&self, meta: &DocumentMeta, body: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO mw_pages (url, title, breadcrumb, domain, body, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(url) DO UPDATE SET
                   title = excluded.title,
                   breadcrumb = excluded.breadcrumb,
                   domain = excluded.domain,
                   body = excluded.body,
                   indexed_at = excluded.indexed_at",
                params![
                    meta.url.as_str(),
                    meta.title.as_str(),
                    meta.breadcrumb.as_str(),
                    meta.domain.as_str(),
                    body,
                    now.as_str(),
                ],
            )
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Fast existence check used for idempotent indexing.
    pub async fn document_exists(&self, url: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query("SELECT 1 FROM mw_pages WHERE url = ?1", params![url])
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(row) => Ok(row.is_some()),
            Err(e) => Err(KbError::Storage(e.to_string())),
        }
    }

    /// Full stored text for a document, if present.
    pub async fn get_document(&self, url: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT body FROM mw_pages WHERE url = ?1", params![url])
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let body: String = row
                    .get(0)
                    .map_err(|e| KbError::Storage(e.to_string()))?;
                Ok(Some(body))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(KbError::Storage(e.to_string())),
        }
    }

    /// List document metadata, optionally filtered by domain.
    pub async fn list_documents(&self, domain: Option<&str>) -> Result<Vec<DocumentMeta>> {
        let mut rows = match domain {
            Some(domain) => self
                .conn
                .query(
                    "SELECT url, title, breadcrumb, domain FROM mw_pages
                     WHERE domain = ?1 ORDER BY url",
                    params![domain],
                )
                .await,
            None => self
                .conn
                .query(
                    "SELECT url, title, breadcrumb, domain FROM mw_pages ORDER BY url",
                    params![],
                )
                .await,
        }
        .map_err(|e| KbError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(DocumentMeta {
                url: row
                    .get::<String>(0)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                title: row
                    .get::<String>(1)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                breadcrumb: row
                    .get::<String>(2)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                domain: row
                    .get::<String>(3)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
            });
        }
        Ok(results)
    }

    /// Delete one document by URL.
    pub async fn delete_document(&self, url: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM mw_pages WHERE url = ?1", params![url])
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete every document for a domain.
    pub async fn delete_documents_by_domain(&self, domain: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM mw_pages WHERE domain = ?1", params![domain])
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Chunks collection (mw_chunks)
    // -----------------------------------------------------------------------

    /// Insert or overwrite a chunk. Deterministic ids make re-indexing
    /// overwrite rather than duplicate.
    pub async fn upsert_chunk(&self, chunk: &ChunkRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO mw_chunks (id, parent_url, title, breadcrumb, view_type, domain, body, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                   parent_url = excluded.parent_url,
                   title = excluded.title,
                   breadcrumb = excluded.breadcrumb,
                   view_type = excluded.view_type,
                   domain = excluded.domain,
                   body = excluded.body,
                   embedding = excluded.embedding",
                params![
                    chunk.id.as_str(),
                    chunk.parent_url.as_str(),
                    chunk.title.as_str(),
                    chunk.breadcrumb.as_str(),
                    chunk.view_type.as_str(),
                    chunk.domain.as_str(),
                    chunk.body.as_str(),
                    embedding_to_blob(&chunk.embedding),
                ],
            )
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Nearest chunks to `embedding` by ascending cosine distance.
    ///
    /// Flat scan over the collection; ties keep row order, so results are
    /// deterministic for a given store state.
    pub async fn query_chunks(&self, embedding: &[f32], n: usize) -> Result<Vec<ChunkHit>> {
        let mut rows = self
            .conn
            .query(
                "SELECT parent_url, title, breadcrumb, view_type, domain, body, embedding
                 FROM mw_chunks ORDER BY rowid",
                params![],
            )
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;

        let mut hits: Vec<ChunkHit> = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let blob: Vec<u8> = row
                .get(6)
                .map_err(|e| KbError::Storage(e.to_string()))?;
            let stored = blob_to_embedding(&blob);
            let distance = cosine_distance(embedding, &stored);

            hits.push(ChunkHit {
                parent_url: row
                    .get::<String>(0)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                title: row
                    .get::<String>(1)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                breadcrumb: row
                    .get::<String>(2)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                view_type: row
                    .get::<String>(3)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                domain: row
                    .get::<String>(4)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                body: row
                    .get::<String>(5)
                    .map_err(|e| KbError::Storage(e.to_string()))?,
                distance,
            });
        }

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(n);
        Ok(hits)
    }

    /// Delete all chunks belonging to one document.
    pub async fn delete_chunks_by_parent(&self, url: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM mw_chunks WHERE parent_url = ?1",
                params![url],
            )
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Delete every chunk for a domain.
    pub async fn delete_chunks_by_domain(&self, domain: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM mw_chunks WHERE domain = ?1", params![domain])
            .await
            .map_err(|e| KbError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Number of chunks pointing at a document.
    pub async fn chunk_count_by_parent(&self, url: &str) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM mw_chunks WHERE parent_url = ?1",
            Some(url),
        )
        .await
    }

    /// Number of chunks carrying a domain.
    pub async fn chunk_count_by_domain(&self, domain: &str) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM mw_chunks WHERE domain = ?1",
            Some(domain),
        )
        .await
    }

    async fn count(&self, sql: &str, arg: Option<&str>) -> Result<u64> {
        let mut rows = match arg {
            Some(arg) => self.conn.query(sql, params![arg]).await,
            None => self.conn.query(sql, params![]).await,
        }
        .map_err(|e| KbError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map(|n| n.max(0) as u64)
                .map_err(|e| KbError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(KbError::Storage(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Vector helpers
// ---------------------------------------------------------------------------

/// Encode a vector as little-endian f32 bytes.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a little-endian f32 blob back into a vector.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine distance in `[0, 2]`; zero-norm inputs are treated as maximally
/// distant within the unit range.
fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 1.0;
    }

    let mut dot = 0f64;
    let mut norm_a = 0f64;
    let mut norm_b = 0f64;
    for (x, y) in a.iter().zip(b) {
        dot += f64::from(*x) * f64::from(*y);
        norm_a += f64::from(*x) * f64::from(*x);
        norm_b += f64::from(*y) * f64::from(*y);
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
