//! Full-text search index over chapters and knowledge points (FTS5).

use std::collections::HashMap;

use chrono::Utc;
use coursegraph_shared::{CourseGraphError, ParsedCorpus, Result};
use libsql::params;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{Handle, StoreTarget, closed, migrations};

/// A search hit from FTS5.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The query that produced this hit.
    pub query: String,
    /// Document id (a chapter or knowledge point id).
    pub id: String,
    /// `chapter` or `point`.
    pub kind: String,
    pub title: String,
    /// FTS5 rank score (lower is better).
    pub score: f64,
}

/// Counts from one `import_all` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexImportStats {
    pub batch_id: String,
    pub documents: usize,
    /// Documents from earlier imports that are no longer in the corpus.
    pub removed: u64,
}

impl std::fmt::Display for IndexImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} documents indexed", self.documents)?;
        if self.removed > 0 {
            write!(f, ", {} stale removed", self.removed)?;
        }
        Ok(())
    }
}

/// Search index handle.
pub struct SearchIndex {
    handle: Option<Handle>,
}

impl SearchIndex {
    /// Open (creating if needed) the index at `target`.
    pub async fn open(target: &StoreTarget) -> Result<Self> {
        let handle = Handle::open(target, &migrations::index_migrations()).await?;
        debug!(%target, "search index opened");
        Ok(Self {
            handle: Some(handle),
        })
    }

    fn handle(&self) -> Result<&Handle> {
        self.handle.as_ref().ok_or_else(|| closed("search index"))
    }

    /// Create the FTS table and lookup indexes. Idempotent.
    pub async fn create_indexes(&mut self) -> Result<()> {
        let handle = self.handle()?;
        handle
            .conn
            .execute_batch(
                "CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
                     title,
                     body,
                     keywords,
                     subject,
                     content=documents,
                     content_rowid=rowid
                 );
                 CREATE INDEX IF NOT EXISTS idx_documents_textbook ON documents(textbook_id);",
            )
            .await
            .map_err(CourseGraphError::storage)?;
        debug!("search indexes ensured");
        Ok(())
    }

    /// Upsert one document per chapter and knowledge point, drop documents
    /// from earlier imports that the corpus no longer has, then rebuild FTS.
    pub async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<IndexImportStats> {
        let handle = self.handle()?;
        let batch_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        let subjects: HashMap<&str, &str> = corpus
            .textbooks
            .iter()
            .map(|t| (t.id.as_str(), t.subject.as_str()))
            .collect();
        let subject_of = |textbook_id: &str| subjects.get(textbook_id).copied().unwrap_or("");

        let mut documents = Vec::with_capacity(corpus.chapters.len() + corpus.points.len());
        for chapter in &corpus.chapters {
            documents.push(Document {
                id: &chapter.id,
                kind: "chapter",
                textbook_id: &chapter.textbook_id,
                title: &chapter.title,
                body: chapter.summary.clone().unwrap_or_default(),
                keywords: String::new(),
                subject: subject_of(&chapter.textbook_id),
            });
        }
        for point in &corpus.points {
            documents.push(Document {
                id: &point.id,
                kind: "point",
                textbook_id: &point.textbook_id,
                title: &point.title,
                body: point.body.clone(),
                keywords: point.keywords.join(" "),
                subject: subject_of(&point.textbook_id),
            });
        }

        let tx = handle
            .conn
            .transaction()
            .await
            .map_err(CourseGraphError::storage)?;

        for doc in &documents {
            tx.execute(
                "INSERT INTO documents (id, kind, textbook_id, title, body, keywords, subject, batch_id, indexed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   kind = excluded.kind,
                   textbook_id = excluded.textbook_id,
                   title = excluded.title,
                   body = excluded.body,
                   keywords = excluded.keywords,
                   subject = excluded.subject,
                   batch_id = excluded.batch_id,
                   indexed_at = excluded.indexed_at",
                params![
                    doc.id,
                    doc.kind,
                    doc.textbook_id,
                    doc.title,
                    doc.body.as_str(),
                    doc.keywords.as_str(),
                    doc.subject,
                    batch_id.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(CourseGraphError::storage)?;
        }

        let removed = tx
            .execute(
                "DELETE FROM documents WHERE batch_id != ?1",
                params![batch_id.as_str()],
            )
            .await
            .map_err(CourseGraphError::storage)?;

        tx.commit().await.map_err(CourseGraphError::storage)?;

        if self.has_fts().await? {
            handle
                .conn
                .execute(
                    "INSERT INTO documents_fts(documents_fts) VALUES ('rebuild')",
                    params![],
                )
                .await
                .map_err(CourseGraphError::storage)?;
        } else {
            warn!("documents_fts missing; run create_indexes before searching");
        }

        let stats = IndexImportStats {
            batch_id,
            documents: documents.len(),
            removed,
        };
        info!(
            batch_id = %stats.batch_id,
            documents = stats.documents,
            removed = stats.removed,
            "search import committed"
        );
        Ok(stats)
    }

    /// Full-text search. `query` is matched as a phrase.
    pub async fn search(&self, query: &str, limit: u32) -> Result<Vec<SearchHit>> {
        let handle = self.handle()?;
        let phrase = format!("\"{}\"", query.replace('"', "\"\""));

        let mut rows = handle
            .conn
            .query(
                "SELECT d.id, d.kind, d.title, rank
                 FROM documents_fts fts
                 JOIN documents d ON d.rowid = fts.rowid
                 WHERE documents_fts MATCH ?1
                 ORDER BY rank
                 LIMIT ?2",
                params![phrase.as_str(), limit],
            )
            .await
            .map_err(CourseGraphError::storage)?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next().await.map_err(CourseGraphError::storage)? {
            hits.push(SearchHit {
                query: query.to_string(),
                id: row.get::<String>(0).map_err(CourseGraphError::storage)?,
                kind: row.get::<String>(1).map_err(CourseGraphError::storage)?,
                title: row.get::<String>(2).map_err(CourseGraphError::storage)?,
                score: row.get::<f64>(3).unwrap_or(0.0),
            });
        }
        Ok(hits)
    }

    /// Run each smoke query and collect the hits.
    ///
    /// An empty result is not an error; it is logged so an operator can
    /// tell an empty index from a broken one.
    pub async fn test_search(&self, queries: &[String], limit: u32) -> Result<Vec<SearchHit>> {
        let mut all = Vec::new();
        for query in queries {
            let hits = self.search(query, limit).await?;
            debug!(query = %query, hits = hits.len(), "smoke query");
            all.extend(hits);
        }
        if all.is_empty() && !queries.is_empty() {
            warn!(?queries, "smoke queries returned no hits");
        }
        Ok(all)
    }

    /// Number of indexed documents.
    pub async fn count_documents(&self) -> Result<u64> {
        self.handle()?
            .count("SELECT COUNT(*) FROM documents", params![])
            .await
    }

    async fn has_fts(&self) -> Result<bool> {
        let n = self
            .handle()?
            .count(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'documents_fts'",
                params![],
            )
            .await?;
        Ok(n > 0)
    }

    /// Release the connection. Later calls fail; closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.handle.take().is_some() {
            debug!("search index closed");
        }
        Ok(())
    }
}

struct Document<'a> {
    id: &'a str,
    kind: &'static str,
    textbook_id: &'a str,
    title: &'a str,
    body: String,
    keywords: String,
    subject: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_corpus, temp_target};

    async fn test_index() -> SearchIndex {
        let mut index = SearchIndex::open(&temp_target())
            .await
            .expect("open test index");
        index.create_indexes().await.expect("create indexes");
        index
    }

    #[tokio::test]
    async fn import_then_search() {
        let mut index = test_index().await;
        let stats = index.import_all(&sample_corpus()).await.expect("import");
        assert_eq!(stats.documents, 3);

        let hits = index.search("gyration", 10).await.expect("search");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "kp-2");
        assert_eq!(hits[0].kind, "point");

        // Subject and keywords are searchable too.
        assert!(!index.search("polymer", 10).await.unwrap().is_empty());
        assert_eq!(index.search("random walk", 10).await.unwrap()[0].id, "kp-1");
    }

    #[tokio::test]
    async fn reimport_drops_stale_documents() {
        let mut index = test_index().await;
        let mut corpus = sample_corpus();
        index.import_all(&corpus).await.unwrap();

        corpus.points.pop();
        let stats = index.import_all(&corpus).await.unwrap();
        assert_eq!(stats.removed, 1);
        assert_eq!(index.count_documents().await.unwrap(), 2);
        assert!(index.search("gyration", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn smoke_queries_respect_limit() {
        let mut index = test_index().await;
        index.import_all(&sample_corpus()).await.unwrap();

        let queries = vec!["polymer".to_string(), "dynasty".to_string()];
        let hits = index.test_search(&queries, 1).await.expect("smoke");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].query, "polymer");
    }

    #[tokio::test]
    async fn smoke_on_empty_index_is_not_an_error() {
        let index = test_index().await;
        let hits = index
            .test_search(&["management".to_string()], 5)
            .await
            .expect("smoke");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn quotes_in_query_are_escaped() {
        let mut index = test_index().await;
        index.import_all(&sample_corpus()).await.unwrap();
        let hits = index.search("say \"hi", 5).await.expect("search");
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn calls_after_close_fail() {
        let mut index = test_index().await;
        index.close().await.unwrap();
        assert!(index.search("polymer", 5).await.is_err());
    }
}
