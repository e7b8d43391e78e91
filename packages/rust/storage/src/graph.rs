//! Graph store: corpus records as labelled nodes and typed edges.

use chrono::Utc;
use coursegraph_shared::{CourseGraphError, ParsedCorpus, Result};
use libsql::params;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Handle, StoreTarget, closed, migrations};

/// Counts from one `import_all` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphImportStats {
    pub batch_id: String,
    pub nodes: usize,
    pub edges: usize,
}

impl std::fmt::Display for GraphImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} nodes, {} edges", self.nodes, self.edges)
    }
}

/// Graph database handle.
pub struct GraphStore {
    handle: Option<Handle>,
    label_prefix: String,
}

impl GraphStore {
    /// Open (creating if needed) the graph at `target`. Node labels get
    /// `label_prefix` prepended, e.g. `gfz` → `gfz_Textbook`.
    pub async fn open(target: &StoreTarget, label_prefix: &str) -> Result<Self> {
        let handle = Handle::open(target, &migrations::graph_migrations()).await?;
        debug!(%target, "graph store opened");
        Ok(Self {
            handle: Some(handle),
            label_prefix: label_prefix.to_string(),
        })
    }

    fn handle(&self) -> Result<&Handle> {
        self.handle.as_ref().ok_or_else(|| closed("graph store"))
    }

    /// Full label for a record kind, e.g. `Chapter` → `gfz_Chapter`.
    pub fn label(&self, kind: &str) -> String {
        if self.label_prefix.is_empty() {
            kind.to_string()
        } else {
            format!("{}_{kind}", self.label_prefix)
        }
    }

    /// Remove every node and edge.
    pub async fn clear(&mut self) -> Result<()> {
        let handle = self.handle()?;
        handle
            .conn
            .execute_batch("DELETE FROM edges; DELETE FROM nodes;")
            .await
            .map_err(CourseGraphError::storage)?;
        info!("graph store cleared");
        Ok(())
    }

    /// Create lookup indexes. Safe to call repeatedly.
    pub async fn create_indexes(&mut self) -> Result<()> {
        let handle = self.handle()?;
        handle
            .conn
            .execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_nodes_label ON nodes(label);
                 CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(name);
                 CREATE INDEX IF NOT EXISTS idx_edges_dst ON edges(dst);
                 CREATE INDEX IF NOT EXISTS idx_edges_type ON edges(rel_type);",
            )
            .await
            .map_err(CourseGraphError::storage)?;
        debug!("graph indexes ensured");
        Ok(())
    }

    /// Upsert every record and relation of `corpus` in one transaction.
    ///
    /// Re-importing the same corpus without `clear()` leaves one node per id
    /// and one edge per `(src, dst, type)`.
    pub async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<GraphImportStats> {
        let handle = self.handle()?;
        let batch_id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();

        let textbook_label = self.label("Textbook");
        let chapter_label = self.label("Chapter");
        let point_label = self.label("KnowledgePoint");

        let mut nodes = Vec::with_capacity(
            corpus.textbooks.len() + corpus.chapters.len() + corpus.points.len(),
        );
        for textbook in &corpus.textbooks {
            nodes.push((
                textbook.id.as_str(),
                &textbook_label,
                textbook.title.as_str(),
                to_json(textbook)?,
            ));
        }
        for chapter in &corpus.chapters {
            nodes.push((
                chapter.id.as_str(),
                &chapter_label,
                chapter.title.as_str(),
                to_json(chapter)?,
            ));
        }
        for point in &corpus.points {
            nodes.push((
                point.id.as_str(),
                &point_label,
                point.title.as_str(),
                to_json(point)?,
            ));
        }

        let tx = handle
            .conn
            .transaction()
            .await
            .map_err(CourseGraphError::storage)?;

        for (id, label, name, props) in &nodes {
            tx.execute(
                "INSERT INTO nodes (id, label, name, props_json, batch_id, imported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                   label = excluded.label,
                   name = excluded.name,
                   props_json = excluded.props_json,
                   batch_id = excluded.batch_id,
                   imported_at = excluded.imported_at",
                params![
                    *id,
                    label.as_str(),
                    *name,
                    props.as_str(),
                    batch_id.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(CourseGraphError::storage)?;
        }

        for relation in &corpus.relations {
            tx.execute(
                "INSERT INTO edges (src, dst, rel_type, batch_id)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(src, dst, rel_type) DO UPDATE SET
                   batch_id = excluded.batch_id",
                params![
                    relation.from.as_str(),
                    relation.to.as_str(),
                    relation.kind.as_str(),
                    batch_id.as_str()
                ],
            )
            .await
            .map_err(CourseGraphError::storage)?;
        }

        tx.commit().await.map_err(CourseGraphError::storage)?;

        let stats = GraphImportStats {
            batch_id,
            nodes: nodes.len(),
            edges: corpus.relations.len(),
        };
        info!(
            batch_id = %stats.batch_id,
            nodes = stats.nodes,
            edges = stats.edges,
            "graph import committed"
        );
        Ok(stats)
    }

    /// Number of nodes, optionally restricted to one full label.
    pub async fn count_nodes(&self, label: Option<&str>) -> Result<u64> {
        let handle = self.handle()?;
        match label {
            Some(label) => {
                handle
                    .count("SELECT COUNT(*) FROM nodes WHERE label = ?1", params![label])
                    .await
            }
            None => handle.count("SELECT COUNT(*) FROM nodes", params![]).await,
        }
    }

    /// Number of edges, optionally restricted to one relationship type.
    pub async fn count_edges(&self, rel_type: Option<&str>) -> Result<u64> {
        let handle = self.handle()?;
        match rel_type {
            Some(rel_type) => {
                handle
                    .count("SELECT COUNT(*) FROM edges WHERE rel_type = ?1", params![rel_type])
                    .await
            }
            None => handle.count("SELECT COUNT(*) FROM edges", params![]).await,
        }
    }

    /// Release the connection. Later calls fail; closing twice is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        if self.handle.take().is_some() {
            debug!("graph store closed");
        }
        Ok(())
    }
}

fn to_json<T: serde::Serialize>(record: &T) -> Result<String> {
    serde_json::to_string(record).map_err(CourseGraphError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_corpus, temp_target};

    async fn test_graph() -> GraphStore {
        let mut graph = GraphStore::open(&temp_target(), "gfz")
            .await
            .expect("open test graph");
        graph.create_indexes().await.expect("create indexes");
        graph
    }

    #[tokio::test]
    async fn import_creates_labelled_nodes_and_typed_edges() {
        let mut graph = test_graph().await;
        let stats = graph.import_all(&sample_corpus()).await.expect("import");

        assert_eq!(stats.nodes, 4);
        assert_eq!(stats.edges, 4);
        assert_eq!(graph.count_nodes(Some("gfz_Textbook")).await.unwrap(), 1);
        assert_eq!(graph.count_nodes(Some("gfz_Chapter")).await.unwrap(), 1);
        assert_eq!(graph.count_nodes(Some("gfz_KnowledgePoint")).await.unwrap(), 2);
        assert_eq!(graph.count_edges(Some("CONTAINS")).await.unwrap(), 3);
        assert_eq!(graph.count_edges(Some("REFERENCES")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let mut graph = test_graph().await;
        let corpus = sample_corpus();
        let first = graph.import_all(&corpus).await.unwrap();
        let second = graph.import_all(&corpus).await.unwrap();

        assert_ne!(first.batch_id, second.batch_id);
        assert_eq!(graph.count_nodes(None).await.unwrap(), 4);
        assert_eq!(graph.count_edges(None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let mut graph = test_graph().await;
        graph.import_all(&sample_corpus()).await.unwrap();
        graph.clear().await.expect("clear");

        assert_eq!(graph.count_nodes(None).await.unwrap(), 0);
        assert_eq!(graph.count_edges(None).await.unwrap(), 0);

        // Clearing an empty store is fine too.
        graph.clear().await.expect("clear again");
    }

    #[tokio::test]
    async fn create_indexes_is_repeatable() {
        let mut graph = test_graph().await;
        graph.create_indexes().await.expect("second call");
    }

    #[tokio::test]
    async fn calls_after_close_fail() {
        let mut graph = test_graph().await;
        graph.close().await.expect("close");
        graph.close().await.expect("close twice");

        let err = graph.import_all(&sample_corpus()).await.unwrap_err();
        assert!(err.to_string().contains("closed"));
    }

    #[test]
    fn empty_prefix_leaves_label_bare() {
        let graph = GraphStore {
            handle: None,
            label_prefix: String::new(),
        };
        assert_eq!(graph.label("Chapter"), "Chapter");
    }
}
