//! libSQL storage for the ingestion pipeline.
//!
//! Two independent databases, each either a local file or a remote libSQL
//! endpoint:
//! - [`GraphStore`]: labelled nodes and typed edges built from a corpus.
//! - [`SearchIndex`]: an FTS5 full-text index over chapters and knowledge points.
//!
//! Both run their schema migrations on open.

mod graph;
mod index;
mod migrations;

use std::fmt;
use std::path::{Path, PathBuf};

use coursegraph_shared::{CourseGraphError, GraphConfig, IndexConfig, Result};
use libsql::{Connection, Database, params};

use crate::migrations::Migration;

pub use graph::{GraphImportStats, GraphStore};
pub use index::{IndexImportStats, SearchHit, SearchIndex};

// ---------------------------------------------------------------------------
// Connection target
// ---------------------------------------------------------------------------

/// Where a store lives.
#[derive(Clone, PartialEq, Eq)]
pub enum StoreTarget {
    /// A local database file.
    Local(PathBuf),
    /// A remote libSQL endpoint.
    Remote { url: String, auth_token: String },
}

impl StoreTarget {
    /// Target for the graph store, relative paths resolved against `project_root`.
    pub fn for_graph(config: &GraphConfig, project_root: &Path) -> Result<Self> {
        Self::resolve(
            project_root,
            &config.path,
            config.url.as_deref(),
            &config.auth_token_env,
        )
    }

    /// Target for the search index, relative paths resolved against `project_root`.
    pub fn for_index(config: &IndexConfig, project_root: &Path) -> Result<Self> {
        Self::resolve(
            project_root,
            &config.path,
            config.url.as_deref(),
            &config.auth_token_env,
        )
    }

    fn resolve(
        project_root: &Path,
        path: &str,
        url: Option<&str>,
        token_env: &str,
    ) -> Result<Self> {
        match url {
            Some(url) => {
                let auth_token = std::env::var(token_env).map_err(|_| {
                    CourseGraphError::config(format!(
                        "remote store {url} needs an auth token in ${token_env}"
                    ))
                })?;
                Ok(Self::Remote {
                    url: url.to_string(),
                    auth_token,
                })
            }
            None => Ok(Self::Local(project_root.join(path))),
        }
    }
}

// The token never reaches logs.
impl fmt::Display for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote { url, .. } => f.write_str(url),
        }
    }
}

impl fmt::Debug for StoreTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => f.debug_tuple("Local").field(path).finish(),
            Self::Remote { url, .. } => f
                .debug_struct("Remote")
                .field("url", url)
                .field("auth_token", &"***")
                .finish_non_exhaustive(),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

/// An open database and its single connection.
pub(crate) struct Handle {
    #[allow(dead_code)]
    db: Database,
    pub(crate) conn: Connection,
}

impl Handle {
    /// Open `target` and bring its schema up to date.
    pub(crate) async fn open(target: &StoreTarget, migrations: &[Migration]) -> Result<Self> {
        let db = match target {
            StoreTarget::Local(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| CourseGraphError::io(parent, e))?;
                }
                libsql::Builder::new_local(path)
                    .build()
                    .await
                    .map_err(CourseGraphError::storage)?
            }
            StoreTarget::Remote { url, auth_token } => {
                libsql::Builder::new_remote(url.clone(), auth_token.clone())
                    .build()
                    .await
                    .map_err(CourseGraphError::storage)?
            }
        };

        let conn = db.connect().map_err(CourseGraphError::storage)?;
        let handle = Self { db, conn };
        handle.run_migrations(migrations).await?;
        Ok(handle)
    }

    async fn run_migrations(&self, migrations: &[Migration]) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    CourseGraphError::storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 on a fresh database.
    pub(crate) async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    /// `SELECT COUNT(*)` style query returning a single integer.
    pub(crate) async fn count(
        &self,
        sql: &str,
        args: impl libsql::params::IntoParams,
    ) -> Result<u64> {
        let mut rows = self
            .conn
            .query(sql, args)
            .await
            .map_err(CourseGraphError::storage)?;
        match rows.next().await.map_err(CourseGraphError::storage)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(CourseGraphError::storage)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

/// Error for calls on a store after `close()`.
pub(crate) fn closed(what: &str) -> CourseGraphError {
    CourseGraphError::storage(format!("{what} is closed"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use coursegraph_shared::{
        Chapter, KnowledgePoint, ParsedCorpus, Relation, RelationKind, Textbook,
    };
    use uuid::Uuid;

    use super::StoreTarget;

    /// A throwaway local database file.
    pub fn temp_target() -> StoreTarget {
        StoreTarget::Local(std::env::temp_dir().join(format!("cg_test_{}.db", Uuid::now_v7())))
    }

    /// One textbook, one chapter, two points, one cross reference.
    pub fn sample_corpus() -> ParsedCorpus {
        ParsedCorpus {
            root: "data/textbooks".into(),
            textbooks: vec![Textbook {
                id: "tb-1".into(),
                title: "Polymer Chains".into(),
                subject: "polymer-physics".into(),
                summary: None,
                source_path: "polymer-physics/chains.md".into(),
                content_hash: "abc".into(),
            }],
            chapters: vec![Chapter {
                id: "ch-1".into(),
                textbook_id: "tb-1".into(),
                ordinal: 1,
                title: "Conformation".into(),
                summary: Some("How polymer chains arrange in space.".into()),
            }],
            points: vec![
                KnowledgePoint {
                    id: "kp-1".into(),
                    chapter_id: "ch-1".into(),
                    textbook_id: "tb-1".into(),
                    ordinal: 1,
                    title: "Freely Jointed Chain".into(),
                    body: "Segments of fixed length with random orientation.".into(),
                    keywords: vec!["random walk".into()],
                },
                KnowledgePoint {
                    id: "kp-2".into(),
                    chapter_id: "ch-1".into(),
                    textbook_id: "tb-1".into(),
                    ordinal: 2,
                    title: "Radius of Gyration".into(),
                    body: "Size of a polymer coil.".into(),
                    keywords: vec![],
                },
            ],
            relations: vec![
                Relation {
                    from: "tb-1".into(),
                    to: "ch-1".into(),
                    kind: RelationKind::Contains,
                },
                Relation {
                    from: "ch-1".into(),
                    to: "kp-1".into(),
                    kind: RelationKind::Contains,
                },
                Relation {
                    from: "ch-1".into(),
                    to: "kp-2".into(),
                    kind: RelationKind::Contains,
                },
                Relation {
                    from: "kp-1".into(),
                    to: "kp-2".into(),
                    kind: RelationKind::References,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_target_resolves_against_project_root() {
        let target = StoreTarget::for_graph(&GraphConfig::default(), Path::new("/srv/app")).unwrap();
        assert_eq!(target, StoreTarget::Local(PathBuf::from("/srv/app/var/graph.db")));
    }

    #[test]
    fn remote_target_without_token_is_config_error() {
        let config = GraphConfig {
            url: Some("libsql://graph.example.com".into()),
            auth_token_env: "COURSEGRAPH_TEST_TOKEN_THAT_IS_NEVER_SET".into(),
            ..Default::default()
        };
        let err = StoreTarget::for_graph(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, CourseGraphError::Config { .. }));
        assert!(err.to_string().contains("COURSEGRAPH_TEST_TOKEN_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn debug_hides_token() {
        let target = StoreTarget::Remote {
            url: "libsql://x".into(),
            auth_token: "secret".into(),
        };
        assert!(!format!("{target:?}").contains("secret"));
        assert_eq!(target.to_string(), "libsql://x");
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let target = test_support::temp_target();
        let first = Handle::open(&target, &migrations::graph_migrations())
            .await
            .expect("first open");
        drop(first);
        let second = Handle::open(&target, &migrations::graph_migrations())
            .await
            .expect("second open");
        assert_eq!(second.schema_version().await, 1);
    }
}
