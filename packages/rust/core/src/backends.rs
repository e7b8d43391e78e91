//! Production adapters: Markdown textbooks in, libSQL stores out.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use coursegraph_shared::{AppConfig, CourseGraphError, ParsedCorpus, Result};
use coursegraph_storage::{GraphStore, SearchIndex, StoreTarget};
use coursegraph_textbook::TextbookParser;

use crate::adapters::{BackendProvider, CorpusParser, GraphLoader, IndexLoader, SampleHit};

#[async_trait]
impl CorpusParser for TextbookParser {
    async fn parse_all(&self, root: &Path) -> Result<ParsedCorpus> {
        let parser = self.clone();
        let root = root.to_path_buf();
        tokio::task::spawn_blocking(move || TextbookParser::parse_all(&parser, &root))
            .await
            .map_err(|e| CourseGraphError::parse(format!("parser task failed: {e}")))?
    }
}

#[async_trait]
impl GraphLoader for GraphStore {
    async fn clear(&mut self) -> Result<()> {
        GraphStore::clear(self).await
    }

    async fn create_indexes(&mut self) -> Result<()> {
        GraphStore::create_indexes(self).await
    }

    async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<String> {
        let stats = GraphStore::import_all(self, corpus).await?;
        Ok(format!("{stats} (batch {})", stats.batch_id))
    }

    async fn close(&mut self) -> Result<()> {
        GraphStore::close(self).await
    }
}

/// The search index plus the smoke queries it should answer after a load.
pub struct SmokeTestedIndex {
    index: SearchIndex,
    queries: Vec<String>,
    limit: u32,
}

impl SmokeTestedIndex {
    pub fn new(index: SearchIndex, queries: Vec<String>, limit: u32) -> Self {
        Self {
            index,
            queries,
            limit,
        }
    }
}

#[async_trait]
impl IndexLoader for SmokeTestedIndex {
    async fn create_indexes(&mut self) -> Result<()> {
        self.index.create_indexes().await
    }

    async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<String> {
        Ok(self.index.import_all(corpus).await?.to_string())
    }

    async fn test_search(&mut self) -> Result<Vec<SampleHit>> {
        let hits = self.index.test_search(&self.queries, self.limit).await?;
        Ok(hits
            .into_iter()
            .map(|hit| SampleHit {
                query: hit.query,
                title: hit.title,
            })
            .collect())
    }

    async fn close(&mut self) -> Result<()> {
        self.index.close().await
    }
}

/// Opens the configured libSQL stores.
#[derive(Debug, Clone)]
pub struct StorageBackends {
    config: AppConfig,
    project_root: PathBuf,
    /// Set when the config file could not be loaded; both stores refuse to open.
    config_error: Option<String>,
}

impl StorageBackends {
    /// Relative store paths resolve against `project_root`.
    pub fn new(config: AppConfig, project_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            project_root: project_root.into(),
            config_error: None,
        }
    }

    /// Backends for a config that failed to load. Every `open_*` returns
    /// `error` as a config error so the stage reports it with its checklist.
    pub fn misconfigured(error: &CourseGraphError, project_root: impl Into<PathBuf>) -> Self {
        let message = match error {
            CourseGraphError::Config { message } => message.clone(),
            other => other.to_string(),
        };
        Self {
            config: AppConfig::default(),
            project_root: project_root.into(),
            config_error: Some(message),
        }
    }

    fn config(&self) -> Result<&AppConfig> {
        match &self.config_error {
            Some(message) => Err(CourseGraphError::config(message.clone())),
            None => Ok(&self.config),
        }
    }
}

#[async_trait]
impl BackendProvider for StorageBackends {
    async fn open_graph(&self) -> Result<Box<dyn GraphLoader>> {
        let config = self.config()?;
        let target = StoreTarget::for_graph(&config.graph, &self.project_root)?;
        tracing::info!(%target, "opening graph store");
        let store = GraphStore::open(&target, &config.graph.label_prefix).await?;
        Ok(Box::new(store))
    }

    async fn open_index(&self) -> Result<Box<dyn IndexLoader>> {
        let config = self.config()?;
        let target = StoreTarget::for_index(&config.index, &self.project_root)?;
        tracing::info!(%target, "opening search index");
        let index = SearchIndex::open(&target).await?;
        Ok(Box::new(SmokeTestedIndex::new(
            index,
            config.index.smoke_queries.clone(),
            config.index.smoke_limit,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::FixedAnswer;
    use crate::pipeline::{SilentReporter, StageOutcome, run_ingest};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn end_to_end_against_local_stores() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "data/textbooks/polymer-physics/chains.md",
            "# Polymer Chains\n## Conformation\n### Radius of Gyration\nSize of a polymer coil.\n",
        );

        let backends = StorageBackends::new(AppConfig::default(), dir.path());
        let outcome = run_ingest(
            &dir.path().join("data/textbooks"),
            &TextbookParser::default(),
            &backends,
            &mut FixedAnswer(true),
            &SilentReporter,
        )
        .await;

        assert!(outcome.all_succeeded(), "{outcome:?}");
        assert!(dir.path().join("var/graph.db").exists());
        assert!(dir.path().join("var/search.db").exists());
        match &outcome.index {
            StageOutcome::Succeeded { summary } => {
                assert!(summary.contains("2 sample hits"), "{summary}")
            }
            other => panic!("unexpected index outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_textbooks_fail_parse_only() {
        let dir = tempfile::tempdir().unwrap();
        let backends = StorageBackends::new(AppConfig::default(), dir.path());
        let outcome = run_ingest(
            &dir.path().join("data/textbooks"),
            &TextbookParser::default(),
            &backends,
            &mut FixedAnswer(true),
            &SilentReporter,
        )
        .await;

        assert!(matches!(outcome.parse, StageOutcome::Failed { .. }));
        assert!(matches!(outcome.graph, StageOutcome::Skipped { .. }));
        assert!(!dir.path().join("var").exists());
    }

    #[tokio::test]
    async fn bad_config_fails_both_loads_but_parses() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "data/textbooks/org.md",
            "# Org\n## Structure\n### Span of Control\nReports.\n",
        );

        let error = CourseGraphError::config("failed to parse coursegraph.toml: expected `]`");
        let backends = StorageBackends::misconfigured(&error, dir.path());
        let outcome = run_ingest(
            &dir.path().join("data/textbooks"),
            &TextbookParser::default(),
            &backends,
            &mut FixedAnswer(true),
            &SilentReporter,
        )
        .await;

        assert!(outcome.parse.is_success(), "{outcome:?}");
        for stage in [&outcome.graph, &outcome.index] {
            match stage {
                StageOutcome::Failed { cause, hints } => {
                    assert!(cause.contains("expected `]`"), "{cause}");
                    assert!(!cause.contains("config error: config error"), "{cause}");
                    assert!(!hints.is_empty());
                }
                other => panic!("unexpected outcome: {other:?}"),
            }
        }
        assert!(!dir.path().join("var").exists());
    }
}
