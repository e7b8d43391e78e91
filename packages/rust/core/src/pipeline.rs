//! The `ingest` pipeline: parse textbooks → load graph → load search index.
//!
//! Stages run one after another. A failed parse skips both loads; after a
//! successful parse the two loads are independent, so a broken graph store
//! never keeps the index from loading and vice versa. Every error ends up as
//! a [`StageOutcome`] carrying a short cause and a remediation checklist;
//! nothing escapes [`run_ingest`].

use std::path::Path;
use std::time::{Duration, Instant};

use coursegraph_shared::{CourseGraphError, ParsedCorpus, Result};
use tracing::{Instrument, info, info_span, warn};

use crate::adapters::{BackendProvider, CorpusParser, GraphLoader, IndexLoader};
use crate::confirm::Confirm;

/// Question put to the operator before the graph stage loads anything.
pub const CLEAR_PROMPT: &str = "Clear the existing graph before loading?";

const PARSE_HINTS: &[&str] = &["check textbook paths"];

const GRAPH_HINTS: &[&str] = &[
    "is the graph database service up and reachable?",
    "are the graph credentials configured (graph.url, graph.auth_token_env)?",
    "is the libSQL driver installed for this build?",
];

const INDEX_HINTS: &[&str] = &[
    "is the search index service up and reachable?",
    "are the index credentials configured (index.url, index.auth_token_env)?",
    "is the libSQL driver installed for this build?",
];

// ---------------------------------------------------------------------------
// Stages and outcomes
// ---------------------------------------------------------------------------

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parse,
    GraphLoad,
    IndexLoad,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Parse, Stage::GraphLoad, Stage::IndexLoad];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::GraphLoad => "graph",
            Self::IndexLoad => "index",
        }
    }

    /// Heading shown in the stage banner.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Parse => "Parse textbooks",
            Self::GraphLoad => "Load graph store",
            Self::IndexLoad => "Load search index",
        }
    }

    /// 1-based position.
    pub fn number(&self) -> usize {
        match self {
            Self::Parse => 1,
            Self::GraphLoad => 2,
            Self::IndexLoad => 3,
        }
    }

    /// Fixed checklist printed when this stage fails.
    pub fn remediation_hints(&self) -> &'static [&'static str] {
        match self {
            Self::Parse => PARSE_HINTS,
            Self::GraphLoad => GRAPH_HINTS,
            Self::IndexLoad => INDEX_HINTS,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one stage. `Succeeded`, `Failed` and `Skipped` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Skipped)
    }

    /// Allowed moves: `Pending → Running | Skipped`, `Running → Succeeded | Failed`.
    pub fn can_transition_to(&self, next: StageState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Succeeded)
                | (Self::Running, Self::Failed)
        )
    }
}

/// How a stage ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    Succeeded {
        summary: String,
    },
    Failed {
        cause: String,
        hints: &'static [&'static str],
    },
    /// Never started because an earlier stage failed.
    Skipped {
        reason: String,
    },
}

impl StageOutcome {
    /// Failure of `stage`, with its fixed checklist.
    pub fn failed(stage: Stage, error: &CourseGraphError) -> Self {
        Self::Failed {
            cause: error.to_string(),
            hints: stage.remediation_hints(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// Terminal state this outcome corresponds to.
    pub fn state(&self) -> StageState {
        match self {
            Self::Succeeded { .. } => StageState::Succeeded,
            Self::Failed { .. } => StageState::Failed,
            Self::Skipped { .. } => StageState::Skipped,
        }
    }
}

/// Outcomes of all three stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub parse: StageOutcome,
    pub graph: StageOutcome,
    pub index: StageOutcome,
    pub elapsed: Duration,
}

impl PipelineOutcome {
    pub fn outcome(&self, stage: Stage) -> &StageOutcome {
        match stage {
            Stage::Parse => &self.parse,
            Stage::GraphLoad => &self.graph,
            Stage::IndexLoad => &self.index,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        Stage::ALL.iter().all(|s| self.outcome(*s).is_success())
    }
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Progress callback for the pipeline.
pub trait PipelineReporter: Send + Sync {
    /// A stage is about to run.
    fn stage_started(&self, stage: Stage);
    /// Free-form progress inside a running stage.
    fn progress(&self, stage: Stage, message: &str);
    /// A stage reached a terminal state (including `Skipped`).
    fn stage_finished(&self, stage: Stage, outcome: &StageOutcome);
    /// The whole pipeline is done.
    fn finished(&self, outcome: &PipelineOutcome);
}

/// No-op reporter for headless/test usage.
pub struct SilentReporter;

impl PipelineReporter for SilentReporter {
    fn stage_started(&self, _stage: Stage) {}
    fn progress(&self, _stage: Stage, _message: &str) {}
    fn stage_finished(&self, _stage: Stage, _outcome: &StageOutcome) {}
    fn finished(&self, _outcome: &PipelineOutcome) {}
}

/// Tracks stage states and forwards transitions to the reporter.
struct Ledger<'a> {
    states: [StageState; 3],
    reporter: &'a dyn PipelineReporter,
}

impl<'a> Ledger<'a> {
    fn new(reporter: &'a dyn PipelineReporter) -> Self {
        Self {
            states: [StageState::Pending; 3],
            reporter,
        }
    }

    fn advance(&mut self, stage: Stage, next: StageState) {
        let current = &mut self.states[stage.number() - 1];
        debug_assert!(
            current.can_transition_to(next),
            "{stage}: {current:?} -> {next:?}"
        );
        tracing::trace!(%stage, from = ?current, to = ?next, "stage transition");
        *current = next;
    }

    fn start(&mut self, stage: Stage) {
        self.advance(stage, StageState::Running);
        self.reporter.stage_started(stage);
    }

    fn finish(&mut self, stage: Stage, outcome: StageOutcome) -> StageOutcome {
        self.advance(stage, outcome.state());
        match &outcome {
            StageOutcome::Succeeded { summary } => info!(%stage, %summary, "stage succeeded"),
            StageOutcome::Failed { cause, .. } => warn!(%stage, %cause, "stage failed"),
            StageOutcome::Skipped { reason } => info!(%stage, %reason, "stage skipped"),
        }
        self.reporter.stage_finished(stage, &outcome);
        outcome
    }

    fn skip(&mut self, stage: Stage, reason: &str) -> StageOutcome {
        self.finish(
            stage,
            StageOutcome::Skipped {
                reason: reason.to_string(),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Run the three stages against `textbook_root`.
///
/// 1. Parse: `parser.parse_all(textbook_root)`
/// 2. Graph: open, ask `confirm` whether to clear, clear (only on yes),
///    create indexes, import, close
/// 3. Index: open, create indexes, import, smoke search, close
pub async fn run_ingest(
    textbook_root: &Path,
    parser: &dyn CorpusParser,
    backends: &dyn BackendProvider,
    confirm: &mut dyn Confirm,
    reporter: &dyn PipelineReporter,
) -> PipelineOutcome {
    let start = Instant::now();
    let mut ledger = Ledger::new(reporter);
    info!(root = %textbook_root.display(), "starting ingest pipeline");

    // --- Stage 1: Parse ---
    ledger.start(Stage::Parse);
    let parsed = parser
        .parse_all(textbook_root)
        .instrument(info_span!("stage", stage = %Stage::Parse))
        .await;

    let (parse, graph, index) = match parsed {
        Err(e) => {
            let parse = ledger.finish(Stage::Parse, StageOutcome::failed(Stage::Parse, &e));
            let graph = ledger.skip(Stage::GraphLoad, "textbook parsing failed");
            let index = ledger.skip(Stage::IndexLoad, "textbook parsing failed");
            (parse, graph, index)
        }
        Ok(corpus) => {
            let summary = corpus.stats().to_string();
            let parse = ledger.finish(Stage::Parse, StageOutcome::Succeeded { summary });

            // --- Stage 2: Graph ---
            ledger.start(Stage::GraphLoad);
            let graph = graph_stage(&corpus, backends, confirm, reporter)
                .instrument(info_span!("stage", stage = %Stage::GraphLoad))
                .await;
            let graph = ledger.finish(Stage::GraphLoad, graph);

            // --- Stage 3: Index ---
            ledger.start(Stage::IndexLoad);
            let index = index_stage(&corpus, backends, reporter)
                .instrument(info_span!("stage", stage = %Stage::IndexLoad))
                .await;
            let index = ledger.finish(Stage::IndexLoad, index);

            (parse, graph, index)
        }
    };

    let outcome = PipelineOutcome {
        parse,
        graph,
        index,
        elapsed: start.elapsed(),
    };
    info!(
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        ok = outcome.all_succeeded(),
        "ingest pipeline finished"
    );
    reporter.finished(&outcome);
    outcome
}

async fn graph_stage(
    corpus: &ParsedCorpus,
    backends: &dyn BackendProvider,
    confirm: &mut dyn Confirm,
    reporter: &dyn PipelineReporter,
) -> StageOutcome {
    let stage = Stage::GraphLoad;
    let mut graph = match backends.open_graph().await {
        Ok(graph) => graph,
        Err(e) => return StageOutcome::failed(stage, &e),
    };

    let clear = confirm.confirm(CLEAR_PROMPT);
    info!(clear, "clear confirmation");

    let loaded = load_graph(graph.as_mut(), corpus, clear, reporter).await;
    let closed = graph.close().await;
    settle(stage, loaded, closed)
}

async fn load_graph(
    graph: &mut dyn GraphLoader,
    corpus: &ParsedCorpus,
    clear: bool,
    reporter: &dyn PipelineReporter,
) -> Result<String> {
    let stage = Stage::GraphLoad;
    if clear {
        reporter.progress(stage, "clearing existing graph");
        graph.clear().await?;
    } else {
        reporter.progress(stage, "keeping existing graph");
    }

    reporter.progress(stage, "creating indexes");
    graph.create_indexes().await?;

    reporter.progress(stage, "importing records");
    graph.import_all(corpus).await
}

async fn index_stage(
    corpus: &ParsedCorpus,
    backends: &dyn BackendProvider,
    reporter: &dyn PipelineReporter,
) -> StageOutcome {
    let stage = Stage::IndexLoad;
    let mut index = match backends.open_index().await {
        Ok(index) => index,
        Err(e) => return StageOutcome::failed(stage, &e),
    };

    let loaded = load_index(index.as_mut(), corpus, reporter).await;
    let closed = index.close().await;
    settle(stage, loaded, closed)
}

async fn load_index(
    index: &mut dyn IndexLoader,
    corpus: &ParsedCorpus,
    reporter: &dyn PipelineReporter,
) -> Result<String> {
    let stage = Stage::IndexLoad;
    reporter.progress(stage, "creating indexes");
    index.create_indexes().await?;

    reporter.progress(stage, "importing records");
    let imported = index.import_all(corpus).await?;

    reporter.progress(stage, "running smoke search");
    let hits = index.test_search().await?;
    for hit in hits.iter().take(3) {
        reporter.progress(stage, &format!("'{}' → {}", hit.query, hit.title));
    }

    Ok(format!("{imported}, {} sample hits", hits.len()))
}

/// Combine the load result with the close result. A load error wins; a
/// close error after a good load still fails the stage.
fn settle(stage: Stage, loaded: Result<String>, closed: Result<()>) -> StageOutcome {
    match (loaded, closed) {
        (Ok(summary), Ok(())) => StageOutcome::Succeeded { summary },
        (Ok(_), Err(e)) => StageOutcome::failed(stage, &e),
        (Err(e), Ok(())) => StageOutcome::failed(stage, &e),
        (Err(e), Err(close_err)) => {
            warn!(%stage, error = %close_err, "close failed after load error");
            StageOutcome::failed(stage, &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use coursegraph_shared::{Chapter, KnowledgePoint, Textbook};

    use super::*;
    use crate::adapters::SampleHit;
    use crate::confirm::{FixedAnswer, PromptConfirm};

    type Log = Arc<Mutex<Vec<String>>>;

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    fn boom(step: &str) -> CourseGraphError {
        CourseGraphError::storage(format!("{step} exploded"))
    }

    fn corpus() -> ParsedCorpus {
        ParsedCorpus {
            root: PathBuf::from("data/textbooks"),
            textbooks: vec![Textbook {
                id: "tb-1".into(),
                title: "Ming Dynasty".into(),
                subject: "history".into(),
                summary: None,
                source_path: "history/ming.md".into(),
                content_hash: "h".into(),
            }],
            chapters: vec![Chapter {
                id: "ch-1".into(),
                textbook_id: "tb-1".into(),
                ordinal: 1,
                title: "Founding".into(),
                summary: None,
            }],
            points: vec![KnowledgePoint {
                id: "kp-1".into(),
                chapter_id: "ch-1".into(),
                textbook_id: "tb-1".into(),
                ordinal: 1,
                title: "Hongwu Emperor".into(),
                body: "Founded the dynasty in 1368.".into(),
                keywords: vec![],
            }],
            relations: vec![],
        }
    }

    // --- mocks ---

    struct MockParser {
        fail: bool,
        log: Log,
    }

    #[async_trait]
    impl CorpusParser for MockParser {
        async fn parse_all(&self, root: &Path) -> Result<ParsedCorpus> {
            self.log.lock().unwrap().push("parse".into());
            if self.fail {
                Err(CourseGraphError::io(
                    root,
                    std::io::Error::from(std::io::ErrorKind::NotFound),
                ))
            } else {
                Ok(corpus())
            }
        }
    }

    /// Step names a mock adapter should fail at (`open`, `clear`, `import_all`, ...).
    #[derive(Default, Clone)]
    struct Faults {
        graph: Vec<&'static str>,
        index: Vec<&'static str>,
    }

    struct MockGraph {
        fail_at: Vec<&'static str>,
        log: Log,
    }

    impl MockGraph {
        fn step(&self, name: &'static str) -> Result<()> {
            self.log.lock().unwrap().push(format!("graph.{name}"));
            if self.fail_at.contains(&name) {
                Err(boom(name))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl GraphLoader for MockGraph {
        async fn clear(&mut self) -> Result<()> {
            self.step("clear")
        }
        async fn create_indexes(&mut self) -> Result<()> {
            self.step("create_indexes")
        }
        async fn import_all(&mut self, corpus: &ParsedCorpus) -> Result<String> {
            self.step("import_all")?;
            let nodes = corpus.textbooks.len() + corpus.chapters.len() + corpus.points.len();
            Ok(format!("{nodes} nodes"))
        }
        async fn close(&mut self) -> Result<()> {
            self.step("close")
        }
    }

    struct MockIndex {
        fail_at: Vec<&'static str>,
        log: Log,
    }

    impl MockIndex {
        fn step(&self, name: &'static str) -> Result<()> {
            self.log.lock().unwrap().push(format!("index.{name}"));
            if self.fail_at.contains(&name) {
                Err(boom(name))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl IndexLoader for MockIndex {
        async fn create_indexes(&mut self) -> Result<()> {
            self.step("create_indexes")
        }
        async fn import_all(&mut self, _corpus: &ParsedCorpus) -> Result<String> {
            self.step("import_all")?;
            Ok("2 documents indexed".into())
        }
        async fn test_search(&mut self) -> Result<Vec<SampleHit>> {
            self.step("test_search")?;
            Ok(vec![SampleHit {
                query: "dynasty".into(),
                title: "Hongwu Emperor".into(),
            }])
        }
        async fn close(&mut self) -> Result<()> {
            self.step("close")
        }
    }

    struct MockBackends {
        faults: Faults,
        log: Log,
    }

    #[async_trait]
    impl BackendProvider for MockBackends {
        async fn open_graph(&self) -> Result<Box<dyn GraphLoader>> {
            self.log.lock().unwrap().push("graph.open".into());
            if self.faults.graph.contains(&"open") {
                return Err(CourseGraphError::config("graph url not configured"));
            }
            Ok(Box::new(MockGraph {
                fail_at: self.faults.graph.clone(),
                log: self.log.clone(),
            }))
        }

        async fn open_index(&self) -> Result<Box<dyn IndexLoader>> {
            self.log.lock().unwrap().push("index.open".into());
            if self.faults.index.contains(&"open") {
                return Err(CourseGraphError::config("index url not configured"));
            }
            Ok(Box::new(MockIndex {
                fail_at: self.faults.index.clone(),
                log: self.log.clone(),
            }))
        }
    }

    /// Records reporter events as strings.
    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl PipelineReporter for RecordingReporter {
        fn stage_started(&self, stage: Stage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }
        fn progress(&self, _stage: Stage, _message: &str) {}
        fn stage_finished(&self, stage: Stage, outcome: &StageOutcome) {
            self.events
                .lock()
                .unwrap()
                .push(format!("finish {stage} {:?}", outcome.state()));
        }
        fn finished(&self, _outcome: &PipelineOutcome) {
            self.events.lock().unwrap().push("done".into());
        }
    }

    async fn run(
        parse_fails: bool,
        faults: Faults,
        confirm: &mut dyn Confirm,
    ) -> (PipelineOutcome, Vec<String>) {
        let log: Log = Arc::default();
        let parser = MockParser {
            fail: parse_fails,
            log: log.clone(),
        };
        let backends = MockBackends {
            faults,
            log: log.clone(),
        };
        let outcome = run_ingest(
            Path::new("data/textbooks"),
            &parser,
            &backends,
            confirm,
            &SilentReporter,
        )
        .await;
        (outcome, entries(&log))
    }

    // --- tests ---

    #[tokio::test]
    async fn happy_path_call_order() {
        let (outcome, log) = run(false, Faults::default(), &mut FixedAnswer(false)).await;

        assert!(outcome.all_succeeded());
        assert_eq!(
            log,
            vec![
                "parse",
                "graph.open",
                "graph.create_indexes",
                "graph.import_all",
                "graph.close",
                "index.open",
                "index.create_indexes",
                "index.import_all",
                "index.test_search",
                "index.close",
            ]
        );
        assert_eq!(
            outcome.index,
            StageOutcome::Succeeded {
                summary: "2 documents indexed, 1 sample hits".into()
            }
        );
    }

    #[tokio::test]
    async fn parse_failure_constructs_no_adapter() {
        let (outcome, log) = run(true, Faults::default(), &mut FixedAnswer(true)).await;

        assert_eq!(log, vec!["parse"]);
        match &outcome.parse {
            StageOutcome::Failed { hints, .. } => assert_eq!(*hints, &["check textbook paths"]),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(outcome.graph.state(), StageState::Skipped);
        assert_eq!(outcome.index.state(), StageState::Skipped);
    }

    #[tokio::test]
    async fn graph_failure_does_not_block_index() {
        let faults = Faults {
            graph: vec!["import_all"],
            ..Default::default()
        };
        let (outcome, log) = run(false, faults, &mut FixedAnswer(false)).await;

        assert!(matches!(outcome.graph, StageOutcome::Failed { .. }));
        assert!(outcome.index.is_success());
        assert!(log.contains(&"index.test_search".to_string()));
    }

    #[tokio::test]
    async fn index_failure_leaves_graph_success() {
        let faults = Faults {
            index: vec!["create_indexes"],
            ..Default::default()
        };
        let (outcome, log) = run(false, faults, &mut FixedAnswer(false)).await;

        assert!(outcome.graph.is_success());
        match &outcome.index {
            StageOutcome::Failed { cause, hints } => {
                assert!(cause.contains("create_indexes exploded"));
                assert_eq!(*hints, INDEX_HINTS);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!log.contains(&"index.import_all".to_string()));
        assert_eq!(log.last().map(String::as_str), Some("index.close"));
    }

    #[tokio::test]
    async fn graph_open_failure_is_isolated() {
        let faults = Faults {
            graph: vec!["open"],
            ..Default::default()
        };
        let (outcome, log) = run(false, faults, &mut FixedAnswer(true)).await;

        match &outcome.graph {
            StageOutcome::Failed { cause, hints } => {
                assert!(cause.contains("graph url not configured"));
                assert_eq!(*hints, GRAPH_HINTS);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!log.iter().any(|l| l.starts_with("graph.") && l != "graph.open"));
        assert!(outcome.index.is_success());
    }

    #[tokio::test]
    async fn empty_answer_does_not_clear() {
        let mut confirm = PromptConfirm::new("\n".as_bytes(), Vec::new());
        let (_, log) = run(false, Faults::default(), &mut confirm).await;
        assert!(!log.contains(&"graph.clear".to_string()));
    }

    #[tokio::test]
    async fn yes_clears_exactly_once_before_import() {
        let mut confirm = PromptConfirm::new("  YES \n".as_bytes(), Vec::new());
        let (outcome, log) = run(false, Faults::default(), &mut confirm).await;

        assert!(outcome.graph.is_success());
        let clears = log.iter().filter(|l| *l == "graph.clear").count();
        assert_eq!(clears, 1);
        let clear_at = log.iter().position(|l| l == "graph.clear").unwrap();
        let import_at = log.iter().position(|l| l == "graph.import_all").unwrap();
        assert!(clear_at < import_at);
    }

    #[tokio::test]
    async fn graph_close_runs_on_every_exit_path() {
        for step in ["clear", "create_indexes", "import_all"] {
            let faults = Faults {
                graph: vec![step],
                ..Default::default()
            };
            let (outcome, log) = run(false, faults, &mut FixedAnswer(true)).await;

            assert!(matches!(outcome.graph, StageOutcome::Failed { .. }), "{step}");
            let closes = log.iter().filter(|l| *l == "graph.close").count();
            assert_eq!(closes, 1, "{step}");
        }
    }

    #[tokio::test]
    async fn close_failure_after_load_fails_stage() {
        let faults = Faults {
            graph: vec!["close"],
            ..Default::default()
        };
        let (outcome, _) = run(false, faults, &mut FixedAnswer(false)).await;
        match &outcome.graph {
            StageOutcome::Failed { cause, .. } => assert!(cause.contains("close exploded")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn load_error_wins_over_close_error() {
        let faults = Faults {
            graph: vec!["import_all", "close"],
            ..Default::default()
        };
        let (outcome, _) = run(false, faults, &mut FixedAnswer(false)).await;
        match &outcome.graph {
            StageOutcome::Failed { cause, .. } => assert!(cause.contains("import_all exploded")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn reporter_sees_every_stage_once() {
        let log: Log = Arc::default();
        let reporter = RecordingReporter::default();
        run_ingest(
            Path::new("x"),
            &MockParser {
                fail: true,
                log: log.clone(),
            },
            &MockBackends {
                faults: Faults::default(),
                log,
            },
            &mut FixedAnswer(false),
            &reporter,
        )
        .await;

        assert_eq!(
            *reporter.events.lock().unwrap(),
            vec![
                "start parse",
                "finish parse Failed",
                "finish graph Skipped",
                "finish index Skipped",
                "done",
            ]
        );
    }

    #[test]
    fn state_machine_transitions() {
        use StageState::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Skipped));
        assert!(Running.can_transition_to(Succeeded));
        assert!(Running.can_transition_to(Failed));
        assert!(!Pending.can_transition_to(Succeeded));
        assert!(!Succeeded.can_transition_to(Running));
        assert!(!Failed.can_transition_to(Running));
        assert!(Skipped.is_terminal() && Failed.is_terminal() && !Running.is_terminal());
    }
}
