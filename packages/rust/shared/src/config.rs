//! Application configuration for CourseGraph.
//!
//! A project-local `coursegraph.toml` wins over the user config at
//! `~/.coursegraph/coursegraph.toml`, which wins over built-in defaults.
//! The storage adapters read their connection details from here; nothing
//! else in the pipeline looks at the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CourseGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "coursegraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".coursegraph";

// ---------------------------------------------------------------------------
// Config structs (matching coursegraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Project layout.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Label rewrite settings.
    #[serde(default)]
    pub relabel: RelabelConfig,

    /// Graph store connection.
    #[serde(default)]
    pub graph: GraphConfig,

    /// Search index connection.
    #[serde(default)]
    pub index: IndexConfig,
}

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding the Markdown textbooks, relative to the project root.
    #[serde(default = "default_textbook_root")]
    pub textbook_root: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            textbook_root: default_textbook_root(),
        }
    }
}

fn default_textbook_root() -> String {
    "data/textbooks".into()
}

/// `[relabel]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelabelConfig {
    /// Directories (relative to the project root) the rewriter scans.
    #[serde(default = "default_relabel_roots")]
    pub roots: Vec<String>,

    /// Only files whose name ends with this suffix are candidates.
    #[serde(default = "default_candidate_suffix")]
    pub candidate_suffix: String,

    /// Paths with a component equal to this are never opened.
    #[serde(default = "default_cache_segment")]
    pub cache_segment: String,
}

impl Default for RelabelConfig {
    fn default() -> Self {
        Self {
            roots: default_relabel_roots(),
            candidate_suffix: default_candidate_suffix(),
            cache_segment: default_cache_segment(),
        }
    }
}

fn default_relabel_roots() -> Vec<String> {
    vec!["modules".into(), "data".into(), "scripts".into()]
}
fn default_candidate_suffix() -> String {
    ".py".into()
}
fn default_cache_segment() -> String {
    "__pycache__".into()
}

/// `[graph]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Local database file, relative to the project root.
    #[serde(default = "default_graph_path")]
    pub path: String,

    /// Remote libSQL URL. When set, `path` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Name of the env var holding the remote auth token (never store the token itself).
    #[serde(default = "default_graph_token_env")]
    pub auth_token_env: String,

    /// Prefix prepended to every node label, e.g. `gfz` → `gfz_Textbook`.
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            path: default_graph_path(),
            url: None,
            auth_token_env: default_graph_token_env(),
            label_prefix: default_label_prefix(),
        }
    }
}

fn default_graph_path() -> String {
    "var/graph.db".into()
}
fn default_graph_token_env() -> String {
    "COURSEGRAPH_GRAPH_TOKEN".into()
}
fn default_label_prefix() -> String {
    "gfz".into()
}

/// `[index]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Local database file, relative to the project root.
    #[serde(default = "default_index_path")]
    pub path: String,

    /// Remote libSQL URL. When set, `path` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Name of the env var holding the remote auth token.
    #[serde(default = "default_index_token_env")]
    pub auth_token_env: String,

    /// Queries run by the post-load smoke test.
    #[serde(default = "default_smoke_queries")]
    pub smoke_queries: Vec<String>,

    /// Maximum hits returned per smoke query.
    #[serde(default = "default_smoke_limit")]
    pub smoke_limit: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            url: None,
            auth_token_env: default_index_token_env(),
            smoke_queries: default_smoke_queries(),
            smoke_limit: default_smoke_limit(),
        }
    }
}

fn default_index_path() -> String {
    "var/search.db".into()
}
fn default_index_token_env() -> String {
    "COURSEGRAPH_INDEX_TOKEN".into()
}
fn default_smoke_queries() -> Vec<String> {
    vec!["polymer".into(), "management".into(), "dynasty".into()]
}
fn default_smoke_limit() -> u32 {
    5
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the user config directory (`~/.coursegraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CourseGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the user config file (`~/.coursegraph/coursegraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Find the config file that applies to `project_root`, if any.
///
/// The project-local file shadows the user file.
pub fn resolve_config_path(project_root: &Path) -> Result<Option<PathBuf>> {
    let local = project_root.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return Ok(Some(local));
    }

    let user = config_file_path()?;
    Ok(user.is_file().then_some(user))
}

/// Load the config for `project_root`. Returns defaults if no file exists.
pub fn load_config(project_root: &Path) -> Result<AppConfig> {
    match resolve_config_path(project_root)? {
        Some(path) => load_config_from(&path),
        None => {
            tracing::debug!(?project_root, "config file not found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CourseGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        CourseGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Write a default config file into `dir` and return its path.
///
/// An existing file is left untouched.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| CourseGraphError::io(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        tracing::info!(?path, "config file already exists");
        return Ok(path);
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| CourseGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CourseGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
