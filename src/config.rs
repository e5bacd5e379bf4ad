//! `config_template.json` loading and per-benchmark resolution.

use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{FunctionFilter, Layout, MODULE_MARKER, ProfError, ProfResult, locate_module_root};

/// Well-known config filename, looked up at the module root.
pub const CONFIG_FILENAME: &str = "config_template.json";

/// Filter-map key that applies to every benchmark.
pub const GLOBAL_KEY: &str = "*";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Benchmark name (or `*`) to function collection filter.
    #[serde(default)]
    pub function_collection_filter: BTreeMap<String, FunctionFilter>,

    /// Regression gate policy.
    #[serde(default, alias = "ci")]
    pub ci_config: Option<CiConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CiConfig {
    #[serde(default)]
    pub global: Option<CiPolicy>,
    #[serde(default)]
    pub benchmarks: BTreeMap<String, CiPolicy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CiPolicy {
    #[serde(default)]
    pub ignore_functions: Vec<String>,
    #[serde(default)]
    pub ignore_prefixes: Vec<String>,
    #[serde(default)]
    pub min_change_threshold: f64,
    #[serde(default)]
    pub max_regression_threshold: f64,
    #[serde(default)]
    pub fail_on_improvement: bool,
}

impl Config {
    /// A missing file is the empty config; unreadable or malformed content is a config error.
    pub fn load(path: &Path) -> ProfResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<Config>(&s)
                .map_err(|e| ProfError::Config(format!("{}: {e}", path.display()))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    "no config found at {}; proceeding without function filters",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(err) => Err(ProfError::Config(format!("{}: {err}", path.display()))),
        }
    }

    /// The global entry pre-empts per-benchmark entries; no entry means no filtering.
    pub fn filter_for(&self, benchmark: &str) -> FunctionFilter {
        self.function_collection_filter
            .get(GLOBAL_KEY)
            .or_else(|| self.function_collection_filter.get(benchmark))
            .cloned()
            .unwrap_or_default()
    }

    pub fn ci_policy_for(&self, benchmark: &str) -> Option<CiPolicy> {
        self.ci_config.as_ref().and_then(|ci| ci.resolve(benchmark))
    }
}

impl CiConfig {
    /// A benchmark entry fully replaces the global policy.
    pub fn resolve(&self, benchmark: &str) -> Option<CiPolicy> {
        self.benchmarks
            .get(benchmark)
            .or(self.global.as_ref())
            .cloned()
    }
}

/// Where a command reads and writes, resolved once from the command line and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub output_root: PathBuf,
    pub working_dir: PathBuf,
    pub module_root: Option<PathBuf>,
    pub config_path: PathBuf,
}

impl Settings {
    /// An explicit config path wins; otherwise the config is looked up at the module root,
    /// or in `working_dir` when there is no module.
    pub fn resolve(output_root: PathBuf, config_override: Option<PathBuf>, working_dir: PathBuf) -> Self {
        let module_root = locate_module_root(&working_dir).ok();
        let config_path = config_override.unwrap_or_else(|| {
            module_root
                .as_deref()
                .unwrap_or(&working_dir)
                .join(CONFIG_FILENAME)
        });
        Self {
            output_root,
            working_dir,
            module_root,
            config_path,
        }
    }

    pub fn layout(&self) -> Layout {
        Layout::new(&self.output_root)
    }

    /// Loads the config this command resolved; see [`Config::load`].
    pub fn load_config(&self) -> ProfResult<Config> {
        Config::load(&self.config_path)
    }

    pub fn require_module_root(&self) -> ProfResult<&Path> {
        self.module_root.as_deref().ok_or_else(|| {
            ProfError::Environment(format!(
                "{MODULE_MARKER} not found in {} or any parent directory",
                self.working_dir.display()
            ))
        })
    }
}
