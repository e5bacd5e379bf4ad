//! Source and artifact lookup inside a Go module.

use regex::Regex;

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::{DirEntry, WalkDir};

use crate::{IoContext, ProfError, ProfResult};

const TEST_FILE_SUFFIX: &str = "_test.go";
const TEST_BINARY_SUFFIX: &str = ".test";
const BENCHMARK_SIGNATURE: &str = r"\s*\(\s*b\s*\*\s*testing\.B\s*\)\s*\{";

pub fn validate_benchmark_name(name: &str) -> ProfResult<()> {
    let valid = name
        .strip_prefix("Benchmark")
        .is_some_and(|rest| rest.chars().all(|c| c.is_alphanumeric() || c == '_'));
    if !valid {
        return Err(ProfError::InvalidArgument(format!(
            "{name:?} is not a benchmark name (expected Benchmark followed by letters, digits or _)"
        )));
    }
    Ok(())
}

/// Every `func BenchmarkXxx(b *testing.B) {` declared in the module, in walk order.
pub fn scan_benchmarks(module_root: &Path) -> ProfResult<Vec<String>> {
    let pattern = compile(&format!(r"(?m)^\s*func\s+(Benchmark\w*){BENCHMARK_SIGNATURE}"))?;
    let mut names = Vec::<String>::new();
    for file in test_files(module_root)? {
        let text = std::fs::read_to_string(&file).with_path("read", &file)?;
        for caps in pattern.captures_iter(&text) {
            let name = caps[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    Ok(names)
}

/// Directory of the test file declaring `benchmark`.
pub fn find_benchmark_package_dir(module_root: &Path, benchmark: &str) -> ProfResult<PathBuf> {
    let pattern = compile(&format!(
        r"(?m)^\s*func\s+{}{BENCHMARK_SIGNATURE}",
        regex::escape(benchmark)
    ))?;
    for file in test_files(module_root)? {
        let text = std::fs::read_to_string(&file).with_path("read", &file)?;
        if pattern.is_match(&text) {
            if let Some(dir) = file.parent() {
                return Ok(dir.to_path_buf());
            }
        }
    }
    Err(ProfError::InvalidArgument(format!(
        "benchmark {benchmark} not found in module {}",
        module_root.display()
    )))
}

/// Most recently modified file called `file_name` under `root`; stale copies from
/// earlier manual runs lose to the one the runner just wrote.
pub fn find_newest_file(root: &Path, file_name: &str) -> ProfResult<Option<PathBuf>> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in module_walk(root) {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != file_name {
            continue;
        }
        let modified = entry
            .metadata()
            .map_err(walk_error)?
            .modified()
            .with_path("stat", entry.path())?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, entry.into_path()));
        }
    }
    Ok(newest.map(|(_, p)| p))
}

/// Compiled test binaries (`*.test`) the runner left in the package directory.
pub fn find_test_binaries(package_dir: &Path) -> ProfResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in WalkDir::new(package_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(walk_error)?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(TEST_BINARY_SUFFIX)
        {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

fn test_files(root: &Path) -> ProfResult<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in module_walk(root) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_string_lossy()
                .ends_with(TEST_FILE_SUFFIX)
        {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

/// Sorted walk that skips hidden directories and `vendor`.
fn module_walk(root: &Path) -> impl Iterator<Item = ProfResult<DirEntry>> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e))
        .map(|e| e.map_err(walk_error))
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.') || name == "vendor")
}

fn walk_error(e: walkdir::Error) -> ProfError {
    let msg = e.to_string();
    ProfError::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other(msg)))
}

fn compile(pattern: &str) -> ProfResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| ProfError::InvalidArgument(format!("invalid pattern {pattern:?}: {e}")))
}
