//! Small filesystem utilities.

use globset::{Glob, GlobSet, GlobSetBuilder};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{IoContext, ProfError, ProfResult};

/// Resolves profile inputs: plain paths are taken as-is, glob patterns are matched by walking
/// the literal directory in front of the first wildcard. Output is sorted and de-duplicated.
pub fn find_matching_files(patterns: &[String]) -> ProfResult<Vec<PathBuf>> {
    let (globs, plain): (Vec<&String>, Vec<&String>) =
        patterns.iter().partition(|p| has_glob_meta(p));
    let mut found = plain
        .into_iter()
        .map(PathBuf::from)
        .filter(|p| p.is_file())
        .collect::<BTreeSet<_>>();
    if globs.is_empty() {
        return Ok(found.into_iter().collect());
    }

    let set = compile_globset(&globs)?;
    let cwd = std::env::current_dir()?;
    for root in glob_roots(&globs) {
        let walker = WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !should_skip_dir(e.path()));
        for entry in walker {
            let entry = entry.map_err(walk_error)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path().strip_prefix(".").unwrap_or(entry.path());
            if set.is_match(path) || set.is_match(cwd.join(path)) {
                found.insert(path.to_path_buf());
            }
        }
    }
    Ok(found.into_iter().collect())
}

/// Writes `bytes`, creating parent directories first.
pub fn write_file(path: &Path, bytes: &[u8]) -> ProfResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_path("create", parent)?;
    }
    std::fs::write(path, bytes).with_path("write", path)
}

/// Rename, falling back to copy+remove when source and destination are on different devices.
pub fn move_file(from: &Path, to: &Path) -> ProfResult<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent).with_path("create", parent)?;
    }
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).with_path("copy", from)?;
    std::fs::remove_file(from).with_path("remove", from)
}

fn walk_error(err: walkdir::Error) -> ProfError {
    let msg = err.to_string();
    ProfError::Io(err.into_io_error().unwrap_or_else(|| std::io::Error::other(msg)))
}

/// The literal directory in front of each pattern's first wildcard.
fn glob_roots(globs: &[&String]) -> BTreeSet<PathBuf> {
    globs
        .iter()
        .map(|pattern| {
            let literal = pattern
                .split(['*', '?', '[', ']', '{', '}'])
                .next()
                .unwrap_or_default();
            match literal.rfind('/') {
                Some(0) => PathBuf::from("/"),
                Some(i) => PathBuf::from(&literal[..i]),
                None => PathBuf::from("."),
            }
        })
        .collect()
}

/// Dot-directories, `target` and `vendor` are not walked.
fn should_skip_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.starts_with('.') || matches!(name, "target" | "vendor"))
}

fn compile_globset(globs: &[&String]) -> ProfResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in globs {
        let glob = Glob::new(pattern)
            .map_err(|e| ProfError::InvalidArgument(format!("invalid glob {pattern:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ProfError::InvalidArgument(format!("invalid glob set: {e}")))
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("proftrack-fsutil-{name}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn find_matching_files_accepts_absolute_file_path() {
        let root = temp_dir("abs-file");
        let profile = root.join("cpu.out");
        std::fs::write(&profile, b"x").expect("write profile");
        let matches =
            find_matching_files(&[profile.to_string_lossy().to_string()]).expect("match files");
        assert!(matches.iter().any(|p| p == &profile));
    }

    #[test]
    fn find_matching_files_expands_absolute_glob() {
        let root = temp_dir("glob");
        for name in ["cpu.out", "memory.out", "notes.txt"] {
            std::fs::write(root.join(name), b"x").expect("write");
        }
        let pattern = format!("{}/*.out", root.display());
        let matches = find_matching_files(&[pattern]).expect("match files");
        assert_eq!(matches.len(), 2, "matches: {matches:?}");
        assert!(matches.iter().all(|p| p.extension().is_some_and(|e| e == "out")));
    }

    #[test]
    fn invalid_glob_is_invalid_argument() {
        match find_matching_files(&["[".to_string()]).expect_err("must fail") {
            ProfError::InvalidArgument(msg) => assert!(msg.contains("invalid glob"), "message: {msg}"),
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[test]
    fn move_file_creates_destination_dirs() {
        let root = temp_dir("move");
        let from = root.join("cpu.out");
        std::fs::write(&from, b"profile").expect("write");
        let to = root.join("bin/BenchmarkX/BenchmarkX_cpu.out");
        move_file(&from, &to).expect("move");
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).expect("read"), b"profile");
    }
}
