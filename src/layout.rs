//! On-disk layout keyed by tag / benchmark / profile type.
//!
//! ```text
//! <root>/<tag>/bin/<bench>/<bench>_<ptype>.out
//! <root>/<tag>/text/<bench>/<bench>.txt
//! <root>/<tag>/text/<bench>/<bench>_<ptype>.txt
//! <root>/<tag>/<ptype>_functions/<bench>/<fn>.txt
//! <root>/<tag>/description.txt
//! <root>/tools/{benchstat,qcachegrind}/...
//! ```

use std::path::{Path, PathBuf};

use crate::{IoContext, ProfError, ProfResult, ProfileType};

pub const DEFAULT_OUTPUT_ROOT: &str = "bench";
pub const MODULE_MARKER: &str = "go.mod";
pub const DESCRIPTION_FILE: &str = "description.txt";
pub const DESCRIPTION_TEMPLATE: &str = "The explanation for this profilling session goes here";

const BIN_DIR: &str = "bin";
const TEXT_DIR: &str = "text";
const TOOLS_DIR: &str = "tools";
const FUNCTIONS_SUFFIX: &str = "_functions";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePaths {
    pub raw_profile: PathBuf,
    pub rendered_table: PathBuf,
    pub grouped_table: PathBuf,
    pub functions_dir: PathBuf,
    pub graph_png: PathBuf,
}

impl ProfilePaths {
    pub fn function_listing(&self, function: &str) -> PathBuf {
        self.functions_dir.join(format!("{}.txt", listing_file_stem(function)))
    }
}

/// Per-file outputs of the manual collector: `<tag>/<name>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualPaths {
    pub dir: PathBuf,
    pub rendered_table: PathBuf,
    pub grouped_table: PathBuf,
    pub functions_dir: PathBuf,
}

impl ManualPaths {
    pub fn function_listing(&self, function: &str) -> PathBuf {
        self.functions_dir.join(format!("{}.txt", listing_file_stem(function)))
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn tag_dir(&self, tag: &str) -> PathBuf {
        self.root.join(tag)
    }

    pub fn bin_dir(&self, tag: &str, bench: &str) -> PathBuf {
        self.tag_dir(tag).join(BIN_DIR).join(bench)
    }

    pub fn text_dir(&self, tag: &str, bench: &str) -> PathBuf {
        self.tag_dir(tag).join(TEXT_DIR).join(bench)
    }

    /// Captured runner stdout+stderr.
    pub fn benchmark_output(&self, tag: &str, bench: &str) -> PathBuf {
        self.text_dir(tag, bench).join(format!("{bench}.txt"))
    }

    pub fn paths_for(&self, tag: &str, bench: &str, ptype: ProfileType) -> ProfilePaths {
        let text_dir = self.text_dir(tag, bench);
        let functions_dir = self
            .tag_dir(tag)
            .join(format!("{ptype}{FUNCTIONS_SUFFIX}"))
            .join(bench);
        ProfilePaths {
            raw_profile: self.bin_dir(tag, bench).join(format!("{bench}_{ptype}.out")),
            rendered_table: text_dir.join(format!("{bench}_{ptype}.txt")),
            grouped_table: text_dir.join(format!("{bench}_{ptype}_grouped.txt")),
            graph_png: functions_dir.join(format!("{bench}_{ptype}.png")),
            functions_dir,
        }
    }

    pub fn manual_paths(&self, tag: &str, name: &str) -> ManualPaths {
        let dir = self.tag_dir(tag).join(name);
        ManualPaths {
            rendered_table: dir.join(format!("{name}.txt")),
            grouped_table: dir.join(format!("{name}_grouped.txt")),
            functions_dir: dir.join("functions"),
            dir,
        }
    }

    pub fn benchstat_results(&self, bench: &str) -> PathBuf {
        self.root
            .join(TOOLS_DIR)
            .join("benchstat")
            .join(format!("{bench}_results.txt"))
    }

    pub fn callgrind_output(&self, bench: &str, ptype: ProfileType) -> PathBuf {
        self.root
            .join(TOOLS_DIR)
            .join("qcachegrind")
            .join(format!("{bench}_{ptype}.callgrind"))
    }

    /// Wipes any previous contents of the tag and lays down an empty skeleton.
    ///
    /// The skeleton is assembled in a staging directory next to the tag and swapped in at the
    /// end; a failure at any point leaves no staging debris behind.
    pub fn prepare_tag(
        &self,
        tag: &str,
        benchmarks: &[String],
        profiles: &[ProfileType],
    ) -> ProfResult<PathBuf> {
        validate_tag(tag)?;
        std::fs::create_dir_all(&self.root).with_path("create", &self.root)?;

        let staging = StagingDir::create(
            self.root
                .join(format!(".{tag}.staging-{}", uuid::Uuid::new_v4())),
        )?;
        for rel in skeleton_dirs(benchmarks, profiles) {
            let dir = staging.path().join(rel);
            std::fs::create_dir_all(&dir).with_path("create", &dir)?;
        }
        let description = staging.path().join(DESCRIPTION_FILE);
        std::fs::write(&description, DESCRIPTION_TEMPLATE).with_path("write", &description)?;

        let tag_dir = self.tag_dir(tag);
        match std::fs::remove_dir_all(&tag_dir) {
            Ok(()) => tracing::info!("cleaned existing tag directory {}", tag_dir.display()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err).with_path("remove", &tag_dir),
        }
        staging.commit(&tag_dir)?;
        Ok(tag_dir)
    }

    /// Tag directories under the root, sorted; `tools` and hidden entries are skipped.
    pub fn discover_tags(&self) -> ProfResult<Vec<String>> {
        Ok(list_dirs(&self.root)?
            .into_iter()
            .filter(|name| name != TOOLS_DIR)
            .collect())
    }

    pub fn discover_benchmarks(&self, tag: &str) -> ProfResult<Vec<String>> {
        list_dirs(&self.tag_dir(tag).join(BIN_DIR))
    }

    pub fn discover_profile_types(&self, tag: &str, bench: &str) -> Vec<ProfileType> {
        ProfileType::ALL
            .into_iter()
            .filter(|p| self.paths_for(tag, bench, *p).raw_profile.is_file())
            .collect()
    }
}

pub fn validate_tag(tag: &str) -> ProfResult<()> {
    if tag.trim().is_empty() {
        return Err(ProfError::InvalidArgument("tag is empty".to_string()));
    }
    if tag.contains(['/', '\\']) || tag.starts_with('.') || tag == TOOLS_DIR {
        return Err(ProfError::InvalidArgument(format!(
            "tag {tag:?} must be a plain directory name (no separators, no leading dot, not {TOOLS_DIR:?})"
        )));
    }
    Ok(())
}

/// Nearest ancestor of `start` (inclusive) holding `go.mod`.
pub fn locate_module_root(start: &Path) -> ProfResult<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(MODULE_MARKER).is_file())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            ProfError::Environment(format!(
                "{MODULE_MARKER} not found in {} or any parent directory",
                start.display()
            ))
        })
}

/// Tag-relative directories every collection run starts from.
fn skeleton_dirs(benchmarks: &[String], profiles: &[ProfileType]) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for bench in benchmarks {
        out.push(Path::new(BIN_DIR).join(bench));
        out.push(Path::new(TEXT_DIR).join(bench));
        for ptype in profiles {
            out.push(PathBuf::from(format!("{ptype}{FUNCTIONS_SUFFIX}")).join(bench));
        }
    }
    out
}

/// Function names may carry path separators or receiver syntax; keep file names flat.
pub fn listing_file_stem(function: &str) -> String {
    function
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

fn list_dirs(dir: &Path) -> ProfResult<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err).with_path("list", dir),
    };
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.with_path("list", dir)?;
        if !entry.file_type().with_path("stat", &entry.path())?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with('.') {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

/// A directory that is removed on drop unless committed.
struct StagingDir {
    path: PathBuf,
    committed: bool,
}

impl StagingDir {
    fn create(path: PathBuf) -> ProfResult<Self> {
        std::fs::create_dir_all(&path).with_path("create", &path)?;
        Ok(Self {
            path,
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self, dest: &Path) -> ProfResult<()> {
        std::fs::rename(&self.path, dest).with_path("rename", dest)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            tracing::debug!("failed to remove staging dir {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "proftrack-layout-{name}-{}",
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    fn benches() -> Vec<String> {
        vec!["BenchmarkPool".to_string(), "BenchmarkMap".to_string()]
    }

    #[test]
    fn paths_follow_layout() {
        let layout = Layout::new("bench");
        let p = layout.paths_for("v1", "BenchmarkPool", ProfileType::Cpu);
        assert_eq!(p.raw_profile, Path::new("bench/v1/bin/BenchmarkPool/BenchmarkPool_cpu.out"));
        assert_eq!(
            p.rendered_table,
            Path::new("bench/v1/text/BenchmarkPool/BenchmarkPool_cpu.txt")
        );
        assert_eq!(p.functions_dir, Path::new("bench/v1/cpu_functions/BenchmarkPool"));
        assert_eq!(
            p.function_listing("Get"),
            Path::new("bench/v1/cpu_functions/BenchmarkPool/Get.txt")
        );
        assert_eq!(
            layout.benchmark_output("v1", "BenchmarkPool"),
            Path::new("bench/v1/text/BenchmarkPool/BenchmarkPool.txt")
        );
    }

    #[test]
    fn prepare_tag_builds_skeleton() {
        let root = temp_root("skeleton");
        let layout = Layout::new(&root);
        let tag_dir = layout
            .prepare_tag("v1", &benches(), &[ProfileType::Cpu, ProfileType::Memory])
            .expect("prepare");
        assert!(tag_dir.join("bin/BenchmarkPool").is_dir());
        assert!(tag_dir.join("text/BenchmarkMap").is_dir());
        assert!(tag_dir.join("memory_functions/BenchmarkMap").is_dir());
        assert_eq!(
            std::fs::read_to_string(tag_dir.join(DESCRIPTION_FILE)).expect("description"),
            DESCRIPTION_TEMPLATE
        );
        assert_eq!(
            layout.discover_benchmarks("v1").expect("benches"),
            vec!["BenchmarkMap".to_string(), "BenchmarkPool".to_string()]
        );
        assert!(layout.discover_profile_types("v1", "BenchmarkPool").is_empty());
    }

    #[test]
    fn prepare_tag_wipes_previous_contents() {
        let root = temp_root("wipe");
        let layout = Layout::new(&root);
        layout
            .prepare_tag("v1", &benches(), &[ProfileType::Cpu])
            .expect("first");
        let stale = layout.paths_for("v1", "BenchmarkPool", ProfileType::Cpu).raw_profile;
        std::fs::write(&stale, b"stale").expect("stale");
        std::fs::write(layout.tag_dir("v1").join("notes.md"), b"x").expect("notes");

        layout
            .prepare_tag("v1", &["BenchmarkPool".to_string()], &[ProfileType::Cpu])
            .expect("second");
        assert!(!stale.exists());
        assert!(!layout.tag_dir("v1").join("notes.md").exists());
        assert!(!layout.tag_dir("v1").join("bin/BenchmarkMap").exists());
        assert_eq!(layout.discover_tags().expect("tags"), vec!["v1".to_string()]);
    }

    #[test]
    fn discovery_tolerates_missing_directories() {
        let layout = Layout::new(temp_root("missing").join("nothing-here"));
        assert!(layout.discover_tags().expect("tags").is_empty());
        assert!(layout.discover_benchmarks("v9").expect("benches").is_empty());
        assert!(layout.discover_profile_types("v9", "BenchmarkX").is_empty());
    }

    #[test]
    fn discovery_lists_collected_profile_types() {
        let root = temp_root("ptypes");
        let layout = Layout::new(&root);
        layout
            .prepare_tag("v1", &benches(), &ProfileType::ALL)
            .expect("prepare");
        for p in [ProfileType::Block, ProfileType::Cpu] {
            std::fs::write(layout.paths_for("v1", "BenchmarkMap", p).raw_profile, b"x").expect("write");
        }
        std::fs::create_dir_all(root.join("tools/benchstat")).expect("tools");
        assert_eq!(
            layout.discover_profile_types("v1", "BenchmarkMap"),
            vec![ProfileType::Cpu, ProfileType::Block]
        );
        assert_eq!(layout.discover_tags().expect("tags"), vec!["v1".to_string()]);
    }

    #[test]
    fn invalid_tags_are_rejected() {
        let layout = Layout::new(temp_root("badtag"));
        for tag in ["", "a/b", "..", ".hidden", "tools"] {
            match layout.prepare_tag(tag, &[], &[]).expect_err("must fail") {
                ProfError::InvalidArgument(_) => {}
                other => panic!("expected invalid argument for {tag:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn staging_dir_is_removed_when_not_committed() {
        let root = temp_root("staging");
        let path = root.join(".x.staging");
        {
            let staging = StagingDir::create(path.clone()).expect("create");
            std::fs::write(staging.path().join("f"), b"x").expect("write");
        }
        assert!(!path.exists());
    }

    #[test]
    fn module_root_is_nearest_ancestor_with_marker() {
        let root = temp_root("module");
        std::fs::write(root.join(MODULE_MARKER), "module example.com/x\n").expect("go.mod");
        let nested = root.join("pkg/inner");
        std::fs::create_dir_all(&nested).expect("nested");
        assert_eq!(locate_module_root(&nested).expect("root"), root);

        let orphan = temp_root("orphan");
        // The temp dir itself may sit under a module on some hosts; only assert the error shape.
        if let Err(err) = locate_module_root(&orphan) {
            assert!(matches!(err, ProfError::Environment(_)), "got {err:?}");
        }
    }

    #[test]
    fn listing_stems_are_flat() {
        assert_eq!(listing_file_stem("Get"), "Get");
        assert_eq!(listing_file_stem("a/b.(*T).M"), "a_b.(_T).M");
    }
}
