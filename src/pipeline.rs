//! Collection pipelines: the runner-driven `auto` flow and the `manual` flow over existing profiles.

use serde::{Deserialize, Serialize};

use std::path::{Path, PathBuf};

use crate::{
    BenchInvocation, Config, CostTable, FunctionFilter, IoContext, Layout, ProfError, ProfResult,
    ProfileType, Toolchain, distinct_leaf_names, find_benchmark_package_dir, find_newest_file,
    find_test_binaries, group_by_package, listing_targets, move_file, normalize_profile_types,
    parse_text_table, render_grouped, validate_benchmark_name, write_file,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectRequest {
    pub tag: String,
    pub benchmarks: Vec<String>,
    pub profiles: Vec<ProfileType>,
    pub count: u32,
    pub group_by_package: bool,
}

impl CollectRequest {
    pub fn new(tag: impl Into<String>, benchmarks: Vec<String>, profiles: Vec<ProfileType>) -> Self {
        Self {
            tag: tag.into(),
            benchmarks,
            profiles,
            count: 1,
            group_by_package: false,
        }
    }

    /// Checks names and counts, de-duplicating benchmarks and profile types in first-seen order.
    pub fn validate(mut self) -> ProfResult<Self> {
        crate::validate_tag(&self.tag)?;
        if self.benchmarks.is_empty() {
            return Err(ProfError::InvalidArgument(
                "at least one benchmark is required".to_string(),
            ));
        }
        let mut benchmarks = Vec::<String>::with_capacity(self.benchmarks.len());
        for name in self.benchmarks {
            validate_benchmark_name(&name)?;
            if !benchmarks.contains(&name) {
                benchmarks.push(name);
            }
        }
        self.benchmarks = benchmarks;
        self.profiles = normalize_profile_types(&self.profiles)?;
        if self.count == 0 {
            return Err(ProfError::InvalidArgument(
                "count must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectReport {
    pub tag: String,
    pub tag_dir: PathBuf,
    pub benchmarks: Vec<BenchmarkOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkOutcome {
    pub benchmark: String,
    pub package_dir: PathBuf,
    pub output: PathBuf,
    pub binaries: Vec<PathBuf>,
    pub profiles: Vec<ProfileOutcome>,
    /// Requested types the runner did not produce.
    pub skipped: Vec<ProfileType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileOutcome {
    pub profile_type: ProfileType,
    pub raw_profile: PathBuf,
    pub rendered_table: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped_table: Option<PathBuf>,
    pub graph_png: PathBuf,
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualReport {
    pub tag: String,
    pub tag_dir: PathBuf,
    pub files: Vec<ManualOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualOutcome {
    pub source: PathBuf,
    pub name: String,
    pub rendered_table: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grouped_table: Option<PathBuf>,
    pub functions: Vec<String>,
}

/// Drives the toolchain for one module and writes everything under one [`Layout`].
///
/// Benchmarks run strictly one after another: the runner drops its profiles under fixed
/// names in the package directory, so concurrent runs would overwrite each other.
pub struct Pipeline<'a, T: Toolchain> {
    layout: &'a Layout,
    config: &'a Config,
    toolchain: &'a T,
    module_root: &'a Path,
}

impl<'a, T: Toolchain> Pipeline<'a, T> {
    pub fn new(layout: &'a Layout, config: &'a Config, toolchain: &'a T, module_root: &'a Path) -> Self {
        Self {
            layout,
            config,
            toolchain,
            module_root,
        }
    }

    /// Runs every requested benchmark; the first fatal error aborts the whole collection.
    pub fn collect(&self, request: CollectRequest) -> ProfResult<CollectReport> {
        let request = request.validate()?;

        // Resolve every package before the tag is wiped so a typo leaves old results intact.
        let mut packages = Vec::with_capacity(request.benchmarks.len());
        for bench in &request.benchmarks {
            packages.push(find_benchmark_package_dir(self.module_root, bench)?);
        }

        let tag_dir =
            self.layout
                .prepare_tag(&request.tag, &request.benchmarks, &request.profiles)?;

        let mut outcomes = Vec::with_capacity(packages.len());
        for (bench, package_dir) in request.benchmarks.iter().zip(packages) {
            outcomes.push(self.collect_benchmark(&request, bench, package_dir)?);
        }
        Ok(CollectReport {
            tag: request.tag,
            tag_dir,
            benchmarks: outcomes,
        })
    }

    fn collect_benchmark(
        &self,
        request: &CollectRequest,
        bench: &str,
        package_dir: PathBuf,
    ) -> ProfResult<BenchmarkOutcome> {
        let tag = request.tag.as_str();
        tracing::info!(
            benchmark = bench,
            package = %package_dir.display(),
            "running benchmark"
        );
        let output = self.toolchain.run_benchmark(&BenchInvocation {
            benchmark: bench,
            profiles: &request.profiles,
            count: request.count,
            package_dir: &package_dir,
        })?;
        let output_path = self.layout.benchmark_output(tag, bench);
        write_file(&output_path, &output)?;

        let mut present = Vec::new();
        let mut skipped = Vec::new();
        for ptype in &request.profiles {
            let artifact = ptype.artifact_name();
            match find_newest_file(self.module_root, &artifact)? {
                Some(found) => {
                    let dest = self.layout.paths_for(tag, bench, *ptype).raw_profile;
                    move_file(&found, &dest)?;
                    present.push(*ptype);
                }
                None => {
                    let err = ProfError::MissingArtifact(package_dir.join(&artifact));
                    tracing::warn!(benchmark = bench, profile = %ptype, "{err}; skipping");
                    skipped.push(*ptype);
                }
            }
        }

        let bin_dir = self.layout.bin_dir(tag, bench);
        let mut binaries = Vec::new();
        for binary in find_test_binaries(&package_dir)? {
            let Some(file_name) = binary.file_name() else {
                continue;
            };
            let dest = bin_dir.join(format!("{bench}_{}", file_name.to_string_lossy()));
            move_file(&binary, &dest)?;
            binaries.push(dest);
        }

        let filter = self.config.filter_for(bench);
        let mut profiles = Vec::with_capacity(present.len());
        for ptype in present {
            profiles.push(self.process_profile(tag, bench, ptype, &filter, request.group_by_package)?);
        }

        Ok(BenchmarkOutcome {
            benchmark: bench.to_string(),
            package_dir,
            output: output_path,
            binaries,
            profiles,
            skipped,
        })
    }

    fn process_profile(
        &self,
        tag: &str,
        bench: &str,
        ptype: ProfileType,
        filter: &FunctionFilter,
        grouped: bool,
    ) -> ProfResult<ProfileOutcome> {
        let paths = self.layout.paths_for(tag, bench, ptype);

        let top = self.toolchain.render_top(&paths.raw_profile)?;
        write_file(&paths.rendered_table, &top)?;

        let table = filter.apply(&CostTable::decode_file(&paths.raw_profile)?);
        let grouped_table = if grouped {
            let text = render_grouped(&group_by_package(&table), table.total);
            write_file(&paths.grouped_table, text.as_bytes())?;
            Some(paths.grouped_table.clone())
        } else {
            None
        };

        let png = self.toolchain.render_png(&paths.raw_profile)?;
        write_file(&paths.graph_png, &png)?;

        let functions = distinct_leaf_names(table.names());
        for function in &functions {
            let listing = self.toolchain.render_listing(&paths.raw_profile, function)?;
            write_file(&paths.function_listing(function), &listing)?;
        }
        tracing::info!(
            benchmark = bench,
            profile = %ptype,
            functions = functions.len(),
            "profile processed"
        );

        Ok(ProfileOutcome {
            profile_type: ptype,
            raw_profile: paths.raw_profile,
            rendered_table: paths.rendered_table,
            grouped_table,
            graph_png: paths.graph_png,
            functions,
        })
    }

    /// Renders already-captured profiles into `<tag>/<name>/`, keyed by each file's stem.
    ///
    /// Inputs inside the tag being rebuilt are rejected before anything is wiped.
    pub fn collect_manual(
        &self,
        tag: &str,
        files: &[PathBuf],
        grouped: bool,
    ) -> ProfResult<ManualReport> {
        crate::validate_tag(tag)?;
        if files.is_empty() {
            return Err(ProfError::InvalidArgument(
                "no profile files to collect".to_string(),
            ));
        }
        let existing_tag = self.layout.tag_dir(tag).canonicalize().ok();
        let mut named = Vec::with_capacity(files.len());
        for file in files {
            if !file.is_file() {
                return Err(ProfError::InvalidArgument(format!(
                    "profile file {} does not exist",
                    file.display()
                )));
            }
            if let Some(tag_dir) = &existing_tag {
                let source = file.canonicalize().with_path("resolve", file)?;
                if source.starts_with(tag_dir) {
                    return Err(ProfError::InvalidArgument(format!(
                        "profile file {} is inside tag {tag:?}, which this collection rebuilds; collect into another tag",
                        file.display()
                    )));
                }
            }
            let name = file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| {
                    ProfError::InvalidArgument(format!("cannot name output for {}", file.display()))
                })?;
            named.push((file, name));
        }

        let tag_dir = self.layout.prepare_tag(tag, &[], &[])?;
        let mut outcomes = Vec::with_capacity(named.len());
        for (file, name) in named {
            let paths = self.layout.manual_paths(tag, &name);
            let filter = self.config.filter_for(&name);
            tracing::info!(profile = %file.display(), "collecting profile");

            let top = self.toolchain.render_top(file)?;
            write_file(&paths.rendered_table, &top)?;

            let decoded = match CostTable::decode_file(file) {
                Ok(table) => Some(filter.apply(&table)),
                Err(err @ ProfError::Decode { .. }) if !grouped => {
                    tracing::warn!("{err}; taking functions from the rendered table");
                    None
                }
                Err(err) => return Err(err),
            };

            let grouped_table = match &decoded {
                Some(table) if grouped => {
                    let text = render_grouped(&group_by_package(table), table.total);
                    write_file(&paths.grouped_table, text.as_bytes())?;
                    Some(paths.grouped_table.clone())
                }
                _ => None,
            };

            let functions = match &decoded {
                Some(table) => distinct_leaf_names(table.names()),
                None => {
                    let rows =
                        parse_text_table(&String::from_utf8_lossy(&top), &paths.rendered_table)?;
                    listing_targets(&rows, &filter)
                }
            };
            for function in &functions {
                let listing = self.toolchain.render_listing(file, function)?;
                write_file(&paths.function_listing(function), &listing)?;
            }

            outcomes.push(ManualOutcome {
                source: file.clone(),
                name,
                rendered_table: paths.rendered_table,
                grouped_table,
                functions,
            });
        }
        Ok(ManualReport {
            tag: tag.to_string(),
            tag_dir,
            files: outcomes,
        })
    }
}
