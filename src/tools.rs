//! Helper exports: benchstat comparisons and callgrind files for external viewers.

use serde::{Deserialize, Serialize};

use std::path::PathBuf;

use crate::{Layout, ProfError, ProfResult, ProfileType, Toolchain, write_file};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchstatResult {
    pub base: PathBuf,
    pub current: PathBuf,
    pub output: PathBuf,
}

/// Compares the captured runner output of `bench` between two tags.
pub fn run_benchstat<T: Toolchain>(
    layout: &Layout,
    toolchain: &T,
    base_tag: &str,
    current_tag: &str,
    bench: &str,
) -> ProfResult<BenchstatResult> {
    let base = layout.benchmark_output(base_tag, bench);
    let current = layout.benchmark_output(current_tag, bench);
    for path in [&base, &current] {
        if !path.is_file() {
            return Err(ProfError::InvalidArgument(format!(
                "benchmark output {} not found; collect {bench} for both tags first",
                path.display()
            )));
        }
    }
    let out = toolchain.benchstat(&base, &current)?;
    let output = layout.benchstat_results(bench);
    write_file(&output, &out)?;
    tracing::info!(benchmark = bench, output = %output.display(), "benchstat comparison written");
    Ok(BenchstatResult {
        base,
        current,
        output,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallgrindExport {
    pub profile_type: ProfileType,
    pub source: PathBuf,
    pub output: PathBuf,
}

/// Missing raw profiles are skipped with a warning.
pub fn export_callgrind<T: Toolchain>(
    layout: &Layout,
    toolchain: &T,
    tag: &str,
    bench: &str,
    profiles: &[ProfileType],
) -> ProfResult<Vec<CallgrindExport>> {
    let mut out = Vec::new();
    for ptype in profiles {
        let source = layout.paths_for(tag, bench, *ptype).raw_profile;
        if !source.is_file() {
            tracing::warn!("{}; skipping callgrind export", ProfError::MissingArtifact(source));
            continue;
        }
        let bytes = toolchain.render_callgrind(&source)?;
        let output = layout.callgrind_output(bench, *ptype);
        write_file(&output, &bytes)?;
        out.push(CallgrindExport {
            profile_type: *ptype,
            source,
            output,
        });
    }
    Ok(out)
}
