//! Collection commands (`proftrack collect ...`).

use clap::Subcommand;

use crate::{
    CollectRequest, Config, Pipeline, ProfError, ProfResult, ProfileType, Settings, Toolchain,
    find_matching_files,
};

#[derive(Debug, Subcommand)]
pub enum CollectCommand {
    /// Run benchmarks with profiling enabled and store every artifact under a tag.
    Auto {
        /// Comma-separated benchmark names, e.g. BenchmarkPool,BenchmarkMap.
        #[arg(long, value_delimiter = ',', required = true)]
        benchmarks: Vec<String>,
        #[arg(long, value_delimiter = ',', default_value = "cpu")]
        profiles: Vec<ProfileType>,
        #[arg(long)]
        tag: String,
        #[arg(long, default_value_t = 1)]
        count: u32,
        /// Also write the filtered cost table grouped by package.
        #[arg(long)]
        group_by_package: bool,
    },
    /// Render existing profile files under a tag.
    Manual {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        group_by_package: bool,
        /// Profile files or glob patterns.
        #[arg(value_name = "FILES", required = true)]
        files: Vec<String>,
    },
}

pub fn collect_command<T: Toolchain>(
    config: &Config,
    settings: &Settings,
    toolchain: &T,
    command: &CollectCommand,
) -> ProfResult<serde_json::Value> {
    let layout = settings.layout();
    match command {
        CollectCommand::Auto {
            benchmarks,
            profiles,
            tag,
            count,
            group_by_package,
        } => {
            let module_root = settings.require_module_root()?;
            let request = CollectRequest {
                tag: tag.clone(),
                benchmarks: benchmarks.clone(),
                profiles: profiles.clone(),
                count: *count,
                group_by_package: *group_by_package,
            };
            let report = Pipeline::new(&layout, config, toolchain, module_root).collect(request)?;
            Ok(serde_json::json!({
                "schemaVersion": "proftrack.collect_auto.v1",
                "report": serde_json::to_value(report)?,
            }))
        }
        CollectCommand::Manual {
            tag,
            group_by_package,
            files,
        } => {
            let resolved = find_matching_files(files)?;
            if resolved.is_empty() {
                return Err(ProfError::InvalidArgument(format!(
                    "no profile files match {}",
                    files.join(", ")
                )));
            }
            let module_root = settings
                .module_root
                .clone()
                .unwrap_or_else(|| settings.working_dir.clone());
            let report = Pipeline::new(&layout, config, toolchain, &module_root).collect_manual(
                tag,
                &resolved,
                *group_by_package,
            )?;
            Ok(serde_json::json!({
                "schemaVersion": "proftrack.collect_manual.v1",
                "report": serde_json::to_value(report)?,
            }))
        }
    }
}

