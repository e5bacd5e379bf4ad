//! Change tracking commands (`proftrack track ...`).

use clap::{Args, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use std::path::{Path, PathBuf};

use crate::{
    ChangeReport, Config, CostTable, DetectOptions, FunctionFilter, GateDecision, ProfError,
    ProfResult, ProfileType, ReportFormat, Settings, detect_changes, evaluate, render_report,
};

/// Exit code for a failed regression gate with `--fail-on-regression`.
pub const GATE_FAILURE_EXIT_CODE: u8 = 2;

#[derive(Debug, Subcommand)]
pub enum TrackCommand {
    /// Compare a benchmark's raw profile between two collected tags.
    Auto {
        #[arg(long)]
        base_tag: String,
        #[arg(long)]
        current_tag: String,
        #[arg(long)]
        bench: String,
        #[arg(long, default_value = "cpu")]
        profile_type: ProfileType,
        #[command(flatten)]
        output: TrackOutputArgs,
    },
    /// Compare two profile files directly.
    Manual {
        #[arg(long)]
        base: PathBuf,
        #[arg(long)]
        current: PathBuf,
        #[arg(long, default_value = "cpu")]
        profile_type: ProfileType,
        #[command(flatten)]
        output: TrackOutputArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct TrackOutputArgs {
    #[arg(long, default_value = "summary")]
    pub format: ReportFormat,
    /// Directory for html/json reports (default: current directory).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
    /// Exit with code 2 when the regression gate fails.
    #[arg(long)]
    pub fail_on_regression: bool,
    /// Max flat regression (%) used when the config sets none.
    #[arg(long)]
    pub regression_threshold: Option<f64>,
    /// List functions that only exist in the current profile.
    #[arg(long)]
    pub show_new: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrackOutcome {
    #[serde(rename = "schemaVersion")]
    pub schema_version: &'static str,
    pub format: ReportFormat,
    /// Rendered report for stdout formats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "writtenTo", skip_serializing_if = "Option::is_none")]
    pub written_to: Option<PathBuf>,
    pub gate: GateDecision,
    #[serde(rename = "failOnRegression")]
    pub fail_on_regression: bool,
}

impl TrackOutcome {
    pub fn exit_code(&self) -> u8 {
        if self.fail_on_regression && !self.gate.passed() {
            GATE_FAILURE_EXIT_CODE
        } else {
            0
        }
    }
}

pub fn track_command(
    config: &Config,
    settings: &Settings,
    command: &TrackCommand,
) -> ProfResult<TrackOutcome> {
    match command {
        TrackCommand::Auto {
            base_tag,
            current_tag,
            bench,
            profile_type,
            output,
        } => {
            let layout = settings.layout();
            let base = existing_profile(
                &layout.paths_for(base_tag, bench, *profile_type).raw_profile,
                base_tag,
            )?;
            let current = existing_profile(
                &layout.paths_for(current_tag, bench, *profile_type).raw_profile,
                current_tag,
            )?;
            track_files(config, settings, bench, &base, &current, *profile_type, output)
        }
        TrackCommand::Manual {
            base,
            current,
            profile_type,
            output,
        } => {
            for path in [base, current] {
                if !path.is_file() {
                    return Err(ProfError::InvalidArgument(format!(
                        "profile file {} does not exist",
                        path.display()
                    )));
                }
            }
            let key = current
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            track_files(config, settings, &key, base, current, *profile_type, output)
        }
    }
}

fn existing_profile(path: &Path, tag: &str) -> ProfResult<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    Err(ProfError::InvalidArgument(format!(
        "tag {tag:?} has no profile at {}; collect it first",
        path.display()
    )))
}

/// `key` selects the function filter and the CI policy.
fn track_files(
    config: &Config,
    settings: &Settings,
    key: &str,
    base: &Path,
    current: &Path,
    profile_type: ProfileType,
    output: &TrackOutputArgs,
) -> ProfResult<TrackOutcome> {
    let filter = config.filter_for(key);
    let baseline = load_filtered(base, &filter)?;
    let latest = load_filtered(current, &filter)?;
    let report = detect_changes(
        &baseline,
        &latest,
        profile_type,
        OffsetDateTime::now_utc(),
        DetectOptions {
            track_new_functions: output.show_new,
        },
    );
    finish(config, settings, key, &report, output)
}

fn load_filtered(path: &Path, filter: &FunctionFilter) -> ProfResult<CostTable> {
    Ok(filter.apply(&CostTable::decode_file(path)?))
}

fn finish(
    config: &Config,
    settings: &Settings,
    key: &str,
    report: &ChangeReport,
    output: &TrackOutputArgs,
) -> ProfResult<TrackOutcome> {
    let rendered = render_report(report, output.format)?;
    let dir = output
        .output_dir
        .clone()
        .unwrap_or_else(|| settings.working_dir.clone());
    let written_to = rendered.write_to(&dir)?;
    if let Some(path) = &written_to {
        tracing::info!(format = %output.format, path = %path.display(), "report written");
    }

    let policy = config.ci_policy_for(key);
    let gate = evaluate(report, policy.as_ref(), output.regression_threshold);
    Ok(TrackOutcome {
        schema_version: "proftrack.track.v1",
        format: output.format,
        content: written_to.is_none().then_some(rendered.content),
        written_to,
        gate,
        fail_on_regression: output.fail_on_regression,
    })
}
