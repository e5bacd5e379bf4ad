//! External tool helpers (`proftrack tools ...`).

use clap::Subcommand;

use crate::{
    ProfResult, ProfileType, Settings, Toolchain, export_callgrind, normalize_profile_types,
    run_benchstat, validate_tag,
};

#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// Compare captured benchmark output of two tags with benchstat.
    Benchstat {
        #[arg(long)]
        base_tag: String,
        #[arg(long)]
        current_tag: String,
        #[arg(long)]
        bench: String,
    },
    /// Export raw profiles of a tag as callgrind files.
    Callgrind {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        bench: String,
        #[arg(long, value_delimiter = ',', default_value = "cpu")]
        profiles: Vec<ProfileType>,
    },
}

pub fn tools_command<T: Toolchain>(
    settings: &Settings,
    toolchain: &T,
    command: &ToolsCommand,
) -> ProfResult<serde_json::Value> {
    let layout = settings.layout();
    match command {
        ToolsCommand::Benchstat {
            base_tag,
            current_tag,
            bench,
        } => {
            validate_tag(base_tag)?;
            validate_tag(current_tag)?;
            let result = run_benchstat(&layout, toolchain, base_tag, current_tag, bench)?;
            Ok(serde_json::json!({
                "schemaVersion": "proftrack.tools_benchstat.v1",
                "result": serde_json::to_value(result)?,
            }))
        }
        ToolsCommand::Callgrind {
            tag,
            bench,
            profiles,
        } => {
            validate_tag(tag)?;
            let profiles = normalize_profile_types(profiles)?;
            let exports = export_callgrind(&layout, toolchain, tag, bench, &profiles)?;
            Ok(serde_json::json!({
                "schemaVersion": "proftrack.tools_callgrind.v1",
                "exports": serde_json::to_value(exports)?,
            }))
        }
    }
}
