//! Read-only discovery commands (`proftrack inspect ...`).

use clap::Subcommand;
use serde_json::json;

use crate::{ProfResult, Settings, scan_benchmarks};

#[derive(Debug, Subcommand)]
pub enum InspectCommand {
    /// Benchmark functions declared in the module's test files.
    Benchmarks,
    /// Tags collected under the output root.
    Tags,
    /// Profile types collected for each benchmark of a tag.
    Profiles {
        #[arg(long)]
        tag: String,
        #[arg(long)]
        bench: Option<String>,
    },
    /// Validate and print the effective configuration.
    Config,
}

pub fn inspect_command(settings: &Settings, command: &InspectCommand) -> ProfResult<serde_json::Value> {
    let layout = settings.layout();
    match command {
        InspectCommand::Benchmarks => {
            let module_root = settings.require_module_root()?;
            Ok(json!({
                "schemaVersion": "proftrack.inspect_benchmarks.v1",
                "moduleRoot": module_root.display().to_string(),
                "benchmarks": scan_benchmarks(module_root)?,
            }))
        }
        InspectCommand::Tags => Ok(json!({
            "schemaVersion": "proftrack.inspect_tags.v1",
            "outputRoot": layout.root().display().to_string(),
            "tags": layout.discover_tags()?,
        })),
        InspectCommand::Profiles { tag, bench } => {
            let benches = match bench {
                Some(b) => vec![b.clone()],
                None => layout.discover_benchmarks(tag)?,
            };
            let mut entries = Vec::with_capacity(benches.len());
            for b in benches {
                let profiles = layout.discover_profile_types(tag, &b);
                entries.push(json!({ "benchmark": b, "profiles": profiles }));
            }
            Ok(json!({
                "schemaVersion": "proftrack.inspect_profiles.v1",
                "tag": tag,
                "benchmarks": entries,
            }))
        }
        InspectCommand::Config => {
            let config = settings.load_config()?;
            Ok(json!({
                "schemaVersion": "proftrack.inspect_config.v1",
                "path": settings.config_path.display().to_string(),
                "exists": settings.config_path.is_file(),
                "config": serde_json::to_value(config)?,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProfError, ProfileType};

    fn settings(name: &str) -> Settings {
        let root = std::env::temp_dir().join(format!("proftrack-inspect-{name}-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).expect("mkdir");
        Settings {
            output_root: root.join("bench"),
            config_path: root.join(crate::CONFIG_FILENAME),
            module_root: None,
            working_dir: root,
        }
    }

    #[test]
    fn profiles_lists_collected_types_per_benchmark() {
        let settings = settings("profiles");
        let layout = settings.layout();
        layout
            .prepare_tag("v1", &["BenchmarkPool".to_string()], &[ProfileType::Cpu])
            .expect("prepare");
        std::fs::write(
            layout.paths_for("v1", "BenchmarkPool", ProfileType::Cpu).raw_profile,
            b"x",
        )
        .expect("profile");

        let out = inspect_command(&settings, &InspectCommand::Profiles { tag: "v1".to_string(), bench: None })
            .expect("inspect");
        assert_eq!(out["benchmarks"][0]["benchmark"], "BenchmarkPool");
        assert_eq!(out["benchmarks"][0]["profiles"], json!(["cpu"]));

        let tags = inspect_command(&settings, &InspectCommand::Tags).expect("tags");
        assert_eq!(tags["tags"], json!(["v1"]));
    }

    #[test]
    fn benchmarks_need_a_module() {
        let settings = settings("nomodule");
        assert!(matches!(
            inspect_command(&settings, &InspectCommand::Benchmarks),
            Err(ProfError::Environment(_))
        ));
    }

    #[test]
    fn config_reports_parse_errors() {
        let settings = settings("config");
        let out = inspect_command(&settings, &InspectCommand::Config).expect("missing config is fine");
        assert_eq!(out["exists"], false);

        std::fs::write(&settings.config_path, "{ nope").expect("write");
        assert!(matches!(
            inspect_command(&settings, &InspectCommand::Config),
            Err(ProfError::Config(_))
        ));
    }
}
