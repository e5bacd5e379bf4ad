//! External processes: the `go test` runner, `go tool pprof`, and `benchstat`.
//!
//! Everything the collection pipeline needs from the outside world goes through
//! [`Toolchain`], so tests can substitute a recording stub.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{ProfError, ProfResult, ProfileType};

/// Printed by the runner when the working directory is outside any module.
pub const MODULE_NOT_FOUND_MSG: &str = "go: cannot find main module";

#[derive(Debug, Clone)]
pub struct BenchInvocation<'a> {
    pub benchmark: &'a str,
    pub profiles: &'a [ProfileType],
    pub count: u32,
    pub package_dir: &'a Path,
}

pub trait Toolchain {
    /// Runs one benchmark; returns its combined output on success.
    fn run_benchmark(&self, invocation: &BenchInvocation<'_>) -> ProfResult<Vec<u8>>;

    /// `-cum -edgefraction=0 -nodefraction=0 -top` rendering.
    fn render_top(&self, profile: &Path) -> ProfResult<Vec<u8>>;

    fn render_png(&self, profile: &Path) -> ProfResult<Vec<u8>>;

    /// Line-level listing for functions matching `function`.
    fn render_listing(&self, profile: &Path, function: &str) -> ProfResult<Vec<u8>>;

    fn render_callgrind(&self, profile: &Path) -> ProfResult<Vec<u8>>;

    fn benchstat(&self, base: &Path, current: &Path) -> ProfResult<Vec<u8>>;
}

pub fn benchmark_args(benchmark: &str, profiles: &[ProfileType], count: u32) -> Vec<String> {
    let mut args = vec![
        "test".to_string(),
        "-run=^$".to_string(),
        format!("-bench=^{benchmark}$"),
        "-benchmem".to_string(),
        format!("-count={count}"),
    ];
    args.extend(profiles.iter().map(|p| p.runner_flag()));
    args
}

pub fn pprof_top_args() -> [&'static str; 4] {
    ["-cum", "-edgefraction=0", "-nodefraction=0", "-top"]
}

/// Process-backed toolchain using `go` and `benchstat` from `PATH` unless overridden.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    go: PathBuf,
    benchstat: PathBuf,
}

impl Default for GoToolchain {
    fn default() -> Self {
        Self {
            go: PathBuf::from("go"),
            benchstat: PathBuf::from("benchstat"),
        }
    }
}

impl GoToolchain {
    pub fn with_binaries(go: impl Into<PathBuf>, benchstat: impl Into<PathBuf>) -> Self {
        Self {
            go: go.into(),
            benchstat: benchstat.into(),
        }
    }

    fn pprof(&self, args: &[OsString]) -> ProfResult<Vec<u8>> {
        let mut full = vec![OsString::from("tool"), OsString::from("pprof")];
        full.extend_from_slice(args);
        let output = run(&self.go, &full, None)?;
        if !output.status.success() {
            return Err(ProfError::Runner {
                command: describe(&self.go, &full),
                output: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output.stdout)
    }
}

impl Toolchain for GoToolchain {
    fn run_benchmark(&self, invocation: &BenchInvocation<'_>) -> ProfResult<Vec<u8>> {
        let args = benchmark_args(invocation.benchmark, invocation.profiles, invocation.count)
            .into_iter()
            .map(OsString::from)
            .collect::<Vec<_>>();
        let output = run(&self.go, &args, Some(invocation.package_dir))?;

        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        if output.status.success() {
            return Ok(combined);
        }
        let text = String::from_utf8_lossy(&combined).into_owned();
        if text.contains(MODULE_NOT_FOUND_MSG) {
            return Err(ProfError::Environment(format!(
                "{MODULE_NOT_FOUND_MSG}: run from inside a Go module ({})",
                invocation.package_dir.display()
            )));
        }
        Err(ProfError::Runner {
            command: describe(&self.go, &args),
            output: text,
        })
    }

    fn render_top(&self, profile: &Path) -> ProfResult<Vec<u8>> {
        let mut args = pprof_top_args().map(OsString::from).to_vec();
        args.push(profile.as_os_str().to_owned());
        self.pprof(&args)
    }

    fn render_png(&self, profile: &Path) -> ProfResult<Vec<u8>> {
        self.pprof(&[OsString::from("-png"), profile.as_os_str().to_owned()])
    }

    fn render_listing(&self, profile: &Path, function: &str) -> ProfResult<Vec<u8>> {
        self.pprof(&[
            OsString::from(format!("-list={function}")),
            profile.as_os_str().to_owned(),
        ])
    }

    fn render_callgrind(&self, profile: &Path) -> ProfResult<Vec<u8>> {
        self.pprof(&[OsString::from("-callgrind"), profile.as_os_str().to_owned()])
    }

    fn benchstat(&self, base: &Path, current: &Path) -> ProfResult<Vec<u8>> {
        let args = [base.as_os_str().to_owned(), current.as_os_str().to_owned()];
        let output = run(&self.benchstat, &args, None)?;
        let mut combined = output.stdout;
        combined.extend_from_slice(&output.stderr);
        if !output.status.success() {
            return Err(ProfError::Runner {
                command: describe(&self.benchstat, &args),
                output: String::from_utf8_lossy(&combined).into_owned(),
            });
        }
        Ok(combined)
    }
}

fn run(program: &Path, args: &[OsString], cwd: Option<&Path>) -> ProfResult<std::process::Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    tracing::debug!("running {}", describe(program, args));
    cmd.output().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            ProfError::Environment(format!(
                "{} not found on PATH (or working directory {} is missing)",
                program.display(),
                cwd.map(|d| d.display().to_string())
                    .unwrap_or_else(|| ".".to_string())
            ))
        } else {
            ProfError::Io(err)
        }
    })
}

fn describe(program: &Path, args: &[OsString]) -> String {
    let mut out = program.display().to_string();
    for a in args {
        out.push(' ');
        out.push_str(&a.to_string_lossy());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benchmark_args_select_one_benchmark_and_profiles() {
        let args = benchmark_args("BenchmarkPool", &[ProfileType::Cpu, ProfileType::Mutex], 3);
        assert_eq!(
            args,
            vec![
                "test",
                "-run=^$",
                "-bench=^BenchmarkPool$",
                "-benchmem",
                "-count=3",
                "-cpuprofile=cpu.out",
                "-mutexprofile=mutex.out",
            ]
        );
    }

    #[test]
    fn missing_binary_is_environment_error() {
        let missing = std::env::temp_dir().join(format!("proftrack-no-go-{}", uuid::Uuid::new_v4()));
        let toolchain = GoToolchain::with_binaries(&missing, &missing);
        match toolchain.render_top(Path::new("cpu.out")).expect_err("must fail") {
            ProfError::Environment(msg) => {
                assert!(msg.contains("not found on PATH"), "message: {msg}")
            }
            other => panic!("expected environment error, got {other:?}"),
        }
    }

    #[test]
    fn describe_joins_program_and_args() {
        assert_eq!(
            describe(Path::new("go"), &[OsString::from("tool"), OsString::from("pprof")]),
            "go tool pprof"
        );
    }
}
