//! The closed set of profile types the runner can emit.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::{ProfError, ProfResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    Cpu,
    Memory,
    Mutex,
    Block,
}

impl ProfileType {
    pub const ALL: [ProfileType; 4] = [Self::Cpu, Self::Memory, Self::Mutex, Self::Block];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Mutex => "mutex",
            Self::Block => "block",
        }
    }

    /// File the runner drops in the package directory, e.g. `cpu.out`.
    pub fn artifact_name(self) -> String {
        format!("{}.out", self.as_str())
    }

    pub fn runner_flag(self) -> String {
        let flag = match self {
            Self::Cpu => "cpuprofile",
            Self::Memory => "memprofile",
            Self::Mutex => "mutexprofile",
            Self::Block => "blockprofile",
        };
        format!("-{flag}={}", self.artifact_name())
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = ProfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "cpu" => Ok(Self::Cpu),
            "memory" => Ok(Self::Memory),
            "mutex" => Ok(Self::Mutex),
            "block" => Ok(Self::Block),
            other => Err(ProfError::InvalidArgument(format!(
                "unknown profile type {other:?} (expected cpu, memory, mutex or block)"
            ))),
        }
    }
}

impl clap::ValueEnum for ProfileType {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

/// Rejects an empty list and drops repeats, keeping first occurrence.
pub fn normalize_profile_types(profiles: &[ProfileType]) -> ProfResult<Vec<ProfileType>> {
    if profiles.is_empty() {
        return Err(ProfError::InvalidArgument(
            "profile list is empty".to_string(),
        ));
    }
    let mut out = Vec::with_capacity(profiles.len());
    for p in profiles {
        if !out.contains(p) {
            out.push(*p);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runner_flags_match_artifact_names() {
        assert_eq!(ProfileType::Cpu.runner_flag(), "-cpuprofile=cpu.out");
        assert_eq!(ProfileType::Memory.runner_flag(), "-memprofile=memory.out");
        assert_eq!(ProfileType::Mutex.runner_flag(), "-mutexprofile=mutex.out");
        assert_eq!(ProfileType::Block.runner_flag(), "-blockprofile=block.out");
    }

    #[test]
    fn parse_rejects_unknown_type() {
        assert_eq!("memory".parse::<ProfileType>().expect("parse"), ProfileType::Memory);
        match "heap".parse::<ProfileType>().expect_err("must fail") {
            ProfError::InvalidArgument(msg) => assert!(msg.contains("heap"), "message: {msg}"),
            other => panic!("expected invalid argument, got {other:?}"),
        }
    }

    #[test]
    fn normalize_dedups_and_rejects_empty() {
        let out = normalize_profile_types(&[
            ProfileType::Memory,
            ProfileType::Cpu,
            ProfileType::Memory,
        ])
        .expect("normalize");
        assert_eq!(out, vec![ProfileType::Memory, ProfileType::Cpu]);
        assert!(normalize_profile_types(&[]).is_err());
    }
}
