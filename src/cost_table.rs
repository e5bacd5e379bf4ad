//! Per-function cost tables derived from decoded profiles.

use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use crate::{ProfError, ProfResult, Profile, read_profile};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub name: String,
    pub flat: i64,
    pub cum: i64,
    pub flat_pct: f64,
    pub sum_pct: f64,
    pub cum_pct: f64,
}

/// Entries ordered by flat descending, then name ascending. Percentages share `total`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostTable {
    pub total: i64,
    pub entries: Vec<CostEntry>,
}

impl CostTable {
    pub fn decode_file(path: &Path) -> ProfResult<Self> {
        let profile = read_profile(path)?;
        Self::from_profile(&profile, path)
    }

    /// Attributes `value[0]` of each sample: flat to the leaf location's top line,
    /// cum once per distinct function anywhere on the stack.
    pub fn from_profile(profile: &Profile, source: &Path) -> ProfResult<Self> {
        let mut functions = HashMap::with_capacity(profile.functions.len());
        for f in &profile.functions {
            functions.insert(f.id, profile.string_at(f.name, source)?);
        }
        let locations: HashMap<u64, _> = profile.locations.iter().map(|l| (l.id, l)).collect();

        let mut total = 0i64;
        let mut flat = HashMap::<&str, i64>::new();
        let mut cum = HashMap::<&str, i64>::new();
        let mut seen = HashSet::<&str>::new();

        for (idx, sample) in profile.samples.iter().enumerate() {
            let value = *sample
                .values
                .first()
                .ok_or_else(|| ProfError::decode(source, format!("sample {idx} has no values")))?;
            total += value;
            seen.clear();

            for (depth, location_id) in sample.location_ids.iter().enumerate() {
                let location = locations.get(location_id).ok_or_else(|| {
                    ProfError::decode(
                        source,
                        format!("sample {idx} references unknown location {location_id}"),
                    )
                })?;
                for (line_idx, line) in location.lines.iter().enumerate() {
                    if line.function_id == 0 {
                        continue;
                    }
                    let name = *functions.get(&line.function_id).ok_or_else(|| {
                        ProfError::decode(
                            source,
                            format!(
                                "location {} references unknown function {}",
                                location.id, line.function_id
                            ),
                        )
                    })?;
                    if depth == 0 && line_idx == 0 {
                        *flat.entry(name).or_default() += value;
                    }
                    if seen.insert(name) {
                        *cum.entry(name).or_default() += value;
                    }
                }
            }
        }

        Ok(Self::from_sums(total, &flat, &cum))
    }

    /// Builds a sorted table from per-function sums. Zero/zero functions are dropped.
    pub fn from_sums<S: AsRef<str>>(
        total: i64,
        flat: &HashMap<S, i64>,
        cum: &HashMap<S, i64>,
    ) -> Self {
        let mut sums = BTreeMap::<&str, (i64, i64)>::new();
        for (name, v) in flat {
            sums.entry(name.as_ref()).or_default().0 = *v;
        }
        for (name, v) in cum {
            sums.entry(name.as_ref()).or_default().1 = *v;
        }

        let mut entries = sums
            .into_iter()
            .filter(|(_, (f, c))| *f != 0 || *c != 0)
            .map(|(name, (f, c))| CostEntry {
                name: name.to_string(),
                flat: f,
                cum: c,
                flat_pct: percent(f, total),
                sum_pct: 0.0,
                cum_pct: percent(c, total),
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.flat.cmp(&a.flat).then_with(|| a.name.cmp(&b.name)));

        let mut running = 0.0;
        for e in &mut entries {
            running += e.flat_pct;
            e.sum_pct = running;
        }

        Self { total, entries }
    }

    pub fn get(&self, name: &str) -> Option<&CostEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn percent(value: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 / total as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageGroup {
    pub name: String,
    pub flat: i64,
    pub cum: i64,
    pub flat_pct: f64,
    pub cum_pct: f64,
    pub functions: Vec<CostEntry>,
}

/// `github.com/acme/pool.(*Pool).Get` -> `github.com/acme/pool`.
pub fn package_of(name: &str) -> &str {
    let start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[start..].find('.') {
        Some(dot) => &name[..start + dot],
        None => name,
    }
}

pub fn group_by_package(table: &CostTable) -> Vec<PackageGroup> {
    let mut groups = BTreeMap::<&str, Vec<&CostEntry>>::new();
    for e in &table.entries {
        groups.entry(package_of(&e.name)).or_default().push(e);
    }
    let mut out = groups
        .into_iter()
        .map(|(name, members)| {
            let flat = members.iter().map(|e| e.flat).sum::<i64>();
            let cum = members.iter().map(|e| e.cum).sum::<i64>();
            PackageGroup {
                name: name.to_string(),
                flat,
                cum,
                flat_pct: percent(flat, table.total),
                cum_pct: percent(cum, table.total),
                functions: members.into_iter().cloned().collect(),
            }
        })
        .collect::<Vec<_>>();
    out.sort_by(|a, b| b.flat.cmp(&a.flat).then_with(|| a.name.cmp(&b.name)));
    out
}

pub fn render_grouped(groups: &[PackageGroup], total: i64) -> String {
    let mut out = String::new();
    out.push_str("#### **Profile Data Organized by Package**\n\n");
    out.push_str(&format!("Total: {total}\n"));
    for g in groups {
        out.push_str(&format!(
            "\n#### **{}**\n- **Total Flat:** {} ({:.2}%)\n- **Total Cum:** {} ({:.2}%)\n",
            g.name, g.flat, g.flat_pct, g.cum, g.cum_pct
        ));
        out.push_str(&format!(
            "{:>12} {:>8} {:>12} {:>8}  {}\n",
            "flat", "flat%", "cum", "cum%", "function"
        ));
        for f in &g.functions {
            out.push_str(&format!(
                "{:>12} {:>7.2}% {:>12} {:>7.2}%  {}\n",
                f.flat, f.flat_pct, f.cum, f.cum_pct, f.name
            ));
        }
    }
    out
}
