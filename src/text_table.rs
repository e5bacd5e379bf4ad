//! Parser for pprof `-top` text renderings.
//!
//! Values are re-derived from the printed columns, so they carry the renderer's rounding.
//! Diffing always goes through the binary decoder; this parser only feeds the manual
//! collector, which has nothing but rendered text to select functions from.

use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::{FunctionFilter, IoContext, ProfError, ProfResult, distinct_leaf_names};

pub const TOP_HEADER: &str = "flat  flat%   sum%        cum   cum%";

const MIN_FIELDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRow {
    pub name: String,
    pub flat: f64,
    pub flat_pct: f64,
    pub sum_pct: f64,
    pub cum: f64,
    pub cum_pct: f64,
}

/// Leading numeric part of a column such as `0.60s`, `12.5MB` or `100%`.
fn parse_number(field: &str, column: &str, line_no: usize, source: &Path) -> ProfResult<f64> {
    let field = field.trim();
    let end = field
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
        .unwrap_or(field.len());
    field[..end].parse::<f64>().map_err(|_| {
        ProfError::decode(
            source,
            format!("line {line_no}: {column} column {field:?} is not numeric"),
        )
    })
}

pub fn read_text_table(path: &Path) -> ProfResult<Vec<TextRow>> {
    let text = std::fs::read_to_string(path).with_path("read", path)?;
    parse_text_table(&text, path)
}

pub fn parse_text_table(text: &str, source: &Path) -> ProfResult<Vec<TextRow>> {
    let mut lines = text.lines().enumerate();
    if !lines.any(|(_, l)| l.contains(TOP_HEADER)) {
        return Err(ProfError::decode(source, "profile text header not found"));
    }

    let mut rows = Vec::new();
    for (idx, line) in lines {
        let fields = line.split_whitespace().collect::<Vec<_>>();
        if fields.len() < MIN_FIELDS {
            continue;
        }
        let line_no = idx + 1;
        let name = fields[5..].join(" ").replace(" (inline)", "");
        rows.push(TextRow {
            name: name.trim().to_string(),
            flat: parse_number(fields[0], "flat", line_no, source)?,
            flat_pct: parse_number(fields[1], "flat%", line_no, source)?,
            sum_pct: parse_number(fields[2], "sum%", line_no, source)?,
            cum: parse_number(fields[3], "cum", line_no, source)?,
            cum_pct: parse_number(fields[4], "cum%", line_no, source)?,
        });
    }
    Ok(rows)
}

/// Leaf names of rows the filter accepts, de-duplicated in table order.
pub fn listing_targets(rows: &[TextRow], filter: &FunctionFilter) -> Vec<String> {
    distinct_leaf_names(
        rows.iter()
            .map(|r| r.name.as_str())
            .filter(|name| filter.accepts(name)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
File: pool.test
Type: cpu
Showing nodes accounting for 1.20s, 100% of 1.20s total
      flat  flat%   sum%        cum   cum%
     0.60s 50.00% 50.00%      0.90s 75.00%  github.com/acme/pool.(*Pool).Get
     0.30s 25.00% 75.00%      0.30s 25.00%  github.com/acme/pool.init (inline)
     0.30s 25.00%   100%      0.30s 25.00%  runtime.mallocgc
         0     0%   100%      1.20s   100%  testing.(*B).runN
";

    #[test]
    fn parses_rows_after_header() {
        let rows = parse_text_table(SAMPLE, Path::new("t.txt")).expect("parse");
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].name, "github.com/acme/pool.(*Pool).Get");
        assert_eq!(rows[0].flat, 0.60);
        assert_eq!(rows[0].cum_pct, 75.0);
        assert_eq!(rows[1].name, "github.com/acme/pool.init");
        assert_eq!(rows[2].sum_pct, 100.0);
        assert_eq!(rows[3].flat, 0.0);
    }

    #[test]
    fn missing_header_is_decode_error() {
        let err = parse_text_table("no table here\n", Path::new("t.txt")).expect_err("must fail");
        assert!(matches!(err, ProfError::Decode { .. }), "got {err:?}");
    }

    #[test]
    fn non_numeric_column_is_decode_error() {
        let text = format!("{TOP_HEADER}\n  abc 1% 1% 1 1% main.f\n");
        match parse_text_table(&text, Path::new("t.txt")).expect_err("must fail") {
            ProfError::Decode { cause, .. } => assert!(cause.contains("line 2"), "cause: {cause}"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn listing_targets_apply_filter_to_leaf() {
        let rows = parse_text_table(SAMPLE, Path::new("t.txt")).expect("parse");
        let filter = FunctionFilter {
            include_prefixes: vec!["acme/pool".to_string()],
            ignore_functions: vec!["init".to_string()],
        };
        assert_eq!(listing_targets(&rows, &filter), vec!["Get".to_string()]);
        assert_eq!(
            listing_targets(&rows, &FunctionFilter::default()),
            vec!["Get".to_string(), "init".to_string(), "mallocgc".to_string(), "runN".to_string()]
        );
    }
}
