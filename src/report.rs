//! Text, HTML and JSON renderings of a [`ChangeReport`].
//!
//! Every renderer is a pure function of the report: the timestamp comes from
//! [`ChangeReport::generated_at`], so rendering the same report twice is byte-identical.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{ChangeKind, ChangeReport, ChangeRow, ProfError, ProfResult, write_file};

pub const SORT_ORDER: &str =
    "Regressions (worst → best), then Improvements (best → worst), then Stable";

const HEAVY_RULE: &str = "═══════════════════════════════════════════════════════════════";
const LIGHT_RULE: &str = "───────────────────────────────────────────────────────────────";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportFormat {
    Summary,
    Detailed,
    SummaryHtml,
    DetailedHtml,
    SummaryJson,
    DetailedJson,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 6] = [
        Self::Summary,
        Self::Detailed,
        Self::SummaryHtml,
        Self::DetailedHtml,
        Self::SummaryJson,
        Self::DetailedJson,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Detailed => "detailed",
            Self::SummaryHtml => "summary-html",
            Self::DetailedHtml => "detailed-html",
            Self::SummaryJson => "summary-json",
            Self::DetailedJson => "detailed-json",
        }
    }

    /// Output file for file-backed formats; `None` means stdout.
    pub fn file_name(self) -> Option<&'static str> {
        match self {
            Self::Summary | Self::Detailed => None,
            Self::SummaryHtml => Some("summary.html"),
            Self::DetailedHtml => Some("detailed.html"),
            Self::SummaryJson => Some("summary.json"),
            Self::DetailedJson => Some("detailed.json"),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = ProfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s.trim())
            .ok_or_else(|| {
                ProfError::InvalidArgument(format!(
                    "unknown report format {s:?} (expected one of {})",
                    Self::ALL.map(|f| f.as_str()).join(", ")
                ))
            })
    }
}

impl clap::ValueEnum for ReportFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &Self::ALL
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub format: ReportFormat,
    pub content: String,
}

impl Rendered {
    /// Writes file-backed formats under `dir`; stdout formats return `None`.
    pub fn write_to(&self, dir: &Path) -> ProfResult<Option<PathBuf>> {
        let Some(name) = self.format.file_name() else {
            return Ok(None);
        };
        let path = dir.join(name);
        write_file(&path, self.content.as_bytes())?;
        Ok(Some(path))
    }
}

pub fn render_report(report: &ChangeReport, format: ReportFormat) -> ProfResult<Rendered> {
    let content = match format {
        ReportFormat::Summary => summary_text(report),
        ReportFormat::Detailed => detailed_text(report)?,
        ReportFormat::SummaryHtml => summary_html(report),
        ReportFormat::DetailedHtml => detailed_html(report)?,
        ReportFormat::SummaryJson => serde_json::to_string_pretty(&summary_json(report)?)?,
        ReportFormat::DetailedJson => serde_json::to_string_pretty(&detailed_json(report)?)?,
    };
    Ok(Rendered { format, content })
}

pub fn summary_text(report: &ChangeReport) -> String {
    let stats = report.stats();
    let mut out = String::new();
    out.push_str("=== Performance Tracking Summary ===\n");
    out.push_str(&format!("Total Functions Analyzed: {}\n", report.rows.len()));
    out.push_str(&format!("Regressions: {}\n", stats.regressions));
    out.push_str(&format!("Improvements: {}\n", stats.improvements));
    out.push_str(&format!("Stable: {}\n", stats.stable));

    let regressions = report.regressions();
    if !regressions.is_empty() {
        out.push_str("\nTop Regressions (worst first):\n");
        for row in regressions {
            out.push_str(&summary_line(row));
        }
    }
    let improvements = report.improvements();
    if !improvements.is_empty() {
        out.push_str("\nTop Improvements (best first):\n");
        for row in improvements {
            out.push_str(&summary_line(row));
        }
    }
    push_new_functions(&mut out, report);
    out
}

fn summary_line(row: &ChangeRow) -> String {
    format!(
        "  • {}: {}% ({} → {})\n",
        row.function_name,
        signed(row.flat_change_percent, 1),
        row.flat.before,
        row.flat.after
    )
}

fn push_new_functions(out: &mut String, report: &ChangeReport) {
    if let Some(names) = report.new_functions.as_ref().filter(|n| !n.is_empty()) {
        out.push_str("\nNew Functions (not in baseline):\n");
        for name in names {
            out.push_str(&format!("  • {name}\n"));
        }
    }
}

pub fn detailed_text(report: &ChangeReport) -> ProfResult<String> {
    let stats = report.stats();
    let timestamp = rfc3339(report.generated_at)?;
    let mut out = String::new();
    out.push_str("=== Performance Tracking Report ===\n");
    out.push_str(&format!("Profile Type: {}\n", report.profile_type));
    out.push_str(&format!("Generated: {timestamp}\n"));
    out.push_str(&format!("Total Functions Analyzed: {}\n", report.rows.len()));
    out.push_str(&format!(
        "Regressions: {}  Improvements: {}  Stable: {}\n",
        stats.regressions, stats.improvements, stats.stable
    ));
    out.push_str(&format!("Sort Order: {SORT_ORDER}\n"));

    for row in report.sorted() {
        out.push('\n');
        out.push_str(&row_section(row, &timestamp));
    }
    push_new_functions(&mut out, report);
    Ok(out)
}

fn row_section(row: &ChangeRow, timestamp: &str) -> String {
    let (icon, assessment) = match row.kind {
        ChangeKind::Regression => ("⚠️", "Performance regression detected"),
        ChangeKind::Improvement => ("✅", "Performance improvement detected"),
        ChangeKind::Stable => ("🔄", "No significant change detected"),
    };

    let mut out = String::new();
    out.push_str(&format!("{HEAVY_RULE}\n               PERFORMANCE CHANGE REPORT\n{HEAVY_RULE}\n"));
    out.push_str(&format!("Function: {}\n", row.function_name));
    out.push_str(&format!("Analysis Time: {timestamp}\n"));
    out.push_str(&format!("Change Type: {}\n\n", row.kind));
    out.push_str(&format!("{icon} {assessment}\n\n"));

    out.push_str(&format!("{LIGHT_RULE}\n                    FLAT TIME ANALYSIS\n{LIGHT_RULE}\n"));
    out.push_str(&analysis_block(
        row.flat.before,
        row.flat.after,
        row.flat.delta,
        row.flat_change_percent,
    ));
    out.push('\n');

    out.push_str(&format!("{LIGHT_RULE}\n                 CUMULATIVE TIME ANALYSIS\n{LIGHT_RULE}\n"));
    out.push_str(&analysis_block(
        row.cum.before,
        row.cum.after,
        row.cum.delta,
        row.cum_change_percent,
    ));
    out.push('\n');

    out.push_str(&format!("{LIGHT_RULE}\n                    IMPACT ASSESSMENT\n{LIGHT_RULE}\n"));
    out.push_str(&format!("Severity:     {}\n", row.severity));
    out.push_str(&format!("Recommendation: {}\n", row.recommendation()));
    out.push_str(&format!("{HEAVY_RULE}\n"));
    out
}

fn analysis_block(before: i64, after: i64, delta: i64, percent: f64) -> String {
    let impact = if percent > 0.0 {
        format!("{:.2}% SLOWER", percent)
    } else if percent < 0.0 {
        format!("{:.2}% FASTER", percent.abs())
    } else {
        "UNCHANGED".to_string()
    };
    let delta = if delta > 0 {
        format!("+{delta}")
    } else {
        delta.to_string()
    };
    format!(
        "Before:       {before}\nAfter:        {after}\nDelta:        {delta}\nChange:       {}%\nImpact:       {impact}\n",
        signed(percent, 2)
    )
}

fn signed(value: f64, precision: usize) -> String {
    if value > 0.0 {
        format!("+{value:.precision$}")
    } else {
        format!("{value:.precision$}")
    }
}

pub fn summary_html(report: &ChangeReport) -> String {
    let stats = report.stats();
    let mut body = format!(
        "<h1>Performance Tracking Summary</h1><p>Profile type: {} &middot; Total functions analyzed: {} &middot; Regressions: {} &middot; Improvements: {} &middot; Stable: {}</p>",
        escape_xml(report.profile_type.as_str()),
        report.rows.len(),
        stats.regressions,
        stats.improvements,
        stats.stable
    );
    let regressions = report.regressions();
    if !regressions.is_empty() {
        body.push_str("<h2>Top Regressions (worst first)</h2>");
        body.push_str(&html_table(&regressions));
    }
    let improvements = report.improvements();
    if !improvements.is_empty() {
        body.push_str("<h2>Top Improvements (best first)</h2>");
        body.push_str(&html_table(&improvements));
    }
    body.push_str(&html_new_functions(report));
    html_page("Performance Tracking Summary", &body)
}

pub fn detailed_html(report: &ChangeReport) -> ProfResult<String> {
    let stats = report.stats();
    let timestamp = rfc3339(report.generated_at)?;
    let mut body = format!(
        "<h1>Performance Tracking Report</h1><p>Profile type: {} &middot; Generated: {} &middot; Total functions analyzed: {}</p><p>Regressions: {} &middot; Improvements: {} &middot; Stable: {}</p><p>Sort order: {}</p>",
        escape_xml(report.profile_type.as_str()),
        escape_xml(&timestamp),
        report.rows.len(),
        stats.regressions,
        stats.improvements,
        stats.stable,
        escape_xml(SORT_ORDER)
    );
    body.push_str(&html_table(&report.sorted()));
    body.push_str(&html_new_functions(report));
    Ok(html_page("Performance Tracking Report", &body))
}

fn html_table(rows: &[&ChangeRow]) -> String {
    let mut out = String::from(
        "<table><thead><tr><th>function</th><th>change</th><th>severity</th><th>flat before</th><th>flat after</th><th>flat &Delta;%</th><th>cum before</th><th>cum after</th><th>cum &Delta;%</th><th>recommendation</th></tr></thead><tbody>",
    );
    for row in rows {
        out.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td><td>{}</td><td>{}%</td><td>{}</td></tr>",
            escape_xml(&row.kind.as_str().to_lowercase()),
            escape_xml(&row.function_name),
            escape_xml(row.kind.as_str()),
            escape_xml(row.severity.as_str()),
            row.flat.before,
            row.flat.after,
            escape_xml(&signed(row.flat_change_percent, 2)),
            row.cum.before,
            row.cum.after,
            escape_xml(&signed(row.cum_change_percent, 2)),
            escape_xml(row.recommendation()),
        ));
    }
    out.push_str("</tbody></table>");
    out
}

fn html_new_functions(report: &ChangeReport) -> String {
    match report.new_functions.as_ref().filter(|n| !n.is_empty()) {
        Some(names) => {
            let items = names
                .iter()
                .map(|n| format!("<li>{}</li>", escape_xml(n)))
                .collect::<String>();
            format!("<h2>New Functions (not in baseline)</h2><ul>{items}</ul>")
        }
        None => String::new(),
    }
}

fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{}</title><style>body{{font-family:ui-monospace,Menlo,monospace;background:#0b1020;color:#e5e7eb;padding:20px}}table{{border-collapse:collapse;width:100%}}th,td{{padding:6px 8px;border-bottom:1px solid #1f2937;text-align:left}}tr.regression td{{color:#fca5a5}}tr.improvement td{{color:#86efac}}</style></head><body>{body}</body></html>",
        escape_xml(title)
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

pub fn summary_json(report: &ChangeReport) -> ProfResult<Value> {
    let timestamp = rfc3339(report.generated_at)?;
    let mut out = json!({
        "total_functions": report.rows.len(),
        "statistics": report.stats(),
        "regressions": report.regressions().into_iter().map(|r| row_json(r, &timestamp)).collect::<Vec<_>>(),
        "improvements": report.improvements().into_iter().map(|r| row_json(r, &timestamp)).collect::<Vec<_>>(),
    });
    attach_new_functions(&mut out, report);
    Ok(out)
}

pub fn detailed_json(report: &ChangeReport) -> ProfResult<Value> {
    let timestamp = rfc3339(report.generated_at)?;
    let mut out = json!({
        "total_functions": report.rows.len(),
        "statistics": report.stats(),
        "sort_order": SORT_ORDER,
        "changes": report.sorted().into_iter().map(|r| row_json(r, &timestamp)).collect::<Vec<_>>(),
    });
    attach_new_functions(&mut out, report);
    Ok(out)
}

fn row_json(row: &ChangeRow, timestamp: &str) -> Value {
    json!({
        "function_name": row.function_name,
        "change_type": row.kind,
        "severity": row.severity,
        "flat_change_percent": row.flat_change_percent,
        "cum_change_percent": row.cum_change_percent,
        "flat_absolute": row.flat,
        "cum_absolute": row.cum,
        "timestamp": timestamp,
        "recommendation": row.recommendation(),
    })
}

fn attach_new_functions(out: &mut Value, report: &ChangeReport) {
    if let (Some(names), Some(map)) = (&report.new_functions, out.as_object_mut()) {
        map.insert("new_functions".to_string(), json!(names));
    }
}

fn rfc3339(ts: OffsetDateTime) -> ProfResult<String> {
    ts.format(&Rfc3339)
        .map_err(|e| ProfError::InvalidArgument(format!("timestamp {ts} cannot be rendered: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AbsoluteChange, ProfileType, Severity};
    use time::macros::datetime;

    fn row(name: &str, before: i64, after: i64) -> ChangeRow {
        ChangeRow::between(
            &entry(name, before, before),
            &entry(name, after, after),
        )
    }

    fn entry(name: &str, flat: i64, cum: i64) -> crate::CostEntry {
        crate::CostEntry {
            name: name.to_string(),
            flat,
            cum,
            flat_pct: 0.0,
            sum_pct: 0.0,
            cum_pct: 0.0,
        }
    }

    fn sample_report() -> ChangeReport {
        ChangeReport {
            profile_type: ProfileType::Cpu,
            generated_at: datetime!(2024-05-01 12:00 UTC),
            rows: vec![
                row("pkg.Small", 100, 104),
                row("pkg.Steady", 50, 50),
                row("pkg.Big", 100, 150),
                row("pkg.Faster", 200, 100),
            ],
            new_functions: None,
        }
    }

    #[test]
    fn summary_lists_worst_regression_first() {
        let text = summary_text(&sample_report());
        assert!(text.starts_with("=== Performance Tracking Summary ===\n"));
        assert!(text.contains("Total Functions Analyzed: 4\n"));
        assert!(text.contains("Regressions: 2\nImprovements: 1\nStable: 1\n"));
        let big = text.find("  • pkg.Big: +50.0% (100 → 150)").expect("big");
        let small = text.find("  • pkg.Small: +4.0% (100 → 104)").expect("small");
        assert!(big < small);
        assert!(text.contains("Top Improvements (best first):\n  • pkg.Faster: -50.0% (200 → 100)\n"));
        assert!(!text.contains("New Functions"));
    }

    #[test]
    fn summary_omits_empty_sections() {
        let mut report = sample_report();
        report.rows.retain(|r| r.function_name == "pkg.Steady");
        let text = summary_text(&report);
        assert!(!text.contains("Top Regressions"));
        assert!(!text.contains("Top Improvements"));
    }

    #[test]
    fn detailed_sections_follow_report_order() {
        let text = detailed_text(&sample_report()).expect("render");
        assert!(text.contains(&format!("Sort Order: {SORT_ORDER}")));
        assert!(text.contains("Generated: 2024-05-01T12:00:00Z"));
        let positions = ["pkg.Big", "pkg.Small", "pkg.Faster", "pkg.Steady"]
            .map(|name| text.find(&format!("Function: {name}\n")).expect(name));
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "positions: {positions:?}");
        assert!(text.contains("Impact:       50.00% SLOWER"));
        assert!(text.contains("Impact:       50.00% FASTER"));
        assert!(text.contains("Impact:       UNCHANGED"));
        assert!(text.contains("Severity:     CRITICAL\nRecommendation: Critical regression! Immediate investigation required."));
    }

    #[test]
    fn text_rendering_is_deterministic() {
        let report = sample_report();
        assert_eq!(summary_text(&report), summary_text(&report));
        assert_eq!(
            detailed_text(&report).expect("first"),
            detailed_text(&report).expect("second")
        );
    }

    #[test]
    fn html_escapes_function_names() {
        let mut report = sample_report();
        report.rows.push(row("<script>alert('x')</script>", 10, 20));
        report.new_functions = Some(vec!["a&b".to_string()]);
        for html in [summary_html(&report), detailed_html(&report).expect("render")] {
            assert!(!html.contains("<script>"));
            assert!(html.contains("&lt;script&gt;alert(&apos;x&apos;)&lt;/script&gt;"));
            assert!(html.contains("<li>a&amp;b</li>"));
        }
    }

    #[test]
    fn json_shapes() {
        let mut report = sample_report();
        let summary = summary_json(&report).expect("summary");
        assert_eq!(summary["total_functions"], 4);
        assert_eq!(summary["statistics"]["regressions"], 2);
        assert_eq!(summary["regressions"][0]["function_name"], "pkg.Big");
        assert_eq!(summary["regressions"][0]["change_type"], "REGRESSION");
        assert_eq!(summary["regressions"][0]["severity"], "CRITICAL");
        assert_eq!(summary["regressions"][0]["flat_absolute"]["delta"], 50);
        assert_eq!(summary["regressions"][0]["timestamp"], "2024-05-01T12:00:00Z");
        assert!(summary.get("new_functions").is_none());

        report.new_functions = Some(vec!["pkg.New".to_string()]);
        let detailed = detailed_json(&report).expect("detailed");
        assert_eq!(detailed["sort_order"], SORT_ORDER);
        assert_eq!(detailed["changes"].as_array().map(Vec::len), Some(4));
        assert_eq!(detailed["changes"][3]["change_type"], "STABLE");
        assert_eq!(detailed["new_functions"][0], "pkg.New");
    }

    #[test]
    fn file_formats_write_to_output_dir() {
        let dir = std::env::temp_dir().join(format!("proftrack-report-write-{}", uuid::Uuid::new_v4()));
        let report = sample_report();
        let rendered = render_report(&report, ReportFormat::DetailedJson).expect("render");
        let path = rendered.write_to(&dir).expect("write").expect("path");
        assert_eq!(path, dir.join("detailed.json"));
        let parsed: Value = serde_json::from_slice(&std::fs::read(&path).expect("read")).expect("json");
        assert_eq!(parsed["total_functions"], 4);

        let stdout = render_report(&report, ReportFormat::Summary).expect("render");
        assert_eq!(stdout.write_to(&dir).expect("write"), None);
    }

    #[test]
    fn format_names_round_trip_through_from_str() {
        for format in ReportFormat::ALL {
            assert_eq!(format.as_str().parse::<ReportFormat>().expect("parse"), format);
        }
        assert!(matches!("xml".parse::<ReportFormat>(), Err(ProfError::InvalidArgument(_))));
    }

    #[test]
    fn absolute_change_serializes_plainly() {
        let v = serde_json::to_value(AbsoluteChange::new(3, 1)).expect("json");
        assert_eq!(v, json!({"before": 3, "after": 1, "delta": -2}));
        assert_eq!(Severity::from_percent(-66.0).as_str(), "CRITICAL");
    }
}
