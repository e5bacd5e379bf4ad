use anyhow::Result;
use proftrack::{GateStatus, TrackOutcome};
use serde::Serialize;
use serde_json::Value;

pub struct CliLogger {
    json: bool,
    no_color: bool,
}

impl CliLogger {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self { json, no_color }
    }

    pub fn print_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(value)?);
            return Ok(());
        }

        let rendered = render_value(&serde_json::to_value(value)?, 0);
        println!("{rendered}");
        Ok(())
    }

    /// Text reports go to stdout as-is; the gate verdict follows on stderr.
    pub fn print_track(&self, outcome: &TrackOutcome) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(outcome)?);
            return Ok(());
        }

        if let Some(content) = &outcome.content {
            print!("{content}");
        }
        if let Some(path) = &outcome.written_to {
            println!(
                "{} {} {}",
                self.style("report", "90"),
                outcome.format,
                path.display()
            );
        }

        let gate = &outcome.gate;
        let status = match gate.status {
            GateStatus::Pass => self.style("PASS", "32;1"),
            GateStatus::Fail => self.style("FAIL", "31;1"),
        };
        eprintln!("{} {} {}", self.style("gate", "36;1"), status, gate.reason);
        if gate.status == GateStatus::Fail && !outcome.fail_on_regression {
            self.print_warning("regression gate failed; pass --fail-on-regression to fail the build");
        }
        Ok(())
    }

    pub fn print_error(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "error",
                "code": "error",
                "message": msg,
            });
            println!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("error", "31;1"));
    }

    /// Human mode only; JSON output carries the gate verdict itself.
    fn print_warning(&self, msg: &str) {
        eprintln!("{} {msg}", self.style("warn", "33;1"));
    }

    fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }
}

/// Indented `key: value` rendering of a JSON document; nested containers open a new block.
fn render_value(value: &Value, indent: usize) -> String {
    let mut out = String::new();
    match value {
        Value::Array(items) if !items.is_empty() => {
            for item in items {
                push_entry(&mut out, indent, "-", item, "");
            }
        }
        Value::Object(map) if !map.is_empty() => {
            for (key, item) in map {
                push_entry(&mut out, indent, key, item, ":");
            }
        }
        Value::Array(_) => out.push_str("[]"),
        Value::Object(_) => out.push_str("{}"),
        Value::String(s) => out.push_str(s),
        scalar => out.push_str(&scalar.to_string()),
    }
    out.truncate(out.trim_end().len());
    out
}

fn push_entry(out: &mut String, indent: usize, label: &str, item: &Value, sep: &str) {
    let pad = " ".repeat(indent);
    let nested = render_value(item, indent + 2);
    let block = match item {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => false,
    };
    if block {
        out.push_str(&format!("{pad}{label}{sep}\n{nested}\n"));
    } else {
        out.push_str(&format!("{pad}{label}{sep} {nested}\n"));
    }
}
