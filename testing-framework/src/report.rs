//! Human-readable before/after reports.
//!
//! The printer never decides anything; it renders snapshots, diffs and
//! failures line by line into an injected [`DiagnosticSink`]. Output is meant
//! for people and is not machine parsed.

use indexmap::IndexMap;
use parking_lot::Mutex;
use sett_common::{
    amount::{format_units, Amount, DEFAULT_DECIMALS},
    EventLog,
};
use std::sync::Arc;

use crate::error::InvariantViolation;
use crate::executor::OperationKind;
use crate::snapshot::{Delta, ScalarDelta, Snapshot};

/// Log target of [`LogSink`]
pub const REPORT_TARGET: &str = "sett::report";

const FAILURE_WIDTH: usize = 62;

/// Destination of diagnostic lines
pub trait DiagnosticSink: Send + Sync {
    fn write_line(&self, line: &str);
}

/// Forwards every line to `log::info!` under [`REPORT_TARGET`]
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn write_line(&self, line: &str) {
        log::info!(target: REPORT_TARGET, "{}", line);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DiagnosticSink for StdoutSink {
    fn write_line(&self, line: &str) {
        println!("{}", line);
    }
}

/// Keeps every line in memory; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct BufferSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contents(&self) -> String {
        self.lines.lock().join("\n")
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl DiagnosticSink for BufferSink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[derive(Clone)]
pub struct ReportPrinter {
    sink: Arc<dyn DiagnosticSink>,
    decimals: IndexMap<String, u8>,
    default_decimals: u8,
}

impl ReportPrinter {
    pub fn new(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            sink,
            decimals: IndexMap::new(),
            default_decimals: DEFAULT_DECIMALS,
        }
    }

    /// Display precision per token name
    pub fn with_token_decimals<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = (S, u8)>,
        S: Into<String>,
    {
        self.decimals
            .extend(tokens.into_iter().map(|(name, decimals)| (name.into(), decimals)));
        self
    }

    pub fn with_default_decimals(mut self, decimals: u8) -> Self {
        self.default_decimals = decimals;
        self
    }

    fn line(&self, line: impl AsRef<str>) {
        self.sink.write_line(line.as_ref());
    }

    fn format(&self, token: &str, amount: Amount) -> String {
        let decimals = self
            .decimals
            .get(token)
            .copied()
            .unwrap_or(self.default_decimals);
        format_units(amount, decimals)
    }

    fn format_delta(&self, token: &str, delta: Delta) -> String {
        match delta {
            Delta::Unchanged => "0".to_string(),
            Delta::Increase(v) => format!("+{}", self.format(token, v)),
            Delta::Decrease(v) => format!("-{}", self.format(token, v)),
        }
    }

    /// Before/after table of every tracked balance followed by the scalars.
    /// Rows must come from same-shape snapshots; anything else is skipped
    /// with a note.
    pub fn print_compare(&self, title: &str, before: &Snapshot, after: &Snapshot) {
        self.line(format!("=== Compare: {} ===", title));

        let diff = match before.diff(after) {
            Ok(diff) => diff,
            Err(e) => {
                self.line(format!("(cannot compare: {})", e));
                return;
            }
        };

        let mut rows = vec![[
            "entity".to_string(),
            "token".to_string(),
            "before".to_string(),
            "after".to_string(),
            "delta".to_string(),
        ]];
        for ((key, b), (_, delta)) in before.balances().zip(diff.balances()) {
            let a = delta.apply(*b).unwrap_or_default();
            rows.push([
                key.entity.clone(),
                key.token.clone(),
                self.format(&key.token, *b),
                self.format(&key.token, a),
                self.format_delta(&key.token, *delta),
            ]);
        }

        let mut widths = [0usize; 5];
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.len());
            }
        }
        for row in &rows {
            self.line(format!(
                "{:<w0$} | {:<w1$} | {:>w2$} | {:>w3$} | {:>w4$}",
                row[0],
                row[1],
                row[2],
                row[3],
                row[4],
                w0 = widths[0],
                w1 = widths[1],
                w2 = widths[2],
                w3 = widths[3],
                w4 = widths[4],
            ));
        }

        for ((key, b), (_, delta)) in before.scalars().zip(diff.scalars()) {
            match delta {
                ScalarDelta::Amount(d) => {
                    let a = d.apply(b.as_amount().unwrap_or_default()).unwrap_or_default();
                    self.line(format!("{}: {} -> {} ({})", key, b, a, d));
                }
                ScalarDelta::Unchanged => self.line(format!("{}: {}", key, b)),
                ScalarDelta::Changed { before, after } => {
                    self.line(format!("{}: {} -> {}", key, before, after))
                }
            }
        }
    }

    /// Operation kind, invariant and the violating values, then the full
    /// comparison
    pub fn print_failure(
        &self,
        kind: OperationKind,
        violation: &InvariantViolation,
        before: &Snapshot,
        after: &Snapshot,
    ) {
        let border = "═".repeat(FAILURE_WIDTH + 2);
        self.line(format!("╔{}╗", border));
        self.line(format!("║ {:w$} ║", format!("INVARIANT FAILURE: {}", kind), w = FAILURE_WIDTH));
        self.line(format!("║ {:w$} ║", format!("Invariant: {}", violation.invariant), w = FAILURE_WIDTH));
        self.line(format!("╠{}╣", border));
        for line in textwrap::wrap(&violation.message, FAILURE_WIDTH) {
            self.line(format!("║ {:w$} ║", line, w = FAILURE_WIDTH));
        }
        if !violation.observations.is_empty() {
            self.line(format!("╠{}╣", border));
            for obs in &violation.observations {
                let rendered = format!("{}: {} -> {}", obs.key, obs.before, obs.after);
                for line in textwrap::wrap(&rendered, FAILURE_WIDTH) {
                    self.line(format!("║ {:w$} ║", line, w = FAILURE_WIDTH));
                }
            }
        }
        self.line(format!("╚{}╝", border));
        self.print_compare(&kind.to_string(), before, after);
    }

    /// Selected fields of an event, one per line
    pub fn print_event(&self, title: &str, event: &EventLog, keys: &[String]) {
        self.line(format!("== {} ==", title));
        for key in keys {
            match event.get(key) {
                Some(value) => self.line(format!("{}: {}", key, value)),
                None => self.line(format!("{}: <missing>", key)),
            }
        }
    }
}
