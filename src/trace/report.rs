//! End-of-stream diagnostics.

use color_print::cformat;

use super::engine::CorrelationSummary;
use super::error::RowError;
use super::lock::LockAnomaly;
use crate::styling::{HINT, info_message, success_message, warning_message};

/// Everything non-fatal that happened during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamReport {
    /// Data records read, header excluded
    pub records: u64,
    /// Events that reached correlation, synthetic ones included
    pub events: u64,
    pub malformed: Vec<RowError>,
    pub correlation: CorrelationSummary,
    pub locks: Vec<LockAnomaly>,
}

impl StreamReport {
    /// No skipped rows and no correlation or lock anomalies.
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
            && self.correlation.unclosed.is_empty()
            && self.correlation.overwritten.is_empty()
            && self.correlation.unmatched_stops == 0
            && self.locks.is_empty()
    }

    /// Styled summary lines for stderr.
    pub fn render(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let detail = |text: String| format!("   {HINT}{text}{HINT:#}");

        let correlation = &self.correlation;
        if self.is_clean() {
            lines.push(success_message(cformat!(
                "Correlated <bold>{}</> spans from {} records",
                correlation.spans,
                self.records
            )));
            return lines;
        }

        lines.push(info_message(cformat!(
            "Correlated <bold>{}</> spans from {} records ({} closed)",
            correlation.spans,
            self.records,
            correlation.closed
        )));

        if !self.malformed.is_empty() {
            lines.push(warning_message(cformat!(
                "Skipped <bold>{}</> malformed {}",
                self.malformed.len(),
                plural(self.malformed.len(), "record", "records")
            )));
            lines.extend(self.malformed.iter().map(|e| detail(e.to_string())));
        }

        if !correlation.overwritten.is_empty() {
            lines.push(warning_message(cformat!(
                "<bold>{}</> {} restarted before stopping",
                correlation.overwritten.len(),
                plural(correlation.overwritten.len(), "span", "spans")
            )));
            lines.extend(correlation.overwritten.iter().map(|o| {
                detail(format!(
                    "line {}: {} replaced at line {}",
                    o.line, o.key, o.replaced_by
                ))
            }));
        }

        if !correlation.unclosed.is_empty() {
            lines.push(warning_message(cformat!(
                "<bold>{}</> {} never closed",
                correlation.unclosed.len(),
                plural(correlation.unclosed.len(), "span", "spans")
            )));
            lines.extend(correlation.unclosed.iter().map(|span| {
                let orphaned = if span.orphaned { " (replaced)" } else { "" };
                detail(format!(
                    "line {}: {} [{}]{orphaned}",
                    span.line, span.message, span.transaction_id
                ))
            }));
        }

        if !self.locks.is_empty() {
            lines.push(warning_message(cformat!(
                "<bold>{}</> transaction lock {}",
                self.locks.len(),
                plural(self.locks.len(), "anomaly", "anomalies")
            )));
            lines.extend(self.locks.iter().map(|a| detail(a.to_string())));
        }

        if correlation.unmatched_stops > 0 {
            lines.push(info_message(format!(
                "Ignored {} {} without a matching start",
                correlation.unmatched_stops,
                plural(correlation.unmatched_stops, "stop", "stops")
            )));
        }

        lines
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 { one } else { many }
}
