//! Timeline rendering.
//!
//! One line per span row: fixed text columns followed by a bar covering
//! `[begin, end]` of the running elapsed total. Lines are built as
//! [`StyledLine`]s so the caller decides how to print them (in-place redraw
//! on a terminal, plain lines otherwise).

use anstyle::Style;
use unicode_width::UnicodeWidthStr;

use super::engine::{SpanRow, SpanState};
use crate::styling::{HEADER, StyledLine, palette, truncate_visible};

const COLUMN_GAP: &str = "  ";
const TITLES: [&str; 7] = ["Start", "Message", "Context", "Node", "Device", "Tid", "Duration"];
const MESSAGE: usize = 1;
const DURATION: usize = 6;
/// Message column never shrinks below this
const MIN_MESSAGE_WIDTH: usize = 12;

const BAR: char = '━';
const MARKER: char = '▏';

/// How the start column is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartLabel {
    /// Seconds since the first `start`
    #[default]
    Relative,
    /// The timestamp as written in the trace
    Absolute,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub labels: StartLabel,
    /// Total line width available
    pub width: usize,
    pub min_bar_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            labels: StartLabel::Relative,
            width: 120,
            min_bar_width: 20,
        }
    }
}

/// Duration column text: seconds once closed, empty while open, `?` when the
/// span was replaced before it could close.
pub fn duration_label(row: &SpanRow) -> String {
    match row.state {
        SpanState::Closed { duration } => format!("{duration:.6}"),
        SpanState::Open => String::new(),
        SpanState::Orphaned => "?".to_string(),
    }
}

/// Header line followed by one line per row.
///
/// `elapsed` is the scale of every bar; rows are rendered in the order
/// given.
pub fn render_timeline(rows: &[SpanRow], elapsed: f64, options: &RenderOptions) -> Vec<StyledLine> {
    let cells: Vec<[String; 7]> = rows.iter().map(|row| row_cells(row, options.labels)).collect();

    let mut widths = TITLES.map(UnicodeWidthStr::width);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    // Give the bar its minimum by shrinking the message column
    let fixed = fixed_width(&widths);
    if fixed + options.min_bar_width > options.width {
        let others = fixed - widths[MESSAGE];
        let available = options.width.saturating_sub(others + options.min_bar_width);
        widths[MESSAGE] = widths[MESSAGE].min(available.max(MIN_MESSAGE_WIDTH));
    }
    let bar_width = options
        .width
        .saturating_sub(fixed_width(&widths))
        .max(options.min_bar_width);

    let mut lines = Vec::with_capacity(rows.len() + 1);

    let mut header = StyledLine::new();
    for (i, (title, width)) in TITLES.iter().zip(widths).enumerate() {
        push_cell(&mut header, title, width, i == DURATION, HEADER);
    }
    header.push_styled(format!("Span {elapsed:.3} s"), HEADER);
    lines.push(header);

    for (row, cells) in rows.iter().zip(&cells) {
        let style = palette(row.color);
        let mut line = StyledLine::new();
        for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
            push_cell(&mut line, cell, width, i == DURATION, style);
        }
        line.push_styled(bar(row.begin, row.end, elapsed, bar_width), style);
        lines.push(line);
    }

    lines
}

fn row_cells(row: &SpanRow, labels: StartLabel) -> [String; 7] {
    let start = match labels {
        StartLabel::Relative => format!("{:.3}", row.start_offset),
        StartLabel::Absolute => row.started_at.clone(),
    };
    [
        start,
        row.message.clone(),
        row.context.clone(),
        row.node.clone(),
        row.device.clone(),
        row.transaction_id.clone(),
        duration_label(row),
    ]
}

fn fixed_width(widths: &[usize; 7]) -> usize {
    widths.iter().sum::<usize>() + COLUMN_GAP.len() * widths.len()
}

/// Append `text` cut or padded to exactly `width` columns, then the gap.
fn push_cell(line: &mut StyledLine, text: &str, width: usize, right_align: bool, style: Style) {
    let text = truncate_visible(text, width, "…");
    let end = line.width() + width;
    if right_align {
        line.push_raw(" ".repeat(width.saturating_sub(text.width())));
    }
    line.push_styled(text, style);
    line.pad_to(end);
    line.push_raw(COLUMN_GAP);
}

/// Bar over `[begin, end]` scaled so `size` fills `width` columns.
fn bar(begin: f64, end: f64, size: f64, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let column = |offset: f64| {
        if size > 0.0 {
            ((offset / size) * width as f64).round().max(0.0) as usize
        } else {
            0
        }
    };

    let start = column(begin);
    let stop = column(end).min(width);
    // A span starting at the right edge still needs a visible cell
    let from = start.min(width - 1);

    let mut out = " ".repeat(from);
    if stop > start {
        out.extend(std::iter::repeat_n(BAR, stop - from));
    } else {
        out.push(MARKER);
    }
    out
}
