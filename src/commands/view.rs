//! The timeline view: read, correlate, draw.

mod live_table;

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use anyhow::Context;
use ptview::config::ViewerConfig;
use ptview::styling::{StyledLine, eprintln, info_message};
use ptview::trace::filter::{parse_bound, parse_id_list, read_message_list};
use ptview::trace::playback::{Sleeper, ThreadSleeper, wait};
use ptview::trace::{
    CancelToken, ColorAllocator, CorrelationEngine, EventFilter, Pacer, Pacing, Pipeline, Poll,
    RawRecord, RecordReader, RefreshPolicy, RenderOptions, StartLabel, Tee, TraceError,
    render_timeline, start_stream,
};

use self::live_table::LiveTable;
use crate::cli::Cli;

const DEFAULT_WIDTH: usize = 120;
const DEFAULT_HEIGHT: usize = 40;

/// Everything the view needs, resolved from flags and config.
pub struct ViewOptions {
    pub pacing: Pacing,
    pub filter: EventFilter,
    pub highlight: Option<std::collections::HashSet<String>>,
    pub labels: StartLabel,
    pub tee: Option<std::path::PathBuf>,
}

impl ViewOptions {
    pub fn from_cli(cli: &Cli, config: &ViewerConfig) -> Result<Self, TraceError> {
        let pacing = if cli.follow {
            Pacing::Follow
        } else if cli.realtime {
            Pacing::RealTime {
                speedup: cli.speedup.unwrap_or(config.speedup),
            }
        } else {
            Pacing::Batch
        };

        let filter = EventFilter {
            include_operational: cli.include_operational,
            transactions: cli.tid.as_deref().map(parse_id_list),
            messages: cli.filter.as_deref().map(read_message_list).transpose()?,
            begin: cli.begin.as_deref().map(parse_bound).transpose()?,
            end: cli.end.as_deref().map(parse_bound).transpose()?,
        };
        if let (Some(begin), Some(end)) = (filter.begin, filter.end)
            && begin > end
        {
            log::warn!("--begin {begin} is after --end {end}; nothing will match");
        }

        Ok(Self {
            pacing,
            filter,
            highlight: cli.ctid.as_deref().map(parse_id_list),
            labels: if cli.timestamp {
                StartLabel::Absolute
            } else {
                StartLabel::Relative
            },
            tee: cli.write.clone(),
        })
    }
}

/// Open FILE, or standard input for `-`.
pub fn open_source(path: &Path) -> Result<(Box<dyn BufRead>, String), TraceError> {
    if path == Path::new("-") {
        return Ok((Box::new(io::stdin().lock()), "standard input".to_string()));
    }
    let file = File::open(path).map_err(|e| TraceError::ReadFailed {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    Ok((Box::new(BufReader::new(file)), path.display().to_string()))
}

pub fn handle_view(cli: &Cli, config: &ViewerConfig, cancel: &CancelToken) -> anyhow::Result<()> {
    let options = ViewOptions::from_cli(cli, config)?;
    let (source, source_name) = open_source(&cli.file)?;

    let mut tee = match &options.tee {
        Some(path) => Some(
            Tee::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => None,
    };
    let from_stdin = cli.file == Path::new("-");

    let mut reader = match options.pacing {
        Pacing::Follow => RecordReader::follow(source),
        _ => RecordReader::batch(source),
    };
    let mut sleeper = ThreadSleeper;
    let poll_interval = config.poll_interval();

    // The schema comes first: nothing is drawn for a trace we cannot read
    let Some(start) = start_stream(&mut reader, &source_name, || {
        wait(&mut sleeper, poll_interval, cancel)
    })?
    else {
        eprintln!("{}", info_message("Stopped before any records arrived"));
        return Ok(());
    };
    if let Some(tee) = tee.as_mut() {
        tee.write(&start.head);
    }

    let mut colors = ColorAllocator::new(&config.reserved_colors, config.muted_color);
    if let Some(highlight) = options.highlight.clone() {
        colors = colors.with_highlight(highlight);
    }
    let mut pipeline = Pipeline::new(start.schema, options.filter, CorrelationEngine::new(colors));
    for error in start.skipped {
        pipeline.reject(error);
    }

    let (width, height) = terminal_dimensions();
    let mut session = Session {
        pipeline,
        table: LiveTable::stdout(width),
        render: RenderOptions {
            labels: options.labels,
            width,
            min_bar_width: config.min_bar_width,
        },
        height,
        color: !matches!(
            anstream::AutoStream::choice(&io::stdout()),
            anstream::ColorChoice::Never
        ),
        pacer: Pacer::new(options.pacing),
        refresh: RefreshPolicy::new(config.refresh_interval()),
        live: false,
    };
    session.live = options.pacing.is_live() && session.table.is_tty();

    // Records that only arrived while waiting are new, not existing data
    match options.pacing {
        Pacing::Follow if !from_stdin && !start.waited => {
            let skipped = reader.skip_existing()?;
            log::info!(
                "Following {source_name} after {skipped} existing lines, from line {}",
                reader.line() + 1
            );
        }
        _ => {
            if let Some(first) = start.first {
                session.consume(&first, &mut sleeper, cancel)?;
            }
        }
    }

    let mut interrupted = false;
    loop {
        if cancel.is_cancelled() {
            interrupted = true;
            break;
        }
        match reader.poll()? {
            Poll::Record(record) => {
                if let Some(tee) = tee.as_mut() {
                    tee.write(record.raw.as_bytes());
                }
                session.consume(&record, &mut sleeper, cancel)?;
            }
            Poll::Malformed { raw, error } => {
                if let Some(tee) = tee.as_mut() {
                    tee.write(&raw);
                }
                session.pipeline.reject(error);
            }
            Poll::Idle => {
                session.refresh_if_pending()?;
                if let Some(tee) = tee.as_mut() {
                    tee.flush();
                }
                if !wait(&mut sleeper, poll_interval, cancel) {
                    interrupted = true;
                    break;
                }
            }
            Poll::End => break,
        }
    }

    session.finish()?;
    if let Some(tee) = tee.as_mut() {
        tee.flush();
    }
    if interrupted {
        eprintln!("{}", info_message("Stopped"));
    }
    Ok(())
}

struct Session {
    pipeline: Pipeline,
    table: LiveTable<io::Stdout>,
    render: RenderOptions,
    height: usize,
    /// Emit SGR colors (respects NO_COLOR / CLICOLOR_FORCE)
    color: bool,
    pacer: Pacer,
    refresh: RefreshPolicy,
    /// Redraw while consuming, not only at the end
    live: bool,
}

impl Session {
    /// Pace, correlate and (when due) redraw one record.
    ///
    /// A pacing sleep cut short by cancellation still applies the event; the
    /// caller notices the cancel flag before the next record.
    fn consume(
        &mut self,
        record: &RawRecord,
        sleeper: &mut impl Sleeper,
        cancel: &CancelToken,
    ) -> io::Result<()> {
        let Some(event) = self.pipeline.prepare(record) else {
            return Ok(());
        };

        let delay = self.pacer.delay_before(event.timestamp);
        if !delay.is_zero() {
            self.refresh_if_pending()?;
            wait(sleeper, delay, cancel);
        }

        let timestamp = event.timestamp;
        self.pipeline.apply(event);
        if self.live && self.refresh.on_event(timestamp) {
            self.draw_live()?;
            self.refresh.refreshed(Some(timestamp));
        }
        Ok(())
    }

    fn refresh_if_pending(&mut self) -> io::Result<()> {
        if self.live && self.refresh.is_pending() {
            self.draw_live()?;
            let last = self.pipeline.engine().last_timestamp();
            self.refresh.refreshed(last);
        }
        Ok(())
    }

    /// Newest rows that fit the terminal, plus the header.
    fn draw_live(&mut self) -> io::Result<()> {
        let engine = self.pipeline.engine();
        let rows = engine.rows();
        let visible = self.height.saturating_sub(2).max(1);
        let shown = &rows[rows.len().saturating_sub(visible)..];
        let lines = self.styled(render_timeline(shown, engine.elapsed(), &self.render));
        self.table.redraw(&lines)
    }

    fn styled(&self, lines: Vec<StyledLine>) -> Vec<String> {
        lines
            .iter()
            .map(|line| {
                if self.color {
                    line.render()
                } else {
                    line.plain_text()
                }
            })
            .collect()
    }

    fn finish(mut self) -> io::Result<()> {
        let report = self.pipeline.finish();
        let engine = self.pipeline.engine();
        let lines = self.styled(render_timeline(engine.rows(), engine.elapsed(), &self.render));
        self.table.finalize(&lines)?;

        for line in report.render() {
            eprintln!("{line}");
        }
        Ok(())
    }
}

/// Size of the terminal behind stdout, where the table is drawn.
fn terminal_dimensions() -> (usize, usize) {
    terminal_size::terminal_size_of(io::stdout())
        .map(|(terminal_size::Width(w), terminal_size::Height(h))| (w as usize, h as usize))
        .unwrap_or((DEFAULT_WIDTH, DEFAULT_HEIGHT))
}
