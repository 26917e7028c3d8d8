//! `--detect`: name the trace revision without correlating anything.

use color_print::cformat;
use ptview::styling::println;
use ptview::trace::schema::SchemaSource;
use ptview::trace::{Detection, Poll, RecordReader, TraceError, TraceSchema};

use super::view::open_source;
use crate::cli::Cli;

pub fn handle_detect(cli: &Cli) -> anyhow::Result<()> {
    let (source, source_name) = open_source(&cli.file)?;
    let detection = detect(RecordReader::batch(source), &source_name)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&detection)?);
    } else {
        for line in describe(&detection) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Detection from the first splittable record.
pub fn detect<R: std::io::BufRead>(
    mut reader: RecordReader<R>,
    source_name: &str,
) -> Result<Detection, TraceError> {
    loop {
        let poll = reader.poll().map_err(|e| TraceError::ReadFailed {
            path: source_name.into(),
            error: e.to_string(),
        })?;
        match poll {
            Poll::Record(record) => return TraceSchema::detect(&record.cells()),
            Poll::Malformed { error, .. } => log::info!("Skipping {error}"),
            Poll::Idle | Poll::End => {
                return Err(TraceError::EmptyInput {
                    source_name: source_name.to_string(),
                });
            }
        }
    }
}

fn describe(detection: &Detection) -> Vec<String> {
    let capabilities = detection.capabilities;
    let mut features = Vec::new();
    if capabilities.duration {
        features.push("duration");
    }
    if capabilities.traces {
        features.push("traces");
    }
    if capabilities.spans {
        features.push("spans");
    }
    let features = if features.is_empty() {
        "none".to_string()
    } else {
        features.join(", ")
    };

    let source = match detection.source {
        SchemaSource::Header => "header".to_string(),
        SchemaSource::Positional(layout) => format!("{layout} layout, no header"),
    };

    vec![
        cformat!("<bold>Revision</>      {}", detection.revision),
        cformat!("<bold>Columns</>       {} ({source})", detection.width),
        cformat!("<bold>Capabilities</>  {features}"),
    ]
}
