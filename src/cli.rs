use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Live timeline of progress-trace spans
///
/// Reads a progress trace (CSV of start/stop/info events), pairs each start
/// with its stop and draws one bar per span, colored by transaction.
#[derive(Parser, Debug)]
#[command(name = "ptview", version, about, long_about)]
#[command(after_long_help = "\
Header-less traces are recognised by width (17, 18, 19 or 21 columns).

Examples:
  ptview trace.csv                     Render the whole trace once
  ptview --follow trace.csv            Tail a trace that is still being written
  ptview --realtime --speedup 10 t.csv Replay at ten times the recorded pace
  ptview --tid 42,43 --filter msgs.txt Restrict to transactions and messages")]
pub struct Cli {
    /// Trace file, or `-` for standard input
    #[arg(value_name = "FILE", default_value = "-")]
    pub file: PathBuf,

    /// Keep reading as the trace grows (starts at the current end)
    #[arg(short, long, conflicts_with = "realtime", help_heading = "Playback")]
    pub follow: bool,

    /// Replay with the recorded gaps between events
    #[arg(long, help_heading = "Playback")]
    pub realtime: bool,

    /// Divide real-time gaps by this factor
    #[arg(
        long,
        value_name = "N",
        requires = "realtime",
        value_parser = parse_speedup,
        help_heading = "Playback"
    )]
    pub speedup: Option<f64>,

    /// Include events from the operational datastore
    #[arg(short = 'o', long = "oper", help_heading = "Selection")]
    pub include_operational: bool,

    /// Only show messages listed in FILE (one per line, `#`/`-` lines ignored)
    #[arg(long, value_name = "FILE", help_heading = "Selection")]
    pub filter: Option<PathBuf>,

    /// Only these transactions (comma-separated ids)
    #[arg(long, value_name = "IDS", help_heading = "Selection")]
    pub tid: Option<String>,

    /// Color only these transactions (comma-separated ids); others are greyed
    #[arg(long, value_name = "IDS", help_heading = "Selection")]
    pub ctid: Option<String>,

    /// Ignore events before this time (ISO-8601, inclusive)
    #[arg(short, long, value_name = "TIMESTAMP", help_heading = "Selection")]
    pub begin: Option<String>,

    /// Ignore events after this time (ISO-8601, inclusive)
    #[arg(short, long, value_name = "TIMESTAMP", help_heading = "Selection")]
    pub end: Option<String>,

    /// Copy every record read to FILE
    #[arg(long, value_name = "FILE")]
    pub write: Option<PathBuf>,

    /// Label spans with their timestamp instead of seconds since the first start
    #[arg(short, long)]
    pub timestamp: bool,

    /// Print the detected trace revision and exit
    #[arg(long)]
    pub detect: bool,

    /// Print detection as JSON
    #[arg(long, requires = "detect")]
    pub json: bool,

    /// Config file (default: platform config dir, or $PTVIEW_CONFIG_PATH)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_speedup(value: &str) -> Result<f64, String> {
    let speedup: f64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    if !(speedup.is_finite() && speedup > 0.0) {
        return Err("must be greater than zero".to_string());
    }
    Ok(speedup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["ptview"]).unwrap();
        assert_eq!(cli.file, PathBuf::from("-"));
        assert!(!cli.follow && !cli.realtime);
    }

    #[test]
    fn test_follow_conflicts_with_realtime() {
        let err = Cli::try_parse_from(["ptview", "-f", "--realtime", "t.csv"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_speedup_requires_realtime() {
        let err = Cli::try_parse_from(["ptview", "--speedup", "2", "t.csv"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let cli = Cli::try_parse_from(["ptview", "--realtime", "--speedup", "2.5", "t.csv"]).unwrap();
        assert_eq!(cli.speedup, Some(2.5));
    }

    #[test]
    fn test_speedup_must_be_positive() {
        assert!(Cli::try_parse_from(["ptview", "--realtime", "--speedup", "0", "t.csv"]).is_err());
        assert!(Cli::try_parse_from(["ptview", "--realtime", "--speedup", "x", "t.csv"]).is_err());
    }

    #[test]
    fn test_verbosity_counts() {
        let cli = Cli::try_parse_from(["ptview", "-vv", "t.csv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
