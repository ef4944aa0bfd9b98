//! Summarize command implementation

use crate::output;
use anyhow::{Context, Result};
use calltap_shared::{read_trace_file, CallTree, Event, TreeStats};
use clap::Args;

#[derive(Args, Debug)]
pub struct SummarizeArgs {
    /// Line-format trace file
    pub path: String,

    /// Print the tree and totals as JSON instead
    #[arg(long)]
    pub json: bool,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything `summarize` reports about one trace
#[derive(Debug)]
pub struct Summary {
    pub events: usize,
    pub tree: CallTree,
    pub stats: TreeStats,
    pub monotonic: bool,
}

pub fn summarize(events: &[Event]) -> Result<Summary> {
    let tree = CallTree::from_events(events).context("Trace is not well nested")?;
    let stats = tree.stats();
    let monotonic = tree.is_monotonic();
    Ok(Summary {
        events: events.len(),
        tree,
        stats,
        monotonic,
    })
}

pub fn run(args: SummarizeArgs) -> Result<()> {
    let events = read_trace_file(&args.path)?;
    let summary = summarize(&events).with_context(|| format!("Failed to summarize {}", args.path))?;

    if args.json {
        let value = serde_json::json!({
            "events": summary.events,
            "stats": summary.stats,
            "monotonic": summary.monotonic,
            "roots": summary.tree.roots,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialize summary")?
        );
        return Ok(());
    }

    if summary.tree.is_empty() {
        output::info(&format!("{} contains no calls", args.path));
    } else {
        output::heading("Call tree");
        print!("{}", summary.tree.render());
        println!();
    }

    output::heading("Totals");
    output::field("events", summary.events);
    output::field("calls", summary.stats.calls);
    output::field("max depth", summary.stats.max_depth);
    output::field("wall time", format!("{:.9}s", summary.stats.root_wall_time));
    output::field("cpu time", format!("{:.9}s", summary.stats.root_cpu_time));
    println!();

    if summary.monotonic {
        output::success("Clocks are monotonic");
    } else {
        output::warning("Clocks go backwards somewhere in this trace");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calltap_shared::parse_trace;

    #[test]
    fn test_summary_of_nested_trace() {
        let events = parse_trace(
            "call: a.rs:1 Class new 1.0 0.5\n\
             call: BasicObject initialize 1.5 0.6\n\
             return: 2.0 0.7\n\
             return: 3.0 0.9\n\
             call: String strip 4.0 1.0\n\
             return: 4.5 1.25\n",
        )
        .unwrap();

        let summary = summarize(&events).unwrap();
        assert_eq!(summary.events, 6);
        assert_eq!(summary.stats.calls, 3);
        assert_eq!(summary.stats.max_depth, 2);
        assert!((summary.stats.root_wall_time - 2.5).abs() < 1e-9);
        assert!(summary.monotonic);
    }

    #[test]
    fn test_summary_detects_clock_regression() {
        let events = parse_trace("call: String strip 5.0 1.0\nreturn: 4.0 1.0\n").unwrap();
        assert!(!summarize(&events).unwrap().monotonic);
    }

    #[test]
    fn test_unbalanced_trace_rejected() {
        let events = parse_trace("return: 1.0 1.0\n").unwrap();
        assert!(summarize(&events).is_err());
    }
}
