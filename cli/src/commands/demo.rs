//! Demo command implementation
//!
//! Runs a small built-in workload under a real trace session so the whole
//! pipeline (fork, rendezvous, sink) can be exercised from the shell.

use crate::output;
use anyhow::{Context, Result};
use calltap_agent::{
    class_name_of_val, trace, traced, CallGuard, Config, JsonLinesSink, LineSink, Probe, Sink,
};
use calltap_shared::utils::parse_duration;
use clap::{Args, ValueEnum};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Open and close a window without calling anything
    Noop,
    /// One traced `String#strip`
    Strip,
    /// `Class#new` -> `BasicObject#initialize` -> `Special#omg`
    Nested,
    /// Recursive calls down to `--depth`
    Deep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Lines,
    Json,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Workload to trace
    #[arg(short, long, value_enum, default_value = "strip")]
    pub scenario: Scenario,

    /// Trace output file
    #[arg(short, long, default_value = "calltap.trace")]
    pub output: String,

    /// Output record format
    #[arg(short, long, value_enum, default_value = "lines")]
    pub format: Format,

    /// Recursion depth for the deep scenario
    #[arg(long, default_value = "16")]
    pub depth: u32,

    /// Startup rendezvous bound (e.g., "250ms", "5s")
    #[arg(long, env = "CALLTAP_STARTUP_TIMEOUT")]
    pub startup_timeout: Option<String>,

    /// Bound on waiting for the observer to exit
    #[arg(long, env = "CALLTAP_JOIN_TIMEOUT")]
    pub join_timeout: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn run(args: DemoArgs) -> Result<()> {
    let mut config = Config::default();
    if let Some(timeout) = &args.startup_timeout {
        config.startup_timeout =
            parse_duration(timeout).context("Failed to parse startup timeout")?;
    }
    if let Some(timeout) = &args.join_timeout {
        config.join_timeout = parse_duration(timeout).context("Failed to parse join timeout")?;
    }

    let sink: Box<dyn Sink> = match args.format {
        Format::Lines => Box::new(LineSink::new()),
        Format::Json => Box::new(JsonLinesSink::new()),
    };

    output::info(&format!(
        "Tracing {:?} scenario into {}",
        args.scenario, args.output
    ));

    let scenario = args.scenario;
    let depth = args.depth;
    let (calls, report) = trace(config, &args.output, sink, |probe| {
        run_scenario(probe, scenario, depth)
    })
    .with_context(|| format!("Trace session for {} failed", args.output))?;

    output::success(&format!(
        "Recorded {} call(s), {} event(s) delivered to {}",
        calls, report.publisher.events_sent, args.output
    ));
    if report.publisher.closed_at_stop > 0 {
        output::warning(&format!(
            "{} call(s) were still open when tracing stopped",
            report.publisher.closed_at_stop
        ));
    }
    if args.format == Format::Lines {
        output::info(&format!("Inspect with: calltap summarize {}", args.output));
    }
    Ok(())
}

/// Run the workload and return how many calls it reported
pub fn run_scenario(probe: &Probe, scenario: Scenario, depth: u32) -> u32 {
    match scenario {
        Scenario::Noop => 0,
        Scenario::Strip => {
            let _call = traced!(probe, String, "strip");
            let stripped = "  calltap  ".trim();
            debug_assert_eq!(stripped, "calltap");
            1
        }
        Scenario::Nested => {
            Special::construct(probe).omg(probe);
            3
        }
        Scenario::Deep => descend(probe, depth),
    }
}

struct Class;
struct BasicObject;

/// Displays as a different type; traces must still name it `Special`.
struct Special;

impl fmt::Display for Special {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("String")
    }
}

impl Special {
    fn construct(probe: &Probe) -> SpecialInFlight {
        let new = traced!(probe, Class, "new");
        let initialize = traced!(probe, BasicObject, "initialize");
        SpecialInFlight {
            value: Special,
            _frames: [initialize, new],
        }
    }
}

/// A `Special` whose constructor frames stay open until it is consumed
struct SpecialInFlight {
    value: Special,
    /// Innermost first
    _frames: [CallGuard; 2],
}

impl SpecialInFlight {
    fn omg(self, probe: &Probe) {
        let _call = probe.enter_named(&class_name_of_val(&self.value), "omg", file!(), line!());
        tracing::debug!("{} says omg", self.value);
    }
}

struct Recursion;

fn descend(probe: &Probe, remaining: u32) -> u32 {
    if remaining == 0 {
        return 0;
    }
    let _frame = traced!(probe, Recursion, "descend");
    1 + descend(probe, remaining - 1)
}
