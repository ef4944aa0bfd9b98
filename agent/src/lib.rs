//! calltap agent library
//!
//! Records method calls and returns of a single-threaded traced program. The
//! traced process embeds a [`Publisher`]; events are delivered over a local
//! socket to an observer process forked at session start, which hands them to
//! a [`Sink`].
//!
//! ```no_run
//! use calltap_agent::{trace, traced, Config, LineSink};
//!
//! let (trimmed, _report) = trace(Config::default(), "trace.txt", LineSink::new(), |probe| {
//!     let _call = traced!(probe, String, "strip");
//!     " padded ".trim().to_string()
//! })?;
//! assert_eq!(trimmed, "padded");
//! # Ok::<(), calltap_agent::TraceError>(())
//! ```

pub mod clock;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod observer;
pub mod output;
pub mod probe;
pub mod publisher;
pub mod retry;
pub mod session;
pub mod sink;
pub mod subscriber;
pub mod type_identity;

pub use config::Config;
pub use error::{ObserverExit, Result, Side, SinkError, TraceError};
pub use output::{JsonLinesSink, LineSink};
pub use probe::{CallGuard, HookHandle, Probe};
pub use publisher::{Publisher, PublisherStats};
pub use session::{Session, SessionReport};
pub use sink::{NullSink, Sink};
pub use subscriber::{SessionStats, Subscriber, Termination};
pub use type_identity::{class_name_of, class_name_of_val};

/// Run `f` inside a single trace window written to `output_target`.
///
/// Forks the observer, waits for the rendezvous, opens the window, runs `f`
/// with the probe, then closes the window and joins the observer. An observer
/// failure is reported in preference to the publish error it caused.
pub fn trace<S, F, R>(config: Config, output_target: &str, sink: S, f: F) -> Result<(R, SessionReport)>
where
    S: Sink,
    F: FnOnce(&Probe) -> R,
{
    let mut session = Session::init(config, sink)?;
    let probe = session.start(output_target)?;
    let value = f(&probe);
    let stopped = session.stop();
    let report = session.finish()?;
    stopped?;
    Ok((value, report))
}
