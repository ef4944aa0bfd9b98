//! Error types for trace sessions
//!
//! Using thiserror for automatic Display implementation and error chaining.

use calltap_shared::DecodeError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which end of the pipeline detected a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Publisher,
    Subscriber,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Publisher => f.write_str("publisher"),
            Side::Subscriber => f.write_str("subscriber"),
        }
    }
}

/// Failure reported by a sink callback
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink received {0} outside of a trace window")]
    NotStarted(&'static str),

    #[error("sink already started for {0}")]
    AlreadyStarted(String),

    #[error("failed to open sink output {target}: {source}")]
    Open {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// How the observer process ended, decoded from its exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverExit {
    Clean,
    StartupFailed,
    DecodeFailed,
    SinkFailed,
    Failed(i32),
    Signaled(i32),
}

impl ObserverExit {
    pub const CLEAN: i32 = 0;
    pub const OTHER: i32 = 1;
    pub const STARTUP: i32 = 2;
    pub const DECODE: i32 = 3;
    pub const SINK: i32 = 4;

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::CLEAN => ObserverExit::Clean,
            Self::STARTUP => ObserverExit::StartupFailed,
            Self::DECODE => ObserverExit::DecodeFailed,
            Self::SINK => ObserverExit::SinkFailed,
            other => ObserverExit::Failed(other),
        }
    }

    /// Exit code the observer uses to report `err` to its parent
    pub fn code_for(err: &TraceError) -> i32 {
        match err {
            TraceError::Connection { .. }
            | TraceError::StartupTimeout { .. }
            | TraceError::PeerGone(_)
            | TraceError::Handshake(_) => Self::STARTUP,
            TraceError::Decode(_) => Self::DECODE,
            TraceError::Sink(_) => Self::SINK,
            _ => Self::OTHER,
        }
    }
}

impl fmt::Display for ObserverExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObserverExit::Clean => f.write_str("exited cleanly"),
            ObserverExit::StartupFailed => f.write_str("failed during startup rendezvous"),
            ObserverExit::DecodeFailed => f.write_str("aborted on a malformed message"),
            ObserverExit::SinkFailed => f.write_str("aborted on a sink failure"),
            ObserverExit::Failed(code) => write!(f, "exited with status {}", code),
            ObserverExit::Signaled(sig) => write!(f, "was killed by signal {}", sig),
        }
    }
}

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("failed to establish channel endpoint {endpoint}: {source}")]
    Connection {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{side} did not reach the startup rendezvous within {waited:?}")]
    StartupTimeout { side: Side, waited: Duration },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error("invalid handshake transition: {0}")]
    Handshake(String),

    #[error("rendezvous peer of the {0} closed the channel before connecting")]
    PeerGone(Side),

    #[error("failed to publish to the observer: {0}")]
    Publish(#[source] std::io::Error),

    #[error("observer process {0}")]
    Observer(ObserverExit),

    #[error("observer process did not exit within {0:?}")]
    JoinTimeout(Duration),

    #[error("failed to manage observer process: {0}")]
    Spawn(#[from] nix::Error),

    #[error("invalid session state: {0}")]
    Session(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = TraceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_timeout_display() {
        let err = TraceError::StartupTimeout {
            side: Side::Subscriber,
            waited: Duration::from_millis(250),
        };
        assert_eq!(
            err.to_string(),
            "subscriber did not reach the startup rendezvous within 250ms"
        );
    }

    #[test]
    fn test_exit_codes_roundtrip_through_observer_exit() {
        let decode = TraceError::Decode(DecodeError::UnknownKind {
            tag: 9,
            preview: String::new(),
        });
        assert_eq!(
            ObserverExit::from_code(ObserverExit::code_for(&decode)),
            ObserverExit::DecodeFailed
        );

        let sink = TraceError::Sink(SinkError::NotStarted("call"));
        assert_eq!(
            ObserverExit::from_code(ObserverExit::code_for(&sink)),
            ObserverExit::SinkFailed
        );

        let timeout = TraceError::StartupTimeout {
            side: Side::Subscriber,
            waited: Duration::from_secs(1),
        };
        assert_eq!(
            ObserverExit::from_code(ObserverExit::code_for(&timeout)),
            ObserverExit::StartupFailed
        );

        assert_eq!(ObserverExit::from_code(77), ObserverExit::Failed(77));
    }
}
