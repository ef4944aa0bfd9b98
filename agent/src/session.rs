//! Session lifecycle: fork the observer, rendezvous, then trace in windows.

use crate::config::Config;
use crate::error::{ObserverExit, Result, TraceError};
use crate::observer::{run_observer, spawn_observer, ObserverHandle};
use crate::probe::{HookHandle, Probe};
use crate::publisher::{Publisher, PublisherStats};
use crate::sink::Sink;
use std::cell::{RefCell, RefMut};
use std::rc::Rc;
use tracing::{debug, info};

/// Outcome of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub publisher: PublisherStats,
    pub observer: ObserverExit,
}

pub struct Session {
    publisher: Rc<RefCell<Publisher>>,
    observer: ObserverHandle,
    hooks: HookHandle,
    config: Config,
    window: Option<String>,
}

impl Session {
    /// Fork an observer that feeds `sink`, bind the publisher and block until
    /// both sides are connected.
    pub fn init<S: Sink>(config: Config, mut sink: S) -> Result<Self> {
        config
            .validate()
            .map_err(|e| TraceError::Config(e.to_string()))?;

        let child_config = config.clone();
        let observer = spawn_observer(move |rendezvous| {
            run_observer(&child_config, &mut sink, rendezvous)
        })?;
        Self::connect(config, observer)
    }

    /// Bind the publisher for a freshly spawned `observer` and rendezvous.
    ///
    /// If the observer gives up first, its exit status is reported instead of
    /// the bare `PeerGone`.
    fn connect(config: Config, mut observer: ObserverHandle) -> Result<Self> {
        let mut publisher = Publisher::init(observer.identity(), &config)?;
        if let Err(e) = publisher.wait_for_subscriber(observer.port_mut()) {
            debug!("Rendezvous with observer {} failed: {}", observer.pid(), e);
            if matches!(e, TraceError::PeerGone(_)) {
                match observer.join(config.join_timeout) {
                    Ok(ObserverExit::Clean) => {}
                    Ok(exit) => return Err(TraceError::Observer(exit)),
                    Err(join_error) => debug!("Observer did not exit: {}", join_error),
                }
            }
            return Err(e);
        }

        info!("Trace session ready (observer {})", observer.pid());

        Ok(Self {
            publisher: Rc::new(RefCell::new(publisher)),
            observer,
            hooks: HookHandle::new(),
            config,
            window: None,
        })
    }

    pub fn observer_pid(&self) -> nix::unistd::Pid {
        self.observer.pid()
    }

    pub fn is_tracing(&self) -> bool {
        self.window.is_some()
    }

    /// Open a trace window writing to `output_target` and install the feed.
    pub fn start(&mut self, output_target: &str) -> Result<Probe> {
        if let Some(open) = &self.window {
            return Err(TraceError::Session(format!(
                "trace window for {} is already open",
                open
            )));
        }

        self.publisher_mut()?.begin_trace(output_target)?;
        self.hooks.install();
        self.window = Some(output_target.to_string());
        info!("Tracing started: {}", output_target);

        Ok(self.probe())
    }

    /// Another handle on the instrumentation feed
    pub fn probe(&self) -> Probe {
        Probe::new(self.publisher.clone(), self.hooks.clone())
    }

    /// Uninstall the feed and close the current trace window.
    pub fn stop(&mut self) -> Result<()> {
        let target = self
            .window
            .take()
            .ok_or_else(|| TraceError::Session("no trace window is open".to_string()))?;

        self.hooks.uninstall();
        self.publisher_mut()?.end_trace()?;
        info!("Tracing stopped: {}", target);
        Ok(())
    }

    /// End the session and wait for the observer to exit.
    ///
    /// An abnormal observer exit takes precedence over a local publish error,
    /// since it names the reason the channel broke.
    pub fn finish(mut self) -> Result<SessionReport> {
        let stopped = if self.window.is_some() {
            self.stop()
        } else {
            Ok(())
        };
        self.hooks.uninstall();

        let shutdown = self.publisher_mut()?.shutdown();
        let exit = self.observer.join(self.config.join_timeout)?;
        if exit != ObserverExit::Clean {
            return Err(TraceError::Observer(exit));
        }
        stopped?;
        let publisher = shutdown?;

        info!(
            "Trace session finished: {} events delivered",
            publisher.events_sent
        );

        Ok(SessionReport {
            publisher,
            observer: exit,
        })
    }

    fn publisher_mut(&self) -> Result<RefMut<'_, Publisher>> {
        self.publisher.try_borrow_mut().map_err(|_| {
            TraceError::Session("session used from inside an instrumentation callback".to_string())
        })
    }
}
