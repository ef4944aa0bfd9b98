//! Instrumentation feed handed to the traced program
//!
//! A [`Probe`] is the only way the host reports calls and returns. It is tied
//! to the thread that created its session (`Rc`-based, so `!Send`), which keeps
//! positional call/return matching sound.

use crate::publisher::Publisher;
use crate::type_identity::class_name_of;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Install state of the instrumentation feed, shared by a session and its probes
#[derive(Debug, Clone, Default)]
pub struct HookHandle(Rc<Cell<bool>>);

impl HookHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self) {
        self.0.set(true);
    }

    pub fn uninstall(&self) {
        self.0.set(false);
    }

    pub fn is_installed(&self) -> bool {
        self.0.get()
    }
}

#[derive(Clone)]
pub struct Probe {
    publisher: Rc<RefCell<Publisher>>,
    hooks: HookHandle,
}

impl Probe {
    pub(crate) fn new(publisher: Rc<RefCell<Publisher>>, hooks: HookHandle) -> Self {
        Self { publisher, hooks }
    }

    pub fn is_installed(&self) -> bool {
        self.hooks.is_installed()
    }

    /// Report a method call. Returns whether the event was published; it is
    /// not while the feed is uninstalled or when the call re-enters the probe.
    pub fn on_call(
        &self,
        class_name: &str,
        method_name: &str,
        source_file: Option<&str>,
        source_line: Option<u32>,
    ) -> bool {
        if !self.hooks.is_installed() {
            return false;
        }
        match self.publisher.try_borrow_mut() {
            Ok(mut publisher) => {
                publisher.on_call(class_name, method_name, source_file, source_line);
                true
            }
            Err(_) => {
                debug!("Dropped re-entrant call {}#{}", class_name, method_name);
                false
            }
        }
    }

    /// Report a return from the most recent unmatched call
    pub fn on_return(&self) -> bool {
        if !self.hooks.is_installed() {
            return false;
        }
        match self.publisher.try_borrow_mut() {
            Ok(mut publisher) => {
                publisher.on_return();
                true
            }
            Err(_) => {
                debug!("Dropped re-entrant return");
                false
            }
        }
    }

    fn return_in(&self, window: Option<u64>) -> bool {
        match self.publisher.try_borrow_mut() {
            Ok(mut publisher) => {
                publisher.on_return_in(window);
                true
            }
            Err(_) => {
                debug!("Dropped re-entrant return");
                false
            }
        }
    }

    /// Report a call on `T` and return a guard that reports the matching
    /// return when dropped.
    pub fn enter<T: ?Sized>(&self, method_name: &str, source_file: &str, source_line: u32) -> CallGuard {
        self.enter_named(&class_name_of::<T>(), method_name, source_file, source_line)
    }

    /// Like [`Probe::enter`] for hosts that already know the class name
    pub fn enter_named(
        &self,
        class_name: &str,
        method_name: &str,
        source_file: &str,
        source_line: u32,
    ) -> CallGuard {
        let published = self.on_call(class_name, method_name, Some(source_file), Some(source_line));
        let window = self.publisher.try_borrow().ok().and_then(|p| p.window());
        CallGuard {
            probe: published.then(|| self.clone()),
            window,
        }
    }
}

/// Reports a return when dropped, if its call was published.
///
/// The return is emitted even if the feed was uninstalled in between, as long
/// as the call's trace window is still open. A window that closes first ends
/// the call itself.
#[must_use = "the call ends when the guard is dropped"]
pub struct CallGuard {
    probe: Option<Probe>,
    window: Option<u64>,
}

impl CallGuard {
    pub fn is_recording(&self) -> bool {
        self.probe.is_some()
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.take() {
            probe.return_in(self.window);
        }
    }
}

/// Trace a call on a type for the rest of the enclosing scope.
///
/// ```ignore
/// let _call = calltap_agent::traced!(probe, String, "strip");
/// ```
#[macro_export]
macro_rules! traced {
    ($probe:expr, $ty:ty, $method:expr) => {
        $probe.enter::<$ty>($method, file!(), line!())
    };
}
