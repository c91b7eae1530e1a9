//! Process-wide crash guard.
//!
//! A panic inside a request handler or a spawned task is the Rust counterpart of an
//! unhandled asynchronous error. Tokio isolates such panics and keeps the process
//! running, which can leave shared state half-updated. The guard installs a panic
//! hook that applies a [`CrashPolicy`] instead, by default logging and exiting.
//!
//! The hook itself is registered once per process. Installing a guard again only
//! swaps the active policy, so the most recent installation wins.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Once, RwLock};

use tracing::error;

use crate::config::Environment;

type Handler = Arc<dyn Fn(&str) + Send + Sync>;

static HOOK: Once = Once::new();
static ACTIVE: RwLock<Option<Handler>> = RwLock::new(None);

/// What to do when a panic escapes to the process.
#[derive(Clone, Default)]
pub enum CrashPolicy {
    /// Leave the default panic behavior alone.
    #[default]
    Disabled,
    /// Log the panic and exit with status 1.
    ExitProcess,
    /// Run a caller supplied handler with the panic message.
    Custom(Handler),
}

impl CrashPolicy {
    /// Default policy: disabled under test, fail fast everywhere else.
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_test() {
            CrashPolicy::Disabled
        } else {
            CrashPolicy::ExitProcess
        }
    }

    /// Build a custom policy from a closure.
    pub fn custom<F>(handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        CrashPolicy::Custom(Arc::new(handler))
    }

    /// Whether this policy installs anything.
    pub fn is_disabled(&self) -> bool {
        matches!(self, CrashPolicy::Disabled)
    }
}

impl fmt::Debug for CrashPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrashPolicy::Disabled => f.write_str("Disabled"),
            CrashPolicy::ExitProcess => f.write_str("ExitProcess"),
            CrashPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn exit_process(message: &str) {
    error!(panic = %message, "unhandled error, terminating process");
    std::process::exit(1);
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}

/// Install the guard for `policy`. Returns `false` when the policy is disabled.
pub fn install_crash_guard(policy: &CrashPolicy) -> bool {
    let handler: Handler = match policy {
        CrashPolicy::Disabled => return false,
        CrashPolicy::ExitProcess => Arc::new(exit_process),
        CrashPolicy::Custom(handler) => handler.clone(),
    };

    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            previous(info);

            let active = ACTIVE.read().ok().and_then(|guard| guard.clone());
            if let Some(handler) = active {
                let mut message = payload_message(info.payload());
                if let Some(location) = info.location() {
                    message = format!("{message} at {location}");
                }
                handler(&message);
            }
        }));
    });

    match ACTIVE.write() {
        Ok(mut active) => {
            *active = Some(handler);
            true
        }
        Err(_) => false,
    }
}

/// Deactivate the guard. The hook stays registered but does nothing.
pub fn clear_crash_guard() {
    if let Ok(mut active) = ACTIVE.write() {
        *active = None;
    }
}

/// Whether a guard is currently active.
pub fn is_installed() -> bool {
    ACTIVE.read().map(|active| active.is_some()).unwrap_or(false)
}
