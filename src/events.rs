//! Events emitted around an install (§6) and scoped performance timing.
//!
//! `adevice` has no telemetry bus in its retrieved sources beyond the
//! out-of-scope Clearcut metrics client (`adevice::metrics` +
//! `adevice_proto`, named out of scope by §1) — what it does have is
//! `adevice::Profiler`'s plain `Duration` fields and the `time!` macro that
//! fills them in. This crate keeps that shape (a struct of named durations,
//! filled in by a timing helper) instead of reintroducing a metrics client.

use std::time::{Duration, Instant};

/// A target identifier for `install-started`/`install-finished` (§6);
/// kept abstract since device discovery/selection is out of scope (§1).
pub type Target = String;

#[derive(Debug, Clone)]
pub enum Event {
    InstallStarted { target: Target },
    InstallFinished { target: Target, success: bool, package_name: String },
}

/// A sink events are reported to. The demo binary logs them; embedders can
/// supply their own (a channel, a UI update, ...).
pub trait EventSink {
    fn emit(&self, event: Event);
}

/// Logs every event at `info!`, matching `adevice`'s own choice to report
/// progress through `log`/`env_logger` rather than a dedicated bus.
pub struct LoggingEventSink;

impl EventSink for LoggingEventSink {
    fn emit(&self, event: Event) {
        match event {
            Event::InstallStarted { target } => log::info!("install-started {target}"),
            Event::InstallFinished { target, success, package_name } => {
                log::info!("install-finished {target} package={package_name} success={success}")
            }
        }
    }
}

/// Scoped phase durations recorded around a single device install (§6):
/// package-info query, signature check, per-class multi-install, per-file
/// install, and app-kill.
#[derive(Debug, Clone, Default)]
pub struct Profiler {
    pub package_info_query: Duration,
    pub signature_check: Duration,
    pub per_class_install: Duration,
    pub per_file_install: Duration,
    pub app_kill: Duration,
}

/// Times `f`, adding its elapsed duration into `*slot`. Mirrors
/// `adevice::time!`'s "wrap a block, stash the elapsed time" shape, as a
/// function instead of a macro since this crate has no profiler-field-path
/// argument to splice in.
pub fn timed<T>(slot: &mut Duration, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let result = f();
    *slot += start.elapsed();
    result
}
