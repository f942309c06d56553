//! Installer facade (C6): fans the per-device install (C5) out over every
//! selected device concurrently, aggregates success/failure, and emits the
//! `install-started`/`install-finished` events (§4.6, §6).
//!
//! Grounded on `rayon`'s `into_par_iter()`, already an `adevice` dependency
//! (`fingerprint.rs` uses it for per-file digesting) — applied here at
//! per-device rather than per-file granularity, since nothing in `adevice`
//! itself fans out over multiple devices.

use crate::agent_channel::PortAllocator;
use crate::config::RunnerConfig;
use crate::error::Error;
use crate::events::{Event, EventSink, Profiler};
use crate::manifest::ExoManifest;
use crate::shell_trait::Shell;
use crate::sync::{self, DeviceInstallRequest};
use anyhow::Result;
use log::warn;
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One device targeted by an install: a label for logging/events, and the
/// `Shell` used to drive it.
pub struct DeviceTarget {
    pub label: String,
    pub shell: Box<dyn Shell + Send>,
}

/// Per-device outcome the facade collects before aggregating.
pub struct DeviceResult {
    pub label: String,
    pub profiler: Profiler,
    pub error: Option<anyhow::Error>,
}

/// Orchestrates one install across every selected device. Single-use: a
/// second call to `install` on the same instance is `Error::FacadeAlreadyUsed`
/// (§4.6: "the per-install object is single-use").
pub struct Installer {
    ports: Arc<PortAllocator>,
    agent_binary_path: String,
    used: AtomicBool,
}

impl Installer {
    pub fn new(config: &RunnerConfig) -> Installer {
        Installer {
            ports: Arc::new(PortAllocator::new(config.start_port)),
            agent_binary_path: config.agent_binary_path.clone(),
            used: AtomicBool::new(false),
        }
    }

    /// The shared, per-install port counter (§5, §9): callers construct each
    /// device's `RealShell` with a clone of this `Arc` before calling
    /// `install`, so every device draws from the same monotonically
    /// increasing sequence without a process-global `static`.
    pub fn port_allocator(&self) -> Arc<PortAllocator> {
        self.ports.clone()
    }

    /// Runs the synchronization engine on every device in `targets`, in
    /// parallel (§5 Scheduling: parallel across devices, strictly sequential
    /// within one). Returns the overall success (every device succeeded)
    /// plus each device's individual outcome.
    pub fn install(
        &self,
        targets: &mut [DeviceTarget],
        package: &str,
        manifest: &ExoManifest,
        local_apk_path: &Path,
        process_name: Option<&str>,
        sink: &dyn EventSink,
    ) -> Result<(bool, Vec<DeviceResult>)> {
        if self.used.swap(true, Ordering::SeqCst) {
            return Err(Error::FacadeAlreadyUsed.into());
        }

        sink.emit(Event::InstallStarted { target: package.to_string() });

        let results: Vec<DeviceResult> = targets
            .par_iter_mut()
            .map(|target| {
                let mut profiler = Profiler::default();
                let request = DeviceInstallRequest {
                    package,
                    manifest,
                    local_apk_path,
                    process_name,
                    agent_binary_path: &self.agent_binary_path,
                };
                let error = match sync::install_on_device(target.shell.as_mut(), &request, &mut profiler) {
                    Ok(()) => None,
                    Err(e) => {
                        warn!("install failed on {}: {e}", target.label);
                        Some(e)
                    }
                };
                DeviceResult { label: target.label.clone(), profiler, error }
            })
            .collect();

        let success = results.iter().all(|r| r.error.is_none());
        sink.emit(Event::InstallFinished { target: package.to_string(), success, package_name: package.to_string() });

        Ok((success, results))
    }
}
