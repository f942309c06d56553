//! The device capability trait (§9 "Polymorphism over device types") and
//! the lower-level connection primitive `RealShell` is built on.
//!
//! Grounded on `adevice::adevice::{Host, Device}` for the shape of "a small
//! trait describing what the installer needs from a device", generalized
//! here into the exact nine operations §9 lists so a fake (in-process, for
//! tests) and a real implementation (over a forwarded shell + TCP socket)
//! can share one call surface.

use crate::error::Error;
use crate::parsers::PackageInfo;
use std::net::TcpStream;
use std::path::Path;

/// Outcome of a targeted process kill (§9 REDESIGN FLAG): replaces the
/// original "catch an exception whose message happens to say `No such
/// process`" control flow with a real three-valued result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KillOutcome {
    Killed,
    NotRunning,
}

/// A live port forward, released when dropped. `connect` opens a new TCP
/// connection to the device side of the forward.
pub trait ForwardHandle: Send {
    fn connect(&self) -> Result<TcpStream, Error>;
    fn local_port(&self) -> u16;
}

/// A shell command in flight. Shell commands that drive the agent's
/// `receive-file` handshake (§4.2) need to read a prefix of stdout (the
/// secret key, then the `z1` marker) *before* the command exits — the
/// command only exits after the host has finished streaming the file over
/// the TCP side channel. Plain commands just call `finish` immediately.
pub trait ShellSession: Send {
    /// Blocks until at least `n` bytes of stdout have been produced and
    /// returns exactly that many.
    fn read_stdout(&mut self, n: usize) -> Result<Vec<u8>, Error>;

    /// Blocks until `marker` has appeared in stdout, consuming through it.
    fn wait_for_marker(&mut self, marker: &str) -> Result<(), Error>;

    /// Waits for the command to exit, verifies and strips the `:$?`
    /// sentinel, and returns the stdout collected before it.
    fn finish(self: Box<Self>) -> Result<String, Error>;
}

/// The raw transport a `RealShell` drives: start a shell command (returning
/// a session that can be read incrementally before it exits), or forward a
/// local TCP port to the device. `RealShell` is deliberately agnostic about
/// how this is implemented — tests can substitute a loopback listener
/// instead of a real device.
pub trait DeviceConnection: Send {
    fn start_shell(&self, command: &str) -> Result<Box<dyn ShellSession>, Error>;
    fn open_forward(&self, local_port: u16) -> Result<Box<dyn ForwardHandle>, Error>;
}

/// Everything the synchronization engine (C5) and the exo helpers (C4) need
/// from a device, independent of whether it is real or faked in tests.
pub trait Shell {
    /// Runs `command` as a single shell invocation, appending the
    /// `; echo -n :$?` exit-status sentinel, verifying it, and stripping it
    /// before returning. Returns `Err(Error::ShellNonZero)` on a non-zero
    /// exit status (§4.1).
    fn shell_execute(&mut self, command: &str) -> Result<String, Error>;

    /// Pushes the file at `local_source` to `device_path` on the device,
    /// via the agent's `receive-file` handshake (§4.2).
    fn push_file(&mut self, device_path: &str, local_source: &Path) -> Result<(), Error>;

    /// Lists every regular-file path under `root`, device-relative, sorted.
    fn list_dir(&mut self, root: &str) -> Result<Vec<String>, Error>;

    /// Reads a device system property, or `None` if unset.
    fn get_prop(&mut self, name: &str) -> Result<Option<String>, Error>;

    /// Looks up `package`'s install info, or `None` if not installed.
    fn get_package_info(&mut self, package: &str) -> Result<Option<PackageInfo>, Error>;

    /// Installs the full package at `local_apk_path` (the full-reinstall
    /// path taken when `should_app_be_installed` says yes).
    fn install_apk(&mut self, local_apk_path: &Path) -> Result<(), Error>;

    /// Force-stops `package`.
    fn stop(&mut self, package: &str) -> Result<(), Error>;

    /// Kills `process` running under `package`'s UID via `run-as`.
    fn kill(&mut self, package: &str, process: &str) -> Result<KillOutcome, Error>;

    /// Forwards `local_port` on the host to the same port on the device.
    fn forward(&mut self, local_port: u16) -> Result<Box<dyn ForwardHandle>, Error>;

    /// Reads the full contents of `device_path`, or `None` if it does not
    /// exist. Metadata files are not hash-addressed (§3), so their device
    /// path alone does not establish they are up to date; this lets the
    /// synchronization engine compare bytes before deciding to re-push one.
    fn read_file(&mut self, device_path: &str) -> Result<Option<Vec<u8>>, Error>;
}
