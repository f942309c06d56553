//! Agent channel (C2): the port-forwarded file-transfer handshake and the
//! signature query it shares infrastructure with.
//!
//! Grounded on `rust-mobile-cargo-apk`'s `Apk::reverse_port_forwarding`/
//! `Apk::install` (`ndk-build/src/apk.rs`) for the pattern of shelling out to
//! compose a forward and checking the command result; `adevice::progress`'s
//! start/stop pairing generalized into `PortForward`'s RAII release.

use crate::config::RunnerConfig;
use crate::error::Error;
use crate::shell_trait::{DeviceConnection, ForwardHandle, ShellSession};
use log::debug;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};

/// Marker the agent writes to stdout once it is ready to read the secret key
/// back over the TCP side channel (§4.2).
const READY_MARKER: &str = "z1";

/// A process-wide (well: facade-wide — see SPEC_FULL's Open Question
/// decision) counter assigning agent ports, starting at a configured value
/// and incremented per device. Never returned to a pool; wrap-around is not
/// expected in practical use (§5 Shared resources).
pub struct PortAllocator {
    next: AtomicU16,
}

impl PortAllocator {
    pub fn new(start: u16) -> PortAllocator {
        PortAllocator { next: AtomicU16::new(start) }
    }

    pub fn allocate(&self) -> u16 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Pushes the file at `local_source` to `device_path`, implementing the
/// handshake described in §4.2:
///
/// 1. issue the shell receive-file command with the exit-status sentinel;
/// 2. wait for the agent's secret key on stdout;
/// 3. connect to the forwarded port;
/// 4. wait for the `z1` ready marker, echo the key, then stream the file;
/// 5. propagate failures (with suppressed-cause attachment when both a
///    shell and a transport error occur);
/// 6. `chmod 644` the result so the app's UID can read it.
pub fn install_file(
    conn: &dyn DeviceConnection,
    forward: &dyn ForwardHandle,
    config: &RunnerConfig,
    device_path: &str,
    local_source: &Path,
) -> Result<(), Error> {
    let contents = std::fs::read(local_source).map_err(Error::Io)?;
    let size = contents.len();
    let port = forward.local_port();

    let command =
        format!("umask 022 && {} receive-file {port} {size} {device_path} ; echo -n :$?", config.agent_binary_path);
    let mut session = conn.start_shell(&command)?;

    let transfer_result = run_transfer(&mut *session, forward, config, &contents);
    let shell_result = session.finish();

    match (transfer_result, shell_result) {
        (Ok(()), Ok(_)) => {}
        (Ok(()), Err(shell_err)) => return Err(shell_err),
        (Err(transfer_err), Ok(_)) => return Err(transfer_err),
        (Err(transfer_err), Err(shell_err)) => return Err(transfer_err.with_suppressed(shell_err)),
    }

    conn.start_shell(&format!("chmod 644 {device_path} ; echo -n :$?"))?.finish()?;
    Ok(())
}

fn run_transfer(
    session: &mut dyn ShellSession,
    forward: &dyn ForwardHandle,
    config: &RunnerConfig,
    contents: &[u8],
) -> Result<(), Error> {
    let key = session.read_stdout(config.secret_key_size)?;
    if key.len() != config.secret_key_size {
        return Err(Error::MissingSecretKey);
    }
    let mut socket = forward.connect()?;
    session.wait_for_marker(READY_MARKER)?;
    debug!("agent ready, streaming {} bytes", contents.len());
    socket.write_all(&key).map_err(Error::Io)?;
    socket.write_all(contents).map_err(Error::Io)?;
    socket.flush().map_err(Error::Io)?;
    Ok(())
}

/// Computes the agent's `get-signature` for `target_path`, trimmed. Any
/// line-break in the trimmed output is a protocol error (§4.5, §9 Open
/// Question: preserved literally, not second-guessed).
///
/// Unlike `install_file`, this needs no TCP leg — the agent writes the
/// signature straight to stdout — so it is expressed purely in terms of
/// `Shell::shell_execute`, the same primitive any other agent verb goes
/// through.
pub fn get_signature(
    shell: &mut dyn crate::shell_trait::Shell,
    agent_binary_path: &str,
    target_path: &str,
) -> Result<String, Error> {
    let raw = shell.shell_execute(&format!("{agent_binary_path} get-signature {target_path}"))?;
    let trimmed = raw.trim().to_string();
    if trimmed.contains('\r') || trimmed.contains('\n') {
        return Err(Error::SignatureHasLineBreak);
    }
    Ok(trimmed)
}
