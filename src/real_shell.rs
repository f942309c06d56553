//! `RealShell`: the `Shell` implementation that drives an actual device
//! through a `DeviceConnection` (C1/C2/C3 wired together).
//!
//! Grounded on `adevice::device::RealDevice` for the "one struct wrapping a
//! transport, exposing the capability trait" shape, and its
//! `run_raw_adb_command`'s exit-status-suffix convention (§4.1).

use crate::agent_channel::{self, PortAllocator};
use crate::config::RunnerConfig;
use crate::error::Error;
use crate::parsers::{self, PackageInfo};
use crate::shell_trait::{DeviceConnection, ForwardHandle, KillOutcome, Shell};
use log::{info, warn};
use std::path::Path;

pub struct RealShell {
    conn: Box<dyn DeviceConnection>,
    config: RunnerConfig,
    ports: std::sync::Arc<PortAllocator>,
}

impl RealShell {
    pub fn new(conn: Box<dyn DeviceConnection>, config: RunnerConfig, ports: std::sync::Arc<PortAllocator>) -> RealShell {
        RealShell { conn, config, ports }
    }
}

impl Shell for RealShell {
    fn shell_execute(&mut self, command: &str) -> Result<String, Error> {
        info!("shell: {command}");
        let suffixed = format!("{command} ; echo -n :$?");
        self.conn.start_shell(&suffixed)?.finish()
    }

    fn push_file(&mut self, device_path: &str, local_source: &Path) -> Result<(), Error> {
        let port = self.ports.allocate();
        let forward = self.conn.open_forward(port)?;
        info!("pushing {} -> {device_path}", local_source.display());
        let result = agent_channel::install_file(&*self.conn, &*forward, &self.config, device_path, local_source);
        drop(forward);
        result
    }

    fn list_dir(&mut self, root: &str) -> Result<Vec<String>, Error> {
        let output = self.shell_execute(&format!("ls -R {root} | cat"))?;
        parsers::list_dir_recursive(root, &output)
    }

    fn get_prop(&mut self, name: &str) -> Result<Option<String>, Error> {
        let output = self.shell_execute(&format!("getprop {name}"))?;
        let trimmed = output.trim();
        Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
    }

    fn get_package_info(&mut self, package: &str) -> Result<Option<PackageInfo>, Error> {
        let path_output = self.shell_execute(&format!("pm path {package}"))?;
        let dump_output = self.shell_execute(&format!("dumpsys package {package}"))?;
        let combined = format!("{path_output}\n{dump_output}");
        parsers::parse_path_and_package_info(package, &combined)
    }

    fn install_apk(&mut self, local_apk_path: &Path) -> Result<(), Error> {
        let device_path = "/data/local/tmp/exopackage-agent-install.apk";
        self.push_file(device_path, local_apk_path)?;
        self.shell_execute(&format!("pm install -r {device_path}"))?;
        Ok(())
    }

    fn stop(&mut self, package: &str) -> Result<(), Error> {
        self.shell_execute(&format!("am force-stop {package}"))?;
        Ok(())
    }

    fn kill(&mut self, package: &str, process: &str) -> Result<KillOutcome, Error> {
        match self.shell_execute(&format!("run-as {package} killall {process}")) {
            Ok(_) => Ok(KillOutcome::Killed),
            Err(Error::ShellNonZero { output, .. }) if output.contains("No such process") => {
                warn!("{process} was not running under {package}");
                Ok(KillOutcome::NotRunning)
            }
            Err(e) => Err(e),
        }
    }

    fn forward(&mut self, local_port: u16) -> Result<Box<dyn ForwardHandle>, Error> {
        self.conn.open_forward(local_port)
    }

    fn read_file(&mut self, device_path: &str) -> Result<Option<Vec<u8>>, Error> {
        match self.shell_execute(&format!("cat {device_path}")) {
            Ok(output) => Ok(Some(output.into_bytes())),
            Err(Error::ShellNonZero { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
