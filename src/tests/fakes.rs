//! `FakeShell`: an in-memory `Shell` for tests, recording every operation
//! in `RefCell<Vec<_>>`s the way `adevice`'s own `tests/common/fakes.rs`
//! records pushes/removes/raw commands against a `FakeDevice`.

use crate::error::Error;
use crate::parsers::PackageInfo;
use crate::shell_trait::{ForwardHandle, KillOutcome, Shell};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Default)]
pub struct FakeShell {
    /// Full device paths currently "on device", mapped to their bytes.
    pub present_files: RefCell<HashMap<String, Vec<u8>>>,
    pub props: HashMap<String, String>,
    pub package_info: Option<PackageInfo>,
    /// `get-signature <path>` responses, keyed by the path passed in.
    pub signatures: HashMap<String, String>,
    pub running_processes: RefCell<HashSet<(String, String)>>,

    pub shell_commands: RefCell<Vec<String>>,
    pub pushes: RefCell<Vec<String>>,
    pub removes: RefCell<Vec<String>>,
    pub stops: RefCell<Vec<String>>,
    pub kills: RefCell<Vec<(String, String)>>,
    pub installed_apks: RefCell<Vec<PathBuf>>,
}

impl FakeShell {
    pub fn with_present_files(files: &[&str]) -> FakeShell {
        let shell = FakeShell::default();
        for f in files {
            shell.present_files.borrow_mut().insert(f.to_string(), Vec::new());
        }
        shell
    }

    pub fn mark_running(&mut self, package: &str, process: &str) {
        self.running_processes.borrow_mut().insert((package.to_string(), process.to_string()));
    }
}

impl Shell for FakeShell {
    fn shell_execute(&mut self, command: &str) -> Result<String, Error> {
        self.shell_commands.borrow_mut().push(command.to_string());

        if let Some(path) = command.strip_prefix("agent get-signature ") {
            return self
                .signatures
                .get(path)
                .cloned()
                .ok_or_else(|| Error::ShellNonZero { status: 1, output: format!("no such file {path}") });
        }

        if let Some((cd_part, rm_part)) = command.split_once(" && rm ") {
            let dir = cd_part.strip_prefix("cd ").unwrap_or(cd_part);
            for name in rm_part.split(' ').filter(|s| !s.is_empty()) {
                let full = format!("{dir}/{name}");
                self.present_files.borrow_mut().remove(&full);
                self.removes.borrow_mut().push(full);
            }
            return Ok(String::new());
        }

        // "umask 022 && agent mkdir-p <path>" and anything else unrecognized
        // is a no-op success — the fake has no real directory concept.
        Ok(String::new())
    }

    fn push_file(&mut self, device_path: &str, local_source: &Path) -> Result<(), Error> {
        let contents = std::fs::read(local_source).map_err(Error::Io)?;
        self.present_files.borrow_mut().insert(device_path.to_string(), contents);
        self.pushes.borrow_mut().push(device_path.to_string());
        Ok(())
    }

    fn list_dir(&mut self, root: &str) -> Result<Vec<String>, Error> {
        let prefix = format!("{root}/");
        let mut entries: Vec<String> = self
            .present_files
            .borrow()
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix).map(|s| s.to_string()))
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn get_prop(&mut self, name: &str) -> Result<Option<String>, Error> {
        Ok(self.props.get(name).cloned())
    }

    fn get_package_info(&mut self, _package: &str) -> Result<Option<PackageInfo>, Error> {
        Ok(self.package_info.clone())
    }

    fn install_apk(&mut self, local_apk_path: &Path) -> Result<(), Error> {
        self.installed_apks.borrow_mut().push(local_apk_path.to_path_buf());
        Ok(())
    }

    fn stop(&mut self, package: &str) -> Result<(), Error> {
        self.stops.borrow_mut().push(package.to_string());
        Ok(())
    }

    fn kill(&mut self, package: &str, process: &str) -> Result<KillOutcome, Error> {
        let key = (package.to_string(), process.to_string());
        if self.running_processes.borrow_mut().remove(&key) {
            self.kills.borrow_mut().push(key);
            Ok(KillOutcome::Killed)
        } else {
            Ok(KillOutcome::NotRunning)
        }
    }

    fn forward(&mut self, _local_port: u16) -> Result<Box<dyn ForwardHandle>, Error> {
        Err(Error::MissingMarker("FakeShell does not support real port forwarding".to_string()))
    }

    fn read_file(&mut self, device_path: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.present_files.borrow().get(device_path).cloned())
    }
}
