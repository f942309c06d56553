//! `FakeShell`: an in-memory device for the whole-program tests in this
//! directory, in the spirit of `adevice`'s `tests/common/fakes.rs` — richer
//! bookkeeping than the unit-test fake in `src/tests/fakes.rs` (which stays
//! private to the crate), since these tests assert on the full shell
//! command trace rather than just individual calls.

use exosync::error::Error;
use exosync::parsers::PackageInfo;
use exosync::shell_trait::{ForwardHandle, KillOutcome, Shell};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

#[derive(Default)]
pub struct FakeShell {
    pub present_files: RefCell<HashMap<String, Vec<u8>>>,
    pub props: RefCell<HashMap<String, String>>,
    pub package_info: RefCell<Option<PackageInfo>>,
    pub signatures: RefCell<HashMap<String, String>>,
    pub running: RefCell<HashMap<(String, String), bool>>,

    pub commands: RefCell<Vec<String>>,
    pub pushes: RefCell<Vec<String>>,
    pub removes: RefCell<Vec<String>>,
    pub stops: RefCell<Vec<String>>,
    pub install_count: RefCell<u32>,
}

impl FakeShell {
    pub fn new() -> FakeShell {
        FakeShell::default()
    }

    pub fn with_file(self, device_path: &str, contents: &[u8]) -> FakeShell {
        self.present_files.borrow_mut().insert(device_path.to_string(), contents.to_vec());
        self
    }

    pub fn set_prop(&self, name: &str, value: &str) {
        self.props.borrow_mut().insert(name.to_string(), value.to_string());
    }

    pub fn set_signature(&self, path: &str, signature: &str) {
        self.signatures.borrow_mut().insert(path.to_string(), signature.to_string());
    }

    pub fn set_package_info(&self, info: PackageInfo) {
        *self.package_info.borrow_mut() = Some(info);
    }

    /// A path currently present on the device, relative to the staging root
    /// given (e.g. `"secondary-dex/h1.dex.jar"` under
    /// `/data/local/tmp/exopackage/com.example.app`).
    pub fn has_file(&self, root: &str, relative: &str) -> bool {
        self.present_files.borrow().contains_key(&format!("{root}/{relative}"))
    }

    pub fn file_contents(&self, root: &str, relative: &str) -> Vec<u8> {
        self.present_files.borrow().get(&format!("{root}/{relative}")).cloned().unwrap_or_default()
    }

    pub fn removes(&self) -> Vec<String> {
        self.removes.borrow().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    pub fn stops(&self) -> Vec<String> {
        self.stops.borrow().clone()
    }
}

impl Shell for FakeShell {
    fn shell_execute(&mut self, command: &str) -> Result<String, Error> {
        self.commands.borrow_mut().push(command.to_string());

        if let Some(path) = command.strip_prefix("agent get-signature ") {
            return self
                .signatures
                .borrow()
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
        Ok(self.props.borrow().get(name).cloned())
    }

    fn get_package_info(&mut self, _package: &str) -> Result<Option<PackageInfo>, Error> {
        Ok(self.package_info.borrow().clone())
    }

    fn install_apk(&mut self, _local_apk_path: &Path) -> Result<(), Error> {
        *self.install_count.borrow_mut() += 1;
        Ok(())
    }

    fn stop(&mut self, package: &str) -> Result<(), Error> {
        self.stops.borrow_mut().push(package.to_string());
        Ok(())
    }

    fn kill(&mut self, package: &str, process: &str) -> Result<KillOutcome, Error> {
        let key = (package.to_string(), process.to_string());
        match self.running.borrow_mut().remove(&key) {
            Some(true) => Ok(KillOutcome::Killed),
            _ => Ok(KillOutcome::NotRunning),
        }
    }

    fn forward(&mut self, _local_port: u16) -> Result<Box<dyn ForwardHandle>, Error> {
        Err(Error::MissingMarker("FakeShell does not support real port forwarding".to_string()))
    }

    fn read_file(&mut self, device_path: &str) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.present_files.borrow().get(device_path).cloned())
    }
}
