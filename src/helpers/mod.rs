//! Exo helpers (C4): pure functions from manifest blocks (plus, for native
//! libraries, the device's ABI preference) to the two maps every block
//! produces — `files_to_install` and `metadata_to_install` (§3, §4.4).
//!
//! Grounded on `adevice::commands::compose` for the "turn a diff into two
//! maps of device-relative-path keyed actions" shape.

pub mod dex;
pub mod native;
pub mod resources;

use std::collections::HashMap;
use std::path::PathBuf;

/// One block's contribution to the desired state: files to push, and
/// metadata files to write alongside them.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub files_to_install: HashMap<String, PathBuf>,
    pub metadata_to_install: HashMap<String, Vec<u8>>,
}

impl Plan {
    pub fn merge(mut self, other: Plan) -> Plan {
        self.files_to_install.extend(other.files_to_install);
        self.metadata_to_install.extend(other.metadata_to_install);
        self
    }
}
