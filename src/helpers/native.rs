//! Native-library helper (§4.4): selects the ABIs the app ships that the
//! device also supports, in the device's preferred order, then emits
//! libraries at `native-libs/<abi>/<hash>.so` plus a per-ABI `metadata.txt`
//! and a top-level `metadata.txt` recording the selected ABIs.
//!
//! The only device I/O any exo helper performs (§4.4): reading the device's
//! ABI preference list.

use super::Plan;
use crate::error::Error;
use crate::manifest::NativeBlock;
use crate::parsers::serialize_metadata;
use crate::shell_trait::Shell;

const DIR: &str = "native-libs";

/// Queries `ro.product.cpu.abilist`, falling back to
/// `ro.product.cpu.abi` (+ optional `ro.product.cpu.abi2`) on older devices
/// that don't report the combined list (§4.4).
pub fn device_abi_preference(shell: &mut dyn Shell) -> Result<Vec<String>, Error> {
    if let Some(list) = shell.get_prop("ro.product.cpu.abilist")? {
        let abis: Vec<String> = list.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        if !abis.is_empty() {
            return Ok(abis);
        }
    }
    let mut abis = Vec::new();
    if let Some(abi) = shell.get_prop("ro.product.cpu.abi")? {
        abis.push(abi);
    }
    if let Some(abi2) = shell.get_prop("ro.product.cpu.abi2")? {
        abis.push(abi2);
    }
    Ok(abis)
}

/// Builds the plan given an already-queried device ABI preference list, so
/// callers that already have it (or want to fake it in tests) don't need a
/// live `Shell`.
pub fn plan_for_abis(block: &NativeBlock, device_abis: &[String]) -> Plan {
    let mut result = Plan::default();
    let mut selected_abis: Vec<&str> = Vec::new();

    for device_abi in device_abis {
        let Some(abi_block) = block.abis.iter().find(|b| &b.abi == device_abi) else { continue };
        selected_abis.push(&abi_block.abi);

        let mut entries: Vec<&crate::manifest::MetadataEntry> = abi_block.entries.iter().collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        for entry in &entries {
            let device_path = format!("{DIR}/{}/{}.so", abi_block.abi, entry.hash);
            result.files_to_install.insert(device_path, entry.local_source.clone());
        }

        let metadata_lines: Vec<(&str, &str)> = entries.iter().map(|e| (e.name.as_str(), e.hash.as_str())).collect();
        result
            .metadata_to_install
            .insert(format!("{DIR}/{}/metadata.txt", abi_block.abi), serialize_metadata(metadata_lines));
    }

    let top_level = selected_abis.iter().map(|abi| format!("{abi}\n")).collect::<String>();
    result.metadata_to_install.insert(format!("{DIR}/metadata.txt"), top_level.into_bytes());
    result
}

pub fn plan(block: &NativeBlock, shell: &mut dyn Shell) -> Result<Plan, Error> {
    let device_abis = device_abi_preference(shell)?;
    Ok(plan_for_abis(block, &device_abis))
}
