//! Secondary-dex helper (§4.4): one entry per listed dex at
//! `secondary-dex/<hash>.dex.jar`, plus a rewritten `secondary-dex/metadata.txt`
//! keyed by the original jar filename (so the on-device class loader keeps a
//! stable name while the content lives at its hash-addressed path).

use super::Plan;
use crate::manifest::DexBlock;
use crate::parsers::serialize_metadata;

const DIR: &str = "secondary-dex";

pub fn plan(block: &DexBlock) -> Plan {
    let mut result = Plan::default();
    let mut entries: Vec<&crate::manifest::MetadataEntry> = block.entries.iter().collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    for entry in &entries {
        let device_path = format!("{DIR}/{}.dex.jar", entry.hash);
        result.files_to_install.insert(device_path, entry.local_source.clone());
    }

    let metadata_lines: Vec<(&str, &str)> = entries.iter().map(|e| (e.name.as_str(), e.hash.as_str())).collect();
    result.metadata_to_install.insert(format!("{DIR}/metadata.txt"), serialize_metadata(metadata_lines));
    result
}
