//! Resources helper (§4.4): each archive lands at `resources/<hash>.apk`;
//! the top-level `resources/metadata.txt` lists the selected hashes so the
//! on-device resource loader knows which archives to open, in the order
//! they were declared.

use super::Plan;
use crate::manifest::ResourcesBlock;

const DIR: &str = "resources";

pub fn plan(block: &ResourcesBlock) -> Plan {
    let mut result = Plan::default();
    let mut entries: Vec<&crate::manifest::MetadataEntry> = block.entries.iter().collect();
    entries.sort_by(|a, b| a.hash.cmp(&b.hash));

    let mut metadata = String::new();
    for entry in &entries {
        let device_path = format!("{DIR}/{}.apk", entry.hash);
        result.files_to_install.insert(device_path.clone(), entry.local_source.clone());
        metadata.push_str(&entry.hash);
        metadata.push('\n');
    }
    result.metadata_to_install.insert(format!("{DIR}/metadata.txt"), metadata.into_bytes());
    result
}
