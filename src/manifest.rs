//! Package identity and the desired-state manifest (§3).
//!
//! An `ExoManifest` is the union of up to three optional blocks (dex, native,
//! resources). Each block is loaded once per install from host-side build
//! outputs and is a pure, device-capability-independent description except
//! for the native block's ABI selection, which needs to ask the device what
//! it supports (§4.4) and therefore happens in `helpers::native`, not here.

use crate::error::Error;
use crate::parsers::{self, MetadataMultimap};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

lazy_static! {
    // Reverse-DNS package name: dot-separated segments, each starting with a
    // letter and otherwise letters/digits/underscores.
    static ref PACKAGE_NAME: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)*$").expect("regex does not compile");
}

/// Validates a package name against the reverse-DNS pattern (§3).
pub fn validate_package_name(name: &str) -> Result<(), Error> {
    if PACKAGE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidPackageName(name.to_string()))
    }
}

/// The fixed staging root for `package`, e.g.
/// `/data/local/tmp/exopackage/com.example.app`.
pub fn staging_root(package: &str) -> Result<String, Error> {
    validate_package_name(package)?;
    Ok(format!("/data/local/tmp/exopackage/{package}"))
}

/// Joins a staging-relative path onto a root using `/`, never the host
/// separator (§3: "the installer never relies on the host's path separator").
pub fn device_join(root: &str, relative: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), relative)
}

/// The final path segment, e.g. `"lock"` for `".../lock"`.
pub fn last_segment(device_path: &str) -> &str {
    device_path.rsplit('/').next().unwrap_or(device_path)
}

/// One parsed line of a host-side exo metadata file: the build-time name
/// paired with its content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub name: String,
    pub hash: String,
    pub local_source: PathBuf,
}

fn entries_from_multimap(multimap: MetadataMultimap) -> Vec<MetadataEntry> {
    let mut entries = Vec::new();
    for (hash, paths) in multimap {
        for path in paths {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            entries.push(MetadataEntry { name, hash: hash.clone(), local_source: path });
        }
    }
    entries.sort_by(|a, b| (&a.name, &a.hash).cmp(&(&b.name, &b.hash)));
    entries
}

/// Secondary dex files to stage (§3 DexBlock).
#[derive(Debug, Clone, Default)]
pub struct DexBlock {
    pub entries: Vec<MetadataEntry>,
}

impl DexBlock {
    /// Loads a dex block from a host metadata file whose line format is
    /// `<jar-filename> <hash>`; relative filenames resolve against the
    /// directory the jars live in (`source_dir`).
    pub fn load(metadata_text: &str, source_dir: &Path) -> Result<DexBlock, Error> {
        let multimap = parsers::parse_exopackage_info_metadata(metadata_text, source_dir)?;
        Ok(DexBlock { entries: entries_from_multimap(multimap) })
    }
}

/// One ABI's worth of native libraries (§3 NativeBlock).
#[derive(Debug, Clone)]
pub struct NativeAbiBlock {
    pub abi: String,
    pub entries: Vec<MetadataEntry>,
}

/// Native libraries to stage, one sub-block per ABI the app ships for.
#[derive(Debug, Clone, Default)]
pub struct NativeBlock {
    pub abis: Vec<NativeAbiBlock>,
}

impl NativeBlock {
    /// `per_abi` pairs an ABI name with its `(metadata text, source dir)`.
    pub fn load(per_abi: &[(String, String, PathBuf)]) -> Result<NativeBlock, Error> {
        let mut abis = Vec::with_capacity(per_abi.len());
        for (abi, metadata_text, source_dir) in per_abi {
            let multimap = parsers::parse_exopackage_info_metadata(metadata_text, source_dir)?;
            abis.push(NativeAbiBlock { abi: abi.clone(), entries: entries_from_multimap(multimap) });
        }
        Ok(NativeBlock { abis })
    }
}

/// Resource archives to stage (§3 ResourcesBlock).
#[derive(Debug, Clone, Default)]
pub struct ResourcesBlock {
    pub entries: Vec<MetadataEntry>,
}

impl ResourcesBlock {
    pub fn load(metadata_text: &str, source_dir: &Path) -> Result<ResourcesBlock, Error> {
        let multimap = parsers::parse_exopackage_info_metadata(metadata_text, source_dir)?;
        Ok(ResourcesBlock { entries: entries_from_multimap(multimap) })
    }
}

/// The desired state for one install: the union of whichever blocks are
/// present. At least one block should normally be `Some`, but an empty
/// manifest is legal and simply means "nothing to synchronize" (§4.5 step 1).
#[derive(Debug, Clone, Default)]
pub struct ExoManifest {
    pub dex: Option<DexBlock>,
    pub native: Option<NativeBlock>,
    pub resources: Option<ResourcesBlock>,
}

impl ExoManifest {
    pub fn is_empty(&self) -> bool {
        self.dex.is_none() && self.native.is_none() && self.resources.is_none()
    }
}
