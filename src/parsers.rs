//! Output parsers (C3): `ls -R`, `pm path` + `dumpsys package`, and the
//! two-column exo metadata format used both as host-side input and
//! device-side metadata.
//!
//! Grounded on `adevice::device::apks_from_pm_list_output` and
//! `adevice::adevice::package_from_aapt_dump_output`'s `lazy_static!
//! Regex` + filter_map-over-lines idiom for parsing `pm`-family output.

use crate::error::Error;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Parses the output of `ls -R <root> | cat` into a sorted, device-relative
/// set of regular-file paths (§4.3).
///
/// Lines ending in `:` open a directory section; every non-empty line until
/// the next section header is an entry of that directory. Directories are
/// also listed as entries of their parent section, so after collecting every
/// entry we subtract the set of directories to leave only files.
pub fn list_dir_recursive(root: &str, output: &str) -> Result<Vec<String>, Error> {
    let root = root.trim_end_matches('/');
    let mut current_dir: Option<String> = None;
    let mut all_entries: BTreeSet<String> = BTreeSet::new();
    let mut directories: BTreeSet<String> = BTreeSet::new();

    for raw_line in output.lines() {
        let line = raw_line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_suffix(':') {
            let device_relative = relativize(root, header);
            directories.insert(device_relative.clone());
            current_dir = Some(device_relative);
            continue;
        }
        let dir = current_dir.as_ref().ok_or(Error::MalformedDirListing)?;
        let entry_path = if dir.is_empty() { line.to_string() } else { format!("{dir}/{line}") };
        all_entries.insert(entry_path);
    }

    Ok(all_entries.difference(&directories).cloned().collect())
}

fn relativize(root: &str, absolute_dir: &str) -> String {
    let absolute_dir = absolute_dir.trim_end_matches('/');
    if absolute_dir == root {
        String::new()
    } else {
        absolute_dir.strip_prefix(root).and_then(|s| s.strip_prefix('/')).unwrap_or(absolute_dir).to_string()
    }
}

/// Triple `(apkPath, nativeLibraryPath, versionCode)` for an installed
/// package (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub apk_path: String,
    pub native_library_path: String,
    pub version_code: String,
}

/// Parses the concatenation of `pm path <pkg>` and `dumpsys package <pkg>`
/// output (§4.3). Returns `Ok(None)` when the package is not installed.
pub fn parse_path_and_package_info(pkg: &str, combined_output: &str) -> Result<Option<PackageInfo>, Error> {
    let mut lines = combined_output.lines();

    let first_meaningful = loop {
        match lines.next() {
            Some(line) if line.is_empty() => continue,
            Some(line) if line.starts_with("WARNING: linker: ") => continue,
            Some(line) => break Some(line),
            None => break None,
        }
    };
    match first_meaningful {
        Some(line) if line.starts_with("package:") => {}
        _ => return Ok(None),
    }

    let package_header = format!("  Package [{pkg}] (");
    let mut inside_package = false;
    let mut code_path: Option<String> = None;
    let mut resource_path: Option<String> = None;
    let mut native_library_path: Option<String> = None;
    let mut version_code: Option<String> = None;

    for line in lines {
        if line.starts_with("  Package [") {
            if line.starts_with(&package_header) {
                inside_package = true;
                continue;
            } else if inside_package {
                break;
            } else {
                continue;
            }
        }
        if !inside_package {
            continue;
        }
        let trimmed = line.trim();
        let Some((key, value)) = trimmed.split_once('=') else { continue };
        match key {
            "codePath" => code_path = Some(value.to_string()),
            "resourcePath" => resource_path = Some(value.to_string()),
            "nativeLibraryPath" | "legacyNativeLibraryDir" => native_library_path = Some(value.to_string()),
            "versionCode" => version_code = Some(value.split(' ').next().unwrap_or(value).to_string()),
            _ => {}
        }
    }

    let code_path = code_path.ok_or(Error::PackageDumpMissingKey("codePath"))?;
    let resource_path = resource_path.ok_or(Error::PackageDumpMissingKey("resourcePath"))?;
    let native_library_path = native_library_path.ok_or(Error::PackageDumpMissingKey("nativeLibraryPath"))?;
    let version_code = version_code.ok_or(Error::PackageDumpMissingKey("versionCode"))?;

    if code_path != resource_path {
        return Err(Error::PackageDumpPathMismatch);
    }
    let apk_path =
        if code_path.ends_with(".apk") { code_path } else { format!("{}/base.apk", code_path.trim_end_matches('/')) };

    Ok(Some(PackageInfo { apk_path, native_library_path, version_code }))
}

/// hash -> local source paths, in the order the parser encountered them.
pub type MetadataMultimap = BTreeMap<String, Vec<PathBuf>>;

/// Parses a two-column exo metadata file (§4.3, §6): lines beginning with
/// `.` are skipped; every remaining line splits once on the first space into
/// a name and a hash (plus any ignored trailing tokens); the name resolves
/// against `resolve_base` to produce a local source path.
pub fn parse_exopackage_info_metadata(text: &str, resolve_base: &Path) -> Result<MetadataMultimap, Error> {
    let mut map: MetadataMultimap = BTreeMap::new();
    for line in text.lines() {
        if line.starts_with('.') || line.trim().is_empty() {
            continue;
        }
        let mut parts = line.splitn(2, ' ');
        let name = parts.next().unwrap_or_default();
        let rest = parts.next().unwrap_or_default();
        if name.is_empty() || rest.is_empty() {
            return Err(Error::MalformedMetadataLine(line.to_string()));
        }
        let hash = rest.split_whitespace().next().unwrap_or(rest).to_string();
        map.entry(hash).or_default().push(resolve_base.join(name));
    }
    Ok(map)
}

/// Serializes a multimap back into the two-column format, for round-tripping
/// and for writing the metadata files the synchronization engine pushes.
pub fn serialize_metadata<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<u8> {
    let mut out = String::new();
    for (name, hash) in entries {
        out.push_str(name);
        out.push(' ');
        out.push_str(hash);
        out.push('\n');
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_dir_recursive_excludes_directories() {
        let output = "\
/data/local/tmp/exopackage/com.x:
lock
secondary-dex

/data/local/tmp/exopackage/com.x/secondary-dex:
h1.dex.jar
metadata.txt
";
        let mut entries = list_dir_recursive("/data/local/tmp/exopackage/com.x", output).unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                "lock".to_string(),
                "secondary-dex/h1.dex.jar".to_string(),
                "secondary-dex/metadata.txt".to_string(),
            ]
        );
    }

    #[test]
    fn list_dir_recursive_rejects_entry_before_header() {
        let err = list_dir_recursive("/root", "lock\n").unwrap_err();
        assert!(matches!(err, Error::MalformedDirListing));
    }

    #[test]
    fn parses_package_info_sample() {
        let combined = "\
package:/data/app/com.x-1/base.apk

Packages:
  Package [com.x] (a1b2c3):
    codePath=/data/app/com.x-1
    resourcePath=/data/app/com.x-1
    legacyNativeLibraryDir=/data/app-lib/com.x-1
    versionCode=42 targetSdk=23
  Package [com.y] (d4e5f6):
    codePath=/data/app/com.y-1
";
        let info = parse_path_and_package_info("com.x", combined).unwrap().unwrap();
        assert_eq!(info.apk_path, "/data/app/com.x-1/base.apk");
        assert_eq!(info.native_library_path, "/data/app-lib/com.x-1");
        assert_eq!(info.version_code, "42");
    }

    #[test]
    fn not_installed_when_pm_path_missing() {
        let combined = "\nPackages:\n  Package [com.x] (a1b2c3):\n    codePath=/data/app/com.x-1\n";
        assert_eq!(parse_path_and_package_info("com.x", combined).unwrap(), None);
    }

    #[test]
    fn skips_linker_warning_before_package_line() {
        let combined = "WARNING: linker: foo\npackage:/data/app/com.x-1/base.apk\n\nPackages:\n  Package [com.x] (a1):\n    codePath=/data/app/com.x-1\n    resourcePath=/data/app/com.x-1\n    nativeLibraryPath=/data/app-lib/com.x-1\n    versionCode=1\n";
        assert!(parse_path_and_package_info("com.x", combined).unwrap().is_some());
    }

    #[test]
    fn metadata_round_trips_up_to_ordering() {
        let text = "libs.dex.jar h1\nother.dex.jar h2\n";
        let map = parse_exopackage_info_metadata(text, Path::new("/src")).unwrap();
        let mut pairs: Vec<(String, String)> = Vec::new();
        for (hash, paths) in &map {
            for path in paths {
                pairs.push((path.file_name().unwrap().to_str().unwrap().to_string(), hash.clone()));
            }
        }
        pairs.sort();
        let serialized = serialize_metadata(pairs.iter().map(|(n, h)| (n.as_str(), h.as_str())));
        let reparsed =
            parse_exopackage_info_metadata(&String::from_utf8(serialized).unwrap(), Path::new("/src")).unwrap();
        assert_eq!(reparsed, map);
    }

    #[test]
    fn metadata_skips_dot_prefixed_lines() {
        let map = parse_exopackage_info_metadata(".hidden\nlibs.dex.jar h1\n", Path::new("/src")).unwrap();
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn metadata_rejects_single_token_line() {
        let err = parse_exopackage_info_metadata("onlyonetoken\n", Path::new("/src")).unwrap_err();
        assert!(matches!(err, Error::MalformedMetadataLine(_)));
    }
}
