//! Synchronization engine (C5): orchestrates a single-device install (§4.5).
//!
//! Grounded on `adevice::device::update` for the mkdir-before-push-before-rm
//! ordering (its `mkdir_comes_first_rm_dfs` comparator is generalized here
//! into directory-then-file batching over this crate's hash-addressed
//! paths) and `adevice::adevice::adevice` for the overall "compute diff,
//! act" per-run shape.

use crate::agent_channel;
use crate::error::Error;
use crate::events::{timed, Profiler};
use crate::helpers::{dex, native, resources, Plan};
use crate::manifest::{device_join, last_segment, staging_root, ExoManifest};
use crate::shell;
use crate::shell_trait::{KillOutcome, Shell};
use anyhow::{Context, Result};
use itertools::Itertools;
use log::{info, warn};
use std::collections::{BTreeSet, HashMap};
use std::io::Write as _;
use std::path::Path;

/// Everything `install_on_device` needs beyond the manifest: where to find
/// the full package if a reinstall turns out to be necessary, and which
/// process (if any) to target for a narrow kill instead of a full
/// force-stop (§4.5 step 4).
pub struct DeviceInstallRequest<'a> {
    pub package: &'a str,
    pub manifest: &'a ExoManifest,
    pub local_apk_path: &'a Path,
    pub process_name: Option<&'a str>,
    /// Device-absolute path to the agent's executable, spliced as the
    /// invocation prefix for every agent verb this engine shells out to.
    pub agent_binary_path: &'a str,
}

/// Runs the full per-device install sequence described in §4.5. Returns
/// `Ok(())` on success; any non-benign error aborts the device and is
/// returned to the caller (the installer facade, C6, attaches it to this
/// device's result).
pub fn install_on_device(shell: &mut dyn Shell, request: &DeviceInstallRequest, profiler: &mut Profiler) -> Result<()> {
    let root = staging_root(request.package)?;

    if !request.manifest.is_empty() {
        sync_exo_state(shell, &root, request.manifest, request.agent_binary_path, profiler)
            .context("synchronizing exo state")?;
    }

    let should_install = should_app_be_installed(
        shell,
        request.package,
        request.local_apk_path,
        request.agent_binary_path,
        profiler,
    )
    .context("checking whether the main package needs reinstalling")?;

    if should_install {
        info!("signatures differ (or app not installed); reinstalling {}", request.package);
        shell.install_apk(request.local_apk_path).context("installing the main package")?;
    }

    timed(&mut profiler.app_kill, || stop_app(shell, request.package, request.process_name, should_install))
        .context("stopping the running app")?;
    Ok(())
}

/// §4.5 step 1: list the present set, diff it against every active block's
/// wanted files, push what's missing, delete what's unwanted, and write
/// metadata last.
fn sync_exo_state(
    shell: &mut dyn Shell,
    root: &str,
    manifest: &ExoManifest,
    agent_binary_path: &str,
    profiler: &mut Profiler,
) -> Result<(), Error> {
    shell::mkdir_p(shell, agent_binary_path, root)?;
    let present: BTreeSet<String> = shell.list_dir(root)?.into_iter().collect();

    let mut plans: Vec<Plan> = Vec::new();
    if let Some(dex_block) = &manifest.dex {
        plans.push(dex::plan(dex_block));
    }
    if let Some(native_block) = &manifest.native {
        plans.push(native::plan(native_block, shell)?);
    }
    if let Some(resources_block) = &manifest.resources {
        plans.push(resources::plan(resources_block));
    }

    let wanted: BTreeSet<String> =
        plans.iter().flat_map(|p| p.files_to_install.keys().chain(p.metadata_to_install.keys())).cloned().collect();

    for plan in &plans {
        let start = std::time::Instant::now();
        push_missing(shell, root, agent_binary_path, &present, plan, profiler)?;
        profiler.per_class_install += start.elapsed();
    }

    delete_unwanted(shell, root, &present, &wanted)?;

    for plan in &plans {
        write_metadata(shell, root, &present, plan)?;
    }

    Ok(())
}

/// Creates every distinct parent directory once, then pushes files whose
/// device-relative key is not already in `present` (§3 invariant: a file
/// already at its hash-addressed target is up to date without rehashing).
fn push_missing(
    shell: &mut dyn Shell,
    root: &str,
    agent_binary_path: &str,
    present: &BTreeSet<String>,
    plan: &Plan,
    profiler: &mut Profiler,
) -> Result<(), Error> {
    let missing: Vec<&String> = plan.files_to_install.keys().filter(|k| !present.contains(*k)).sorted().collect();
    if missing.is_empty() {
        return Ok(());
    }

    let parent_dirs: BTreeSet<&str> = missing.iter().filter_map(|p| parent_dir(p)).collect();
    for dir in parent_dirs {
        shell::mkdir_p(shell, agent_binary_path, &device_join(root, dir))?;
    }

    for device_relative in missing {
        let local_source = &plan.files_to_install[device_relative];
        let device_path = device_join(root, device_relative);
        timed(&mut profiler.per_file_install, || {
            info!("pushing {device_relative}");
            shell.push_file(&device_path, local_source)
        })?;
    }
    Ok(())
}

fn parent_dir(device_relative: &str) -> Option<&str> {
    device_relative.rfind('/').map(|idx| &device_relative[..idx])
}

/// §4.5 step 1e: every present-set element that is neither wanted nor named
/// `lock`, grouped by parent directory and deleted via `rm_files` (§4.1).
fn delete_unwanted(
    shell: &mut dyn Shell,
    root: &str,
    present: &BTreeSet<String>,
    wanted: &BTreeSet<String>,
) -> Result<(), Error> {
    let unwanted: Vec<&String> =
        present.iter().filter(|p| !wanted.contains(*p) && last_segment(p) != "lock").collect();
    if unwanted.is_empty() {
        return Ok(());
    }

    let mut by_dir: HashMap<String, Vec<String>> = HashMap::new();
    for path in unwanted {
        let dir = parent_dir(path).unwrap_or("").to_string();
        let filename = last_segment(path).to_string();
        by_dir.entry(dir).or_default().push(filename);
    }

    for (dir, mut filenames) in by_dir {
        filenames.sort();
        let full_dir = if dir.is_empty() { root.to_string() } else { device_join(root, &dir) };
        shell::rm_files(shell, &full_dir, &filenames)?;
    }
    Ok(())
}

/// Writes a block's metadata files last, after its data files are in place
/// (§5 Ordering guarantees: "metadata writes happen-after data writes").
/// Unlike the hash-addressed data files, a metadata device path does not by
/// itself guarantee its content is current (§3), so an already-present file
/// is read back and compared before being re-pushed; the in-memory bytes are
/// staged through a temporary host file and pushed like any other file
/// (§4.5 step 1d).
fn write_metadata(shell: &mut dyn Shell, root: &str, present: &BTreeSet<String>, plan: &Plan) -> Result<(), Error> {
    for (device_relative, contents) in &plan.metadata_to_install {
        let device_path = device_join(root, device_relative);
        if present.contains(device_relative) {
            if let Some(existing) = shell.read_file(&device_path)? {
                if &existing == contents {
                    continue;
                }
            }
        }

        let mut temp = tempfile::NamedTempFile::new().map_err(Error::Io)?;
        temp.write_all(contents).map_err(Error::Io)?;
        temp.flush().map_err(Error::Io)?;
        shell.push_file(&device_path, temp.path())?;
    }
    Ok(())
}

/// §4.5 step 2: reinstall iff the app isn't installed at all, or its
/// installed signature differs from the locally built one.
fn should_app_be_installed(
    shell: &mut dyn Shell,
    package: &str,
    local_apk_path: &Path,
    agent_binary_path: &str,
    profiler: &mut Profiler,
) -> Result<bool, Error> {
    if !local_apk_path.is_absolute() {
        return Err(Error::PathNotAbsolute(local_apk_path.to_path_buf()));
    }
    let info = timed(&mut profiler.package_info_query, || shell.get_package_info(package))?;
    let Some(info) = info else {
        return Ok(true);
    };
    let local_source = local_apk_path.to_string_lossy();
    timed(&mut profiler.signature_check, || -> Result<bool, Error> {
        let local_signature = agent_channel::get_signature(shell, agent_binary_path, &local_source)?;
        let installed_signature = agent_channel::get_signature(shell, agent_binary_path, &info.apk_path)?;
        Ok(local_signature != installed_signature)
    })
}

/// §4.5 step 4: force-stop on a full reinstall or when no process filter was
/// given; otherwise a targeted `run-as ... killall`, swallowing "not
/// running" as benign (§7) and propagating anything else.
fn stop_app(
    shell: &mut dyn Shell,
    package: &str,
    process_name: Option<&str>,
    did_reinstall: bool,
) -> Result<(), Error> {
    match (did_reinstall, process_name) {
        (true, _) | (false, None) => {
            shell.stop(package)?;
        }
        (false, Some(process)) => match shell.kill(package, process)? {
            KillOutcome::Killed => {}
            KillOutcome::NotRunning => warn!("{process} was not running under {package}; nothing to kill"),
        },
    }
    Ok(())
}
