//! Thin manual-smoke-test entry point for the exopackage installer core.
//!
//! Not part of the module design in §2/§4 of the specification this crate
//! implements — CLI/flag parsing, device discovery, and build-graph
//! integration are named out of scope there, so this binary is deliberately
//! tiny: a handful of positional args wired straight into `Installer`, the
//! same relationship `adevice::main.rs` has to `adevice::adevice()`.

use exosync::agent_channel::PortAllocator;
use exosync::config::RunnerConfig;
use exosync::events::LoggingEventSink;
use exosync::installer::{DeviceTarget, Installer};
use exosync::manifest::ExoManifest;
use exosync::real_shell::RealShell;
use std::path::PathBuf;
use std::sync::Arc;

fn usage() -> ! {
    eprintln!("usage: exo_sync_demo <package> <local-apk-path> [device-serial]");
    std::process::exit(2);
}

fn main() {
    exosync::logger::init(log::LevelFilter::Info);

    let mut args = std::env::args().skip(1);
    let package = args.next().unwrap_or_else(|| usage());
    let local_apk_path = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
    let serial = args.next();

    let config = RunnerConfig::default();
    let installer = Installer::new(&config);
    let ports: Arc<PortAllocator> = installer.port_allocator();

    let conn = exosync::adb_connection::AdbDeviceConnection::new(serial.clone());
    let shell = RealShell::new(Box::new(conn), config, ports);
    let mut targets =
        vec![DeviceTarget { label: serial.unwrap_or_else(|| "default".to_string()), shell: Box::new(shell) }];

    // A real caller supplies a manifest derived from its build graph (§1
    // out of scope here); the demo just exercises the "no exo assets, only
    // check whether the main package needs reinstalling" path.
    let manifest = ExoManifest::default();

    let sink = LoggingEventSink;
    match installer.install(&mut targets, &package, &manifest, &local_apk_path, None, &sink) {
        Ok((true, _)) => println!("install succeeded on all devices"),
        Ok((false, results)) => {
            for result in results.iter().filter(|r| r.error.is_some()) {
                eprintln!("{}: {:#}", result.label, result.error.as_ref().unwrap());
            }
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("install failed to start: {e:#}");
            std::process::exit(1);
        }
    }
}
