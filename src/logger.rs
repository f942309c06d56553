//! Thin wrapper around `env_logger` (ambient logging stack, see
//! `SPEC_FULL.md`). Grounded on `adevice::logger::init_logger`'s
//! `Builder::from_default_env()` + custom format, minus the CLI-verbosity
//! enum (flag parsing is out of scope for the core, §1) — callers pass a
//! `log::LevelFilter` directly.

use env_logger::{Builder, Target};
use std::io::Write;

pub fn init(level: log::LevelFilter) {
    Builder::from_default_env()
        .target(Target::Stdout)
        .format_module_path(false)
        .format_target(false)
        .filter_level(level)
        .write_style(env_logger::WriteStyle::Auto)
        .format(move |buf, record| writeln!(buf, "{:?}", record.args()))
        .init();
}
