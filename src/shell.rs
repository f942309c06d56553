//! Device shell transport utilities (C1): command chunking and the bulk
//! operations (`rm_files`, `mkdir_p`) built on top of `Shell::shell_execute`.
//!
//! Grounded on `adevice::device::RealDevice::run_raw_adb_command` for the
//! shape of "run a command, inspect combined output, build an error with
//! status+output"; `adevice::commands::split_string`/`command_args` for
//! treating shell invocations as argument lists rather than opaque strings.

use crate::config::{MAX_SHELL_COMMAND_SIZE, RM_CHUNK_SAFETY_MARGIN};
use crate::error::Error;
use crate::shell_trait::Shell;
use itertools::Itertools;

/// Partitions `args` into groups whose cumulative character length (summed
/// without separators) stays within `limit`. A single token longer than
/// `limit` is placed alone in its own chunk rather than split (§4.1,
/// Testable Property 1). Preserves input order, both within and across
/// chunks.
pub fn chunk(args: &[String], limit: usize) -> Vec<Vec<String>> {
    let mut chunks: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for arg in args {
        let arg_len = arg.len();
        if !current.is_empty() && current_len + arg_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current_len += arg_len;
        current.push(arg.clone());
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Deletes `filenames` from `dir` on the device, chunking the `rm` argument
/// list so each `cd <dir> && rm <chunk...>` command stays within
/// `MAX_SHELL_COMMAND_SIZE - RM_CHUNK_SAFETY_MARGIN` characters (§4.1).
pub fn rm_files(shell: &mut dyn Shell, dir: &str, filenames: &[String]) -> Result<(), Error> {
    if filenames.is_empty() {
        return Ok(());
    }
    let prefix = format!("cd {dir} && rm ");
    let limit = MAX_SHELL_COMMAND_SIZE.saturating_sub(prefix.len() + RM_CHUNK_SAFETY_MARGIN);
    for group in chunk(filenames, limit) {
        let command = format!("{prefix}{}", group.iter().join(" "));
        shell.shell_execute(&command)?;
    }
    Ok(())
}

/// Creates `path` and all its parents with `umask 022`, delegated through
/// the agent's `mkdir-p` verb rather than a plain shell `mkdir`, because the
/// shell's own `mkdir` cannot set permissions reliably (§4.1).
pub fn mkdir_p(shell: &mut dyn Shell, agent_binary_path: &str, path: &str) -> Result<(), Error> {
    shell.shell_execute(&format!("umask 022 && {agent_binary_path} mkdir-p {path}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn chunk_respects_limit() {
        let args = strings(&["aaaa", "bbbb", "cccc", "dddd"]);
        let chunks = chunk(&args, 9);
        for c in &chunks {
            assert!(c.iter().map(|a| a.len()).sum::<usize>() <= 9);
        }
        assert_eq!(chunks.into_iter().flatten().collect::<Vec<_>>(), args);
    }

    #[test]
    fn chunk_never_splits_an_oversized_token() {
        let args = strings(&["short", "this_one_is_way_too_long_for_the_limit", "short2"]);
        let chunks = chunk(&args, 10);
        assert!(chunks.iter().any(|c| c.len() == 1 && c[0].len() > 10));
        assert_eq!(chunks.into_iter().flatten().collect::<Vec<_>>(), args);
    }

    #[test]
    fn chunk_preserves_order_across_many_tokens() {
        let args: Vec<String> = (0..500).map(|i| format!("file{i}.txt")).collect();
        let chunks = chunk(&args, 200);
        assert!(chunks.len() > 1);
        assert_eq!(chunks.into_iter().flatten().collect::<Vec<_>>(), args);
    }
}
