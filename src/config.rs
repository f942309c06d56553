//! Ambient configuration surface (SPEC_FULL "Configuration").
//!
//! Unlike `adevice::tracking::Config` (loaded from a user-authored file),
//! nothing here is persisted: the exo manifest is derived fresh per install
//! (§3 Lifecycle) and these are just the handful of constants §6/§9 name,
//! constructed with `Default` and overridable by the embedding caller.

/// The hard shell-command-length cap the underlying remote-shell protocol
/// imposes (§4.1, §6).
pub const MAX_SHELL_COMMAND_SIZE: usize = 1019;

/// Safety margin subtracted from `MAX_SHELL_COMMAND_SIZE` before chunking
/// `rm` argument lists, to leave room for the `cd <dir> && rm ` prefix and a
/// little slack (§4.1).
pub const RM_CHUNK_SAFETY_MARGIN: usize = 100;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Starting value for the per-device agent port counter (§4.2, §5, §9).
    pub start_port: u16,
    /// Fixed length of the secret key the agent emits during the
    /// `receive-file` handshake (§4.2, §6); an agent-build-time constant
    /// this crate treats as configuration.
    pub secret_key_size: usize,
    /// Device-absolute path to the agent's executable, spliced as the
    /// invocation prefix for every agent verb this crate shells out to
    /// (`receive-file`, `mkdir-p`, `get-signature`).
    pub agent_binary_path: String,
}

impl Default for RunnerConfig {
    fn default() -> RunnerConfig {
        RunnerConfig {
            start_port: 2828,
            secret_key_size: 16,
            agent_binary_path: "/data/local/tmp/buck-android-support/agent.apk".to_string(),
        }
    }
}
