//! Typed error taxonomy for the synchronization engine.
//!
//! `adevice` itself gets by with `anyhow::Error` everywhere; this crate adds a
//! real enum so callers that care (the per-device orchestration in
//! `installer.rs`) can match on kind instead of grepping strings, the way
//! `ndk_build::error::NdkError` does for `adb`-shaped failures.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid package name {0:?}: expected dot-separated reverse-DNS segments")]
    InvalidPackageName(String),

    #[error("path must be absolute: {}", .0.display())]
    PathNotAbsolute(PathBuf),

    #[error("metadata line has fewer than two fields: {0:?}")]
    MalformedMetadataLine(String),

    #[error("ls -R output has an entry before any directory header")]
    MalformedDirListing,

    #[error("package dump is missing required key `{0}`")]
    PackageDumpMissingKey(&'static str),

    #[error("package dump's codePath does not match its resourcePath")]
    PackageDumpPathMismatch,

    #[error("get-signature output contains a line break")]
    SignatureHasLineBreak,

    #[error("shell command exited with status {status}: {output}")]
    ShellNonZero { status: i32, output: String },

    #[error("shell output did not end in the expected `:<status>` sentinel: {0:?}")]
    MissingExitStatus(String),

    #[error("agent did not emit the expected secret key before closing its stdout")]
    MissingSecretKey,

    #[error("agent never printed the {0:?} marker before closing its stdout")]
    MissingMarker(String),

    #[error("installer facade instances are single-use and this one has already run")]
    FacadeAlreadyUsed,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// `primary` is the error actually returned to the caller; `suppressed`
    /// rides along for diagnostics (e.g. a transport failure during a file
    /// push that also left the shell side's exit status non-zero).
    #[error("{primary} (suppressed: {suppressed})")]
    Suppressed { primary: Box<Error>, suppressed: Box<Error> },
}

impl Error {
    pub fn with_suppressed(self, suppressed: Error) -> Error {
        Error::Suppressed { primary: Box::new(self), suppressed: Box::new(suppressed) }
    }
}
