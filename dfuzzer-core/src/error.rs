//! §7 error handling design: harness errors surface as `Verdict::Error` for
//! the current node rather than aborting the run. `Error` enumerates the
//! *kinds* that `Traversal` catches at its node boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("bus call failed: {0}")]
    Bus(#[from] dbus::Error),

    #[error("could not parse introspection XML: {0}")]
    Introspection(String),

    #[error("could not read process status: {0}")]
    Monitor(#[source] std::io::Error),

    #[error("signature outside the IPC grammar: {0}")]
    UnsupportedSignature(String),

    #[error("could not build a value: {0}")]
    ValueBuild(#[from] dfuzzer_value::ValueBuildError),

    #[error("invalid bus target: {0}")]
    InvalidTarget(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
