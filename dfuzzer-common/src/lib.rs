//! Shared constants and types for the dfuzzer workspace: the CLI option
//! parser and resolved run arguments, and the ordered `Verdict` enumeration.

pub mod arg;
mod verdict;

pub use verdict::Verdict;

/// §4.6: number of exceptions on a single method before it is abandoned
/// (returning `Ok`). A timeout/no-reply never counts toward this budget —
/// see the original spec's §9 Open Questions.
pub const MAX_EXCEPTIONS: u32 = 8;

/// §4.6: back-off after a remote `NoReply`/`Timeout` error, before the next
/// iteration is attempted.
pub const TIMEOUT_BACKOFF: std::time::Duration = std::time::Duration::from_secs(10);

/// §5: fixed grace wait after a detected crash, before rediscovering the PID.
pub const CRASH_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(5);

/// §6: "the default reply timeout of the IPC library" — the bus contract
/// does not name a number, so this is the conventional default reply
/// timeout used by message-bus client libraries.
pub const DEFAULT_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(25);
