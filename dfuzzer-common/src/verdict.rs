use std::fmt;

/// Outcome of fuzzing one method, or the aggregate outcome of a subtree.
///
/// Ordered low to high severity; `Ord`/`PartialOrd` follow declaration order,
/// so `Verdict::max(a, b)` is the correct way to fold child verdicts upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Verdict {
    Ok,
    Warning,
    Failure,
    Crash,
    ExternalCommandFailure,
    Error,
}

impl Verdict {
    /// Exit code mapping from the original CLI contract (§6): 0 all passed
    /// (including skips), 1 harness error, 2 Failure/Crash/ExternalCommandFailure,
    /// 3 Warning with no worse verdict present.
    pub fn exit_code(self) -> i32 {
        match self {
            Verdict::Ok => 0,
            Verdict::Warning => 3,
            Verdict::Failure | Verdict::Crash | Verdict::ExternalCommandFailure => 2,
            Verdict::Error => 1,
        }
    }

    pub fn fold(self, other: Verdict) -> Verdict {
        self.max(other)
    }
}

impl Default for Verdict {
    fn default() -> Self {
        Verdict::Ok
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Ok => "OK",
            Verdict::Warning => "WARNING",
            Verdict::Failure => "FAILURE",
            Verdict::Crash => "CRASH",
            Verdict::ExternalCommandFailure => "EXTERNAL-COMMAND-FAILURE",
            Verdict::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_severity() {
        assert!(Verdict::Ok < Verdict::Warning);
        assert!(Verdict::Warning < Verdict::Failure);
        assert!(Verdict::Failure < Verdict::Crash);
        assert!(Verdict::Crash < Verdict::ExternalCommandFailure);
        assert!(Verdict::ExternalCommandFailure < Verdict::Error);
    }

    #[test]
    fn fold_keeps_the_worse_verdict() {
        assert_eq!(Verdict::Ok.fold(Verdict::Warning), Verdict::Warning);
        assert_eq!(Verdict::Crash.fold(Verdict::Ok), Verdict::Crash);
        assert_eq!(Verdict::Error.fold(Verdict::Crash), Verdict::Error);
    }

    #[test]
    fn exit_codes_match_the_cli_contract() {
        assert_eq!(Verdict::Ok.exit_code(), 0);
        assert_eq!(Verdict::Warning.exit_code(), 3);
        assert_eq!(Verdict::Failure.exit_code(), 2);
        assert_eq!(Verdict::Crash.exit_code(), 2);
        assert_eq!(Verdict::ExternalCommandFailure.exit_code(), 2);
        assert_eq!(Verdict::Error.exit_code(), 1);
    }
}
