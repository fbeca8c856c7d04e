//! §9 Open Questions: suppression-file parsing and its on-disk precedence
//! belong to the CLI binary, not the core. `FuzzEngine` only consumes this
//! trait, so its tests can run against an in-memory fake.

/// Answers whether a given `(object_path, interface, method)` triple has
/// been suppressed, and why (surfaced in `--list-only`/summary output).
pub trait SuppressionFilter {
    fn is_suppressed(&self, object_path: &str, interface: &str, method: &str) -> Option<&str>;
}

/// The trivial filter that suppresses nothing, for runs with no
/// suppression file on any of the lookup paths.
pub struct NoSuppressions;

impl SuppressionFilter for NoSuppressions {
    fn is_suppressed(&self, _object_path: &str, _interface: &str, _method: &str) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_suppressions_never_suppresses() {
        let filter = NoSuppressions;
        assert_eq!(filter.is_suppressed("/o", "i", "m"), None);
    }
}
