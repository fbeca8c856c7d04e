//! §4.7: "terminal colorization is conditional on both standard output and
//! standard error being attached to a terminal." The core never colors
//! anything itself; this is the one place that does.

use std::io::IsTerminal;

use dfuzzer_common::Verdict;

pub fn enabled() -> bool {
    std::io::stdout().is_terminal() && std::io::stderr().is_terminal()
}

pub fn verdict(v: Verdict) -> String {
    if !enabled() {
        return v.to_string();
    }
    let code = match v {
        Verdict::Ok => "32",
        Verdict::Warning => "33",
        Verdict::Failure | Verdict::Crash | Verdict::ExternalCommandFailure => "31",
        Verdict::Error => "35",
    };
    format!("\x1b[{code}m{v}\x1b[0m")
}
