//! §4.7 World: the one place that writes structured log lines and
//! human-facing reports. `FuzzEngine`/`Traversal` only ever talk to this
//! collaborator, never to stdout or a file directly, the way the teacher's
//! own `World` mediates all fuzzer reporting.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use dfuzzer_common::Verdict;

use crate::error::{Error, Result};

/// One line of the structured log (original spec §4.6):
/// `interface;object;method;signature;value-repr;verdict`.
pub struct IterationRecord<'a> {
    pub interface: &'a str,
    pub object_path: &'a str,
    pub method: &'a str,
    pub signature: &'a str,
    pub value_repr: &'a str,
    pub verdict: Verdict,
}

/// §4.6's "reproducer line": just enough to run the same target/method
/// again by hand.
pub struct Reproducer<'a> {
    pub bus_name: &'a str,
    pub object_path: &'a str,
    pub interface: &'a str,
    pub method: &'a str,
    pub seed: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub methods_tested: u64,
    pub methods_skipped: u64,
    pub ok: u64,
    pub warning: u64,
    pub failure: u64,
    pub crash: u64,
    pub external_command_failure: u64,
    pub error: u64,
}

impl RunSummary {
    pub fn record(&mut self, verdict: Verdict) {
        self.methods_tested += 1;
        match verdict {
            Verdict::Ok => self.ok += 1,
            Verdict::Warning => self.warning += 1,
            Verdict::Failure => self.failure += 1,
            Verdict::Crash => self.crash += 1,
            Verdict::ExternalCommandFailure => self.external_command_failure += 1,
            Verdict::Error => self.error += 1,
        }
    }

    pub fn record_skip(&mut self) {
        self.methods_skipped += 1;
    }
}

pub struct World {
    log_file: Option<File>,
    verbose: bool,
}

impl World {
    pub fn new(log_path: Option<&Path>, verbose: bool) -> Result<Self> {
        let log_file = log_path
            .map(|p| OpenOptions::new().create(true).append(true).open(p))
            .transpose()
            .map_err(Error::Io)?;
        Ok(Self { log_file, verbose })
    }

    pub fn without_log(verbose: bool) -> Self {
        Self { log_file: None, verbose }
    }

    pub fn record_iteration(&mut self, record: &IterationRecord<'_>) -> Result<()> {
        if let Some(file) = self.log_file.as_mut() {
            writeln!(
                file,
                "{};{};{};{};{};{}",
                record.interface, record.object_path, record.method, record.signature, record.value_repr, record.verdict
            )
            .map_err(Error::Io)?;
        }
        if self.verbose {
            log::debug!(
                "{} {} {} {} -> {}",
                record.interface,
                record.object_path,
                record.method,
                record.signature,
                record.verdict
            );
        }
        Ok(())
    }

    pub fn report_verdict(&self, method: &str, verdict: Verdict) {
        match verdict {
            Verdict::Ok => log::info!("{method}: ok"),
            Verdict::Warning => log::warn!("{method}: warning"),
            _ => log::error!("{method}: {verdict}"),
        }
    }

    pub fn emit_reproducer(&self, reproducer: &Reproducer<'_>) {
        let seed_flag = reproducer
            .seed
            .map(|s| format!(" --seed {s}"))
            .unwrap_or_default();
        println!(
            "reproduce with: dfuzzer -n {} -o {} -i {} -t {}{}",
            reproducer.bus_name, reproducer.object_path, reproducer.interface, reproducer.method, seed_flag
        );
    }

    pub fn print_summary(&self, summary: &RunSummary) {
        println!(
            "{} tested, {} skipped — ok: {}, warning: {}, failure: {}, crash: {}, external-command-failure: {}, error: {}",
            summary.methods_tested,
            summary.methods_skipped,
            summary.ok,
            summary.warning,
            summary.failure,
            summary.crash,
            summary.external_command_failure,
            summary.error
        );
    }
}
