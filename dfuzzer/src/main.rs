//! CLI front end (original spec §6). Argument parsing and the exit-code
//! mapping live here, as the original spec calls out explicitly; everything
//! else is delegated to `dfuzzer-core`.

mod color;
mod suppression;

use std::error::Error;

use dfuzzer_common::arg::{options_parser, CommandLineArguments, DefaultArguments};
use dfuzzer_common::{Verdict, DEFAULT_CALL_TIMEOUT};
use dfuzzer_core::{Bus, BusKind, BusTarget, Context, Introspector, NoSuppressions, RunSummary, Traversal, World};

use suppression::FileSuppressions;

fn main() {
    let code = match try_main() {
        Ok(verdict) => verdict.exit_code(),
        Err(e) => {
            eprintln!("dfuzzer: {e}");
            Verdict::Error.exit_code()
        }
    };
    std::process::exit(code);
}

fn try_main() -> Result<Verdict, Box<dyn Error>> {
    let options = options_parser();
    let raw_args: Vec<String> = std::env::args().skip(1).collect();
    let parsed = CommandLineArguments::from_parser(&options, &raw_args)?;

    if parsed.want_help {
        print!("{}", options.usage("dfuzzer: fuzz a freedesktop message-bus service"));
        return Ok(Verdict::Ok);
    }
    if parsed.want_version {
        println!("dfuzzer {}", env!("CARGO_PKG_VERSION"));
        return Ok(Verdict::Ok);
    }
    if parsed.list_names {
        list_all_names();
        return Ok(Verdict::Ok);
    }

    init_logger(parsed.verbose, parsed.debug);

    let run_args = parsed.resolved(&DefaultArguments::default())?;

    let bus = Bus::connect(BusKind::Session)?;
    let target = BusTarget::new(
        run_args.bus_name.clone(),
        run_args.object_path.clone(),
        run_args.interface.clone(),
        run_args.method.clone(),
    )?;

    if run_args.list_only {
        list_methods(&bus, &target)?;
        return Ok(Verdict::Ok);
    }

    let suppressions = FileSuppressions::load(&target.name)?;
    let ctx = Context::new(
        run_args.min_iterations,
        run_args.max_iterations,
        run_args.max_string_bytes,
        run_args.max_rss_kib,
        run_args.external_command.clone(),
        run_args.seed,
        DEFAULT_CALL_TIMEOUT,
        &suppressions,
    );

    let pid = bus.unix_process_id(&target.name)?;
    let mut monitor = dfuzzer_core::ProcessMonitor::new(pid, run_args.max_rss_kib);
    let mut world = World::new(run_args.log_file.as_deref(), run_args.verbose)?;
    let mut summary = RunSummary::default();

    let traversal = Traversal::new(&bus, &ctx);
    let verdict = traversal.run(&target, &mut world, &mut monitor, &mut summary)?;

    world.print_summary(&summary);
    println!("overall: {}", color::verdict(verdict));

    Ok(verdict)
}

fn init_logger(verbose: bool, debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();
}

fn list_all_names() {
    for (label, kind) in [("session", BusKind::Session), ("system", BusKind::System)] {
        match Bus::connect(kind) {
            Ok(bus) => match bus.list_names() {
                Ok(names) => {
                    println!("-- {label} bus --");
                    for name in names {
                        println!("{name}");
                    }
                }
                Err(e) => eprintln!("{label} bus: {e}"),
            },
            Err(e) => eprintln!("{label} bus: could not connect ({e})"),
        }
    }
}

/// `--list-only`: a plain introspecting walk, no invocations (SPEC_FULL.md
/// §9 supplement).
fn list_methods(bus: &Bus, target: &BusTarget) -> Result<(), Box<dyn Error>> {
    let root = target.object_path.clone().unwrap_or_else(|| "/".to_string());
    walk(bus, target, &root)
}

fn walk(bus: &Bus, target: &BusTarget, object_path: &str) -> Result<(), Box<dyn Error>> {
    let introspector = Introspector::new(bus);
    let node = introspector.introspect(&target.name, object_path)?;

    for interface in &node.interfaces {
        if let Some(wanted) = &target.interface {
            if wanted != &interface.name {
                continue;
            }
        }
        for method in &interface.methods {
            println!(
                "{object_path} {} {}{}",
                interface.name,
                method.signature,
                if method.returns_value { "" } else { " [no-reply]" }
            );
        }
    }

    if target.object_path.is_some() {
        return Ok(());
    }

    for child in &node.children {
        let child_path = if object_path == "/" {
            format!("/{child}")
        } else {
            format!("{object_path}/{child}")
        };
        walk(bus, target, &child_path)?;
    }

    Ok(())
}
