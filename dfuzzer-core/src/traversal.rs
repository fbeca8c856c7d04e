//! §4.4 Traversal: recursive descent over the object tree, running
//! `FuzzEngine` at every reachable node and folding verdicts upward.

use dfuzzer_common::Verdict;

use crate::bus::{BusTarget, MethodInvoker};
use crate::context::Context;
use crate::error::Result;
use crate::fuzz_engine::FuzzEngine;
use crate::introspect::{Introspectable, Introspector};
use crate::process_monitor::ProcessMonitor;
use crate::world::{RunSummary, World};

/// Everything needed to rediscover the target's PID after a crash (original
/// spec §4.6 "Reconnect after Crash").
pub trait Reconnect {
    fn unix_process_id(&self, destination: &str) -> Result<u32>;
}

pub struct Traversal<'a, B: MethodInvoker + Introspectable + Reconnect> {
    bus: &'a B,
    ctx: &'a Context<'a>,
}

impl<'a, B: MethodInvoker + Introspectable + Reconnect> Traversal<'a, B> {
    pub fn new(bus: &'a B, ctx: &'a Context<'a>) -> Self {
        Self { bus, ctx }
    }

    /// Walks from `target.object_path` (or `/` if unset) down the tree,
    /// stopping the descent at a node once a specific object path was
    /// pinned (original spec §4.4). Returns the max-severity verdict over
    /// the whole subtree.
    pub fn run(&self, target: &BusTarget, world: &mut World, monitor: &mut ProcessMonitor, summary: &mut RunSummary) -> Result<Verdict> {
        let root = target.object_path.clone().unwrap_or_else(|| "/".to_string());
        self.visit(target, &root, world, monitor, summary)
    }

    fn visit(
        &self,
        target: &BusTarget,
        object_path: &str,
        world: &mut World,
        monitor: &mut ProcessMonitor,
        summary: &mut RunSummary,
    ) -> Result<Verdict> {
        let introspector = Introspector::new(self.bus);
        let node = match introspector.introspect(&target.name, object_path) {
            Ok(node) => node,
            Err(_) => return Ok(Verdict::Error),
        };

        let mut verdict = Verdict::Ok;
        let engine = FuzzEngine::new(self.bus, self.ctx);

        for interface in &node.interfaces {
            if let Some(wanted) = &target.interface {
                if wanted != &interface.name {
                    continue;
                }
            }
            for method in &interface.methods {
                if let Some(wanted) = &target.method {
                    if wanted != &method.name {
                        continue;
                    }
                }

                let outcome = engine.run_method(world, monitor, &target.name, object_path, &interface.name, method)?;
                summary.record(outcome.verdict);
                world.report_verdict(&method.name, outcome.verdict);
                verdict = verdict.fold(outcome.verdict);

                if outcome.crashed {
                    self.reconnect(&target.name, monitor)?;
                }
            }
        }

        // a specific object path pins the traversal to exactly that node.
        if target.object_path.is_some() {
            return Ok(verdict);
        }

        for child in &node.children {
            let child_path = if object_path == "/" {
                format!("/{child}")
            } else {
                format!("{object_path}/{child}")
            };
            let child_verdict = self.visit(target, &child_path, world, monitor, summary)?;
            verdict = verdict.fold(child_verdict);
        }

        Ok(verdict)
    }

    /// §4.6: fixed grace wait, then rediscover the PID via the bus driver,
    /// reopen the monitor. If rediscovery fails, the caller already folded
    /// a `Crash` verdict for this node; traversal proceeds to the next
    /// sibling regardless.
    fn reconnect(&self, destination: &str, monitor: &mut ProcessMonitor) -> Result<()> {
        std::thread::sleep(dfuzzer_common::CRASH_GRACE_PERIOD);
        match self.bus.unix_process_id(destination) {
            Ok(pid) => {
                *monitor = ProcessMonitor::new(pid, self.ctx.max_rss_kib);
                Ok(())
            }
            Err(e) => {
                log::warn!("could not rediscover {destination} after a crash: {e}");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::CallOutcome;
    use crate::error::Error;
    use crate::suppression::NoSuppressions;
    use std::time::Duration;

    const ROOT_XML: &str = r#"
        <node>
            <interface name="com.example.Echo">
                <method name="Echo">
                    <arg name="input" type="s" direction="in"/>
                </method>
            </interface>
            <node name="child"/>
        </node>
    "#;

    const CHILD_XML: &str = r#"
        <node>
            <interface name="com.example.Echo">
                <method name="Echo">
                    <arg name="input" type="s" direction="in"/>
                </method>
            </interface>
        </node>
    "#;

    struct FakeBus;

    impl MethodInvoker for FakeBus {
        fn call(
            &self,
            _destination: &str,
            _object_path: &str,
            _interface: &str,
            _method: &str,
            _timeout: Duration,
            _args: &dfuzzer_value::Value,
        ) -> Result<CallOutcome> {
            Ok(CallOutcome::Returned { non_empty: false })
        }
    }

    impl Introspectable for FakeBus {
        fn introspect_xml(&self, _destination: &str, object_path: &str) -> Result<String> {
            match object_path {
                "/" => Ok(ROOT_XML.to_string()),
                "/child" => Ok(CHILD_XML.to_string()),
                other => Err(Error::Introspection(format!("no such object {other}"))),
            }
        }
    }

    impl Reconnect for FakeBus {
        fn unix_process_id(&self, _destination: &str) -> Result<u32> {
            Ok(1)
        }
    }

    #[test]
    fn traversal_descends_into_children_and_aggregates_verdicts() {
        let bus = FakeBus;
        let filter = NoSuppressions;
        let ctx = Context {
            min_iterations: 1,
            max_iterations: 1,
            max_string_bytes: 256,
            max_rss_kib: None,
            external_command: None,
            seed: Some(1),
            call_timeout: Duration::from_secs(1),
            suppressions: &filter,
            random: dfuzzer_value::RandomSource::new(1, 256),
        };
        let traversal = Traversal::new(&bus, &ctx);
        let target = BusTarget::new("com.example.Service", None, None, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(&status, "VmRSS:\t1000 kB\nCoreDumping:\t0\n").unwrap();
        let mut monitor = ProcessMonitor::new(0, None);
        monitor.set_status_path_for_test(status);
        let mut world = World::without_log(false);
        let mut summary = RunSummary::default();

        let verdict = traversal.run(&target, &mut world, &mut monitor, &mut summary).unwrap();

        assert_eq!(verdict, Verdict::Ok);
        assert_eq!(summary.methods_tested, 2, "root and child each expose one method");
    }

    #[test]
    fn a_pinned_object_path_does_not_descend_into_children() {
        let bus = FakeBus;
        let filter = NoSuppressions;
        let ctx = Context {
            min_iterations: 1,
            max_iterations: 1,
            max_string_bytes: 256,
            max_rss_kib: None,
            external_command: None,
            seed: Some(1),
            call_timeout: Duration::from_secs(1),
            suppressions: &filter,
            random: dfuzzer_value::RandomSource::new(1, 256),
        };
        let traversal = Traversal::new(&bus, &ctx);
        let target = BusTarget::new("com.example.Service", Some("/".to_string()), None, None).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let status = dir.path().join("status");
        std::fs::write(&status, "VmRSS:\t1000 kB\nCoreDumping:\t0\n").unwrap();
        let mut monitor = ProcessMonitor::new(0, None);
        monitor.set_status_path_for_test(status);
        let mut world = World::without_log(false);
        let mut summary = RunSummary::default();

        traversal.run(&target, &mut world, &mut monitor, &mut summary).unwrap();

        assert_eq!(summary.methods_tested, 1, "a pinned object path stays at that node");
    }
}
