//! Introspection, process monitoring, and the per-method fuzzing loop
//! (original spec §4). `dfuzzer` (the CLI binary) is the only consumer of
//! this crate outside its own tests.

pub mod bus;
pub mod codec;
pub mod context;
pub mod error;
pub mod fuzz_engine;
pub mod introspect;
pub mod process_monitor;
pub mod suppression;
pub mod traversal;
pub mod world;

pub use bus::{Bus, BusKind, BusTarget, CallOutcome, MethodInvoker};
pub use context::Context;
pub use error::{Error, Result};
pub use fuzz_engine::{FuzzEngine, MethodOutcome};
pub use introspect::{Introspectable, Introspector, InterfaceDescriptor, MethodDescriptor, NodeDescriptor};
pub use process_monitor::{MonitorState, ProcessMonitor};
pub use suppression::{NoSuppressions, SuppressionFilter};
pub use traversal::{Reconnect, Traversal};
pub use world::{IterationRecord, Reproducer, RunSummary, World};
