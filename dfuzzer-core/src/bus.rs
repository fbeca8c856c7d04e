//! The message-bus client (original spec §3 `BusTarget`, §4.3/§4.6). A thin
//! wrapper over `dbus::blocking`; every method here does exactly one bus
//! round trip and translates `dbus::Error` into either a harness `Error` or a
//! `CallOutcome` the engine can classify against.

use std::time::Duration;

use dbus::arg::IterAppend;
use dbus::blocking::{BlockingSender, Connection};
use dbus::Message;
use dfuzzer_value::{TypeSignature, Value};

use crate::codec::append_arguments;
use crate::error::{Error, Result};

const DRIVER_DESTINATION: &str = "org.freedesktop.DBus";
const DRIVER_OBJECT_PATH: &str = "/org/freedesktop/DBus";
const DRIVER_INTERFACE: &str = "org.freedesktop.DBus";
const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";
const DRIVER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

/// The original spec's `BusTarget`: a bus name plus an optional pin on
/// object path / interface / method. `interface` requires `object_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusTarget {
    pub name: String,
    pub object_path: Option<String>,
    pub interface: Option<String>,
    pub method: Option<String>,
}

impl BusTarget {
    pub fn new(
        name: impl Into<String>,
        object_path: Option<String>,
        interface: Option<String>,
        method: Option<String>,
    ) -> Result<Self> {
        if interface.is_some() && object_path.is_none() {
            return Err(Error::InvalidTarget(
                "an interface pin requires an object-path pin".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            object_path,
            interface,
            method,
        })
    }
}

/// Outcome of one method invocation, already pre-classified at the bus-error
/// level; `FuzzEngine` does the rest of the classification in §4.6's table.
pub enum CallOutcome {
    Returned { non_empty: bool },
    NoReply,
    Timeout,
    AccessDenied,
    AuthFailed,
    RemoteError(String),
}

/// The seam `FuzzEngine` talks to, so its classification logic can be
/// exercised against an in-memory fake instead of a real bus connection
/// (SPEC_FULL.md's ambient test-tooling section).
pub trait MethodInvoker {
    fn call(
        &self,
        destination: &str,
        object_path: &str,
        interface: &str,
        method: &str,
        timeout: Duration,
        args: &Value,
    ) -> Result<CallOutcome>;
}

pub struct Bus {
    connection: Connection,
}

impl Bus {
    pub fn connect(kind: BusKind) -> Result<Self> {
        let connection = match kind {
            BusKind::Session => Connection::new_session(),
            BusKind::System => Connection::new_system(),
        }
        .map_err(Error::Bus)?;
        Ok(Self { connection })
    }

    fn driver_call(&self, method: &str) -> Result<Message> {
        let msg = Message::new_method_call(DRIVER_DESTINATION, DRIVER_OBJECT_PATH, DRIVER_INTERFACE, method)
            .map_err(Error::Introspection)?;
        self.connection
            .send_with_reply_and_block(msg, DRIVER_TIMEOUT)
            .map_err(Error::Bus)
    }

    /// §4 "list names on both buses" (`-l`).
    pub fn list_names(&self) -> Result<Vec<String>> {
        let reply = self.driver_call("ListNames")?;
        reply.read1::<Vec<String>>().map_err(|e| Error::Introspection(e.to_string()))
    }

    /// Used to rediscover the PID after a crash (original spec §4.6
    /// "reconnect after Crash").
    pub fn unix_process_id(&self, destination: &str) -> Result<u32> {
        let msg = Message::new_method_call(
            DRIVER_DESTINATION,
            DRIVER_OBJECT_PATH,
            DRIVER_INTERFACE,
            "GetConnectionUnixProcessID",
        )
        .map_err(Error::Introspection)?
        .append1(destination);
        let reply = self
            .connection
            .send_with_reply_and_block(msg, DRIVER_TIMEOUT)
            .map_err(Error::Bus)?;
        reply.read1::<u32>().map_err(|e| Error::Introspection(e.to_string()))
    }

    /// §4.3 Introspector's one and only bus round trip.
    pub fn introspect_xml(&self, destination: &str, object_path: &str) -> Result<String> {
        let msg = Message::new_method_call(destination, object_path, INTROSPECTABLE_INTERFACE, "Introspect")
            .map_err(Error::Introspection)?;
        let reply = self
            .connection
            .send_with_reply_and_block(msg, DRIVER_TIMEOUT)
            .map_err(Error::Bus)?;
        reply.read1::<String>().map_err(|e| Error::Introspection(e.to_string()))
    }

    /// §4.2's argument tuple is never used for its own signature here; kept
    /// for call sites that want to pre-validate a method's declared
    /// signature parses before spending iterations on it.
    pub fn validate_signature(sig: &str) -> Result<TypeSignature> {
        dfuzzer_value::signature::parse_arguments(sig)
            .map_err(|e| Error::UnsupportedSignature(e.to_string()))
    }
}

impl crate::traversal::Reconnect for Bus {
    fn unix_process_id(&self, destination: &str) -> Result<u32> {
        Bus::unix_process_id(self, destination)
    }
}

impl crate::introspect::Introspectable for Bus {
    fn introspect_xml(&self, destination: &str, object_path: &str) -> Result<String> {
        Bus::introspect_xml(self, destination, object_path)
    }
}

impl MethodInvoker for Bus {
    /// §4.6: one fuzzing iteration's bus round trip.
    fn call(
        &self,
        destination: &str,
        object_path: &str,
        interface: &str,
        method: &str,
        timeout: Duration,
        args: &Value,
    ) -> Result<CallOutcome> {
        let mut msg = Message::new_method_call(destination, object_path, interface, method)
            .map_err(Error::Introspection)?;
        {
            let mut appender = IterAppend::new(&mut msg);
            append_arguments(&mut appender, args)?;
        }
        match self.connection.send_with_reply_and_block(msg, timeout) {
            Ok(reply) => Ok(CallOutcome::Returned {
                non_empty: !reply.get_items().is_empty(),
            }),
            Err(err) => Ok(classify_dbus_error(&err)),
        }
    }
}

fn classify_dbus_error(err: &dbus::Error) -> CallOutcome {
    let name = err.name().unwrap_or_default();
    let message = err.message().unwrap_or_default();
    if name == "org.freedesktop.DBus.Error.NoReply" {
        CallOutcome::NoReply
    } else if name.contains("Timeout") || message.contains("Timeout") {
        CallOutcome::Timeout
    } else if name == "org.freedesktop.DBus.Error.AccessDenied" {
        CallOutcome::AccessDenied
    } else if name == "org.freedesktop.DBus.Error.AuthFailed" {
        CallOutcome::AuthFailed
    } else {
        CallOutcome::RemoteError(format!("{name}: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_without_object_path_is_rejected() {
        let err = BusTarget::new("com.example.Service", None, Some("com.example.Iface".to_string()), None)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTarget(_)));
    }

    #[test]
    fn a_fully_pinned_target_is_accepted() {
        let target = BusTarget::new(
            "com.example.Service",
            Some("/com/example/Object".to_string()),
            Some("com.example.Iface".to_string()),
            Some("Method".to_string()),
        )
        .unwrap();
        assert_eq!(target.name, "com.example.Service");
    }
}
