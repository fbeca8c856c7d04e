//! `Value` -> wire encoding. Decoding is deliberately narrow: the engine only
//! ever needs to know whether a reply carried any arguments at all (the
//! void-returning-non-empty check, original spec §4.6), never their content,
//! so there is no general decoder here.

use dbus::arg::{ArgType, IterAppend};
use dfuzzer_value::Value;
use std::os::unix::io::AsRawFd;

use crate::error::{Error, Result};

/// File-handle values are fabricated integers, not real descriptors; the
/// only thing that survives the trip through the bus library's own fd
/// passing is a descriptor that is actually open. Every `FileHandle` value,
/// positive or the synthesized `-1`, is sent as a duplicate of `/dev/null`.
fn null_fd() -> Result<std::fs::File> {
    std::fs::File::open("/dev/null").map_err(Error::Io)
}

/// Append a full method-call argument list. `ValueBuilder` always produces a
/// `Value::Tuple` for a method's signature (`parse_arguments` requires the
/// outer parens), but on the wire a method call's arguments are a flat
/// top-level sequence, not a single struct — so the outer tuple is unwrapped
/// here and only nested tuples go through `append_value`'s `Struct` case.
pub fn append_arguments(ia: &mut IterAppend, args: &Value) -> Result<()> {
    match args {
        Value::Tuple(elems) => {
            for elem in elems {
                append_value(ia, elem)?;
            }
            Ok(())
        }
        other => append_value(ia, other),
    }
}

pub fn append_value(ia: &mut IterAppend, value: &Value) -> Result<()> {
    match value {
        Value::Byte(v) => ia.append(*v),
        Value::Boolean(v) => ia.append(*v),
        Value::Int16(v) => ia.append(*v),
        Value::Uint16(v) => ia.append(*v),
        Value::Int32(v) => ia.append(*v),
        Value::Uint32(v) => ia.append(*v),
        Value::Int64(v) => ia.append(*v),
        Value::Uint64(v) => ia.append(*v),
        Value::Double(v) => ia.append(*v),
        Value::FileHandle(_) => {
            let file = null_fd()?;
            ia.append(dbus::arg::OwnedFd::new(file.as_raw_fd()));
            std::mem::forget(file);
        }
        Value::String(v) => ia.append(v.clone()),
        Value::ObjectPath(v) => {
            let path = dbus::Path::new(v.clone())
                .map_err(|e| Error::Introspection(format!("bad generated object path: {e}")))?;
            ia.append(path);
        }
        Value::Signature(v) => {
            let sig = dbus::Signature::new(v.clone())
                .map_err(|e| Error::Introspection(format!("bad generated signature: {e}")))?;
            ia.append(sig);
        }
        Value::Variant(inner) => {
            let inner_sig = inner.signature().to_string();
            let mut build_err = None;
            ia.append_container(ArgType::Variant, Some(&inner_sig), |sub| {
                if let Err(e) = append_value(sub, inner) {
                    build_err = Some(e);
                }
            });
            if let Some(e) = build_err {
                return Err(e);
            }
        }
        Value::Array(elems) => {
            let elem_sig = elems
                .first()
                .map(|v| v.signature().to_string())
                .unwrap_or_else(|| "y".to_string());
            let mut build_err = None;
            ia.append_container(ArgType::Array, Some(&elem_sig), |sub| {
                for elem in elems {
                    if let Err(e) = append_value(sub, elem) {
                        build_err = Some(e);
                        break;
                    }
                }
            });
            if let Some(e) = build_err {
                return Err(e);
            }
        }
        Value::Tuple(elems) => {
            let mut build_err = None;
            ia.append_container(ArgType::Struct, None, |sub| {
                for elem in elems {
                    if let Err(e) = append_value(sub, elem) {
                        build_err = Some(e);
                        break;
                    }
                }
            });
            if let Some(e) = build_err {
                return Err(e);
            }
        }
        Value::DictEntry(key, inner) => {
            let mut build_err = None;
            ia.append_container(ArgType::DictEntry, None, |sub| {
                if let Err(e) = append_value(sub, key) {
                    build_err = Some(e);
                    return;
                }
                if let Err(e) = append_value(sub, inner) {
                    build_err = Some(e);
                }
            });
            if let Some(e) = build_err {
                return Err(e);
            }
        }
    }
    Ok(())
}
