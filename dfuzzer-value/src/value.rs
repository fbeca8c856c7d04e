//! Recursive construction of typed values from a `TypeSignature` (original
//! spec §4.2). `Value` is a tagged union mirroring `TypeSignature`; it is
//! built only through `ValueBuilder::build`, never constructed directly, so
//! that every `Value` in the system is guaranteed to match the signature it
//! was built from (the round-trip invariant in the original spec's §8).

use crate::random::RandomSource;
use crate::signature::{Basic, TypeSignature};

/// A value is "floating" the moment `ValueBuilder` returns it: the caller
/// must `sink` it to a single owner (here, move it into the bus call) before
/// the engine's log line borrows it for `value-repr`. We model that by
/// returning values by-value and only ever borrowing through `&Value` from
/// that point on — there is no separate floating/sunk type, the ownership
/// discipline is structural (see SPEC_FULL.md / the original spec §9).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Byte(u8),
    Boolean(bool),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    FileHandle(i32),
    String(String),
    ObjectPath(String),
    Signature(String),
    Variant(Box<Value>),
    Array(Vec<Value>),
    Tuple(Vec<Value>),
    DictEntry(Box<Value>, Box<Value>),
}

impl Value {
    /// Recover the `TypeSignature` a value was built from, to check the
    /// round-trip invariant and to format `value-repr` log fields.
    pub fn signature(&self) -> TypeSignature {
        match self {
            Value::Byte(_) => TypeSignature::Basic(Basic::Byte),
            Value::Boolean(_) => TypeSignature::Basic(Basic::Boolean),
            Value::Int16(_) => TypeSignature::Basic(Basic::Int16),
            Value::Uint16(_) => TypeSignature::Basic(Basic::Uint16),
            Value::Int32(_) => TypeSignature::Basic(Basic::Int32),
            Value::Uint32(_) => TypeSignature::Basic(Basic::Uint32),
            Value::Int64(_) => TypeSignature::Basic(Basic::Int64),
            Value::Uint64(_) => TypeSignature::Basic(Basic::Uint64),
            Value::Double(_) => TypeSignature::Basic(Basic::Double),
            Value::FileHandle(_) => TypeSignature::Basic(Basic::FileHandle),
            Value::String(_) => TypeSignature::Basic(Basic::String),
            Value::ObjectPath(_) => TypeSignature::Basic(Basic::ObjectPath),
            Value::Signature(_) => TypeSignature::Basic(Basic::Signature),
            Value::Variant(_) => TypeSignature::Basic(Basic::Variant),
            Value::Array(elems) => {
                let elem_sig = elems.first().map(Value::signature).unwrap_or(TypeSignature::Basic(Basic::Byte));
                TypeSignature::Array(Box::new(elem_sig))
            }
            Value::Tuple(elems) => TypeSignature::Tuple(elems.iter().map(Value::signature).collect()),
            Value::DictEntry(key, value) => {
                let key_basic = match key.signature() {
                    TypeSignature::Basic(b) => b,
                    _ => Basic::String,
                };
                TypeSignature::DictEntry(key_basic, Box::new(value.signature()))
            }
        }
    }

    /// Human-readable representation for the `value-repr` structured log
    /// field (original spec §4.6).
    pub fn repr(&self) -> String {
        match self {
            Value::Byte(v) => v.to_string(),
            Value::Boolean(v) => v.to_string(),
            Value::Int16(v) => v.to_string(),
            Value::Uint16(v) => v.to_string(),
            Value::Int32(v) => v.to_string(),
            Value::Uint32(v) => v.to_string(),
            Value::Int64(v) => v.to_string(),
            Value::Uint64(v) => v.to_string(),
            Value::Double(v) => v.to_string(),
            Value::FileHandle(v) => v.to_string(),
            Value::String(v) => format!("{v:?}"),
            Value::ObjectPath(v) => v.clone(),
            Value::Signature(v) => v.clone(),
            Value::Variant(inner) => format!("<{}>", inner.repr()),
            Value::Array(elems) => format!("[{}]", elems.iter().map(Value::repr).collect::<Vec<_>>().join(", ")),
            Value::Tuple(elems) => format!("({})", elems.iter().map(Value::repr).collect::<Vec<_>>().join(", ")),
            Value::DictEntry(k, v) => format!("{}: {}", k.repr(), v.repr()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueBuildError(pub String);

impl std::fmt::Display for ValueBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to build a value: {}", self.0)
    }
}
impl std::error::Error for ValueBuildError {}

/// Recursive constructor that, given a `TypeSignature`, produces a fully
/// populated `Value` using `RandomSource` (original spec §4.2).
pub struct ValueBuilder<'r> {
    random: &'r RandomSource,
}

impl<'r> ValueBuilder<'r> {
    pub fn new(random: &'r RandomSource) -> Self {
        Self { random }
    }

    /// A call failure at any node propagates; a NULL/absent value is never
    /// a permissible result (original spec §4.2).
    pub fn build(&self, sig: &TypeSignature) -> Result<Value, ValueBuildError> {
        match sig {
            TypeSignature::Basic(basic) => Ok(self.build_basic(*basic)),
            TypeSignature::Tuple(elems) => {
                let mut built = Vec::with_capacity(elems.len());
                for elem in elems {
                    built.push(self.build(elem)?);
                }
                Ok(Value::Tuple(built))
            }
            TypeSignature::Array(elem_sig) => {
                let len = self.random.array_len();
                let mut built = Vec::with_capacity(len);
                for _ in 0..len {
                    built.push(self.build(elem_sig)?);
                }
                Ok(Value::Array(built))
            }
            TypeSignature::DictEntry(key, value_sig) => {
                let key_value = self.build_basic(*key);
                let value = self.build(value_sig)?;
                Ok(Value::DictEntry(Box::new(key_value), Box::new(value)))
            }
        }
    }

    fn build_basic(&self, basic: Basic) -> Value {
        match basic {
            Basic::Byte => Value::Byte(self.random.byte()),
            Basic::Boolean => Value::Boolean(self.random.boolean()),
            Basic::Int16 => Value::Int16(self.random.int16()),
            Basic::Uint16 => Value::Uint16(self.random.uint16()),
            Basic::Int32 => Value::Int32(self.random.int32()),
            Basic::Uint32 => Value::Uint32(self.random.uint32()),
            Basic::Int64 => Value::Int64(self.random.int64()),
            Basic::Uint64 => Value::Uint64(self.random.uint64()),
            Basic::Double => Value::Double(self.random.double()),
            Basic::FileHandle => Value::FileHandle(self.random.file_handle()),
            Basic::String => Value::String(self.random.string()),
            Basic::ObjectPath => Value::ObjectPath(self.random.object_path()),
            Basic::Signature => Value::Signature(self.random.signature()),
            // a variant is treated as basic and delegates to the variant generator (§4.2).
            Basic::Variant => Value::Variant(Box::new(Value::String(self.random.variant_payload()))),
        }
    }
}

/// §4.2: `iterations_for(sig)` — per-code floor, scaled by the maximum
/// array-nesting depth, clamped to `[10, u64::MAX]`, and then clamped again
/// by the caller's user-supplied min/max (done by `FuzzEngine`, not here).
pub fn iterations_for(sig: &TypeSignature) -> u64 {
    let depth_multiplier = sig.max_array_depth().max(1);
    let floor = sig.floor_sum();
    floor.saturating_mul(depth_multiplier).max(10)
}
