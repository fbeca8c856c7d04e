//! `TypeSignature` parsing, the biased `RandomSource`, and the recursive
//! `ValueBuilder` (original spec §3, §4.1, §4.2).

pub mod random;
pub mod signature;
pub mod value;

pub use random::RandomSource;
pub use signature::{Basic, SignatureError, TypeSignature};
pub use value::{iterations_for, Value, ValueBuildError, ValueBuilder};
