//! Parsing of IPC type signatures (original spec §3). The grammar is
//! recursive: basic scalars, `a<elem>` arrays, `(<elem>...)` tuples, and
//! `{<basic><elem>}` dict-entries which are only valid directly inside an
//! array.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basic {
    Byte,
    Boolean,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Double,
    FileHandle,
    String,
    ObjectPath,
    Signature,
    Variant,
}

impl Basic {
    fn from_code(c: char) -> Option<Self> {
        Some(match c {
            'y' => Basic::Byte,
            'b' => Basic::Boolean,
            'n' => Basic::Int16,
            'q' => Basic::Uint16,
            'i' => Basic::Int32,
            'u' => Basic::Uint32,
            'x' => Basic::Int64,
            't' => Basic::Uint64,
            'd' => Basic::Double,
            'h' => Basic::FileHandle,
            's' => Basic::String,
            'o' => Basic::ObjectPath,
            'g' => Basic::Signature,
            'v' => Basic::Variant,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            Basic::Byte => 'y',
            Basic::Boolean => 'b',
            Basic::Int16 => 'n',
            Basic::Uint16 => 'q',
            Basic::Int32 => 'i',
            Basic::Uint32 => 'u',
            Basic::Int64 => 'x',
            Basic::Uint64 => 't',
            Basic::Double => 'd',
            Basic::FileHandle => 'h',
            Basic::String => 's',
            Basic::ObjectPath => 'o',
            Basic::Signature => 'g',
            Basic::Variant => 'v',
        }
    }

    /// §4.2: per-code iteration floor.
    pub fn iteration_floor(self) -> u64 {
        match self {
            Basic::Byte => 8,
            Basic::Boolean => 2,
            Basic::Int16 | Basic::Uint16 => 16,
            Basic::Int32 | Basic::Uint32 | Basic::FileHandle => 24,
            Basic::Int64 | Basic::Uint64 | Basic::Double => 32,
            Basic::String | Basic::ObjectPath | Basic::Signature | Basic::Variant => 64,
        }
    }
}

impl fmt::Display for Basic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char(self.code())
    }
}

use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSignature {
    Basic(Basic),
    Array(Box<TypeSignature>),
    Tuple(Vec<TypeSignature>),
    DictEntry(Basic, Box<TypeSignature>),
}

impl TypeSignature {
    pub fn byte() -> Self {
        TypeSignature::Basic(Basic::Byte)
    }

    /// Maximum array-nesting depth reachable from this node (§4.2).
    pub fn max_array_depth(&self) -> u64 {
        match self {
            TypeSignature::Basic(_) => 0,
            TypeSignature::Array(inner) => 1 + inner.max_array_depth(),
            TypeSignature::DictEntry(_, value) => value.max_array_depth(),
            TypeSignature::Tuple(elems) => elems.iter().map(TypeSignature::max_array_depth).max().unwrap_or(0),
        }
    }

    /// §4.2 iteration floor, summed across every node in the tree and then
    /// scaled by the max array-nesting depth in `iterations_for`.
    pub fn floor_sum(&self) -> u64 {
        match self {
            TypeSignature::Basic(b) => b.iteration_floor(),
            TypeSignature::Array(inner) => inner.floor_sum(),
            TypeSignature::DictEntry(key, value) => key.iteration_floor() + value.floor_sum(),
            TypeSignature::Tuple(elems) => elems.iter().map(TypeSignature::floor_sum).sum::<u64>().max(1),
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Basic(b) => write!(f, "{b}"),
            TypeSignature::Array(inner) => write!(f, "a{inner}"),
            TypeSignature::Tuple(elems) => {
                f.write_char('(')?;
                for e in elems {
                    write!(f, "{e}")?;
                }
                f.write_char(')')
            }
            TypeSignature::DictEntry(key, value) => write!(f, "{{{key}{value}}}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureError(pub String);

impl fmt::Display for SignatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid type signature: {}", self.0)
    }
}
impl std::error::Error for SignatureError {}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self {
            chars: s.chars().peekable(),
        }
    }

    fn parse_one(&mut self, allow_dict_entry: bool) -> Result<TypeSignature, SignatureError> {
        let c = self
            .chars
            .next()
            .ok_or_else(|| SignatureError("unexpected end of signature".to_string()))?;
        match c {
            'a' => {
                // a dict-entry is only valid directly inside an array (original spec §3).
                let elem = self.parse_one(true)?;
                Ok(TypeSignature::Array(Box::new(elem)))
            }
            '(' => {
                let mut elems = Vec::new();
                loop {
                    match self.chars.peek() {
                        Some(')') => {
                            self.chars.next();
                            break;
                        }
                        Some(_) => elems.push(self.parse_one(false)?),
                        None => return Err(SignatureError("unterminated tuple".to_string())),
                    }
                }
                Ok(TypeSignature::Tuple(elems))
            }
            '{' if allow_dict_entry => {
                let key_code = self
                    .chars
                    .next()
                    .ok_or_else(|| SignatureError("unterminated dict entry".to_string()))?;
                let key = Basic::from_code(key_code)
                    .ok_or_else(|| SignatureError(format!("dict-entry key '{key_code}' is not a basic type")))?;
                let value = self.parse_one(false)?;
                match self.chars.next() {
                    Some('}') => Ok(TypeSignature::DictEntry(key, Box::new(value))),
                    _ => Err(SignatureError("unterminated dict entry".to_string())),
                }
            }
            '{' => Err(SignatureError(
                "a dict-entry ('{..}') is only valid directly inside an array".to_string(),
            )),
            other => Basic::from_code(other)
                .map(TypeSignature::Basic)
                .ok_or_else(|| SignatureError(format!("unknown type code '{other}'"))),
        }
    }
}

/// Parse a single type node (used for element/value types inside arrays).
pub fn parse(s: &str) -> Result<TypeSignature, SignatureError> {
    let mut parser = Parser::new(s);
    let sig = parser.parse_one(false)?;
    if parser.chars.peek().is_some() {
        return Err(SignatureError(format!("trailing characters after '{sig}'")));
    }
    Ok(sig)
}

/// Parse a top-level method-arguments signature: always a tuple, even for a
/// single argument or no arguments (original spec §3, §6).
pub fn parse_arguments(s: &str) -> Result<TypeSignature, SignatureError> {
    if !s.starts_with('(') {
        return Err(SignatureError(format!(
            "top-level argument signature must be a tuple, got '{s}'"
        )));
    }
    parse(s)
}
