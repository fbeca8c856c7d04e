//! Seedable random primitives biased toward boundary conditions (original
//! spec §4.1). Seeded once at startup from wall-clock time unless the caller
//! supplies a fixed seed (our `--seed` supplement, SPEC_FULL.md §9).

use std::cell::Cell;

const INTERESTING_STRINGS: &[&str] = &[
    "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
    "%s%s%s%s%s%s%s%s%s%s%n%n%n%n%n%n",
    ":(){ :|:& };:",
    "com.example.InterestingBusName",
    "/com/example/InterestingObjectPath",
];

/// A seeded generator of typed random primitives. Each per-call-index state
/// (string length, object-path length, signature length) advances on every
/// call and resets at a configured ceiling, so repeated calls explore an
/// increasing range rather than resampling the same distribution.
pub struct RandomSource {
    rng: fastrand::Rng,
    string_call_index: Cell<u32>,
    string_len_cursor: Cell<usize>,
    object_path_len_cursor: Cell<usize>,
    signature_len_cursor: Cell<usize>,
    max_string_bytes: usize,
}

impl RandomSource {
    pub fn new(seed: u64, max_string_bytes: usize) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            string_call_index: Cell::new(0),
            string_len_cursor: Cell::new(1),
            object_path_len_cursor: Cell::new(1),
            signature_len_cursor: Cell::new(1),
            max_string_bytes,
        }
    }

    /// Seed from wall-clock time, as the original spec's §4.1 mandates
    /// (determinism under a fixed seed is a nice-to-have, not contractual).
    pub fn from_wall_clock(max_string_bytes: usize) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        Self::new(nanos, max_string_bytes)
    }

    fn biased_u64(&self, max: u64) -> u64 {
        // probabilities expressed as out of 65535, per the original spec's bias table.
        let roll = self.rng.u32(0..65535);
        if roll < 100 {
            max
        } else if roll < 200 {
            max / 2
        } else if roll < 250 {
            0
        } else {
            let base = self.rng.u64(0..=max);
            if self.rng.bool() {
                base.wrapping_add(1) & max
            } else {
                base
            }
        }
    }

    pub fn byte(&self) -> u8 {
        self.biased_u64(u8::MAX as u64) as u8
    }

    pub fn boolean(&self) -> bool {
        self.rng.bool()
    }

    pub fn uint16(&self) -> u16 {
        self.biased_u64(u16::MAX as u64) as u16
    }

    pub fn uint32(&self) -> u32 {
        self.biased_u64(u32::MAX as u64) as u32
    }

    pub fn uint64(&self) -> u64 {
        self.biased_u64(u64::MAX)
    }

    fn biased_signed(&self, bits: u32) -> i64 {
        // `1i64 << 63` is already `i64::MIN`, so the general formula
        // underflows for the 64-bit case; special-case the full width.
        let (max, min) = if bits >= 64 {
            (i64::MAX, i64::MIN)
        } else {
            let max = (1i64 << (bits - 1)) - 1;
            (max, -(max) - 1)
        };
        let roll = self.rng.u32(0..65535);
        if roll < 100 {
            max
        } else if roll < 200 {
            max / 2
        } else if roll < 300 {
            0
        } else if roll < 400 {
            min
        } else {
            let base = self.rng.i64(min..=max);
            if self.rng.bool() {
                if self.rng.bool() {
                    // `base` can be `i64::MIN` itself when bits == 64, which
                    // has no positive negation, hence `checked_neg`.
                    base.checked_neg().unwrap_or(i64::MAX).saturating_sub(1).max(min)
                } else {
                    base.saturating_add(1).min(max)
                }
            } else {
                base
            }
        }
    }

    pub fn int16(&self) -> i16 {
        self.biased_signed(16) as i16
    }

    pub fn int32(&self) -> i32 {
        self.biased_signed(32) as i32
    }

    pub fn int64(&self) -> i64 {
        self.biased_signed(64)
    }

    /// §4.1: adds `MIN_POSITIVE` as a fourth extreme class beyond the
    /// integer bias table; otherwise a random integer cast to double plus a
    /// fractional part in `[0, 1)`.
    pub fn double(&self) -> f64 {
        let roll = self.rng.u32(0..65535);
        if roll < 75 {
            f64::MAX
        } else if roll < 150 {
            f64::MIN
        } else if roll < 200 {
            0.0
        } else if roll < 250 {
            f64::MIN_POSITIVE
        } else {
            let integral = self.rng.i64(i64::MIN..=i64::MAX) as f64;
            integral + self.rng.f64()
        }
    }

    /// §4.1: non-negative int, ≈10% chance of `-1`.
    pub fn file_handle(&self) -> i32 {
        if self.rng.u32(0..100) < 10 {
            -1
        } else {
            self.rng.i32(0..i32::MAX)
        }
    }

    /// §4.1: the first few calls replay a fixed table of "interesting"
    /// strings, then random printable-ASCII strings of growing length up to
    /// `max_string_bytes`, resetting once that ceiling is reached.
    pub fn string(&self) -> String {
        let call_index = self.string_call_index.get();
        self.string_call_index.set(call_index + 1);
        if (call_index as usize) < INTERESTING_STRINGS.len() {
            return INTERESTING_STRINGS[call_index as usize].to_string();
        }

        let len = self.string_len_cursor.get();
        let next = if len >= self.max_string_bytes { 1 } else { len + 1 };
        self.string_len_cursor.set(next);

        (0..len).map(|_| printable_ascii(self.rng.u8(32..=126))).collect()
    }

    /// §4.1: `/seg/seg/seg`, each segment a letter followed by
    /// letters/digits/underscores, length grows per call up to a ceiling
    /// then resets.
    pub fn object_path(&self) -> String {
        let len = self.object_path_len_cursor.get();
        let ceiling = self.max_string_bytes.max(8);
        let next = if len >= ceiling { 1 } else { len + 1 };
        self.object_path_len_cursor.set(next);

        let mut out = String::new();
        for _ in 0..3 {
            out.push('/');
            out.push(self.random_letter());
            for _ in 0..len {
                out.push(self.object_path_segment_char());
            }
        }
        out
    }

    fn random_letter(&self) -> char {
        const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
        LETTERS[self.rng.usize(0..LETTERS.len())] as char
    }

    fn object_path_segment_char(&self) -> char {
        match self.rng.u8(0..3) {
            0 => self.random_letter(),
            1 => char::from_digit(self.rng.u32(0..10), 10).unwrap(),
            _ => '_',
        }
    }

    /// §4.1: sequences over the basic-type alphabet, length growing per
    /// call, reused by the variant generator's "one internal string" payload.
    pub fn signature(&self) -> String {
        let len = self.signature_len_cursor.get();
        let ceiling = self.max_string_bytes.max(8);
        let next = if len >= ceiling { 1 } else { len + 1 };
        self.signature_len_cursor.set(next);

        const CODES: &[char] = &['y', 'b', 'n', 'q', 'i', 'u', 'x', 't', 'd', 'h', 's', 'o', 'g', 'v'];
        (0..len).map(|_| CODES[self.rng.usize(0..CODES.len())]).collect()
    }

    /// §4.1: the variant's internal single-string payload reuses the string
    /// generator.
    pub fn variant_payload(&self) -> String {
        self.string()
    }

    pub fn array_len(&self) -> usize {
        self.rng.usize(0..10)
    }
}

fn printable_ascii(byte: u8) -> char {
    byte as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn byte_reaches_all_bias_classes_over_a_large_sample() {
        let source = RandomSource::new(1, 256);
        let mut seen: HashSet<u8> = HashSet::new();
        for _ in 0..5000 {
            seen.insert(source.byte());
        }
        assert!(seen.contains(&u8::MAX));
        assert!(seen.contains(&0));
        assert!(seen.contains(&(u8::MAX / 2)));
    }

    #[test]
    fn int32_reaches_negative_extreme_over_a_large_sample() {
        let source = RandomSource::new(2, 256);
        let mut saw_min = false;
        for _ in 0..20_000 {
            if source.int32() == i32::MIN {
                saw_min = true;
                break;
            }
        }
        assert!(saw_min, "i32::MIN should be reachable within 20000 samples");
    }

    #[test]
    fn strings_replay_interesting_table_before_growing() {
        let source = RandomSource::new(3, 1024);
        assert_eq!(source.string(), INTERESTING_STRINGS[0]);
        assert_eq!(source.string(), INTERESTING_STRINGS[1]);
    }

    #[test]
    fn object_paths_are_well_formed() {
        let source = RandomSource::new(4, 64);
        for _ in 0..50 {
            let path = source.object_path();
            assert!(path.starts_with('/'));
            assert_eq!(path.matches('/').count(), 3);
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                assert!(segment.chars().next().unwrap().is_ascii_alphabetic());
                assert!(segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_'));
            }
        }
    }

    #[test]
    fn signatures_are_over_the_basic_alphabet() {
        let source = RandomSource::new(5, 64);
        for _ in 0..50 {
            let sig = source.signature();
            assert!(sig.chars().all(|c| "ybnqixtdhosgv".contains(c)));
        }
    }

    #[test]
    fn file_handle_is_mostly_non_negative() {
        let source = RandomSource::new(6, 64);
        let mut saw_negative_one = false;
        let mut negative_count = 0;
        for _ in 0..2000 {
            let h = source.file_handle();
            if h == -1 {
                saw_negative_one = true;
                negative_count += 1;
            } else {
                assert!(h >= 0);
            }
        }
        assert!(saw_negative_one);
        assert!(negative_count < 2000);
    }
}
