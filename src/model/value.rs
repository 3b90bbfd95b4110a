// model-fuzzing/src/model/value.rs
//! Typed terminal values and their draw cursors

use rand::rngs::StdRng;
use rand::Rng;

/// An integer-typed terminal value.
///
/// `candidates` is the ordered set of legal values the node may take in
/// deterministic mode; `bounds` records the declared legal range even when
/// the candidate list does not cover it (value-disruption consumers derive
/// boundary cases from it).
#[derive(Debug, Clone, PartialEq)]
pub struct IntValue {
    pub candidates: Vec<i64>,
    pub bounds: Option<(i64, i64)>,
    pub bits: u32,
    pub signed: bool,
    cursor: Cursor,
}

/// A byte-string-typed terminal value.
#[derive(Debug, Clone, PartialEq)]
pub struct BytesValue {
    pub candidates: Vec<Vec<u8>>,
    cursor: Cursor,
}

/// Draw cursor shared by all typed values.
///
/// `wrapped` is the exhaustion flag: it is set once the cursor has cycled
/// through every candidate and returned to its starting position, and it is
/// only cleared by an explicit rewind (exhaustion is monotonic within a walk).
#[derive(Debug, Clone, Default, PartialEq)]
struct Cursor {
    pos: usize,
    draws: usize,
    wrapped: bool,
}

impl Cursor {
    fn advance(&mut self, len: usize, rng: Option<&mut StdRng>) {
        if len == 0 {
            self.wrapped = true;
            return;
        }
        match rng {
            Some(rng) => {
                self.pos = rng.gen_range(0..len);
            }
            None => {
                self.pos = (self.pos + 1) % len;
            }
        }
        self.draws += 1;
        if self.draws >= len {
            self.wrapped = true;
        }
    }

    fn rewind(&mut self) {
        self.pos = 0;
        self.draws = 0;
        self.wrapped = false;
    }
}

/// A typed terminal value: the content of a non-generator terminal node.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Int(IntValue),
    Bytes(BytesValue),
}

impl TypedValue {
    pub fn int(candidates: Vec<i64>, bounds: Option<(i64, i64)>, bits: u32, signed: bool) -> Self {
        TypedValue::Int(IntValue {
            candidates,
            bounds,
            bits,
            signed,
            cursor: Cursor::default(),
        })
    }

    pub fn bytes(candidates: Vec<Vec<u8>>) -> Self {
        TypedValue::Bytes(BytesValue {
            candidates,
            cursor: Cursor::default(),
        })
    }

    /// Single fixed byte-string value (cardinality 1).
    pub fn fixed(value: Vec<u8>) -> Self {
        TypedValue::bytes(vec![value])
    }

    pub fn cardinality(&self) -> usize {
        match self {
            TypedValue::Int(v) => v.candidates.len(),
            TypedValue::Bytes(v) => v.candidates.len(),
        }
    }

    /// Byte materialization of the current candidate. Integers render as
    /// decimal ASCII.
    pub fn current_bytes(&self) -> Vec<u8> {
        match self {
            TypedValue::Int(v) => v
                .candidates
                .get(v.cursor.pos)
                .map(|n| n.to_string().into_bytes())
                .unwrap_or_default(),
            TypedValue::Bytes(v) => v.candidates.get(v.cursor.pos).cloned().unwrap_or_default(),
        }
    }

    /// Draw the next candidate: sequential (with wrap-around) in
    /// deterministic mode, uniform pick when an RNG is supplied.
    pub fn advance(&mut self, rng: Option<&mut StdRng>) {
        let len = self.cardinality();
        match self {
            TypedValue::Int(v) => v.cursor.advance(len, rng),
            TypedValue::Bytes(v) => v.cursor.advance(len, rng),
        }
    }

    /// A value with at most one candidate has nothing further to offer.
    pub fn is_exhausted(&self) -> bool {
        let wrapped = match self {
            TypedValue::Int(v) => v.cursor.wrapped,
            TypedValue::Bytes(v) => v.cursor.wrapped,
        };
        wrapped || self.cardinality() <= 1
    }

    /// Explicit reset: clears the exhaustion flag and the draw position.
    pub fn rewind(&mut self) {
        match self {
            TypedValue::Int(v) => v.cursor.rewind(),
            TypedValue::Bytes(v) => v.cursor.rewind(),
        }
    }

    /// Copy the draw state from an entangled peer holding the same value
    /// shape, so both render identically on the next freeze.
    pub fn sync_from(&mut self, other: &TypedValue) {
        match (self, other) {
            (TypedValue::Int(a), TypedValue::Int(b)) => a.cursor = b.cursor.clone(),
            (TypedValue::Bytes(a), TypedValue::Bytes(b)) => a.cursor = b.cursor.clone(),
            _ => {}
        }
    }

    pub fn as_int(&self) -> Option<&IntValue> {
        match self {
            TypedValue::Int(v) => Some(v),
            TypedValue::Bytes(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_draws_cycle_and_exhaust() {
        let mut v = TypedValue::bytes(vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert_eq!(v.current_bytes(), b"a");
        assert!(!v.is_exhausted());

        v.advance(None);
        assert_eq!(v.current_bytes(), b"b");
        assert!(!v.is_exhausted());

        v.advance(None);
        assert_eq!(v.current_bytes(), b"c");
        assert!(!v.is_exhausted());

        v.advance(None);
        assert_eq!(v.current_bytes(), b"a");
        assert!(v.is_exhausted());
    }

    #[test]
    fn singleton_is_exhausted_from_the_start() {
        let v = TypedValue::fixed(b"only".to_vec());
        assert!(v.is_exhausted());
    }

    #[test]
    fn rewind_clears_exhaustion() {
        let mut v = TypedValue::int(vec![1, 2], None, 8, false);
        v.advance(None);
        v.advance(None);
        assert!(v.is_exhausted());
        v.rewind();
        assert!(!v.is_exhausted());
        assert_eq!(v.current_bytes(), b"1");
    }

    #[test]
    fn int_renders_decimal_ascii() {
        let v = TypedValue::int(vec![41], Some((9, 40)), 8, false);
        assert_eq!(v.current_bytes(), b"41");
    }
}
