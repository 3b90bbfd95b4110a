// model-fuzzing/src/consumers/mod.rs
//! Ready-made mutation strategies built on the consumer protocol

mod alt_conf;
mod basic;
mod nonterm;
mod separator;
mod typed;

pub use alt_conf::AltConfConsumer;
pub use basic::BasicVisitor;
pub use nonterm::NonTermVisitor;
pub use separator::SeparatorDisruption;
pub use typed::TypedNodeDisruption;

/// Scale a fuzz-variant queue by the policy magnitude, always keeping at
/// least one entry.
pub(crate) fn scaled_len(len: usize, magnitude: f64) -> usize {
    if len == 0 {
        return 0;
    }
    ((len as f64 * magnitude).ceil() as usize).clamp(1, len)
}

#[cfg(test)]
mod tests {
    use super::scaled_len;

    #[test]
    fn magnitude_scales_but_never_empties() {
        assert_eq!(scaled_len(6, 1.0), 6);
        assert_eq!(scaled_len(6, 0.5), 3);
        assert_eq!(scaled_len(6, 0.0), 1);
        assert_eq!(scaled_len(0, 1.0), 0);
    }
}
