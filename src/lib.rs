// model-fuzzing/src/lib.rs
//! Model-walking mutation engine
//!
//! A grammar tree ([`model::ModelTree`]) describes the data under test; a
//! [`walker::ModelWalker`] traverses it depth-first and hands each node to
//! a [`walker::NodeConsumer`], which mutates the node in place. Every
//! mutation sub-iteration surfaces as a [`walker::WalkStep`], so a fuzzing
//! campaign is a plain pull loop:
//!
//! ```no_run
//! use model_fuzzing::consumers::BasicVisitor;
//! use model_fuzzing::walker::ModelWalker;
//! # let tree = model_fuzzing::model::ModelTree::new();
//!
//! let mut walker =
//!     ModelWalker::new(tree, BasicVisitor::default(), true, false, -1, 1).unwrap();
//! while let Some(step) = walker.next_step().unwrap() {
//!     let payload = walker.render();
//!     println!("#{} {} -> {} bytes", step.step_index, step.consumed_path, payload.len());
//! }
//! ```
//!
//! Walks are deterministic: the same tree, consumer and seed always produce
//! the same step sequence, and a `(initial_step, max_steps)` window selects
//! any contiguous slice of it for resumption.

pub mod constants;
pub mod consumers;
pub mod error;
pub mod model;
pub mod walker;

pub use error::WalkError;

/// Set up logging for a fuzzing binary. Safe to call more than once.
pub fn init() {
    let _ = env_logger::Builder::from_default_env().try_init();
}
