//! CRDT (Conflict-free Replicated Data Types) module
//!
//! This module implements the merge algebra, including:
//! - The shared merge-by-id / sort / replay primitive
//! - Last-write-wins registers for single values
//! - Ordered sequences for insert/delete membership
//! - Monotonic timestamps for locally authored operations

pub mod clock;
pub mod history;
pub mod register;
pub mod sequence;


pub use clock::{Clock, OperationFactory};
pub use history::{Entry, History, Stamped};
pub use register::{RegisterCrdt, RegisterEdit, RegisterOp, Transform};
pub use sequence::{SequenceCrdt, SequenceEdit, SequenceOp};
