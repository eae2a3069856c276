//! Quill IR Library
//!
//! A machine-agnostic intermediate representation organized as a
//! control-flow graph, plus the machine layer used by the backend.
//!
//! The [`Cfg`] owns everything in one translation unit's graph: the type
//! interner, the constant pool, the value/use arenas, and the named
//! global and function tables. Cross-references between nodes are opaque
//! ids into those arenas, so ownership stays acyclic while the graph
//! itself may not be.

pub mod cfg;
pub mod constant;
pub mod error;
pub mod function;
pub mod machine;
pub mod pass;
pub mod regalloc;
pub mod types;
pub mod value;

pub use cfg::Cfg;
pub use error::GraphError;
pub use function::{BinOp, BlockId, CastOp, FunctionId, Op, Predicate};
pub use machine::{MachFunction, PhysReg, Register, RegisterClass, TargetRegisters};
pub use pass::{Pass, TrivialDce};
pub use regalloc::{LiveRange, RegisterAllocator};
pub use types::{Type, TypeId, TypeInterner};
pub use value::{UseId, ValueId, ValueKind};
