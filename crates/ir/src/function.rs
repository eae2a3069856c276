//! Functions, basic blocks, and instruction opcodes
//!
//! A function is an ordered list of basic blocks plus an ordered list of
//! stack locals; a block is an ordered list of instructions. The data
//! here is plain storage: all mutation goes through [`crate::Cfg`], which
//! owns the arenas these ids point into.

use crate::value::ValueId;

/// Handle to a function in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub(crate) u32);

/// Handle to a basic block in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

/// Binary arithmetic and bitwise opcodes. Signedness and floatness are
/// read off the operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::Div => "div",
            BinOp::Rem => "rem",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "shl",
            BinOp::Shr => "shr",
        }
    }
}

/// Comparison predicates. Produce `i1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Predicate {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Predicate::Eq => "eq",
            Predicate::Ne => "ne",
            Predicate::Lt => "lt",
            Predicate::Le => "le",
            Predicate::Gt => "gt",
            Predicate::Ge => "ge",
        }
    }
}

/// Value conversion opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastOp {
    /// Sign-extend an integer.
    Sext,
    /// Zero-extend an integer.
    Zext,
    /// Truncate an integer.
    Trunc,
    /// Extend a float.
    FpExt,
    /// Truncate a float.
    FpTrunc,
    /// Signed integer to float.
    SiToFp,
    /// Float to signed integer.
    FpToSi,
    /// Integer to pointer.
    IntToPtr,
    /// Pointer to integer.
    PtrToInt,
    /// Reinterpret between pointer types.
    Bit,
}

impl CastOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastOp::Sext => "sext",
            CastOp::Zext => "zext",
            CastOp::Trunc => "trunc",
            CastOp::FpExt => "fpext",
            CastOp::FpTrunc => "fptrunc",
            CastOp::SiToFp => "sitofp",
            CastOp::FpToSi => "fptosi",
            CastOp::IntToPtr => "inttoptr",
            CastOp::PtrToInt => "ptrtoint",
            CastOp::Bit => "bitcast",
        }
    }
}

/// Instruction opcodes. Operands live in the instruction value's operand
/// list; block targets are structural, not operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// Read through operand 0 (a pointer).
    Load,
    /// Write operand 0 through operand 1 (a pointer).
    Store,
    Binary(BinOp),
    Cmp(Predicate),
    Cast(CastOp),
    /// Unconditional branch.
    Br(BlockId),
    /// Branch on operand 0 (`i1`).
    CondBr(BlockId, BlockId),
    /// Return operand 0, or nothing for void functions.
    Ret,
    /// Call operand 0 with the remaining operands as arguments.
    Call,
    /// Address of field `n` of the struct behind operand 0.
    FieldAddr(u32),
    /// Address of element operand 1 of the array behind operand 0.
    IndexAddr,
    /// Inline assembly. The index names a template interned on the
    /// graph; operands are the template's inputs.
    Asm(u32),
}

impl Op {
    /// True when removing an unused instance of this instruction cannot
    /// change observable behavior.
    pub fn is_pure(self) -> bool {
        !matches!(
            self,
            Op::Store | Op::Br(_) | Op::CondBr(_, _) | Op::Ret | Op::Call | Op::Asm(_)
        )
    }

    pub fn is_terminator(self) -> bool {
        matches!(self, Op::Br(_) | Op::CondBr(_, _) | Op::Ret)
    }
}

/// A function slot: ordered blocks and ordered locals, both owned by the
/// graph arenas.
#[derive(Debug)]
pub struct FunctionData {
    pub name: String,
    /// The function's type; always a `Type::Function`.
    pub ty: crate::types::TypeId,
    /// The address value standing for this function in operand lists.
    pub value: ValueId,
    pub params: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    pub locals: Vec<ValueId>,
}

/// A block slot: the parent function and the ordered instruction list.
#[derive(Debug)]
pub struct BlockData {
    pub parent: Option<FunctionId>,
    pub insts: Vec<ValueId>,
}
