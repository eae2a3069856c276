//! Machine registers and target register sets
//!
//! The machine layer tags registers as physical (drawn from a fixed
//! target set, each belonging to a class) or virtual (a fresh id per
//! function). The allocator maps virtuals onto physicals per class.

use std::collections::HashMap;
use std::fmt;

/// A partition of the physical register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    GeneralPurpose,
    FloatingPoint,
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterClass::GeneralPurpose => write!(f, "general-purpose"),
            RegisterClass::FloatingPoint => write!(f, "floating-point"),
        }
    }
}

/// A physical register of the x86-64 target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[rustfmt::skip]
pub enum PhysReg {
    Rax, Rcx, Rdx, Rsi, Rdi,
    R8, R9, R10, R11, R12, R13, R14, R15,
    Xmm0, Xmm1, Xmm2, Xmm3, Xmm4, Xmm5, Xmm6, Xmm7,
    Xmm8, Xmm9, Xmm10, Xmm11, Xmm12, Xmm13, Xmm14, Xmm15,
}

impl PhysReg {
    pub fn class(self) -> RegisterClass {
        match self {
            PhysReg::Rax
            | PhysReg::Rcx
            | PhysReg::Rdx
            | PhysReg::Rsi
            | PhysReg::Rdi
            | PhysReg::R8
            | PhysReg::R9
            | PhysReg::R10
            | PhysReg::R11
            | PhysReg::R12
            | PhysReg::R13
            | PhysReg::R14
            | PhysReg::R15 => RegisterClass::GeneralPurpose,
            _ => RegisterClass::FloatingPoint,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PhysReg::Rax => "rax",
            PhysReg::Rcx => "rcx",
            PhysReg::Rdx => "rdx",
            PhysReg::Rsi => "rsi",
            PhysReg::Rdi => "rdi",
            PhysReg::R8 => "r8",
            PhysReg::R9 => "r9",
            PhysReg::R10 => "r10",
            PhysReg::R11 => "r11",
            PhysReg::R12 => "r12",
            PhysReg::R13 => "r13",
            PhysReg::R14 => "r14",
            PhysReg::R15 => "r15",
            PhysReg::Xmm0 => "xmm0",
            PhysReg::Xmm1 => "xmm1",
            PhysReg::Xmm2 => "xmm2",
            PhysReg::Xmm3 => "xmm3",
            PhysReg::Xmm4 => "xmm4",
            PhysReg::Xmm5 => "xmm5",
            PhysReg::Xmm6 => "xmm6",
            PhysReg::Xmm7 => "xmm7",
            PhysReg::Xmm8 => "xmm8",
            PhysReg::Xmm9 => "xmm9",
            PhysReg::Xmm10 => "xmm10",
            PhysReg::Xmm11 => "xmm11",
            PhysReg::Xmm12 => "xmm12",
            PhysReg::Xmm13 => "xmm13",
            PhysReg::Xmm14 => "xmm14",
            PhysReg::Xmm15 => "xmm15",
        }
    }
}

/// A register operand: unassigned, virtual, or physical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Register {
    /// No register. The state of a live range before allocation.
    #[default]
    None,
    /// A function-local virtual register.
    Virtual(u32),
    Physical(PhysReg),
}

impl Register {
    pub fn is_physical(self) -> bool {
        matches!(self, Register::Physical(_))
    }

    pub fn is_virtual(self) -> bool {
        matches!(self, Register::Virtual(_))
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::None => write!(f, "<none>"),
            Register::Virtual(id) => write!(f, "%{}", id),
            Register::Physical(reg) => write!(f, "${}", reg.name()),
        }
    }
}

/// Allocation pools per register class, in preference order: the first
/// available register in a pool wins.
#[derive(Debug)]
pub struct TargetRegisters {
    pools: HashMap<RegisterClass, Vec<PhysReg>>,
}

impl TargetRegisters {
    /// The full x86-64 pools, caller-saved first.
    pub fn x86_64() -> Self {
        let mut pools = HashMap::new();
        pools.insert(
            RegisterClass::GeneralPurpose,
            vec![
                PhysReg::Rax,
                PhysReg::Rcx,
                PhysReg::Rdx,
                PhysReg::Rsi,
                PhysReg::Rdi,
                PhysReg::R8,
                PhysReg::R9,
                PhysReg::R10,
                PhysReg::R11,
                PhysReg::R12,
                PhysReg::R13,
                PhysReg::R14,
                PhysReg::R15,
            ],
        );
        pools.insert(
            RegisterClass::FloatingPoint,
            vec![
                PhysReg::Xmm0,
                PhysReg::Xmm1,
                PhysReg::Xmm2,
                PhysReg::Xmm3,
                PhysReg::Xmm4,
                PhysReg::Xmm5,
                PhysReg::Xmm6,
                PhysReg::Xmm7,
                PhysReg::Xmm8,
                PhysReg::Xmm9,
                PhysReg::Xmm10,
                PhysReg::Xmm11,
                PhysReg::Xmm12,
                PhysReg::Xmm13,
                PhysReg::Xmm14,
                PhysReg::Xmm15,
            ],
        );
        TargetRegisters { pools }
    }

    /// Build a pool table from explicit lists, for tests and reduced
    /// targets.
    pub fn with_pool(class: RegisterClass, regs: Vec<PhysReg>) -> Self {
        let mut pools = HashMap::new();
        pools.insert(class, regs);
        TargetRegisters { pools }
    }

    pub fn pool(&self, class: RegisterClass) -> &[PhysReg] {
        self.pools.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A function in the machine layer: a name and a virtual register
/// counter. Instruction selection fills in the rest.
#[derive(Debug)]
pub struct MachFunction {
    name: String,
    next_vreg: u32,
}

impl MachFunction {
    pub fn new(name: &str) -> Self {
        MachFunction { name: name.to_string(), next_vreg: 0 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mint a fresh virtual register.
    pub fn new_vreg(&mut self) -> Register {
        let id = self.next_vreg;
        self.next_vreg += 1;
        Register::Virtual(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_classes() {
        assert_eq!(PhysReg::Rax.class(), RegisterClass::GeneralPurpose);
        assert_eq!(PhysReg::R15.class(), RegisterClass::GeneralPurpose);
        assert_eq!(PhysReg::Xmm0.class(), RegisterClass::FloatingPoint);
        assert_eq!(PhysReg::Xmm15.class(), RegisterClass::FloatingPoint);
    }

    #[test]
    fn test_vregs_are_fresh_per_function() {
        let mut function = MachFunction::new("f");
        assert_eq!(function.new_vreg(), Register::Virtual(0));
        assert_eq!(function.new_vreg(), Register::Virtual(1));

        let mut other = MachFunction::new("g");
        assert_eq!(other.new_vreg(), Register::Virtual(0));
    }

    #[test]
    fn test_pool_order_is_preserved() {
        let target = TargetRegisters::x86_64();
        let pool = target.pool(RegisterClass::GeneralPurpose);
        assert_eq!(pool[0], PhysReg::Rax);
        assert_eq!(pool[1], PhysReg::Rcx);
        assert_eq!(pool.len(), 13);
        assert_eq!(target.pool(RegisterClass::FloatingPoint).len(), 16);
    }
}
