//! Linear-scan register allocation
//!
//! Maps live ranges over virtual registers onto physical registers, one
//! class at a time, walking ranges in start order. There is no spill
//! path: running out of candidates is a hard failure.

use crate::error::GraphError;
use crate::machine::{MachFunction, Register, RegisterClass, TargetRegisters};

/// The positional range over which a register carries a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveRange {
    /// The register this range represents, pre-allocation. Ranges made
    /// for physical registers keep the physical register here.
    pub reg: Register,
    /// The desired register class.
    pub class: RegisterClass,
    pub start: u32,
    pub end: u32,
    /// The physical register allocated over this range.
    pub alloc: Register,
    /// A dead range that should no longer be extended.
    pub killed: bool,
}

impl LiveRange {
    pub fn new(reg: Register, class: RegisterClass, start: u32, end: u32) -> Self {
        LiveRange { reg, class, start, end, alloc: Register::None, killed: false }
    }

    /// A pre-colored range: the physical assignment is fixed before the
    /// scan and must be honored by every later decision.
    pub fn precolored(reg: crate::machine::PhysReg, start: u32, end: u32) -> Self {
        LiveRange {
            reg: Register::Physical(reg),
            class: reg.class(),
            start,
            end,
            alloc: Register::Physical(reg),
            killed: false,
        }
    }

    /// True when this range overlaps `[start, end]` in any way.
    pub fn overlaps_span(&self, start: u32, end: u32) -> bool {
        self.start < end && self.end > start
    }

    pub fn overlaps(&self, other: &LiveRange) -> bool {
        self.overlaps_span(other.start, other.end)
    }
}

/// Allocates registers for one machine function's live ranges.
pub struct RegisterAllocator<'a> {
    #[allow(dead_code)]
    function: &'a MachFunction,
    pool: &'a TargetRegisters,
    ranges: &'a mut Vec<LiveRange>,
    active: Vec<usize>,
}

impl<'a> RegisterAllocator<'a> {
    /// `ranges` must be sorted by `start`; ranges with equal starts keep
    /// their input order.
    pub fn new(
        function: &'a MachFunction,
        pool: &'a TargetRegisters,
        ranges: &'a mut Vec<LiveRange>,
    ) -> Self {
        RegisterAllocator { function, pool, ranges, active: Vec::new() }
    }

    /// Scan all ranges in order, expiring finished intervals and
    /// assigning the first available pool register to each unallocated
    /// range.
    pub fn run(&mut self) -> Result<(), GraphError> {
        for index in 0..self.ranges.len() {
            self.expire_intervals(index);

            if self.ranges[index].alloc == Register::None {
                self.assign_register(index)?;
            }

            self.active.push(index);
        }

        Ok(())
    }

    fn expire_intervals(&mut self, current: usize) {
        let start = self.ranges[current].start;
        let ranges = &self.ranges;
        self.active.retain(|&i| ranges[i].end >= start);
    }

    fn assign_register(&mut self, current: usize) -> Result<(), GraphError> {
        let LiveRange { class, start, end, .. } = self.ranges[current];

        for &reg in self.pool.pool(class) {
            debug_assert!(reg.class() == class, "pool register in wrong class");

            if self.is_available(Register::Physical(reg), start, end) {
                self.ranges[current].alloc = Register::Physical(reg);
                return Ok(());
            }
        }

        Err(GraphError::OutOfRegisters { class, start, end })
    }

    /// A register is available over `[start, end]` when no range in the
    /// whole function has allocated it over an overlapping span. Scanning
    /// every range, not just the active set, is what makes pre-colored
    /// ranges downstream of the cursor visible here.
    fn is_available(&self, reg: Register, start: u32, end: u32) -> bool {
        self.ranges
            .iter()
            .all(|range| range.alloc != reg || !range.overlaps_span(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::PhysReg;

    fn gp_range(start: u32, end: u32, vreg: u32) -> LiveRange {
        LiveRange::new(Register::Virtual(vreg), RegisterClass::GeneralPurpose, start, end)
    }

    fn run(pool: &TargetRegisters, ranges: &mut Vec<LiveRange>) -> Result<(), GraphError> {
        let function = MachFunction::new("f");
        RegisterAllocator::new(&function, pool, ranges).run()
    }

    #[test]
    fn test_expired_register_is_reused() {
        let pool = TargetRegisters::with_pool(
            RegisterClass::GeneralPurpose,
            vec![PhysReg::Rax, PhysReg::Rcx, PhysReg::Rdx],
        );
        let mut ranges = vec![gp_range(0, 10, 0), gp_range(5, 15, 1), gp_range(20, 30, 2)];

        run(&pool, &mut ranges).unwrap();

        assert_eq!(ranges[0].alloc, Register::Physical(PhysReg::Rax));
        assert_eq!(ranges[1].alloc, Register::Physical(PhysReg::Rcx));
        assert_eq!(ranges[2].alloc, Register::Physical(PhysReg::Rax));
    }

    #[test]
    fn test_no_overlapping_ranges_share_a_register() {
        let pool = TargetRegisters::x86_64();
        let mut ranges = vec![
            gp_range(0, 8, 0),
            gp_range(2, 12, 1),
            gp_range(4, 6, 2),
            gp_range(7, 20, 3),
            gp_range(9, 11, 4),
        ];

        run(&pool, &mut ranges).unwrap();

        for i in 0..ranges.len() {
            assert!(ranges[i].alloc.is_physical());
            for j in i + 1..ranges.len() {
                if ranges[i].overlaps(&ranges[j]) {
                    assert_ne!(ranges[i].alloc, ranges[j].alloc, "ranges {} and {}", i, j);
                }
            }
        }
    }

    #[test]
    fn test_precolored_range_is_honored() {
        let pool =
            TargetRegisters::with_pool(RegisterClass::GeneralPurpose, vec![PhysReg::Rax, PhysReg::Rcx]);
        // The pre-colored range sits later in the scan order, but its
        // claim on rax over [4, 12] must already steer range 0 away.
        let mut ranges = vec![gp_range(0, 10, 0), LiveRange::precolored(PhysReg::Rax, 4, 12)];

        run(&pool, &mut ranges).unwrap();

        assert_eq!(ranges[0].alloc, Register::Physical(PhysReg::Rcx));
        assert_eq!(ranges[1].alloc, Register::Physical(PhysReg::Rax));
    }

    #[test]
    fn test_allocation_failure_when_pool_is_exhausted() {
        let pool = TargetRegisters::with_pool(RegisterClass::GeneralPurpose, vec![PhysReg::Rax]);
        let mut ranges = vec![gp_range(0, 10, 0), gp_range(5, 15, 1)];

        let err = run(&pool, &mut ranges).unwrap_err();
        assert!(matches!(err, GraphError::OutOfRegisters { .. }));
    }

    #[test]
    fn test_touching_ranges_may_share() {
        // [0,5] and [5,10] do not overlap under start < end && end > start.
        let pool = TargetRegisters::with_pool(RegisterClass::GeneralPurpose, vec![PhysReg::Rax]);
        let mut ranges = vec![gp_range(0, 5, 0), gp_range(5, 10, 1)];

        run(&pool, &mut ranges).unwrap();

        assert_eq!(ranges[0].alloc, Register::Physical(PhysReg::Rax));
        assert_eq!(ranges[1].alloc, Register::Physical(PhysReg::Rax));
    }

    #[test]
    fn test_classes_do_not_interfere() {
        let pools = TargetRegisters::x86_64();
        let mut ranges = vec![
            gp_range(0, 10, 0),
            LiveRange::new(Register::Virtual(1), RegisterClass::FloatingPoint, 0, 10),
        ];

        run(&pools, &mut ranges).unwrap();

        assert_eq!(ranges[0].alloc, Register::Physical(PhysReg::Rax));
        assert_eq!(ranges[1].alloc, Register::Physical(PhysReg::Xmm0));
    }
}
