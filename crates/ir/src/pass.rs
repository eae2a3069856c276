//! Graph analysis passes
//!
//! The only pass carried here is trivial dead-code elimination; anything
//! heavier belongs to the backend.

use crate::cfg::Cfg;
use crate::value::{ValueId, ValueKind};

/// A pass over a whole graph.
pub trait Pass {
    fn name(&self) -> &'static str;

    fn run(&mut self);
}

/// Deletes instructions that have no uses and no side effects. Candidates
/// are collected first and erased after the walk, so the instruction
/// lists are never mutated during iteration.
pub struct TrivialDce<'a> {
    cfg: &'a mut Cfg,
    to_remove: Vec<ValueId>,
}

impl<'a> TrivialDce<'a> {
    pub fn new(cfg: &'a mut Cfg) -> Self {
        TrivialDce { cfg, to_remove: Vec::new() }
    }

    fn process(&mut self, function: crate::function::FunctionId) {
        let blocks = self.cfg.function(function).blocks.clone();
        for block in blocks {
            let insts = self.cfg.block(block).insts.clone();
            for inst in insts {
                if self.is_trivially_dead(inst) {
                    self.to_remove.push(inst);
                }
            }
        }

        for inst in std::mem::take(&mut self.to_remove) {
            self.cfg.erase_inst(inst);
        }
    }

    fn is_trivially_dead(&self, inst: ValueId) -> bool {
        let data = self.cfg.value(inst);
        match data.kind {
            ValueKind::Inst { op, .. } => op.is_pure() && !data.used(),
            _ => false,
        }
    }
}

impl Pass for TrivialDce<'_> {
    fn name(&self) -> &'static str {
        "trivial-dce"
    }

    fn run(&mut self) {
        for function in self.cfg.functions().to_vec() {
            self.process(function);
        }
    }
}
