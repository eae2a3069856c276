//! The control-flow graph container
//!
//! One [`Cfg`] per translation unit. It owns the type interner, the
//! constant pool, the value and use-edge arenas, and the named global and
//! function tables. Everything else in this crate hands out ids into
//! these arenas.

use std::collections::HashMap;
use std::fmt::Write;

use crate::constant::ConstantPool;
use crate::error::GraphError;
use crate::function::{BlockData, BlockId, FunctionData, FunctionId, Op};
use crate::types::{TypeId, TypeInterner};
use crate::value::{UseData, UseId, ValueData, ValueId, ValueKind};

pub struct Cfg {
    pub types: TypeInterner,
    filename: String,

    values: Vec<ValueData>,
    edges: Vec<UseData>,

    pub(crate) constants: ConstantPool,

    functions: Vec<FunctionData>,
    blocks: Vec<BlockData>,

    globals_by_name: HashMap<String, ValueId>,
    functions_by_name: HashMap<String, FunctionId>,
    global_order: Vec<ValueId>,
    function_order: Vec<FunctionId>,

    asm_texts: Vec<String>,
}

impl Cfg {
    pub fn new(filename: &str) -> Self {
        let mut cfg = Cfg {
            types: TypeInterner::new(),
            filename: filename.to_string(),
            values: Vec::new(),
            edges: Vec::new(),
            constants: ConstantPool::default(),
            functions: Vec::new(),
            blocks: Vec::new(),
            globals_by_name: HashMap::new(),
            functions_by_name: HashMap::new(),
            global_order: Vec::new(),
            function_order: Vec::new(),
            asm_texts: Vec::new(),
        };

        cfg.constants.seed(&mut cfg.types, &mut cfg.values);
        cfg
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    // ---- value arena -------------------------------------------------

    pub(crate) fn new_value(&mut self, ty: TypeId, kind: ValueKind) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData::new(ty, kind));
        id
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.0 as usize]
    }

    pub fn value_type(&self, id: ValueId) -> TypeId {
        self.value(id).ty
    }

    // ---- use edges ---------------------------------------------------

    pub fn use_edge(&self, id: UseId) -> &UseData {
        &self.edges[id.0 as usize]
    }

    /// Append `value` to `user`'s operand list, registering the new edge
    /// on `value`'s use list.
    pub fn add_operand(&mut self, user: ValueId, value: ValueId) -> UseId {
        let id = UseId(self.edges.len() as u32);
        self.edges.push(UseData { value, user });
        self.values[value.0 as usize].uses.push(id);
        self.values[user.0 as usize].operands.push(id);
        id
    }

    /// Retarget the edge `edge` at `value`. A no-op when the value is
    /// unchanged; otherwise the edge is deregistered from the old value
    /// and registered on the new one.
    pub fn set_use_value(&mut self, edge: UseId, value: ValueId) {
        let old = self.edges[edge.0 as usize].value;
        if old == value {
            return;
        }

        let uses = &mut self.values[old.0 as usize].uses;
        if let Some(pos) = uses.iter().position(|&u| u == edge) {
            uses.remove(pos);
        }

        self.edges[edge.0 as usize].value = value;
        self.values[value.0 as usize].uses.push(edge);
    }

    /// Drop the edge `edge` entirely: deregister it from its value's use
    /// list and remove it from its user's operand list.
    pub fn drop_use(&mut self, edge: UseId) {
        let UseData { value, user } = self.edges[edge.0 as usize];

        let uses = &mut self.values[value.0 as usize].uses;
        if let Some(pos) = uses.iter().position(|&u| u == edge) {
            uses.remove(pos);
        }

        let operands = &mut self.values[user.0 as usize].operands;
        if let Some(pos) = operands.iter().position(|&u| u == edge) {
            operands.remove(pos);
        }
    }

    /// Retarget every use of `old` at `new`. The use list is snapshotted
    /// first, so the iteration is safe against the mutation; afterwards
    /// `old` has no remaining uses.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        let snapshot = self.values[old.0 as usize].uses.clone();
        for edge in snapshot {
            self.set_use_value(edge, new);
        }
    }

    pub fn operand_value(&self, user: ValueId, index: usize) -> ValueId {
        let edge = self.value(user).operands()[index];
        self.use_edge(edge).value
    }

    // ---- globals -----------------------------------------------------

    /// Create a global named `name` of `ty`, optionally with a constant
    /// initializer. The value's type is a pointer to `ty`.
    pub fn add_global(
        &mut self,
        name: &str,
        ty: TypeId,
        align: u32,
        init: Option<ValueId>,
    ) -> Result<ValueId, GraphError> {
        if self.globals_by_name.contains_key(name) || self.functions_by_name.contains_key(name) {
            return Err(GraphError::NameConflict(name.to_string()));
        }

        let ptr = self.types.pointer(ty);
        let id = self.new_value(ptr, ValueKind::Global { name: name.to_string(), align });
        if let Some(init) = init {
            self.add_operand(id, init);
        }

        self.globals_by_name.insert(name.to_string(), id);
        self.global_order.push(id);
        Ok(id)
    }

    pub fn get_global(&self, name: &str) -> Option<ValueId> {
        self.globals_by_name.get(name).copied()
    }

    pub fn globals(&self) -> &[ValueId] {
        &self.global_order
    }

    /// Detach a global from the named table. Its value slot and any uses
    /// are left to the caller.
    pub fn remove_global(&mut self, id: ValueId) {
        if let ValueKind::Global { name, .. } = &self.value(id).kind {
            let name = name.clone();
            if self.globals_by_name.get(&name) == Some(&id) {
                self.globals_by_name.remove(&name);
                self.global_order.retain(|&g| g != id);
            }
        }
    }

    // ---- functions ---------------------------------------------------

    /// Create a function named `name` with the given function type and
    /// parameter names.
    pub fn add_function(
        &mut self,
        name: &str,
        ty: TypeId,
        param_names: &[String],
    ) -> Result<FunctionId, GraphError> {
        if self.globals_by_name.contains_key(name) || self.functions_by_name.contains_key(name) {
            return Err(GraphError::NameConflict(name.to_string()));
        }

        let param_types = match self.types.get(ty) {
            crate::types::Type::Function { params, .. } => params.clone(),
            _ => Vec::new(),
        };

        let mut params = Vec::with_capacity(param_names.len());
        for (index, pname) in param_names.iter().enumerate() {
            let pty = param_types.get(index).copied().unwrap_or(self.types.void());
            let param = self.new_value(
                pty,
                ValueKind::Param { name: pname.clone(), index: index as u32 },
            );
            params.push(param);
        }

        let id = FunctionId(self.functions.len() as u32);
        let value = self.new_value(ty, ValueKind::FuncAddr(id));
        self.functions.push(FunctionData {
            name: name.to_string(),
            ty,
            value,
            params,
            blocks: Vec::new(),
            locals: Vec::new(),
        });

        self.functions_by_name.insert(name.to_string(), id);
        self.function_order.push(id);
        Ok(id)
    }

    /// The address value standing for `id` in operand lists.
    pub fn function_value(&self, id: FunctionId) -> ValueId {
        self.function(id).value
    }

    pub fn get_function(&self, name: &str) -> Option<FunctionId> {
        self.functions_by_name.get(name).copied()
    }

    pub fn function(&self, id: FunctionId) -> &FunctionData {
        &self.functions[id.0 as usize]
    }

    pub fn functions(&self) -> &[FunctionId] {
        &self.function_order
    }

    /// Detach a function from the named table without destroying its
    /// blocks or locals.
    pub fn remove_function(&mut self, id: FunctionId) {
        let name = self.functions[id.0 as usize].name.clone();
        if self.functions_by_name.get(&name) == Some(&id) {
            self.functions_by_name.remove(&name);
            self.function_order.retain(|&f| f != id);
        }
    }

    /// The declared return type of a function.
    pub fn return_type(&self, id: FunctionId) -> TypeId {
        match self.types.get(self.function(id).ty) {
            crate::types::Type::Function { ret, .. } => *ret,
            _ => self.types.void(),
        }
    }

    // ---- locals ------------------------------------------------------

    /// Allocate a stack slot of `ty` in `function`. The returned value is
    /// typed as a pointer to `ty`.
    pub fn add_local(
        &mut self,
        function: FunctionId,
        ty: TypeId,
        name: &str,
        align: u32,
    ) -> ValueId {
        let ptr = self.types.pointer(ty);
        let id = self.new_value(
            ptr,
            ValueKind::Local { name: name.to_string(), align, parent: Some(function) },
        );
        self.functions[function.0 as usize].locals.push(id);
        id
    }

    /// Sever a local from its parent function. The slot is not freed.
    pub fn detach_local(&mut self, id: ValueId) {
        let parent = match &mut self.value_mut(id).kind {
            ValueKind::Local { parent, .. } => parent.take(),
            _ => None,
        };
        if let Some(function) = parent {
            self.functions[function.0 as usize].locals.retain(|&l| l != id);
        }
    }

    /// The type a local's stack slot holds.
    pub fn allocated_type(&self, id: ValueId) -> TypeId {
        self.types.pointee(self.value(id).ty).unwrap_or_else(|| self.types.void())
    }

    // ---- blocks and instructions ------------------------------------

    pub fn add_block(&mut self, function: FunctionId) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData { parent: Some(function), insts: Vec::new() });
        self.functions[function.0 as usize].blocks.push(id);
        id
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.0 as usize]
    }

    /// Append an instruction of `op` to `block`, wiring up one operand
    /// edge per entry in `operands`.
    pub fn push_inst(
        &mut self,
        block: BlockId,
        op: Op,
        ty: TypeId,
        operands: &[ValueId],
    ) -> ValueId {
        let id = self.new_value(ty, ValueKind::Inst { op, block: Some(block) });
        for &operand in operands {
            self.add_operand(id, operand);
        }
        self.blocks[block.0 as usize].insts.push(id);
        id
    }

    /// Intern an inline-assembly template, returning its index for
    /// `Op::Asm`.
    pub fn intern_asm(&mut self, text: &str) -> u32 {
        if let Some(index) = self.asm_texts.iter().position(|t| t == text) {
            return index as u32;
        }
        self.asm_texts.push(text.to_string());
        (self.asm_texts.len() - 1) as u32
    }

    pub fn asm_text(&self, index: u32) -> &str {
        &self.asm_texts[index as usize]
    }

    /// The last instruction of a block, if any.
    pub fn terminator(&self, block: BlockId) -> Option<ValueId> {
        let last = *self.block(block).insts.last()?;
        match self.value(last).kind {
            ValueKind::Inst { op, .. } if op.is_terminator() => Some(last),
            _ => None,
        }
    }

    /// Sever an instruction from its block. Its operand edges stay
    /// intact; the caller decides whether to destroy it.
    pub fn detach_inst(&mut self, inst: ValueId) {
        let block = match &mut self.value_mut(inst).kind {
            ValueKind::Inst { block, .. } => block.take(),
            _ => None,
        };
        if let Some(block) = block {
            self.blocks[block.0 as usize].insts.retain(|&i| i != inst);
        }
    }

    /// Detach an instruction and drop its operand edges, releasing the
    /// values it was holding onto.
    pub fn erase_inst(&mut self, inst: ValueId) {
        self.detach_inst(inst);
        let operands = self.value(inst).operands().to_vec();
        for edge in operands {
            self.drop_use(edge);
        }
    }

    // ---- printing ----------------------------------------------------

    /// Render the whole graph in a reproducible plaintext format.
    pub fn display(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; unit '{}'", self.filename);

        for &global in &self.global_order {
            let _ = self.write_global(&mut out, global);
        }

        for &function in &self.function_order {
            let _ = self.write_function(&mut out, function);
        }

        out
    }

    fn write_global(&self, out: &mut String, id: ValueId) -> std::fmt::Result {
        if let ValueKind::Global { name, align } = &self.value(id).kind {
            let pointee = self.types.pointee(self.value(id).ty).unwrap();
            write!(out, "@{} : {}", name, self.types.display(pointee))?;
            if self.value(id).num_operands() == 1 {
                let init = self.operand_value(id, 0);
                write!(out, " = {}", self.constant_repr(init))?;
            }
            if *align != 0 {
                write!(out, ", align {}", align)?;
            }
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_function(&self, out: &mut String, id: FunctionId) -> std::fmt::Result {
        let function = self.function(id);
        let mut names: HashMap<ValueId, u32> = HashMap::new();
        let mut next = 0u32;

        for &param in &function.params {
            names.insert(param, next);
            next += 1;
        }
        for &local in &function.locals {
            names.insert(local, next);
            next += 1;
        }
        for &block in &function.blocks {
            for &inst in &self.block(block).insts {
                if !self.types.is_void(self.value(inst).ty) {
                    names.insert(inst, next);
                    next += 1;
                }
            }
        }

        write!(out, "\n{} :: {}", function.name, self.types.display(function.ty))?;
        if function.blocks.is_empty() {
            return writeln!(out, ";");
        }
        writeln!(out, " {{")?;

        for &local in &function.locals {
            if let ValueKind::Local { name, align, .. } = &self.value(local).kind {
                writeln!(
                    out,
                    "    %{} = local {} ; {}, align {}",
                    names[&local],
                    self.types.display(self.allocated_type(local)),
                    name,
                    align
                )?;
            }
        }

        for (index, &block) in function.blocks.iter().enumerate() {
            writeln!(out, "  bb{}:", index)?;
            for &inst in &self.block(block).insts {
                self.write_inst(out, inst, id, &names)?;
            }
        }

        writeln!(out, "}}")
    }

    fn write_inst(
        &self,
        out: &mut String,
        inst: ValueId,
        function: FunctionId,
        names: &HashMap<ValueId, u32>,
    ) -> std::fmt::Result {
        let data = self.value(inst);
        let ValueKind::Inst { op, .. } = data.kind else { return Ok(()) };

        write!(out, "    ")?;
        if let Some(n) = names.get(&inst) {
            write!(out, "%{} = ", n)?;
        }

        let block_index = |target: BlockId| {
            self.function(function)
                .blocks
                .iter()
                .position(|&b| b == target)
                .unwrap_or(0)
        };

        match op {
            Op::Load => write!(out, "load {}", self.types.display(data.ty))?,
            Op::Store => write!(out, "store")?,
            Op::Binary(bin) => write!(out, "{}", bin.mnemonic())?,
            Op::Cmp(pred) => write!(out, "cmp {}", pred.mnemonic())?,
            Op::Cast(cast) => write!(out, "{}", cast.mnemonic())?,
            Op::Br(target) => write!(out, "br bb{}", block_index(target))?,
            Op::CondBr(then_, else_) => {
                write!(out, "condbr bb{}, bb{}", block_index(then_), block_index(else_))?
            }
            Op::Ret => write!(out, "ret")?,
            Op::Call => write!(out, "call")?,
            Op::FieldAddr(index) => write!(out, "fieldaddr {}", index)?,
            Op::IndexAddr => write!(out, "indexaddr")?,
            Op::Asm(index) => write!(out, "asm {:?}", self.asm_text(index))?,
        }

        for (i, &edge) in data.operands().iter().enumerate() {
            let value = self.use_edge(edge).value;
            write!(out, "{} ", if i == 0 { "" } else { "," })?;
            if let Some(n) = names.get(&value) {
                write!(out, "%{}", n)?;
            } else {
                write!(out, "{}", self.constant_repr(value))?;
            }
        }

        writeln!(out)
    }

    /// A short printable form for constants and other unnamed values.
    pub(crate) fn constant_repr(&self, id: ValueId) -> String {
        let data = self.value(id);
        match &data.kind {
            ValueKind::Integer(value) => format!("{}", value),
            ValueKind::Float(bits) => format!("{}", f64::from_bits(*bits)),
            ValueKind::Null => "null".to_string(),
            ValueKind::Str(bytes) => format!("{:?}", String::from_utf8_lossy(bytes)),
            ValueKind::BlockAddress(block) => format!("blockaddr bb#{}", block.0),
            ValueKind::Aggregate => {
                let parts: Vec<String> = data
                    .operands()
                    .iter()
                    .map(|&edge| self.constant_repr(self.use_edge(edge).value))
                    .collect();
                format!("{{ {} }}", parts.join(", "))
            }
            ValueKind::Global { name, .. } => format!("@{}", name),
            ValueKind::FuncAddr(function) => format!("@{}", self.function(*function).name),
            _ => format!("%v{}", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::BinOp;

    fn graph_with_add() -> (Cfg, ValueId, ValueId, ValueId) {
        let mut cfg = Cfg::new("test");
        let i64 = cfg.types.int(64);
        let fty = cfg.types.function(i64, vec![]);
        let function = cfg.add_function("f", fty, &[]).unwrap();
        let block = cfg.add_block(function);

        let two = cfg.int_const(i64, 2);
        let three = cfg.int_const(i64, 3);
        let add = cfg.push_inst(block, Op::Binary(BinOp::Add), i64, &[two, three]);
        (cfg, two, three, add)
    }

    #[test]
    fn test_operand_edges_are_bidirectional() {
        let (cfg, two, three, add) = graph_with_add();

        assert_eq!(cfg.value(add).num_operands(), 2);
        assert_eq!(cfg.operand_value(add, 0), two);
        assert_eq!(cfg.operand_value(add, 1), three);

        for &edge in cfg.value(add).operands() {
            let value = cfg.use_edge(edge).value;
            let count = cfg.value(value).uses().iter().filter(|&&u| u == edge).count();
            assert_eq!(count, 1, "edge registered exactly once on its value");
            assert_eq!(cfg.use_edge(edge).user, add);
        }
    }

    #[test]
    fn test_set_use_value_moves_registration() {
        let (mut cfg, two, three, add) = graph_with_add();
        let edge = cfg.value(add).operands()[0];

        // Retargeting at the same value is a no-op.
        let before = cfg.value(two).num_uses();
        cfg.set_use_value(edge, two);
        assert_eq!(cfg.value(two).num_uses(), before);

        cfg.set_use_value(edge, three);
        assert!(!cfg.value(two).uses().contains(&edge));
        assert_eq!(cfg.value(three).uses().iter().filter(|&&u| u == edge).count(), 1);
    }

    #[test]
    fn test_replace_all_uses_with() {
        let (mut cfg, two, three, add) = graph_with_add();
        let i64 = cfg.types.int(64);
        let seven = cfg.int_const(i64, 7);

        let total_before =
            cfg.value(two).num_uses() + cfg.value(three).num_uses() + cfg.value(seven).num_uses();

        cfg.replace_all_uses_with(two, seven);

        assert_eq!(cfg.value(two).num_uses(), 0);
        assert_eq!(cfg.operand_value(add, 0), seven);

        let total_after =
            cfg.value(two).num_uses() + cfg.value(three).num_uses() + cfg.value(seven).num_uses();
        assert_eq!(total_before, total_after, "use counts are conserved");
    }

    #[test]
    fn test_drop_use_clears_both_endpoints() {
        let (mut cfg, two, _three, add) = graph_with_add();
        let edge = cfg.value(add).operands()[0];

        cfg.drop_use(edge);
        assert!(!cfg.value(two).uses().contains(&edge));
        assert_eq!(cfg.value(add).num_operands(), 1);
    }

    #[test]
    fn test_symbol_names_are_unique_across_tables() {
        let mut cfg = Cfg::new("test");
        let i64 = cfg.types.int(64);
        let fty = cfg.types.function(i64, vec![]);

        cfg.add_function("shared", fty, &[]).unwrap();
        assert!(matches!(
            cfg.add_global("shared", i64, 8, None),
            Err(GraphError::NameConflict(_))
        ));
        assert!(matches!(
            cfg.add_function("shared", fty, &[]),
            Err(GraphError::NameConflict(_))
        ));

        cfg.add_global("g", i64, 8, None).unwrap();
        assert!(matches!(
            cfg.add_function("g", fty, &[]),
            Err(GraphError::NameConflict(_))
        ));
    }

    #[test]
    fn test_removed_symbols_free_their_names() {
        let mut cfg = Cfg::new("test");
        let i64 = cfg.types.int(64);
        let fty = cfg.types.function(i64, vec![]);

        let function = cfg.add_function("f", fty, &[]).unwrap();
        cfg.remove_function(function);
        assert_eq!(cfg.get_function("f"), None);
        assert!(cfg.add_global("f", i64, 8, None).is_ok(), "name is free again");

        let global = cfg.get_global("f").unwrap();
        cfg.remove_global(global);
        assert_eq!(cfg.get_global("f"), None);
        assert!(cfg.globals().is_empty());
    }

    #[test]
    fn test_detach_local_severs_the_parent_link() {
        let mut cfg = Cfg::new("test");
        let i64 = cfg.types.int(64);
        let void = cfg.types.void();
        let fty = cfg.types.function(void, vec![]);
        let function = cfg.add_function("f", fty, &[]).unwrap();

        let slot = cfg.add_local(function, i64, "x", 8);
        assert_eq!(cfg.allocated_type(slot), i64);
        assert_eq!(cfg.function(function).locals.len(), 1);

        cfg.detach_local(slot);
        assert!(cfg.function(function).locals.is_empty());
        let ValueKind::Local { parent, .. } = &cfg.value(slot).kind else { panic!("not a local") };
        assert!(parent.is_none());
    }

    #[test]
    fn test_return_type_reads_the_signature() {
        let mut cfg = Cfg::new("test");
        let i64 = cfg.types.int(64);
        let i8 = cfg.types.int(8);
        let fty = cfg.types.function(i64, vec![i8]);
        let function = cfg.add_function("f", fty, &["x".to_string()]).unwrap();

        assert_eq!(cfg.return_type(function), i64);
        assert_eq!(cfg.value_type(cfg.function(function).params[0]), i8);
    }

    #[test]
    fn test_detach_inst_keeps_operands() {
        let (mut cfg, two, _three, add) = graph_with_add();

        cfg.detach_inst(add);
        let ValueKind::Inst { block, .. } = cfg.value(add).kind else { panic!("not an inst") };
        assert!(block.is_none());
        assert_eq!(cfg.value(add).num_operands(), 2);
        assert_eq!(cfg.value(two).num_uses(), 1);

        cfg.erase_inst(add);
        assert_eq!(cfg.value(two).num_uses(), 0);
    }
}
