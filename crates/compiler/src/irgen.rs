//! IR generation
//!
//! Lowers a checked translation unit into a `quill_ir` graph. Variables
//! become stack slots addressed through load/store; `if` lowers to a
//! diamond of blocks, `while` to a header/body/exit loop with
//! `break`/`continue` branching to the exit and header. Every implicit
//! conversion was already materialized as a cast expression by semantic
//! analysis, so lowering picks a cast opcode mechanically from the two
//! type shapes.

use std::collections::HashMap;
use std::path::PathBuf;

use quill_ir::{BinOp, BlockId, CastOp, Cfg, FunctionId, Op, Pass, Predicate, TrivialDce, ValueId};

use crate::ast::{
    BinaryOp, Decl, DeclId, Expr, ExprKind, Stmt, StmtKind, TranslationUnit, UnaryOp,
};
use crate::error::CompileError;
use crate::types::{Builtin, TypeUse};

pub struct IrGen<'a> {
    unit: &'a TranslationUnit,
    cfg: Cfg,
    file: PathBuf,

    type_cache: HashMap<crate::types::TypeId, quill_ir::TypeId>,
    globals: HashMap<DeclId, ValueId>,
    functions: HashMap<DeclId, FunctionId>,
    strings: u32,

    // Per-function lowering state.
    slots: HashMap<DeclId, ValueId>,
    function: Option<FunctionId>,
    block: Option<BlockId>,
    /// Innermost-first stack of (loop header, loop exit).
    loops: Vec<(BlockId, BlockId)>,
}

impl<'a> IrGen<'a> {
    pub fn new(unit: &'a TranslationUnit) -> Self {
        let file = unit.file().to_path_buf();
        let cfg = Cfg::new(&file.display().to_string());
        IrGen {
            unit,
            cfg,
            file,
            type_cache: HashMap::new(),
            globals: HashMap::new(),
            functions: HashMap::new(),
            strings: 0,
            slots: HashMap::new(),
            function: None,
            block: None,
            loops: Vec::new(),
        }
    }

    /// Lower the whole unit and run trivial DCE over the result.
    pub fn run(mut self) -> Result<Cfg, CompileError> {
        // Declare all symbols first so forward references lower cleanly.
        for &decl in self.unit.top_decls() {
            self.declare(decl)?;
        }

        for &decl in self.unit.top_decls() {
            if let Decl::Function { .. } = self.unit.decl(decl) {
                self.lower_function(decl)?;
            }
        }

        TrivialDce::new(&mut self.cfg).run();
        Ok(self.cfg)
    }

    fn type_error(&self, msg: &str, span: crate::source::SourceSpan) -> CompileError {
        CompileError::Type(format!("{}:{}: {}", self.file.display(), span.start, msg))
    }

    // ---- types -------------------------------------------------------

    /// Lower a frontend type to its IR shape. Enums lower to their
    /// underlying integer; names lower structurally.
    fn lower_type(&mut self, ty: crate::types::TypeId) -> quill_ir::TypeId {
        let ty = self.unit.types.canonical(ty);
        if let Some(&cached) = self.type_cache.get(&ty) {
            return cached;
        }

        let lowered = match self.unit.types.get(ty).clone() {
            crate::types::Type::Builtin(builtin) => match builtin {
                Builtin::Void => self.cfg.types.void(),
                Builtin::Bool => self.cfg.types.int(1),
                Builtin::Char => self.cfg.types.int(8),
                b if b.is_integer() => self.cfg.types.int(b.width()),
                b => self.cfg.types.float(b.width()),
            },
            crate::types::Type::Pointer(pointee) => {
                let pointee = self.lower_type(pointee.ty);
                self.cfg.types.pointer(pointee)
            }
            crate::types::Type::Array { element, size } => {
                let element = self.lower_type(element.ty);
                self.cfg.types.array(element, size)
            }
            crate::types::Type::Function { ret, params } => {
                let ret = self.lower_type(ret.ty);
                let params: Vec<quill_ir::TypeId> =
                    params.iter().map(|p| self.lower_type(p.ty)).collect();
                self.cfg.types.function(ret, params)
            }
            crate::types::Type::Struct { name, decl } => {
                let field_ids = match self.unit.decl(decl) {
                    Decl::Struct { fields, .. } => fields.clone(),
                    _ => Vec::new(),
                };
                let fields: Vec<quill_ir::TypeId> = field_ids
                    .iter()
                    .map(|&f| match self.unit.decl(f) {
                        Decl::Field { ty, .. } => self.lower_type(ty.ty),
                        _ => self.cfg.types.void(),
                    })
                    .collect();
                self.cfg.types.structure(&name, fields)
            }
            crate::types::Type::Enum { underlying, .. } => self.lower_type(underlying.ty),
            crate::types::Type::Alias { underlying, .. } => self.lower_type(underlying.ty),
            crate::types::Type::Deferred(_) => self.cfg.types.void(),
        };

        self.type_cache.insert(ty, lowered);
        lowered
    }

    /// Byte size of a lowered type, for `sizeof` folding.
    fn size_of(&self, ty: quill_ir::TypeId) -> u64 {
        match self.cfg.types.get(ty) {
            quill_ir::Type::Void => 0,
            quill_ir::Type::Int(w) | quill_ir::Type::Float(w) => u64::from(*w).div_ceil(8),
            quill_ir::Type::Pointer(_) | quill_ir::Type::Function { .. } => 8,
            quill_ir::Type::Array { element, size } => {
                self.size_of(*element) * u64::from(*size)
            }
            quill_ir::Type::Struct { fields, .. } => {
                fields.iter().map(|&f| self.size_of(f)).sum()
            }
        }
    }

    fn align_of(&self, ty: quill_ir::TypeId) -> u32 {
        match self.cfg.types.get(ty) {
            quill_ir::Type::Int(w) | quill_ir::Type::Float(w) => (*w).div_ceil(8).max(1),
            quill_ir::Type::Array { element, .. } => self.align_of(*element),
            quill_ir::Type::Struct { fields, .. } => {
                fields.iter().map(|&f| self.align_of(f)).max().unwrap_or(1)
            }
            _ => 8,
        }
    }

    // ---- declarations ------------------------------------------------

    fn declare(&mut self, id: DeclId) -> Result<(), CompileError> {
        match self.unit.decl(id) {
            Decl::Variable { name, ty, init, global: true, span, .. } => {
                let name = name.clone();
                let span = *span;
                let ty = *ty;
                let init = match init {
                    Some(expr) => Some(self.fold_constant(expr).ok_or_else(|| {
                        self.type_error("global initializer must be constant", span)
                    })?),
                    None => None,
                };

                let lowered = self.lower_type(ty.ty);
                let align = self.align_of(lowered);
                let global = self.cfg.add_global(&name, lowered, align, init)?;
                self.globals.insert(id, global);
                Ok(())
            }
            Decl::Function { name, ty, params, .. } => {
                let name = name.clone();
                let ty = *ty;
                let param_names: Vec<String> = params
                    .iter()
                    .filter_map(|&p| self.unit.decl(p).name().map(str::to_string))
                    .collect();

                let lowered = self.lower_type(ty.ty);
                let function = self.cfg.add_function(&name, lowered, &param_names)?;
                self.functions.insert(id, function);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Fold a constant initializer expression into a pooled constant.
    fn fold_constant(&mut self, expr: &Expr) -> Option<ValueId> {
        let ty = self.lower_type(expr.ty.ty);
        match &expr.kind {
            ExprKind::Integer(value) => Some(self.cfg.int_const(ty, *value)),
            ExprKind::Bool(value) => {
                Some(if *value { self.cfg.true_const() } else { self.cfg.false_const() })
            }
            ExprKind::Char(byte) => Some(self.cfg.int_const(ty, i64::from(*byte))),
            ExprKind::Float(value) => Some(self.cfg.float_const(ty, *value)),
            ExprKind::Null => Some(self.cfg.null_const(ty)),
            ExprKind::Str(bytes) => {
                let bytes = bytes.clone();
                Some(self.cfg.string_const(&bytes))
            }
            ExprKind::Paren(inner) => self.fold_constant(inner),
            // Literal-adoption casts fold by re-typing the literal.
            ExprKind::Cast { expr: inner, .. } => {
                let inner_value = self.fold_constant(inner)?;
                match self.cfg.value(inner_value).kind.clone() {
                    quill_ir::ValueKind::Integer(value) => Some(self.cfg.int_const(ty, value)),
                    quill_ir::ValueKind::Float(bits) => {
                        Some(self.cfg.float_const(ty, f64::from_bits(bits)))
                    }
                    quill_ir::ValueKind::Null => Some(self.cfg.null_const(ty)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    // ---- functions ---------------------------------------------------

    fn lower_function(&mut self, id: DeclId) -> Result<(), CompileError> {
        let Decl::Function { params, body, .. } = self.unit.decl(id) else { return Ok(()) };
        let Some(body) = body else { return Ok(()) };
        let function = self.functions[&id];

        self.slots.clear();
        self.loops.clear();
        self.function = Some(function);

        let entry = self.cfg.add_block(function);
        self.block = Some(entry);

        // Parameters spill into stack slots so they are addressable like
        // any other variable.
        for (index, &param) in params.iter().enumerate() {
            let Decl::Parameter { name, ty, .. } = self.unit.decl(param) else { continue };
            let name = name.clone();
            let lowered = self.lower_type(ty.ty);
            let align = self.align_of(lowered);
            let slot = self.cfg.add_local(function, lowered, &name, align);
            let value = self.cfg.function(function).params[index];
            self.push(Op::Store, self.cfg.types.void(), &[value, slot]);
            self.slots.insert(param, slot);
        }

        self.lower_stmt(body)?;

        // Fall off the end of a void function.
        if self.cfg.terminator(self.block.unwrap()).is_none() {
            let void = self.cfg.types.void();
            self.push(Op::Ret, void, &[]);
        }

        self.function = None;
        Ok(())
    }

    fn push(&mut self, op: Op, ty: quill_ir::TypeId, operands: &[ValueId]) -> ValueId {
        let block = self.block.expect("no current block");
        self.cfg.push_inst(block, op, ty, operands)
    }

    fn new_block(&mut self) -> BlockId {
        let function = self.function.expect("no current function");
        self.cfg.add_block(function)
    }

    /// Branch to `target` unless the current block already terminated.
    fn branch(&mut self, target: BlockId) {
        if self.cfg.terminator(self.block.unwrap()).is_none() {
            let void = self.cfg.types.void();
            self.push(Op::Br(target), void, &[]);
        }
    }

    // ---- statements --------------------------------------------------

    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        match &stmt.kind {
            StmtKind::Block { stmts, .. } => {
                for stmt in stmts {
                    self.lower_stmt(stmt)?;
                }
                Ok(())
            }
            StmtKind::Decl(decl) => {
                let Decl::Variable { name, ty, init, .. } = self.unit.decl(*decl) else {
                    return Ok(());
                };
                let name = name.clone();
                let lowered = self.lower_type(ty.ty);
                let align = self.align_of(lowered);
                let function = self.function.expect("local outside a function");
                let slot = self.cfg.add_local(function, lowered, &name, align);
                self.slots.insert(*decl, slot);

                if let Some(init) = init {
                    let value = self.lower_expr(init)?;
                    let void = self.cfg.types.void();
                    self.push(Op::Store, void, &[value, slot]);
                }
                Ok(())
            }
            StmtKind::Ret(expr) => {
                let void = self.cfg.types.void();
                match expr {
                    Some(expr) => {
                        let value = self.lower_expr(expr)?;
                        self.push(Op::Ret, void, &[value]);
                    }
                    None => {
                        self.push(Op::Ret, void, &[]);
                    }
                }
                // Anything after a return in this block is unreachable;
                // give it a fresh block and let DCE drop what it can.
                self.block = Some(self.new_block());
                Ok(())
            }
            StmtKind::If { cond, then, els } => {
                let cond = self.lower_condition(cond)?;
                let then_block = self.new_block();
                let merge = self.new_block();
                let else_block = if els.is_some() { self.new_block() } else { merge };

                let void = self.cfg.types.void();
                self.push(Op::CondBr(then_block, else_block), void, &[cond]);

                self.block = Some(then_block);
                self.lower_stmt(then)?;
                self.branch(merge);

                if let Some(els) = els {
                    self.block = Some(else_block);
                    self.lower_stmt(els)?;
                    self.branch(merge);
                }

                self.block = Some(merge);
                Ok(())
            }
            StmtKind::While { cond, body } => {
                let header = self.new_block();
                let body_block = self.new_block();
                let exit = self.new_block();

                self.branch(header);
                self.block = Some(header);
                let cond = self.lower_condition(cond)?;
                let void = self.cfg.types.void();
                self.push(Op::CondBr(body_block, exit), void, &[cond]);

                self.block = Some(body_block);
                self.loops.push((header, exit));
                if let Some(body) = body {
                    self.lower_stmt(body)?;
                }
                self.loops.pop();
                self.branch(header);

                self.block = Some(exit);
                Ok(())
            }
            StmtKind::Break => {
                let Some(&(_, exit)) = self.loops.last() else {
                    return Err(self.type_error("'break' outside of a loop", stmt.span));
                };
                self.branch(exit);
                self.block = Some(self.new_block());
                Ok(())
            }
            StmtKind::Continue => {
                let Some(&(header, _)) = self.loops.last() else {
                    return Err(self.type_error("'continue' outside of a loop", stmt.span));
                };
                self.branch(header);
                self.block = Some(self.new_block());
                Ok(())
            }
            StmtKind::Asm { template, args } => {
                let mut operands = Vec::with_capacity(args.len());
                for arg in args {
                    operands.push(self.lower_expr(arg)?);
                }
                let index = self.cfg.intern_asm(template);
                let void = self.cfg.types.void();
                self.push(Op::Asm(index), void, &operands);
                Ok(())
            }
            StmtKind::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
        }
    }

    /// Lower a condition already checked to be boolean-valued to `i1`.
    fn lower_condition(&mut self, cond: &Expr) -> Result<ValueId, CompileError> {
        self.lower_expr(cond)
    }

    // ---- expressions -------------------------------------------------

    fn lower_expr(&mut self, expr: &Expr) -> Result<ValueId, CompileError> {
        let ty = self.lower_type(expr.ty.ty);
        match &expr.kind {
            ExprKind::Integer(value) => Ok(self.cfg.int_const(ty, *value)),
            ExprKind::Bool(value) => {
                Ok(if *value { self.cfg.true_const() } else { self.cfg.false_const() })
            }
            ExprKind::Char(byte) => Ok(self.cfg.int_const(ty, i64::from(*byte))),
            ExprKind::Float(value) => Ok(self.cfg.float_const(ty, *value)),
            ExprKind::Null => Ok(self.cfg.null_const(ty)),
            ExprKind::Str(bytes) => {
                // Strings live in anonymous globals; the expression
                // value is the global's address.
                let bytes = bytes.clone();
                let constant = self.cfg.string_const(&bytes);
                let constant_ty = self.cfg.value_type(constant);
                let name = format!(".str.{}", self.strings);
                self.strings += 1;
                let global = self.cfg.add_global(&name, constant_ty, 1, Some(constant))?;
                Ok(global)
            }
            ExprKind::Sizeof(target) => {
                let target = self.lower_type(target.ty);
                let size = self.size_of(target);
                Ok(self.cfg.int_const(ty, size as i64))
            }
            ExprKind::Paren(inner) => self.lower_expr(inner),
            ExprKind::DeclRef { decl, .. } => {
                let decl = decl.expect("unbound reference survived symbol analysis");
                match self.unit.decl(decl) {
                    Decl::Function { .. } => {
                        let function = self.functions[&decl];
                        Ok(self.cfg.function_value(function))
                    }
                    Decl::Variant { value, .. } => Ok(self.cfg.int_const(ty, *value)),
                    _ => {
                        let slot = self.address_of_decl(decl, expr.span)?;
                        Ok(self.push(Op::Load, ty, &[slot]))
                    }
                }
            }
            ExprKind::Access { .. } | ExprKind::Subscript { .. } => {
                let address = self.lower_address(expr)?;
                Ok(self.push(Op::Load, ty, &[address]))
            }
            ExprKind::Unary { op, prefix, expr: operand } => {
                self.lower_unary(*op, *prefix, operand, ty)
            }
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, ty),
            ExprKind::Cast { expr: inner, target } => {
                let value = self.lower_expr(inner)?;
                self.lower_cast(value, inner.ty, *target, ty)
            }
            ExprKind::Call { callee, args } => {
                let callee_value = self.lower_expr(callee)?;
                let mut operands = vec![callee_value];
                for arg in args {
                    operands.push(self.lower_expr(arg)?);
                }
                Ok(self.push(Op::Call, ty, &operands))
            }
        }
    }

    fn address_of_decl(
        &mut self,
        decl: DeclId,
        span: crate::source::SourceSpan,
    ) -> Result<ValueId, CompileError> {
        if let Some(&slot) = self.slots.get(&decl) {
            return Ok(slot);
        }
        if let Some(&global) = self.globals.get(&decl) {
            return Ok(global);
        }
        Err(self.type_error("reference has no storage", span))
    }

    /// Lower an l-value to the address it names.
    fn lower_address(&mut self, expr: &Expr) -> Result<ValueId, CompileError> {
        match &expr.kind {
            ExprKind::DeclRef { decl, .. } => {
                let decl = decl.expect("unbound reference survived symbol analysis");
                self.address_of_decl(decl, expr.span)
            }
            ExprKind::Paren(inner) => self.lower_address(inner),
            ExprKind::Unary { op: UnaryOp::Deref, expr: operand, .. } => self.lower_expr(operand),
            ExprKind::Access { base, field, .. } => {
                let (_, index) = field.expect("unbound field survived symbol analysis");

                // A pointer base is already an address; a value base is
                // taken by address.
                let base_addr = if self.unit.types.is_pointer(base.ty.ty) {
                    self.lower_expr(base)?
                } else {
                    self.lower_address(base)?
                };

                let field_ty = self.lower_type(expr.ty.ty);
                let ptr = self.cfg.types.pointer(field_ty);
                Ok(self.push(Op::FieldAddr(index), ptr, &[base_addr]))
            }
            ExprKind::Subscript { base, index } => {
                let base_addr = if self.unit.types.is_pointer(base.ty.ty) {
                    self.lower_expr(base)?
                } else {
                    self.lower_address(base)?
                };
                let index = self.lower_expr(index)?;

                let element_ty = self.lower_type(expr.ty.ty);
                let ptr = self.cfg.types.pointer(element_ty);
                Ok(self.push(Op::IndexAddr, ptr, &[base_addr, index]))
            }
            _ => Err(self.type_error("expression is not addressable", expr.span)),
        }
    }

    fn lower_unary(
        &mut self,
        op: UnaryOp,
        prefix: bool,
        operand: &Expr,
        ty: quill_ir::TypeId,
    ) -> Result<ValueId, CompileError> {
        match op {
            UnaryOp::Not => {
                let value = self.lower_expr(operand)?;
                let one = self.cfg.true_const();
                Ok(self.push(Op::Binary(BinOp::Xor), ty, &[value, one]))
            }
            UnaryOp::BitNot => {
                let value = self.lower_expr(operand)?;
                let ones = self.cfg.int_const(ty, -1);
                Ok(self.push(Op::Binary(BinOp::Xor), ty, &[value, ones]))
            }
            UnaryOp::Neg => {
                let value = self.lower_expr(operand)?;
                let zero = if self.cfg.types.is_float(ty) {
                    self.cfg.float_const(ty, 0.0)
                } else {
                    self.cfg.int_const(ty, 0)
                };
                Ok(self.push(Op::Binary(BinOp::Sub), ty, &[zero, value]))
            }
            UnaryOp::AddrOf => self.lower_address(operand),
            UnaryOp::Deref => {
                let address = self.lower_expr(operand)?;
                Ok(self.push(Op::Load, ty, &[address]))
            }
            UnaryOp::Inc | UnaryOp::Dec => {
                let address = self.lower_address(operand)?;
                let old = self.push(Op::Load, ty, &[address]);

                let step = if self.cfg.types.is_float(ty) {
                    self.cfg.float_const(ty, 1.0)
                } else {
                    self.cfg.int_const(ty, 1)
                };
                let bin = if op == UnaryOp::Inc { BinOp::Add } else { BinOp::Sub };
                let new = self.push(Op::Binary(bin), ty, &[old, step]);

                let void = self.cfg.types.void();
                self.push(Op::Store, void, &[new, address]);

                Ok(if prefix { new } else { old })
            }
        }
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        ty: quill_ir::TypeId,
    ) -> Result<ValueId, CompileError> {
        if op.is_assignment() {
            let address = self.lower_address(lhs)?;
            let value = self.lower_expr(rhs)?;

            let stored = if let Some(bin) = compound_bin_op(op) {
                let current = self.push(Op::Load, ty, &[address]);
                self.push(Op::Binary(bin), ty, &[current, value])
            } else {
                value
            };

            let void = self.cfg.types.void();
            self.push(Op::Store, void, &[stored, address]);
            return Ok(stored);
        }

        let lhs_value = self.lower_expr(lhs)?;
        let rhs_value = self.lower_expr(rhs)?;

        if op.is_comparison() {
            let pred = match op {
                BinaryOp::Eq => Predicate::Eq,
                BinaryOp::Ne => Predicate::Ne,
                BinaryOp::Lt => Predicate::Lt,
                BinaryOp::Le => Predicate::Le,
                BinaryOp::Gt => Predicate::Gt,
                _ => Predicate::Ge,
            };
            return Ok(self.push(Op::Cmp(pred), ty, &[lhs_value, rhs_value]));
        }

        let bin = match op {
            BinaryOp::LogicAnd | BinaryOp::And => BinOp::And,
            BinaryOp::LogicOr | BinaryOp::Or => BinOp::Or,
            BinaryOp::Xor => BinOp::Xor,
            BinaryOp::Add => BinOp::Add,
            BinaryOp::Sub => BinOp::Sub,
            BinaryOp::Mul => BinOp::Mul,
            BinaryOp::Div => BinOp::Div,
            BinaryOp::Rem => BinOp::Rem,
            BinaryOp::Shl => BinOp::Shl,
            BinaryOp::Shr => BinOp::Shr,
            _ => BinOp::Add,
        };
        Ok(self.push(Op::Binary(bin), ty, &[lhs_value, rhs_value]))
    }

    /// Pick a cast opcode from the source and target type shapes. The
    /// checker already rejected casts outside the permitted matrix.
    fn lower_cast(
        &mut self,
        value: ValueId,
        from: TypeUse,
        to: TypeUse,
        ty: quill_ir::TypeId,
    ) -> Result<ValueId, CompileError> {
        let types = &self.unit.types;
        let from_builtin = types.as_builtin(from.ty);
        let to_builtin = types.as_builtin(to.ty);
        let from_ptr = types.is_pointer(from.ty);
        let to_ptr = types.is_pointer(to.ty);

        // A pointer used as a condition tests against null.
        if from_ptr && to_builtin == Some(Builtin::Bool) {
            let from_lowered = self.lower_type(from.ty);
            let null = self.cfg.null_const(from_lowered);
            let i1 = self.cfg.types.int(1);
            return Ok(self.push(Op::Cmp(Predicate::Ne), i1, &[value, null]));
        }

        let op = match (from_builtin, to_builtin) {
            (Some(a), Some(b)) if a.is_float() && b.is_float() => {
                if a.width() < b.width() { CastOp::FpExt } else { CastOp::FpTrunc }
            }
            (Some(a), Some(b)) if a.is_float() && b.is_integer() => CastOp::FpToSi,
            (Some(a), Some(b)) if a.is_integer() && b.is_float() => CastOp::SiToFp,
            (Some(a), Some(b)) => {
                // Integer-to-integer, bool included. Widening extends by
                // the source's signedness; bool converts by comparing
                // against zero on the way in.
                if b == Builtin::Bool {
                    let from_lowered = self.lower_type(from.ty);
                    let zero = self.cfg.int_const(from_lowered, 0);
                    let i1 = self.cfg.types.int(1);
                    return Ok(self.push(Op::Cmp(Predicate::Ne), i1, &[value, zero]));
                }
                if a.width() == b.width() {
                    return Ok(value);
                }
                if a.width() < b.width() {
                    if a.is_signed() { CastOp::Sext } else { CastOp::Zext }
                } else {
                    CastOp::Trunc
                }
            }
            _ if from_ptr && to_ptr => CastOp::Bit,
            _ if from_ptr && to_builtin.is_some() => CastOp::PtrToInt,
            _ if to_ptr && from_builtin.is_some() => CastOp::IntToPtr,
            _ if to_ptr => CastOp::Bit,
            _ => CastOp::Bit,
        };

        Ok(self.push(Op::Cast(op), ty, &[value]))
    }
}

fn compound_bin_op(op: BinaryOp) -> Option<BinOp> {
    Some(match op {
        BinaryOp::AddAssign => BinOp::Add,
        BinaryOp::SubAssign => BinOp::Sub,
        BinaryOp::MulAssign => BinOp::Mul,
        BinaryOp::DivAssign => BinOp::Div,
        BinaryOp::RemAssign => BinOp::Rem,
        BinaryOp::AndAssign => BinOp::And,
        BinaryOp::OrAssign => BinOp::Or,
        BinaryOp::XorAssign => BinOp::Xor,
        BinaryOp::ShlAssign => BinOp::Shl,
        BinaryOp::ShrAssign => BinOp::Shr,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::parser::Parser;
    use crate::sema::SemanticAnalysis;
    use crate::symbols::SymbolAnalysis;
    use quill_ir::ValueKind;
    use std::path::Path;

    fn lowered(source: &str) -> Cfg {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut unit = Parser::new(&mut diags, Path::new("test"), source)
            .parse()
            .expect("parse failed");
        SymbolAnalysis::new(&mut diags, &mut unit).run().expect("symbol analysis failed");
        SemanticAnalysis::new(&mut diags, &mut unit).run().expect("semantic analysis failed");
        assert!(!diags.has_errors(), "unexpected diagnostics");
        IrGen::new(&unit).run().expect("lowering failed")
    }

    fn terminator_of(cfg: &Cfg, function: &str, block: usize) -> (Op, Vec<ValueId>) {
        let function = cfg.get_function(function).unwrap();
        let block = cfg.function(function).blocks[block];
        let inst = cfg.terminator(block).expect("block has no terminator");
        let operands = cfg
            .value(inst)
            .operands()
            .iter()
            .map(|&edge| cfg.use_edge(edge).value())
            .collect();
        let ValueKind::Inst { op, .. } = cfg.value(inst).kind else { unreachable!() };
        (op, operands)
    }

    #[test]
    fn test_ret_constant() {
        let cfg = lowered("test :: () -> s64 { ret 0; }");
        let (op, operands) = terminator_of(&cfg, "test", 0);
        assert_eq!(op, Op::Ret);
        assert_eq!(operands.len(), 1);
        assert!(matches!(cfg.value(operands[0]).kind, ValueKind::Integer(0)));
    }

    #[test]
    fn test_forward_declaration_has_no_blocks() {
        let cfg = lowered("test :: () -> void;");
        let function = cfg.get_function("test").unwrap();
        assert!(cfg.function(function).blocks.is_empty());
    }

    #[test]
    fn test_params_spill_to_slots() {
        let cfg = lowered("add :: (a: s64, b: s64) -> s64 { ret a + b; }");
        let function = cfg.get_function("add").unwrap();
        assert_eq!(cfg.function(function).locals.len(), 2);
        assert_eq!(cfg.function(function).params.len(), 2);
    }

    #[test]
    fn test_void_function_gets_implicit_ret() {
        let cfg = lowered("noop :: () -> void {}");
        let (op, operands) = terminator_of(&cfg, "noop", 0);
        assert_eq!(op, Op::Ret);
        assert!(operands.is_empty());
    }

    #[test]
    fn test_if_lowering_is_a_diamond() {
        let cfg = lowered("f :: (x: s64) -> s64 { if x > 0 { ret 1; } ret 0; }");
        let function = cfg.get_function("f").unwrap();
        let blocks = &cfg.function(function).blocks;
        assert!(blocks.len() >= 3, "entry, then, and merge blocks");

        let (op, _) = terminator_of(&cfg, "f", 0);
        assert!(matches!(op, Op::CondBr(_, _)));
    }

    #[test]
    fn test_while_lowering_branches_back_to_header() {
        let cfg =
            lowered("f :: () -> s64 { let i: mut s64 = 0; while i < 10 { i = i + 1; } ret i; }");
        let function = cfg.get_function("f").unwrap();
        let blocks = cfg.function(function).blocks.clone();
        assert!(blocks.len() >= 4, "entry, header, body, exit");

        // The entry falls into the header; the header branches into the
        // body or past the loop.
        let (op, _) = terminator_of(&cfg, "f", 0);
        assert!(matches!(op, Op::Br(_)));
        let (op, _) = terminator_of(&cfg, "f", 1);
        assert!(matches!(op, Op::CondBr(_, _)));

        // The body jumps back to the header.
        let (op, _) = terminator_of(&cfg, "f", 2);
        assert_eq!(op, Op::Br(blocks[1]));
    }

    #[test]
    fn test_break_branches_to_loop_exit() {
        let cfg = lowered("f :: () -> void { while true { break; } }");
        let function = cfg.get_function("f").unwrap();
        let blocks = cfg.function(function).blocks.clone();

        // Body block 2 breaks straight to the exit block 3.
        let (op, _) = terminator_of(&cfg, "f", 2);
        assert_eq!(op, Op::Br(blocks[3]));
    }

    #[test]
    fn test_call_lowering_uses_function_value() {
        let cfg =
            lowered("f :: () -> s64 { ret g(7); } g :: (x: s64) -> s64 { ret x; }");
        let (op, operands) = terminator_of(&cfg, "f", 0);
        assert_eq!(op, Op::Ret);

        let call = operands[0];
        let ValueKind::Inst { op: Op::Call, .. } = cfg.value(call).kind else {
            panic!("Expected a call feeding the return");
        };
        let callee = cfg.operand_value(call, 0);
        assert!(matches!(cfg.value(callee).kind, ValueKind::FuncAddr(_)));
    }

    #[test]
    fn test_globals_with_constant_initializers() {
        let cfg = lowered("counter :: s64 = 40 flag :: bool = true");
        let counter = cfg.get_global("counter").unwrap();
        let init = cfg.operand_value(counter, 0);
        assert!(matches!(cfg.value(init).kind, ValueKind::Integer(40)));

        let flag = cfg.get_global("flag").unwrap();
        let init = cfg.operand_value(flag, 0);
        assert_eq!(init, cfg.true_const());
    }

    #[test]
    fn test_global_adopted_literal_folds() {
        // The u8 literal arrives wrapped in an implicit cast.
        let cfg = lowered("small :: u8 = 250");
        let global = cfg.get_global("small").unwrap();
        let init = cfg.operand_value(global, 0);
        assert!(matches!(cfg.value(init).kind, ValueKind::Integer(250)));
        assert_eq!(cfg.types.width(cfg.value_type(init)), 8);
    }

    #[test]
    fn test_string_becomes_anonymous_global() {
        let cfg = lowered("f :: () -> *char { ret \"hi\"; }");
        assert!(cfg.get_global(".str.0").is_some());
    }

    #[test]
    fn test_field_access_lowers_to_field_addr() {
        let cfg = lowered(
            "P :: struct { x: s64, y: s64 } f :: (p: *P) -> s64 { ret p.y; }",
        );
        let (_, operands) = terminator_of(&cfg, "f", 0);
        let load = operands[0];
        let address = cfg.operand_value(load, 0);
        let ValueKind::Inst { op: Op::FieldAddr(1), .. } = cfg.value(address).kind else {
            panic!("Expected FieldAddr(1)");
        };
    }

    #[test]
    fn test_dce_removes_unused_pure_results() {
        let cfg = lowered("f :: (x: s64) -> s64 { x + 1; ret x; }");
        let function = cfg.get_function("f").unwrap();
        let block = cfg.function(function).blocks[0];

        let adds = cfg
            .block(block)
            .insts
            .iter()
            .filter(|&&inst| {
                matches!(cfg.value(inst).kind, ValueKind::Inst { op: Op::Binary(BinOp::Add), .. })
            })
            .count();
        assert_eq!(adds, 0, "the unused addition is gone");
    }

    #[test]
    fn test_asm_lowers_to_an_impure_instruction() {
        let cfg = lowered("spin :: (x: s64) -> void { asm(\"pause\", x); }");
        assert_eq!(cfg.asm_text(0), "pause");

        let function = cfg.get_function("spin").unwrap();
        let block = cfg.function(function).blocks[0];
        let asm = cfg
            .block(block)
            .insts
            .iter()
            .find(|&&inst| matches!(cfg.value(inst).kind, ValueKind::Inst { op: Op::Asm(_), .. }));
        let asm = *asm.expect("asm instruction survived dce");
        assert_eq!(cfg.value(asm).num_operands(), 1);
    }

    #[test]
    fn test_sizeof_folds_to_a_constant() {
        let cfg = lowered("f :: () -> u64 { ret sizeof<s32>; }");
        let (_, operands) = terminator_of(&cfg, "f", 0);
        assert!(matches!(cfg.value(operands[0]).kind, ValueKind::Integer(4)));
    }
}
