//! Semantic analysis
//!
//! Type checking over a name-resolved unit. Comparisons run under one of
//! three policies: `Explicit` (identity), `Loose` (identity up to
//! qualifiers), and `AllowImplicit` (plus same-signedness numeric
//! widening, literal adoption, null-to-pointer, and array decay).
//! Implicit conversions materialize as cast expressions in the tree, so
//! IR generation never re-derives them.
//!
//! Most violations are recoverable: they are diagnosed, the errors-seen
//! flag is set, and checking continues with the sibling construct.

use std::path::PathBuf;

use crate::ast::{
    BinaryOp, Decl, DeclId, Expr, ExprKind, Stmt, StmtKind, TranslationUnit, UnaryOp,
};
use crate::diagnostics::Diagnostics;
use crate::error::CompileError;
use crate::types::{Builtin, TypeUse};

/// Possible modes for a type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheckMode {
    Explicit,
    Loose,
    AllowImplicit,
}

/// Possible results of a type check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCheckResult {
    Match,
    Cast,
    Mismatch,
}

pub struct SemanticAnalysis<'a> {
    diags: &'a mut Diagnostics,
    unit: &'a mut TranslationUnit,
    file: PathBuf,
    /// The declared return type of the enclosing function.
    ret: Option<TypeUse>,
    loop_depth: u32,
}

impl<'a> SemanticAnalysis<'a> {
    pub fn new(diags: &'a mut Diagnostics, unit: &'a mut TranslationUnit) -> Self {
        let file = unit.file().to_path_buf();
        SemanticAnalysis { diags, unit, file, ret: None, loop_depth: 0 }
    }

    pub fn run(mut self) -> Result<(), CompileError> {
        for decl in self.unit.top_decls().to_vec() {
            self.visit_decl(decl)?;
        }
        Ok(())
    }

    // ---- type checking -----------------------------------------------

    /// Compare `actual` against `expected` under `mode`.
    pub fn type_check(
        &self,
        actual: TypeUse,
        expected: TypeUse,
        mode: TypeCheckMode,
    ) -> TypeCheckResult {
        let types = &self.unit.types;

        if mode == TypeCheckMode::Explicit {
            return if actual == expected { TypeCheckResult::Match } else { TypeCheckResult::Mismatch };
        }

        let actual_ty = types.canonical(actual.ty);
        let expected_ty = types.canonical(expected.ty);
        if actual_ty == expected_ty {
            return TypeCheckResult::Match;
        }

        if mode == TypeCheckMode::Loose {
            return TypeCheckResult::Mismatch;
        }

        // Same-signedness widening, integers and floats alike.
        if let (Some(a), Some(e)) = (types.as_builtin(actual_ty), types.as_builtin(expected_ty)) {
            let same_family = (a.is_signed() && e.is_signed())
                || (a.is_unsigned() && e.is_unsigned())
                || (a.is_float() && e.is_float());
            if same_family && a.width() <= e.width() {
                return TypeCheckResult::Cast;
            }
        }

        // Array-of-T decays to pointer-to-T.
        if let (Some(element), Some(pointee)) = (self.element_of(actual_ty), types.pointee(expected_ty))
        {
            if types.canonical(element.ty) == types.canonical(pointee.ty) {
                return TypeCheckResult::Cast;
            }
        }

        TypeCheckResult::Mismatch
    }

    fn element_of(&self, ty: crate::types::TypeId) -> Option<TypeUse> {
        match self.unit.types.get(self.unit.types.canonical(ty)) {
            crate::types::Type::Array { element, .. } => Some(*element),
            _ => None,
        }
    }

    /// Check `expr` against `expected`, inserting an implicit cast or
    /// diagnosing a mismatch. Literal-specific conversions live here so
    /// `type_check` stays purely structural.
    fn check_assignable(&mut self, expr: &mut Expr, expected: TypeUse, mode: TypeCheckMode) {
        let types = &self.unit.types;

        // An integer literal adopts any numeric expected type.
        if matches!(expr.kind, ExprKind::Integer(_)) && types.is_numeric(expected.ty) {
            if types.canonical(expr.ty.ty) != types.canonical(expected.ty) {
                expr.wrap_in_cast(expected.stripped());
            }
            return;
        }

        // Null adopts any pointer expected type.
        if matches!(expr.kind, ExprKind::Null) && types.is_pointer(expected.ty) {
            expr.ty = expected.stripped();
            return;
        }

        match self.type_check(expr.ty, expected, mode) {
            TypeCheckResult::Match => {}
            TypeCheckResult::Cast => expr.wrap_in_cast(expected.stripped()),
            TypeCheckResult::Mismatch => {
                let msg = format!(
                    "expected '{}', got '{}'",
                    self.unit.types.display(expected),
                    self.unit.types.display(expr.ty)
                );
                self.diags.error_span(&msg, expr.span);
            }
        }
    }

    /// Conditions are boolean; nonzero integers and non-null pointers
    /// convert implicitly.
    fn check_condition(&mut self, cond: &mut Expr) {
        let types = &self.unit.types;
        if types.is_bool(cond.ty.ty) {
            return;
        }

        if types.is_integer(cond.ty.ty) || types.is_pointer(cond.ty.ty) {
            let bool_ty = TypeUse::new(types.bool());
            cond.wrap_in_cast(bool_ty);
            return;
        }

        self.diags.error_span("condition must be a boolean", cond.span);
    }

    fn is_lvalue(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::DeclRef { decl: Some(id), .. } => {
                matches!(self.unit.decl(*id), Decl::Variable { .. } | Decl::Parameter { .. })
            }
            ExprKind::Subscript { .. } | ExprKind::Access { .. } => true,
            ExprKind::Unary { op: UnaryOp::Deref, .. } => true,
            ExprKind::Paren(inner) => self.is_lvalue(inner),
            _ => false,
        }
    }

    // ---- declarations ------------------------------------------------

    fn visit_decl(&mut self, id: DeclId) -> Result<(), CompileError> {
        match self.unit.decl(id) {
            Decl::Function { ty, .. } => {
                let ret = self.unit.types.as_function(ty.ty).map(|(ret, _)| ret);
                let Some(mut body) = self.unit.take_body(id) else { return Ok(()) };

                let saved = self.ret.take();
                self.ret = ret;
                let result = self.visit_stmt(&mut body);
                self.ret = saved;

                self.unit.restore_body(id, Some(body));
                result
            }
            Decl::Variable { ty, .. } => {
                let ty = *ty;
                let Some(mut init) = self.unit.take_init(id) else { return Ok(()) };
                let result = self.visit_expr(&mut init);
                if result.is_ok() {
                    self.check_assignable(&mut init, ty, TypeCheckMode::AllowImplicit);
                }
                self.unit.restore_init(id, Some(init));
                result
            }
            _ => Ok(()),
        }
    }

    // ---- statements --------------------------------------------------

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Block { stmts, .. } => {
                for stmt in stmts {
                    self.visit_stmt(stmt)?;
                }
                Ok(())
            }
            StmtKind::Decl(decl) => {
                let decl = *decl;
                self.visit_decl(decl)
            }
            StmtKind::Ret(expr) => {
                let ret = self.ret.unwrap_or(TypeUse::new(self.unit.types.void()));
                match expr {
                    Some(expr) => {
                        self.visit_expr(expr)?;
                        self.check_assignable(expr, ret, TypeCheckMode::AllowImplicit);
                    }
                    None => {
                        if !self.unit.types.is_void(ret.ty) {
                            let msg = format!(
                                "function returns '{}', but 'ret' carries no value",
                                self.unit.types.display(ret)
                            );
                            self.diags.error_span(&msg, span);
                        }
                    }
                }
                Ok(())
            }
            StmtKind::If { cond, then, els } => {
                self.visit_expr(cond)?;
                self.check_condition(cond);
                self.visit_stmt(then)?;
                if let Some(els) = els {
                    self.visit_stmt(els)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond)?;
                self.check_condition(cond);
                if let Some(body) = body {
                    self.loop_depth += 1;
                    let result = self.visit_stmt(body);
                    self.loop_depth -= 1;
                    result?;
                }
                Ok(())
            }
            StmtKind::Break => {
                if self.loop_depth == 0 {
                    self.diags.error_span("'break' outside of a loop", span);
                }
                Ok(())
            }
            StmtKind::Continue => {
                if self.loop_depth == 0 {
                    self.diags.error_span("'continue' outside of a loop", span);
                }
                Ok(())
            }
            StmtKind::Asm { args, .. } => {
                for arg in args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.visit_expr(expr),
        }
    }

    // ---- expressions -------------------------------------------------

    fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Bool(_)
            | ExprKind::Integer(_)
            | ExprKind::Float(_)
            | ExprKind::Char(_)
            | ExprKind::Str(_)
            | ExprKind::Null
            | ExprKind::Sizeof(_)
            | ExprKind::DeclRef { .. }
            | ExprKind::Access { .. } => Ok(()),
            ExprKind::Paren(inner) => {
                self.visit_expr(inner)?;
                expr.ty = inner.ty;
                Ok(())
            }
            ExprKind::Unary { op, expr: operand, .. } => {
                let op = *op;
                self.visit_expr(operand)?;
                self.check_unary(expr, op, span)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)?;
                self.check_binary(expr, op, span)
            }
            ExprKind::Cast { expr: inner, target } => {
                let target = *target;
                self.visit_expr(inner)?;
                self.check_cast(inner, target, span);
                Ok(())
            }
            ExprKind::Subscript { base, index } => {
                self.visit_expr(base)?;
                self.visit_expr(index)?;

                let types = &self.unit.types;
                if !types.is_integer(index.ty.ty) && !matches!(index.kind, ExprKind::Integer(_)) {
                    self.diags.error_span("subscript index must be an integer", index.span);
                }

                let types = &self.unit.types;
                let element = types.pointee(base.ty.ty).or_else(|| self.element_of(base.ty.ty));
                match element {
                    Some(element) => expr.ty = element,
                    None => {
                        self.diags
                            .error_span("subscript base must be a pointer or an array", span);
                    }
                }
                Ok(())
            }
            ExprKind::Call { callee, args } => {
                self.visit_expr(callee)?;
                for arg in args.iter_mut() {
                    self.visit_expr(arg)?;
                }

                let Some((ret, params)) = self.unit.types.as_function(callee.ty.ty) else {
                    self.diags.error_span("called object is not a function", span);
                    return Ok(());
                };
                let params: Vec<TypeUse> = params.to_vec();

                if args.len() != params.len() {
                    let msg = format!(
                        "expected {} argument(s), got {}",
                        params.len(),
                        args.len()
                    );
                    self.diags.error_span(&msg, span);
                } else {
                    for (arg, &param) in args.iter_mut().zip(params.iter()) {
                        self.check_assignable(arg, param, TypeCheckMode::AllowImplicit);
                    }
                }

                expr.ty = ret;
                Ok(())
            }
        }
    }

    fn check_unary(
        &mut self,
        expr: &mut Expr,
        op: UnaryOp,
        span: crate::source::SourceSpan,
    ) -> Result<(), CompileError> {
        let ExprKind::Unary { expr: operand, .. } = &mut expr.kind else { return Ok(()) };
        let operand_ty = operand.ty;
        let types = &self.unit.types;

        match op {
            UnaryOp::Not => {
                if !types.is_bool(operand_ty.ty) {
                    self.diags.error_span("'!' operand must be a boolean", span);
                }
                expr.ty = TypeUse::new(self.unit.types.bool());
            }
            UnaryOp::BitNot => {
                if !types.is_integer(operand_ty.ty) {
                    self.diags.error_span("'~' operand must be an integer", span);
                }
                expr.ty = operand_ty;
            }
            UnaryOp::Neg => {
                if !types.is_numeric(operand_ty.ty) {
                    self.diags.error_span("'-' operand must be numeric", span);
                }
                expr.ty = operand_ty;
            }
            UnaryOp::AddrOf => {
                let is_lvalue = self.is_lvalue(operand);
                if !is_lvalue {
                    self.diags.error_span("'&' operand must be addressable", span);
                }
                let ty = self.unit.types.pointer(operand_ty);
                expr.ty = TypeUse::new(ty);
            }
            UnaryOp::Deref => match types.pointee(operand_ty.ty) {
                Some(pointee) => expr.ty = pointee,
                None => {
                    self.diags.error_span("'*' operand must be a pointer", span);
                    expr.ty = operand_ty;
                }
            },
            UnaryOp::Inc | UnaryOp::Dec => {
                let ok = types.is_numeric(operand_ty.ty) || types.is_pointer(operand_ty.ty);
                if !ok {
                    self.diags.error_span("operand must be numeric or a pointer", span);
                }
                let is_lvalue = self.is_lvalue(operand);
                if !is_lvalue {
                    self.diags.error_span("operand must be addressable", span);
                }
                expr.ty = operand_ty;
            }
        }

        Ok(())
    }

    fn check_binary(
        &mut self,
        expr: &mut Expr,
        op: BinaryOp,
        span: crate::source::SourceSpan,
    ) -> Result<(), CompileError> {
        if op.is_assignment() {
            return self.check_assignment(expr, op);
        }

        let ExprKind::Binary { lhs, rhs, .. } = &mut expr.kind else { return Ok(()) };
        let types = &self.unit.types;

        if op.is_logical() {
            let lhs_ok = types.is_bool(lhs.ty.ty);
            let rhs_ok = types.is_bool(rhs.ty.ty);
            if !lhs_ok || !rhs_ok {
                self.diags.error_span("logical operands must be booleans", span);
            }
            expr.ty = TypeUse::new(self.unit.types.bool());
            return Ok(());
        }

        if op.is_comparison() {
            // Pointers compare against pointers of the same type;
            // numerics reconcile like arithmetic.
            let both_pointers = types.is_pointer(lhs.ty.ty) && types.is_pointer(rhs.ty.ty);
            if !both_pointers {
                self.reconcile_operands(expr, span);
            }
            expr.ty = TypeUse::new(self.unit.types.bool());
            return Ok(());
        }

        // Arithmetic, bitwise, and shift forms.
        self.reconcile_operands(expr, span);
        if let ExprKind::Binary { lhs, .. } = &expr.kind {
            expr.ty = lhs.ty.stripped();
        }
        Ok(())
    }

    /// Lift both operands of a binary expression to their common type:
    /// the wider of the two within one numeric family. Integer literals
    /// adopt the other side first.
    fn reconcile_operands(&mut self, expr: &mut Expr, span: crate::source::SourceSpan) {
        let ExprKind::Binary { lhs, rhs, .. } = &mut expr.kind else { return };
        let types = &self.unit.types;

        if matches!(lhs.kind, ExprKind::Integer(_)) && types.is_numeric(rhs.ty.ty) {
            let target = rhs.ty.stripped();
            self.check_assignable(lhs, target, TypeCheckMode::AllowImplicit);
            return;
        }
        if matches!(rhs.kind, ExprKind::Integer(_)) && types.is_numeric(lhs.ty.ty) {
            let target = lhs.ty.stripped();
            self.check_assignable(rhs, target, TypeCheckMode::AllowImplicit);
            return;
        }

        let (Some(a), Some(b)) = (types.as_builtin(lhs.ty.ty), types.as_builtin(rhs.ty.ty)) else {
            self.diags.error_span("operands must be numeric", span);
            return;
        };

        let same_family = (a.is_signed() && b.is_signed())
            || (a.is_unsigned() && b.is_unsigned())
            || (a.is_float() && b.is_float());
        if !same_family || !a.is_integer() && !a.is_float() {
            let msg = format!(
                "operand types '{}' and '{}' do not reconcile",
                types.display(lhs.ty),
                types.display(rhs.ty)
            );
            self.diags.error_span(&msg, span);
            return;
        }

        if a.width() < b.width() {
            let target = rhs.ty.stripped();
            lhs.wrap_in_cast(target);
        } else if b.width() < a.width() {
            let target = lhs.ty.stripped();
            rhs.wrap_in_cast(target);
        }
    }

    fn check_assignment(&mut self, expr: &mut Expr, op: BinaryOp) -> Result<(), CompileError> {
        let ExprKind::Binary { lhs, rhs, .. } = &mut expr.kind else { return Ok(()) };

        if !self.is_lvalue(lhs) {
            self.diags.error_span("left operand is not assignable", lhs.span);
        } else if let ExprKind::DeclRef { decl: Some(id), name } = &lhs.kind {
            let mutable = self.unit.decl(*id).value_type().is_some_and(|ty| ty.is_mut());
            if !mutable {
                let msg = format!("cannot assign to immutable '{}'", name);
                self.diags.error_span(&msg, lhs.span);
            }
        }

        // Compound forms read the target with the underlying operator,
        // so the place must be numeric or a pointer.
        if op != BinaryOp::Assign {
            let types = &self.unit.types;
            if !types.is_numeric(lhs.ty.ty) && !types.is_pointer(lhs.ty.ty) {
                self.diags
                    .error_span("compound assignment target must be numeric", lhs.span);
            }
        }

        let target = lhs.ty;
        self.check_assignable(rhs, target.stripped(), TypeCheckMode::AllowImplicit);
        expr.ty = target.stripped();
        Ok(())
    }

    /// Explicit casts move within numeric types, between pointers, and
    /// between integers and pointers.
    fn check_cast(&mut self, inner: &Expr, target: TypeUse, span: crate::source::SourceSpan) {
        let types = &self.unit.types;
        let from = inner.ty;

        let numeric = types.is_numeric(from.ty) && types.is_numeric(target.ty);
        let pointers = types.is_pointer(from.ty) && types.is_pointer(target.ty);
        let int_ptr = (types.is_integer(from.ty) && types.is_pointer(target.ty))
            || (types.is_pointer(from.ty) && types.is_integer(target.ty));
        let boolean = types.is_bool(from.ty) && types.is_integer(target.ty);

        if !numeric && !pointers && !int_ptr && !boolean {
            let msg = format!(
                "invalid cast from '{}' to '{}'",
                types.display(from),
                types.display(target)
            );
            self.diags.error_span(&msg, span);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::symbols::SymbolAnalysis;
    use std::path::Path;

    fn checked(source: &str) -> (TranslationUnit, bool) {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut unit = Parser::new(&mut diags, Path::new("test"), source)
            .parse()
            .expect("parse failed");
        SymbolAnalysis::new(&mut diags, &mut unit).run().expect("symbol analysis failed");
        SemanticAnalysis::new(&mut diags, &mut unit).run().expect("semantic analysis failed");
        let errors = diags.has_errors();
        (unit, errors)
    }

    fn body_of<'u>(unit: &'u TranslationUnit, index: usize) -> &'u [Stmt] {
        match unit.decl(unit.top_decls()[index]) {
            Decl::Function { body: Some(Stmt { kind: StmtKind::Block { stmts, .. }, .. }), .. } => {
                stmts
            }
            _ => panic!("Expected a function with a body"),
        }
    }

    #[test]
    fn test_ret_widens_to_declared_type() {
        let (unit, errors) = checked("f :: () -> s64 { let x: s32 = 0; ret x; }");
        assert!(!errors);

        match &body_of(&unit, 0)[1].kind {
            StmtKind::Ret(Some(expr)) => {
                match &expr.kind {
                    ExprKind::Cast { expr: inner, .. } => {
                        assert!(matches!(inner.kind, ExprKind::DeclRef { .. }));
                    }
                    _ => panic!("Expected implicit Cast around the return value"),
                }
                assert_eq!(unit.types.display(expr.ty), "s64");
            }
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_bare_ret_requires_void() {
        let (_, errors) = checked("f :: () -> s64 { ret; }");
        assert!(errors);

        let (_, errors) = checked("f :: () -> void { ret; }");
        assert!(!errors);
    }

    #[test]
    fn test_narrowing_is_a_mismatch() {
        let (_, errors) = checked("f :: (wide: s64) -> s8 { ret wide; }");
        assert!(errors);
    }

    #[test]
    fn test_integer_literal_adopts_expected_type() {
        let (unit, errors) = checked("g :: u8 = 250");
        assert!(!errors);

        let Decl::Variable { init: Some(expr), .. } = unit.decl(unit.top_decls()[0]) else {
            panic!("Expected Variable");
        };
        match &expr.kind {
            ExprKind::Cast { target, .. } => assert_eq!(unit.types.display(*target), "u8"),
            _ => panic!("Expected literal adoption cast"),
        }
    }

    #[test]
    fn test_integer_condition_converts_to_bool() {
        let (unit, errors) = checked("f :: () -> s64 { if 5 { ret 0; } ret 1; }");
        assert!(!errors);

        match &body_of(&unit, 0)[0].kind {
            StmtKind::If { cond, .. } => match &cond.kind {
                ExprKind::Cast { target, .. } => {
                    assert_eq!(unit.types.display(*target), "bool");
                }
                _ => panic!("Expected bool conversion cast on the condition"),
            },
            _ => panic!("Expected If"),
        }
    }

    #[test]
    fn test_non_scalar_condition_is_an_error() {
        let (_, errors) =
            checked("P :: struct { x: s64 } f :: (p: P) -> void { while p {} }");
        assert!(errors);
    }

    #[test]
    fn test_break_and_continue_need_a_loop() {
        let (_, errors) = checked("f :: () -> void { break; }");
        assert!(errors);

        let (_, errors) = checked("f :: () -> void { continue; }");
        assert!(errors);

        let (_, errors) = checked("f :: () -> void { while true { break; continue; } }");
        assert!(!errors);
    }

    #[test]
    fn test_assignment_requires_mutable_lvalue() {
        let (_, errors) = checked("f :: () -> void { let x: s64 = 0; x = 1; }");
        assert!(errors, "assignment to an immutable binding");

        let (_, errors) = checked("f :: () -> void { let x: mut s64 = 0; x = 1; }");
        assert!(!errors);

        let (_, errors) = checked("f :: () -> void { 5 = 1; }");
        assert!(errors, "assignment to a literal");
    }

    #[test]
    fn test_binary_promotion_inserts_cast_on_narrower_side() {
        let (unit, errors) =
            checked("f :: (a: s32, b: s64) -> s64 { ret a + b; }");
        assert!(!errors);

        match &body_of(&unit, 0)[0].kind {
            StmtKind::Ret(Some(expr)) => match &expr.kind {
                ExprKind::Binary { lhs, rhs, .. } => {
                    assert!(matches!(lhs.kind, ExprKind::Cast { .. }), "narrow side widens");
                    assert!(matches!(rhs.kind, ExprKind::DeclRef { .. }));
                    assert_eq!(unit.types.display(expr.ty), "s64");
                }
                _ => panic!("Expected Binary"),
            },
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_mixed_signedness_does_not_reconcile() {
        let (_, errors) = checked("f :: (a: s32, b: u32) -> s64 { ret a + b; }");
        assert!(errors);
    }

    #[test]
    fn test_comparison_yields_bool() {
        let (unit, errors) = checked("f :: (a: s64, b: s64) -> bool { ret a < b; }");
        assert!(!errors);

        match &body_of(&unit, 0)[0].kind {
            StmtKind::Ret(Some(expr)) => assert_eq!(unit.types.display(expr.ty), "bool"),
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_logical_ops_require_bools() {
        let (_, errors) = checked("f :: (a: bool, b: bool) -> bool { ret a && b; }");
        assert!(!errors);

        let (_, errors) = checked("f :: (a: s64, b: bool) -> bool { ret a && b; }");
        assert!(errors);
    }

    #[test]
    fn test_call_checks_arity_and_argument_types() {
        let (_, errors) =
            checked("f :: (a: s64) -> s64 { ret a; } g :: () -> s64 { ret f(1, 2); }");
        assert!(errors, "arity mismatch");

        let (_, errors) =
            checked("f :: (a: s64) -> s64 { ret a; } g :: () -> s64 { ret f(1); }");
        assert!(!errors);

        let (_, errors) = checked("g :: () -> s64 { let x: s64 = 0; ret x(); }");
        assert!(errors, "callee is not a function");
    }

    #[test]
    fn test_null_assigns_to_any_pointer() {
        let (_, errors) = checked("f :: () -> *s64 { ret null; }");
        assert!(!errors);
    }

    #[test]
    fn test_cast_matrix() {
        let (_, errors) = checked("f :: (x: s64) -> f64 { ret cast<f64>(x); }");
        assert!(!errors, "numeric to numeric");

        let (_, errors) = checked("f :: (p: *s64) -> *void { ret cast<*void>(p); }");
        assert!(!errors, "pointer to pointer");

        let (_, errors) = checked("f :: (x: u64) -> *void { ret cast<*void>(x); }");
        assert!(!errors, "integer to pointer");

        let (_, errors) =
            checked("P :: struct { x: s64 } f :: (p: P) -> s64 { ret cast<s64>(p); }");
        assert!(errors, "struct does not cast to an integer");
    }

    #[test]
    fn test_deref_and_subscript_types() {
        let (unit, errors) = checked("f :: (p: *s64) -> s64 { ret *p; }");
        assert!(!errors);
        match &body_of(&unit, 0)[0].kind {
            StmtKind::Ret(Some(expr)) => assert_eq!(unit.types.display(expr.ty), "s64"),
            _ => panic!("Expected Ret"),
        }

        let (unit, errors) = checked("f :: (p: *s64) -> s64 { ret p[3]; }");
        assert!(!errors);
        match &body_of(&unit, 0)[0].kind {
            StmtKind::Ret(Some(expr)) => assert_eq!(unit.types.display(expr.ty), "s64"),
            _ => panic!("Expected Ret"),
        }

        let (_, errors) = checked("f :: (x: s64) -> s64 { ret *x; }");
        assert!(errors, "deref of a non-pointer");
    }
}
