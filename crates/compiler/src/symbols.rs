//! Symbol analysis
//!
//! Two passes over a freshly parsed unit. The shallow pass binds every
//! deferred type reference against the root scope. The deep pass walks
//! the tree with the scope that is current at each node, binding named
//! references to their declarations and member accesses to a concrete
//! field. Unresolved names are fatal here; later stages may assume every
//! reference is bound.

use std::path::PathBuf;

use crate::ast::{Decl, DeclId, Expr, ExprKind, Stmt, StmtKind, TranslationUnit};
use crate::diagnostics::Diagnostics;
use crate::error::CompileError;
use crate::scope::ScopeId;
use crate::source::SourceSpan;

pub struct SymbolAnalysis<'a> {
    diags: &'a mut Diagnostics,
    unit: &'a mut TranslationUnit,
    scope: ScopeId,
    file: PathBuf,
}

impl<'a> SymbolAnalysis<'a> {
    pub fn new(diags: &'a mut Diagnostics, unit: &'a mut TranslationUnit) -> Self {
        let scope = unit.root_scope();
        let file = unit.file().to_path_buf();
        SymbolAnalysis { diags, unit, scope, file }
    }

    pub fn run(mut self) -> Result<(), CompileError> {
        self.resolve_deferred_types()?;

        for decl in self.unit.top_decls().to_vec() {
            self.visit_decl(decl)?;
        }

        Ok(())
    }

    fn unresolved(&self, msg: &str, span: SourceSpan) -> CompileError {
        CompileError::Unresolved(format!("{}:{}: {}", self.file.display(), span.start, msg))
    }

    fn type_error(&self, msg: &str, span: SourceSpan) -> CompileError {
        CompileError::Type(format!("{}:{}: {}", self.file.display(), span.start, msg))
    }

    /// Pass 1: bind every deferred type name against the root scope.
    fn resolve_deferred_types(&mut self) -> Result<(), CompileError> {
        for reference in self.unit.deferred.clone() {
            let Some(decl) = self.unit.lookup(self.unit.root_scope(), &reference.name) else {
                let msg = format!("unresolved type: '{}'", reference.name);
                return Err(self.unresolved(&msg, reference.span));
            };

            let node = self.unit.decl(decl);
            if !node.is_type_decl() {
                let msg = format!("invalid type: '{}'", reference.name);
                return Err(self.unresolved(&msg, reference.span));
            }

            let underlying = node.declared_type().unwrap();
            self.unit.types.resolve_deferred(reference.ty, underlying);
        }

        Ok(())
    }

    /// Pass 2, declarations. Bodies and initializers are lifted out of
    /// the arena for the walk and put back afterwards, so the rest of
    /// the unit stays readable while they are mutated.
    fn visit_decl(&mut self, id: DeclId) -> Result<(), CompileError> {
        match self.unit.decl(id) {
            Decl::Function { scope, .. } => {
                let scope = *scope;
                let Some(mut body) = self.unit.take_body(id) else { return Ok(()) };

                let saved = self.scope;
                self.scope = scope;
                let result = self.visit_stmt(&mut body);
                self.scope = saved;

                self.unit.restore_body(id, Some(body));
                result
            }
            Decl::Variable { .. } => {
                let Some(mut init) = self.unit.take_init(id) else { return Ok(()) };
                let result = self.visit_expr(&mut init);
                self.unit.restore_init(id, Some(init));
                result
            }
            _ => Ok(()),
        }
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<(), CompileError> {
        match &mut stmt.kind {
            StmtKind::Block { scope, stmts } => {
                let saved = self.scope;
                self.scope = *scope;
                for stmt in stmts {
                    self.visit_stmt(stmt)?;
                }
                self.scope = saved;
                Ok(())
            }
            StmtKind::Decl(decl) => {
                let decl = *decl;
                self.visit_decl(decl)
            }
            StmtKind::Ret(expr) => match expr {
                Some(expr) => self.visit_expr(expr),
                None => Ok(()),
            },
            StmtKind::If { cond, then, els } => {
                self.visit_expr(cond)?;
                self.visit_stmt(then)?;
                if let Some(els) = els {
                    self.visit_stmt(els)?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond)?;
                if let Some(body) = body {
                    self.visit_stmt(body)?;
                }
                Ok(())
            }
            StmtKind::Break | StmtKind::Continue => Ok(()),
            StmtKind::Asm { args, .. } => {
                for arg in args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            StmtKind::Expr(expr) => self.visit_expr(expr),
        }
    }

    fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), CompileError> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Bool(_)
            | ExprKind::Integer(_)
            | ExprKind::Float(_)
            | ExprKind::Char(_)
            | ExprKind::Str(_)
            | ExprKind::Null
            | ExprKind::Sizeof(_) => Ok(()),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)
            }
            ExprKind::Unary { expr, .. } => self.visit_expr(expr),
            ExprKind::Cast { expr, .. } => self.visit_expr(expr),
            ExprKind::Paren(inner) => {
                self.visit_expr(inner)?;
                expr.ty = inner.ty;
                Ok(())
            }
            ExprKind::Subscript { base, index } => {
                self.visit_expr(base)?;
                self.visit_expr(index)
            }
            ExprKind::Call { callee, args } => {
                self.visit_expr(callee)?;
                for arg in args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            ExprKind::DeclRef { name, decl } => {
                let Some(found) = self.unit.lookup(self.scope, name) else {
                    let msg = format!("unresolved reference: '{}'", name);
                    return Err(self.unresolved(&msg, span));
                };

                let node = self.unit.decl(found);
                if !node.is_value_decl() {
                    let msg = format!("invalid reference: '{}'", name);
                    return Err(self.unresolved(&msg, span));
                }

                expr.ty = node.value_type().unwrap();
                *decl = Some(found);
                Ok(())
            }
            ExprKind::Access { base, name, field } => {
                self.visit_expr(base)?;

                // A pointer base is followed one level; resolved names
                // are seen through to the type they stand for.
                let mut base_ty = base.ty;
                if let Some(pointee) = self.unit.types.pointee(base_ty.ty) {
                    base_ty = pointee;
                }

                let Some(struct_decl) = self.unit.types.as_struct(base_ty.ty) else {
                    return Err(
                        self.type_error("'.' base must be a struct or a pointer to one", span)
                    );
                };

                let Decl::Struct { fields, .. } = self.unit.decl(struct_decl) else {
                    return Err(self.type_error("'.' base is not a struct", span));
                };

                let found = fields.iter().copied().enumerate().find(|&(_, f)| {
                    self.unit.decl(f).name() == Some(name.as_str())
                });
                let Some((index, field_decl)) = found else {
                    let msg = format!("field '{}' does not exist", name);
                    return Err(self.unresolved(&msg, span));
                };

                expr.ty = match self.unit.decl(field_decl) {
                    Decl::Field { ty, .. } => *ty,
                    _ => base_ty,
                };
                *field = Some((field_decl, index as u32));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use std::path::Path;

    fn analyzed(source: &str) -> Result<TranslationUnit, CompileError> {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let mut unit = Parser::new(&mut diags, Path::new("test"), source).parse()?;
        SymbolAnalysis::new(&mut diags, &mut unit).run()?;
        Ok(unit)
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
    fn test_variable_reference_binds() {
        let unit = analyzed("test :: () -> s64 { let x: s64 = 0; ret x; }").unwrap();
        match &body_of(&unit, 0)[1].kind {
            StmtKind::Ret(Some(expr)) => match &expr.kind {
                ExprKind::DeclRef { decl: Some(decl), .. } => {
                    assert!(matches!(unit.decl(*decl), Decl::Variable { .. }));
                    assert_eq!(unit.types.display(expr.ty), "s64");
                }
                _ => panic!("Expected bound DeclRef"),
            },
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_unresolved_reference_is_fatal() {
        let err = analyzed("test :: () -> s64 { let x: s64 = 0; ret y; }").unwrap_err();
        match err {
            CompileError::Unresolved(msg) => assert!(msg.contains("unresolved")),
            _ => panic!("Expected Unresolved"),
        }
    }

    #[test]
    fn test_callee_reference_binds_forward() {
        let unit =
            analyzed("foo :: () -> s64 { ret bar(); } bar :: () -> s64 { ret 0; }").unwrap();
        match &body_of(&unit, 0)[0].kind {
            StmtKind::Ret(Some(expr)) => match &expr.kind {
                ExprKind::Call { callee, .. } => match &callee.kind {
                    ExprKind::DeclRef { decl: Some(decl), .. } => {
                        assert!(matches!(unit.decl(*decl), Decl::Function { .. }));
                    }
                    _ => panic!("Expected bound callee"),
                },
                _ => panic!("Expected Call"),
            },
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_parameter_reference_binds() {
        let unit = analyzed("foo :: (a: s64) -> s64 { ret a; }").unwrap();
        match &body_of(&unit, 0)[0].kind {
            StmtKind::Ret(Some(expr)) => match &expr.kind {
                ExprKind::DeclRef { decl: Some(decl), .. } => {
                    assert!(matches!(unit.decl(*decl), Decl::Parameter { .. }));
                }
                _ => panic!("Expected bound DeclRef"),
            },
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_deferred_type_resolves_to_struct() {
        let unit = analyzed(
            "Point :: struct { x: s64, y: s64 } origin :: () -> Point;",
        )
        .unwrap();
        assert_eq!(unit.deferred.len(), 1);
        let resolved = unit.types.resolution(unit.deferred[0].ty).unwrap();
        assert_eq!(unit.types.display(resolved), "Point");
    }

    #[test]
    fn test_unknown_deferred_type_is_fatal() {
        let err = analyzed("test :: () -> Widget;").unwrap_err();
        match err {
            CompileError::Unresolved(msg) => assert!(msg.contains("unresolved type")),
            _ => panic!("Expected Unresolved"),
        }
    }

    #[test]
    fn test_value_name_used_as_type_is_fatal() {
        let err = analyzed("g :: s64 test :: () -> g;").unwrap_err();
        match err {
            CompileError::Unresolved(msg) => assert!(msg.contains("invalid type")),
            _ => panic!("Expected Unresolved"),
        }
    }

    #[test]
    fn test_field_access_binds_by_index() {
        let unit = analyzed(
            "Point :: struct { x: s64, y: s64 } get_y :: (p: Point) -> s64 { ret p.y; }",
        )
        .unwrap();
        match &body_of(&unit, 1)[0].kind {
            StmtKind::Ret(Some(expr)) => match &expr.kind {
                ExprKind::Access { field: Some((field, index)), .. } => {
                    assert_eq!(unit.decl(*field).name(), Some("y"));
                    assert_eq!(*index, 1);
                    assert_eq!(unit.types.display(expr.ty), "s64");
                }
                _ => panic!("Expected bound Access"),
            },
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_field_access_through_pointer() {
        let unit = analyzed(
            "Point :: struct { x: s64, y: s64 } get_x :: (p: *Point) -> s64 { ret p.x; }",
        )
        .unwrap();
        match &body_of(&unit, 1)[0].kind {
            StmtKind::Ret(Some(expr)) => {
                assert!(matches!(expr.kind, ExprKind::Access { field: Some(_), .. }));
            }
            _ => panic!("Expected Ret"),
        }
    }

    #[test]
    fn test_missing_field_is_fatal() {
        let err = analyzed(
            "Point :: struct { x: s64 } get :: (p: Point) -> s64 { ret p.z; }",
        )
        .unwrap_err();
        match err {
            CompileError::Unresolved(msg) => assert!(msg.contains("does not exist")),
            _ => panic!("Expected Unresolved"),
        }
    }

    #[test]
    fn test_access_on_non_struct_is_fatal() {
        let err = analyzed("get :: (x: s64) -> s64 { ret x.y; }").unwrap_err();
        assert!(matches!(err, CompileError::Type(_)));
    }
}
