//! Syntax tree printing
//!
//! Renders a unit as an indented plaintext tree for `--print-tree`.
//! Output is stable so it can be diffed across runs.

use std::fmt::Write;

use crate::ast::{Decl, DeclId, Expr, ExprKind, Stmt, StmtKind, TranslationUnit};

pub struct Printer<'a> {
    unit: &'a TranslationUnit,
    out: String,
    depth: usize,
}

impl<'a> Printer<'a> {
    pub fn new(unit: &'a TranslationUnit) -> Self {
        Printer { unit, out: String::new(), depth: 0 }
    }

    pub fn print(mut self) -> String {
        let _ = writeln!(self.out, "TranslationUnit '{}'", self.unit.file().display());
        self.depth += 1;
        for &decl in self.unit.top_decls() {
            self.print_decl(decl);
        }
        self.out
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn print_decl(&mut self, id: DeclId) {
        match self.unit.decl(id) {
            Decl::Variable { name, ty, init, global, runes, .. } => {
                let kind = if *global { "GlobalDecl" } else { "VariableDecl" };
                let mut text =
                    format!("{} '{}' '{}'", kind, name, self.unit.types.display(*ty));
                for rune in runes.iter() {
                    text.push_str(&format!(" ${}", rune.name()));
                }
                self.line(&text);
                if init.is_some() {
                    let init = match self.unit.decl(id) {
                        Decl::Variable { init: Some(init), .. } => init,
                        _ => unreachable!(),
                    };
                    self.nested(|p| p.print_expr(init));
                }
            }
            Decl::Parameter { name, ty, .. } => {
                let text = format!("ParameterDecl '{}' '{}'", name, self.unit.types.display(*ty));
                self.line(&text);
            }
            Decl::Function { name, ty, params, body, runes, .. } => {
                let mut text =
                    format!("FunctionDecl '{}' '{}'", name, self.unit.types.display(*ty));
                for rune in runes.iter() {
                    text.push_str(&format!(" ${}", rune.name()));
                }
                self.line(&text);
                let params = params.clone();
                self.nested(|p| {
                    for param in params {
                        p.print_decl(param);
                    }
                    if let Decl::Function { body: Some(body), .. } = p.unit.decl(id) {
                        p.print_stmt(body);
                    }
                });
            }
            Decl::Field { name, ty, .. } => {
                let text = format!("FieldDecl '{}' '{}'", name, self.unit.types.display(*ty));
                self.line(&text);
            }
            Decl::Variant { name, value, .. } => {
                let text = format!("VariantDecl '{}' = {}", name, value);
                self.line(&text);
            }
            Decl::Alias { name, ty, .. } => {
                let text = format!("AliasDecl '{}' '{}'", name, self.unit.types.display(*ty));
                self.line(&text);
            }
            Decl::Struct { name, fields, .. } => {
                let text = format!("StructDecl '{}'", name);
                self.line(&text);
                let fields = fields.clone();
                self.nested(|p| {
                    for field in fields {
                        p.print_decl(field);
                    }
                });
            }
            Decl::Enum { name, underlying, variants, .. } => {
                let text =
                    format!("EnumDecl '{}' '{}'", name, self.unit.types.display(*underlying));
                self.line(&text);
                let variants = variants.clone();
                self.nested(|p| {
                    for variant in variants {
                        p.print_decl(variant);
                    }
                });
            }
            Decl::Load { path, .. } => {
                let text = format!("LoadDecl \"{}\"", path);
                self.line(&text);
            }
        }
    }

    fn print_stmt(&mut self, stmt: &'a Stmt) {
        match &stmt.kind {
            StmtKind::Block { stmts, .. } => {
                self.line("BlockStmt");
                self.nested(|p| {
                    for stmt in stmts {
                        p.print_stmt(stmt);
                    }
                });
            }
            StmtKind::Decl(decl) => self.print_decl(*decl),
            StmtKind::Ret(expr) => {
                self.line("RetStmt");
                if let Some(expr) = expr {
                    self.nested(|p| p.print_expr(expr));
                }
            }
            StmtKind::If { cond, then, els } => {
                self.line("IfStmt");
                self.nested(|p| {
                    p.print_expr(cond);
                    p.print_stmt(then);
                    if let Some(els) = els {
                        p.print_stmt(els);
                    }
                });
            }
            StmtKind::While { cond, body } => {
                self.line("WhileStmt");
                self.nested(|p| {
                    p.print_expr(cond);
                    if let Some(body) = body {
                        p.print_stmt(body);
                    }
                });
            }
            StmtKind::Break => self.line("BreakStmt"),
            StmtKind::Continue => self.line("ContinueStmt"),
            StmtKind::Asm { template, args } => {
                self.line(&format!("AsmStmt {:?}", template));
                self.nested(|p| {
                    for arg in args {
                        p.print_expr(arg);
                    }
                });
            }
            StmtKind::Expr(expr) => self.print_expr(expr),
        }
    }

    fn print_expr(&mut self, expr: &'a Expr) {
        let ty = self.unit.types.display(expr.ty);
        match &expr.kind {
            ExprKind::Bool(value) => self.line(&format!("BoolLiteral {} '{}'", value, ty)),
            ExprKind::Integer(value) => {
                self.line(&format!("IntegerLiteral {} '{}'", value, ty))
            }
            ExprKind::Float(value) => self.line(&format!("FloatLiteral {} '{}'", value, ty)),
            ExprKind::Char(byte) => {
                self.line(&format!("CharLiteral {:?} '{}'", *byte as char, ty))
            }
            ExprKind::Str(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                self.line(&format!("StringLiteral {:?} '{}'", text, ty));
            }
            ExprKind::Null => self.line(&format!("NullLiteral '{}'", ty)),
            ExprKind::Binary { op, lhs, rhs } => {
                self.line(&format!("BinaryOp {:?} '{}'", op, ty));
                self.nested(|p| {
                    p.print_expr(lhs);
                    p.print_expr(rhs);
                });
            }
            ExprKind::Unary { op, prefix, expr } => {
                let position = if *prefix { "prefix" } else { "postfix" };
                self.line(&format!("UnaryOp {:?} {} '{}'", op, position, ty));
                self.nested(|p| p.print_expr(expr));
            }
            ExprKind::Cast { expr, .. } => {
                self.line(&format!("CastExpr '{}'", ty));
                self.nested(|p| p.print_expr(expr));
            }
            ExprKind::Paren(inner) => {
                self.line(&format!("ParenExpr '{}'", ty));
                self.nested(|p| p.print_expr(inner));
            }
            ExprKind::Sizeof(target) => {
                let target = self.unit.types.display(*target);
                self.line(&format!("SizeofExpr '{}' '{}'", target, ty));
            }
            ExprKind::DeclRef { name, .. } => {
                self.line(&format!("DeclRefExpr '{}' '{}'", name, ty))
            }
            ExprKind::Access { base, name, .. } => {
                self.line(&format!("AccessExpr '{}' '{}'", name, ty));
                self.nested(|p| p.print_expr(base));
            }
            ExprKind::Subscript { base, index } => {
                self.line(&format!("SubscriptExpr '{}'", ty));
                self.nested(|p| {
                    p.print_expr(base);
                    p.print_expr(index);
                });
            }
            ExprKind::Call { callee, args } => {
                self.line(&format!("CallExpr '{}'", ty));
                self.nested(|p| {
                    p.print_expr(callee);
                    for arg in args {
                        p.print_expr(arg);
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::parser::Parser;
    use std::path::Path;

    fn printed(source: &str) -> String {
        let mut diags = Diagnostics::to_writer(Box::new(std::io::sink()));
        let unit = Parser::new(&mut diags, Path::new("test"), source)
            .parse()
            .expect("parse failed");
        Printer::new(&unit).print()
    }

    #[test]
    fn test_function_tree_shape() {
        let text = printed("test :: () -> s64 { ret 0; }");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "TranslationUnit 'test'");
        assert!(lines[1].contains("FunctionDecl 'test'"));
        assert!(lines[2].trim_start().starts_with("BlockStmt"));
        assert!(lines[3].trim_start().starts_with("RetStmt"));
        assert!(lines[4].trim_start().starts_with("IntegerLiteral 0"));
    }

    #[test]
    fn test_printing_is_stable() {
        let source = "P :: struct { x: s64 } main :: (p: P) -> s64 { ret p.x; }";
        assert_eq!(printed(source), printed(source));
    }
}
