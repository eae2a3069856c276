//! Syntax analysis
//!
//! A single-token-lookahead recursive-descent parser. Top-level items
//! bind a name with `::` to a function, struct, enum, alias, or global
//! variable; `load` pulls in another source file. Expressions use
//! precedence climbing over the operator table in [`binary_oper`].
//!
//! The parser resolves nothing: names used as types become deferred
//! references in the interner, and named expressions carry only their
//! spelling until symbol analysis binds them.

use std::path::{Path, PathBuf};

use crate::ast::{
    BinaryOp, Decl, DeclId, Expr, ExprKind, Rune, Stmt, StmtKind, TranslationUnit, UnaryOp,
};
use crate::diagnostics::Diagnostics;
use crate::error::CompileError;
use crate::lexer::Lexer;
use crate::scope::ScopeId;
use crate::source::{SourceLocation, SourceSpan};
use crate::token::{Token, TokenKind};
use crate::types::{Builtin, TypeUse};

/// The binary operator and precedence for a token, or `None` when the
/// token is not a binary operator. Higher binds tighter; assignment is
/// right-associative and lowest.
fn binary_oper(kind: TokenKind) -> Option<(BinaryOp, u8)> {
    use TokenKind::*;
    Some(match kind {
        Eq => (BinaryOp::Assign, 1),
        PlusEq => (BinaryOp::AddAssign, 1),
        MinusEq => (BinaryOp::SubAssign, 1),
        StarEq => (BinaryOp::MulAssign, 1),
        SlashEq => (BinaryOp::DivAssign, 1),
        PercentEq => (BinaryOp::RemAssign, 1),
        AndEq => (BinaryOp::AndAssign, 1),
        OrEq => (BinaryOp::OrAssign, 1),
        XorEq => (BinaryOp::XorAssign, 1),
        LeftLeftEq => (BinaryOp::ShlAssign, 1),
        RightRightEq => (BinaryOp::ShrAssign, 1),
        OrOr => (BinaryOp::LogicOr, 2),
        AndAnd => (BinaryOp::LogicAnd, 3),
        Or => (BinaryOp::Or, 4),
        Xor => (BinaryOp::Xor, 5),
        And => (BinaryOp::And, 6),
        EqEq => (BinaryOp::Eq, 7),
        BangEq => (BinaryOp::Ne, 7),
        Left => (BinaryOp::Lt, 8),
        LeftEq => (BinaryOp::Le, 8),
        Right => (BinaryOp::Gt, 8),
        RightEq => (BinaryOp::Ge, 8),
        LeftLeft => (BinaryOp::Shl, 9),
        RightRight => (BinaryOp::Shr, 9),
        Plus => (BinaryOp::Add, 10),
        Minus => (BinaryOp::Sub, 10),
        Star => (BinaryOp::Mul, 11),
        Slash => (BinaryOp::Div, 11),
        Percent => (BinaryOp::Rem, 11),
        _ => return None,
    })
}

/// The prefix unary operator for a token, if any.
fn unary_oper(kind: TokenKind) -> Option<UnaryOp> {
    use TokenKind::*;
    Some(match kind {
        Bang => UnaryOp::Not,
        Tilde => UnaryOp::BitNot,
        Minus => UnaryOp::Neg,
        And => UnaryOp::AddrOf,
        Star => UnaryOp::Deref,
        PlusPlus => UnaryOp::Inc,
        MinusMinus => UnaryOp::Dec,
        _ => return None,
    })
}

/// Parser for one Quill translation unit.
pub struct Parser<'a> {
    diags: &'a mut Diagnostics,
    file: PathBuf,
    lexer: Lexer<'a>,
    unit: TranslationUnit,
    scope: ScopeId,
    last: Token,
    runes: Vec<Rune>,
}

impl<'a> Parser<'a> {
    pub fn new(diags: &'a mut Diagnostics, path: &Path, source: &'a str) -> Self {
        diags.set_path(path);
        diags.set_source(source);

        let unit = TranslationUnit::new(path);
        let scope = unit.root_scope();
        Parser {
            diags,
            file: path.to_path_buf(),
            lexer: Lexer::new(source),
            unit,
            scope,
            last: Token::default(),
            runes: Vec::new(),
        }
    }

    /// Parse the whole unit. Any parse error is fatal; the partially
    /// built tree is discarded with the parser.
    pub fn parse(mut self) -> Result<TranslationUnit, CompileError> {
        self.next(); // lex the first token

        while !self.last.is_eof() {
            let decl = self.parse_initial_declaration()?;
            self.unit.push_top(decl);
        }

        Ok(self.unit)
    }

    // ---- cursor helpers ----------------------------------------------

    fn next(&mut self) {
        self.last = self.lexer.lex(self.diags);
    }

    fn loc(&self) -> SourceLocation {
        self.last.loc
    }

    /// The span of source since `start`, clamped so it never ends before
    /// it begins.
    fn since(&self, start: SourceLocation) -> SourceSpan {
        SourceSpan::new(start, self.loc().max(start))
    }

    fn fail(&mut self, msg: &str) -> CompileError {
        CompileError::Parse(format!("{}:{}: {}", self.file.display(), self.loc(), msg))
    }

    fn match_kind(&self, kind: TokenKind) -> bool {
        self.last.kind == kind
    }

    fn match_keyword(&self, keyword: &str) -> bool {
        self.last.kind == TokenKind::Identifier && self.last.value == keyword
    }

    /// Consume the current token when it is of `kind`. Non-destructive
    /// on mismatch.
    fn expect_kind(&mut self, kind: TokenKind) -> bool {
        if !self.match_kind(kind) {
            return false;
        }
        self.next();
        true
    }

    /// Consume the current token when it is the identifier `keyword`.
    fn expect_keyword(&mut self, keyword: &str) -> bool {
        if !self.match_keyword(keyword) {
            return false;
        }
        self.next();
        true
    }

    fn enter_scope(&mut self) -> ScopeId {
        self.scope = self.unit.new_scope(self.scope);
        self.scope
    }

    fn exit_scope(&mut self) {
        if let Some(parent) = self.unit.scope(self.scope).parent() {
            self.scope = parent;
        }
    }

    /// Insert a named declaration into the current scope, diagnosing
    /// same-node conflicts without aborting.
    fn declare(&mut self, name: &str, decl: DeclId, loc: SourceLocation) {
        if self.unit.declare(self.scope, name, decl).is_err() {
            self.diags.error_at(&format!("redeclaration of '{}'", name), loc);
        }
    }

    // ---- types -------------------------------------------------------

    /// Parse a type reference: `mut? ("*" Type | "[" N "]" Type | NAME)`.
    /// Unknown names defer to symbol analysis rather than erroring here.
    fn parse_type(&mut self) -> Result<TypeUse, CompileError> {
        let mutable = self.expect_keyword("mut");

        if self.expect_kind(TokenKind::Star) {
            let pointee = self.parse_type()?;
            let ty = self.unit.types.pointer(pointee);
            return Ok(TypeUse { ty, mutable });
        }

        if self.expect_kind(TokenKind::OpenBrack) {
            if !self.match_kind(TokenKind::Integer) {
                return Err(self.fail("expected array size"));
            }
            let size: u32 = self.last.value.parse().unwrap_or(0);
            self.next();
            if !self.expect_kind(TokenKind::CloseBrack) {
                return Err(self.fail("expected ']'"));
            }
            let element = self.parse_type()?;
            let ty = self.unit.types.array(element, size);
            return Ok(TypeUse { ty, mutable });
        }

        if !self.match_kind(TokenKind::Identifier) {
            return Err(self.fail("expected type"));
        }

        let loc = self.loc();
        let name = self.last.value.clone();
        self.next();

        let ty = match Builtin::from_name(&name) {
            Some(builtin) => self.unit.types.builtin(builtin),
            None => {
                let deferred = self.unit.types.deferred(&name);
                self.unit.record_deferred(&name, deferred, self.since(loc));
                deferred
            }
        };

        Ok(TypeUse { ty, mutable })
    }

    // ---- declarations ------------------------------------------------

    fn parse_rune_list(&mut self) -> Result<(), CompileError> {
        while self.expect_kind(TokenKind::Sign) {
            if !self.match_kind(TokenKind::Identifier) {
                return Err(self.fail("expected rune name after '$'"));
            }
            match Rune::from_name(&self.last.value) {
                Some(rune) => {
                    if !self.runes.contains(&rune) {
                        self.runes.push(rune);
                    }
                }
                None => {
                    let msg = format!("unknown rune '{}'", self.last.value);
                    let loc = self.loc();
                    self.diags.error_at(&msg, loc);
                }
            }
            self.next();
        }
        Ok(())
    }

    fn parse_initial_declaration(&mut self) -> Result<DeclId, CompileError> {
        self.parse_rune_list()?;

        if !self.match_kind(TokenKind::Identifier) {
            return Err(self.fail("expected identifier"));
        }

        if self.expect_keyword("load") {
            return self.parse_load_declaration();
        }

        let name = self.last.clone();
        self.next();

        if !self.expect_kind(TokenKind::Path) {
            return Err(self.fail("expected '::' after declaration name"));
        }

        self.parse_binding_declaration(name)
    }

    fn parse_load_declaration(&mut self) -> Result<DeclId, CompileError> {
        let start = self.loc();
        if !self.match_kind(TokenKind::String) {
            return Err(self.fail("expected file path after 'load'"));
        }

        let path = self.last.value.clone();
        self.next();

        if !self.expect_kind(TokenKind::Semi) {
            return Err(self.fail("expected ';'"));
        }

        Ok(self.unit.add_decl(Decl::Load { span: self.since(start), path }))
    }

    fn parse_binding_declaration(&mut self, name: Token) -> Result<DeclId, CompileError> {
        if self.expect_kind(TokenKind::OpenParen) {
            self.parse_function_declaration(name)
        } else if self.expect_keyword("struct") {
            self.parse_struct_declaration(name)
        } else if self.expect_keyword("enum") {
            self.parse_enum_declaration(name)
        } else if self.expect_keyword("alias") {
            self.parse_alias_declaration(name)
        } else {
            self.parse_global_declaration(name)
        }
    }

    fn parse_function_declaration(&mut self, name: Token) -> Result<DeclId, CompileError> {
        let scope = self.enter_scope();
        let runes = std::mem::take(&mut self.runes);

        let mut params = Vec::new();
        while !self.expect_kind(TokenKind::CloseParen) {
            if !self.match_kind(TokenKind::Identifier) {
                return Err(self.fail("expected parameter name"));
            }

            let param_start = self.loc();
            let param_name = self.last.value.clone();
            self.next();

            if !self.expect_kind(TokenKind::Colon) {
                return Err(self.fail("expected parameter type"));
            }

            let param_type = self.parse_type()?;
            let param = self.unit.add_decl(Decl::Parameter {
                span: self.since(param_start),
                name: param_name.clone(),
                ty: param_type,
            });
            self.declare(&param_name, param, param_start);
            params.push(param);

            if self.expect_kind(TokenKind::CloseParen) {
                break;
            }
            if !self.expect_kind(TokenKind::Comma) {
                return Err(self.fail("expected ','"));
            }
        }

        if !self.expect_kind(TokenKind::Arrow) {
            return Err(self.fail("expected '->' after parameter list"));
        }

        let ret = self.parse_type()?;

        let mut body = None;
        let mut end = self.loc();
        if self.match_kind(TokenKind::OpenBrace) {
            let block = self.parse_block_statement()?;
            end = block.span.end;
            body = Some(block);
        } else if !self.expect_kind(TokenKind::Semi) {
            return Err(self.fail("expected function body"));
        }

        self.exit_scope();

        let param_types: Vec<TypeUse> = params
            .iter()
            .map(|&p| self.unit.decl(p).value_type().unwrap())
            .collect();
        let fn_type = self.unit.types.function(ret, param_types);

        let decl = self.unit.add_decl(Decl::Function {
            span: SourceSpan::new(name.loc, end.max(name.loc)),
            name: name.value.clone(),
            runes,
            ty: TypeUse::new(fn_type),
            scope,
            params,
            body,
        });
        self.declare(&name.value, decl, name.loc);
        Ok(decl)
    }

    fn parse_struct_declaration(&mut self, name: Token) -> Result<DeclId, CompileError> {
        if !self.expect_kind(TokenKind::OpenBrace) {
            return Err(self.fail("expected '{'"));
        }

        self.runes.clear();
        let mut fields = Vec::new();
        let mut end = self.loc();
        while !self.expect_kind(TokenKind::CloseBrace) {
            if !self.match_kind(TokenKind::Identifier) {
                return Err(self.fail("expected field name"));
            }

            let field_name = self.last.clone();
            self.next();

            if !self.expect_kind(TokenKind::Colon) {
                return Err(self.fail("expected ':'"));
            }

            let field_type = self.parse_type()?;
            let field = self.unit.add_decl(Decl::Field {
                span: self.since(field_name.loc),
                name: field_name.value.clone(),
                ty: field_type,
            });
            fields.push(field);

            if self.match_kind(TokenKind::CloseBrace) {
                end = self.loc();
                self.next(); // '}'
                break;
            }
            if !self.expect_kind(TokenKind::Comma) {
                return Err(self.fail("expected ','"));
            }
        }

        // The struct type refers back to its declaration, so the arena
        // slot is created first and patched with the interned type.
        let decl = self.unit.add_decl(Decl::Struct {
            span: SourceSpan::new(name.loc, end.max(name.loc)),
            name: name.value.clone(),
            ty: TypeUse::new(self.unit.types.void()),
            fields: Vec::new(),
        });
        let ty = self.unit.types.struct_type(&name.value, decl);
        if let Decl::Struct { ty: slot, fields: field_slot, .. } = self.unit.decl_mut(decl) {
            *slot = TypeUse::new(ty);
            *field_slot = fields;
        }

        self.declare(&name.value, decl, name.loc);
        Ok(decl)
    }

    fn parse_enum_declaration(&mut self, name: Token) -> Result<DeclId, CompileError> {
        let underlying = if self.match_kind(TokenKind::Identifier) {
            self.parse_type()?
        } else {
            TypeUse::new(self.unit.types.builtin(Builtin::S64))
        };

        self.runes.clear();

        let decl = self.unit.add_decl(Decl::Enum {
            span: SourceSpan::from(name.loc),
            name: name.value.clone(),
            ty: TypeUse::new(self.unit.types.void()),
            underlying,
            variants: Vec::new(),
        });
        let ty = TypeUse::new(self.unit.types.enum_type(&name.value, underlying, decl));
        if let Decl::Enum { ty: slot, .. } = self.unit.decl_mut(decl) {
            *slot = ty;
        }

        if !self.expect_kind(TokenKind::OpenBrace) {
            return Err(self.fail("expected '{'"));
        }

        let mut variants = Vec::new();
        let mut value: i64 = 0;
        let mut end = self.loc();
        while !self.expect_kind(TokenKind::CloseBrace) {
            if !self.match_kind(TokenKind::Identifier) {
                return Err(self.fail("expected variant name"));
            }

            let variant_name = self.last.clone();
            self.next();

            // An explicit value resets the counter; implicit variants
            // continue from the last value + 1.
            if self.expect_kind(TokenKind::Eq) {
                let neg = self.expect_kind(TokenKind::Minus);
                if !self.match_kind(TokenKind::Integer) {
                    return Err(self.fail("expected integer"));
                }
                value = self.last.value.parse().unwrap_or(0);
                if neg {
                    value = -value;
                }
                self.next();
            }

            let variant = self.unit.add_decl(Decl::Variant {
                span: self.since(variant_name.loc),
                name: variant_name.value.clone(),
                ty,
                value,
            });
            value += 1;

            self.declare(&variant_name.value, variant, variant_name.loc);
            variants.push(variant);

            if self.match_kind(TokenKind::CloseBrace) {
                end = self.loc();
                self.next(); // '}'
                break;
            }
            if !self.expect_kind(TokenKind::Comma) {
                return Err(self.fail("expected ','"));
            }
        }

        if let Decl::Enum { span, variants: slot, .. } = self.unit.decl_mut(decl) {
            *span = SourceSpan::new(name.loc, end.max(name.loc));
            *slot = variants;
        }

        self.declare(&name.value, decl, name.loc);
        Ok(decl)
    }

    fn parse_alias_declaration(&mut self, name: Token) -> Result<DeclId, CompileError> {
        let underlying = self.parse_type()?;
        while self.expect_kind(TokenKind::Semi) {}

        let decl = self.unit.add_decl(Decl::Alias {
            span: self.since(name.loc),
            name: name.value.clone(),
            ty: TypeUse::new(self.unit.types.void()),
        });
        let ty = self.unit.types.alias_type(&name.value, decl, underlying);
        if let Decl::Alias { ty: slot, .. } = self.unit.decl_mut(decl) {
            *slot = TypeUse::new(ty);
        }

        self.declare(&name.value, decl, name.loc);
        Ok(decl)
    }

    fn parse_global_declaration(&mut self, name: Token) -> Result<DeclId, CompileError> {
        let ty = self.parse_type()?;
        let runes = std::mem::take(&mut self.runes);

        let mut init = None;
        let mut end = self.loc();
        if self.expect_kind(TokenKind::Eq) {
            let expr = self.parse_initial_expression()?;
            end = expr.span.end;
            init = Some(expr);
        }

        // Semis are not strictly necessary, but are not disallowed
        // either.
        while self.expect_kind(TokenKind::Semi) {}

        let decl = self.unit.add_decl(Decl::Variable {
            span: SourceSpan::new(name.loc, end.max(name.loc)),
            name: name.value.clone(),
            runes,
            ty,
            init,
            global: true,
        });
        self.declare(&name.value, decl, name.loc);
        Ok(decl)
    }

    // ---- statements --------------------------------------------------

    fn parse_initial_statement(&mut self) -> Result<Stmt, CompileError> {
        if self.match_kind(TokenKind::OpenBrace) {
            self.parse_block_statement()
        } else if self.match_keyword("asm") {
            self.parse_inline_assembly_statement()
        } else if self.match_keyword("let") {
            self.parse_declarative_statement()
        } else {
            self.parse_control_statement()
        }
    }

    /// `asm("template", inputs...);`
    fn parse_inline_assembly_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.loc();
        self.next(); // 'asm'

        if !self.expect_kind(TokenKind::OpenParen) {
            return Err(self.fail("expected '(' after 'asm'"));
        }
        if !self.match_kind(TokenKind::String) {
            return Err(self.fail("expected assembly template string"));
        }

        let template = self.last.value.clone();
        self.next();

        let mut args = Vec::new();
        while self.expect_kind(TokenKind::Comma) {
            args.push(self.parse_initial_expression()?);
        }
        if !self.expect_kind(TokenKind::CloseParen) {
            return Err(self.fail("expected ')'"));
        }
        if !self.expect_kind(TokenKind::Semi) {
            return Err(self.fail("expected ';'"));
        }

        Ok(Stmt::new(self.since(start), StmtKind::Asm { template, args }))
    }

    fn parse_block_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.loc();
        self.next(); // '{'

        let scope = self.enter_scope();
        let mut stmts = Vec::new();

        while !self.match_kind(TokenKind::CloseBrace) {
            if self.last.is_eof() {
                return Err(self.fail("expected '}'"));
            }
            let stmt = self.parse_initial_statement()?;
            while self.expect_kind(TokenKind::Semi) {}
            stmts.push(stmt);
        }

        self.exit_scope();

        let end = self.loc();
        self.next(); // '}'

        Ok(Stmt::new(SourceSpan::new(start, end), StmtKind::Block { scope, stmts }))
    }

    fn parse_declarative_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.loc();
        self.next(); // 'let'

        if !self.match_kind(TokenKind::Identifier) {
            return Err(self.fail("expected identifier"));
        }

        let name = self.last.clone();
        self.next();

        if !self.expect_kind(TokenKind::Colon) {
            return Err(self.fail("expected ':'"));
        }

        let ty = self.parse_type()?;

        let mut init = None;
        if !self.expect_kind(TokenKind::Semi) {
            if !self.expect_kind(TokenKind::Eq) {
                return Err(self.fail("expected '='"));
            }
            init = Some(self.parse_initial_expression()?);
            if !self.expect_kind(TokenKind::Semi) {
                return Err(self.fail("expected ';'"));
            }
        }

        let span = self.since(start);
        let decl = self.unit.add_decl(Decl::Variable {
            span,
            name: name.value.clone(),
            runes: Vec::new(),
            ty,
            init,
            global: false,
        });
        self.declare(&name.value, decl, name.loc);

        Ok(Stmt::new(span, StmtKind::Decl(decl)))
    }

    fn parse_control_statement(&mut self) -> Result<Stmt, CompileError> {
        let start = self.loc();

        if self.expect_keyword("break") {
            return Ok(Stmt::new(self.since(start), StmtKind::Break));
        }

        if self.expect_keyword("continue") {
            return Ok(Stmt::new(self.since(start), StmtKind::Continue));
        }

        if self.expect_keyword("ret") {
            let mut expr = None;
            if !self.expect_kind(TokenKind::Semi) {
                expr = Some(self.parse_initial_expression()?);
                if !self.expect_kind(TokenKind::Semi) {
                    return Err(self.fail("expected ';'"));
                }
            }
            return Ok(Stmt::new(self.since(start), StmtKind::Ret(expr)));
        }

        if self.expect_keyword("if") {
            let cond = self.parse_initial_expression()?;
            let then = Box::new(self.parse_initial_statement()?);

            let mut els = None;
            if self.expect_keyword("else") {
                els = Some(Box::new(self.parse_initial_statement()?));
            }

            return Ok(Stmt::new(self.since(start), StmtKind::If { cond, then, els }));
        }

        if self.expect_keyword("while") {
            let cond = self.parse_initial_expression()?;

            let mut body = None;
            if !self.match_kind(TokenKind::Semi) {
                body = Some(Box::new(self.parse_initial_statement()?));
            }

            return Ok(Stmt::new(self.since(start), StmtKind::While { cond, body }));
        }

        let expr = self.parse_initial_expression()?;
        Ok(Stmt::new(expr.span, StmtKind::Expr(expr)))
    }

    // ---- expressions -------------------------------------------------

    fn parse_initial_expression(&mut self) -> Result<Expr, CompileError> {
        self.parse_binary_expression(1)
    }

    /// Precedence climbing. Operators below `min_prec` are left for the
    /// caller; assignment re-enters at its own precedence so it nests to
    /// the right.
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expr, CompileError> {
        let mut lhs = self.parse_prefix_expression()?;

        while let Some((op, prec)) = binary_oper(self.last.kind) {
            if prec < min_prec {
                break;
            }
            self.next();

            let next_min = if op.is_assignment() { prec } else { prec + 1 };
            let rhs = self.parse_binary_expression(next_min)?;

            let span = SourceSpan::new(lhs.span.start, rhs.span.end.max(lhs.span.start));
            let void = TypeUse::new(self.unit.types.void());
            lhs = Expr::new(
                span,
                void,
                ExprKind::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) },
            );
        }

        Ok(lhs)
    }

    fn parse_prefix_expression(&mut self) -> Result<Expr, CompileError> {
        let start = self.loc();
        if let Some(op) = unary_oper(self.last.kind) {
            self.next();
            let expr = self.parse_prefix_expression()?;
            let span = SourceSpan::new(start, expr.span.end.max(start));
            let void = TypeUse::new(self.unit.types.void());
            return Ok(Expr::new(
                span,
                void,
                ExprKind::Unary { op, prefix: true, expr: Box::new(expr) },
            ));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expr, CompileError> {
        let mut base = self.parse_primary_expression()?;

        loop {
            let start = base.span.start;
            if self.expect_kind(TokenKind::OpenParen) {
                let mut args = Vec::new();
                while !self.expect_kind(TokenKind::CloseParen) {
                    args.push(self.parse_initial_expression()?);
                    if self.expect_kind(TokenKind::CloseParen) {
                        break;
                    }
                    if !self.expect_kind(TokenKind::Comma) {
                        return Err(self.fail("expected ','"));
                    }
                }
                let void = TypeUse::new(self.unit.types.void());
                base = Expr::new(
                    self.since(start),
                    void,
                    ExprKind::Call { callee: Box::new(base), args },
                );
            } else if self.expect_kind(TokenKind::OpenBrack) {
                let index = self.parse_initial_expression()?;
                if !self.expect_kind(TokenKind::CloseBrack) {
                    return Err(self.fail("expected ']'"));
                }
                let void = TypeUse::new(self.unit.types.void());
                base = Expr::new(
                    self.since(start),
                    void,
                    ExprKind::Subscript { base: Box::new(base), index: Box::new(index) },
                );
            } else if self.expect_kind(TokenKind::Dot) {
                if !self.match_kind(TokenKind::Identifier) {
                    return Err(self.fail("expected field name after '.'"));
                }
                let name = self.last.value.clone();
                self.next();
                let void = TypeUse::new(self.unit.types.void());
                base = Expr::new(
                    self.since(start),
                    void,
                    ExprKind::Access { base: Box::new(base), name, field: None },
                );
            } else if self.match_kind(TokenKind::PlusPlus) || self.match_kind(TokenKind::MinusMinus)
            {
                let op = if self.match_kind(TokenKind::PlusPlus) { UnaryOp::Inc } else { UnaryOp::Dec };
                self.next();
                let void = TypeUse::new(self.unit.types.void());
                base = Expr::new(
                    self.since(start),
                    void,
                    ExprKind::Unary { op, prefix: false, expr: Box::new(base) },
                );
            } else {
                break;
            }
        }

        Ok(base)
    }

    fn parse_primary_expression(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();

        match self.last.kind {
            TokenKind::Integer => {
                let value: i64 = match self.last.value.parse() {
                    Ok(value) => value,
                    Err(_) => {
                        self.diags.error_at("integer literal out of range", loc);
                        0
                    }
                };
                self.next();
                let ty = TypeUse::new(self.unit.types.builtin(Builtin::S64));
                Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Integer(value)))
            }
            TokenKind::Float => {
                let value: f64 = self.last.value.parse().unwrap_or(0.0);
                self.next();
                let ty = TypeUse::new(self.unit.types.builtin(Builtin::F64));
                Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Float(value)))
            }
            TokenKind::Character => {
                let byte = self.last.value.bytes().next().unwrap_or(0);
                self.next();
                let ty = TypeUse::new(self.unit.types.builtin(Builtin::Char));
                Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Char(byte)))
            }
            TokenKind::String => {
                let bytes = self.last.value.clone().into_bytes();
                self.next();
                let ch = TypeUse::new(self.unit.types.builtin(Builtin::Char));
                let ty = TypeUse::new(self.unit.types.pointer(ch));
                Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Str(bytes)))
            }
            TokenKind::OpenParen => {
                self.next();
                let inner = self.parse_initial_expression()?;
                if !self.expect_kind(TokenKind::CloseParen) {
                    return Err(self.fail("expected ')'"));
                }
                let ty = inner.ty;
                Ok(Expr::new(self.since(loc), ty, ExprKind::Paren(Box::new(inner))))
            }
            TokenKind::Identifier => self.parse_identifier_expression(),
            _ => Err(self.fail("expected expression")),
        }
    }

    fn parse_identifier_expression(&mut self) -> Result<Expr, CompileError> {
        let loc = self.loc();

        if self.expect_keyword("true") {
            let ty = TypeUse::new(self.unit.types.bool());
            return Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Bool(true)));
        }
        if self.expect_keyword("false") {
            let ty = TypeUse::new(self.unit.types.bool());
            return Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Bool(false)));
        }
        if self.expect_keyword("null") {
            let void = TypeUse::new(self.unit.types.void());
            let ty = TypeUse::new(self.unit.types.pointer(void));
            return Ok(Expr::new(SourceSpan::from(loc), ty, ExprKind::Null));
        }
        if self.expect_keyword("cast") {
            return self.parse_type_cast(loc);
        }
        if self.expect_keyword("sizeof") {
            return self.parse_sizeof_operator(loc);
        }

        let name = self.last.value.clone();
        self.next();
        let void = TypeUse::new(self.unit.types.void());
        Ok(Expr::new(SourceSpan::from(loc), void, ExprKind::DeclRef { name, decl: None }))
    }

    /// `cast<Type>(expr)`
    fn parse_type_cast(&mut self, start: SourceLocation) -> Result<Expr, CompileError> {
        if !self.expect_kind(TokenKind::Left) {
            return Err(self.fail("expected '<' after 'cast'"));
        }
        let target = self.parse_type()?;
        if !self.expect_kind(TokenKind::Right) {
            return Err(self.fail("expected '>'"));
        }
        if !self.expect_kind(TokenKind::OpenParen) {
            return Err(self.fail("expected '('"));
        }
        let expr = self.parse_initial_expression()?;
        if !self.expect_kind(TokenKind::CloseParen) {
            return Err(self.fail("expected ')'"));
        }

        Ok(Expr::new(
            self.since(start),
            target,
            ExprKind::Cast { expr: Box::new(expr), target },
        ))
    }

    /// `sizeof<Type>`
    fn parse_sizeof_operator(&mut self, start: SourceLocation) -> Result<Expr, CompileError> {
        if !self.expect_kind(TokenKind::Left) {
            return Err(self.fail("expected '<' after 'sizeof'"));
        }
        let target = self.parse_type()?;
        if !self.expect_kind(TokenKind::Right) {
            return Err(self.fail("expected '>'"));
        }

        let ty = TypeUse::new(self.unit.types.builtin(Builtin::U64));
        Ok(Expr::new(self.since(start), ty, ExprKind::Sizeof(target)))
    }
}
