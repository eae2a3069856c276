//! Abstract syntax tree
//!
//! Three disjoint layers — declarations, statements, expressions — each
//! carrying a source span. Declarations live in an arena owned by the
//! [`TranslationUnit`] and are referred to by [`DeclId`]; statements and
//! expressions are plain owned trees inside their declaration.
//! Back-references from expressions to declarations (`DeclRef`, resolved
//! `Access` fields) are non-owning ids bound by symbol analysis.

use std::path::{Path, PathBuf};

use crate::scope::{Scope, ScopeId};
use crate::source::SourceSpan;
use crate::types::{TypeId, TypeInterner, TypeUse};

/// Handle to a declaration in a unit's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId(pub(crate) u32);

/// A decorator attached to a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rune {
    Public,
    Private,
    Intrinsic,
    Abort,
    Unreachable,
}

impl Rune {
    pub fn from_name(name: &str) -> Option<Rune> {
        match name {
            "public" => Some(Rune::Public),
            "private" => Some(Rune::Private),
            "intrinsic" => Some(Rune::Intrinsic),
            "abort" => Some(Rune::Abort),
            "unreachable" => Some(Rune::Unreachable),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Rune::Public => "public",
            Rune::Private => "private",
            Rune::Intrinsic => "intrinsic",
            Rune::Abort => "abort",
            Rune::Unreachable => "unreachable",
        }
    }
}

/// A declaration. Nested declarations (parameters, fields, variants,
/// locals) live in the same arena as their parent.
#[derive(Debug)]
pub enum Decl {
    Variable {
        span: SourceSpan,
        name: String,
        runes: Vec<Rune>,
        ty: TypeUse,
        init: Option<Expr>,
        /// True for unit-level variables, false for `let` locals.
        global: bool,
    },
    Parameter {
        span: SourceSpan,
        name: String,
        ty: TypeUse,
    },
    Function {
        span: SourceSpan,
        name: String,
        runes: Vec<Rune>,
        /// The function's type; always `Type::Function`.
        ty: TypeUse,
        scope: ScopeId,
        params: Vec<DeclId>,
        body: Option<Stmt>,
    },
    Field {
        span: SourceSpan,
        name: String,
        ty: TypeUse,
    },
    Variant {
        span: SourceSpan,
        name: String,
        /// The enclosing enum's type.
        ty: TypeUse,
        value: i64,
    },
    Alias {
        span: SourceSpan,
        name: String,
        /// The alias type itself; its underlying type lives in the
        /// interner entry.
        ty: TypeUse,
    },
    Struct {
        span: SourceSpan,
        name: String,
        ty: TypeUse,
        fields: Vec<DeclId>,
    },
    Enum {
        span: SourceSpan,
        name: String,
        ty: TypeUse,
        underlying: TypeUse,
        variants: Vec<DeclId>,
    },
    Load {
        span: SourceSpan,
        path: String,
    },
}

impl Decl {
    pub fn span(&self) -> SourceSpan {
        match self {
            Decl::Variable { span, .. }
            | Decl::Parameter { span, .. }
            | Decl::Function { span, .. }
            | Decl::Field { span, .. }
            | Decl::Variant { span, .. }
            | Decl::Alias { span, .. }
            | Decl::Struct { span, .. }
            | Decl::Enum { span, .. }
            | Decl::Load { span, .. } => *span,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Decl::Variable { name, .. }
            | Decl::Parameter { name, .. }
            | Decl::Function { name, .. }
            | Decl::Field { name, .. }
            | Decl::Variant { name, .. }
            | Decl::Alias { name, .. }
            | Decl::Struct { name, .. }
            | Decl::Enum { name, .. } => Some(name),
            Decl::Load { .. } => None,
        }
    }

    /// Declarations that name a type.
    pub fn is_type_decl(&self) -> bool {
        matches!(self, Decl::Alias { .. } | Decl::Struct { .. } | Decl::Enum { .. })
    }

    /// Declarations that name a runtime value.
    pub fn is_value_decl(&self) -> bool {
        matches!(
            self,
            Decl::Variable { .. }
                | Decl::Parameter { .. }
                | Decl::Function { .. }
                | Decl::Variant { .. }
        )
    }

    /// The type a reference to this declaration has, for value
    /// declarations.
    pub fn value_type(&self) -> Option<TypeUse> {
        match self {
            Decl::Variable { ty, .. }
            | Decl::Parameter { ty, .. }
            | Decl::Function { ty, .. }
            | Decl::Variant { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    /// The type this declaration introduces, for type declarations.
    pub fn declared_type(&self) -> Option<TypeUse> {
        match self {
            Decl::Alias { ty, .. } | Decl::Struct { ty, .. } | Decl::Enum { ty, .. } => Some(*ty),
            _ => None,
        }
    }

    pub fn runes(&self) -> &[Rune] {
        match self {
            Decl::Variable { runes, .. } | Decl::Function { runes, .. } => runes,
            _ => &[],
        }
    }
}

/// Binary operators, assignment forms included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    RemAssign,
    AndAssign,
    OrAssign,
    XorAssign,
    ShlAssign,
    ShrAssign,
    LogicOr,
    LogicAnd,
    Or,
    Xor,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign
                | BinaryOp::SubAssign
                | BinaryOp::MulAssign
                | BinaryOp::DivAssign
                | BinaryOp::RemAssign
                | BinaryOp::AndAssign
                | BinaryOp::OrAssign
                | BinaryOp::XorAssign
                | BinaryOp::ShlAssign
                | BinaryOp::ShrAssign
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LogicOr | BinaryOp::LogicAnd)
    }
}

/// Unary operators. `prefix` on the expression distinguishes `++x` from
/// `x++`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `!`
    Not,
    /// `~`
    BitNot,
    /// `-`
    Neg,
    /// `&`
    AddrOf,
    /// `*`
    Deref,
    /// `++`
    Inc,
    /// `--`
    Dec,
}

/// An expression with its span and checked type.
#[derive(Debug)]
pub struct Expr {
    pub span: SourceSpan,
    pub ty: TypeUse,
    pub kind: ExprKind,
}

#[derive(Debug)]
pub enum ExprKind {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Char(u8),
    Str(Vec<u8>),
    Null,
    Binary { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOp, prefix: bool, expr: Box<Expr> },
    Cast { expr: Box<Expr>, target: TypeUse },
    Paren(Box<Expr>),
    Sizeof(TypeUse),
    DeclRef { name: String, decl: Option<DeclId> },
    Access { base: Box<Expr>, name: String, field: Option<(DeclId, u32)> },
    Subscript { base: Box<Expr>, index: Box<Expr> },
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

impl Expr {
    pub fn new(span: SourceSpan, ty: TypeUse, kind: ExprKind) -> Self {
        Expr { span, ty, kind }
    }

    /// Wrap this expression in an implicit cast to `target`, in place.
    pub fn wrap_in_cast(&mut self, target: TypeUse) {
        let span = self.span;
        let placeholder = Expr::new(span, target, ExprKind::Null);
        let inner = std::mem::replace(self, placeholder);
        *self = Expr::new(
            span,
            target,
            ExprKind::Cast { expr: Box::new(inner), target },
        );
    }
}

/// A statement with its span.
#[derive(Debug)]
pub struct Stmt {
    pub span: SourceSpan,
    pub kind: StmtKind,
}

#[derive(Debug)]
pub enum StmtKind {
    Block { scope: ScopeId, stmts: Vec<Stmt> },
    Decl(DeclId),
    Ret(Option<Expr>),
    If { cond: Expr, then: Box<Stmt>, els: Option<Box<Stmt>> },
    While { cond: Expr, body: Option<Box<Stmt>> },
    Break,
    Continue,
    /// Inline assembly: a template string plus its input expressions.
    Asm { template: String, args: Vec<Expr> },
    Expr(Expr),
}

impl Stmt {
    pub fn new(span: SourceSpan, kind: StmtKind) -> Self {
        Stmt { span, kind }
    }
}

/// A reference to a not-yet-resolved type name, recorded by the parser
/// for symbol analysis.
#[derive(Debug, Clone)]
pub struct DeferredRef {
    pub name: String,
    pub ty: TypeId,
    pub span: SourceSpan,
}

/// One source file parsed to a self-contained tree: the declaration
/// arena, the scope arena, the type interner, and the top-level
/// declaration order.
#[derive(Debug)]
pub struct TranslationUnit {
    file: PathBuf,
    pub types: TypeInterner,
    decls: Vec<Decl>,
    scopes: Vec<Scope>,
    root: ScopeId,
    top: Vec<DeclId>,
    pub(crate) deferred: Vec<DeferredRef>,
}

impl TranslationUnit {
    pub fn new(file: &Path) -> Self {
        TranslationUnit {
            file: file.to_path_buf(),
            types: TypeInterner::new(),
            decls: Vec::new(),
            scopes: vec![Scope::new(None)],
            root: ScopeId(0),
            top: Vec::new(),
            deferred: Vec::new(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn root_scope(&self) -> ScopeId {
        self.root
    }

    // ---- declarations ------------------------------------------------

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        let id = DeclId(self.decls.len() as u32);
        self.decls.push(decl);
        id
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    pub fn push_top(&mut self, id: DeclId) {
        self.top.push(id);
    }

    pub fn top_decls(&self) -> &[DeclId] {
        &self.top
    }

    // ---- scopes ------------------------------------------------------

    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(parent)));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Insert `decl` under `name` in `scope`. Fails when the name is
    /// already bound in that same node; shadowing across nodes is fine.
    pub fn declare(&mut self, scope: ScopeId, name: &str, decl: DeclId) -> Result<(), DeclId> {
        let node = &mut self.scopes[scope.0 as usize];
        if let Some(&existing) = node.symbols.get(name) {
            return Err(existing);
        }
        node.symbols.insert(name.to_string(), decl);
        Ok(())
    }

    /// Find `name` starting at `scope` and walking up to the root.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<DeclId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let node = self.scope(id);
            if let Some(decl) = node.local(name) {
                return Some(decl);
            }
            current = node.parent();
        }
        None
    }

    // ---- deferred type references -----------------------------------

    pub fn record_deferred(&mut self, name: &str, ty: TypeId, span: SourceSpan) {
        self.deferred.push(DeferredRef { name: name.to_string(), ty, span });
    }

    /// Take a function body out of the arena for a pass to walk; put it
    /// back with [`TranslationUnit::restore_body`].
    pub fn take_body(&mut self, id: DeclId) -> Option<Stmt> {
        match self.decl_mut(id) {
            Decl::Function { body, .. } => body.take(),
            _ => None,
        }
    }

    pub fn restore_body(&mut self, id: DeclId, stmt: Option<Stmt>) {
        if let Decl::Function { body, .. } = self.decl_mut(id) {
            *body = stmt;
        }
    }

    /// Take a variable initializer out of the arena, as with
    /// [`TranslationUnit::take_body`].
    pub fn take_init(&mut self, id: DeclId) -> Option<Expr> {
        match self.decl_mut(id) {
            Decl::Variable { init, .. } => init.take(),
            _ => None,
        }
    }

    pub fn restore_init(&mut self, id: DeclId, expr: Option<Expr>) {
        if let Decl::Variable { init, .. } = self.decl_mut(id) {
            *init = expr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceLocation;
    use crate::types::Builtin;

    fn span() -> SourceSpan {
        SourceSpan::from(SourceLocation::default())
    }

    #[test]
    fn test_scope_lookup_walks_upward() {
        let mut unit = TranslationUnit::new(Path::new("test"));
        let s64 = TypeUse::new(unit.types.builtin(Builtin::S64));

        let outer = unit.root_scope();
        let inner = unit.new_scope(outer);

        let var = unit.add_decl(Decl::Variable {
            span: span(),
            name: "x".to_string(),
            runes: Vec::new(),
            ty: s64,
            init: None,
            global: true,
        });
        unit.declare(outer, "x", var).unwrap();

        assert_eq!(unit.lookup(inner, "x"), Some(var));
        assert_eq!(unit.lookup(outer, "x"), Some(var));
        assert_eq!(unit.lookup(inner, "y"), None);
    }

    #[test]
    fn test_same_node_duplicates_are_rejected() {
        let mut unit = TranslationUnit::new(Path::new("test"));
        let s64 = TypeUse::new(unit.types.builtin(Builtin::S64));
        let root = unit.root_scope();

        let make = |unit: &mut TranslationUnit| {
            unit.add_decl(Decl::Variable {
                span: span(),
                name: "x".to_string(),
                runes: Vec::new(),
                ty: s64,
                init: None,
                global: true,
            })
        };

        let first = make(&mut unit);
        let second = make(&mut unit);
        assert!(unit.declare(root, "x", first).is_ok());
        assert_eq!(unit.declare(root, "x", second), Err(first));

        // Shadowing in a child node is allowed.
        let child = unit.new_scope(root);
        assert!(unit.declare(child, "x", second).is_ok());
        assert_eq!(unit.lookup(child, "x"), Some(second));
    }

    #[test]
    fn test_wrap_in_cast_preserves_the_inner_expression() {
        let mut unit = TranslationUnit::new(Path::new("test"));
        let s32 = TypeUse::new(unit.types.builtin(Builtin::S32));
        let s64 = TypeUse::new(unit.types.builtin(Builtin::S64));

        let mut expr = Expr::new(span(), s32, ExprKind::Integer(7));
        expr.wrap_in_cast(s64);

        assert_eq!(expr.ty, s64);
        match &expr.kind {
            ExprKind::Cast { expr: inner, target } => {
                assert_eq!(*target, s64);
                assert!(matches!(inner.kind, ExprKind::Integer(7)));
                assert_eq!(inner.ty, s32);
            }
            _ => panic!("Expected Cast"),
        }
    }
}
