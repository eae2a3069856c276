//! Lexical scopes
//!
//! Scopes form a tree linked to the syntax tree. Each node maps names to
//! declarations; lookup walks parent links up to the unit's root scope.
//! The nodes live in an arena on the translation unit, so a scope id
//! stays valid for the unit's lifetime.

use std::collections::HashMap;

use crate::ast::DeclId;

/// Handle to a scope in a unit's scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub(crate) u32);

/// A node in the scope tree.
#[derive(Debug, Default)]
pub struct Scope {
    pub(crate) parent: Option<ScopeId>,
    pub(crate) symbols: HashMap<String, DeclId>,
}

impl Scope {
    pub(crate) fn new(parent: Option<ScopeId>) -> Self {
        Scope { parent, symbols: HashMap::new() }
    }

    pub fn parent(&self) -> Option<ScopeId> {
        self.parent
    }

    /// The declaration `name` binds in this node alone.
    pub fn local(&self, name: &str) -> Option<DeclId> {
        self.symbols.get(name).copied()
    }
}
