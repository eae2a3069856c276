//! Frontend type system
//!
//! Types are pooled per translation unit in a [`TypeInterner`]; handles
//! are [`TypeId`]s with structural identity, so two references to the
//! same type compare equal within one unit. A [`TypeUse`] pairs a type
//! with its qualifier bits (currently just `mut`).
//!
//! Names that are not yet known to be types parse into [`Type::Deferred`]
//! placeholders; symbol analysis binds them to their underlying type
//! later.

use std::collections::HashMap;

use crate::ast::DeclId;

/// Handle to an interned type, meaningful only inside its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

/// A use of a type together with qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeUse {
    pub ty: TypeId,
    pub mutable: bool,
}

impl TypeUse {
    pub fn new(ty: TypeId) -> Self {
        TypeUse { ty, mutable: false }
    }

    pub fn mutable(ty: TypeId) -> Self {
        TypeUse { ty, mutable: true }
    }

    pub fn is_mut(&self) -> bool {
        self.mutable
    }

    /// The same type without qualifiers.
    pub fn stripped(&self) -> Self {
        TypeUse { ty: self.ty, mutable: false }
    }
}

/// The builtin scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Void,
    Bool,
    Char,
    S8,
    S16,
    S32,
    S64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl Builtin {
    pub const ALL: [Builtin; 13] = [
        Builtin::Void,
        Builtin::Bool,
        Builtin::Char,
        Builtin::S8,
        Builtin::S16,
        Builtin::S32,
        Builtin::S64,
        Builtin::U8,
        Builtin::U16,
        Builtin::U32,
        Builtin::U64,
        Builtin::F32,
        Builtin::F64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Void => "void",
            Builtin::Bool => "bool",
            Builtin::Char => "char",
            Builtin::S8 => "s8",
            Builtin::S16 => "s16",
            Builtin::S32 => "s32",
            Builtin::S64 => "s64",
            Builtin::U8 => "u8",
            Builtin::U16 => "u16",
            Builtin::U32 => "u32",
            Builtin::U64 => "u64",
            Builtin::F32 => "f32",
            Builtin::F64 => "f64",
        }
    }

    pub fn from_name(name: &str) -> Option<Builtin> {
        Builtin::ALL.iter().copied().find(|b| b.name() == name)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Builtin::S8 | Builtin::S16 | Builtin::S32 | Builtin::S64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Builtin::U8 | Builtin::U16 | Builtin::U32 | Builtin::U64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub fn is_float(self) -> bool {
        matches!(self, Builtin::F32 | Builtin::F64)
    }

    /// Bit width of the scalar; bool is 1, void is 0.
    pub fn width(self) -> u32 {
        match self {
            Builtin::Void => 0,
            Builtin::Bool => 1,
            Builtin::Char | Builtin::S8 | Builtin::U8 => 8,
            Builtin::S16 | Builtin::U16 => 16,
            Builtin::S32 | Builtin::U32 | Builtin::F32 => 32,
            Builtin::S64 | Builtin::U64 | Builtin::F64 => 64,
        }
    }
}

/// A type in a translation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Builtin(Builtin),
    Pointer(TypeUse),
    Array { element: TypeUse, size: u32 },
    Function { ret: TypeUse, params: Vec<TypeUse> },
    Struct { name: String, decl: DeclId },
    Enum { name: String, underlying: TypeUse, decl: DeclId },
    Alias { name: String, decl: DeclId, underlying: TypeUse },
    /// A name not yet known to be a type. Bound by symbol analysis.
    Deferred(String),
}

/// Pools every type of one translation unit.
#[derive(Debug)]
pub struct TypeInterner {
    types: Vec<Type>,
    lookup: HashMap<Type, TypeId>,
    builtins: [TypeId; 13],
    /// Underlying types for resolved deferred references.
    resolutions: HashMap<TypeId, TypeUse>,
}

impl TypeInterner {
    pub fn new() -> Self {
        let mut interner = TypeInterner {
            types: Vec::new(),
            lookup: HashMap::new(),
            builtins: [TypeId(0); 13],
            resolutions: HashMap::new(),
        };

        for (index, builtin) in Builtin::ALL.into_iter().enumerate() {
            interner.builtins[index] = interner.intern(Type::Builtin(builtin));
        }

        interner
    }

    fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.lookup.get(&ty) {
            return id;
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.lookup.insert(ty, id);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    pub fn builtin(&self, builtin: Builtin) -> TypeId {
        self.builtins[Builtin::ALL.iter().position(|&b| b == builtin).unwrap()]
    }

    pub fn void(&self) -> TypeId {
        self.builtin(Builtin::Void)
    }

    pub fn bool(&self) -> TypeId {
        self.builtin(Builtin::Bool)
    }

    pub fn pointer(&mut self, pointee: TypeUse) -> TypeId {
        self.intern(Type::Pointer(pointee))
    }

    pub fn array(&mut self, element: TypeUse, size: u32) -> TypeId {
        self.intern(Type::Array { element, size })
    }

    pub fn function(&mut self, ret: TypeUse, params: Vec<TypeUse>) -> TypeId {
        self.intern(Type::Function { ret, params })
    }

    pub fn struct_type(&mut self, name: &str, decl: DeclId) -> TypeId {
        self.intern(Type::Struct { name: name.to_string(), decl })
    }

    pub fn enum_type(&mut self, name: &str, underlying: TypeUse, decl: DeclId) -> TypeId {
        self.intern(Type::Enum { name: name.to_string(), underlying, decl })
    }

    pub fn alias_type(&mut self, name: &str, decl: DeclId, underlying: TypeUse) -> TypeId {
        self.intern(Type::Alias { name: name.to_string(), decl, underlying })
    }

    /// The deferred placeholder for `name`; one per name per unit.
    pub fn deferred(&mut self, name: &str) -> TypeId {
        self.intern(Type::Deferred(name.to_string()))
    }

    /// Bind a deferred placeholder to its underlying type.
    pub fn resolve_deferred(&mut self, id: TypeId, underlying: TypeUse) {
        debug_assert!(matches!(self.get(id), Type::Deferred(_)));
        self.resolutions.insert(id, underlying);
    }

    /// The resolved underlying type of a deferred placeholder, if bound.
    pub fn resolution(&self, id: TypeId) -> Option<TypeUse> {
        self.resolutions.get(&id).copied()
    }

    /// See through resolved deferred references and aliases to the type
    /// that governs checking.
    pub fn canonical(&self, id: TypeId) -> TypeId {
        match self.get(id) {
            Type::Deferred(_) => match self.resolution(id) {
                Some(underlying) => self.canonical(underlying.ty),
                None => id,
            },
            Type::Alias { underlying, .. } => self.canonical(underlying.ty),
            _ => id,
        }
    }

    pub fn as_builtin(&self, id: TypeId) -> Option<Builtin> {
        match self.get(self.canonical(id)) {
            Type::Builtin(builtin) => Some(*builtin),
            _ => None,
        }
    }

    pub fn is_void(&self, id: TypeId) -> bool {
        self.as_builtin(id) == Some(Builtin::Void)
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        self.as_builtin(id) == Some(Builtin::Bool)
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        self.as_builtin(id).is_some_and(|b| b.is_integer())
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        self.as_builtin(id).is_some_and(|b| b.is_float())
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_integer(id) || self.is_float(id)
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(self.canonical(id)), Type::Pointer(_))
    }

    pub fn pointee(&self, id: TypeId) -> Option<TypeUse> {
        match self.get(self.canonical(id)) {
            Type::Pointer(pointee) => Some(*pointee),
            _ => None,
        }
    }

    /// The struct declaration behind `id`, seeing through pointers one
    /// level deep is the caller's business; this only unwraps names.
    pub fn as_struct(&self, id: TypeId) -> Option<DeclId> {
        match self.get(self.canonical(id)) {
            Type::Struct { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    pub fn as_function(&self, id: TypeId) -> Option<(TypeUse, &[TypeUse])> {
        match self.get(self.canonical(id)) {
            Type::Function { ret, params } => Some((*ret, params.as_slice())),
            _ => None,
        }
    }

    /// Render a qualified type in surface syntax, e.g. `mut *mut void`.
    pub fn display(&self, use_: TypeUse) -> String {
        let inner = self.display_type(use_.ty);
        if use_.mutable { format!("mut {}", inner) } else { inner }
    }

    pub fn display_type(&self, id: TypeId) -> String {
        match self.get(id) {
            Type::Builtin(builtin) => builtin.name().to_string(),
            Type::Pointer(pointee) => format!("*{}", self.display(*pointee)),
            Type::Array { element, size } => format!("[{}]{}", size, self.display(*element)),
            Type::Function { ret, params } => {
                let params: Vec<String> = params.iter().map(|p| self.display(*p)).collect();
                format!("({}) -> {}", params.join(", "), self.display(*ret))
            }
            Type::Struct { name, .. }
            | Type::Enum { name, .. }
            | Type::Alias { name, .. }
            | Type::Deferred(name) => name.clone(),
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_preinterned() {
        let interner = TypeInterner::new();
        assert_eq!(interner.builtin(Builtin::S64), interner.builtin(Builtin::S64));
        assert_ne!(interner.builtin(Builtin::S64), interner.builtin(Builtin::U64));
        assert!(interner.is_integer(interner.builtin(Builtin::U8)));
        assert!(interner.is_float(interner.builtin(Builtin::F32)));
        assert!(!interner.is_numeric(interner.builtin(Builtin::Bool)));
    }

    #[test]
    fn test_pointers_key_on_qualified_pointee() {
        let mut interner = TypeInterner::new();
        let void = TypeUse::new(interner.void());
        let mut_void = TypeUse::mutable(interner.void());

        let p1 = interner.pointer(void);
        let p2 = interner.pointer(void);
        let p3 = interner.pointer(mut_void);
        assert_eq!(p1, p2);
        assert_ne!(p1, p3, "*void and *mut void are distinct");
    }

    #[test]
    fn test_function_types_dedup_by_signature() {
        let mut interner = TypeInterner::new();
        let s64 = TypeUse::new(interner.builtin(Builtin::S64));
        let ch = TypeUse::new(interner.builtin(Builtin::Char));

        let f1 = interner.function(s64, vec![ch]);
        let f2 = interner.function(s64, vec![ch]);
        let f3 = interner.function(s64, vec![]);
        assert_eq!(f1, f2);
        assert_ne!(f1, f3);
    }

    #[test]
    fn test_qualified_pointer_printing() {
        let mut interner = TypeInterner::new();
        let mut_void = TypeUse::mutable(interner.void());
        let ptr = interner.pointer(mut_void);

        assert_eq!(interner.display(TypeUse::new(ptr)), "*mut void");
        assert_eq!(interner.display(TypeUse::mutable(ptr)), "mut *mut void");
    }

    #[test]
    fn test_deferred_resolution() {
        let mut interner = TypeInterner::new();
        let deferred = interner.deferred("Point");
        assert_eq!(deferred, interner.deferred("Point"), "one placeholder per name");
        assert!(interner.resolution(deferred).is_none());

        let s32 = TypeUse::new(interner.builtin(Builtin::S32));
        interner.resolve_deferred(deferred, s32);
        assert_eq!(interner.resolution(deferred), Some(s32));
        assert_eq!(interner.canonical(deferred), s32.ty);
    }
}
