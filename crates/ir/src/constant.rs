//! Pooled constants
//!
//! Constants are uniqued per graph: integers by (width, value), floats by
//! (width, bit pattern), nulls by type, strings by bytes, and block
//! addresses by block. Equal payloads return the same value id within one
//! [`Cfg`]. Aggregates are freshly allocated.

use std::collections::HashMap;

use crate::cfg::Cfg;
use crate::function::BlockId;
use crate::types::{TypeId, TypeInterner};
use crate::value::{ValueData, ValueId, ValueKind};

/// Per-graph constant storage. The `i1` zero and one are seeded at graph
/// construction since boolean results are made constantly.
#[derive(Debug, Default)]
pub(crate) struct ConstantPool {
    pub(crate) zero: Option<ValueId>,
    pub(crate) one: Option<ValueId>,
    ints: HashMap<(u32, i64), ValueId>,
    floats: HashMap<(u32, u64), ValueId>,
    nulls: HashMap<TypeId, ValueId>,
    strings: HashMap<Vec<u8>, ValueId>,
    addresses: HashMap<BlockId, ValueId>,
}

impl ConstantPool {
    pub(crate) fn seed(&mut self, types: &mut TypeInterner, values: &mut Vec<ValueData>) {
        let i1 = types.int(1);

        let zero = ValueId(values.len() as u32);
        values.push(ValueData::new(i1, ValueKind::Integer(0)));
        let one = ValueId(values.len() as u32);
        values.push(ValueData::new(i1, ValueKind::Integer(1)));

        self.zero = Some(zero);
        self.one = Some(one);
        self.ints.insert((1, 0), zero);
        self.ints.insert((1, 1), one);
    }
}

impl Cfg {
    /// The `i1` true constant.
    pub fn true_const(&self) -> ValueId {
        self.constants.one.expect("constant pool not seeded")
    }

    /// The `i1` false constant.
    pub fn false_const(&self) -> ValueId {
        self.constants.zero.expect("constant pool not seeded")
    }

    /// Get the pooled integer constant of `ty` with `value`.
    pub fn int_const(&mut self, ty: TypeId, value: i64) -> ValueId {
        let width = self.types.width(ty);
        debug_assert!(self.types.is_integer(ty), "integer constant needs an integer type");

        if width == 1 {
            return if value == 0 { self.false_const() } else { self.true_const() };
        }

        if let Some(&id) = self.constants.ints.get(&(width, value)) {
            return id;
        }

        let id = self.new_value(ty, ValueKind::Integer(value));
        self.constants.ints.insert((width, value), id);
        id
    }

    /// Get the pooled float constant of `ty` with `value`. Keyed by bit
    /// pattern, so `-0.0` and `0.0` stay distinct and NaN pools.
    pub fn float_const(&mut self, ty: TypeId, value: f64) -> ValueId {
        let width = self.types.width(ty);
        debug_assert!(self.types.is_float(ty), "float constant needs a float type");

        let bits = value.to_bits();
        if let Some(&id) = self.constants.floats.get(&(width, bits)) {
            return id;
        }

        let id = self.new_value(ty, ValueKind::Float(bits));
        self.constants.floats.insert((width, bits), id);
        id
    }

    /// Get the pooled null constant for the pointer type `ty`.
    pub fn null_const(&mut self, ty: TypeId) -> ValueId {
        if let Some(&id) = self.constants.nulls.get(&ty) {
            return id;
        }

        let id = self.new_value(ty, ValueKind::Null);
        self.constants.nulls.insert(ty, id);
        id
    }

    /// Get the pooled string constant for `bytes`. Typed as an array of
    /// `i8` including the trailing NUL.
    pub fn string_const(&mut self, bytes: &[u8]) -> ValueId {
        if let Some(&id) = self.constants.strings.get(bytes) {
            return id;
        }

        let i8 = self.types.int(8);
        let ty = self.types.array(i8, bytes.len() as u32 + 1);
        let id = self.new_value(ty, ValueKind::Str(bytes.to_vec()));
        self.constants.strings.insert(bytes.to_vec(), id);
        id
    }

    /// Get the pooled address constant for `block`, typed `*void`.
    pub fn block_address(&mut self, block: BlockId) -> ValueId {
        if let Some(&id) = self.constants.addresses.get(&block) {
            return id;
        }

        let void = self.types.void();
        let ty = self.types.pointer(void);
        let id = self.new_value(ty, ValueKind::BlockAddress(block));
        self.constants.addresses.insert(block, id);
        id
    }

    /// Create a fresh aggregate constant of `ty` over `values`. Unlike
    /// the scalar constants, aggregates are not pooled.
    pub fn aggregate_const(&mut self, ty: TypeId, values: &[ValueId]) -> ValueId {
        let id = self.new_value(ty, ValueKind::Aggregate);
        for &value in values {
            self.add_operand(id, value);
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_pool_by_width_and_value() {
        let mut cfg = Cfg::new("test");
        let i32 = cfg.types.int(32);
        let i64 = cfg.types.int(64);

        assert_eq!(cfg.int_const(i32, 42), cfg.int_const(i32, 42));
        assert_ne!(cfg.int_const(i32, 42), cfg.int_const(i64, 42));
        assert_ne!(cfg.int_const(i32, 42), cfg.int_const(i32, 43));
    }

    #[test]
    fn test_i1_constants_are_the_seeded_pair() {
        let mut cfg = Cfg::new("test");
        let i1 = cfg.types.int(1);

        assert_eq!(cfg.int_const(i1, 0), cfg.false_const());
        assert_eq!(cfg.int_const(i1, 1), cfg.true_const());
        assert_eq!(cfg.int_const(i1, 5), cfg.true_const());
    }

    #[test]
    fn test_floats_pool_by_bit_pattern() {
        let mut cfg = Cfg::new("test");
        let f64 = cfg.types.float(64);

        assert_eq!(cfg.float_const(f64, 1.5), cfg.float_const(f64, 1.5));
        assert_ne!(cfg.float_const(f64, 0.0), cfg.float_const(f64, -0.0));
        assert_eq!(cfg.float_const(f64, f64::NAN), cfg.float_const(f64, f64::NAN));
    }

    #[test]
    fn test_nulls_pool_by_type() {
        let mut cfg = Cfg::new("test");
        let i8 = cfg.types.int(8);
        let i32 = cfg.types.int(32);
        let p8 = cfg.types.pointer(i8);
        let p32 = cfg.types.pointer(i32);

        assert_eq!(cfg.null_const(p8), cfg.null_const(p8));
        assert_ne!(cfg.null_const(p8), cfg.null_const(p32));
    }

    #[test]
    fn test_strings_pool_by_bytes() {
        let mut cfg = Cfg::new("test");
        assert_eq!(cfg.string_const(b"hello"), cfg.string_const(b"hello"));
        assert_ne!(cfg.string_const(b"hello"), cfg.string_const(b"world"));
    }

    #[test]
    fn test_block_addresses_pool_by_block() {
        let mut cfg = Cfg::new("test");
        let void = cfg.types.void();
        let fty = cfg.types.function(void, vec![]);
        let function = cfg.add_function("f", fty, &[]).unwrap();
        let first = cfg.add_block(function);
        let second = cfg.add_block(function);

        assert_eq!(cfg.block_address(first), cfg.block_address(first));
        assert_ne!(cfg.block_address(first), cfg.block_address(second));
    }

    #[test]
    fn test_aggregates_are_fresh() {
        let mut cfg = Cfg::new("test");
        let i32 = cfg.types.int(32);
        let ty = cfg.types.array(i32, 2);
        let a = cfg.int_const(i32, 1);
        let b = cfg.int_const(i32, 2);

        let first = cfg.aggregate_const(ty, &[a, b]);
        let second = cfg.aggregate_const(ty, &[a, b]);
        assert_ne!(first, second);
        assert_eq!(cfg.value(first).num_operands(), 2);
        assert_eq!(cfg.value(a).num_uses(), 2);
    }
}
