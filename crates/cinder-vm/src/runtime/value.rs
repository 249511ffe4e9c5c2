// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Cinder value representation.
//!
//! A [`Value`] is a small `Copy` tagged union. Heap data is never owned by a
//! value: object values carry a [`GcRef`] handle into the [`Heap`].

use std::fmt;

use crate::gc::heap::Heap;
use crate::gc::object::{GcRef, Object};

/// A Cinder value.
#[derive(Debug, Clone, Copy, Default)]
pub enum Value {
    /// nil, spelled `null` in source and output
    #[default]
    Nil,
    /// Boolean value
    Bool(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// Handle to a heap object
    Object(GcRef),
}

/// The kind of a [`Value`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// nil
    Nil,
    /// Boolean
    Bool,
    /// Number
    Number,
    /// Heap object reference
    Object,
}

/// An operator was applied to operands it is not defined for.
///
/// The VM turns this into a runtime error carrying the current line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatch(pub &'static str);

impl fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl std::error::Error for TypeMismatch {}

const NUMBER_OPERANDS: TypeMismatch = TypeMismatch("Operands must be numbers.");
const NUMBER_OPERAND: TypeMismatch = TypeMismatch("Operand must be a number.");

/// Equality is structural for immediates and identity for objects.
///
/// Strings are interned, so identity and content equality coincide. `NaN`
/// compares equal to itself here so that equality stays reflexive.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<GcRef> for Value {
    fn from(r: GcRef) -> Self {
        Value::Object(r)
    }
}

impl Value {
    /// Returns the kind tag of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Nil => ValueKind::Nil,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Returns true if this value is of the given kind.
    #[inline]
    pub fn is(&self, kind: ValueKind) -> bool {
        self.kind() == kind
    }

    /// Returns true if this value is nil.
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Returns the number payload, if any.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the object handle, if any.
    #[inline]
    pub fn as_object(&self) -> Option<GcRef> {
        match self {
            Value::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Only nil and `false` are falsy.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Logical not, defined for every value.
    #[inline]
    pub fn logical_not(self) -> Value {
        Value::Bool(!self.is_truthy())
    }

    /// Numeric addition. String concatenation needs the heap and is handled
    /// by the VM before falling back to this.
    #[inline]
    pub fn try_add(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Number(a + b))
    }

    /// Numeric subtraction.
    #[inline]
    pub fn try_sub(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Number(a - b))
    }

    /// Numeric multiplication.
    #[inline]
    pub fn try_mul(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Number(a * b))
    }

    /// Numeric division; division by zero follows IEEE 754.
    #[inline]
    pub fn try_div(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Number(a / b))
    }

    /// Unary minus.
    #[inline]
    pub fn try_negate(self) -> Result<Value, TypeMismatch> {
        match self {
            Value::Number(n) => Ok(Value::Number(-n)),
            _ => Err(NUMBER_OPERAND),
        }
    }

    /// `self < other`
    #[inline]
    pub fn less(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Bool(a < b))
    }

    /// `self <= other`
    #[inline]
    pub fn less_equal(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Bool(a <= b))
    }

    /// `self > other`
    #[inline]
    pub fn greater(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Bool(a > b))
    }

    /// `self >= other`
    #[inline]
    pub fn greater_equal(self, other: Value) -> Result<Value, TypeMismatch> {
        let (a, b) = numbers(self, other)?;
        Ok(Value::Bool(a >= b))
    }

    /// Stricter than `==`: numbers must match bit for bit, so `0` and `-0`
    /// stay distinct constants in a pool.
    pub fn same_constant(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_name(&self, heap: &Heap) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Object(r) => match heap.get(*r) {
                Some(object) => object.kind().name(),
                None => "object",
            },
        }
    }

    /// Returns a displayable view of this value resolved against `heap`.
    pub fn display<'a>(&'a self, heap: &'a Heap) -> ValueDisplay<'a> {
        ValueDisplay { value: self, heap }
    }
}

#[inline]
fn numbers(a: Value, b: Value) -> Result<(f64, f64), TypeMismatch> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => Ok((a, b)),
        _ => Err(NUMBER_OPERANDS),
    }
}

/// Display adapter produced by [`Value::display`].
pub struct ValueDisplay<'a> {
    value: &'a Value,
    heap: &'a Heap,
}

impl fmt::Display for ValueDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Nil => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write_number(f, *n),
            Value::Object(r) => match self.heap.get(*r) {
                Some(Object::String(s)) => write!(f, "{}", s.as_str()),
                Some(Object::Function(func)) => match func.name.and_then(|n| self.heap.as_string(n)) {
                    Some(name) => write!(f, "<fn {}>", name.as_str()),
                    None => write!(f, "<script>"),
                },
                Some(Object::NativeFunction(native)) => write!(f, "<native fn {}>", native.name),
                None => write!(f, "<freed {:?}>", r),
            },
        }
    }
}

/// Writes `n` in its shortest round-trip form, picking plain or exponent
/// notation by length and plain on a tie. Exponents carry a sign and at
/// least two digits (`1e+21`, `1e-07`).
fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        return f.write_str("nan");
    }
    if n.is_infinite() {
        return f.write_str(if n > 0.0 { "inf" } else { "-inf" });
    }

    let plain = n.to_string();
    let exponent = format!("{:e}", n);
    let scientific = match exponent.split_once('e') {
        Some((mantissa, exp)) => match exp.strip_prefix('-') {
            Some(digits) => format!("{}e-{:0>2}", mantissa, digits),
            None => format!("{}e+{:0>2}", mantissa, exp),
        },
        None => exponent,
    };

    if scientific.len() < plain.len() {
        f.write_str(&scientific)
    } else {
        f.write_str(&plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::trace::NoRoots;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::Object(GcRef::from_raw(0)).is_truthy());
    }

    #[test]
    fn test_not() {
        assert_eq!(Value::Nil.logical_not(), Value::Bool(true));
        assert_eq!(Value::Number(1.0).logical_not(), Value::Bool(false));
    }

    #[test]
    fn test_equality_is_structural_for_immediates() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_eq!(Value::Number(2.0), Value::Number(2.0));
        assert_ne!(Value::Number(2.0), Value::Bool(true));
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
    }

    #[test]
    fn test_arithmetic() {
        let a = Value::Number(6.0);
        let b = Value::Number(3.0);
        assert_eq!(a.try_add(b), Ok(Value::Number(9.0)));
        assert_eq!(a.try_sub(b), Ok(Value::Number(3.0)));
        assert_eq!(a.try_mul(b), Ok(Value::Number(18.0)));
        assert_eq!(a.try_div(b), Ok(Value::Number(2.0)));
        assert_eq!(a.try_negate(), Ok(Value::Number(-6.0)));
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        let inf = Value::Number(1.0).try_div(Value::Number(0.0)).unwrap();
        assert_eq!(inf.as_number(), Some(f64::INFINITY));
    }

    #[test]
    fn test_type_mismatch() {
        let err = Value::Nil.try_add(Value::Number(1.0)).unwrap_err();
        assert_eq!(err.to_string(), "Operands must be numbers.");
        let err = Value::Bool(true).try_negate().unwrap_err();
        assert_eq!(err.to_string(), "Operand must be a number.");
        assert!(Value::Nil.less(Value::Nil).is_err());
    }

    #[test]
    fn test_comparisons() {
        let one = Value::Number(1.0);
        let two = Value::Number(2.0);
        assert_eq!(one.less(two), Ok(Value::Bool(true)));
        assert_eq!(one.less_equal(one), Ok(Value::Bool(true)));
        assert_eq!(one.greater(two), Ok(Value::Bool(false)));
        assert_eq!(two.greater_equal(one), Ok(Value::Bool(true)));
        let nan = Value::Number(f64::NAN);
        assert_eq!(nan.less(one), Ok(Value::Bool(false)));
    }

    #[test]
    fn test_same_constant_distinguishes_signed_zero() {
        assert_eq!(Value::Number(0.0), Value::Number(-0.0));
        assert!(!Value::Number(0.0).same_constant(&Value::Number(-0.0)));
        assert!(Value::Bool(true).same_constant(&Value::Bool(true)));
    }

    #[test]
    fn test_display() {
        let mut heap = Heap::new();
        let s = heap.intern_string("hello", &NoRoots).unwrap();

        assert_eq!(Value::Nil.display(&heap).to_string(), "null");
        assert_eq!(Value::Bool(false).display(&heap).to_string(), "false");
        assert_eq!(Value::Number(3.0).display(&heap).to_string(), "3");
        assert_eq!(Value::Number(2.5).display(&heap).to_string(), "2.5");
        assert_eq!(Value::Number(-0.0).display(&heap).to_string(), "-0");
        assert_eq!(Value::Object(s).display(&heap).to_string(), "hello");
    }

    #[test]
    fn test_type_name() {
        let mut heap = Heap::new();
        let s = heap.intern_string("x", &NoRoots).unwrap();
        assert_eq!(Value::Number(1.0).type_name(&heap), "number");
        assert_eq!(Value::Object(s).type_name(&heap), "string");
    }

    #[test]
    fn test_number_display_uses_shorter_notation() {
        let heap = Heap::new();
        let show = |n: f64| Value::Number(n).display(&heap).to_string();

        assert_eq!(show(1e21), "1e+21");
        assert_eq!(show(1e300), "1e+300");
        assert_eq!(show(1e-7), "1e-07");
        assert_eq!(show(1.5e-7), "1.5e-07");
        assert_eq!(show(100000.0), "1e+05");
        // Equal length keeps the plain form.
        assert_eq!(show(10000.0), "10000");
        assert_eq!(show(123456789.0), "123456789");
        assert_eq!(show(0.001), "0.001");
        assert_eq!(show(f64::NAN), "nan");
        assert_eq!(show(f64::INFINITY), "inf");
        assert_eq!(show(f64::NEG_INFINITY), "-inf");
    }
}
