use std::collections::HashMap;

use crate::{Id, Store};

pub type TypeId = Id<Type>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
  Boolean,
  Char,
  I8,
  I16,
  I32,
  I64,
  U8,
  U16,
  U32,
  U64,
  F32,
  F64,
  String,
  Object,
  Void,

  /// A user-declared class or struct.
  Named {
    name: String,
    is_value_type: bool,
  },
  Array(TypeId),

  /// Placeholder left behind by binding errors. Never translates to a token.
  Error,
}

#[derive(Debug, Clone)]
pub struct TypeStore {
  types: Store<Type>,
  primitives: HashMap<Type, TypeId>,
  named: HashMap<String, TypeId>,
  arrays: HashMap<TypeId, TypeId>,
}

impl Default for TypeStore {
  fn default() -> Self {
    Self::new()
  }
}

impl TypeStore {
  pub fn new() -> Self {
    let mut store = Self {
      types: Store::new(),
      primitives: HashMap::new(),
      named: HashMap::new(),
      arrays: HashMap::new(),
    };
    store.init_primitives();
    store
  }

  fn init_primitives(&mut self) {
    let primitives = [
      Type::Boolean,
      Type::Char,
      Type::I8,
      Type::I16,
      Type::I32,
      Type::I64,
      Type::U8,
      Type::U16,
      Type::U32,
      Type::U64,
      Type::F32,
      Type::F64,
      Type::String,
      Type::Object,
      Type::Void,
      Type::Error,
    ];

    for ty in primitives {
      let id = self.types.alloc(ty.clone());
      self.primitives.insert(ty, id);
    }
  }

  /// Interns a named type. Redeclaring a name returns the existing id.
  pub fn named(
    &mut self,
    name: &str,
    is_value_type: bool,
  ) -> TypeId {
    if let Some(&id) = self.named.get(name) {
      return id;
    }
    let id = self.types.alloc(Type::Named {
      name: name.to_string(),
      is_value_type,
    });
    self.named.insert(name.to_string(), id);
    id
  }

  pub fn array(
    &mut self,
    element: TypeId,
  ) -> TypeId {
    if let Some(&id) = self.arrays.get(&element) {
      return id;
    }
    let id = self.types.alloc(Type::Array(element));
    self.arrays.insert(element, id);
    id
  }

  #[inline]
  pub fn get(
    &self,
    id: &TypeId,
  ) -> &Type {
    self.types.get(id)
  }

  #[inline]
  pub fn boolean(&self) -> TypeId {
    self.primitives[&Type::Boolean]
  }

  #[inline]
  pub fn char(&self) -> TypeId {
    self.primitives[&Type::Char]
  }

  #[inline]
  pub fn i8(&self) -> TypeId {
    self.primitives[&Type::I8]
  }

  #[inline]
  pub fn i16(&self) -> TypeId {
    self.primitives[&Type::I16]
  }

  #[inline]
  pub fn i32(&self) -> TypeId {
    self.primitives[&Type::I32]
  }

  #[inline]
  pub fn i64(&self) -> TypeId {
    self.primitives[&Type::I64]
  }

  #[inline]
  pub fn u8(&self) -> TypeId {
    self.primitives[&Type::U8]
  }

  #[inline]
  pub fn u16(&self) -> TypeId {
    self.primitives[&Type::U16]
  }

  #[inline]
  pub fn u32(&self) -> TypeId {
    self.primitives[&Type::U32]
  }

  #[inline]
  pub fn u64(&self) -> TypeId {
    self.primitives[&Type::U64]
  }

  #[inline]
  pub fn f32(&self) -> TypeId {
    self.primitives[&Type::F32]
  }

  #[inline]
  pub fn f64(&self) -> TypeId {
    self.primitives[&Type::F64]
  }

  #[inline]
  pub fn string(&self) -> TypeId {
    self.primitives[&Type::String]
  }

  #[inline]
  pub fn object(&self) -> TypeId {
    self.primitives[&Type::Object]
  }

  #[inline]
  pub fn void(&self) -> TypeId {
    self.primitives[&Type::Void]
  }

  #[inline]
  pub fn error(&self) -> TypeId {
    self.primitives[&Type::Error]
  }

  pub fn is_integer(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(
      self.get(ty),
      Type::Char | Type::I8 | Type::I16 | Type::I32 | Type::I64 | Type::U8 | Type::U16 | Type::U32 | Type::U64
    )
  }

  pub fn is_float(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::F32 | Type::F64)
  }

  /// Unsigned integers compare and divide with the `.un` opcode forms.
  pub fn is_unsigned(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Char | Type::U8 | Type::U16 | Type::U32 | Type::U64)
  }

  /// Types that occupy a 64-bit integer stack slot.
  pub fn is_wide_integer(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::I64 | Type::U64)
  }

  pub fn is_value_type(
    &self,
    ty: &TypeId,
  ) -> bool {
    match self.get(ty) {
      Type::String | Type::Object | Type::Void | Type::Array(_) | Type::Error => false,
      Type::Named { is_value_type, .. } => *is_value_type,
      _ => true,
    }
  }

  /// Value types that are not primitives: their default value needs `initobj`.
  pub fn is_struct(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Named { is_value_type: true, .. })
  }

  pub fn is_reference_type(
    &self,
    ty: &TypeId,
  ) -> bool {
    !self.is_value_type(ty) && !self.is_void(ty) && !self.is_error(ty)
  }

  #[inline]
  pub fn is_void(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Void)
  }

  #[inline]
  pub fn is_boolean(
    &self,
    ty: &TypeId,
  ) -> bool {
    matches!(self.get(ty), Type::Boolean)
  }

  /// True for the error type and any array built from it.
  pub fn is_error(
    &self,
    ty: &TypeId,
  ) -> bool {
    match self.get(ty) {
      Type::Error => true,
      Type::Array(element) => self.is_error(element),
      _ => false,
    }
  }

  /// IL-style display name.
  pub fn type_name(
    &self,
    ty: &TypeId,
  ) -> String {
    match self.get(ty) {
      Type::Boolean => "bool".to_string(),
      Type::Char => "char".to_string(),
      Type::I8 => "int8".to_string(),
      Type::I16 => "int16".to_string(),
      Type::I32 => "int32".to_string(),
      Type::I64 => "int64".to_string(),
      Type::U8 => "uint8".to_string(),
      Type::U16 => "uint16".to_string(),
      Type::U32 => "uint32".to_string(),
      Type::U64 => "uint64".to_string(),
      Type::F32 => "float32".to_string(),
      Type::F64 => "float64".to_string(),
      Type::String => "string".to_string(),
      Type::Object => "object".to_string(),
      Type::Void => "void".to_string(),
      Type::Named { name, .. } => name.clone(),
      Type::Array(element) => format!("{}[]", self.type_name(element)),
      Type::Error => "?".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_named_types_are_interned() {
    let mut types = TypeStore::new();
    let a = types.named("Point", true);
    let b = types.named("Point", true);

    assert_eq!(a, b);
    assert!(types.is_struct(&a));
    assert!(types.is_value_type(&a));
  }

  #[test]
  fn test_error_propagates_through_arrays() {
    let mut types = TypeStore::new();
    let error = types.error();
    let arr = types.array(error);

    assert!(types.is_error(&arr));
    assert!(!types.is_reference_type(&arr));
    assert_eq!(types.type_name(&arr), "?[]");
  }

  #[test]
  fn test_value_and_reference_classification() {
    let mut types = TypeStore::new();
    let node = types.named("Node", false);

    assert!(types.is_value_type(&types.i32()));
    assert!(types.is_reference_type(&types.string()));
    assert!(types.is_reference_type(&node));
    assert!(!types.is_reference_type(&types.void()));
    assert!(types.is_unsigned(&types.char()));
  }

  #[test]
  fn test_numeric_classification() {
    let types = TypeStore::new();

    assert!(types.is_integer(&types.i16()));
    assert!(types.is_integer(&types.char()));
    assert!(!types.is_integer(&types.f32()));
    assert!(types.is_float(&types.f32()));
    assert!(!types.is_integer(&types.boolean()));
    assert!(types.is_boolean(&types.boolean()));
    assert!(!types.is_boolean(&types.i32()));
    assert_eq!(types.type_name(&types.i16()), "int16");
    assert_eq!(types.type_name(&types.f32()), "float32");
  }
}
