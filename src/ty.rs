//! Abstract value types tracked by the type checker.

use std::fmt;

use crate::token::ElementKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
  Int,
  Bool,
  Ptr,
}

/// One value on the checker's stack.
///
/// Pointers remember the element kind of the slot they address. A pointer
/// with no base is opaque: it came from a macro word or from loading a `ptr`
/// variable, and nothing is known about what it points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Type {
  pub kind: TypeKind,
  pub base: Option<ElementKind>,
}

impl Type {
  pub fn int() -> Self {
    Self {
      kind: TypeKind::Int,
      base: None,
    }
  }

  pub fn bool() -> Self {
    Self {
      kind: TypeKind::Bool,
      base: None,
    }
  }

  pub fn pointer_to(base: ElementKind) -> Self {
    Self {
      kind: TypeKind::Ptr,
      base: Some(base),
    }
  }

  pub fn opaque_pointer() -> Self {
    Self {
      kind: TypeKind::Ptr,
      base: None,
    }
  }

  /// Type of a value held in a slot of the given element kind.
  pub fn of_element(kind: ElementKind) -> Self {
    match kind {
      ElementKind::Int => Self::int(),
      ElementKind::Bool => Self::bool(),
      ElementKind::Ptr => Self::opaque_pointer(),
    }
  }

  pub fn is_integer(&self) -> bool {
    matches!(self.kind, TypeKind::Int)
  }

  pub fn is_bool(&self) -> bool {
    matches!(self.kind, TypeKind::Bool)
  }

  pub fn is_pointer(&self) -> bool {
    matches!(self.kind, TypeKind::Ptr)
  }

  pub fn base(&self) -> Option<ElementKind> {
    self.base
  }

  /// Type produced by loading through this pointer, or `None` if this is not
  /// a pointer. Opaque pointers load a raw qword.
  pub fn load(&self) -> Option<Type> {
    if !self.is_pointer() {
      return None;
    }
    Some(self.base.map_or_else(Self::int, Self::of_element))
  }

  /// Whether `value` may be stored through this pointer.
  pub fn accepts_store(&self, value: &Type) -> bool {
    if !self.is_pointer() {
      return false;
    }
    match self.base {
      None => true,
      Some(ElementKind::Int) => value.is_integer(),
      Some(ElementKind::Bool) => value.is_bool(),
      Some(ElementKind::Ptr) => value.is_pointer(),
    }
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match (self.kind, self.base) {
      (TypeKind::Int, _) => f.write_str("int"),
      (TypeKind::Bool, _) => f.write_str("bool"),
      (TypeKind::Ptr, Some(base)) => write!(f, "ptr({base})"),
      (TypeKind::Ptr, None) => f.write_str("ptr"),
    }
  }
}
