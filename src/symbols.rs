//! Macro and variable tables filled in by the resolver.

use std::collections::HashMap;

use crate::token::{ElementKind, Token};

/// Size in bytes of one variable slot.
pub const VAR_SLOT_SIZE: u64 = 8;

/// Macro name to its captured, unexpanded body.
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
  macros: HashMap<String, Vec<Token>>,
}

impl MacroTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store a body under `name`. A later definition replaces an earlier one.
  pub fn define(&mut self, name: impl Into<String>, body: Vec<Token>) {
    let name = name.into();
    if self.macros.insert(name.clone(), body).is_some() {
      log::debug!("macro `{name}` redefined, last definition wins");
    }
  }

  pub fn get(&self, name: &str) -> Option<&[Token]> {
    self.macros.get(name).map(Vec::as_slice)
  }

  pub fn contains(&self, name: &str) -> bool {
    self.macros.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.macros.len()
  }

  pub fn is_empty(&self) -> bool {
    self.macros.is_empty()
  }

  pub(crate) fn bodies_mut(&mut self) -> impl Iterator<Item = &mut Vec<Token>> {
    self.macros.values_mut()
  }
}

/// A declared variable: its slot in the storage region and its element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variable {
  pub offset: u64,
  pub kind: ElementKind,
}

/// Variable name to its slot. Slots are 8 bytes apart starting at 0, in
/// declaration order.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
  vars: HashMap<String, Variable>,
}

impl VariableTable {
  pub fn new() -> Self {
    Self::default()
  }

  /// Declare `name`, returning its slot.
  ///
  /// Redeclaring a name keeps its slot and replaces its element kind, so the
  /// slots stay contiguous.
  pub fn declare(&mut self, name: impl Into<String>, kind: ElementKind) -> Variable {
    let next_offset = self.storage_size();
    let name = name.into();
    let var = self
      .vars
      .entry(name)
      .and_modify(|var| var.kind = kind)
      .or_insert(Variable {
        offset: next_offset,
        kind,
      });
    *var
  }

  pub fn get(&self, name: &str) -> Option<Variable> {
    self.vars.get(name).copied()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.vars.contains_key(name)
  }

  pub fn len(&self) -> usize {
    self.vars.len()
  }

  pub fn is_empty(&self) -> bool {
    self.vars.is_empty()
  }

  /// Bytes reserved for the whole storage region.
  pub fn storage_size(&self) -> u64 {
    self.vars.len() as u64 * VAR_SLOT_SIZE
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn offsets_are_assigned_in_declaration_order() {
    let mut vars = VariableTable::new();
    assert_eq!(vars.declare("a", ElementKind::Int).offset, 0);
    assert_eq!(vars.declare("b", ElementKind::Bool).offset, 8);
    assert_eq!(vars.declare("c", ElementKind::Ptr).offset, 16);
    assert_eq!(vars.storage_size(), 24);
  }

  #[test]
  fn redeclaration_keeps_the_slot_and_takes_the_new_kind() {
    let mut vars = VariableTable::new();
    vars.declare("a", ElementKind::Int);
    vars.declare("b", ElementKind::Int);
    let again = vars.declare("a", ElementKind::Bool);

    assert_eq!(
      again,
      Variable {
        offset: 0,
        kind: ElementKind::Bool
      }
    );
    assert_eq!(vars.len(), 2);
    assert_eq!(vars.storage_size(), 16);
  }

  #[test]
  fn macro_redefinition_overwrites() {
    let mut macros = MacroTable::new();
    macros.define("m", Vec::new());
    macros.define("m", vec![]);
    assert_eq!(macros.len(), 1);
    assert!(macros.contains("m"));
    assert!(!macros.contains("n"));
  }
}
