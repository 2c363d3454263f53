//! Helpers shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashSet;

/// Body of an assembly unit: everything between `_start:` and the footer.
pub fn body(asm: &str) -> &str {
  let start = asm
    .find("_start:\n")
    .map(|i| i + "_start:\n".len())
    .expect("unit has an entry point");
  let end = asm.find("; -- Footer --").expect("unit has a footer");
  &asm[start..end]
}

/// Label definitions emitted for the program body, in order.
pub fn labels(asm: &str) -> Vec<&str> {
  body(asm)
    .lines()
    .filter(|line| line.ends_with(':') && !line.starts_with([' ', '.', ';']))
    .map(|line| line.trim_end_matches(':'))
    .collect()
}

/// Targets of every jump in the program body.
pub fn jump_targets(asm: &str) -> Vec<&str> {
  body(asm)
    .lines()
    .map(str::trim)
    .filter(|line| line.starts_with('j'))
    .filter_map(|line| line.split_whitespace().nth(1))
    .filter(|target| !target.starts_with('.'))
    .collect()
}

/// Every label is defined once and every jump lands on a defined label.
pub fn labels_are_sound(asm: &str) -> Result<(), String> {
  let defined = labels(asm);
  let unique: HashSet<_> = defined.iter().copied().collect();
  if unique.len() != defined.len() {
    return Err(format!("duplicate labels in {defined:?}"));
  }
  match jump_targets(asm).into_iter().find(|t| !unique.contains(t)) {
    Some(target) => Err(format!("jump to undefined label `{target}`")),
    None => Ok(()),
  }
}
