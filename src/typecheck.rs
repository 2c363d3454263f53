//! Stack-effect type checker.
//!
//! A single left-to-right simulation of the program over a stack of abstract
//! values. Each token is checked once, in order: loop bodies are not iterated
//! to a fixed point, and a word naming a macro is modeled as pushing an opaque
//! pointer rather than as the macro's real stack effect. Values are never
//! inspected, so `0 divmod` is left to the machine.

use snafu::ensure;

use crate::error::{
  CompileError, CompileResult, StackUnderflowSnafu, StructureSnafu, TypeMismatchSnafu,
};
use crate::parser::Program;
use crate::token::{Token, TokenKind};
use crate::ty::Type;

/// Check the main token sequence of `program`.
pub fn check(program: &Program) -> CompileResult<()> {
  let mut stack = TypeStack::default();
  for token in &program.tokens {
    check_token(token, &mut stack)?;
  }
  log::debug!(
    "type check passed, {} value(s) left on the stack",
    stack.len()
  );
  Ok(())
}

fn check_token(token: &Token, stack: &mut TypeStack) -> CompileResult<()> {
  match token.kind {
    TokenKind::Int => stack.push(Type::int()),
    TokenKind::True | TokenKind::False => stack.push(Type::bool()),
    TokenKind::Plus | TokenKind::Sub | TokenKind::Mult => {
      int_operands(token, stack)?;
      stack.push(Type::int());
    }
    TokenKind::DivMod => {
      int_operands(token, stack)?;
      // quotient, then remainder on top
      stack.push(Type::int());
      stack.push(Type::int());
    }
    TokenKind::Gt | TokenKind::Ge | TokenKind::Lt | TokenKind::Le | TokenKind::Eq => {
      int_operands(token, stack)?;
      stack.push(Type::bool());
    }
    TokenKind::Print | TokenKind::Drop => {
      stack.pop_n::<1>(token)?;
    }
    TokenKind::Swap => {
      let [a, b] = stack.pop_n(token)?;
      stack.push(b);
      stack.push(a);
    }
    TokenKind::Dup => {
      let [a] = stack.pop_n(token)?;
      stack.push(a);
      stack.push(a);
    }
    TokenKind::Rot => {
      let [a, b, c] = stack.pop_n(token)?;
      stack.push(b);
      stack.push(c);
      stack.push(a);
    }
    TokenKind::If | TokenKind::Do => {
      let [cond] = stack.pop_n(token)?;
      if !cond.is_bool() {
        return Err(mismatch(token, "bool", [cond]));
      }
    }
    TokenKind::For | TokenKind::Else | TokenKind::End => {}
    TokenKind::Read => {
      let [ptr] = stack.pop_n(token)?;
      let Some(value) = ptr.load() else {
        return Err(mismatch(token, "ptr", [ptr]));
      };
      stack.push(value);
    }
    TokenKind::Write => {
      let [ptr, value] = stack.pop_n(token)?;
      if !ptr.accepts_store(&value) {
        let expected = match ptr.base() {
          Some(base) if ptr.is_pointer() => format!("ptr({base}) {}", Type::of_element(base)),
          _ => "ptr value".to_string(),
        };
        return Err(mismatch(token, expected, [ptr, value]));
      }
    }
    TokenKind::Syscall1 => {
      stack.pop_n::<2>(token)?;
    }
    TokenKind::Syscall3 => {
      stack.pop_n::<4>(token)?;
    }
    TokenKind::Word => match token.element {
      Some(kind) => stack.push(Type::pointer_to(kind)),
      None => stack.push(Type::opaque_pointer()),
    },
    TokenKind::Macro | TokenKind::Var => {
      return StructureSnafu {
        loc: token.loc.clone(),
        op: token.text.as_str(),
        message: "definition keyword left in the resolved token stream",
      }
      .fail();
    }
  }
  Ok(())
}

/// Pop two operands that must both be integers.
fn int_operands(token: &Token, stack: &mut TypeStack) -> CompileResult<()> {
  let operands = stack.pop_n::<2>(token)?;
  if !operands.iter().all(Type::is_integer) {
    return Err(mismatch(token, "int int", operands));
  }
  Ok(())
}

fn mismatch<const N: usize>(
  token: &Token,
  expected: impl Into<String>,
  found: [Type; N],
) -> CompileError {
  let found = found.iter().map(Type::to_string).collect::<Vec<_>>().join(" ");
  TypeMismatchSnafu {
    loc: token.loc.clone(),
    op: token.text.as_str(),
    expected,
    found,
  }
  .build()
}

/// The abstract value stack.
#[derive(Debug, Default)]
struct TypeStack {
  items: Vec<Type>,
}

impl TypeStack {
  fn push(&mut self, ty: Type) {
    self.items.push(ty);
  }

  fn len(&self) -> usize {
    self.items.len()
  }

  /// Pop the top `N` values, returned deepest first.
  fn pop_n<const N: usize>(&mut self, token: &Token) -> CompileResult<[Type; N]> {
    ensure!(
      self.items.len() >= N,
      StackUnderflowSnafu {
        loc: token.loc.clone(),
        op: token.text.as_str(),
        expected: N,
        found: self.items.len(),
      }
    );
    let split = self.items.len() - N;
    let mut popped = [Type::int(); N];
    popped.copy_from_slice(&self.items[split..]);
    self.items.truncate(split);
    Ok(popped)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parser::resolve;
  use crate::tokenizer::tokenize;

  fn check_source(source: &str) -> CompileResult<()> {
    let program = resolve(tokenize(source, "t.stc"))?;
    check(&program)
  }

  #[test]
  fn accepts_arithmetic() {
    check_source("2 3 + print").unwrap();
    check_source("10 4 - 3 * 7 divmod + print").unwrap();
  }

  #[test]
  fn drop_on_empty_stack_underflows() {
    let err = check_source("drop").unwrap_err();
    assert!(matches!(
      err,
      CompileError::StackUnderflow {
        expected: 1,
        found: 0,
        ..
      }
    ));
    assert_eq!(
      err.to_string(),
      "t.stc:1:1: `drop` expected at least 1 element(s) but found 0 on the stack"
    );
  }

  #[test]
  fn arithmetic_rejects_booleans() {
    let err = check_source("1 true +").unwrap_err();
    assert_eq!(
      err.to_string(),
      "t.stc:1:8: `+` expected < int int > but found < int bool > on the stack"
    );
    assert!(check_source("true 1 *").is_err());
  }

  #[test]
  fn comparisons_produce_booleans() {
    check_source("1 2 < if 3 print end").unwrap();
    check_source("1 2 = 3 4 >= swap drop if end").unwrap();
    let err = check_source("1 2 + if end").unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn do_requires_a_boolean() {
    check_source("for 1 2 > do end").unwrap();
    assert!(check_source("for 1 do end").is_err());
  }

  #[test]
  fn shuffles_keep_exact_types() {
    // after the swap the bool sits beneath the int
    assert!(check_source("1 true swap +").is_err());
    assert!(check_source("1 2 true rot + print drop").is_err());
    check_source("true 1 2 rot if + print end").unwrap();
    check_source("true dup if if end end").unwrap();
  }

  #[test]
  fn shuffles_need_enough_elements() {
    for (source, expected) in [("1 swap", 2), ("dup", 1), ("1 2 rot", 3)] {
      match check_source(source).unwrap_err() {
        CompileError::StackUnderflow { expected: e, .. } => assert_eq!(e, expected),
        other => panic!("{source}: {other}"),
      }
    }
  }

  #[test]
  fn print_takes_any_value() {
    check_source("true print 1 print var p ptr end p print").unwrap();
  }

  #[test]
  fn variables_read_and_write_their_element_type() {
    check_source("var x int end x 10 ! x @ print").unwrap();
    check_source("var f bool end f true ! f @ if end").unwrap();
    check_source("var x int end var p ptr end p x ! p @ 5 !").unwrap();
  }

  #[test]
  fn write_rejects_element_mismatch() {
    let err = check_source("var x int end x true !").unwrap_err();
    assert_eq!(
      err.to_string(),
      "t.stc:1:22: `!` expected < ptr(int) int > but found < ptr(int) bool > on the stack"
    );
  }

  #[test]
  fn write_needs_a_pointer_beneath_the_value() {
    let err = check_source("var x int end 10 x !").unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn read_needs_a_pointer() {
    let err = check_source("1 @").unwrap_err();
    assert!(matches!(err, CompileError::TypeMismatch { .. }));
  }

  #[test]
  fn syscalls_only_count_elements() {
    check_source("1 true 60 syscall1").unwrap();
    check_source("1 2 3 4 syscall3").unwrap();
    assert!(check_source("1 2 3 syscall3").is_err());
    assert!(check_source("60 syscall1").is_err());
  }

  #[test]
  fn macro_words_are_modeled_as_pointers() {
    check_source("macro inc 1 + end 5 inc print").unwrap();
    // the inlined `1 +` would balance, but the checker only sees a pointer
    assert!(check_source("macro inc 1 + end 5 inc 2 +").is_err());
  }

  #[test]
  fn division_by_zero_is_not_a_type_error() {
    check_source("10 0 divmod print print").unwrap();
  }

  #[test]
  fn loop_bodies_are_checked_once() {
    // leaves one extra int per iteration; a linear pass accepts it
    check_source("for true do 1 end").unwrap();
  }
}
