//! Property tests over generated well-formed programs.

mod common;

use proptest::prelude::*;

use stacc::generate_assembly;
use stacc::tokenizer::tokenize;

/// Stack-balanced statements built from nested `if`, `if/else` and `for`.
/// With `with_macro` the leaves may also invoke the macro `m`.
fn statements(with_macro: bool) -> BoxedStrategy<String> {
  let mut leaves = vec![
    Just("1 2 + drop".to_string()).boxed(),
    Just("1 2 < drop".to_string()).boxed(),
    Just("3 4 >= drop".to_string()).boxed(),
    Just("x 1 !".to_string()).boxed(),
  ];
  if with_macro {
    leaves.push(Just("m".to_string()).boxed());
  }
  let leaf = proptest::strategy::Union::new(leaves);

  leaf
    .prop_recursive(4, 48, 4, |inner| {
      prop_oneof![
        prop::collection::vec(inner.clone(), 1..4).prop_map(|parts| parts.join(" ")),
        inner.clone().prop_map(|body| format!("1 2 = if {body} end")),
        (inner.clone(), inner.clone())
          .prop_map(|(then, other)| format!("true if {then} else {other} end")),
        inner.prop_map(|body| format!("for false do {body} end")),
      ]
    })
    .boxed()
}

fn program() -> impl Strategy<Value = String> {
  (statements(false), statements(true))
    .prop_map(|(body, main)| format!("var x int end macro m {body} end {main}"))
}

proptest! {
  /// Every label is defined once and every jump has a target, however many
  /// times the macro is expanded and however deeply blocks nest.
  #[test]
  fn prop_labels_unique_and_resolved(source in program()) {
    let asm = generate_assembly(&source, "p.stc").unwrap();
    prop_assert_eq!(common::labels_are_sound(&asm), Ok(()));
  }

  /// Compiling the same source twice gives byte-identical assembly.
  #[test]
  fn prop_generation_is_deterministic(source in program()) {
    let first = generate_assembly(&source, "p.stc").unwrap();
    let second = generate_assembly(&source, "p.stc").unwrap();
    prop_assert_eq!(first, second);
  }

  /// Any u64 literal is pushed with its exact value.
  #[test]
  fn prop_integer_literals_survive(n in any::<u64>()) {
    let asm = generate_assembly(&format!("{n} print"), "p.stc").unwrap();
    let expected = format!("    mov rax, {n}\n    push rax\n");
    let prefix = format!("; -- Int Push --\n{expected}");
    prop_assert!(common::body(&asm).starts_with(&prefix));
  }

  /// Comments never produce lexemes and lexemes never contain whitespace.
  #[test]
  fn prop_comments_are_dropped(
    words in prop::collection::vec("[a-z0-9+*<>=!@-]{1,6}", 0..8),
    comment in "[ -~]{0,20}",
  ) {
    let source = format!("{} // {comment}\n{}", words.join(" "), words.join("  "));
    let raw = tokenize(&source, "p.stc");
    prop_assert_eq!(raw.len(), words.len() * 2);
    for token in &raw {
      prop_assert!(!token.text.chars().any(char::is_whitespace));
      prop_assert!(token.loc.line == 1 || token.loc.line == 2);
    }
  }
}
