//! Code generation: lower the resolved program into NASM x86-64 assembly.
//!
//! The emitter is a plain stack machine. Every value lives on the hardware
//! stack, so each token becomes a short `pop`/`push` sequence preceded by a
//! `; -- <Construct> --` comment. Control flow is lowered to labeled jumps and
//! macro words are inlined at their call site.
//!
//! Label names must be unique across the whole unit, including every macro
//! expansion, so all counters live in one [`CodeGenState`] that is threaded by
//! reference through the recursive expansion.

use crate::error::{
  CompileResult, NestedMacroCallSnafu, StructureSnafu, UndefinedWordSnafu,
};
use crate::parser::Program;
use crate::token::{Token, TokenKind};
use crate::tokenizer::SourceLocation;

const HEADER: &str = "\
; -- Header --
BITS 64
section .text

print_render:
    xor rbx, rbx
    mov rcx, 10
.L1:
    xor rdx, rdx
    mov rax, rdi
    div rcx
    mov rdi, rax
    add rdx, '0'
    mov byte [print_buffer + rbx], dl
    cmp rax, 0
    je .exit
    inc rbx
    jmp .L1
.exit:
    ret

print_reverse:
    xor rdx, rdx
    mov rcx, 2
    mov rax, rbx
    div rcx
    inc rax
    mov rsi, rbx
    xor r9, r9
.L1:
    mov cl, byte [print_buffer + rsi]
    mov dil, byte [print_buffer + r9]
    mov byte [print_buffer + rsi], dil
    mov byte [print_buffer + r9], cl
    dec rax
    cmp rax, 0
    je .exit
    inc r9
    dec rsi
    jmp .L1
.exit:
    inc rbx
    mov byte [print_buffer + rbx], 10
    inc rbx
    ret

print:
    call print_render
    call print_reverse
    mov rax, 1
    mov rdi, 1
    mov rsi, print_buffer
    mov rdx, rbx
    syscall
    ret

global _start
global vars_buffer
_start:
";

/// Room for the 20 digits of `u64::MAX`, a newline and a spare byte.
const PRINT_BUFFER_SIZE: u64 = 22;

/// Label counters shared by the main program and every macro expansion.
#[derive(Debug, Default)]
pub struct CodeGenState {
  cmp_count: u64,
  if_nest: u64,
  if_count: u64,
  /// Advanced once per `if` in the current top-level chain; reset when
  /// if-nesting returns to zero.
  branch_count: u64,
  for_nest: u64,
  for_count: u64,
  var_buf_size: u64,
}

impl CodeGenState {
  pub fn new(var_buf_size: u64) -> Self {
    Self {
      var_buf_size,
      ..Self::default()
    }
  }

  fn next_comparison(&mut self) -> u64 {
    self.cmp_count += 1;
    self.cmp_count
  }

  fn open_if(&mut self) -> IfLabels {
    self.branch_count += 1;
    let labels = IfLabels {
      nest: self.if_nest,
      count: self.if_count,
      branch: self.branch_count,
      has_else: false,
    };
    self.if_nest += 1;
    labels
  }

  fn close_if(&mut self) {
    self.if_nest -= 1;
    if self.if_nest == 0 {
      self.if_count += 1;
      self.branch_count = 0;
    }
  }

  fn open_for(&mut self) -> ForLabels {
    let labels = ForLabels {
      nest: self.for_nest,
      count: self.for_count,
    };
    self.for_count += 1;
    self.for_nest += 1;
    labels
  }

  fn close_for(&mut self) {
    self.for_nest -= 1;
  }
}

/// Labels owned by one `if` block.
#[derive(Debug, Clone, Copy)]
struct IfLabels {
  nest: u64,
  count: u64,
  branch: u64,
  has_else: bool,
}

impl IfLabels {
  /// Target taken when the condition is false.
  fn jmp(&self) -> String {
    format!("ifjmp_{}_{}_{}", self.nest, self.count, self.branch)
  }

  /// Join point after the else arm.
  fn end(&self) -> String {
    format!("ifend_{}_{}_{}", self.nest, self.count, self.branch)
  }
}

/// Labels owned by one `for` block.
#[derive(Debug, Clone, Copy)]
struct ForLabels {
  nest: u64,
  count: u64,
}

impl ForLabels {
  fn start(&self) -> String {
    format!("for_{}_{}", self.nest, self.count)
  }

  fn end(&self) -> String {
    format!("forend_{}_{}", self.nest, self.count)
  }
}

/// An open construct on the block stack.
#[derive(Debug)]
enum Block {
  If { labels: IfLabels, loc: SourceLocation },
  For { labels: ForLabels, loc: SourceLocation },
}

/// Where a token sequence is being emitted from.
#[derive(Debug, Clone, Copy)]
enum Scope<'a> {
  Main,
  Macro(&'a str),
}

/// Emit the whole assembly unit for a checked program.
pub fn generate(program: &Program) -> CompileResult<String> {
  let mut state = CodeGenState::new(program.variables.storage_size());
  let mut asm = String::from(HEADER);

  emit_tokens(&program.tokens, Scope::Main, program, &mut state, &mut asm)?;
  emit_footer(&state, &mut asm);

  log::debug!(
    "generated {} lines of assembly ({} comparisons, {} top-level if chains, {} loops)",
    asm.lines().count(),
    state.cmp_count,
    state.if_count,
    state.for_count
  );
  Ok(asm)
}

/// Lower a token sequence with its own block stack. Macro bodies come back
/// through here with the same `state`.
fn emit_tokens(
  tokens: &[Token],
  scope: Scope<'_>,
  program: &Program,
  state: &mut CodeGenState,
  asm: &mut String,
) -> CompileResult<()> {
  let mut blocks: Vec<Block> = Vec::new();

  for token in tokens {
    match token.kind {
      TokenKind::Int => {
        asm.push_str("; -- Int Push --\n");
        asm.push_str(&format!("    mov rax, {}\n", token.operand));
        asm.push_str("    push rax\n");
      }
      TokenKind::True | TokenKind::False => {
        asm.push_str("; -- Bool Push --\n");
        asm.push_str(&format!("    mov rax, {}\n", token.operand));
        asm.push_str("    push rax\n");
      }
      TokenKind::Plus => {
        asm.push_str("; -- Plus --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    add rax, rbx\n");
        asm.push_str("    push rax\n");
      }
      TokenKind::Sub => {
        asm.push_str("; -- Sub --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    sub rbx, rax\n");
        asm.push_str("    push rbx\n");
      }
      TokenKind::Mult => {
        asm.push_str("; -- Mul --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    mul rbx\n");
        asm.push_str("    push rax\n");
      }
      TokenKind::DivMod => {
        asm.push_str("; -- DivMod --\n");
        asm.push_str("    xor rdx, rdx\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    div rbx\n");
        asm.push_str("    push rax\n");
        asm.push_str("    push rdx\n");
      }
      TokenKind::Print => {
        asm.push_str("; -- Print --\n");
        asm.push_str("    pop rdi\n");
        asm.push_str("    call print\n");
      }
      TokenKind::Swap => {
        asm.push_str("; -- Swap --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    push rax\n");
        asm.push_str("    push rbx\n");
      }
      TokenKind::Dup => {
        asm.push_str("; -- Dup --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    push rax\n");
        asm.push_str("    push rax\n");
      }
      TokenKind::Drop => {
        asm.push_str("; -- Drop --\n");
        asm.push_str("    pop rax\n");
      }
      TokenKind::Rot => {
        asm.push_str("; -- Rot --\n");
        asm.push_str("    pop rcx\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    push rbx\n");
        asm.push_str("    push rcx\n");
        asm.push_str("    push rax\n");
      }
      TokenKind::Gt => emit_comparison("Gt", "jg", "gt", state, asm),
      TokenKind::Ge => emit_comparison("Ge", "jge", "ge", state, asm),
      TokenKind::Lt => emit_comparison("Lt", "jl", "lt", state, asm),
      TokenKind::Le => emit_comparison("Le", "jle", "le", state, asm),
      TokenKind::Eq => emit_comparison("Eq", "je", "eq", state, asm),
      TokenKind::For => {
        let labels = state.open_for();
        asm.push_str("; -- For --\n");
        asm.push_str(&format!("{}:\n", labels.start()));
        blocks.push(Block::For {
          labels,
          loc: token.loc.clone(),
        });
      }
      TokenKind::Do => {
        let Some(Block::For { labels, .. }) = blocks.last() else {
          return structure_error(token, "without an enclosing `for`");
        };
        asm.push_str("; -- Do --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    cmp rax, 0\n");
        asm.push_str(&format!("    je {}\n", labels.end()));
      }
      TokenKind::If => {
        let labels = state.open_if();
        asm.push_str("; -- If --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    cmp rax, 0\n");
        asm.push_str(&format!("    je {}\n", labels.jmp()));
        blocks.push(Block::If {
          labels,
          loc: token.loc.clone(),
        });
      }
      TokenKind::Else => match blocks.last_mut() {
        Some(Block::If { labels, .. }) if !labels.has_else => {
          labels.has_else = true;
          asm.push_str("; -- Else --\n");
          asm.push_str(&format!("    jmp {}\n", labels.end()));
          asm.push_str(&format!("{}:\n", labels.jmp()));
        }
        Some(Block::If { .. }) => {
          return structure_error(token, "an `if` takes at most one `else`");
        }
        _ => return structure_error(token, "without an enclosing `if`"),
      },
      TokenKind::End => match blocks.pop() {
        Some(Block::If { labels, .. }) => {
          asm.push_str("; -- IfEnd --\n");
          if labels.has_else {
            asm.push_str(&format!("{}:\n", labels.end()));
          } else {
            asm.push_str(&format!("{}:\n", labels.jmp()));
          }
          state.close_if();
        }
        Some(Block::For { labels, .. }) => {
          asm.push_str("; -- ForEnd --\n");
          asm.push_str(&format!("    jmp {}\n", labels.start()));
          asm.push_str(&format!("{}:\n", labels.end()));
          state.close_for();
        }
        None => return structure_error(token, "without an open `if` or `for`"),
      },
      TokenKind::Syscall1 => {
        asm.push_str("; -- Syscall1 --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rdi\n");
        asm.push_str("    syscall\n");
      }
      TokenKind::Syscall3 => {
        asm.push_str("; -- Syscall3 --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rdi\n");
        asm.push_str("    pop rsi\n");
        asm.push_str("    pop rdx\n");
        asm.push_str("    syscall\n");
      }
      TokenKind::Read => {
        asm.push_str("; -- Var Read --\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    mov rax, qword [rbx]\n");
        asm.push_str("    push rax\n");
      }
      TokenKind::Write => {
        asm.push_str("; -- Var Write --\n");
        asm.push_str("    pop rax\n");
        asm.push_str("    pop rbx\n");
        asm.push_str("    mov qword [rbx], rax\n");
      }
      TokenKind::Word => emit_word(token, scope, program, state, asm)?,
      TokenKind::Macro | TokenKind::Var => {
        return structure_error(token, "definition keyword left in the resolved token stream");
      }
    }
  }

  if let Some(block) = blocks.last() {
    let (op, loc) = match block {
      Block::If { loc, .. } => ("if", loc),
      Block::For { loc, .. } => ("for", loc),
    };
    return StructureSnafu {
      loc: loc.clone(),
      op,
      message: "is never closed with `end`",
    }
    .fail();
  }

  Ok(())
}

/// A word is either a macro to inline or a variable whose address is pushed.
fn emit_word(
  token: &Token,
  scope: Scope<'_>,
  program: &Program,
  state: &mut CodeGenState,
  asm: &mut String,
) -> CompileResult<()> {
  if let Some(body) = program.macros.get(&token.text) {
    if let Scope::Macro(outer) = scope {
      log::trace!("`{}` invoked from inside macro `{outer}`", token.text);
      return NestedMacroCallSnafu {
        loc: token.loc.clone(),
        name: token.text.as_str(),
      }
      .fail();
    }

    asm.push_str(&format!("; -- Macro {} --\n", token.text));
    emit_tokens(body, Scope::Macro(&token.text), program, state, asm)?;
    asm.push_str("; -- MacroEnd --\n");
    return Ok(());
  }

  if token.element.is_none() {
    return UndefinedWordSnafu {
      loc: token.loc.clone(),
      name: token.text.as_str(),
    }
    .fail();
  }

  asm.push_str("; -- Var --\n");
  asm.push_str(&format!("    mov rax, vars_buffer+{}\n", token.operand));
  asm.push_str("    push rax\n");
  Ok(())
}

/// Materialize a boolean: 1 if `jump` is taken, 0 otherwise.
fn emit_comparison(
  name: &str,
  jump: &str,
  prefix: &str,
  state: &mut CodeGenState,
  asm: &mut String,
) {
  let n = state.next_comparison();
  asm.push_str(&format!("; -- {name} --\n"));
  asm.push_str("    pop rbx\n");
  asm.push_str("    pop rax\n");
  asm.push_str("    cmp rax, rbx\n");
  asm.push_str(&format!("    {jump} {prefix}1_{n}\n"));
  asm.push_str("    push 0\n");
  asm.push_str(&format!("    jmp {prefix}2_{n}\n"));
  asm.push_str(&format!("{prefix}1_{n}:\n"));
  asm.push_str("    push 1\n");
  asm.push_str(&format!("{prefix}2_{n}:\n"));
}

fn emit_footer(state: &CodeGenState, asm: &mut String) {
  asm.push_str("; -- Footer --\n");
  asm.push_str("    mov rax, 60\n");
  asm.push_str("    mov rdi, 0\n");
  asm.push_str("    syscall\n");
  asm.push_str("section .bss\n");
  asm.push_str(&format!("print_buffer: resb {PRINT_BUFFER_SIZE}\n"));
  asm.push_str(&format!("vars_buffer: resb {}\n", state.var_buf_size));
}

fn structure_error<T>(token: &Token, message: &str) -> CompileResult<T> {
  StructureSnafu {
    loc: token.loc.clone(),
    op: token.text.as_str(),
    message,
  }
  .fail()
}
