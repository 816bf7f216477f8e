/*!
  The two-pass assembler: pass one assigns each state its opcode offset
  assuming short (32-bit) GOTOs; if the table crosses the 16-bit index
  horizon a re-sizing pass widens the jumps that need a LONG escape (a
  forward jump beyond 32Ki words or a backward jump beyond 64Ki), and the
  final pass emits the words. Every state block is terminated by HALT.
*/

use crate::error::RegexError;
use crate::opcode::{bitmasks, opcode_goto, opcode_head, opcode_long, opcode_take, opcode_tail,
                    Opcode};
use crate::state::{Dfa, StateId, NO_STATE};
use crate::{limits, Index32};

pub(crate) fn valid_goto_index(index: Index32) -> bool {
  index <= limits::GOTO_MAX_IDX
}

pub(crate) fn valid_take_index(index: Index32) -> bool {
  index <= limits::ACCEPT_MAX
}

pub(crate) fn valid_lookahead_index(index: Index32) -> bool {
  index <= limits::LOOKAHEAD_MAX_IDX
}

/// Number of opcodes state `s` contributes besides its edges.
fn fixed_words(dfa: &Dfa, s: StateId) -> Index32 {
  let state = dfa.get(s);
  ((state.redo || state.accept > 0) as usize + state.heads.len() + state.tails.len() + 1) as Index32
}

/// Whether the edge from `s` to `target` needs the 64-bit LONG form, given
/// the short-form offsets of pass one.
fn use_long(dfa: &Dfa, s: StateId, target: StateId) -> bool {
  if target == NO_STATE {
    return false;
  }
  let from_first = dfa.get(s).first;
  let to = dfa.get(target);
  (to.first > from_first && to.first >= bitmasks::LONG_MARKER / 2)
      || to.index >= bitmasks::LONG_MARKER
}

pub(crate) fn encode_dfa(dfa: &mut Dfa, regex_len: Index32) -> Result<Vec<Opcode>, RegexError> {
  // pass 1: short-form offsets
  let mut count: Index32 = 0;
  for i in 0..dfa.len() {
    let s = i as StateId;
    {
      let state = dfa.get_mut(s);
      state.accept = state.accept.min(limits::ACCEPT_MAX);
      state.first = count;
      state.index = count;
    }
    count += fixed_words(dfa, s) + dfa.get(s).edges.len() as Index32;
    if !valid_goto_index(count) {
      return Err(RegexError::ExceedsLimits(regex_len));
    }
  }

  // pass 2: widen jumps that cannot reach their target in 16 bits. The
  // `first` offsets stay as sized by pass one; `index` becomes final.
  let long_mode = count > bitmasks::LONG_MARKER;
  if long_mode {
    count = 0;
    for i in 0..dfa.len() {
      let s = i as StateId;
      dfa.get_mut(s).index = count;

      let mut words = fixed_words(dfa, s);
      let targets: Vec<StateId> =
          dfa.get(s).edges.values().map(|&(_, target)| target).collect();
      for target in targets {
        words += match use_long(dfa, s, target) {
          true  => 2,
          false => 1,
        };
      }
      count += words;
      if !valid_goto_index(count) {
        return Err(RegexError::ExceedsLimits(regex_len));
      }
    }
  }

  // pass 3: emit
  let mut table: Vec<Opcode> = Vec::with_capacity(count as usize);
  for i in 0..dfa.len() {
    let s = i as StateId;
    let state = dfa.get(s);
    debug_assert_eq!(table.len() as Index32, state.index);

    if state.redo {
      table.push(Opcode::redo());
    } else if state.accept > 0 {
      if !valid_take_index(state.accept) {
        return Err(RegexError::ExceedsLimits(regex_len));
      }
      table.push(opcode_take(state.accept));
    }
    for &tail in state.tails.iter() {
      if !valid_lookahead_index(tail as Index32) {
        return Err(RegexError::ExceedsLimits(regex_len));
      }
      table.push(opcode_tail(tail as Index32));
    }
    for &head in state.heads.iter() {
      table.push(opcode_head(head as Index32));
    }

    // highest ranges first, which puts the meta edges ahead of the bytes
    let edges: Vec<_> = state
        .edges
        .iter()
        .rev()
        .map(|(&lo, &(hi, target))| (lo, hi, target))
        .collect();
    for (lo, hi, target) in edges {
      if target == NO_STATE {
        table.push(opcode_goto(lo, hi, bitmasks::HALT_MARKER));
      } else if long_mode && use_long(dfa, s, target) {
        table.push(opcode_goto(lo, hi, bitmasks::LONG_MARKER));
        table.push(opcode_long(dfa.get(target).index));
      } else {
        table.push(opcode_goto(lo, hi, dfa.get(target).index));
      }
    }

    table.push(Opcode::halt());
  }

  debug_log!("encode_dfa(): {} opcodes", table.len());
  Ok(table)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::compiler::Compiler;
  use crate::parser::Parser;

  fn assemble(regex: &str) -> Vec<Opcode> {
    let parser = Parser::new(regex, "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();
    compiler.assemble().unwrap()
  }

  #[test]
  fn every_state_block_ends_with_halt() {
    let table = assemble("ab|xy");
    assert!(table.last().unwrap().is_halt());
    assert!(table.iter().any(|op| op.is_take()));
  }

  #[test]
  fn assembly_is_idempotent() {
    let a = assemble("(a|b)*abb|[0-9]+");
    let b = assemble("(a|b)*abb|[0-9]+");
    assert_eq!(a, b);
  }

  #[test]
  fn offsets_match_emission() {
    let parser = Parser::new("a(b|c)d*e", "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();
    let table = compiler.assemble().unwrap();

    // each state's recorded index points at the first opcode of its block
    let halts = table.iter().filter(|op| op.is_halt()).count();
    assert_eq!(halts, compiler.dfa.len());
    for state in compiler.dfa.states.iter() {
      assert!((state.index as usize) < table.len());
    }
  }
}
