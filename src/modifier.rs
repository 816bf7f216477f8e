/*!
  Modifiers map each inline mode to the set of regex locations at which the
  mode is active, so `(?i:...)` can flip case sensitivity for just a span of
  the pattern.

  Enables and disables are recorded separately, and an update only claims
  the locations its reverse-case set has not already claimed. Because inner
  groups apply their modifiers before enclosing ones (and the global options
  apply last), the innermost mode wins at every location.
*/

#![allow(non_camel_case_types)]

use std::ops::{Bound, RangeBounds};

use ranges::GenericRange;

use crate::{Index32, IndexRanges};

/**
  `Mode` variants indicate which value of which mode should be set or reset.
  A capital letter means "turn off over the given range", not "turn off
  everywhere else".
*/
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Mode {
  q, Q, i, I, s, S, m, M, x, X,
}

impl Mode {
  /// The letter form, `(?i)` style.
  pub fn letter(self) -> char {
    match self {
      Mode::q => 'q',
      Mode::Q => 'Q',
      Mode::i => 'i',
      Mode::I => 'I',
      Mode::s => 's',
      Mode::S => 'S',
      Mode::m => 'm',
      Mode::M => 'M',
      Mode::x => 'x',
      Mode::X => 'X',
    }
  }

  /// Whether this variant enables (lowercase) or disables (uppercase).
  pub fn enables(self) -> bool {
    matches!(self, Mode::q | Mode::i | Mode::s | Mode::m | Mode::x)
  }

  /// The variant with the opposite sense, `i` ↔ `I`.
  pub fn reversed(self) -> Mode {
    match self {
      Mode::q => Mode::Q,
      Mode::Q => Mode::q,
      Mode::i => Mode::I,
      Mode::I => Mode::i,
      Mode::s => Mode::S,
      Mode::S => Mode::s,
      Mode::m => Mode::M,
      Mode::M => Mode::m,
      Mode::x => Mode::X,
      Mode::X => Mode::x,
    }
  }

  pub fn try_from_char(c: char) -> Option<Mode> {
    match c {
      'q' => Some(Mode::q),
      'Q' => Some(Mode::Q),
      'i' => Some(Mode::i),
      'I' => Some(Mode::I),
      's' => Some(Mode::s),
      'S' => Some(Mode::S),
      'm' => Some(Mode::m),
      'M' => Some(Mode::M),
      'x' => Some(Mode::x),
      'X' => Some(Mode::X),
      _   => None,
    }
  }
}

/// Per-mode location ranges, enables and disables kept apart.
#[derive(Clone, Debug)]
pub struct Modifiers {
  q_on: IndexRanges, q_off: IndexRanges,
  i_on: IndexRanges, i_off: IndexRanges,
  s_on: IndexRanges, s_off: IndexRanges,
  m_on: IndexRanges, m_off: IndexRanges,
  x_on: IndexRanges, x_off: IndexRanges,
}

impl Default for Modifiers {
  fn default() -> Modifiers {
    Modifiers {
      q_on: IndexRanges::new(), q_off: IndexRanges::new(),
      i_on: IndexRanges::new(), i_off: IndexRanges::new(),
      s_on: IndexRanges::new(), s_off: IndexRanges::new(),
      m_on: IndexRanges::new(), m_off: IndexRanges::new(),
      x_on: IndexRanges::new(), x_off: IndexRanges::new(),
    }
  }
}

impl Modifiers {
  /**
    Claims `range` for `mode`, except where the reverse-case set already
    claimed locations: an earlier `(?-i:...)` keeps its hole when the
    enclosing `(?i:...)` or the global default is applied afterwards.
  */
  pub fn set<R, M>(&mut self, into_mode: M, range: R)
    where R: Into<GenericRange<Index32>>,
          M: Into<Mode>,
  {
    let mode: Mode = into_mode.into();
    let (start, stop) = range_bounds(&range.into());
    if start >= stop {
      return;
    }

    let mut pieces: Vec<(Index32, Index32)> = Vec::new();
    subtract(start, stop, self.ranges_for_mode(mode.reversed()), &mut pieces);

    let target = self.ranges_for_mode_mut(mode);
    for (a, b) in pieces {
      target.insert(GenericRange::from(a..b));
    }
  }

  /// Reports whether `mode` was claimed at location `index`.
  pub fn is_set(&self, index: Index32, mode: Mode) -> bool {
    self.ranges_for_mode(mode).contains(&index)
  }

  fn ranges_for_mode_mut(&mut self, mode: Mode) -> &mut IndexRanges {
    match mode {
      Mode::q => &mut self.q_on,
      Mode::Q => &mut self.q_off,
      Mode::i => &mut self.i_on,
      Mode::I => &mut self.i_off,
      Mode::s => &mut self.s_on,
      Mode::S => &mut self.s_off,
      Mode::m => &mut self.m_on,
      Mode::M => &mut self.m_off,
      Mode::x => &mut self.x_on,
      Mode::X => &mut self.x_off,
    }
  }

  fn ranges_for_mode(&self, mode: Mode) -> &IndexRanges {
    match mode {
      Mode::q => &self.q_on,
      Mode::Q => &self.q_off,
      Mode::i => &self.i_on,
      Mode::I => &self.i_off,
      Mode::s => &self.s_on,
      Mode::S => &self.s_off,
      Mode::m => &self.m_on,
      Mode::M => &self.m_off,
      Mode::x => &self.x_on,
      Mode::X => &self.x_off,
    }
  }
}

/// Concrete `[start, stop)` bounds of a location range.
pub(crate) fn range_bounds(range: &GenericRange<Index32>) -> (Index32, Index32) {
  let start = match range.start_bound() {
    Bound::Included(&s) => s,
    Bound::Excluded(&s) => s + 1,
    Bound::Unbounded => 0,
  };
  let stop = match range.end_bound() {
    Bound::Included(&e) => e.saturating_add(1),
    Bound::Excluded(&e) => e,
    Bound::Unbounded => Index32::MAX,
  };
  (start, stop)
}

/// Appends the pieces of `[start, stop)` not covered by `cut` to `out`.
fn subtract(
  start: Index32,
  stop: Index32,
  cut: &IndexRanges,
  out: &mut Vec<(Index32, Index32)>,
) {
  let mut s = start;
  for range in cut.as_slice() {
    let (cut_start, cut_stop) = range_bounds(range);
    if cut_stop <= s {
      continue;
    }
    if cut_start >= stop {
      break;
    }
    if cut_start > s {
      out.push((s, cut_start));
    }
    s = s.max(cut_stop);
    if s >= stop {
      return;
    }
  }
  if s < stop {
    out.push((s, stop));
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn set_and_query() {
    let mut modifiers = Modifiers::default();
    modifiers.set(Mode::i, 2..10);
    assert!(modifiers.is_set(2, Mode::i));
    assert!(modifiers.is_set(9, Mode::i));
    assert!(!modifiers.is_set(10, Mode::i));
    assert!(!modifiers.is_set(5, Mode::m));
  }

  #[test]
  fn earlier_disable_keeps_its_hole() {
    // (?-i:...) inside a global (?i): the inner disable applies first
    let mut modifiers = Modifiers::default();
    modifiers.set(Mode::I, 5..8);
    modifiers.set(Mode::i, 0..20);
    assert!(modifiers.is_set(4, Mode::i));
    assert!(!modifiers.is_set(6, Mode::i));
    assert!(modifiers.is_set(8, Mode::i));
  }

  #[test]
  fn earlier_enable_keeps_its_claim() {
    // (?i:...) inside a wider disable
    let mut modifiers = Modifiers::default();
    modifiers.set(Mode::i, 5..8);
    modifiers.set(Mode::I, 0..20);
    assert!(modifiers.is_set(6, Mode::i));
    assert!(!modifiers.is_set(3, Mode::i));
  }

  #[test]
  fn disjoint_ranges_union() {
    let mut modifiers = Modifiers::default();
    modifiers.set(Mode::s, 0..3);
    modifiers.set(Mode::s, 7..9);
    assert!(modifiers.is_set(1, Mode::s));
    assert!(!modifiers.is_set(5, Mode::s));
    assert!(modifiers.is_set(8, Mode::s));
  }

  #[test]
  fn reversal() {
    assert_eq!(Mode::i.reversed(), Mode::I);
    assert_eq!(Mode::X.reversed(), Mode::x);
    assert!(Mode::m.enables());
    assert!(!Mode::M.enables());
  }
}
