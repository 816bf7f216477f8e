/*!
  A `Position` identifies one input-consuming point of the positional NFA:
  the index into the regex of the character it consumes, packed into 64 bits
  together with the metadata subset construction needs.

  Layout:

  - bits 0..=47: regex location, or the subpattern index when ACCEPT is set;
  - bits 32..=47: iteration counter for bounded repetitions (overlapping the
    location's high bits, which stay zero for realistic regex lengths);
  - bits 48..=55: flags RES1, RES2, RES3, NEGATE, TICKED, GREEDY, ANCHOR,
    ACCEPT;
  - bits 56..=63: lazy tag, nonzero when the position belongs to a lazy
    quantifier.

  Two positions with equal locations but different iteration counters or
  lazy tags are distinct NFA states. Because the lazy tag occupies the top
  byte, lazy positions sort to the end of a `PositionSet`, which the lazy
  trimming pass relies on.
*/

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use super::{Accept32, Index32, Iteration16, Lazy8};

pub type PositionSet = BTreeSet<Position>;

pub const NPOS: u64 = u64::MAX; //< represents an empty position

// Bit shifts
const ITER_SHIFT: u64 = 32;
const LAZY_SHIFT: u64 = 56;

// Bit masks
const INDEX  : u64 = 0xFFFF_FFFF;        //< regex location; the low 32 bits in practice
const ITER   : u64 = 0xFFFF << ITER_SHIFT;
const RES1   : u64 = 1u64 << 48;         //< reserved
const RES2   : u64 = 1u64 << 49;         //< reserved
const RES3   : u64 = 1u64 << 50;         //< reserved
const NEGATE : u64 = 1u64 << 51;         //< belongs to a negative pattern `(?^X)`
const TICKED : u64 = 1u64 << 52;         //< the closing `)` of a lookahead `(?=X)`
const GREEDY : u64 = 1u64 << 53;         //< force greedy even under a lazy ancestor
const ANCHOR : u64 = 1u64 << 54;         //< follows an anchor (`\b`, `\A`, `^`, ...)
const ACCEPT : u64 = 1u64 << 55;         //< terminal accept marker, not an input position
const LAZY   : u64 = 0xFF << LAZY_SHIFT; //< lazy quantifier tag

#[derive(Ord, PartialOrd, Eq, PartialEq, Copy, Clone, Debug, Hash)]
pub struct Position(pub u64);

impl Position {
  pub fn new() -> Position {
    Position(NPOS)
  }

  // region setters — all return an updated copy

  /// Returns a copy with the iteration counter incremented by `i`.
  pub fn increment_iter(&self, i: Iteration16) -> Position {
    Position(self.0 + ((i as u64) << ITER_SHIFT))
  }

  pub fn set_negate(&self, b: bool) -> Position {
    match b {
      true  => Position(self.0 | NEGATE),
      false => Position(self.0 & !NEGATE),
    }
  }

  pub fn set_ticked(&self, b: bool) -> Position {
    match b {
      true  => Position(self.0 | TICKED),
      false => Position(self.0 & !TICKED),
    }
  }

  pub fn set_greedy(&self, b: bool) -> Position {
    match b {
      true  => Position(self.0 | GREEDY),
      false => Position(self.0 & !GREEDY),
    }
  }

  pub fn set_anchor(&self, b: bool) -> Position {
    match b {
      true  => Position(self.0 | ANCHOR),
      false => Position(self.0 & !ANCHOR),
    }
  }

  pub fn set_accept(&self, b: bool) -> Position {
    match b {
      true  => Position(self.0 | ACCEPT),
      false => Position(self.0 & !ACCEPT),
    }
  }

  /// Places `lazy_value` in the topmost byte.
  pub fn set_lazy<T>(&self, lazy_value: T) -> Position
    where T: Into<u64>
  {
    Position((self.0 & !LAZY) | (lazy_value.into() << LAZY_SHIFT))
  }

  // endregion

  // region getters

  /// The location and iteration counter with all meta bits masked out.
  pub fn index_with_iter(&self) -> Position {
    Position(self.0 & (ITER | INDEX))
  }

  /// The index into the regex this position consumes.
  pub fn idx(&self) -> Index32 {
    (self.0 & INDEX) as Index32
  }

  /// The subpattern index of an ACCEPT position.
  pub fn accepts(&self) -> Accept32 {
    (self.0 & INDEX) as Accept32
  }

  pub fn iterations(&self) -> Iteration16 {
    ((self.0 & ITER) >> ITER_SHIFT) as Iteration16
  }

  /// The lazy tag in the topmost byte; zero means eager.
  pub fn lazy(&self) -> Lazy8 {
    (self.0 >> LAZY_SHIFT) as Lazy8
  }

  pub fn is_negate(&self) -> bool {
    (self.0 & NEGATE) != 0
  }

  pub fn is_ticked(&self) -> bool {
    (self.0 & TICKED) != 0
  }

  pub fn is_greedy(&self) -> bool {
    (self.0 & GREEDY) != 0
  }

  pub fn is_anchor(&self) -> bool {
    (self.0 & ANCHOR) != 0
  }

  pub fn is_accept(&self) -> bool {
    (self.0 & ACCEPT) != 0
  }

  pub fn is_lazy(&self) -> bool {
    (self.0 >> LAZY_SHIFT) != 0
  }

  pub fn is_iterable(&self) -> bool {
    self.iterations() != 0
  }

  // endregion
}

impl Default for Position {
  fn default() -> Position {
    Position(NPOS)
  }
}

/// Transforming an `Index32` into a `Position` is common.
impl From<Index32> for Position {
  fn from(val: Index32) -> Self {
    Position(val as u64)
  }
}

impl From<Position> for u64 {
  fn from(p: Position) -> Self {
    p.0
  }
}

impl Display for Position {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let mut formatted = String::new();

    if self.is_accept() {
      formatted.push_str(&format!("({})", self.accepts()));
      if self.is_negate() {
        formatted.push('^');
      }
    } else {
      formatted.push_str(&format!("{}", self.idx()));
      if self.is_iterable() {
        formatted.push_str(&format!(".{}", self.iterations()));
      }
    }
    if self.is_lazy() {
      formatted.push_str(&format!("?{}", self.lazy()));
    }
    if self.is_anchor() {
      formatted.push('^');
    }
    if self.is_greedy() {
      formatted.push('!');
    }
    if self.is_ticked() {
      formatted.push('\'');
    }

    write!(f, "{}", formatted)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn idx_and_accepts() {
    let mut position = Position(65);
    assert_eq!(position.idx(), 65);
    assert_eq!(position.idx(), position.accepts());

    // non-interference by other attributes
    position = position.set_accept(true);
    assert_eq!(position.idx(), 65);

    position = position.set_lazy(255u8);
    assert_eq!(position.idx(), 65);
  }

  #[test]
  fn flags() {
    let p = Position(65);
    assert!(p.set_accept(true).is_accept());
    assert!(p.set_anchor(true).is_anchor());
    assert!(p.set_greedy(true).is_greedy());
    assert!(p.set_ticked(true).is_ticked());
    assert!(p.set_negate(true).is_negate());
    assert!(!p.is_accept() && !p.is_anchor() && !p.is_greedy() && !p.is_ticked() && !p.is_negate());
    assert!(!p.set_negate(true).set_negate(false).is_negate());
  }

  #[test]
  fn iterable() {
    let mut position = Position(65);
    assert!(!position.is_iterable());
    position = position.increment_iter(37);
    assert!(position.is_iterable());
    assert_eq!(position.iterations(), 37);
    assert_eq!(position.idx(), 65);
  }

  #[test]
  fn lazy() {
    let mut position = Position(65);
    assert!(!position.is_lazy());
    position = position.set_lazy(24u8);
    assert!(position.is_lazy());
    assert_eq!(position.lazy(), 24);
    assert_eq!(position.set_lazy(0u8).lazy(), 0);
  }

  #[test]
  fn lazy_positions_sort_last() {
    let mut set = PositionSet::new();
    set.insert(Position(10));
    set.insert(Position(3).set_lazy(1u8));
    set.insert(Position(900));
    let last = *set.iter().next_back().unwrap();
    assert!(last.is_lazy());
    assert_eq!(last.idx(), 3);
  }
}
