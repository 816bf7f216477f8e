/*!
  The match predictor: compact tables a runtime can consult to reject an
  input position before invoking the scanner.

  Generation walks the DFA breadth-first for up to eight levels from the
  point where the literal prefix chain ends, clearing one bit per level in
  the tables:

  - a 256-entry bitap array over first bytes,
  - a 4096-entry hash array `pmh` indexed by the rolling hash of up to 8
    consecutive bytes (used when the shortest pattern is at least 4 long),
  - a 4096-entry two-bit-lane array `pma` yielding a conservative skip
    distance of 0..4 (used for shorter patterns).

  A set bit means "no match can pass through here"; predictions err on the
  permissive side, never the rejecting side.
*/

use std::collections::HashMap;
use std::ops::{Bound, RangeBounds};

use ranges::{GenericRange, Ranges};

use crate::character::Char;
use crate::limits::HASH_MAX_IDX;
use crate::state::{Dfa, StateId, NO_STATE};
use crate::Hash16;

/// The rolling predictor hash.
pub fn hash_byte(h: Hash16, b: u8) -> Hash16 {
  ((h << 3) ^ b as Hash16) & (HASH_MAX_IDX as Hash16 - 1)
}

#[derive(Debug, Clone)]
pub struct Predictor {
  pub(crate) prefix : Vec<u8>, //< literal prefix all matches start with, ≤ 255 bytes
  pub(crate) min    : u8,      //< shortest post-prefix pattern length, 0..8
  pub(crate) one    : bool,    //< the pattern is exactly the prefix string
  pub(crate) bitap  : [u8; 256],
  pub(crate) pmh    : Box<[u8; HASH_MAX_IDX]>, //< hash-predict array, min ≥ 4
  pub(crate) pma    : Box<[u8; HASH_MAX_IDX]>, //< lane-predict array, min < 4
}

impl Predictor {
  fn empty() -> Predictor {
    Predictor {
      prefix: Vec::new(),
      min: 0,
      one: false,
      bitap: [0xFF; 256],
      pmh: Box::new([0xFF; HASH_MAX_IDX]),
      pma: Box::new([0xFF; HASH_MAX_IDX]),
    }
  }

  pub fn prefix(&self) -> &[u8] {
    &self.prefix
  }

  pub fn min_length(&self) -> u8 {
    self.min
  }

  pub fn is_one_string(&self) -> bool {
    self.one
  }

  /**
    Hash-based prediction over `s` (at least 4 bytes): `false` only when no
    match can begin at the probed position; `true` is always permissive.
  */
  pub fn predict_match_hash(&self, s: &[u8]) -> bool {
    if s.len() < 4 {
      return true;
    }
    let mut h: Hash16 = s[0] as Hash16;
    if self.pmh[h as usize] & 1 != 0 {
      return false;
    }
    h = hash_byte(h, s[1]);
    if self.pmh[h as usize] & 2 != 0 {
      return false;
    }
    h = hash_byte(h, s[2]);
    if self.pmh[h as usize] & 4 != 0 {
      return false;
    }
    h = hash_byte(h, s[3]);
    if self.pmh[h as usize] & 8 != 0 {
      return false;
    }
    let mut m: u8 = 16;
    let stop = s.len() - 3;
    let mut i = 4;
    while i < stop {
      h = hash_byte(h, s[i]);
      if self.pmh[h as usize] & m != 0 {
        return false;
      }
      m = m.wrapping_shl(1);
      i += 1;
    }
    true
  }

  /**
    Lane-based prediction over `s[0..4]`: returns 0 when a match is
    predicted here, otherwise a conservative skip distance 1..=4.
  */
  pub fn predict_match_array(&self, s: &[u8]) -> usize {
    if s.len() < 4 {
      return 0;
    }
    let b0 = s[0];
    let b1 = s[1];
    let b2 = s[2];
    let b3 = s[3];
    let h1 = hash_byte(b0 as Hash16, b1);
    let h2 = hash_byte(h1, b2);
    let h3 = hash_byte(h2, b3);
    let a0 = self.pma[b0 as usize];
    let a1 = self.pma[h1 as usize];
    let a2 = self.pma[h2 as usize];
    let a3 = self.pma[h3 as usize];
    let p = (a0 & 0xC0) | (a1 & 0x30) | (a2 & 0x0C) | (a3 & 0x03);
    let m = (((((p >> 2) | p) >> 2) | p) >> 1) | p;
    if m != 0xFF {
      return 0;
    }
    if (self.pma[b1 as usize] & 0xC0) != 0xC0 {
      return 1;
    }
    if (self.pma[b2 as usize] & 0xC0) != 0xC0 {
      return 2;
    }
    if (self.pma[b3 as usize] & 0xC0) != 0xC0 {
      return 3;
    }
    4
  }

  /**
    The byte-array form of the predictor: prefix length, flags byte (low
    nibble = `min`, bit 4 = one-string mode), the prefix, a bitap block when
    `min > 1` without a prefix, then the complemented `pmh` (`min >= 4`) or
    `pma` (`min > 0`) block.
  */
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + self.prefix.len());
    out.push(self.prefix.len() as u8);
    out.push((self.min & 0x0F) | ((self.one as u8) << 4));
    out.extend_from_slice(&self.prefix);
    if self.min > 1 && self.prefix.is_empty() {
      out.extend(self.bitap.iter().map(|&v| !v));
    }
    if self.min >= 4 {
      out.extend(self.pmh.iter().map(|&v| !v));
    } else if self.min > 0 {
      out.extend(self.pma.iter().map(|&v| !v));
    }
    out
  }

  /// Reads back the `to_bytes` form.
  pub fn from_bytes(bytes: &[u8]) -> Option<Predictor> {
    if bytes.len() < 2 {
      return None;
    }
    let len = bytes[0] as usize;
    let min = bytes[1] & 0x0F;
    let one = bytes[1] & 0x10 != 0;
    let mut at = 2;

    let mut predictor = Predictor::empty();
    predictor.min = min;
    predictor.one = one;
    predictor.prefix = bytes.get(at..at + len)?.to_vec();
    at += len;

    if min > 1 && len == 0 {
      let block = bytes.get(at..at + 256)?;
      for (i, &v) in block.iter().enumerate() {
        predictor.bitap[i] = !v;
      }
      at += 256;
    }
    if min > 0 {
      let block = bytes.get(at..at + HASH_MAX_IDX)?;
      let into: &mut [u8; HASH_MAX_IDX] = match min >= 4 {
        true  => &mut predictor.pmh,
        false => &mut predictor.pma,
      };
      for (i, &v) in block.iter().enumerate() {
        into[i] = !v;
      }
    }
    Some(predictor)
  }

  /// Serialized size of the `to_bytes` form.
  pub fn byte_len(&self) -> usize {
    2 + self.prefix.len()
        + ((self.min > 1 && self.prefix.is_empty()) as usize) * 256
        + ((self.min > 0) as usize) * HASH_MAX_IDX
  }
}

/// Builds the predictor for a compiled DFA.
pub(crate) fn generate(dfa: &Dfa, start: StateId) -> Predictor {
  let mut predictor = Predictor::empty();

  // follow the single-string chain to collect the literal prefix
  let mut one = true;
  let mut state = start;
  loop {
    let s = dfa.get(state);
    if s.accept != 0 {
      break;
    }
    if s.edges.len() != 1 {
      one = false;
      break;
    }
    let (lo, hi, next) = match s.edges.iter().next() {
      Some((&lo, &(hi, next))) => (lo, hi, next),
      None => {
        one = false;
        break;
      }
    };
    if lo.is_meta() || lo != hi || next == NO_STATE || predictor.prefix.len() >= 255 {
      one = false;
      break;
    }
    predictor.prefix.push(u8::from(lo));
    state = next;
  }
  {
    let s = dfa.get(state);
    if s.accept != 0 && !s.edges.is_empty() {
      one = false;
    }
  }
  predictor.one = one;

  if dfa.get(state).accept == 0 {
    gen_predict_match(dfa, state, &mut predictor);
  }

  debug_log!(
    "predictor: prefix {} bytes, min {}, one {}",
    predictor.prefix.len(),
    predictor.min,
    predictor.one
  );
  predictor
}

const LEVEL_COUNT: usize = 8;

type LevelMap = HashMap<StateId, Ranges<Hash16>>;

fn gen_predict_match(dfa: &Dfa, state: StateId, predictor: &mut Predictor) {
  predictor.min = LEVEL_COUNT as u8;

  let mut previous: LevelMap = LevelMap::new();
  gen_predict_match_transitions(dfa, 0, state, None, &mut previous, predictor);

  for level in 1..LEVEL_COUNT {
    let mut next_level: LevelMap = LevelMap::new();
    for (s, labels) in previous.iter() {
      gen_predict_match_transitions(dfa, level, *s, Some(labels), &mut next_level, predictor);
    }
    previous = next_level;
  }

  // knowing the min pattern length lets the runtime reject short windows
  // outright, so mask every lane above it
  let constant = match 1u8.checked_shl(predictor.min as u32) {
    Some(bit) => bit.wrapping_sub(1),
    None => 0xFF,
  };
  for value in predictor.bitap.iter_mut() {
    *value &= constant;
  }
}

fn gen_predict_match_transitions(
  dfa: &Dfa,
  level: usize,
  state: StateId,
  labels: Option<&Ranges<Hash16>>,
  next_states: &mut LevelMap,
  predictor: &mut Predictor,
) {
  for (&lo, &(hi, target)) in dfa.get(state).edges.iter() {
    if lo.is_meta() {
      // edges sort metas last; a pattern running into metas this early has
      // no usable minimum
      if level == 0 {
        predictor.min = 0;
      }
      break;
    }

    let mut next = match level < LEVEL_COUNT - 1 {
      true  => target,
      false => NO_STATE,
    };
    let mut accept = next == NO_STATE || dfa.get(next).accept != 0;

    if !accept {
      let next_state = dfa.get(next);
      let mut first = true;
      for (c, _) in next_state.edges.iter() {
        if c.is_meta() {
          if first {
            next = NO_STATE; // nothing but meta tests beyond this point
          }
          accept = true;
          break;
        }
        first = false;
      }
    } else if next != NO_STATE && dfa.get(next).edges.is_empty() {
      next = NO_STATE;
    }

    if accept && (level == 0 || predictor.min > level as u8) {
      predictor.min = level as u8 + 1;
    }

    if level == 0 {
      for c in lo.0..=hi.0 {
        predictor.bitap[c as usize] &= !1;
        predictor.pmh[c as usize] &= !1;
        if accept {
          predictor.pma[c as usize] &= !(1 << 7);
        }
        predictor.pma[c as usize] &= !(1 << 6);
        if next != NO_STATE {
          let h = Char(c).hashed();
          next_states
              .entry(next)
              .or_insert_with(Ranges::new)
              .insert(GenericRange::from(h..=h));
        }
      }
      continue;
    }

    let labels = match labels {
      Some(labels) => labels,
      None => continue,
    };

    if level < 4 || level as u8 <= predictor.min {
      if level as u8 <= predictor.min {
        for c in lo.0..=hi.0 {
          predictor.bitap[c as usize] &= !(1 << level);
        }
      }
      for range in labels.as_slice() {
        let (label_lo, label_hi) = range_bounds16(range);
        for label in label_lo..label_hi {
          for c in lo.0..=hi.0 {
            let h = hash_byte(label, c as u8);
            predictor.pmh[h as usize] &= !(1 << level);
            if level < 4 {
              if level == 3 || accept {
                predictor.pma[h as usize] &= !(1u8 << (7 - 2 * level));
              }
              predictor.pma[h as usize] &= !(1u8 << (6 - 2 * level));
            }
            if next != NO_STATE {
              let hh = Char(h).hashed();
              next_states
                  .entry(next)
                  .or_insert_with(Ranges::new)
                  .insert(GenericRange::from(hh..=hh));
            }
          }
        }
      }
    }
  }
}

/// Concrete `[start, stop)` bounds of a label range.
fn range_bounds16(range: &GenericRange<Hash16>) -> (Hash16, Hash16) {
  let start = match range.start_bound() {
    Bound::Included(&s) => s,
    Bound::Excluded(&s) => s + 1,
    Bound::Unbounded => 0,
  };
  let stop = match range.end_bound() {
    Bound::Included(&e) => e.saturating_add(1),
    Bound::Excluded(&e) => e,
    Bound::Unbounded => Hash16::MAX,
  };
  (start, stop)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::compiler::Compiler;
  use crate::parser::Parser;

  fn predictor_for(regex: &str) -> Predictor {
    let parser = Parser::new(regex, "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();
    generate(&compiler.dfa, compiler.start)
  }

  #[test]
  fn single_string_prefix() {
    let p = predictor_for("hello");
    assert_eq!(p.prefix(), b"hello");
    assert!(p.is_one_string());
  }

  #[test]
  fn branching_pattern_has_tables() {
    let p = predictor_for("(abcd|axyz)k");
    assert!(!p.is_one_string());
    assert_eq!(p.prefix(), b"a");
    assert!(p.min_length() >= 4);
    // hash prediction accepts real matches
    assert!(p.predict_match_hash(b"bcdk"));
    assert!(p.predict_match_hash(b"xyzk"));
    // and rejects a first byte the pattern can never continue with
    assert!(!p.predict_match_hash(b"qqqq"));
  }

  #[test]
  fn short_pattern_uses_lane_array() {
    let p = predictor_for("ab|cd");
    assert!(p.min_length() >= 1 && p.min_length() < 4);
    // soundness: positions where a match begins predict 0
    assert_eq!(p.predict_match_array(b"abxx"), 0);
    assert_eq!(p.predict_match_array(b"cdxx"), 0);
    // a window that cannot match anywhere may skip the full distance
    assert!(p.predict_match_array(b"qqqq") > 0);
  }

  #[test]
  fn serialization_roundtrip() {
    let p = predictor_for("(abcd|axyz)k");
    let bytes = p.to_bytes();
    assert_eq!(bytes.len(), p.byte_len());
    let q = Predictor::from_bytes(&bytes).unwrap();
    assert_eq!(q.prefix(), p.prefix());
    assert_eq!(q.min_length(), p.min_length());
    assert_eq!(q.is_one_string(), p.is_one_string());
    assert_eq!(&q.pmh[..], &p.pmh[..]);
  }

  #[test]
  fn rolling_hash_stays_in_table() {
    let mut h: Hash16 = 0xFFFF & 0xFF;
    for b in 0..=255u8 {
      h = hash_byte(h, b);
      assert!((h as usize) < HASH_MAX_IDX);
    }
  }
}
