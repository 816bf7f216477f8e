/*!
  A `Char` is a `u16` covering the 8-bit input alphabet plus the meta
  characters:

  | Value | Meaning |
  |------:|:--------|
  | `0-255`   | ordinary input bytes |
  | `256`     | `MIN`, sentinel below the meta characters |
  | `257-269` | the meta characters listed in the `Meta` mod, standing for zero-width conditions like "beginning of line" |
  | `270`     | `MAX`, sentinel above the meta characters |

  The meta characters here are scanner-state conditions, not the syntactic
  metacharacters of regex notation (`*`, `.`, `$`, ...).
*/

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use super::Hash16;
use crate::limits;

pub const ASCII_ESCAPES: &[u8; 7] = b"abtnvfr";

/// Meta characters represent the zero-width conditions a scanner can test.
#[allow(non_snake_case)]
pub mod Meta {
  #![allow(non_upper_case_globals)]
  use super::Char;

  pub const MIN               : Char = Char(0x100); //< sentinel below the meta characters
  pub const NonWordBoundary   : Char = Char(0x101); //< non-word boundary at begin; `\Bx`
  pub const NonWordEnd        : Char = Char(0x102); //< non-word boundary at end; `x\B`
  /// Beginning of word at begin; `\<x` where `\bx = (\<|\>)x`
  pub const BeginWordBegin    : Char = Char(0x103);
  pub const EndWordBegin      : Char = Char(0x104); //< end of word at begin; `\>x`
  /// Beginning of word at end; `x\<` where `x\b = x(\<|\>)`
  pub const BeginWordEnd      : Char = Char(0x105);
  pub const EndWordEnd        : Char = Char(0x106); //< end of word at end; `x\>`
  pub const BeginningOfLine   : Char = Char(0x107); //< beginning of line; `^`
  pub const EndOfLine         : Char = Char(0x108); //< end of line; `$`
  pub const BeginningOfBuffer : Char = Char(0x109); //< beginning of buffer; `\A`
  pub const EndOfBuffer       : Char = Char(0x10A); //< end of buffer; `\Z`
  pub const UndentBoundary    : Char = Char(0x10B); //< undent boundary; `\k`
  /// Indent boundary; `\i` (one less than the largest meta code)
  pub const IndentBoundary    : Char = Char(0x10C);
  /// Dedent boundary; `\j` (must be the largest meta code)
  pub const DedentBoundary    : Char = Char(0x10D);
  pub const MAX               : Char = Char(0x10E); //< sentinel above the meta characters
}

pub fn meta_char_as_str(c: Char) -> &'static str {
  match c {
    Meta::NonWordBoundary   => "NWB",
    Meta::NonWordEnd        => "NWE",
    Meta::BeginWordBegin    => "BWB",
    Meta::EndWordBegin      => "EWB",
    Meta::BeginWordEnd      => "BWE",
    Meta::EndWordEnd        => "EWE",
    Meta::BeginningOfLine   => "BOL",
    Meta::EndOfLine         => "EOL",
    Meta::BeginningOfBuffer => "BOB",
    Meta::EndOfBuffer       => "EOB",
    Meta::UndentBoundary    => "UND",
    Meta::IndentBoundary    => "IND",
    Meta::DedentBoundary    => "DED",
    _                       => "",
  }
}

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct Char(pub u16);

impl Char {
  /// Converts an escaped character (without the backslash) into the control
  /// character it represents, e.g. `n` into `\n`.
  pub fn try_from_escape(c: Char) -> Option<Char> {
    ASCII_ESCAPES
        .iter()
        .position(|&x| Char::from(x) == c)
        .map(|index| Char::from(index as u8 + 0x07)) // 0x07 is '\a'
  }

  /// If `self.is_alphabetic()`, returns `self` with case inverted; otherwise
  /// just returns `self`.
  pub fn toggle_case(&self) -> Self {
    if self.is_alphabetic() {
      Char(self.0 ^ 0b0010_0000u16)
    } else {
      *self
    }
  }

  pub fn is_alphabetic(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_alphabetic()
  }

  pub fn is_uppercase(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_uppercase()
  }

  pub fn is_lowercase(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_lowercase()
  }

  pub fn is_digit(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_digit()
  }

  pub fn is_hexdigit(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_hexdigit()
  }

  pub fn is_whitespace(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_whitespace()
  }

  pub fn is_graphic(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_graphic()
  }

  pub fn is_alphanumeric(&self) -> bool {
    !self.is_meta() && (self.0 as u8).is_ascii_alphanumeric()
  }

  pub fn is_word(&self) -> bool {
    self.is_alphanumeric() || *self == '_'
  }

  pub fn to_lowercase(&self) -> Char {
    if !self.is_meta() {
      (self.0 as u8).to_ascii_lowercase().into()
    } else {
      *self
    }
  }

  pub fn to_uppercase(&self) -> Char {
    if !self.is_meta() {
      (self.0 as u8).to_ascii_uppercase().into()
    } else {
      *self
    }
  }

  /// The 9-bit hash seeding the predictor's rolling hash; keeps the low bits
  /// that survive `hash_byte`'s mask.
  pub fn hashed(&self) -> Hash16 {
    self.0 & ((limits::HASH_MAX_IDX as Hash16 - 1) >> 3)
  }

  pub fn is_meta(&self) -> bool {
    *self > Meta::MIN
  }
}

impl Display for Char {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.is_meta() {
      true  => write!(f, "{}", meta_char_as_str(*self)),
      false => write!(f, "{}", char::from(*self)),
    }
  }
}

// region `From` impls

impl From<char> for Char {
  fn from(c: char) -> Self {
    Char::from(c as u8)
  }
}

impl From<u8> for Char {
  fn from(b: u8) -> Self {
    Char(b as u16)
  }
}

impl From<usize> for Char {
  fn from(b: usize) -> Self {
    Char(b as u16)
  }
}

impl From<Char> for char {
  fn from(c: Char) -> Self {
    (c.0 as u8) as char
  }
}

impl From<Char> for u8 {
  fn from(c: Char) -> Self {
    c.0 as u8
  }
}

impl From<Char> for u32 {
  fn from(c: Char) -> Self {
    c.0 as u32
  }
}

impl From<Char> for usize {
  fn from(c: Char) -> Self {
    c.0 as usize
  }
}

// endregion

// region comparisons with `char`

impl std::cmp::PartialEq<char> for Char {
  fn eq(&self, other: &char) -> bool {
    self.0.eq(&(*other as u16))
  }
}

impl std::cmp::PartialOrd<char> for Char {
  fn partial_cmp(&self, other: &char) -> Option<Ordering> {
    self.0.partial_cmp(&(*other as u16))
  }
}

impl std::cmp::PartialEq<char> for &Char {
  fn eq(&self, other: &char) -> bool {
    self.0.eq(&(*other as u16))
  }
}

// endregion

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn escapes() {
    assert_eq!(Char::try_from_escape(Char::from('n')), Some(Char::from('\n')));
    assert_eq!(Char::try_from_escape(Char::from('t')), Some(Char::from('\t')));
    assert_eq!(Char::try_from_escape(Char::from('q')), None);
  }

  #[test]
  fn case_toggling() {
    assert_eq!(Char::from('a').toggle_case(), Char::from('A'));
    assert_eq!(Char::from('Z').toggle_case(), Char::from('z'));
    assert_eq!(Char::from('4').toggle_case(), Char::from('4'));
  }

  #[test]
  fn meta_partition() {
    assert!(!Char(0xFF).is_meta());
    assert!(!Meta::MIN.is_meta());
    assert!(Meta::BeginningOfLine.is_meta());
    assert!(Meta::DedentBoundary.is_meta());
    assert_eq!(meta_char_as_str(Meta::EndOfBuffer), "EOB");
  }

  #[test]
  fn word_chars() {
    assert!(Char::from('a').is_word());
    assert!(Char::from('_').is_word());
    assert!(Char::from('0').is_word());
    assert!(!Char::from('-').is_word());
    assert!(!Meta::EndOfLine.is_word());
  }
}
