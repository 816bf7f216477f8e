/*!
  Typed error surface.

  Compile-time errors form the closed `RegexError` enumeration; each carries
  the zero-based byte offset of the fault in the regex. `render` produces the
  caret diagnostic pointing into a 79-column window of the offending regex.

  The scanner's only typed failure is `LexerError`, raised when the engine
  jams: no transition applies and no earlier accept was recorded.
*/

use thiserror::Error;

use super::Index32;

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegexError {
  #[error("empty character class at position {0}")]
  EmptyClass(Index32),           //< class `[...]` is empty, e.g. `[a&&[b]]`
  #[error("empty expression at position {0}")]
  EmptyExpression(Index32),
  #[error("exceeds length limit at position {0}")]
  ExceedsLength(Index32),
  #[error("exceeds complexity limits at position {0}")]
  ExceedsLimits(Index32),
  #[error("invalid anchor or boundary at position {0}")]
  InvalidAnchor(Index32),
  #[error("invalid backreference at position {0}")]
  InvalidBackreference(Index32),
  #[error("invalid character class at position {0}")]
  InvalidClass(Index32),
  #[error("invalid character class range at position {0}")]
  InvalidClassRange(Index32),    //< e.g. `[Z-A]`
  #[error("invalid collating element at position {0}")]
  InvalidCollating(Index32),     //< `[[.name.]]`
  #[error("invalid escape at position {0}")]
  InvalidEscape(Index32),
  #[error("invalid modifier at position {0}")]
  InvalidModifier(Index32),      //< invalid `(?ismx:)` modifier
  #[error("invalid quantifier at position {0}")]
  InvalidQuantifier(Index32),
  #[error("invalid repeat at position {0}")]
  InvalidRepeat(Index32),        //< e.g. `{10,1}`
  #[error("invalid syntax at position {0}")]
  InvalidSyntax(Index32),
  #[error("mismatched {{ }} at position {0}")]
  MismatchedBraces(Index32),
  #[error("mismatched [ ] at position {0}")]
  MismatchedBrackets(Index32),
  #[error("mismatched ( ) at position {0}")]
  MismatchedParens(Index32),
  #[error("mismatched quotation at position {0}")]
  MismatchedQuotation(Index32),  //< mismatched `\Q...\E` or `"..."`
  #[error("undefined name at position {0}")]
  UndefinedName(Index32),
  #[error("unknown option at position {0}")]
  UnknownOption(Index32),
}

impl RegexError {
  /// The byte offset into the regex at which the error occurred.
  pub fn idx(&self) -> Index32 {
    *match self {
      | RegexError::EmptyClass(loc)
      | RegexError::EmptyExpression(loc)
      | RegexError::ExceedsLength(loc)
      | RegexError::ExceedsLimits(loc)
      | RegexError::InvalidAnchor(loc)
      | RegexError::InvalidBackreference(loc)
      | RegexError::InvalidClass(loc)
      | RegexError::InvalidClassRange(loc)
      | RegexError::InvalidCollating(loc)
      | RegexError::InvalidEscape(loc)
      | RegexError::InvalidModifier(loc)
      | RegexError::InvalidQuantifier(loc)
      | RegexError::InvalidRepeat(loc)
      | RegexError::InvalidSyntax(loc)
      | RegexError::MismatchedBraces(loc)
      | RegexError::MismatchedBrackets(loc)
      | RegexError::MismatchedParens(loc)
      | RegexError::MismatchedQuotation(loc)
      | RegexError::UndefinedName(loc)
      | RegexError::UnknownOption(loc) => loc,
    }
  }

  /// The message without the position suffix.
  fn message(&self) -> &'static str {
    match self {
      RegexError::EmptyClass(_)           => "empty character class",
      RegexError::EmptyExpression(_)      => "empty expression",
      RegexError::ExceedsLength(_)        => "exceeds length limit",
      RegexError::ExceedsLimits(_)        => "exceeds complexity limits",
      RegexError::InvalidAnchor(_)        => "invalid anchor or boundary",
      RegexError::InvalidBackreference(_) => "invalid backreference",
      RegexError::InvalidClass(_)         => "invalid character class",
      RegexError::InvalidClassRange(_)    => "invalid character class range",
      RegexError::InvalidCollating(_)     => "invalid collating element",
      RegexError::InvalidEscape(_)        => "invalid escape",
      RegexError::InvalidModifier(_)      => "invalid modifier",
      RegexError::InvalidQuantifier(_)    => "invalid quantifier",
      RegexError::InvalidRepeat(_)        => "invalid repeat",
      RegexError::InvalidSyntax(_)        => "invalid syntax",
      RegexError::MismatchedBraces(_)     => "mismatched { }",
      RegexError::MismatchedBrackets(_)   => "mismatched [ ]",
      RegexError::MismatchedParens(_)     => "mismatched ( )",
      RegexError::MismatchedQuotation(_)  => "mismatched quotation",
      RegexError::UndefinedName(_)        => "undefined name",
      RegexError::UnknownOption(_)        => "unknown option",
    }
  }

  /**
    Renders the caret diagnostic for this error against the regex it arose
    in:

    ```text
    error in regex at position 7
    a(b|c)*)x
           \___mismatched ( )
    ```

    The window is at most 79 display columns, positioned so the fault sits
    inside the 40-column block around it, clamped to the regex boundaries;
    UTF-8 sequences are never split.
  */
  pub fn render(&self, regex: &str) -> String {
    let bytes = regex.as_bytes();
    let mut pos = self.idx() as usize;
    if pos > bytes.len() {
      pos = bytes.len();
    }

    // Window start: block-align to 40 columns, backing out of the middle of
    // a UTF-8 sequence.
    let block = pos / 40;
    let mut k = pos % 40 + if block == 0 { 0 } else { 20 };
    let mut start = if block == 0 { 0 } else { 40 * block - 20 };
    while start > 0 && (bytes[start] & 0xC0) == 0x80 {
      start -= 1;
      k += 1;
    }

    let window = &bytes[start..];
    let end = display_clamp(window, 79);
    let caret_col = display_len(window, k);

    let message = self.message();
    let mut what = String::from("error in regex at position ");
    what.push_str(&pos.to_string());
    what.push('\n');
    what.push_str(&String::from_utf8_lossy(&window[..end]));
    what.push('\n');
    if caret_col >= message.len() + 4 {
      what.push_str(&" ".repeat(caret_col - message.len() - 4));
      what.push_str(message);
      what.push_str("___/\n");
    } else {
      what.push_str(&" ".repeat(caret_col));
      what.push_str("\\___");
      what.push_str(message);
      what.push('\n');
    }
    what
  }
}

/// Number of bytes of `s` that fit in `cols` display columns, never cutting
/// a UTF-8 sequence.
fn display_clamp(s: &[u8], cols: usize) -> usize {
  let mut i = 0;
  let mut n = 0;
  while i < s.len() && n < cols {
    i += 1;
    // eat continuation bytes with the lead byte
    while i < s.len() && (s[i] & 0xC0) == 0x80 {
      i += 1;
    }
    n += 1;
  }
  i
}

/// Display columns spanned by the first `k` bytes of `s`; continuation bytes
/// take no column.
fn display_len(s: &[u8], k: usize) -> usize {
  s.iter().take(k).filter(|&&b| (b & 0xC0) != 0x80).count()
}

/// The scanner jammed: no transition applies at the current input byte and
/// no earlier accept was recorded to fall back on.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("lexer jammed at {line}:{column}; matched so far: {matched:?}; next: {next:?}")]
pub struct LexerError {
  pub line    : usize,
  pub column  : usize,
  pub matched : String,     //< the prefix accumulated before the jam
  pub next    : Option<u8>, //< the byte with no transition, `None` at end of input
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn positions_and_messages() {
    let e = RegexError::MismatchedParens(7);
    assert_eq!(e.idx(), 7);
    assert_eq!(e.to_string(), "mismatched ( ) at position 7");
  }

  #[test]
  fn render_short_regex() {
    let e = RegexError::MismatchedParens(7);
    let rendered = e.render("a(b|c)*)x");
    let lines: Vec<&str> = rendered.lines().collect();
    assert_eq!(lines[0], "error in regex at position 7");
    assert_eq!(lines[1], "a(b|c)*)x");
    assert_eq!(lines[2], "       \\___mismatched ( )");
  }

  #[test]
  fn render_clamps_past_the_end() {
    let e = RegexError::MismatchedBrackets(100);
    let rendered = e.render("[abc");
    assert!(rendered.starts_with("error in regex at position 4\n[abc\n"));
  }

  #[test]
  fn render_windows_long_regex() {
    let long: String = std::iter::repeat('a').take(120).collect();
    let e = RegexError::InvalidSyntax(100);
    let rendered = e.render(&long);
    let lines: Vec<&str> = rendered.lines().collect();
    // window starts 20 columns before the 40-column block of the fault
    assert!(lines[1].len() <= 79);
    assert!(lines[2].contains("invalid syntax"));
  }

  #[test]
  fn render_never_splits_utf8() {
    let regex = "é".repeat(60); // 2 bytes per char
    let e = RegexError::InvalidSyntax(90);
    let rendered = e.render(&regex);
    // the window line must still be valid UTF-8 of whole characters
    assert!(rendered.lines().nth(1).unwrap().chars().all(|c| c == 'é'));
  }
}
