/*!
  Unified access to sources of input text.

  An [`Input`] owns a raw byte source — a borrowed slice, a file, or any
  boxed reader — plus a decode state, and produces UTF-8 regardless of the
  source encoding: UTF-16/32 in either byte order (with surrogate-pair
  recombination), the legacy code pages, or a caller-supplied 256-entry
  page. Read errors and malformed sequences decode to the substitute code
  point U+1FFFFF rather than failing.

  A [`BufferedInput`] layers a growable buffer, an unbounded unget stack,
  and line/column counters on top, which is what the scanner engine drives.
  When the source is a byte slice already in UTF-8, the buffer borrows it
  directly and no copy is made.
*/

use std::fs::File;
use std::io::Read;

use crate::codepage;
use crate::utf8::{to_utf8, ERR_CHAR, UNICODE_MAX};

/// Default buffer growth increment.
pub const BUFFER_SIZE: usize = 16384;

/// Source encodings the decoder understands.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Encoding {
  /// Detect a UTF BOM from the first bytes, falling back to plain.
  Auto,
  /// Plain octets: ASCII, binary, or UTF-8 without a BOM.
  Plain,
  /// UTF-8 (a leading BOM is skipped).
  Utf8,
  Utf16Be,
  Utf16Le,
  Utf32Be,
  Utf32Le,
  /// ISO-8859-1: bytes are code points.
  Latin1,
  Iso8859_5,
  Iso8859_7,
  Iso8859_15,
  Cp437,
  Cp1252,
  Koi8R,
  /// Macintosh Roman, with CR to LF translation.
  MacRoman,
  /// EBCDIC CP037.
  Ebcdic,
  /// Caller-supplied 256-entry byte → code-point table.
  Custom,
}

/// A raw byte source.
pub enum Source<'i> {
  Empty,
  Bytes(&'i [u8]),
  File(File),
  Stream(Box<dyn Read + 'i>),
}

impl<'i> Source<'i> {
  fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
    match self {
      Source::Empty => Ok(0),
      Source::Bytes(bytes) => {
        let current: &'i [u8] = *bytes;
        let n = current.len().min(buf.len());
        buf[..n].copy_from_slice(&current[..n]);
        *bytes = &current[n..];
        Ok(n)
      }
      Source::File(file) => file.read(buf).map_err(|_| ()),
      Source::Stream(reader) => reader.read(buf).map_err(|_| ()),
    }
  }
}

/// Input character sequence with encoding conversion to UTF-8.
pub struct Input<'i> {
  source   : Source<'i>,
  encoding : Encoding,
  page     : Option<&'i [u16; 256]>, //< table for `Encoding::Custom`
  pushback : Vec<u8>,                //< raw bytes peeked for BOM/surrogate handling
  utf8     : [u8; 4],                //< conversion buffer
  uidx     : usize,                  //< next unread byte in `utf8`
  ulen     : usize,                  //< bytes of data in `utf8`
  detected : bool,                   //< BOM detection has run
  erred    : bool,                   //< a read error still owes one ERR_CHAR
  done     : bool,
}

impl<'i> Input<'i> {
  pub fn new(source: Source<'i>) -> Input<'i> {
    Input::with_encoding(source, Encoding::Auto)
  }

  pub fn with_encoding(source: Source<'i>, encoding: Encoding) -> Input<'i> {
    Input {
      source,
      encoding,
      page: None,
      pushback: Vec::new(),
      utf8: [0; 4],
      uidx: 0,
      ulen: 0,
      detected: false,
      erred: false,
      done: false,
    }
  }

  /// A custom code page source.
  pub fn with_page(source: Source<'i>, page: &'i [u16; 256]) -> Input<'i> {
    let mut input = Input::with_encoding(source, Encoding::Custom);
    input.page = Some(page);
    input
  }

  pub fn encoding(&self) -> Encoding {
    self.encoding
  }

  pub fn set_encoding(&mut self, encoding: Encoding) {
    self.encoding = encoding;
    self.detected = encoding != Encoding::Auto && encoding != Encoding::Utf8;
  }

  /// True when the source is a plain byte slice that needs no conversion,
  /// so a consumer may borrow it directly.
  fn zero_copy_slice(&mut self) -> Option<&'i [u8]> {
    if self.encoding != Encoding::Plain {
      return None;
    }
    match self.source {
      Source::Bytes(bytes) => {
        self.source = Source::Empty;
        Some(bytes)
      }
      _ => None,
    }
  }

  fn next_raw(&mut self) -> Option<u8> {
    if let Some(b) = self.pushback.pop() {
      return Some(b);
    }
    if self.done {
      return None;
    }
    let mut one = [0u8; 1];
    match self.source.read(&mut one) {
      Ok(0) => {
        self.done = true;
        None
      }
      Ok(_) => Some(one[0]),
      Err(()) => {
        self.done = true;
        self.erred = true;
        None
      }
    }
  }

  fn unread_raw(&mut self, b: u8) {
    self.pushback.push(b);
  }

  /// Inspects the first bytes for a BOM: `EF BB BF`, `FE FF`, `FF FE`,
  /// `00 00 FE FF`, `FF FE 00 00`; without one the input is plain.
  fn detect(&mut self) {
    self.detected = true;
    if self.encoding == Encoding::Utf8 {
      // just skip a BOM if present
      let head = [self.next_raw(), self.next_raw(), self.next_raw()];
      if head != [Some(0xEF), Some(0xBB), Some(0xBF)] {
        for b in head.iter().rev().flatten() {
          self.unread_raw(*b);
        }
      }
      return;
    }
    if self.encoding != Encoding::Auto {
      return;
    }

    let head = [self.next_raw(), self.next_raw(), self.next_raw(), self.next_raw()];
    let take = |n: usize, enc: Encoding, this: &mut Self| {
      for b in head.iter().skip(n).rev().flatten() {
        this.unread_raw(*b);
      }
      this.encoding = enc;
    };

    match head {
      [Some(0xEF), Some(0xBB), Some(0xBF), _] => take(3, Encoding::Utf8, self),
      [Some(0x00), Some(0x00), Some(0xFE), Some(0xFF)] => take(4, Encoding::Utf32Be, self),
      [Some(0xFF), Some(0xFE), Some(0x00), Some(0x00)] => take(4, Encoding::Utf32Le, self),
      [Some(0xFE), Some(0xFF), _, _] => take(2, Encoding::Utf16Be, self),
      [Some(0xFF), Some(0xFE), _, _] => take(2, Encoding::Utf16Le, self),
      _ => take(0, Encoding::Plain, self),
    }
  }

  fn next_utf16_unit(&mut self, big_endian: bool) -> Option<u16> {
    let hi = self.next_raw()?;
    let lo = match self.next_raw() {
      Some(b) => b,
      None => return Some(0xFFFF), // odd trailing byte: substitute
    };
    Some(match big_endian {
      true  => ((hi as u16) << 8) | lo as u16,
      false => ((lo as u16) << 8) | hi as u16,
    })
  }

  /// Decodes the next code point from the source.
  fn next_code_point(&mut self) -> Option<u32> {
    match self.encoding {
      Encoding::Auto | Encoding::Plain | Encoding::Utf8 => {
        // passthrough is handled in get() before decoding
        unreachable!("raw encodings never reach the decoder")
      }
      Encoding::Utf16Be | Encoding::Utf16Le => {
        let be = self.encoding == Encoding::Utf16Be;
        let unit = self.next_utf16_unit(be)?;
        if (0xD800..0xDC00).contains(&unit) {
          match self.next_utf16_unit(be) {
            Some(low) if (0xDC00..0xE000).contains(&low) => {
              Some(0x10000 + (((unit as u32 - 0xD800) << 10) | (low as u32 - 0xDC00)))
            }
            Some(other) => {
              // unpaired high surrogate: substitute, reprocess the unit
              let (a, b) = match be {
                true  => ((other >> 8) as u8, other as u8),
                false => (other as u8, (other >> 8) as u8),
              };
              self.unread_raw(b);
              self.unread_raw(a);
              Some(ERR_CHAR)
            }
            None => Some(ERR_CHAR),
          }
        } else if (0xDC00..0xE000).contains(&unit) {
          Some(ERR_CHAR) // stray low surrogate
        } else {
          Some(unit as u32)
        }
      }
      Encoding::Utf32Be | Encoding::Utf32Le => {
        let b0 = self.next_raw()?;
        let rest = [self.next_raw(), self.next_raw(), self.next_raw()];
        let bytes = match (rest[0], rest[1], rest[2]) {
          (Some(b1), Some(b2), Some(b3)) => [b0, b1, b2, b3],
          _ => return Some(ERR_CHAR),
        };
        let c = match self.encoding == Encoding::Utf32Be {
          true  => u32::from_be_bytes(bytes),
          false => u32::from_le_bytes(bytes),
        };
        Some(if c > UNICODE_MAX { ERR_CHAR } else { c })
      }
      Encoding::Latin1 => self.next_raw().map(|b| b as u32),
      Encoding::MacRoman => {
        let b = self.next_raw()?;
        Some(match b {
          0x0D => 0x0A, // CR to LF translation
          b if b < 0x80 => b as u32,
          b => codepage::MACROMAN[b as usize - 0x80] as u32,
        })
      }
      Encoding::Ebcdic => self.next_raw().map(|b| codepage::EBCDIC[b as usize] as u32),
      Encoding::Custom => {
        let b = self.next_raw()?;
        Some(match self.page {
          Some(page) => page[b as usize] as u32,
          None => b as u32,
        })
      }
      Encoding::Iso8859_5
      | Encoding::Iso8859_7
      | Encoding::Iso8859_15
      | Encoding::Cp437
      | Encoding::Cp1252
      | Encoding::Koi8R => {
        let b = self.next_raw()?;
        if b < 0x80 {
          return Some(b as u32);
        }
        let table = match self.encoding {
          Encoding::Iso8859_5  => &codepage::ISO8859_5,
          Encoding::Iso8859_7  => &codepage::ISO8859_7,
          Encoding::Iso8859_15 => &codepage::ISO8859_15,
          Encoding::Cp437      => &codepage::CP437,
          Encoding::Cp1252     => &codepage::CP1252,
          _                    => &codepage::KOI8_R,
        };
        Some(table[b as usize - 0x80] as u32)
      }
    }
  }

  /// Fills `buf` with converted UTF-8 bytes, returning the count; zero
  /// means end of input.
  pub fn get(&mut self, buf: &mut [u8]) -> usize {
    if !self.detected {
      self.detect();
    }

    let mut n = 0;
    while n < buf.len() {
      // drain the conversion buffer first
      while self.uidx < self.ulen && n < buf.len() {
        buf[n] = self.utf8[self.uidx];
        self.uidx += 1;
        n += 1;
      }
      if n >= buf.len() {
        break;
      }

      if matches!(self.encoding, Encoding::Plain | Encoding::Utf8) {
        // raw passthrough: drain pushed-back bytes singly, the rest in bulk
        if let Some(b) = self.pushback.pop() {
          buf[n] = b;
          n += 1;
          continue;
        }
        if self.done && !self.erred {
          break;
        }
        match self.source.read(&mut buf[n..]) {
          Ok(0) => {
            self.done = true;
          }
          Ok(k) => {
            n += k;
            continue;
          }
          Err(()) => {
            self.done = true;
            self.erred = true;
          }
        }
        if self.erred {
          self.erred = false;
          self.ulen = to_utf8(ERR_CHAR, &mut self.utf8);
          self.uidx = 0;
          continue;
        }
        break;
      }

      let c = match self.next_code_point() {
        Some(c) => c,
        None => {
          if self.erred {
            self.erred = false;
            ERR_CHAR
          } else {
            break;
          }
        }
      };
      self.ulen = to_utf8(c, &mut self.utf8);
      self.uidx = 0;
    }
    n
  }
}

// region `From` impls for Input

impl<'i> From<&'i str> for Input<'i> {
  fn from(s: &'i str) -> Input<'i> {
    Input::with_encoding(Source::Bytes(s.as_bytes()), Encoding::Plain)
  }
}

impl<'i> From<&'i [u8]> for Input<'i> {
  fn from(bytes: &'i [u8]) -> Input<'i> {
    Input::with_encoding(Source::Bytes(bytes), Encoding::Plain)
  }
}

impl<'i> From<File> for Input<'i> {
  fn from(file: File) -> Input<'i> {
    Input::new(Source::File(file))
  }
}

impl<'i> From<Box<dyn Read + 'i>> for Input<'i> {
  fn from(reader: Box<dyn Read + 'i>) -> Input<'i> {
    Input::new(Source::Stream(reader))
  }
}

// endregion

/// The decoded buffer: borrowed whole for zero-copy byte-slice sources,
/// grown chunk-wise otherwise.
enum Buffer<'i> {
  Borrowed(&'i [u8]),
  Owned(Vec<u8>),
}

impl<'i> Buffer<'i> {
  fn bytes(&self) -> &[u8] {
    match self {
      Buffer::Borrowed(b) => b,
      Buffer::Owned(v) => v,
    }
  }
}

/**
  Buffered UTF-8 input with unget, lookahead, and line/column tracking.

  The line counter is 1-based and the column counter 0-based, counting
  decoded characters: a newline advances the line and zeroes the column,
  UTF-8 continuation bytes leave the column alone, and ungetting reverses
  each step exactly.
*/
pub struct BufferedInput<'i> {
  input      : Input<'i>,
  buffer     : Buffer<'i>,
  pos        : usize,      //< read position in the buffer
  chunk      : usize,      //< growth increment
  unget      : Vec<u8>,    //< pushed-back bytes, top is next
  line       : usize,
  col        : usize,
  line_cols  : Vec<usize>, //< column history so unget of \n restores
  delivered  : usize,      //< net bytes handed out
}

impl<'i> BufferedInput<'i> {
  pub fn new<I: Into<Input<'i>>>(input: I) -> BufferedInput<'i> {
    BufferedInput::with_chunk_size(input, BUFFER_SIZE)
  }

  pub fn with_chunk_size<I: Into<Input<'i>>>(input: I, chunk: usize) -> BufferedInput<'i> {
    let mut input = input.into();
    let buffer = match input.zero_copy_slice() {
      Some(slice) => Buffer::Borrowed(slice),
      None => Buffer::Owned(Vec::new()),
    };
    BufferedInput {
      input,
      buffer,
      pos: 0,
      chunk: chunk.max(1),
      unget: Vec::new(),
      line: 1,
      col: 0,
      line_cols: Vec::new(),
      delivered: 0,
    }
  }

  /// Ensures at least `n` bytes are readable past the current position
  /// (unget stack included); returns how many actually are.
  fn ensure(&mut self, n: usize) -> usize {
    loop {
      let have = self.unget.len() + (self.buffer.bytes().len() - self.pos);
      if have >= n {
        return have;
      }
      let buffer = match &mut self.buffer {
        Buffer::Borrowed(_) => return have,
        Buffer::Owned(v) => v,
      };
      let old_len = buffer.len();
      buffer.resize(old_len + self.chunk, 0);
      let read = self.input.get(&mut buffer[old_len..]);
      buffer.truncate(old_len + read);
      if read == 0 {
        return self.unget.len() + (buffer.len() - self.pos);
      }
    }
  }

  /// The next byte without consuming it.
  pub fn peek_byte(&mut self) -> Option<u8> {
    self.peek_byte_at(0)
  }

  /// The byte `k` positions ahead without consuming anything; idempotent.
  pub fn peek_byte_at(&mut self, k: usize) -> Option<u8> {
    if self.ensure(k + 1) < k + 1 {
      return None;
    }
    if k < self.unget.len() {
      return Some(self.unget[self.unget.len() - 1 - k]);
    }
    let past_unget = k - self.unget.len();
    self.buffer.bytes().get(self.pos + past_unget).copied()
  }

  /// Consumes and returns the next byte.
  pub fn get_byte(&mut self) -> Option<u8> {
    let b = match self.unget.pop() {
      Some(b) => b,
      None => {
        if self.ensure(1) < 1 {
          return None;
        }
        let b = self.buffer.bytes()[self.pos];
        self.pos += 1;
        b
      }
    };
    self.delivered += 1;
    if b == b'\n' {
      self.line_cols.push(self.col);
      self.line += 1;
      self.col = 0;
    } else if b & 0xC0 != 0x80 {
      self.col += 1;
    }
    Some(b)
  }

  /// Pushes `b` back; any number of bytes may be stacked. The line/column
  /// counters reverse the increments `get_byte` made.
  pub fn unget(&mut self, b: u8) {
    self.delivered = self.delivered.saturating_sub(1);
    if b == b'\n' {
      self.line = self.line.saturating_sub(1).max(1);
      self.col = self.line_cols.pop().unwrap_or(0);
    } else if b & 0xC0 != 0x80 {
      self.col = self.col.saturating_sub(1);
    }
    self.unget.push(b);
  }

  /// 1-based line of the next byte to read.
  pub fn lineno(&self) -> usize {
    self.line
  }

  /// 0-based column of the next byte to read.
  pub fn columno(&self) -> usize {
    self.col
  }

  /// Net bytes consumed so far.
  pub fn offset(&self) -> usize {
    self.delivered
  }

  /// True before anything was consumed.
  pub fn at_begin(&self) -> bool {
    self.delivered == 0
  }

  /// True at the start of a line (or of the input).
  pub fn at_bol(&self) -> bool {
    self.col == 0
  }

  /// True just before a newline or the end of input.
  pub fn at_eol(&mut self) -> bool {
    matches!(self.peek_byte(), None | Some(b'\n'))
  }

  pub fn at_end(&mut self) -> bool {
    self.peek_byte().is_none()
  }

  /// Consumes and returns everything that remains.
  pub fn rest(&mut self) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(b) = self.get_byte() {
      out.push(b);
    }
    out
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn drain(input: &mut Input) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 7]; // odd size exercises the partial-drain path
    loop {
      let n = input.get(&mut buf);
      if n == 0 {
        break;
      }
      out.extend_from_slice(&buf[..n]);
    }
    out
  }

  #[test]
  fn plain_bytes_pass_through() {
    let mut input = Input::from("hello");
    assert_eq!(drain(&mut input), b"hello");
  }

  #[test]
  fn utf16le_decodes_to_utf8() {
    // "a©€" in UTF-16LE
    let bytes = [0x61, 0x00, 0xA9, 0x00, 0xAC, 0x20];
    let mut input = Input::with_encoding(Source::Bytes(&bytes), Encoding::Utf16Le);
    assert_eq!(drain(&mut input), "a©€".as_bytes());
  }

  #[test]
  fn utf16_surrogate_pairs_recombine() {
    // U+1F600 = D83D DE00
    let bytes = [0x3D, 0xD8, 0x00, 0xDE];
    let mut input = Input::with_encoding(Source::Bytes(&bytes), Encoding::Utf16Le);
    assert_eq!(drain(&mut input), "😀".as_bytes());
  }

  #[test]
  fn unpaired_surrogate_substitutes() {
    let bytes = [0x3D, 0xD8, 0x41, 0x00]; // high surrogate then 'A'
    let mut input = Input::with_encoding(Source::Bytes(&bytes), Encoding::Utf16Le);
    let out = drain(&mut input);
    assert_eq!(&out[..4], &crate::utf8::ERR_CHAR_UTF8);
    assert_eq!(&out[4..], b"A");
  }

  #[test]
  fn utf32be_decodes() {
    let bytes = [0, 0, 0, 0x61, 0, 0x01, 0xF6, 0x00];
    let mut input = Input::with_encoding(Source::Bytes(&bytes), Encoding::Utf32Be);
    assert_eq!(drain(&mut input), "a😀".as_bytes());
  }

  #[test]
  fn bom_detection() {
    let utf16 = [0xFF, 0xFE, 0x61, 0x00];
    let mut input = Input::new(Source::Bytes(&utf16));
    assert_eq!(drain(&mut input), b"a");
    assert_eq!(input.encoding(), Encoding::Utf16Le);

    let utf32 = [0x00, 0x00, 0xFE, 0xFF, 0, 0, 0, 0x62];
    let mut input = Input::new(Source::Bytes(&utf32));
    assert_eq!(drain(&mut input), b"b");
    assert_eq!(input.encoding(), Encoding::Utf32Be);

    let utf8 = [0xEF, 0xBB, 0xBF, b'c'];
    let mut input = Input::new(Source::Bytes(&utf8));
    assert_eq!(drain(&mut input), b"c");

    let plain = b"plain";
    let mut input = Input::new(Source::Bytes(plain));
    assert_eq!(drain(&mut input), b"plain");
    assert_eq!(input.encoding(), Encoding::Plain);
  }

  #[test]
  fn codepage_conversion() {
    let bytes = [0x80u8, 0x41]; // € then A in CP1252
    let mut input = Input::with_encoding(Source::Bytes(&bytes), Encoding::Cp1252);
    assert_eq!(drain(&mut input), "€A".as_bytes());

    let bytes = [0xC1u8]; // CP037 'A'
    let mut input = Input::with_encoding(Source::Bytes(&bytes), Encoding::Ebcdic);
    assert_eq!(drain(&mut input), b"A");
  }

  #[test]
  fn custom_page() {
    let mut page = [0u16; 256];
    for (i, entry) in page.iter_mut().enumerate() {
      *entry = i as u16;
    }
    page[0x01] = 0x263A; // ☺
    let bytes = [0x01u8, b'x'];
    let mut input = Input::with_page(Source::Bytes(&bytes), &page);
    assert_eq!(drain(&mut input), "☺x".as_bytes());
  }

  #[test]
  fn buffered_get_peek_unget() {
    let mut input = BufferedInput::new("abc");
    assert_eq!(input.peek_byte(), Some(b'a'));
    assert_eq!(input.peek_byte_at(2), Some(b'c'));
    assert_eq!(input.peek_byte_at(3), None);
    assert_eq!(input.get_byte(), Some(b'a'));
    input.unget(b'a');
    input.unget(b'z');
    assert_eq!(input.get_byte(), Some(b'z'));
    assert_eq!(input.get_byte(), Some(b'a'));
    assert_eq!(input.get_byte(), Some(b'b'));
    assert_eq!(input.get_byte(), Some(b'c'));
    assert_eq!(input.get_byte(), None);
  }

  #[test]
  fn line_and_column_counters_are_symmetric() {
    let mut input = BufferedInput::new("ab\ncd");
    for _ in 0..4 {
      input.get_byte();
    }
    assert_eq!((input.lineno(), input.columno()), (2, 1));

    // get/unget of every byte leaves the counters unchanged
    let before = (input.lineno(), input.columno());
    let b = input.get_byte().unwrap();
    input.unget(b);
    assert_eq!((input.lineno(), input.columno()), before);

    // unget back across the newline restores the old column
    input.unget(b'c');
    input.unget(b'\n');
    assert_eq!((input.lineno(), input.columno()), (1, 2));
  }

  #[test]
  fn continuation_bytes_leave_the_column_alone() {
    let mut input = BufferedInput::new("é");
    input.get_byte();
    assert_eq!(input.columno(), 1);
    input.get_byte(); // continuation byte
    assert_eq!(input.columno(), 1);
  }

  #[test]
  fn bol_eol_begin() {
    let mut input = BufferedInput::new("a\nb");
    assert!(input.at_begin());
    assert!(input.at_bol());
    input.get_byte();
    assert!(!input.at_begin());
    assert!(!input.at_bol());
    assert!(input.at_eol());
    input.get_byte();
    assert!(input.at_bol());
    input.get_byte();
    assert!(input.at_end());
    assert!(input.at_eol());
  }

  #[test]
  fn rest_drains_everything() {
    let mut input = BufferedInput::new("tail");
    input.get_byte();
    assert_eq!(input.rest(), b"ail");
    assert!(input.at_end());
  }

  #[test]
  fn utf16_roundtrip_through_buffer() {
    // encode "hi\n∞" as UTF-16BE with BOM, read back through detection
    let text = "hi\n∞";
    let mut encoded = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
      encoded.extend_from_slice(&unit.to_be_bytes());
    }
    let mut input = BufferedInput::new(Input::new(Source::Bytes(&encoded)));
    assert_eq!(input.rest(), text.as_bytes());
  }
}
