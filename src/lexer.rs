/*!
  The scanner engine: drives a compiled [`Pattern`](crate::Pattern) over a
  [`BufferedInput`], returning the capture index of the longest match.

  `scan` interprets the opcode table (or dispatches to a compiled FSM
  function): at each state it applies the control opcodes, tests the meta
  conditions, and follows the byte-range transition the next input byte
  falls in. Meta conditions never divert the byte path: the first true one
  folds its target's accept bookkeeping — and, recursively, the target's
  own meta chain — into the current state, so zero-width conditions record
  a rewind point while byte matching stays greedy. Anchors and boundaries
  therefore resolve at pattern ends, where their chains terminate in plain
  accepts. When no byte edge applies, the engine rewinds the input to the
  last recorded accept.

  Negative-pattern accepts produce the `REDO` sentinel: the match is
  consumed and scanning restarts after it, unless option `A` exposes the
  sentinel to the caller. Indent and dedent conditions check a column
  accumulator against the indent-stop stack; the accepted match commits the
  push or pop.
*/

use crate::character::{Char, Meta};
use crate::error::LexerError;
use crate::input::{BufferedInput, Input};
use crate::opcode::{bitmasks, Opcode};
use crate::pattern::{Fsm, Pattern};

pub type Accept = u32;

/// Accept code for a matched-but-discarded negative pattern.
pub const REDO: Accept = 0x7FFF_FFFF;
/// Accept code for the empty terminal match `split` produces at the end.
pub const EMPTY: Accept = 0xFFFF_FFFF;

/// How a byte advances the indent column counter.
#[derive(Copy, Clone)]
pub enum ColumnFn {
  /// Tabs advance to the next multiple of the stride; other bytes add one.
  TabStride(usize),
  /// Caller-supplied `(column, byte) → new column`.
  Custom(fn(usize, u8) -> usize),
}

impl ColumnFn {
  fn advance(&self, col: usize, b: u8) -> usize {
    match *self {
      ColumnFn::TabStride(n) => match b {
        b'\t' => (col / n.max(1) + 1) * n.max(1),
        _ => col + 1,
      },
      ColumnFn::Custom(f) => f(col, b),
    }
  }
}

#[derive(Copy, Clone)]
pub struct LexerOptions {
  pub expose_redo      : bool,     //< option A: return REDO instead of restarting
  pub half_check_words : bool,     //< option W: check only one side of \< and \>
  pub columns          : ColumnFn, //< option T: column stride for indent counting
}

impl Default for LexerOptions {
  fn default() -> LexerOptions {
    LexerOptions {
      expose_redo: false,
      half_check_words: false,
      columns: ColumnFn::TabStride(4),
    }
  }
}

impl LexerOptions {
  /// Parses the scanner option string, e.g. `"A"` or `"T=2"`.
  pub fn new(options_string: &str) -> LexerOptions {
    let mut options = LexerOptions::default();
    let bytes = options_string.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
      match bytes[i] {
        b'A' => options.expose_redo = true,
        b'W' => options.half_check_words = true,
        b'T' => {
          let mut n = 0usize;
          let mut j = i + 1;
          if bytes.get(j) == Some(&b'=') {
            j += 1;
          }
          while j < bytes.len() && bytes[j].is_ascii_digit() {
            n = 10 * n + (bytes[j] - b'0') as usize;
            j += 1;
          }
          if n > 0 {
            options.columns = ColumnFn::TabStride(n);
          }
          i = j;
          continue;
        }
        _ => {}
      }
      i += 1;
    }
    options
  }
}

fn isword(b: Option<u8>) -> bool {
  matches!(b, Some(b) if b.is_ascii_alphanumeric() || b == b'_')
}

/// Deepest meta chain the engine resolves through zero-width inlining.
const META_NEST_MAX: usize = 5;

pub struct Lexer<'i> {
  patterns : Vec<Pattern>,
  current  : usize,
  stream   : BufferedInput<'i>,
  options  : LexerOptions,

  // per-match state
  cap        : Accept,
  text       : Vec<u8>,           //< matched bytes (UTF-8)
  end_mark   : usize,             //< text length at the last recorded accept
  lap        : Vec<Option<usize>>, //< lookahead head positions within `text`
  keep_text  : bool,              //< `more()` was requested
  match_first: usize,             //< absolute offset of the match start
  match_line : usize,
  match_col  : usize,
  start_bol  : bool,              //< the match starts at a line begin
  start_begin: bool,              //< the match starts at the buffer begin
  before     : Option<u8>,        //< last byte of the previous match

  // indent machinery
  col_base : usize,       //< indent column accumulated for the current line
  col_from : usize,       //< text index not yet folded into `col_base`
  tab      : Vec<usize>,  //< indent stops
  ded      : usize,       //< pending dedent count
  mrk      : bool,        //< an indent condition was tested this match
  pending_indent : bool,  //< the current path crossed `\i`
  pending_dedent : bool,  //< the current path crossed `\j`
  marked_indent  : bool,  //< the recorded accept crossed `\i`
  marked_dedent  : bool,  //< the recorded accept crossed `\j`

  /// The accept recorded through an indent/dedent condition, with its text
  /// position and whether it was an indent. A later re-test of the same
  /// condition overwrites it when true and withdraws it when false; at scan
  /// end a surviving dent accept preempts a longer ordinary match.
  dent_take : Option<(Accept, usize, bool)>,
  /// Set while accepts are being folded in through `\i` (true) or `\j`
  /// (false).
  dent_mode : Option<bool>,

  final_empty : bool,     //< `split` already yielded its EMPTY terminal
  jammed      : String,   //< prefix consumed by the attempt that jammed
}

impl<'i> Lexer<'i> {
  pub fn new<I: Into<Input<'i>>>(pattern: Pattern, input: I) -> Lexer<'i> {
    Lexer::with_options(pattern, input, LexerOptions::default())
  }

  pub fn with_options<I: Into<Input<'i>>>(
    pattern: Pattern,
    input: I,
    options: LexerOptions,
  ) -> Lexer<'i> {
    Lexer {
      patterns: vec![pattern],
      current: 0,
      stream: BufferedInput::new(input),
      options,
      cap: 0,
      text: Vec::new(),
      end_mark: 0,
      lap: Vec::new(),
      keep_text: false,
      match_first: 0,
      match_line: 1,
      match_col: 0,
      start_bol: true,
      start_begin: true,
      before: None,
      col_base: 0,
      col_from: 0,
      tab: Vec::new(),
      ded: 0,
      mrk: false,
      pending_indent: false,
      pending_dedent: false,
      marked_indent: false,
      marked_dedent: false,
      dent_take: None,
      dent_mode: None,
      final_empty: false,
      jammed: String::new(),
    }
  }

  /// Adds another pattern; returns its index for `select_pattern`.
  pub fn push_pattern(&mut self, pattern: Pattern) -> usize {
    self.patterns.push(pattern);
    self.patterns.len() - 1
  }

  pub fn select_pattern(&mut self, index: usize) {
    assert!(index < self.patterns.len());
    self.current = index;
  }

  pub fn pattern(&self) -> &Pattern {
    &self.patterns[self.current]
  }

  /// Assigns a new input source and resets the scanner state.
  pub fn input<I: Into<Input<'i>>>(&mut self, source: I) {
    self.stream = BufferedInput::new(source);
    self.reset();
  }

  /// Resets the scanner state to initial (the input source is kept).
  pub fn reset(&mut self) {
    self.cap = 0;
    self.text.clear();
    self.end_mark = 0;
    self.lap.clear();
    self.keep_text = false;
    self.match_first = 0;
    self.match_line = 1;
    self.match_col = 0;
    self.start_bol = true;
    self.start_begin = true;
    self.before = None;
    self.col_base = 0;
    self.col_from = 0;
    self.tab.clear();
    self.ded = 0;
    self.mrk = false;
    self.final_empty = false;
    self.jammed.clear();
  }

  // region match queries

  /// The last matched bytes; always UTF-8 whatever the input encoding was.
  pub fn text(&self) -> &[u8] {
    &self.text
  }

  /// The last matched text as a string slice.
  pub fn text_str(&self) -> &str {
    std::str::from_utf8(&self.text).unwrap_or("")
  }

  /// Takes the matched bytes out of the scanner.
  pub fn take_text(&mut self) -> Vec<u8> {
    std::mem::take(&mut self.text)
  }

  /// The last accept code: a subpattern index, 0, `REDO`, or `EMPTY`.
  pub fn accept(&self) -> Accept {
    self.cap
  }

  /// 1-based line of the match start.
  pub fn lineno(&self) -> usize {
    self.match_line
  }

  /// 0-based column of the match start.
  pub fn columno(&self) -> usize {
    self.match_col
  }

  /// Absolute byte offset of the match start.
  pub fn first(&self) -> usize {
    self.match_first
  }

  /// Absolute byte offset just past the match.
  pub fn last(&self) -> usize {
    self.match_first + self.text.len()
  }

  pub fn at_end(&mut self) -> bool {
    self.stream.at_end()
  }

  /// Consumes and returns the remaining input.
  pub fn rest(&mut self) -> Vec<u8> {
    self.stream.rest()
  }

  /// True while dedents are pending, i.e. more `\j` matches will fire
  /// without consuming input.
  pub fn dent_pending(&self) -> bool {
    self.ded > 0
  }

  /// True when the current match tested an indent condition.
  pub fn dent_checked(&self) -> bool {
    self.mrk
  }

  // endregion

  // region match control

  /// Keeps the current text as a prefix of the next match.
  pub fn more(&mut self) {
    self.keep_text = true;
  }

  /// Truncates the current match to `n` bytes, pushing the tail back.
  pub fn less(&mut self, n: usize) {
    while self.text.len() > n {
      if let Some(b) = self.text.pop() {
        self.stream.unget(b);
      }
    }
    self.end_mark = self.end_mark.min(self.text.len());
    self.col_from = self.col_from.min(self.text.len());
  }

  /// Pushes `b` in front of the input.
  pub fn unput(&mut self, b: u8) {
    self.stream.unget(b);
  }

  /// Consumes and returns one input byte, bypassing the pattern.
  pub fn next_byte(&mut self) -> Option<u8> {
    let b = self.stream.get_byte();
    if b.is_some() {
      self.before = b;
      if b == Some(b'\n') {
        self.col_base = 0;
      }
    }
    b
  }

  // endregion

  /**
    Scans the next match: returns its subpattern index, 0 at end of input
    or when the engine jams on a byte no pattern wants, and `REDO` for a
    discarded negative match when option `A` is set.
  */
  pub fn scan(&mut self) -> Accept {
    loop {
      let start_len = match self.keep_text {
        true => {
          self.keep_text = false;
          self.text.len()
        }
        false => {
          self.text.clear();
          0
        }
      };
      self.cap = 0;
      self.end_mark = start_len;
      self.lap.clear();
      self.pending_indent = false;
      self.pending_dedent = false;
      self.marked_indent = false;
      self.marked_dedent = false;
      self.dent_take = None;
      self.dent_mode = None;
      self.mrk = false;
      self.col_from = start_len;
      self.match_line = self.stream.lineno();
      self.match_col = self.stream.columno();
      self.match_first = self.stream.offset() - start_len;
      self.start_bol = self.before.map_or(true, |b| b == b'\n');
      self.start_begin = self.stream.at_begin() && start_len == 0;

      match self.patterns[self.current].fsm().clone() {
        Fsm::Table(words) => self.interpret(&words),
        Fsm::Compiled(fsm) => fsm(self),
      }

      // a surviving indent/dedent accept preempts a longer ordinary match:
      // the dent is reported at the position its condition held
      if let Some((dent_cap, dent_mark, is_indent)) = self.dent_take {
        self.cap = dent_cap;
        self.end_mark = dent_mark;
        self.marked_indent = is_indent;
        self.marked_dedent = !is_indent;
      }

      // rewind the input past the recorded accept, or entirely when there
      // is none
      let back_to = match self.cap {
        0 => {
          self.jammed =
              String::from_utf8_lossy(&self.text[start_len.min(self.text.len())..]).into_owned();
          start_len
        }
        _ => self.end_mark,
      };
      while self.text.len() > back_to {
        if let Some(b) = self.text.pop() {
          self.stream.unget(b);
        }
      }
      self.col_from = self.col_from.min(self.text.len());

      if self.cap == 0 {
        return 0;
      }

      // a zero-width accept at the end of input is the end, not a match —
      // except for pending dedents, which legitimately consume nothing
      if self.text.len() == start_len
          && self.stream.at_end()
          && !self.marked_dedent
          && !self.marked_indent
      {
        self.cap = 0;
        return 0;
      }

      // commit the indent effects at the column the tests accumulated
      let col_now = self.col_base;
      self.commit_dent(col_now);
      if let Some(&b) = self.text.last() {
        self.before = Some(b);
      }

      if self.cap == REDO && !self.options.expose_redo {
        continue; // silently restart after the discarded match
      }
      return self.cap;
    }
  }

  /// As `scan`, but a jam (no transition and no prior accept mid-input)
  /// surfaces a typed error instead of 0.
  pub fn scan_strict(&mut self) -> Result<Accept, LexerError> {
    let cap = self.scan();
    if cap == 0 && !self.at_end() {
      return Err(LexerError {
        line: self.stream.lineno(),
        column: self.stream.columno(),
        matched: std::mem::take(&mut self.jammed),
        next: self.stream.peek_byte(),
      });
    }
    Ok(cap)
  }

  /**
    As `scan`, but tolerant of gaps: a byte no pattern wants is consumed so
    scanning continues, and the end of input yields one `EMPTY` sentinel
    (an empty terminal match) before the final 0.
  */
  pub fn split(&mut self) -> Accept {
    loop {
      if self.stream.at_end() {
        if self.final_empty {
          return 0;
        }
        self.final_empty = true;
        self.text.clear();
        self.cap = EMPTY;
        return EMPTY;
      }
      let a = self.scan();
      if a != 0 {
        return a;
      }
      if self.next_byte().is_none() {
        continue; // end of input: the loop head yields EMPTY
      }
    }
  }

  // region opcode interpreter

  fn interpret(&mut self, words: &[u32]) {
    let mut pc: usize = 0;
    'state: loop {
      // only the first true meta condition of a state fires
      let mut meta_fired = false;

      let mut w = pc;
      loop {
        if w >= words.len() {
          break 'state;
        }
        let op = Opcode(words[w]);

        if op.is_halt() {
          break 'state;
        }

        if op.is_goto() {
          let extended = op.idx() == bitmasks::LONG_MARKER;
          if let Some(b) = self.stream.peek_byte() {
            if op.is_goto_u8(b) {
              let target = self.goto_target(words, w, extended);
              if target != bitmasks::HALT_MARKER as usize {
                self.stream.get_byte();
                self.text.push(b);
                if b == b'\n' {
                  // a consumed newline starts a fresh indent column
                  self.col_base = 0;
                  self.col_from = self.text.len();
                }
                pc = target;
                continue 'state;
              }
            }
          }
          w += 1 + extended as usize;
          continue;
        }

        if op.is_meta() {
          let extended = op.idx() == bitmasks::LONG_MARKER;
          if !meta_fired && self.test_meta_tracked(op.meta()) {
            let target = self.goto_target(words, w, extended);
            if target != bitmasks::HALT_MARKER as usize {
              meta_fired = true;
              self.fold_condition(words, op.meta(), target, 1);
            }
          }
          w += 1 + extended as usize;
          continue;
        }

        self.apply_control(op);
        w += 1;
      }
    }
  }

  /// Inlines the chain behind a true condition; dent markers stick only to
  /// accepts recorded inside this condition's own chain.
  fn fold_condition(&mut self, words: &[u32], meta: Char, target: usize, nest: usize) {
    let saved_pending = (self.pending_indent, self.pending_dedent);
    let saved_mode = self.dent_mode;
    if meta == Meta::IndentBoundary {
      self.pending_indent = true;
      self.dent_mode = Some(true);
    } else if meta == Meta::DedentBoundary {
      self.pending_dedent = true;
      self.dent_mode = Some(false);
    }

    self.inline_zero_width(words, target, nest);

    self.pending_indent = saved_pending.0;
    self.pending_dedent = saved_pending.1;
    self.dent_mode = saved_mode;
  }

  /// As `test_meta`, but a false indent or dedent re-test withdraws the
  /// provisional dent accept its earlier firing recorded: the condition no
  /// longer holds at the deeper position, which knows the line better.
  fn test_meta_tracked(&mut self, m: Char) -> bool {
    let result = self.test_meta(m);
    if !result {
      match m {
        Meta::IndentBoundary => {
          if matches!(self.dent_take, Some((_, _, true))) {
            self.dent_take = None;
          }
        }
        Meta::DedentBoundary => {
          if matches!(self.dent_take, Some((_, _, false))) {
            self.dent_take = None;
          }
        }
        _ => {}
      }
    }
    result
  }

  fn goto_target(&self, words: &[u32], w: usize, extended: bool) -> usize {
    match extended {
      true  => Opcode(words[w + 1]).long_idx() as usize,
      false => Opcode(words[w]).idx() as usize,
    }
  }

  /// One control opcode: TAKE, REDO, TAIL, or HEAD.
  fn apply_control(&mut self, op: Opcode) {
    if op.is_redo() {
      self.cap = REDO;
      self.mark();
    } else if op.is_take() {
      self.cap = op.long_idx();
      self.mark();
      if let Some(is_indent) = self.dent_mode {
        self.dent_take = Some((self.cap, self.end_mark, is_indent));
      }
    } else if op.is_tail() {
      let k = op.long_idx() as usize;
      if let Some(Some(pos)) = self.lap.get(k).copied() {
        // the match ends where the lookahead body began
        self.end_mark = pos;
      }
    } else if op.is_head() {
      let k = op.long_idx() as usize;
      if self.lap.len() <= k {
        self.lap.resize(k + 1, None);
      }
      self.lap[k] = Some(self.text.len());
    }
  }

  /**
    Folds the zero-width state at `target` into the current position: its
    control opcodes apply in place, and its meta chain resolves recursively
    — first true condition per level, `META_NEST_MAX` levels deep. Byte
    transitions of a zero-width target are not followed; anchor chains end
    in accepts, not in further consumption.
  */
  fn inline_zero_width(&mut self, words: &[u32], target: usize, nest: usize) {
    let mut meta_fired = false;
    let mut w = target;
    while let Some(&word) = words.get(w) {
      let op = Opcode(word);
      if op.is_halt() {
        break;
      }
      if op.is_goto() {
        w += 1 + (op.idx() == bitmasks::LONG_MARKER) as usize;
        continue;
      }
      if op.is_meta() {
        let extended = op.idx() == bitmasks::LONG_MARKER;
        if !meta_fired && nest < META_NEST_MAX && self.test_meta_tracked(op.meta()) {
          let next = self.goto_target(words, w, extended);
          if next != bitmasks::HALT_MARKER as usize {
            meta_fired = true;
            self.fold_condition(words, op.meta(), next, nest + 1);
          }
        }
        w += 1 + extended as usize;
        continue;
      }
      self.apply_control(op);
      w += 1;
    }
  }

  /// Records the accept position (and the indent markers leading to it).
  fn mark(&mut self) {
    self.end_mark = self.text.len();
    self.marked_indent = self.pending_indent;
    self.marked_dedent = self.pending_dedent;
  }

  // endregion

  // region meta conditions

  fn prev_byte(&self) -> Option<u8> {
    self.text.last().copied().or(self.before)
  }

  fn first_byte(&mut self) -> Option<u8> {
    match self.text.first() {
      Some(&b) => Some(b),
      None => self.stream.peek_byte(),
    }
  }

  fn test_meta(&mut self, m: Char) -> bool {
    let w = self.options.half_check_words;
    match m {
      Meta::BeginningOfLine => self.start_bol,
      Meta::BeginningOfBuffer => self.start_begin,
      Meta::EndOfLine => self.stream.at_eol(),
      Meta::EndOfBuffer => self.stream.at_end(),

      // boundaries at the match end: last consumed byte vs the next byte
      Meta::EndWordEnd => {
        (isword(self.prev_byte()) || w) && !isword(self.stream.peek_byte())
      }
      Meta::BeginWordEnd => {
        !isword(self.prev_byte()) && (w || isword(self.stream.peek_byte()))
      }
      Meta::NonWordEnd => isword(self.prev_byte()) == isword(self.stream.peek_byte()),

      // boundaries at the match start: the byte before vs the first byte
      Meta::BeginWordBegin => {
        let first = self.first_byte();
        !isword(self.before) && (w || isword(first))
      }
      Meta::EndWordBegin => {
        let first = self.first_byte();
        isword(self.before) && !isword(first)
      }
      Meta::NonWordBoundary => {
        let first = self.first_byte();
        isword(self.before) == isword(first)
      }

      Meta::IndentBoundary => self.indent(),
      Meta::DedentBoundary => self.dedent(),
      Meta::UndentBoundary => self.nodent(),
      _ => false,
    }
  }

  // endregion

  // region indent machinery

  fn advance_col(&self, from: usize, text_from: usize) -> usize {
    let mut col = from;
    for &b in &self.text[text_from.min(self.text.len())..] {
      if b == b'\n' {
        col = 0;
      } else if b & 0xC0 != 0x80 {
        col = self.options.columns.advance(col, b);
      }
    }
    col
  }

  /// Folds the pending match text into the indent column counter.
  fn update_col(&mut self) -> usize {
    self.mrk = true;
    let col = self.advance_col(self.col_base, self.col_from);
    self.col_base = col;
    self.col_from = self.text.len();
    col
  }

  /// `\i`: the column climbed above the innermost stop.
  fn indent(&mut self) -> bool {
    let col = self.update_col();
    col > 0 && self.tab.last().map_or(true, |&t| t < col)
  }

  /// `\j`: a dedent is pending, or the column fell below the innermost stop.
  fn dedent(&mut self) -> bool {
    let col = self.update_col();
    self.ded > 0 || self.tab.last().map_or(false, |&t| t > col)
  }

  /// `\k`: neither a push nor a pop applies.
  fn nodent(&mut self) -> bool {
    let col = self.update_col();
    (col == 0 || self.tab.last().map_or(true, |&t| t >= col))
        && self.tab.last().map_or(true, |&t| t <= col)
  }

  /// Applies the indent effects of the committed match: push the new stop
  /// after `\i`; pop after `\j`, raising the pending count when one dedent
  /// crosses several stops at once.
  fn commit_dent(&mut self, col_now: usize) {
    if self.marked_indent {
      if col_now > 0 && self.tab.last().map_or(true, |&t| t < col_now) {
        self.tab.push(col_now);
      }
    } else if self.marked_dedent {
      if self.ded > 0 {
        self.ded -= 1;
      } else {
        let mut pops: usize = 0;
        while self.tab.last().map_or(false, |&t| t > col_now) {
          self.tab.pop();
          pops += 1;
        }
        self.ded += pops.saturating_sub(1);
      }
    }
    self.mrk = false;
  }

  // endregion
}

// region FSM operations for compiled pattern functions

/// The operation set a compiled FSM function drives the scanner with,
/// mirroring the opcode interpreter's effects.
impl<'i> Lexer<'i> {
  /// Consumes the next byte into the match, returning it.
  pub fn fsm_char(&mut self) -> Option<u8> {
    let b = self.stream.get_byte()?;
    self.text.push(b);
    if b == b'\n' {
      self.col_base = 0;
      self.col_from = self.text.len();
    }
    Some(b)
  }

  pub fn fsm_take(&mut self, accept: Accept) {
    self.cap = accept;
    self.mark();
  }

  pub fn fsm_redo(&mut self) {
    self.cap = REDO;
    self.mark();
  }

  pub fn fsm_head(&mut self, k: usize) {
    if self.lap.len() <= k {
      self.lap.resize(k + 1, None);
    }
    self.lap[k] = Some(self.text.len());
  }

  pub fn fsm_tail(&mut self, k: usize) {
    if let Some(Some(pos)) = self.lap.get(k).copied() {
      self.end_mark = pos;
    }
  }

  /// Tests the zero-width condition for meta character `m`.
  pub fn fsm_meta(&mut self, m: Char) -> bool {
    self.test_meta(m)
  }

  /// Rewinds everything past the recorded accept; the engine calls this
  /// automatically after interpretation.
  pub fn fsm_halt(&mut self) {
    while self.text.len() > self.end_mark {
      if let Some(b) = self.text.pop() {
        self.stream.unget(b);
      }
    }
  }
}

// endregion

#[cfg(test)]
mod test {
  use super::*;

  fn collect(pattern: &str, popts: &str, input: &'static str) -> Vec<Accept> {
    let pattern = Pattern::new(pattern, popts).unwrap();
    let mut lexer = Lexer::new(pattern, input);
    let mut out = Vec::new();
    loop {
      let a = lexer.scan();
      if a == 0 {
        break;
      }
      out.push(a);
    }
    out
  }

  #[test]
  fn simple_alternation() {
    assert_eq!(collect("ab|xy", "", "abxy"), vec![1, 2]);
    assert_eq!(collect("ab", "", "abab"), vec![1, 1]);
  }

  #[test]
  fn longest_match_wins() {
    // "ab" is longer than "a" even though "a" accepts earlier
    assert_eq!(collect("a|ab", "", "ab"), vec![2]);
    assert_eq!(collect("a*z", "", "azaazz"), vec![1, 1, 1]);
  }

  #[test]
  fn literal_trie_patterns() {
    assert_eq!(collect("if|int|i", "", "ifiint"), vec![1, 3, 2]);
  }

  #[test]
  fn text_and_positions() {
    let pattern = Pattern::new("\\w+| ", "").unwrap();
    let mut lexer = Lexer::new(pattern, "ab cd");
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.text(), b"ab");
    assert_eq!((lexer.first(), lexer.last()), (0, 2));
    assert_eq!(lexer.scan(), 2);
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.text(), b"cd");
    assert_eq!((lexer.first(), lexer.last()), (3, 5));
    assert_eq!(lexer.scan(), 0);
    assert!(lexer.at_end());
  }

  #[test]
  fn lineno_and_columno() {
    let pattern = Pattern::new("\\w+|\\n| ", "").unwrap();
    let mut lexer = Lexer::new(pattern, "ab\n cd");
    assert_eq!(lexer.scan(), 1);
    assert_eq!((lexer.lineno(), lexer.columno()), (1, 0));
    assert_eq!(lexer.scan(), 2);
    assert_eq!(lexer.scan(), 3);
    assert_eq!(lexer.scan(), 1);
    assert_eq!((lexer.lineno(), lexer.columno()), (2, 1));
  }

  #[test]
  fn jam_returns_zero_and_strict_errors() {
    let pattern = Pattern::new("a+", "").unwrap();
    let mut lexer = Lexer::new(pattern, "aaxb");
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.scan(), 0);
    assert!(!lexer.at_end());
    let err = lexer.scan_strict().unwrap_err();
    assert_eq!(err.next, Some(b'x'));
    // the caller consumes the jammed byte and continues
    assert_eq!(lexer.next_byte(), Some(b'x'));
    assert_eq!(lexer.scan(), 0); // 'b' jams as well
    assert_eq!(lexer.next_byte(), Some(b'b'));
    assert_eq!(lexer.scan(), 0);
    assert!(lexer.at_end());
  }

  #[test]
  fn more_accumulates() {
    let pattern = Pattern::new("\\w", "").unwrap();
    let mut lexer = Lexer::new(pattern, "abc");
    let mut texts = Vec::new();
    while lexer.scan() != 0 {
      texts.push(lexer.text_str().to_string());
      lexer.more();
    }
    assert_eq!(texts, vec!["a", "ab", "abc"]);
  }

  #[test]
  fn less_pushes_back() {
    let pattern = Pattern::new("\\w+", "").unwrap();
    let mut lexer = Lexer::new(pattern, "abc");
    let mut texts = Vec::new();
    while lexer.scan() != 0 {
      lexer.less(1);
      texts.push(lexer.text_str().to_string());
    }
    assert_eq!(texts, vec!["a", "b", "c"]);
  }

  #[test]
  fn unput_prepends() {
    let pattern = Pattern::new("\\w+", "").unwrap();
    let mut lexer = Lexer::new(pattern, "bc");
    lexer.unput(b'a');
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.text(), b"abc");
  }

  #[test]
  fn rest_returns_remaining_input() {
    let pattern = Pattern::new("\\w+", "").unwrap();
    let mut lexer = Lexer::new(pattern, "abc def");
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.rest(), b" def");
  }

  #[test]
  fn split_yields_empty_terminal() {
    let pattern = Pattern::new("\\w+", "").unwrap();
    let mut lexer = Lexer::new(pattern, "ab-cd");
    assert_eq!(lexer.split(), 1); // "ab"
    assert_eq!(lexer.split(), 1); // skips '-', "cd"
    assert_eq!(lexer.split(), EMPTY);
    assert_eq!(lexer.split(), 0);
  }

  #[test]
  fn column_function_strides() {
    let columns = ColumnFn::TabStride(4);
    assert_eq!(columns.advance(0, b'\t'), 4);
    assert_eq!(columns.advance(3, b'\t'), 4);
    assert_eq!(columns.advance(4, b'\t'), 8);
    assert_eq!(columns.advance(4, b'x'), 5);

    let options = LexerOptions::new("T=2");
    assert_eq!(options.columns.advance(1, b'\t'), 2);
    assert!(LexerOptions::new("A").expose_redo);
    assert!(LexerOptions::new("W").half_check_words);
  }

  #[test]
  fn compiled_fsm_dispatch() {
    // hand-compiled FSM for the pattern "ab"
    fn fsm_ab(lexer: &mut Lexer) {
      if lexer.fsm_char() == Some(b'a') && lexer.fsm_char() == Some(b'b') {
        lexer.fsm_take(1);
      }
      lexer.fsm_halt();
    }
    let pattern = Pattern::from_fsm(fsm_ab, None);
    let mut lexer = Lexer::new(pattern, "abab");
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.scan(), 1);
    assert_eq!(lexer.scan(), 0);
  }
}
