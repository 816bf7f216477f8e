/*!
  The parser converts a regex string into the positional-NFA artifacts the
  compiler consumes: the start position set, the follow-position map (NFA
  edges without epsilon transitions), the modifier map, the lookahead map,
  the string-literal trie, and the subpattern endpoint table.

  Stages, each handling one precedence level:

  ```text
  parse ⟶ parse_anchors ⟶ parse_iterated ⟶ parse_sequence
            ↑                                      │
            └───────── parse_alternations ←────────┘
  ```

  `parse` splits the top level on `|` into subpatterns numbered from 1 and
  diverts branches that are plain string literals into the trie. Bracket
  classes are only delimited here; their content is re-parsed by the
  compiler's `compile_list` when transitions are built.
*/

use std::cmp::max;
use std::time::Duration;

use quanta::Clock;

use crate::character::{Char, Meta};
use crate::chars::{self, Chars, POSIX_CLASSES, POSIX_CLASS_NAMES};
use crate::error::RegexError;
use crate::group::Group;
use crate::limits::{MAX_INDEX, MAX_ITER};
use crate::modifier::{Mode, Modifiers};
use crate::options::Options;
use crate::position::{Position, PositionSet};
use crate::{Accept32, FollowMap, Index32, Iteration16, Lazy8, LookaheadMap};

/// Escapes that keep a leading `\` from being part of a plain string
/// literal subpattern.
static END_ESCAPE_OPTION: &[u8; 38] = b"0123456789<>ABDHLNPSUWXbcdehijklpsuwxz";
/// Regex operators that disqualify a branch from the string-literal trie.
static META_OPS: &[u8; 9] = b".^$([{?*+";

pub struct Parser<'a> {
  pub(crate) regex   : &'a [u8],  //< regular expression string as bytes
  idx                : Index32,   //< cursor into `regex`
  pub(crate) options : Options,   //< pattern compiler options
  pub(crate) modifiers: Modifiers, //< which modifiers are active at which locations

  /// For each position, the positions that may follow it.
  pub(crate) follow_map: FollowMap,
  /// First positions of the whole pattern; the start state of the DFA.
  pub(crate) start_positions: PositionSet,
  /// Top-level subpattern index → location ranges of its `(?=X)` groups,
  /// spanning the `(` through the closing `)`.
  pub(crate) lookahead_map: LookaheadMap,
  /// The outermost group; owns the string-literal trie.
  pub(crate) group: Group,
  /// Byte offset of each subpattern's terminating `|` or end of regex.
  pub(crate) subpattern_endpoints: Vec<Index32>,
  /// Errors recovered from (never contains the error that aborted a parse).
  pub(crate) errors: Vec<RegexError>,

  lazy_index : Lazy8,    //< running lazy-quantifier id
  parse_time : Duration,
}

impl<'a> Default for Parser<'a> {
  fn default() -> Self {
    Parser {
      regex: &[],
      idx: 0,
      options: Options::default(),
      modifiers: Modifiers::default(),
      follow_map: FollowMap::new(PositionSet::new()),
      start_positions: PositionSet::new(),
      lookahead_map: LookaheadMap::new(ranges::Ranges::new()),
      group: Group::default(),
      subpattern_endpoints: Vec::new(),
      errors: Vec::new(),
      lazy_index: 0,
      parse_time: Duration::default(),
    }
  }
}

impl<'a> Parser<'a> {
  pub fn new(regex: &'a str, options_string: &str) -> Result<Parser<'a>, RegexError> {
    let mut parser = Parser {
      regex: regex.as_bytes(),
      options: Options::new(options_string)?,
      ..Parser::default()
    };
    parser.parse()?;
    Ok(parser)
  }

  pub fn with_options(regex: &'a str, options: Options) -> Result<Parser<'a>, RegexError> {
    let mut parser = Parser {
      regex: regex.as_bytes(),
      options,
      ..Parser::default()
    };
    parser.parse()?;
    Ok(parser)
  }

  /// Number of top-level subpatterns.
  pub fn subpattern_count(&self) -> Accept32 {
    self.subpattern_endpoints.len() as Accept32
  }

  pub fn parse_time(&self) -> Duration {
    self.parse_time
  }

  // region cursor helpers

  /// The character at index `idx`, or NUL past the end.
  #[must_use]
  pub(crate) fn at(&self, idx: Index32) -> Char {
    if idx >= self.regex.len() as Index32 {
      return Char::from(0u8);
    }
    Char::from(self.regex[idx as usize])
  }

  /// Same as `at()` at the cursor.
  #[must_use]
  fn c(&self) -> Char {
    self.at(self.idx)
  }

  /// Same as `c()` but pre-increments the cursor.
  #[must_use]
  fn cr(&mut self) -> Char {
    self.idx += 1;
    self.at(self.idx)
  }

  /// The character after the escape character at `loc`, if one is there.
  #[must_use]
  pub(crate) fn escape_at(&self, loc: Index32) -> Option<Char> {
    if self.at(loc) == self.options.escape_character {
      return Some(self.at(loc + 1));
    }
    None
  }

  /// As `escape_at` but only for the escapes in `escapes`.
  #[must_use]
  pub(crate) fn escapes_at(&self, loc: Index32, escapes: &[u8]) -> Option<Char> {
    if self.at(loc) == self.options.escape_character
        && !self.at(loc + 1).is_meta()
        && escapes.contains(&u8::from(self.at(loc + 1)))
    {
      return Some(self.at(loc + 1));
    }
    None
  }

  /// Index of the first occurrence of `c` at or after `idx`.
  pub(crate) fn find_at(&self, idx: Index32, c: char) -> Option<Index32> {
    self.regex[(idx as usize).min(self.regex.len())..]
        .iter()
        .position(|&x| x == c as u8)
        .map(|offset| idx + offset as Index32)
  }

  // endregion

  /// Records `err` and decides whether to abort: always for
  /// `ExceedsLimits`, otherwise per option `r`. Option `w` echoes the caret
  /// rendering to standard error either way.
  fn error(&mut self, err: RegexError) -> Result<(), RegexError> {
    if self.options.write_to_stderr {
      eprintln!("{}", err.render(std::str::from_utf8(self.regex).unwrap_or("")));
    }
    if self.options.raise_on_error || matches!(err, RegexError::ExceedsLimits(_)) {
      return Err(err);
    }
    self.errors.push(err);
    Ok(())
  }

  /// The accept positions for subpattern `choice`, one per live lazy id.
  fn accept_positions(choice: Accept32, group: &Group) -> PositionSet {
    let accept = Position(choice as u64).set_accept(true);
    let mut result = PositionSet::new();
    if group.lazy_set.is_empty() {
      result.insert(accept);
    } else {
      for &l in group.lazy_set.iter() {
        result.insert(accept.set_lazy(l));
      }
    }
    result
  }

  /**
    ## Stage 0A

    Top level: global modifiers, then the subpatterns of the `|`-separated
    alternation, numbering accepts from 1. Branches that turn out to be
    plain string literals go into the trie instead of the position NFA.
  */
  fn parse(&mut self) -> Result<(), RegexError> {
    let len = self.regex.len() as Index32;

    debug_log!("parse() begin, {} bytes", len);

    if len == MAX_INDEX {
      return Err(RegexError::ExceedsLength(MAX_INDEX));
    }

    let timer = Clock::new();
    let parse_start_time = timer.raw();

    self.parse_global_modifiers()?;

    let mut choice: Accept32 = 1;

    loop {
      // Look for a string-literal subpattern first: a branch free of regex
      // operators can bypass position construction entirely.
      let mut end = self.idx;
      if !self.options.quote_with_x && !self.options.x_freespacing {
        loop {
          let mut c = self.at(end);
          if c == '\0' || c == '|' {
            break;
          }
          if META_OPS.contains(&c.into()) {
            end = self.idx;
            break;
          }
          if c == self.options.escape_character {
            end += 1;
            c = self.at(end);
            if c == '\0' || END_ESCAPE_OPTION.contains(&c.into()) {
              end = self.idx;
              break;
            }
            if c == 'Q' {
              // \Q...\E spans stay literal
              loop {
                end += 1;
                c = self.at(end);
                if c == '\0' {
                  break;
                }
                if c == self.options.escape_character && self.at(end + 1) == 'E' {
                  break;
                }
              }
            }
          }
          end += 1;
        }
      }

      if self.idx < end {
        // String pattern found: unescape and insert into the literal trie.
        let mut string_literal = String::new();
        let mut quote = false;

        while self.idx < end {
          let mut c = self.c();
          self.idx += 1;
          if c == self.options.escape_character {
            if self.c() == 'Q' {
              quote = true;
              self.idx += 1;
              continue;
            }
            if self.c() == 'E' {
              quote = false;
              self.idx += 1;
              continue;
            }
            if !quote {
              c = self.c();
              self.idx += 1;
              if let Some(unescaped) = Char::try_from_escape(c) {
                c = unescaped;
              }
            }
          } else if self.options.insensitive_case && c >= 'A' && c <= 'Z' {
            c = c.to_lowercase();
          }
          string_literal.push(c.into());
        }
        self.group.insert_string(&string_literal, choice);
        self.subpattern_endpoints.push(self.idx);
      } else {
        let mut group = Group::with_idx(choice);
        self.parse_anchors(true, &mut group)?;

        self.subpattern_endpoints.push(self.idx);

        self.start_positions.extend(group.first_positions.iter());
        if group.nullable {
          self.start_positions.extend(Self::accept_positions(choice, &group).iter());
        }
        let accepts = Self::accept_positions(choice, &group);
        for k in group.last_positions.iter() {
          self.follow_map
              .get_mut(k.index_with_iter())
              .extend(accepts.iter());
        }
      }

      if self.c() != '|' {
        break;
      }
      self.idx += 1;
      choice += 1;
    }

    if len > 0 {
      if self.options.insensitive_case {
        self.modifiers.set(Mode::i, 0..len);
      }
      if self.options.multiline {
        self.modifiers.set(Mode::m, 0..len);
      }
      if self.options.single_line {
        self.modifiers.set(Mode::s, 0..len);
      }
    }

    self.parse_time = timer.delta(parse_start_time, timer.raw());
    debug_log!(
      "parse() end: {} subpatterns, {} start positions, {}us",
      self.subpattern_endpoints.len(),
      self.start_positions.len(),
      self.parse_time.as_micros()
    );
    Ok(())
  }

  /**
    ## Stage 0B

    A leading `(?imqsx-imqsx)` group sets the global options: modifiers
    before the dash enable, after it disable. Anything else starting with
    `(?` is left for the group parser.
  */
  fn parse_global_modifiers(&mut self) -> Result<(), RegexError> {
    if self.c() == '(' && self.at(1) == '?' {
      self.idx = 2;

      // find the end of the candidate option expression
      while self.c().is_alphanumeric() || self.c() == '-' {
        self.idx += 1;
      }

      if self.c() == ')' {
        let mut active = true;
        self.idx = 2;

        let mut c: char = self.c().into();
        while c != ')' {
          match c {
            '-' => active = false,
            'i' => self.options.insensitive_case = active,
            'm' => self.options.multiline = active,
            'q' => self.options.quote_with_x = active,
            's' => self.options.single_line = active,
            'x' => self.options.x_freespacing = active,
            _ => {
              self.error(RegexError::InvalidModifier(self.idx))?;
            }
          }
          self.idx += 1;
          c = self.c().into();
        }
        self.idx += 1; // skip the ')'
      } else {
        // `(?...)` holds more than mode letters: reparse as a group
        self.idx = 0;
      }
    }
    Ok(())
  }

  /**
    ## Stage 1

    Alternations inside a group: unions the attributes of the `|` branches.
  */
  fn parse_alternations(&mut self, begin: bool, group: &mut Group) -> Result<(), RegexError> {
    self.parse_anchors(begin, group)?;

    while self.c() == '|' {
      self.idx += 1;

      let mut branch = Group::with_idx(group.idx);
      self.parse_anchors(begin, &mut branch)?;

      group.first_positions.extend(branch.first_positions.iter());
      group.last_positions.extend(branch.last_positions.iter());
      group.lazy_set.extend(branch.lazy_set.iter());
      group.nullable = group.nullable || branch.nullable;
      group.iteration = max(branch.iteration, group.iteration);
    }
    Ok(())
  }

  /**
    ## Stage 2

    A concatenation of iterated atoms, preceded — when `begin` — by the
    anchors `^`, `\A`, `\b`, `\B`, `\<`, `\>`. Anchor positions are linked
    after the body: they test the match-start condition, which holds at any
    point along the path, so the check rides behind the last positions where
    it composes with lazy trimming.
  */
  fn parse_anchors(&mut self, begin: bool, group: &mut Group) -> Result<(), RegexError> {
    let mut anchor_positions = PositionSet::new();
    if begin {
      loop {
        if self.options.x_freespacing {
          while self.c().is_whitespace() {
            self.idx += 1;
          }
        }
        if self.c() == '^' {
          anchor_positions.insert(Position(self.idx as u64));
          self.idx += 1;
        } else if self.escapes_at(self.idx, b"ABb<>").is_some() {
          anchor_positions.insert(Position(self.idx as u64));
          self.idx += 2;
        } else {
          break;
        }
      }
    }

    self.parse_iterated(begin, group)?;

    let mut c = self.c();
    while c != '\0' && c != '|' && c != ')' {
      let mut next = Group::with_idx(group.idx);
      self.parse_iterated(false, &mut next)?;

      if !group.lazy_set.is_empty() {
        // under a live lazy quantifier the continuation is reachable both
        // tagged and untagged
        let lazified = group.lazify(&next.first_positions);
        next.first_positions.extend(lazified.iter());
      }

      for p in group.last_positions.iter() {
        self.follow_map
            .get_mut(p.index_with_iter())
            .extend(next.first_positions.iter());
      }

      if group.nullable {
        group.first_positions.extend(next.first_positions.iter());
      }
      if next.nullable {
        group.last_positions.extend(next.last_positions.iter());
      } else {
        group.last_positions = next.last_positions;
      }
      group.nullable = group.nullable && next.nullable;
      group.lazy_set.extend(next.lazy_set.iter());
      group.iteration = max(next.iteration, group.iteration);

      c = self.c();
    }

    for p in anchor_positions.iter() {
      for k in group.last_positions.iter() {
        if self.at(k.idx()) == ')'
            && self.lookahead_map.get(&group.idx).contains(&k.idx())
        {
          // keep the lookahead tail reachable past the anchor check
          self.follow_map.get_mut(p.index_with_iter()).insert(*k);
        }
        self.follow_map
            .get_mut(k.index_with_iter())
            .insert(p.set_anchor(!group.nullable || k.idx() != p.idx()));
      }

      group.last_positions.clear();
      group.last_positions.insert(*p);

      if group.nullable {
        group.first_positions.insert(*p);
        group.nullable = false;
      }
    }
    Ok(())
  }

  /**
    ## Stage 3

    An atom followed by quantifiers: `?`, `*`, `+`, `{n,m}`, each optionally
    lazy. Bounded repetition is expanded by virtually copying the atom's
    follow relations `m - 1` times with distinct iteration counters.
  */
  fn parse_iterated(&mut self, begin: bool, group: &mut Group) -> Result<(), RegexError> {
    let begin_position = Position(self.idx as u64);

    self.parse_sequence(begin, group)?;

    let mut c = self.c();
    if self.options.x_freespacing {
      while c.is_whitespace() {
        c = self.cr();
      }
    }

    loop {
      if c == '*' || c == '+' || c == '?' {
        if c == '*' || c == '?' {
          group.nullable = true;
        }
        self.idx += 1;

        if self.c() == '?' {
          // lazy quantifier: a fresh id tags the positions it governs
          self.lazy_index = match self.lazy_index.checked_add(1) {
            Some(i) => i,
            None => {
              // more than 255 lazy quantifiers
              return Err(RegexError::ExceedsLimits(self.idx));
            }
          };
          group.lazy_set.insert(self.lazy_index);
          if group.nullable {
            group.lazify_first_positions();
          }
          self.idx += 1;
        } else {
          group.greedify_first_positions();
        }

        if c == '+' && !group.nullable && !group.lazy_set.is_empty() {
          let lazy_first = group.lazify(&group.first_positions);
          for p in group.last_positions.iter() {
            self.follow_map
                .get_mut(p.index_with_iter())
                .extend(lazy_first.iter());
          }
          group.first_positions.extend(lazy_first.iter());
        } else if c == '*' || c == '+' {
          for p in group.last_positions.iter() {
            self.follow_map
                .get_mut(p.index_with_iter())
                .extend(group.first_positions.iter());
          }
        }
      } else if c == '{' {
        // {n,m} repeats the atom at least n and at most m times
        let k = self.parse_digits();
        if k > MAX_ITER as usize {
          return Err(RegexError::ExceedsLimits(self.idx));
        }
        let n = k as Iteration16;
        let mut m = n;
        let mut unlimited = false;

        if self.c() == ',' {
          if self.at(self.idx + 1).is_digit() {
            m = self.parse_digits() as Iteration16;
          } else {
            unlimited = true;
            self.idx += 1;
          }
        }

        if self.c() != '}' {
          self.error(RegexError::InvalidRepeat(self.idx))?;
          // recover by closing the brace where we stand
          c = self.c();
          if c == '\0' {
            break;
          }
          continue;
        }

        let was_nullable = group.nullable;
        if n == 0 {
          group.nullable = true;
        }
        if n > m {
          self.error(RegexError::InvalidRepeat(self.idx))?;
          m = n;
        }

        self.idx += 1;

        if self.c() == '?' {
          self.lazy_index = match self.lazy_index.checked_add(1) {
            Some(i) => i,
            None => return Err(RegexError::ExceedsLimits(self.idx)),
          };
          group.lazy_set.insert(self.lazy_index);
          if group.nullable {
            group.lazify_first_positions();
          }
          self.idx += 1;
        } else if n < m && group.lazy_set.is_empty() {
          group.greedify_first_positions();
        }

        if !group.nullable {
          // keep the lazy continuation reachable across copies
          let lazified = group.lazify(&group.first_positions);
          group.first_positions.extend(lazified.iter());
        }

        if group.nullable && unlimited {
          // {0,} is *
          for p in group.last_positions.iter() {
            self.follow_map
                .get_mut(p.index_with_iter())
                .extend(group.first_positions.iter());
          }
        } else if m > 0 {
          if group.iteration.checked_mul(m).is_none()
              || group.iteration * m > MAX_ITER
          {
            return Err(RegexError::ExceedsLimits(self.idx));
          }

          // virtually repeat the sub-regex m-1 times by copying its follow
          // relations onto fresh iteration counters
          {
            let mut more_follow: Vec<(Position, PositionSet)> = Vec::new();
            for (position, position_set) in self.follow_map.iter() {
              if position.idx() >= begin_position.idx() {
                for i in 0..m - 1 {
                  let copied: PositionSet = position_set
                      .iter()
                      .map(|p| p.increment_iter(group.iteration * (i + 1)))
                      .collect();
                  more_follow.push((
                    position.increment_iter(group.iteration * (i + 1)),
                    copied,
                  ));
                }
              }
            }
            for (position, position_set) in more_follow {
              self.follow_map.get_mut(position).extend(position_set.iter());
            }
          }

          // m-1 concatenations between consecutive copies
          for i in 0..m - 1 {
            for k in group.last_positions.iter() {
              for j in group.first_positions.iter() {
                self.follow_map
                    .get_mut(
                      Position(k.idx() as u64)
                          .increment_iter(group.iteration * i),
                    )
                    .insert(j.increment_iter(group.iteration * (i + 1)));
              }
            }
          }
          if unlimited {
            for k in group.last_positions.iter() {
              for j in group.first_positions.iter() {
                self.follow_map
                    .get_mut(
                      Position(k.idx() as u64)
                          .increment_iter(group.iteration * (m - 1)),
                    )
                    .insert(j.increment_iter(group.iteration * (m - 1)));
              }
            }
          }
          if was_nullable {
            // all copies are optional when the atom is nullable
            let mut more_first = PositionSet::new();
            for i in 1..m {
              for k in group.first_positions.iter() {
                more_first.insert(k.increment_iter(group.iteration * i));
              }
            }
            group.first_positions.extend(more_first.iter());
          }
          {
            // copies n-1 through m-1 can end the match (all when nullable)
            let mut new_last = PositionSet::new();
            let start_copy = if group.nullable { 0 } else { n - 1 };
            for i in start_copy..m {
              for k in group.last_positions.iter() {
                new_last.insert(k.increment_iter(group.iteration * i));
              }
            }
            group.last_positions = new_last;
          }
          group.iteration *= m;
        } else {
          // zero range {0}
          group.first_positions.clear();
          group.last_positions.clear();
          group.lazy_set.clear();
        }
      } else {
        break;
      }
      c = self.c();
    }
    Ok(())
  }

  /// Up to five decimal digits starting at the cursor; leaves the cursor on
  /// the first non-digit.
  fn parse_digits(&mut self) -> usize {
    let mut k: usize = 0;
    for _ in 0..5 {
      let c = self.cr();
      if !c.is_digit() {
        break;
      }
      k = 10 * k + (u8::from(c) - b'0') as usize;
    }
    k
  }

  /**
    ## Stage 4

    A single atom: a group `(...)` with its `(?...)` variants, a bracket
    class, a quotation, a comment, or a literal character.
  */
  fn parse_sequence(&mut self, begin: bool, group: &mut Group) -> Result<(), RegexError> {
    group.first_positions.clear();
    group.last_positions.clear();
    group.lazy_set.clear();
    group.nullable = true;
    group.iteration = 1;

    let mut c = self.c();

    if c == '(' {
      self.idx += 1;
      // an inline (?imqsx) group carries no closing paren of its own
      let mut expect_paren = true;

      if self.c() == '?' {
        c = self.cr();

        if c == '#' {
          // (?# comment )
          match self.find_at(self.idx, ')') {
            Some(closing) => self.idx = closing + 1,
            None => {
              self.error(RegexError::MismatchedParens(self.idx))?;
              self.idx = self.regex.len() as Index32;
            }
          }
          return Ok(());
        } else if c == '^' {
          // (?^X) negative pattern: match and discard
          self.idx += 1;
          self.parse_alternations(begin, group)?;

          let marker = Position(0).set_accept(true).set_negate(true);
          for p in group.last_positions.iter() {
            self.follow_map.get_mut(p.index_with_iter()).insert(marker);
          }
          // no ordinary accept: the subpattern finalizes through the marker
          group.last_positions.clear();
          group.nullable = false;
        } else if c == '=' {
          // (?=X) lookahead
          let lookahead_start = Position((self.idx - 2) as u64); // at the (
          self.idx += 1;

          self.parse_alternations(begin, group)?;

          group.first_positions.insert(lookahead_start);
          if group.nullable {
            group.last_positions.insert(lookahead_start);
          }

          {
            // nested lookaheads are not supported: only record the range if
            // it does not overlap one already present
            let lookahead = self.lookahead_map.get_mut(group.idx);
            if !lookahead.contains(&lookahead_start.idx()) && !lookahead.contains(&(self.idx - 1)) {
              lookahead.insert(ranges::GenericRange::from(lookahead_start.idx()..self.idx));
            }
          }

          let ticked = Position(self.idx as u64).set_ticked(true);
          for p in group.last_positions.iter() {
            self.follow_map.get_mut(p.index_with_iter()).insert(ticked);
          }
          group.last_positions.insert(ticked);
          if group.nullable {
            group.first_positions.insert(ticked);
            group.last_positions.insert(lookahead_start);
          }
        } else if c == ':' {
          self.idx += 1;
          self.parse_alternations(begin, group)?;
        } else if c == 'P' && self.at(self.idx + 1) == '<' {
          // (?P<name>X) named capture: the name is ignored
          match self.find_at(self.idx + 2, '>') {
            Some(closing) => {
              self.idx = closing + 1;
              self.parse_alternations(begin, group)?;
            }
            None => {
              self.error(RegexError::InvalidSyntax(self.idx))?;
              self.idx = self.regex.len() as Index32;
            }
          }
        } else {
          // (?imqsx-imqsx:X) scoped modifiers, or (?imqsx) inline to the
          // end of the enclosing group
          let mut modifier_start = self.idx;

          // a nested group may flip x/q; restore after
          let opt_q = self.options.quote_with_x;
          let opt_x = self.options.x_freespacing;
          let mut active = true;

          loop {
            if c == '-' {
              active = false;
            } else if c == 'q' {
              self.options.quote_with_x = active;
            } else if c == 'x' {
              self.options.x_freespacing = active;
            } else if c != 'i' && c != 'm' && c != 's' {
              self.error(RegexError::InvalidModifier(self.idx))?;
            }
            c = self.cr();
            if c == '\0' || c == ':' || c == ')' {
              break;
            }
          }

          if c == ')' {
            expect_paren = false;
          }
          if c != '\0' {
            self.idx += 1;
          }

          self.parse_alternations(begin, group)?;

          // apply the i/m/s letters over the span just parsed
          active = true;
          loop {
            let m = self.at(modifier_start);
            modifier_start += 1;
            if m == '-' {
              active = false;
            } else if m != '\0' && m != 'q' && m != 'x' && m != ':' && m != ')' {
              let letter: char = m.into();
              let mode = match active {
                true  => Mode::try_from_char(letter),
                false => Mode::try_from_char(letter.to_ascii_uppercase()),
              };
              if let Some(mode) = mode {
                self.modifiers.set(mode, modifier_start..self.idx);
              }
            }
            if m == '\0' || m == ':' || m == ')' {
              break;
            }
          }

          self.options.quote_with_x = opt_q;
          self.options.x_freespacing = opt_x;
        }
      } else {
        self.parse_alternations(begin, group)?;
      }

      if expect_paren {
        if self.c() == ')' {
          self.idx += 1;
        } else {
          self.error(RegexError::MismatchedParens(self.idx))?;
        }
      }
    } else if c == '[' {
      // delimit the class here; compile_list parses its content later
      group.first_positions.insert(Position(self.idx as u64));
      group.last_positions.insert(Position(self.idx as u64));
      group.nullable = false;

      c = self.cr();
      if c == '^' {
        c = self.cr();
      }

      let mut depth = 0usize; // [a&&[b]] nests
      while c != '\0' {
        if c == '[' && self.at(self.idx + 1) == ':' {
          // nested [: ... :] POSIX class
          if let Some(closing) = self.find_at(self.idx + 2, ':') {
            if self.at(closing + 1) == ']' {
              self.idx = closing + 1;
            }
          }
        } else if c == '&' && self.at(self.idx + 1) == '&' && self.at(self.idx + 2) == '[' {
          depth += 1;
          self.idx += 2;
        } else if c == self.options.escape_character && !self.options.bracket_escapes {
          self.idx += 1;
        }
        c = self.cr();
        if c == ']' {
          if depth == 0 {
            break;
          }
          depth -= 1;
        }
      }

      if c == '\0' {
        self.error(RegexError::MismatchedBrackets(self.idx))?;
      }
      self.idx += 1;
    } else if (c == '"' && self.options.quote_with_x)
        || self.escape_at(self.idx) == Some(Char::from('Q'))
    {
      // "..." or \Q...\E: verbatim content, one position per byte
      let double_quotes = c == '"';
      if !double_quotes {
        self.idx += 1;
      }
      c = self.cr();
      let quote_start = self.idx;

      let still_open = match double_quotes {
        true  => c != '"',
        false => c != self.options.escape_character || self.at(self.idx + 1) != 'E',
      };

      if c != '\0' && still_open {
        group.first_positions.insert(Position(self.idx as u64));
        let mut p = Position::new();
        loop {
          if double_quotes
              && c == self.options.escape_character
              && self.at(self.idx + 1) == '"'
          {
            self.idx += 1;
          }
          if p != Position::new() {
            self.follow_map
                .get_mut(p.index_with_iter())
                .insert(Position(self.idx as u64));
          }
          p = Position(self.idx as u64);
          self.idx += 1;
          c = self.c();

          let done = c == '\0'
              || (double_quotes && c == '"')
              || (!double_quotes
                  && c == self.options.escape_character
                  && self.at(self.idx + 1) == 'E');
          if done {
            break;
          }
        }
        group.last_positions.insert(p);
        group.nullable = false;
        self.modifiers.set(Mode::q, quote_start..self.idx);
      }

      if !double_quotes && self.c() != '\0' {
        self.idx += 1; // the \ of \E
      }
      if self.c() != '\0' {
        self.idx += 1; // the closing " or the E
      } else {
        self.error(RegexError::MismatchedQuotation(self.idx))?;
      }
    } else if c == '#' && self.options.x_freespacing {
      self.idx = match self.find_at(self.idx, '\n') {
        Some(index) => index + 1,
        None => self.regex.len() as Index32,
      };
    } else if c.is_whitespace() && self.options.x_freespacing {
      self.idx += 1;
    } else if c == ')' {
      self.error(RegexError::MismatchedParens(self.idx))?;
      self.idx += 1;
    } else if c == '}' {
      self.error(RegexError::MismatchedBraces(self.idx))?;
      self.idx += 1;
    } else if c != '\0' && c != '|' && c != '?' && c != '*' && c != '+' {
      group.first_positions.insert(Position(self.idx as u64));
      group.last_positions.insert(Position(self.idx as u64));
      group.nullable = false;
      if c == self.options.escape_character {
        self.parse_esc(None)?;
      } else {
        self.idx += 1;
      }
    } else if (c == '?' || c == '*' || c == '+') && !begin {
      self.error(RegexError::InvalidQuantifier(self.idx))?;
      self.idx += 1;
    }
    Ok(())
  }

  /// Parses the escape sequence at the cursor (which sits on the escape
  /// character), advancing past it; errors are recorded per the recovery
  /// policy. See [`scan_escape`].
  pub(crate) fn parse_esc(&mut self, chars: Option<&mut Chars>) -> Result<Char, RegexError> {
    let mut loc = self.idx;
    let result = scan_escape(self.regex, self.options.escape_character, &mut loc, chars);
    self.idx = loc;
    match result {
      Ok(c) => Ok(c),
      Err(err) => {
        self.error(err)?;
        Ok(Char(0))
      }
    }
  }
}

/**
  Scans the escape sequence at `*loc` (on the escape character itself),
  advancing `*loc` past it. When `chars` is given, the characters the escape
  denotes are inserted; a class escape like `\w` inserts the whole class.
  Returns the single character the escape denotes, or a meta char as an
  "inserted a class, no single character" signal.

  Shared between the parser (which records errors per the recovery policy)
  and the compiler's transition builder (which re-reads locations already
  validated).
*/
pub(crate) fn scan_escape(
  regex: &[u8],
  escape: Char,
  loc: &mut Index32,
  mut chars: Option<&mut Chars>,
) -> Result<Char, RegexError> {
  let at = |k: Index32| -> Char {
    if k >= regex.len() as Index32 {
      Char::from(0u8)
    } else {
      Char::from(regex[k as usize])
    }
  };

  debug_assert!(at(*loc) == escape);
  *loc += 1;
  let mut c = at(*loc);

  if c == '0' {
    // \0nnn octal
    c = Char(0);
    let mut digits = 0;
    while digits < 3 && at(*loc + 1).0 >= b'0' as u16 && at(*loc + 1).0 <= b'7' as u16 {
      *loc += 1;
      c = Char((c.0 << 3) + at(*loc).0 - b'0' as u16);
      digits += 1;
    }
    *loc += 1;
  } else if c == 'x' || c == 'u' {
    // \xHH or \x{HH}
    *loc += 1;
    let braced = at(*loc) == '{';
    if braced {
      *loc += 1;
    }

    if !at(*loc).is_hexdigit() || !at(*loc + 1).is_hexdigit() {
      return Err(RegexError::InvalidEscape(*loc));
    }
    c = Char(0);
    for _ in 0..2 {
      let d = at(*loc).0;
      let value = match d > b'9' as u16 {
        true  => (d | 0x20) - (b'a' as u16 - 10),
        false => d - b'0' as u16,
      };
      c = Char((c.0 << 4) + value);
      *loc += 1;
    }

    if braced {
      if at(*loc) == '}' {
        *loc += 1;
      } else {
        return Err(RegexError::InvalidEscape(*loc));
      }
    }
  } else if c == 'c' {
    // \cX: control character X mod 32
    *loc += 1;
    c = Char(at(*loc).0 % 32);
    *loc += 1;
  } else if c == 'e' {
    c = Char(0x1B); // ESC
    *loc += 1;
  } else if c == 'N' {
    // everything but newline
    if let Some(chars) = &mut chars {
      chars.insert_pair(Char(0), Char(9));
      chars.insert_pair(Char(11), Char(255));
    }
    *loc += 1;
    c = Meta::EndOfLine; // signal: class inserted
  } else if (c == 'p' || c == 'P') && at(*loc + 1) == '{' {
    // \p{Name} POSIX/Unicode class by name
    let negated = c == 'P';
    *loc += 2;
    let class = scan_posix_class(regex, loc)?;
    if let Some(chars) = &mut chars {
      if negated {
        let mut flipped = *class;
        flipped.flip256();
        **chars |= flipped;
      } else {
        **chars |= *class;
      }
    }
    if at(*loc) == '}' {
      *loc += 1;
    } else {
      return Err(RegexError::InvalidEscape(*loc));
    }
    c = Meta::EndOfLine;
  } else if c != '_' {
    if let Some(unescaped) = Char::try_from_escape(c) {
      c = unescaped;
    } else if let Some(chars) = chars.as_deref_mut() {
      if chars::add_posix_class(c, chars).is_some() {
        c = Meta::EndOfLine; // signal: class inserted
      }
    }
    *loc += 1;
  } else {
    *loc += 1;
  }

  if let Some(chars) = chars {
    if !c.is_meta() {
      chars.insert(c);
    }
  }
  Ok(c)
}

/// Scans the POSIX class name at `*loc`, case-insensitively, advancing past
/// it and returning its character set.
pub(crate) fn scan_posix_class(
  regex: &[u8],
  loc: &mut Index32,
) -> Result<&'static Chars, RegexError> {
  for (i, name) in POSIX_CLASS_NAMES.iter().enumerate() {
    let start = *loc as usize;
    let end = start + name.len();
    if end <= regex.len() && regex[start..end].eq_ignore_ascii_case(name.as_bytes()) {
      *loc += name.len() as Index32;
      debug_log!("posix({})", name);
      return Ok(POSIX_CLASSES[i]);
    }
  }
  Err(RegexError::InvalidClass(*loc))
}

/// Marks every eager position greedy, so it survives lazy trimming.
pub fn greedify(positions: &PositionSet) -> PositionSet {
  positions
      .iter()
      .map(|p| match p.lazy() != 0 {
        true  => *p,
        false => p.set_greedy(true),
      })
      .collect()
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn literal_subpatterns_fill_the_trie() {
    let parser = Parser::new("if|int|0", "").unwrap();
    assert_eq!(parser.group.string_trie.get("if"), Some(&1));
    assert_eq!(parser.group.string_trie.get("int"), Some(&2));
    assert_eq!(parser.group.string_trie.get("0"), Some(&3));
    assert!(parser.start_positions.is_empty());
    assert_eq!(parser.subpattern_count(), 3);
  }

  #[test]
  fn regex_subpatterns_make_positions() {
    let parser = Parser::new("a+|b", "").unwrap();
    assert_eq!(parser.subpattern_count(), 2);
    assert!(!parser.start_positions.is_empty());
    // 'a' at location 0 loops back onto itself and accepts
    let follow = parser.follow_map.get(&Position(0));
    assert!(follow.iter().any(|p| p.idx() == 0 && !p.is_accept()));
    assert!(follow.iter().any(|p| p.is_accept() && p.accepts() == 1));
  }

  #[test]
  fn subpattern_endpoints_cover_branches() {
    let parser = Parser::new("ab|xy|p+", "").unwrap();
    assert_eq!(parser.subpattern_endpoints, vec![2, 5, 8]);
  }

  #[test]
  fn global_modifier_group() {
    let parser = Parser::new("(?i)abc", "").unwrap();
    assert!(parser.options.insensitive_case);
    assert!(parser.modifiers.is_set(5, Mode::i));
  }

  #[test]
  fn scoped_modifier_ranges() {
    let parser = Parser::new("(?i:abc)|xyz", "").unwrap();
    assert!(parser.modifiers.is_set(5, Mode::i));
    assert!(!parser.modifiers.is_set(10, Mode::i));
  }

  #[test]
  fn lookahead_records_range() {
    let parser = Parser::new("a(?=bc)", "").unwrap();
    let ranges = parser.lookahead_map.get(&1);
    assert!(ranges.contains(&1)); // the (
    assert!(ranges.contains(&5)); // the body runs up to the )
    assert!(!ranges.contains(&6)); // exclusive of the ) itself
  }

  #[test]
  fn nullable_pattern_accepts_from_start() {
    let parser = Parser::new("a*", "").unwrap();
    assert!(parser.start_positions.iter().any(|p| p.is_accept()));
  }

  #[test]
  fn negative_pattern_gets_marker_accept() {
    let parser = Parser::new("(?^ab)|c", "").unwrap();
    // the position of 'b' leads to the negate marker, not a real accept
    let follow = parser.follow_map.get(&Position(4)); // 'b' of ab
    assert!(follow.iter().any(|p| p.is_accept() && p.is_negate() && p.accepts() == 0));
    assert!(!follow.iter().any(|p| p.is_accept() && !p.is_negate()));
  }

  #[test]
  fn recovered_errors_are_recorded() {
    let parser = Parser::new("[abc", "").unwrap();
    assert!(matches!(parser.errors[0], RegexError::MismatchedBrackets(_)));
  }

  #[test]
  fn raise_option_aborts() {
    assert!(Parser::new("[abc", "r").is_err());
    assert!(Parser::new("a)", "r").is_err());
  }

  #[test]
  fn unknown_modifier_is_an_error() {
    assert!(matches!(
      Parser::new("(?z:a)", "r"),
      Err(RegexError::InvalidModifier(_))
    ));
  }

  #[test]
  fn greedify_skips_lazy_positions() {
    let mut positions = PositionSet::new();
    positions.insert(Position(1));
    positions.insert(Position(2).set_lazy(3u8));
    let greedy = greedify(&positions);
    assert!(greedy.iter().any(|p| p.idx() == 1 && p.is_greedy()));
    assert!(greedy.iter().any(|p| p.idx() == 2 && !p.is_greedy()));
  }

  #[test]
  fn escapes_advance_and_unescape() {
    let mut parser = Parser::default();
    parser.regex = b"\\x41";
    parser.options = Options::default();
    parser.idx = 0;
    let c = parser.parse_esc(None).unwrap();
    assert_eq!(c, Char::from('A'));
    assert_eq!(parser.idx, 4);
  }

  #[test]
  fn class_escape_inserts_class() {
    let mut parser = Parser::default();
    parser.regex = b"\\w";
    parser.options = Options::default();
    let mut chars = Chars::new();
    let c = parser.parse_esc(Some(&mut chars)).unwrap();
    assert!(c.is_meta());
    assert!(chars.contains(Char::from('a')));
    assert!(chars.contains(Char::from('_')));
    assert!(!chars.contains(Char::from('-')));
  }
}
