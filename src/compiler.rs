/*!
  Compiles the parser's positional NFA into a DFA.

  Subset construction proceeds over a worklist of arena states. States are
  deduplicated through a hash table over the 16-bit position-set hash, with
  a binary search tree threaded through each bucket's states for overflow.
  String-literal alternatives ride along as tree-DFA nodes merged into the
  states they correspond to, so literal prefixes expand to plain byte-table
  transitions instead of position sets.

  The closure rewriting passes run here as well: `trim_lazy` thins position
  sets so lazy quantifiers yield shortest matches, `trim_anchors` prunes
  followers that an anchor's satisfaction makes unreachable, and lookahead
  start/stop markers become per-state head/tail index sets.
*/

use std::cmp::Ordering;
use std::time::Duration;

use quanta::Clock;

use crate::character::{Char, Meta};
use crate::chars::Chars;
use crate::error::RegexError;
use crate::modifier::{range_bounds, Mode};
use crate::opcode::Opcode;
use crate::parser::{scan_escape, scan_posix_class, Parser};
use crate::position::{Position, PositionSet};
use crate::state::{Dfa, LookaheadSet, StateId, Tree, TreeId, NO_STATE, NO_TREE};
use crate::{encode, limits, Accept32, Hash16, Index32, Lookahead16, MoveVec};

/// Bucket count of the state dedup table.
const TABLE_SIZE: usize = (limits::HASH_MAX_IDX - 1) >> 3;

pub struct Compiler<'p, 'r> {
  pub(crate) parser : &'p Parser<'r>,
  pub dfa    : Dfa,
  pub tree   : Tree,
  pub start  : StateId,
  /// `reachable[n-1]` is set when some state accepts subpattern `n`.
  pub reachable: Vec<bool>,

  buckets : Vec<StateId>, //< dedup hash table; overflow threads left/right
  vertices: usize,
  edge_count: usize,
  compile_time: Duration,
}

impl<'p, 'r> Compiler<'p, 'r> {
  pub fn new(parser: &'p Parser<'r>) -> Compiler<'p, 'r> {
    Compiler {
      parser,
      dfa: Dfa::new(),
      tree: Tree::new(),
      start: NO_STATE,
      reachable: vec![false; parser.subpattern_count() as usize],
      buckets: vec![NO_STATE; TABLE_SIZE + 1],
      vertices: 0,
      edge_count: 0,
      compile_time: Duration::default(),
    }
  }

  pub fn nodes(&self) -> usize {
    self.vertices
  }

  pub fn edges(&self) -> usize {
    self.edge_count
  }

  pub fn compile_time(&self) -> Duration {
    self.compile_time
  }

  fn at(&self, loc: Index32) -> Char {
    self.parser.at(loc)
  }

  fn is_modified(&self, mode: Mode, loc: Index32) -> bool {
    self.parser.modifiers.is_set(loc, mode)
  }

  fn mark_reachable(&mut self, accept: Accept32) {
    if accept >= 1 && (accept as usize) <= self.reachable.len() {
      self.reachable[accept as usize - 1] = true;
    }
  }

  /// Runs subset construction to a fixpoint over the DFA worklist.
  pub fn compile(&mut self) -> Result<(), RegexError> {
    let timer = Clock::new();
    let started = timer.raw();

    self.build_tree();

    let mut start_positions = self.parser.start_positions.clone();
    self.close_ticked(&mut start_positions);
    trim_lazy(&mut start_positions);
    let root = self.tree.try_root();
    self.start = self.dfa.state(root, start_positions);
    self.bucket_insert(self.start);

    let mut i: usize = 0;
    while i < self.dfa.len() {
      self.compile_state(i as StateId)?;
      i += 1;
    }

    self.vertices = self.dfa.len();
    self.compile_time = timer.delta(started, timer.raw());
    debug_log!(
      "compile(): {} states, {} edges, {}us",
      self.vertices,
      self.edge_count,
      self.compile_time.as_micros()
    );
    Ok(())
  }

  /// Assembles the compiled DFA into the opcode table.
  pub fn assemble(&mut self) -> Result<Vec<Opcode>, RegexError> {
    encode::encode_dfa(&mut self.dfa, self.parser.regex.len() as Index32)
  }

  /// Unfolds the parser's literal trie into the 256-way tree DFA. Under
  /// case-insensitive mode both case variants of a letter edge lead to the
  /// same node (literals were lowercased at collection).
  fn build_tree(&mut self) {
    let fold = self.parser.options.insensitive_case;
    let entries: Vec<(Vec<u8>, Accept32)> = self
        .parser
        .group
        .string_trie
        .iter()
        .map(|(k, v)| (k, *v))
        .collect();

    for (bytes, accept) in entries {
      let mut node = self.tree.root();
      for &b in bytes.iter() {
        let child = self.tree.edge(node, b);
        if fold && b.is_ascii_lowercase() {
          self.tree.link(node, b.to_ascii_uppercase(), child);
        }
        node = child;
      }
      if self.tree.accept(node) == 0 {
        self.tree.set_accept(node, accept);
      }
    }
  }

  /// Resolves one state: accept/redo flags, lookahead head/tail sets, and
  /// the outgoing edges discovered through the move computation.
  fn compile_state(&mut self, s: StateId) -> Result<(), RegexError> {
    let positions: Vec<Position> = self.dfa.get(s).positions.iter().copied().collect();
    let tnode = self.dfa.get(s).tnode;

    let mut accept: Accept32 = 0;
    let mut redo = false;
    let mut heads = LookaheadSet::new();
    let mut tails = LookaheadSet::new();

    if tnode != NO_TREE {
      let a = self.tree.accept(tnode);
      if a != 0 {
        self.mark_reachable(a);
        accept = a;
      }
    }

    let mut moves = MoveVec::new();

    for p in positions {
      if p.is_accept() {
        if p.accepts() == 0 || p.is_negate() {
          // a negative pattern finalizes here; the match is discarded
          redo = true;
        } else {
          let a = p.accepts();
          self.mark_reachable(a);
          if accept == 0 || a < accept {
            accept = a;
          }
        }
        continue;
      }

      let loc = p.idx();

      if p.is_ticked() {
        if let Some(k) = self.lookahead_stop_index(loc) {
          tails.insert(k);
        }
        continue;
      }
      if self.at(loc) == '(' {
        if let Some(k) = self.lookahead_start_index(loc) {
          heads.insert(k);
        }
        continue;
      }

      let mut chars = Chars::new();
      self.compile_chars(p, &mut chars);
      if chars.is_empty() {
        continue;
      }

      let mut follow = self.parser.follow_map.get(&p.index_with_iter()).clone();
      if p.is_anchor() {
        trim_anchors(&mut follow, p);
      }
      transition(&mut moves, chars, follow);
    }

    {
      let state = self.dfa.get_mut(s);
      state.accept = accept;
      state.redo = redo;
      state.heads = heads;
      state.tails = tails;
    }

    self.build_edges(s, moves)
  }

  /// Converts the disjoint moves of state `s` into range edges, splitting
  /// byte runs wherever the state's tree node branches so literal targets
  /// carry their tree children along.
  fn build_edges(&mut self, s: StateId, moves: MoveVec) -> Result<(), RegexError> {
    let tnode = self.dfa.get(s).tnode;

    for (chars, mut positions) in moves {
      self.close_ticked(&mut positions);
      trim_lazy(&mut positions);
      if positions.is_empty() {
        continue;
      }

      for (lo, hi) in chars.runs() {
        if lo.is_meta() {
          let target = self.target(NO_TREE, &positions);
          if target != NO_STATE {
            self.dfa.get_mut(s).edges.insert(lo, (lo, target));
            self.edge_count += 1;
          }
          continue;
        }

        let mut c = lo.0;
        while c <= hi.0 {
          let child = self.tree.at(tnode, c as u8);
          if child == NO_TREE {
            let run_lo = c;
            while c <= hi.0 && self.tree.at(tnode, c as u8) == NO_TREE {
              c += 1;
            }
            let target = self.target(NO_TREE, &positions);
            if target != NO_STATE {
              self.dfa
                  .get_mut(s)
                  .edges
                  .insert(Char(run_lo), (Char(c - 1), target));
              self.edge_count += 1;
            }
          } else {
            let target = self.target(child, &positions);
            self.dfa.get_mut(s).edges.insert(Char(c), (Char(c), target));
            self.edge_count += 1;
            c += 1;
          }
        }
      }
    }

    // bytes the tree branches on that no regex move covered
    if tnode != NO_TREE {
      let empty = PositionSet::new();
      for b in 0u16..=255 {
        let child = self.tree.at(tnode, b as u8);
        if child == NO_TREE || self.edge_covers(s, b as u8) {
          continue;
        }
        let target = self.target(child, &empty);
        if target != NO_STATE {
          self.dfa.get_mut(s).edges.insert(Char(b), (Char(b), target));
          self.edge_count += 1;
        }
      }
    }
    Ok(())
  }

  /// A lookahead's closing `)` consumes nothing: a set containing a ticked
  /// position also contains that position's followers, which is where the
  /// subpattern's accept marker lives.
  fn close_ticked(&self, positions: &mut PositionSet) {
    loop {
      let mut additions = PositionSet::new();
      for p in positions.iter().filter(|p| p.is_ticked() && !p.is_accept()) {
        for q in self.parser.follow_map.get(&p.index_with_iter()).iter() {
          if !positions.contains(q) {
            additions.insert(*q);
          }
        }
      }
      if additions.is_empty() {
        break;
      }
      positions.extend(additions.iter());
    }
  }

  fn edge_covers(&self, s: StateId, b: u8) -> bool {
    self.dfa
        .get(s)
        .edges
        .range(..=Char(b as u16))
        .next_back()
        .map_or(false, |(_, (hi, _))| b as u16 <= hi.0)
  }

  /// Finds the state over `(tnode, positions)` or creates it, deduplicating
  /// through the hash table and per-bucket search tree.
  fn target(&mut self, tnode: TreeId, positions: &PositionSet) -> StateId {
    if tnode == NO_TREE && positions.is_empty() {
      return NO_STATE;
    }

    let bucket = (hash_pos(positions) as usize) & TABLE_SIZE;
    let mut at = self.buckets[bucket];

    if at == NO_STATE {
      let id = self.dfa.state(tnode, positions.clone());
      self.buckets[bucket] = id;
      return id;
    }

    loop {
      let (ordering, left, right) = {
        let state = self.dfa.get(at);
        (
          (tnode, positions).cmp(&(state.tnode, &state.positions)),
          state.left,
          state.right,
        )
      };
      match ordering {
        Ordering::Equal => return at,
        Ordering::Less => {
          if left == NO_STATE {
            let id = self.dfa.state(tnode, positions.clone());
            self.dfa.get_mut(at).left = id;
            return id;
          }
          at = left;
        }
        Ordering::Greater => {
          if right == NO_STATE {
            let id = self.dfa.state(tnode, positions.clone());
            self.dfa.get_mut(at).right = id;
            return id;
          }
          at = right;
        }
      }
    }
  }

  /// Enters `s` into the dedup table (used for the start state).
  fn bucket_insert(&mut self, s: StateId) {
    let bucket = (hash_pos(&self.dfa.get(s).positions) as usize) & TABLE_SIZE;
    if self.buckets[bucket] == NO_STATE {
      self.buckets[bucket] = s;
    }
  }

  /// The character set position `p` consumes, resolved against the modifier
  /// map: quoted spans are literal, `.`/`^`/`$` honor dotall and multi-line
  /// modes, classes are re-parsed, and case-insensitive spans fold.
  fn compile_chars(&self, p: Position, chars: &mut Chars) {
    let loc = p.idx();
    let c = self.at(loc);

    if self.is_modified(Mode::q, loc) {
      chars.insert(c);
    } else if c == '.' {
      chars.insert_pair(Char(0), Char(0xFF));
      if !self.is_modified(Mode::s, loc) {
        chars.remove(Char::from('\n'));
      }
    } else if c == '^' {
      chars.insert(match self.is_modified(Mode::m, loc) {
        true  => Meta::BeginningOfLine,
        false => Meta::BeginningOfBuffer,
      });
    } else if c == '$' {
      chars.insert(match self.is_modified(Mode::m, loc) {
        true  => Meta::EndOfLine,
        false => Meta::EndOfBuffer,
      });
    } else if c == '[' {
      let _ = self.compile_list(loc + 1, chars);
    } else if c == self.parser.options.escape_character {
      self.compile_escape(loc, p, chars);
    } else {
      chars.insert(c);
    }

    if self.is_modified(Mode::i, loc) {
      chars.make_case_insensitive();
    }
  }

  /// The character set of the escape at `loc`. Word-boundary escapes pick
  /// the at-begin or at-end meta depending on whether the position came in
  /// through the anchor chain.
  fn compile_escape(&self, loc: Index32, p: Position, chars: &mut Chars) {
    let e = self.at(loc + 1);
    let begin = p.is_anchor();

    if e == 'i' {
      chars.insert(Meta::IndentBoundary);
    } else if e == 'j' {
      chars.insert(Meta::DedentBoundary);
    } else if e == 'k' {
      chars.insert(Meta::UndentBoundary);
    } else if e == 'A' {
      chars.insert(Meta::BeginningOfBuffer);
    } else if e == 'Z' || e == 'z' {
      chars.insert(Meta::EndOfBuffer);
    } else if e == 'B' {
      chars.insert(match begin {
        true  => Meta::NonWordBoundary,
        false => Meta::NonWordEnd,
      });
    } else if e == 'b' {
      match begin {
        true => {
          chars.insert(Meta::BeginWordBegin);
          chars.insert(Meta::EndWordBegin);
        }
        false => {
          chars.insert(Meta::BeginWordEnd);
          chars.insert(Meta::EndWordEnd);
        }
      }
    } else if e == '<' {
      chars.insert(match begin {
        true  => Meta::BeginWordBegin,
        false => Meta::BeginWordEnd,
      });
    } else if e == '>' {
      chars.insert(match begin {
        true  => Meta::EndWordBegin,
        false => Meta::EndWordEnd,
      });
    } else {
      let mut l = loc;
      // escapes were validated at parse time; malformed ones contribute
      // nothing here
      let _ = scan_escape(
        self.parser.regex,
        self.parser.options.escape_character,
        &mut l,
        Some(chars),
      );
    }
  }

  /// Re-parses the bracket list whose content starts at `loc` (past the
  /// `[`) into `chars`: negation, ranges, POSIX classes, escapes, and
  /// `&&[...]` intersection. Returns the location past the closing `]`.
  fn compile_list(&self, mut loc: Index32, chars: &mut Chars) -> Index32 {
    let class_loc = loc - 1;
    let negate = self.at(loc) == '^';
    if negate {
      loc += 1;
    }

    let mut intersections: Vec<Chars> = Vec::new();
    let first_content = loc;

    loop {
      let c = self.at(loc);
      if c == '\0' || (c == ']' && loc > first_content) {
        break;
      }

      // [a&&[b]] intersection
      if c == '&' && self.at(loc + 1) == '&' && self.at(loc + 2) == '[' {
        let mut nested = Chars::new();
        loc = self.compile_list(loc + 3, &mut nested);
        intersections.push(nested);
        continue;
      }

      let item = self.compile_list_item(&mut loc, chars);

      // a-b range; a trailing '-' is a literal
      if let Some(lo) = item {
        if self.at(loc) == '-' && self.at(loc + 1) != ']' && self.at(loc + 1) != '\0' {
          loc += 1;
          let mut hi_chars = Chars::new();
          if let Some(hi) = self.compile_list_item(&mut loc, &mut hi_chars) {
            // an inverted range like [z-a] contributes nothing
            if lo <= hi {
              chars.insert_pair(lo, hi);
            }
          } else {
            *chars |= hi_chars;
          }
        } else {
          chars.insert(lo);
        }
      }
    }

    if self.at(loc) == ']' {
      loc += 1;
    }

    for nested in intersections {
      *chars &= nested;
    }
    if negate {
      chars.flip256();
    }
    if self.is_modified(Mode::i, class_loc) {
      chars.make_case_insensitive();
    }
    loc
  }

  /// One bracket-list item: returns a single character, or `None` after
  /// inserting a whole class (POSIX name or class escape) into `chars`.
  fn compile_list_item(&self, loc: &mut Index32, chars: &mut Chars) -> Option<Char> {
    let c = self.at(*loc);

    if c == '[' && self.at(*loc + 1) == ':' {
      // [:name:]
      let mut l = *loc + 2;
      let negate = self.at(l) == '^';
      if negate {
        l += 1;
      }
      if let Ok(class) = scan_posix_class(self.parser.regex, &mut l) {
        if self.at(l) == ':' && self.at(l + 1) == ']' {
          *loc = l + 2;
          if negate {
            let mut flipped = *class;
            flipped.flip256();
            *chars |= flipped;
          } else {
            *chars |= *class;
          }
          return None;
        }
      }
      // not a well-formed class: the '[' is literal
      *loc += 1;
      return Some(c);
    }

    if c == self.parser.options.escape_character && !self.parser.options.bracket_escapes {
      let mut l = *loc;
      let parsed = scan_escape(self.parser.regex, c, &mut l, Some(chars));
      *loc = l;
      return match parsed {
        Ok(parsed) if !parsed.is_meta() => {
          // scan_escape already inserted it; return it for range handling
          chars.remove(parsed);
          Some(parsed)
        }
        _ => None,
      };
    }

    *loc += 1;
    Some(c)
  }

  /// The ordinal of the lookahead whose body opens at `loc` (the `(` of
  /// `(?=`), counting over subpatterns in order.
  fn lookahead_start_index(&self, loc: Index32) -> Option<Lookahead16> {
    self.lookahead_index_by(|start, _stop| start == loc)
  }

  /// The ordinal of the lookahead whose closing `)` sits at `loc`.
  fn lookahead_stop_index(&self, loc: Index32) -> Option<Lookahead16> {
    self.lookahead_index_by(|_start, stop| stop == loc)
  }

  fn lookahead_index_by<F>(&self, hit: F) -> Option<Lookahead16>
    where F: Fn(Index32, Index32) -> bool
  {
    let mut keys: Vec<Accept32> = self.parser.lookahead_map.iter().map(|(k, _)| *k).collect();
    keys.sort_unstable();

    let mut n: Lookahead16 = 0;
    for key in keys {
      for range in self.parser.lookahead_map.get(&key).as_slice() {
        let (start, stop) = range_bounds(range);
        if hit(start, stop) {
          return Some(n);
        }
        n = n.checked_add(1)?;
      }
    }
    None
  }
}

/// The 16-bit hash of a position set, folded to the dedup-table width.
pub(crate) fn hash_pos(positions: &PositionSet) -> Hash16 {
  let mut h: Hash16 = 0;
  for p in positions.iter() {
    h = h.wrapping_add((p.0 ^ (p.0 >> 24)) as Hash16);
  }
  h & (TABLE_SIZE as Hash16)
}

/**
  Bins `follow` into `moves` by disjoint character subsets: the classical
  *move* computation. Overlapping character sets are carved apart, and the
  overlap's image is the union of both position sets; subsets with an
  identical image merge.
*/
pub(crate) fn transition(moves: &mut MoveVec, mut chars: Chars, follow: PositionSet) {
  let mut additions: MoveVec = Vec::new();

  for (move_chars, move_positions) in moves.iter_mut() {
    if !move_chars.intersects(&chars) {
      continue;
    }
    let common = *move_chars & chars;
    chars -= common;
    if *move_positions != follow {
      *move_chars -= common;
      let mut union = move_positions.clone();
      union.extend(follow.iter());
      additions.push((common, union));
    }
    // an identical image keeps the overlap where it is
    if chars.is_empty() {
      break;
    }
  }

  moves.retain(|(c, _)| !c.is_empty());

  for (add_chars, add_positions) in additions {
    merge_move(moves, add_chars, add_positions);
  }
  if !chars.is_empty() {
    merge_move(moves, chars, follow);
  }
}

fn merge_move(moves: &mut MoveVec, chars: Chars, positions: PositionSet) {
  for (move_chars, move_positions) in moves.iter_mut() {
    if *move_positions == positions {
      *move_chars |= chars;
      return;
    }
  }
  moves.push((chars, positions));
}

/**
  Thins a position set so lazy branches yield the shortest accepting prefix:
  when a lazily-tagged accept (or anchor) is present, the tag is stripped
  from it and every other position carrying the same tag is dropped, cutting
  the lazy continuation — together with the untagged twins those positions
  travel with, so the shortest accept is not extended through an eager copy
  of the same location. GREEDY positions survive the cut.
*/
pub(crate) fn trim_lazy(positions: &mut PositionSet) {
  loop {
    let candidate = positions
        .iter()
        .rev()
        .take_while(|p| p.is_lazy())
        .find(|p| (p.is_accept() || p.is_anchor()) && !p.is_greedy())
        .copied();

    let p = match candidate {
      Some(p) => p,
      None => break,
    };

    let l = p.lazy();
    let cut_locs: PositionSet = positions
        .iter()
        .filter(|q| q.lazy() == l && !q.is_greedy() && !q.is_accept())
        .map(|q| q.index_with_iter())
        .collect();
    let kept: PositionSet = positions
        .iter()
        .filter(|q| {
          if q.is_greedy() {
            return true;
          }
          if q.lazy() == l {
            return false;
          }
          // an eager twin of a cut position extends past the lazy accept
          !(q.lazy() == 0 && !q.is_accept() && cut_locs.contains(&q.index_with_iter()))
        })
        .copied()
        .collect();
    *positions = kept;
    positions.insert(p.set_lazy(0u8));
  }
}

/**
  Prunes the follow set of anchor position `p`: once the anchor is the only
  way forward, followers at or before it that are not themselves anchors or
  accepts belong to alternatives its satisfaction rules out.
*/
pub(crate) fn trim_anchors(follow: &mut PositionSet, p: Position) {
  let loc = p.idx();
  let kept: PositionSet = follow
      .iter()
      .filter(|q| q.is_accept() || q.is_anchor() || q.idx() > loc)
      .copied()
      .collect();
  *follow = kept;
}

#[cfg(test)]
mod test {
  use super::*;

  fn set(positions: &[Position]) -> PositionSet {
    positions.iter().copied().collect()
  }

  #[test]
  fn transition_disjoint_sets_stay_apart() {
    let mut moves = MoveVec::new();
    transition(&mut moves, Chars::from(&b"ab"[..]), set(&[Position(1)]));
    transition(&mut moves, Chars::from(&b"xy"[..]), set(&[Position(2)]));
    assert_eq!(moves.len(), 2);
  }

  #[test]
  fn transition_carves_overlaps() {
    let mut moves = MoveVec::new();
    transition(&mut moves, Chars::from(&b"abc"[..]), set(&[Position(1)]));
    transition(&mut moves, Chars::from(&b"bcd"[..]), set(&[Position(2)]));

    // expects: {a}→{1}, {bc}→{1,2}, {d}→{2}
    assert_eq!(moves.len(), 3);
    let find = |c: u8| {
      moves
          .iter()
          .find(|(chars, _)| chars.contains(Char::from(c)))
          .map(|(_, p)| p.clone())
          .unwrap()
    };
    assert_eq!(find(b'a'), set(&[Position(1)]));
    assert_eq!(find(b'b'), set(&[Position(1), Position(2)]));
    assert_eq!(find(b'c'), set(&[Position(1), Position(2)]));
    assert_eq!(find(b'd'), set(&[Position(2)]));
  }

  #[test]
  fn transition_merges_equal_images() {
    let mut moves = MoveVec::new();
    transition(&mut moves, Chars::from(&b"a"[..]), set(&[Position(1)]));
    transition(&mut moves, Chars::from(&b"b"[..]), set(&[Position(1)]));
    assert_eq!(moves.len(), 1);
    assert!(moves[0].0.contains(Char::from('a')));
    assert!(moves[0].0.contains(Char::from('b')));
  }

  #[test]
  fn trim_lazy_prunes_dominated_continuations() {
    // a lazy accept dominates the lazy continuation with the same tag
    let mut positions = set(&[
      Position(5).set_lazy(1u8),
      Position(9).set_accept(true).set_lazy(1u8),
      Position(7), // unrelated eager position
    ]);
    trim_lazy(&mut positions);

    assert!(positions.contains(&Position(7)));
    assert!(positions.contains(&Position(9).set_accept(true)));
    assert!(!positions.iter().any(|p| p.is_lazy()));
  }

  #[test]
  fn trim_lazy_keeps_unrelated_tags() {
    let mut positions = set(&[
      Position(5).set_lazy(1u8),
      Position(9).set_accept(true).set_lazy(2u8),
    ]);
    trim_lazy(&mut positions);

    // tag 2's accept was stripped; tag 1 has no accept and stays lazy
    assert!(positions.contains(&Position(9).set_accept(true)));
    assert!(positions.contains(&Position(5).set_lazy(1u8)));
  }

  #[test]
  fn trim_lazy_cuts_eager_twins() {
    // the untagged copy of a cut lazy position must not extend the match
    // past the stripped accept
    let mut positions = set(&[
      Position(5).set_lazy(1u8),
      Position(5),
      Position(9).set_accept(true).set_lazy(1u8),
      Position(12), // different location, unrelated
    ]);
    trim_lazy(&mut positions);

    assert!(positions.contains(&Position(9).set_accept(true)));
    assert!(!positions.contains(&Position(5)));
    assert!(positions.contains(&Position(12)));
  }

  #[test]
  fn trim_lazy_greedy_survives() {
    let mut positions = set(&[
      Position(5).set_lazy(1u8).set_greedy(true),
      Position(9).set_accept(true).set_lazy(1u8),
    ]);
    trim_lazy(&mut positions);
    assert!(positions.contains(&Position(5).set_lazy(1u8).set_greedy(true)));
  }

  #[test]
  fn trim_anchors_drops_ruled_out_followers() {
    let anchor = Position(4).set_anchor(true);
    let mut follow = set(&[
      Position(2),                        // before the anchor: pruned
      Position(9),                        // after: kept
      Position(1).set_accept(true),       // accept: kept
      Position(3).set_anchor(true),       // fellow anchor: kept
    ]);
    trim_anchors(&mut follow, anchor);

    assert!(!follow.contains(&Position(2)));
    assert!(follow.contains(&Position(9)));
    assert!(follow.contains(&Position(1).set_accept(true)));
    assert!(follow.contains(&Position(3).set_anchor(true)));
  }

  #[test]
  fn hash_pos_is_stable() {
    let a = set(&[Position(1), Position(2)]);
    let b = set(&[Position(1), Position(2)]);
    assert_eq!(hash_pos(&a), hash_pos(&b));
    assert!(hash_pos(&a) <= TABLE_SIZE as Hash16);
  }

  #[test]
  fn compile_simple_alternation() {
    let parser = Parser::new("a+|b", "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();

    assert!(compiler.nodes() >= 2);
    assert_eq!(compiler.reachable, vec![true, true]);

    // the start state branches on 'a' and 'b'
    let start = compiler.dfa.get(compiler.start);
    assert!(start.edges.iter().any(|(lo, _)| *lo == Char::from('a')));
    assert!(start.edges.iter().any(|(lo, _)| *lo == Char::from('b')));
  }

  #[test]
  fn compile_literals_through_tree() {
    let parser = Parser::new("if|int", "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();

    // root --i--> node --f/n--> ...
    let start = compiler.dfa.get(compiler.start);
    assert_eq!(start.edges.len(), 1);
    let (_, (_, after_i)) = start.edges.iter().next().map(|(k, v)| (*k, *v)).unwrap();
    let state_i = compiler.dfa.get(after_i);
    assert_eq!(state_i.edges.len(), 2);
    assert_eq!(compiler.reachable, vec![true, true]);
  }

  #[test]
  fn negative_pattern_sets_redo() {
    let parser = Parser::new("(?^ab)|c", "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();

    assert!(compiler.dfa.states.iter().any(|s| s.redo));
  }

  #[test]
  fn lookahead_heads_and_tails_assigned() {
    let parser = Parser::new("a(?=bc)", "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();

    let has_head = compiler.dfa.states.iter().any(|s| s.heads.contains(&0));
    let has_tail = compiler.dfa.states.iter().any(|s| s.tails.contains(&0));
    assert!(has_head);
    assert!(has_tail);
  }

  #[test]
  fn dot_excludes_newline_without_dotall() {
    let parser = Parser::new(".", "").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();
    let start = compiler.dfa.get(compiler.start);
    assert!(!start.edges.iter().any(|(lo, (hi, _))| lo.0 <= 10 && 10 <= hi.0));

    let parser = Parser::new(".", "s").unwrap();
    let mut compiler = Compiler::new(&parser);
    compiler.compile().unwrap();
    let start = compiler.dfa.get(compiler.start);
    assert!(start.edges.iter().any(|(lo, (hi, _))| lo.0 <= 10 && 10 <= hi.0));
  }
}
