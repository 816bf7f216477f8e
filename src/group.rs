/*!
  A `Group` carries the synthesized attributes of one syntactic subexpression
  while the parser works: the first/last position sets, nullability, the
  lazy-quantifier ids in force, and the iteration multiplier of bounded
  repeats. The outermost group additionally collects string-literal
  alternatives in a prefix trie for the tree DFA.
*/

use patricia_tree::PatriciaMap;

use crate::parser::greedify;
use crate::position::PositionSet;
use crate::{Accept32, Iteration16, LazySet};

#[derive(Default)]
pub struct Group {
  pub idx             : Accept32,    //< index of the subpattern this group belongs to
  pub first_positions : PositionSet, //< positions at which the group's match can start
  pub last_positions  : PositionSet, //< positions at which the group's match can end
  pub lazy_set        : LazySet,     //< lazy quantifier ids governing this group
  pub nullable        : bool,        //< can this group match the empty string?
  pub iteration       : Iteration16, //< iteration multiplier from enclosing bounded repeats

  /// String-literal alternatives of the top-level group, keyed by literal
  /// bytes, valued by subpattern index. Unfolded into the tree DFA before
  /// subset construction.
  pub string_trie: PatriciaMap<Accept32>,
}

impl Group {
  pub fn with_idx(idx: Accept32) -> Group {
    Group {
      idx,
      iteration: 1,
      nullable: true,
      ..Group::default()
    }
  }

  /// Inserts a string literal alternative into the prefix trie.
  pub fn insert_string(&mut self, string_literal: &str, idx: Accept32) {
    self.string_trie.insert(string_literal, idx);
  }

  /// Makes a copy of `positions` tagged with every lazy id in force; the
  /// untagged originals are not retained.
  pub fn lazify(&self, positions: &PositionSet) -> PositionSet {
    if self.lazy_set.is_empty() || positions.is_empty() {
      return positions.clone();
    }

    let mut lazy_positions = PositionSet::new();
    for p in positions.iter() {
      for &l in self.lazy_set.iter() {
        // overrides laziness even when p already carries a tag
        lazy_positions.insert(p.set_lazy(l));
      }
    }
    lazy_positions
  }

  /// Replaces `first_positions` with its lazified form.
  pub fn lazify_first_positions(&mut self) {
    if self.first_positions.is_empty() || self.lazy_set.is_empty() {
      return;
    }
    self.first_positions = self.lazify(&self.first_positions.clone());
  }

  /// Marks every eager member of `first_positions` greedy, so it survives
  /// lazy trimming.
  pub fn greedify_first_positions(&mut self) {
    self.first_positions = greedify(&self.first_positions);
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::position::Position;

  #[test]
  fn lazify_tags_every_member() {
    let mut group = Group::with_idx(1);
    group.lazy_set.insert(3);

    let mut positions = PositionSet::new();
    positions.insert(Position(5));
    positions.insert(Position(9));

    let lazy = group.lazify(&positions);
    assert_eq!(lazy.len(), 2);
    assert!(lazy.iter().all(|p| p.lazy() == 3));
  }

  #[test]
  fn lazify_multiplies_by_ids() {
    let mut group = Group::with_idx(1);
    group.lazy_set.insert(1);
    group.lazy_set.insert(2);

    let mut positions = PositionSet::new();
    positions.insert(Position(5));

    assert_eq!(group.lazify(&positions).len(), 2);
  }

  #[test]
  fn empty_lazy_set_is_identity() {
    let group = Group::with_idx(1);
    let mut positions = PositionSet::new();
    positions.insert(Position(5));
    assert_eq!(group.lazify(&positions), positions);
  }

  #[test]
  fn string_trie_keeps_indices() {
    let mut group = Group::with_idx(0);
    group.insert_string("if", 1);
    group.insert_string("int", 2);
    assert_eq!(group.string_trie.get("if"), Some(&1));
    assert_eq!(group.string_trie.get("int"), Some(&2));
    assert_eq!(group.string_trie.get("in"), None);
  }
}
