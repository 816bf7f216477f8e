/*!

`relex` compiles a regular expression into a deterministic finite-state
machine packed into a 32-bit opcode table and drives that table over a
byte stream to produce successive token matches.

The pipeline at build time:

```text
regex text ──parser──▶ (startpos, followpos, modifiers, lookahead)
           ──compiler──▶ DFA states (subset construction ⊕ tree DFA)
           ──encode──▶ opcode table (+ optional match predictor)
```

At scan time a [`Lexer`](lexer/struct.Lexer.html) interprets the table (or
dispatches to a compiled FSM function) over a [`BufferedInput`], honoring
anchors, lookahead head/tail bookkeeping, negative-pattern restarts, and
indent/dedent boundaries.

```
use relex::{Lexer, Pattern};

let pattern = Pattern::new("ab|xy", "").unwrap();
let mut lexer = Lexer::new(pattern, "abxy");
assert_eq!(lexer.scan(), 1);
assert_eq!(lexer.scan(), 2);
assert_eq!(lexer.scan(), 0);
```

*/

#[macro_use]
pub mod debug;

mod limits;
pub mod character;
pub mod codepage;
pub mod chars;
pub mod position;
pub mod modifier;
pub mod error;
pub mod options;
pub mod group;
pub mod parser;
pub mod state;
pub mod opcode;
pub mod compiler;
mod encode;
pub mod predict;
pub mod pattern;
pub mod utf8;
pub mod input;
pub mod lexer;

use std::collections::HashSet;

use defaultmap::DefaultHashMap;
use ranges::Ranges;

use chars::Chars;
use position::{Position, PositionSet};

pub use error::{LexerError, RegexError};
pub use input::{BufferedInput, Encoding, Input, Source};
pub use lexer::{Accept, ColumnFn, Lexer, LexerOptions, EMPTY, REDO};
pub use pattern::{Fsm, Pattern};
pub use predict::Predictor;

// Narrow aliases enforce the size restrictions the opcode encoding assumes.
pub type Lazy8        = u8;  //< lazy quantifier tags
pub(crate) type Accept32     = u32; //< subpattern (capture group) numbers
pub(crate) type Hash16       = u16; //< hash values up to `HASH_MAX_IDX`
pub(crate) type Index32      = u32; //< an index into the regex string or opcode table
pub(crate) type Iteration16  = u16; //< bounded-repetition counters
pub(crate) type Lookahead16  = u16; //< lookahead indices

// Containers of the above.
pub(crate) type LazySet      = HashSet<Lazy8>;
pub(crate) type Move         = (Chars, PositionSet); //< an `Edge` before it has a target `State`
pub(crate) type MoveVec      = Vec<Move>;
pub(crate) type IndexRanges  = Ranges<Index32>;
pub(crate) type FollowMap    = DefaultHashMap<Position, PositionSet>;
pub(crate) type LookaheadMap = DefaultHashMap<Accept32, IndexRanges>;
