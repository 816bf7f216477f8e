/*!
  Numeric ceilings shared by the parser, compiler, and assembler.
*/

use super::{Accept32, Index32, Iteration16};

/// Max number of iterations of a repeatable, e.g. `a{3,5}`.
pub(crate) const MAX_ITER: Iteration16 = u16::MAX;

/// The first 32 bits of a `Position` hold its index into the regex.
pub const MAX_INDEX: Index32 = u32::MAX;

// Opcode-determined limits. These maxima maintain the invariant that in an
// instruction word byte3 >= byte4 if and only if the instruction is a GOTO.
// See the `opcode` module documentation.
pub const GOTO_MAX_IDX      : Index32  = 0xFEFFFF;    //< max goto index
pub const ACCEPT_MAX        : Accept32 = 0xFDFFFF;    //< max accept
pub const LOOKAHEAD_MAX_IDX : Index32  = 0xFAFFFF;    //< max lookahead index

/// Size of the predict-match arrays and of the state hash table.
pub const HASH_MAX_IDX: usize = 0x1000;
