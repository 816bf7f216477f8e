/*!
  A `Pattern` holds a compiled regex: either the packed opcode table or a
  caller-supplied compiled FSM function, together with the subpattern
  endpoint table, the reachability vector, and the optional match
  predictor. Patterns are immutable once built and freely shareable across
  scanners.
*/

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::compiler::Compiler;
use crate::error::RegexError;
use crate::lexer::Lexer;
use crate::opcode::Opcode;
use crate::options::Options;
use crate::parser::Parser;
use crate::predict::{self, Predictor};
use crate::{Accept32, Index32};

/// The executable form of a pattern.
#[derive(Debug, Clone)]
pub enum Fsm {
  /// The packed 32-bit opcode table.
  Table(Arc<[u32]>),
  /// A compiled state-machine function driving the scanner directly.
  Compiled(fn(&mut Lexer)),
}

#[derive(Debug, Clone)]
pub struct Pattern {
  rex        : String,        //< the regex source text
  options    : Options,
  end        : Vec<Index32>,  //< each subpattern's terminating `|` or end offset
  reachable  : Vec<bool>,     //< per subpattern: some state accepts it
  errors     : Vec<RegexError>, //< errors recovered from during parsing
  fsm        : Fsm,
  predictor  : Option<Predictor>,
  vertices   : usize,
  edge_count : usize,
}

impl Pattern {
  /// Compiles `regex` under the `name=value;...` option string.
  pub fn new(regex: &str, options_string: &str) -> Result<Pattern, RegexError> {
    let options = Options::new(options_string)?;
    Pattern::with_options(regex, options)
  }

  pub fn with_options(regex: &str, options: Options) -> Result<Pattern, RegexError> {
    let parser = Parser::with_options(regex, options)?;
    let mut compiler = Compiler::new(&parser);
    compiler.compile()?;
    let table = compiler.assemble()?;

    let predictor = match parser.options.predict_match_array {
      true  => Some(predict::generate(&compiler.dfa, compiler.start)),
      false => None,
    };

    let words: Vec<u32> = table.iter().map(|op| op.0).collect();
    let pattern = Pattern {
      rex: regex.to_string(),
      end: parser.subpattern_endpoints.clone(),
      reachable: compiler.reachable.clone(),
      errors: parser.errors.clone(),
      fsm: Fsm::Table(words.into()),
      predictor,
      vertices: compiler.nodes(),
      edge_count: compiler.edges(),
      options: parser.options.clone(),
    };

    for filename in pattern.options.filenames.clone() {
      match std::fs::File::create(&filename) {
        Ok(mut file) => {
          if let Err(why) = pattern.save(&mut file) {
            log::warn!("could not write {}: {}", filename, why);
          }
        }
        Err(why) => log::warn!("could not create {}: {}", filename, why),
      }
    }

    Ok(pattern)
  }

  /// Wraps an already-assembled opcode table, e.g. one loaded from a file.
  pub fn from_opcodes(words: Vec<u32>, predictor: Option<Predictor>) -> Pattern {
    Pattern {
      rex: String::new(),
      options: Options::default(),
      end: Vec::new(),
      reachable: Vec::new(),
      errors: Vec::new(),
      fsm: Fsm::Table(words.into()),
      predictor,
      vertices: 0,
      edge_count: 0,
    }
  }

  /// Wraps a compiled FSM function.
  pub fn from_fsm(fsm: fn(&mut Lexer), predictor: Option<Predictor>) -> Pattern {
    Pattern {
      rex: String::new(),
      options: Options::default(),
      end: Vec::new(),
      reachable: Vec::new(),
      errors: Vec::new(),
      fsm: Fsm::Compiled(fsm),
      predictor,
      vertices: 0,
      edge_count: 0,
    }
  }

  pub fn regex(&self) -> &str {
    &self.rex
  }

  pub(crate) fn fsm(&self) -> &Fsm {
    &self.fsm
  }

  /// Number of subpatterns.
  pub fn size(&self) -> Accept32 {
    self.end.len() as Accept32
  }

  /// The source text of subpattern `choice` (1-based), or the whole regex
  /// for 0.
  pub fn subpattern(&self, choice: Accept32) -> &str {
    if choice == 0 || self.end.is_empty() {
      return &self.rex;
    }
    let n = (choice as usize).min(self.end.len());
    let start = match n >= 2 {
      true  => self.end[n - 2] as usize + 1,
      false => 0,
    };
    let stop = self.end[n - 1] as usize;
    self.rex.get(start..stop).unwrap_or("")
  }

  /// Whether subpattern `choice` can be reached by any match.
  pub fn reachable(&self, choice: Accept32) -> bool {
    choice >= 1
        && (choice as usize) <= self.reachable.len()
        && self.reachable[choice as usize - 1]
  }

  /// Errors the compiler recovered from; empty under option `r`.
  pub fn errors(&self) -> &[RegexError] {
    &self.errors
  }

  pub fn predictor(&self) -> Option<&Predictor> {
    self.predictor.as_ref()
  }

  /// Number of DFA states, when this pattern was compiled here.
  pub fn nodes(&self) -> usize {
    self.vertices
  }

  /// Number of DFA transitions, when this pattern was compiled here.
  pub fn edges(&self) -> usize {
    self.edge_count
  }

  /// Number of opcode words.
  pub fn words(&self) -> usize {
    match &self.fsm {
      Fsm::Table(words) => words.len(),
      Fsm::Compiled(_) => 0,
    }
  }

  /**
    Writes the compiled-pattern file: a four-byte header, the predictor
    block when present, then the opcode words little-endian, closed by a
    HALT sentinel word.
  */
  pub fn save<W: Write>(&self, out: &mut W) -> io::Result<()> {
    let words = match &self.fsm {
      Fsm::Table(words) => words,
      Fsm::Compiled(_) => {
        return Err(io::Error::new(
          io::ErrorKind::InvalidInput,
          "compiled-function patterns have no opcode table",
        ));
      }
    };

    let flags: u8 = self.predictor.is_some() as u8;
    out.write_all(&[b'R', b'X', 1, flags])?;
    if let Some(predictor) = &self.predictor {
      let bytes = predictor.to_bytes();
      out.write_all(&(bytes.len() as u32).to_le_bytes())?;
      out.write_all(&bytes)?;
    }
    for word in words.iter() {
      out.write_all(&word.to_le_bytes())?;
    }
    out.write_all(&Opcode::halt().0.to_le_bytes())?;
    Ok(())
  }

  /// Reads back a `save`d pattern.
  pub fn load<R: Read>(input: &mut R) -> io::Result<Pattern> {
    let bad = |what: &str| io::Error::new(io::ErrorKind::InvalidData, what.to_string());

    let mut header = [0u8; 4];
    input.read_exact(&mut header)?;
    if &header[..2] != b"RX" || header[2] != 1 {
      return Err(bad("not a compiled pattern file"));
    }

    let predictor = match header[3] & 1 != 0 {
      true => {
        let mut len = [0u8; 4];
        input.read_exact(&mut len)?;
        let mut bytes = vec![0u8; u32::from_le_bytes(len) as usize];
        input.read_exact(&mut bytes)?;
        Some(Predictor::from_bytes(&bytes).ok_or_else(|| bad("truncated predictor block"))?)
      }
      false => None,
    };

    let mut rest = Vec::new();
    input.read_to_end(&mut rest)?;
    if rest.len() % 4 != 0 || rest.len() < 4 {
      return Err(bad("truncated opcode table"));
    }
    let mut words: Vec<u32> = rest
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    match words.pop() {
      Some(last) if Opcode(last).is_halt() => {}
      _ => return Err(bad("missing halt sentinel")),
    }

    Ok(Pattern::from_opcodes(words, predictor))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn subpattern_extraction() {
    let pattern = Pattern::new("ab|xy|p+", "").unwrap();
    assert_eq!(pattern.size(), 3);
    assert_eq!(pattern.subpattern(1), "ab");
    assert_eq!(pattern.subpattern(2), "xy");
    assert_eq!(pattern.subpattern(3), "p+");
    assert_eq!(pattern.subpattern(0), "ab|xy|p+");
  }

  #[test]
  fn reachability() {
    let pattern = Pattern::new("a|b", "").unwrap();
    assert!(pattern.reachable(1));
    assert!(pattern.reachable(2));
    assert!(!pattern.reachable(3));

    // the second alternative is shadowed by the first
    let pattern = Pattern::new("a|a", "").unwrap();
    assert!(pattern.reachable(1));
    assert!(!pattern.reachable(2));
  }

  #[test]
  fn save_and_load_roundtrip() {
    let pattern = Pattern::new("ab|xy", "p").unwrap();
    let mut bytes = Vec::new();
    pattern.save(&mut bytes).unwrap();

    let loaded = Pattern::load(&mut bytes.as_slice()).unwrap();
    match (&pattern.fsm, &loaded.fsm) {
      (Fsm::Table(a), Fsm::Table(b)) => assert_eq!(&a[..], &b[..]),
      _ => panic!("expected opcode tables"),
    }
    assert!(loaded.predictor().is_some());
  }

  #[test]
  fn counts_are_populated() {
    let pattern = Pattern::new("(a|b)*abb", "").unwrap();
    assert!(pattern.nodes() > 0);
    assert!(pattern.edges() > 0);
    assert!(pattern.words() > 0);
  }
}
