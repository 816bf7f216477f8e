//! Scanner engine tests over the public surface: negative-pattern
//! restarts, the split sentinel, jam reporting, error recovery, and
//! pattern round trips through the opcode file format.

use pretty_assertions::assert_eq;
use relex::{Encoding, Input, Lexer, LexerOptions, Pattern, Source, EMPTY, REDO};

#[test]
fn redo_is_silent_by_default() {
  let pattern = Pattern::new("(?^ab)|\\w+| ", "").unwrap();
  let mut lexer = Lexer::new(pattern, "ab cd");
  assert_eq!(lexer.scan(), 2); // "ab" was discarded, " " is next
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.text(), b"cd");
}

#[test]
fn redo_is_visible_under_option_a() {
  let pattern = Pattern::new("(?^ab)|\\w+| ", "").unwrap();
  let mut lexer = Lexer::with_options(pattern, "ab cd", LexerOptions::new("A"));
  assert_eq!(lexer.scan(), REDO);
  assert_eq!(lexer.text(), b"ab");
  assert_eq!(lexer.scan(), 2);
  assert_eq!(lexer.scan(), 1);
}

#[test]
fn split_skips_gaps_and_ends_with_empty() {
  let pattern = Pattern::new("[0-9]+", "").unwrap();
  let mut lexer = Lexer::new(pattern, "12,34;56");
  let mut got = Vec::new();
  loop {
    let a = lexer.split();
    if a == 0 {
      break;
    }
    got.push((a, lexer.text_str().to_string()));
    if a == EMPTY {
      continue;
    }
  }
  assert_eq!(
    got,
    vec![
      (1, "12".to_string()),
      (1, "34".to_string()),
      (1, "56".to_string()),
      (EMPTY, String::new()),
    ]
  );
}

#[test]
fn strict_scan_reports_the_jam() {
  let pattern = Pattern::new("[a-z]+", "").unwrap();
  let mut lexer = Lexer::new(pattern, "abc42");
  assert_eq!(lexer.scan_strict().unwrap(), 1);
  let err = lexer.scan_strict().unwrap_err();
  assert_eq!(err.next, Some(b'4'));
  assert_eq!(err.line, 1);
  assert_eq!(err.column, 3);
}

#[test]
fn recovered_errors_still_produce_a_pattern() {
  // unterminated class: recorded, then treated as closed at the end
  let pattern = Pattern::new("[abc", "").unwrap();
  assert!(!pattern.errors().is_empty());
  let mut lexer = Lexer::new(pattern, "cab");
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.scan(), 1);

  // under option r the same regex refuses to compile
  assert!(Pattern::new("[abc", "r").is_err());
}

#[test]
fn caret_rendering_points_at_the_fault() {
  let err = Pattern::new("a)", "r").unwrap_err();
  let rendered = err.render("a)");
  assert!(rendered.starts_with("error in regex at position 1\n"));
  assert!(rendered.contains("a)"));
  assert!(rendered.contains("\\___mismatched ( )"));
}

#[test]
fn loaded_pattern_scans_like_the_original() {
  let pattern = Pattern::new("ab|xy|\\d+", "p").unwrap();
  let mut bytes = Vec::new();
  pattern.save(&mut bytes).unwrap();
  let loaded = Pattern::load(&mut bytes.as_slice()).unwrap();

  let mut lexer = Lexer::new(loaded, "xy12ab");
  assert_eq!(lexer.scan(), 2);
  assert_eq!(lexer.scan(), 3);
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.scan(), 0);
}

#[test]
fn scanning_utf16_input_yields_utf8_matches() {
  // "héllo wörld" encoded as UTF-16LE with BOM; matches arrive as UTF-8
  let text = "héllo wörld";
  let mut encoded = vec![0xFF, 0xFE];
  for unit in text.encode_utf16() {
    encoded.extend_from_slice(&unit.to_le_bytes());
  }

  let pattern = Pattern::new("[^ ]+| ", "").unwrap();
  let input = Input::new(Source::Bytes(&encoded));
  let mut lexer = Lexer::new(pattern, input);
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.text_str(), "héllo");
  assert_eq!(lexer.scan(), 2);
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.text_str(), "wörld");
  assert_eq!(lexer.scan(), 0);
}

#[test]
fn codepage_input_decodes_before_matching() {
  // CP1252 é (0xE9) between letters
  let bytes: &[u8] = &[b'a', 0xE9, b'b'];
  let pattern = Pattern::new(".+", "s").unwrap();
  let input = Input::with_encoding(Source::Bytes(bytes), Encoding::Cp1252);
  let mut lexer = Lexer::new(pattern, input);
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.text_str(), "aéb");
}

#[test]
fn predictor_rides_along_under_option_p() {
  let pattern = Pattern::new("(abcd|axyz)k", "p").unwrap();
  let predictor = pattern.predictor().expect("option p builds the predictor");
  assert_eq!(predictor.prefix(), b"a");
  // soundness: a true match never predicts false
  assert!(predictor.predict_match_hash(b"bcdk"));
}

#[test]
fn reset_restores_the_initial_state() {
  let pattern = Pattern::new("(?m)^a|b", "m").unwrap();
  let mut lexer = Lexer::new(pattern, "ab");
  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.scan(), 2);
  lexer.input("ab");
  assert_eq!(lexer.scan(), 1); // ^ holds again at the fresh begin
  assert_eq!(lexer.scan(), 2);
}

#[test]
fn multiple_patterns_per_lexer() {
  let words = Pattern::new("\\w+| ", "").unwrap();
  let digits = Pattern::new("[0-9]+|\\D", "").unwrap();
  let mut lexer = Lexer::new(words, "a1 b2");
  let second = lexer.push_pattern(digits);

  assert_eq!(lexer.scan(), 1);
  assert_eq!(lexer.text(), b"a1");

  lexer.select_pattern(second);
  assert_eq!(lexer.scan(), 2); // ' '
  assert_eq!(lexer.scan(), 2); // 'b'
  assert_eq!(lexer.scan(), 1); // "2"
  assert_eq!(lexer.scan(), 0);
}
