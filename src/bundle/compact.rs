//! Script compaction applied to rendered snippets when minification is enabled.

use thiserror::Error;

/// Failure to compact a script. Rendering stops; no uncompacted fallback is written.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompactError {
  /// A string or template literal was not closed.
  #[error("unterminated string literal starting at offset {0}")]
  UnterminatedString(usize),
  /// A block comment was not closed.
  #[error("unterminated block comment starting at offset {0}")]
  UnterminatedComment(usize),
  /// A regular expression literal was not closed.
  #[error("unterminated regular expression starting at offset {0}")]
  UnterminatedRegex(usize),
}

/// Text transform that shrinks a script without changing what it does.
pub trait Compactor {
  /// Return the compacted form of `source`.
  fn compact(&self, source: &str) -> Result<String, CompactError>;
}

/// Comment stripping and whitespace collapsing compactor for the bundled scripts.
///
/// Newlines are kept only where removing them could change how statements are
/// separated. Identifiers are never renamed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptCompactor;

impl Compactor for ScriptCompactor {
  fn compact(&self, source: &str) -> Result<String, CompactError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut out = String::with_capacity(source.len());
    let mut pending: Option<bool> = None;
    let mut i = 0;

    while i < chars.len() {
      let (offset, c) = chars[i];

      if c.is_whitespace() {
        let newline = c == '\n' || c == '\r';
        pending = Some(pending.unwrap_or(false) || newline);
        i += 1;
        continue;
      }

      let next = chars.get(i + 1).map(|(_, c)| *c);
      if c == '/' && next == Some('/') {
        while i < chars.len() && chars[i].1 != '\n' {
          i += 1;
        }
        pending = Some(true);
        continue;
      }
      if c == '/' && next == Some('*') {
        let mut j = i + 2;
        let mut newline = false;
        loop {
          match chars.get(j) {
            None => return Err(CompactError::UnterminatedComment(offset)),
            Some((_, '*')) if chars.get(j + 1).map(|(_, c)| *c) == Some('/') => break,
            Some((_, '\n')) => newline = true,
            _ => {}
          }
          j += 1;
        }
        i = j + 2;
        pending = Some(pending.unwrap_or(false) || newline);
        continue;
      }

      if let Some(newline) = pending.take() {
        flush_whitespace(&mut out, newline, c);
      }

      match c {
        '\'' | '"' | '`' => {
          i = copy_string(&chars, i, &mut out)?;
        }
        '/' if starts_regex(&out) => {
          i = copy_regex(&chars, i, &mut out)?;
        }
        _ => {
          out.push(c);
          i += 1;
        }
      }
    }

    Ok(out)
  }
}

fn is_ident(c: char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '$'
}

fn flush_whitespace(out: &mut String, newline: bool, next: char) {
  let Some(prev) = out.chars().last() else {
    return;
  };

  let ends_statement = is_ident(prev) || matches!(prev, ')' | ']' | '}' | '/' | '\'' | '"' | '`');
  let starts_statement =
    is_ident(next) || matches!(next, '\'' | '"' | '`' | '(' | '[' | '{' | '+' | '-' | '!' | '~');

  if newline && ((ends_statement && starts_statement) || matches!(prev, '+' | '-')) {
    out.push('\n');
  } else if (is_ident(prev) && is_ident(next))
    || (prev == '+' && next == '+')
    || (prev == '-' && next == '-')
  {
    out.push(' ');
  }
}

/// Keywords after which a `/` opens a regular expression rather than dividing.
const REGEX_KEYWORDS: &[&str] = &[
  "return", "typeof", "case", "delete", "do", "else", "in", "instanceof", "new", "throw",
  "void", "yield",
];

fn starts_regex(out: &str) -> bool {
  let Some(prev) = out.chars().last() else {
    return true;
  };
  if is_ident(prev) {
    let word_start = out
      .char_indices()
      .rev()
      .take_while(|(_, c)| is_ident(*c))
      .last()
      .map_or(out.len(), |(index, _)| index);
    return REGEX_KEYWORDS.contains(&&out[word_start..]);
  }
  matches!(
    prev,
    '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '+' | '-' | '*'
      | '%' | '<' | '>' | '~' | '^'
  )
}

fn copy_string(chars: &[(usize, char)], start: usize, out: &mut String) -> Result<usize, CompactError> {
  let (offset, quote) = chars[start];
  out.push(quote);
  let mut i = start + 1;
  while let Some(&(_, c)) = chars.get(i) {
    out.push(c);
    match c {
      '\\' => {
        let Some(&(_, escaped)) = chars.get(i + 1) else {
          break;
        };
        out.push(escaped);
        i += 2;
        continue;
      }
      '\n' if quote != '`' => break,
      _ if c == quote => return Ok(i + 1),
      _ => {}
    }
    i += 1;
  }
  Err(CompactError::UnterminatedString(offset))
}

fn copy_regex(chars: &[(usize, char)], start: usize, out: &mut String) -> Result<usize, CompactError> {
  let offset = chars[start].0;
  out.push('/');
  let mut i = start + 1;
  let mut in_class = false;
  while let Some(&(_, c)) = chars.get(i) {
    out.push(c);
    match c {
      '\\' => {
        let Some(&(_, escaped)) = chars.get(i + 1) else {
          break;
        };
        out.push(escaped);
        i += 2;
        continue;
      }
      '\n' => break,
      '[' => in_class = true,
      ']' => in_class = false,
      '/' if !in_class => return Ok(i + 1),
      _ => {}
    }
    i += 1;
  }
  Err(CompactError::UnterminatedRegex(offset))
}
