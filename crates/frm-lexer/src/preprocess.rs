//! Line-oriented preprocessor.
//!
//! Runs before tokenization and handles:
//!
//! - `$IFDEF name` / `$ELSE` / `$ENDIF` conditional blocks (nestable)
//! - `$DEFINE name` / `$UNDEF name`
//! - `\` line continuations
//! - `::` compressed blocks (base64, optionally zlib-deflated) that end at a
//!   line starting with `}`
//!
//! # Line preservation
//!
//! The output has exactly as many lines as the input after compressed blocks
//! are expanded. Directive lines, lines in false conditional regions and the
//! physical lines swallowed by a continuation are replaced by empty lines, so
//! line numbers reported by later stages still point at the user's text.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::ZlibDecoder;
use std::collections::HashSet;
use std::io::Read;
use thiserror::Error;
use tracing::debug;

/// Malformed preprocessor input. Fatal for the file being preprocessed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreprocessorError {
    #[error("{line}: {directive} without variable name")]
    MissingName { line: usize, directive: &'static str },

    #[error("{line}: {directive} without $IFDEF")]
    Unbalanced { line: usize, directive: &'static str },

    #[error("{line}: $IFDEF without $ENDIF")]
    Unterminated { line: usize },

    #[error("{line}: invalid compressed block: {reason}")]
    BadCompressedBlock { line: usize, reason: String },
}

impl PreprocessorError {
    /// 1-based line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            PreprocessorError::MissingName { line, .. }
            | PreprocessorError::Unbalanced { line, .. }
            | PreprocessorError::Unterminated { line }
            | PreprocessorError::BadCompressedBlock { line, .. } => *line,
        }
    }
}

/// Preprocess `source` with no predefined variables.
///
/// # Examples
///
/// ```
/// # use frm_lexer::preprocess;
/// assert_eq!(preprocess("$define foo\nbar").unwrap(), "\nbar");
/// ```
pub fn preprocess(source: &str) -> Result<String, PreprocessorError> {
    preprocess_with(source, &[])
}

/// Preprocess `source`, treating `defines` as already `$DEFINE`d.
pub fn preprocess_with(source: &str, defines: &[&str]) -> Result<String, PreprocessorError> {
    let lines = expand_compressed(source)?;
    let mut pp = Preprocessor {
        defined: defines.iter().map(|d| d.to_ascii_lowercase()).collect(),
        stack: Vec::new(),
        truth: true,
    };
    let out = pp.run(&lines)?;
    Ok(out.join("\n"))
}

struct Preprocessor {
    defined: HashSet<String>,
    stack: Vec<Conditional>,
    truth: bool,
}

/// An open `$IFDEF` block.
struct Conditional {
    line: usize,
    /// Truth of the enclosing region.
    parent: bool,
    defined: bool,
}

impl Preprocessor {
    fn run(&mut self, lines: &[String]) -> Result<Vec<String>, PreprocessorError> {
        let mut out = Vec::with_capacity(lines.len());
        let mut i = 0;

        while i < lines.len() {
            let start = i;
            let mut logical = lines[i].clone();
            let mut swallowed = 0;
            while let Some(stripped) = continued(&logical) {
                if i + 1 >= lines.len() {
                    logical = stripped;
                    break;
                }
                i += 1;
                swallowed += 1;
                logical = stripped + &lines[i];
            }

            let line_no = start + 1;
            let replaced = self.line(&logical, line_no)?;
            out.push(replaced);
            out.extend(std::iter::repeat(String::new()).take(swallowed));
            i += 1;
        }

        if let Some(open) = self.stack.last() {
            return Err(PreprocessorError::Unterminated { line: open.line });
        }
        Ok(out)
    }

    /// Process one logical line, returning its replacement text.
    fn line(&mut self, text: &str, line: usize) -> Result<String, PreprocessorError> {
        let trimmed = text.trim_start();
        if !trimmed.starts_with('$') {
            return Ok(if self.truth { text.to_string() } else { String::new() });
        }

        let mut words = trimmed.split_whitespace();
        let directive = words.next().unwrap_or("").to_ascii_uppercase();
        let name = words.next().map(|w| w.to_ascii_lowercase());

        match directive.as_str() {
            "$IFDEF" => {
                let name = name.ok_or(PreprocessorError::MissingName {
                    line,
                    directive: "$IFDEF",
                })?;
                let defined = self.defined.contains(&name);
                self.stack.push(Conditional {
                    line,
                    parent: self.truth,
                    defined,
                });
                self.truth = self.truth && defined;
            }
            "$ELSE" => {
                let Some(top) = self.stack.last_mut() else {
                    return Err(PreprocessorError::Unbalanced {
                        line,
                        directive: "$ELSE",
                    });
                };
                top.defined = !top.defined;
                self.truth = top.parent && top.defined;
            }
            "$ENDIF" => {
                let Some(closed) = self.stack.pop() else {
                    return Err(PreprocessorError::Unbalanced {
                        line,
                        directive: "$ENDIF",
                    });
                };
                self.truth = closed.parent;
            }
            "$DEFINE" => {
                let name = name.ok_or(PreprocessorError::MissingName {
                    line,
                    directive: "$DEFINE",
                })?;
                if self.truth {
                    self.defined.insert(name);
                }
            }
            "$UNDEF" => {
                let name = name.ok_or(PreprocessorError::MissingName {
                    line,
                    directive: "$UNDEF",
                })?;
                if self.truth {
                    self.defined.remove(&name);
                }
            }
            _ => {
                // Not a directive we know; treat as ordinary text.
                return Ok(if self.truth { text.to_string() } else { String::new() });
            }
        }
        Ok(String::new())
    }
}

/// If `line` ends with a continuation backslash, the line without it.
fn continued(line: &str) -> Option<String> {
    let trimmed = line.trim_end();
    trimmed.strip_suffix('\\').map(str::to_string)
}

/// Split `source` into lines, replacing `::` compressed blocks with their
/// decoded text.
fn expand_compressed(source: &str) -> Result<Vec<String>, PreprocessorError> {
    let mut lines = Vec::new();
    let mut iter = source.split('\n').enumerate().peekable();

    while let Some((idx, line)) = iter.next() {
        let Some(first) = line.trim_start().strip_prefix("::") else {
            lines.push(line.to_string());
            continue;
        };

        let mut payload: String = first.split_whitespace().collect();
        while let Some((_, next)) = iter.peek() {
            if next.trim_start().starts_with('}') {
                break;
            }
            payload.extend(next.split_whitespace());
            iter.next();
        }

        let text = decode_block(&payload).map_err(|reason| {
            PreprocessorError::BadCompressedBlock {
                line: idx + 1,
                reason,
            }
        })?;
        debug!(line = idx + 1, bytes = text.len(), "expanded compressed block");
        lines.extend(text.lines().map(str::to_string));
    }

    Ok(lines)
}

fn decode_block(payload: &str) -> Result<String, String> {
    let bytes = STANDARD.decode(payload).map_err(|e| e.to_string())?;
    let is_zlib = bytes.len() >= 2 && bytes[0] == 0x78;
    if is_zlib {
        let mut text = String::new();
        if ZlibDecoder::new(&bytes[..]).read_to_string(&mut text).is_ok() {
            return Ok(text);
        }
    }
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    #[test]
    fn test_define_blanks_directive() {
        assert_eq!(preprocess("$define foo\nbar").unwrap(), "\nbar");
    }

    #[test]
    fn test_ifdef_false_region_blanked() {
        let input = "\n$IFDEF wibble\n>>><<<\n$ENDIF\nwobble\n";
        let output = preprocess(input).unwrap();
        assert_eq!(output.split('\n').count(), input.split('\n').count());
        let lines: Vec<&str> = output.split('\n').collect();
        assert_eq!(lines[2], "");
        assert_eq!(lines[4], "wobble");
    }

    #[test]
    fn test_ifdef_true_region_kept() {
        let output = preprocess("$define wibble\n$ifdef wibble\nx = 1\n$endif\n").unwrap();
        assert_eq!(output, "\n\nx = 1\n\n");
    }

    #[test]
    fn test_else_branch() {
        let input = "$IFDEF a\nyes\n$ELSE\nno\n$ENDIF";
        assert_eq!(preprocess(input).unwrap(), "\n\n\nno\n");
        assert_eq!(preprocess_with(input, &["A"]).unwrap(), "\nyes\n\n\n");
    }

    #[test]
    fn test_nested_else_respects_parent() {
        let input = "$IFDEF outer\n$IFDEF inner\na\n$ELSE\nb\n$ENDIF\n$ENDIF\nc";
        let out = preprocess(input).unwrap();
        assert!(!out.contains('a'));
        assert!(!out.contains('b'));
        assert!(out.ends_with('c'));
    }

    #[test]
    fn test_define_ignored_in_false_region() {
        let input = "$IFDEF nope\n$DEFINE x\n$ENDIF\n$IFDEF x\nhidden\n$ENDIF";
        assert!(!preprocess(input).unwrap().contains("hidden"));
    }

    #[test]
    fn test_undef() {
        let input = "$DEFINE x\n$UNDEF x\n$IFDEF x\nhidden\n$ENDIF";
        assert!(!preprocess(input).unwrap().contains("hidden"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            preprocess("$IFDEF"),
            Err(PreprocessorError::MissingName {
                line: 1,
                directive: "$IFDEF"
            })
        );
        assert_eq!(
            preprocess("x\n$ENDIF"),
            Err(PreprocessorError::Unbalanced {
                line: 2,
                directive: "$ENDIF"
            })
        );
        assert_eq!(
            preprocess("$IFDEF x\nfoo\n"),
            Err(PreprocessorError::Unterminated { line: 1 })
        );
        assert!(matches!(
            preprocess("$DEFINE"),
            Err(PreprocessorError::MissingName { .. })
        ));
        assert!(matches!(
            preprocess("$UNDEF"),
            Err(PreprocessorError::MissingName { .. })
        ));
    }

    #[test]
    fn test_continuation_preserves_line_count() {
        let input = "z = z + \\  \n1\nw";
        let out = preprocess(input).unwrap();
        assert_eq!(out, "z = z + 1\n\nw");
    }

    #[test]
    fn test_line_count_preserved() {
        let input = "a\n$IFDEF q\nb\\\nc\n$ELSE\nd\n$ENDIF\ne\n";
        let out = preprocess(input).unwrap();
        assert_eq!(out.lines().count(), input.lines().count());
    }

    #[test]
    fn test_compressed_block_plain_base64() {
        let encoded = STANDARD.encode("a = 1\nb = 2");
        let input = format!("foo {{\n::{}\n}}", encoded);
        let out = preprocess(&input).unwrap();
        assert_eq!(out, "foo {\na = 1\nb = 2\n}");
    }

    #[test]
    fn test_compressed_block_zlib() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"init:\nz = 0").unwrap();
        let encoded = STANDARD.encode(enc.finish().unwrap());
        let (a, b) = encoded.split_at(encoded.len() / 2);
        let input = format!("foo {{\n::{}\n  {}\n}}", a, b);
        let out = preprocess(&input).unwrap();
        assert_eq!(out, "foo {\ninit:\nz = 0\n}");
    }

    #[test]
    fn test_compressed_block_garbage() {
        assert!(matches!(
            preprocess("::!!!!\n}"),
            Err(PreprocessorError::BadCompressedBlock { line: 1, .. })
        ));
    }
}
