//! `keyvalue::` - Valve KeyValues text into nested maps.
//!
//! ```text
//! "Settings"
//! {
//!     "name"   "ember"      // trailing comment
//!     limits { max 25 }
//! }
//! ```
//!
//! Keys and values are quoted or bare tokens, blocks nest with braces, and
//! `//` starts a comment. Platform conditionals such as `[$WIN32]` are
//! accepted and ignored. A repeated key keeps its last value.

use std::path::{Path, PathBuf};

use rhai::{Dynamic, ImmutableString, Map};
use thiserror::Error;

use crate::binding::{Binding, NativeResult};
use crate::error::PluginResult;
use crate::module::Attachments;
use crate::plugin::{Plugin, PluginInfo};
use crate::sandbox::confine;

/// Largest file `parse_file` will read.
const MAX_KV_FILE_SIZE: u64 = 1024 * 1024;

/// Nesting depth beyond which parsing is refused.
const MAX_DEPTH: usize = 64;

/// A KeyValues syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct KeyValueError {
    /// 1-based line of the offending token.
    pub line: usize,
    /// What went wrong.
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Text(String),
    Open,
    Close,
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn error(&self, message: impl Into<String>) -> KeyValueError {
        KeyValueError {
            line: self.line,
            message: message.into(),
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line = self.line.saturating_add(1);
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                },
                Some('/') => {
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() != Some(&'/') {
                        return;
                    }
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                },
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, KeyValueError> {
        self.skip_trivia();
        let Some(&c) = self.chars.peek() else {
            return Ok(None);
        };
        match c {
            '{' => {
                self.bump();
                Ok(Some(Token::Open))
            },
            '}' => {
                self.bump();
                Ok(Some(Token::Close))
            },
            '"' => {
                self.bump();
                self.quoted().map(|s| Some(Token::Text(s)))
            },
            _ => Ok(Some(Token::Text(self.bare()))),
        }
    }

    fn quoted(&mut self) -> Result<String, KeyValueError> {
        let start = self.line;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(KeyValueError {
                        line: start,
                        message: "unterminated string".to_owned(),
                    });
                },
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn bare(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, '{' | '}' | '"') {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }
}

fn is_conditional(token: &Token) -> bool {
    matches!(token, Token::Text(t) if t.starts_with('[') && t.ends_with(']'))
}

struct Parser<'a> {
    lexer: Lexer<'a>,
    lookahead: Option<Token>,
}

impl<'a> Parser<'a> {
    fn next(&mut self) -> Result<Option<Token>, KeyValueError> {
        match self.lookahead.take() {
            Some(t) => Ok(Some(t)),
            None => self.lexer.next_token(),
        }
    }

    /// Skip a conditional following a value, if present.
    fn skip_conditional(&mut self) -> Result<(), KeyValueError> {
        if let Some(token) = self.lexer.next_token()? {
            if !is_conditional(&token) {
                self.lookahead = Some(token);
            }
        }
        Ok(())
    }

    fn block(&mut self, depth: usize, closed_by_brace: bool) -> Result<Map, KeyValueError> {
        if depth > MAX_DEPTH {
            return Err(self.lexer.error("blocks nested too deeply"));
        }
        let mut map = Map::new();
        loop {
            let key = match self.next()? {
                None if closed_by_brace => return Err(self.lexer.error("missing closing '}'")),
                None => return Ok(map),
                Some(Token::Close) if closed_by_brace => return Ok(map),
                Some(Token::Close) => return Err(self.lexer.error("unexpected '}'")),
                Some(Token::Open) => return Err(self.lexer.error("expected a key, found '{'")),
                Some(Token::Text(key)) => key,
            };

            let value = match self.next()? {
                Some(Token::Text(text)) => Dynamic::from(text),
                Some(Token::Open) => Dynamic::from_map(self.block(depth.saturating_add(1), true)?),
                Some(Token::Close) | None => {
                    return Err(self.lexer.error(format!("key {key:?} has no value")));
                },
            };
            self.skip_conditional()?;
            map.insert(key.into(), value);
        }
    }
}

/// Parse KeyValues text into a map of maps and strings.
///
/// # Errors
///
/// Returns a [`KeyValueError`] on malformed input.
pub fn parse_keyvalues(text: &str) -> Result<Map, KeyValueError> {
    let mut parser = Parser {
        lexer: Lexer::new(text),
        lookahead: None,
    };
    parser.block(0, false)
}

/// KeyValues parsing for scripts.
#[derive(Debug, Default)]
pub struct KeyValueModule {
    attachments: Attachments,
}

impl KeyValueModule {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attachments(&self) -> &Attachments {
        &self.attachments
    }

    pub(crate) fn attach(&self, plugin: &mut Plugin, binding: &mut Binding) -> PluginResult<()> {
        let fns = binding.functions();
        fns.set_native_fn("parse", |text: ImmutableString| -> NativeResult<Map> {
            parse_keyvalues(&text).map_err(|e| e.to_string().into())
        });

        let root = plugin.path().to_path_buf();
        let sandboxed = plugin.is_sandboxed();
        fns.set_native_fn("parse_file", move |path: ImmutableString| -> NativeResult<Map> {
            let resolved = resolve(&root, sandboxed, &path)?;
            let meta = std::fs::metadata(&resolved).map_err(|e| format!("{path}: {e}"))?;
            if meta.len() > MAX_KV_FILE_SIZE {
                return Err(format!("{path}: file exceeds {MAX_KV_FILE_SIZE} bytes").into());
            }
            let text = std::fs::read_to_string(&resolved).map_err(|e| format!("{path}: {e}"))?;
            parse_keyvalues(&text).map_err(|e| format!("{path}: {e}").into())
        });

        self.attachments.add(plugin.id());
        Ok(())
    }

    pub(crate) fn on_plugin_destroyed(&self, plugin: &PluginInfo) {
        self.attachments.remove(plugin.id);
    }
}

/// Resolve `path` against the plugin directory. Sandboxed plugins may not
/// leave it.
fn resolve(root: &Path, sandboxed: bool, path: &str) -> Result<PathBuf, String> {
    let joined = root.join(path);
    if sandboxed {
        confine(root, &joined)
    } else {
        Ok(joined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(map: &Map, key: &str) -> String {
        map[key].clone().into_string().unwrap()
    }

    fn block(map: &Map, key: &str) -> Map {
        map[key].clone().try_cast::<Map>().unwrap()
    }

    #[test]
    fn test_nested_blocks_and_comments() {
        let map = parse_keyvalues(
            r#"
            "Settings" // root
            {
                "name"  "ember"
                limits
                {
                    max 25
                }
            }
            "#,
        )
        .unwrap();
        let settings = block(&map, "Settings");
        assert_eq!(text(&settings, "name"), "ember");
        assert_eq!(text(&block(&settings, "limits"), "max"), "25");
    }

    #[test]
    fn test_last_duplicate_wins() {
        let map = parse_keyvalues("a 1\na 2\n").unwrap();
        assert_eq!(text(&map, "a"), "2");
    }

    #[test]
    fn test_escapes_and_conditionals() {
        let map = parse_keyvalues(r#""msg" "say \"hi\"\n" [$WIN32] "next" "x""#).unwrap();
        assert_eq!(text(&map, "msg"), "say \"hi\"\n");
        assert_eq!(text(&map, "next"), "x");
    }

    #[test]
    fn test_slash_inside_bare_token() {
        let map = parse_keyvalues("path a/b\n").unwrap();
        assert_eq!(text(&map, "path"), "a/b");
    }

    #[test]
    fn test_errors_carry_line() {
        let err = parse_keyvalues("root\n{\n  key\n}").unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.message.contains("no value"));

        let err = parse_keyvalues("root {\n a b\n").unwrap_err();
        assert!(err.message.contains("closing"));

        let err = parse_keyvalues("\"open").unwrap_err();
        assert_eq!(err.message, "unterminated string");

        assert!(parse_keyvalues("}").is_err());
    }

    #[test]
    fn test_sandboxed_resolve_stays_inside() {
        let root = tempfile::tempdir().unwrap();
        let plugin_dir = root.path().join("demo");
        std::fs::create_dir(&plugin_dir).unwrap();
        std::fs::write(plugin_dir.join("cfg.txt"), "a b").unwrap();
        std::fs::write(root.path().join("secret.txt"), "a b").unwrap();

        assert!(resolve(&plugin_dir, true, "cfg.txt").is_ok());
        assert!(resolve(&plugin_dir, true, "../secret.txt").is_err());
        assert!(resolve(&plugin_dir, false, "../secret.txt").is_ok());
    }
}
