//! Tokenizer for the built-in script front end.
//!
//! Line-oriented: a newline ends a statement unless it falls inside
//! parentheses.  A logical line that begins with whitespace is rejected, as
//! the language has no blocks.

use crate::error::{ScriptError, ScriptErrorKind};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Name(String),
    Str(String),
    Int(i64),

    // Keywords
    Import,
    From,
    As,
    Pass,
    None,

    Dot,
    Comma,
    LParen,
    RParen,
    Assign,
    /// End of a statement (`\n` or `;`).
    Newline,
    Eof,
}

impl Tok {
    /// Short description used in syntax errors.
    pub fn describe(&self) -> String {
        match self {
            Tok::Name(n) => format!("name '{n}'"),
            Tok::Str(_) => "string literal".into(),
            Tok::Int(n) => format!("integer {n}"),
            Tok::Import => "'import'".into(),
            Tok::From => "'from'".into(),
            Tok::As => "'as'".into(),
            Tok::Pass => "'pass'".into(),
            Tok::None => "'None'".into(),
            Tok::Dot => "'.'".into(),
            Tok::Comma => "','".into(),
            Tok::LParen => "'('".into(),
            Tok::RParen => "')'".into(),
            Tok::Assign => "'='".into(),
            Tok::Newline => "end of line".into(),
            Tok::Eof => "end of input".into(),
        }
    }
}

/// A token with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

/// Deepest parenthesis nesting accepted, as in CPython's tokenizer.
pub const MAX_PAREN_DEPTH: usize = 200;

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    /// Open parentheses; newlines inside them are insignificant.
    depth: usize,
    /// True when the next character begins a logical line.
    at_line_start: bool,
    out: Vec<Token>,
}

fn syntax(line: usize, msg: impl Into<String>) -> ScriptError {
    ScriptError::at(ScriptErrorKind::Syntax, line, msg)
}

/// Split `src` into tokens, always ending with `Newline, Eof`.
pub fn tokenize(src: &str) -> Result<Vec<Token>, ScriptError> {
    let mut lx = Lexer {
        chars: src.chars().peekable(),
        line: 1,
        depth: 0,
        at_line_start: true,
        out: Vec::new(),
    };
    lx.run()?;
    Ok(lx.out)
}

impl Lexer<'_> {
    fn push(&mut self, tok: Tok) {
        self.at_line_start = false;
        self.out.push(Token { tok, line: self.line });
    }

    /// `line_start` is true only for a real newline; whitespace after `;`
    /// is not indentation.
    fn end_statement(&mut self, line_start: bool) {
        // Collapse runs of blank lines and separators.
        let last_is_sep = matches!(self.out.last(), None | Some(Token { tok: Tok::Newline, .. }));
        if !last_is_sep {
            self.out.push(Token { tok: Tok::Newline, line: self.line });
        }
        self.at_line_start = line_start;
    }

    fn run(&mut self) -> Result<(), ScriptError> {
        while let Some(&c) = self.chars.peek() {
            match c {
                '\n' => {
                    self.chars.next();
                    if self.depth == 0 {
                        self.end_statement(true);
                    }
                    self.line += 1;
                }
                ' ' | '\t' | '\r' | '\x0c' => {
                    if self.at_line_start && self.depth == 0 {
                        self.leading_whitespace()?;
                    } else {
                        self.chars.next();
                    }
                }
                '#' => self.skip_comment(),
                ';' => {
                    self.chars.next();
                    if self.depth > 0 {
                        return Err(syntax(self.line, "';' inside parentheses"));
                    }
                    self.end_statement(false);
                }
                '.' => { self.chars.next(); self.push(Tok::Dot); }
                ',' => { self.chars.next(); self.push(Tok::Comma); }
                '=' => { self.chars.next(); self.push(Tok::Assign); }
                '(' => {
                    self.chars.next();
                    if self.depth >= MAX_PAREN_DEPTH {
                        return Err(syntax(self.line, "too many nested parentheses"));
                    }
                    self.depth += 1;
                    self.push(Tok::LParen);
                }
                ')' => {
                    self.chars.next();
                    if self.depth == 0 {
                        return Err(syntax(self.line, "unmatched ')'"));
                    }
                    self.depth -= 1;
                    self.push(Tok::RParen);
                }
                '\'' | '"' => {
                    self.chars.next();
                    let s = self.read_string(c)?;
                    self.push(Tok::Str(s));
                }
                '0'..='9' => {
                    let n = self.read_int()?;
                    self.push(Tok::Int(n));
                }
                c if c == '_' || c.is_ascii_alphabetic() => {
                    let word = self.read_word();
                    let tok = match word.as_str() {
                        "import" => Tok::Import,
                        "from" => Tok::From,
                        "as" => Tok::As,
                        "pass" => Tok::Pass,
                        "None" => Tok::None,
                        _ => Tok::Name(word),
                    };
                    self.push(tok);
                }
                other => {
                    return Err(syntax(self.line, format!("invalid character {other:?}")));
                }
            }
        }

        if self.depth > 0 {
            return Err(syntax(self.line, "'(' was never closed"));
        }
        self.end_statement(false);
        self.out.push(Token { tok: Tok::Eof, line: self.line });
        Ok(())
    }

    /// Whitespace at the start of a line is only allowed when the rest of the
    /// line is blank or a comment.
    fn leading_whitespace(&mut self) -> Result<(), ScriptError> {
        while matches!(self.chars.peek(), Some(' ' | '\t' | '\r' | '\x0c')) {
            self.chars.next();
        }
        match self.chars.peek() {
            None | Some('\n') | Some('#') => Ok(()),
            Some(_) => Err(ScriptError::at(
                ScriptErrorKind::Syntax,
                self.line,
                "IndentationError: unexpected indent",
            )),
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                break;
            }
            self.chars.next();
        }
    }

    fn read_string(&mut self, quote: char) -> Result<String, ScriptError> {
        let start = self.line;
        let mut s = String::new();
        loop {
            match self.chars.next() {
                None | Some('\n') => {
                    return Err(syntax(start, "unterminated string literal"));
                }
                Some(c) if c == quote => return Ok(s),
                Some('\\') => match self.chars.next() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('0') => s.push('\0'),
                    Some('\\') => s.push('\\'),
                    Some('\'') => s.push('\''),
                    Some('"') => s.push('"'),
                    // Escaped newline continues the literal on the next line.
                    Some('\n') => self.line += 1,
                    // Unknown escapes are kept verbatim.
                    Some(other) => {
                        s.push('\\');
                        s.push(other);
                    }
                    None => return Err(syntax(start, "unterminated string literal")),
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_int(&mut self) -> Result<i64, ScriptError> {
        let mut digits = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    digits.push(c);
                }
                self.chars.next();
            } else {
                break;
            }
        }
        if matches!(self.chars.peek(), Some(c) if c.is_ascii_alphabetic()) {
            return Err(syntax(self.line, "invalid decimal literal"));
        }
        digits
            .parse()
            .map_err(|_| syntax(self.line, format!("integer literal too large: {digits}")))
    }

    fn read_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '_' || c.is_ascii_alphanumeric() {
                word.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        word
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
