//! Statement and expression AST plus a recursive-descent parser.
//!
//! Grammar:
//!
//! ```text
//! script  := { stmt NEWLINE } EOF
//! stmt    := "import" alias { "," alias }
//!          | "from" NAME "import" alias { "," alias }
//!          | "pass"
//!          | NAME "=" expr
//!          | expr
//! alias   := NAME [ "as" NAME ]
//! expr    := primary { "." NAME | "(" [ expr { "," expr } [","] ] ")" }
//! primary := NAME | STRING | INT | "None" | "(" expr ")"
//! ```

use crate::error::{ScriptError, ScriptErrorKind};

use super::lexer::{tokenize, Tok, Token};

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Str(String),
    Int(i64),
    None,
    Attr { object: Box<Expr>, attr: String },
    Call { callee: Box<Expr>, args: Vec<Expr> },
}

/// `name [as alias]` in an import list.
#[derive(Debug, Clone, PartialEq)]
pub struct Alias {
    pub name: String,
    pub alias: Option<String>,
}

impl Alias {
    /// The name bound in the caller's namespace.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `import a, b as c`
    Import(Vec<Alias>),
    /// `from m import a, b as c`
    FromImport { module: String, names: Vec<Alias> },
    /// `name = expr`
    Assign { name: String, value: Expr },
    Expr(Expr),
    Pass,
}

/// A statement and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse a whole script.
pub fn parse_script(src: &str) -> Result<Vec<Stmt>, ScriptError> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0, depth: 0 };
    let mut stmts = Vec::new();
    while !p.at(&Tok::Eof) {
        if p.eat(&Tok::Newline) {
            continue;
        }
        stmts.push(p.statement()?);
        if !p.eat(&Tok::Newline) {
            let t = p.peek();
            return Err(p.error_at(t.line, format!("unexpected {}", t.tok.describe())));
        }
    }
    Ok(stmts)
}

/// Deepest expression tree accepted, counting every nested call, attribute
/// and parenthesised operand.
pub const MAX_EXPR_DEPTH: usize = 500;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Expression depth along the current descent.
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // `tokenize` always ends with Eof, and we never advance past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek2(&self) -> Option<&Tok> {
        self.tokens.get(self.pos + 1).map(|t| &t.tok)
    }

    fn at(&self, tok: &Tok) -> bool {
        &self.peek().tok == tok
    }

    fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if t.tok != Tok::Eof {
            self.pos += 1;
        }
        t
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_at(&self, line: usize, msg: impl Into<String>) -> ScriptError {
        ScriptError::at(ScriptErrorKind::Syntax, line, msg)
    }

    fn expect(&mut self, tok: &Tok) -> Result<Token, ScriptError> {
        if self.at(tok) {
            return Ok(self.advance());
        }
        let t = self.peek();
        Err(self.error_at(
            t.line,
            format!("expected {}, found {}", tok.describe(), t.tok.describe()),
        ))
    }

    fn name(&mut self) -> Result<String, ScriptError> {
        let t = self.advance();
        match t.tok {
            Tok::Name(n) => Ok(n),
            other => Err(self.error_at(t.line, format!("expected a name, found {}", other.describe()))),
        }
    }

    fn statement(&mut self) -> Result<Stmt, ScriptError> {
        let line = self.peek().line;
        let tok = self.peek().tok.clone();
        let kind = match tok {
            Tok::Import => {
                self.advance();
                StmtKind::Import(self.alias_list()?)
            }
            Tok::From => {
                self.advance();
                let module = self.name()?;
                self.expect(&Tok::Import)?;
                StmtKind::FromImport { module, names: self.alias_list()? }
            }
            Tok::Pass => {
                self.advance();
                StmtKind::Pass
            }
            Tok::Name(_) if self.peek2() == Some(&Tok::Assign) => {
                let name = self.name()?;
                self.advance();
                StmtKind::Assign { name, value: self.expr()? }
            }
            _ => StmtKind::Expr(self.expr()?),
        };
        Ok(Stmt { kind, line })
    }

    fn alias_list(&mut self) -> Result<Vec<Alias>, ScriptError> {
        let mut out = Vec::new();
        loop {
            let name = self.name()?;
            let alias = if self.eat(&Tok::As) { Some(self.name()?) } else { None };
            out.push(Alias { name, alias });
            if !self.eat(&Tok::Comma) {
                return Ok(out);
            }
        }
    }

    fn deeper(&mut self) -> Result<(), ScriptError> {
        self.depth += 1;
        if self.depth > MAX_EXPR_DEPTH {
            let line = self.peek().line;
            return Err(self.error_at(line, "expression too deeply nested"));
        }
        Ok(())
    }

    fn expr(&mut self) -> Result<Expr, ScriptError> {
        let saved = self.depth;
        let result = self.postfix();
        self.depth = saved;
        result
    }

    fn postfix(&mut self) -> Result<Expr, ScriptError> {
        self.deeper()?;
        let mut e = self.primary()?;
        loop {
            if self.eat(&Tok::Dot) {
                self.deeper()?;
                let attr = self.name()?;
                e = Expr::Attr { object: Box::new(e), attr };
            } else if self.eat(&Tok::LParen) {
                self.deeper()?;
                let args = self.call_args()?;
                e = Expr::Call { callee: Box::new(e), args };
            } else {
                return Ok(e);
            }
        }
    }

    /// Arguments after `(`, consuming the closing `)`.
    fn call_args(&mut self) -> Result<Vec<Expr>, ScriptError> {
        let mut args = Vec::new();
        while !self.eat(&Tok::RParen) {
            args.push(self.expr()?);
            if !self.eat(&Tok::Comma) {
                self.expect(&Tok::RParen)?;
                break;
            }
        }
        Ok(args)
    }

    fn primary(&mut self) -> Result<Expr, ScriptError> {
        let t = self.advance();
        match t.tok {
            Tok::Name(n) => Ok(Expr::Name(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::Int(n) => Ok(Expr::Int(n)),
            Tok::None => Ok(Expr::None),
            Tok::LParen => {
                let e = self.expr()?;
                self.expect(&Tok::RParen)?;
                Ok(e)
            }
            other => Err(self.error_at(t.line, format!("invalid syntax near {}", other.describe()))),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<StmtKind> {
        parse_script(src).unwrap().into_iter().map(|s| s.kind).collect()
    }

    fn name(n: &str) -> Expr {
        Expr::Name(n.into())
    }

    #[test]
    fn fixed_script() {
        assert_eq!(
            kinds("import ahk\nahk.callcmd('MsgBox')\n"),
            vec![
                StmtKind::Import(vec![Alias { name: "ahk".into(), alias: None }]),
                StmtKind::Expr(Expr::Call {
                    callee: Box::new(Expr::Attr { object: Box::new(name("ahk")), attr: "callcmd".into() }),
                    args: vec![Expr::Str("MsgBox".into())],
                }),
            ]
        );
    }

    #[test]
    fn import_with_alias_list() {
        assert_eq!(
            kinds("import ahk as a, other"),
            vec![StmtKind::Import(vec![
                Alias { name: "ahk".into(), alias: Some("a".into()) },
                Alias { name: "other".into(), alias: None },
            ])]
        );
    }

    #[test]
    fn from_import() {
        assert_eq!(
            kinds("from ahk import callcmd as cc"),
            vec![StmtKind::FromImport {
                module: "ahk".into(),
                names: vec![Alias { name: "callcmd".into(), alias: Some("cc".into()) }],
            }]
        );
    }

    #[test]
    fn assignment_and_semicolons() {
        assert_eq!(
            kinds("x = 'a'; pass; x"),
            vec![
                StmtKind::Assign { name: "x".into(), value: Expr::Str("a".into()) },
                StmtKind::Pass,
                StmtKind::Expr(name("x")),
            ]
        );
    }

    #[test]
    fn trailing_comma_and_no_args() {
        assert_eq!(
            kinds("f('a',)\ng()"),
            vec![
                StmtKind::Expr(Expr::Call { callee: Box::new(name("f")), args: vec![Expr::Str("a".into())] }),
                StmtKind::Expr(Expr::Call { callee: Box::new(name("g")), args: vec![] }),
            ]
        );
    }

    #[test]
    fn statement_lines() {
        let stmts = parse_script("pass\n\n# c\nimport ahk").unwrap();
        assert_eq!(stmts[0].line, 1);
        assert_eq!(stmts[1].line, 4);
    }

    #[test]
    fn syntax_errors() {
        for src in ["import", "import 'ahk'", "from ahk callcmd", "f('a' 'b')", "x = ", "ahk.", "1 2", "f(,)"] {
            let e = parse_script(src).unwrap_err();
            assert_eq!(e.kind, ScriptErrorKind::Syntax, "{src:?}");
        }
    }

    #[test]
    fn long_attribute_chain_is_rejected() {
        let src = format!("x{}", ".a".repeat(10_000));
        let e = parse_script(&src).unwrap_err();
        assert_eq!(e.kind, ScriptErrorKind::Syntax);
        assert_eq!(e.message, "expression too deeply nested");
    }

    #[test]
    fn long_call_chain_is_rejected() {
        let src = format!("f{}", "()".repeat(10_000));
        assert_eq!(parse_script(&src).unwrap_err().message, "expression too deeply nested");
    }

    #[test]
    fn nested_calls_within_limit_parse() {
        let src = format!("{}'a'{}", "f(".repeat(100), ")".repeat(100));
        assert_eq!(parse_script(&src).unwrap().len(), 1);
    }

    #[test]
    fn empty_script_is_empty() {
        assert!(parse_script("").unwrap().is_empty());
        assert!(parse_script("\n# only a comment\n").unwrap().is_empty());
    }
}
