//! `.stra` recipe parser.
//!
//! Transforms raw recipe text into a validated AST through lexing,
//! recursive-descent parsing, and static analysis phases.

use strata_common::error::{Result, StrataError};

use crate::ast::{RecipeFile, ServiceDecl};
use crate::lexer::{self, Token};
use crate::validator;

/// Cursor into a token stream for recursive-descent parsing.
struct TokenCursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    const fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect_identifier(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::Identifier(s)) => Ok(s.clone()),
            other => Err(parse_err(format!("expected identifier, got {other:?}"))),
        }
    }

    fn expect_token(&mut self, expected: &Token) -> Result<()> {
        match self.advance() {
            Some(tok) if tok == expected => Ok(()),
            other => Err(parse_err(format!("expected {expected:?}, got {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> Result<String> {
        match self.advance() {
            Some(Token::StringLiteral(s)) => Ok(s.clone()),
            other => Err(parse_err(format!("expected string literal, got {other:?}"))),
        }
    }

    fn expect_integer(&mut self) -> Result<i64> {
        match self.advance() {
            Some(Token::Integer(n)) => Ok(*n),
            other => Err(parse_err(format!("expected integer, got {other:?}"))),
        }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }
}

const fn parse_err(message: String) -> StrataError {
    StrataError::Recipe { message }
}

/// Parses a `.stra` recipe from its source text.
///
/// # Errors
///
/// Returns an error if the input contains syntax errors or fails validation.
pub fn parse_recipe(input: &str) -> Result<RecipeFile> {
    tracing::debug!("parsing .stra input");
    let tokens = lexer::tokenize(input)?;
    let mut cursor = TokenCursor::new(&tokens);
    let file = parse_file(&mut cursor)?;
    validator::validate(&file)?;
    Ok(file)
}

fn parse_file(cursor: &mut TokenCursor<'_>) -> Result<RecipeFile> {
    let mut file = RecipeFile::default();

    while let Some(tok) = cursor.peek() {
        match tok {
            Token::Service => file.services.push(parse_service(cursor)?),
            other => {
                return Err(parse_err(format!(
                    "expected SERVICE at top level, got {other:?}"
                )));
            }
        }
    }

    Ok(file)
}

fn parse_service(cursor: &mut TokenCursor<'_>) -> Result<ServiceDecl> {
    cursor.expect_token(&Token::Service)?;
    let name = cursor.expect_identifier()?;
    cursor.expect_token(&Token::BraceOpen)?;

    let mut decl = ServiceDecl {
        name,
        ..ServiceDecl::default()
    };

    while cursor.peek() != Some(&Token::BraceClose) {
        if cursor.at_end() {
            return Err(parse_err(
                "unexpected end of input inside SERVICE block".into(),
            ));
        }
        parse_property(cursor, &mut decl)?;
    }

    cursor.expect_token(&Token::BraceClose)?;
    Ok(decl)
}

fn parse_property(cursor: &mut TokenCursor<'_>, decl: &mut ServiceDecl) -> Result<()> {
    let key = cursor.expect_identifier()?;
    cursor.expect_token(&Token::Equals)?;

    match key.as_str() {
        "base" => decl.base = Some(cursor.expect_string()?),
        "workdir" => decl.workdir = Some(cursor.expect_string()?),
        "manifest" => decl.manifest = Some(cursor.expect_string()?),
        "source" => decl.source = Some(cursor.expect_string()?),
        "server" => decl.server = Some(cursor.expect_string()?),
        "entrypoint" => decl.entrypoint = Some(cursor.expect_string()?),
        "port" => {
            let val = cursor.expect_integer()?;
            decl.port = Some(
                u16::try_from(val)
                    .map_err(|_| parse_err(format!("port value out of range: {val}")))?,
            );
        }
        _ => {
            return Err(parse_err(format!("unknown service property: {key}")));
        }
    }

    Ok(())
}
