//! Text front end.
//!
//! Parsing happens in two passes. The first reads the source into a flat
//! surface form (operands and operator tokens per bracket level) using `nom`
//! for the lexical layer. The second folds each level by precedence against
//! the session's operator table and builds pool terms. Programs are parsed one
//! command at a time, so a `DefOp` takes effect for the commands after it.
//! A `#` starts a comment that runs to the end of the line.
//!
//! ```text
//! command := ID '=' term | '?' term | term
//! term    := item (operator? item)*
//! item    := VAR | ID | NUM | '(' term ')' | ('\' | 'λ') VAR ('.' | '->') term
//! ```

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, not_line_ending, satisfy},
    combinator::{map, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded},
};

use crate::{MAX_NUMERAL, MAX_PARSE_DEPTH};
use crate::intern::{Interner, Name};
use crate::numeral::church_numeral;
use crate::operators::{Assoc, OperatorInfo, OperatorTable};
use crate::term::{TermId, TermPool};
use crate::{Error, ParseError, ParseErrorKind};

/// Characters that make up operator tokens
pub const OPERATOR_CHARS: &str = "+-=!@$%^&*/:<>.,|~?";

/// One parsed command, with its terms already in the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `ID = term`
    Declaration { name: Name, term: TermId },
    /// `term` or `? term`
    Evaluate(TermId),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Var(&'a str),
    Ident(&'a str),
    Number(&'a str),
    Operator(&'a str),
    Open,
    Close,
    Lambda,
    Dot,
    Equals,
    Separator,
    Query,
}

fn variable(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_lowercase() || c == '_'),
        take_while(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'),
    ))
    .parse(input)
}

/// `Name` or `'any text'`
fn identifier(input: &str) -> IResult<&str, &str> {
    alt((
        recognize(pair(
            satisfy(|c| c.is_ascii_uppercase()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        delimited(char('\''), take_while1(|c: char| c != '\''), char('\'')),
    ))
    .parse(input)
}

/// Operator runs, with the reserved ones turned into punctuation
fn operator(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, run) = take_while1(|c: char| OPERATOR_CHARS.contains(c)).parse(input)?;
    let token = match run {
        "." | "->" => Token::Dot,
        "=" => Token::Equals,
        "?" => Token::Query,
        _ => Token::Operator(run),
    };
    Ok((rest, token))
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    preceded(
        blank,
        alt((
            map(variable, Token::Var),
            map(identifier, Token::Ident),
            map(digit1, Token::Number),
            operator,
            value(Token::Open, char('(')),
            value(Token::Close, char(')')),
            value(Token::Separator, char(';')),
            value(Token::Lambda, alt((tag("\\"), tag("λ")))),
        )),
    )
    .parse(input)
}

/// Whitespace and `#` comments
fn blank(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((multispace1, preceded(char('#'), not_line_ending)))),
    )
    .parse(input)
}

/// Input left after leading whitespace and comments
fn skip_space(input: &str) -> &str {
    blank(input).map_or(input, |(rest, ())| rest)
}

#[derive(Debug)]
enum Surface<'a> {
    Var(&'a str),
    Alias(&'a str),
    Number(&'a str),
    Group(Vec<Element<'a>>),
    Lambda { param: &'a str, body: Vec<Element<'a>> },
}

#[derive(Debug)]
enum Element<'a> {
    Operand(Surface<'a>),
    Operator { name: &'a str, at: &'a str },
}

/// A parse failure positioned at `at`, a suffix of the parsed source
struct Failure<'a> {
    kind: ParseErrorKind,
    message: String,
    at: &'a str,
}

impl<'a> Failure<'a> {
    fn new(kind: ParseErrorKind, message: impl Into<String>, at: &'a str) -> Self {
        Failure {
            kind,
            message: message.into(),
            at,
        }
    }

    /// "expected X" at `at`, which is `Incomplete` when the input ran out
    fn expected(what: &str, at: &'a str) -> Self {
        let rest = skip_space(at);
        if rest.is_empty() {
            Failure::new(
                ParseErrorKind::Incomplete,
                format!("Unexpected end of input, expected {what}"),
                rest,
            )
        } else {
            Failure::new(
                ParseErrorKind::InvalidSyntax,
                format!("Expected {what}"),
                rest,
            )
        }
    }

    fn into_error(self, source: &str) -> Error {
        let offset = source.len().saturating_sub(self.at.len());
        Error::ParseError(ParseError::with_context(
            self.kind,
            self.message,
            source,
            offset,
        ))
    }
}

type Scan<'a, T> = Result<(&'a str, T), Failure<'a>>;

/// Read operands and operators up to the end of the current level: a closing
/// bracket, a separator or the end of input. A lambda swallows the rest of
/// its level.
fn sequence(input: &str, depth: usize) -> Scan<'_, Vec<Element<'_>>> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(Failure::new(
            ParseErrorKind::TooDeeplyNested,
            format!("Term too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            input,
        ));
    }

    let mut elements = Vec::new();
    let mut input = input;
    loop {
        let at = skip_space(input);
        let Ok((rest, tok)) = token(input) else {
            break;
        };
        match tok {
            Token::Var(name) => elements.push(Element::Operand(Surface::Var(name))),
            Token::Ident(name) => elements.push(Element::Operand(Surface::Alias(name))),
            Token::Number(digits) => elements.push(Element::Operand(Surface::Number(digits))),
            Token::Operator(name) => elements.push(Element::Operator { name, at }),
            Token::Open => {
                let (after, inner) = sequence(rest, depth + 1)?;
                if inner.is_empty() {
                    return Err(Failure::expected("a term", after));
                }
                let Ok((after, Token::Close)) = token(after) else {
                    return Err(Failure::expected("')'", after));
                };
                elements.push(Element::Operand(Surface::Group(inner)));
                input = after;
                continue;
            }
            Token::Lambda => {
                let Ok((after, Token::Var(param))) = token(rest) else {
                    return Err(Failure::expected("a variable after the lambda", rest));
                };
                let Ok((after, Token::Dot)) = token(after) else {
                    return Err(Failure::expected("'.' or '->'", after));
                };
                let (after, body) = sequence(after, depth + 1)?;
                if body.is_empty() {
                    return Err(Failure::expected("a lambda body", after));
                }
                elements.push(Element::Operand(Surface::Lambda { param, body }));
                return Ok((after, elements));
            }
            Token::Close | Token::Dot | Token::Equals | Token::Separator | Token::Query => break,
        }
        input = rest;
    }
    Ok((input, elements))
}

/// Builds pool terms from surface syntax
struct Lowering<'p, 'a> {
    pool: &'p mut TermPool,
    names: &'p mut Interner,
    ops: &'p OperatorTable,
    source: &'a str,
}

#[derive(Default)]
struct Fold<'a> {
    operands: Vec<TermId>,
    operators: Vec<(Option<Name>, OperatorInfo, &'a str)>,
}

impl<'a> Lowering<'_, 'a> {
    fn error(&self, kind: ParseErrorKind, message: impl Into<String>, at: &'a str) -> Error {
        Failure::new(kind, message, at).into_error(self.source)
    }

    /// Lower one level. Terms built so far are released on failure.
    fn sequence(&mut self, elements: Vec<Element<'a>>) -> Result<TermId, Error> {
        let mut fold = Fold::default();
        let result = self.fold(&mut fold, elements);
        for t in fold.operands.drain(..) {
            self.pool.release(t);
        }
        result
    }

    fn fold(&mut self, fold: &mut Fold<'a>, elements: Vec<Element<'a>>) -> Result<TermId, Error> {
        let mut last_operator = None;
        let mut after_operand = false;

        for element in elements {
            match element {
                Element::Operand(surface) => {
                    if after_operand {
                        let at = last_operator.unwrap_or(self.source);
                        self.push_operator(fold, None, OperatorInfo::APPLICATION, at)?;
                    }
                    let term = self.operand(surface)?;
                    fold.operands.push(term);
                    after_operand = true;
                }
                Element::Operator { name, at } => {
                    if !after_operand {
                        return Err(self.error(
                            ParseErrorKind::InvalidSyntax,
                            format!("Operator '{name}' is missing its left operand"),
                            at,
                        ));
                    }
                    let op = self.names.intern(name);
                    let info = self.ops.lookup(op);
                    self.push_operator(fold, Some(op), info, at)?;
                    last_operator = Some(at);
                    after_operand = false;
                }
            }
        }

        if !after_operand {
            let at = last_operator.unwrap_or(self.source);
            return Err(self.error(
                ParseErrorKind::Incomplete,
                "Operator is missing its right operand",
                at,
            ));
        }
        while !fold.operators.is_empty() {
            self.apply_top(fold)?;
        }
        match (fold.operands.pop(), fold.operands.is_empty()) {
            (Some(term), true) => Ok(term),
            _ => Err(Error::invariant("operand stack out of balance")),
        }
    }

    /// Shunting-yard step: reduce while the stacked operator binds at least as
    /// tightly as `info`, then stack `info`
    fn push_operator(
        &mut self,
        fold: &mut Fold<'a>,
        op: Option<Name>,
        info: OperatorInfo,
        at: &'a str,
    ) -> Result<(), Error> {
        while let Some(&(top_op, top, _)) = fold.operators.last() {
            let reduce = if top.precedence != info.precedence {
                top.precedence < info.precedence
            } else if top.assoc == Assoc::Right {
                false
            } else if info.assoc == Assoc::Left {
                true
            } else {
                let name = |o: Option<Name>| o.map_or("application", |o| self.names.resolve(o));
                return Err(self.error(
                    ParseErrorKind::Ambiguous,
                    format!(
                        "Precedence ambiguity between operators '{}' and '{}'. Use brackets.",
                        name(top_op),
                        name(op)
                    ),
                    at,
                ));
            };
            if !reduce {
                break;
            }
            self.apply_top(fold)?;
        }
        fold.operators.push((op, info, at));
        Ok(())
    }

    fn apply_top(&mut self, fold: &mut Fold<'a>) -> Result<(), Error> {
        let Some((op, _, _)) = fold.operators.pop() else {
            return Err(Error::invariant("operator stack underflow"));
        };
        let (Some(right), Some(left)) = (fold.operands.pop(), fold.operands.pop()) else {
            return Err(Error::invariant("operand stack underflow"));
        };
        let term = self.pool.appl_with_oper(left, right, op);
        fold.operands.push(term);
        Ok(())
    }

    fn operand(&mut self, surface: Surface<'a>) -> Result<TermId, Error> {
        match surface {
            Surface::Var(name) => {
                let name = self.names.intern(name);
                Ok(self.pool.var(name))
            }
            Surface::Alias(name) => {
                let name = self.names.intern(name);
                Ok(self.pool.alias(name))
            }
            Surface::Number(digits) => match digits.parse::<usize>() {
                Ok(n) if n <= MAX_NUMERAL => church_numeral(self.pool, self.names, n),
                _ => Err(Error::NumeralOutOfRange(digits.to_owned())),
            },
            Surface::Group(elements) => self.sequence(elements),
            Surface::Lambda { param, body } => {
                let body = self.sequence(body)?;
                let param = self.names.intern(param);
                Ok(self.pool.abstr(param, body))
            }
        }
    }
}

/// Parse a single term. The whole input must be consumed.
pub fn parse_term(
    input: &str,
    pool: &mut TermPool,
    names: &mut Interner,
    ops: &OperatorTable,
) -> Result<TermId, Error> {
    let (rest, elements) = sequence(input, 0).map_err(|f| f.into_error(input))?;
    if elements.is_empty() {
        return Err(Failure::expected("a term", rest).into_error(input));
    }
    let rest = skip_space(rest);
    if !rest.is_empty() {
        return Err(trailing(rest).into_error(input));
    }
    Lowering {
        pool: &mut *pool,
        names: &mut *names,
        ops,
        source: input,
    }
    .sequence(elements)
}

fn trailing(rest: &str) -> Failure<'_> {
    let shown: String = rest.chars().take(10).collect();
    Failure::new(
        ParseErrorKind::TrailingContent,
        format!("Unexpected remaining input: '{shown}'"),
        rest,
    )
}

/// Parse the next command of a program.
///
/// Returns the command and the input after its `;` separator, or `None` once
/// only whitespace and separators are left. Error positions are relative to
/// `input`.
pub fn parse_command<'a>(
    input: &'a str,
    pool: &mut TermPool,
    names: &mut Interner,
    ops: &OperatorTable,
) -> Result<Option<(Command, &'a str)>, Error> {
    let mut start = input;
    while let Ok((rest, Token::Separator)) = token(start) {
        start = rest;
    }
    if skip_space(start).is_empty() {
        return Ok(None);
    }

    let (body_start, declared) = match token(start) {
        Ok((after, Token::Ident(id))) => match token(after) {
            Ok((after_eq, Token::Equals)) => (after_eq, Some(id)),
            _ => (start, None),
        },
        Ok((after, Token::Query)) => (after, None),
        _ => (start, None),
    };

    let (rest, elements) = sequence(body_start, 0).map_err(|f| f.into_error(input))?;
    if elements.is_empty() {
        return Err(Failure::expected("a term", rest).into_error(input));
    }
    let rest = match token(rest) {
        Ok((after, Token::Separator)) => after,
        _ if skip_space(rest).is_empty() => "",
        _ => return Err(trailing(skip_space(rest)).into_error(input)),
    };

    let term = Lowering {
        pool: &mut *pool,
        names: &mut *names,
        ops,
        source: input,
    }
    .sequence(elements)?;
    let command = match declared {
        Some(id) => Command::Declaration {
            name: names.intern(id),
            term,
        },
        None => Command::Evaluate(term),
    };
    Ok(Some((command, rest)))
}
