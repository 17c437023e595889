//! Textual grammar of the language, written with `nom` combinators.
//!
//! The grammar only recognizes structure. It produces a [`Syntax`] tree that borrows its
//! lexemes from the source: strings keep their escapes, integers keep their radix and
//! digits, and identifiers are not yet told apart from operators. Classification happens
//! in [`crate::transform`].
//!
//! Insignificant content ("atmosphere") is whitespace, `;` line comments and `#;` datum
//! comments. A datum comment parses the following expression to validate it and drops it.
//!
//! Postfix forms bind to the expression immediately before them, without whitespace:
//!
//! ```text
//! sig@3        timed symbol
//! sig@<1 2 3>  timed list
//! sig[3]       bit index
//! sig[7:0]     slice
//! ```
//!
//! They apply left to right, and the time operand of `@` is a single primary.

use nom::{
    Err, IResult, Parser,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of, satisfy},
    combinator::{cut, opt, recognize},
    error::{ErrorKind, ParseError},
    sequence::{pair, preceded},
};

use crate::ast::Operator;

/// Radix an integer literal was written in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Radix {
    Binary,
    Decimal,
    Hexadecimal,
}

impl Radix {
    pub(crate) fn base(self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Decimal => 10,
            Radix::Hexadecimal => 16,
        }
    }
}

/// Generic parse tree. Lexemes are slices of the source text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Syntax<'a> {
    /// String body between the quotes, escapes not yet decoded
    Str(&'a str),
    /// Integer digits without radix prefix; decimal digits keep their sign
    Int { digits: &'a str, radix: Radix },
    Bool(bool),
    BaseSymbol(&'a str),
    OperatorToken(&'a str),
    List(Vec<Syntax<'a>>),
    Quoted(Box<Syntax<'a>>),
    Scoped(&'a str),
    Grouped(&'a str),
    Timed {
        base: Box<Syntax<'a>>,
        time: Box<Syntax<'a>>,
    },
    TimedList {
        base: Box<Syntax<'a>>,
        offsets: Vec<Syntax<'a>>,
    },
    BitIndex {
        base: Box<Syntax<'a>>,
        index: Box<Syntax<'a>>,
    },
    Sliced {
        base: Box<Syntax<'a>>,
        upper: Box<Syntax<'a>>,
        lower: Box<Syntax<'a>>,
    },
}

/// Why the grammar stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reason {
    Nom(ErrorKind),
    /// A construct opened with a delimiter is still waiting for this closer
    Unclosed(char),
    TooDeep,
}

/// Grammar failure, positioned by the remaining input at the point of failure
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct GrammarError<'a> {
    pub input: &'a str,
    pub reason: Reason,
}

impl<'a> ParseError<&'a str> for GrammarError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        GrammarError {
            input,
            reason: Reason::Nom(kind),
        }
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }
}

pub(crate) type PResult<'a, T> = IResult<&'a str, T, GrammarError<'a>>;

fn fail<'a, T>(input: &'a str, reason: Reason) -> PResult<'a, T> {
    Err(Err::Failure(GrammarError { input, reason }))
}

fn reject<'a, T>(input: &'a str, kind: ErrorKind) -> PResult<'a, T> {
    Err(Err::Error(GrammarError::from_error_kind(input, kind)))
}

/// Turn an end-of-input failure inside a delimited construct into an `Unclosed` one,
/// so the reported hint names the innermost open delimiter.
fn unclosed_at_end<'a>(close: char) -> impl Fn(Err<GrammarError<'a>>) -> Err<GrammarError<'a>> {
    move |err| match err {
        Err::Failure(e) | Err::Error(e)
            if e.input.is_empty() && matches!(e.reason, Reason::Nom(_)) =>
        {
            Err::Failure(GrammarError {
                input: e.input,
                reason: Reason::Unclosed(close),
            })
        }
        other => other,
    }
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '.'
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-$./*?".contains(c)
}

fn is_whitespace(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}

/// `[A-Za-z_.][A-Za-z0-9_\-$./*?]*`
pub(crate) fn base_symbol(input: &str) -> PResult<'_, &str> {
    recognize(pair(satisfy(is_symbol_start), take_while(is_symbol_char))).parse(input)
}

fn whitespace(input: &str) -> PResult<'_, &str> {
    take_while(is_whitespace).parse(input)
}

fn rest_of_line(input: &str) -> PResult<'_, &str> {
    take_till(|c: char| c == '\n').parse(input)
}

/// Decimal integer with optional sign
fn decimal(input: &str) -> PResult<'_, Syntax<'_>> {
    let scanned: PResult<'_, &str> = recognize(pair(opt(one_of("+-")), digit1)).parse(input);
    let (rest, digits) = scanned?;
    Ok((
        rest,
        Syntax::Int {
            digits,
            radix: Radix::Decimal,
        },
    ))
}

fn prefixed<'a>(input: &'a str, prefix: &str, radix: Radix) -> Option<(&'a str, Syntax<'a>)> {
    let digits = input.strip_prefix(prefix)?;
    let accept = |c: char| c.is_digit(radix.base());
    let scanned: PResult<'a, &'a str> = take_while1(accept).parse(digits);
    scanned
        .ok()
        .map(|(rest, digits)| (rest, Syntax::Int { digits, radix }))
}

/// `0b[01]+`, `0x[0-9a-fA-F]+` or a signed decimal
fn integer(input: &str) -> PResult<'_, Syntax<'_>> {
    if let Some(found) = prefixed(input, "0b", Radix::Binary) {
        return Ok(found);
    }
    if let Some(found) = prefixed(input, "0x", Radix::Hexadecimal) {
        return Ok(found);
    }
    decimal(input)
}

/// One of the reserved operator spellings, longest match first
fn operator_token(input: &str) -> PResult<'_, &str> {
    Operator::PRIMITIVES
        .iter()
        .map(|operator| operator.spelling())
        .find(|spelling| input.starts_with(spelling))
        .map_or_else(
            || reject(input, ErrorKind::Tag),
            |spelling| Ok((&input[spelling.len()..], &input[..spelling.len()])),
        )
}

/// String literal; yields the raw body between the quotes
fn string(input: &str) -> PResult<'_, Syntax<'_>> {
    let Some(body) = input.strip_prefix('"') else {
        return reject(input, ErrorKind::Char);
    };
    let mut chars = body.char_indices();
    loop {
        match chars.next() {
            Some((end, '"')) => return Ok((&body[end + 1..], Syntax::Str(&body[..end]))),
            Some((_, '\\')) => match chars.next() {
                None => return fail(&body[body.len()..], Reason::Unclosed('"')),
                Some((at, '\n')) => return fail(&body[at..], Reason::Nom(ErrorKind::Char)),
                Some(_) => {}
            },
            Some((at, '\n')) => return fail(&body[at..], Reason::Nom(ErrorKind::Char)),
            Some(_) => {}
            None => return fail(&body[body.len()..], Reason::Unclosed('"')),
        }
    }
}

/// `#!...` up to and including the end of the first line
fn directive(input: &str) -> PResult<'_, &str> {
    recognize((
        multispace0,
        tag("#!"),
        take_till(|c: char| c == '\n'),
        opt(char('\n')),
    ))
    .parse(input)
}

/// Token starting at `input`, used to name the offender in error messages.
/// `None` when the first character matches no lexical rule.
pub(crate) fn lexeme_at(input: &str) -> Option<&str> {
    let first = input.chars().next()?;
    let lexeme = match first {
        '(' | ')' | '[' | ']' | '{' | '}' | '\'' | '~' | '@' | ':' => &input[..1],
        '"' => match string(input) {
            Ok((rest, _)) => &input[..input.len() - rest.len()],
            Err(_) => &input[..1],
        },
        '#' => {
            let rest = &input[1..];
            if rest.starts_with(';') || rest.starts_with('!') {
                &input[..2]
            } else {
                let (after, _) = base_symbol(rest).ok()?;
                &input[..input.len() - after.len()]
            }
        }
        _ => {
            if let Ok((rest, _)) = integer(input) {
                &input[..input.len() - rest.len()]
            } else if let Ok((_, symbol)) = base_symbol(input) {
                symbol
            } else {
                operator_token(input).ok()?.1
            }
        }
    };
    Some(lexeme)
}

/// Recursive grammar; `max_depth` bounds nesting of every construct
#[derive(Debug, Clone, Copy)]
pub(crate) struct Grammar {
    pub max_depth: usize,
}

impl Grammar {
    /// Start rule for a single expression surrounded by optional atmosphere
    pub(crate) fn single<'a>(self, input: &'a str) -> PResult<'a, Syntax<'a>> {
        let (rest, _) = self.atmosphere(input, 0)?;
        let (rest, form) = cut(|i| self.expression(i, 0)).parse(rest)?;
        let (rest, _) = self.atmosphere(rest, 0)?;
        if !rest.is_empty() {
            return fail(rest, Reason::Nom(ErrorKind::Eof));
        }
        Ok((rest, form))
    }

    /// Start rule for a whole source unit: optional directive line, then forms
    pub(crate) fn source<'a>(self, input: &'a str) -> PResult<'a, Vec<Syntax<'a>>> {
        let (rest, _) = opt(directive).parse(input)?;
        let (mut rest, mut separated) = self.atmosphere(rest, 0)?;
        let mut forms = Vec::new();
        while !rest.is_empty() {
            if !forms.is_empty() && !separated {
                return fail(rest, Reason::Nom(ErrorKind::Space));
            }
            let (after, form) = cut(|i| self.expression(i, 0)).parse(rest)?;
            forms.push(form);
            (rest, separated) = self.atmosphere(after, 0)?;
        }
        Ok((rest, forms))
    }

    /// Skip whitespace, line comments and datum comments.
    /// Reports whether anything was consumed, since list elements need separation.
    fn atmosphere<'a>(self, input: &'a str, depth: usize) -> PResult<'a, bool> {
        let mut rest = input;
        loop {
            let (after, _) = whitespace(rest)?;
            rest = after;
            if let Some(comment) = rest.strip_prefix(';') {
                let (after, _) = rest_of_line(comment)?;
                rest = after;
            } else if let Some(datum) = rest.strip_prefix("#;") {
                if depth > self.max_depth {
                    return fail(rest, Reason::TooDeep);
                }
                // the datum may itself be preceded by comments, `#; #; a b` drops both
                let (after, _) = self.atmosphere(datum, depth + 1)?;
                let (after, _) = cut(|i| self.expression(i, depth + 1)).parse(after)?;
                rest = after;
            } else {
                break;
            }
        }
        Ok((rest, rest.len() < input.len()))
    }

    /// Expression in a position where a timed list may expand into several forms:
    /// list elements, top-level forms and datum comments
    fn expression<'a>(self, input: &'a str, depth: usize) -> PResult<'a, Syntax<'a>> {
        let (rest, (node, _)) = self.postfixed(input, depth)?;
        Ok((rest, node))
    }

    /// Expression that must stand for exactly one value: quote bodies and subscript bounds
    fn operand<'a>(self, input: &'a str, depth: usize) -> PResult<'a, Syntax<'a>> {
        match self.postfixed(input, depth)? {
            (_, (_, Some(group_at))) => fail(group_at, Reason::Nom(ErrorKind::Verify)),
            (rest, (node, None)) => Ok((rest, node)),
        }
    }

    /// A primary followed by any number of postfix forms. Also yields the `@` of a
    /// trailing timed list; a timed list accepts no further postfix.
    fn postfixed<'a>(
        self,
        input: &'a str,
        depth: usize,
    ) -> PResult<'a, (Syntax<'a>, Option<&'a str>)> {
        if depth > self.max_depth {
            return fail(input, Reason::TooDeep);
        }
        let (mut rest, mut node) = self.primary(input, depth)?;
        let mut level = depth;
        let mut group_at = None;
        loop {
            if group_at.is_some() && (rest.starts_with('@') || rest.starts_with('[')) {
                return fail(rest, Reason::Nom(ErrorKind::Verify));
            }
            if let Some(after) = rest.strip_prefix('@') {
                level += 1;
                if level > self.max_depth {
                    return fail(rest, Reason::TooDeep);
                }
                let base = Box::new(node);
                if starts_offset_list(after) {
                    let (r, offsets) = self.offset_list(after)?;
                    node = Syntax::TimedList { base, offsets };
                    group_at = Some(rest);
                    rest = r;
                } else {
                    let (r, time) = cut(|i| self.primary(i, level)).parse(after)?;
                    node = Syntax::Timed {
                        base,
                        time: Box::new(time),
                    };
                    rest = r;
                }
            } else if let Some(after) = rest.strip_prefix('[') {
                level += 1;
                if level > self.max_depth {
                    return fail(rest, Reason::TooDeep);
                }
                let (r, (first, second)) = self.subscript(after, level)?;
                let base = Box::new(node);
                node = match second {
                    Some(lower) => Syntax::Sliced {
                        base,
                        upper: Box::new(first),
                        lower: Box::new(lower),
                    },
                    None => Syntax::BitIndex {
                        base,
                        index: Box::new(first),
                    },
                };
                rest = r;
            } else {
                return Ok((rest, (node, group_at)));
            }
        }
    }

    fn primary<'a>(self, input: &'a str, depth: usize) -> PResult<'a, Syntax<'a>> {
        let mut chars = input.chars();
        let Some(first) = chars.next() else {
            return reject(input, ErrorKind::Eof);
        };
        match first {
            '(' => self.list(input, depth, ')'),
            '[' => self.list(input, depth, ']'),
            '{' => self.list(input, depth, '}'),
            '\'' => {
                let (rest, _) = whitespace(&input[1..])?;
                let (rest, quoted) = cut(|i| self.operand(i, depth + 1)).parse(rest)?;
                Ok((rest, Syntax::Quoted(Box::new(quoted))))
            }
            '"' => string(input),
            '~' => {
                let (rest, name) = cut(base_symbol).parse(&input[1..])?;
                Ok((rest, Syntax::Scoped(name)))
            }
            '#' => {
                let (rest, name) = cut(base_symbol).parse(&input[1..])?;
                let node = match name {
                    "t" => Syntax::Bool(true),
                    "f" => Syntax::Bool(false),
                    _ => Syntax::Grouped(name),
                };
                Ok((rest, node))
            }
            c if c.is_ascii_digit() => integer(input),
            '+' | '-' if chars.next().is_some_and(|c| c.is_ascii_digit()) => integer(input),
            c if is_symbol_start(c) => {
                let (rest, name) = base_symbol(input)?;
                Ok((rest, Syntax::BaseSymbol(name)))
            }
            _ => {
                let (rest, spelling) = operator_token(input)?;
                Ok((rest, Syntax::OperatorToken(spelling)))
            }
        }
    }

    /// Parenthesized, bracketed or braced sequence of separated expressions
    fn list<'a>(self, input: &'a str, depth: usize, close: char) -> PResult<'a, Syntax<'a>> {
        let (mut rest, _) = self
            .atmosphere(&input[1..], depth)
            .map_err(unclosed_at_end(close))?;
        let mut items = Vec::new();
        let mut separated = true;
        loop {
            if let Some(after) = rest.strip_prefix(close) {
                return Ok((after, Syntax::List(items)));
            }
            if rest.is_empty() {
                return fail(rest, Reason::Unclosed(close));
            }
            if !separated {
                return fail(rest, Reason::Nom(ErrorKind::Space));
            }
            let (after, item) = cut(|i| self.expression(i, depth + 1))
                .parse(rest)
                .map_err(unclosed_at_end(close))?;
            items.push(item);
            (rest, separated) = self
                .atmosphere(after, depth)
                .map_err(unclosed_at_end(close))?;
        }
    }

    /// Body of `[index]` or `[upper:lower]`, after the opening bracket
    fn subscript<'a>(
        self,
        input: &'a str,
        depth: usize,
    ) -> PResult<'a, (Syntax<'a>, Option<Syntax<'a>>)> {
        let inner = |i: &'a str| -> PResult<'a, Syntax<'a>> {
            let (i, _) = self.atmosphere(i, depth)?;
            let (i, node) = cut(|i| self.operand(i, depth + 1)).parse(i)?;
            let (i, _) = self.atmosphere(i, depth)?;
            Ok((i, node))
        };
        let (rest, first) = inner(input).map_err(unclosed_at_end(']'))?;
        let (rest, second) = match rest.strip_prefix(':') {
            Some(after) => {
                let (rest, lower) = inner(after).map_err(unclosed_at_end(']'))?;
                (rest, Some(lower))
            }
            None => (rest, None),
        };
        match rest.strip_prefix(']') {
            Some(after) => Ok((after, (first, second))),
            None if rest.is_empty() => fail(rest, Reason::Unclosed(']')),
            None => fail(rest, Reason::Nom(ErrorKind::Char)),
        }
    }

    /// `<int (ws int)*>` after the `@`, at least one offset
    fn offset_list<'a>(self, input: &'a str) -> PResult<'a, Vec<Syntax<'a>>> {
        let Some(body) = input.strip_prefix('<') else {
            return reject(input, ErrorKind::Char);
        };
        let (mut rest, _) = whitespace(body)?;
        let (after, first) = cut(decimal).parse(rest)?;
        let mut offsets = vec![first];
        rest = after;
        while let Ok((after, next)) = preceded(take_while1(is_whitespace), decimal).parse(rest) {
            offsets.push(next);
            rest = after;
        }
        let (rest, _) = whitespace(rest)?;
        match rest.strip_prefix('>') {
            Some(after) => Ok((after, offsets)),
            None if rest.is_empty() => fail(rest, Reason::Unclosed('>')),
            None => fail(rest, Reason::Nom(ErrorKind::Char)),
        }
    }
}

/// `@<` starts an offset list only when an offset follows;
/// otherwise the `<` is the less-than operator used as a time operand.
fn starts_offset_list(input: &str) -> bool {
    let Some(body) = input.strip_prefix('<') else {
        return false;
    };
    let body = body.trim_start_matches(is_whitespace);
    let mut chars = body.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+' | '-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}
