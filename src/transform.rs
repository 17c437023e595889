//! Lowering of the generic parse tree into the canonical AST.
//!
//! One recursive function with one case per [`Syntax`] kind. Literal lexemes become
//! native values, identifiers are classified against the reserved operator spellings,
//! and every structural form becomes a fixed-shape list headed by its structural operator.

use nom::Offset;

use crate::ast::{Int, Node, Operator, Symbol};
use crate::grammar::{Radix, Syntax};
use crate::{ReadError, ReadErrorKind};

/// A symbol whose name is a reserved operator spelling becomes that operator.
/// Both base symbols and operator tokens go through here.
pub(crate) fn classify(symbol: Symbol) -> Node {
    match Operator::from_reserved(symbol.name()) {
        Some(operator) => Node::Operator(operator),
        None => Node::Symbol(symbol),
    }
}

/// Lowers parse trees borrowed from `source`; the source is kept to locate literal errors.
pub(crate) struct Lowering<'a> {
    source: &'a str,
}

impl<'a> Lowering<'a> {
    pub(crate) fn new(source: &'a str) -> Self {
        Lowering { source }
    }

    pub(crate) fn lower_all(&self, forms: Vec<Syntax<'a>>) -> Result<Vec<Node>, ReadError> {
        forms.into_iter().map(|form| self.lower(form)).collect()
    }

    pub(crate) fn lower(&self, syntax: Syntax<'a>) -> Result<Node, ReadError> {
        let node = match syntax {
            Syntax::Str(raw) => Node::Str(self.string(raw)?),
            Syntax::Int { digits, radix } => Node::Int(self.integer(digits, radix)?),
            Syntax::Bool(b) => Node::Bool(b),
            Syntax::BaseSymbol(name) | Syntax::OperatorToken(name) => {
                classify(Symbol::new(name))
            }
            Syntax::List(items) => Node::List(self.lower_all(items)?),
            Syntax::Quoted(quoted) => Node::tagged(Operator::Quote, [self.lower(*quoted)?]),
            Syntax::Scoped(name) => {
                Node::tagged(Operator::Scoped, [Node::Symbol(Symbol::new(name))])
            }
            Syntax::Grouped(name) => {
                Node::tagged(Operator::ResolveGroup, [Node::Symbol(Symbol::new(name))])
            }
            Syntax::Timed { base, time } => {
                Node::tagged(Operator::RelEval, [self.lower(*base)?, self.lower(*time)?])
            }
            Syntax::TimedList { base, offsets } => {
                let base = self.lower(*base)?;
                let forms = offsets
                    .into_iter()
                    .map(|offset| {
                        Ok(Node::tagged(
                            Operator::RelEval,
                            [base.clone(), self.lower(offset)?],
                        ))
                    })
                    .collect::<Result<Vec<_>, ReadError>>()?;
                Node::ExpandGroup(forms)
            }
            Syntax::BitIndex { base, index } => {
                Node::tagged(Operator::Slice, [self.lower(*base)?, self.lower(*index)?])
            }
            Syntax::Sliced { base, upper, lower } => Node::tagged(
                Operator::Slice,
                [self.lower(*base)?, self.lower(*upper)?, self.lower(*lower)?],
            ),
        };
        Ok(node)
    }

    fn integer(&self, digits: &'a str, radix: Radix) -> Result<Int, ReadError> {
        Int::from_str_radix(digits, radix.base()).map_err(|_| {
            let prefix = match radix {
                Radix::Decimal => 0,
                Radix::Binary | Radix::Hexadecimal => 2,
            };
            let start = self.source.offset(digits) - prefix;
            let lexeme = &self.source[start..start + prefix + digits.len()];
            ReadError::at(
                ReadErrorKind::InvalidLiteral,
                self.source,
                start,
                Some(lexeme.to_owned()),
                |line, column| {
                    format!(
                        "Invalid literal \"{lexeme}\" at line {line}:{column}: integer does not fit in {} bits",
                        Int::BITS
                    )
                },
            )
        })
    }

    fn string(&self, raw: &'a str) -> Result<String, ReadError> {
        decode_escapes(raw).map_err(|e| {
            let body = self.source.offset(raw);
            let literal = &self.source[body - 1..body + raw.len() + 1];
            ReadError::at(
                ReadErrorKind::InvalidLiteral,
                self.source,
                body + e.at,
                Some(literal.to_owned()),
                |line, column| {
                    format!(
                        "Invalid literal {literal} at line {line}:{column}: {}",
                        e.reason
                    )
                },
            )
        })
    }
}

/// Malformed escape sequence, `at` is the byte offset of its backslash
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EscapeError {
    pub at: usize,
    pub reason: &'static str,
}

/// Decode the body of a string literal.
///
/// Unknown escapes are kept verbatim, backslash included.
pub(crate) fn decode_escapes(raw: &str) -> Result<String, EscapeError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.char_indices().peekable();
    while let Some((at, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, escaped)) = chars.next() else {
            return Err(EscapeError {
                at,
                reason: "dangling backslash",
            });
        };
        let decoded = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            '0'..='7' => {
                let mut value = escaped.to_digit(8).unwrap_or_default();
                for _ in 0..2 {
                    match chars.peek().and_then(|(_, c)| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                code_point(value, at)?
            }
            'x' => code_point(hex_digits(&mut chars, 2, at)?, at)?,
            'u' => code_point(hex_digits(&mut chars, 4, at)?, at)?,
            'U' => code_point(hex_digits(&mut chars, 8, at)?, at)?,
            other => {
                out.push('\\');
                other
            }
        };
        out.push(decoded);
    }
    Ok(out)
}

fn hex_digits(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    count: usize,
    at: usize,
) -> Result<u32, EscapeError> {
    let mut value = 0u32;
    for _ in 0..count {
        let digit = chars
            .next_if(|(_, c)| c.is_ascii_hexdigit())
            .and_then(|(_, c)| c.to_digit(16))
            .ok_or(EscapeError {
                at,
                reason: "truncated hexadecimal escape",
            })?;
        value = (value << 4) | digit;
    }
    Ok(value)
}

fn code_point(value: u32, at: usize) -> Result<char, EscapeError> {
    char::from_u32(value).ok_or(EscapeError {
        at,
        reason: "escape is not a valid unicode scalar value",
    })
}
