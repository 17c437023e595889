//! Entry points of the reader and rendering of read errors.
//!
//! ```
//! use wal_reader::ast::{Operator, op, sym, val};
//! use wal_reader::read_sexpr;
//!
//! let node = read_sexpr("sig[7:0]").unwrap();
//! assert_eq!(node, val(vec![op(Operator::Slice), sym("sig"), val(7), val(0)]));
//! ```

use nom::Offset;

use crate::ast::Node;
use crate::grammar::{Grammar, GrammarError, Reason, lexeme_at};
use crate::transform::Lowering;
use crate::{MAX_PARSE_DEPTH, ReadError, ReadErrorKind};

/// Characters of context shown on each side of the error column
const CONTEXT_SPAN: usize = 40;

/// Reader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadConfig {
    /// Maximum nesting of lists, quotes and postfix forms
    pub max_depth: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        ReadConfig {
            max_depth: MAX_PARSE_DEPTH,
        }
    }
}

/// Read exactly one expression. Surrounding whitespace and comments are allowed,
/// a second expression is not.
pub fn read_sexpr(source: &str) -> Result<Node, ReadError> {
    read_sexpr_with_config(source, ReadConfig::default())
}

/// Read a whole source unit: an optional `#!` directive line, then any number of
/// expressions separated by whitespace or comments.
pub fn read_sexprs(source: &str) -> Result<Vec<Node>, ReadError> {
    read_sexprs_with_config(source, ReadConfig::default())
}

pub fn read_sexpr_with_config(source: &str, config: ReadConfig) -> Result<Node, ReadError> {
    tracing::trace!(len = source.len(), "reading expression");
    let grammar = Grammar {
        max_depth: config.max_depth,
    };
    grammar
        .single(source)
        .map_err(|e| grammar_error(source, e, config))
        .and_then(|(_, syntax)| Lowering::new(source).lower(syntax))
        .inspect_err(trace_failure)
}

pub fn read_sexprs_with_config(source: &str, config: ReadConfig) -> Result<Vec<Node>, ReadError> {
    tracing::trace!(len = source.len(), "reading source unit");
    let grammar = Grammar {
        max_depth: config.max_depth,
    };
    grammar
        .source(source)
        .map_err(|e| grammar_error(source, e, config))
        .and_then(|(_, forms)| Lowering::new(source).lower_all(forms))
        .inspect_err(trace_failure)
}

fn trace_failure(err: &ReadError) {
    tracing::debug!(
        kind = ?err.kind,
        line = err.line,
        column = err.column,
        "read failed"
    );
}

/// Classify a grammar failure by what sits at the failing position
fn grammar_error(source: &str, err: nom::Err<GrammarError<'_>>, config: ReadConfig) -> ReadError {
    let (input, reason) = match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => (e.input, e.reason),
        nom::Err::Incomplete(_) => (
            &source[source.len()..],
            Reason::Nom(nom::error::ErrorKind::Complete),
        ),
    };
    let offset = source.offset(input);

    if reason == Reason::TooDeep {
        return ReadError::at(
            ReadErrorKind::TooDeeplyNested,
            source,
            offset,
            None,
            |line, column| {
                format!(
                    "Expression too deeply nested at line {line}:{column} (max depth: {})",
                    config.max_depth
                )
            },
        );
    }

    if input.is_empty() {
        return ReadError::at(
            ReadErrorKind::UnexpectedEof,
            source,
            offset,
            None,
            |line, column| match reason {
                Reason::Unclosed(close) => format!(
                    "Unexpected end of input at line {line}:{column}.\nDid you forget a closing {close}?"
                ),
                _ => format!("Unexpected end of input at line {line}:{column}."),
            },
        );
    }

    match lexeme_at(input) {
        Some(token) => ReadError::at(
            ReadErrorKind::UnexpectedToken,
            source,
            offset,
            Some(token.to_owned()),
            |line, column| format!("Unexpected \"{token}\" at line {line}:{column}"),
        ),
        None => {
            let ch: String = input.chars().take(1).flat_map(char::escape_default).collect();
            ReadError::at(
                ReadErrorKind::UnexpectedCharacter,
                source,
                offset,
                Some(ch.clone()),
                |line, column| format!("Unexpected \"{ch}\" at line {line}:{column}"),
            )
        }
    }
}

/// 1-based line and column (in characters) of byte `offset`
pub(crate) fn locate(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}

/// The source line containing `offset`, clipped around the column, with a caret under it
pub(crate) fn context_window(source: &str, offset: usize) -> String {
    let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line_end = source[offset..]
        .find('\n')
        .map_or(source.len(), |i| offset + i);
    let line = source[line_start..line_end].trim_end_matches('\r');

    let column = source[line_start..offset].chars().count();
    let skip = column.saturating_sub(CONTEXT_SPAN);
    let shown: String = line.chars().skip(skip).take(CONTEXT_SPAN * 2).collect();

    let mut window = String::new();
    if skip > 0 {
        window.push_str("[...]");
    }
    window.push_str(&shown);
    if skip + shown.chars().count() < line.chars().count() {
        window.push_str("[...]");
    }
    let caret_column = column - skip + if skip > 0 { "[...]".len() } else { 0 };
    window.push('\n');
    window.push_str(&" ".repeat(caret_column));
    window.push('^');
    window
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{Operator, group, nil, op, sym, val};

    /// Expected outcome of a read
    #[derive(Debug)]
    enum ReadTestResult {
        Success(Node),
        Failure(ReadErrorKind),
    }
    use ReadTestResult::*;

    fn success<T: Into<Node>>(value: T) -> ReadTestResult {
        Success(value.into())
    }

    fn tagged<const N: usize>(tag: Operator, args: [Node; N]) -> Node {
        Node::tagged(tag, args)
    }

    fn run_read_tests(test_cases: Vec<(&str, ReadTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Read test #{} ({input:?})", i + 1);
            match (read_sexpr(input), expected) {
                (Ok(actual), Success(expected)) => {
                    assert_eq!(actual, *expected, "{test_id}: value mismatch");
                }
                (Err(err), Failure(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: kind mismatch: {err}");
                }
                (Ok(actual), Failure(kind)) => {
                    panic!("{test_id}: expected {kind:?}, got {actual:?}");
                }
                (Err(err), Success(_)) => {
                    panic!("{test_id}: expected success, got error\n{err}");
                }
            }
        }
    }

    #[test]
    #[expect(clippy::too_many_lines)] // Comprehensive test coverage is intentionally thorough
    fn test_reader_comprehensive() {
        use ReadErrorKind::*;

        let test_cases = vec![
            // ===== INTEGERS =====
            ("42", success(42)),
            ("-5", success(-5)),
            ("+5", success(5)),
            ("0b101010", success(42)),
            ("0x2A", success(42)),
            ("0x2a", success(42)),
            ("9223372036854775807", success(i64::MAX)),
            ("-9223372036854775808", success(i64::MIN)),
            ("9223372036854775808", Failure(InvalidLiteral)),
            ("0xFFFFFFFFFFFFFFFF", Failure(InvalidLiteral)),
            ("123abc", Failure(UnexpectedToken)),
            ("0b2", Failure(UnexpectedToken)),
            // ===== BOOLEANS =====
            ("#t", success(true)),
            ("#f", success(false)),
            // ===== STRINGS =====
            (r#""a\nb""#, success("a\nb")),
            (r#""say \"hi\"""#, success("say \"hi\"")),
            ("\"\"", success("")),
            ("\"unterminated", Failure(UnexpectedEof)),
            ("\"line\nbreak\"", Failure(UnexpectedCharacter)),
            ("\"line\\\nbreak\"", Failure(UnexpectedCharacter)),
            (r#""\xZZ""#, Failure(InvalidLiteral)),
            // ===== SYMBOLS AND OPERATORS =====
            ("clk", success(sym("clk"))),
            ("top.dut.valid?", success(sym("top.dut.valid?"))),
            ("_tmp", success(sym("_tmp"))),
            ("a*b", success(sym("a*b"))),
            ("+", success(op(Operator::Add))),
            ("-", success(op(Operator::Sub))),
            ("**", success(op(Operator::Pow))),
            ("&&", success(op(Operator::And))),
            ("||", success(op(Operator::Or))),
            ("!=", success(op(Operator::Neq))),
            ("<=", success(op(Operator::Le))),
            ("!", success(op(Operator::Not))),
            ("quote", success(sym("quote"))),
            // ===== LISTS =====
            ("()", success(nil())),
            ("[]", success(nil())),
            ("{}", success(nil())),
            ("(+ 1 2)", success(vec![op(Operator::Add), val(1), val(2)])),
            ("(plus 1 2)", success(vec![sym("plus"), val(1), val(2)])),
            ("[+ 1 2]", success(vec![op(Operator::Add), val(1), val(2)])),
            ("{+ 1 2}", success(vec![op(Operator::Add), val(1), val(2)])),
            ("( 1\t2\n3 )", success([1, 2, 3])),
            ("((1) [2] {3})", success([val([1]), val([2]), val([3])])),
            ("(1 ; one\n 2)", success([1, 2])),
            ("(#; (1 2) 3)", success([3])),
            ("(1 #;2)", success([1])),
            // ===== QUOTE, SCOPE, GROUP =====
            ("'x", success(tagged(Operator::Quote, [sym("x")]))),
            ("' x", success(tagged(Operator::Quote, [sym("x")]))),
            (
                "'(1 2)",
                success(tagged(Operator::Quote, [val([1, 2])])),
            ),
            ("~sig", success(tagged(Operator::Scoped, [sym("sig")]))),
            ("#grp", success(tagged(Operator::ResolveGroup, [sym("grp")]))),
            // ===== TIMING =====
            ("sig@3", success(tagged(Operator::RelEval, [sym("sig"), val(3)]))),
            ("sig@-1", success(tagged(Operator::RelEval, [sym("sig"), val(-1)]))),
            (
                "sig@(+ t 1)",
                success(tagged(
                    Operator::RelEval,
                    [sym("sig"), val(vec![op(Operator::Add), sym("t"), val(1)])],
                )),
            ),
            (
                "sig@<1 2 3>",
                success(group([
                    tagged(Operator::RelEval, [sym("sig"), val(1)]),
                    tagged(Operator::RelEval, [sym("sig"), val(2)]),
                    tagged(Operator::RelEval, [sym("sig"), val(3)]),
                ])),
            ),
            (
                "sig@<-1 0>",
                success(group([
                    tagged(Operator::RelEval, [sym("sig"), val(-1)]),
                    tagged(Operator::RelEval, [sym("sig"), val(0)]),
                ])),
            ),
            ("sig@<>", Failure(UnexpectedToken)),
            ("sig@< >", Failure(UnexpectedToken)),
            ("(f sig@<> 1)", Failure(UnexpectedToken)),
            ("x@<1 2>@3", Failure(UnexpectedToken)),
            ("sig@<1 2>[0]", Failure(UnexpectedToken)),
            ("a[b@<1 2>]", Failure(UnexpectedToken)),
            ("'x@<1 2>", Failure(UnexpectedToken)),
            ("sig@<1 2", Failure(UnexpectedEof)),
            ("sig@<1 x>", Failure(UnexpectedToken)),
            (
                "'sig@1",
                success(tagged(
                    Operator::Quote,
                    [tagged(Operator::RelEval, [sym("sig"), val(1)])],
                )),
            ),
            // ===== SLICING =====
            ("sig[3]", success(tagged(Operator::Slice, [sym("sig"), val(3)]))),
            (
                "sig[3:0]",
                success(tagged(Operator::Slice, [sym("sig"), val(3), val(0)])),
            ),
            (
                "sig[ (- w 1) : 0 ]",
                success(tagged(
                    Operator::Slice,
                    [
                        sym("sig"),
                        val(vec![op(Operator::Sub), sym("w"), val(1)]),
                        val(0),
                    ],
                )),
            ),
            (
                "sig[\"x\"]",
                success(tagged(Operator::Slice, [sym("sig"), val("x")])),
            ),
            (
                "sig@1[0]",
                success(tagged(
                    Operator::Slice,
                    [tagged(Operator::RelEval, [sym("sig"), val(1)]), val(0)],
                )),
            ),
            (
                "~sig[7:4]",
                success(tagged(
                    Operator::Slice,
                    [tagged(Operator::Scoped, [sym("sig")]), val(7), val(4)],
                )),
            ),
            ("sig[3", Failure(UnexpectedEof)),
            ("sig[3 4]", Failure(UnexpectedToken)),
            // ===== ATMOSPHERE =====
            ("  42  ", success(42)),
            ("; leading comment\nfoo", success(sym("foo"))),
            ("foo ; trailing comment", success(sym("foo"))),
            ("#; ignored kept", success(sym("kept"))),
            ("#; #; a b c", success(sym("c"))),
            ("(#; #; a b c)", success([sym("c")])),
            // ===== ERRORS =====
            ("(1 2", Failure(UnexpectedEof)),
            ("((1 2)", Failure(UnexpectedEof)),
            ("", Failure(UnexpectedEof)),
            ("   ", Failure(UnexpectedEof)),
            ("; only a comment", Failure(UnexpectedEof)),
            ("'", Failure(UnexpectedEof)),
            (")", Failure(UnexpectedToken)),
            ("(1 2))", Failure(UnexpectedToken)),
            ("(1]", Failure(UnexpectedToken)),
            ("(a(b))", Failure(UnexpectedToken)),
            ("1 2", Failure(UnexpectedToken)),
            ("%", Failure(UnexpectedCharacter)),
            ("(1 & 2)", Failure(UnexpectedCharacter)),
            ("~1", Failure(UnexpectedToken)),
            ("#!x", Failure(UnexpectedToken)),
        ];

        run_read_tests(test_cases);
    }

    #[test]
    fn test_read_sexprs() {
        let forms = read_sexprs(
            "#!/usr/bin/env wal\n; header comment\n(define x 1)\n\n  sig@<0 1> ; trailing\n#;(skipped)\n'y\n",
        )
        .unwrap();
        assert_eq!(
            forms,
            vec![
                val(vec![sym("define"), sym("x"), val(1)]),
                group([
                    tagged(Operator::RelEval, [sym("sig"), val(0)]),
                    tagged(Operator::RelEval, [sym("sig"), val(1)]),
                ]),
                tagged(Operator::Quote, [sym("y")]),
            ]
        );

        assert!(read_sexprs("").unwrap().is_empty());
        assert!(read_sexprs(" \n\t\n").unwrap().is_empty());
        assert!(read_sexprs("; nothing here\n").unwrap().is_empty());
        assert_eq!(read_sexprs("1 2 3").unwrap(), vec![val(1), val(2), val(3)]);

        let err = read_sexprs("(ok)\n(broken").unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::UnexpectedEof);
        assert_eq!((err.line, err.column), (2, 8));

        // The directive is only recognized on the first line
        let err = read_sexprs("x\n#!late").unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_error_messages() {
        let err = read_sexpr("(1 2").unwrap_err();
        assert_eq!(
            err.message,
            "Unexpected end of input at line 1:5.\nDid you forget a closing )?"
        );
        assert_eq!(err.context, "(1 2\n    ^");
        assert_eq!(err.found, None);

        let err = read_sexpr("sig[(a b]").unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::UnexpectedToken);
        assert_eq!(err.message, "Unexpected \"]\" at line 1:9");

        for source in ["~", "'", "", "sig@"] {
            let err = read_sexpr(source).unwrap_err();
            assert_eq!(err.kind, ReadErrorKind::UnexpectedEof, "{source:?}");
            assert!(!err.message.contains("closing"), "{source:?}: {}", err.message);
        }
        let err = read_sexpr("~").unwrap_err();
        assert_eq!(err.message, "Unexpected end of input at line 1:2.");

        let err = read_sexpr("(f '").unwrap_err();
        assert!(err.message.ends_with("Did you forget a closing )?"), "{}", err.message);

        let err = read_sexpr("sig@<1 2>[0]").unwrap_err();
        assert_eq!(err.message, "Unexpected \"[\" at line 1:10");
        let err = read_sexpr("a[b@<1 2>]").unwrap_err();
        assert_eq!(err.message, "Unexpected \"@\" at line 1:4");
        let err = read_sexpr("sig@<>").unwrap_err();
        assert_eq!(err.message, "Unexpected \">\" at line 1:6");

        let err = read_sexpr("[1 2").unwrap_err();
        assert!(err.message.ends_with("Did you forget a closing ]?"), "{}", err.message);

        let err = read_sexpr("(a\n  b\n  %)").unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::UnexpectedCharacter);
        assert_eq!((err.line, err.column), (3, 3));
        assert_eq!(err.message, "Unexpected \"%\" at line 3:3");
        assert_eq!(err.context, "  %)\n  ^");
        assert_eq!(err.found.as_deref(), Some("%"));

        let err = read_sexpr("(f x))").unwrap_err();
        assert_eq!(err.to_string(), "(f x))\n     ^\nUnexpected \")\" at line 1:6");

        let err = read_sexpr("0x10000000000000000").unwrap_err();
        assert_eq!(err.found.as_deref(), Some("0x10000000000000000"));
        assert_eq!((err.line, err.column), (1, 1));
    }

    #[test]
    fn test_context_window_clipping() {
        let long = format!("({} %)", "a ".repeat(60));
        let err = read_sexpr(&long).unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::UnexpectedCharacter);
        let (shown, caret) = err.context.split_once('\n').unwrap();
        assert!(shown.starts_with("[...]"));
        assert_eq!(shown[caret.len() - 1..].chars().next(), Some('%'));
    }

    #[test]
    fn test_depth_limits() {
        let config = ReadConfig { max_depth: 8 };
        let nested = |n: usize| format!("{}x{}", "(".repeat(n), ")".repeat(n));

        assert!(read_sexpr_with_config(&nested(8), config).is_ok());
        let err = read_sexpr_with_config(&nested(9), config).unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::TooDeeplyNested);

        let quotes = format!("{}x", "'".repeat(9));
        let err = read_sexpr_with_config(&quotes, config).unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::TooDeeplyNested);

        let err = read_sexprs_with_config(&nested(20), config).unwrap_err();
        assert_eq!(err.kind, ReadErrorKind::TooDeeplyNested);

        assert!(read_sexpr(&nested(MAX_PARSE_DEPTH)).is_ok());
    }

    #[test]
    fn test_locate() {
        let source = "ab\ncdé\nf";
        assert_eq!(locate(source, 0), (1, 1));
        assert_eq!(locate(source, 2), (1, 3));
        assert_eq!(locate(source, 3), (2, 1));
        assert_eq!(locate(source, source.len()), (3, 2));
    }
}
