use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::{char, digit1, satisfy},
    combinator::{not, value},
    error::{ErrorKind, ParseError as NomParseError},
    multi::many0_count,
    sequence::{delimited, terminated},
};

use crate::ast::{Literal, Node, is_word_char};
use crate::stack::ensure_sufficient_stack;
use crate::{Error, MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// Parser options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseConfig {
    /// Treat `#` up to the end of the line as whitespace
    pub handle_comments: bool,
}

/// What the parser was looking for when it gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Expected {
    Expression,
    ArgumentSeparator,
    ElementSeparator,
    Shallower,
    Token(ErrorKind),
}

/// nom error type carrying the remaining input at the failure point
#[derive(Debug, PartialEq)]
struct SyntaxFault<'a> {
    input: &'a str,
    expected: Expected,
}

impl<'a> NomParseError<&'a str> for SyntaxFault<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        SyntaxFault {
            input,
            expected: Expected::Token(kind),
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl SyntaxFault<'_> {
    /// Convert to a user-facing error; `source` is the full text handed to [`parse`]
    fn into_parse_error(self, source: &str) -> ParseError {
        const MAX_SNIPPET: usize = 30;

        let offset = source.len().saturating_sub(self.input.len());
        let at_end = self.input.is_empty();
        let (kind, message) = match self.expected {
            Expected::Shallower => (
                ParseErrorKind::TooDeeplyNested,
                format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
            ),
            Expected::Expression if at_end => {
                (ParseErrorKind::Incomplete, "Unexpected end of input".into())
            }
            Expected::Expression => {
                let mut snippet: String = self.input.chars().take(MAX_SNIPPET).collect();
                if snippet.len() < self.input.len() {
                    snippet.push_str("...");
                }
                (
                    ParseErrorKind::InvalidSyntax,
                    format!("Unexpected syntax: {snippet}"),
                )
            }
            Expected::ArgumentSeparator => (separator_kind(at_end), "Expected ',' or ')'".into()),
            Expected::ElementSeparator => (separator_kind(at_end), "Expected ',' or ']'".into()),
            Expected::Token(_) => (separator_kind(at_end), "Invalid syntax".into()),
        };
        ParseError::with_context(kind, message, source, offset)
    }
}

fn separator_kind(at_end: bool) -> ParseErrorKind {
    if at_end {
        ParseErrorKind::Incomplete
    } else {
        ParseErrorKind::InvalidSyntax
    }
}

type PResult<'a, O> = IResult<&'a str, O, SyntaxFault<'a>>;

/// Abort with a committed error; no other rule is tried after this
fn fail<O>(input: &str, expected: Expected) -> PResult<'_, O> {
    Err(nom::Err::Failure(SyntaxFault { input, expected }))
}

fn symbol<'a>(c: char) -> impl Parser<&'a str, Output = char, Error = SyntaxFault<'a>> {
    char(c)
}

/// Skip whitespace, and `#` comments when enabled
fn skip_space(input: &str, config: ParseConfig) -> PResult<'_, ()> {
    if config.handle_comments {
        value(
            (),
            many0_count(alt((
                value((), take_while1(|c: char| c.is_whitespace())),
                value((), (symbol('#'), take_till(|c: char| c == '\n'))),
            ))),
        )
        .parse(input)
    } else {
        value((), take_while(|c: char| c.is_whitespace())).parse(input)
    }
}

/// Parse a string literal. There are no escapes; anything but `"` is content.
fn parse_string(input: &str) -> PResult<'_, Node> {
    let (input, content) =
        delimited(symbol('"'), take_till(|c: char| c == '"'), symbol('"')).parse(input)?;
    Ok((input, Node::Value(Literal::String(content.into()))))
}

/// Parse a decimal integer. The digits must end at a word boundary, so `12abc` is
/// left for the word rule.
fn parse_number(input: &str) -> PResult<'_, Node> {
    let digits: PResult<'_, &str> = terminated(
        digit1,
        not(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_')),
    )
    .parse(input);
    let (remaining, digits) = digits?;

    match digits.parse::<f64>() {
        Ok(n) => Ok((remaining, Node::Value(Literal::Number(n)))),
        Err(_) => Err(nom::Err::Error(SyntaxFault::from_error_kind(
            input,
            ErrorKind::Digit,
        ))),
    }
}

/// Parse a word (identifier)
fn parse_word(input: &str) -> PResult<'_, Node> {
    let name: PResult<'_, &str> = take_while1(is_word_char).parse(input);
    let (input, name) = name?;
    Ok((input, Node::Word(name.into())))
}

/// Parse comma-separated expressions up to `close`. The opening bracket has
/// already been consumed.
fn parse_sequence(
    mut input: &str,
    close: char,
    separator: Expected,
    config: ParseConfig,
    depth: usize,
) -> PResult<'_, Vec<Node>> {
    let mut elements = Vec::new();
    loop {
        let (rest, ()) = skip_space(input, config)?;
        if let Some(rest) = rest.strip_prefix(close) {
            return Ok((rest, elements));
        }

        let (rest, element) = parse_expression(rest, config, depth + 1)?;
        elements.push(element);

        let (rest, ()) = skip_space(rest, config)?;
        match rest.chars().next() {
            Some(',') => input = &rest[1..],
            Some(c) if c == close => input = rest,
            _ => return fail(rest, separator),
        }
    }
}

/// Parse an array literal
fn parse_array(input: &str, config: ParseConfig, depth: usize) -> PResult<'_, Node> {
    let (input, _) = symbol('[').parse(input)?;
    let (input, elements) =
        parse_sequence(input, ']', Expected::ElementSeparator, config, depth)?;
    Ok((input, Node::Array(elements)))
}

/// Wrap `expr` in applications for each parenthesized argument list that follows it,
/// so `f(x)(y)` nests. Array literals are never called.
fn parse_apply(
    mut expr: Node,
    mut input: &str,
    config: ParseConfig,
    depth: usize,
) -> PResult<'_, Node> {
    if matches!(expr, Node::Array(_)) {
        return Ok((input, expr));
    }
    loop {
        let (rest, ()) = skip_space(input, config)?;
        let Some(rest) = rest.strip_prefix('(') else {
            return Ok((rest, expr));
        };
        let (rest, args) = parse_sequence(rest, ')', Expected::ArgumentSeparator, config, depth)?;
        expr = Node::Apply {
            operator: Box::new(expr),
            args,
        };
        input = rest;
    }
}

/// Parse one expression; rules are tried in a fixed order: array, string, number, word
fn parse_expression(input: &str, config: ParseConfig, depth: usize) -> PResult<'_, Node> {
    if depth >= MAX_PARSE_DEPTH {
        return fail(input, Expected::Shallower);
    }
    ensure_sufficient_stack(|| {
        let (input, ()) = skip_space(input, config)?;
        let (rest, expr) = match alt((
            |input| parse_array(input, config, depth),
            parse_string,
            parse_number,
            parse_word,
        ))
        .parse(input)
        {
            Ok(parsed) => parsed,
            Err(nom::Err::Error(_)) => return fail(input, Expected::Expression),
            Err(other) => return Err(other),
        };
        parse_apply(expr, rest, config, depth)
    })
}

/// Parse a complete program: exactly one expression, optionally surrounded by whitespace.
pub fn parse(input: &str) -> Result<Node, Error> {
    parse_with_config(input, ParseConfig::default())
}

/// Parse a complete program with explicit options.
pub fn parse_with_config(input: &str, config: ParseConfig) -> Result<Node, Error> {
    let parsed = parse_expression(input, config, 0)
        .and_then(|(rest, node)| skip_space(rest, config).map(|(rest, ())| (rest, node)));

    match parsed {
        Ok(("", node)) => Ok(node),
        Ok((remaining, _)) => Err(ParseError::with_context(
            ParseErrorKind::TrailingContent,
            "Unexpected text after program",
            input,
            input.len() - remaining.len(),
        )
        .into()),
        Err(nom::Err::Error(fault) | nom::Err::Failure(fault)) => {
            Err(fault.into_parse_error(input).into())
        }
        Err(nom::Err::Incomplete(_)) => Err(ParseError::with_context(
            ParseErrorKind::Incomplete,
            "Incomplete input",
            input,
            input.len(),
        )
        .into()),
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{apply, array, val, word};

    /// Test result variants for data-driven parse tests
    #[derive(Debug)]
    enum ParseTestResult {
        Success(Node),                    // Parsing should succeed with this tree
        SpecificError(&'static str),      // Parsing should fail with error containing this string
        ErrorOfKind(ParseErrorKind),      // Parsing should fail with this kind
        AnyError,                         // Parsing should fail (any error)
    }
    use ParseTestResult::*;

    fn success(node: Node) -> ParseTestResult {
        Success(node)
    }

    fn run_parse_tests(test_cases: Vec<(&str, ParseTestResult)>) {
        for (i, (input, expected)) in test_cases.iter().enumerate() {
            let test_id = format!("Parse test #{} ({input:?})", i + 1);
            match (parse(input), expected) {
                (Ok(actual), Success(expected_node)) => {
                    assert_eq!(actual, *expected_node, "{test_id}: tree mismatch");
                }
                (Err(_), AnyError) => {}
                (Err(err), SpecificError(text)) => {
                    let message = format!("{err}");
                    assert!(
                        message.contains(text),
                        "{test_id}: error should contain '{text}', got: {message}"
                    );
                }
                (Err(Error::ParseError(err)), ErrorOfKind(kind)) => {
                    assert_eq!(err.kind, *kind, "{test_id}: error kind mismatch");
                }
                (Err(err), ErrorOfKind(_)) => {
                    panic!("{test_id}: expected a parse error, got {err:?}");
                }
                (Ok(actual), _) => panic!("{test_id}: expected error, got {actual:?}"),
                (Err(err), Success(_)) => panic!("{test_id}: expected success, got error {err:?}"),
            }
        }
    }

    #[test]
    fn test_parser_comprehensive() {
        let test_cases = vec![
            // ===== LITERALS =====
            ("12", success(val(12))),
            ("0", success(val(0))),
            ("007", success(val(7))),
            ("\"ab\"", success(val("ab"))),
            ("\"\"", success(val(""))),
            ("\"a (b), [c] # d\"", success(val("a (b), [c] # d"))),
            ("\"back\\slash\"", success(val("back\\slash"))),
            ("\"unterminated", SpecificError("Unexpected syntax")),
            // ===== WORDS =====
            ("x", success(word("x"))),
            ("+", success(word("+"))),
            ("==", success(word("=="))),
            ("a.b-c?", success(word("a.b-c?"))),
            ("true", success(word("true"))),
            // Digits followed by word characters are not a number, so the word rule takes them
            ("12abc", success(word("12abc"))),
            ("1_000", success(word("1_000"))),
            // Digits followed by a non-word character end the number
            ("12+", ErrorOfKind(ParseErrorKind::TrailingContent)),
            ("3.14", ErrorOfKind(ParseErrorKind::TrailingContent)),
            // ===== APPLICATION =====
            ("f()", success(apply(word("f"), []))),
            ("f(x)", success(apply(word("f"), [word("x")]))),
            (
                "+(1, 2)",
                success(apply(word("+"), [val(1), val(2)])),
            ),
            (
                "f(x)(y)",
                success(apply(apply(word("f"), [word("x")]), [word("y")])),
            ),
            (
                "f(1)(2)(3)",
                success(apply(
                    apply(apply(word("f"), [val(1)]), [val(2)]),
                    [val(3)],
                )),
            ),
            (
                "if(true, \"yes\", g(1))",
                success(apply(
                    word("if"),
                    [word("true"), val("yes"), apply(word("g"), [val(1)])],
                )),
            ),
            // Literals can be applied syntactically; the evaluator rejects the call
            ("1(2)", success(apply(val(1), [val(2)]))),
            // Trailing comma before the closer is accepted
            ("f(1,)", success(apply(word("f"), [val(1)]))),
            ("f(1 2)", SpecificError("Expected ',' or ')'")),
            ("f(1", ErrorOfKind(ParseErrorKind::Incomplete)),
            ("f(1,", ErrorOfKind(ParseErrorKind::Incomplete)),
            ("f(,)", SpecificError("Unexpected syntax: ,)")),
            ("f(1]", SpecificError("Expected ',' or ')'")),
            // ===== ARRAYS =====
            ("[]", success(array([]))),
            ("[1]", success(array([val(1)]))),
            (
                "[1, \"two\", x, [3]]",
                success(array([val(1), val("two"), word("x"), array([val(3)])])),
            ),
            (
                "[f(1), 2]",
                success(array([apply(word("f"), [val(1)]), val(2)])),
            ),
            ("push(a, [1])", success(apply(word("push"), [word("a"), array([val(1)])]))),
            // An array literal is never followed by a call
            ("[1](2)", ErrorOfKind(ParseErrorKind::TrailingContent)),
            ("[1 2]", SpecificError("Expected ',' or ']'")),
            ("[1)", SpecificError("Expected ',' or ']'")),
            ("[1, 2", ErrorOfKind(ParseErrorKind::Incomplete)),
            // ===== WHITESPACE =====
            ("  x  ", success(word("x"))),
            (
                "\n\tf ( 1 ,\n 2 ) ",
                success(apply(word("f"), [val(1), val(2)])),
            ),
            ("[ 1 , 2 ]", success(array([val(1), val(2)]))),
            ("f (x) (y)", success(apply(apply(word("f"), [word("x")]), [word("y")]))),
            // ===== ERRORS =====
            ("", ErrorOfKind(ParseErrorKind::Incomplete)),
            ("   ", ErrorOfKind(ParseErrorKind::Incomplete)),
            (")", SpecificError("Unexpected syntax: )")),
            (",", ErrorOfKind(ParseErrorKind::InvalidSyntax)),
            ("# comment", ErrorOfKind(ParseErrorKind::InvalidSyntax)),
            ("x y", SpecificError("Unexpected text after program")),
            ("f(x) g(y)", ErrorOfKind(ParseErrorKind::TrailingContent)),
            ("f(x))", AnyError),
        ];

        run_parse_tests(test_cases);
    }

    #[test]
    fn test_parse_error_context() {
        let Err(Error::ParseError(err)) = parse("do(1, 2 3)") else {
            panic!("expected a parse error");
        };
        assert_eq!(err.kind, ParseErrorKind::InvalidSyntax);
        assert_eq!(err.found.as_deref(), Some("3"));
        assert_eq!(err.context.as_deref(), Some("do(1, 2 3)"));

        let Err(Error::ParseError(err)) = parse("f(\n1\n2)") else {
            panic!("expected a parse error");
        };
        assert_eq!(err.context.as_deref(), Some("f(\\n1\\n2)"));
    }

    #[test]
    fn test_comments_when_enabled() {
        let config = ParseConfig {
            handle_comments: true,
        };
        let program = "# leading comment\ndo(1, # one\n   2) # trailing";
        assert_eq!(
            parse_with_config(program, config).unwrap(),
            apply(word("do"), [val(1), val(2)])
        );
        // `#` is never part of a word, comments or not
        assert!(parse("do(1, # one\n 2)").is_err());
        assert!(parse_with_config("a#b", config).is_ok());
        assert!(parse_with_config("#only a comment", config).is_err());
    }

    #[test]
    fn test_parse_is_idempotent() {
        let program = "do(def(f, fun(x, [x, \"s\", g(x)(1)])), f(2))";
        assert_eq!(parse(program).unwrap(), parse(program).unwrap());
        // Rendering and reparsing yields the same tree
        let rendered = parse(program).unwrap().to_string();
        assert_eq!(parse(&rendered).unwrap(), parse(program).unwrap());
    }

    #[test]
    fn test_parser_depth_limits() {
        let under_limit = format!(
            "{}1{}",
            "[".repeat(MAX_PARSE_DEPTH - 1),
            "]".repeat(MAX_PARSE_DEPTH - 1)
        );
        let at_limit = format!(
            "{}1{}",
            "f(".repeat(MAX_PARSE_DEPTH),
            ")".repeat(MAX_PARSE_DEPTH)
        );

        assert!(parse(&under_limit).is_ok());
        match parse(&at_limit) {
            Err(Error::ParseError(err)) => {
                assert_eq!(err.kind, ParseErrorKind::TooDeeplyNested);
            }
            other => panic!("expected depth error, got {other:?}"),
        }
    }
}
