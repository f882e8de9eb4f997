//! Handler language parser using chumsky.
//!
//! Comments are blanked out before parsing (see [`strip_comments`]), so the
//! grammar itself only deals with whitespace. Semicolons are optional
//! everywhere a statement ends.
//!
//! Precedence, loosest first: `?:`, `||`, `&&`, equality, relational,
//! additive, multiplicative, unary, postfix (member, index, call).

use chumsky::extra;
use chumsky::prelude::*;
use serde_json::Value;

use crate::ast::{AssignOp, BinaryOp, DeclKind, Expr, FunctionLit, Stmt, UnaryOp};
use crate::error::{ParseError, ParseResult};

/// Extra type for parsers - uses Rich errors for better messages
pub type Extra<'src> = extra::Err<Rich<'src, char>>;

const RESERVED: &[&str] = &[
    "let", "const", "var", "if", "else", "return", "true", "false", "null", "undefined",
    "function",
];

// ============================================================================
// Lexical pieces
// ============================================================================

fn raw_ident<'src>() -> impl Parser<'src, &'src str, &'src str, Extra<'src>> + Clone {
    any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_' || *c == '$')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_' || *c == '$')
                .repeated(),
        )
        .to_slice()
}

/// Identifier that is not a reserved word
fn ident<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    raw_ident()
        .try_map(|s: &str, span| {
            if RESERVED.contains(&s) {
                Err(Rich::custom(span, format!("'{}' is a reserved word", s)))
            } else {
                Ok(s.to_string())
            }
        })
        .labelled("identifier")
}

/// Exact keyword; `letter` does not match `let`
fn kw<'src>(keyword: &'static str) -> impl Parser<'src, &'src str, (), Extra<'src>> + Clone {
    raw_ident()
        .try_map(move |s: &str, span| {
            if s == keyword {
                Ok(())
            } else {
                Err(Rich::custom(span, format!("expected keyword '{}'", keyword)))
            }
        })
        .padded()
}

fn string_literal<'src>() -> impl Parser<'src, &'src str, String, Extra<'src>> + Clone {
    let escape = just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('0').to('\0'),
        just('\\'),
        just('\''),
        just('"'),
        just('/'),
    )));

    let double = just('"')
        .ignore_then(
            none_of("\\\"")
                .or(escape.clone())
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just('"'));

    let single = just('\'')
        .ignore_then(none_of("\\'").or(escape).repeated().collect::<String>())
        .then_ignore(just('\''));

    double.or(single).labelled("string literal")
}

fn number_literal<'src>() -> impl Parser<'src, &'src str, Value, Extra<'src>> + Clone {
    let digits = any().filter(|c: &char| c.is_ascii_digit()).repeated().at_least(1);
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(digits.clone());

    digits
        .clone()
        .then(just('.').then(digits.clone()).or_not())
        .then(exponent.or_not())
        .to_slice()
        .try_map(|s: &str, span| {
            s.parse::<f64>()
                .map(loom_core::coerce::number)
                .map_err(|_| Rich::custom(span, "invalid number literal"))
        })
        .labelled("number")
}

// ============================================================================
// Expressions
// ============================================================================

enum Postfix {
    Member(String),
    Index(Expr),
    Call(Vec<Expr>),
}

/// One left-associative precedence level
fn binary_level<'src, P, O>(
    operand: P,
    op: O,
) -> impl Parser<'src, &'src str, Expr, Extra<'src>> + Clone
where
    P: Parser<'src, &'src str, Expr, Extra<'src>> + Clone,
    O: Parser<'src, &'src str, BinaryOp, Extra<'src>> + Clone,
{
    operand
        .clone()
        .foldl(op.padded().then(operand).repeated(), |lhs, (op, rhs)| {
            Expr::Binary(op, Box::new(lhs), Box::new(rhs))
        })
}

pub fn expression<'src>() -> impl Parser<'src, &'src str, Expr, Extra<'src>> + Clone {
    recursive(|expr| {
        let literal = choice((
            kw("true").to(Expr::Literal(Value::Bool(true))),
            kw("false").to(Expr::Literal(Value::Bool(false))),
            kw("null").to(Expr::Literal(Value::Null)),
            kw("undefined").to(Expr::Literal(Value::Null)),
            number_literal().map(Expr::Literal),
            string_literal().map(|s| Expr::Literal(Value::String(s))),
        ));

        let items = expr
            .clone()
            .separated_by(just(',').padded())
            .allow_trailing()
            .collect::<Vec<_>>();

        let array = items
            .clone()
            .delimited_by(just('[').padded(), just(']').padded())
            .map(Expr::Array);

        let key = raw_ident()
            .map(|s: &str| s.to_string())
            .or(string_literal())
            .padded();
        let object = key
            .then_ignore(just(':').padded())
            .then(expr.clone())
            .separated_by(just(',').padded())
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just('{').padded(), just('}').padded())
            .map(Expr::Object);

        let paren = expr
            .clone()
            .delimited_by(just('(').padded(), just(')').padded());

        let atom = choice((literal, array, object, paren, ident().map(Expr::Var)))
            .padded()
            .boxed();

        let postfix = choice((
            just('.')
                .padded()
                .ignore_then(raw_ident().map(|s: &str| s.to_string()))
                .map(Postfix::Member),
            expr.clone()
                .delimited_by(just('[').padded(), just(']').padded())
                .map(Postfix::Index),
            items
                .delimited_by(just('(').padded(), just(')').padded())
                .map(Postfix::Call),
        ));

        let call = atom
            .foldl(postfix.padded().repeated(), |base, op| match op {
                Postfix::Member(name) => Expr::Member(Box::new(base), name),
                Postfix::Index(index) => Expr::Index(Box::new(base), Box::new(index)),
                Postfix::Call(args) => Expr::Call(Box::new(base), args),
            })
            .boxed();

        let unary = choice((just('!').to(UnaryOp::Not), just('-').to(UnaryOp::Neg)))
            .padded()
            .repeated()
            .foldr(call, |op, rhs| Expr::Unary(op, Box::new(rhs)))
            .boxed();

        let product = binary_level(
            unary,
            choice((
                just('*').to(BinaryOp::Mul),
                just('/').to(BinaryOp::Div),
                just('%').to(BinaryOp::Rem),
            )),
        )
        .boxed();

        let sum = binary_level(
            product,
            choice((
                just('+').then_ignore(just('=').not()).to(BinaryOp::Add),
                just('-').then_ignore(just('=').not()).to(BinaryOp::Sub),
            )),
        )
        .boxed();

        let relational = binary_level(
            sum,
            choice((
                just("<=").to(BinaryOp::Le),
                just(">=").to(BinaryOp::Ge),
                just('<').to(BinaryOp::Lt),
                just('>').to(BinaryOp::Gt),
            )),
        )
        .boxed();

        let equality = binary_level(
            relational,
            choice((
                just("===").to(BinaryOp::StrictEq),
                just("!==").to(BinaryOp::StrictNe),
                just("==").to(BinaryOp::Eq),
                just("!=").to(BinaryOp::Ne),
            )),
        )
        .boxed();

        let and = binary_level(equality, just("&&").to(BinaryOp::And)).boxed();
        let or = binary_level(and, just("||").to(BinaryOp::Or)).boxed();

        or.then(
            just('?')
                .padded()
                .ignore_then(expr.clone())
                .then_ignore(just(':').padded())
                .then(expr)
                .or_not(),
        )
        .map(|(cond, branches)| match branches {
            Some((then, otherwise)) => {
                Expr::Conditional(Box::new(cond), Box::new(then), Box::new(otherwise))
            }
            None => cond,
        })
    })
}

// ============================================================================
// Statements
// ============================================================================

pub fn statement<'src>() -> impl Parser<'src, &'src str, Stmt, Extra<'src>> + Clone {
    let expr = expression();

    recursive(move |stmt| {
        let semi = just(';').padded().or_not().ignored();

        let block = stmt
            .clone()
            .repeated()
            .collect::<Vec<_>>()
            .delimited_by(just('{').padded(), just('}').padded())
            .map(Stmt::Block);

        let decl = choice((
            kw("let").to(DeclKind::Let),
            kw("const").to(DeclKind::Const),
            kw("var").to(DeclKind::Var),
        ))
        .then(ident().padded())
        .then(just('=').padded().ignore_then(expr.clone()).or_not())
        .then_ignore(semi.clone())
        .map(|((kind, name), init)| Stmt::Decl(kind, name, init));

        let if_stmt = kw("if")
            .ignore_then(
                expr.clone()
                    .delimited_by(just('(').padded(), just(')').padded()),
            )
            .then(stmt.clone())
            .then(kw("else").ignore_then(stmt.clone()).or_not())
            .map(|((cond, then), otherwise)| {
                Stmt::If(cond, Box::new(then), otherwise.map(Box::new))
            });

        let ret = kw("return")
            .ignore_then(expr.clone().or_not())
            .then_ignore(semi.clone())
            .map(Stmt::Return);

        let assign_op = choice((
            just("+=").to(AssignOp::Add),
            just("-=").to(AssignOp::Sub),
            just('=')
                .then_ignore(one_of("=>").not())
                .to(AssignOp::Set),
        ))
        .padded();

        let assign = expr
            .clone()
            .try_map(|target: Expr, span| {
                if target.is_place() {
                    Ok(target)
                } else {
                    Err(Rich::custom(span, "invalid assignment target"))
                }
            })
            .then(assign_op)
            .then(expr.clone())
            .then_ignore(semi.clone())
            .map(|((target, op), value)| Stmt::Assign(target, op, value));

        let expr_stmt = expr.clone().then_ignore(semi).map(Stmt::Expr);

        let empty = just(';').padded().to(Stmt::Empty);

        choice((block, decl, if_stmt, ret, assign, expr_stmt, empty)).padded()
    })
}

fn program<'src>() -> impl Parser<'src, &'src str, Vec<Stmt>, Extra<'src>> {
    statement()
        .repeated()
        .collect::<Vec<_>>()
        .padded()
        .then_ignore(end())
}

/// `function name?(a, b) { ... }`, `(a, b) => { ... }`, `a => expr`
fn function_literal<'src>() -> impl Parser<'src, &'src str, FunctionLit, Extra<'src>> + Clone {
    let body = statement()
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just('{').padded(), just('}').padded());

    let params = ident()
        .padded()
        .separated_by(just(','))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just('(').padded(), just(')').padded());

    let function = kw("function")
        .ignore_then(ident().padded().or_not())
        .ignore_then(params.clone())
        .then(body.clone())
        .map(|(params, body)| FunctionLit { params, body });

    let arrow_params = params.or(ident().padded().map(|p| vec![p]));
    let arrow_body = body.or(expression().map(|e| vec![Stmt::Return(Some(e))]));
    let arrow = arrow_params
        .then_ignore(just("=>").padded())
        .then(arrow_body)
        .map(|(params, body)| FunctionLit { params, body });

    choice((function, arrow))
        .padded()
        .then_ignore(just(';').padded().or_not())
}

// ============================================================================
// Entry points
// ============================================================================

/// Blank out `//` and `/* */` comments outside string literals
///
/// Replaced characters become spaces (newlines are kept) so error positions
/// still point into the original text.
pub fn strip_comments(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = next {
                    out.push(escaped);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match (c, next) {
            ('"' | '\'', _) => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            ('/', Some('/')) => {
                while i < chars.len() && chars[i] != '\n' {
                    out.push(' ');
                    i += 1;
                }
            }
            ('/', Some('*')) => {
                out.push_str("  ");
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                    i += 1;
                }
                if i < chars.len() {
                    out.push_str("  ");
                    i += 2;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Format chumsky errors with line and column
pub fn format_errors(errs: &[Rich<'_, char>], input: &str) -> String {
    errs.iter()
        .map(|e| {
            let span = e.span();
            let start = span.start.min(input.len());
            let line = input[..start].matches('\n').count() + 1;
            let col = start - input[..start].rfind('\n').map_or(0, |i| i + 1);

            let found = e
                .found()
                .map_or("end of input".to_string(), |c| format!("'{}'", c));

            format!("Line {}, column {}: {} (found {})", line, col + 1, e.reason(), found)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn run<'src, T>(
    parser: impl Parser<'src, &'src str, T, Extra<'src>>,
    cleaned: &'src str,
) -> ParseResult<T> {
    parser
        .parse(cleaned)
        .into_result()
        .map_err(|errs| ParseError::Syntax {
            errors: format_errors(&errs, cleaned),
        })
}

/// Parse a statement list
pub fn parse_program(src: &str) -> ParseResult<Vec<Stmt>> {
    let cleaned = strip_comments(src);
    run(program(), &cleaned)
}

/// Parse a single function literal
pub fn parse_function(src: &str) -> ParseResult<FunctionLit> {
    let cleaned = strip_comments(src);
    run(function_literal().then_ignore(end()), &cleaned)
}

/// Parse `return <function literal>`
pub fn parse_wrapped(src: &str) -> ParseResult<FunctionLit> {
    let cleaned = strip_comments(src);
    run(
        kw("return")
            .ignore_then(function_literal())
            .padded()
            .then_ignore(end()),
        &cleaned,
    )
}

/// Parse a lone expression
pub fn parse_expression(src: &str) -> ParseResult<Expr> {
    let cleaned = strip_comments(src);
    run(expression().padded().then_ignore(end()), &cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn lit(value: Value) -> Expr {
        Expr::Literal(value)
    }

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                Box::new(lit(json!(1))),
                Box::new(Expr::Binary(
                    BinaryOp::Mul,
                    Box::new(lit(json!(2))),
                    Box::new(lit(json!(3)))
                ))
            )
        );
    }

    #[test]
    fn test_method_call_chain() {
        let expr = parse_expression("accessor('#out').setProperty('text', 'hi')").unwrap();
        let Expr::Call(callee, args) = expr else {
            panic!("expected call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(*callee, Expr::Member(_, ref name) if name == "setProperty"));
    }

    #[test_case("1e3", json!(1000) ; "exponent")]
    #[test_case("2.5e-1", json!(0.25) ; "negative exponent")]
    #[test_case("4E+2", json!(400) ; "uppercase signed exponent")]
    #[test_case("12.75", json!(12.75) ; "fraction")]
    fn test_number_literals(src: &str, expected: Value) {
        assert_eq!(parse_expression(src).unwrap(), lit(expected));
    }

    #[test]
    fn test_exponent_needs_digits() {
        assert!(parse_expression("1e").is_err());
        assert!(parse_expression("1e+").is_err());
    }

    #[test]
    fn test_string_escapes() {
        let expr = parse_expression(r#""a\"b\n""#).unwrap();
        assert_eq!(expr, lit(json!("a\"b\n")));
        assert_eq!(parse_expression("'it\\'s'").unwrap(), lit(json!("it's")));
    }

    #[test]
    fn test_conditional_and_logic() {
        let expr = parse_expression("a && !b ? 'x' : 'y'").unwrap();
        assert!(matches!(expr, Expr::Conditional(..)));
    }

    #[test]
    fn test_object_and_array_literals() {
        let expr = parse_expression("{left: 1, 'top': [2, 3],}").unwrap();
        let Expr::Object(entries) = expr else {
            panic!("expected object");
        };
        assert_eq!(entries[0].0, "left");
        assert_eq!(entries[1].0, "top");
    }

    #[test]
    fn test_statements_without_semicolons() {
        let program = parse_program(
            "let x = 1\n x += 2\n if (x > 2) { x = x * 2 } else x = 0\n return x",
        )
        .unwrap();
        assert_eq!(program.len(), 4);
        assert!(matches!(program[1], Stmt::Assign(_, AssignOp::Add, _)));
        assert!(matches!(program[2], Stmt::If(_, _, Some(_))));
    }

    #[test]
    fn test_equality_is_not_assignment() {
        let program = parse_program("a == b;").unwrap();
        assert!(matches!(program[0], Stmt::Expr(Expr::Binary(BinaryOp::Eq, _, _))));
    }

    #[test]
    fn test_comments_are_ignored() {
        let program = parse_program("// leading\nlet a = '//not a comment' /* inline */; a").unwrap();
        assert_eq!(program.len(), 2);
        assert_eq!(
            program[0],
            Stmt::Decl(DeclKind::Let, "a".into(), Some(lit(json!("//not a comment"))))
        );
    }

    #[test_case("function (e, a) { return 1 }", 2 ; "function literal")]
    #[test_case("function named(e) { }", 1 ; "named function")]
    #[test_case("(event, accessor) => { event }", 2 ; "arrow with block")]
    #[test_case("value => value * 2", 1 ; "bare arrow")]
    #[test_case("() => \"clicked\"", 0 ; "no params")]
    fn test_function_literals(src: &str, params: usize) {
        assert_eq!(parse_function(src).unwrap().params.len(), params);
    }

    #[test]
    fn test_wrapped_function() {
        let func = parse_wrapped("return (e, a) => { a('self').hide() };").unwrap();
        assert_eq!(func.params, vec!["e".to_string(), "a".to_string()]);
        assert_eq!(func.body.len(), 1);
    }

    #[test_case("let = 3" ; "missing name")]
    #[test_case("1 +" ; "dangling operator")]
    #[test_case("(e) => { " ; "unclosed arrow body")]
    #[test_case("return (1" ; "unclosed paren")]
    fn test_rejects(src: &str) {
        assert!(parse_program(src).is_err());
    }

    #[test]
    fn test_error_mentions_line() {
        let err = parse_program("let a = 1\nlet = 2").unwrap_err();
        let ParseError::Syntax { errors } = err;
        assert!(errors.contains("Line 2"), "{errors}");
    }
}
