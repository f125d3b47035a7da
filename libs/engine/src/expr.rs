//! Condition expressions
//!
//! A small Python-flavoured boolean language used by `is_set_if` and by the
//! optional condition of `refers_to`:
//!
//! ```text
//! or_expr    := and_expr ("or" and_expr)*
//! and_expr   := not_expr ("and" not_expr)*
//! not_expr   := "not" not_expr | comparison
//! comparison := sum (cmp_op sum)*        chained, a < b < c
//! cmp_op     := == | != | < | <= | > | >= | is | is not
//! sum        := term (("+" | "-") term)*
//! term       := factor (("*" | "/" | "%") factor)*
//! factor     := ("-" | "+") factor | atom
//! atom       := number | 'string' | "string" | True | False | None
//!             | name ("." name)* | "(" or_expr ")"
//! ```
//!
//! Names resolve through a [`Scope`]; a leading `this.` is ignored.

use crate::error::{ExprError, ExprResult};
use crate::projection::{ProjValue, Scope};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{char, digit0, digit1, multispace0, one_of, satisfy},
    combinator::{all_consuming, map, not, opt, recognize, value},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use std::cmp::Ordering;

const KEYWORDS: &[&str] = &["and", "or", "not", "is", "True", "False", "None"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Is => "is",
            CmpOp::IsNot => "is not",
        }
    }
}

/// Parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ProjValue),
    Name(Vec<String>),
    Not(Box<Expr>),
    Neg(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Arith(ArithOp, Box<Expr>, Box<Expr>),
    /// `first op1 e1 op2 e2 ...`, true when every adjacent pair holds
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
}

impl Expr {
    pub fn parse(source: &str) -> ExprResult<Expr> {
        match all_consuming(delimited(multispace0, or_expr, multispace0))(source) {
            Ok((_, expr)) => Ok(expr),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let reason = if e.input.is_empty() {
                    "unexpected end of expression".to_string()
                } else {
                    format!("unexpected input at '{}'", e.input)
                };
                Err(ExprError::parse(source, reason))
            }
            Err(nom::Err::Incomplete(_)) => Err(ExprError::parse(source, "incomplete expression")),
        }
    }

    pub fn eval(&self, scope: &dyn Scope) -> ExprResult<ProjValue> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(path) => scope.lookup(path),
            Expr::Not(inner) => Ok(ProjValue::Bool(!inner.eval(scope)?.truthy())),
            Expr::Neg(inner) => negate(inner.eval(scope)?),
            Expr::And(left, right) => {
                let l = left.eval(scope)?;
                if l.truthy() {
                    right.eval(scope)
                } else {
                    Ok(l)
                }
            }
            Expr::Or(left, right) => {
                let l = left.eval(scope)?;
                if l.truthy() {
                    Ok(l)
                } else {
                    right.eval(scope)
                }
            }
            Expr::Arith(op, left, right) => arith(*op, left.eval(scope)?, right.eval(scope)?),
            Expr::Compare(first, rest) => {
                let mut left = first.eval(scope)?;
                for (op, next) in rest {
                    let right = next.eval(scope)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(ProjValue::Bool(false));
                    }
                    left = right;
                }
                Ok(ProjValue::Bool(true))
            }
        }
    }
}

/// Parse and evaluate to a truth value
pub fn evaluate(source: &str, scope: &dyn Scope) -> ExprResult<bool> {
    Ok(Expr::parse(source)?.eval(scope)?.truthy())
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

fn ws<'i, O, F>(inner: F) -> impl FnMut(&'i str) -> IResult<&'i str, O>
where
    F: FnMut(&'i str) -> IResult<&'i str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword<'i>(kw: &'static str) -> impl FnMut(&'i str) -> IResult<&'i str, &'i str> {
    ws(terminated(tag(kw), not(satisfy(is_ident_char))))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(input)
}

fn name(input: &str) -> IResult<&str, Expr> {
    let (rest, parts) = separated_list1(char('.'), identifier)(input)?;
    if KEYWORDS.contains(&parts[0]) {
        return Err(nom::Err::Error(NomError::new(input, ErrorKind::Tag)));
    }
    let skip = usize::from(parts[0] == "this" && parts.len() > 1);
    let path = parts[skip..].iter().map(|p| p.to_string()).collect();
    Ok((rest, Expr::Name(path)))
}

fn number(input: &str) -> IResult<&str, Expr> {
    let (rest, text) = recognize(tuple((
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)?;

    let literal = if text.contains(['.', 'e', 'E']) {
        text.parse::<f64>().map(ProjValue::Float)
    } else {
        Ok(text
            .parse::<i64>()
            .map(ProjValue::Int)
            .unwrap_or_else(|_| ProjValue::Float(text.parse::<f64>().unwrap_or(f64::INFINITY))))
    };
    match literal {
        Ok(v) => Ok((rest, Expr::Literal(v))),
        Err(_) => Err(nom::Err::Error(NomError::new(input, ErrorKind::Float))),
    }
}

fn quoted(q: char) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input: &str| delimited(char(q), take_while(move |c: char| c != q), char(q))(input)
}

fn string_literal(input: &str) -> IResult<&str, Expr> {
    map(alt((quoted('\''), quoted('"'))), |s: &str| {
        Expr::Literal(ProjValue::Str(s.to_string()))
    })(input)
}

fn constant(input: &str) -> IResult<&str, Expr> {
    alt((
        value(Expr::Literal(ProjValue::Bool(true)), keyword("True")),
        value(Expr::Literal(ProjValue::Bool(false)), keyword("False")),
        value(Expr::Literal(ProjValue::None), keyword("None")),
    ))(input)
}

fn atom(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        number,
        string_literal,
        constant,
        name,
        delimited(char('('), ws(or_expr), char(')')),
    )))(input)
}

fn factor(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('-')), factor), |e| Expr::Neg(Box::new(e))),
        preceded(ws(char('+')), factor),
        atom,
    ))(input)
}

fn fold_arith(first: Expr, rest: Vec<(ArithOp, Expr)>) -> Expr {
    rest.into_iter()
        .fold(first, |acc, (op, rhs)| Expr::Arith(op, Box::new(acc), Box::new(rhs)))
}

fn term(input: &str) -> IResult<&str, Expr> {
    let (input, first) = factor(input)?;
    let op = ws(alt((
        value(ArithOp::Mul, char('*')),
        value(ArithOp::Div, char('/')),
        value(ArithOp::Rem, char('%')),
    )));
    let (input, rest) = many0(pair(op, factor))(input)?;
    Ok((input, fold_arith(first, rest)))
}

fn sum(input: &str) -> IResult<&str, Expr> {
    let (input, first) = term(input)?;
    let op = ws(alt((value(ArithOp::Add, char('+')), value(ArithOp::Sub, char('-')))));
    let (input, rest) = many0(pair(op, term))(input)?;
    Ok((input, fold_arith(first, rest)))
}

fn cmp_op(input: &str) -> IResult<&str, CmpOp> {
    alt((
        ws(alt((
            value(CmpOp::Eq, tag("==")),
            value(CmpOp::Ne, tag("!=")),
            value(CmpOp::Le, tag("<=")),
            value(CmpOp::Ge, tag(">=")),
            value(CmpOp::Lt, tag("<")),
            value(CmpOp::Gt, tag(">")),
        ))),
        value(CmpOp::IsNot, pair(keyword("is"), keyword("not"))),
        value(CmpOp::Is, keyword("is")),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    let (input, first) = sum(input)?;
    let (input, rest) = many0(pair(cmp_op, sum))(input)?;
    if rest.is_empty() {
        Ok((input, first))
    } else {
        Ok((input, Expr::Compare(Box::new(first), rest)))
    }
}

fn not_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(keyword("not"), not_expr), |e| Expr::Not(Box::new(e))),
        comparison,
    ))(input)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = not_expr(input)?;
    let (input, rest) = many0(preceded(keyword("and"), not_expr))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::And(Box::new(acc), Box::new(rhs))),
    ))
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    let (input, first) = and_expr(input)?;
    let (input, rest) = many0(preceded(keyword("or"), and_expr))(input)?;
    Ok((
        input,
        rest.into_iter()
            .fold(first, |acc, rhs| Expr::Or(Box::new(acc), Box::new(rhs))),
    ))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn type_error(op: &'static str, left: &ProjValue, right: &ProjValue) -> ExprError {
    ExprError::Type {
        op,
        left: left.type_name(),
        right: right.type_name(),
    }
}

fn negate(v: ProjValue) -> ExprResult<ProjValue> {
    match v {
        ProjValue::Float(f) => Ok(ProjValue::Float(-f)),
        other => match other.as_int() {
            Some(i) => Ok(i
                .checked_neg()
                .map(ProjValue::Int)
                .unwrap_or(ProjValue::Float(-(i as f64)))),
            None => Err(type_error("-", &other, &other)),
        },
    }
}

fn arith(op: ArithOp, l: ProjValue, r: ProjValue) -> ExprResult<ProjValue> {
    if let (ArithOp::Add, ProjValue::Str(a), ProjValue::Str(b)) = (op, &l, &r) {
        return Ok(ProjValue::Str(format!("{a}{b}")));
    }

    if let (Some(a), Some(b)) = (int_operand(&l), int_operand(&r)) {
        let exact = match op {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Rem if b == 0 => return Err(ExprError::DivisionByZero),
            ArithOp::Rem => a.checked_rem_euclid(b).map(|m| if b < 0 && m != 0 { m + b } else { m }),
            ArithOp::Div => None,
        };
        if let Some(v) = exact {
            return Ok(ProjValue::Int(v));
        }
    }

    let (Some(a), Some(b)) = (float_operand(&l), float_operand(&r)) else {
        return Err(type_error(op.symbol(), &l, &r));
    };
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div if b == 0.0 => return Err(ExprError::DivisionByZero),
        ArithOp::Div => a / b,
        ArithOp::Rem if b == 0.0 => return Err(ExprError::DivisionByZero),
        ArithOp::Rem => a - b * (a / b).floor(),
    };
    Ok(ProjValue::Float(result))
}

fn int_operand(v: &ProjValue) -> Option<i64> {
    match v {
        ProjValue::Float(_) => None,
        other => other.as_int(),
    }
}

fn float_operand(v: &ProjValue) -> Option<f64> {
    v.as_f64()
}

fn equals(l: &ProjValue, r: &ProjValue) -> bool {
    match (l, r) {
        (ProjValue::None, ProjValue::None) => true,
        (ProjValue::None, _) | (_, ProjValue::None) => false,
        (ProjValue::Str(a), ProjValue::Str(b)) => a == b,
        (ProjValue::Enum { name, .. }, ProjValue::Str(s)) | (ProjValue::Str(s), ProjValue::Enum { name, .. }) => {
            name.as_deref() == Some(s.as_str())
        }
        (ProjValue::List(a), ProjValue::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
        }
        (ProjValue::Int(a), ProjValue::Int(b)) => a == b,
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn compare(op: CmpOp, l: &ProjValue, r: &ProjValue) -> ExprResult<bool> {
    let ordering = match op {
        CmpOp::Eq => return Ok(equals(l, r)),
        CmpOp::Ne => return Ok(!equals(l, r)),
        CmpOp::Is => return Ok(equals(l, r)),
        CmpOp::IsNot => return Ok(!equals(l, r)),
        _ => order(op, l, r)?,
    };
    Ok(match ordering {
        None => false,
        Some(ord) => match op {
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
            _ => false,
        },
    })
}

/// `None` means the pair is unordered (unset operand or NaN)
fn order(op: CmpOp, l: &ProjValue, r: &ProjValue) -> ExprResult<Option<Ordering>> {
    match (l, r) {
        (ProjValue::None, _) | (_, ProjValue::None) => Ok(None),
        (ProjValue::Str(a), ProjValue::Str(b)) => Ok(Some(a.cmp(b))),
        (ProjValue::Int(a), ProjValue::Int(b)) => Ok(Some(a.cmp(b))),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(type_error(op.symbol(), l, r)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn scope(pairs: &[(&str, ProjValue)]) -> HashMap<String, ProjValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn eval(src: &str, scope: &HashMap<String, ProjValue>) -> ExprResult<bool> {
        evaluate(src, scope)
    }

    #[test]
    fn test_precedence() {
        let s = scope(&[]);
        assert!(eval("1 + 2 * 3 == 7", &s).unwrap());
        assert!(eval("(1 + 2) * 3 == 9", &s).unwrap());
        assert!(eval("not 1 == 2 and True", &s).unwrap());
        assert!(eval("False or 2 > 1 and 3 > 2", &s).unwrap());
        assert!(eval("-2 * -3 == 6", &s).unwrap());
        assert!(eval("7 % 3 == 1 and -7 % 3 == 2", &s).unwrap());
    }

    #[test]
    fn test_chained_comparison() {
        let s = scope(&[("speed", ProjValue::Float(5.0))]);
        assert!(eval("0 < speed <= 5", &s).unwrap());
        assert!(!eval("0 < speed < 5", &s).unwrap());
    }

    #[test]
    fn test_names_and_this_prefix() {
        let s = scope(&[
            ("id.value", ProjValue::Int(3)),
            ("type", ProjValue::Enum {
                number: 2,
                name: Some("TYPE_VEHICLE".into()),
            }),
        ]);
        assert!(eval("this.id.value == 3", &s).unwrap());
        assert!(eval("type == 'TYPE_VEHICLE'", &s).unwrap());
        assert!(eval("type == 2", &s).unwrap());
        assert!(eval("type != \"TYPE_PEDESTRIAN\"", &s).unwrap());
    }

    #[test]
    fn test_none_semantics() {
        let s = scope(&[("speed", ProjValue::None)]);
        assert!(eval("speed is None", &s).unwrap());
        assert!(!eval("speed is not None", &s).unwrap());
        assert!(!eval("speed > 0", &s).unwrap());
        assert!(!eval("speed <= 0", &s).unwrap());
        assert!(eval("not speed", &s).unwrap());
    }

    #[test]
    fn test_keywords_need_word_boundary() {
        let s = scope(&[("notes", ProjValue::Int(1)), ("origin", ProjValue::Int(0))]);
        assert!(eval("notes == 1", &s).unwrap());
        assert!(eval("notes and not origin", &s).unwrap());
    }

    #[test]
    fn test_errors() {
        let s = scope(&[("name", ProjValue::Str("a".into()))]);
        assert!(matches!(eval("1 +", &s), Err(ExprError::Parse { .. })));
        assert!(matches!(eval("(1", &s), Err(ExprError::Parse { .. })));
        assert!(matches!(eval("missing > 1", &s), Err(ExprError::UnknownName { .. })));
        assert!(matches!(eval("name < 1", &s), Err(ExprError::Type { .. })));
        assert!(matches!(eval("1 / 0", &s), Err(ExprError::DivisionByZero)));
        assert!(matches!(eval("and", &s), Err(ExprError::Parse { .. })));
    }

    #[test]
    fn test_nan_comparisons_are_false() {
        let s = scope(&[("x", ProjValue::Float(f64::NAN))]);
        assert!(!eval("x == x", &s).unwrap());
        assert!(!eval("x < 1", &s).unwrap());
        assert!(!eval("x >= 1", &s).unwrap());
    }
}
