//! Statement AST and script-level parser.
//!
//! A script is a sequence of newline-separated statements.  An optional
//! line holding only `---` ends the enter half; everything after it is the
//! leave half.  Parsing is strict: the first unexpected token aborts with a
//! [`SyntaxError`] and no partial result.

use super::expr::{tokenize, Expr, LValue, Parser, Token};
use crate::error::SyntaxError;

/// A parsed statement with the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// `var name = value` (`declare`) or `target = value`.
    Assign { target: LValue, value: Expr, declare: bool },
    /// A bare expression, or a comma-separated sequence of them.
    Expr(Expr),
}

/// The two statement lists of a script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Halves {
    pub enter: Vec<Stmt>,
    pub leave: Vec<Stmt>,
}

/// Parse script source into its enter and leave halves.
pub fn parse_script(src: &str) -> Result<Halves, SyntaxError> {
    let mut parser = Parser::new(tokenize(src));
    let mut halves = Halves::default();
    let mut in_leave = false;

    loop {
        match parser.peek() {
            Token::Eof => break,
            Token::Newline => {
                parser.advance();
            }
            Token::Delimiter if !in_leave => {
                parser.advance();
                in_leave = true;
            }
            _ => {
                let stmt = parse_statement(&mut parser)?;
                if !matches!(parser.peek(), Token::Newline | Token::Eof) {
                    return Err(parser.unexpected());
                }
                if in_leave {
                    halves.leave.push(stmt);
                } else {
                    halves.enter.push(stmt);
                }
            }
        }
    }
    Ok(halves)
}

// ── Statement-level parser ────────────────────────────────────────────────────

fn parse_statement(parser: &mut Parser) -> Result<Stmt, SyntaxError> {
    let line = parser.line();

    if matches!(parser.peek(), Token::Ident(kw) if kw == "var") {
        parser.advance();
        let target = parser.parse_lvalue()?;
        if !matches!(target, LValue::Local(_)) {
            return Err(SyntaxError::new(line, format!("Unexpected token {target}")));
        }
        if !parser.eat(&Token::Assign) {
            return Err(parser.unexpected());
        }
        let value = parser.parse_expr()?;
        return Ok(Stmt { line, kind: StmtKind::Assign { target, value, declare: true } });
    }

    let first = parser.parse_expr()?;

    if parser.eat(&Token::Assign) {
        let target = first
            .as_lvalue()
            .ok_or_else(|| SyntaxError::new(line, "Invalid left-hand side in assignment"))?;
        let value = parser.parse_expr()?;
        return Ok(Stmt { line, kind: StmtKind::Assign { target, value, declare: false } });
    }

    if parser.peek() == &Token::Comma {
        let mut items = vec![first];
        while parser.eat(&Token::Comma) {
            items.push(parser.parse_expr()?);
        }
        return Ok(Stmt { line, kind: StmtKind::Expr(Expr::Comma(items)) });
    }

    Ok(Stmt { line, kind: StmtKind::Expr(first) })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::builtins::Builtin;

    fn parse_ok(src: &str) -> Halves {
        parse_script(src).expect("parse failed")
    }

    fn parse_err(src: &str) -> String {
        parse_script(src).unwrap_err().to_string()
    }

    #[test]
    fn empty_script() {
        assert_eq!(parse_ok(""), Halves::default());
        assert_eq!(parse_ok("\n\n# only a comment\n"), Halves::default());
    }

    #[test]
    fn lone_quote_is_illegal() {
        assert_eq!(parse_err("'"), "Script(line 1): SyntaxError: Unexpected token ILLEGAL");
    }

    #[test]
    fn assignment_script() {
        let h = parse_ok("var new_text = \"No, not me!\"\narg0 = &new_text\narg1 = len (new_text)\n");
        assert!(h.leave.is_empty());
        assert_eq!(
            h.enter,
            vec![
                Stmt {
                    line: 1,
                    kind: StmtKind::Assign {
                        target: LValue::Local("new_text".into()),
                        value: Expr::Str("No, not me!".into()),
                        declare: true,
                    },
                },
                Stmt {
                    line: 2,
                    kind: StmtKind::Assign {
                        target: LValue::Argument(0),
                        value: Expr::AddressOf(LValue::Local("new_text".into())),
                        declare: false,
                    },
                },
                Stmt {
                    line: 3,
                    kind: StmtKind::Assign {
                        target: LValue::Argument(1),
                        value: Expr::Len(Box::new(Expr::Var("new_text".into()))),
                        declare: false,
                    },
                },
            ]
        );
    }

    #[test]
    fn halves_split_on_delimiter() {
        let h = parse_ok("send_narrow_string (arg0)\n---\nsend_int32 (retval)");
        assert_eq!(h.enter.len(), 1);
        assert_eq!(h.leave.len(), 1);
        assert_eq!(h.leave[0].line, 3);
        assert_eq!(
            h.leave[0].kind,
            StmtKind::Expr(Expr::Call(Builtin::SendInt32, vec![Expr::RetVal]))
        );
    }

    #[test]
    fn empty_halves_are_legal() {
        let h = parse_ok("---\nsend_int32(retval)\n");
        assert!(h.enter.is_empty());
        assert_eq!(h.leave.len(), 1);
        let h = parse_ok("send_int32(arg0)\n---\n");
        assert_eq!(h.enter.len(), 1);
        assert!(h.leave.is_empty());
    }

    #[test]
    fn comma_sequence() {
        let h = parse_ok("send_narrow_string (arg0), send_wide_string (arg1), send_int32 (arg2)");
        let StmtKind::Expr(Expr::Comma(items)) = &h.enter[0].kind else {
            panic!("expected a sequence, got {:?}", h.enter[0].kind);
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn second_delimiter_is_rejected() {
        assert_eq!(parse_err("---\n---"), "Script(line 2): SyntaxError: Unexpected token ---");
    }

    #[test]
    fn error_line_numbers() {
        assert_eq!(
            parse_err("send_int32(arg0)\n\nsend_int32(arg0) arg1"),
            "Script(line 3): SyntaxError: Unexpected identifier"
        );
        assert_eq!(
            parse_err("var x = 1\n\"x\" = 2"),
            "Script(line 2): SyntaxError: Invalid left-hand side in assignment"
        );
        assert_eq!(parse_err("var = 1"), "Script(line 1): SyntaxError: Unexpected token =");
        assert_eq!(parse_err("var x"), "Script(line 1): SyntaxError: Unexpected end of input");
        assert_eq!(parse_err("var arg0 = 1"), "Script(line 1): SyntaxError: Unexpected token arg0");
        assert_eq!(parse_err("arg0 = "), "Script(line 1): SyntaxError: Unexpected end of input");
        assert_eq!(parse_err("x = 1, 2"), "Script(line 1): SyntaxError: Unexpected token ,");
    }

    #[test]
    fn statements_need_newlines_between_them() {
        assert_eq!(
            parse_err("var a = 1 var b = 2"),
            "Script(line 1): SyntaxError: Unexpected token var"
        );
    }

    #[test]
    fn deterministic() {
        let src = "var s = \"x\"\narg0 = &s\n---\nsend_guid(arg0)\n";
        assert_eq!(parse_ok(src), parse_ok(src));
    }
}
