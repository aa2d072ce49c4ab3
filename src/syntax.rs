use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::Error;
use crate::token::Token;

// Expressions that resolve to a binding (variables, assignments, `this`,
// `super`) carry a unique id; the resolver keys its hop-distance side-table
// by it. The counter is process-wide so ids from separate parses never
// collide while a REPL session keeps one interpreter alive.
static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

pub fn next_expr_id() -> usize {
    NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone)]
pub enum LiteralValue {
    Boolean(bool),
    Null,
    Number(f64),
    String(String),
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::Null => write!(f, "nil"),
            LiteralValue::Number(n) => write!(f, "{n}"),
            LiteralValue::String(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Assign {
        id: usize,
        name: Token,
        value: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        paren: Token,
        arguments: Vec<Expr>,
    },
    Get {
        object: Box<Expr>,
        name: Token,
    },
    Grouping {
        expression: Box<Expr>,
    },
    Literal {
        value: LiteralValue,
    },
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },
    Super {
        id: usize,
        keyword: Token,
        method: Token,
    },
    This {
        id: usize,
        keyword: Token,
    },
    Unary {
        operator: Token,
        right: Box<Expr>,
    },
    Variable {
        id: usize,
        name: Token,
    },
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Block {
        statements: Vec<Stmt>,
    },
    Class {
        name: Token,
        superclass: Option<Expr>,
        methods: Vec<Stmt>,
    },
    Expression {
        expression: Expr,
    },
    // Parameters and body are shared with every closure built from this
    // declaration; see Function::User.
    Function {
        name: Token,
        params: Rc<Vec<Token>>,
        body: Rc<Vec<Stmt>>,
    },
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    Print {
        expression: Expr,
    },
    Return {
        keyword: Token,
        value: Option<Expr>,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
}

impl Expr {
    pub fn accept<R, V: expr::Visitor<R>>(&self, visitor: &mut V) -> Result<R, Error> {
        match self {
            Expr::Assign { id, name, value } => visitor.visit_assign_expr(*id, name, value),
            Expr::Binary {
                left,
                operator,
                right,
            } => visitor.visit_binary_expr(left, operator, right),
            Expr::Call {
                callee,
                paren,
                arguments,
            } => visitor.visit_call_expr(callee, paren, arguments),
            Expr::Get { object, name } => visitor.visit_get_expr(object, name),
            Expr::Grouping { expression } => visitor.visit_grouping_expr(expression),
            Expr::Literal { value } => visitor.visit_literal_expr(value),
            Expr::Logical {
                left,
                operator,
                right,
            } => visitor.visit_logical_expr(left, operator, right),
            Expr::Set {
                object,
                name,
                value,
            } => visitor.visit_set_expr(object, name, value),
            Expr::Super {
                id,
                keyword,
                method,
            } => visitor.visit_super_expr(*id, keyword, method),
            Expr::This { id, keyword } => visitor.visit_this_expr(*id, keyword),
            Expr::Unary { operator, right } => visitor.visit_unary_expr(operator, right),
            Expr::Variable { id, name } => visitor.visit_variable_expr(*id, name),
        }
    }
}

impl Stmt {
    pub fn accept<R, V: stmt::Visitor<R>>(&self, visitor: &mut V) -> Result<R, Error> {
        match self {
            Stmt::Block { statements } => visitor.visit_block_stmt(statements),
            Stmt::Class {
                name,
                superclass,
                methods,
            } => visitor.visit_class_stmt(name, superclass.as_ref(), methods),
            Stmt::Expression { expression } => visitor.visit_expression_stmt(expression),
            Stmt::Function { name, params, body } => {
                visitor.visit_function_stmt(name, params, body)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => visitor.visit_if_stmt(condition, then_branch, else_branch.as_deref()),
            Stmt::Print { expression } => visitor.visit_print_stmt(expression),
            Stmt::Return { keyword, value } => visitor.visit_return_stmt(keyword, value),
            Stmt::Var { name, initializer } => visitor.visit_var_stmt(name, initializer),
            Stmt::While { condition, body } => visitor.visit_while_stmt(condition, body),
        }
    }
}

pub mod expr {
    use super::{Expr, LiteralValue};
    use crate::error::Error;
    use crate::token::Token;

    pub trait Visitor<R> {
        fn visit_assign_expr(&mut self, id: usize, name: &Token, value: &Expr)
            -> Result<R, Error>;
        fn visit_binary_expr(
            &mut self,
            left: &Expr,
            operator: &Token,
            right: &Expr,
        ) -> Result<R, Error>;
        fn visit_call_expr(
            &mut self,
            callee: &Expr,
            paren: &Token,
            arguments: &[Expr],
        ) -> Result<R, Error>;
        fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<R, Error>;
        fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<R, Error>;
        fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<R, Error>;
        fn visit_logical_expr(
            &mut self,
            left: &Expr,
            operator: &Token,
            right: &Expr,
        ) -> Result<R, Error>;
        fn visit_set_expr(
            &mut self,
            object: &Expr,
            name: &Token,
            value: &Expr,
        ) -> Result<R, Error>;
        fn visit_super_expr(
            &mut self,
            id: usize,
            keyword: &Token,
            method: &Token,
        ) -> Result<R, Error>;
        fn visit_this_expr(&mut self, id: usize, keyword: &Token) -> Result<R, Error>;
        fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<R, Error>;
        fn visit_variable_expr(&mut self, id: usize, name: &Token) -> Result<R, Error>;
    }
}

pub mod stmt {
    use super::{Expr, Stmt};
    use crate::error::Error;
    use crate::token::Token;
    use std::rc::Rc;

    pub trait Visitor<R> {
        fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<R, Error>;
        fn visit_class_stmt(
            &mut self,
            name: &Token,
            superclass: Option<&Expr>,
            methods: &[Stmt],
        ) -> Result<R, Error>;
        fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<R, Error>;
        fn visit_function_stmt(
            &mut self,
            name: &Token,
            params: &Rc<Vec<Token>>,
            body: &Rc<Vec<Stmt>>,
        ) -> Result<R, Error>;
        fn visit_if_stmt(
            &mut self,
            condition: &Expr,
            then_branch: &Stmt,
            else_branch: Option<&Stmt>,
        ) -> Result<R, Error>;
        fn visit_print_stmt(&mut self, expression: &Expr) -> Result<R, Error>;
        fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>)
            -> Result<R, Error>;
        fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>)
            -> Result<R, Error>;
        fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<R, Error>;
    }
}

/// Prefix printer for expressions; every operator application comes out
/// fully parenthesized, so precedence is visible in the output.
#[cfg(test)]
pub(crate) struct AstPrinter;

#[cfg(test)]
impl AstPrinter {
    pub(crate) fn print(&mut self, expression: &Expr) -> String {
        expression
            .accept(self)
            .expect("printing an expression cannot fail")
    }

    fn parenthesize(&mut self, name: &str, exprs: &[&Expr]) -> Result<String, Error> {
        let mut builder = String::new();
        builder.push('(');
        builder.push_str(name);
        for expr in exprs {
            builder.push(' ');
            builder.push_str(&expr.accept(self)?);
        }
        builder.push(')');
        Ok(builder)
    }
}

#[cfg(test)]
impl expr::Visitor<String> for AstPrinter {
    fn visit_assign_expr(
        &mut self,
        _id: usize,
        name: &Token,
        value: &Expr,
    ) -> Result<String, Error> {
        let name = format!("= {}", name.lexeme);
        self.parenthesize(&name, &[value])
    }

    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<String, Error> {
        self.parenthesize(&operator.lexeme, &[left, right])
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        _paren: &Token,
        arguments: &[Expr],
    ) -> Result<String, Error> {
        let mut exprs: Vec<&Expr> = vec![callee];
        exprs.extend(arguments.iter());
        self.parenthesize("call", &exprs)
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<String, Error> {
        let name = format!(". {}", name.lexeme);
        self.parenthesize(&name, &[object])
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<String, Error> {
        self.parenthesize("group", &[expression])
    }

    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<String, Error> {
        Ok(value.to_string())
    }

    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<String, Error> {
        self.parenthesize(&operator.lexeme, &[left, right])
    }

    fn visit_set_expr(
        &mut self,
        object: &Expr,
        name: &Token,
        value: &Expr,
    ) -> Result<String, Error> {
        let name = format!("= . {}", name.lexeme);
        self.parenthesize(&name, &[object, value])
    }

    fn visit_super_expr(
        &mut self,
        _id: usize,
        _keyword: &Token,
        method: &Token,
    ) -> Result<String, Error> {
        Ok(format!("(super {})", method.lexeme))
    }

    fn visit_this_expr(&mut self, _id: usize, _keyword: &Token) -> Result<String, Error> {
        Ok("this".to_string())
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<String, Error> {
        self.parenthesize(&operator.lexeme, &[right])
    }

    fn visit_variable_expr(&mut self, _id: usize, name: &Token) -> Result<String, Error> {
        Ok(name.lexeme.clone())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;
    use crate::token::TokenType;

    fn parse_expression(source: &str) -> Expr {
        let mut scanner = Scanner::new(format!("{source};"));
        let tokens = scanner.scan_tokens();
        let mut parser = Parser::new(tokens);
        let mut statements = parser.parse().expect("source should parse");
        match statements.remove(0) {
            Stmt::Expression { expression } => expression,
            other => panic!("expected an expression statement, got {other:?}"),
        }
    }

    // Renders the literal/unary/binary subset back to parenthesized Lox
    // source. Every operator application gets its own parentheses, and a
    // grouping renders as its inner expression, so reparsing the output
    // and rendering again reproduces it exactly.
    fn to_source(expression: &Expr) -> String {
        match expression {
            Expr::Literal {
                value: LiteralValue::String(s),
            } => format!("\"{s}\""),
            Expr::Literal { value } => value.to_string(),
            Expr::Unary { operator, right } => {
                format!("({}{})", operator.lexeme, to_source(right))
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => format!(
                "({} {} {})",
                to_source(left),
                operator.lexeme,
                to_source(right)
            ),
            Expr::Grouping { expression } => to_source(expression),
            other => panic!("round-trip covers literals and operators, got {other:?}"),
        }
    }

    #[test]
    fn printed_form_reparses_to_the_same_shape() {
        for source in [
            "123",
            "45.67",
            "true",
            "false",
            "nil",
            "\"s\"",
            "1 + 2 * 3",
            "(1 + 2) * 3",
            "-4 - -5",
            "1 < 2 == false",
            "\"a\" + \"b\"",
            "!(1 >= 2) != nil",
        ] {
            let printed = to_source(&parse_expression(source));
            let reparsed = parse_expression(&printed);
            assert_eq!(to_source(&reparsed), printed, "round-trip of `{source}`");
        }
    }

    #[test]
    fn printer_parenthesizes_by_precedence() {
        let expression = Expr::Binary {
            left: Box::new(Expr::Unary {
                operator: Token::new(TokenType::Minus, "-", 1),
                right: Box::new(Expr::Literal {
                    value: LiteralValue::Number(123.0),
                }),
            }),
            operator: Token::new(TokenType::Star, "*", 1),
            right: Box::new(Expr::Grouping {
                expression: Box::new(Expr::Literal {
                    value: LiteralValue::Number(45.67),
                }),
            }),
        };

        assert_eq!(
            AstPrinter.print(&expression),
            "(* (- 123) (group 45.67))"
        );
    }

    #[test]
    fn printer_renders_literals() {
        for (value, expected) in [
            (LiteralValue::Number(7.0), "7"),
            (LiteralValue::String("hi".to_string()), "hi"),
            (LiteralValue::Boolean(true), "true"),
            (LiteralValue::Null, "nil"),
        ] {
            assert_eq!(AstPrinter.print(&Expr::Literal { value }), expected);
        }
    }

    #[test]
    fn expr_ids_are_unique() {
        let first = next_expr_id();
        let second = next_expr_id();
        assert!(second > first);
    }
}
