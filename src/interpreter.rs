use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::Error;
use crate::function::Function;
use crate::object::Object;
use crate::syntax::{expr, stmt, Expr, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

/// Tree-walking evaluator. Expressions produce an `Object`; statements run
/// for their side effects. The environment cursor is the only mutable
/// scalar: it tracks the scope currently in force, with `globals` pinned
/// at the root of the chain.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    // Resolver side-table: expression id to hop distance of its binding
    // scope. An absent id means the name is (or will be) a global.
    locals: HashMap<usize, usize>,
    // Sink for `print`: stdout in production, a buffer in tests.
    writer: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(writer: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Object::Callable(Function::Native {
                arity: 0,
                body: Box::new(|_| {
                    let seconds = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .map(|elapsed| elapsed.as_secs_f64())
                        .unwrap_or_default();
                    Object::Number(seconds)
                }),
            }),
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            writer,
        }
    }

    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Error> {
        statement.accept(self)
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Object, Error> {
        expression.accept(self)
    }

    /// Resolver entry point: record how many scopes out the expression's
    /// binding lives.
    pub fn resolve(&mut self, id: usize, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Runs `statements` with `environment` as the current scope. The
    /// previous scope is restored on every exit path, including a `return`
    /// or runtime error unwinding through.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = statements
            .iter()
            .try_for_each(|statement| self.execute(statement));
        self.environment = previous;
        result
    }

    fn look_up_variable(&self, id: usize, name: &Token) -> Result<Object, Error> {
        match self.locals.get(&id) {
            Some(distance) => Environment::get_at(&self.environment, *distance, &name.lexeme)
                .ok_or_else(|| Error::Runtime {
                    token: name.clone(),
                    message: format!("Undefined variable '{}'.", name.lexeme),
                }),
            None => self.globals.borrow().get(name),
        }
    }

    fn stringify(&self, object: &Object) -> String {
        match object {
            Object::Boolean(b) => b.to_string(),
            Object::Callable(function) => function.to_string(),
            Object::Class(class) => class.borrow().name.clone(),
            Object::Instance(instance) => {
                format!("{} instance", instance.borrow().class.borrow().name)
            }
            Object::Null => "nil".to_string(),
            Object::Number(n) => n.to_string(),
            Object::String(s) => s.clone(),
        }
    }

    // nil and false are falsey; every other value is truthy.
    fn is_truthy(&self, object: &Object) -> bool {
        match object {
            Object::Null => false,
            Object::Boolean(b) => *b,
            _ => true,
        }
    }

    fn is_equal(&self, left: &Object, right: &Object) -> bool {
        left.equals(right)
    }

    fn number_operand_error<R>(&self, operator: &Token) -> Result<R, Error> {
        Err(Error::Runtime {
            token: operator.clone(),
            message: "Operand must be a number.".to_string(),
        })
    }

    fn number_operands_error<R>(&self, operator: &Token) -> Result<R, Error> {
        Err(Error::Runtime {
            token: operator.clone(),
            message: "Operands must be numbers.".to_string(),
        })
    }
}

impl expr::Visitor<Object> for Interpreter {
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Object, Error> {
        Ok(match value {
            LiteralValue::Boolean(b) => Object::Boolean(*b),
            LiteralValue::Null => Object::Null,
            LiteralValue::Number(n) => Object::Number(*n),
            LiteralValue::String(s) => Object::String(s.clone()),
        })
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Object, Error> {
        self.evaluate(expression)
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match right {
                Object::Number(n) => Ok(Object::Number(-n)),
                _ => self.number_operand_error(operator),
            },
            TokenType::Bang => Ok(Object::Boolean(!self.is_truthy(&right))),
            _ => unreachable!("parser only produces '-' and '!' unary operators"),
        }
    }

    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Object, Error> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Number(left - right)),
                _ => self.number_operands_error(operator),
            },
            // Division by zero follows IEEE-754: inf/nan, not an error.
            TokenType::Slash => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Number(left / right)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Star => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Number(left * right)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Plus => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Number(left + right)),
                (Object::String(left), Object::String(right)) => Ok(Object::String(left + &right)),
                _ => Err(Error::Runtime {
                    token: operator.clone(),
                    message: "Operands must be two numbers or two strings.".to_string(),
                }),
            },
            TokenType::Greater => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Boolean(left > right)),
                _ => self.number_operands_error(operator),
            },
            TokenType::GreaterEqual => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Boolean(left >= right)),
                _ => self.number_operands_error(operator),
            },
            TokenType::Less => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Boolean(left < right)),
                _ => self.number_operands_error(operator),
            },
            TokenType::LessEqual => match (left, right) {
                (Object::Number(left), Object::Number(right)) => Ok(Object::Boolean(left <= right)),
                _ => self.number_operands_error(operator),
            },
            TokenType::BangEqual => Ok(Object::Boolean(!self.is_equal(&left, &right))),
            TokenType::EqualEqual => Ok(Object::Boolean(self.is_equal(&left, &right))),
            _ => unreachable!("parser only produces binary operator tokens here"),
        }
    }

    // Short-circuiting: the result is the deciding operand itself, not a
    // coerced boolean.
    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Object, Error> {
        let left = self.evaluate(left)?;

        if operator.token_type == TokenType::Or {
            if self.is_truthy(&left) {
                return Ok(left);
            }
        } else if !self.is_truthy(&left) {
            return Ok(left);
        }

        self.evaluate(right)
    }

    fn visit_variable_expr(&mut self, id: usize, name: &Token) -> Result<Object, Error> {
        self.look_up_variable(id, name)
    }

    fn visit_assign_expr(&mut self, id: usize, name: &Token, value: &Expr) -> Result<Object, Error> {
        let value = self.evaluate(value)?;

        match self.locals.get(&id) {
            Some(distance) => {
                Environment::assign_at(&self.environment, *distance, name, value.clone())
                    .ok_or_else(|| Error::Runtime {
                        token: name.clone(),
                        message: format!("Undefined variable '{}'.", name.lexeme),
                    })?;
            }
            None => self.globals.borrow_mut().assign(name, value.clone())?,
        }

        // Assignment is an expression; it yields the assigned value.
        Ok(value)
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Object, Error> {
        let callee = self.evaluate(callee)?;

        let mut evaluated = Vec::with_capacity(arguments.len());
        for argument in arguments {
            evaluated.push(self.evaluate(argument)?);
        }

        match callee {
            Object::Callable(function) => {
                if evaluated.len() != function.arity() {
                    return Err(Error::Runtime {
                        token: paren.clone(),
                        message: format!(
                            "Expected {} arguments but got {}.",
                            function.arity(),
                            evaluated.len()
                        ),
                    });
                }
                function.call(self, &evaluated)
            }
            Object::Class(class) => {
                let arity = class.borrow().arity();
                if evaluated.len() != arity {
                    return Err(Error::Runtime {
                        token: paren.clone(),
                        message: format!(
                            "Expected {} arguments but got {}.",
                            arity,
                            evaluated.len()
                        ),
                    });
                }
                LoxClass::instantiate(&class, self, &evaluated)
            }
            _ => Err(Error::Runtime {
                token: paren.clone(),
                message: "Can only call functions and classes.".to_string(),
            }),
        }
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        if let Object::Instance(ref instance) = object {
            instance.borrow().get(name, &object)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: "Only instances have properties.".to_string(),
            })
        }
    }

    fn visit_set_expr(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Object, Error> {
        let object = self.evaluate(object)?;

        if let Object::Instance(instance) = object {
            let value = self.evaluate(value)?;
            instance.borrow_mut().set(name, value.clone());
            Ok(value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: "Only instances have fields.".to_string(),
            })
        }
    }

    fn visit_this_expr(&mut self, id: usize, keyword: &Token) -> Result<Object, Error> {
        self.look_up_variable(id, keyword)
    }

    fn visit_super_expr(&mut self, id: usize, keyword: &Token, method: &Token) -> Result<Object, Error> {
        let distance = match self.locals.get(&id) {
            Some(distance) => *distance,
            None => {
                return Err(Error::Runtime {
                    token: keyword.clone(),
                    message: "'super' was not resolved to a superclass scope.".to_string(),
                })
            }
        };

        let superclass = Environment::get_at(&self.environment, distance, "super");
        // bind() puts the scope holding `this` directly inside the scope
        // holding `super`, hence one hop less.
        let object = Environment::get_at(&self.environment, distance - 1, "this");

        match (superclass, object) {
            (Some(Object::Class(superclass)), Some(object)) => {
                let method = superclass
                    .borrow()
                    .find_method(&method.lexeme)
                    .ok_or_else(|| Error::Runtime {
                        token: method.clone(),
                        message: format!("Undefined property '{}'.", method.lexeme),
                    })?;
                Ok(Object::Callable(method.bind(object)))
            }
            _ => Err(Error::Runtime {
                token: keyword.clone(),
                message: "'super' was not resolved to a superclass scope.".to_string(),
            }),
        }
    }
}

impl stmt::Visitor<()> for Interpreter {
    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.evaluate(expression)?;
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.evaluate(expression)?;
        let text = self.stringify(&value);
        writeln!(self.writer, "{text}")?;
        Ok(())
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        let value = match initializer {
            Some(initializer) => self.evaluate(initializer)?,
            None => Object::Null,
        };

        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), value);
        Ok(())
    }

    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let environment = Rc::new(RefCell::new(Environment::from(&self.environment)));
        self.execute_block(statements, environment)
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), Error> {
        let condition = self.evaluate(condition)?;
        if self.is_truthy(&condition) {
            self.execute(then_branch)?;
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)?;
        }
        Ok(())
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        loop {
            let condition = self.evaluate(condition)?;
            if !self.is_truthy(&condition) {
                return Ok(());
            }
            self.execute(body)?;
        }
    }

    fn visit_function_stmt(
        &mut self,
        name: &Token,
        params: &Rc<Vec<Token>>,
        body: &Rc<Vec<Stmt>>,
    ) -> Result<(), Error> {
        // The closure is the environment in force at the declaration, not
        // at any later call.
        let function = Function::User {
            name: name.clone(),
            params: Rc::clone(params),
            body: Rc::clone(body),
            closure: Rc::clone(&self.environment),
            is_initializer: false,
        };

        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Object::Callable(function));
        Ok(())
    }

    fn visit_return_stmt(&mut self, _keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        let value = match value {
            Some(value) => self.evaluate(value)?,
            None => Object::Null,
        };

        // Unwinds to the active Function::call frame.
        Err(Error::Return { value })
    }

    fn visit_class_stmt(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
    ) -> Result<(), Error> {
        let superclass_value = match superclass {
            Some(expression) => match self.evaluate(expression)? {
                Object::Class(class) => Some(class),
                _ => {
                    let Expr::Variable { name, .. } = expression else {
                        unreachable!("class_declaration only parses variable superclasses")
                    };
                    return Err(Error::Runtime {
                        token: name.clone(),
                        message: "Superclass must be a class.".to_string(),
                    });
                }
            },
            None => None,
        };

        // Bind the name first so methods can refer to the class itself;
        // the finished class is assigned over it below.
        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Object::Null);

        // Methods of a subclass close over an extra scope holding `super`.
        let enclosing = if let Some(ref superclass) = superclass_value {
            let environment = Rc::new(RefCell::new(Environment::from(&self.environment)));
            environment
                .borrow_mut()
                .define("super".to_string(), Object::Class(Rc::clone(superclass)));
            Some(mem::replace(&mut self.environment, environment))
        } else {
            None
        };

        let mut class_methods: HashMap<String, Function> = HashMap::new();
        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let function = Function::User {
                    name: name.clone(),
                    params: Rc::clone(params),
                    body: Rc::clone(body),
                    closure: Rc::clone(&self.environment),
                    is_initializer: name.lexeme == "init",
                };
                class_methods.insert(name.lexeme.clone(), function);
            }
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass_value, class_methods);

        if let Some(enclosing) = enclosing {
            self.environment = enclosing;
        }

        self.environment
            .borrow_mut()
            .assign(name, Object::Class(Rc::new(RefCell::new(class))))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    // Write sink the test keeps a second handle on.
    #[derive(Clone)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run_with(interpreter: &mut Interpreter, source: &str) -> Result<(), Error> {
        let mut scanner = Scanner::new(source.to_string());
        let tokens = scanner.scan_tokens();
        let mut parser = Parser::new(tokens);
        let statements = parser.parse()?;

        let mut resolver = Resolver::new(interpreter);
        resolver.resolve_stmts(&statements);
        assert!(!resolver.had_error, "test sources must resolve cleanly");

        interpreter.interpret(&statements)
    }

    fn run(source: &str) -> Result<String, Error> {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter =
            Interpreter::with_writer(Box::new(SharedBuffer(Rc::clone(&buffer))));
        run_with(&mut interpreter, source)?;
        let output = buffer.borrow().clone();
        Ok(String::from_utf8(output).expect("print output is utf-8"))
    }

    fn output(source: &str) -> String {
        run(source).expect("program should run without errors")
    }

    fn runtime_message(source: &str) -> String {
        match run(source) {
            Err(Error::Runtime { message, .. }) => message,
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_follows_precedence() {
        assert_eq!(output("print 1 + 2 * 3;"), "7\n");
        assert_eq!(output("print (1 + 2) * 3;"), "9\n");
        assert_eq!(output("print 7 / 2;"), "3.5\n");
        assert_eq!(output("print -3 - -4;"), "1\n");
    }

    #[test]
    fn integral_numbers_print_without_a_fraction() {
        assert_eq!(output("print 4 / 2;"), "2\n");
        assert_eq!(output("print 2.5 + 2.5;"), "5\n");
        assert_eq!(output("print 0.5;"), "0.5\n");
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert_eq!(output("print 1 / 0;"), "inf\n");
        assert_eq!(output("print -1 / 0;"), "-inf\n");
        assert_eq!(output("print 0 / 0;"), "NaN\n");
    }

    #[test]
    fn plus_concatenates_strings() {
        assert_eq!(output("print \"a\" + \"b\";"), "ab\n");
    }

    #[test]
    fn plus_rejects_mixed_operands() {
        assert_eq!(
            runtime_message("print 1 + \"a\";"),
            "Operands must be two numbers or two strings."
        );
    }

    #[test]
    fn comparisons_require_numbers() {
        assert_eq!(output("print 1 < 2;"), "true\n");
        assert_eq!(output("print 2 <= 2;"), "true\n");
        assert_eq!(output("print 1 > 2;"), "false\n");
        assert_eq!(runtime_message("print 1 < \"a\";"), "Operands must be numbers.");
        assert_eq!(runtime_message("print \"a\" * 2;"), "Operands must be numbers.");
    }

    #[test]
    fn unary_minus_requires_a_number() {
        assert_eq!(runtime_message("print -\"a\";"), "Operand must be a number.");
    }

    #[test]
    fn truthiness_only_rejects_nil_and_false() {
        assert_eq!(output("print !nil;"), "true\n");
        assert_eq!(output("print !false;"), "true\n");
        assert_eq!(output("print !0;"), "false\n");
        assert_eq!(output("print !\"\";"), "false\n");
        assert_eq!(output("if (0) print \"t\"; else print \"f\";"), "t\n");
    }

    #[test]
    fn equality_semantics() {
        assert_eq!(output("print nil == nil;"), "true\n");
        assert_eq!(output("print nil == false;"), "false\n");
        assert_eq!(output("print \"a\" == \"a\";"), "true\n");
        assert_eq!(output("print 0 == false;"), "false\n");
        assert_eq!(output("print 1 == 1;"), "true\n");
        assert_eq!(output("print \"1\" == 1;"), "false\n");
        assert_eq!(output("print 1 != 2;"), "true\n");
    }

    #[test]
    fn logical_operators_return_the_deciding_operand() {
        assert_eq!(output("print \"hi\" or 2;"), "hi\n");
        assert_eq!(output("print nil or \"yes\";"), "yes\n");
        assert_eq!(output("print nil and 2;"), "nil\n");
        assert_eq!(output("print 1 and 2;"), "2\n");
    }

    #[test]
    fn short_circuit_skips_the_right_operand() {
        // The assignment on the right must not run.
        assert_eq!(
            output("var a = 1; true or (a = 2); print a;"),
            "1\n"
        );
        assert_eq!(
            output("var a = 1; false and (a = 2); print a;"),
            "1\n"
        );
    }

    #[test]
    fn uninitialized_variables_default_to_nil() {
        assert_eq!(output("var a; print a;"), "nil\n");
    }

    #[test]
    fn assignment_is_an_expression_yielding_the_value() {
        assert_eq!(output("var a = 1; print a = 2;"), "2\n");
    }

    #[test]
    fn undefined_variables_are_runtime_errors() {
        assert_eq!(runtime_message("print missing;"), "Undefined variable 'missing'.");
        assert_eq!(runtime_message("missing = 1;"), "Undefined variable 'missing'.");
    }

    #[test]
    fn runtime_errors_carry_the_source_line() {
        match run("var a = 1;\nprint missing;") {
            Err(Error::Runtime { token, .. }) => assert_eq!(token.line, 2),
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn blocks_shadow_by_scope() {
        let source = "\
var a = \"global a\";
var b = \"global b\";
var c = \"global c\";
{
  var a = \"outer a\";
  var b = \"outer b\";
  {
    var a = \"inner a\";
    print a;
    print b;
    print c;
  }
  print a;
  print b;
  print c;
}
print a;
print b;
print c;
";
        assert_eq!(
            output(source),
            "inner a\nouter b\nglobal c\nouter a\nouter b\nglobal c\nglobal a\nglobal b\nglobal c\n"
        );
    }

    #[test]
    fn closures_capture_the_declaration_scope() {
        // A later shadowing declaration must not change what the closure
        // already resolved.
        let source = "\
var a = \"global\";
{
  fun showA() {
    print a;
  }
  showA();
  var a = \"block\";
  showA();
}
";
        assert_eq!(output(source), "global\nglobal\n");
    }

    #[test]
    fn closures_share_mutable_captured_state() {
        let source = "\
fun make() {
  var x = 0;
  fun inc() {
    x = x + 1;
    return x;
  }
  return inc;
}
var f = make();
print f();
print f();
print f();
";
        assert_eq!(output(source), "1\n2\n3\n");
    }

    #[test]
    fn separate_closures_get_separate_state() {
        let source = "\
fun make() {
  var x = 0;
  fun inc() {
    x = x + 1;
    return x;
  }
  return inc;
}
var f = make();
var g = make();
print f();
print f();
print g();
";
        assert_eq!(output(source), "1\n2\n1\n");
    }

    #[test]
    fn for_loops_desugar_and_run() {
        let source = "\
var a = 0;
var temp;
for (var b = 1; a < 10; b = temp + b) {
  print a;
  temp = a;
  a = b;
}
";
        assert_eq!(output(source), "0\n1\n1\n2\n3\n5\n8\n");
    }

    #[test]
    fn while_loops_run_until_falsey() {
        assert_eq!(
            output("var i = 3; while (i > 0) { print i; i = i - 1; }"),
            "3\n2\n1\n"
        );
    }

    #[test]
    fn functions_print_their_name() {
        assert_eq!(output("fun f() {} print f;"), "<fn f>\n");
        assert_eq!(output("print clock;"), "<native fn>\n");
    }

    #[test]
    fn clock_returns_seconds() {
        assert_eq!(output("print clock() > 0;"), "true\n");
    }

    #[test]
    fn recursion_works() {
        let source = "\
fun fib(n) {
  if (n < 2) return n;
  return fib(n - 1) + fib(n - 2);
}
print fib(10);
";
        assert_eq!(output(source), "55\n");
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_eq!(output("fun f() {} print f();"), "nil\n");
    }

    #[test]
    fn return_unwinds_through_nested_blocks() {
        let source = "\
fun f() {
  {
    var a = 1;
    {
      return a;
    }
  }
}
print f();
";
        assert_eq!(output(source), "1\n");
    }

    #[test]
    fn arity_is_checked() {
        assert_eq!(
            runtime_message("fun f(a, b) {} f(1);"),
            "Expected 2 arguments but got 1."
        );
        assert_eq!(
            runtime_message("class P { init(x) {} } P(1, 2);"),
            "Expected 1 arguments but got 2."
        );
    }

    #[test]
    fn only_functions_and_classes_are_callable() {
        assert_eq!(runtime_message("\"s\"();"), "Can only call functions and classes.");
        assert_eq!(runtime_message("nil();"), "Can only call functions and classes.");
    }

    #[test]
    fn function_values_compare_by_identity() {
        assert_eq!(output("fun f() {} var g = f; print g == f;"), "true\n");
        // Each property access binds a fresh closure.
        assert_eq!(
            output("class C { m() {} } var i = C(); print i.m == i.m;"),
            "false\n"
        );
    }

    #[test]
    fn classes_print_their_name_and_instances_say_so() {
        assert_eq!(output("class C {} print C;"), "C\n");
        assert_eq!(output("class C {} print C();"), "C instance\n");
    }

    #[test]
    fn fields_are_read_and_written_per_instance() {
        let source = "\
class Bag {}
var a = Bag();
var b = Bag();
a.x = 1;
b.x = 2;
print a.x;
print b.x;
print a.x = 3;
";
        assert_eq!(output(source), "1\n2\n3\n");
    }

    #[test]
    fn fields_shadow_methods() {
        let source = "\
class C {
  m() { return \"method\"; }
}
var c = C();
c.m = \"field\";
print c.m;
";
        assert_eq!(output(source), "field\n");
    }

    #[test]
    fn init_binds_this_to_the_new_instance() {
        assert_eq!(
            output("class P { init(x) { this.x = x; } } print P(5).x;"),
            "5\n"
        );
    }

    #[test]
    fn bare_return_in_init_still_yields_the_instance() {
        let source = "\
class P {
  init() {
    this.x = 1;
    return;
    this.x = 2;
  }
}
print P().x;
";
        assert_eq!(output(source), "1\n");
    }

    #[test]
    fn calling_init_directly_returns_the_instance() {
        assert_eq!(
            output("class P { init() {} } print P().init();"),
            "P instance\n"
        );
    }

    #[test]
    fn methods_close_over_this() {
        let source = "\
class Thing {
  getCallback() {
    fun localFunction() {
      print this;
    }
    return localFunction;
  }
}
var callback = Thing().getCallback();
callback();
";
        assert_eq!(output(source), "Thing instance\n");
    }

    #[test]
    fn methods_are_inherited() {
        let source = "\
class A {
  greet() { return \"A\"; }
}
class B < A {}
print B().greet();
";
        assert_eq!(output(source), "A\n");
    }

    #[test]
    fn super_dispatches_past_the_override() {
        let source = "\
class A {
  greet() { return \"A\"; }
}
class B < A {
  greet() { return super.greet() + \"B\"; }
}
print B().greet();
";
        assert_eq!(output(source), "AB\n");
    }

    #[test]
    fn super_starts_above_the_defining_class_not_the_instance() {
        let source = "\
class A {
  method() { print \"A method\"; }
}
class B < A {
  method() { print \"B method\"; }
  test() { super.method(); }
}
class C < B {}
C().test();
";
        assert_eq!(output(source), "A method\n");
    }

    #[test]
    fn missing_super_method_is_a_runtime_error() {
        assert_eq!(
            runtime_message(
                "class A {} class B < A { m() { return super.missing(); } } B().m();"
            ),
            "Undefined property 'missing'."
        );
    }

    #[test]
    fn superclass_must_be_a_class() {
        assert_eq!(
            runtime_message("var NotAClass = 1; class C < NotAClass {}"),
            "Superclass must be a class."
        );
    }

    #[test]
    fn undefined_properties_are_runtime_errors() {
        assert_eq!(
            runtime_message("class C {} print C().missing;"),
            "Undefined property 'missing'."
        );
    }

    #[test]
    fn property_access_requires_an_instance() {
        assert_eq!(runtime_message("print 1.x;"), "Only instances have properties.");
        assert_eq!(
            runtime_message("var s = \"str\"; s.x = 1;"),
            "Only instances have fields."
        );
    }

    #[test]
    fn definitions_persist_across_separate_parses() {
        // The REPL feeds one line at a time into a shared interpreter;
        // earlier resolutions must stay valid.
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter =
            Interpreter::with_writer(Box::new(SharedBuffer(Rc::clone(&buffer))));

        run_with(&mut interpreter, "fun double(x) { return x + x; } var n = 21;").unwrap();
        run_with(&mut interpreter, "print double(n);").unwrap();

        let printed = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(printed, "42\n");
    }

    #[test]
    fn runtime_error_aborts_the_statement_sequence() {
        let buffer = Rc::new(RefCell::new(Vec::new()));
        let mut interpreter =
            Interpreter::with_writer(Box::new(SharedBuffer(Rc::clone(&buffer))));

        let result = run_with(&mut interpreter, "print 1; print missing; print 2;");
        assert!(matches!(result, Err(Error::Runtime { .. })));

        let printed = String::from_utf8(buffer.borrow().clone()).unwrap();
        assert_eq!(printed, "1\n");
    }
}
