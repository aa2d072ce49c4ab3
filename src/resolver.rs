use crate::error::parse_error;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::syntax::{expr, stmt};
use crate::syntax::{Expr, LiteralValue, Stmt};
use crate::token::Token;

use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

// What kind of function body is being resolved; `return` placement rules
// depend on it.
#[derive(Debug, Clone, Copy, PartialEq)]
enum FunctionType {
    None,
    Function,
    Initializer,
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ClassType {
    None,
    Class,
    Subclass,
}

/// Static pass between parser and interpreter. Walks the tree once,
/// tracking a stack of block scopes, and records in the interpreter how
/// many scopes sit between each variable reference and its binding.
/// Globals are not on the stack; a name not found locally stays unresolved
/// and the interpreter falls back to the global environment at runtime.
///
/// Errors set `had_error` and keep resolving, so one bad declaration
/// doesn't hide the next one.
pub struct Resolver<'i> {
    interpreter: &'i mut Interpreter,
    // One map per block scope, innermost last. The bool is false between a
    // name's declaration and the end of its initializer.
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionType,
    current_class: ClassType,
    pub had_error: bool,
}

impl<'i> Resolver<'i> {
    pub fn new(interpreter: &'i mut Interpreter) -> Self {
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            had_error: false,
        }
    }

    pub fn resolve_stmts(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.resolve_stmt(statement);
        }
    }

    fn resolve_stmt(&mut self, statement: &Stmt) {
        let _ = statement.accept(self);
    }

    fn resolve_expr(&mut self, expression: &Expr) {
        let _ = expression.accept(self);
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    // Declaring inserts the name as not-ready-yet, so a reference to it from
    // inside its own initializer (`var a = a;`) can be caught.
    fn declare(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            let already_declared = scope.insert(name.lexeme.clone(), false).is_some();
            if already_declared {
                self.error(name, "Already a variable with this name in this scope.");
            }
        }
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // Innermost scope outward; the hop count of the first scope holding the
    // name goes in the side-table. Not found anywhere means global.
    fn resolve_local(&mut self, id: usize, name: &Token) {
        for (hops, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                self.interpreter.resolve(id, hops);
                return;
            }
        }
    }

    // Unlike the interpreter, the resolver walks straight into a function
    // body at the declaration: parameters go into a fresh scope, then the
    // body is resolved there.
    fn resolve_function(&mut self, params: &[Token], body: &[Stmt], function_type: FunctionType) {
        let enclosing_function = mem::replace(&mut self.current_function, function_type);
        self.begin_scope();
        for param in params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(body);
        self.end_scope();
        self.current_function = enclosing_function;
    }

    fn error(&mut self, token: &Token, message: &str) {
        parse_error(token, message);
        self.had_error = true;
    }
}

impl<'i> expr::Visitor<()> for Resolver<'i> {
    fn visit_variable_expr(&mut self, id: usize, name: &Token) -> Result<(), Error> {
        // Declared-but-not-defined in the current scope means the variable
        // is being read inside its own initializer.
        if let Some(scope) = self.scopes.last() {
            if scope.get(&name.lexeme) == Some(&false) {
                self.error(name, "Can't read local variable in its own initializer.");
            }
        }
        self.resolve_local(id, name);
        Ok(())
    }

    fn visit_assign_expr(&mut self, id: usize, name: &Token, value: &Expr) -> Result<(), Error> {
        self.resolve_expr(value);
        self.resolve_local(id, name);
        Ok(())
    }

    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        _operator: &Token,
        right: &Expr,
    ) -> Result<(), Error> {
        self.resolve_expr(left);
        self.resolve_expr(right);
        Ok(())
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        _paren: &Token,
        arguments: &[Expr],
    ) -> Result<(), Error> {
        self.resolve_expr(callee);
        for argument in arguments {
            self.resolve_expr(argument);
        }
        Ok(())
    }

    // Property names are dispatched dynamically; only the object expression
    // resolves statically.
    fn visit_get_expr(&mut self, object: &Expr, _name: &Token) -> Result<(), Error> {
        self.resolve_expr(object);
        Ok(())
    }

    fn visit_set_expr(&mut self, object: &Expr, _name: &Token, value: &Expr) -> Result<(), Error> {
        self.resolve_expr(value);
        self.resolve_expr(object);
        Ok(())
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_literal_expr(&mut self, _value: &LiteralValue) -> Result<(), Error> {
        Ok(())
    }

    // No control flow happens during resolution, so both operands resolve
    // like any other binary expression.
    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        _operator: &Token,
        right: &Expr,
    ) -> Result<(), Error> {
        self.resolve_expr(left);
        self.resolve_expr(right);
        Ok(())
    }

    fn visit_unary_expr(&mut self, _operator: &Token, right: &Expr) -> Result<(), Error> {
        self.resolve_expr(right);
        Ok(())
    }

    // `this` resolves like a variable bound in the implicit scope the class
    // body pushed around its methods.
    fn visit_this_expr(&mut self, id: usize, keyword: &Token) -> Result<(), Error> {
        if self.current_class == ClassType::None {
            self.error(keyword, "Can't use 'this' outside of a class.");
            return Ok(());
        }
        self.resolve_local(id, keyword);
        Ok(())
    }

    fn visit_super_expr(&mut self, id: usize, keyword: &Token, _method: &Token) -> Result<(), Error> {
        match self.current_class {
            ClassType::None => {
                self.error(keyword, "Can't use 'super' outside of a class.");
            }
            ClassType::Class => {
                self.error(keyword, "Can't use 'super' in a class with no superclass.");
            }
            ClassType::Subclass => self.resolve_local(id, keyword),
        }
        Ok(())
    }
}

impl<'i> stmt::Visitor<()> for Resolver<'i> {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        self.begin_scope();
        self.resolve_stmts(statements);
        self.end_scope();
        Ok(())
    }

    fn visit_class_stmt(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Stmt],
    ) -> Result<(), Error> {
        let enclosing_class = mem::replace(&mut self.current_class, ClassType::Class);

        self.declare(name);
        self.define(name);

        if let Some(superclass) = superclass {
            if let Expr::Variable {
                name: superclass_name,
                ..
            } = superclass
            {
                if superclass_name.lexeme == name.lexeme {
                    self.error(superclass_name, "A class can't inherit from itself.");
                }
            }

            self.current_class = ClassType::Subclass;
            self.resolve_expr(superclass);

            // Methods of a subclass close over a scope holding `super`.
            self.begin_scope();
            if let Some(scope) = self.scopes.last_mut() {
                scope.insert("super".to_string(), true);
            }
        }

        // Every method closes over a scope holding `this`.
        self.begin_scope();
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert("this".to_string(), true);
        }

        for method in methods {
            if let Stmt::Function { name, params, body } = method {
                let declaration = if name.lexeme == "init" {
                    FunctionType::Initializer
                } else {
                    FunctionType::Method
                };
                self.resolve_function(params, body, declaration);
            }
        }

        self.end_scope();

        if superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;
        Ok(())
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> Result<(), Error> {
        self.resolve_expr(condition);
        self.resolve_stmt(then_branch);
        if let Some(else_branch) = else_branch {
            self.resolve_stmt(else_branch);
        }
        Ok(())
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.resolve_expr(expression);
        Ok(())
    }

    fn visit_return_stmt(&mut self, keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        if self.current_function == FunctionType::None {
            self.error(keyword, "Can't return from top-level code.");
        }

        if let Some(value) = value {
            if self.current_function == FunctionType::Initializer {
                self.error(keyword, "Can't return a value from an initializer.");
            }
            self.resolve_expr(value);
        }
        Ok(())
    }

    // The loop body resolves exactly once; resolution is about scopes, not
    // execution counts.
    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        self.resolve_expr(condition);
        self.resolve_stmt(body);
        Ok(())
    }

    // Declare, resolve the initializer with the name unavailable, then
    // define. The split catches `var a = a;` in a local scope.
    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        self.declare(name);
        if let Some(initializer) = initializer {
            self.resolve_expr(initializer);
        }
        self.define(name);
        Ok(())
    }

    // Define eagerly, before the body: a function may recursively refer to
    // itself.
    fn visit_function_stmt(
        &mut self,
        name: &Token,
        params: &Rc<Vec<Token>>,
        body: &Rc<Vec<Stmt>>,
    ) -> Result<(), Error> {
        self.declare(name);
        self.define(name);

        self.resolve_function(params, body, FunctionType::Function);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::Scanner;

    // Resolves a source string and reports whether any resolution error
    // was raised.
    fn resolve(source: &str) -> bool {
        let mut scanner = Scanner::new(source.to_string());
        let tokens = scanner.scan_tokens();
        let mut parser = Parser::new(tokens);
        let statements = parser.parse().expect("test sources must parse");

        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve_stmts(&statements);
        resolver.had_error
    }

    #[test]
    fn duplicate_local_declaration_is_an_error() {
        assert!(resolve("fun f() { var a = 1; var a = 2; }"));
    }

    #[test]
    fn global_redeclaration_is_allowed() {
        assert!(!resolve("var a = 1; var a = 2;"));
    }

    #[test]
    fn reading_a_local_in_its_own_initializer_is_an_error() {
        assert!(resolve("{ var a = 1; { var a = a; } }"));
    }

    #[test]
    fn global_initializer_may_reference_the_outer_binding() {
        // At the top level the name is not on the scope stack, so this is
        // legal (and reads the old global at runtime).
        assert!(!resolve("var a = 1; var a = a + 1;"));
    }

    #[test]
    fn return_outside_a_function_is_an_error() {
        assert!(resolve("return 1;"));
    }

    #[test]
    fn return_with_value_inside_initializer_is_an_error() {
        assert!(resolve("class P { init() { return 1; } }"));
    }

    #[test]
    fn bare_return_inside_initializer_is_allowed() {
        assert!(!resolve("class P { init() { return; } }"));
    }

    #[test]
    fn this_outside_a_class_is_an_error() {
        assert!(resolve("print this;"));
        assert!(resolve("fun f() { return this; }"));
    }

    #[test]
    fn super_outside_a_class_is_an_error() {
        assert!(resolve("print super.m;"));
    }

    #[test]
    fn super_without_a_superclass_is_an_error() {
        assert!(resolve("class A { m() { return super.m(); } }"));
    }

    #[test]
    fn super_inside_a_subclass_resolves() {
        assert!(!resolve(
            "class A { m() { return 1; } } class B < A { m() { return super.m(); } }"
        ));
    }

    #[test]
    fn class_inheriting_from_itself_is_an_error() {
        assert!(resolve("class A < A {}"));
    }

    #[test]
    fn methods_may_use_this() {
        assert!(!resolve("class P { init(x) { this.x = x; } }"));
    }
}
