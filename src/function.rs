use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::syntax::Stmt;
use crate::token::Token;

#[derive(Clone)]
pub enum Function {
    /// A function provided by the host runtime (`clock`), indistinguishable
    /// from a user function at the call site.
    Native {
        arity: usize,
        body: Box<fn(&[Object]) -> Object>,
    },

    /// A user function or method: the declaration plus the environment in
    /// force where it was declared. Parameters and body are shared with the
    /// AST node; two Function values are the same function exactly when
    /// they share both the declaration and the captured environment.
    User {
        name: Token,
        params: Rc<Vec<Token>>,
        body: Rc<Vec<Stmt>>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },
}

impl Function {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: &[Object],
    ) -> Result<Object, Error> {
        match self {
            Function::Native { body, .. } => Ok(body(arguments)),
            Function::User {
                name,
                params,
                body,
                closure,
                is_initializer,
            } => {
                // Every call gets a fresh environment under the closure;
                // recursion needs one frame per live call.
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                for (param, argument) in params.iter().zip(arguments.iter()) {
                    environment
                        .borrow_mut()
                        .define(param.lexeme.clone(), argument.clone());
                }

                match interpreter.execute_block(body, environment) {
                    Err(Error::Return { value }) => {
                        if *is_initializer {
                            // `return;` inside init still yields the instance.
                            self.closed_over_this(name, closure)
                        } else {
                            Ok(value)
                        }
                    }
                    Err(other) => Err(other),
                    Ok(()) => {
                        if *is_initializer {
                            self.closed_over_this(name, closure)
                        } else {
                            Ok(Object::Null)
                        }
                    }
                }
            }
        }
    }

    /// Produces a copy of this method whose closure is a fresh scope with
    /// `this` bound to the given instance.
    pub fn bind(&self, instance: Object) -> Self {
        match self {
            Function::Native { .. } => unreachable!("native functions are never bound"),
            Function::User {
                name,
                params,
                body,
                closure,
                is_initializer,
            } => {
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                environment
                    .borrow_mut()
                    .define("this".to_string(), instance);
                Function::User {
                    name: name.clone(),
                    params: Rc::clone(params),
                    body: Rc::clone(body),
                    closure: environment,
                    is_initializer: *is_initializer,
                }
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { params, .. } => params.len(),
        }
    }

    // An initializer's closure is the scope bind() created, so `this` sits
    // at distance zero.
    fn closed_over_this(
        &self,
        name: &Token,
        closure: &Rc<RefCell<Environment>>,
    ) -> Result<Object, Error> {
        Environment::get_at(closure, 0, "this").ok_or_else(|| Error::Runtime {
            token: name.clone(),
            message: "Initializer lost track of 'this'.".to_string(),
        })
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Function::Native {
                    body: left_body, ..
                },
                Function::Native {
                    body: right_body, ..
                },
            ) => left_body == right_body,
            (
                Function::User {
                    body: left_body,
                    closure: left_closure,
                    ..
                },
                Function::User {
                    body: right_body,
                    closure: right_closure,
                    ..
                },
            ) => Rc::ptr_eq(left_body, right_body) && Rc::ptr_eq(left_closure, right_closure),
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { .. } => write!(f, "<native fn>"),
            Function::User { name, .. } => write!(f, "<fn {}>", name.lexeme),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
