use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::function::Function;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::token::Token;

// The class stores the behaviour, the instance stores the state.
#[derive(Debug)]
pub struct LoxClass {
    pub name: String,
    superclass: Option<Rc<RefCell<LoxClass>>>,
    methods: HashMap<String, Function>,
}

impl LoxClass {
    pub fn new(
        name: String,
        superclass: Option<Rc<RefCell<LoxClass>>>,
        methods: HashMap<String, Function>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Looks up a method on this class, then up the inheritance chain.
    pub fn find_method(&self, name: &str) -> Option<Function> {
        if let Some(method) = self.methods.get(name) {
            Some(method.clone())
        } else if let Some(ref superclass) = self.superclass {
            superclass.borrow().find_method(name)
        } else {
            None
        }
    }

    /// A class called as a function constructs an instance; its arity is
    /// the initializer's, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method("init")
            .map(|initializer| initializer.arity())
            .unwrap_or(0)
    }

    pub fn instantiate(
        class: &Rc<RefCell<LoxClass>>,
        interpreter: &mut Interpreter,
        arguments: &[Object],
    ) -> Result<Object, Error> {
        let instance = LoxInstance::new(class);

        let initializer = class.borrow().find_method("init");
        if let Some(initializer) = initializer {
            initializer.bind(instance.clone()).call(interpreter, arguments)?;
        }

        Ok(instance)
    }
}

#[derive(Debug)]
pub struct LoxInstance {
    pub class: Rc<RefCell<LoxClass>>,
    fields: HashMap<String, Object>,
}

impl LoxInstance {
    /// Returns a fresh `LoxInstance` already wrapped in `Object::Instance`.
    pub fn new(class: &Rc<RefCell<LoxClass>>) -> Object {
        let instance = LoxInstance {
            class: Rc::clone(class),
            fields: HashMap::new(),
        };

        Object::Instance(Rc::new(RefCell::new(instance)))
    }

    /// Property read: fields shadow methods; a method hit comes back bound
    /// to `instance` (this instance as an Object, needed because `self`
    /// cannot re-wrap itself).
    pub fn get(&self, name: &Token, instance: &Object) -> Result<Object, Error> {
        if let Some(field) = self.fields.get(&name.lexeme) {
            Ok(field.clone())
        } else if let Some(method) = self.class.borrow().find_method(&name.lexeme) {
            Ok(Object::Callable(method.bind(instance.clone())))
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: format!("Undefined property '{}'.", name.lexeme),
            })
        }
    }

    // Fields can be created freely, so there is no existence check.
    pub fn set(&mut self, name: &Token, value: Object) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
