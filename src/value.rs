//! Runtime values of the ML layer.

use crate::eval::YieldPoint;
use crate::jdg::Jdg;
use crate::name::Name;
use crate::syntax::{Comp, HandlerSyntax, Pattern};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Display;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Value {
    Judgement(Jdg),
    Closure(Rc<Closure>),
    Handler(Rc<HandlerClosure>),
    Tag(Name, Vec<Value>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    String(String),
    Ref(usize),
    Dyn(usize),
}

/// A function value. The captured environment sits behind a `RefCell` so
/// `let rec` can first allocate the closures and then tie the knot by
/// writing the shared environment back into each of them.
#[derive(Debug)]
pub struct Closure {
    pub env: RefCell<Env>,
    pub pat: Pattern,
    pub body: Comp,
    /// for display
    pub name: Option<Name>,
}

#[derive(Debug)]
pub struct HandlerClosure {
    pub env: Env,
    pub cases: HandlerSyntax,
}

/// The evaluation environment: the value stack addressed by de Bruijn
/// indices, the `now`-scoped dynamic cell overrides, and the yield frame of
/// the innermost enclosing operation case.
#[derive(Debug, Clone, Default)]
pub struct Env {
    values: Vec<Value>,
    dynamics: HashMap<usize, Value>,
    yield_point: Option<Rc<YieldPoint>>,
}

impl Env {
    pub fn new() -> Env {
        Default::default()
    }

    /// Index 0 is the most recently bound value.
    pub fn lookup(&self, i: usize) -> Option<&Value> {
        let n = self.values.len();
        if i < n {
            Some(&self.values[n - 1 - i])
        } else {
            None
        }
    }

    pub fn push(&mut self, v: Value) {
        self.values.push(v);
    }

    pub fn extend(&mut self, vs: Vec<Value>) {
        self.values.extend(vs);
    }

    pub fn dynamic(&self, cell: usize) -> Option<&Value> {
        self.dynamics.get(&cell)
    }

    pub fn with_dynamic(&self, cell: usize, v: Value) -> Env {
        let mut env = self.clone();
        env.dynamics.insert(cell, v);
        env
    }

    pub fn yield_point(&self) -> Option<&Rc<YieldPoint>> {
        self.yield_point.as_ref()
    }

    pub fn set_yield_point(&mut self, yp: Rc<YieldPoint>) {
        self.yield_point = Some(yp);
    }
}

impl Value {
    pub fn unit() -> Value {
        Value::Tuple(vec![])
    }

    /// A short description for runtime error reports.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Judgement(Jdg::IsType(_)) => "a type judgement",
            Value::Judgement(Jdg::IsTerm(_)) => "a term judgement",
            Value::Judgement(Jdg::EqType(_)) => "a type equation",
            Value::Judgement(Jdg::EqTerm(_)) => "a term equation",
            Value::Closure(_) => "a function",
            Value::Handler(_) => "a handler",
            Value::Tag(_, _) => "a tagged value",
            Value::Tuple(_) => "a tuple",
            Value::List(_) => "a list",
            Value::String(_) => "a string",
            Value::Ref(_) => "a reference",
            Value::Dyn(_) => "a dynamic",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Judgement(j) => write!(f, "{j}"),
            Value::Closure(clo) => match clo.name {
                Some(name) => write!(f, "<function {name}>"),
                None => write!(f, "<function>"),
            },
            Value::Handler(_) => write!(f, "<handler>"),
            Value::Tag(tag, args) => {
                if args.is_empty() {
                    write!(f, "{tag}")
                } else {
                    write!(f, "{tag}(")?;
                    let mut first = true;
                    for v in args {
                        if !first {
                            write!(f, ", ")?;
                        }
                        write!(f, "{v}")?;
                        first = false;
                    }
                    write!(f, ")")
                }
            }
            Value::Tuple(vs) => {
                write!(f, "(")?;
                let mut first = true;
                for v in vs {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                    first = false;
                }
                write!(f, ")")
            }
            Value::List(vs) => {
                write!(f, "[")?;
                let mut first = true;
                for v in vs {
                    if !first {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                    first = false;
                }
                write!(f, "]")
            }
            Value::String(s) => write!(f, "{s:?}"),
            Value::Ref(id) => write!(f, "<ref {id}>"),
            Value::Dyn(id) => write!(f, "<dynamic {id}>"),
        }
    }
}
