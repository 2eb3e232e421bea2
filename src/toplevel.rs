//! The toplevel driver: executes a stream of desugared items against the
//! persistent session state.

use crate::error::{Error, Result};
use crate::eval::{value_as_type_judgement, Partial, Runtime};
use crate::jdg::{self, Jdg, JType};
use crate::name::Atom;
use crate::predefined;
use crate::sig::{Decl, Rule, SigDef, SigField};
use crate::syntax::{Comp, TopCmd, TopItem};
use crate::tt::abstract_atoms_ty;
use crate::value::{Closure, Env, Value};
use log::debug;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Toplevel {
    pub rt: Runtime,
    env: Env,
    verbosity: usize,
}

impl Toplevel {
    pub fn new() -> Result<Toplevel> {
        let mut rt = Runtime::new();
        predefined::install(&mut rt.sgn)?;
        Ok(Toplevel {
            rt,
            env: Env::new(),
            verbosity: 0,
        })
    }

    pub fn set_verbosity(&mut self, verbosity: usize) {
        self.verbosity = verbosity;
    }

    /// Execute one item. `TopDo` returns its value; everything else `None`.
    pub fn run(&mut self, item: &TopItem) -> Result<Option<Value>> {
        let loc = item.loc;
        match &item.cmd {
            TopCmd::TopLet(clauses) => {
                for clause in clauses {
                    let v = self.drive(&clause.comp)?;
                    let mut out = vec![];
                    if !self.rt.match_pattern(&clause.pat, &v, &mut out)? {
                        return Err(Error::match_fail(loc, v.to_string()));
                    }
                    self.env.extend(out);
                }
                Ok(None)
            }

            TopCmd::TopLetRec(clauses) => {
                let closures: Vec<Rc<Closure>> = clauses
                    .iter()
                    .map(|cl| {
                        Rc::new(Closure {
                            env: RefCell::new(Env::new()),
                            pat: cl.arg.clone(),
                            body: cl.body.clone(),
                            name: Some(cl.name),
                        })
                    })
                    .collect();
                for clo in &closures {
                    self.env.push(Value::Closure(clo.clone()));
                }
                for clo in &closures {
                    *clo.env.borrow_mut() = self.env.clone();
                }
                Ok(None)
            }

            TopCmd::TopDo(c) => {
                let v = self.drive(c)?;
                if self.verbosity >= 2 {
                    eprintln!("mirach: {v}");
                }
                Ok(Some(v))
            }

            TopCmd::TopFail(c) => match self.drive(c) {
                Ok(v) => Err(Error::runtime(
                    loc,
                    format!("expected a failure but the computation returned {v}"),
                )),
                Err(e) if e.is_fatal() => Err(e),
                Err(e) => {
                    if self.verbosity >= 2 {
                        eprintln!("mirach: failed as expected: {e}");
                    }
                    debug!("expected failure: {e}");
                    Ok(None)
                }
            },

            TopCmd::TopDynamic(x, c) => {
                let v = self.drive(c)?;
                let cell = self.rt.alloc_dynamic(v);
                self.rt.sgn.declare(loc, *x, Decl::Dynamic { cell })?;
                Ok(None)
            }

            TopCmd::TopNow(x, c) => {
                let Some(cell) = self.rt.sgn.dynamic_cell(*x) else {
                    return Err(Error::typing(loc, format!("unknown dynamic {x}")));
                };
                let v = self.drive(c)?;
                self.rt.set_dynamic_default(cell, v);
                Ok(None)
            }

            TopCmd::DeclOperation(op, arity) => {
                self.rt
                    .sgn
                    .declare(loc, *op, Decl::MlOperation { arity: *arity })?;
                Ok(None)
            }

            TopCmd::DeclConstant(c, tyc) => {
                let v = self.drive(tyc)?;
                let jty = value_as_type_judgement(&v, loc)?;
                if !jty.assumptions().is_empty() {
                    return Err(Error::typing(
                        loc,
                        format!("the type of {c} depends on assumptions"),
                    ));
                }
                self.rt
                    .sgn
                    .declare(loc, *c, Decl::Constant(jty.ty().clone()))?;
                Ok(None)
            }

            TopCmd::DeclRule {
                name,
                premises,
                conclusion,
            } => {
                let mut env = self.env.clone();
                let mut atoms: Vec<(Atom, JType)> = Vec::with_capacity(premises.len());
                for (hint, comp) in premises {
                    let v = self.drive_in(&env, comp)?;
                    let jt = value_as_type_judgement(&v, loc)?;
                    let (a, ja) = jdg::fresh_atom(*hint, &jt);
                    env.push(Value::Judgement(Jdg::IsTerm(ja)));
                    atoms.push((a, jt));
                }
                let v = self.drive_in(&env, conclusion)?;
                let mut jty = value_as_type_judgement(&v, loc)?;
                for (a, dom) in atoms.iter().rev() {
                    jty = jdg::form_prod(*a, dom, &jty);
                }
                if !jty.assumptions().is_empty() {
                    return Err(Error::typing(
                        loc,
                        format!("rule {name} depends on assumptions"),
                    ));
                }
                self.rt.sgn.declare(
                    loc,
                    *name,
                    Decl::Rule(Rule {
                        premises: premises.iter().map(|(hint, _)| *hint).collect(),
                        ty: jty.ty().clone(),
                    }),
                )?;
                Ok(None)
            }

            TopCmd::DeclSignature(s, fields) => {
                let mut env = self.env.clone();
                let mut atoms: Vec<Atom> = Vec::with_capacity(fields.len());
                let mut decl_fields = Vec::with_capacity(fields.len());
                for (label, comp) in fields {
                    let v = self.drive_in(&env, comp)?;
                    let jt = value_as_type_judgement(&v, loc)?;
                    let rev: Vec<Atom> = atoms.iter().rev().copied().collect();
                    let ty = abstract_atoms_ty(&rev, 0, jt.ty());
                    if ty.assumptions().atoms().next().is_some() {
                        return Err(Error::typing(
                            loc,
                            format!("the field {label} of {s} depends on assumptions"),
                        ));
                    }
                    decl_fields.push(SigField {
                        label: *label,
                        hint: *label,
                        ty,
                    });
                    let (a, ja) = jdg::fresh_atom(*label, &jt);
                    env.push(Value::Judgement(Jdg::IsTerm(ja)));
                    atoms.push(a);
                }
                self.rt.sgn.declare(
                    loc,
                    *s,
                    Decl::SigDef(SigDef {
                        fields: decl_fields,
                    }),
                )?;
                Ok(None)
            }

            TopCmd::DeclMlType(x, constructors) => {
                self.rt.sgn.declare(
                    loc,
                    *x,
                    Decl::MlType {
                        constructors: constructors.clone(),
                    },
                )?;
                Ok(None)
            }
        }
    }

    /// Execute every item in order, stopping at the first error.
    pub fn run_all<'a>(&mut self, items: impl IntoIterator<Item = &'a TopItem>) -> Result<()> {
        for item in items {
            self.run(item)?;
        }
        Ok(())
    }

    fn drive(&mut self, c: &Comp) -> Result<Value> {
        let env = self.env.clone();
        self.drive_in(&env, c)
    }

    /// Evaluate to completion, answering operations that escape every
    /// handler with the predefined defaults.
    fn drive_in(&mut self, env: &Env, c: &Comp) -> Result<Value> {
        let mut p = self.rt.eval_comp(env, c)?;
        loop {
            match p {
                Partial::Done(v) => return Ok(v),
                Partial::Suspended(opc) => match predefined::default_answer(opc.op) {
                    Some(v) => {
                        debug!("default answer for {}", opc.op);
                        p = opc.cont.resume(&mut self.rt, v)?;
                    }
                    None => {
                        return Err(Error::runtime(
                            opc.loc,
                            format!("unhandled operation {}", opc.op),
                        ));
                    }
                },
            }
        }
    }
}
