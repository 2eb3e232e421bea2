//! The equality and coercion engine.
//!
//! Every entry point tries α-equality first, then raises the corresponding
//! operation and validates whatever comes back against the question that was
//! asked. Handlers may answer with an equation judgement or with a proof
//! term whose type is the wanted equation; reflection is applied silently.
//! An answer whose endpoints differ from the request is a fatal error: it is
//! the one check that keeps reflection sound.

use crate::error::{Error, Result};
use crate::eval::{value_as_term_judgement, Partial, Runtime};
use crate::jdg::{self, JEqType, Jdg, JTerm, JType};
use crate::loc::Loc;
use crate::name::Name;
use crate::predefined::{
    mk_none, mk_some, AS_EQ, AS_PROD, COERCE, COERCIBLE, CONVERTIBLE, EQUAL_TERM, EQUAL_TYPE,
    NOT_COERCIBLE,
};
use crate::tt::{alpha_equal, alpha_equal_ty, TermNode};
use crate::value::Value;
use log::{log_enabled, trace, Level};

/// Unpack an ML `Some`/`None` answer.
fn as_option(v: &Value, op: Name, loc: Loc) -> Result<Option<&Value>> {
    match v {
        Value::Tag(t, args) if *t == *crate::predefined::NONE && args.is_empty() => Ok(None),
        Value::Tag(t, args) if *t == *crate::predefined::SOME && args.len() == 1 => {
            Ok(Some(&args[0]))
        }
        other => Err(Error::runtime(
            loc,
            format!(
                "the {op} handler must answer Some or None, got {}",
                other.kind_name()
            ),
        )),
    }
}

/// Accept a type equation directly or through reflection of a proof term at
/// the universe.
fn as_eq_type_answer(v: &Value, op: Name, loc: Loc) -> Result<JEqType> {
    match v {
        Value::Judgement(Jdg::EqType(eq)) => Ok(eq.clone()),
        Value::Judgement(Jdg::IsTerm(p)) => jdg::reflect_ty(p),
        other => Err(Error::runtime(
            loc,
            format!(
                "the {op} handler must answer with a type equation, got {}",
                other.kind_name()
            ),
        )),
    }
}

impl Runtime {
    /// Decide `lhs ≡ rhs` at their common type. The finished value is the ML
    /// option of the validated equation.
    pub fn equal_term(&mut self, lhs: JTerm, rhs: JTerm, loc: Loc) -> Result<Partial> {
        if let Some(eq) = jdg::mk_alpha_equal_term(&lhs, &rhs) {
            return Ok(Partial::Done(mk_some(Value::Judgement(Jdg::EqTerm(eq)))));
        }
        if log_enabled!(Level::Trace) {
            trace!("equal_term: {} vs {}", lhs.term(), rhs.term());
        }
        let args = vec![
            Value::Judgement(Jdg::IsTerm(lhs.clone())),
            Value::Judgement(Jdg::IsTerm(rhs.clone())),
        ];
        let p = self.operation(*EQUAL_TERM, args, loc);
        self.seq(p, move |_, v| {
            let Some(answer) = as_option(&v, *EQUAL_TERM, loc)? else {
                return Ok(Partial::Done(mk_none()));
            };
            let eq = match answer {
                Value::Judgement(Jdg::EqTerm(eq)) => eq.clone(),
                Value::Judgement(Jdg::IsTerm(p)) => jdg::reflect(p)?,
                other => {
                    return Err(Error::runtime(
                        loc,
                        format!(
                            "the equal_term handler must answer with a term equation, got {}",
                            other.kind_name()
                        ),
                    ));
                }
            };
            let (_, l, r, ty) = eq.invert();
            if !alpha_equal(&l, lhs.term())
                || !alpha_equal(&r, rhs.term())
                || !alpha_equal_ty(&ty, lhs.ty())
            {
                return Err(Error::invalid_equal_term(
                    loc,
                    format!(
                        "the handler proved {l} ≡ {r} : {ty} but {} ≡ {} : {} was asked",
                        lhs.term(),
                        rhs.term(),
                        lhs.ty()
                    ),
                ));
            }
            Ok(Partial::Done(mk_some(Value::Judgement(Jdg::EqTerm(eq)))))
        })
    }

    /// Decide `lhs ≡ rhs` as types.
    pub fn equal_type(&mut self, lhs: JType, rhs: JType, loc: Loc) -> Result<Partial> {
        if let Some(eq) = jdg::mk_alpha_equal_type(&lhs, &rhs) {
            return Ok(Partial::Done(mk_some(Value::Judgement(Jdg::EqType(eq)))));
        }
        if log_enabled!(Level::Trace) {
            trace!("equal_type: {} vs {}", lhs.ty(), rhs.ty());
        }
        let args = vec![
            Value::Judgement(Jdg::IsType(lhs.clone())),
            Value::Judgement(Jdg::IsType(rhs.clone())),
        ];
        let p = self.operation(*EQUAL_TYPE, args, loc);
        self.seq(p, move |_, v| {
            let Some(answer) = as_option(&v, *EQUAL_TYPE, loc)? else {
                return Ok(Partial::Done(mk_none()));
            };
            let eq = as_eq_type_answer(answer, *EQUAL_TYPE, loc)?;
            let (_, l, r) = eq.invert();
            if !alpha_equal_ty(&l, lhs.ty()) || !alpha_equal_ty(&r, rhs.ty()) {
                return Err(Error::invalid_equal_type(
                    loc,
                    format!(
                        "the handler proved {l} ≡ {r} but {} ≡ {} was asked",
                        lhs.ty(),
                        rhs.ty()
                    ),
                ));
            }
            Ok(Partial::Done(mk_some(Value::Judgement(Jdg::EqType(eq)))))
        })
    }

    /// Bring `j` to the type `target`. The finished value is the coerced
    /// term judgement; an unanswerable request is a typing error.
    pub fn coerce(&mut self, j: JTerm, target: JType, loc: Loc) -> Result<Partial> {
        if alpha_equal_ty(j.ty(), target.ty()) {
            return Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(j))));
        }
        if log_enabled!(Level::Trace) {
            trace!("coerce: {} : {} to {}", j.term(), j.ty(), target.ty());
        }
        let args = vec![
            Value::Judgement(Jdg::IsTerm(j.clone())),
            Value::Judgement(Jdg::IsType(target.clone())),
        ];
        let p = self.operation(*COERCE, args, loc);
        self.seq(p, move |_, v| match &v {
            Value::Tag(t, args) if *t == *NOT_COERCIBLE && args.is_empty() => Err(Error::typing(
                loc,
                format!("cannot coerce {} : {} to {}", j.term(), j.ty(), target.ty()),
            )),
            Value::Tag(t, args) if *t == *CONVERTIBLE && args.len() == 1 => {
                let eq = as_eq_type_answer(&args[0], *COERCE, loc)?;
                let (_, l, r) = eq.invert();
                if !alpha_equal_ty(&l, j.ty()) || !alpha_equal_ty(&r, target.ty()) {
                    return Err(Error::invalid_coerce(
                        loc,
                        format!(
                            "the handler proved {l} ≡ {r} but {} ≡ {} was asked",
                            j.ty(),
                            target.ty()
                        ),
                    ));
                }
                let j2 = jdg::convert(&j, &eq, loc)?;
                Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(j2))))
            }
            Value::Tag(t, args) if *t == *COERCIBLE && args.len() == 1 => {
                let Value::Judgement(Jdg::IsTerm(e2)) = &args[0] else {
                    return Err(Error::runtime(
                        loc,
                        format!(
                            "Coercible expects a term judgement, got {}",
                            args[0].kind_name()
                        ),
                    ));
                };
                if !alpha_equal_ty(e2.ty(), target.ty()) {
                    return Err(Error::invalid_coerce(
                        loc,
                        format!(
                            "the handler supplied a term of type {} where {} was required",
                            e2.ty(),
                            target.ty()
                        ),
                    ));
                }
                Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(e2.clone()))))
            }
            other => Err(Error::runtime(
                loc,
                format!(
                    "the coerce handler must answer NotCoercible, Convertible or Coercible, got {}",
                    other.kind_name()
                ),
            )),
        })
    }

    /// Kernel application with the full protocol: make the head's type a
    /// product (`as_prod` if needed), coerce the argument to the domain, then
    /// let the kernel finish.
    pub fn apply_judgement(&mut self, f: JTerm, arg: JTerm, loc: Loc) -> Result<Partial> {
        if matches!(f.ty().as_term().node(), TermNode::Prod(_)) {
            return self.apply_at_prod(f, arg, loc);
        }
        let args = vec![Value::Judgement(Jdg::IsType(jdg::subtype(f.ty())))];
        let p = self.operation(*AS_PROD, args, loc);
        self.seq(p, move |rt, v| {
            let Some(answer) = as_option(&v, *AS_PROD, loc)? else {
                return Err(Error::typing(
                    loc,
                    format!("cannot apply a term of type {}", f.ty()),
                ));
            };
            let eq = as_eq_type_answer(answer, *AS_PROD, loc)?;
            let (_, l, r) = eq.invert();
            if !alpha_equal_ty(&l, f.ty()) {
                return Err(Error::invalid_equal_type(
                    loc,
                    format!(
                        "the as_prod handler started from {l} but {} was asked",
                        f.ty()
                    ),
                ));
            }
            if !matches!(r.as_term().node(), TermNode::Prod(_)) {
                return Err(Error::invalid_equal_type(
                    loc,
                    format!("the as_prod handler produced {r}, which is not a product"),
                ));
            }
            let f2 = jdg::convert(&f, &eq, loc)?;
            rt.apply_at_prod(f2, arg, loc)
        })
    }

    fn apply_at_prod(&mut self, f: JTerm, arg: JTerm, loc: Loc) -> Result<Partial> {
        let dom = jdg::prod_domain(&jdg::subtype(f.ty()), loc)?;
        let p = self.coerce(arg, dom, loc)?;
        self.seq(p, move |_, v| {
            let arg = value_as_term_judgement(&v, loc)?;
            let j = jdg::form_apply(&f, &arg, loc)?;
            Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(j))))
        })
    }

    /// Turn a proof term into an equation, asking `as_eq` when its type is
    /// not syntactically an equality.
    pub fn reflect_judgement(&mut self, j: JTerm, loc: Loc) -> Result<Partial> {
        if matches!(j.ty().as_term().node(), TermNode::Eq(_)) {
            let eq = jdg::reflect(&j)?;
            return Ok(Partial::Done(Value::Judgement(Jdg::EqTerm(eq))));
        }
        let args = vec![Value::Judgement(Jdg::IsType(jdg::subtype(j.ty())))];
        let p = self.operation(*AS_EQ, args, loc);
        self.seq(p, move |_, v| {
            let Some(answer) = as_option(&v, *AS_EQ, loc)? else {
                return Err(Error::typing(
                    loc,
                    format!("{} is not an equality type", j.ty()),
                ));
            };
            let eq = as_eq_type_answer(answer, *AS_EQ, loc)?;
            let (_, l, r) = eq.invert();
            if !alpha_equal_ty(&l, j.ty()) {
                return Err(Error::invalid_equal_type(
                    loc,
                    format!("the as_eq handler started from {l} but {} was asked", j.ty()),
                ));
            }
            if !matches!(r.as_term().node(), TermNode::Eq(_)) {
                return Err(Error::invalid_equal_type(
                    loc,
                    format!("the as_eq handler produced {r}, which is not an equality type"),
                ));
            }
            let j2 = jdg::convert(&j, &eq, loc)?;
            let eq = jdg::reflect(&j2)?;
            Ok(Partial::Done(Value::Judgement(Jdg::EqTerm(eq))))
        })
    }

    /// Instantiate a λ-judgement, coercing the argument to the domain first.
    pub fn substitute_term_judgement(
        &mut self,
        head: JTerm,
        arg: JTerm,
        loc: Loc,
    ) -> Result<Partial> {
        let dom = jdg::lambda_domain(&head, loc)?;
        let p = self.coerce(arg, dom, loc)?;
        self.seq(p, move |_, v| {
            let arg = value_as_term_judgement(&v, loc)?;
            let j = jdg::substitute_term(&head, &arg, loc)?;
            Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(j))))
        })
    }

    /// Instantiate a Π-judgement.
    pub fn substitute_prod_judgement(
        &mut self,
        head: JType,
        arg: JTerm,
        loc: Loc,
    ) -> Result<Partial> {
        let dom = jdg::prod_domain(&head, loc)?;
        let p = self.coerce(arg, dom, loc)?;
        self.seq(p, move |_, v| {
            let arg = value_as_term_judgement(&v, loc)?;
            let j = jdg::substitute_prod(&head, &arg, loc)?;
            Ok(Partial::Done(Value::Judgement(Jdg::IsType(j))))
        })
    }

    /// Apply a rule by eliminating its Π-type premise by premise.
    pub fn apply_rule_chain(&mut self, r: Name, args: Vec<JTerm>, loc: Loc) -> Result<Partial> {
        let Some(rule) = self.sgn.rule(r) else {
            return Err(Error::typing(loc, format!("unknown rule {r}")));
        };
        if rule.premises.len() != args.len() {
            return Err(Error::typing(
                loc,
                format!(
                    "rule {r} expects {} premises but got {}",
                    rule.premises.len(),
                    args.len()
                ),
            ));
        }
        let j = jdg::form_constant(&self.sgn, r, loc)?;
        self.apply_chain(j, args, loc)
    }

    fn apply_chain(&mut self, f: JTerm, mut args: Vec<JTerm>, loc: Loc) -> Result<Partial> {
        if args.is_empty() {
            return Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(f))));
        }
        let arg = args.remove(0);
        let p = self.apply_judgement(f, arg, loc)?;
        self.seq(p, move |rt, v| {
            let f = value_as_term_judgement(&v, loc)?;
            rt.apply_chain(f, args, loc)
        })
    }

    /// Build a structure, coercing each field to its declared type with the
    /// earlier fields substituted in.
    pub fn form_structure_coerced(
        &mut self,
        s: Name,
        args: Vec<JTerm>,
        loc: Loc,
    ) -> Result<Partial> {
        let Some(def) = self.sgn.sig_def(s) else {
            return Err(Error::typing(loc, format!("unknown signature {s}")));
        };
        if def.fields.len() != args.len() {
            return Err(Error::typing(
                loc,
                format!(
                    "signature {s} has {} fields but {} were given",
                    def.fields.len(),
                    args.len()
                ),
            ));
        }
        self.structure_fields(s, args, 0, vec![], loc)
    }

    fn structure_fields(
        &mut self,
        s: Name,
        args: Vec<JTerm>,
        i: usize,
        done: Vec<JTerm>,
        loc: Loc,
    ) -> Result<Partial> {
        if i == args.len() {
            let j = jdg::form_structure(&self.sgn, s, &done, loc)?;
            return Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(j))));
        }
        let def = self.sgn.sig_def(s).unwrap();
        let prior_rev: Vec<_> = done.iter().rev().map(|j| j.term().clone()).collect();
        let expected = crate::tt::instantiate_ty(&prior_rev, 0, &def.fields[i].ty);
        let target = jdg::subtype(&expected);
        let arg = args[i].clone();
        let p = self.coerce(arg, target, loc)?;
        self.seq(p, move |rt, v| {
            let arg = value_as_term_judgement(&v, loc)?;
            let mut done = done;
            done.push(arg);
            rt.structure_fields(s, args, i + 1, done, loc)
        })
    }
}
