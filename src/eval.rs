//! The cooperative evaluator.
//!
//! Evaluating a computation yields a [Partial]: either a finished value or a
//! suspended operation carrying a one-shot continuation. Sequencing threads
//! suspensions outward through [Runtime::seq], so an operation suspends every
//! frame between the raise site and the handler that takes it; resuming runs
//! the saved frames in order. Handlers are deep: both forwarding and `yield`
//! re-install the handler around the resumed continuation.

use crate::error::{Error, Result};
use crate::jdg::{self, Jdg, JTerm, JType};
use crate::loc::Loc;
use crate::name::Name;
use crate::sig::Signature;
use crate::syntax::{Comp, CompNode, Expr, ExprNode, MatchCase, Pattern, TtPattern};
use crate::tt::{Term, TermNode, Type};
use crate::value::{Closure, Env, HandlerClosure, Value};
use log::{log_enabled, trace, Level};
use std::cell::RefCell;
use std::rc::Rc;

pub struct Runtime {
    pub sgn: Signature,
    refs: Vec<Value>,
    dyn_defaults: Vec<Value>,
}

/// The outcome of one evaluation step: a value, or an operation waiting for
/// some enclosing handler (ultimately the driver) to answer it.
#[derive(Debug)]
pub enum Partial {
    Done(Value),
    Suspended(OpCall),
}

#[derive(Debug)]
pub struct OpCall {
    pub op: Name,
    pub args: Vec<Value>,
    pub loc: Loc,
    pub cont: Resume,
}

/// A one-shot resumable continuation.
pub struct Resume(Box<dyn FnOnce(&mut Runtime, Value) -> Result<Partial>>);

impl std::fmt::Debug for Resume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Resume(..)")
    }
}

impl Resume {
    pub fn new(f: impl FnOnce(&mut Runtime, Value) -> Result<Partial> + 'static) -> Resume {
        Resume(Box::new(f))
    }

    pub fn resume(self, rt: &mut Runtime, v: Value) -> Result<Partial> {
        (self.0)(rt, v)
    }
}

/// The continuation captured by a handler's operation case, consumed by
/// `yield`. Resuming twice is a runtime error.
pub struct YieldPoint {
    pub handler: Rc<HandlerClosure>,
    pub cont: RefCell<Option<Resume>>,
    pub loc: Loc,
}

impl std::fmt::Debug for YieldPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<yield point at {}>", self.loc)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Runtime::new()
    }
}

impl Runtime {
    pub fn new() -> Runtime {
        Runtime {
            sgn: Signature::new(),
            refs: vec![],
            dyn_defaults: vec![],
        }
    }

    pub fn alloc_ref(&mut self, v: Value) -> usize {
        self.refs.push(v);
        self.refs.len() - 1
    }

    pub fn alloc_dynamic(&mut self, v: Value) -> usize {
        self.dyn_defaults.push(v);
        self.dyn_defaults.len() - 1
    }

    pub fn set_dynamic_default(&mut self, cell: usize, v: Value) {
        self.dyn_defaults[cell] = v;
    }

    pub fn dynamic_default(&self, cell: usize) -> Value {
        self.dyn_defaults[cell].clone()
    }

    /// Run `k` on the eventual value of `p`, delaying it across suspensions.
    pub fn seq(
        &mut self,
        p: Partial,
        k: impl FnOnce(&mut Runtime, Value) -> Result<Partial> + 'static,
    ) -> Result<Partial> {
        match p {
            Partial::Done(v) => k(self, v),
            Partial::Suspended(opc) => {
                let OpCall {
                    op,
                    args,
                    loc,
                    cont,
                } = opc;
                Ok(Partial::Suspended(OpCall {
                    op,
                    args,
                    loc,
                    cont: Resume::new(move |rt, v| {
                        let p = cont.resume(rt, v)?;
                        rt.seq(p, k)
                    }),
                }))
            }
        }
    }

    /// Raise an operation from inside the runtime itself.
    pub fn operation(&mut self, op: Name, args: Vec<Value>, loc: Loc) -> Partial {
        Partial::Suspended(OpCall {
            op,
            args,
            loc,
            cont: Resume::new(|_, v| Ok(Partial::Done(v))),
        })
    }

    pub fn eval_comp(&mut self, env: &Env, c: &Comp) -> Result<Partial> {
        if log_enabled!(Level::Trace) {
            trace!("eval at {}", c.loc());
        }
        let loc = c.loc();
        match c.node() {
            CompNode::Return(e) => Ok(Partial::Done(self.eval_expr(env, e)?)),

            CompNode::Universe => Ok(Partial::Done(Value::Judgement(Jdg::IsType(jdg::universe(
                loc,
            ))))),

            CompNode::Dynamic(x) => {
                let Some(cell) = self.sgn.dynamic_cell(*x) else {
                    return Err(Error::runtime(loc, format!("unknown dynamic {x}")));
                };
                Ok(Partial::Done(Value::Dyn(cell)))
            }

            CompNode::Sequence(c1, c2) => {
                let env2 = env.clone();
                let c2 = c2.clone();
                let p = self.eval_comp(env, c1)?;
                self.seq(p, move |rt, _| rt.eval_comp(&env2, &c2))
            }

            CompNode::Let(_, _) => self.eval_let_from(env.clone(), c.clone(), 0),

            CompNode::LetRec(clauses, body) => {
                let mut env2 = env.clone();
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
                    env2.push(Value::Closure(clo.clone()));
                }
                // tie the knot
                for clo in &closures {
                    *clo.env.borrow_mut() = env2.clone();
                }
                self.eval_comp(&env2, body)
            }

            CompNode::Match(scrut, _) => {
                let env2 = env.clone();
                let c2 = c.clone();
                let p = self.eval_comp(env, scrut)?;
                self.seq(p, move |rt, v| {
                    let CompNode::Match(_, cases) = c2.node() else {
                        unreachable!()
                    };
                    for case in cases {
                        if let Some(p) = rt.eval_case(&env2, case, &v)? {
                            return Ok(p);
                        }
                    }
                    Err(Error::match_fail(c2.loc(), v.to_string()))
                })
            }

            CompNode::Operation(op, args) => {
                let Some(arity) = self.sgn.operation_arity(*op) else {
                    return Err(Error::runtime(loc, format!("unknown operation {op}")));
                };
                if arity != args.len() {
                    return Err(Error::runtime(
                        loc,
                        format!("operation {op} expects {arity} arguments, got {}", args.len()),
                    ));
                }
                let vals = args
                    .iter()
                    .map(|a| self.eval_expr(env, a))
                    .collect::<Result<Vec<_>>>()?;
                Ok(self.operation(*op, vals, loc))
            }

            CompNode::With(hexpr, body) => {
                let hv = self.eval_expr(env, hexpr)?;
                let Value::Handler(h) = hv else {
                    return Err(Error::runtime(
                        loc,
                        format!("with expects a handler, got {}", hv.kind_name()),
                    ));
                };
                let result = self
                    .eval_comp(env, body)
                    .and_then(|p| self.handle_with(h.clone(), p));
                let Some(fin) = h.cases.on_finally.clone() else {
                    return result;
                };
                let h2 = h.clone();
                match result {
                    Ok(p) => self.seq(p, move |rt, v| {
                        match rt.eval_case(&h2.env, &fin, &v)? {
                            Some(p) => Ok(p),
                            None => Err(Error::match_fail(fin.body.loc(), v.to_string())),
                        }
                    }),
                    // the cleanup also runs when the handled body raises; the
                    // original error resurfaces once it completes, unless the
                    // cleanup itself raises
                    Err(e) => {
                        if e.is_fatal() {
                            return Err(e);
                        }
                        match self.eval_case(&h2.env, &fin, &Value::unit())? {
                            Some(p) => self.seq(p, move |_, _| Err(e)),
                            None => Err(e),
                        }
                    }
                }
            }

            CompNode::Yield(e) => {
                let v = self.eval_expr(env, e)?;
                let Some(yp) = env.yield_point().cloned() else {
                    return Err(Error::runtime(loc, "yield outside an operation case"));
                };
                let Some(cont) = yp.cont.borrow_mut().take() else {
                    return Err(Error::runtime(loc, "the continuation was already resumed"));
                };
                let p = cont.resume(self, v)?;
                self.handle_with(yp.handler.clone(), p)
            }

            CompNode::Apply(fe, ae) => {
                let fv = self.eval_expr(env, fe)?;
                let av = self.eval_expr(env, ae)?;
                match fv {
                    Value::Closure(clo) => self.call_closure(&clo, av, loc),
                    Value::Judgement(Jdg::IsTerm(j)) => {
                        let arg = value_as_term_judgement(&av, loc)?;
                        self.apply_judgement(j, arg, loc)
                    }
                    other => Err(Error::runtime(
                        loc,
                        format!("cannot apply {}", other.kind_name()),
                    )),
                }
            }

            CompNode::MkRef(e) => {
                let v = self.eval_expr(env, e)?;
                let id = self.alloc_ref(v);
                Ok(Partial::Done(Value::Ref(id)))
            }

            CompNode::Lookup(e) => {
                let v = self.eval_expr(env, e)?;
                match v {
                    Value::Ref(id) => Ok(Partial::Done(self.refs[id].clone())),
                    // reading a first-class dynamic sees the current scope
                    Value::Dyn(cell) => {
                        let v = match env.dynamic(cell) {
                            Some(v) => v.clone(),
                            None => self.dynamic_default(cell),
                        };
                        Ok(Partial::Done(v))
                    }
                    other => Err(Error::runtime(
                        loc,
                        format!("lookup expects a reference, got {}", other.kind_name()),
                    )),
                }
            }

            CompNode::Update(e1, e2) => {
                let v1 = self.eval_expr(env, e1)?;
                let Value::Ref(id) = v1 else {
                    return Err(Error::runtime(
                        loc,
                        format!("update expects a reference, got {}", v1.kind_name()),
                    ));
                };
                let v2 = self.eval_expr(env, e2)?;
                self.refs[id] = v2;
                Ok(Partial::Done(Value::unit()))
            }

            CompNode::Now(x, vc, body) => {
                let Some(cell) = self.sgn.dynamic_cell(*x) else {
                    return Err(Error::runtime(loc, format!("unknown dynamic {x}")));
                };
                let env2 = env.clone();
                let body = body.clone();
                let p = self.eval_comp(env, vc)?;
                self.seq(p, move |rt, v| {
                    let env3 = env2.with_dynamic(cell, v);
                    rt.eval_comp(&env3, &body)
                })
            }

            CompNode::Current(x) => {
                let Some(cell) = self.sgn.dynamic_cell(*x) else {
                    return Err(Error::runtime(loc, format!("unknown dynamic {x}")));
                };
                let v = match env.dynamic(cell) {
                    Some(v) => v.clone(),
                    None => self.dynamic_default(cell),
                };
                Ok(Partial::Done(v))
            }

            CompNode::Ascribe(body, tyc) => {
                let env2 = env.clone();
                let body = body.clone();
                let p = self.eval_comp(env, tyc)?;
                self.seq(p, move |rt, tv| {
                    let target = value_as_type_judgement(&tv, loc)?;
                    let p = rt.eval_comp(&env2, &body)?;
                    rt.seq(p, move |rt, cv| {
                        let j = value_as_term_judgement(&cv, loc)?;
                        rt.coerce(j, target, loc)
                    })
                })
            }

            CompNode::Abstract(hint, tyc, body) => {
                let hint = *hint;
                let env2 = env.clone();
                let body = body.clone();
                let p = self.eval_comp(env, tyc)?;
                self.seq(p, move |rt, tv| {
                    let dom = value_as_type_judgement(&tv, loc)?;
                    let (a, ja) = jdg::fresh_atom(hint, &dom);
                    let mut env3 = env2.clone();
                    env3.push(Value::Judgement(Jdg::IsTerm(ja)));
                    let p = rt.eval_comp(&env3, &body)?;
                    rt.seq(p, move |_, bv| match bv {
                        Value::Judgement(Jdg::IsTerm(j)) => Ok(Partial::Done(Value::Judgement(
                            Jdg::IsTerm(jdg::form_lambda(a, &dom, &j)),
                        ))),
                        Value::Judgement(Jdg::IsType(jt)) => Ok(Partial::Done(Value::Judgement(
                            Jdg::IsType(jdg::form_prod(a, &dom, &jt)),
                        ))),
                        other => Err(Error::runtime(
                            loc,
                            format!("cannot abstract over {}", other.kind_name()),
                        )),
                    })
                })
            }

            CompNode::Substitute(head, argc) => {
                let env2 = env.clone();
                let argc = argc.clone();
                let p = self.eval_comp(env, head)?;
                self.seq(p, move |rt, hv| {
                    let p = rt.eval_comp(&env2, &argc)?;
                    rt.seq(p, move |rt, av| {
                        let arg = value_as_term_judgement(&av, loc)?;
                        match hv {
                            Value::Judgement(Jdg::IsTerm(j)) => {
                                rt.substitute_term_judgement(j, arg, loc)
                            }
                            Value::Judgement(Jdg::IsType(jt)) => {
                                rt.substitute_prod_judgement(jt, arg, loc)
                            }
                            other => Err(Error::runtime(
                                loc,
                                format!("cannot substitute into {}", other.kind_name()),
                            )),
                        }
                    })
                })
            }

            CompNode::Eq(c1, c2) => {
                let env2 = env.clone();
                let c2 = c2.clone();
                let p = self.eval_comp(env, c1)?;
                self.seq(p, move |rt, v1| {
                    let j1 = value_as_term_judgement(&v1, loc)?;
                    let p = rt.eval_comp(&env2, &c2)?;
                    rt.seq(p, move |rt, v2| {
                        let j2 = value_as_term_judgement(&v2, loc)?;
                        let target = jdg::subtype(j1.ty());
                        let p = rt.coerce(j2, target, loc)?;
                        rt.seq(p, move |_, v2c| {
                            let j2c = value_as_term_judgement(&v2c, loc)?;
                            let jty = jdg::form_eq(&j1, &j2c, loc)?;
                            Ok(Partial::Done(Value::Judgement(Jdg::IsType(jty))))
                        })
                    })
                })
            }

            CompNode::Refl(body) => {
                let p = self.eval_comp(env, body)?;
                self.seq(p, move |_, v| {
                    let j = value_as_term_judgement(&v, loc)?;
                    Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(jdg::form_refl(
                        &j, loc,
                    )))))
                })
            }

            CompNode::Reflect(body) => {
                let p = self.eval_comp(env, body)?;
                self.seq(p, move |rt, v| {
                    let j = value_as_term_judgement(&v, loc)?;
                    rt.reflect_judgement(j, loc)
                })
            }

            CompNode::Constant(name) => {
                let j = jdg::form_constant(&self.sgn, *name, loc)?;
                Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(j))))
            }

            CompNode::RuleApply(_, _) => self.eval_rule_args(env.clone(), c.clone(), 0, vec![]),

            CompNode::Signature(s) => {
                let j = jdg::form_signature(&self.sgn, *s, loc)?;
                Ok(Partial::Done(Value::Judgement(Jdg::IsType(j))))
            }

            CompNode::Structure(_, _) => {
                self.eval_structure_args(env.clone(), c.clone(), 0, vec![])
            }

            CompNode::Projection(body, label) => {
                let label = *label;
                let p = self.eval_comp(env, body)?;
                self.seq(p, move |rt, v| {
                    let j = value_as_term_judgement(&v, loc)?;
                    let proj = jdg::form_projection(&rt.sgn, &j, label, loc)?;
                    Ok(Partial::Done(Value::Judgement(Jdg::IsTerm(proj))))
                })
            }
        }
    }

    fn eval_let_from(&mut self, env: Env, c: Comp, i: usize) -> Result<Partial> {
        let CompNode::Let(clauses, body) = c.node() else {
            unreachable!()
        };
        if i == clauses.len() {
            let body = body.clone();
            return self.eval_comp(&env, &body);
        }
        let clause_comp = clauses[i].comp.clone();
        let p = self.eval_comp(&env, &clause_comp)?;
        let c2 = c.clone();
        self.seq(p, move |rt, v| {
            let CompNode::Let(clauses, _) = c2.node() else {
                unreachable!()
            };
            let mut out = vec![];
            if !rt.match_pattern(&clauses[i].pat, &v, &mut out)? {
                return Err(Error::match_fail(c2.loc(), v.to_string()));
            }
            let mut env = env;
            env.extend(out);
            rt.eval_let_from(env, c2, i + 1)
        })
    }

    fn eval_rule_args(
        &mut self,
        env: Env,
        c: Comp,
        i: usize,
        acc: Vec<JTerm>,
    ) -> Result<Partial> {
        let CompNode::RuleApply(r, comps) = c.node() else {
            unreachable!()
        };
        if i == comps.len() {
            return self.apply_rule_chain(*r, acc, c.loc());
        }
        let comp = comps[i].clone();
        let p = self.eval_comp(&env, &comp)?;
        let c2 = c.clone();
        self.seq(p, move |rt, v| {
            let j = value_as_term_judgement(&v, c2.loc())?;
            let mut acc = acc;
            acc.push(j);
            rt.eval_rule_args(env, c2, i + 1, acc)
        })
    }

    fn eval_structure_args(
        &mut self,
        env: Env,
        c: Comp,
        i: usize,
        acc: Vec<JTerm>,
    ) -> Result<Partial> {
        let CompNode::Structure(s, comps) = c.node() else {
            unreachable!()
        };
        if i == comps.len() {
            return self.form_structure_coerced(*s, acc, c.loc());
        }
        let comp = comps[i].clone();
        let p = self.eval_comp(&env, &comp)?;
        let c2 = c.clone();
        self.seq(p, move |rt, v| {
            let j = value_as_term_judgement(&v, c2.loc())?;
            let mut acc = acc;
            acc.push(j);
            rt.eval_structure_args(env, c2, i + 1, acc)
        })
    }

    fn eval_expr(&self, env: &Env, e: &Expr) -> Result<Value> {
        let loc = e.loc();
        match e.node() {
            ExprNode::Bound(i) => env
                .lookup(*i)
                .cloned()
                .ok_or_else(|| Error::runtime(loc, format!("unbound variable {i}"))),
            ExprNode::String(s) => Ok(Value::String(s.clone())),
            ExprNode::Tag(tag, args) => {
                if let Some(arity) = self.sgn.tag_arity(*tag) {
                    if arity != args.len() {
                        return Err(Error::runtime(
                            loc,
                            format!("{tag} expects {arity} arguments, got {}", args.len()),
                        ));
                    }
                }
                Ok(Value::Tag(
                    *tag,
                    args.iter()
                        .map(|a| self.eval_expr(env, a))
                        .collect::<Result<Vec<_>>>()?,
                ))
            }
            ExprNode::Tuple(es) => Ok(Value::Tuple(
                es.iter()
                    .map(|a| self.eval_expr(env, a))
                    .collect::<Result<Vec<_>>>()?,
            )),
            ExprNode::List(es) => Ok(Value::List(
                es.iter()
                    .map(|a| self.eval_expr(env, a))
                    .collect::<Result<Vec<_>>>()?,
            )),
            ExprNode::Function(pat, body) => Ok(Value::Closure(Rc::new(Closure {
                env: RefCell::new(env.clone()),
                pat: pat.clone(),
                body: body.clone(),
                name: None,
            }))),
            ExprNode::Handler(h) => Ok(Value::Handler(Rc::new(HandlerClosure {
                env: env.clone(),
                cases: h.clone(),
            }))),
        }
    }

    /// Fold a handler over a partial result. Deep semantics: forwarded and
    /// yielded continuations both run back under this handler.
    pub fn handle_with(&mut self, h: Rc<HandlerClosure>, p: Partial) -> Result<Partial> {
        match p {
            Partial::Done(v) => match &h.cases.on_value {
                Some(case) => {
                    let case = case.clone();
                    match self.eval_case(&h.env, &case, &v)? {
                        Some(p) => Ok(p),
                        None => Err(Error::match_fail(case.body.loc(), v.to_string())),
                    }
                }
                None => Ok(Partial::Done(v)),
            },
            Partial::Suspended(opc) => {
                let OpCall {
                    op,
                    args,
                    loc,
                    cont,
                } = opc;
                let mut found = None;
                for case in &h.cases.on_op {
                    if case.op != op || case.pats.len() != args.len() {
                        continue;
                    }
                    let mut out = vec![];
                    let mut ok = true;
                    for (pat, v) in std::iter::zip(&case.pats, &args) {
                        if !self.match_pattern(pat, v, &mut out)? {
                            ok = false;
                            break;
                        }
                    }
                    if ok {
                        found = Some((case.body.clone(), out));
                        break;
                    }
                }
                match found {
                    Some((body, bindings)) => {
                        let yp = Rc::new(YieldPoint {
                            handler: h.clone(),
                            cont: RefCell::new(Some(cont)),
                            loc,
                        });
                        let mut env = h.env.clone();
                        env.extend(bindings);
                        env.set_yield_point(yp);
                        self.eval_comp(&env, &body)
                    }
                    None => {
                        // not ours: forward, but stay installed around the resumption
                        let h2 = h.clone();
                        Ok(Partial::Suspended(OpCall {
                            op,
                            args,
                            loc,
                            cont: Resume::new(move |rt, v| {
                                let p = cont.resume(rt, v)?;
                                rt.handle_with(h2, p)
                            }),
                        }))
                    }
                }
            }
        }
    }

    /// Try one match case; `None` means the pattern did not match.
    fn eval_case(&mut self, env: &Env, case: &MatchCase, v: &Value) -> Result<Option<Partial>> {
        let mut out = vec![];
        if !self.match_pattern(&case.pat, v, &mut out)? {
            return Ok(None);
        }
        let mut env = env.clone();
        env.extend(out);
        Ok(Some(self.eval_comp(&env, &case.body)?))
    }

    pub fn call_closure(&mut self, clo: &Rc<Closure>, arg: Value, loc: Loc) -> Result<Partial> {
        let mut out = vec![];
        if !self.match_pattern(&clo.pat, &arg, &mut out)? {
            return Err(Error::match_fail(loc, arg.to_string()));
        }
        let mut env = clo.env.borrow().clone();
        env.extend(out);
        let body = clo.body.clone();
        self.eval_comp(&env, &body)
    }

    pub fn match_pattern(&self, pat: &Pattern, v: &Value, out: &mut Vec<Value>) -> Result<bool> {
        match pat {
            Pattern::Anonymous => Ok(true),
            Pattern::Var(_) => {
                out.push(v.clone());
                Ok(true)
            }
            Pattern::As(p, _) => {
                if !self.match_pattern(p, v, out)? {
                    return Ok(false);
                }
                out.push(v.clone());
                Ok(true)
            }
            Pattern::Tag(tag, pats) => match v {
                Value::Tag(t, args) if t == tag && args.len() == pats.len() => {
                    for (p, a) in std::iter::zip(pats, args) {
                        if !self.match_pattern(p, a, out)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            Pattern::Tuple(pats) => match v {
                Value::Tuple(vs) if vs.len() == pats.len() => {
                    for (p, a) in std::iter::zip(pats, vs) {
                        if !self.match_pattern(p, a, out)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            Pattern::List(pats) => match v {
                Value::List(vs) if vs.len() == pats.len() => {
                    for (p, a) in std::iter::zip(pats, vs) {
                        if !self.match_pattern(p, a, out)? {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
                _ => Ok(false),
            },
            Pattern::Cons(hd, tl) => match v {
                Value::List(vs) if !vs.is_empty() => {
                    if !self.match_pattern(hd, &vs[0], out)? {
                        return Ok(false);
                    }
                    self.match_pattern(tl, &Value::List(vs[1..].to_vec()), out)
                }
                _ => Ok(false),
            },
            Pattern::String(s) => match v {
                Value::String(s2) => Ok(s == s2),
                _ => Ok(false),
            },
            Pattern::Judgement(tp) => match v {
                Value::Judgement(j) => self.match_tt(tp, j, out),
                _ => Ok(false),
            },
        }
    }

    fn match_tt(&self, p: &TtPattern, j: &Jdg, out: &mut Vec<Value>) -> Result<bool> {
        match p {
            TtPattern::Anonymous => Ok(true),
            TtPattern::Var(_) => {
                out.push(Value::Judgement(j.clone()));
                Ok(true)
            }
            TtPattern::As(p, _) => {
                if !self.match_tt(p, j, out)? {
                    return Ok(false);
                }
                out.push(Value::Judgement(j.clone()));
                Ok(true)
            }
            TtPattern::IsType(tp) => match j {
                Jdg::IsType(jt) => self.match_tt_ty(tp, jt.ty(), out),
                _ => Ok(false),
            },
            TtPattern::IsTerm(tp, tty) => match j {
                Jdg::IsTerm(jt) => Ok(self.match_tt_term(tp, jt.term(), out)?
                    && self.match_tt_ty(tty, jt.ty(), out)?),
                _ => Ok(false),
            },
            TtPattern::EqType(p1, p2) => match j {
                Jdg::EqType(je) => {
                    let (_, lhs, rhs) = je.invert();
                    Ok(self.match_tt_ty(p1, &lhs, out)? && self.match_tt_ty(p2, &rhs, out)?)
                }
                _ => Ok(false),
            },
            TtPattern::EqTerm(p1, p2, pty) => match j {
                Jdg::EqTerm(je) => {
                    let (_, lhs, rhs, ty) = je.invert();
                    Ok(self.match_tt_term(p1, &lhs, out)?
                        && self.match_tt_term(p2, &rhs, out)?
                        && self.match_tt_ty(pty, &ty, out)?)
                }
                _ => Ok(false),
            },
            TtPattern::Constr(_, _) | TtPattern::Abstraction(_, _) => match j {
                Jdg::IsTerm(jt) => self.match_tt_term(p, jt.term(), out),
                Jdg::IsType(jt) => self.match_tt_ty(p, jt.ty(), out),
                _ => Ok(false),
            },
        }
    }

    /// Matching inside a term; `Var` binds the subterm together with its
    /// natural type as a fresh term judgement.
    fn match_tt_term(&self, p: &TtPattern, t: &Term, out: &mut Vec<Value>) -> Result<bool> {
        match p {
            TtPattern::Anonymous => Ok(true),
            TtPattern::Var(_) => {
                let j = jdg::subterm(&self.sgn, t)?;
                out.push(Value::Judgement(Jdg::IsTerm(j)));
                Ok(true)
            }
            TtPattern::As(p, _) => {
                if !self.match_tt_term(p, t, out)? {
                    return Ok(false);
                }
                let j = jdg::subterm(&self.sgn, t)?;
                out.push(Value::Judgement(Jdg::IsTerm(j)));
                Ok(true)
            }
            TtPattern::Constr(c, pats) => {
                let mut head = t;
                let mut spine = vec![];
                while let TermNode::Apply(inner) = head.node() {
                    spine.push(&inner.arg);
                    head = &inner.fun;
                }
                spine.reverse();
                let TermNode::Constant(c2) = head.node() else {
                    return Ok(false);
                };
                if c2 != c || spine.len() != pats.len() {
                    return Ok(false);
                }
                for (p, a) in std::iter::zip(pats, spine) {
                    if !self.match_tt_term(p, a, out)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TtPattern::Abstraction(dp, bp) => match t.node() {
                TermNode::Lambda(_) => {
                    let j = jdg::subterm(&self.sgn, t)?;
                    let (dom, _, body) = jdg::invert_lambda(&j)?;
                    Ok(self.match_tt_ty(dp, dom.ty(), out)?
                        && self.match_tt_term(bp, body.term(), out)?)
                }
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }

    fn match_tt_ty(&self, p: &TtPattern, ty: &Type, out: &mut Vec<Value>) -> Result<bool> {
        match p {
            TtPattern::Anonymous => Ok(true),
            TtPattern::Var(_) => {
                out.push(Value::Judgement(Jdg::IsType(jdg::subtype(ty))));
                Ok(true)
            }
            TtPattern::As(p, _) => {
                if !self.match_tt_ty(p, ty, out)? {
                    return Ok(false);
                }
                out.push(Value::Judgement(Jdg::IsType(jdg::subtype(ty))));
                Ok(true)
            }
            TtPattern::Constr(_, _) => self.match_tt_term(p, ty.as_term(), out),
            TtPattern::Abstraction(dp, bp) => match ty.as_term().node() {
                TermNode::Prod(_) => {
                    let jt = jdg::subtype(ty);
                    let (dom, _, cod) = jdg::invert_prod(&jt)?;
                    Ok(self.match_tt_ty(dp, dom.ty(), out)?
                        && self.match_tt_ty(bp, cod.ty(), out)?)
                }
                _ => Ok(false),
            },
            _ => Ok(false),
        }
    }
}

pub(crate) fn value_as_term_judgement(v: &Value, loc: Loc) -> Result<JTerm> {
    match v {
        Value::Judgement(Jdg::IsTerm(j)) => Ok(j.clone()),
        Value::Judgement(Jdg::IsType(jt)) => Ok(jdg::type_as_term(jt)),
        other => Err(Error::runtime(
            loc,
            format!("a term judgement is expected, got {}", other.kind_name()),
        )),
    }
}

pub(crate) fn value_as_type_judgement(v: &Value, loc: Loc) -> Result<JType> {
    match v {
        Value::Judgement(Jdg::IsType(jt)) => Ok(jt.clone()),
        Value::Judgement(Jdg::IsTerm(j)) => jdg::is_type(j.clone()),
        other => Err(Error::runtime(
            loc,
            format!("a type judgement is expected, got {}", other.kind_name()),
        )),
    }
}
