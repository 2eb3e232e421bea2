//! Locally nameless term representation. See [Charguéraud, 2012].
//!
//! Every composite node records the union of its children's assumption sets,
//! with children under a binder passed through [AssumptionSet::bind] first.
//! The `mk_*` constructors below are the only way to build terms and keep
//! that invariant; the rest of the crate treats [Term] as read-only.

use crate::assumption::AssumptionSet;
use crate::loc::Loc;
use crate::name::{Atom, Name};
use std::fmt::Display;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Term(Arc<TermData>);

#[derive(Debug)]
struct TermData {
    node: TermNode,
    assumptions: AssumptionSet,
    loc: Loc,
}

/// Types are terms of sort `Type`; the wrapper prevents category errors
/// without duplicating the ADT.
#[derive(Debug, Clone)]
pub struct Type(Term);

#[derive(Debug, Clone)]
pub enum TermNode {
    /// The universe.
    Type,
    Atom(Atom),
    /// de Bruijn index, 0 innermost.
    Bound(usize),
    Constant(Name),
    Lambda(Arc<TermLambda>),
    Apply(Arc<TermApply>),
    Prod(Arc<TermProd>),
    Eq(Arc<TermEq>),
    Refl(Arc<TermRefl>),
    Signature(Name),
    Structure(Arc<TermStructure>),
    Projection(Arc<TermProjection>),
}

#[derive(Debug)]
pub struct TermLambda {
    // for printing
    pub hint: Name,
    pub dom: Type,
    /// under one binder
    pub body: Term,
    /// under one binder
    pub cod: Type,
}

/// Application annotated with the product type of its head.
#[derive(Debug)]
pub struct TermApply {
    pub fun: Term,
    pub hint: Name,
    pub dom: Type,
    /// under one binder
    pub cod: Type,
    pub arg: Term,
}

#[derive(Debug)]
pub struct TermProd {
    pub hint: Name,
    pub dom: Type,
    /// under one binder
    pub cod: Type,
}

#[derive(Debug)]
pub struct TermEq {
    pub ty: Type,
    pub lhs: Term,
    pub rhs: Term,
}

#[derive(Debug)]
pub struct TermRefl {
    pub ty: Type,
    pub term: Term,
}

#[derive(Debug)]
pub struct TermStructure {
    pub name: Name,
    pub fields: Vec<Term>,
}

#[derive(Debug)]
pub struct TermProjection {
    pub subject: Term,
    pub name: Name,
    pub label: Name,
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node() {
            TermNode::Type => write!(f, "Type"),
            TermNode::Atom(a) => write!(f, "{a}"),
            TermNode::Bound(k) => write!(f, "(bound {k})"),
            TermNode::Constant(c) => write!(f, "{c}"),
            TermNode::Lambda(inner) => write!(f, "(lam {} {})", inner.dom, inner.body),
            TermNode::Apply(inner) => write!(f, "({} {})", inner.fun, inner.arg),
            TermNode::Prod(inner) => write!(f, "(prod {} {})", inner.dom, inner.cod),
            TermNode::Eq(inner) => write!(f, "(eq {} {} {})", inner.ty, inner.lhs, inner.rhs),
            TermNode::Refl(inner) => write!(f, "(refl {})", inner.term),
            TermNode::Signature(s) => write!(f, "{s}"),
            TermNode::Structure(inner) => {
                write!(f, "(struct {}", inner.name)?;
                for e in &inner.fields {
                    write!(f, " {e}")?;
                }
                write!(f, ")")
            }
            TermNode::Projection(inner) => write!(f, "({}.{})", inner.subject, inner.label),
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn mk_term(node: TermNode, assumptions: AssumptionSet, loc: Loc) -> Term {
    Term(Arc::new(TermData {
        node,
        assumptions,
        loc,
    }))
}

pub fn mk_type(loc: Loc) -> Type {
    Type(mk_term(TermNode::Type, AssumptionSet::empty(), loc))
}

pub fn mk_atom(a: Atom, loc: Loc) -> Term {
    mk_term(TermNode::Atom(a), AssumptionSet::singleton_atom(a), loc)
}

pub fn mk_bound(k: usize, loc: Loc) -> Term {
    mk_term(TermNode::Bound(k), AssumptionSet::singleton_bound(k), loc)
}

pub fn mk_constant(c: Name, loc: Loc) -> Term {
    mk_term(TermNode::Constant(c), AssumptionSet::empty(), loc)
}

pub fn mk_lambda(hint: Name, dom: Type, body: Term, cod: Type, loc: Loc) -> Term {
    let assumptions = dom
        .assumptions()
        .union(&body.assumptions().bind(1))
        .union(&cod.assumptions().bind(1));
    mk_term(
        TermNode::Lambda(Arc::new(TermLambda {
            hint,
            dom,
            body,
            cod,
        })),
        assumptions,
        loc,
    )
}

pub fn mk_apply(fun: Term, hint: Name, dom: Type, cod: Type, arg: Term, loc: Loc) -> Term {
    let assumptions = fun
        .assumptions()
        .union(&arg.assumptions())
        .union(&dom.assumptions())
        .union(&cod.assumptions().bind(1));
    mk_term(
        TermNode::Apply(Arc::new(TermApply {
            fun,
            hint,
            dom,
            cod,
            arg,
        })),
        assumptions,
        loc,
    )
}

pub fn mk_prod(hint: Name, dom: Type, cod: Type, loc: Loc) -> Type {
    let assumptions = dom.assumptions().union(&cod.assumptions().bind(1));
    Type(mk_term(
        TermNode::Prod(Arc::new(TermProd { hint, dom, cod })),
        assumptions,
        loc,
    ))
}

pub fn mk_eq(ty: Type, lhs: Term, rhs: Term, loc: Loc) -> Type {
    let assumptions = ty
        .assumptions()
        .union(&lhs.assumptions())
        .union(&rhs.assumptions());
    Type(mk_term(
        TermNode::Eq(Arc::new(TermEq { ty, lhs, rhs })),
        assumptions,
        loc,
    ))
}

pub fn mk_refl(ty: Type, term: Term, loc: Loc) -> Term {
    let assumptions = ty.assumptions().union(&term.assumptions());
    mk_term(
        TermNode::Refl(Arc::new(TermRefl { ty, term })),
        assumptions,
        loc,
    )
}

pub fn mk_signature(s: Name, loc: Loc) -> Type {
    Type(mk_term(TermNode::Signature(s), AssumptionSet::empty(), loc))
}

pub fn mk_structure(name: Name, fields: Vec<Term>, loc: Loc) -> Term {
    let mut assumptions = AssumptionSet::empty();
    for e in &fields {
        assumptions = assumptions.union(e.assumptions());
    }
    mk_term(
        TermNode::Structure(Arc::new(TermStructure { name, fields })),
        assumptions,
        loc,
    )
}

pub fn mk_projection(subject: Term, name: Name, label: Name, loc: Loc) -> Term {
    let assumptions = subject.assumptions().clone();
    mk_term(
        TermNode::Projection(Arc::new(TermProjection {
            subject,
            name,
            label,
        })),
        assumptions,
        loc,
    )
}

impl Term {
    pub fn node(&self) -> &TermNode {
        &self.0.node
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.0.assumptions
    }

    pub fn loc(&self) -> Loc {
        self.0.loc
    }

    pub fn ptr_eq(&self, other: &Term) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Reinterpret a term of sort `Type` as a type. The caller is the kernel,
    /// which has already checked the sort.
    pub(crate) fn into_type(self) -> Type {
        Type(self)
    }
}

impl Type {
    pub fn as_term(&self) -> &Term {
        &self.0
    }

    pub fn into_term(self) -> Term {
        self.0
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        self.0.assumptions()
    }

    pub fn loc(&self) -> Loc {
        self.0.loc()
    }

    pub fn ptr_eq(&self, other: &Type) -> bool {
        self.0.ptr_eq(&other.0)
    }

    pub fn is_universe(&self) -> bool {
        matches!(self.0.node(), TermNode::Type)
    }
}

/// Replace `Bound (lvl + i)` by `es[i]` and shift the outer indices down by
/// `es.len()`. The substituents must be locally closed.
pub fn instantiate(es: &[Term], lvl: usize, t: &Term) -> Term {
    if es.is_empty() || !t.assumptions().has_bound_at_or_above(lvl) {
        return t.clone();
    }
    let loc = t.loc();
    match t.node() {
        TermNode::Type | TermNode::Atom(_) | TermNode::Constant(_) | TermNode::Signature(_) => {
            t.clone()
        }
        TermNode::Bound(k) => {
            let k = *k;
            if k < lvl {
                t.clone()
            } else if k < lvl + es.len() {
                es[k - lvl].clone()
            } else {
                mk_bound(k - es.len(), loc)
            }
        }
        TermNode::Lambda(inner) => mk_lambda(
            inner.hint,
            instantiate_ty(es, lvl, &inner.dom),
            instantiate(es, lvl + 1, &inner.body),
            instantiate_ty(es, lvl + 1, &inner.cod),
            loc,
        ),
        TermNode::Apply(inner) => mk_apply(
            instantiate(es, lvl, &inner.fun),
            inner.hint,
            instantiate_ty(es, lvl, &inner.dom),
            instantiate_ty(es, lvl + 1, &inner.cod),
            instantiate(es, lvl, &inner.arg),
            loc,
        ),
        TermNode::Prod(inner) => mk_prod(
            inner.hint,
            instantiate_ty(es, lvl, &inner.dom),
            instantiate_ty(es, lvl + 1, &inner.cod),
            loc,
        )
        .into_term(),
        TermNode::Eq(inner) => mk_eq(
            instantiate_ty(es, lvl, &inner.ty),
            instantiate(es, lvl, &inner.lhs),
            instantiate(es, lvl, &inner.rhs),
            loc,
        )
        .into_term(),
        TermNode::Refl(inner) => mk_refl(
            instantiate_ty(es, lvl, &inner.ty),
            instantiate(es, lvl, &inner.term),
            loc,
        ),
        TermNode::Structure(inner) => mk_structure(
            inner.name,
            inner
                .fields
                .iter()
                .map(|e| instantiate(es, lvl, e))
                .collect(),
            loc,
        ),
        TermNode::Projection(inner) => mk_projection(
            instantiate(es, lvl, &inner.subject),
            inner.name,
            inner.label,
            loc,
        ),
    }
}

pub fn instantiate_ty(es: &[Term], lvl: usize, t: &Type) -> Type {
    if es.is_empty() || !t.assumptions().has_bound_at_or_above(lvl) {
        return t.clone();
    }
    Type(instantiate(es, lvl, t.as_term()))
}

/// Capture the atoms `xs` as the bound indices `lvl, lvl + 1, …`.
pub fn abstract_atoms(xs: &[Atom], lvl: usize, t: &Term) -> Term {
    if xs.is_empty() || !t.assumptions().mentions_any_atom(xs) {
        return t.clone();
    }
    let loc = t.loc();
    match t.node() {
        TermNode::Type | TermNode::Bound(_) | TermNode::Constant(_) | TermNode::Signature(_) => {
            t.clone()
        }
        TermNode::Atom(a) => match xs.iter().position(|x| x == a) {
            Some(i) => mk_bound(lvl + i, loc),
            None => t.clone(),
        },
        TermNode::Lambda(inner) => mk_lambda(
            inner.hint,
            abstract_atoms_ty(xs, lvl, &inner.dom),
            abstract_atoms(xs, lvl + 1, &inner.body),
            abstract_atoms_ty(xs, lvl + 1, &inner.cod),
            loc,
        ),
        TermNode::Apply(inner) => mk_apply(
            abstract_atoms(xs, lvl, &inner.fun),
            inner.hint,
            abstract_atoms_ty(xs, lvl, &inner.dom),
            abstract_atoms_ty(xs, lvl + 1, &inner.cod),
            abstract_atoms(xs, lvl, &inner.arg),
            loc,
        ),
        TermNode::Prod(inner) => mk_prod(
            inner.hint,
            abstract_atoms_ty(xs, lvl, &inner.dom),
            abstract_atoms_ty(xs, lvl + 1, &inner.cod),
            loc,
        )
        .into_term(),
        TermNode::Eq(inner) => mk_eq(
            abstract_atoms_ty(xs, lvl, &inner.ty),
            abstract_atoms(xs, lvl, &inner.lhs),
            abstract_atoms(xs, lvl, &inner.rhs),
            loc,
        )
        .into_term(),
        TermNode::Refl(inner) => mk_refl(
            abstract_atoms_ty(xs, lvl, &inner.ty),
            abstract_atoms(xs, lvl, &inner.term),
            loc,
        ),
        TermNode::Structure(inner) => mk_structure(
            inner.name,
            inner
                .fields
                .iter()
                .map(|e| abstract_atoms(xs, lvl, e))
                .collect(),
            loc,
        ),
        TermNode::Projection(inner) => mk_projection(
            abstract_atoms(xs, lvl, &inner.subject),
            inner.name,
            inner.label,
            loc,
        ),
    }
}

pub fn abstract_atoms_ty(xs: &[Atom], lvl: usize, t: &Type) -> Type {
    if xs.is_empty() || !t.assumptions().mentions_any_atom(xs) {
        return t.clone();
    }
    Type(abstract_atoms(xs, lvl, t.as_term()))
}

/// Simultaneously substitute `es` for the atoms `xs`.
pub fn substitute(xs: &[Atom], es: &[Term], t: &Term) -> Term {
    instantiate(es, 0, &abstract_atoms(xs, 0, t))
}

pub fn substitute_ty(xs: &[Atom], es: &[Term], t: &Type) -> Type {
    instantiate_ty(es, 0, &abstract_atoms_ty(xs, 0, t))
}

/// Open a binder: replace `Bound 0, Bound 1, …` by the fresh atoms `xs`.
pub fn unabstract(xs: &[Atom], t: &Term) -> Term {
    let es: Vec<Term> = xs.iter().map(|&x| mk_atom(x, t.loc())).collect();
    instantiate(&es, 0, t)
}

pub fn unabstract_ty(xs: &[Atom], t: &Type) -> Type {
    let es: Vec<Term> = xs.iter().map(|&x| mk_atom(x, t.loc())).collect();
    instantiate_ty(&es, 0, t)
}

/// Structural equality modulo binder names, locations and assumption sets.
pub fn alpha_equal(t: &Term, u: &Term) -> bool {
    if t.ptr_eq(u) {
        return true;
    }
    match (t.node(), u.node()) {
        (TermNode::Type, TermNode::Type) => true,
        (TermNode::Atom(a1), TermNode::Atom(a2)) => a1 == a2,
        (TermNode::Bound(k1), TermNode::Bound(k2)) => k1 == k2,
        (TermNode::Constant(c1), TermNode::Constant(c2)) => c1 == c2,
        (TermNode::Lambda(i1), TermNode::Lambda(i2)) => {
            alpha_equal_ty(&i1.dom, &i2.dom)
                && alpha_equal(&i1.body, &i2.body)
                && alpha_equal_ty(&i1.cod, &i2.cod)
        }
        (TermNode::Apply(i1), TermNode::Apply(i2)) => {
            alpha_equal(&i1.fun, &i2.fun)
                && alpha_equal_ty(&i1.dom, &i2.dom)
                && alpha_equal_ty(&i1.cod, &i2.cod)
                && alpha_equal(&i1.arg, &i2.arg)
        }
        (TermNode::Prod(i1), TermNode::Prod(i2)) => {
            alpha_equal_ty(&i1.dom, &i2.dom) && alpha_equal_ty(&i1.cod, &i2.cod)
        }
        (TermNode::Eq(i1), TermNode::Eq(i2)) => {
            alpha_equal_ty(&i1.ty, &i2.ty)
                && alpha_equal(&i1.lhs, &i2.lhs)
                && alpha_equal(&i1.rhs, &i2.rhs)
        }
        (TermNode::Refl(i1), TermNode::Refl(i2)) => {
            alpha_equal_ty(&i1.ty, &i2.ty) && alpha_equal(&i1.term, &i2.term)
        }
        (TermNode::Signature(s1), TermNode::Signature(s2)) => s1 == s2,
        (TermNode::Structure(i1), TermNode::Structure(i2)) => {
            i1.name == i2.name
                && i1.fields.len() == i2.fields.len()
                && std::iter::zip(&i1.fields, &i2.fields).all(|(e1, e2)| alpha_equal(e1, e2))
        }
        (TermNode::Projection(i1), TermNode::Projection(i2)) => {
            i1.name == i2.name && i1.label == i2.label && alpha_equal(&i1.subject, &i2.subject)
        }
        _ => false,
    }
}

pub fn alpha_equal_ty(t: &Type, u: &Type) -> bool {
    alpha_equal(t.as_term(), u.as_term())
}

/// Count occurrences of `Bound k`. For printing only.
pub fn occurs(k: usize, t: &Term) -> usize {
    match t.node() {
        TermNode::Type | TermNode::Atom(_) | TermNode::Constant(_) | TermNode::Signature(_) => 0,
        TermNode::Bound(i) => usize::from(*i == k),
        TermNode::Lambda(inner) => {
            occurs(k, inner.dom.as_term())
                + occurs(k + 1, &inner.body)
                + occurs(k + 1, inner.cod.as_term())
        }
        TermNode::Apply(inner) => {
            occurs(k, &inner.fun)
                + occurs(k, inner.dom.as_term())
                + occurs(k + 1, inner.cod.as_term())
                + occurs(k, &inner.arg)
        }
        TermNode::Prod(inner) => occurs(k, inner.dom.as_term()) + occurs(k + 1, inner.cod.as_term()),
        TermNode::Eq(inner) => {
            occurs(k, inner.ty.as_term()) + occurs(k, &inner.lhs) + occurs(k, &inner.rhs)
        }
        TermNode::Refl(inner) => occurs(k, inner.ty.as_term()) + occurs(k, &inner.term),
        TermNode::Structure(inner) => inner.fields.iter().map(|e| occurs(k, e)).sum(),
        TermNode::Projection(inner) => occurs(k, &inner.subject),
    }
}
