//! The trusted judgement kernel.
//!
//! [JType], [JTerm], [JEqType] and [JEqTerm] have private fields and can only
//! be produced by the constructors in this module, each of which implements
//! one inference rule of the theory. Inspectors hand out copies of the
//! internal data; nothing outside the kernel can forge a judgement from
//! parts. This is the sole soundness barrier of the whole system: the
//! equality engine accepts arbitrary user proofs, but only after checking
//! their endpoints against judgements that went through this module.

use crate::assumption::AssumptionSet;
use crate::error::{Error, Result};
use crate::loc::Loc;
use crate::name::{Atom, Name};
use crate::sig::{Decl, Signature};
use crate::tt::{
    self, abstract_atoms_ty, alpha_equal, alpha_equal_ty, instantiate_ty, mk_apply, mk_atom,
    mk_constant, mk_eq, mk_lambda, mk_prod, mk_projection, mk_refl, mk_signature, mk_structure,
    mk_type, unabstract, unabstract_ty, Term, TermNode, Type,
};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::{LazyLock, RwLock};

/// Types of all atoms ever created. Atoms live for the rest of the session,
/// so the table only grows.
static ATOM_TYPES: LazyLock<RwLock<HashMap<usize, Type>>> = LazyLock::new(Default::default);

fn atom_type(a: Atom) -> Result<Type> {
    ATOM_TYPES
        .read()
        .unwrap()
        .get(&a.tag())
        .cloned()
        .ok_or_else(|| Error::impossible(Loc::unknown(), format!("unregistered atom {a}")))
}

/// "T type"
#[derive(Debug, Clone)]
pub struct JType {
    asmp: AssumptionSet,
    ty: Type,
}

/// "e : T"
#[derive(Debug, Clone)]
pub struct JTerm {
    asmp: AssumptionSet,
    term: Term,
    ty: Type,
}

/// "T₁ ≡ T₂"
#[derive(Debug, Clone)]
pub struct JEqType {
    asmp: AssumptionSet,
    lhs: Type,
    rhs: Type,
}

/// "e₁ ≡ e₂ : T"
#[derive(Debug, Clone)]
pub struct JEqTerm {
    asmp: AssumptionSet,
    lhs: Term,
    rhs: Term,
    ty: Type,
}

/// Any judgement, as handled by the evaluator.
#[derive(Debug, Clone)]
pub enum Jdg {
    IsType(JType),
    IsTerm(JTerm),
    EqType(JEqType),
    EqTerm(JEqTerm),
}

fn fmt_asmp(asmp: &AssumptionSet, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    if !asmp.is_empty() {
        write!(f, "{asmp} ")?;
    }
    write!(f, "⊢ ")
}

impl Display for JType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_asmp(&self.asmp, f)?;
        write!(f, "{} type", self.ty)
    }
}

impl Display for JTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_asmp(&self.asmp, f)?;
        write!(f, "{} : {}", self.term, self.ty)
    }
}

impl Display for JEqType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_asmp(&self.asmp, f)?;
        write!(f, "{} ≡ {}", self.lhs, self.rhs)
    }
}

impl Display for JEqTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt_asmp(&self.asmp, f)?;
        write!(f, "{} ≡ {} : {}", self.lhs, self.rhs, self.ty)
    }
}

impl Display for Jdg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Jdg::IsType(j) => write!(f, "{j}"),
            Jdg::IsTerm(j) => write!(f, "{j}"),
            Jdg::EqType(j) => write!(f, "{j}"),
            Jdg::EqTerm(j) => write!(f, "{j}"),
        }
    }
}

impl JType {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.asmp
    }
}

impl JTerm {
    pub fn term(&self) -> &Term {
        &self.term
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn assumptions(&self) -> &AssumptionSet {
        &self.asmp
    }
}

impl JEqType {
    /// Extract the payload for inspection. The engine uses this to validate
    /// handler answers; there is no way back from parts to a judgement.
    pub fn invert(&self) -> (AssumptionSet, Type, Type) {
        (self.asmp.clone(), self.lhs.clone(), self.rhs.clone())
    }

    /// ```text
    /// T₁ ≡ T₂
    /// --------
    /// T₂ ≡ T₁
    /// ```
    pub fn symmetry(&self) -> JEqType {
        JEqType {
            asmp: self.asmp.clone(),
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
        }
    }
}

impl JEqTerm {
    pub fn invert(&self) -> (AssumptionSet, Term, Term, Type) {
        (
            self.asmp.clone(),
            self.lhs.clone(),
            self.rhs.clone(),
            self.ty.clone(),
        )
    }

    /// ```text
    /// e₁ ≡ e₂ : T
    /// -----------
    /// e₂ ≡ e₁ : T
    /// ```
    pub fn symmetry(&self) -> JEqTerm {
        JEqTerm {
            asmp: self.asmp.clone(),
            lhs: self.rhs.clone(),
            rhs: self.lhs.clone(),
            ty: self.ty.clone(),
        }
    }
}

/// ```text
///
/// -----------
/// ⊢ Type type
/// ```
pub fn universe(loc: Loc) -> JType {
    JType {
        asmp: AssumptionSet::empty(),
        ty: mk_type(loc),
    }
}

/// ```text
/// ⊢ e : Type
/// ----------
/// ⊢ e type
/// ```
pub fn is_type(j: JTerm) -> Result<JType> {
    if !j.ty.is_universe() {
        return Err(Error::typing(
            j.term.loc(),
            format!("{} is not a type: its sort is {}", j.term, j.ty),
        ));
    }
    Ok(JType {
        asmp: j.asmp,
        ty: j.term.into_type(),
    })
}

/// A type seen as a term of the universe.
pub fn type_as_term(j: &JType) -> JTerm {
    let loc = j.ty.loc();
    JTerm {
        asmp: j.asmp.clone(),
        term: j.ty.clone().into_term(),
        ty: mk_type(loc),
    }
}

/// Open a context entry: a fresh atom inhabiting `ty`. The atom is recorded
/// in the session atom table so its type can be recovered later.
pub fn fresh_atom(hint: Name, ty: &JType) -> (Atom, JTerm) {
    let a = Atom::fresh(hint);
    ATOM_TYPES.write().unwrap().insert(a.tag(), ty.ty.clone());
    let term = mk_atom(a, ty.ty.loc());
    let asmp = term.assumptions().union(&ty.asmp);
    (
        a,
        JTerm {
            asmp,
            term,
            ty: ty.ty.clone(),
        },
    )
}

/// ```text
/// ⊢ A type   a : A ⊢ B type
/// -------------------------
/// ⊢ Π (a : A), B type
/// ```
pub fn form_prod(a: Atom, dom: &JType, cod: &JType) -> JType {
    let cod_ty = abstract_atoms_ty(&[a], 0, &cod.ty);
    let asmp = dom
        .asmp
        .union(&cod.asmp.abstract_atoms(&[a], 0).bind(1));
    let loc = cod.ty.loc();
    JType {
        asmp,
        ty: mk_prod(a.hint, dom.ty.clone(), cod_ty, loc),
    }
}

/// ```text
/// ⊢ A type   a : A ⊢ e : B
/// ----------------------------------
/// ⊢ λ (a : A), e : Π (a : A), B
/// ```
pub fn form_lambda(a: Atom, dom: &JType, body: &JTerm) -> JTerm {
    let e = tt::abstract_atoms(&[a], 0, &body.term);
    let cod = abstract_atoms_ty(&[a], 0, &body.ty);
    let asmp = dom
        .asmp
        .union(&body.asmp.abstract_atoms(&[a], 0).bind(1));
    let loc = body.term.loc();
    JTerm {
        asmp,
        term: mk_lambda(a.hint, dom.ty.clone(), e, cod.clone(), loc),
        ty: mk_prod(a.hint, dom.ty.clone(), cod, loc),
    }
}

/// ```text
/// ⊢ f : Π (x : A), B   ⊢ e : A
/// ----------------------------
/// ⊢ f e : B[e/x]
/// ```
///
/// The argument must already be at the domain type on the nose; coercion
/// happens in the engine before the kernel is consulted.
pub fn form_apply(fun: &JTerm, arg: &JTerm, loc: Loc) -> Result<JTerm> {
    let TermNode::Prod(prod) = fun.ty.as_term().node() else {
        return Err(Error::typing(
            loc,
            format!("cannot apply a term of type {}", fun.ty),
        ));
    };
    if !alpha_equal_ty(&arg.ty, &prod.dom) {
        return Err(Error::typing(
            loc,
            format!(
                "type mismatch: the argument has type {} but {} is expected",
                arg.ty, prod.dom
            ),
        ));
    }
    let ty = instantiate_ty(std::slice::from_ref(&arg.term), 0, &prod.cod);
    let term = mk_apply(
        fun.term.clone(),
        prod.hint,
        prod.dom.clone(),
        prod.cod.clone(),
        arg.term.clone(),
        loc,
    );
    Ok(JTerm {
        asmp: fun.asmp.union(&arg.asmp),
        term,
        ty,
    })
}

/// ```text
/// ⊢ e₁ : T   ⊢ e₂ : T
/// -------------------
/// ⊢ Eq T e₁ e₂ type
/// ```
pub fn form_eq(lhs: &JTerm, rhs: &JTerm, loc: Loc) -> Result<JType> {
    if !alpha_equal_ty(&lhs.ty, &rhs.ty) {
        return Err(Error::typing(
            loc,
            format!(
                "type mismatch in equality: {} versus {}",
                lhs.ty, rhs.ty
            ),
        ));
    }
    Ok(JType {
        asmp: lhs.asmp.union(&rhs.asmp),
        ty: mk_eq(lhs.ty.clone(), lhs.term.clone(), rhs.term.clone(), loc),
    })
}

/// ```text
/// ⊢ e : T
/// ------------------------
/// ⊢ refl e : Eq T e e
/// ```
pub fn form_refl(j: &JTerm, loc: Loc) -> JTerm {
    JTerm {
        asmp: j.asmp.clone(),
        term: mk_refl(j.ty.clone(), j.term.clone(), loc),
        ty: mk_eq(j.ty.clone(), j.term.clone(), j.term.clone(), loc),
    }
}

/// ```text
///
/// ------------- (c : T in the signature)
/// ⊢ c : T
/// ```
pub fn form_constant(sgn: &Signature, c: Name, loc: Loc) -> Result<JTerm> {
    let ty = match sgn.get(c) {
        Some(Decl::Constant(ty)) => ty.clone(),
        Some(Decl::Rule(rule)) => rule.ty.clone(),
        _ => {
            return Err(Error::typing(loc, format!("unknown constant {c}")));
        }
    };
    Ok(JTerm {
        asmp: AssumptionSet::empty(),
        term: mk_constant(c, loc),
        ty,
    })
}

/// Apply a declared rule to argument judgements: the rule's Π-type is
/// eliminated once per premise, checking each argument against the
/// instantiated premise boundary.
pub fn form_rule(sgn: &Signature, r: Name, args: &[JTerm], loc: Loc) -> Result<Jdg> {
    let Some(rule) = sgn.rule(r) else {
        return Err(Error::typing(loc, format!("unknown rule {r}")));
    };
    if args.len() != rule.premises.len() {
        return Err(Error::typing(
            loc,
            format!(
                "rule {r} expects {} premises but got {}",
                rule.premises.len(),
                args.len()
            ),
        ));
    }
    let mut j = JTerm {
        asmp: AssumptionSet::empty(),
        term: mk_constant(r, loc),
        ty: rule.ty.clone(),
    };
    for arg in args {
        j = form_apply(&j, arg, loc)?;
    }
    Ok(Jdg::IsTerm(j))
}

/// ```text
///
/// ----------- (s declared)
/// ⊢ s type
/// ```
pub fn form_signature(sgn: &Signature, s: Name, loc: Loc) -> Result<JType> {
    if sgn.sig_def(s).is_none() {
        return Err(Error::typing(loc, format!("unknown signature {s}")));
    }
    Ok(JType {
        asmp: AssumptionSet::empty(),
        ty: mk_signature(s, loc),
    })
}

/// ```text
/// ⊢ eᵢ : Aᵢ[e₁ ⋯ eᵢ₋₁]
/// --------------------------- (s = { lᵢ : Aᵢ })
/// ⊢ { l₁ = e₁, ⋯ } : s
/// ```
pub fn form_structure(sgn: &Signature, s: Name, fields: &[JTerm], loc: Loc) -> Result<JTerm> {
    let Some(def) = sgn.sig_def(s) else {
        return Err(Error::typing(loc, format!("unknown signature {s}")));
    };
    if fields.len() != def.fields.len() {
        return Err(Error::typing(
            loc,
            format!(
                "signature {s} has {} fields but {} were given",
                def.fields.len(),
                fields.len()
            ),
        ));
    }
    let mut asmp = AssumptionSet::empty();
    // earlier fields substitute into later field types, innermost first
    let mut prior_rev: Vec<Term> = Vec::with_capacity(fields.len());
    for (field, decl) in std::iter::zip(fields, &def.fields) {
        let expected = instantiate_ty(&prior_rev, 0, &decl.ty);
        if !alpha_equal_ty(&field.ty, &expected) {
            return Err(Error::typing(
                loc,
                format!(
                    "field {} has type {} but {} is expected",
                    decl.label, field.ty, expected
                ),
            ));
        }
        asmp = asmp.union(&field.asmp);
        prior_rev.insert(0, field.term.clone());
    }
    Ok(JTerm {
        asmp,
        term: mk_structure(s, fields.iter().map(|j| j.term.clone()).collect(), loc),
        ty: mk_signature(s, loc),
    })
}

/// ```text
/// ⊢ e : s
/// ------------------------------- (l a field of s)
/// ⊢ e.l : A_l[e.l₁ ⋯]
/// ```
pub fn form_projection(sgn: &Signature, subject: &JTerm, label: Name, loc: Loc) -> Result<JTerm> {
    let TermNode::Signature(s) = subject.ty.as_term().node() else {
        return Err(Error::typing(
            loc,
            format!("cannot project from a term of type {}", subject.ty),
        ));
    };
    let s = *s;
    let Some(def) = sgn.sig_def(s) else {
        return Err(Error::impossible(loc, format!("unknown signature {s}")));
    };
    let Some(pos) = def.fields.iter().position(|f| f.label == label) else {
        return Err(Error::typing(
            loc,
            format!("signature {s} has no field {label}"),
        ));
    };
    // projecting from a literal structure sees the actual prior fields;
    // otherwise the prior fields are themselves projections of the subject
    let prior_rev: Vec<Term> = match subject.term.node() {
        TermNode::Structure(inner) if inner.name == s => {
            inner.fields[..pos].iter().rev().cloned().collect()
        }
        _ => def.fields[..pos]
            .iter()
            .rev()
            .map(|f| mk_projection(subject.term.clone(), s, f.label, loc))
            .collect(),
    };
    let ty = instantiate_ty(&prior_rev, 0, &def.fields[pos].ty);
    Ok(JTerm {
        asmp: subject.asmp.clone(),
        term: mk_projection(subject.term.clone(), s, label, loc),
        ty,
    })
}

/// The α-equality fast path: a reflexivity witness with no assumptions, or
/// nothing. Both sides must live at α-equal types.
pub fn mk_alpha_equal_term(lhs: &JTerm, rhs: &JTerm) -> Option<JEqTerm> {
    if !alpha_equal_ty(&lhs.ty, &rhs.ty) {
        return None;
    }
    if !alpha_equal(&lhs.term, &rhs.term) {
        return None;
    }
    Some(JEqTerm {
        asmp: AssumptionSet::empty(),
        lhs: lhs.term.clone(),
        rhs: rhs.term.clone(),
        ty: lhs.ty.clone(),
    })
}

pub fn mk_alpha_equal_type(lhs: &JType, rhs: &JType) -> Option<JEqType> {
    if !alpha_equal_ty(&lhs.ty, &rhs.ty) {
        return None;
    }
    Some(JEqType {
        asmp: AssumptionSet::empty(),
        lhs: lhs.ty.clone(),
        rhs: rhs.ty.clone(),
    })
}

/// Equality reflection:
/// ```text
/// ⊢ p : Eq T e₁ e₂
/// ----------------
/// ⊢ e₁ ≡ e₂ : T
/// ```
/// The resulting equation depends on everything the proof term depends on.
pub fn reflect(j: &JTerm) -> Result<JEqTerm> {
    let TermNode::Eq(eq) = j.ty.as_term().node() else {
        return Err(Error::typing(
            j.term.loc(),
            format!("cannot reflect a term of type {}", j.ty),
        ));
    };
    Ok(JEqTerm {
        asmp: j.asmp.clone(),
        lhs: eq.lhs.clone(),
        rhs: eq.rhs.clone(),
        ty: eq.ty.clone(),
    })
}

/// Reflection at the universe: a proof of `Eq Type T₁ T₂` equates the types.
pub fn reflect_ty(j: &JTerm) -> Result<JEqType> {
    let TermNode::Eq(eq) = j.ty.as_term().node() else {
        return Err(Error::typing(
            j.term.loc(),
            format!("cannot reflect a term of type {}", j.ty),
        ));
    };
    if !eq.ty.is_universe() {
        return Err(Error::typing(
            j.term.loc(),
            format!("the equation is at type {}, not at Type", eq.ty),
        ));
    }
    Ok(JEqType {
        asmp: j.asmp.clone(),
        lhs: eq.lhs.clone().into_type(),
        rhs: eq.rhs.clone().into_type(),
    })
}

/// ```text
/// ⊢ e : T₁   ⊢ T₁ ≡ T₂
/// --------------------
/// ⊢ e : T₂
/// ```
pub fn convert(j: &JTerm, eq: &JEqType, loc: Loc) -> Result<JTerm> {
    if !alpha_equal_ty(&j.ty, &eq.lhs) {
        return Err(Error::invalid_derivation(
            loc,
            format!(
                "conversion endpoint mismatch: the term has type {} but the equation starts at {}",
                j.ty, eq.lhs
            ),
        ));
    }
    Ok(JTerm {
        asmp: j.asmp.union(&eq.asmp),
        term: j.term.clone(),
        ty: eq.rhs.clone(),
    })
}

/// Transport an equation along a type equality.
pub fn convert_eq(eq: &JEqTerm, eqty: &JEqType, loc: Loc) -> Result<JEqTerm> {
    if !alpha_equal_ty(&eq.ty, &eqty.lhs) {
        return Err(Error::invalid_derivation(
            loc,
            format!(
                "conversion endpoint mismatch: the equation is at type {} but the type equation starts at {}",
                eq.ty, eqty.lhs
            ),
        ));
    }
    Ok(JEqTerm {
        asmp: eq.asmp.union(&eqty.asmp),
        lhs: eq.lhs.clone(),
        rhs: eq.rhs.clone(),
        ty: eqty.rhs.clone(),
    })
}

/// The type of a locally closed term, computed from the annotations the
/// smart constructors already stored; no re-type-checking happens.
pub fn natural_type(sgn: &Signature, t: &Term) -> Result<Type> {
    let loc = t.loc();
    match t.node() {
        TermNode::Type => Ok(mk_type(loc)),
        TermNode::Atom(a) => atom_type(*a),
        TermNode::Bound(k) => Err(Error::impossible(
            loc,
            format!("natural type of a dangling bound variable {k}"),
        )),
        TermNode::Constant(c) => match sgn.get(*c) {
            Some(Decl::Constant(ty)) => Ok(ty.clone()),
            Some(Decl::Rule(rule)) => Ok(rule.ty.clone()),
            _ => Err(Error::impossible(loc, format!("unknown constant {c}"))),
        },
        TermNode::Lambda(inner) => Ok(mk_prod(
            inner.hint,
            inner.dom.clone(),
            inner.cod.clone(),
            loc,
        )),
        TermNode::Apply(inner) => Ok(instantiate_ty(
            std::slice::from_ref(&inner.arg),
            0,
            &inner.cod,
        )),
        TermNode::Prod(_) | TermNode::Eq(_) | TermNode::Signature(_) => Ok(mk_type(loc)),
        TermNode::Refl(inner) => Ok(mk_eq(
            inner.ty.clone(),
            inner.term.clone(),
            inner.term.clone(),
            loc,
        )),
        TermNode::Structure(inner) => Ok(mk_signature(inner.name, loc)),
        TermNode::Projection(inner) => {
            let subject = JTerm {
                asmp: inner.subject.assumptions().clone(),
                term: inner.subject.clone(),
                ty: natural_type(sgn, &inner.subject)?,
            };
            Ok(form_projection(sgn, &subject, inner.label, loc)?.ty)
        }
    }
}

/// [natural_type] through a binder spine: the body is opened with fresh
/// atoms, typed, and the result is closed again over the same atoms.
pub fn natural_type_abstraction(
    sgn: &Signature,
    binders: &[(Name, Type)],
    body: &Term,
) -> Result<Type> {
    let mut atoms = Vec::with_capacity(binders.len());
    for (hint, dom) in binders {
        let dom = instantiate_ty(
            &atoms
                .iter()
                .rev()
                .map(|&a| mk_atom(a, dom.loc()))
                .collect::<Vec<_>>(),
            0,
            dom,
        );
        let a = Atom::fresh(*hint);
        ATOM_TYPES.write().unwrap().insert(a.tag(), dom);
        atoms.push(a);
    }
    let opened = {
        let mut rev = atoms.clone();
        rev.reverse();
        unabstract(&rev, body)
    };
    let ty = natural_type(sgn, &opened)?;
    let mut rev = atoms;
    rev.reverse();
    Ok(abstract_atoms_ty(&rev, 0, &ty))
}

/// α-equality lifted through binder spines of equal length.
pub fn alpha_equal_abstraction(
    binders1: &[(Name, Type)],
    body1: &Term,
    binders2: &[(Name, Type)],
    body2: &Term,
) -> bool {
    binders1.len() == binders2.len()
        && std::iter::zip(binders1, binders2).all(|((_, t1), (_, t2))| alpha_equal_ty(t1, t2))
        && alpha_equal(body1, body2)
}

/// Open the binder of a λ-judgement with a fresh atom, yielding the domain,
/// the atom and the body judgement. Used by pattern matching and by the
/// destructor for term-level abstractions.
pub fn invert_lambda(j: &JTerm) -> Result<(JType, Atom, JTerm)> {
    let TermNode::Lambda(inner) = j.term.node() else {
        return Err(Error::typing(
            j.term.loc(),
            format!("{} is not an abstraction", j.term),
        ));
    };
    let dom = JType {
        asmp: inner.dom.assumptions().clone(),
        ty: inner.dom.clone(),
    };
    let (a, _) = fresh_atom(inner.hint, &dom);
    let body = unabstract(&[a], &inner.body);
    let cod = unabstract_ty(&[a], &inner.cod);
    let asmp = body.assumptions().union(cod.assumptions()).union(&j.asmp);
    Ok((
        dom,
        a,
        JTerm {
            asmp,
            term: body,
            ty: cod,
        },
    ))
}

/// Open the binder of a Π-judgement with a fresh atom.
pub fn invert_prod(j: &JType) -> Result<(JType, Atom, JType)> {
    let TermNode::Prod(inner) = j.ty.as_term().node() else {
        return Err(Error::typing(
            j.ty.loc(),
            format!("{} is not a product", j.ty),
        ));
    };
    let dom = JType {
        asmp: inner.dom.assumptions().clone(),
        ty: inner.dom.clone(),
    };
    let (a, _) = fresh_atom(inner.hint, &dom);
    let cod = unabstract_ty(&[a], &inner.cod);
    let asmp = cod.assumptions().union(&j.asmp);
    Ok((dom, a, JType { asmp, ty: cod }))
}

/// Re-wrap a subterm of a kernel-built term as a judgement at its natural
/// type. Sound because subterms of well-formed terms are well-formed; the
/// term must come out of a judgement, not be assembled by hand.
pub fn subterm(sgn: &Signature, t: &Term) -> Result<JTerm> {
    let ty = natural_type(sgn, t)?;
    let asmp = t.assumptions().union(ty.assumptions());
    Ok(JTerm {
        asmp,
        term: t.clone(),
        ty,
    })
}

/// The type-level analogue of [subterm].
pub fn subtype(ty: &Type) -> JType {
    JType {
        asmp: ty.assumptions().clone(),
        ty: ty.clone(),
    }
}

pub fn lambda_domain(j: &JTerm, loc: Loc) -> Result<JType> {
    let TermNode::Lambda(inner) = j.term.node() else {
        return Err(Error::typing(
            loc,
            format!("{} is not an abstraction", j.term),
        ));
    };
    Ok(JType {
        asmp: inner.dom.assumptions().clone(),
        ty: inner.dom.clone(),
    })
}

pub fn prod_domain(j: &JType, loc: Loc) -> Result<JType> {
    let TermNode::Prod(inner) = j.ty.as_term().node() else {
        return Err(Error::typing(loc, format!("{} is not a product", j.ty)));
    };
    Ok(JType {
        asmp: inner.dom.assumptions().clone(),
        ty: inner.dom.clone(),
    })
}

/// ```text
/// ⊢ λ (x : A), e : Π (x : A), B   ⊢ u : A
/// ---------------------------------------
/// ⊢ e[u/x] : B[u/x]
/// ```
pub fn substitute_term(j: &JTerm, arg: &JTerm, loc: Loc) -> Result<JTerm> {
    let TermNode::Lambda(inner) = j.term.node() else {
        return Err(Error::typing(
            loc,
            format!("{} is not an abstraction", j.term),
        ));
    };
    if !alpha_equal_ty(&arg.ty, &inner.dom) {
        return Err(Error::typing(
            loc,
            format!(
                "type mismatch: the argument has type {} but {} is expected",
                arg.ty, inner.dom
            ),
        ));
    }
    let es = std::slice::from_ref(&arg.term);
    Ok(JTerm {
        asmp: j.asmp.union(&arg.asmp),
        term: tt::instantiate(es, 0, &inner.body),
        ty: instantiate_ty(es, 0, &inner.cod),
    })
}

/// The Π analogue of [substitute_term].
pub fn substitute_prod(j: &JType, arg: &JTerm, loc: Loc) -> Result<JType> {
    let TermNode::Prod(inner) = j.ty.as_term().node() else {
        return Err(Error::typing(loc, format!("{} is not a product", j.ty)));
    };
    if !alpha_equal_ty(&arg.ty, &inner.dom) {
        return Err(Error::typing(
            loc,
            format!(
                "type mismatch: the argument has type {} but {} is expected",
                arg.ty, inner.dom
            ),
        ));
    }
    Ok(JType {
        asmp: j.asmp.union(&arg.asmp),
        ty: instantiate_ty(std::slice::from_ref(&arg.term), 0, &inner.cod),
    })
}

/// The judgement form a TT pattern or the engine asked about.
impl Jdg {
    pub fn as_term(&self) -> Option<&JTerm> {
        match self {
            Jdg::IsTerm(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&JType> {
        match self {
            Jdg::IsType(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_eq_term(&self) -> Option<&JEqTerm> {
        match self {
            Jdg::EqTerm(j) => Some(j),
            _ => None,
        }
    }

    pub fn as_eq_type(&self) -> Option<&JEqType> {
        match self {
            Jdg::EqType(j) => Some(j),
            _ => None,
        }
    }
}
