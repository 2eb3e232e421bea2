//! The desugared ML language, as produced by the external frontend.
//!
//! Expressions are pure; computations may perform effects and are sequenced
//! explicitly. Variables are de Bruijn indices into the evaluation
//! environment (0 = most recently bound). Pattern bindings extend the
//! environment left to right, depth first, with as-bindings after their
//! subpattern.

use crate::loc::Loc;
use crate::name::Name;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Comp {
    node: Arc<CompNode>,
    loc: Loc,
}

#[derive(Debug)]
pub enum CompNode {
    Return(Expr),
    /// The universe `Type`.
    Universe,
    /// A declared dynamic as a first-class cell value.
    Dynamic(Name),
    Sequence(Comp, Comp),
    Let(Vec<LetClause>, Comp),
    LetRec(Vec<RecClause>, Comp),
    Match(Comp, Vec<MatchCase>),
    /// Raise an effect operation.
    Operation(Name, Vec<Expr>),
    /// Install a handler for the extent of the body.
    With(Expr, Comp),
    /// Resume the suspended continuation from inside an operation case.
    Yield(Expr),
    /// ML application, or kernel application when the callee is a judgement.
    Apply(Expr, Expr),
    MkRef(Expr),
    Lookup(Expr),
    Update(Expr, Expr),
    /// `now x = e in c`
    Now(Name, Comp, Comp),
    Current(Name),
    /// `c : t`, checking the computation against an evaluated type.
    Ascribe(Comp, Comp),
    /// Open a fresh atom at the evaluated type, run the body with it bound,
    /// then abstract: λ for term bodies, Π for type bodies.
    Abstract(Name, Comp, Comp),
    /// Destruct an abstraction by instantiating its binder.
    Substitute(Comp, Comp),
    /// Form the equality type of two terms.
    Eq(Comp, Comp),
    Refl(Comp),
    /// Turn an equality proof term into a judgemental equation.
    Reflect(Comp),
    Constant(Name),
    /// Apply a declared rule to premise arguments.
    RuleApply(Name, Vec<Comp>),
    Signature(Name),
    Structure(Name, Vec<Comp>),
    Projection(Comp, Name),
}

#[derive(Debug, Clone)]
pub struct Expr {
    node: Arc<ExprNode>,
    loc: Loc,
}

#[derive(Debug)]
pub enum ExprNode {
    Bound(usize),
    String(String),
    Tag(Name, Vec<Expr>),
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Function(Pattern, Comp),
    Handler(HandlerSyntax),
}

#[derive(Debug, Clone)]
pub struct LetClause {
    pub pat: Pattern,
    pub comp: Comp,
}

#[derive(Debug, Clone)]
pub struct RecClause {
    /// for display
    pub name: Name,
    pub arg: Pattern,
    pub body: Comp,
}

#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pat: Pattern,
    pub body: Comp,
}

#[derive(Debug, Clone)]
pub struct HandlerSyntax {
    pub on_value: Option<MatchCase>,
    pub on_op: Vec<OpCase>,
    pub on_finally: Option<MatchCase>,
}

#[derive(Debug, Clone)]
pub struct OpCase {
    pub op: Name,
    pub pats: Vec<Pattern>,
    pub body: Comp,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Anonymous,
    /// Binds; the name is for display only.
    Var(Name),
    As(Box<Pattern>, Name),
    Tag(Name, Vec<Pattern>),
    Tuple(Vec<Pattern>),
    List(Vec<Pattern>),
    Cons(Box<Pattern>, Box<Pattern>),
    String(String),
    Judgement(TtPattern),
}

/// Patterns over judgements and the terms inside them. At a term or type
/// position, `Var` binds the subterm *and* its type as a fresh judgement.
#[derive(Debug, Clone)]
pub enum TtPattern {
    Anonymous,
    Var(Name),
    As(Box<TtPattern>, Name),
    IsType(Box<TtPattern>),
    IsTerm(Box<TtPattern>, Box<TtPattern>),
    EqType(Box<TtPattern>, Box<TtPattern>),
    EqTerm(Box<TtPattern>, Box<TtPattern>, Box<TtPattern>),
    /// A constant applied to exactly the given argument patterns.
    Constr(Name, Vec<TtPattern>),
    /// λ- or Π-abstraction: domain pattern and body pattern, the body opened
    /// with a fresh atom.
    Abstraction(Box<TtPattern>, Box<TtPattern>),
}

#[derive(Debug)]
pub struct TopItem {
    pub cmd: TopCmd,
    pub loc: Loc,
}

#[derive(Debug)]
pub enum TopCmd {
    TopLet(Vec<LetClause>),
    TopLetRec(Vec<RecClause>),
    TopDo(Comp),
    /// The body is expected to fail with a user-recoverable error.
    TopFail(Comp),
    TopDynamic(Name, Comp),
    TopNow(Name, Comp),
    DeclOperation(Name, usize),
    DeclConstant(Name, Comp),
    DeclRule {
        name: Name,
        premises: Vec<(Name, Comp)>,
        conclusion: Comp,
    },
    DeclSignature(Name, Vec<(Name, Comp)>),
    DeclMlType(Name, Vec<(Name, usize)>),
}

impl Comp {
    pub fn new(node: CompNode, loc: Loc) -> Comp {
        Comp {
            node: Arc::new(node),
            loc,
        }
    }

    pub fn node(&self) -> &CompNode {
        &self.node
    }

    pub fn loc(&self) -> Loc {
        self.loc
    }
}

impl Expr {
    pub fn new(node: ExprNode, loc: Loc) -> Expr {
        Expr {
            node: Arc::new(node),
            loc,
        }
    }

    pub fn node(&self) -> &ExprNode {
        &self.node
    }

    pub fn loc(&self) -> Loc {
        self.loc
    }
}

pub fn mk_return(e: Expr) -> Comp {
    let loc = e.loc();
    Comp::new(CompNode::Return(e), loc)
}

pub fn mk_bound(i: usize, loc: Loc) -> Expr {
    Expr::new(ExprNode::Bound(i), loc)
}

pub fn mk_return_bound(i: usize, loc: Loc) -> Comp {
    mk_return(mk_bound(i, loc))
}

pub fn mk_string(s: impl Into<String>, loc: Loc) -> Expr {
    Expr::new(ExprNode::String(s.into()), loc)
}

pub fn mk_tag(tag: Name, args: Vec<Expr>, loc: Loc) -> Expr {
    Expr::new(ExprNode::Tag(tag, args), loc)
}

pub fn mk_tuple(es: Vec<Expr>, loc: Loc) -> Expr {
    Expr::new(ExprNode::Tuple(es), loc)
}

pub fn mk_list(es: Vec<Expr>, loc: Loc) -> Expr {
    Expr::new(ExprNode::List(es), loc)
}

pub fn mk_unit(loc: Loc) -> Expr {
    mk_tuple(vec![], loc)
}

pub fn mk_function(pat: Pattern, body: Comp, loc: Loc) -> Expr {
    Expr::new(ExprNode::Function(pat, body), loc)
}

pub fn mk_handler(h: HandlerSyntax, loc: Loc) -> Expr {
    Expr::new(ExprNode::Handler(h), loc)
}

pub fn mk_let(clauses: Vec<LetClause>, body: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Let(clauses, body), loc)
}

pub fn mk_let1(pat: Pattern, bound: Comp, body: Comp, loc: Loc) -> Comp {
    mk_let(vec![LetClause { pat, comp: bound }], body, loc)
}

pub fn mk_match(scrutinee: Comp, cases: Vec<MatchCase>, loc: Loc) -> Comp {
    Comp::new(CompNode::Match(scrutinee, cases), loc)
}

pub fn mk_operation(op: Name, args: Vec<Expr>, loc: Loc) -> Comp {
    Comp::new(CompNode::Operation(op, args), loc)
}

pub fn mk_with(handler: Expr, body: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::With(handler, body), loc)
}

pub fn mk_yield(e: Expr, loc: Loc) -> Comp {
    Comp::new(CompNode::Yield(e), loc)
}

pub fn mk_apply(fun: Expr, arg: Expr, loc: Loc) -> Comp {
    Comp::new(CompNode::Apply(fun, arg), loc)
}

pub fn mk_now(x: Name, value: Comp, body: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Now(x, value, body), loc)
}

pub fn mk_current(x: Name, loc: Loc) -> Comp {
    Comp::new(CompNode::Current(x), loc)
}

pub fn mk_ascribe(c: Comp, ty: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Ascribe(c, ty), loc)
}

pub fn mk_abstract(hint: Name, ty: Comp, body: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Abstract(hint, ty, body), loc)
}

pub fn mk_substitute(head: Comp, arg: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Substitute(head, arg), loc)
}

pub fn mk_eq(lhs: Comp, rhs: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Eq(lhs, rhs), loc)
}

pub fn mk_refl(c: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Refl(c), loc)
}

pub fn mk_reflect(c: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Reflect(c), loc)
}

pub fn mk_constant(c: Name, loc: Loc) -> Comp {
    Comp::new(CompNode::Constant(c), loc)
}

pub fn mk_rule_apply(r: Name, args: Vec<Comp>, loc: Loc) -> Comp {
    Comp::new(CompNode::RuleApply(r, args), loc)
}

pub fn mk_sequence(c1: Comp, c2: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::Sequence(c1, c2), loc)
}

pub fn mk_universe(loc: Loc) -> Comp {
    Comp::new(CompNode::Universe, loc)
}

pub fn mk_dynamic(x: Name, loc: Loc) -> Comp {
    Comp::new(CompNode::Dynamic(x), loc)
}

pub fn mk_signature_ty(s: Name, loc: Loc) -> Comp {
    Comp::new(CompNode::Signature(s), loc)
}

pub fn mk_structure(s: Name, fields: Vec<Comp>, loc: Loc) -> Comp {
    Comp::new(CompNode::Structure(s, fields), loc)
}

pub fn mk_projection(subject: Comp, label: Name, loc: Loc) -> Comp {
    Comp::new(CompNode::Projection(subject, label), loc)
}

pub fn mk_mkref(e: Expr, loc: Loc) -> Comp {
    Comp::new(CompNode::MkRef(e), loc)
}

pub fn mk_lookup(e: Expr, loc: Loc) -> Comp {
    Comp::new(CompNode::Lookup(e), loc)
}

pub fn mk_update(r: Expr, e: Expr, loc: Loc) -> Comp {
    Comp::new(CompNode::Update(r, e), loc)
}

pub fn mk_letrec(clauses: Vec<RecClause>, body: Comp, loc: Loc) -> Comp {
    Comp::new(CompNode::LetRec(clauses, body), loc)
}
