//! End-to-end scenarios driven through the toplevel, plus engine-level
//! checks of the equality protocol.

use mirach::error::ErrorKind;
use mirach::eval::Partial;
use mirach::jdg::{self, JTerm, Jdg};
use mirach::predefined;
use mirach::syntax::{
    self, HandlerSyntax, LetClause, MatchCase, OpCase, Pattern, RecClause, TopCmd, TopItem,
    TtPattern,
};
use mirach::toplevel::Toplevel;
use mirach::tt::{alpha_equal, alpha_equal_ty};
use mirach::value::Value;
use mirach::{Loc, Name};

fn loc() -> Loc {
    Loc::unknown()
}

fn n(s: &str) -> Name {
    Name::intern(s).unwrap()
}

fn item(cmd: TopCmd) -> TopItem {
    TopItem { cmd, loc: loc() }
}

fn do_item(c: syntax::Comp) -> TopItem {
    item(TopCmd::TopDo(c))
}

fn run_value(top: &mut Toplevel, c: syntax::Comp) -> Value {
    top.run(&do_item(c))
        .expect("toplevel item failed")
        .expect("do returns a value")
}

fn as_jterm(v: Value) -> JTerm {
    let Value::Judgement(Jdg::IsTerm(j)) = v else {
        panic!("expected a term judgement, got {v}");
    };
    j
}

/// constant C : Type, plus constants ca cb : C.
fn base_theory(top: &mut Toplevel) {
    top.run(&item(TopCmd::DeclConstant(n("C"), syntax::mk_universe(loc()))))
        .unwrap();
    top.run(&item(TopCmd::DeclConstant(n("ca"), syntax::mk_constant(n("C"), loc()))))
        .unwrap();
    top.run(&item(TopCmd::DeclConstant(n("cb"), syntax::mk_constant(n("C"), loc()))))
        .unwrap();
}

/// times, pair, fst and the β-rule for fst, as derivation rules.
fn product_theory(top: &mut Toplevel) {
    let l = loc();
    // rule times (A : Type) (B : Type) : Type
    top.run(&item(TopCmd::DeclRule {
        name: n("times"),
        premises: vec![
            (n("A"), syntax::mk_universe(l)),
            (n("B"), syntax::mk_universe(l)),
        ],
        conclusion: syntax::mk_universe(l),
    }))
    .unwrap();
    // rule pair (A : Type) (B : Type) (x : A) (y : B) : times A B
    top.run(&item(TopCmd::DeclRule {
        name: n("pair"),
        premises: vec![
            (n("A"), syntax::mk_universe(l)),
            (n("B"), syntax::mk_universe(l)),
            (n("x"), syntax::mk_return_bound(1, l)),
            (n("y"), syntax::mk_return_bound(1, l)),
        ],
        conclusion: syntax::mk_rule_apply(
            n("times"),
            vec![syntax::mk_return_bound(3, l), syntax::mk_return_bound(2, l)],
            l,
        ),
    }))
    .unwrap();
    // rule fst (A : Type) (B : Type) (p : times A B) : A
    top.run(&item(TopCmd::DeclRule {
        name: n("fst"),
        premises: vec![
            (n("A"), syntax::mk_universe(l)),
            (n("B"), syntax::mk_universe(l)),
            (
                n("p"),
                syntax::mk_rule_apply(
                    n("times"),
                    vec![syntax::mk_return_bound(1, l), syntax::mk_return_bound(0, l)],
                    l,
                ),
            ),
        ],
        conclusion: syntax::mk_return_bound(2, l),
    }))
    .unwrap();
    // rule fst_beta (A) (B) (x : A) (y : B) : Eq A (fst A B (pair A B x y)) x
    top.run(&item(TopCmd::DeclRule {
        name: n("fst_beta"),
        premises: vec![
            (n("A"), syntax::mk_universe(l)),
            (n("B"), syntax::mk_universe(l)),
            (n("x"), syntax::mk_return_bound(1, l)),
            (n("y"), syntax::mk_return_bound(1, l)),
        ],
        conclusion: syntax::mk_eq(
            syntax::mk_rule_apply(
                n("fst"),
                vec![
                    syntax::mk_return_bound(3, l),
                    syntax::mk_return_bound(2, l),
                    syntax::mk_rule_apply(
                        n("pair"),
                        vec![
                            syntax::mk_return_bound(3, l),
                            syntax::mk_return_bound(2, l),
                            syntax::mk_return_bound(1, l),
                            syntax::mk_return_bound(0, l),
                        ],
                        l,
                    ),
                ],
                l,
            ),
            syntax::mk_return_bound(1, l),
            l,
        ),
    }))
    .unwrap();
}

/// `fst C C (pair C C ca cb)` as a term judgement.
fn fst_redex(top: &mut Toplevel) -> JTerm {
    let l = loc();
    as_jterm(run_value(
        top,
        syntax::mk_rule_apply(
            n("fst"),
            vec![
                syntax::mk_constant(n("C"), l),
                syntax::mk_constant(n("C"), l),
                syntax::mk_rule_apply(
                    n("pair"),
                    vec![
                        syntax::mk_constant(n("C"), l),
                        syntax::mk_constant(n("C"), l),
                        syntax::mk_constant(n("ca"), l),
                        syntax::mk_constant(n("cb"), l),
                    ],
                    l,
                ),
            ],
            l,
        ),
    ))
}

#[test]
fn beta_for_products_is_provable_through_the_operation() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    product_theory(&mut top);
    let lhs = fst_redex(&mut top);
    let rhs = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), loc())));

    // not α-equal, so the engine must ask
    let p = top.rt.equal_term(lhs.clone(), rhs.clone(), loc()).unwrap();
    let Partial::Suspended(opc) = p else {
        panic!("expected the equal_term operation to be raised");
    };
    assert_eq!(opc.op, *predefined::EQUAL_TERM);

    // discharge it with the β-rule, reflected into an equation
    let c_j = as_jterm(run_value(&mut top, syntax::mk_constant(n("C"), loc())));
    let ca_j = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), loc())));
    let cb_j = as_jterm(run_value(&mut top, syntax::mk_constant(n("cb"), loc())));
    let Jdg::IsTerm(proof) = jdg::form_rule(
        &top.rt.sgn,
        n("fst_beta"),
        &[c_j.clone(), c_j, ca_j, cb_j],
        loc(),
    )
    .unwrap() else {
        panic!("rule application must yield a term judgement");
    };
    let eq = jdg::reflect(&proof).unwrap();
    let answer = predefined::mk_some(Value::Judgement(Jdg::EqTerm(eq)));
    let p = opc.cont.resume(&mut top.rt, answer).unwrap();
    let Partial::Done(Value::Tag(tag, args)) = p else {
        panic!("expected a finished Some");
    };
    assert_eq!(tag, *predefined::SOME);
    let Value::Judgement(Jdg::EqTerm(eq)) = &args[0] else {
        panic!("expected an equation");
    };
    let (_, l, r, _) = eq.invert();
    assert!(alpha_equal(&l, lhs.term()));
    assert!(alpha_equal(&r, rhs.term()));
    let (_, sl, sr, _) = eq.symmetry().invert();
    assert!(alpha_equal(&sl, rhs.term()));
    assert!(alpha_equal(&sr, lhs.term()));
}

#[test]
fn eta_for_products_accepts_refl_under_reflection() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    product_theory(&mut top);
    let l = loc();
    let times_cc = || {
        syntax::mk_rule_apply(
            n("times"),
            vec![syntax::mk_constant(n("C"), l), syntax::mk_constant(n("C"), l)],
            l,
        )
    };
    // rule twist (p : times C C) : times C C
    top.run(&item(TopCmd::DeclRule {
        name: n("twist"),
        premises: vec![(n("p"), times_cc())],
        conclusion: times_cc(),
    }))
    .unwrap();
    // constant u : times C C
    top.run(&item(TopCmd::DeclConstant(n("u"), times_cc())))
        .unwrap();
    let twisted = || {
        syntax::mk_rule_apply(
            n("twist"),
            vec![syntax::mk_rule_apply(
                n("twist"),
                vec![syntax::mk_constant(n("u"), l)],
                l,
            )],
            l,
        )
    };
    // rule prod_eta : Eq (times C C) (twist (twist u)) u
    top.run(&item(TopCmd::DeclRule {
        name: n("prod_eta"),
        premises: vec![],
        conclusion: syntax::mk_eq(twisted(), syntax::mk_constant(n("u"), l), l),
    }))
    .unwrap();
    // rule eta_ty : Eq Type (Eq _ u u) (Eq _ (twist (twist u)) u)
    top.run(&item(TopCmd::DeclRule {
        name: n("eta_ty"),
        premises: vec![],
        conclusion: syntax::mk_eq(
            syntax::mk_eq(
                syntax::mk_constant(n("u"), l),
                syntax::mk_constant(n("u"), l),
                l,
            ),
            syntax::mk_eq(twisted(), syntax::mk_constant(n("u"), l), l),
            l,
        ),
    }))
    .unwrap();

    // twist (twist u) ≡ u is provable through the operation
    let lhs = as_jterm(run_value(&mut top, twisted()));
    let rhs = as_jterm(run_value(&mut top, syntax::mk_constant(n("u"), l)));
    let p = top.rt.equal_term(lhs.clone(), rhs.clone(), l).unwrap();
    let Partial::Suspended(opc) = p else {
        panic!("expected the equal_term operation to be raised");
    };
    let Jdg::IsTerm(proof) = jdg::form_rule(&top.rt.sgn, n("prod_eta"), &[], l).unwrap() else {
        panic!("rule application must yield a term judgement");
    };
    let answer = predefined::mk_some(Value::Judgement(Jdg::IsTerm(proof)));
    let p = opc.cont.resume(&mut top.rt, answer).unwrap();
    let Partial::Done(Value::Tag(tag, _)) = p else {
        panic!("expected a finished Some");
    };
    assert_eq!(tag, *predefined::SOME);

    // and the kernel accepts refl u at that type: the coerce handler equates
    // the two equality types and the ascription converts refl along it
    let handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: None,
            on_op: vec![OpCase {
                op: *predefined::COERCE,
                pats: vec![Pattern::Anonymous, Pattern::Anonymous],
                body: syntax::mk_let1(
                    Pattern::Var(n("q")),
                    syntax::mk_rule_apply(n("eta_ty"), vec![], l),
                    syntax::mk_yield(
                        syntax::mk_tag(
                            *predefined::CONVERTIBLE,
                            vec![syntax::mk_bound(0, l)],
                            l,
                        ),
                        l,
                    ),
                    l,
                ),
            }],
            on_finally: None,
        },
        l,
    );
    let v = run_value(
        &mut top,
        syntax::mk_with(
            handler,
            syntax::mk_ascribe(
                syntax::mk_refl(syntax::mk_constant(n("u"), l), l),
                syntax::mk_eq(twisted(), syntax::mk_constant(n("u"), l), l),
                l,
            ),
            l,
        ),
    );
    let j = as_jterm(v);
    let refl_u = as_jterm(run_value(
        &mut top,
        syntax::mk_refl(syntax::mk_constant(n("u"), l), l),
    ));
    assert!(alpha_equal(j.term(), refl_u.term()));
    let Value::Judgement(Jdg::IsType(target)) = run_value(
        &mut top,
        syntax::mk_eq(twisted(), syntax::mk_constant(n("u"), l), l),
    ) else {
        panic!("expected a type judgement");
    };
    assert!(alpha_equal_ty(j.ty(), target.ty()));
}

#[test]
fn wrong_proposition_answers_are_fatal() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    product_theory(&mut top);
    let lhs = fst_redex(&mut top);
    let rhs = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), loc())));

    let p = top.rt.equal_term(lhs, rhs, loc()).unwrap();
    let Partial::Suspended(opc) = p else {
        panic!("expected the equal_term operation to be raised");
    };
    // prove cb ≡ cb instead of what was asked
    let cb_j = as_jterm(run_value(&mut top, syntax::mk_constant(n("cb"), loc())));
    let eq = jdg::mk_alpha_equal_term(&cb_j, &cb_j).unwrap();
    let answer = predefined::mk_some(Value::Judgement(Jdg::EqTerm(eq)));
    let err = opc.cont.resume(&mut top.rt, answer).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidEqualTerm(_)));
    assert!(err.is_fatal());
}

#[test]
fn alpha_equal_terms_short_circuit() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    let a1 = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), loc())));
    let a2 = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), loc())));
    let p = top.rt.equal_term(a1, a2, loc()).unwrap();
    let Partial::Done(Value::Tag(tag, _)) = p else {
        panic!("expected an immediate answer");
    };
    assert_eq!(tag, *predefined::SOME);
}

#[test]
fn coercible_answers_are_validated_in_language() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    // two unrelated types and an inhabitant of each
    for (c, ty) in [("T1", None), ("T2", None), ("v1", Some("T1")), ("v2", Some("T2"))] {
        let comp = match ty {
            None => syntax::mk_universe(l),
            Some(t) => syntax::mk_constant(n(t), l),
        };
        top.run(&item(TopCmd::DeclConstant(n(c), comp))).unwrap();
    }
    // a handler that coerces anything to v2
    let coerce_handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: None,
            on_op: vec![OpCase {
                op: *predefined::COERCE,
                pats: vec![Pattern::Anonymous, Pattern::Anonymous],
                body: syntax::mk_let1(
                    Pattern::Var(n("e")),
                    syntax::mk_constant(n("v2"), l),
                    syntax::mk_yield(
                        syntax::mk_tag(
                            *predefined::COERCIBLE,
                            vec![syntax::mk_bound(0, l)],
                            l,
                        ),
                        l,
                    ),
                    l,
                ),
            }],
            on_finally: None,
        },
        l,
    );
    // (v1 : T2) succeeds under the handler and produces v2
    let v = run_value(
        &mut top,
        syntax::mk_with(
            coerce_handler.clone(),
            syntax::mk_ascribe(
                syntax::mk_constant(n("v1"), l),
                syntax::mk_constant(n("T2"), l),
                l,
            ),
            l,
        ),
    );
    let j = as_jterm(v);
    let t2 = jdg::is_type(as_jterm(run_value(&mut top, syntax::mk_constant(n("T2"), l)))).unwrap();
    assert!(alpha_equal_ty(j.ty(), t2.ty()));

    // (v1 : T1) never asks: α-fast path
    let v = run_value(
        &mut top,
        syntax::mk_ascribe(
            syntax::mk_constant(n("v1"), l),
            syntax::mk_constant(n("T1"), l),
            l,
        ),
    );
    as_jterm(v);

    // the same handler answering for a target it cannot meet is fatal
    top.run(&item(TopCmd::DeclConstant(n("T3"), syntax::mk_universe(l))))
        .unwrap();
    let err = top
        .run(&do_item(syntax::mk_with(
            coerce_handler,
            syntax::mk_ascribe(
                syntax::mk_constant(n("v1"), l),
                syntax::mk_constant(n("T3"), l),
                l,
            ),
            l,
        )))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidCoerce(_)));
}

#[test]
fn convertible_answers_go_through_reflection() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::DeclConstant(n("T1"), syntax::mk_universe(l))))
        .unwrap();
    top.run(&item(TopCmd::DeclConstant(n("T2"), syntax::mk_universe(l))))
        .unwrap();
    top.run(&item(TopCmd::DeclConstant(n("v1"), syntax::mk_constant(n("T1"), l))))
        .unwrap();
    // rule t_eq : Eq Type T1 T2, a postulated type equality
    top.run(&item(TopCmd::DeclRule {
        name: n("t_eq"),
        premises: vec![],
        conclusion: syntax::mk_eq(
            syntax::mk_constant(n("T1"), l),
            syntax::mk_constant(n("T2"), l),
            l,
        ),
    }))
    .unwrap();
    let handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: None,
            on_op: vec![OpCase {
                op: *predefined::COERCE,
                pats: vec![Pattern::Anonymous, Pattern::Anonymous],
                body: syntax::mk_let1(
                    Pattern::Var(n("p")),
                    syntax::mk_rule_apply(n("t_eq"), vec![], l),
                    syntax::mk_yield(
                        syntax::mk_tag(
                            *predefined::CONVERTIBLE,
                            vec![syntax::mk_bound(0, l)],
                            l,
                        ),
                        l,
                    ),
                    l,
                ),
            }],
            on_finally: None,
        },
        l,
    );
    let v = run_value(
        &mut top,
        syntax::mk_with(
            handler,
            syntax::mk_ascribe(
                syntax::mk_constant(n("v1"), l),
                syntax::mk_constant(n("T2"), l),
                l,
            ),
            l,
        ),
    );
    let j = as_jterm(v);
    let t2 = jdg::is_type(as_jterm(run_value(&mut top, syntax::mk_constant(n("T2"), l)))).unwrap();
    assert!(alpha_equal_ty(j.ty(), t2.ty()));
    // the coerced term is still v1, converted, not replaced
    let v1 = as_jterm(run_value(&mut top, syntax::mk_constant(n("v1"), l)));
    assert!(alpha_equal(j.term(), v1.term()));
}

#[test]
fn equal_type_follows_the_same_protocol() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::DeclConstant(n("T1"), syntax::mk_universe(l))))
        .unwrap();
    top.run(&item(TopCmd::DeclConstant(n("T2"), syntax::mk_universe(l))))
        .unwrap();
    top.run(&item(TopCmd::DeclRule {
        name: n("t_eq"),
        premises: vec![],
        conclusion: syntax::mk_eq(
            syntax::mk_constant(n("T1"), l),
            syntax::mk_constant(n("T2"), l),
            l,
        ),
    }))
    .unwrap();
    let t1 = jdg::is_type(as_jterm(run_value(&mut top, syntax::mk_constant(n("T1"), l)))).unwrap();
    let t2 = jdg::is_type(as_jterm(run_value(&mut top, syntax::mk_constant(n("T2"), l)))).unwrap();

    // the α fast path answers immediately
    let p = top.rt.equal_type(t1.clone(), t1.clone(), l).unwrap();
    let Partial::Done(Value::Tag(tag, _)) = p else {
        panic!("expected an immediate answer");
    };
    assert_eq!(tag, *predefined::SOME);

    // distinct types raise the operation; the postulate discharges it
    let p = top.rt.equal_type(t1.clone(), t2.clone(), l).unwrap();
    let Partial::Suspended(opc) = p else {
        panic!("expected the equal_type operation to be raised");
    };
    assert_eq!(opc.op, *predefined::EQUAL_TYPE);
    let Jdg::IsTerm(proof) = jdg::form_rule(&top.rt.sgn, n("t_eq"), &[], l).unwrap() else {
        panic!("rule application must yield a term judgement");
    };
    let answer = predefined::mk_some(Value::Judgement(Jdg::IsTerm(proof.clone())));
    let p = opc.cont.resume(&mut top.rt, answer).unwrap();
    let Partial::Done(Value::Tag(tag, args)) = p else {
        panic!("expected a finished Some");
    };
    assert_eq!(tag, *predefined::SOME);
    let Value::Judgement(Jdg::EqType(eq)) = &args[0] else {
        panic!("expected a type equation");
    };
    let (_, lhs, rhs) = eq.invert();
    assert!(alpha_equal_ty(&lhs, t1.ty()));
    assert!(alpha_equal_ty(&rhs, t2.ty()));

    // an answer equating the wrong types is fatal
    let p = top.rt.equal_type(t1, t2, l).unwrap();
    let Partial::Suspended(opc) = p else {
        panic!("expected the equal_type operation to be raised");
    };
    let wrong = jdg::reflect_ty(&proof).unwrap().symmetry();
    let answer = predefined::mk_some(Value::Judgement(Jdg::EqType(wrong)));
    let err = opc.cont.resume(&mut top.rt, answer).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidEqualType(_)));
    assert!(err.is_fatal());
}

#[test]
fn reflect_turns_proofs_into_equations() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    product_theory(&mut top);
    let l = loc();
    // reflect (fst_beta C C ca cb), destructured by an EqTerm pattern
    let c = syntax::mk_match(
        syntax::mk_reflect(
            syntax::mk_rule_apply(
                n("fst_beta"),
                vec![
                    syntax::mk_constant(n("C"), l),
                    syntax::mk_constant(n("C"), l),
                    syntax::mk_constant(n("ca"), l),
                    syntax::mk_constant(n("cb"), l),
                ],
                l,
            ),
            l,
        ),
        vec![MatchCase {
            pat: Pattern::Judgement(TtPattern::EqTerm(
                Box::new(TtPattern::Var(n("lhs"))),
                Box::new(TtPattern::Var(n("rhs"))),
                Box::new(TtPattern::Anonymous),
            )),
            body: syntax::mk_return(syntax::mk_tuple(
                vec![syntax::mk_bound(1, l), syntax::mk_bound(0, l)],
                l,
            )),
        }],
        l,
    );
    let v = run_value(&mut top, c);
    let Value::Tuple(vs) = v else {
        panic!("expected a pair");
    };
    let Value::Judgement(Jdg::IsTerm(lhs)) = &vs[0] else {
        panic!("expected a term judgement");
    };
    let Value::Judgement(Jdg::IsTerm(rhs)) = &vs[1] else {
        panic!("expected a term judgement");
    };
    let redex = fst_redex(&mut top);
    let ca = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), l)));
    assert!(alpha_equal(lhs.term(), redex.term()));
    assert!(alpha_equal(rhs.term(), ca.term()));
    // the reflected equation depends on nothing beyond the constants
    assert!(lhs.assumptions().is_empty());
}

#[test]
fn dynamic_scoping_restores_outer_values() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::TopDynamic(
        n("d"),
        syntax::mk_return(syntax::mk_string("v0", l)),
    )))
    .unwrap();
    // now d = "v" in (let inner = (now d = "w" in current d) in
    //                 let outer = current d in (inner, outer))
    let body = syntax::mk_let1(
        Pattern::Var(n("inner")),
        syntax::mk_now(
            n("d"),
            syntax::mk_return(syntax::mk_string("w", l)),
            syntax::mk_current(n("d"), l),
            l,
        ),
        syntax::mk_let1(
            Pattern::Var(n("outer")),
            syntax::mk_current(n("d"), l),
            syntax::mk_return(syntax::mk_tuple(
                vec![syntax::mk_bound(1, l), syntax::mk_bound(0, l)],
                l,
            )),
            l,
        ),
        l,
    );
    let v = run_value(
        &mut top,
        syntax::mk_now(n("d"), syntax::mk_return(syntax::mk_string("v", l)), body, l),
    );
    let Value::Tuple(vs) = v else {
        panic!("expected a pair");
    };
    assert!(matches!(&vs[0], Value::String(s) if s == "w"));
    assert!(matches!(&vs[1], Value::String(s) if s == "v"));
    // outside every `now` the default is visible
    let v = run_value(&mut top, syntax::mk_current(n("d"), l));
    assert!(matches!(&v, Value::String(s) if s == "v0"));
}

#[test]
fn handler_continuation_resumes_with_the_yielded_value() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::DeclOperation(n("op"), 1))).unwrap();
    top.run(&item(TopCmd::DeclMlType(
        n("wrap"),
        vec![(n("Wrapped"), 1)],
    )))
    .unwrap();
    // with (handler op x -> yield (Wrapped x))
    // handle (let a = op "1" in let b = op "2" in (a, b))
    let handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: None,
            on_op: vec![OpCase {
                op: n("op"),
                pats: vec![Pattern::Var(n("x"))],
                body: syntax::mk_yield(
                    syntax::mk_tag(n("Wrapped"), vec![syntax::mk_bound(0, l)], l),
                    l,
                ),
            }],
            on_finally: None,
        },
        l,
    );
    let body = syntax::mk_let1(
        Pattern::Var(n("a")),
        syntax::mk_operation(n("op"), vec![syntax::mk_string("1", l)], l),
        syntax::mk_let1(
            Pattern::Var(n("b")),
            syntax::mk_operation(n("op"), vec![syntax::mk_string("2", l)], l),
            syntax::mk_return(syntax::mk_tuple(
                vec![syntax::mk_bound(1, l), syntax::mk_bound(0, l)],
                l,
            )),
            l,
        ),
        l,
    );
    let v = run_value(&mut top, syntax::mk_with(handler, body, l));
    let Value::Tuple(vs) = v else {
        panic!("expected a pair");
    };
    let Value::Tag(t1, a1) = &vs[0] else {
        panic!("expected Wrapped");
    };
    assert_eq!(*t1, n("Wrapped"));
    assert!(matches!(&a1[0], Value::String(s) if s == "1"));
    let Value::Tag(_, a2) = &vs[1] else {
        panic!("expected Wrapped");
    };
    assert!(matches!(&a2[0], Value::String(s) if s == "2"));
}

#[test]
fn value_and_finally_cases_wrap_the_result() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::DeclMlType(
        n("boxes"),
        vec![(n("Val"), 1), (n("Fin"), 1)],
    )))
    .unwrap();
    let handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: Some(MatchCase {
                pat: Pattern::Var(n("v")),
                body: syntax::mk_return(syntax::mk_tag(
                    n("Val"),
                    vec![syntax::mk_bound(0, l)],
                    l,
                )),
            }),
            on_op: vec![],
            on_finally: Some(MatchCase {
                pat: Pattern::Var(n("v")),
                body: syntax::mk_return(syntax::mk_tag(
                    n("Fin"),
                    vec![syntax::mk_bound(0, l)],
                    l,
                )),
            }),
        },
        l,
    );
    let v = run_value(
        &mut top,
        syntax::mk_with(handler, syntax::mk_return(syntax::mk_string("x", l)), l),
    );
    // finally sees the value-case result
    let Value::Tag(fin, args) = v else {
        panic!("expected Fin");
    };
    assert_eq!(fin, n("Fin"));
    assert!(matches!(&args[0], Value::Tag(t, _) if *t == n("Val")));
}

#[test]
fn finally_runs_on_error_exits() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::TopLet(vec![LetClause {
        pat: Pattern::Var(n("r")),
        comp: syntax::mk_mkref(syntax::mk_string("pending", l), l),
    }])))
    .unwrap();
    let handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: None,
            on_op: vec![],
            on_finally: Some(MatchCase {
                pat: Pattern::Anonymous,
                body: syntax::mk_update(
                    syntax::mk_bound(0, l),
                    syntax::mk_string("cleaned", l),
                    l,
                ),
            }),
        },
        l,
    );
    // the handled body fails to match; the cleanup must still run and the
    // original failure must still surface
    let body = syntax::mk_match(
        syntax::mk_return(syntax::mk_string("a", l)),
        vec![MatchCase {
            pat: Pattern::String("b".to_owned()),
            body: syntax::mk_return(syntax::mk_string("no", l)),
        }],
        l,
    );
    top.run(&item(TopCmd::TopFail(syntax::mk_with(handler, body, l))))
        .unwrap();
    let v = run_value(&mut top, syntax::mk_lookup(syntax::mk_bound(0, l), l));
    assert!(matches!(&v, Value::String(s) if s == "cleaned"));
}

#[test]
fn expected_failures_are_captured_and_unexpected_successes_are_not() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    let l = loc();
    // applying ca (not a function) is a typing error the driver expects
    let bad = syntax::mk_let1(
        Pattern::Var(n("v")),
        syntax::mk_constant(n("ca"), l),
        syntax::mk_apply(syntax::mk_bound(0, l), syntax::mk_bound(0, l), l),
        l,
    );
    top.run(&item(TopCmd::TopFail(bad))).unwrap();

    // a computation that succeeds makes the `fail` item itself fail
    let good = syntax::mk_constant(n("ca"), l);
    let err = top.run(&item(TopCmd::TopFail(good))).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Runtime(_)));
}

#[test]
fn match_failures_are_recoverable() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    // match "a" with "b" -> "no"  has no matching case
    let c = syntax::mk_match(
        syntax::mk_return(syntax::mk_string("a", l)),
        vec![MatchCase {
            pat: Pattern::String("b".to_owned()),
            body: syntax::mk_return(syntax::mk_string("no", l)),
        }],
        l,
    );
    top.run(&item(TopCmd::TopFail(c))).unwrap();
}

#[test]
fn tt_patterns_bind_subterms_with_their_types() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    let l = loc();
    // match (refl ca) against ⊢ refl ?x : Eq ?T ?_ ?_ — via the Constr-free
    // route: match the judgement form and bind the subject and its type
    let c = syntax::mk_match(
        syntax::mk_refl(syntax::mk_constant(n("ca"), l), l),
        vec![MatchCase {
            pat: Pattern::Judgement(TtPattern::IsTerm(
                Box::new(TtPattern::Var(n("e"))),
                Box::new(TtPattern::Var(n("t"))),
            )),
            body: syntax::mk_return(syntax::mk_tuple(
                vec![syntax::mk_bound(1, l), syntax::mk_bound(0, l)],
                l,
            )),
        }],
        l,
    );
    let v = run_value(&mut top, c);
    let Value::Tuple(vs) = v else {
        panic!("expected a pair");
    };
    let Value::Judgement(Jdg::IsTerm(e)) = &vs[0] else {
        panic!("the term position binds a term judgement");
    };
    let Value::Judgement(Jdg::IsType(t)) = &vs[1] else {
        panic!("the type position binds a type judgement");
    };
    assert!(alpha_equal_ty(e.ty(), t.ty()));
}

#[test]
fn constr_patterns_destructure_rule_spines() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    product_theory(&mut top);
    let l = loc();
    // match fst C C (pair C C ca cb) against fst ?A ?B (pair _ _ ?x _)
    let scrutinee = syntax::mk_rule_apply(
        n("fst"),
        vec![
            syntax::mk_constant(n("C"), l),
            syntax::mk_constant(n("C"), l),
            syntax::mk_rule_apply(
                n("pair"),
                vec![
                    syntax::mk_constant(n("C"), l),
                    syntax::mk_constant(n("C"), l),
                    syntax::mk_constant(n("ca"), l),
                    syntax::mk_constant(n("cb"), l),
                ],
                l,
            ),
        ],
        l,
    );
    let pat = Pattern::Judgement(TtPattern::Constr(
        n("fst"),
        vec![
            TtPattern::Anonymous,
            TtPattern::Anonymous,
            TtPattern::Constr(
                n("pair"),
                vec![
                    TtPattern::Anonymous,
                    TtPattern::Anonymous,
                    TtPattern::Var(n("x")),
                    TtPattern::Anonymous,
                ],
            ),
        ],
    ));
    let c = syntax::mk_match(
        scrutinee,
        vec![MatchCase {
            pat,
            body: syntax::mk_return_bound(0, l),
        }],
        l,
    );
    let j = as_jterm(run_value(&mut top, c));
    let ca = as_jterm(run_value(&mut top, syntax::mk_constant(n("ca"), l)));
    assert!(alpha_equal(j.term(), ca.term()));
}

#[test]
fn abstraction_substitution_round_trip() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    let l = loc();
    // (abstract x : C in refl x) instantiated at ca gives refl ca
    let c = syntax::mk_substitute(
        syntax::mk_abstract(
            n("x"),
            syntax::mk_constant(n("C"), l),
            syntax::mk_refl(syntax::mk_return_bound(0, l), l),
            l,
        ),
        syntax::mk_constant(n("ca"), l),
        l,
    );
    let j = as_jterm(run_value(&mut top, c));
    let refl_ca = as_jterm(run_value(
        &mut top,
        syntax::mk_refl(syntax::mk_constant(n("ca"), l), l),
    ));
    assert!(alpha_equal(j.term(), refl_ca.term()));
    assert!(alpha_equal_ty(j.ty(), refl_ca.ty()));
}

#[test]
fn functions_and_tag_patterns() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    // let f = fun (Some x as w) -> (x, w) in f (Some "a")
    let f = syntax::mk_function(
        Pattern::As(
            Box::new(Pattern::Tag(
                *predefined::SOME,
                vec![Pattern::Var(n("x"))],
            )),
            n("w"),
        ),
        syntax::mk_return(syntax::mk_tuple(
            vec![syntax::mk_bound(1, l), syntax::mk_bound(0, l)],
            l,
        )),
        l,
    );
    let c = syntax::mk_let1(
        Pattern::Var(n("f")),
        syntax::mk_return(f),
        syntax::mk_apply(
            syntax::mk_bound(0, l),
            syntax::mk_tag(
                *predefined::SOME,
                vec![syntax::mk_string("a", l)],
                l,
            ),
            l,
        ),
        l,
    );
    let v = run_value(&mut top, c);
    let Value::Tuple(vs) = v else {
        panic!("expected a pair");
    };
    assert!(matches!(&vs[0], Value::String(s) if s == "a"));
    assert!(matches!(&vs[1], Value::Tag(t, _) if *t == *predefined::SOME));
}

#[test]
fn first_class_dynamics_read_the_current_scope() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::TopDynamic(
        n("fd"),
        syntax::mk_return(syntax::mk_string("base", l)),
    )))
    .unwrap();
    // now fd = "scoped" in (let cell = dynamic fd in !cell)
    let c = syntax::mk_now(
        n("fd"),
        syntax::mk_return(syntax::mk_string("scoped", l)),
        syntax::mk_let1(
            Pattern::Var(n("cell")),
            syntax::mk_dynamic(n("fd"), l),
            syntax::mk_lookup(syntax::mk_bound(0, l), l),
            l,
        ),
        l,
    );
    let v = run_value(&mut top, c);
    assert!(matches!(&v, Value::String(s) if s == "scoped"));
}

#[test]
fn references_are_mutable_and_immediate() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    // let r = ref "a" in (r := "b"; !r)
    let c = syntax::mk_let1(
        Pattern::Var(n("r")),
        syntax::mk_mkref(syntax::mk_string("a", l), l),
        syntax::mk_sequence(
            syntax::mk_update(syntax::mk_bound(0, l), syntax::mk_string("b", l), l),
            syntax::mk_lookup(syntax::mk_bound(0, l), l),
            l,
        ),
        l,
    );
    let v = run_value(&mut top, c);
    assert!(matches!(&v, Value::String(s) if s == "b"));
}

#[test]
fn letrec_closures_capture_each_other() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    // rec last l = match l with [x] -> x | _ :: t -> last t
    let clauses = vec![RecClause {
        name: n("last"),
        arg: Pattern::Var(n("l")),
        body: syntax::mk_match(
            syntax::mk_return_bound(0, l),
            vec![
                MatchCase {
                    pat: Pattern::List(vec![Pattern::Var(n("x"))]),
                    body: syntax::mk_return_bound(0, l),
                },
                MatchCase {
                    pat: Pattern::Cons(
                        Box::new(Pattern::Anonymous),
                        Box::new(Pattern::Var(n("t"))),
                    ),
                    // `last` is two binders out: the list argument and the tail
                    body: syntax::mk_apply(
                        syntax::mk_bound(2, l),
                        syntax::mk_bound(0, l),
                        l,
                    ),
                },
            ],
            l,
        ),
    }];
    let body = syntax::mk_apply(
        syntax::mk_bound(0, l),
        syntax::mk_list(
            vec![
                syntax::mk_string("a", l),
                syntax::mk_string("b", l),
                syntax::mk_string("c", l),
            ],
            l,
        ),
        l,
    );
    let v = run_value(&mut top, syntax::mk_letrec(clauses, body, l));
    assert!(matches!(&v, Value::String(s) if s == "c"));
}

#[test]
fn structures_project_their_fields() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    let l = loc();
    // signature pt { carrier : Type; el : carrier }
    top.run(&item(TopCmd::DeclSignature(
        n("pt"),
        vec![
            (n("carrier"), syntax::mk_universe(l)),
            (n("el"), syntax::mk_return_bound(0, l)),
        ],
    )))
    .unwrap();
    let structure = syntax::mk_structure(
        n("pt"),
        vec![
            syntax::mk_constant(n("C"), l),
            syntax::mk_constant(n("ca"), l),
        ],
        l,
    );
    let j = as_jterm(run_value(
        &mut top,
        syntax::mk_projection(structure, n("el"), l),
    ));
    let c_ty = jdg::is_type(as_jterm(run_value(&mut top, syntax::mk_constant(n("C"), l)))).unwrap();
    assert!(alpha_equal_ty(j.ty(), c_ty.ty()));
    // the signature is a type on its own
    let v = run_value(&mut top, syntax::mk_signature_ty(n("pt"), l));
    assert!(matches!(v, Value::Judgement(Jdg::IsType(_))));
}

#[test]
fn unhandled_operations_are_runtime_errors() {
    let mut top = Toplevel::new().unwrap();
    let l = loc();
    top.run(&item(TopCmd::DeclOperation(n("ping"), 0))).unwrap();
    let err = top
        .run(&do_item(syntax::mk_operation(n("ping"), vec![], l)))
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::Runtime(_)));
    // but a handler takes it
    let handler = syntax::mk_handler(
        HandlerSyntax {
            on_value: None,
            on_op: vec![OpCase {
                op: n("ping"),
                pats: vec![],
                body: syntax::mk_yield(syntax::mk_string("pong", l), l),
            }],
            on_finally: None,
        },
        l,
    );
    let v = run_value(
        &mut top,
        syntax::mk_with(handler, syntax::mk_operation(n("ping"), vec![], l), l),
    );
    assert!(matches!(&v, Value::String(s) if s == "pong"));
}

#[test]
fn toplevel_let_binds_into_later_items() {
    let mut top = Toplevel::new().unwrap();
    base_theory(&mut top);
    let l = loc();
    top.run(&item(TopCmd::TopLet(vec![LetClause {
        pat: Pattern::Var(n("idc")),
        comp: syntax::mk_abstract(
            n("x"),
            syntax::mk_constant(n("C"), l),
            syntax::mk_return_bound(0, l),
            l,
        ),
    }])))
    .unwrap();
    let c = syntax::mk_let1(
        Pattern::Var(n("v")),
        syntax::mk_constant(n("ca"), l),
        syntax::mk_apply(syntax::mk_bound(1, l), syntax::mk_bound(0, l), l),
        l,
    );
    let j = as_jterm(run_value(&mut top, c));
    let c_ty = jdg::is_type(as_jterm(run_value(&mut top, syntax::mk_constant(n("C"), l)))).unwrap();
    assert!(alpha_equal_ty(j.ty(), c_ty.ty()));
}
