//! Flow-sensitive environment behavior: branch merging, possibly-unset
//! locals, refinements and their invalidation, loops, switch, lambdas.

mod common;

use common::{assert_no_diagnostics, codes, Harness};
use vesta_ast::builder::Builder;
use vesta_ast::{Hint, StmtKind};
use vesta_common::diagnostics::diagnostic_codes;
use vesta_common::Atom;
use vesta_solver::TypeId;

#[test]
fn branches_assigning_same_type_merge_cleanly() {
    // function f(bool $c): int { if ($c) { $x = 1; } else { $x = 2; }
    //                            return $x; }
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let x = b.local("x");
    let read = b.lvar(x);
    let read_id = read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: Some(Hint::Int),
        stmts: vec![
            b.if_(
                b.lvar(c),
                vec![b.expr_stmt(b.assign(b.lvar(x), b.int(1)))],
                vec![b.expr_stmt(b.assign(b.lvar(x), b.int(2)))],
            ),
            b.ret(read),
        ],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(read_id), Some(TypeId::INT));
}

#[test]
fn branches_assigning_different_types_merge_to_union() {
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let x = b.local("x");
    let read = b.lvar(x);
    let read_id = read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: None,
        stmts: vec![
            b.if_(
                b.lvar(c),
                vec![b.expr_stmt(b.assign(b.lvar(x), b.int(1)))],
                vec![b.expr_stmt(b.assign(b.lvar(x), b.str("s")))],
            ),
            b.expr_stmt(read),
        ],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(
        tast.type_of(read_id),
        Some(h.types.union(vec![TypeId::INT, TypeId::STRING]))
    );
}

#[test]
fn one_sided_assignment_is_possibly_unset() {
    // function f(bool $c): int { if ($c) { $x = 1; } return $x; }
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let x = b.local("x");
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: Some(Hint::Int),
        stmts: vec![
            b.if_(
                b.lvar(c),
                vec![b.expr_stmt(b.assign(b.lvar(x), b.int(1)))],
                vec![],
            ),
            b.ret(b.lvar(x)),
        ],
    };
    let (_, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::POSSIBLY_UNSET_LOCAL]);
}

#[test]
fn is_class_check_narrows_a_local() {
    // function f(mixed $m): void { if ($m is A) { $m->x; } }
    let h = Harness::new();
    let b = Builder::new();
    let m = b.local("m");
    let access = b.obj_get(b.lvar(m), "x");
    let access_id = access.id;
    let body = vesta_ast::Body {
        params: vec![b.param(m, Hint::Mixed)],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_hint(b.lvar(m), Hint::Apply(Atom::new("A"), vec![])),
            vec![b.expr_stmt(access)],
            vec![],
        )],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(access_id), Some(TypeId::INT));
}

#[test]
fn is_nonnull_refines_a_property_chain() {
    // function f(A $a): void { if ($a->p is nonnull) { $a->p; } }
    let h = Harness::new();
    let b = Builder::new();
    let a = b.local("a");
    let inner = b.obj_get(b.lvar(a), "p");
    let refined_read = b.obj_get(b.lvar(a), "p");
    let refined_id = refined_read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(a, Hint::Apply(Atom::new("A"), vec![]))],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_nonnull(inner),
            vec![b.expr_stmt(refined_read)],
            vec![],
        )],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(refined_id), Some(TypeId::INT));
}

#[test]
fn reassigning_the_root_invalidates_the_refinement() {
    // if ($a->p is nonnull) { $a = new A(); $a->p; }  -> back to ?int
    let h = Harness::new();
    let b = Builder::new();
    let a = b.local("a");
    let inner = b.obj_get(b.lvar(a), "p");
    let read_after = b.obj_get(b.lvar(a), "p");
    let read_after_id = read_after.id;
    let body = vesta_ast::Body {
        params: vec![b.param(a, Hint::Apply(Atom::new("A"), vec![]))],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_nonnull(inner),
            vec![
                b.expr_stmt(b.assign(b.lvar(a), b.new_obj(b.cid_named("A"), vec![]))),
                b.expr_stmt(read_after),
            ],
            vec![],
        )],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(
        tast.type_of(read_after_id),
        Some(h.types.nullable(TypeId::INT))
    );
}

#[test]
fn a_call_invalidates_refinements() {
    // if ($a->p is nonnull) { $a->touch(); $a->p; }  -> back to ?int
    let h = Harness::new();
    let b = Builder::new();
    let a = b.local("a");
    let inner = b.obj_get(b.lvar(a), "p");
    let read_after = b.obj_get(b.lvar(a), "p");
    let read_after_id = read_after.id;
    let body = vesta_ast::Body {
        params: vec![b.param(a, Hint::Apply(Atom::new("A"), vec![]))],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_nonnull(inner),
            vec![
                b.expr_stmt(b.call(b.obj_get(b.lvar(a), "touch"), vec![])),
                b.expr_stmt(read_after),
            ],
            vec![],
        )],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(
        tast.type_of(read_after_id),
        Some(h.types.nullable(TypeId::INT))
    );
}

#[test]
fn refinement_survives_into_both_reads_before_invalidation() {
    // if ($a->p is nonnull) { $a->p; $a->p; } both reads narrowed.
    let h = Harness::new();
    let b = Builder::new();
    let a = b.local("a");
    let inner = b.obj_get(b.lvar(a), "p");
    let first = b.obj_get(b.lvar(a), "p");
    let second = b.obj_get(b.lvar(a), "p");
    let (first_id, second_id) = (first.id, second.id);
    let body = vesta_ast::Body {
        params: vec![b.param(a, Hint::Apply(Atom::new("A"), vec![]))],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_nonnull(inner),
            vec![b.expr_stmt(first), b.expr_stmt(second)],
            vec![],
        )],
    };
    let (tast, _) = h.check(&body);
    assert_eq!(tast.type_of(first_id), Some(TypeId::INT));
    assert_eq!(tast.type_of(second_id), Some(TypeId::INT));
}

// =============================================================================
// Loops
// =============================================================================

#[test]
fn loop_body_widens_the_local() {
    // $x = 1; while ($c) { $x = "s"; } read $x : (int | string)
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let x = b.local("x");
    let read = b.lvar(x);
    let read_id = read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: None,
        stmts: vec![
            b.expr_stmt(b.assign(b.lvar(x), b.int(1))),
            b.while_(
                b.lvar(c),
                vec![b.expr_stmt(b.assign(b.lvar(x), b.str("s")))],
            ),
            b.expr_stmt(read),
        ],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(
        tast.type_of(read_id),
        Some(h.types.union(vec![TypeId::INT, TypeId::STRING]))
    );
}

#[test]
fn stable_loop_converges_before_the_bound() {
    // Even with a generous bound the loop stops once nothing widens.
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let x = b.local("x");
    let read = b.lvar(x);
    let read_id = read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: None,
        stmts: vec![
            b.expr_stmt(b.assign(b.lvar(x), b.int(0))),
            b.while_(
                b.lvar(c),
                vec![b.expr_stmt(b.assign(b.lvar(x), b.int(1)))],
            ),
            b.expr_stmt(read),
        ],
    };
    let sink = vesta_common::diagnostics::DiagnosticSink::new();
    let ctx = vesta_checker::TypingContext::new(&h.types, &h.decls, &sink).with_options(
        vesta_checker::CheckerOptions {
            loop_bound: Some(5),
        },
    );
    let tast = vesta_checker::check_body(ctx, &body).unwrap();
    assert!(sink.is_empty());
    assert_eq!(tast.type_of(read_id), Some(TypeId::INT));
}

#[test]
fn local_first_set_in_loop_body_is_possibly_unset_after() {
    // while ($c) { $y = 1; } read $y -> possibly unset
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let y = b.local("y");
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: None,
        stmts: vec![
            b.while_(
                b.lvar(c),
                vec![b.expr_stmt(b.assign(b.lvar(y), b.int(1)))],
            ),
            b.expr_stmt(b.lvar(y)),
        ],
    };
    let (_, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::POSSIBLY_UNSET_LOCAL]);
}

#[test]
fn do_while_body_always_runs() {
    // do { $y = 1; } while ($c); read $y -> defined
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let y = b.local("y");
    let read = b.lvar(y);
    let read_id = read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: None,
        stmts: vec![
            b.stmt(StmtKind::DoWhile {
                body: vec![b.expr_stmt(b.assign(b.lvar(y), b.int(1)))],
                cond: b.lvar(c),
            }),
            b.expr_stmt(read),
        ],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(read_id), Some(TypeId::INT));
}

#[test]
fn break_rejoins_the_loop_exit() {
    // while ($c) { $x = 1; break; } read $x -> possibly unset (loop may
    // not run), but no undefined-local error.
    let h = Harness::new();
    let b = Builder::new();
    let c = b.local("c");
    let x = b.local("x");
    let body = vesta_ast::Body {
        params: vec![b.param(c, Hint::Bool)],
        ret: None,
        stmts: vec![
            b.while_(
                b.lvar(c),
                vec![
                    b.expr_stmt(b.assign(b.lvar(x), b.int(1))),
                    b.stmt(StmtKind::Break),
                ],
            ),
            b.expr_stmt(b.lvar(x)),
        ],
    };
    let (_, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::POSSIBLY_UNSET_LOCAL]);
}

// =============================================================================
// Switch
// =============================================================================

#[test]
fn switch_with_default_defines_on_every_path() {
    let h = Harness::new();
    let b = Builder::new();
    let s = b.local("s");
    let x = b.local("x");
    let read = b.lvar(x);
    let read_id = read.id;
    let body = vesta_ast::Body {
        params: vec![b.param(s, Hint::Int)],
        ret: None,
        stmts: vec![
            b.stmt(StmtKind::Switch {
                subject: b.lvar(s),
                cases: vec![vesta_ast::Case {
                    rhs: b.int(1),
                    body: vec![
                        b.expr_stmt(b.assign(b.lvar(x), b.int(10))),
                        b.stmt(StmtKind::Break),
                    ],
                }],
                default: Some(vec![b.expr_stmt(b.assign(b.lvar(x), b.int(20)))]),
            }),
            b.expr_stmt(read),
        ],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(read_id), Some(TypeId::INT));
}

#[test]
fn switch_without_default_keeps_the_unmatched_path() {
    let h = Harness::new();
    let b = Builder::new();
    let s = b.local("s");
    let x = b.local("x");
    let body = vesta_ast::Body {
        params: vec![b.param(s, Hint::Int)],
        ret: None,
        stmts: vec![
            b.stmt(StmtKind::Switch {
                subject: b.lvar(s),
                cases: vec![vesta_ast::Case {
                    rhs: b.int(1),
                    body: vec![
                        b.expr_stmt(b.assign(b.lvar(x), b.int(10))),
                        b.stmt(StmtKind::Break),
                    ],
                }],
                default: None,
            }),
            b.expr_stmt(b.lvar(x)),
        ],
    };
    let (_, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::POSSIBLY_UNSET_LOCAL]);
}

#[test]
fn switch_fallthrough_carries_state_into_the_next_case() {
    // case 1 assigns and falls through; case 2's body sees the binding.
    let h = Harness::new();
    let b = Builder::new();
    let s = b.local("s");
    let x = b.local("x");
    let read_in_case2 = b.lvar(x);
    let read_id = read_in_case2.id;
    let body = vesta_ast::Body {
        params: vec![b.param(s, Hint::Int)],
        ret: None,
        stmts: vec![b.stmt(StmtKind::Switch {
            subject: b.lvar(s),
            cases: vec![
                vesta_ast::Case {
                    rhs: b.int(1),
                    body: vec![
                        b.expr_stmt(b.assign(b.lvar(x), b.int(10))),
                        b.stmt(StmtKind::Fallthrough),
                    ],
                },
                vesta_ast::Case {
                    rhs: b.int(2),
                    body: vec![b.expr_stmt(read_in_case2), b.stmt(StmtKind::Break)],
                },
            ],
            default: None,
        })],
    };
    let (tast, diags) = h.check(&body);
    // Case 2 can also be entered directly, where $x is unset.
    assert_eq!(codes(&diags), vec![diagnostic_codes::POSSIBLY_UNSET_LOCAL]);
    assert_eq!(tast.type_of(read_id), Some(TypeId::DYNAMIC));
}

// =============================================================================
// Returns
// =============================================================================

#[test]
fn missing_return_is_diagnosed() {
    let h = Harness::new();
    let b = Builder::new();
    let body = vesta_ast::Body {
        params: vec![],
        ret: Some(Hint::Int),
        stmts: vec![b.expr_stmt(b.int(1))],
    };
    let (_, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::MISSING_RETURN]);
}

#[test]
fn return_type_mismatch_reports_and_records_a_hole() {
    let h = Harness::new();
    let b = Builder::new();
    let value = b.str("oops");
    let value_id = value.id;
    let body = vesta_ast::Body {
        params: vec![],
        ret: Some(Hint::Int),
        stmts: vec![b.ret(value)],
    };
    let (tast, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::TYPE_MISMATCH]);
    let hole = tast.hole_at(value_id).expect("type hole recorded");
    assert_eq!(hole.actual, TypeId::STRING);
    assert_eq!(hole.expected, TypeId::INT);
}

#[test]
fn void_function_may_fall_through() {
    let h = Harness::new();
    let b = Builder::new();
    let body = vesta_ast::Body {
        params: vec![],
        ret: Some(Hint::Void),
        stmts: vec![b.expr_stmt(b.int(1))],
    };
    let (_, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
}

// =============================================================================
// Lambdas
// =============================================================================

#[test]
fn lambda_sees_refinements_only_for_captured_roots() {
    let h = Harness::new();
    let b = Builder::new();
    let a = b.local("a");

    // Without a capture the refinement is gone inside the body.
    let inner_read = b.obj_get(b.lvar(a), "p");
    let inner_id = inner_read.id;
    let lambda = b.expr(vesta_ast::ExprKind::Lambda {
        params: vec![],
        captures: vec![],
        body: vec![b.expr_stmt(inner_read)],
    });
    let body = vesta_ast::Body {
        params: vec![b.param(a, Hint::Apply(Atom::new("A"), vec![]))],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_nonnull(b.obj_get(b.lvar(a), "p")),
            vec![b.expr_stmt(lambda)],
            vec![],
        )],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(inner_id), Some(h.types.nullable(TypeId::INT)));

    // With the root captured, the refinement survives into the body.
    let b = Builder::new();
    let a = b.local("a");
    let inner_read = b.obj_get(b.lvar(a), "p");
    let inner_id = inner_read.id;
    let lambda = b.expr(vesta_ast::ExprKind::Lambda {
        params: vec![],
        captures: vec![a],
        body: vec![b.expr_stmt(inner_read)],
    });
    let body = vesta_ast::Body {
        params: vec![b.param(a, Hint::Apply(Atom::new("A"), vec![]))],
        ret: Some(Hint::Void),
        stmts: vec![b.if_(
            b.is_nonnull(b.obj_get(b.lvar(a), "p")),
            vec![b.expr_stmt(lambda)],
            vec![],
        )],
    };
    let (tast, diags) = h.check(&body);
    assert_no_diagnostics(&diags);
    assert_eq!(tast.type_of(inner_id), Some(TypeId::INT));
}

#[test]
fn lambda_mutations_do_not_leak_out() {
    let h = Harness::new();
    let b = Builder::new();
    let z = b.local("z");
    let lambda = b.expr(vesta_ast::ExprKind::Lambda {
        params: vec![],
        captures: vec![],
        body: vec![b.expr_stmt(b.assign(b.lvar(z), b.int(1)))],
    });
    let body = vesta_ast::Body {
        params: vec![],
        ret: None,
        stmts: vec![b.expr_stmt(lambda), b.expr_stmt(b.lvar(z))],
    };
    let (_, diags) = h.check(&body);
    assert_eq!(codes(&diags), vec![diagnostic_codes::UNDEFINED_LOCAL]);
}
