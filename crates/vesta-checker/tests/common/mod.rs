//! Shared fixtures: a declaration store with the classes most tests use,
//! and helpers to run one body through the checker.

#![allow(dead_code)]

use vesta_ast::Body;
use vesta_checker::{check_body, Checker, TypedTree, TypingContext};
use vesta_common::diagnostics::{Diagnostic, DiagnosticSink};
use vesta_common::Atom;
use vesta_solver::{ClassDefBuilder, DeclStore, TypeId, TypeInterner, Visibility};

pub struct Harness {
    pub types: TypeInterner,
    pub decls: DeclStore,
}

impl Harness {
    /// A store with the standard fixture classes:
    ///
    /// - `class A { public int $x; public ?int $p; public function m(): int;
    ///    public function touch(): void; }`
    /// - `class B { public string $x; }`
    /// - `class Ext` with `members_fully_known = false`
    /// - `interface I1 { public function m(): int; }` and empty `interface I2`
    /// - `class Exc {}`
    pub fn new() -> Harness {
        let types = TypeInterner::new();
        let decls = DeclStore::new();

        decls.define(
            &types,
            ClassDefBuilder::new("A")
                .prop("x", TypeId::INT)
                .prop("p", types.nullable(TypeId::INT))
                .method("m", types.fun(vec![], TypeId::INT))
                .method("touch", types.fun(vec![], TypeId::VOID)),
        );
        decls.define(&types, ClassDefBuilder::new("B").prop("x", TypeId::STRING));
        decls.define(&types, ClassDefBuilder::new("Ext").not_fully_known());
        decls.define(
            &types,
            ClassDefBuilder::interface("I1").method("m", types.fun(vec![], TypeId::INT)),
        );
        decls.define(&types, ClassDefBuilder::interface("I2"));
        decls.define(&types, ClassDefBuilder::new("Exc"));

        Harness { types, decls }
    }

    pub fn class_ty(&self, name: &str) -> TypeId {
        vesta_solver::decl::class_named(&self.types, name)
    }

    /// Check a top-level function body.
    pub fn check(&self, body: &Body) -> (TypedTree, Vec<Diagnostic>) {
        let sink = DiagnosticSink::new();
        let ctx = TypingContext::new(&self.types, &self.decls, &sink);
        let tast = check_body(ctx, body).expect("function check should complete");
        (tast, sink.into_diagnostics())
    }

    /// Check a method body lexically inside `class_name`.
    pub fn check_in_class(&self, class_name: &str, body: &Body) -> (TypedTree, Vec<Diagnostic>) {
        let sink = DiagnosticSink::new();
        let ctx = TypingContext::new(&self.types, &self.decls, &sink)
            .with_self_class(Atom::new(class_name));
        let tast = check_body(ctx, body).expect("method check should complete");
        (tast, sink.into_diagnostics())
    }

    /// A bare checker for driving member/class-id resolution directly.
    pub fn checker<'a>(&'a self, sink: &'a DiagnosticSink) -> Checker<'a> {
        Checker::new(TypingContext::new(&self.types, &self.decls, sink))
    }

    pub fn checker_in_class<'a>(
        &'a self,
        sink: &'a DiagnosticSink,
        class_name: &str,
    ) -> Checker<'a> {
        Checker::new(
            TypingContext::new(&self.types, &self.decls, sink)
                .with_self_class(Atom::new(class_name)),
        )
    }
}

pub fn codes(diags: &[Diagnostic]) -> Vec<u32> {
    diags.iter().map(|d| d.code).collect()
}

pub fn assert_no_diagnostics(diags: &[Diagnostic]) {
    assert!(
        diags.is_empty(),
        "expected a clean check, got: {:?}",
        diags.iter().map(|d| &d.message_text).collect::<Vec<_>>()
    );
}

/// Ensure `Visibility` is re-exported where tests expect it.
pub type Vis = Visibility;
