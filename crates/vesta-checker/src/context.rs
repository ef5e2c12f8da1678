//! Checker state: the immutable per-check context and the mutable `Checker`
//! driving one function body.

use crate::env::LocalEnv;
use crate::tast::TypedTree;
use rustc_hash::FxHashMap;
use vesta_common::diagnostics::{Diagnostic, format_message};
use vesta_common::{Atom, Pos};
use vesta_solver::{DeclProvider, TypeId, TypeInterner, TyvarStore};

/// Hard cap on loop fixpoint iterations, whatever the nesting depth says.
pub const MAX_LOOP_FIXPOINT_ITERS: u32 = 8;

/// Tunables for one check.
#[derive(Clone, Debug, Default)]
pub struct CheckerOptions {
    /// Override for the loop fixpoint iteration bound. When unset the bound
    /// is the syntactic loop nesting depth (1 for an unnested loop).
    pub loop_bound: Option<u32>,
}

/// Internal invariant violation (category 3): fatal to the current
/// function's check only. The driver abandons the unit and moves on.
#[derive(Clone, Debug)]
pub struct InternalError {
    pub message: String,
    pub pos: Pos,
}

impl InternalError {
    pub fn new(pos: Pos, message: impl Into<String>) -> Self {
        InternalError {
            message: message.into(),
            pos,
        }
    }
}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "internal checker error: {}", self.message)
    }
}

impl std::error::Error for InternalError {}

/// Shared, immutable inputs of one function-body check.
pub struct TypingContext<'a> {
    pub types: &'a TypeInterner,
    pub decls: &'a dyn DeclProvider,
    pub sink: &'a vesta_common::diagnostics::DiagnosticSink,
    pub options: CheckerOptions,
    /// Lexically enclosing class, when checking a method body.
    pub self_class: Option<Atom>,
    /// True when checking a static method (no `$this`).
    pub static_context: bool,
    /// In-scope generic parameters and their upper bounds (class-level
    /// parameters plus any method-level ones supplied by the caller).
    pub tparams: FxHashMap<Atom, Vec<TypeId>>,
}

impl<'a> TypingContext<'a> {
    pub fn new(
        types: &'a TypeInterner,
        decls: &'a dyn DeclProvider,
        sink: &'a vesta_common::diagnostics::DiagnosticSink,
    ) -> Self {
        TypingContext {
            types,
            decls,
            sink,
            options: CheckerOptions::default(),
            self_class: None,
            static_context: false,
            tparams: FxHashMap::default(),
        }
    }

    pub fn with_options(mut self, options: CheckerOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the enclosing class; its type parameters enter scope with their
    /// declared bounds.
    pub fn with_self_class(mut self, name: Atom) -> Self {
        self.self_class = Some(name);
        if let Some(def) = self.decls.get_class(name) {
            for tp in &def.tparams {
                self.tparams.insert(tp.name, tp.bounds.clone());
            }
        }
        self
    }

    pub fn with_static_context(mut self) -> Self {
        self.static_context = true;
        self
    }

    pub fn with_tparam(mut self, name: Atom, bounds: Vec<TypeId>) -> Self {
        self.tparams.insert(name, bounds);
        self
    }
}

/// Mutable state of one function-body check.
pub struct Checker<'a> {
    pub ctx: TypingContext<'a>,
    pub env: LocalEnv,
    pub tyvars: TyvarStore,
    pub tast: TypedTree,
    /// Declared return type of the body being checked (swapped while inside
    /// a lambda).
    pub(crate) ret_ty: TypeId,
    pub(crate) loop_depth: u32,
    /// Inside a try body: every statement boundary is a potential throw
    /// point contributing to `Catch`.
    pub(crate) in_try: bool,
}

impl<'a> Checker<'a> {
    pub fn new(ctx: TypingContext<'a>) -> Self {
        Checker {
            ctx,
            env: LocalEnv::begin([]),
            tyvars: TyvarStore::new(),
            tast: TypedTree::default(),
            ret_ty: TypeId::DYNAMIC,
            loop_depth: 0,
            in_try: false,
        }
    }

    pub(crate) fn error_at(&self, pos: Pos, code: u32, template: &str, args: &[&str]) {
        self.ctx
            .sink
            .report(Diagnostic::error(pos, format_message(template, args), code));
    }

    pub(crate) fn warning_at(&self, pos: Pos, code: u32, template: &str, args: &[&str]) {
        self.ctx
            .sink
            .report(Diagnostic::warning(pos, format_message(template, args), code));
    }

    /// The type of the enclosing class instantiated at its own parameters
    /// (`C<T1, ..., Tn>`).
    pub(crate) fn self_class_ty(&self, exact: vesta_solver::Exactness) -> Option<TypeId> {
        let name = self.ctx.self_class?;
        let args = match self.ctx.decls.get_class(name) {
            Some(def) => def
                .tparams
                .iter()
                .map(|tp| self.ctx.types.generic(tp.name, vec![]))
                .collect(),
            None => Vec::new(),
        };
        Some(self.ctx.types.class(name, exact, args))
    }
}
