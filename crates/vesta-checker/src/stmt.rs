//! Statement checking: drives the continuation environment through control
//! flow, loops (bounded fixpoint), switch fall-through and try/catch/finally.

use crate::context::{Checker, InternalError, MAX_LOOP_FIXPOINT_ITERS};
use crate::env::{ContKey, ContMap, LocalEnv, LocalLookup, PerContEntry};
use tracing::trace;
use vesta_ast::{Block, Body, Catch, Expr, ExprKind, IsHint, LocalId, Stmt, StmtKind, Unop};
use vesta_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use vesta_common::Pos;
use vesta_solver::{coerce, Exactness, PrimKind, Subtyper, TypeId, TypeKey};

impl Checker<'_> {
    /// Check a whole function body: seed the environment from parameters,
    /// walk the statements, then apply the implicit-return policy.
    pub fn check_body(&mut self, body: &Body) -> Result<(), InternalError> {
        let params: Vec<(LocalId, TypeId, Pos)> = body
            .params
            .iter()
            .map(|p| {
                let ty = self.localize_hint(&p.hint, p.pos);
                (p.name, ty, p.pos)
            })
            .collect();
        self.env = LocalEnv::begin(params);
        self.ret_ty = match &body.ret {
            Some(hint) => self.localize_hint(hint, Pos::NONE),
            None => TypeId::DYNAMIC,
        };

        self.check_block(&body.stmts)?;

        // Falling off the end returns no value; that must be acceptable for
        // the declared return type.
        if self.env.has_next()
            && coerce(self.ctx.types, self.ctx.decls, TypeId::VOID, self.ret_ty).is_err()
        {
            let shown = self.ctx.types.display(self.ret_ty);
            self.error_at(
                Pos::NONE,
                diagnostic_codes::MISSING_RETURN,
                diagnostic_messages::MISSING_RETURN,
                &[&shown],
            );
        }
        Ok(())
    }

    pub fn check_block(&mut self, block: &Block) -> Result<(), InternalError> {
        for stmt in block {
            if !self.env.has_next() {
                // The rest of the block is unreachable.
                break;
            }
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    pub fn check_stmt(&mut self, stmt: &Stmt) -> Result<(), InternalError> {
        // Inside a try body every statement boundary is a potential throw
        // point: the current state contributes to Catch.
        if self.in_try {
            self.env.save_into(self.ctx.types, ContKey::Catch);
        }

        match &stmt.kind {
            StmtKind::Noop => Ok(()),
            StmtKind::Expr(e) => {
                self.infer(e)?;
                Ok(())
            }
            StmtKind::Block(block) => self.check_block(block),
            StmtKind::Return(value) => self.check_return(stmt, value.as_ref()),
            StmtKind::Throw(e) => {
                self.infer(e)?;
                self.env.save_into(self.ctx.types, ContKey::Catch);
                self.env.conts.remove(ContKey::Next);
                Ok(())
            }
            StmtKind::Break => {
                self.env.move_to(self.ctx.types, ContKey::Break);
                Ok(())
            }
            StmtKind::Continue => {
                self.env.move_to(self.ctx.types, ContKey::Continue);
                Ok(())
            }
            StmtKind::Fallthrough => {
                self.env.move_to(self.ctx.types, ContKey::Fallthrough);
                Ok(())
            }
            StmtKind::If { cond, then, else_ } => self.check_if(cond, then, else_),
            StmtKind::While { cond, body } => self.check_loop(Some(cond), body, &[], true),
            StmtKind::DoWhile { body, cond } => self.check_loop(Some(cond), body, &[], false),
            StmtKind::For {
                init,
                cond,
                incr,
                body,
            } => {
                for e in init {
                    self.infer(e)?;
                }
                self.check_loop(cond.as_ref(), body, incr, true)
            }
            StmtKind::Switch {
                subject,
                cases,
                default,
            } => self.check_switch(subject, cases, default.as_ref()),
            StmtKind::Try {
                body,
                catches,
                finally,
            } => self.check_try(stmt, body, catches, finally),
        }
    }

    fn check_return(&mut self, stmt: &Stmt, value: Option<&Expr>) -> Result<(), InternalError> {
        let (ty, node) = match value {
            Some(e) => (self.infer(e)?, Some(e)),
            None => (TypeId::VOID, None),
        };
        match coerce(self.ctx.types, self.ctx.decls, ty, self.ret_ty) {
            Ok(_) => {}
            Err(hole) => {
                let expected = self.ctx.types.display(hole.expected);
                let actual = self.ctx.types.display(hole.actual);
                let pos = node.map_or(stmt.pos, |e| e.pos);
                self.error_at(
                    pos,
                    diagnostic_codes::TYPE_MISMATCH,
                    diagnostic_messages::TYPE_MISMATCH,
                    &[&expected, &actual],
                );
                if let Some(e) = node {
                    self.tast.set_hole(e.id, hole);
                }
            }
        }
        self.env.move_to(self.ctx.types, ContKey::Exit);
        Ok(())
    }

    // =========================================================================
    // Branches
    // =========================================================================

    fn check_if(&mut self, cond: &Expr, then: &Block, else_: &Block) -> Result<(), InternalError> {
        self.infer(cond)?;
        let parent = self.env.conts.clone();

        self.refine_condition(cond, true)?;
        self.check_block(then)?;
        let then_conts = std::mem::replace(&mut self.env.conts, parent);

        self.refine_condition(cond, false)?;
        self.check_block(else_)?;
        let else_conts = std::mem::take(&mut self.env.conts);

        let merged = self.env.merge_cont_maps(self.ctx.types, then_conts, else_conts);
        self.env.conts = merged;
        Ok(())
    }

    // =========================================================================
    // Loops
    // =========================================================================

    /// Shared driver for `while`/`do-while`/`for`: re-check the body against
    /// a widening environment until the post-body state is subsumed by the
    /// pre-body state or the iteration bound is hit. The bound comes from
    /// the syntactic loop nesting depth; it is an approximation, not a
    /// convergence proof, so the last iteration's state is accepted either
    /// way.
    fn check_loop(
        &mut self,
        cond: Option<&Expr>,
        body: &Block,
        incr: &[Expr],
        cond_first: bool,
    ) -> Result<(), InternalError> {
        self.loop_depth += 1;
        let bound = self
            .ctx
            .options
            .loop_bound
            .unwrap_or(self.loop_depth)
            .clamp(1, MAX_LOOP_FIXPOINT_ITERS);

        let saved_break = self.env.conts.remove(ContKey::Break);
        let saved_continue = self.env.conts.remove(ContKey::Continue);

        let mut iteration = 0;
        let mut last_pre;
        loop {
            iteration += 1;
            last_pre = self.env.conts.clone();

            if cond_first && let Some(c) = cond {
                self.infer(c)?;
                self.refine_condition(c, true)?;
            }
            self.check_block(body)?;
            self.env.merge_cont_into_next(self.ctx.types, ContKey::Continue);
            for e in incr {
                if self.env.has_next() {
                    self.infer(e)?;
                }
            }
            if !cond_first
                && let Some(c) = cond
                && self.env.has_next()
            {
                self.infer(c)?;
            }

            if iteration >= bound {
                trace!(iteration, bound, "loop fixpoint bound reached");
                break;
            }
            let post = self.env.conts.clone();
            if self.next_subsumed(&post, &last_pre) {
                trace!(iteration, "loop fixpoint converged");
                break;
            }
            let widened = self.env.merge_cont_maps(self.ctx.types, last_pre, post);
            self.env.conts = widened;
        }

        if cond_first {
            // The loop may run zero times: the entry state joins the exit.
            let post = self.env.conts.clone();
            let merged = self.env.merge_cont_maps(self.ctx.types, last_pre, post);
            self.env.conts = merged;
        }
        if let Some(c) = cond {
            self.refine_condition(c, false)?;
        }
        self.env.merge_cont_into_next(self.ctx.types, ContKey::Break);

        self.env.conts.set_opt(ContKey::Break, saved_break);
        self.env.conts.set_opt(ContKey::Continue, saved_continue);
        self.loop_depth -= 1;
        Ok(())
    }

    /// Every local of `post`'s `Next` already fits inside `pre`'s: the loop
    /// body stopped learning anything new.
    fn next_subsumed(&self, post: &ContMap, pre: &ContMap) -> bool {
        let Some(post_next) = post.get(ContKey::Next) else {
            return true;
        };
        let Some(pre_next) = pre.get(ContKey::Next) else {
            return false;
        };
        let subtyper = Subtyper::new(self.ctx.types, self.ctx.decls);
        post_next.locals.iter().all(|(id, local)| {
            pre_next
                .locals
                .get(id)
                .is_some_and(|p| subtyper.is_subtype(local.ty, p.ty))
        })
    }

    // =========================================================================
    // Switch
    // =========================================================================

    fn check_switch(
        &mut self,
        subject: &Expr,
        cases: &[vesta_ast::Case],
        default: Option<&Block>,
    ) -> Result<(), InternalError> {
        self.infer(subject)?;

        let saved_break = self.env.conts.remove(ContKey::Break);
        let saved_fall = self.env.conts.remove(ContKey::Fallthrough);
        let parent_next = self.env.conts.get(ContKey::Next).cloned();

        let mut exit_nexts: Vec<PerContEntry> = Vec::new();

        for case in cases {
            // A case is entered either directly (the subject matched, from
            // the parent state) or by falling through the previous case.
            let fall = self.env.conts.remove(ContKey::Fallthrough);
            let entry = self.join_opt(parent_next.clone(), fall);
            self.env.conts.set_opt(ContKey::Next, entry);
            if self.env.has_next() {
                self.infer(&case.rhs)?;
                self.check_block(&case.body)?;
            }
            // A case body that neither breaks nor exits falls through.
            self.env.move_to(self.ctx.types, ContKey::Fallthrough);
        }

        let fall = self.env.conts.remove(ContKey::Fallthrough);
        match default {
            Some(block) => {
                let entry = self.join_opt(parent_next, fall);
                self.env.conts.set_opt(ContKey::Next, entry);
                if self.env.has_next() {
                    self.check_block(block)?;
                }
                if let Some(next) = self.env.conts.remove(ContKey::Next) {
                    exit_nexts.push(next);
                }
            }
            None => {
                // Without a default the subject may match nothing at all.
                if let Some(p) = parent_next {
                    exit_nexts.push(p);
                }
                if let Some(f) = fall {
                    exit_nexts.push(f);
                }
            }
        }

        let mut next = None;
        for entry in exit_nexts {
            next = self.join_opt(next, Some(entry));
        }
        self.env.conts.set_opt(ContKey::Next, next);
        self.env.merge_cont_into_next(self.ctx.types, ContKey::Break);

        self.env.conts.set_opt(ContKey::Break, saved_break);
        self.env.conts.set_opt(ContKey::Fallthrough, saved_fall);
        Ok(())
    }

    fn join_opt(
        &mut self,
        a: Option<PerContEntry>,
        b: Option<PerContEntry>,
    ) -> Option<PerContEntry> {
        match (a, b) {
            (Some(a), Some(b)) => Some(self.env.join_entries(self.ctx.types, &a, &b)),
            (a, b) => a.or(b),
        }
    }

    fn join_into_map(&mut self, map: &mut ContMap, key: ContKey, entry: PerContEntry) {
        match map.remove(key) {
            Some(current) => {
                let joined = self.env.join_entries(self.ctx.types, &current, &entry);
                map.set(key, joined);
            }
            None => map.set(key, entry),
        }
    }

    // =========================================================================
    // Try / catch / finally
    // =========================================================================

    const TRY_CONTS: [ContKey; 4] = [
        ContKey::Break,
        ContKey::Continue,
        ContKey::Exit,
        ContKey::Catch,
    ];

    fn check_try(
        &mut self,
        stmt: &Stmt,
        body: &Block,
        catches: &[Catch],
        finally: &Block,
    ) -> Result<(), InternalError> {
        let types = self.ctx.types;

        // The try body runs with these continuations cleared, so whatever
        // it accumulates is exactly the set of exits of the protected
        // region.
        let saved: Vec<(ContKey, Option<PerContEntry>)> = Self::TRY_CONTS
            .iter()
            .map(|&key| (key, self.env.conts.remove(key)))
            .collect();

        let saved_in_try = self.in_try;
        self.in_try = true;
        let body_result = self.check_block(body);
        self.in_try = saved_in_try;
        body_result?;

        let catch_state = self.env.conts.remove(ContKey::Catch);
        let mut exit_nexts: Vec<PerContEntry> =
            self.env.conts.remove(ContKey::Next).into_iter().collect();

        for catch in catches {
            // Each clause starts from the accumulated throw-point state,
            // with the exception local rebound at its declared class.
            let Some(entry) = catch_state.clone() else {
                // Nothing in the try body can throw; the clause is dead.
                continue;
            };
            self.env.conts.set(ContKey::Next, entry);
            let exc_ty = self.catch_class_ty(catch, stmt.pos);
            self.env.set_local(catch.lvar, exc_ty, stmt.pos);
            self.check_block(&catch.body)?;
            if let Some(next) = self.env.conts.remove(ContKey::Next) {
                exit_nexts.push(next);
            }
        }

        let mut joined_next: Option<PerContEntry> = None;
        for entry in exit_nexts {
            joined_next = self.join_opt(joined_next, Some(entry));
        }

        // Everything that can reach the finally block (or, without one,
        // whatever follows the region), labeled by its continuation.
        let mut region: Vec<(ContKey, PerContEntry)> = Vec::new();
        if let Some(next) = joined_next {
            region.push((ContKey::Next, next));
        }
        for &key in &Self::TRY_CONTS {
            if let Some(entry) = self.env.conts.remove(key) {
                region.push((key, entry));
            }
        }

        let mut after = ContMap::default();
        if finally.is_empty() {
            for (key, entry) in region {
                self.join_into_map(&mut after, key, entry);
            }
        } else {
            // The finally body is first checked once against the union of
            // every reachable continuation, diagnostics suppressed: this
            // types the block without multiplying its errors. It is then
            // re-checked per distinct continuation, diagnostics kept, to
            // propagate precise per-path states.
            if !region.is_empty() {
                let mut union_entry: Option<PerContEntry> = None;
                for (_, entry) in &region {
                    union_entry = self.join_opt(union_entry, Some(entry.clone()));
                }
                let scratch = std::mem::take(&mut self.env.conts);
                self.env.conts.set_opt(ContKey::Next, union_entry);
                let sink = self.ctx.sink;
                let union_result = sink.muted(|| self.check_block(finally));
                self.env.conts = scratch;
                union_result?;
            }
            for (key, entry) in region {
                self.env.conts = ContMap::default();
                self.env.conts.set(ContKey::Next, entry);
                self.check_block(finally)?;
                let mut pass = std::mem::take(&mut self.env.conts);
                // The pass's resulting Next is this continuation resuming;
                // anything else the finally did (its own returns or
                // throws) joins globally.
                if let Some(next) = pass.remove(ContKey::Next) {
                    self.join_into_map(&mut after, key, next);
                }
                for other in ContKey::ALL {
                    if let Some(entry) = pass.remove(other) {
                        self.join_into_map(&mut after, other, entry);
                    }
                }
            }
        }

        self.env.conts = after;
        // The stashed outer continuations come back, joined with whatever
        // the region contributed to the same exits.
        for (key, outer) in saved {
            if let Some(outer_entry) = outer {
                match self.env.conts.remove(key) {
                    Some(current) => {
                        let joined = self.env.join_entries(types, &current, &outer_entry);
                        self.env.conts.set(key, joined);
                    }
                    None => self.env.conts.set(key, outer_entry),
                }
            }
        }
        Ok(())
    }

    fn catch_class_ty(&mut self, catch: &Catch, pos: Pos) -> TypeId {
        match self.ctx.decls.get_class(catch.class) {
            Some(def) => {
                let args = vec![TypeId::DYNAMIC; def.tparams.len()];
                self.ctx.types.class(catch.class, Exactness::Nonexact, args)
            }
            None => {
                self.error_at(
                    pos,
                    diagnostic_codes::UNBOUND_CLASS_NAME,
                    diagnostic_messages::UNBOUND_CLASS_NAME,
                    &[catch.class.as_str()],
                );
                TypeId::DYNAMIC
            }
        }
    }

    // =========================================================================
    // Condition refinement
    // =========================================================================

    /// Apply what a condition being true (or false) teaches about locals
    /// and property chains. The condition has already been inferred, so the
    /// typed tree knows the scrutinee's current type.
    pub(crate) fn refine_condition(
        &mut self,
        cond: &Expr,
        assume: bool,
    ) -> Result<(), InternalError> {
        match &cond.kind {
            ExprKind::Unop {
                op: Unop::Not,
                expr,
            } => self.refine_condition(expr, !assume),
            ExprKind::Is { expr, hint } => {
                let Some(current) = self.tast.type_of(expr.id) else {
                    return Ok(());
                };
                let narrowed = match hint {
                    IsHint::Null => {
                        if assume {
                            self.narrow_to_null(current)
                        } else {
                            self.strip_null(current)
                        }
                    }
                    IsHint::Nonnull => {
                        if assume {
                            self.strip_null(current)
                        } else {
                            self.narrow_to_null(current)
                        }
                    }
                    IsHint::Hint(hint) => {
                        if !assume {
                            // No complement type to narrow to.
                            return Ok(());
                        }
                        let target = self.localize_hint(hint, cond.pos);
                        self.narrow_to(current, target)
                    }
                };
                self.apply_refinement(expr, narrowed);
                Ok(())
            }
            ExprKind::Lvar(id) => {
                // Truthiness: in the true branch the local is not null.
                if assume && let LocalLookup::Bound(local) = self.env.get_local(*id) {
                    let stripped = self.strip_null(local.ty);
                    self.env.refine_local(*id, stripped);
                }
                Ok(())
            }
            // `if ($x = f())`: the assignment's truthiness refines $x.
            ExprKind::Assign { lhs, .. } => {
                if assume
                    && let ExprKind::Lvar(id) = &lhs.kind
                    && let LocalLookup::Bound(local) = self.env.get_local(*id)
                {
                    let stripped = self.strip_null(local.ty);
                    self.env.refine_local(*id, stripped);
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn apply_refinement(&mut self, expr: &Expr, narrowed: TypeId) {
        match &expr.kind {
            ExprKind::Lvar(id) => self.env.refine_local(*id, narrowed),
            ExprKind::ObjGet { .. } => {
                if let Some(key) = self.fake_member_key(expr) {
                    self.env.set_fake(key, narrowed);
                }
            }
            _ => {}
        }
    }

    fn narrow_to_null(&mut self, current: TypeId) -> TypeId {
        let current = self.tyvars.expand(self.ctx.types, current);
        match self.ctx.types.key(current) {
            TypeKey::Nullable(_)
            | TypeKey::Prim(PrimKind::Null)
            | TypeKey::Prim(PrimKind::Mixed)
            | TypeKey::Prim(PrimKind::Dynamic) => TypeId::NULL,
            _ => TypeId::NOTHING,
        }
    }

    /// Narrow `current` toward `target`, preferring whichever side is
    /// already more precise.
    fn narrow_to(&mut self, current: TypeId, target: TypeId) -> TypeId {
        let current = self.tyvars.expand(self.ctx.types, current);
        let subtyper = Subtyper::new(self.ctx.types, self.ctx.decls);
        if subtyper.is_subtype(target, current) {
            target
        } else if subtyper.is_subtype(current, target) {
            current
        } else {
            self.ctx.types.intersection(vec![current, target])
        }
    }
}
