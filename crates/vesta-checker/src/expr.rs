//! Expression type checking.
//!
//! Only the forms the flow-sensitive core needs are inferred here: literals,
//! locals, assignment, member access, calls, `new`, refinement tests, and
//! the null-coalescing operator. Everything records its type in the typed
//! tree; coercion failures additionally record a hole at the node.

use crate::context::{Checker, InternalError};
use crate::env::{ContKey, LocalLookup};
use crate::member::MemberAccess;
use vesta_ast::{Binop, ClassIdKind, Expr, ExprKind, Unop};
use vesta_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use vesta_common::Atom;
use vesta_solver::{coerce, Exactness, PrimKind, TypeId, TypeKey};

impl Checker<'_> {
    /// Infer an expression's type and record it in the typed tree.
    pub fn infer(&mut self, e: &Expr) -> Result<TypeId, InternalError> {
        let ty = self.infer_kind(e)?;
        self.tast.set_type(e.id, ty);
        Ok(ty)
    }

    fn infer_kind(&mut self, e: &Expr) -> Result<TypeId, InternalError> {
        match &e.kind {
            ExprKind::Int(_) => Ok(TypeId::INT),
            ExprKind::Float(_) => Ok(TypeId::FLOAT),
            ExprKind::Str(_) => Ok(TypeId::STRING),
            ExprKind::True | ExprKind::False => Ok(TypeId::BOOL),
            ExprKind::Null => Ok(TypeId::NULL),
            ExprKind::Lvar(id) => Ok(self.infer_lvar(e, *id)),
            ExprKind::This => Ok(self.infer_this(e)),
            ExprKind::Assign { lhs, rhs } => self.infer_assign(e, lhs, rhs),
            ExprKind::Binop { op, lhs, rhs } => {
                let lhs_ty = self.infer(lhs)?;
                let rhs_ty = self.infer(rhs)?;
                Ok(match op {
                    Binop::Plus | Binop::Minus => {
                        if lhs_ty == TypeId::DYNAMIC || rhs_ty == TypeId::DYNAMIC {
                            TypeId::DYNAMIC
                        } else if lhs_ty == TypeId::FLOAT || rhs_ty == TypeId::FLOAT {
                            TypeId::FLOAT
                        } else {
                            TypeId::INT
                        }
                    }
                    Binop::Lt | Binop::Eq | Binop::Neq => TypeId::BOOL,
                })
            }
            ExprKind::Unop { op, expr } => {
                let operand = self.infer(expr)?;
                Ok(match op {
                    Unop::Not => TypeId::BOOL,
                    Unop::Neg => operand,
                })
            }
            ExprKind::NullCoalesce { lhs, rhs } => {
                let lhs_ty = self.infer(lhs)?;
                let rhs_ty = self.infer(rhs)?;
                let stripped = self.strip_null(lhs_ty);
                Ok(self.ctx.types.union(vec![stripped, rhs_ty]))
            }
            ExprKind::ObjGet {
                recv,
                member,
                nullsafe,
            } => self.infer_obj_get(e, recv, *member, *nullsafe),
            ExprKind::ClassGet { cid, member } => {
                let class_ty = self.resolve_class_id(cid)?;
                let acc = MemberAccess::read(e.pos).static_member();
                let acc = if matches!(cid.kind, ClassIdKind::Named(..)) {
                    acc.via_class_name()
                } else {
                    acc
                };
                let result = self.resolve_member(class_ty, *member, &acc);
                if let Some(hole) = result.hole {
                    self.tast.set_hole(e.id, hole);
                }
                Ok(result.ty)
            }
            ExprKind::Call { func, targs, args } => self.infer_call(e, func, targs, args),
            ExprKind::New { cid, args } => self.infer_new(e, cid, args),
            ExprKind::Is { expr, .. } => {
                self.infer(expr)?;
                Ok(TypeId::BOOL)
            }
            ExprKind::Lambda {
                params,
                captures,
                body,
            } => self.infer_lambda(params, captures, body),
        }
    }

    fn infer_lvar(&mut self, e: &Expr, id: vesta_ast::LocalId) -> TypeId {
        match self.env.get_local(id) {
            LocalLookup::Bound(local) => local.ty,
            LocalLookup::PossiblyUnset(_) => {
                self.error_at(
                    e.pos,
                    diagnostic_codes::POSSIBLY_UNSET_LOCAL,
                    diagnostic_messages::POSSIBLY_UNSET_LOCAL,
                    &[id.name().as_str()],
                );
                TypeId::DYNAMIC
            }
            LocalLookup::Unbound => {
                self.error_at(
                    e.pos,
                    diagnostic_codes::UNDEFINED_LOCAL,
                    diagnostic_messages::UNDEFINED_LOCAL,
                    &[id.name().as_str()],
                );
                TypeId::DYNAMIC
            }
        }
    }

    fn infer_this(&mut self, e: &Expr) -> TypeId {
        if self.ctx.static_context {
            self.error_at(
                e.pos,
                diagnostic_codes::UNDEFINED_LOCAL,
                diagnostic_messages::UNDEFINED_LOCAL,
                &["this"],
            );
            return TypeId::ERR;
        }
        match self.self_class_ty(Exactness::Nonexact) {
            Some(cls) => self.ctx.types.this_under(cls),
            None => {
                self.error_at(
                    e.pos,
                    diagnostic_codes::UNDEFINED_LOCAL,
                    diagnostic_messages::UNDEFINED_LOCAL,
                    &["this"],
                );
                TypeId::ERR
            }
        }
    }

    fn infer_assign(&mut self, e: &Expr, lhs: &Expr, rhs: &Expr) -> Result<TypeId, InternalError> {
        let rhs_ty = self.infer(rhs)?;
        match &lhs.kind {
            ExprKind::Lvar(id) => {
                self.env.set_local(*id, rhs_ty, lhs.pos);
                self.tast.set_type(lhs.id, rhs_ty);
            }
            ExprKind::ObjGet {
                recv,
                member,
                nullsafe,
            } => {
                let recv_ty = self.infer(recv)?;
                let mut acc = MemberAccess::read(lhs.pos).write();
                if *nullsafe {
                    acc = acc.nullsafe();
                }
                let result = self.resolve_member(recv_ty, *member, &acc);
                self.tast.set_type(lhs.id, result.ty);
                if let Some(hole) = result.hole {
                    self.tast.set_hole(lhs.id, hole);
                }
                match coerce(self.ctx.types, self.ctx.decls, rhs_ty, result.ty) {
                    Ok(_) => {}
                    Err(hole) => {
                        let expected = self.ctx.types.display(hole.expected);
                        let actual = self.ctx.types.display(hole.actual);
                        self.error_at(
                            e.pos,
                            diagnostic_codes::TYPE_MISMATCH,
                            diagnostic_messages::TYPE_MISMATCH,
                            &[&expected, &actual],
                        );
                        self.tast.set_hole(e.id, hole);
                    }
                }
                // The write itself is precise knowledge about the chain.
                if let Some(key) = self.fake_member_key(lhs) {
                    self.env.set_fake(key, rhs_ty);
                }
            }
            _ => {
                return Err(InternalError::new(
                    lhs.pos,
                    "malformed assignment target in named AST",
                ));
            }
        }
        Ok(rhs_ty)
    }

    fn infer_obj_get(
        &mut self,
        e: &Expr,
        recv: &Expr,
        member: Atom,
        nullsafe: bool,
    ) -> Result<TypeId, InternalError> {
        let recv_ty = self.infer(recv)?;

        // A valid refinement for this exact chain short-circuits resolution;
        // the narrowed type is the whole point of having recorded it.
        if let Some(key) = self.fake_member_key(e)
            && let Some(refined) = self.env.get_fake(&key)
        {
            return Ok(refined);
        }

        let mut acc = MemberAccess::read(e.pos);
        if nullsafe {
            acc = acc.nullsafe();
        }
        let result = self.resolve_member(recv_ty, member, &acc);
        if let Some(hole) = result.hole {
            self.tast.set_hole(e.id, hole);
        }
        Ok(result.ty)
    }

    fn infer_call(
        &mut self,
        e: &Expr,
        func: &Expr,
        targs: &[vesta_ast::Hint],
        args: &[Expr],
    ) -> Result<TypeId, InternalError> {
        let targ_tys: Vec<TypeId> = targs
            .iter()
            .map(|h| self.localize_hint(h, e.pos))
            .collect();

        let callee_ty = match &func.kind {
            ExprKind::ObjGet {
                recv,
                member,
                nullsafe,
            } => {
                let recv_ty = self.infer(recv)?;
                let mut acc = MemberAccess::method(func.pos).with_targs(targ_tys);
                if *nullsafe {
                    acc = acc.nullsafe();
                }
                let result = self.resolve_member(recv_ty, *member, &acc);
                self.tast.set_type(func.id, result.ty);
                if let Some(hole) = result.hole {
                    self.tast.set_hole(func.id, hole);
                }
                result.ty
            }
            ExprKind::ClassGet { cid, member } => {
                let class_ty = self.resolve_class_id(cid)?;
                let mut acc = MemberAccess::method(func.pos)
                    .static_member()
                    .with_targs(targ_tys);
                if matches!(cid.kind, ClassIdKind::Named(..)) {
                    acc = acc.via_class_name();
                }
                let result = self.resolve_member(class_ty, *member, &acc);
                self.tast.set_type(func.id, result.ty);
                if let Some(hole) = result.hole {
                    self.tast.set_hole(func.id, hole);
                }
                result.ty
            }
            _ => self.infer(func)?,
        };

        let ret = self.check_call(callee_ty, args, e.pos)?;
        // The callee may have mutated anything a refinement talks about.
        self.env.forget_fakes_after_call();
        Ok(ret)
    }

    /// Check a call against a callee type: arity, argument coercion, return
    /// type. Nullable callees (from nullsafe method resolution) propagate
    /// their nullability into the result.
    fn check_call(
        &mut self,
        callee: TypeId,
        args: &[Expr],
        pos: vesta_common::Pos,
    ) -> Result<TypeId, InternalError> {
        let callee = self.tyvars.expand(self.ctx.types, callee);
        match self.ctx.types.key(callee) {
            TypeKey::Fun(id) => {
                let fun = self.ctx.types.fun_type(id);
                if fun.params.len() != args.len() {
                    self.error_at(
                        pos,
                        diagnostic_codes::ARITY_MISMATCH,
                        diagnostic_messages::ARITY_MISMATCH,
                        &[&fun.params.len().to_string(), &args.len().to_string()],
                    );
                }
                for (i, arg) in args.iter().enumerate() {
                    let arg_ty = self.infer(arg)?;
                    let Some(&param_ty) = fun.params.get(i) else {
                        continue;
                    };
                    match coerce(self.ctx.types, self.ctx.decls, arg_ty, param_ty) {
                        Ok(_) => {}
                        Err(hole) => {
                            let expected = self.ctx.types.display(hole.expected);
                            let actual = self.ctx.types.display(hole.actual);
                            self.error_at(
                                arg.pos,
                                diagnostic_codes::TYPE_MISMATCH,
                                diagnostic_messages::TYPE_MISMATCH,
                                &[&expected, &actual],
                            );
                            self.tast.set_hole(arg.id, hole);
                        }
                    }
                }
                Ok(fun.ret)
            }
            TypeKey::Nullable(inner) => {
                let ret = self.check_call(inner, args, pos)?;
                Ok(self.ctx.types.nullable(ret))
            }
            TypeKey::Prim(PrimKind::Dynamic) | TypeKey::Prim(PrimKind::Err) => {
                for arg in args {
                    self.infer(arg)?;
                }
                Ok(callee)
            }
            TypeKey::Var(_) => {
                // Unresolved callee from a deferred has-member constraint:
                // the arguments still get checked, the result is gradual.
                for arg in args {
                    self.infer(arg)?;
                }
                Ok(TypeId::DYNAMIC)
            }
            _ => {
                for arg in args {
                    self.infer(arg)?;
                }
                let shown = self.ctx.types.display(callee);
                self.error_at(
                    pos,
                    diagnostic_codes::NOT_CALLABLE,
                    diagnostic_messages::NOT_CALLABLE,
                    &[&shown],
                );
                Ok(TypeId::ERR)
            }
        }
    }

    fn infer_new(
        &mut self,
        e: &Expr,
        cid: &vesta_ast::ClassId,
        args: &[Expr],
    ) -> Result<TypeId, InternalError> {
        let class_ty = self.resolve_class_id(cid)?;

        if matches!(cid.kind, ClassIdKind::Static)
            && let Some(name) = self.ctx.self_class
            && let Some(def) = self.ctx.decls.get_class(name)
            && !def.consistent_construct
        {
            self.error_at(
                e.pos,
                diagnostic_codes::INCONSISTENT_CONSTRUCT,
                diagnostic_messages::INCONSISTENT_CONSTRUCT,
                &[name.as_str()],
            );
        }

        // Check the constructor call against the declared __construct.
        let ctor = self.constructor_type(class_ty);
        match ctor {
            Some(ctor_ty) => {
                self.check_call(ctor_ty, args, e.pos)?;
            }
            None => {
                // Default constructor takes no arguments.
                for arg in args {
                    self.infer(arg)?;
                }
                if !args.is_empty() {
                    self.error_at(
                        e.pos,
                        diagnostic_codes::ARITY_MISMATCH,
                        diagnostic_messages::ARITY_MISMATCH,
                        &["0", &args.len().to_string()],
                    );
                }
            }
        }
        self.env.forget_fakes_after_call();

        // `new C()` yields the exact class; `new static()` stays
        // `this`-typed.
        Ok(match self.ctx.types.key(class_ty) {
            TypeKey::Class { name, args, .. } => self.ctx.types.intern(TypeKey::Class {
                name,
                exact: Exactness::Exact,
                args,
            }),
            _ => class_ty,
        })
    }

    fn constructor_type(&mut self, class_ty: TypeId) -> Option<TypeId> {
        let expanded = self.tyvars.expand(self.ctx.types, class_ty);
        let (name, targs) = match self.ctx.types.key(expanded) {
            TypeKey::Class { name, args, .. } => (name, self.ctx.types.list(args)),
            TypeKey::Dependent(_, under) => match self.ctx.types.key(under) {
                TypeKey::Class { name, args, .. } => (name, self.ctx.types.list(args)),
                _ => return None,
            },
            _ => return None,
        };
        let def = self.ctx.decls.get_class(name)?;
        let ctor = def.construct.clone()?;
        let mut subst = vesta_solver::Subst::with_this(expanded);
        for (i, tp) in def.tparams.iter().enumerate() {
            let arg = targs.get(i).copied().unwrap_or(TypeId::DYNAMIC);
            subst.bind(tp.name, arg);
        }
        Some(vesta_solver::instantiate(self.ctx.types, ctor.ty, &subst))
    }

    fn infer_lambda(
        &mut self,
        params: &[vesta_ast::FunParam],
        captures: &[vesta_ast::LocalId],
        body: &vesta_ast::Block,
    ) -> Result<TypeId, InternalError> {
        let param_bindings: Vec<(vesta_ast::LocalId, TypeId, vesta_common::Pos)> = params
            .iter()
            .map(|p| {
                let ty = self.localize_hint(&p.hint, p.pos);
                (p.name, ty, p.pos)
            })
            .collect();
        let fun_ty = self.ctx.types.fun(
            param_bindings.iter().map(|(_, ty, _)| *ty).collect(),
            TypeId::DYNAMIC,
        );

        // The body checks in isolation: captured locals are visible by
        // value, mutations and continuations never leak out, and
        // refinements survive only for explicitly captured roots.
        let saved_conts = self.env.conts.clone();
        let saved_ret = self.ret_ty;
        let saved_in_try = self.in_try;
        for key in [
            ContKey::Break,
            ContKey::Continue,
            ContKey::Catch,
            ContKey::Finally,
            ContKey::Exit,
            ContKey::Fallthrough,
        ] {
            self.env.conts.remove(key);
        }
        if let Some(entry) = self.env.conts.get_mut(ContKey::Next) {
            entry.fakes.retain_roots(captures);
        }
        for (id, ty, pos) in param_bindings {
            self.env.set_local(id, ty, pos);
        }
        self.ret_ty = TypeId::DYNAMIC;
        self.in_try = false;

        let result = self.check_block(body);

        self.env.conts = saved_conts;
        self.ret_ty = saved_ret;
        self.in_try = saved_in_try;
        result?;
        Ok(fun_ty)
    }

    /// Remove nullability from a type (`??`, truthiness, `is nonnull`).
    pub(crate) fn strip_null(&mut self, ty: TypeId) -> TypeId {
        let ty = self.tyvars.expand(self.ctx.types, ty);
        match self.ctx.types.key(ty) {
            TypeKey::Nullable(inner) => inner,
            TypeKey::Prim(PrimKind::Null) => TypeId::NOTHING,
            TypeKey::Prim(PrimKind::Mixed) => TypeId::NONNULL,
            _ => ty,
        }
    }
}
