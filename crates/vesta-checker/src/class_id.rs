//! Static class-id resolution: `self`, `parent`, `static`, nominal names,
//! and class-reference expressions.

use crate::context::{Checker, InternalError};
use tracing::trace;
use vesta_ast::{ClassId, ClassIdKind};
use vesta_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use vesta_common::Atom;
use vesta_solver::{Exactness, Subtyper, TypeId, TypeKey};

impl Checker<'_> {
    /// Resolve a class-id form to a concrete class type. Failures are
    /// recoverable: they are diagnosed and become the error type.
    pub fn resolve_class_id(&mut self, cid: &ClassId) -> Result<TypeId, InternalError> {
        match &cid.kind {
            ClassIdKind::SelfCls => Ok(self.self_class_ty(Exactness::Exact).unwrap_or_else(|| {
                self.error_at(
                    cid.pos,
                    diagnostic_codes::NOT_A_CLASS,
                    diagnostic_messages::NOT_A_CLASS,
                    &["self outside of a class"],
                );
                TypeId::ERR
            })),
            ClassIdKind::Parent => Ok(self.resolve_parent(cid)),
            ClassIdKind::Static => Ok(self.resolve_static_cid()),
            ClassIdKind::Named(name, hints) => Ok(self.resolve_named_cid(cid, *name, hints)),
            ClassIdKind::Expr(e) => self.resolve_expr_cid(cid, e),
        }
    }

    fn resolve_parent(&mut self, cid: &ClassId) -> TypeId {
        let Some(self_name) = self.ctx.self_class else {
            self.error_at(
                cid.pos,
                diagnostic_codes::NOT_A_CLASS,
                diagnostic_messages::NOT_A_CLASS,
                &["parent outside of a class"],
            );
            return TypeId::ERR;
        };
        let Some(def) = self.ctx.decls.get_class(self_name) else {
            self.error_at(
                cid.pos,
                diagnostic_codes::UNBOUND_CLASS_NAME,
                diagnostic_messages::UNBOUND_CLASS_NAME,
                &[self_name.as_str()],
            );
            return TypeId::ERR;
        };

        if def.kind == vesta_solver::ClassKind::Trait {
            // In a trait, `parent` is the unique most-derived
            // `require extends` ancestor: the candidate that is a subtype of
            // every other candidate. Anything else is an error, never an
            // arbitrary pick.
            let subtyper = Subtyper::new(self.ctx.types, self.ctx.decls);
            let winner = def.req_extends.iter().copied().find(|&candidate| {
                def.req_extends
                    .iter()
                    .all(|&other| subtyper.is_subtype(candidate, other))
            });
            return match winner {
                Some(ty) => ty,
                None => {
                    self.error_at(
                        cid.pos,
                        diagnostic_codes::TRAIT_PARENT_AMBIGUOUS,
                        diagnostic_messages::TRAIT_PARENT_AMBIGUOUS,
                        &[self_name.as_str()],
                    );
                    TypeId::ERR
                }
            };
        }

        match def.extends {
            Some(parent_ty) => parent_ty,
            None => {
                self.error_at(
                    cid.pos,
                    diagnostic_codes::PARENT_UNDEFINED,
                    diagnostic_messages::PARENT_UNDEFINED,
                    &[self_name.as_str()],
                );
                TypeId::ERR
            }
        }
    }

    /// Late static binding: `this`-typed while the current continuation is
    /// live, bottom once control cannot reach here.
    fn resolve_static_cid(&mut self) -> TypeId {
        if !self.env.has_next() {
            return TypeId::NOTHING;
        }
        match self.self_class_ty(Exactness::Nonexact) {
            Some(cls) => self.ctx.types.this_under(cls),
            None => TypeId::ERR,
        }
    }

    fn resolve_named_cid(&mut self, cid: &ClassId, name: Atom, hints: &[vesta_ast::Hint]) -> TypeId {
        let args: Vec<TypeId> = hints
            .iter()
            .map(|h| self.localize_hint(h, cid.pos))
            .collect();
        // An in-scope generic parameter names an abstract class-like thing;
        // it keeps its own explicit arguments rather than becoming concrete.
        if self.ctx.tparams.contains_key(&name) {
            return self.ctx.types.generic(name, args);
        }
        match self.ctx.decls.get_class(name) {
            Some(def) => {
                let mut args = args;
                while args.len() < def.tparams.len() {
                    args.push(TypeId::DYNAMIC);
                }
                self.ctx.types.class(name, Exactness::Nonexact, args)
            }
            None => {
                self.error_at(
                    cid.pos,
                    diagnostic_codes::UNBOUND_CLASS_NAME,
                    diagnostic_messages::UNBOUND_CLASS_NAME,
                    &[name.as_str()],
                );
                TypeId::ERR
            }
        }
    }

    fn resolve_expr_cid(
        &mut self,
        cid: &ClassId,
        e: &vesta_ast::Expr,
    ) -> Result<TypeId, InternalError> {
        let ty = self.infer(e)?;
        let ty = self.tyvars.expand(self.ctx.types, ty);
        let resolved = self.classish_of(ty);
        match resolved {
            Some(class_ty) => Ok(class_ty),
            None => {
                let shown = self.ctx.types.display(ty);
                self.error_at(
                    cid.pos,
                    diagnostic_codes::NOT_A_CLASS,
                    diagnostic_messages::NOT_A_CLASS,
                    &[&shown],
                );
                Ok(TypeId::ERR)
            }
        }
    }

    /// Reduce an expression type to something usable as a class reference:
    /// class, union, intersection or dynamic types pass through; opaque
    /// class-literal wrappers unwrap.
    fn classish_of(&self, ty: TypeId) -> Option<TypeId> {
        match self.ctx.types.key(ty) {
            TypeKey::Class { .. }
            | TypeKey::Union(_)
            | TypeKey::Intersection(_)
            | TypeKey::Dependent(..)
            | TypeKey::Generic(..) => Some(ty),
            TypeKey::Prim(vesta_solver::PrimKind::Dynamic)
            | TypeKey::Prim(vesta_solver::PrimKind::Err) => Some(ty),
            // classname<C>-style wrapper: use the wrapped class.
            TypeKey::Newtype(_, under) => {
                trace!(?under, "unwrapping class-literal newtype");
                self.classish_of(under)
            }
            _ => None,
        }
    }
}
