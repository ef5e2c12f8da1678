//! Subtype query.
//!
//! Structural recursion over interned type keys, consulting the declaration
//! store for nominal ancestry and type-parameter variance. Gradual types
//! (`dynamic`, the error type) relate in both directions so one failure never
//! cascades.

use crate::decl::{DeclProvider, Variance};
use crate::instantiate::{Subst, instantiate};
use crate::intern::TypeInterner;
use crate::types::*;
use tracing::trace;

const MAX_SUBTYPE_DEPTH: u32 = 64;

pub struct Subtyper<'a> {
    types: &'a TypeInterner,
    decls: &'a dyn DeclProvider,
}

impl<'a> Subtyper<'a> {
    pub fn new(types: &'a TypeInterner, decls: &'a dyn DeclProvider) -> Self {
        Subtyper { types, decls }
    }

    /// Is `sub` a subtype of `sup`?
    pub fn is_subtype(&self, sub: TypeId, sup: TypeId) -> bool {
        self.subtype_at(sub, sup, 0)
    }

    fn subtype_at(&self, sub: TypeId, sup: TypeId, depth: u32) -> bool {
        if sub == sup {
            return true;
        }
        if depth > MAX_SUBTYPE_DEPTH {
            trace!(?sub, ?sup, "subtype recursion bound hit");
            return false;
        }
        let depth = depth + 1;

        // Gradual types relate in both directions.
        if sub == TypeId::ERR || sup == TypeId::ERR {
            return true;
        }
        if sub == TypeId::DYNAMIC || sup == TypeId::DYNAMIC {
            return true;
        }
        if sub == TypeId::NOTHING || sup == TypeId::MIXED {
            return true;
        }

        let sub_key = self.types.key(sub);
        let sup_key = self.types.key(sup);

        // Left-hand unions and nullables decompose first.
        if let TypeKey::Union(list) = sub_key {
            return self
                .types
                .list(list)
                .iter()
                .all(|&m| self.subtype_at(m, sup, depth));
        }
        if let TypeKey::Nullable(inner) = sub_key {
            return self.subtype_at(TypeId::NULL, sup, depth)
                && self.subtype_at(inner, sup, depth);
        }

        // Right-hand intersections require all members.
        if let TypeKey::Intersection(list) = sup_key {
            return self
                .types
                .list(list)
                .iter()
                .all(|&m| self.subtype_at(sub, m, depth));
        }
        // Left-hand intersections succeed through any member.
        if let TypeKey::Intersection(list) = sub_key {
            return self
                .types
                .list(list)
                .iter()
                .any(|&m| self.subtype_at(m, sup, depth));
        }

        // Right-hand unions succeed through any member.
        if let TypeKey::Union(list) = sup_key {
            return self
                .types
                .list(list)
                .iter()
                .any(|&m| self.subtype_at(sub, m, depth));
        }
        if let TypeKey::Nullable(inner) = sup_key {
            return sub == TypeId::NULL || self.subtype_at(sub, inner, depth);
        }

        match (&sub_key, &sup_key) {
            (TypeKey::Newtype(n1, _), TypeKey::Newtype(n2, _)) if n1 == n2 => true,
            // A newtype may be used at its underlying (upper bound) type.
            (TypeKey::Newtype(_, under), _) => self.subtype_at(*under, sup, depth),
            (
                TypeKey::Dependent(DependentKind::This, u1),
                TypeKey::Dependent(DependentKind::This, u2),
            ) => self.subtype_at(*u1, *u2, depth),
            // `this` is a subtype of the class it refines.
            (TypeKey::Dependent(DependentKind::This, under), _) => {
                self.subtype_at(*under, sup, depth)
            }
            (TypeKey::Generic(n1, a1), TypeKey::Generic(n2, a2)) => n1 == n2 && a1 == a2,
            (TypeKey::Class { .. }, TypeKey::Prim(PrimKind::Nonnull)) => true,
            (TypeKey::Fun(_), TypeKey::Prim(PrimKind::Nonnull)) => true,
            (TypeKey::Prim(kind), TypeKey::Prim(PrimKind::Nonnull)) => {
                !matches!(kind, PrimKind::Null | PrimKind::Mixed | PrimKind::Dynamic)
            }
            (
                TypeKey::Class {
                    name: sub_name,
                    exact: sub_exact,
                    args: sub_args,
                },
                TypeKey::Class {
                    name: sup_name,
                    exact: sup_exact,
                    args: sup_args,
                },
            ) => {
                if sub_name == sup_name {
                    if *sup_exact == Exactness::Exact && *sub_exact != Exactness::Exact {
                        return false;
                    }
                    return self.args_subtype(*sub_name, *sub_args, *sup_args, depth);
                }
                if *sup_exact == Exactness::Exact {
                    return false;
                }
                self.ancestor_subtype(*sub_name, *sub_args, sup, depth)
            }
            (TypeKey::Fun(f1), TypeKey::Fun(f2)) => {
                let f1 = self.types.fun_type(*f1);
                let f2 = self.types.fun_type(*f2);
                f1.params.len() == f2.params.len()
                    && f1
                        .params
                        .iter()
                        .zip(f2.params.iter())
                        .all(|(&p1, &p2)| self.subtype_at(p2, p1, depth))
                    && self.subtype_at(f1.ret, f2.ret, depth)
            }
            _ => false,
        }
    }

    /// Same-class type arguments, compared per declared variance
    /// (invariant when the declaration is unavailable).
    fn args_subtype(
        &self,
        name: vesta_common::Atom,
        sub_args: TypeListId,
        sup_args: TypeListId,
        depth: u32,
    ) -> bool {
        if sub_args == sup_args {
            return true;
        }
        let sub_args = self.types.list(sub_args);
        let sup_args = self.types.list(sup_args);
        if sub_args.len() != sup_args.len() {
            return false;
        }
        let decl = self.decls.get_class(name);
        sub_args
            .iter()
            .zip(sup_args.iter())
            .enumerate()
            .all(|(i, (&a, &b))| {
                let variance = decl
                    .as_ref()
                    .and_then(|d| d.tparams.get(i))
                    .map_or(Variance::Invariant, |tp| tp.variance);
                match variance {
                    Variance::Invariant => {
                        self.subtype_at(a, b, depth) && self.subtype_at(b, a, depth)
                    }
                    Variance::Covariant => self.subtype_at(a, b, depth),
                    Variance::Contravariant => self.subtype_at(b, a, depth),
                }
            })
    }

    /// Walk `sub`'s folded ancestors looking for `sup`'s class.
    fn ancestor_subtype(
        &self,
        sub_name: vesta_common::Atom,
        sub_args: TypeListId,
        sup: TypeId,
        depth: u32,
    ) -> bool {
        let TypeKey::Class { name: sup_name, .. } = self.types.key(sup) else {
            return false;
        };
        let Some(decl) = self.decls.get_class(sub_name) else {
            return false;
        };
        let Some(&ancestor_ty) = decl.ancestors.get(&sup_name) else {
            return false;
        };
        // Ancestors are declared in terms of the subclass's type parameters.
        let mut subst = Subst::new();
        let args = self.types.list(sub_args);
        for (tp, &arg) in decl.tparams.iter().zip(args.iter()) {
            subst.bind(tp.name, arg);
        }
        let ancestor_ty = instantiate(self.types, ancestor_ty, &subst);
        self.subtype_at(ancestor_ty, sup, depth)
    }
}
