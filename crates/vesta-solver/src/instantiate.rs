//! Generic instantiation: substituting type arguments for class type
//! parameters and a concrete receiver for `this`.

use crate::intern::TypeInterner;
use crate::types::*;
use rustc_hash::FxHashMap;
use vesta_common::Atom;

/// A substitution applied to declared member types: class type parameters to
/// type arguments, plus the resolved receiver for `this`.
#[derive(Clone, Debug, Default)]
pub struct Subst {
    pub generics: FxHashMap<Atom, TypeId>,
    pub this_ty: Option<TypeId>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_this(this_ty: TypeId) -> Self {
        Subst {
            generics: FxHashMap::default(),
            this_ty: Some(this_ty),
        }
    }

    pub fn bind(&mut self, name: Atom, ty: TypeId) {
        self.generics.insert(name, ty);
    }

    pub fn is_empty(&self) -> bool {
        self.generics.is_empty() && self.this_ty.is_none()
    }
}

/// Rewrite `ty` under `subst`. Unbound generics and type variables pass
/// through unchanged.
pub fn instantiate(types: &TypeInterner, ty: TypeId, subst: &Subst) -> TypeId {
    if subst.is_empty() {
        return ty;
    }
    match types.key(ty) {
        TypeKey::Prim(_) | TypeKey::Var(_) => ty,
        TypeKey::Generic(name, args) => {
            if let Some(&mapped) = subst.generics.get(&name) {
                mapped
            } else {
                let args = instantiate_list(types, args, subst);
                types.intern(TypeKey::Generic(name, args))
            }
        }
        TypeKey::Dependent(DependentKind::This, under) => match subst.this_ty {
            Some(this_ty) => this_ty,
            None => {
                let under = instantiate(types, under, subst);
                types.this_under(under)
            }
        },
        TypeKey::Class { name, exact, args } => {
            let args = instantiate_list(types, args, subst);
            types.intern(TypeKey::Class { name, exact, args })
        }
        TypeKey::Union(list) => {
            let members = types
                .list(list)
                .into_iter()
                .map(|m| instantiate(types, m, subst))
                .collect();
            types.union(members)
        }
        TypeKey::Intersection(list) => {
            let members = types
                .list(list)
                .into_iter()
                .map(|m| instantiate(types, m, subst))
                .collect();
            types.intersection(members)
        }
        TypeKey::Nullable(inner) => {
            let inner = instantiate(types, inner, subst);
            types.nullable(inner)
        }
        TypeKey::Newtype(name, under) => {
            let under = instantiate(types, under, subst);
            types.newtype(name, under)
        }
        TypeKey::Fun(id) => {
            let fun = types.fun_type(id);
            let params = fun
                .params
                .iter()
                .map(|&p| instantiate(types, p, subst))
                .collect();
            let ret = instantiate(types, fun.ret, subst);
            types.fun(params, ret)
        }
    }
}

fn instantiate_list(types: &TypeInterner, list: TypeListId, subst: &Subst) -> TypeListId {
    let members: Vec<TypeId> = types
        .list(list)
        .into_iter()
        .map(|m| instantiate(types, m, subst))
        .collect();
    types.intern_list(members)
}
