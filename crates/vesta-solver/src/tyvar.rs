//! Per-check type variables and deferred has-member constraints.
//!
//! A `TyvarStore` is owned by exactly one function-body check; it is never
//! shared between workers. Member access on an unresolved variable registers
//! a `HasMember` obligation which the checker discharges when the variable is
//! bound to a concrete type.

use crate::intern::TypeInterner;
use crate::types::{TypeId, TypeKey, TyvarId};
use tracing::trace;
use vesta_common::{Atom, Pos};

/// Deferred obligation: the variable's eventual type must expose `name`, and
/// the member's type will flow into `member_ty` (itself a fresh variable).
#[derive(Clone, Debug)]
pub struct HasMember {
    pub name: Atom,
    pub member_ty: TypeId,
    pub is_method: bool,
    pub nullsafe: bool,
    pub pos: Pos,
}

#[derive(Default)]
struct TyvarData {
    pos: Pos,
    resolved: Option<TypeId>,
    lower: Vec<TypeId>,
    upper: Vec<TypeId>,
    constraints: Vec<HasMember>,
}

#[derive(Default)]
pub struct TyvarStore {
    vars: Vec<TyvarData>,
}

impl TyvarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh_id(&mut self, pos: Pos) -> TyvarId {
        let id = TyvarId(self.vars.len() as u32);
        self.vars.push(TyvarData {
            pos,
            ..TyvarData::default()
        });
        id
    }

    /// Fresh variable as an interned type.
    pub fn fresh(&mut self, types: &TypeInterner, pos: Pos) -> TypeId {
        let id = self.fresh_id(pos);
        types.tyvar(id)
    }

    pub fn pos(&self, id: TyvarId) -> Pos {
        self.vars[id.0 as usize].pos
    }

    pub fn resolved(&self, id: TyvarId) -> Option<TypeId> {
        self.vars[id.0 as usize].resolved
    }

    pub fn add_upper_bound(&mut self, id: TyvarId, bound: TypeId) {
        self.vars[id.0 as usize].upper.push(bound);
    }

    pub fn add_lower_bound(&mut self, id: TyvarId, bound: TypeId) {
        self.vars[id.0 as usize].lower.push(bound);
    }

    pub fn upper_bounds(&self, id: TyvarId) -> &[TypeId] {
        &self.vars[id.0 as usize].upper
    }

    /// Register a has-member obligation on an unresolved variable.
    pub fn add_has_member(&mut self, id: TyvarId, constraint: HasMember) {
        trace!(var = id.0, member = %constraint.name, "deferring has-member constraint");
        self.vars[id.0 as usize].constraints.push(constraint);
    }

    /// Bind a variable to a concrete type, returning the has-member
    /// obligations the caller must now discharge against that type.
    pub fn bind(&mut self, id: TyvarId, ty: TypeId) -> Vec<HasMember> {
        let data = &mut self.vars[id.0 as usize];
        data.resolved = Some(ty);
        std::mem::take(&mut data.constraints)
    }

    /// Chase resolved variables inside `ty`. Unresolved variables stay.
    pub fn expand(&self, types: &TypeInterner, ty: TypeId) -> TypeId {
        match types.key(ty) {
            TypeKey::Var(id) => match self.resolved(id) {
                Some(resolved) => self.expand(types, resolved),
                None => ty,
            },
            TypeKey::Nullable(inner) => {
                let inner = self.expand(types, inner);
                types.nullable(inner)
            }
            TypeKey::Union(list) => {
                let members = types
                    .list(list)
                    .into_iter()
                    .map(|m| self.expand(types, m))
                    .collect();
                types.union(members)
            }
            TypeKey::Intersection(list) => {
                let members = types
                    .list(list)
                    .into_iter()
                    .map(|m| self.expand(types, m))
                    .collect();
                types.intersection(members)
            }
            _ => ty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_drains_constraints() {
        let types = TypeInterner::new();
        let mut store = TyvarStore::new();
        let v = store.fresh_id(Pos::NONE);
        let result = store.fresh(&types, Pos::NONE);
        store.add_has_member(v, HasMember {
            name: Atom::new("m"),
            member_ty: result,
            is_method: true,
            nullsafe: false,
            pos: Pos::NONE,
        });
        let drained = store.bind(v, TypeId::INT);
        assert_eq!(drained.len(), 1);
        assert_eq!(store.resolved(v), Some(TypeId::INT));
        assert!(store.bind(v, TypeId::INT).is_empty());
    }

    #[test]
    fn expand_chases_resolved_vars() {
        let types = TypeInterner::new();
        let mut store = TyvarStore::new();
        let v = store.fresh_id(Pos::NONE);
        let var_ty = types.tyvar(v);
        let opt_var = types.nullable(var_ty);
        store.bind(v, TypeId::INT);
        assert_eq!(store.expand(&types, opt_var), types.nullable(TypeId::INT));
    }
}
