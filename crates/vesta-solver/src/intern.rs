//! Type interner and canonicalizing constructors.
//!
//! `union` and `intersection` flatten, dedup, sort and simplify their member
//! lists before interning, so structurally equal type algebra results always
//! compare equal by `TypeId`. This is what makes environment merging
//! idempotent (`merge(env, c, c) == c`) and member resolution deterministic.

use crate::types::*;
use dashmap::DashMap;
use rustc_hash::FxHashSet;
use std::sync::RwLock;
use vesta_common::Atom;

pub struct TypeInterner {
    key_lookup: DashMap<TypeKey, TypeId, rustc_hash::FxBuildHasher>,
    keys: RwLock<Vec<TypeKey>>,
    list_lookup: DashMap<Vec<TypeId>, TypeListId, rustc_hash::FxBuildHasher>,
    lists: RwLock<Vec<Vec<TypeId>>>,
    fun_lookup: DashMap<FunType, FunTypeId, rustc_hash::FxBuildHasher>,
    funs: RwLock<Vec<FunType>>,
}

impl TypeInterner {
    pub fn new() -> Self {
        let interner = TypeInterner {
            key_lookup: DashMap::default(),
            keys: RwLock::new(Vec::new()),
            list_lookup: DashMap::default(),
            lists: RwLock::new(Vec::new()),
            fun_lookup: DashMap::default(),
            funs: RwLock::new(Vec::new()),
        };
        // Pre-intern primitives in the order of the TypeId consts.
        for kind in [
            PrimKind::Err,
            PrimKind::Dynamic,
            PrimKind::Nothing,
            PrimKind::Mixed,
            PrimKind::Null,
            PrimKind::Void,
            PrimKind::Int,
            PrimKind::Float,
            PrimKind::String,
            PrimKind::Bool,
            PrimKind::Nonnull,
        ] {
            interner.intern(TypeKey::Prim(kind));
        }
        debug_assert_eq!(interner.intern(TypeKey::Prim(PrimKind::Nonnull)), TypeId::NONNULL);
        interner
    }

    pub fn intern(&self, key: TypeKey) -> TypeId {
        if let Some(id) = self.key_lookup.get(&key) {
            return *id;
        }
        let mut keys = self.keys.write().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = self.key_lookup.get(&key) {
            return *id;
        }
        let id = TypeId(keys.len() as u32);
        keys.push(key.clone());
        self.key_lookup.insert(key, id);
        id
    }

    pub fn key(&self, id: TypeId) -> TypeKey {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        keys[id.0 as usize].clone()
    }

    pub fn intern_list(&self, members: Vec<TypeId>) -> TypeListId {
        if let Some(id) = self.list_lookup.get(&members) {
            return *id;
        }
        let mut lists = self.lists.write().unwrap_or_else(|e| e.into_inner());
        if let Some(id) = self.list_lookup.get(&members) {
            return *id;
        }
        let id = TypeListId(lists.len() as u32);
        lists.push(members.clone());
        self.list_lookup.insert(members, id);
        id
    }

    pub fn list(&self, id: TypeListId) -> Vec<TypeId> {
        let lists = self.lists.read().unwrap_or_else(|e| e.into_inner());
        lists[id.0 as usize].clone()
    }

    pub fn intern_fun(&self, fun: FunType) -> TypeId {
        let fun_id = if let Some(id) = self.fun_lookup.get(&fun) {
            *id
        } else {
            let mut funs = self.funs.write().unwrap_or_else(|e| e.into_inner());
            if let Some(id) = self.fun_lookup.get(&fun) {
                *id
            } else {
                let id = FunTypeId(funs.len() as u32);
                funs.push(fun.clone());
                self.fun_lookup.insert(fun, id);
                id
            }
        };
        self.intern(TypeKey::Fun(fun_id))
    }

    pub fn fun_type(&self, id: FunTypeId) -> FunType {
        let funs = self.funs.read().unwrap_or_else(|e| e.into_inner());
        funs[id.0 as usize].clone()
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    pub fn class(&self, name: Atom, exact: Exactness, args: Vec<TypeId>) -> TypeId {
        let args = self.intern_list(args);
        self.intern(TypeKey::Class { name, exact, args })
    }

    pub fn generic(&self, name: Atom, args: Vec<TypeId>) -> TypeId {
        let args = self.intern_list(args);
        self.intern(TypeKey::Generic(name, args))
    }

    pub fn newtype(&self, name: Atom, underlying: TypeId) -> TypeId {
        self.intern(TypeKey::Newtype(name, underlying))
    }

    pub fn this_under(&self, class_ty: TypeId) -> TypeId {
        self.intern(TypeKey::Dependent(DependentKind::This, class_ty))
    }

    pub fn tyvar(&self, id: TyvarId) -> TypeId {
        self.intern(TypeKey::Var(id))
    }

    pub fn fun(&self, params: Vec<TypeId>, ret: TypeId) -> TypeId {
        self.intern_fun(FunType {
            params: params.into(),
            ret,
        })
    }

    /// `?t`, collapsing the cases where the null is already absorbed.
    pub fn nullable(&self, t: TypeId) -> TypeId {
        match t {
            TypeId::NULL | TypeId::MIXED | TypeId::DYNAMIC | TypeId::ERR | TypeId::VOID => t,
            TypeId::NOTHING => TypeId::NULL,
            _ => {
                if matches!(self.key(t), TypeKey::Nullable(_)) {
                    t
                } else {
                    self.intern(TypeKey::Nullable(t))
                }
            }
        }
    }

    /// Strip one level of nullability: `Some(T)` for `?T`/`null`-free view.
    /// Returns `None` when the type is not nullable-like.
    pub fn peel_nullable(&self, t: TypeId) -> Option<TypeId> {
        match self.key(t) {
            TypeKey::Nullable(inner) => Some(inner),
            TypeKey::Prim(PrimKind::Null) => Some(TypeId::NOTHING),
            TypeKey::Prim(PrimKind::Mixed) => Some(TypeId::NONNULL),
            _ => None,
        }
    }

    /// Union of `members`, canonicalized.
    pub fn union(&self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::with_capacity(members.len());
        let mut has_null = false;
        self.flatten_union(&members, &mut flat, &mut has_null);

        if flat.contains(&TypeId::ERR) {
            return TypeId::ERR;
        }
        if flat.contains(&TypeId::MIXED) {
            return TypeId::MIXED;
        }

        let mut seen = FxHashSet::default();
        let mut uniq: Vec<TypeId> = flat
            .into_iter()
            .filter(|t| *t != TypeId::NOTHING && seen.insert(*t))
            .collect();
        uniq.sort_unstable();

        let core = match uniq.len() {
            0 => TypeId::NOTHING,
            1 => uniq[0],
            _ => self.intern(TypeKey::Union(self.intern_list(uniq))),
        };
        if has_null { self.nullable(core) } else { core }
    }

    fn flatten_union(&self, members: &[TypeId], out: &mut Vec<TypeId>, has_null: &mut bool) {
        for &m in members {
            match self.key(m) {
                TypeKey::Union(list) => self.flatten_union(&self.list(list), out, has_null),
                TypeKey::Nullable(inner) => {
                    *has_null = true;
                    self.flatten_union(&[inner], out, has_null);
                }
                TypeKey::Prim(PrimKind::Null) => *has_null = true,
                _ => out.push(m),
            }
        }
    }

    /// Intersection of `members`, canonicalized.
    pub fn intersection(&self, members: Vec<TypeId>) -> TypeId {
        let mut flat = Vec::with_capacity(members.len());
        self.flatten_intersection(&members, &mut flat);

        if flat.contains(&TypeId::ERR) {
            return TypeId::ERR;
        }
        if flat.contains(&TypeId::NOTHING) {
            return TypeId::NOTHING;
        }

        let mut seen = FxHashSet::default();
        let mut uniq: Vec<TypeId> = flat
            .into_iter()
            .filter(|t| *t != TypeId::MIXED && seen.insert(*t))
            .collect();
        uniq.sort_unstable();

        match uniq.len() {
            0 => TypeId::MIXED,
            1 => uniq[0],
            _ => self.intern(TypeKey::Intersection(self.intern_list(uniq))),
        }
    }

    fn flatten_intersection(&self, members: &[TypeId], out: &mut Vec<TypeId>) {
        for &m in members {
            match self.key(m) {
                TypeKey::Intersection(list) => {
                    self.flatten_intersection(&self.list(list), out);
                }
                _ => out.push(m),
            }
        }
    }

    // =========================================================================
    // Display
    // =========================================================================

    /// Human-readable rendering for diagnostics.
    pub fn display(&self, t: TypeId) -> String {
        match self.key(t) {
            TypeKey::Prim(kind) => match kind {
                PrimKind::Null => "null".into(),
                PrimKind::Void => "void".into(),
                PrimKind::Int => "int".into(),
                PrimKind::Float => "float".into(),
                PrimKind::String => "string".into(),
                PrimKind::Bool => "bool".into(),
                PrimKind::Nonnull => "nonnull".into(),
                PrimKind::Mixed => "mixed".into(),
                PrimKind::Nothing => "nothing".into(),
                PrimKind::Dynamic => "dynamic".into(),
                PrimKind::Err => "_".into(),
            },
            TypeKey::Class { name, args, .. } => {
                let args = self.list(args);
                if args.is_empty() {
                    name.to_string()
                } else {
                    format!("{}<{}>", name, self.display_list(&args, ", "))
                }
            }
            TypeKey::Generic(name, args) => {
                let args = self.list(args);
                if args.is_empty() {
                    name.to_string()
                } else {
                    format!("{}<{}>", name, self.display_list(&args, ", "))
                }
            }
            TypeKey::Union(list) => {
                format!("({})", self.display_list(&self.list(list), " | "))
            }
            TypeKey::Intersection(list) => {
                format!("({})", self.display_list(&self.list(list), " & "))
            }
            TypeKey::Nullable(inner) => format!("?{}", self.display(inner)),
            TypeKey::Newtype(name, _) => name.to_string(),
            TypeKey::Dependent(DependentKind::This, _) => "this".into(),
            TypeKey::Var(v) => format!("#{}", v.0),
            TypeKey::Fun(id) => {
                let fun = self.fun_type(id);
                format!(
                    "(function({}): {})",
                    self.display_list(&fun.params, ", "),
                    self.display(fun.ret)
                )
            }
        }
    }

    fn display_list(&self, members: &[TypeId], sep: &str) -> String {
        members
            .iter()
            .map(|&m| self.display(m))
            .collect::<Vec<_>>()
            .join(sep)
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_have_fixed_ids() {
        let types = TypeInterner::new();
        assert_eq!(types.intern(TypeKey::Prim(PrimKind::Int)), TypeId::INT);
        assert_eq!(types.intern(TypeKey::Prim(PrimKind::Err)), TypeId::ERR);
        assert_eq!(types.intern(TypeKey::Prim(PrimKind::Mixed)), TypeId::MIXED);
    }

    #[test]
    fn union_is_canonical() {
        let types = TypeInterner::new();
        let a = types.union(vec![TypeId::INT, TypeId::STRING]);
        let b = types.union(vec![TypeId::STRING, TypeId::INT, TypeId::INT]);
        assert_eq!(a, b);
    }

    #[test]
    fn union_with_null_becomes_nullable() {
        let types = TypeInterner::new();
        let t = types.union(vec![TypeId::INT, TypeId::NULL]);
        assert_eq!(t, types.nullable(TypeId::INT));
        assert_eq!(types.peel_nullable(t), Some(TypeId::INT));
    }

    #[test]
    fn union_singleton_collapses() {
        let types = TypeInterner::new();
        assert_eq!(types.union(vec![TypeId::INT]), TypeId::INT);
        assert_eq!(types.union(vec![]), TypeId::NOTHING);
        assert_eq!(types.union(vec![TypeId::NOTHING, TypeId::INT]), TypeId::INT);
    }

    #[test]
    fn intersection_simplifies() {
        let types = TypeInterner::new();
        assert_eq!(types.intersection(vec![]), TypeId::MIXED);
        assert_eq!(
            types.intersection(vec![TypeId::MIXED, TypeId::INT]),
            TypeId::INT
        );
        assert_eq!(
            types.intersection(vec![TypeId::NOTHING, TypeId::INT]),
            TypeId::NOTHING
        );
    }

    #[test]
    fn nested_unions_flatten() {
        let types = TypeInterner::new();
        let inner = types.union(vec![TypeId::INT, TypeId::STRING]);
        let outer = types.union(vec![inner, TypeId::BOOL]);
        let direct = types.union(vec![TypeId::INT, TypeId::STRING, TypeId::BOOL]);
        assert_eq!(outer, direct);
    }
}
