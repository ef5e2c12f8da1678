//! Declaration store: folded class metadata.
//!
//! Classes are stored *folded*: each member table already contains inherited
//! members with their `origin` recording the declaring class, the way the
//! declaration pipeline linearizes them upstream. The checker trusts these
//! tables and never recomputes linearization.
//!
//! `DeclStore` is shared read-mostly across checker workers; definitions are
//! immutable `Arc`s behind a concurrent map.

use crate::types::{Exactness, TypeId, TypeKey};
use crate::TypeInterner;
use bitflags::bitflags;
use dashmap::DashMap;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use vesta_common::Atom;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Trait,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Variance {
    Invariant,
    Covariant,
    Contravariant,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct EltFlags: u8 {
        const STATIC = 1 << 0;
        const ABSTRACT = 1 << 1;
        const FINAL = 1 << 2;
    }
}

/// One member (property or method) of a folded class.
#[derive(Clone, Debug)]
pub struct ClassElt {
    pub ty: TypeId,
    pub visibility: Visibility,
    pub flags: EltFlags,
    /// Class that declared this member (differs from the receiver class for
    /// inherited members).
    pub origin: Atom,
    /// Deprecation text when the member carries a deprecation attribute.
    pub deprecated: Option<String>,
}

impl ClassElt {
    pub fn is_static(&self) -> bool {
        self.flags.contains(EltFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.flags.contains(EltFlags::ABSTRACT)
    }
}

/// Declared type parameter of a class.
#[derive(Clone, Debug)]
pub struct Tparam {
    pub name: Atom,
    pub variance: Variance,
    /// Upper bounds (`T as Bound`).
    pub bounds: Vec<TypeId>,
}

/// A folded class definition.
#[derive(Clone, Debug)]
pub struct ClassDef {
    pub name: Atom,
    pub kind: ClassKind,
    pub abstract_: bool,
    pub final_: bool,
    /// False when an ancestor could not be loaded; "member not found"
    /// diagnostics are suppressed for such classes.
    pub members_fully_known: bool,
    pub tparams: Vec<Tparam>,
    /// Direct parent class type, if any.
    pub extends: Option<TypeId>,
    /// Every ancestor (class and interface), keyed by name, instantiated in
    /// terms of this class's type parameters.
    pub ancestors: FxHashMap<Atom, TypeId>,
    /// `require extends` constraints (traits only).
    pub req_extends: Vec<TypeId>,
    /// Instance properties / static properties / methods / static methods.
    pub props: IndexMap<Atom, ClassElt>,
    pub sprops: IndexMap<Atom, ClassElt>,
    pub methods: IndexMap<Atom, ClassElt>,
    pub smethods: IndexMap<Atom, ClassElt>,
    pub construct: Option<ClassElt>,
    /// Final constructor or `__ConsistentConstruct`: `new static()` is sound.
    pub consistent_construct: bool,
}

impl ClassDef {
    /// Look up a member in the table matching `is_method`/`is_static`.
    pub fn member(&self, name: Atom, is_method: bool, is_static: bool) -> Option<&ClassElt> {
        match (is_method, is_static) {
            (true, false) => self.methods.get(&name),
            (true, true) => self.smethods.get(&name),
            (false, false) => self.props.get(&name),
            (false, true) => self.sprops.get(&name),
        }
    }

    pub fn has_ancestor(&self, name: Atom) -> bool {
        self.name == name || self.ancestors.contains_key(&name)
    }

    pub fn tparam(&self, name: Atom) -> Option<&Tparam> {
        self.tparams.iter().find(|tp| tp.name == name)
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Read access to class declarations. The checker only ever consumes this
/// trait, so tests can stub providers without a store.
pub trait DeclProvider {
    fn get_class(&self, name: Atom) -> Option<Arc<ClassDef>>;
}

/// Concurrent, append-only store of folded classes.
#[derive(Default)]
pub struct DeclStore {
    classes: DashMap<Atom, Arc<ClassDef>, rustc_hash::FxBuildHasher>,
}

impl DeclStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold and insert a class. Parent members are merged into the child's
    /// tables (child declarations win), mirroring the upstream linearizer.
    pub fn define(&self, types: &TypeInterner, builder: ClassDefBuilder) -> Arc<ClassDef> {
        let def = Arc::new(builder.fold(types, self));
        self.classes.insert(def.name, Arc::clone(&def));
        def
    }
}

impl DeclProvider for DeclStore {
    fn get_class(&self, name: Atom) -> Option<Arc<ClassDef>> {
        self.classes.get(&name).map(|entry| Arc::clone(&entry))
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builds one class definition; `DeclStore::define` folds in the parent's
/// tables on insertion.
pub struct ClassDefBuilder {
    name: Atom,
    kind: ClassKind,
    abstract_: bool,
    final_: bool,
    members_fully_known: bool,
    tparams: Vec<Tparam>,
    extends: Option<TypeId>,
    implements: Vec<TypeId>,
    req_extends: Vec<TypeId>,
    props: IndexMap<Atom, ClassElt>,
    sprops: IndexMap<Atom, ClassElt>,
    methods: IndexMap<Atom, ClassElt>,
    smethods: IndexMap<Atom, ClassElt>,
    construct: Option<ClassElt>,
    consistent_construct: bool,
}

impl ClassDefBuilder {
    pub fn new(name: &str) -> Self {
        ClassDefBuilder {
            name: Atom::new(name),
            kind: ClassKind::Class,
            abstract_: false,
            final_: false,
            members_fully_known: true,
            tparams: Vec::new(),
            extends: None,
            implements: Vec::new(),
            req_extends: Vec::new(),
            props: IndexMap::new(),
            sprops: IndexMap::new(),
            methods: IndexMap::new(),
            smethods: IndexMap::new(),
            construct: None,
            consistent_construct: false,
        }
    }

    pub fn interface(name: &str) -> Self {
        let mut b = Self::new(name);
        b.kind = ClassKind::Interface;
        b
    }

    pub fn trait_(name: &str) -> Self {
        let mut b = Self::new(name);
        b.kind = ClassKind::Trait;
        b
    }

    pub fn abstract_(mut self) -> Self {
        self.abstract_ = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.final_ = true;
        self
    }

    pub fn not_fully_known(mut self) -> Self {
        self.members_fully_known = false;
        self
    }

    pub fn consistent_construct(mut self) -> Self {
        self.consistent_construct = true;
        self
    }

    pub fn tparam(mut self, name: &str, variance: Variance, bounds: Vec<TypeId>) -> Self {
        self.tparams.push(Tparam {
            name: Atom::new(name),
            variance,
            bounds,
        });
        self
    }

    pub fn extends(mut self, parent: TypeId) -> Self {
        self.extends = Some(parent);
        self
    }

    pub fn implements(mut self, iface: TypeId) -> Self {
        self.implements.push(iface);
        self
    }

    pub fn require_extends(mut self, class_ty: TypeId) -> Self {
        self.req_extends.push(class_ty);
        self
    }

    fn elt(&self, ty: TypeId, visibility: Visibility, flags: EltFlags) -> ClassElt {
        ClassElt {
            ty,
            visibility,
            flags,
            origin: self.name,
            deprecated: None,
        }
    }

    pub fn prop(mut self, name: &str, ty: TypeId) -> Self {
        let elt = self.elt(ty, Visibility::Public, EltFlags::empty());
        self.props.insert(Atom::new(name), elt);
        self
    }

    pub fn prop_vis(mut self, name: &str, ty: TypeId, visibility: Visibility) -> Self {
        let elt = self.elt(ty, visibility, EltFlags::empty());
        self.props.insert(Atom::new(name), elt);
        self
    }

    pub fn sprop(mut self, name: &str, ty: TypeId) -> Self {
        let elt = self.elt(ty, Visibility::Public, EltFlags::STATIC);
        self.sprops.insert(Atom::new(name), elt);
        self
    }

    pub fn method(mut self, name: &str, ty: TypeId) -> Self {
        let elt = self.elt(ty, Visibility::Public, EltFlags::empty());
        self.methods.insert(Atom::new(name), elt);
        self
    }

    pub fn method_vis(mut self, name: &str, ty: TypeId, visibility: Visibility) -> Self {
        let elt = self.elt(ty, visibility, EltFlags::empty());
        self.methods.insert(Atom::new(name), elt);
        self
    }

    pub fn abstract_method(mut self, name: &str, ty: TypeId) -> Self {
        let elt = self.elt(ty, Visibility::Public, EltFlags::ABSTRACT);
        self.methods.insert(Atom::new(name), elt);
        self
    }

    pub fn smethod(mut self, name: &str, ty: TypeId) -> Self {
        let elt = self.elt(ty, Visibility::Public, EltFlags::STATIC);
        self.smethods.insert(Atom::new(name), elt);
        self
    }

    pub fn abstract_smethod(mut self, name: &str, ty: TypeId) -> Self {
        let elt = self.elt(ty, Visibility::Public, EltFlags::STATIC | EltFlags::ABSTRACT);
        self.smethods.insert(Atom::new(name), elt);
        self
    }

    pub fn deprecated_method(mut self, name: &str, ty: TypeId, note: &str) -> Self {
        let mut elt = self.elt(ty, Visibility::Public, EltFlags::empty());
        elt.deprecated = Some(note.to_string());
        self.methods.insert(Atom::new(name), elt);
        self
    }

    pub fn constructor(mut self, ty: TypeId) -> Self {
        self.construct = Some(self.elt(ty, Visibility::Public, EltFlags::empty()));
        self
    }

    /// Merge parent and interface tables into this class, producing the
    /// folded definition.
    fn fold(self, types: &TypeInterner, store: &DeclStore) -> ClassDef {
        let mut ancestors: FxHashMap<Atom, TypeId> = FxHashMap::default();
        let mut props = IndexMap::new();
        let mut sprops = IndexMap::new();
        let mut methods = IndexMap::new();
        let mut smethods = IndexMap::new();
        let mut construct = self.construct;
        let mut consistent = self.consistent_construct;
        let mut fully_known = self.members_fully_known;

        let mut heritage: Vec<TypeId> = Vec::new();
        if let Some(parent) = self.extends {
            heritage.push(parent);
        }
        heritage.extend(self.implements.iter().copied());

        for &ancestor_ty in &heritage {
            let TypeKey::Class { name, .. } = types.key(ancestor_ty) else {
                continue;
            };
            let Some(ancestor) = store.get_class(name) else {
                // Unresolvable ancestor: member knowledge is incomplete.
                fully_known = false;
                continue;
            };
            ancestors.insert(name, ancestor_ty);
            for (&anc_name, &anc_ty) in &ancestor.ancestors {
                ancestors.entry(anc_name).or_insert(anc_ty);
            }
            fully_known &= ancestor.members_fully_known;
            consistent |= ancestor.consistent_construct;
            for (name, elt) in &ancestor.props {
                props.entry(*name).or_insert_with(|| elt.clone());
            }
            for (name, elt) in &ancestor.sprops {
                sprops.entry(*name).or_insert_with(|| elt.clone());
            }
            for (name, elt) in &ancestor.methods {
                methods.entry(*name).or_insert_with(|| elt.clone());
            }
            for (name, elt) in &ancestor.smethods {
                smethods.entry(*name).or_insert_with(|| elt.clone());
            }
            if construct.is_none() {
                construct = ancestor.construct.clone();
            }
        }

        // Own members shadow inherited ones.
        for (name, elt) in self.props {
            props.insert(name, elt);
        }
        for (name, elt) in self.sprops {
            sprops.insert(name, elt);
        }
        for (name, elt) in self.methods {
            methods.insert(name, elt);
        }
        for (name, elt) in self.smethods {
            smethods.insert(name, elt);
        }

        ClassDef {
            name: self.name,
            kind: self.kind,
            abstract_: self.abstract_,
            final_: self.final_,
            members_fully_known: fully_known,
            tparams: self.tparams,
            extends: self.extends,
            ancestors,
            req_extends: self.req_extends,
            props,
            sprops,
            methods,
            smethods,
            construct,
            consistent_construct: consistent,
        }
    }
}

/// Convenience: nonexact class type with no arguments.
pub fn class_named(types: &TypeInterner, name: &str) -> TypeId {
    types.class(Atom::new(name), Exactness::Nonexact, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_merges_parent_members() {
        let types = TypeInterner::new();
        let store = DeclStore::new();
        let base_ty = class_named(&types, "Base");
        store.define(
            &types,
            ClassDefBuilder::new("Base")
                .prop("x", TypeId::INT)
                .method("m", types.fun(vec![], TypeId::STRING)),
        );
        let derived = store.define(
            &types,
            ClassDefBuilder::new("Derived")
                .extends(base_ty)
                .prop("y", TypeId::BOOL),
        );

        assert!(derived.props.contains_key(&Atom::new("x")));
        assert!(derived.props.contains_key(&Atom::new("y")));
        assert!(derived.methods.contains_key(&Atom::new("m")));
        assert_eq!(
            derived.props[&Atom::new("x")].origin,
            Atom::new("Base"),
            "inherited member keeps its declaring origin"
        );
        assert!(derived.has_ancestor(Atom::new("Base")));
    }

    #[test]
    fn missing_ancestor_clears_fully_known() {
        let types = TypeInterner::new();
        let store = DeclStore::new();
        let ghost = class_named(&types, "Ghost");
        let def = store.define(&types, ClassDefBuilder::new("Orphan").extends(ghost));
        assert!(!def.members_fully_known);
    }
}
