//! Type algebra services for the Vesta checker.
//!
//! The solver owns:
//!
//! - the interned type representation (`TypeId`, O(1) equality)
//! - smart constructors (`union`, `intersection`, `nullable`) that keep
//!   interned types canonical
//! - the subtype and coercion queries
//! - generic instantiation
//! - per-check type variables and deferred has-member constraints
//! - the declaration store (`DeclStore`), shared read-mostly across workers
//!
//! Everything here is synchronous; the store and interner tolerate concurrent
//! readers, while `TyvarStore` is owned exclusively by one function check.

mod coerce;
pub mod decl;
mod instantiate;
mod intern;
mod subtype;
mod types;
mod tyvar;

pub use coerce::{TypeHole, coerce};
pub use decl::{
    ClassDefBuilder, ClassDef, ClassElt, ClassKind, DeclProvider, DeclStore, EltFlags, Tparam,
    Variance, Visibility,
};
pub use instantiate::{Subst, instantiate};
pub use intern::TypeInterner;
pub use subtype::Subtyper;
pub use types::{
    DependentKind, Exactness, FunType, FunTypeId, PrimKind, TypeId, TypeKey, TypeListId, TyvarId,
};
pub use tyvar::{HasMember, TyvarStore};
