//! Interned type representation.
//!
//! Types are hash-consed: structurally equal types share a `TypeId`, so
//! equality is an integer compare and sets of types dedup for free. The
//! first ids are pre-interned primitives with `const` handles.

use smallvec::SmallVec;
use vesta_common::Atom;

/// Handle to an interned type. Equality is identity.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Error recovery type; absorbs operations so one failure does not
    /// cascade into its expression tree.
    pub const ERR: TypeId = TypeId(0);
    /// The gradual/dynamic type.
    pub const DYNAMIC: TypeId = TypeId(1);
    /// Bottom.
    pub const NOTHING: TypeId = TypeId(2);
    /// Top.
    pub const MIXED: TypeId = TypeId(3);
    pub const NULL: TypeId = TypeId(4);
    pub const VOID: TypeId = TypeId(5);
    pub const INT: TypeId = TypeId(6);
    pub const FLOAT: TypeId = TypeId(7);
    pub const STRING: TypeId = TypeId(8);
    pub const BOOL: TypeId = TypeId(9);
    /// Everything except null.
    pub const NONNULL: TypeId = TypeId(10);
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimKind {
    Null,
    Void,
    Int,
    Float,
    String,
    Bool,
    Nonnull,
    Mixed,
    Nothing,
    Dynamic,
    Err,
}

/// Whether a class type admits subclasses (`A` vs the exact `A` produced by
/// `self`/`new A()` in a final position).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Exactness {
    Exact,
    Nonexact,
}

/// Kinds of dependent types. Only `This` ("the type of the receiver") exists
/// today; expressions-dependent kinds would slot in here.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DependentKind {
    This,
}

/// Handle to an interned list of types (union/intersection members, class
/// type arguments). Lists are canonicalized before interning.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeListId(pub u32);

/// Handle to an interned function type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunTypeId(pub u32);

/// Per-check type variable id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TyvarId(pub u32);

/// Function type: parameter types and return type. Parameters are
/// positional; arity checking lives in the checker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunType {
    pub params: SmallVec<[TypeId; 4]>,
    pub ret: TypeId,
}

/// The structural key of a type. Interning maps each distinct key to one
/// `TypeId`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Prim(PrimKind),
    /// Nominal class or interface instantiation.
    Class {
        name: Atom,
        exact: Exactness,
        args: TypeListId,
    },
    /// In-scope generic parameter, with any explicit type arguments it
    /// carries (higher-kinded uses).
    Generic(Atom, TypeListId),
    Union(TypeListId),
    Intersection(TypeListId),
    /// `?T`
    Nullable(TypeId),
    /// Opaque alias: name plus underlying type (its upper bound).
    Newtype(Atom, TypeId),
    /// `this`-style type dependent on the receiver; the payload is the
    /// enclosing class type it refines.
    Dependent(DependentKind, TypeId),
    Var(TyvarId),
    Fun(FunTypeId),
}
