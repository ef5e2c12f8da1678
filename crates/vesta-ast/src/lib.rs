//! Function-body AST for the Vesta checker.
//!
//! These trees come from an external parser/namer and are never mutated by
//! the checker; it produces a parallel map of node types instead (keyed by
//! `NodeId`). Only the forms the flow-sensitive core consumes are modeled:
//! control-flow statements, member access, assignment, and the handful of
//! expression forms those need.

pub mod builder;

use vesta_common::{Atom, Pos};

/// Identifier of an expression node, unique within one body.
///
/// The checker keys its typed-tree output (`node -> TypeId`, `node -> hole`)
/// by this id.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const NONE: NodeId = NodeId(u32::MAX);
}

/// A named local variable. The numeric part is assigned by the namer; the
/// atom keeps the source name for diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalId(pub u32, pub Atom);

impl LocalId {
    pub fn name(self) -> Atom {
        self.1
    }
}

// =============================================================================
// Type hints
// =============================================================================

/// Surface type hints. The checker localizes these to solver types; the AST
/// stays independent of the type representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Hint {
    Int,
    Float,
    Bool,
    Str,
    Void,
    Mixed,
    Nonnull,
    Dynamic,
    Nothing,
    Null,
    /// `this` (dependent on the receiver).
    This,
    /// `?T`
    Nullable(Box<Hint>),
    /// Class, interface, newtype, or in-scope generic parameter by name.
    Apply(Atom, Vec<Hint>),
}

// =============================================================================
// Expressions
// =============================================================================

#[derive(Clone, Debug)]
pub struct Expr {
    pub id: NodeId,
    pub pos: Pos,
    pub kind: ExprKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Binop {
    Plus,
    Minus,
    Lt,
    Eq,
    Neq,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Unop {
    Not,
    Neg,
}

/// Right-hand side of an `is` refinement expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IsHint {
    Null,
    Nonnull,
    Hint(Hint),
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(Atom),
    True,
    False,
    Null,
    /// `$x`
    Lvar(LocalId),
    /// `$this`
    This,
    /// `lhs = rhs`; lhs is an `Lvar` or an `ObjGet` chain.
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Binop {
        op: Binop,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unop {
        op: Unop,
        expr: Box<Expr>,
    },
    /// `lhs ?? rhs`
    NullCoalesce {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `recv->member` / `recv?->member`
    ObjGet {
        recv: Box<Expr>,
        member: Atom,
        nullsafe: bool,
    },
    /// `cid::member` (static property or method reference)
    ClassGet {
        cid: ClassId,
        member: Atom,
    },
    /// `func(args)`; when `func` is an `ObjGet`/`ClassGet` the member is
    /// resolved as a method.
    Call {
        func: Box<Expr>,
        targs: Vec<Hint>,
        args: Vec<Expr>,
    },
    /// `new cid(args)`
    New {
        cid: ClassId,
        args: Vec<Expr>,
    },
    /// `expr is hint`
    Is {
        expr: Box<Expr>,
        hint: IsHint,
    },
    /// Anonymous function. `captures` lists the locals the closure captures
    /// explicitly; refinements survive into the body only for those.
    Lambda {
        params: Vec<FunParam>,
        captures: Vec<LocalId>,
        body: Block,
    },
}

// =============================================================================
// Class-id forms
// =============================================================================

/// A class reference position: `self::`, `parent::`, `static::`, a name, or
/// an arbitrary expression.
#[derive(Clone, Debug)]
pub struct ClassId {
    pub pos: Pos,
    pub kind: ClassIdKind,
}

#[derive(Clone, Debug)]
pub enum ClassIdKind {
    SelfCls,
    Parent,
    Static,
    /// Nominal name (possibly an in-scope generic parameter) with explicit
    /// type arguments.
    Named(Atom, Vec<Hint>),
    Expr(Box<Expr>),
}

// =============================================================================
// Statements
// =============================================================================

pub type Block = Vec<Stmt>;

#[derive(Clone, Debug)]
pub struct Stmt {
    pub pos: Pos,
    pub kind: StmtKind,
}

#[derive(Clone, Debug)]
pub enum StmtKind {
    Expr(Expr),
    Return(Option<Expr>),
    Throw(Expr),
    If {
        cond: Expr,
        then: Block,
        else_: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    DoWhile {
        body: Block,
        cond: Expr,
    },
    For {
        init: Vec<Expr>,
        cond: Option<Expr>,
        incr: Vec<Expr>,
        body: Block,
    },
    Switch {
        subject: Expr,
        cases: Vec<Case>,
        default: Option<Block>,
    },
    Try {
        body: Block,
        catches: Vec<Catch>,
        finally: Block,
    },
    Break,
    Continue,
    /// Explicit fall-through marker at the end of a switch case.
    Fallthrough,
    Block(Block),
    Noop,
}

#[derive(Clone, Debug)]
pub struct Case {
    pub rhs: Expr,
    pub body: Block,
}

#[derive(Clone, Debug)]
pub struct Catch {
    pub class: Atom,
    pub lvar: LocalId,
    pub body: Block,
}

// =============================================================================
// Function bodies
// =============================================================================

#[derive(Clone, Debug)]
pub struct FunParam {
    pub name: LocalId,
    pub hint: Hint,
    pub pos: Pos,
}

/// A function or method body as handed to the checker: parameters, declared
/// return hint, and the statement list.
#[derive(Clone, Debug)]
pub struct Body {
    pub params: Vec<FunParam>,
    pub ret: Option<Hint>,
    pub stmts: Block,
}
