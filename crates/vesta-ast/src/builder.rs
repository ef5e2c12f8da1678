//! Convenience constructors for building bodies by hand.
//!
//! The real front end assigns `NodeId`s while lowering; tests and fixtures
//! use this builder to get the same numbering discipline without a parser.

use crate::*;
use std::cell::Cell;
use vesta_common::{Atom, Pos};

/// Assigns fresh `NodeId`s and wraps positions. One builder per `Body`.
pub struct Builder {
    next_id: Cell<u32>,
    next_local: Cell<u32>,
}

impl Builder {
    pub fn new() -> Self {
        Builder {
            next_id: Cell::new(0),
            next_local: Cell::new(0),
        }
    }

    fn fresh(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }

    /// Allocate a local the way the namer would.
    pub fn local(&self, name: &str) -> LocalId {
        let id = self.next_local.get();
        self.next_local.set(id + 1);
        LocalId(id, Atom::new(name))
    }

    pub fn expr(&self, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh(),
            pos: Pos::NONE,
            kind,
        }
    }

    pub fn expr_at(&self, pos: Pos, kind: ExprKind) -> Expr {
        Expr {
            id: self.fresh(),
            pos,
            kind,
        }
    }

    pub fn int(&self, v: i64) -> Expr {
        self.expr(ExprKind::Int(v))
    }

    pub fn str(&self, s: &str) -> Expr {
        self.expr(ExprKind::Str(Atom::new(s)))
    }

    pub fn null(&self) -> Expr {
        self.expr(ExprKind::Null)
    }

    pub fn bool(&self, v: bool) -> Expr {
        self.expr(if v { ExprKind::True } else { ExprKind::False })
    }

    pub fn lvar(&self, id: LocalId) -> Expr {
        self.expr(ExprKind::Lvar(id))
    }

    pub fn this(&self) -> Expr {
        self.expr(ExprKind::This)
    }

    pub fn assign(&self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Assign {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn obj_get(&self, recv: Expr, member: &str) -> Expr {
        self.expr(ExprKind::ObjGet {
            recv: Box::new(recv),
            member: Atom::new(member),
            nullsafe: false,
        })
    }

    pub fn obj_get_nullsafe(&self, recv: Expr, member: &str) -> Expr {
        self.expr(ExprKind::ObjGet {
            recv: Box::new(recv),
            member: Atom::new(member),
            nullsafe: true,
        })
    }

    pub fn class_get(&self, cid: ClassId, member: &str) -> Expr {
        self.expr(ExprKind::ClassGet {
            cid,
            member: Atom::new(member),
        })
    }

    pub fn call(&self, func: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Call {
            func: Box::new(func),
            targs: Vec::new(),
            args,
        })
    }

    pub fn new_obj(&self, cid: ClassId, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::New { cid, args })
    }

    pub fn is_null(&self, e: Expr) -> Expr {
        self.expr(ExprKind::Is {
            expr: Box::new(e),
            hint: IsHint::Null,
        })
    }

    pub fn is_nonnull(&self, e: Expr) -> Expr {
        self.expr(ExprKind::Is {
            expr: Box::new(e),
            hint: IsHint::Nonnull,
        })
    }

    pub fn is_hint(&self, e: Expr, hint: Hint) -> Expr {
        self.expr(ExprKind::Is {
            expr: Box::new(e),
            hint: IsHint::Hint(hint),
        })
    }

    pub fn not(&self, e: Expr) -> Expr {
        self.expr(ExprKind::Unop {
            op: Unop::Not,
            expr: Box::new(e),
        })
    }

    pub fn null_coalesce(&self, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::NullCoalesce {
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    pub fn binop(&self, op: Binop, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binop {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    // Class ids ---------------------------------------------------------------

    pub fn cid_named(&self, name: &str) -> ClassId {
        ClassId {
            pos: Pos::NONE,
            kind: ClassIdKind::Named(Atom::new(name), Vec::new()),
        }
    }

    pub fn cid_self(&self) -> ClassId {
        ClassId {
            pos: Pos::NONE,
            kind: ClassIdKind::SelfCls,
        }
    }

    pub fn cid_parent(&self) -> ClassId {
        ClassId {
            pos: Pos::NONE,
            kind: ClassIdKind::Parent,
        }
    }

    pub fn cid_static(&self) -> ClassId {
        ClassId {
            pos: Pos::NONE,
            kind: ClassIdKind::Static,
        }
    }

    pub fn cid_expr(&self, e: Expr) -> ClassId {
        ClassId {
            pos: Pos::NONE,
            kind: ClassIdKind::Expr(Box::new(e)),
        }
    }

    // Statements --------------------------------------------------------------

    pub fn stmt(&self, kind: StmtKind) -> Stmt {
        Stmt {
            pos: Pos::NONE,
            kind,
        }
    }

    pub fn stmt_at(&self, pos: Pos, kind: StmtKind) -> Stmt {
        Stmt { pos, kind }
    }

    pub fn expr_stmt(&self, e: Expr) -> Stmt {
        self.stmt(StmtKind::Expr(e))
    }

    pub fn ret(&self, e: Expr) -> Stmt {
        self.stmt(StmtKind::Return(Some(e)))
    }

    pub fn ret_void(&self) -> Stmt {
        self.stmt(StmtKind::Return(None))
    }

    pub fn if_(&self, cond: Expr, then: Block, else_: Block) -> Stmt {
        self.stmt(StmtKind::If { cond, then, else_ })
    }

    pub fn while_(&self, cond: Expr, body: Block) -> Stmt {
        self.stmt(StmtKind::While { cond, body })
    }

    pub fn param(&self, name: LocalId, hint: Hint) -> FunParam {
        FunParam {
            name,
            hint,
            pos: Pos::NONE,
        }
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
