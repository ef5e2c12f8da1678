//! Flow-sensitive local type checking for Vesta function bodies.
//!
//! The checker walks one body at a time, tracking per-continuation local
//! environments (`env`), resolving member access against arbitrary receiver
//! types (`member`), resolving class-id forms (`class_id`), and producing a
//! parallel typed tree (`tast`). Diagnostics go to an append-only sink;
//! recoverable failures substitute the error or dynamic type so checking
//! always completes, and only internal invariant violations abort a unit.

mod class_id;
mod context;
mod env;
mod expr;
mod hint;
mod member;
mod refinement;
mod stmt;
mod tast;

pub use context::{Checker, CheckerOptions, InternalError, TypingContext, MAX_LOOP_FIXPOINT_ITERS};
pub use env::{ContKey, ContMap, Eid, Local, LocalEnv, LocalLookup, PerContEntry};
pub use member::{MemberAccess, MemberResolution};
pub use refinement::{FakeMemberKey, FakeMembers};
pub use tast::TypedTree;

use vesta_ast::Body;

/// Check one function body, returning its typed tree. Diagnostics appear in
/// the context's sink; `Err` is reserved for internal invariant violations
/// (the driver abandons this unit and moves on).
pub fn check_body(ctx: TypingContext<'_>, body: &Body) -> Result<TypedTree, InternalError> {
    let mut checker = Checker::new(ctx);
    checker.check_body(body)?;
    Ok(checker.tast)
}
