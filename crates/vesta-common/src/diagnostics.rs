//! Diagnostics: codes, message templates, and the append-only sink.
//!
//! The checker never reads diagnostics back; it only appends. Codes live in a
//! single `V####` space. Message templates use `{0}`, `{1}`, ... placeholders
//! filled by `format_message`.

use crate::pos::Pos;
use serde::Serialize;
use std::cell::{Cell, RefCell};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub category: DiagnosticCategory,
    pub code: u32,
    pub pos: Pos,
    pub message_text: String,
}

impl Diagnostic {
    pub fn error(pos: Pos, message: impl Into<String>, code: u32) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Error,
            code,
            pos,
            message_text: message.into(),
        }
    }

    pub fn warning(pos: Pos, message: impl Into<String>, code: u32) -> Self {
        Diagnostic {
            category: DiagnosticCategory::Warning,
            code,
            pos,
            message_text: message.into(),
        }
    }
}

pub mod diagnostic_codes {
    //! Stable numeric codes for every diagnostic the checker can produce.

    /// Member does not exist on the receiver type.
    pub const MEMBER_NOT_FOUND: u32 = 4005;
    /// Member access on a primitive or other non-object type.
    pub const NON_OBJECT_MEMBER_ACCESS: u32 = 4006;
    /// Non-nullsafe member access on a nullable receiver.
    pub const NULL_MEMBER_ACCESS: u32 = 4007;
    /// Visibility violation (private/protected access from outside).
    pub const MEMBER_NOT_ACCESSIBLE: u32 = 4008;
    /// Abstract member invoked through a concrete class name.
    pub const ABSTRACT_MEMBER_CALL: u32 = 4009;
    /// Access to a member marked `__Deprecated`.
    pub const DEPRECATED_MEMBER: u32 = 4010;
    /// Direct call to `__construct`; constructors are invoked via `new`.
    pub const CONSTRUCT_CALLED_DIRECTLY: u32 = 4011;
    /// Local read on a path where it may never have been assigned.
    pub const POSSIBLY_UNSET_LOCAL: u32 = 4012;
    /// Local read with no binding on any path.
    pub const UNDEFINED_LOCAL: u32 = 4013;
    /// Class-id expression did not resolve to a class.
    pub const NOT_A_CLASS: u32 = 4014;
    /// `parent` used where no parent class exists.
    pub const PARENT_UNDEFINED: u32 = 4015;
    /// Trait `parent` has no unique most-derived required ancestor.
    pub const TRAIT_PARENT_AMBIGUOUS: u32 = 4016;
    /// Expression type does not coerce to the expected (enforced) type.
    pub const TYPE_MISMATCH: u32 = 4017;
    /// Function can finish without returning a value.
    pub const MISSING_RETURN: u32 = 4018;
    /// `new static()` on a class without consistent-construct.
    pub const INCONSISTENT_CONSTRUCT: u32 = 4019;
    /// Unknown class name in a declaration position.
    pub const UNBOUND_CLASS_NAME: u32 = 4020;
    /// Private member reached through `dynamic` cannot be checked soundly.
    pub const PRIVATE_DYNAMIC_ACCESS: u32 = 4021;
    /// Call arity does not match the callee signature.
    pub const ARITY_MISMATCH: u32 = 4022;
    /// Callee expression is not callable.
    pub const NOT_CALLABLE: u32 = 4023;
    /// Nullsafe member access used as an assignment target.
    pub const NULLSAFE_WRITE: u32 = 4024;
}

pub mod diagnostic_messages {
    pub const MEMBER_NOT_FOUND: &str = "Member {0} does not exist on type {1}";
    pub const NON_OBJECT_MEMBER_ACCESS: &str =
        "You are trying to access the member {0} but this is not an object, it is {1}";
    pub const NULL_MEMBER_ACCESS: &str =
        "You are trying to access the member {0} on a value that may be null";
    pub const MEMBER_NOT_ACCESSIBLE: &str =
        "The member {0} is {1} and can only be accessed from {2}";
    pub const ABSTRACT_MEMBER_CALL: &str =
        "Cannot call the abstract member {0} through the class name {1}";
    pub const DEPRECATED_MEMBER: &str = "The member {0} is deprecated: {1}";
    pub const CONSTRUCT_CALLED_DIRECTLY: &str =
        "__construct is not a regular method; use new to instantiate {0}";
    pub const POSSIBLY_UNSET_LOCAL: &str =
        "The local {0} may not have been assigned on every path reaching here";
    pub const UNDEFINED_LOCAL: &str = "Undefined local {0}";
    pub const NOT_A_CLASS: &str = "This expression has type {0}, which is not a class";
    pub const PARENT_UNDEFINED: &str = "The class {0} has no parent";
    pub const TRAIT_PARENT_AMBIGUOUS: &str =
        "The trait {0} has no unique most-derived `require extends` ancestor";
    pub const TYPE_MISMATCH: &str = "Expected {0} but got {1}";
    pub const MISSING_RETURN: &str =
        "This function can finish without returning a value of type {0}";
    pub const INCONSISTENT_CONSTRUCT: &str =
        "new static() requires {0} to declare a consistent constructor";
    pub const UNBOUND_CLASS_NAME: &str = "Unbound class name {0}";
    pub const PRIVATE_DYNAMIC_ACCESS: &str =
        "The private member {0} cannot be verified through a dynamic receiver";
    pub const ARITY_MISMATCH: &str = "This call expects {0} argument(s) but got {1}";
    pub const NOT_CALLABLE: &str = "This expression of type {0} is not callable";
    pub const NULLSAFE_WRITE: &str =
        "The nullsafe access {0} cannot be used as an assignment target";
}

/// Fill `{i}` placeholders in a message template.
pub fn format_message(message: &str, args: &[&str]) -> String {
    let mut result = message.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

// =============================================================================
// Sink
// =============================================================================

/// Append-only diagnostic sink.
///
/// Muting exists for the finally-block union pass: the pass is checked once
/// for effect with diagnostics discarded, then re-checked per continuation
/// with diagnostics kept.
#[derive(Default)]
pub struct DiagnosticSink {
    diags: RefCell<Vec<Diagnostic>>,
    muted: Cell<u32>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diag: Diagnostic) {
        if self.muted.get() == 0 {
            self.diags.borrow_mut().push(diag);
        }
    }

    /// Run `f` with reporting suppressed. Nests.
    pub fn muted<R>(&self, f: impl FnOnce() -> R) -> R {
        self.muted.set(self.muted.get() + 1);
        let result = f();
        self.muted.set(self.muted.get() - 1);
        result
    }

    pub fn len(&self) -> usize {
        self.diags.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.diags.borrow().is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diags.into_inner()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diags.borrow().clone()
    }

    /// True if any reported diagnostic carries `code`.
    pub fn has_code(&self, code: u32) -> bool {
        self.diags.borrow().iter().any(|d| d.code == code)
    }
}
