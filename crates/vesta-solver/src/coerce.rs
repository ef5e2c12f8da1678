//! Coercion to an enforced (expected) type.
//!
//! Coercion is subtyping plus the gradual escape hatch; on failure the caller
//! receives an `(actual, expected)` pair to attach to the typed tree as an
//! explicit hole, so downstream passes know precision was lost at that node.

use crate::decl::DeclProvider;
use crate::intern::TypeInterner;
use crate::subtype::Subtyper;
use crate::types::TypeId;

/// A coercion failure: the node keeps checking at `expected`, but the typed
/// tree records that `actual` did not actually conform.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TypeHole {
    pub actual: TypeId,
    pub expected: TypeId,
}

/// Coerce `from` to the enforced type `to`. `Ok` carries the type checking
/// continues with.
pub fn coerce(
    types: &TypeInterner,
    decls: &dyn DeclProvider,
    from: TypeId,
    to: TypeId,
) -> Result<TypeId, TypeHole> {
    if Subtyper::new(types, decls).is_subtype(from, to) {
        Ok(to)
    } else {
        Err(TypeHole {
            actual: from,
            expected: to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::DeclStore;

    #[test]
    fn failure_reports_both_sides() {
        let types = TypeInterner::new();
        let decls = DeclStore::new();
        assert_eq!(coerce(&types, &decls, TypeId::INT, TypeId::INT), Ok(TypeId::INT));
        assert_eq!(
            coerce(&types, &decls, TypeId::STRING, TypeId::INT),
            Err(TypeHole {
                actual: TypeId::STRING,
                expected: TypeId::INT,
            })
        );
        // dynamic coerces everywhere
        assert!(coerce(&types, &decls, TypeId::DYNAMIC, TypeId::INT).is_ok());
    }
}
