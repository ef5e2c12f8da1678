//! Localization of surface type hints into solver types.

use crate::context::Checker;
use vesta_ast::Hint;
use vesta_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use vesta_common::Pos;
use vesta_solver::{Exactness, TypeId};

impl Checker<'_> {
    /// Turn a declared hint into a type in the current scope. Unknown names
    /// are diagnosed and become `dynamic` so checking continues.
    pub(crate) fn localize_hint(&mut self, hint: &Hint, pos: Pos) -> TypeId {
        let types = self.ctx.types;
        match hint {
            Hint::Int => TypeId::INT,
            Hint::Float => TypeId::FLOAT,
            Hint::Bool => TypeId::BOOL,
            Hint::Str => TypeId::STRING,
            Hint::Void => TypeId::VOID,
            Hint::Mixed => TypeId::MIXED,
            Hint::Nonnull => TypeId::NONNULL,
            Hint::Dynamic => TypeId::DYNAMIC,
            Hint::Nothing => TypeId::NOTHING,
            Hint::Null => TypeId::NULL,
            Hint::This => match self.self_class_ty(Exactness::Nonexact) {
                Some(cls) => types.this_under(cls),
                None => TypeId::DYNAMIC,
            },
            Hint::Nullable(inner) => {
                let inner = self.localize_hint(inner, pos);
                types.nullable(inner)
            }
            Hint::Apply(name, args) => {
                let arg_tys: Vec<TypeId> =
                    args.iter().map(|a| self.localize_hint(a, pos)).collect();
                if self.ctx.tparams.contains_key(name) {
                    return types.generic(*name, arg_tys);
                }
                match self.ctx.decls.get_class(*name) {
                    Some(def) => {
                        // Unspecified type arguments degrade to dynamic.
                        let mut arg_tys = arg_tys;
                        while arg_tys.len() < def.tparams.len() {
                            arg_tys.push(TypeId::DYNAMIC);
                        }
                        types.class(*name, Exactness::Nonexact, arg_tys)
                    }
                    None => {
                        self.error_at(
                            pos,
                            diagnostic_codes::UNBOUND_CLASS_NAME,
                            diagnostic_messages::UNBOUND_CLASS_NAME,
                            &[name.as_str()],
                        );
                        TypeId::DYNAMIC
                    }
                }
            }
        }
    }
}
