//! Member resolution: `recv->member`, `recv?->member`, `Cls::member`.
//!
//! Structural recursion over the expanded receiver type. Every failing case
//! still produces a type so the surrounding expression stays well-typed:
//! semantic failures report to the sink and substitute the error or dynamic
//! type, and receiver-shape failures additionally surface an
//! `(actual, expected)` hole the caller attaches to the typed tree.

use crate::context::Checker;
use rustc_hash::FxHashSet;
use tracing::trace;
use vesta_ast::LocalId;
use vesta_common::diagnostics::{diagnostic_codes, diagnostic_messages};
use vesta_common::{Atom, Pos};
use vesta_solver::{
    ClassElt, DependentKind, HasMember, PrimKind, Subst, TypeHole, TypeId, TypeKey, Visibility,
    instantiate,
};

/// Parameters of one member access.
#[derive(Clone, Debug)]
pub struct MemberAccess {
    pub is_method: bool,
    pub nullsafe: bool,
    pub write_ctx: bool,
    /// Resolve against the static member tables (`Cls::member`).
    pub static_member: bool,
    /// The access went through a literal class name (`C::m`), which is what
    /// makes calling an abstract member unsound.
    pub via_class_name: bool,
    /// Explicit type arguments at the call site. Folded member entries are
    /// monomorphic, so these are currently only traced.
    pub targs: Vec<TypeId>,
    pub pos: Pos,
}

impl MemberAccess {
    pub fn read(pos: Pos) -> Self {
        MemberAccess {
            is_method: false,
            nullsafe: false,
            write_ctx: false,
            static_member: false,
            via_class_name: false,
            targs: Vec::new(),
            pos,
        }
    }

    pub fn method(pos: Pos) -> Self {
        MemberAccess {
            is_method: true,
            ..Self::read(pos)
        }
    }

    pub fn nullsafe(mut self) -> Self {
        self.nullsafe = true;
        self
    }

    pub fn write(mut self) -> Self {
        self.write_ctx = true;
        self
    }

    pub fn static_member(mut self) -> Self {
        self.static_member = true;
        self
    }

    pub fn via_class_name(mut self) -> Self {
        self.via_class_name = true;
        self
    }

    pub fn with_targs(mut self, targs: Vec<TypeId>) -> Self {
        self.targs = targs;
        self
    }
}

/// Outcome of a resolution. `missing` marks "member not found" so union
/// receivers can drop the component; `suppressed` marks components whose
/// declaring class is not fully known and must fail silently.
#[derive(Clone, Debug)]
pub struct MemberResolution {
    pub ty: TypeId,
    pub hole: Option<TypeHole>,
    pub missing: bool,
    pub suppressed: bool,
}

impl MemberResolution {
    fn found(ty: TypeId) -> Self {
        MemberResolution {
            ty,
            hole: None,
            missing: false,
            suppressed: false,
        }
    }

    fn not_found(ty: TypeId, suppressed: bool) -> Self {
        MemberResolution {
            ty,
            hole: None,
            missing: true,
            suppressed,
        }
    }
}

impl Checker<'_> {
    /// Resolve `recv->name` (or `recv::name`): the engine's entry point.
    pub fn resolve_member(
        &mut self,
        recv: TypeId,
        name: Atom,
        acc: &MemberAccess,
    ) -> MemberResolution {
        let recv = self.tyvars.expand(self.ctx.types, recv);
        if !acc.targs.is_empty() {
            trace!(member = %name, "explicit type arguments on folded member; ignored");
        }
        let mut visiting = FxHashSet::default();
        let mut result = self.resolve_member_on(recv, name, acc, None, &mut visiting);
        if result.missing && result.suppressed {
            // A silently-missing member behaves like dynamic so checking
            // continues without cascading.
            result.ty = TypeId::DYNAMIC;
        }
        result
    }

    fn resolve_member_on(
        &mut self,
        recv: TypeId,
        name: Atom,
        acc: &MemberAccess,
        this_override: Option<TypeId>,
        visiting: &mut FxHashSet<Atom>,
    ) -> MemberResolution {
        match self.ctx.types.key(recv) {
            TypeKey::Prim(PrimKind::Err) => MemberResolution::found(TypeId::ERR),
            TypeKey::Prim(PrimKind::Nothing) => MemberResolution::found(TypeId::NOTHING),
            TypeKey::Prim(PrimKind::Dynamic) => self.resolve_on_dynamic(name, acc),
            TypeKey::Prim(PrimKind::Null) => {
                self.resolve_on_nullable(recv, TypeId::NOTHING, name, acc, visiting)
            }
            TypeKey::Nullable(inner) => {
                self.resolve_on_nullable(recv, inner, name, acc, visiting)
            }
            TypeKey::Union(list) => {
                let members = self.ctx.types.list(list);
                self.resolve_on_union(&members, name, acc, this_override, visiting)
            }
            TypeKey::Intersection(list) => {
                let members = self.ctx.types.list(list);
                self.resolve_on_intersection(recv, &members, name, acc, this_override, visiting)
            }
            // Aliases are transparent to member access.
            TypeKey::Newtype(_, under) => {
                self.resolve_member_on(under, name, acc, this_override, visiting)
            }
            // `this` resolves through its class but keeps itself as the
            // receiver, so dependent return types stay precise.
            TypeKey::Dependent(DependentKind::This, under) => {
                let this_override = Some(this_override.unwrap_or(recv));
                self.resolve_member_on(under, name, acc, this_override, visiting)
            }
            TypeKey::Generic(gname, _) => {
                self.resolve_on_generic(recv, gname, name, acc, this_override, visiting)
            }
            TypeKey::Var(var) => match self.tyvars.resolved(var) {
                Some(resolved) => {
                    self.resolve_member_on(resolved, name, acc, this_override, visiting)
                }
                None => {
                    // Defer: the variable's eventual type must expose the
                    // member; the member's type is a fresh variable.
                    let member_ty = self.tyvars.fresh(self.ctx.types, acc.pos);
                    self.tyvars.add_has_member(var, HasMember {
                        name,
                        member_ty,
                        is_method: acc.is_method,
                        nullsafe: acc.nullsafe,
                        pos: acc.pos,
                    });
                    MemberResolution::found(member_ty)
                }
            },
            TypeKey::Class { name: cname, args, .. } => {
                let args = self.ctx.types.list(args);
                self.resolve_on_class(recv, cname, &args, name, acc, this_override)
            }
            TypeKey::Prim(_) | TypeKey::Fun(_) => {
                let shown = self.ctx.types.display(recv);
                self.error_at(
                    acc.pos,
                    diagnostic_codes::NON_OBJECT_MEMBER_ACCESS,
                    diagnostic_messages::NON_OBJECT_MEMBER_ACCESS,
                    &[name.as_str(), &shown],
                );
                MemberResolution::found(TypeId::ERR)
            }
        }
    }

    // =========================================================================
    // Dynamic receivers
    // =========================================================================

    fn resolve_on_dynamic(&mut self, name: Atom, acc: &MemberAccess) -> MemberResolution {
        // A private member reached through dynamic bypasses the static
        // visibility story; it is only sound if the member's own type is
        // dynamic-compatible.
        if let Some(self_name) = self.ctx.self_class
            && let Some(def) = self.ctx.decls.get_class(self_name)
            && let Some(elt) = def.member(name, acc.is_method, acc.static_member)
            && elt.visibility == Visibility::Private
            && elt.origin == self_name
            && !self.supports_dynamic(elt.ty)
        {
            self.warning_at(
                acc.pos,
                diagnostic_codes::PRIVATE_DYNAMIC_ACCESS,
                diagnostic_messages::PRIVATE_DYNAMIC_ACCESS,
                &[name.as_str()],
            );
        }
        MemberResolution::found(TypeId::DYNAMIC)
    }

    fn supports_dynamic(&self, ty: TypeId) -> bool {
        match self.ctx.types.key(ty) {
            TypeKey::Prim(PrimKind::Mixed) => false,
            TypeKey::Prim(_) | TypeKey::Class { .. } | TypeKey::Newtype(..) => true,
            TypeKey::Nullable(inner) => self.supports_dynamic(inner),
            TypeKey::Union(list) | TypeKey::Intersection(list) => self
                .ctx
                .types
                .list(list)
                .iter()
                .all(|&m| self.supports_dynamic(m)),
            TypeKey::Fun(id) => {
                let fun = self.ctx.types.fun_type(id);
                fun.params.iter().all(|&p| self.supports_dynamic(p))
                    && self.supports_dynamic(fun.ret)
            }
            TypeKey::Dependent(_, under) => self.supports_dynamic(under),
            TypeKey::Generic(..) | TypeKey::Var(_) => false,
        }
    }

    // =========================================================================
    // Nullable receivers
    // =========================================================================

    fn resolve_on_nullable(
        &mut self,
        recv: TypeId,
        inner: TypeId,
        name: Atom,
        acc: &MemberAccess,
        visiting: &mut FxHashSet<Atom>,
    ) -> MemberResolution {
        if acc.nullsafe {
            if acc.write_ctx {
                // `?->` short-circuits, so there is no place for the written
                // value to go on the null path.
                self.error_at(
                    acc.pos,
                    diagnostic_codes::NULLSAFE_WRITE,
                    diagnostic_messages::NULLSAFE_WRITE,
                    &[name.as_str()],
                );
            }
            let mut result = self.resolve_member_on(inner, name, acc, None, visiting);
            result.ty = self.ctx.types.nullable(result.ty);
            return result;
        }
        // Diagnosed, but checking continues into the non-null part; the
        // hole records that the receiver was expected nonnull.
        self.error_at(
            acc.pos,
            diagnostic_codes::NULL_MEMBER_ACCESS,
            diagnostic_messages::NULL_MEMBER_ACCESS,
            &[name.as_str()],
        );
        let mut result = self.resolve_member_on(inner, name, acc, None, visiting);
        if result.hole.is_none() {
            result.hole = Some(TypeHole {
                actual: recv,
                expected: TypeId::NONNULL,
            });
        }
        result
    }

    // =========================================================================
    // Union receivers
    // =========================================================================

    fn resolve_on_union(
        &mut self,
        members: &[TypeId],
        name: Atom,
        acc: &MemberAccess,
        this_override: Option<TypeId>,
        visiting: &mut FxHashSet<Atom>,
    ) -> MemberResolution {
        let mut tys = Vec::with_capacity(members.len());
        let mut holes: Vec<TypeHole> = Vec::new();
        let mut any_found = false;
        let mut all_suppressed = true;

        for &member in members {
            let result = self.resolve_member_on(member, name, acc, this_override, visiting);
            if result.missing {
                // A component from a not-fully-known declaration fails
                // silently and simply contributes nothing.
                all_suppressed &= result.suppressed;
                continue;
            }
            any_found = true;
            tys.push(result.ty);
            if let Some(hole) = result.hole {
                holes.push(hole);
            }
        }

        if !any_found {
            let ty = if all_suppressed { TypeId::DYNAMIC } else { TypeId::ERR };
            return MemberResolution::not_found(ty, all_suppressed);
        }

        let ty = self.ctx.types.union(tys);
        // Component errors combine the same way the member types do.
        let hole = if holes.is_empty() {
            None
        } else {
            let actuals = holes.iter().map(|h| h.actual).collect();
            let expecteds = holes.iter().map(|h| h.expected).collect();
            Some(TypeHole {
                actual: self.ctx.types.union(actuals),
                expected: self.ctx.types.union(expecteds),
            })
        };
        MemberResolution {
            ty,
            hole,
            missing: false,
            suppressed: false,
        }
    }

    // =========================================================================
    // Intersection receivers
    // =========================================================================

    fn resolve_on_intersection(
        &mut self,
        recv: TypeId,
        members: &[TypeId],
        name: Atom,
        acc: &MemberAccess,
        this_override: Option<TypeId>,
        visiting: &mut FxHashSet<Atom>,
    ) -> MemberResolution {
        // First pass (muted probes): which components declare the member at
        // all? Success of any one suffices.
        let sink = self.ctx.sink;
        let mut declaring = Vec::new();
        for &member in members {
            let probe =
                sink.muted(|| self.resolve_member_on(member, name, acc, this_override, visiting));
            if !probe.missing {
                declaring.push(member);
            }
        }

        if declaring.is_empty() {
            // Ordered fallback: surface the first component's failure for a
            // concrete message.
            return self.resolve_member_on(members[0], name, acc, this_override, visiting);
        }

        // Second pass, diagnostics kept. The receiver each component sees
        // as `this` is the whole, un-decomposed intersection, so members
        // whose declared type mentions the receiver covariantly keep their
        // dependent-type precision.
        let this_for_members = Some(this_override.unwrap_or(recv));
        let mut tys = Vec::with_capacity(declaring.len());
        let mut hole = None;
        for member in declaring {
            let result = self.resolve_member_on(member, name, acc, this_for_members, visiting);
            tys.push(result.ty);
            if hole.is_none() {
                hole = result.hole;
            }
        }
        MemberResolution {
            ty: self.ctx.types.intersection(tys),
            hole,
            missing: false,
            suppressed: false,
        }
    }

    // =========================================================================
    // Generic receivers
    // =========================================================================

    fn resolve_on_generic(
        &mut self,
        recv: TypeId,
        gname: Atom,
        name: Atom,
        acc: &MemberAccess,
        this_override: Option<TypeId>,
        visiting: &mut FxHashSet<Atom>,
    ) -> MemberResolution {
        let Some(bounds) = self.ctx.tparams.get(&gname).cloned() else {
            let shown = self.ctx.types.display(recv);
            self.error_at(
                acc.pos,
                diagnostic_codes::NON_OBJECT_MEMBER_ACCESS,
                diagnostic_messages::NON_OBJECT_MEMBER_ACCESS,
                &[name.as_str(), &shown],
            );
            return MemberResolution::found(TypeId::ERR);
        };
        if bounds.is_empty() {
            let shown = self.ctx.types.display(recv);
            self.error_at(
                acc.pos,
                diagnostic_codes::NON_OBJECT_MEMBER_ACCESS,
                diagnostic_messages::NON_OBJECT_MEMBER_ACCESS,
                &[name.as_str(), &shown],
            );
            return MemberResolution::found(TypeId::ERR);
        }
        if !visiting.insert(gname) {
            // Self-referential bound: recursing would not terminate.
            // Register a has-member obligation against a fresh variable
            // standing for the expansion instead.
            trace!(generic = %gname, member = %name, "self-referential bound; deferring");
            let var = self.tyvars.fresh_id(acc.pos);
            let member_ty = self.tyvars.fresh(self.ctx.types, acc.pos);
            self.tyvars.add_has_member(var, HasMember {
                name,
                member_ty,
                is_method: acc.is_method,
                nullsafe: acc.nullsafe,
                pos: acc.pos,
            });
            return MemberResolution::found(member_ty);
        }
        let bound = self.ctx.types.intersection(bounds);
        let result = self.resolve_member_on(bound, name, acc, this_override, visiting);
        visiting.remove(&gname);
        result
    }

    // =========================================================================
    // Class receivers
    // =========================================================================

    fn resolve_on_class(
        &mut self,
        recv: TypeId,
        cname: Atom,
        targs: &[TypeId],
        name: Atom,
        acc: &MemberAccess,
        this_override: Option<TypeId>,
    ) -> MemberResolution {
        let Some(def) = self.ctx.decls.get_class(cname) else {
            // The class failed to load; member knowledge is incomplete.
            return MemberResolution::not_found(TypeId::DYNAMIC, true);
        };

        let elt = self
            .self_shadowing_member(&def, name, acc)
            .or_else(|| def.member(name, acc.is_method, acc.static_member).cloned())
            .or_else(|| {
                // `parent::__construct(...)` is the one legal direct
                // constructor call; everything else goes through `new`.
                (name == Atom::new("__construct") && acc.static_member && !acc.via_class_name)
                    .then(|| def.construct.clone())
                    .flatten()
            });

        let Some(elt) = elt else {
            if acc.is_method && name == Atom::new("__clone") {
                // Every object can be cloned.
                return MemberResolution::found(self.ctx.types.fun(vec![], TypeId::VOID));
            }
            if name == Atom::new("__construct") {
                self.error_at(
                    acc.pos,
                    diagnostic_codes::CONSTRUCT_CALLED_DIRECTLY,
                    diagnostic_messages::CONSTRUCT_CALLED_DIRECTLY,
                    &[cname.as_str()],
                );
                return MemberResolution::found(TypeId::ERR);
            }
            if !def.members_fully_known {
                return MemberResolution::not_found(TypeId::DYNAMIC, true);
            }
            let shown = self.ctx.types.display(recv);
            self.error_at(
                acc.pos,
                diagnostic_codes::MEMBER_NOT_FOUND,
                diagnostic_messages::MEMBER_NOT_FOUND,
                &[name.as_str(), &shown],
            );
            return MemberResolution::not_found(TypeId::ERR, false);
        };

        if elt.is_abstract() && acc.static_member && acc.via_class_name {
            self.error_at(
                acc.pos,
                diagnostic_codes::ABSTRACT_MEMBER_CALL,
                diagnostic_messages::ABSTRACT_MEMBER_CALL,
                &[name.as_str(), cname.as_str()],
            );
        }

        self.check_visibility(&elt, name, acc);

        if let Some(note) = &elt.deprecated {
            self.warning_at(
                acc.pos,
                diagnostic_codes::DEPRECATED_MEMBER,
                diagnostic_messages::DEPRECATED_MEMBER,
                &[name.as_str(), note],
            );
        }

        // Instantiate the declared type: class type parameters get the
        // receiver's arguments, `this` gets the receiver itself.
        let mut subst = Subst::with_this(this_override.unwrap_or(recv));
        for (i, tp) in def.tparams.iter().enumerate() {
            let arg = targs.get(i).copied().unwrap_or(TypeId::DYNAMIC);
            subst.bind(tp.name, arg);
        }
        let ty = instantiate(self.ctx.types, elt.ty, &subst);
        MemberResolution::found(ty)
    }

    /// A private member declared directly in the lexically enclosing class
    /// shadows an inherited member of the same name, provided the enclosing
    /// class is an ancestor of the receiver.
    fn self_shadowing_member(
        &self,
        receiver_def: &vesta_solver::ClassDef,
        name: Atom,
        acc: &MemberAccess,
    ) -> Option<ClassElt> {
        let self_name = self.ctx.self_class?;
        if self_name == receiver_def.name || !receiver_def.has_ancestor(self_name) {
            return None;
        }
        let self_def = self.ctx.decls.get_class(self_name)?;
        let elt = self_def.member(name, acc.is_method, acc.static_member)?;
        (elt.visibility == Visibility::Private && elt.origin == self_name).then(|| elt.clone())
    }

    fn check_visibility(&mut self, elt: &ClassElt, name: Atom, acc: &MemberAccess) {
        match elt.visibility {
            Visibility::Public => {}
            Visibility::Private => {
                if self.ctx.self_class != Some(elt.origin) {
                    self.error_at(
                        acc.pos,
                        diagnostic_codes::MEMBER_NOT_ACCESSIBLE,
                        diagnostic_messages::MEMBER_NOT_ACCESSIBLE,
                        &[name.as_str(), "private", elt.origin.as_str()],
                    );
                }
            }
            Visibility::Protected => {
                let related = self.ctx.self_class.is_some_and(|self_name| {
                    if self_name == elt.origin {
                        return true;
                    }
                    let decls = self.ctx.decls;
                    decls
                        .get_class(self_name)
                        .is_some_and(|d| d.has_ancestor(elt.origin))
                        || decls
                            .get_class(elt.origin)
                            .is_some_and(|d| d.has_ancestor(self_name))
                });
                if !related {
                    self.error_at(
                        acc.pos,
                        diagnostic_codes::MEMBER_NOT_ACCESSIBLE,
                        diagnostic_messages::MEMBER_NOT_ACCESSIBLE,
                        &[name.as_str(), "protected", elt.origin.as_str()],
                    );
                }
            }
        }
    }

    /// Build a refinement key for a (non-nullsafe) property chain rooted at
    /// a local: `$x->p->q`.
    pub(crate) fn fake_member_key(&self, e: &vesta_ast::Expr) -> Option<crate::refinement::FakeMemberKey> {
        fn walk(e: &vesta_ast::Expr, chain: &mut Vec<Atom>) -> Option<LocalId> {
            match &e.kind {
                vesta_ast::ExprKind::Lvar(id) => Some(*id),
                vesta_ast::ExprKind::ObjGet {
                    recv,
                    member,
                    nullsafe: false,
                } => {
                    let root = walk(recv, chain)?;
                    chain.push(*member);
                    Some(root)
                }
                _ => None,
            }
        }
        let mut chain = Vec::new();
        let root = walk(e, &mut chain)?;
        if chain.is_empty() {
            return None;
        }
        Some(crate::refinement::FakeMemberKey::new(root, chain))
    }
}
