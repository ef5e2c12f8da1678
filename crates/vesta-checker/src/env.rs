//! Continuation-indexed local environments.
//!
//! The environment maps every reachable control-flow exit of the statement
//! being checked (`Next`, `Break`, `Continue`, ...) to a snapshot of local
//! bindings plus the refinements valid on that path. Snapshots are
//! structurally shared (`Rc` copy-on-write), so branch checking clones the
//! map, mutates its own copy, and merging never touches its inputs.

use crate::refinement::{FakeMemberKey, FakeMembers};
use rustc_hash::FxHashMap;
use std::rc::Rc;
use vesta_ast::LocalId;
use vesta_common::Pos;
use vesta_solver::{TypeId, TypeInterner};

/// Expression-id of a local binding. Bumped on every rebind; refinements
/// remember the eid of their root and die when it changes.
pub type Eid = u64;

/// Named control-flow exits from the statement being checked.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContKey {
    Next,
    Continue,
    Break,
    Catch,
    Finally,
    Exit,
    Fallthrough,
}

impl ContKey {
    pub const ALL: [ContKey; 7] = [
        ContKey::Next,
        ContKey::Continue,
        ContKey::Break,
        ContKey::Catch,
        ContKey::Finally,
        ContKey::Exit,
        ContKey::Fallthrough,
    ];

    const fn index(self) -> usize {
        match self {
            ContKey::Next => 0,
            ContKey::Continue => 1,
            ContKey::Break => 2,
            ContKey::Catch => 3,
            ContKey::Finally => 4,
            ContKey::Exit => 5,
            ContKey::Fallthrough => 6,
        }
    }
}

/// One local binding on one path.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Local {
    pub ty: TypeId,
    pub pos: Pos,
    pub eid: Eid,
    /// False when the local was bound on only some of the merged paths.
    pub defined: bool,
}

/// Bindings and refinements for one continuation.
#[derive(Clone, Debug, Default)]
pub struct PerContEntry {
    pub locals: Rc<FxHashMap<LocalId, Local>>,
    pub fakes: FakeMembers,
}

impl PerContEntry {
    fn locals_mut(&mut self) -> &mut FxHashMap<LocalId, Local> {
        Rc::make_mut(&mut self.locals)
    }
}

/// The per-continuation map. Cheap to clone; all heavy payloads are behind
/// `Rc`.
#[derive(Clone, Debug, Default)]
pub struct ContMap {
    entries: [Option<PerContEntry>; 7],
}

impl ContMap {
    pub fn get(&self, key: ContKey) -> Option<&PerContEntry> {
        self.entries[key.index()].as_ref()
    }

    pub fn get_mut(&mut self, key: ContKey) -> Option<&mut PerContEntry> {
        self.entries[key.index()].as_mut()
    }

    pub fn set(&mut self, key: ContKey, entry: PerContEntry) {
        self.entries[key.index()] = Some(entry);
    }

    pub fn set_opt(&mut self, key: ContKey, entry: Option<PerContEntry>) {
        self.entries[key.index()] = entry;
    }

    pub fn remove(&mut self, key: ContKey) -> Option<PerContEntry> {
        self.entries[key.index()].take()
    }

    pub fn has(&self, key: ContKey) -> bool {
        self.entries[key.index()].is_some()
    }
}

/// Result of a local lookup; the checker turns the non-`Bound` cases into
/// recoverable diagnostics.
#[derive(Clone, Debug)]
pub enum LocalLookup {
    Bound(Local),
    PossiblyUnset(Local),
    Unbound,
}

/// The full environment for one function-body check.
#[derive(Clone, Debug)]
pub struct LocalEnv {
    pub conts: ContMap,
    next_eid: Eid,
}

impl LocalEnv {
    /// Seed a fresh environment from parameter bindings: a single `Next`
    /// continuation, nothing else.
    pub fn begin(params: impl IntoIterator<Item = (LocalId, TypeId, Pos)>) -> LocalEnv {
        let mut env = LocalEnv {
            conts: ContMap::default(),
            next_eid: 0,
        };
        let mut entry = PerContEntry::default();
        {
            let locals = entry.locals_mut();
            for (id, ty, pos) in params {
                let eid = env.next_eid;
                env.next_eid += 1;
                locals.insert(id, Local {
                    ty,
                    pos,
                    eid,
                    defined: true,
                });
            }
        }
        env.conts.set(ContKey::Next, entry);
        env
    }

    pub fn fresh_eid(&mut self) -> Eid {
        let eid = self.next_eid;
        self.next_eid += 1;
        eid
    }

    pub fn has_next(&self) -> bool {
        self.conts.has(ContKey::Next)
    }

    /// Look up a local in `Next`.
    pub fn get_local(&self, id: LocalId) -> LocalLookup {
        let Some(entry) = self.conts.get(ContKey::Next) else {
            return LocalLookup::Unbound;
        };
        match entry.locals.get(&id) {
            Some(local) if local.defined => LocalLookup::Bound(*local),
            Some(local) => LocalLookup::PossiblyUnset(*local),
            None => LocalLookup::Unbound,
        }
    }

    /// Rebind a local in `Next`, bumping its eid (which invalidates
    /// refinements rooted at it). No-op when `Next` is gone.
    pub fn set_local(&mut self, id: LocalId, ty: TypeId, pos: Pos) {
        let eid = self.fresh_eid();
        let Some(entry) = self.conts.get_mut(ContKey::Next) else {
            return;
        };
        entry.locals_mut().insert(id, Local {
            ty,
            pos,
            eid,
            defined: true,
        });
        entry.fakes.forget_rooted_at(id);
    }

    /// Narrow a local's type without bumping its eid: the value has not
    /// changed, so refinements rooted at it stay valid.
    pub fn refine_local(&mut self, id: LocalId, ty: TypeId) {
        let Some(entry) = self.conts.get_mut(ContKey::Next) else {
            return;
        };
        let locals = entry.locals_mut();
        if let Some(local) = locals.get_mut(&id) {
            local.ty = ty;
        }
    }

    pub fn local_eid(&self, id: LocalId) -> Option<Eid> {
        self.conts
            .get(ContKey::Next)?
            .locals
            .get(&id)
            .map(|l| l.eid)
    }

    pub fn get_fake(&self, key: &FakeMemberKey) -> Option<TypeId> {
        let entry = self.conts.get(ContKey::Next)?;
        let root_eid = entry.locals.get(&key.root)?.eid;
        entry.fakes.get(key, root_eid)
    }

    pub fn set_fake(&mut self, key: FakeMemberKey, ty: TypeId) {
        let Some(root_eid) = self.local_eid(key.root) else {
            return;
        };
        if let Some(entry) = self.conts.get_mut(ContKey::Next) {
            entry.fakes.add(key, ty, root_eid);
        }
    }

    /// A call may have arbitrary effects on anything a refinement talks
    /// about; drop them all.
    pub fn forget_fakes_after_call(&mut self) {
        if let Some(entry) = self.conts.get_mut(ContKey::Next) {
            entry.fakes.forget_all();
        }
    }

    /// Move `Next` onto `target` (joining with anything already there).
    /// Used by `break`/`continue`/`return`/`throw`.
    pub fn move_to(&mut self, types: &TypeInterner, target: ContKey) {
        let Some(next) = self.conts.remove(ContKey::Next) else {
            return;
        };
        self.join_into(types, target, next);
    }

    /// Join `Next` into `target` while keeping `Next` live (a throw point
    /// inside a try body contributes to `Catch` but execution continues).
    pub fn save_into(&mut self, types: &TypeInterner, target: ContKey) {
        let Some(next) = self.conts.get(ContKey::Next).cloned() else {
            return;
        };
        self.join_into(types, target, next);
    }

    fn join_into(&mut self, types: &TypeInterner, target: ContKey, entry: PerContEntry) {
        let joined = match self.conts.remove(target) {
            Some(existing) => self.join_entries(types, &existing, &entry),
            None => entry,
        };
        self.conts.set(target, joined);
    }

    /// Merge `source` into `Next` (end of a loop: `Break` rejoins the fall
    /// through path). When `Next` is gone the source becomes `Next`.
    pub fn merge_cont_into_next(&mut self, types: &TypeInterner, source: ContKey) {
        let Some(source_entry) = self.conts.remove(source) else {
            return;
        };
        let joined = match self.conts.remove(ContKey::Next) {
            Some(next) => self.join_entries(types, &next, &source_entry),
            None => source_entry,
        };
        self.conts.set(ContKey::Next, joined);
    }

    /// Per-local union join of two continuation snapshots. A local present
    /// on only one side is kept but marked possibly-unset. Joining an entry
    /// with itself returns an identical entry.
    pub fn join_entries(
        &mut self,
        types: &TypeInterner,
        a: &PerContEntry,
        b: &PerContEntry,
    ) -> PerContEntry {
        if Rc::ptr_eq(&a.locals, &b.locals) && a.fakes.same_as(&b.fakes) {
            return a.clone();
        }
        let mut locals: FxHashMap<LocalId, Local> = FxHashMap::default();
        for (&id, local_a) in a.locals.iter() {
            match b.locals.get(&id) {
                Some(local_b) => {
                    let ty = types.union(vec![local_a.ty, local_b.ty]);
                    let eid = if local_a.eid == local_b.eid {
                        local_a.eid
                    } else {
                        self.fresh_eid()
                    };
                    locals.insert(id, Local {
                        ty,
                        pos: local_a.pos,
                        eid,
                        defined: local_a.defined && local_b.defined,
                    });
                }
                None => {
                    locals.insert(id, Local {
                        defined: false,
                        ..*local_a
                    });
                }
            }
        }
        for (&id, local_b) in b.locals.iter() {
            if !a.locals.contains_key(&id) {
                locals.insert(id, Local {
                    defined: false,
                    ..*local_b
                });
            }
        }
        let fakes = FakeMembers::join(types, &a.fakes, &b.fakes, &locals);
        PerContEntry {
            locals: Rc::new(locals),
            fakes,
        }
    }

    /// Merge two whole continuation maps (after checking the two arms of a
    /// branch): per key, join when both sides have an entry, keep the live
    /// side otherwise.
    pub fn merge_cont_maps(&mut self, types: &TypeInterner, a: ContMap, b: ContMap) -> ContMap {
        let mut out = ContMap::default();
        for key in ContKey::ALL {
            let merged = match (a.get(key), b.get(key)) {
                (Some(ea), Some(eb)) => Some(self.join_entries(types, ea, eb)),
                (Some(ea), None) => Some(ea.clone()),
                (None, Some(eb)) => Some(eb.clone()),
                (None, None) => None,
            };
            out.set_opt(key, merged);
        }
        out
    }

    /// Run `f` with the listed continuations stashed; whatever `f` does to
    /// them is discarded and the stashed entries restored afterwards.
    pub fn stash_and_restore<R>(
        &mut self,
        conts: &[ContKey],
        f: impl FnOnce(&mut LocalEnv) -> R,
    ) -> R {
        let saved: Vec<(ContKey, Option<PerContEntry>)> = conts
            .iter()
            .map(|&key| (key, self.conts.remove(key)))
            .collect();
        let result = f(self);
        for (key, entry) in saved {
            self.conts.set_opt(key, entry);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_common::Atom;

    fn local(n: u32, name: &str) -> LocalId {
        LocalId(n, Atom::new(name))
    }

    #[test]
    fn begin_seeds_next_only() {
        let env = LocalEnv::begin([(local(0, "a"), TypeId::INT, Pos::NONE)]);
        assert!(env.has_next());
        assert!(!env.conts.has(ContKey::Break));
        assert!(matches!(
            env.get_local(local(0, "a")),
            LocalLookup::Bound(Local { ty: TypeId::INT, .. })
        ));
    }

    #[test]
    fn join_is_idempotent() {
        let types = TypeInterner::new();
        let mut env = LocalEnv::begin([(local(0, "a"), TypeId::INT, Pos::NONE)]);
        let entry = env.conts.get(ContKey::Next).unwrap().clone();
        let joined = env.join_entries(&types, &entry, &entry);
        let a = joined.locals.get(&local(0, "a")).unwrap();
        assert_eq!(a.ty, TypeId::INT);
        assert!(a.defined);
        assert_eq!(a.eid, entry.locals.get(&local(0, "a")).unwrap().eid);
    }

    #[test]
    fn join_unions_types_and_tracks_possibly_unset() {
        let types = TypeInterner::new();
        let x = local(0, "x");
        let y = local(1, "y");
        let mut env = LocalEnv::begin([]);

        let mut a = PerContEntry::default();
        a.locals_mut().insert(x, Local {
            ty: TypeId::INT,
            pos: Pos::NONE,
            eid: env.fresh_eid(),
            defined: true,
        });
        a.locals_mut().insert(y, Local {
            ty: TypeId::BOOL,
            pos: Pos::NONE,
            eid: env.fresh_eid(),
            defined: true,
        });
        let mut b = PerContEntry::default();
        b.locals_mut().insert(x, Local {
            ty: TypeId::STRING,
            pos: Pos::NONE,
            eid: env.fresh_eid(),
            defined: true,
        });

        let joined = env.join_entries(&types, &a, &b);
        assert_eq!(
            joined.locals.get(&x).unwrap().ty,
            types.union(vec![TypeId::INT, TypeId::STRING])
        );
        assert!(joined.locals.get(&x).unwrap().defined);
        assert!(!joined.locals.get(&y).unwrap().defined, "one-sided local is possibly unset");
    }

    #[test]
    fn set_local_bumps_eid() {
        let x = local(0, "x");
        let mut env = LocalEnv::begin([(x, TypeId::INT, Pos::NONE)]);
        let before = env.local_eid(x).unwrap();
        env.set_local(x, TypeId::STRING, Pos::NONE);
        assert!(env.local_eid(x).unwrap() > before);
    }

    #[test]
    fn move_to_clears_next() {
        let types = TypeInterner::new();
        let x = local(0, "x");
        let mut env = LocalEnv::begin([(x, TypeId::INT, Pos::NONE)]);
        env.move_to(&types, ContKey::Break);
        assert!(!env.has_next());
        assert!(env.conts.has(ContKey::Break));
    }

    #[test]
    fn stash_and_restore_discards_nested_mutations() {
        let types = TypeInterner::new();
        let x = local(0, "x");
        let mut env = LocalEnv::begin([(x, TypeId::INT, Pos::NONE)]);
        env.stash_and_restore(&[ContKey::Break], |inner| {
            inner.move_to(&types, ContKey::Break);
        });
        assert!(!env.conts.has(ContKey::Break), "stashed cont restored to empty");
    }
}
