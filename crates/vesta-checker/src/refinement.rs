//! Refinements ("fake members"): narrowed knowledge about property chains.
//!
//! A check like `$x->p is nonnull` records a synthetic binding for the chain
//! `$x->p`. The binding remembers the eid of its root local; when the root
//! is reassigned the eid moves on and the refinement silently stops
//! applying. Calls drop all refinements (any callee may mutate the
//! receiver), and closures keep only the refinements rooted at explicitly
//! captured locals.

use crate::env::{Eid, Local};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::fmt;
use std::rc::Rc;
use vesta_ast::LocalId;
use vesta_common::Atom;
use vesta_solver::{TypeId, TypeInterner};

/// Identity of a refined property chain: root local plus member names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FakeMemberKey {
    pub root: LocalId,
    pub chain: SmallVec<[Atom; 2]>,
}

impl FakeMemberKey {
    pub fn new(root: LocalId, chain: impl IntoIterator<Item = Atom>) -> Self {
        FakeMemberKey {
            root,
            chain: chain.into_iter().collect(),
        }
    }
}

impl fmt::Display for FakeMemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.root.name())?;
        for member in &self.chain {
            write!(f, "->{member}")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct FakeEntry {
    ty: TypeId,
    root_eid: Eid,
}

/// The refinement set of one continuation snapshot. Structurally shared.
#[derive(Clone, Debug, Default)]
pub struct FakeMembers {
    map: Rc<FxHashMap<FakeMemberKey, FakeEntry>>,
}

impl FakeMembers {
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub(crate) fn same_as(&self, other: &FakeMembers) -> bool {
        Rc::ptr_eq(&self.map, &other.map)
    }

    /// The refined type for `key`, provided the root has not been
    /// reassigned since the refinement was recorded.
    pub fn get(&self, key: &FakeMemberKey, current_root_eid: Eid) -> Option<TypeId> {
        let entry = self.map.get(key)?;
        (entry.root_eid == current_root_eid).then_some(entry.ty)
    }

    pub fn add(&mut self, key: FakeMemberKey, ty: TypeId, root_eid: Eid) {
        Rc::make_mut(&mut self.map).insert(key, FakeEntry { ty, root_eid });
    }

    pub fn forget_rooted_at(&mut self, root: LocalId) {
        if self.map.keys().any(|k| k.root == root) {
            Rc::make_mut(&mut self.map).retain(|k, _| k.root != root);
        }
    }

    pub fn forget_all(&mut self) {
        if !self.map.is_empty() {
            self.map = Rc::new(FxHashMap::default());
        }
    }

    /// Keep only refinements rooted at the given locals (closure capture
    /// boundary).
    pub fn retain_roots(&mut self, keep: &[LocalId]) {
        if self.map.keys().any(|k| !keep.contains(&k.root)) {
            Rc::make_mut(&mut self.map).retain(|k, _| keep.contains(&k.root));
        }
    }

    /// Join for environment merging: a refinement survives only when both
    /// sides carry it for the same root incarnation, and its type is the
    /// union of the two sides.
    pub fn join(
        types: &TypeInterner,
        a: &FakeMembers,
        b: &FakeMembers,
        joined_locals: &FxHashMap<LocalId, Local>,
    ) -> FakeMembers {
        if Rc::ptr_eq(&a.map, &b.map) {
            return a.clone();
        }
        let mut map = FxHashMap::default();
        for (key, entry_a) in a.map.iter() {
            let Some(entry_b) = b.map.get(key) else {
                continue;
            };
            if entry_a.root_eid != entry_b.root_eid {
                continue;
            }
            // The join may have given the root a fresh eid; the refinement
            // only survives if the root kept its incarnation.
            let Some(root) = joined_locals.get(&key.root) else {
                continue;
            };
            if root.eid != entry_a.root_eid {
                continue;
            }
            map.insert(key.clone(), FakeEntry {
                ty: types.union(vec![entry_a.ty, entry_b.ty]),
                root_eid: entry_a.root_eid,
            });
        }
        FakeMembers { map: Rc::new(map) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesta_common::Pos;

    fn key(root: LocalId, member: &str) -> FakeMemberKey {
        FakeMemberKey::new(root, [Atom::new(member)])
    }

    #[test]
    fn stale_root_eid_hides_entry() {
        let root = LocalId(0, Atom::new("x"));
        let mut fakes = FakeMembers::default();
        fakes.add(key(root, "p"), TypeId::INT, 7);
        assert_eq!(fakes.get(&key(root, "p"), 7), Some(TypeId::INT));
        assert_eq!(fakes.get(&key(root, "p"), 8), None);
    }

    #[test]
    fn join_keeps_only_shared_refinements() {
        let types = TypeInterner::new();
        let root = LocalId(0, Atom::new("x"));
        let mut locals = FxHashMap::default();
        locals.insert(root, Local {
            ty: TypeId::INT,
            pos: Pos::NONE,
            eid: 3,
            defined: true,
        });

        let mut a = FakeMembers::default();
        a.add(key(root, "p"), TypeId::INT, 3);
        a.add(key(root, "q"), TypeId::BOOL, 3);
        let mut b = FakeMembers::default();
        b.add(key(root, "p"), TypeId::STRING, 3);

        let joined = FakeMembers::join(&types, &a, &b, &locals);
        assert_eq!(
            joined.get(&key(root, "p"), 3),
            Some(types.union(vec![TypeId::INT, TypeId::STRING]))
        );
        assert_eq!(joined.get(&key(root, "q"), 3), None);
    }

    #[test]
    fn display_renders_chain() {
        let root = LocalId(0, Atom::new("x"));
        let k = FakeMemberKey::new(root, [Atom::new("p"), Atom::new("q")]);
        assert_eq!(k.to_string(), "$x->p->q");
    }
}
