//! Members attached to unwrapped heap objects.
//!
//! Arrays, lists, dictionaries and host instances carry instance members
//! without being wrapped: the registry keys them by heap identity. Each
//! entry holds a [`WeakHeap`], so the registry never keeps an object alive,
//! and while the entry exists the allocation (and therefore the identity)
//! cannot be handed to another object. Entries for dropped objects are
//! pruned once the map has doubled since the last sweep.
//!
//! Wrapped values keep their members in the wrapper's adjunct instead.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use shale_value::{Member, MemberKind, MemberSet, Value, WeakHeap};

const MIN_PRUNE_AT: usize = 64;

struct Entry {
    handle: WeakHeap,
    members: MemberSet,
}

struct Objects {
    entries: FxHashMap<usize, Entry>,
    prune_at: usize,
}

/// Instance members of unwrapped heap objects, by identity.
pub struct InstanceMembers {
    objects: RwLock<Objects>,
}

impl Default for InstanceMembers {
    fn default() -> Self {
        InstanceMembers {
            objects: RwLock::new(Objects {
                entries: FxHashMap::default(),
                prune_at: MIN_PRUNE_AT,
            }),
        }
    }
}

/// Identity of a value that can carry members here.
fn object_key(target: &Value) -> Option<usize> {
    match target {
        Value::Array(_) | Value::List(_) | Value::Dictionary(_) | Value::Object(_) => {
            target.identity()
        }
        _ => None,
    }
}

impl InstanceMembers {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `target` carries its members here rather than in a wrapper.
    pub fn can_hold(target: &Value) -> bool {
        object_key(target).is_some()
    }

    /// Attach `member` to `target`, replacing a member of the same name.
    /// Returns false (and attaches nothing) when `target` cannot hold members.
    pub fn attach(&self, target: &Value, member: Member) -> bool {
        let Some(handle) = target.object_handle() else {
            return false;
        };
        let mut objects = self.objects.write();
        if objects.entries.len() >= objects.prune_at {
            objects.entries.retain(|_, entry| entry.handle.is_alive());
            objects.prune_at = (objects.entries.len() * 2).max(MIN_PRUNE_AT);
        }
        objects
            .entries
            .entry(handle.ptr_id())
            .or_insert_with(|| Entry {
                handle,
                members: MemberSet::new(),
            })
            .members
            .insert(member);
        true
    }

    /// Clone of the member called `name` attached to `target`.
    pub fn get(&self, target: &Value, name: &str) -> Option<Member> {
        let key = object_key(target)?;
        self.objects
            .read()
            .entries
            .get(&key)
            .and_then(|entry| entry.members.get(name).cloned())
    }

    /// Store `value` in the note property `name` of `target`. False when
    /// `target` has no note property by that name.
    pub fn set_note(&self, target: &Value, name: &str, value: Value) -> bool {
        let Some(key) = object_key(target) else {
            return false;
        };
        let mut objects = self.objects.write();
        let slot = objects
            .entries
            .get_mut(&key)
            .and_then(|entry| entry.members.get_mut(name));
        match slot {
            Some(member) if matches!(member.kind, MemberKind::NoteProperty(_)) => {
                member.kind = MemberKind::NoteProperty(value);
                true
            }
            _ => false,
        }
    }

    /// Number of objects whose entry is still live.
    pub fn live_objects(&self) -> usize {
        self.objects
            .read()
            .entries
            .values()
            .filter(|entry| entry.handle.is_alive())
            .count()
    }
}
