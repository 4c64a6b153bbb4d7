//! Process-wide type table: extension members declared per type name.
//!
//! Writers bump the type's version counter while holding the write lock, so
//! a resolver that read the table under the previous version is already
//! stale by the time the new entry becomes readable.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use shale_ir::fold_case;
use shale_value::{Member, MemberSet};

use crate::invalidation::InvalidationBus;

#[derive(Default)]
pub struct TypeTable {
    /// Folded type name to its declared members.
    entries: RwLock<FxHashMap<String, MemberSet>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `member` on `type_name`, replacing a member of the same name.
    pub fn add_member(&self, bus: &InvalidationBus, type_name: &str, member: Member) -> Option<Member> {
        let mut entries = self.entries.write();
        bus.bump_type(type_name);
        entries
            .entry(fold_case(type_name).into_owned())
            .or_default()
            .insert(member)
    }

    pub fn remove_member(&self, bus: &InvalidationBus, type_name: &str, name: &str) -> Option<Member> {
        let mut entries = self.entries.write();
        let key = fold_case(type_name);
        let set = entries.get_mut(key.as_ref())?;
        bus.bump_type(type_name);
        let removed = set.remove(name);
        if set.is_empty() {
            entries.remove(key.as_ref());
        }
        removed
    }

    /// The member called `name` declared on `type_name` with matching
    /// static-ness.
    pub fn lookup(&self, type_name: &str, name: &str, is_static: bool) -> Option<Member> {
        self.entries
            .read()
            .get(fold_case(type_name).as_ref())
            .and_then(|set| set.get(name))
            .filter(|m| m.is_static == is_static)
            .cloned()
    }

    pub fn members(&self, type_name: &str) -> Vec<Member> {
        self.entries
            .read()
            .get(fold_case(type_name).as_ref())
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_type(&self, type_name: &str) -> bool {
        self.entries.read().contains_key(fold_case(type_name).as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shale_value::Value;

    #[test]
    fn test_add_bumps_before_publish() {
        let bus = InvalidationBus::new();
        let table = TypeTable::new();
        let counter = bus.type_counter("Contoso.Widget");
        assert_eq!(counter.load(), 0);

        table.add_member(&bus, "contoso.widget", Member::note("Size", Value::Int32(3)));
        assert_eq!(counter.load(), 1);
        assert!(table.contains_type("CONTOSO.WIDGET"));
        assert!(table.lookup("Contoso.Widget", "size", false).is_some());
        assert!(table.lookup("Contoso.Widget", "size", true).is_none());
    }

    #[test]
    fn test_remove_drops_empty_entries() {
        let bus = InvalidationBus::new();
        let table = TypeTable::new();
        table.add_member(&bus, "T", Member::note("A", Value::Null));
        assert!(table.remove_member(&bus, "T", "a").is_some());
        assert!(!table.contains_type("T"));
        assert_eq!(bus.type_counter("T").load(), 2);
        assert!(table.remove_member(&bus, "T", "a").is_none());
        assert_eq!(bus.type_counter("T").load(), 2);
    }
}
