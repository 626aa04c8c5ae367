//! String interning with the two-phase id scheme.
//!
//! While a unit compiles, every string gets an *insertion id* (its position
//! in the table). Only when the unit is serialized are *write ids* handed
//! out: the ordinal of each string among the strings that are actually
//! referenced, in first-reference order across the whole unit.

use std::collections::HashMap;
use std::fmt;

/// Insertion id of an interned string.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrId(u32);

impl StrId {
    /// Raw insertion index, as stored in code words before resolution.
    pub const fn index(self) -> u32 {
        self.0
    }

    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Debug for StrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrId({})", self.0)
    }
}

/// Anything that can turn a numeric string operand back into text.
pub trait StringLookup {
    fn lookup(&self, id: u32) -> Option<&str>;
}

/// Interning registry owned by one compilation unit.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<String>,
    index: HashMap<String, StrId>,
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning the existing id if it was seen before.
    pub fn add(&mut self, text: &str) -> StrId {
        if let Some(id) = self.index.get(text) {
            return *id;
        }
        let id = StrId(self.strings.len() as u32);
        self.strings.push(text.to_owned());
        self.index.insert(text.to_owned(), id);
        id
    }

    pub fn get(&self, id: StrId) -> Option<&str> {
        self.strings.get(id.0 as usize).map(String::as_str)
    }

    pub fn find(&self, text: &str) -> Option<StrId> {
        self.index.get(text).copied()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Assigns write ids from the unit's references, in the order given.
    ///
    /// Must be called once all blocks of the unit are compiled: the ids
    /// depend on every reference the unit makes.
    pub fn resolve<I>(&self, references: I) -> WriteIds<'_>
    where
        I: IntoIterator<Item = StrId>,
    {
        let mut by_insertion = vec![None; self.strings.len()];
        let mut order = Vec::new();
        for id in references {
            let Some(slot) = by_insertion.get_mut(id.0 as usize) else {
                continue;
            };
            if slot.is_none() {
                *slot = Some(order.len() as u32);
                order.push(id);
            }
        }
        WriteIds {
            table: self,
            by_insertion,
            order,
        }
    }
}

impl StringLookup for StringTable {
    fn lookup(&self, id: u32) -> Option<&str> {
        self.get(StrId(id))
    }
}

/// Write ids of one unit, valid for a single serialization pass.
#[derive(Debug)]
pub struct WriteIds<'a> {
    table: &'a StringTable,
    by_insertion: Vec<Option<u32>>,
    order: Vec<StrId>,
}

impl WriteIds<'_> {
    pub fn write_id(&self, id: StrId) -> Option<u32> {
        self.by_insertion.get(id.0 as usize).copied().flatten()
    }

    /// Referenced strings in write-id order.
    pub fn strings(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().filter_map(|id| self.table.get(*id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl StringLookup for WriteIds<'_> {
    fn lookup(&self, id: u32) -> Option<&str> {
        self.order
            .get(id as usize)
            .and_then(|sid| self.table.get(*sid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_is_idempotent() {
        let mut table = StringTable::new();
        let a = table.add("a");
        let b = table.add("b");
        assert_eq!(table.add("a"), a);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b), Some("b"));
        assert_eq!(table.find("c"), None);
    }

    #[test]
    fn test_write_ids_follow_first_reference() {
        let mut table = StringTable::new();
        // insertion order deliberately differs from reference order
        let c = table.add("c");
        let b = table.add("b");
        let a = table.add("a");
        let unused = table.add("unused");

        let ids = table.resolve([a, b, b, c, a]);
        assert_eq!(ids.write_id(a), Some(0));
        assert_eq!(ids.write_id(b), Some(1));
        assert_eq!(ids.write_id(c), Some(2));
        assert_eq!(ids.write_id(unused), None);
        assert_eq!(ids.strings().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(ids.lookup(1), Some("b"));
        assert_eq!(ids.lookup(3), None);
    }

    #[test]
    fn test_resolve_ignores_foreign_ids() {
        let mut table = StringTable::new();
        let a = table.add("a");
        let ids = table.resolve([StrId::from_index(42), a]);
        assert_eq!(ids.write_id(a), Some(0));
        assert_eq!(ids.len(), 1);
    }
}
