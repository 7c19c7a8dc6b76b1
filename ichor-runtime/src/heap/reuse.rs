//! In-place update and storage reuse.
//!
//! A [`UniqueObj`] is a reference proven to be the only one. It allows the
//! fields to be written directly, and it can give its storage up as a
//! [`Reuse`] hole for the next allocation of a compatible object:
//!
//! ```text
//! match xs.try_unique() {
//!     Ok(cell) => { let hole = cell.reuse(); ... Obj::alloc_at(Some(hole), CONS, [y, ys]) }
//!     Err(shared) => { ... Obj::alloc(CONS, [y, ys]) }
//! }
//! ```
//!
//! Filling a hole does not count as an allocation. A hole that is dropped
//! unfilled releases its storage.

use std::mem;

use super::{Block, Obj, Payload, Tag};
use crate::boxed::Boxed;
use crate::stats;

/// Exclusive access to a heap object with count 1.
#[derive(Debug)]
pub struct UniqueObj(Obj);

impl UniqueObj {
    pub(super) fn new(obj: Obj) -> Self {
        debug_assert!(obj.is_unique());
        Self(obj)
    }

    fn block(&mut self) -> &mut Block {
        match self.0.block_mut() {
            Some(block) => block,
            // A UniqueObj is never duplicated, so the count stays at 1.
            None => unreachable!("unique object was shared"),
        }
    }

    pub fn tag(&self) -> Tag {
        self.0.tag()
    }

    pub fn fields(&self) -> &[Boxed] {
        self.0.fields()
    }

    /// Mutable view of the scanned fields.
    pub fn fields_mut(&mut self) -> &mut [Boxed] {
        self.block().payload.scanned_mut()
    }

    /// Overwrite a field, returning its previous value.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn set_field(&mut self, index: usize, value: Boxed) -> Boxed {
        mem::replace(&mut self.fields_mut()[index], value)
    }

    /// Move a field out, leaving unit behind.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn take_field(&mut self, index: usize) -> Boxed {
        self.set_field(index, Boxed::unit())
    }

    /// Change the constructor tag in place.
    pub fn set_tag(&mut self, tag: Tag) {
        self.block().tag = tag;
    }

    /// Release the fields and keep the storage as a hole.
    pub fn reuse(mut self) -> Reuse {
        let block = self.block();
        let slots = match mem::replace(&mut block.payload, Payload::Raw(0)) {
            Payload::Fields(mut slots) | Payload::Handler { clauses: mut slots, .. } => {
                slots.clear();
                slots
            }
            _ => Vec::new(),
        };
        block.payload = Payload::Fields(slots);
        Reuse(self.0)
    }

    /// Give up exclusivity.
    pub fn into_shared(self) -> Obj {
        self.0
    }
}

/// Storage of a reclaimed object, ready to receive a new one.
#[derive(Debug)]
#[must_use = "an unfilled hole releases its storage"]
pub struct Reuse(Obj);

impl Reuse {
    /// Write a constructor object into the storage.
    pub fn fill(self, tag: Tag, fields: impl IntoIterator<Item = Boxed>) -> Obj {
        debug_assert!(!tag.is_reserved(), "constructor tag {tag} is reserved");
        let mut obj = self.0;
        let Some(block) = obj.block_mut() else {
            drop(obj);
            return Obj::alloc(tag, fields);
        };
        block.tag = tag;
        match &mut block.payload {
            Payload::Fields(slots) => slots.extend(fields),
            other => *other = Payload::Fields(fields.into_iter().collect()),
        }
        stats::record_reuse();
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONS: Tag = Tag::new(1);
    const PAIR: Tag = Tag::new(2);

    #[test]
    fn test_try_unique_on_shared_returns_reference() {
        let a = Obj::alloc(CONS, [Boxed::from_i64(1)]);
        let b = a.dup();
        let a = a.try_unique().expect_err("shared object must not be unique");
        assert_eq!(a.ref_count(), 2);
        drop(b);
        assert!(a.try_unique().is_ok());
    }

    #[test]
    fn test_set_field_updates_in_place() {
        let obj = Obj::alloc(PAIR, [Boxed::from_i64(1), Boxed::from_i64(2)]);
        let mut unique = obj.try_unique().unwrap();
        let old = unique.set_field(1, Boxed::from_i64(20));
        assert_eq!(old.as_i64(), Some(2));
        let obj = unique.into_shared();
        assert_eq!(obj.field(1).and_then(Boxed::as_i64), Some(20));
    }

    #[test]
    fn test_fill_reuses_storage() {
        let before = stats::snapshot();
        let obj = Obj::alloc(CONS, [Boxed::from_i64(1), Boxed::unit()]);
        let hole = obj.drop_reuse().expect("unique object yields a hole");
        let obj = hole.fill(PAIR, [Boxed::from_i64(7), Boxed::from_i64(8)]);
        let delta = stats::snapshot().since(&before);
        assert_eq!(delta.allocs, 1);
        assert_eq!(delta.reuses, 1);
        assert_eq!(obj.tag(), PAIR);
        assert_eq!(obj.field(0).and_then(Boxed::as_i64), Some(7));
        assert!(obj.is_unique());
    }

    #[test]
    fn test_drop_reuse_on_shared_decrements() {
        let a = Obj::alloc(CONS, []);
        let b = a.dup();
        assert!(b.drop_reuse().is_none());
        assert!(a.is_unique());
    }

    #[test]
    fn test_reuse_releases_old_fields() {
        let before = stats::snapshot();
        let child = Obj::alloc(CONS, []);
        let parent = Obj::alloc(CONS, [Boxed::from(child)]);
        let hole = parent.drop_reuse().unwrap();
        // The child is gone; only the hole's storage remains.
        assert_eq!(stats::snapshot().since(&before).live_objects(), 1);
        drop(hole);
        assert_eq!(stats::snapshot().since(&before).live_objects(), 0);
    }

    #[test]
    fn test_alloc_at_without_hole_allocates() {
        let before = stats::snapshot();
        let obj = Obj::alloc_at(None, CONS, [Boxed::unit()]);
        assert_eq!(stats::snapshot().since(&before).allocs, 1);
        assert_eq!(obj.scan_count(), 1);
    }
}
