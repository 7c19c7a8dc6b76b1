//! Heap objects shared between contexts.
//!
//! The default heap counts references without atomics and never leaves the
//! context that allocated it. A [`SharedObj`] is an explicitly shared
//! allocation with an atomic count. It is `Send + Sync`, and its fields hold
//! only small integers and other shared objects, so nothing reachable from
//! it belongs to a single context.
//!
//! A local object carries a shared one through [`Obj::shared`]; dropping the
//! local wrapper releases one shared reference.
//!
//! Shared allocations are not recorded in [`stats`](crate::stats): the
//! counters are per thread and a shared object may be freed on any thread.

use std::fmt;
use std::sync::Arc;

use super::Tag;
use crate::boxed::SmallInt;

/// A field of a shared object.
#[derive(Debug)]
pub enum SharedValue {
    Int(SmallInt),
    Obj(SharedObj),
}

impl SharedValue {
    pub fn unit() -> SharedValue {
        SharedValue::Int(SmallInt::UNIT)
    }

    /// Encode an integer, boxing it when it is outside the small range.
    pub fn from_i64(value: i64) -> SharedValue {
        match SmallInt::new(value) {
            Some(small) => SharedValue::Int(small),
            None => SharedValue::Obj(SharedObj::raw(Tag::INT64, value as u64)),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SharedValue::Int(small) => Some(small.get()),
            SharedValue::Obj(obj) if obj.tag() == Tag::INT64 => obj.as_raw().map(|word| word as i64),
            SharedValue::Obj(_) => None,
        }
    }

    pub fn as_obj(&self) -> Option<&SharedObj> {
        match self {
            SharedValue::Obj(obj) => Some(obj),
            SharedValue::Int(_) => None,
        }
    }

    pub fn dup(&self) -> SharedValue {
        match self {
            SharedValue::Int(small) => SharedValue::Int(*small),
            SharedValue::Obj(obj) => SharedValue::Obj(obj.dup()),
        }
    }
}

impl From<SharedObj> for SharedValue {
    fn from(obj: SharedObj) -> Self {
        SharedValue::Obj(obj)
    }
}

enum SharedPayload {
    Fields(Vec<SharedValue>),
    Raw(u64),
    Str(Box<str>),
}

struct SharedBlock {
    tag: Tag,
    payload: SharedPayload,
}

/// An owned, atomically counted reference to a shared heap object.
pub struct SharedObj(Arc<SharedBlock>);

impl SharedObj {
    fn from_block(tag: Tag, payload: SharedPayload) -> SharedObj {
        SharedObj(Arc::new(SharedBlock { tag, payload }))
    }

    /// Allocate a shared constructor object with count 1.
    pub fn alloc(tag: Tag, fields: impl IntoIterator<Item = SharedValue>) -> SharedObj {
        debug_assert!(!tag.is_reserved(), "constructor tag {tag} is reserved");
        SharedObj::from_block(tag, SharedPayload::Fields(fields.into_iter().collect()))
    }

    pub fn raw(tag: Tag, word: u64) -> SharedObj {
        SharedObj::from_block(tag, SharedPayload::Raw(word))
    }

    pub fn string(text: impl Into<Box<str>>) -> SharedObj {
        SharedObj::from_block(Tag::STRING, SharedPayload::Str(text.into()))
    }

    #[inline]
    pub fn dup(&self) -> SharedObj {
        SharedObj(Arc::clone(&self.0))
    }

    /// The current number of owned references, across all threads.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Whether this is the only reference to the object.
    ///
    /// A unique reference stays unique until it is duplicated, since no
    /// other thread holds one to duplicate.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }

    pub fn ptr_eq(a: &SharedObj, b: &SharedObj) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn tag(&self) -> Tag {
        self.0.tag
    }

    pub fn fields(&self) -> &[SharedValue] {
        match &self.0.payload {
            SharedPayload::Fields(fields) => fields,
            _ => &[],
        }
    }

    pub fn field(&self, index: usize) -> Option<&SharedValue> {
        self.fields().get(index)
    }

    pub fn as_raw(&self) -> Option<u64> {
        match self.0.payload {
            SharedPayload::Raw(word) => Some(word),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.0.payload {
            SharedPayload::Str(text) => Some(text),
            _ => None,
        }
    }

    fn release_into(&mut self, pending: &mut Vec<SharedObj>) {
        if let Some(SharedBlock {
            payload: SharedPayload::Fields(fields),
            ..
        }) = Arc::get_mut(&mut self.0)
        {
            pending.extend(fields.drain(..).filter_map(|field| match field {
                SharedValue::Obj(obj) => Some(obj),
                SharedValue::Int(_) => None,
            }));
        }
    }
}

impl Drop for SharedObj {
    fn drop(&mut self) {
        let mut pending = Vec::new();
        self.release_into(&mut pending);
        while let Some(mut child) = pending.pop() {
            child.release_into(&mut pending);
        }
    }
}

impl fmt::Debug for SharedObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedObj")
            .field("tag", &self.tag())
            .field("rc", &self.ref_count())
            .field("fields", &self.fields())
            .finish()
    }
}
