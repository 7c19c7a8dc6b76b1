//! # Heap Object Model
//!
//! Tagged, reference-counted heap objects.
//!
//! ## Ownership
//!
//! An [`Obj`] is one unit of ownership of a heap object. It has no `Clone`
//! implementation: a second reference is created with [`Obj::dup`], and a
//! reference is released by dropping it. Moving an `Obj` into a call transfers
//! ownership, so a value used after the transfer is rejected by the compiler.
//!
//! ```text
//! alloc(tag, fields)   count = 1
//! dup(&obj)            count + 1, same identity
//! drop(obj)            count - 1; at zero release the fields, then the storage
//! ```
//!
//! ## Reclaim
//!
//! Releasing an object releases its scanned fields. The scanned fields are
//! derived from the payload variant: constructor fields and handler clauses
//! are scanned, raw words, strings and code are not. Release walks an explicit
//! work-list, so a uniquely owned chain of any length is freed without
//! recursion.
//!
//! ## Reuse
//!
//! A reference observed unique (`count == 1`) can be converted into a
//! [`UniqueObj`] and from there into a [`Reuse`] hole. Filling the hole writes
//! a new object into the old storage, see [`reuse`].
//!
//! ## Sharing
//!
//! `Obj` is confined to its context. Data handed to other contexts is
//! allocated as a [`SharedObj`] with an atomic count, see [`shared`].

mod reuse;
pub mod shared;

pub use reuse::{Reuse, UniqueObj};
pub use shared::{SharedObj, SharedValue};

use std::fmt;
use std::rc::Rc;

use crate::boxed::Boxed;
use crate::context::Context;
use crate::control::{Ctl, Resume};
use crate::error::{fatal, RuntimeError};
use crate::evidence::{EffectTag, Marker};
use crate::stats;

/// Code of a function object.
pub type FunctionCode = dyn Fn(&mut Context, Vec<Boxed>) -> Ctl;

/// Code of a handler clause: receives the marker of its handler instance.
pub type ClauseCode = dyn Fn(&mut Context, Marker, Vec<Boxed>) -> Ctl;

/// Discriminant tag of a heap object.
///
/// Constructor tags are chosen by generated code. The top of the range is
/// reserved for the runtime's own object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(u16);

impl Tag {
    /// First tag reserved for runtime object kinds.
    pub const RESERVED: u16 = 0xFF00;

    /// Boxed 64-bit integer outside the small integer range.
    pub const INT64: Tag = Tag(0xFF01);
    /// Boxed 64-bit float.
    pub const FLOAT64: Tag = Tag(0xFF02);
    /// Immutable string.
    pub const STRING: Tag = Tag(0xFF03);
    /// Function closure.
    pub const FUNCTION: Tag = Tag(0xFF04);
    /// Handler clause.
    pub const CLAUSE: Tag = Tag(0xFF05);
    /// Handler object.
    pub const HANDLER: Tag = Tag(0xFF06);
    /// Captured resumption.
    pub const RESUME: Tag = Tag(0xFF07);
    /// Local reference to a shared object.
    pub const SHARED: Tag = Tag(0xFF08);

    /// Create a constructor tag.
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    /// The raw tag value.
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Whether this tag belongs to a runtime object kind.
    pub const fn is_reserved(self) -> bool {
        self.0 >= Self::RESERVED
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Tag::INT64 => f.write_str("int64"),
            Tag::FLOAT64 => f.write_str("float64"),
            Tag::STRING => f.write_str("string"),
            Tag::FUNCTION => f.write_str("function"),
            Tag::CLAUSE => f.write_str("clause"),
            Tag::HANDLER => f.write_str("handler"),
            Tag::RESUME => f.write_str("resume"),
            Tag::SHARED => f.write_str("shared"),
            Tag(value) => write!(f, "#{value}"),
        }
    }
}

/// Object payload. The variant decides which parts are scanned on release.
pub(crate) enum Payload {
    /// Constructor fields, all scanned.
    Fields(Vec<Boxed>),
    /// Unscanned raw word.
    Raw(u64),
    Str(Box<str>),
    Function(Rc<FunctionCode>),
    Clause(Rc<ClauseCode>),
    /// One clause per operation, all scanned.
    Handler { effect: EffectTag, clauses: Vec<Boxed> },
    Resume(Resume),
    Shared(SharedObj),
}

impl Payload {
    fn kind(&self) -> &'static str {
        match self {
            Payload::Fields(_) => "fields",
            Payload::Raw(_) => "raw",
            Payload::Str(_) => "string",
            Payload::Function(_) => "function",
            Payload::Clause(_) => "clause",
            Payload::Handler { .. } => "handler",
            Payload::Resume(_) => "resume",
            Payload::Shared(_) => "shared",
        }
    }

    fn scanned(&self) -> &[Boxed] {
        match self {
            Payload::Fields(fields) | Payload::Handler { clauses: fields, .. } => fields,
            _ => &[],
        }
    }

    pub(crate) fn scanned_mut(&mut self) -> &mut [Boxed] {
        match self {
            Payload::Fields(fields) | Payload::Handler { clauses: fields, .. } => fields,
            _ => &mut [],
        }
    }

    /// Move the heap references held by scanned fields onto `pending`.
    fn release_into(&mut self, pending: &mut Vec<Obj>) {
        if let Payload::Fields(fields) | Payload::Handler { clauses: fields, .. } = self {
            pending.extend(fields.drain(..).filter_map(|field| field.into_obj().ok()));
        }
    }
}

pub(crate) struct Block {
    pub(crate) tag: Tag,
    pub(crate) payload: Payload,
}

/// An owned reference to a heap object.
pub struct Obj(Rc<Block>);

impl Obj {
    fn from_block(tag: Tag, payload: Payload) -> Obj {
        stats::record_alloc();
        Obj(Rc::new(Block { tag, payload }))
    }

    /// Allocate a constructor object with count 1.
    ///
    /// Every field is scanned: heap references among them are released when
    /// the object is reclaimed, scalars are skipped.
    pub fn alloc(tag: Tag, fields: impl IntoIterator<Item = Boxed>) -> Obj {
        debug_assert!(!tag.is_reserved(), "constructor tag {tag} is reserved");
        Obj::from_block(tag, Payload::Fields(fields.into_iter().collect()))
    }

    /// Allocate an object holding an unscanned 64-bit word.
    pub fn raw(tag: Tag, word: u64) -> Obj {
        Obj::from_block(tag, Payload::Raw(word))
    }

    /// Allocate a string object.
    pub fn string(text: impl Into<Box<str>>) -> Obj {
        Obj::from_block(Tag::STRING, Payload::Str(text.into()))
    }

    /// Allocate a function object.
    ///
    /// The code may run many times; values it captures must be duplicated
    /// before each use that consumes them.
    pub fn function(code: impl Fn(&mut Context, Vec<Boxed>) -> Ctl + 'static) -> Obj {
        Obj::from_block(Tag::FUNCTION, Payload::Function(Rc::new(code)))
    }

    pub(crate) fn clause(code: Rc<ClauseCode>) -> Obj {
        Obj::from_block(Tag::CLAUSE, Payload::Clause(code))
    }

    pub(crate) fn handler(effect: EffectTag, clauses: Vec<Boxed>) -> Obj {
        Obj::from_block(Tag::HANDLER, Payload::Handler { effect, clauses })
    }

    /// Store a resumption in a heap object.
    pub fn resumption(resume: Resume) -> Obj {
        Obj::from_block(Tag::RESUME, Payload::Resume(resume))
    }

    /// Hold a reference to a shared object in this context's heap.
    pub fn shared(obj: SharedObj) -> Obj {
        Obj::from_block(Tag::SHARED, Payload::Shared(obj))
    }

    /// Create a second owned reference to the same object.
    #[inline]
    pub fn dup(&self) -> Obj {
        Obj(Rc::clone(&self.0))
    }

    /// The current number of owned references.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Whether this is the only reference to the object.
    #[inline]
    pub fn is_unique(&self) -> bool {
        self.ref_count() == 1
    }

    /// Whether two references denote the same object.
    pub fn ptr_eq(a: &Obj, b: &Obj) -> bool {
        Rc::ptr_eq(&a.0, &b.0)
    }

    pub fn tag(&self) -> Tag {
        self.0.tag
    }

    /// The scanned fields: constructor fields or handler clauses.
    pub fn fields(&self) -> &[Boxed] {
        self.0.payload.scanned()
    }

    pub fn field(&self, index: usize) -> Option<&Boxed> {
        self.fields().get(index)
    }

    /// Number of leading fields released recursively on reclaim.
    pub fn scan_count(&self) -> usize {
        self.fields().len()
    }

    pub fn as_raw(&self) -> Option<u64> {
        match self.0.payload {
            Payload::Raw(word) => Some(word),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.0.payload {
            Payload::Str(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_resume(&self) -> Option<&Resume> {
        match &self.0.payload {
            Payload::Resume(resume) => Some(resume),
            _ => None,
        }
    }

    pub fn as_shared(&self) -> Option<&SharedObj> {
        match &self.0.payload {
            Payload::Shared(obj) => Some(obj),
            _ => None,
        }
    }

    /// The effect handled by a handler object.
    pub fn handler_effect(&self) -> Option<EffectTag> {
        match self.0.payload {
            Payload::Handler { effect, .. } => Some(effect),
            _ => None,
        }
    }

    pub(crate) fn clause_code(&self) -> Option<Rc<ClauseCode>> {
        match &self.0.payload {
            Payload::Clause(code) => Some(Rc::clone(code)),
            _ => None,
        }
    }

    pub(crate) fn is_clause(&self) -> bool {
        matches!(self.0.payload, Payload::Clause(_))
    }

    /// Convert into a provably unique handle, or give the reference back.
    pub fn try_unique(self) -> Result<UniqueObj, Obj> {
        if self.is_unique() {
            Ok(UniqueObj::new(self))
        } else {
            Err(self)
        }
    }

    /// Release this reference, keeping the storage when it was the last one.
    ///
    /// Unique: the fields are released and the storage is returned as a hole.
    /// Shared: the count is decremented and `None` is returned.
    pub fn drop_reuse(self) -> Option<Reuse> {
        self.try_unique().ok().map(UniqueObj::reuse)
    }

    /// Allocate a constructor object into `hole` when present, fresh otherwise.
    pub fn alloc_at(hole: Option<Reuse>, tag: Tag, fields: impl IntoIterator<Item = Boxed>) -> Obj {
        match hole {
            Some(hole) => hole.fill(tag, fields),
            None => Obj::alloc(tag, fields),
        }
    }

    /// Call a function object, consuming this reference.
    pub fn apply(self, ctx: &mut Context, args: Vec<Boxed>) -> Ctl {
        let code = match &self.0.payload {
            Payload::Function(code) => Rc::clone(code),
            _ => fatal(RuntimeError::NotAFunction { tag: self.tag() }),
        };
        drop(self);
        code(ctx, args)
    }

    pub(crate) fn block_mut(&mut self) -> Option<&mut Block> {
        Rc::get_mut(&mut self.0)
    }
}

impl Drop for Obj {
    fn drop(&mut self) {
        // Shared: the Rc decrement is the whole release.
        let Some(block) = Rc::get_mut(&mut self.0) else {
            return;
        };
        stats::record_free();

        let mut pending = Vec::new();
        block.payload.release_into(&mut pending);
        while let Some(mut child) = pending.pop() {
            // Empty a unique child here so its own drop never descends.
            if let Some(block) = Rc::get_mut(&mut child.0) {
                block.payload.release_into(&mut pending);
            }
        }
    }
}

impl fmt::Debug for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Obj")
            .field("tag", &self.tag())
            .field("rc", &self.ref_count())
            .field("kind", &self.0.payload.kind())
            .field("fields", &self.fields())
            .finish()
    }
}
