//! Uniform value representation.
//!
//! Polymorphic code, constructor fields and closure environments store every
//! value as one [`Boxed`] word. Integers in the small range are encoded in the
//! word itself with the low bit set; everything else is a heap reference.
//!
//! | value                              | representation             |
//! |------------------------------------|----------------------------|
//! | integer in `[-2^62, 2^62)`         | `(i << 1) \| 1`, no heap   |
//! | integer outside the small range    | `INT64` raw object         |
//! | float                              | `FLOAT64` raw object       |
//! | unit, `false`, `true`              | small integers 0, 0, 1     |
//! | any other value                    | heap reference             |

use std::fmt;

use crate::control::Resume;
use crate::heap::{Obj, Tag};

/// An integer encoded in a tagged word.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmallInt(u64);

impl SmallInt {
    pub const MIN: i64 = -(1 << 62);
    pub const MAX: i64 = (1 << 62) - 1;
    /// Unit, encoded as the small integer 0.
    pub const UNIT: SmallInt = SmallInt(1);

    /// Encode `value`, or `None` when it needs a heap box.
    #[inline]
    pub const fn new(value: i64) -> Option<SmallInt> {
        if value >= Self::MIN && value <= Self::MAX {
            Some(SmallInt(((value as u64) << 1) | 1))
        } else {
            None
        }
    }

    #[inline]
    pub const fn get(self) -> i64 {
        (self.0 as i64) >> 1
    }

    /// The tagged machine word.
    #[inline]
    pub const fn word(self) -> u64 {
        self.0
    }

    /// Decode a tagged word; `None` when the tag bit is clear.
    pub const fn from_word(word: u64) -> Option<SmallInt> {
        if word & 1 == 1 {
            Some(SmallInt(word))
        } else {
            None
        }
    }
}

impl fmt::Debug for SmallInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A boxed value: a tagged small integer or an owned heap reference.
///
/// Like [`Obj`], a `Boxed` is not `Clone`; use [`Boxed::dup`].
#[derive(Debug)]
pub enum Boxed {
    Int(SmallInt),
    Obj(Obj),
}

impl Boxed {
    #[inline]
    pub fn unit() -> Boxed {
        Boxed::Int(SmallInt::UNIT)
    }

    pub fn from_i64(value: i64) -> Boxed {
        match SmallInt::new(value) {
            Some(small) => Boxed::Int(small),
            None => Boxed::Obj(Obj::raw(Tag::INT64, value as u64)),
        }
    }

    pub fn from_bool(value: bool) -> Boxed {
        Boxed::from_i64(value as i64)
    }

    pub fn from_f64(value: f64) -> Boxed {
        Boxed::Obj(Obj::raw(Tag::FLOAT64, value.to_bits()))
    }

    pub fn string(text: impl Into<Box<str>>) -> Boxed {
        Boxed::Obj(Obj::string(text))
    }

    /// Box a resumption so it can be stored or passed around.
    pub fn resume(resume: Resume) -> Boxed {
        Boxed::Obj(Obj::resumption(resume))
    }

    /// Duplicate the value. Scalars are copied; references are counted.
    #[inline]
    pub fn dup(&self) -> Boxed {
        match self {
            Boxed::Int(small) => Boxed::Int(*small),
            Boxed::Obj(obj) => Boxed::Obj(obj.dup()),
        }
    }

    pub fn is_heap(&self) -> bool {
        matches!(self, Boxed::Obj(_))
    }

    /// The integer value, from either representation.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Boxed::Int(small) => Some(small.get()),
            Boxed::Obj(obj) if obj.tag() == Tag::INT64 => obj.as_raw().map(|word| word as i64),
            Boxed::Obj(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_i64()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Boxed::Obj(obj) if obj.tag() == Tag::FLOAT64 => obj.as_raw().map(f64::from_bits),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_obj()?.as_str()
    }

    pub fn as_obj(&self) -> Option<&Obj> {
        match self {
            Boxed::Obj(obj) => Some(obj),
            Boxed::Int(_) => None,
        }
    }

    /// The heap reference, or the scalar value back.
    pub fn into_obj(self) -> Result<Obj, Boxed> {
        match self {
            Boxed::Obj(obj) => Ok(obj),
            scalar => Err(scalar),
        }
    }
}

impl From<Obj> for Boxed {
    fn from(obj: Obj) -> Self {
        Boxed::Obj(obj)
    }
}

impl From<i64> for Boxed {
    fn from(value: i64) -> Self {
        Boxed::from_i64(value)
    }
}

impl From<bool> for Boxed {
    fn from(value: bool) -> Self {
        Boxed::from_bool(value)
    }
}

impl From<f64> for Boxed {
    fn from(value: f64) -> Self {
        Boxed::from_f64(value)
    }
}

impl From<&str> for Boxed {
    fn from(text: &str) -> Self {
        Boxed::string(text)
    }
}
