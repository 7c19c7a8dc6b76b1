//! # Ichor Runtime
//!
//! Runtime library for compiled Ichor programs. It provides:
//!
//! - [`heap`] - reference-counted heap objects with uniqueness tests and in-place reuse,
//!   plus atomically counted objects shared between contexts
//! - [`boxed`] - the uniform value representation stored in objects and closures
//! - [`evidence`] - the per-context stack of installed effect handlers
//! - [`handler`] - handler objects and ownership-aware clause selection
//! - [`control`] - control results, yields and first-class resumptions
//! - [`handle`] - the handler installation protocol
//! - [`perform`] - the operation call protocol
//!
//! ## Execution Model
//!
//! Effect handlers follow the evidence passing strategy:
//!
//! ```text
//! handle(h, ret, action)      push (tag(h), marker, h)
//!   action()                  perform(op) -> lookup tag -> select clause -> call
//!                             clause returns a value, or yields to the marker
//!   pop, ret(v)               a yield to the marker resumes here with `k`
//! ```
//!
//! Generated code sequences effectful steps with [`Ctl::bind`]. A step that
//! completes returns [`Ctl::Pure`]; a step that suspends returns a yield that
//! accumulates the rest of the computation as it travels to its handler.
//!
//! ## Collaborators
//!
//! - [`bits`] - bit manipulation primitives
//! - [`os`] - platform file, environment and path facilities
//! - [`ffi`] - C ABI exports of the scalar collaborators

pub mod bits;
pub mod boxed;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod evidence;
pub mod ffi;
pub mod handle;
pub mod handler;
pub mod heap;
pub mod os;
pub mod perform;
pub mod stats;

pub use boxed::{Boxed, SmallInt};
pub use config::RuntimeConfig;
pub use context::Context;
pub use control::{Ctl, Resume};
pub use error::{ConfigError, RuntimeError};
pub use evidence::{EffectTag, Evidence, EvidenceVector, Marker};
pub use handler::{select_clause, Clause, HandlerBuilder};
pub use heap::{Obj, Reuse, SharedObj, SharedValue, Tag, UniqueObj};
pub use perform::Op;
