//! # Control Results
//!
//! Every effectful step returns a [`Ctl`]: either it finished with a value,
//! or it is yielding to the handler installed under some marker.
//!
//! A yield carries the operation to run at the handler and the continuation
//! captured so far. [`Ctl::bind`] appends the rest of the current function to
//! that continuation, and each handler frame the yield passes without being
//! its target wraps the continuation so the frame is installed again when it
//! resumes. When the yield reaches its handler the continuation is complete
//! and becomes a [`Resume`].
//!
//! ```text
//! perform(op) ─ Yield{m, op, k0}
//!   bind(f)   ─ Yield{m, op, k0 ; f}
//!   frame m'  ─ Yield{m, op, under m' (k0 ; f)}
//!   frame m   ─ op(Resume(under m (under m' (k0 ; f))))
//! ```
//!
//! Continuations are `Fn`: a resumption may be invoked any number of times.
//!
//! A step that calls itself in tail position returns [`Ctl::defer`]. The
//! nearest driver (the body of a `handle`, a clause call, or
//! [`Context::run`]) takes the deferred step after the caller has returned,
//! so an effectful loop runs in constant stack.

use std::fmt;
use std::rc::Rc;

use crate::boxed::Boxed;
use crate::context::Context;
use crate::error::RuntimeError;
use crate::evidence::{Marker, MaskedEvidence};
use crate::handle::{self, Frame, HandlerPhase};
use crate::stats;

/// A captured continuation.
pub type Cont = Rc<dyn Fn(&mut Context, Boxed) -> Ctl>;

pub(crate) type YieldOp = Box<dyn FnOnce(&mut Context, Resume) -> Ctl>;

/// A deferred step.
pub type Step = Box<dyn FnOnce(&mut Context) -> Ctl>;

/// Result of an effectful step.
pub enum Ctl {
    Pure(Boxed),
    Yield(Yield),
    /// Work left for the nearest driver.
    Step(Step),
}

impl Ctl {
    pub fn pure(value: impl Into<Boxed>) -> Ctl {
        Ctl::Pure(value.into())
    }

    pub fn unit() -> Ctl {
        Ctl::Pure(Boxed::unit())
    }

    /// Yield to the handler installed under `marker`.
    ///
    /// When the yield reaches that handler, `op` runs in the handler's
    /// context with the resumption of everything between the two.
    pub fn yield_to(marker: Marker, op: impl FnOnce(&mut Context, Resume) -> Ctl + 'static) -> Ctl {
        Ctl::Yield(Yield {
            marker,
            op: Box::new(op),
            cont: None,
        })
    }

    /// Defer `f` to the nearest driver.
    pub fn defer(f: impl FnOnce(&mut Context) -> Ctl + 'static) -> Ctl {
        Ctl::Step(Box::new(f))
    }

    /// Run deferred steps until the computation finishes or yields.
    pub fn drive(mut self, ctx: &mut Context) -> Ctl {
        loop {
            match self {
                Ctl::Step(step) => self = step(ctx),
                done => return done,
            }
        }
    }

    pub fn is_pure(&self) -> bool {
        matches!(self, Ctl::Pure(_))
    }

    /// The marker targeted by a yield.
    pub fn yield_marker(&self) -> Option<Marker> {
        match self {
            Ctl::Yield(y) => Some(y.marker),
            Ctl::Pure(_) | Ctl::Step(_) => None,
        }
    }

    /// Sequence `f` after this step.
    ///
    /// A finished step runs `f` immediately. A yielding step records `f` in
    /// its continuation and keeps yielding. A deferred step runs `f` after
    /// itself.
    pub fn bind(self, ctx: &mut Context, f: impl Fn(&mut Context, Boxed) -> Ctl + 'static) -> Ctl {
        match self {
            Ctl::Pure(value) => f(ctx, value),
            Ctl::Yield(y) => Ctl::Yield(y.then(Rc::new(f))),
            Ctl::Step(step) => Ctl::Step(Box::new(move |ctx: &mut Context| step(ctx).bind(ctx, f))),
        }
    }

    fn bind_cont(self, ctx: &mut Context, f: Cont) -> Ctl {
        match self {
            Ctl::Pure(value) => f(ctx, value),
            Ctl::Yield(y) => Ctl::Yield(y.then(f)),
            Ctl::Step(step) => Ctl::Step(Box::new(move |ctx: &mut Context| step(ctx).bind_cont(ctx, f))),
        }
    }

    /// Transform the final value.
    pub fn map(self, f: impl Fn(Boxed) -> Boxed + 'static) -> Ctl {
        match self {
            Ctl::Pure(value) => Ctl::Pure(f(value)),
            Ctl::Yield(y) => Ctl::Yield(y.then(Rc::new(move |_: &mut Context, value: Boxed| {
                Ctl::Pure(f(value))
            }))),
            Ctl::Step(step) => Ctl::Step(Box::new(move |ctx: &mut Context| step(ctx).map(f))),
        }
    }

    /// See [`Yield::under_clause`].
    pub(crate) fn under_clause(self, marker: Marker) -> Ctl {
        match self {
            Ctl::Yield(y) => Ctl::Yield(y.under_clause(marker)),
            other => other,
        }
    }

    /// The value of a finished computation.
    ///
    /// A yield at the top level targets a handler that is no longer
    /// installed, which is an error.
    pub fn into_value(self) -> Result<Boxed, RuntimeError> {
        match self {
            Ctl::Pure(value) => Ok(value),
            Ctl::Yield(y) => Err(RuntimeError::UnhandledYield { marker: y.marker }),
            Ctl::Step(_) => Err(RuntimeError::UndrivenStep),
        }
    }
}

impl fmt::Debug for Ctl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ctl::Pure(value) => f.debug_tuple("Pure").field(value).finish(),
            Ctl::Yield(y) => f.debug_tuple("Yield").field(&y.marker).finish(),
            Ctl::Step(_) => f.write_str("Step"),
        }
    }
}

/// A yield in flight.
pub struct Yield {
    marker: Marker,
    op: YieldOp,
    cont: Option<Cont>,
}

impl Yield {
    pub fn marker(&self) -> Marker {
        self.marker
    }

    fn then(mut self, f: Cont) -> Yield {
        let cont: Cont = match self.cont.take() {
            None => f,
            Some(k) => Rc::new(move |ctx: &mut Context, value: Boxed| {
                k(ctx, value).bind_cont(ctx, Rc::clone(&f))
            }),
        };
        self.cont = Some(cont);
        self
    }

    /// Wrap the continuation so `frame` is installed around it on resume.
    pub(crate) fn under_frame(mut self, frame: Rc<Frame>) -> Yield {
        let inner = self.cont.take();
        let cont: Cont = Rc::new(move |ctx: &mut Context, value: Boxed| {
            let inner = inner.clone();
            handle::reenter(ctx, Rc::clone(&frame), move |ctx| run_cont(ctx, inner, value))
        });
        self.cont = Some(cont);
        self
    }

    /// Wrap the continuation so the rest of a clause body runs masked again.
    ///
    /// The clause of the handler installed under `marker` was suspended by
    /// an operation handled further out. When it is resumed, its handler is
    /// back on the evidence because every frame in between reinstalls itself,
    /// so the entries from that handler up are hidden again until the clause
    /// body finishes or suspends once more.
    pub(crate) fn under_clause(mut self, marker: Marker) -> Yield {
        let Some(inner) = self.cont.take() else {
            return self;
        };
        let cont: Cont = Rc::new(move |ctx: &mut Context, value: Boxed| {
            let result = match ctx.evidence.position(marker) {
                Some(index) => {
                    let mut masked = MaskedEvidence::enter(ctx, index);
                    let masked_ctx: &mut Context = &mut masked;
                    let result = inner(&mut *masked_ctx, value).drive(masked_ctx);
                    drop(masked);
                    result
                }
                None => inner(&mut *ctx, value).drive(ctx),
            };
            result.under_clause(marker)
        });
        self.cont = Some(cont);
        self
    }

    pub(crate) fn into_parts(self) -> (YieldOp, Option<Cont>) {
        (self.op, self.cont)
    }
}

fn run_cont(ctx: &mut Context, cont: Option<Cont>, value: Boxed) -> Ctl {
    match cont {
        Some(k) => k(ctx, value),
        None => Ctl::Pure(value),
    }
}

/// A first-class resumption.
///
/// Resuming reinstalls the captured handler on top of the current evidence
/// and continues the captured computation with a value. The resumption can
/// be resumed again, stored, or dropped without resuming.
pub struct Resume {
    inner: Rc<ResumeInner>,
}

struct ResumeInner {
    frame: Rc<Frame>,
    cont: Option<Cont>,
}

impl Resume {
    pub(crate) fn new(frame: Rc<Frame>, cont: Option<Cont>) -> Self {
        Self {
            inner: Rc::new(ResumeInner { frame, cont }),
        }
    }

    pub fn dup(&self) -> Resume {
        Resume {
            inner: Rc::clone(&self.inner),
        }
    }

    /// The marker of the handler this resumption returns to.
    pub fn marker(&self) -> Marker {
        self.inner.frame.marker
    }

    pub fn handler_phase(&self) -> HandlerPhase {
        self.inner.frame.phase()
    }

    /// Continue the captured computation with `value`.
    ///
    /// Returns the result of the whole handled computation, as seen by the
    /// handler's return clause.
    pub fn resume(&self, ctx: &mut Context, value: Boxed) -> Ctl {
        stats::record_resume();
        if ctx.config().trace.handlers {
            tracing::trace!(marker = %self.marker(), "resume");
        }
        let cont = self.inner.cont.clone();
        handle::reenter(ctx, Rc::clone(&self.inner.frame), move |ctx| run_cont(ctx, cont, value))
    }

    pub fn resume_unit(&self, ctx: &mut Context) -> Ctl {
        self.resume(ctx, Boxed::unit())
    }
}

impl fmt::Debug for Resume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resume")
            .field("marker", &self.marker())
            .field("phase", &self.handler_phase())
            .field("rc", &Rc::strong_count(&self.inner))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_on_pure_runs_now() {
        let mut ctx = Context::default();
        let result = Ctl::pure(20i64).bind(&mut ctx, |_, v| Ctl::pure(v.as_i64().unwrap() + 1));
        assert_eq!(result.into_value().unwrap().as_i64(), Some(21));
    }

    #[test]
    fn test_bind_on_yield_defers() {
        let mut ctx = Context::default();
        let marker = Marker::fresh();
        let result = Ctl::yield_to(marker, |_, _| Ctl::unit()).bind(&mut ctx, |_, _| {
            panic!("continuation must not run before resumption")
        });
        assert_eq!(result.yield_marker(), Some(marker));
    }

    #[test]
    fn test_map_transforms_value() {
        let result = Ctl::pure(4i64).map(|v| Boxed::from_i64(v.as_i64().unwrap() * 10));
        assert_eq!(result.into_value().unwrap().as_i64(), Some(40));
    }

    #[test]
    fn test_deferred_steps_run_when_driven() {
        fn countdown(n: i64) -> Ctl {
            if n == 0 {
                Ctl::pure(-1i64)
            } else {
                Ctl::defer(move |_| countdown(n - 1))
            }
        }
        let mut ctx = Context::default();
        let pending = countdown(1_000_000);
        assert!(!pending.is_pure());
        assert_eq!(pending.drive(&mut ctx).into_value().unwrap().as_i64(), Some(-1));
    }

    #[test]
    fn test_bind_and_map_on_step_run_after_it() {
        let mut ctx = Context::default();
        let result = Ctl::defer(|_| Ctl::pure(3i64))
            .bind(&mut ctx, |_, v| Ctl::pure(v.as_i64().unwrap() + 1))
            .map(|v| Boxed::from_i64(v.as_i64().unwrap() * 10));
        assert_eq!(result.drive(&mut ctx).into_value().unwrap().as_i64(), Some(40));
    }

    #[test]
    fn test_undriven_step_is_an_error() {
        let err = Ctl::defer(|_| Ctl::unit()).into_value().unwrap_err();
        assert_eq!(err, RuntimeError::UndrivenStep);
    }

    #[test]
    fn test_escaped_yield_is_an_error() {
        let marker = Marker::fresh();
        let err = Ctl::yield_to(marker, |_, _| Ctl::unit()).into_value().unwrap_err();
        assert_eq!(err, RuntimeError::UnhandledYield { marker });
    }
}
