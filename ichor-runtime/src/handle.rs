//! # Handler Installation
//!
//! `handle` installs a handler object for the extent of an action:
//!
//! ```text
//! handle(h, ret, action)
//!   1. marker = fresh()
//!   2. push (tag(h), marker, h)
//!   3. r = action()
//!   4. pop
//!   5. r finished with v       -> ret(v)
//!      r yields to marker      -> op(Resume(k))
//!      r yields to another one -> keep yielding; k reinstalls this handler
//! ```
//!
//! The installation is represented by a [`Frame`] shared by the running
//! action and every resumption that captured it. The frame reaches
//! [`HandlerPhase::Uninstalled`] when the action has returned and no
//! resumption that could reinstall it remains.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::boxed::Boxed;
use crate::context::Context;
use crate::control::{Ctl, Resume};
use crate::error::{fatal, RuntimeError};
use crate::evidence::{EffectTag, Evidence, EvidenceScope, Marker};
use crate::heap::Obj;
use crate::stats;

/// A handler's return clause.
pub type ReturnFn = Rc<dyn Fn(&mut Context, Boxed) -> Ctl>;

/// Lifecycle of one handler installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerPhase {
    /// Marker allocated, action not started.
    Installed,
    /// The handler's entry is on the evidence vector.
    Active,
    /// The action finished and the return clause was applied.
    Returned,
    /// A resumption is putting the entry back.
    Reentered,
    /// No computation can reach the handler anymore.
    Uninstalled,
}

impl fmt::Display for HandlerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HandlerPhase::Installed => "installed",
            HandlerPhase::Active => "active",
            HandlerPhase::Returned => "returned",
            HandlerPhase::Reentered => "reentered",
            HandlerPhase::Uninstalled => "uninstalled",
        };
        f.write_str(name)
    }
}

/// One installation of a handler.
pub(crate) struct Frame {
    pub(crate) effect: EffectTag,
    pub(crate) marker: Marker,
    handler: Obj,
    ret: ReturnFn,
    phase: Cell<HandlerPhase>,
    trace: bool,
}

impl Frame {
    pub(crate) fn phase(&self) -> HandlerPhase {
        self.phase.get()
    }

    fn transition(&self, next: HandlerPhase) {
        if self.trace {
            tracing::trace!(
                effect = %self.effect,
                marker = %self.marker,
                from = %self.phase.get(),
                to = %next,
                "handler transition"
            );
        }
        self.phase.set(next);
    }

    fn evidence(&self) -> Evidence {
        Evidence {
            effect: self.effect,
            marker: self.marker,
            handler: self.handler.dup(),
        }
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        self.transition(HandlerPhase::Uninstalled);
        stats::record_uninstall();
    }
}

/// Run `action` with `handler` installed, finishing with `ret`.
///
/// # Panics
///
/// Panics if `handler` is not a handler object.
pub fn handle(
    ctx: &mut Context,
    handler: Obj,
    ret: impl Fn(&mut Context, Boxed) -> Ctl + 'static,
    action: impl FnOnce(&mut Context) -> Ctl,
) -> Ctl {
    let Some(effect) = handler.handler_effect() else {
        fatal(RuntimeError::NotAHandler { tag: handler.tag() });
    };
    let frame = Rc::new(Frame {
        effect,
        marker: Marker::fresh(),
        handler,
        ret: Rc::new(ret),
        phase: Cell::new(HandlerPhase::Installed),
        trace: ctx.config().trace.handlers,
    });
    stats::record_install();
    if frame.trace {
        tracing::trace!(effect = %frame.effect, marker = %frame.marker, "handler installed");
    }
    run(ctx, frame, action)
}

/// Run `action` with `handler` installed, returning its value unchanged.
pub fn handle_default(ctx: &mut Context, handler: Obj, action: impl FnOnce(&mut Context) -> Ctl) -> Ctl {
    handle(ctx, handler, |_, value| Ctl::Pure(value), action)
}

/// Put an existing installation back on top of the evidence and continue.
pub(crate) fn reenter(ctx: &mut Context, frame: Rc<Frame>, step: impl FnOnce(&mut Context) -> Ctl) -> Ctl {
    frame.transition(HandlerPhase::Reentered);
    run(ctx, frame, step)
}

fn run(ctx: &mut Context, frame: Rc<Frame>, step: impl FnOnce(&mut Context) -> Ctl) -> Ctl {
    let result = {
        let mut scope = EvidenceScope::enter(ctx, frame.evidence());
        frame.transition(HandlerPhase::Active);
        step(&mut scope).drive(&mut scope)
    };
    match result {
        Ctl::Pure(value) => {
            frame.transition(HandlerPhase::Returned);
            let ret = Rc::clone(&frame.ret);
            drop(frame);
            ret(ctx, value).drive(ctx)
        }
        Ctl::Yield(y) if y.marker() == frame.marker => {
            if frame.trace {
                tracing::trace!(effect = %frame.effect, marker = %frame.marker, "yield arrived");
            }
            let (op, cont) = y.into_parts();
            op(ctx, Resume::new(frame, cont)).drive(ctx)
        }
        Ctl::Yield(y) => Ctl::Yield(y.under_frame(frame)),
        Ctl::Step(_) => unreachable!("driven to completion above"),
    }
}
