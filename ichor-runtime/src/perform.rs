//! Operation calls.
//!
//! ```text
//! perform(op, args)
//!   1. ev     = lookup(op.effect)            topmost entry, or fatal
//!   2. clause = select_clause(dup(ev.handler), op.index)
//!   3. mask the evidence from ev up
//!   4. clause(ev.marker, args)
//! ```
//!
//! Step 3 makes operations performed by the clause resolve to handlers
//! installed outside the one whose clause is running. The mask also covers
//! the rest of the clause body after it is resumed from a suspension.

use crate::boxed::Boxed;
use crate::context::Context;
use crate::control::Ctl;
use crate::error::{fatal, RuntimeError};
use crate::evidence::{EffectTag, MaskedEvidence};
use crate::handler::select_clause;
use crate::stats;

/// A statically known operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Op {
    pub effect: EffectTag,
    /// Index of the operation's clause in the handler.
    pub index: usize,
    /// Precomputed distance of the handler from the top of the evidence.
    pub hint: Option<usize>,
}

impl Op {
    pub const fn new(effect: EffectTag, index: usize) -> Self {
        Self {
            effect,
            index,
            hint: None,
        }
    }

    pub const fn with_hint(self, distance: usize) -> Self {
        Self {
            hint: Some(distance),
            ..self
        }
    }
}

/// Call operation `op` with `args`.
///
/// # Panics
///
/// Panics if no handler for `op.effect` is installed, or if the handler has
/// no clause for `op.index`.
pub fn perform(ctx: &mut Context, op: Op, args: Vec<Boxed>) -> Ctl {
    stats::record_perform();
    let hint = op.hint.filter(|_| ctx.config().evidence.use_index_hints);
    let Some(index) = ctx.evidence.lookup_index(op.effect, hint) else {
        fatal(RuntimeError::MissingHandler { effect: op.effect });
    };
    let (marker, handler) = match ctx.evidence.get(index) {
        Some(ev) => (ev.marker, ev.handler.dup()),
        None => unreachable!("lookup returned an index past the top"),
    };
    if ctx.config().trace.operations {
        tracing::trace!(effect = %op.effect, op = op.index, %marker, depth = index, "perform");
    }
    let clause = select_clause(handler, op.index);
    let mut masked = MaskedEvidence::enter(ctx, index);
    let result = clause.call(&mut masked, marker, args).drive(&mut masked);
    drop(masked);
    result.under_clause(marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Clause, HandlerBuilder};

    const ASK: EffectTag = EffectTag::new("ask");

    #[test]
    fn test_hint_and_scan_agree() {
        let mut ctx = Context::default();
        let handler = HandlerBuilder::new(ASK)
            .op(Clause::value(|_| Boxed::from_i64(5)))
            .build();
        let result = ctx.handle_default(handler, |ctx| {
            let hinted = perform(ctx, Op::new(ASK, 0).with_hint(0), Vec::new());
            hinted.bind(ctx, |ctx, a| {
                let a = a.as_i64().unwrap();
                perform(ctx, Op::new(ASK, 0), Vec::new()).map(move |b| Boxed::from_i64(a + b.as_i64().unwrap()))
            })
        });
        assert_eq!(result.into_value().unwrap().as_i64(), Some(10));
    }

    #[test]
    fn test_clause_sees_evidence_below_its_handler() {
        let mut ctx = Context::default();
        let handler = HandlerBuilder::new(ASK)
            .op(Clause::tail(|ctx, _| Ctl::pure(ctx.evidence().len() as i64)))
            .build();
        let result = ctx.handle_default(handler, |ctx| perform(ctx, Op::new(ASK, 0), Vec::new()));
        assert_eq!(result.into_value().unwrap().as_i64(), Some(0));
    }

    #[test]
    #[should_panic(expected = "no handler installed for effect `ask`")]
    fn test_missing_handler_is_fatal() {
        let mut ctx = Context::default();
        perform(&mut ctx, Op::new(ASK, 0), Vec::new());
    }
}
