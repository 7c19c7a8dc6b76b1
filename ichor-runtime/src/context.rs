//! Execution context.
//!
//! A [`Context`] owns the evidence vector of one thread of execution and the
//! configuration it runs under. Heap objects are not thread safe, so neither
//! is the context: it is `!Send`, and each thread creates its own.

use crate::boxed::Boxed;
use crate::config::RuntimeConfig;
use crate::control::{Ctl, Resume};
use crate::error::RuntimeError;
use crate::evidence::{EffectTag, Evidence, EvidenceScope, EvidenceVector, Marker};
use crate::handle;
use crate::heap::Obj;
use crate::perform::{self, Op};

pub struct Context {
    pub(crate) evidence: EvidenceVector,
    config: RuntimeConfig,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl Context {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            evidence: EvidenceVector::with_config(&config.evidence),
            config,
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn evidence(&self) -> &EvidenceVector {
        &self.evidence
    }

    /// The topmost handler entry for `effect`.
    pub fn handler_for(&self, effect: EffectTag) -> Option<&Evidence> {
        self.evidence.lookup(effect)
    }

    /// Push an evidence entry under a fresh marker, popped when the returned
    /// scope is dropped.
    pub fn install(&mut self, effect: EffectTag, handler: Obj) -> EvidenceScope<'_> {
        let entry = Evidence {
            effect,
            marker: Marker::fresh(),
            handler,
        };
        EvidenceScope::enter(self, entry)
    }

    /// See [`perform::perform`].
    pub fn perform(&mut self, op: Op, args: Vec<Boxed>) -> Ctl {
        perform::perform(self, op, args)
    }

    /// See [`handle::handle`].
    pub fn handle(
        &mut self,
        handler: Obj,
        ret: impl Fn(&mut Context, Boxed) -> Ctl + 'static,
        action: impl FnOnce(&mut Context) -> Ctl,
    ) -> Ctl {
        handle::handle(self, handler, ret, action)
    }

    pub fn handle_default(&mut self, handler: Obj, action: impl FnOnce(&mut Context) -> Ctl) -> Ctl {
        handle::handle_default(self, handler, action)
    }

    /// Yield to the handler installed under `marker`. See [`Ctl::yield_to`].
    pub fn yield_to(&self, marker: Marker, op: impl FnOnce(&mut Context, Resume) -> Ctl + 'static) -> Ctl {
        if self.config.trace.operations {
            tracing::trace!(%marker, "yield");
        }
        Ctl::yield_to(marker, op)
    }

    /// Resume `resume` with `value` in this context.
    pub fn resume(&mut self, resume: &Resume, value: Boxed) -> Ctl {
        resume.resume(self, value)
    }

    /// Run a top-level computation to its value.
    pub fn run(&mut self, main: impl FnOnce(&mut Context) -> Ctl) -> Result<Boxed, RuntimeError> {
        let result = main(&mut *self).drive(self).into_value();
        if !self.evidence.is_empty() {
            tracing::warn!(depth = self.evidence.len(), "evidence left installed after run");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvidenceConfig;
    use crate::handler::HandlerBuilder;

    const LOG: EffectTag = EffectTag::new("log");

    #[test]
    fn test_install_scopes_nest() {
        let mut ctx = Context::default();
        let mut outer = ctx.install(LOG, HandlerBuilder::new(LOG).build());
        let outer_marker = outer.marker();
        {
            let inner = outer.install(LOG, HandlerBuilder::new(LOG).build());
            assert_eq!(inner.handler_for(LOG).map(|ev| ev.marker), Some(inner.marker()));
        }
        assert_eq!(outer.handler_for(LOG).map(|ev| ev.marker), Some(outer_marker));
        drop(outer);
        assert!(ctx.handler_for(LOG).is_none());
    }

    #[test]
    fn test_run_returns_value() {
        let mut ctx = Context::new(RuntimeConfig {
            evidence: EvidenceConfig {
                initial_capacity: 2,
                ..EvidenceConfig::default()
            },
            ..RuntimeConfig::default()
        });
        let value = ctx.run(|_| Ctl::pure(7i64)).unwrap();
        assert_eq!(value.as_i64(), Some(7));
    }
}
