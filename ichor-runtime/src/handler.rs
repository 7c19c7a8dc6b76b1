//! Handler objects and clauses.
//!
//! A handler object is a heap object holding one clause per operation of its
//! effect, indexed by operation number. Clauses are heap objects themselves,
//! so clause selection follows the usual ownership rules: a unique handler
//! gives its clause away and is freed, a shared one hands out a new
//! reference.

use std::rc::Rc;

use crate::boxed::Boxed;
use crate::context::Context;
use crate::control::{Ctl, Resume};
use crate::error::{fatal, RuntimeError};
use crate::evidence::{EffectTag, Marker};
use crate::heap::Obj;

/// A clause object: the code run when its operation is performed.
#[derive(Debug)]
pub struct Clause(Obj);

impl Clause {
    /// A clause with direct access to its handler's marker.
    pub fn new(code: impl Fn(&mut Context, Marker, Vec<Boxed>) -> Ctl + 'static) -> Clause {
        Clause(Obj::clause(Rc::new(code)))
    }

    /// A tail-resumptive clause: its result is the operation's result.
    pub fn tail(code: impl Fn(&mut Context, Vec<Boxed>) -> Ctl + 'static) -> Clause {
        Clause::new(move |ctx, _, args| code(ctx, args))
    }

    /// A tail-resumptive clause computing a plain value.
    pub fn value(code: impl Fn(Vec<Boxed>) -> Boxed + 'static) -> Clause {
        Clause::new(move |_, _, args| Ctl::Pure(code(args)))
    }

    /// A clause that captures the resumption.
    ///
    /// The code runs at the handler, after the evidence installed inside the
    /// handler has been unwound. Its result is the result of the handled
    /// computation unless it resumes.
    pub fn control(code: impl Fn(&mut Context, Vec<Boxed>, Resume) -> Ctl + 'static) -> Clause {
        let code = Rc::new(code);
        Clause::new(move |_, marker, args| {
            let code = Rc::clone(&code);
            Ctl::yield_to(marker, move |ctx, resume| code(ctx, args, resume))
        })
    }

    /// A clause that never resumes.
    pub fn never(code: impl Fn(&mut Context, Vec<Boxed>) -> Ctl + 'static) -> Clause {
        Clause::control(move |ctx, args, resume| {
            drop(resume);
            code(ctx, args)
        })
    }

    pub fn from_obj(obj: Obj) -> Result<Clause, Obj> {
        if obj.is_clause() {
            Ok(Clause(obj))
        } else {
            Err(obj)
        }
    }

    pub fn into_obj(self) -> Obj {
        self.0
    }

    pub fn as_obj(&self) -> &Obj {
        &self.0
    }

    /// Run the clause for the handler installed under `marker`.
    pub fn call(self, ctx: &mut Context, marker: Marker, args: Vec<Boxed>) -> Ctl {
        let Some(code) = self.0.clause_code() else {
            unreachable!("clause object without clause code");
        };
        drop(self);
        code(ctx, marker, args)
    }
}

/// Builds a handler object, one clause per operation in index order.
#[derive(Debug)]
pub struct HandlerBuilder {
    effect: EffectTag,
    clauses: Vec<Boxed>,
}

impl HandlerBuilder {
    pub fn new(effect: EffectTag) -> Self {
        Self {
            effect,
            clauses: Vec::new(),
        }
    }

    /// Append the clause for the next operation index.
    pub fn op(mut self, clause: Clause) -> Self {
        self.clauses.push(Boxed::Obj(clause.into_obj()));
        self
    }

    pub fn build(self) -> Obj {
        Obj::handler(self.effect, self.clauses)
    }
}

/// Take clause `index` out of `handler`.
///
/// A unique handler moves the clause out and is freed; a shared handler
/// duplicates the clause and drops this reference.
///
/// # Panics
///
/// Panics if `handler` is not a handler object, or if `index` is not one of
/// its operations.
pub fn select_clause(handler: Obj, index: usize) -> Clause {
    let Some(effect) = handler.handler_effect() else {
        fatal(RuntimeError::NotAHandler { tag: handler.tag() });
    };
    let clauses = handler.scan_count();
    if index >= clauses {
        fatal(RuntimeError::UnknownOperation {
            effect,
            index,
            clauses,
        });
    }
    let field = match handler.try_unique() {
        Ok(mut unique) => unique.take_field(index),
        Err(shared) => shared.fields()[index].dup(),
    };
    match field.into_obj().map(Clause::from_obj) {
        Ok(Ok(clause)) => clause,
        _ => fatal(RuntimeError::NotAClause { effect, index }),
    }
}
