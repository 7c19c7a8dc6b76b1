//! # Evidence Vector
//!
//! The evidence vector is the dynamic stack of installed handlers of one
//! execution context. Each entry pairs an effect tag with the handler object
//! and a marker that is unique to that installation:
//!
//! ```text
//! index:   0            1            2   <- top
//!        [ (exn, m1) ] [ (st, m2) ] [ (st, m3) ]
//! ```
//!
//! Lookup finds the topmost entry for a tag, so an inner handler shadows an
//! outer one for the same effect. Pushes and pops nest: the guards in this
//! module borrow the context mutably for as long as their entry is
//! installed, so an entry cannot be popped out of order in safe code.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bits;
use crate::config::EvidenceConfig;
use crate::context::Context;
use crate::error::{fatal, RuntimeError};
use crate::heap::Obj;

/// Identity of an effect.
///
/// Effect tags compare by name; generated code shares one `static` per effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EffectTag(&'static str);

impl EffectTag {
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub const fn name(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for EffectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

static NEXT_MARKER: AtomicU64 = AtomicU64::new(1);

/// Identity of one handler installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Marker(u64);

impl Marker {
    /// A marker distinct from every marker handed out before, on any thread.
    pub fn fresh() -> Self {
        Self(NEXT_MARKER.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// One installed handler.
#[derive(Debug)]
pub struct Evidence {
    pub effect: EffectTag,
    pub marker: Marker,
    /// Owned reference to the handler object.
    pub handler: Obj,
}

/// The stack of installed handlers.
#[derive(Debug, Default)]
pub struct EvidenceVector {
    entries: Vec<Evidence>,
    max_depth: Option<usize>,
}

impl EvidenceVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: &EvidenceConfig) -> Self {
        Self {
            entries: Vec::with_capacity(bits::next_power_of_two(config.initial_capacity)),
            max_depth: config.max_depth,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Install `handler` for `effect` under a fresh marker.
    pub fn push(&mut self, effect: EffectTag, handler: Obj) -> Marker {
        let marker = Marker::fresh();
        self.push_entry(Evidence {
            effect,
            marker,
            handler,
        });
        marker
    }

    pub(crate) fn push_entry(&mut self, entry: Evidence) {
        if let Some(max) = self.max_depth {
            if self.entries.len() >= max {
                fatal(RuntimeError::EvidenceOverflow { max });
            }
        }
        if self.entries.len() == self.entries.capacity() {
            // Grow to the next power of two.
            let target = bits::next_power_of_two(self.entries.len() + 1);
            self.entries.reserve_exact(target - self.entries.len());
        }
        self.entries.push(entry);
    }

    /// Remove the top entry.
    pub fn pop(&mut self) -> Option<Evidence> {
        self.entries.pop()
    }

    /// Remove the entry installed under `marker` and everything above it.
    ///
    /// Entries above `marker` can only be present if a guard was leaked;
    /// they are discarded and the event is logged.
    pub(crate) fn pop_marker(&mut self, marker: Marker) -> Option<Evidence> {
        let Some(position) = self.position(marker) else {
            tracing::error!(%marker, "popping a marker that is not installed");
            return None;
        };
        let above = self.entries.len() - position - 1;
        if above > 0 {
            tracing::debug!(%marker, discarded = above, "repairing evidence entries left above a popped handler");
            self.entries.truncate(position + 1);
        }
        self.entries.pop()
    }

    /// The topmost entry for `effect`.
    pub fn lookup(&self, effect: EffectTag) -> Option<&Evidence> {
        self.entries.iter().rev().find(|ev| ev.effect == effect)
    }

    /// Index of the topmost entry for `effect`.
    ///
    /// `hint` is a precomputed distance from the top. When the entry at that
    /// position carries `effect` it is returned without scanning. A hint that
    /// is out of range or lands on another effect falls back to the scan.
    ///
    /// Hints come from the static evidence layout, which never points below a
    /// shadowing entry; debug builds check this.
    pub fn lookup_index(&self, effect: EffectTag, hint: Option<usize>) -> Option<usize> {
        let len = self.entries.len();
        if let Some(distance) = hint.filter(|&d| d < len) {
            let index = len - 1 - distance;
            if self.entries[index].effect == effect {
                debug_assert!(
                    self.entries[index + 1..].iter().all(|ev| ev.effect != effect),
                    "index hint {distance} for `{effect}` points below a shadowing entry"
                );
                return Some(index);
            }
        }
        self.entries.iter().rposition(|ev| ev.effect == effect)
    }

    /// Index of the entry installed under `marker`.
    pub fn position(&self, marker: Marker) -> Option<usize> {
        self.entries.iter().rposition(|ev| ev.marker == marker)
    }

    pub fn get(&self, index: usize) -> Option<&Evidence> {
        self.entries.get(index)
    }

    pub fn top(&self) -> Option<&Evidence> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Evidence> {
        self.entries.iter()
    }

    /// Markers from bottom to top.
    pub fn markers(&self) -> Vec<Marker> {
        self.entries.iter().map(|ev| ev.marker).collect()
    }

    /// Effect and marker of each entry, bottom to top.
    pub fn snapshot(&self) -> Vec<(EffectTag, Marker)> {
        self.entries.iter().map(|ev| (ev.effect, ev.marker)).collect()
    }

    fn split_off(&mut self, index: usize) -> Vec<Evidence> {
        self.entries.split_off(index)
    }

    fn restore(&mut self, depth: usize, mut upper: Vec<Evidence>) {
        if self.entries.len() != depth {
            tracing::debug!(
                expected = depth,
                found = self.entries.len(),
                "evidence depth changed under a masked clause"
            );
            self.entries.truncate(depth);
        }
        self.entries.append(&mut upper);
    }
}

/// An installed evidence entry, popped when the guard is dropped.
///
/// The guard dereferences to the [`Context`], so the computation that runs
/// under the handler uses the guard in place of the context.
pub struct EvidenceScope<'a> {
    ctx: &'a mut Context,
    marker: Marker,
}

impl<'a> EvidenceScope<'a> {
    pub(crate) fn enter(ctx: &'a mut Context, entry: Evidence) -> Self {
        let marker = entry.marker;
        ctx.evidence.push_entry(entry);
        Self { ctx, marker }
    }

    pub fn marker(&self) -> Marker {
        self.marker
    }
}

impl Deref for EvidenceScope<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &*self.ctx
    }
}

impl DerefMut for EvidenceScope<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }
}

impl Drop for EvidenceScope<'_> {
    fn drop(&mut self) {
        self.ctx.evidence.pop_marker(self.marker);
    }
}

/// Evidence above a handler hidden while one of its clauses runs.
///
/// Operations performed by the clause resolve against the handlers that were
/// installed outside the handler whose clause is running.
pub(crate) struct MaskedEvidence<'a> {
    ctx: &'a mut Context,
    depth: usize,
    hidden: Vec<Evidence>,
}

impl<'a> MaskedEvidence<'a> {
    pub(crate) fn enter(ctx: &'a mut Context, index: usize) -> Self {
        let hidden = ctx.evidence.split_off(index);
        Self {
            ctx,
            depth: index,
            hidden,
        }
    }
}

impl Deref for MaskedEvidence<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &*self.ctx
    }
}

impl DerefMut for MaskedEvidence<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }
}

impl Drop for MaskedEvidence<'_> {
    fn drop(&mut self) {
        let hidden = std::mem::take(&mut self.hidden);
        self.ctx.evidence.restore(self.depth, hidden);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerBuilder;

    const STATE: EffectTag = EffectTag::new("state");
    const EXN: EffectTag = EffectTag::new("exn");

    fn handler(effect: EffectTag) -> Obj {
        HandlerBuilder::new(effect).build()
    }

    #[test]
    fn test_markers_are_unique() {
        let a = Marker::fresh();
        let b = Marker::fresh();
        assert_ne!(a, b);
        assert!(b > a);
    }

    #[test]
    fn test_lookup_finds_innermost() {
        let mut ev = EvidenceVector::new();
        ev.push(EXN, handler(EXN));
        let outer = ev.push(STATE, handler(STATE));
        let inner = ev.push(STATE, handler(STATE));
        assert_ne!(outer, inner);
        assert_eq!(ev.lookup(STATE).map(|e| e.marker), Some(inner));
        assert_eq!(ev.lookup_index(EXN, None), Some(0));
        ev.pop();
        assert_eq!(ev.lookup(STATE).map(|e| e.marker), Some(outer));
    }

    #[test]
    fn test_lookup_missing_effect() {
        let mut ev = EvidenceVector::new();
        ev.push(EXN, handler(EXN));
        assert!(ev.lookup(STATE).is_none());
        assert_eq!(ev.lookup_index(STATE, Some(0)), None);
    }

    #[test]
    fn test_stale_hint_falls_back_to_scan() {
        let mut ev = EvidenceVector::new();
        ev.push(STATE, handler(STATE));
        ev.push(EXN, handler(EXN));
        // Correct hint: one below the top.
        assert_eq!(ev.lookup_index(STATE, Some(1)), Some(0));
        // Wrong tag at the hinted position.
        assert_eq!(ev.lookup_index(STATE, Some(0)), Some(0));
        // Out of range.
        assert_eq!(ev.lookup_index(STATE, Some(9)), Some(0));
    }

    #[test]
    fn test_hint_selects_entry_by_distance() {
        let mut ev = EvidenceVector::new();
        ev.push(STATE, handler(STATE));
        for _ in 0..6 {
            ev.push(EXN, handler(EXN));
        }
        assert_eq!(ev.lookup_index(STATE, Some(6)), Some(0));
        assert_eq!(ev.lookup_index(EXN, Some(0)), Some(6));
        assert_eq!(ev.lookup_index(STATE, None), Some(0));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "points below a shadowing entry")]
    fn test_hint_below_shadowing_entry_is_caught() {
        let mut ev = EvidenceVector::new();
        ev.push(STATE, handler(STATE));
        ev.push(EXN, handler(EXN));
        ev.push(STATE, handler(STATE));
        ev.lookup_index(STATE, Some(2));
    }

    #[test]
    fn test_position_of_marker() {
        let mut ev = EvidenceVector::new();
        let a = ev.push(EXN, handler(EXN));
        let b = ev.push(STATE, handler(STATE));
        assert_eq!(ev.position(a), Some(0));
        assert_eq!(ev.position(b), Some(1));
        ev.pop();
        assert_eq!(ev.position(b), None);
    }

    #[test]
    fn test_capacity_grows_in_powers_of_two() {
        let config = EvidenceConfig {
            initial_capacity: 3,
            ..EvidenceConfig::default()
        };
        let mut ev = EvidenceVector::with_config(&config);
        assert!(ev.capacity() >= 4);
        for _ in 0..5 {
            ev.push(EXN, handler(EXN));
        }
        assert!(ev.capacity() >= 8);
    }

    #[test]
    #[should_panic(expected = "maximum depth of 2")]
    fn test_max_depth_is_fatal() {
        let config = EvidenceConfig {
            max_depth: Some(2),
            ..EvidenceConfig::default()
        };
        let mut ev = EvidenceVector::with_config(&config);
        for _ in 0..3 {
            ev.push(EXN, handler(EXN));
        }
    }

    #[test]
    fn test_pop_marker_discards_leaked_entries() {
        let mut ev = EvidenceVector::new();
        let base = ev.push(EXN, handler(EXN));
        let mid = ev.push(STATE, handler(STATE));
        ev.push(STATE, handler(STATE));
        let popped = ev.pop_marker(mid).unwrap();
        assert_eq!(popped.marker, mid);
        assert_eq!(ev.markers(), vec![base]);
    }

    #[test]
    fn test_scope_pops_on_drop() {
        let mut ctx = Context::default();
        {
            let scope = ctx.install(STATE, handler(STATE));
            assert_eq!(scope.evidence().len(), 1);
        }
        assert!(ctx.evidence().is_empty());
    }

    #[test]
    fn test_masked_evidence_restores() {
        let mut ctx = Context::default();
        let outer = ctx.evidence.push(EXN, handler(EXN));
        let inner = ctx.evidence.push(STATE, handler(STATE));
        {
            let masked = MaskedEvidence::enter(&mut ctx, 1);
            assert_eq!(masked.evidence().markers(), vec![outer]);
        }
        assert_eq!(ctx.evidence().markers(), vec![outer, inner]);
    }
}
