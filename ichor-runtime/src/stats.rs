//! Per-thread runtime counters.
//!
//! The heap model and the handler protocol bump these counters as they run.
//! Each thread is one execution context for heap objects, so the counters of
//! one thread describe exactly the objects and handler frames it owns.
//!
//! Counters only grow; compare two [`RuntimeStats`] snapshots with
//! [`RuntimeStats::since`] to measure a region of code.

use std::cell::Cell;
use std::fmt;

use serde::Serialize;

thread_local! {
    static COUNTERS: Counters = const { Counters::new() };
}

struct Counters {
    allocs: Cell<u64>,
    reuses: Cell<u64>,
    frees: Cell<u64>,
    installs: Cell<u64>,
    uninstalls: Cell<u64>,
    resumes: Cell<u64>,
    performs: Cell<u64>,
}

impl Counters {
    const fn new() -> Self {
        Self {
            allocs: Cell::new(0),
            reuses: Cell::new(0),
            frees: Cell::new(0),
            installs: Cell::new(0),
            uninstalls: Cell::new(0),
            resumes: Cell::new(0),
            performs: Cell::new(0),
        }
    }
}

#[inline]
fn bump(select: impl FnOnce(&Counters) -> &Cell<u64>) {
    COUNTERS.with(|c| {
        let cell = select(c);
        cell.set(cell.get() + 1);
    });
}

pub(crate) fn record_alloc() {
    bump(|c| &c.allocs);
}

pub(crate) fn record_reuse() {
    bump(|c| &c.reuses);
}

pub(crate) fn record_free() {
    bump(|c| &c.frees);
}

pub(crate) fn record_install() {
    bump(|c| &c.installs);
}

pub(crate) fn record_uninstall() {
    bump(|c| &c.uninstalls);
}

pub(crate) fn record_resume() {
    bump(|c| &c.resumes);
}

pub(crate) fn record_perform() {
    bump(|c| &c.performs);
}

/// A snapshot of the current thread's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeStats {
    /// Fresh heap allocations.
    pub allocs: u64,
    /// Allocations satisfied in place from a reuse hole.
    pub reuses: u64,
    /// Heap storage released.
    pub frees: u64,
    /// Handler installations.
    pub installs: u64,
    /// Handler frames that reached their final state.
    pub uninstalls: u64,
    /// Resumption invocations.
    pub resumes: u64,
    /// Operation calls.
    pub performs: u64,
}

impl RuntimeStats {
    /// Heap objects whose storage is still held.
    pub fn live_objects(&self) -> i64 {
        self.allocs as i64 - self.frees as i64
    }

    /// Handler frames not yet uninstalled.
    pub fn live_handlers(&self) -> i64 {
        self.installs as i64 - self.uninstalls as i64
    }

    /// Counter growth between `earlier` and `self`.
    pub fn since(&self, earlier: &RuntimeStats) -> RuntimeStats {
        RuntimeStats {
            allocs: self.allocs - earlier.allocs,
            reuses: self.reuses - earlier.reuses,
            frees: self.frees - earlier.frees,
            installs: self.installs - earlier.installs,
            uninstalls: self.uninstalls - earlier.uninstalls,
            resumes: self.resumes - earlier.resumes,
            performs: self.performs - earlier.performs,
        }
    }
}

impl fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "allocations:   {:>10}", self.allocs)?;
        writeln!(f, "reuses:        {:>10}", self.reuses)?;
        writeln!(f, "frees:         {:>10}", self.frees)?;
        writeln!(f, "live objects:  {:>10}", self.live_objects())?;
        writeln!(f, "installs:      {:>10}", self.installs)?;
        writeln!(f, "uninstalls:    {:>10}", self.uninstalls)?;
        writeln!(f, "resumes:       {:>10}", self.resumes)?;
        write!(f, "operations:    {:>10}", self.performs)
    }
}

/// Read the current thread's counters.
pub fn snapshot() -> RuntimeStats {
    COUNTERS.with(|c| RuntimeStats {
        allocs: c.allocs.get(),
        reuses: c.reuses.get(),
        frees: c.frees.get(),
        installs: c.installs.get(),
        uninstalls: c.uninstalls.get(),
        resumes: c.resumes.get(),
        performs: c.performs.get(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_since_measures_growth() {
        let before = snapshot();
        record_alloc();
        record_alloc();
        record_free();
        let delta = snapshot().since(&before);
        assert_eq!(delta.allocs, 2);
        assert_eq!(delta.frees, 1);
        assert_eq!(delta.live_objects(), 1);
    }
}
