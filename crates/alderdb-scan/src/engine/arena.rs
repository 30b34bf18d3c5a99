//! Scoped memory arenas for transient scan allocations.
//!
//! The scan arena is the single release point for anything the cursor
//! stashes while fetching or rechecking tuples; it is released in one
//! operation at scan close, never field by field.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

///
/// QueryArena
///
/// Query-lifetime arena. Scans allocate their scoped arenas as children so
/// lifecycle tests can observe that every child is released exactly once.
///

#[derive(Debug, Default)]
pub struct QueryArena {
    live_children: Rc<Cell<usize>>,
}

impl QueryArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a scan-scoped child arena.
    #[must_use]
    pub fn child_scan_arena(&self, label: &'static str) -> ScanArena {
        self.live_children.set(self.live_children.get() + 1);
        ScanArena {
            label,
            live_children: Rc::clone(&self.live_children),
            scratch: RefCell::new(Vec::new()),
            released: Cell::new(false),
        }
    }

    /// Number of child scan arenas not yet released.
    #[must_use]
    pub fn live_scan_arenas(&self) -> usize {
        self.live_children.get()
    }
}

///
/// ScanArena
///
/// Scan-lifetime arena: holds transient buffers for the owning scan and
/// releases them all at once.
///

#[derive(Debug)]
pub struct ScanArena {
    label: &'static str,
    live_children: Rc<Cell<usize>>,
    scratch: RefCell<Vec<Vec<u8>>>,
    released: Cell<bool>,
}

impl ScanArena {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }

    /// Park a transient buffer in the arena until release.
    pub fn stash(&self, bytes: Vec<u8>) {
        self.scratch.borrow_mut().push(bytes);
    }

    #[must_use]
    pub fn bytes_held(&self) -> usize {
        self.scratch.borrow().iter().map(Vec::len).sum()
    }

    /// Release everything held by this arena in one operation. Safe to call
    /// once; later calls and the eventual drop are no-ops.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        self.scratch.borrow_mut().clear();
        self.live_children.set(self.live_children.get().saturating_sub(1));
    }
}

impl Drop for ScanArena {
    fn drop(&mut self) {
        self.release();
    }
}
