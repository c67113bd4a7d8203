//! Per-connection handler registry.
//!
//! # Responsibilities
//! - Map stream/session ids to live handlers
//! - Track the application task of each exchange
//! - Remember opened ids so they are never reopened
//!
//! # Design Decisions
//! - Routing entry and task entry are removed independently: a closed session
//!   stops receiving events while its application may still be running
//! - Opened ids are kept as a floor per stream type plus the few ids opened
//!   out of order above it, so memory tracks the gaps rather than the history

use std::collections::{BTreeSet, HashMap};

use tokio::task::AbortHandle;

use crate::transport::StreamId;

/// Ids of one type are spaced this far apart.
const ID_STEP: StreamId = 4;

/// Every id ever opened on a connection.
#[derive(Debug)]
struct OpenedIds {
    /// Per stream type, every id below the floor has been opened.
    floor: [StreamId; 4],
    /// Opened ids at or above their type's floor.
    ahead: BTreeSet<StreamId>,
}

impl OpenedIds {
    fn new() -> Self {
        Self {
            floor: [0, 1, 2, 3],
            ahead: BTreeSet::new(),
        }
    }

    fn contains(&self, id: StreamId) -> bool {
        id < self.floor[Self::kind(id)] || self.ahead.contains(&id)
    }

    fn insert(&mut self, id: StreamId) {
        let floor = &mut self.floor[Self::kind(id)];
        if id < *floor {
            return;
        }
        self.ahead.insert(id);
        while self.ahead.remove(&*floor) {
            *floor += ID_STEP;
        }
    }

    fn kind(id: StreamId) -> usize {
        (id & 0x3) as usize
    }
}

#[derive(Debug)]
pub(crate) struct Registry<H> {
    handlers: HashMap<StreamId, H>,
    tasks: HashMap<StreamId, AbortHandle>,
    opened: OpenedIds,
    terminated: bool,
}

impl<H: Clone> Registry<H> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            tasks: HashMap::new(),
            opened: OpenedIds::new(),
            terminated: false,
        }
    }

    /// True if `id` has never been registered.
    pub(crate) fn is_vacant(&self, id: StreamId) -> bool {
        !self.opened.contains(id)
    }

    pub(crate) fn register(&mut self, id: StreamId, handler: H, task: AbortHandle) {
        debug_assert!(self.is_vacant(id), "stream {id} registered twice");
        self.opened.insert(id);
        self.handlers.insert(id, handler);
        self.tasks.insert(id, task);
    }

    pub(crate) fn get(&self, id: StreamId) -> Option<H> {
        self.handlers.get(&id).cloned()
    }

    /// Opened once and no longer routed.
    pub(crate) fn is_retired(&self, id: StreamId) -> bool {
        self.opened.contains(id) && !self.handlers.contains_key(&id)
    }

    /// Stop routing events to `id`. Returns the handler if it was live.
    pub(crate) fn retire(&mut self, id: StreamId) -> Option<H> {
        self.handlers.remove(&id)
    }

    /// The application task for `id` ended; retire it as well.
    pub(crate) fn task_finished(&mut self, id: StreamId) -> Option<H> {
        self.tasks.remove(&id);
        self.retire(id)
    }

    /// Retire everything and hand back the tasks still running.
    pub(crate) fn terminate(&mut self) -> (Vec<H>, Vec<AbortHandle>) {
        self.terminated = true;
        let handlers = self.handlers.drain().map(|(_, handler)| handler).collect();
        let tasks = self.tasks.drain().map(|(_, task)| task).collect();
        (handlers, tasks)
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of handlers still receiving events.
    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Number of application tasks still running.
    pub(crate) fn running_tasks(&self) -> usize {
        self.tasks.len()
    }
}
