//! Fixed-capacity session table and the name registry folded into it

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Slot count used when nothing else is configured
pub const DEFAULT_CAPACITY: usize = 10;

/// Reasons a name cannot be committed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("name '{0}' is already in use")]
    Duplicate(String),

    #[error("name is empty")]
    Empty,
}

/// One entry of the table
#[derive(Debug, Default)]
struct Slot {
    /// Empty until the occupant has joined
    name: String,
    occupied: bool,
    queue: Option<mpsc::Sender<String>>,
}

/// Copy of the fields a broadcast needs from one occupied slot
#[derive(Debug, Clone)]
pub struct SlotSnapshot {
    pub index: usize,
    pub name: String,
    pub queue: mpsc::Sender<String>,
}

/// Registry of session slots shared by all connection tasks
///
/// Every mutation and every name check happens under the same lock, so a
/// check-then-commit on a name is a single step.
#[derive(Debug)]
pub struct SessionTable {
    slots: Mutex<Vec<Slot>>,
}

impl SessionTable {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Slot::default()).collect();
        Self {
            slots: Mutex::new(slots),
        }
    }

    /// Reserve the first free slot and attach a fresh delivery queue to it
    pub fn allocate(&self, queue: mpsc::Sender<String>) -> Option<usize> {
        let mut slots = self.slots.lock();
        let (index, slot) = slots.iter_mut().enumerate().find(|(_, s)| !s.occupied)?;

        slot.occupied = true;
        slot.name.clear();
        slot.queue = Some(queue);
        Some(index)
    }

    /// Clear the name, drop the queue handle and mark the slot free
    pub fn release(&self, index: usize) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            *slot = Slot::default();
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.occupied).count()
    }

    /// Visit a snapshot of every occupied slot, in slot order
    ///
    /// The lock is released before `visitor` runs.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&SlotSnapshot),
    {
        for snapshot in self.snapshot() {
            visitor(&snapshot);
        }
    }

    pub fn snapshot(&self) -> Vec<SlotSnapshot> {
        self.slots
            .lock()
            .iter()
            .enumerate()
            .filter(|(_, s)| s.occupied)
            .filter_map(|(index, s)| {
                s.queue.as_ref().map(|queue| SlotSnapshot {
                    index,
                    name: s.name.clone(),
                    queue: queue.clone(),
                })
            })
            .collect()
    }

    /// True if an occupied slot carries `candidate`. Empty names are never taken.
    pub fn is_name_taken(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }
        self.slots
            .lock()
            .iter()
            .any(|s| s.occupied && s.name == candidate)
    }

    /// Check `candidate` for uniqueness and commit it to `index` atomically
    ///
    /// Returns the slot's previous name (empty on first join).
    pub fn claim_name(&self, index: usize, candidate: &str) -> Result<String, NameError> {
        if candidate.trim().is_empty() {
            return Err(NameError::Empty);
        }

        let mut slots = self.slots.lock();
        if slots.iter().any(|s| s.occupied && s.name == candidate) {
            return Err(NameError::Duplicate(candidate.to_string()));
        }

        match slots.get_mut(index) {
            Some(slot) if slot.occupied => Ok(std::mem::replace(
                &mut slot.name,
                candidate.to_string(),
            )),
            _ => Err(NameError::Empty),
        }
    }

    /// Names of all joined sessions, in slot order
    pub fn list_active_names(&self) -> Vec<String> {
        self.slots
            .lock()
            .iter()
            .filter(|s| s.occupied && !s.name.is_empty())
            .map(|s| s.name.clone())
            .collect()
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
