//! Output sinks for flushed log text
//!
//! The logger never owns a listener. It keeps a weak reference in a
//! generation-checked slot arena, so a sink dropped by its owner is noticed
//! at the next flush and its slot is recycled.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError, Weak};

/// A sink receiving batches of parseable log records
pub trait LogListener: Send + Sync {
    /// Write one flushed batch and push it through to the underlying output
    fn write_batch(&self, text: &str) -> io::Result<()>;
}

impl<W: Write + Send> LogListener for Mutex<W> {
    fn write_batch(&self, text: &str) -> io::Result<()> {
        let mut writer = self.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(text.as_bytes())?;
        writer.flush()
    }
}

/// Handle to a registered listener
///
/// Stays valid until the listener is removed; a recycled slot gets a new
/// generation so stale handles never match it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId {
    index: u32,
    generation: u32,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    sink: Option<Weak<dyn LogListener>>,
}

/// Weakly-held listeners keyed by slot
#[derive(Default)]
pub struct ListenerSet {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

fn same_sink(a: &Weak<dyn LogListener>, b: &Weak<dyn LogListener>) -> bool {
    std::ptr::addr_eq(a.as_ptr(), b.as_ptr())
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink, returning the existing handle if it is already present
    pub fn insert(&mut self, sink: Weak<dyn LogListener>) -> ListenerId {
        if let Some(id) = self.find(&sink) {
            return id;
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.sink = Some(sink);
        self.len += 1;
        ListenerId {
            index,
            generation: slot.generation,
        }
    }

    /// Handle of a registered sink, dead or alive
    ///
    /// A registered `Weak` keeps its allocation reserved, so a new sink can
    /// never share an address with an entry that is still in the set.
    pub fn find(&self, sink: &Weak<dyn LogListener>) -> Option<ListenerId> {
        self.slots.iter().enumerate().find_map(|(index, slot)| {
            slot.sink
                .as_ref()
                .filter(|s| same_sink(s, sink))
                .map(|_| ListenerId {
                    index: index as u32,
                    generation: slot.generation,
                })
        })
    }

    /// Unregister by handle; false if the handle is stale
    pub fn remove(&mut self, id: ListenerId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation || slot.sink.is_none() {
            return false;
        }
        slot.sink = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        true
    }

    /// Unregister a sink by identity
    pub fn remove_sink(&mut self, sink: &Weak<dyn LogListener>) -> bool {
        match self.find(sink) {
            Some(id) => self.remove(id),
            None => false,
        }
    }

    /// Copy of the current entries, safe to iterate while the set changes
    pub fn snapshot(&self) -> Vec<(ListenerId, Weak<dyn LogListener>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.sink.as_ref().map(|sink| {
                    (
                        ListenerId {
                            index: index as u32,
                            generation: slot.generation,
                        },
                        Weak::clone(sink),
                    )
                })
            })
            .collect()
    }

    /// Number of registered entries, dead or alive
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
