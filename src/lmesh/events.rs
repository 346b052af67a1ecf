//! Change notifications for subdivision hierarchies.
//!
//! Listeners are plain closures registered on one [`LoopMesh`](super::LoopMesh).
//! They run synchronously, inside the operation that raised the event, in
//! registration order.

use std::fmt;

/// Something that happened to a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeshEvent {
    /// A new, finer level was allocated.
    SubdivGenerated {
        /// Depth of the new level.
        level: usize,
    },
    /// An update down to `level` is about to run.
    UpdateRequested {
        /// Requested depth.
        level: usize,
    },
    /// Another hierarchy was merged into this one.
    Merged,
    /// Every level from `level` on was deleted.
    SubDeleted {
        /// First deleted level.
        level: usize,
    },
}

/// Handle returned by [`LoopMesh::subscribe`](super::LoopMesh::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&MeshEvent) + Send>;

#[derive(Default)]
pub(crate) struct Listeners {
    next: u64,
    list: Vec<(ListenerId, Callback)>,
}

impl Listeners {
    pub(crate) fn subscribe(&mut self, callback: Callback) -> ListenerId {
        let id = ListenerId(self.next);
        self.next += 1;
        self.list.push((id, callback));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.list.len();
        self.list.retain(|(l, _)| *l != id);
        self.list.len() != before
    }

    pub(crate) fn emit(&mut self, event: MeshEvent) {
        log::trace!("mesh event {:?} to {} listeners", event, self.list.len());
        for (_, callback) in &mut self.list {
            callback(&event);
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("len", &self.list.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_dispatch_in_order_and_unsubscribe() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();

        let first = Arc::clone(&log);
        let a = listeners.subscribe(Box::new(move |e| first.lock().unwrap().push((1, *e))));
        let second = Arc::clone(&log);
        listeners.subscribe(Box::new(move |e| second.lock().unwrap().push((2, *e))));

        listeners.emit(MeshEvent::Merged);
        assert!(listeners.unsubscribe(a));
        assert!(!listeners.unsubscribe(a));
        listeners.emit(MeshEvent::SubDeleted { level: 1 });

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (1, MeshEvent::Merged),
                (2, MeshEvent::Merged),
                (2, MeshEvent::SubDeleted { level: 1 })
            ]
        );
        assert_eq!(listeners.len(), 1);
    }
}
