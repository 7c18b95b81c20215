//=========================================================================
// Frame Event
//=========================================================================
//
// Per-frame callback hook invoked by the main loop after the simulation
// step and before render dispatch, on the main thread, with no arguments.
//
// Subscribers run in subscription order. The first error stops the
// remaining subscribers and is handed back to the main loop.
//
//=========================================================================

//=== External Dependencies ===============================================

use log::trace;

//=== Types ===============================================================

/// Error returned by a frame callback.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by a frame callback.
pub type CallbackResult = Result<(), CallbackError>;

/// Identifies a subscription so it can be disconnected later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type Callback = Box<dyn FnMut() -> CallbackResult>;

//=== FrameEvent ==========================================================

/// Multi-subscriber event fired once per main loop iteration.
///
/// # Examples
///
/// ```
/// use aetheric_app::core::FrameEvent;
///
/// let mut event = FrameEvent::new();
/// let id = event.connect(|| {
///     // editor / profiler work
///     Ok(())
/// });
///
/// event.invoke().unwrap();
/// assert!(event.disconnect(id));
/// ```
#[derive(Default)]
pub struct FrameEvent {
    subscribers: Vec<(CallbackId, Callback)>,
    next_id: u64,
}

impl FrameEvent {
    /// Creates an event with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a callback. Returns the id used to disconnect it.
    pub fn connect<F>(&mut self, callback: F) -> CallbackId
    where
        F: FnMut() -> CallbackResult + 'static,
    {
        let id = CallbackId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    /// Removes a subscription. Returns `false` if it was not connected.
    pub fn disconnect(&mut self, id: CallbackId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    /// Removes every subscription.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Calls every subscriber in subscription order.
    ///
    /// # Errors
    ///
    /// Returns the first subscriber error; later subscribers are skipped.
    pub fn invoke(&mut self) -> CallbackResult {
        trace!(target: "app", "Invoking {} frame callback(s)", self.subscribers.len());
        for (_, callback) in self.subscribers.iter_mut() {
            callback()?;
        }
        Ok(())
    }

    /// Number of connected callbacks.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl std::fmt::Debug for FrameEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameEvent")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn empty_event_invokes_ok() {
        let mut event = FrameEvent::new();
        assert!(event.invoke().is_ok());
        assert!(event.is_empty());
    }

    #[test]
    fn subscribers_run_in_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut event = FrameEvent::new();

        for name in ["editor", "profiler", "game"] {
            let log = Rc::clone(&log);
            event.connect(move || {
                log.borrow_mut().push(name);
                Ok(())
            });
        }

        event.invoke().unwrap();

        assert_eq!(*log.borrow(), vec!["editor", "profiler", "game"]);
    }

    #[test]
    fn disconnected_subscriber_stops_firing() {
        let count = Rc::new(RefCell::new(0));
        let mut event = FrameEvent::new();

        let counter = Rc::clone(&count);
        let id = event.connect(move || {
            *counter.borrow_mut() += 1;
            Ok(())
        });

        event.invoke().unwrap();
        assert!(event.disconnect(id));
        event.invoke().unwrap();

        assert_eq!(*count.borrow(), 1);
        assert!(!event.disconnect(id), "Second disconnect finds nothing");
    }

    #[test]
    fn first_error_skips_remaining_subscribers() {
        let reached = Rc::new(RefCell::new(false));
        let mut event = FrameEvent::new();

        event.connect(|| Err("editor crashed".into()));
        let flag = Rc::clone(&reached);
        event.connect(move || {
            *flag.borrow_mut() = true;
            Ok(())
        });

        let err = event.invoke().unwrap_err();

        assert_eq!(err.to_string(), "editor crashed");
        assert!(!*reached.borrow());
    }

    #[test]
    fn ids_are_unique() {
        let mut event = FrameEvent::new();
        let a = event.connect(|| Ok(()));
        let b = event.connect(|| Ok(()));
        assert_ne!(a, b);
        assert_eq!(event.len(), 2);
    }
}
