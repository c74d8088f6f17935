// Host key events, delivered through a subscription handle the instrument
// owns. Dropping or cancelling the handle detaches the handler, so nothing
// an instrument registers outlives it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    KeyUp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Space,
    Char(char),
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostEvent {
    pub key: Key,
    pub shift: bool,
    pub console_focused: bool, // the command line has focus
}

pub type Handler = Box<dyn FnMut(&HostEvent)>;

pub trait EventBus {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription;
}

pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self { cancel: Some(Box::new(cancel)) }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    // second and later calls do nothing
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct Entry {
    id: u64,
    kind: EventKind,
    handler: Rc<RefCell<Handler>>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<Entry>,
}

/// Single-threaded bus the terminal host feeds its key events into.
#[derive(Clone, Default)]
pub struct LocalBus {
    inner: Rc<RefCell<Registry>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, kind: EventKind, event: &HostEvent) {
        // snapshot first so a handler may unsubscribe while we iterate
        let handlers: Vec<Rc<RefCell<Handler>>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.handler.clone())
            .collect();
        for handler in handlers {
            if let Ok(mut h) = handler.try_borrow_mut() {
                let f: &mut Handler = &mut h;
                f(event);
            }
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }
}

impl EventBus for LocalBus {
    fn subscribe(&self, kind: EventKind, handler: Handler) -> Subscription {
        let id = {
            let mut reg = self.inner.borrow_mut();
            let id = reg.next_id;
            reg.next_id += 1;
            reg.entries.push(Entry { id, kind, handler: Rc::new(RefCell::new(handler)) });
            id
        };
        let registry: Weak<RefCell<Registry>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.borrow_mut().entries.retain(|e| e.id != id);
            }
        })
    }
}

// Shift+Space while typing in the console engages the hold macro;
// letting go of space releases it. What the hold does is up to `macro`.
pub fn hold_macro(bus: &dyn EventBus, frozen: Rc<Cell<bool>>) -> Vec<Subscription> {
    let down = frozen.clone();
    let arm = bus.subscribe(
        EventKind::KeyDown,
        Box::new(move |e: &HostEvent| {
            if e.key == Key::Space && e.shift && e.console_focused {
                down.set(true);
            }
        }),
    );
    let release = bus.subscribe(
        EventKind::KeyUp,
        Box::new(move |e: &HostEvent| {
            if e.key == Key::Space {
                frozen.set(false);
            }
        }),
    );
    vec![arm, release]
}
