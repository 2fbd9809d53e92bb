//! `Port` models a registered IO signal of a component.
//!
//! Every wire holds two slots: the value committed at the last clock edge, which all readers
//! observe during a tick, and the value driven for the next edge. Drivers only ever touch the
//! next slot, so the order in which modules are ticked within a cycle is irrelevant. A driven
//! value persists until it is driven again, like a flip-flop.
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, RwLock};

#[derive(Default)]
pub struct InputPort {}

#[derive(Default)]
pub struct OutputPort {}

#[derive(Default, Debug)]
pub struct Wire<T: Clone> {
    cur: T,
    next: T,
}

/// Wrapper type of a reference to a wire. Newtype is necessary to implement get/put methods at
/// the reference type.
#[derive(Debug)]
pub struct WireRef<T: Clone>(Arc<RwLock<Wire<T>>>);

impl<T: Clone> Clone for WireRef<T> {
    fn clone(&self) -> Self {
        WireRef(Arc::clone(&self.0))
    }
}

/// Clock-edge hook of a wire, type-erased so a whole netlist can be committed in one pass.
pub trait Latch {
    fn commit(&self);
}

impl<T: Clone> WireRef<T> {
    pub fn new(init: T) -> Self {
        WireRef(Arc::new(RwLock::new(Wire {
            cur: init.clone(),
            next: init,
        })))
    }

    /// Value committed at the last clock edge.
    pub fn get(&self) -> T {
        self.0.read().expect("rw lock poisoned").cur.clone()
    }

    /// Drive a value for the next clock edge.
    pub fn put(&self, data: T) {
        self.0.write().expect("rw lock poisoned").next = data;
    }

    /// Force both slots, bypassing the clock. Only meant for reset and test benches.
    pub fn force(&self, data: T) {
        let mut wire = self.0.write().expect("rw lock poisoned");
        wire.next = data.clone();
        wire.cur = data;
    }
}

impl<T: Clone> Latch for WireRef<T> {
    fn commit(&self) {
        let mut wire = self.0.write().expect("rw lock poisoned");
        wire.cur = wire.next.clone();
    }
}

pub struct Port<D, T: Clone> {
    lock: OnceLock<WireRef<T>>,
    direction: PhantomData<D>,
}

impl<D, T: Clone> Default for Port<D, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D, T: Clone> Port<D, T> {
    pub fn new() -> Self {
        Port {
            lock: OnceLock::new(),
            direction: PhantomData,
        }
    }

    fn wire(&self) -> &WireRef<T> {
        self.lock.get().expect("port lock not set")
    }
}

impl<T: Clone> Port<OutputPort, T> {
    /// Access method of an output port from *within* the module that has the port.
    pub fn put(&mut self, data: T) {
        self.wire().put(data)
    }
}

impl<T: Clone> Port<InputPort, T> {
    /// Access method of an input port from *within* the module that has the port.
    pub fn get(&self) -> T {
        self.wire().get()
    }
}

/// Connects an output port to an input port of the same type by giving them the same wire.
pub fn link<T: Default + Clone>(
    a: &mut Port<InputPort, T>,
    b: &mut Port<OutputPort, T>,
) -> WireRef<T> {
    let wire = tie_off(b);
    attach(a, &wire);
    wire
}

/// Fans an already-driven wire out to one more input port.
pub fn attach<T: Clone>(a: &mut Port<InputPort, T>, wire: &WireRef<T>) {
    a.lock
        .set(wire.clone())
        .map_err(|_| "")
        .expect("lock already set");
}

/// Tie an output port off without connecting it to an input port.
/// The returned wire lets the owner of the netlist observe the driven value.
pub fn tie_off<T: Default + Clone>(a: &mut Port<OutputPort, T>) -> WireRef<T> {
    let wire = WireRef::new(T::default());
    a.lock
        .set(wire.clone())
        .map_err(|_| "")
        .expect("lock already set");
    wire
}

/// Tie an input port off to a wire that is driven from outside any module, e.g. a test bench.
pub fn tie_off_input<T: Default + Clone>(a: &mut Port<InputPort, T>) -> WireRef<T> {
    let wire = WireRef::new(T::default());
    attach(a, &wire);
    wire
}

/// Every wire of a netlist, committed together at each clock edge.
#[derive(Default)]
pub struct Netlist {
    wires: Vec<Box<dyn Latch>>,
}

impl Netlist {
    /// Registers `wire` for commit and hands it back for further wiring.
    pub fn track<T: Clone + 'static>(&mut self, wire: WireRef<T>) -> WireRef<T> {
        self.wires.push(Box::new(wire.clone()));
        wire
    }

    pub fn commit(&self) {
        self.wires.iter().for_each(|wire| wire.commit());
    }

    pub fn len(&self) -> usize {
        self.wires.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }
}
