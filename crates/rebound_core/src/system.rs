//! Spring system
//!
//! The [`SpringSystem`] owns every spring it creates, keeps track of which
//! ones are active, and runs one integration pass per [`SpringSystem::tick`].
//! It starts its looper when the first spring becomes active and stops it
//! once every spring has settled.
//!
//! Listener callbacks may activate, retarget, or destroy springs while a
//! pass is running. Each pass works from a snapshot of the active set, so a
//! spring activated mid-pass is picked up on the next tick.

use crate::config::SpringConfig;
use crate::error::{ReboundError, Result};
use crate::listener::SpringSystemListener;
use crate::looper::{SpringLooper, SteppingLooper, SynchronousLooper};
use crate::spring::{Spring, SpringNode};
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

new_key_type! {
    /// Handle to a spring registered with a [`SpringSystem`]
    pub struct SpringId;
}

impl SpringId {
    /// Convert to raw u64 for storage
    pub fn to_raw(self) -> u64 {
        self.0.as_ffi()
    }

    /// Reconstruct from raw u64
    pub fn from_raw(raw: u64) -> Self {
        SpringId::from(slotmap::KeyData::from_ffi(raw))
    }
}

impl fmt::Display for SpringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spring:{}", self.to_raw())
    }
}

type ActiveSet = IndexSet<SpringId, FxBuildHasher>;

struct SystemInner {
    springs: RefCell<SlotMap<SpringId, Rc<SpringNode>>>,
    active: RefCell<ActiveSet>,
    idle: Cell<bool>,
    looper: Rc<dyn SpringLooper>,
    listeners: RefCell<SmallVec<[Rc<dyn SpringSystemListener>; 2]>>,
}

/// Owns a set of springs and drives their integration
///
/// Cloning yields another handle to the same system.
#[derive(Clone)]
pub struct SpringSystem {
    inner: Rc<SystemInner>,
}

/// Non-owning reference to a [`SpringSystem`], held by its looper
#[derive(Clone)]
pub struct WeakSpringSystem {
    inner: Weak<SystemInner>,
}

impl WeakSpringSystem {
    pub fn upgrade(&self) -> Option<SpringSystem> {
        self.inner.upgrade().map(|inner| SpringSystem { inner })
    }
}

impl SpringSystem {
    /// Create a system driven by `looper`
    ///
    /// A looper serves exactly one system; binding one that is already
    /// bound fails with [`ReboundError::InvalidArgument`].
    pub fn new(looper: Rc<dyn SpringLooper>) -> Result<Self> {
        let system = Self {
            inner: Rc::new(SystemInner {
                springs: RefCell::new(SlotMap::with_key()),
                active: RefCell::new(ActiveSet::default()),
                idle: Cell::new(true),
                looper: looper.clone(),
                listeners: RefCell::new(SmallVec::new()),
            }),
        };
        looper.binding().bind(&system)?;
        Ok(system)
    }

    /// Create a system driven by a fresh [`SteppingLooper`]
    pub fn stepping() -> Result<(Self, Rc<SteppingLooper>)> {
        let looper = Rc::new(SteppingLooper::new());
        let system = Self::new(looper.clone())?;
        Ok((system, looper))
    }

    /// Create a system driven by a fresh [`SynchronousLooper`]
    pub fn synchronous() -> Result<(Self, Rc<SynchronousLooper>)> {
        let looper = Rc::new(SynchronousLooper::new());
        let system = Self::new(looper.clone())?;
        Ok((system, looper))
    }

    pub fn downgrade(&self) -> WeakSpringSystem {
        WeakSpringSystem {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Whether both handles refer to the same system
    pub fn ptr_eq(&self, other: &SpringSystem) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn looper(&self) -> Rc<dyn SpringLooper> {
        self.inner.looper.clone()
    }

    /// Whether no spring is active
    pub fn is_idle(&self) -> bool {
        self.inner.idle.get()
    }

    /// Create and register a spring using the default config
    pub fn create_spring(&self) -> Spring {
        let node = Rc::new(SpringNode::new(SpringConfig::default_config()));
        let id = self.inner.springs.borrow_mut().insert(node.clone());
        tracing::debug!(spring = %id, "created spring");
        Spring::from_parts(id, node, self.clone())
    }

    pub fn spring_by_id(&self, id: SpringId) -> Result<Spring> {
        let node = self
            .inner
            .springs
            .borrow()
            .get(id)
            .cloned()
            .ok_or(ReboundError::NotFound(id))?;
        Ok(Spring::from_parts(id, node, self.clone()))
    }

    /// Every registered spring
    pub fn all_springs(&self) -> Vec<Spring> {
        self.inner
            .springs
            .borrow()
            .iter()
            .map(|(id, node)| Spring::from_parts(id, node.clone(), self.clone()))
            .collect()
    }

    pub fn spring_count(&self) -> usize {
        self.inner.springs.borrow().len()
    }

    pub fn active_spring_count(&self) -> usize {
        self.inner.active.borrow().len()
    }

    /// Remove a spring from the active set and the registry
    pub fn deregister_spring(&self, spring: &Spring) -> Result<()> {
        if !spring.system().ptr_eq(self) {
            return Err(ReboundError::InvalidArgument(format!(
                "spring {} belongs to a different system",
                spring.id()
            )));
        }
        self.inner.active.borrow_mut().shift_remove(&spring.id());
        self.inner.springs.borrow_mut().remove(spring.id());
        Ok(())
    }

    /// Mark a spring as needing integration, waking the looper if idle
    ///
    /// Springs call this on themselves whenever their state changes.
    pub fn activate_spring(&self, id: SpringId) -> Result<()> {
        if !self.inner.springs.borrow().contains_key(id) {
            return Err(ReboundError::NotFound(id));
        }
        self.inner.active.borrow_mut().insert(id);
        if self.inner.idle.replace(false) {
            tracing::trace!("spring system waking up");
            self.inner.looper.start();
        }
        Ok(())
    }

    /// Advance every active spring by `delta_millis`
    ///
    /// Springs that were already settled on the previous pass are dropped
    /// from the active set instead of being advanced.
    pub fn advance(&self, delta_millis: f64) {
        let snapshot: SmallVec<[SpringId; 16]> =
            self.inner.active.borrow().iter().copied().collect();

        for id in snapshot {
            let node = self.inner.springs.borrow().get(id).cloned();
            let Some(node) = node else {
                // Destroyed earlier in this pass
                self.inner.active.borrow_mut().shift_remove(&id);
                continue;
            };

            let spring = Spring::from_parts(id, node, self.clone());
            if spring.system_should_advance() {
                spring.advance(delta_millis / 1000.0);
            } else {
                self.inner.active.borrow_mut().shift_remove(&id);
            }
        }
    }

    /// Run one integration pass
    ///
    /// This is the entry point a frame source calls with the milliseconds
    /// elapsed since its previous call.
    pub fn tick(&self, elapsed_millis: f64) {
        for listener in self.listeners() {
            listener.on_before_integrate(self);
        }

        self.advance(elapsed_millis);

        if self.inner.active.borrow().is_empty() {
            self.inner.idle.set(true);
        }

        for listener in self.listeners() {
            listener.on_after_integrate(self);
        }

        if self.inner.idle.get() {
            tracing::trace!("spring system idle, stopping looper");
            self.inner.looper.stop();
        }
    }

    pub fn add_listener(&self, listener: Rc<dyn SpringSystemListener>) {
        let mut listeners = self.inner.listeners.borrow_mut();
        if !listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    pub fn remove_listener<L>(&self, listener: &Rc<L>)
    where
        L: SpringSystemListener + ?Sized,
    {
        let target = Rc::as_ptr(listener) as *const ();
        self.inner
            .listeners
            .borrow_mut()
            .retain(|l| Rc::as_ptr(l) as *const () != target);
    }

    pub fn remove_all_listeners(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    fn listeners(&self) -> SmallVec<[Rc<dyn SpringSystemListener>; 2]> {
        self.inner.listeners.borrow().clone()
    }
}

impl fmt::Debug for SpringSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpringSystem")
            .field("springs", &self.spring_count())
            .field("active", &self.active_spring_count())
            .field("idle", &self.is_idle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{FnSpringListener, SpringEvent, SpringListener};
    use crate::looper::LooperBinding;

    #[derive(Default)]
    struct IntegrateCounter {
        before: Cell<u32>,
        after: Cell<u32>,
    }

    impl SpringSystemListener for IntegrateCounter {
        fn on_before_integrate(&self, _system: &SpringSystem) {
            self.before.set(self.before.get() + 1);
        }

        fn on_after_integrate(&self, _system: &SpringSystem) {
            self.after.set(self.after.get() + 1);
        }
    }

    #[test]
    fn test_create_and_lookup() {
        let (system, _looper) = SpringSystem::stepping().unwrap();
        let a = system.create_spring();
        let b = system.create_spring();

        assert_ne!(a.id(), b.id());
        assert_eq!(system.spring_count(), 2);
        assert_eq!(system.spring_by_id(a.id()).unwrap(), a);
        assert_eq!(system.all_springs().len(), 2);
        assert!(system.is_idle());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let (system, _looper) = SpringSystem::stepping().unwrap();
        let a = system.create_spring();
        let old = a.id();
        a.destroy().unwrap();

        let b = system.create_spring();
        assert_ne!(b.id(), old);
        assert!(system.spring_by_id(old).is_err());
    }

    #[test]
    fn test_activate_unknown_spring() {
        let (system, _looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();
        let id = spring.id();
        spring.destroy().unwrap();

        assert_eq!(system.activate_spring(id), Err(ReboundError::NotFound(id)));
        assert!(system.is_idle());
    }

    #[derive(Default)]
    struct CountingLooper {
        binding: LooperBinding,
        starts: Cell<u32>,
        stops: Cell<u32>,
    }

    impl SpringLooper for CountingLooper {
        fn binding(&self) -> &LooperBinding {
            &self.binding
        }

        fn start(&self) {
            self.starts.set(self.starts.get() + 1);
        }

        fn stop(&self) {
            self.stops.set(self.stops.get() + 1);
        }
    }

    #[test]
    fn test_activation_starts_looper_once() {
        let looper = Rc::new(CountingLooper::default());
        let system = SpringSystem::new(looper.clone()).unwrap();
        let a = system.create_spring();
        let b = system.create_spring();

        assert_eq!(looper.starts.get(), 0);
        a.set_end_value(1.0).unwrap();
        assert_eq!(looper.starts.get(), 1);
        assert!(!system.is_idle());

        b.set_end_value(1.0).unwrap();
        a.set_end_value(2.0).unwrap();
        system.activate_spring(a.id()).unwrap();
        assert_eq!(looper.starts.get(), 1);
        assert_eq!(system.active_spring_count(), 2);

        // Once idle again, the next activation restarts it
        while !system.is_idle() {
            system.tick(16.0);
        }
        assert_eq!(looper.stops.get(), 1);
        a.set_end_value(0.0).unwrap();
        assert_eq!(looper.starts.get(), 2);
    }

    #[test]
    fn test_goes_idle_and_stops_looper() {
        let (system, looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();
        spring.set_end_value(1.0).unwrap();

        let mut steps = 0;
        while !looper.step(16.0) {
            steps += 1;
            assert!(steps < 200);
        }

        assert!(system.is_idle());
        assert!(!looper.is_started());
        assert_eq!(system.active_spring_count(), 0);
        // Still registered
        assert_eq!(system.spring_count(), 1);
    }

    #[test]
    fn test_settled_spring_is_not_advanced_again() {
        let (system, looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();
        let updates = Rc::new(Cell::new(0u32));
        let rested = Rc::new(Cell::new(false));
        {
            let updates = updates.clone();
            let rested = rested.clone();
            spring.add_listener(Rc::new(FnSpringListener::new(
                move |event, _: &Spring| match event {
                    SpringEvent::Update => updates.set(updates.get() + 1),
                    SpringEvent::AtRest => rested.set(true),
                    _ => {}
                },
            )));
        }

        spring.set_end_value(1.0).unwrap();
        let mut steps = 0;
        while !rested.get() {
            assert!(!looper.step(16.0));
            steps += 1;
            assert!(steps < 200);
        }

        // The settling tick fired at-rest and left the spring in the active set
        assert_eq!(system.active_spring_count(), 1);
        let seen = updates.get();

        // The next tick drops it without another update
        assert!(looper.step(16.0));
        assert_eq!(updates.get(), seen);
        assert_eq!(system.active_spring_count(), 0);
    }

    #[test]
    fn test_integrate_hooks() {
        let (system, looper) = SpringSystem::stepping().unwrap();
        let counter = Rc::new(IntegrateCounter::default());
        system.add_listener(counter.clone());
        system.add_listener(counter.clone());

        let spring = system.create_spring();
        spring.set_end_value(1.0).unwrap();
        looper.step(16.0);
        looper.step(16.0);

        assert_eq!(counter.before.get(), 2);
        assert_eq!(counter.after.get(), 2);

        system.remove_listener(&counter);
        looper.step(16.0);
        assert_eq!(counter.before.get(), 2);
    }

    #[test]
    fn test_hooks_see_idle_state() {
        struct IdleProbe {
            seen: RefCell<Vec<bool>>,
        }

        impl SpringSystemListener for IdleProbe {
            fn on_after_integrate(&self, system: &SpringSystem) {
                self.seen.borrow_mut().push(system.is_idle());
            }
        }

        let (system, looper) = SpringSystem::stepping().unwrap();
        let probe = Rc::new(IdleProbe {
            seen: RefCell::new(Vec::new()),
        });
        system.add_listener(probe.clone());

        let spring = system.create_spring();
        spring.set_current_value(3.0).unwrap();
        looper.step(16.0);

        assert_eq!(*probe.seen.borrow(), vec![true]);
    }

    #[test]
    fn test_activation_during_pass_waits_for_next_tick() {
        // Retargets `follower` every time `leader` updates
        struct Follow {
            follower: Spring,
        }

        impl SpringListener for Follow {
            fn on_spring_update(&self, spring: &Spring) {
                self.follower.set_end_value(spring.current_value()).unwrap();
            }
        }

        let (system, looper) = SpringSystem::stepping().unwrap();
        let leader = system.create_spring();
        let follower = system.create_spring();
        leader.add_listener(Rc::new(Follow {
            follower: follower.clone(),
        }));

        leader.set_end_value(1.0).unwrap();
        assert_eq!(system.active_spring_count(), 1);

        looper.step(16.0);
        // Activated by the leader's update but not advanced in the same pass
        assert_eq!(system.active_spring_count(), 2);
        assert_eq!(follower.current_value(), 0.0);
        assert!(follower.end_value() > 0.0);

        looper.step(16.0);
        assert!(follower.current_value() > 0.0);

        let mut steps = 0;
        while !looper.step(16.0) {
            steps += 1;
            assert!(steps < 400);
        }
        assert_eq!(leader.current_value(), 1.0);
        assert_eq!(follower.current_value(), 1.0);
    }

    #[test]
    fn test_destroy_during_pass() {
        // Destroys another spring from inside a callback
        struct Destroyer {
            victim: Spring,
        }

        impl SpringListener for Destroyer {
            fn on_spring_update(&self, _spring: &Spring) {
                if !self.victim.is_destroyed() {
                    self.victim.destroy().unwrap();
                }
            }
        }

        let (system, looper) = SpringSystem::stepping().unwrap();
        let first = system.create_spring();
        let second = system.create_spring();
        first.add_listener(Rc::new(Destroyer {
            victim: second.clone(),
        }));

        first.set_end_value(1.0).unwrap();
        second.set_end_value(1.0).unwrap();
        looper.step(16.0);

        assert!(second.is_destroyed());
        assert_eq!(second.current_value(), 0.0);
        assert_eq!(system.spring_count(), 1);
        assert_eq!(system.active_spring_count(), 1);
    }

    #[test]
    fn test_deregister_foreign_spring() {
        let (system, _looper) = SpringSystem::stepping().unwrap();
        let (other, _other_looper) = SpringSystem::stepping().unwrap();
        let spring = other.create_spring();

        assert!(matches!(
            system.deregister_spring(&spring),
            Err(ReboundError::InvalidArgument(_))
        ));
        assert_eq!(other.spring_count(), 1);
    }

    #[test]
    fn test_looper_binds_once() {
        let (_system, looper) = SpringSystem::stepping().unwrap();
        assert!(matches!(
            SpringSystem::new(looper),
            Err(ReboundError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_spring_id_raw_round_trip() {
        let (system, _looper) = SpringSystem::stepping().unwrap();
        let spring = system.create_spring();
        let raw = spring.id().to_raw();
        assert_eq!(SpringId::from_raw(raw), spring.id());
        assert_eq!(spring.id().to_string(), format!("spring:{}", raw));
    }
}
