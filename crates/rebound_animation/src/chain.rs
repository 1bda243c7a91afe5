//! Spring chains
//!
//! A [`SpringChain`] links springs into a cascade. One spring is the
//! control spring; every time a member updates, its neighbour on the far
//! side from the control spring is retargeted to the member's current
//! value. Each hop only fires when the previous spring moves, so motion
//! ripples outward one tick per link, giving the trailing "follow" effect.
//!
//! The chain owns a private [`SpringSystem`]; its springs are never shared
//! with another system.

use rebound_core::{
    ReboundError, Result, Spring, SpringConfig, SpringConfigRegistry, SpringListener,
    SpringLooper, SpringSystem, SteppingLooper, SynchronousLooper,
};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Origami tension of the control spring
pub const DEFAULT_MAIN_TENSION: f64 = 40.0;
/// Origami friction of the control spring
pub const DEFAULT_MAIN_FRICTION: f64 = 6.0;
/// Origami tension of the trailing springs
pub const DEFAULT_ATTACHMENT_TENSION: f64 = 70.0;
/// Origami friction of the trailing springs
pub const DEFAULT_ATTACHMENT_FRICTION: f64 = 10.0;

struct ChainInner {
    system: SpringSystem,
    springs: RefCell<Vec<Spring>>,
    listeners: RefCell<Vec<Rc<dyn SpringListener>>>,
    control_index: Cell<Option<usize>>,
    main_config: SpringConfig,
    attachment_config: SpringConfig,
}

impl ChainInner {
    fn listener(&self, index: usize) -> Option<Rc<dyn SpringListener>> {
        self.listeners.borrow().get(index).cloned()
    }

    /// Springs that follow the member at `index`
    fn followers(&self, index: usize) -> (Option<Spring>, Option<Spring>) {
        let (below, above) = match self.control_index.get() {
            Some(control) if index == control => (index.checked_sub(1), Some(index + 1)),
            Some(control) if index < control => (index.checked_sub(1), None),
            // No control spring behaves like one sitting before the first member
            _ => (None, Some(index + 1)),
        };

        let springs = self.springs.borrow();
        (
            below.and_then(|i| springs.get(i).cloned()),
            above.and_then(|i| springs.get(i).cloned()),
        )
    }

    fn propagate(&self, index: usize, spring: &Spring) {
        let value = spring.current_value();
        let (below, above) = self.followers(index);
        for follower in [above, below].into_iter().flatten() {
            if let Err(err) = follower.set_end_value(value) {
                tracing::warn!(
                    from = %spring.id(),
                    to = %follower.id(),
                    "chain propagation failed: {}",
                    err
                );
            }
        }
    }
}

/// Listener the chain installs on each member spring
struct ChainLink {
    chain: Weak<ChainInner>,
    index: usize,
}

impl ChainLink {
    fn forward(&self, f: impl FnOnce(&dyn SpringListener)) {
        let listener = self
            .chain
            .upgrade()
            .and_then(|chain| chain.listener(self.index));
        if let Some(listener) = listener {
            f(listener.as_ref());
        }
    }
}

impl SpringListener for ChainLink {
    fn on_spring_update(&self, spring: &Spring) {
        if let Some(chain) = self.chain.upgrade() {
            chain.propagate(self.index, spring);
        }
        self.forward(|listener| listener.on_spring_update(spring));
    }

    fn on_spring_at_rest(&self, spring: &Spring) {
        self.forward(|listener| listener.on_spring_at_rest(spring));
    }

    fn on_spring_activate(&self, spring: &Spring) {
        self.forward(|listener| listener.on_spring_activate(spring));
    }

    fn on_spring_end_state_change(&self, spring: &Spring) {
        self.forward(|listener| listener.on_spring_end_state_change(spring));
    }
}

/// A cascade of springs driven by a single control spring
///
/// ```ignore
/// let (chain, looper) = SpringChain::stepping()?;
/// for view in &views {
///     chain.add_spring(view.clone());
/// }
/// chain.set_control_spring_index(0)?;
/// if let Some(control) = chain.control_spring() {
///     control.set_end_value(200.0)?;
/// }
/// while !looper.step(16.0) {}
/// ```
#[derive(Clone)]
pub struct SpringChain {
    inner: Rc<ChainInner>,
}

impl SpringChain {
    /// Create a chain with the default main (40/6) and attachment (70/10) configs
    pub fn new(looper: Rc<dyn SpringLooper>) -> Result<Self> {
        Self::with_configs(
            looper,
            DEFAULT_MAIN_TENSION,
            DEFAULT_MAIN_FRICTION,
            DEFAULT_ATTACHMENT_TENSION,
            DEFAULT_ATTACHMENT_FRICTION,
        )
    }

    /// Create a chain from origami tension/friction values
    pub fn with_configs(
        looper: Rc<dyn SpringLooper>,
        main_tension: f64,
        main_friction: f64,
        attachment_tension: f64,
        attachment_friction: f64,
    ) -> Result<Self> {
        let system = SpringSystem::new(looper)?;
        Ok(Self {
            inner: Rc::new(ChainInner {
                system,
                springs: RefCell::new(Vec::new()),
                listeners: RefCell::new(Vec::new()),
                control_index: Cell::new(None),
                main_config: SpringConfig::from_origami_tension_and_friction(
                    main_tension,
                    main_friction,
                ),
                attachment_config: SpringConfig::from_origami_tension_and_friction(
                    attachment_tension,
                    attachment_friction,
                ),
            }),
        })
    }

    /// Create a default chain driven by a fresh [`SteppingLooper`]
    pub fn stepping() -> Result<(Self, Rc<SteppingLooper>)> {
        let looper = Rc::new(SteppingLooper::new());
        let chain = Self::new(looper.clone())?;
        Ok((chain, looper))
    }

    /// Create a default chain driven by a fresh [`SynchronousLooper`]
    pub fn synchronous() -> Result<(Self, Rc<SynchronousLooper>)> {
        let looper = Rc::new(SynchronousLooper::new());
        let chain = Self::new(looper.clone())?;
        Ok((chain, looper))
    }

    /// The chain's private spring system
    pub fn system(&self) -> &SpringSystem {
        &self.inner.system
    }

    pub fn main_config(&self) -> &SpringConfig {
        &self.inner.main_config
    }

    pub fn attachment_config(&self) -> &SpringConfig {
        &self.inner.attachment_config
    }

    /// Publish both configs to a registry for live tuning
    pub fn register_configs(&self, registry: &mut SpringConfigRegistry) -> Result<()> {
        let n = registry.len();
        registry.add(&self.inner.main_config, format!("main spring {}", n))?;
        registry.add(
            &self.inner.attachment_config,
            format!("attachment spring {}", n + 1),
        )?;
        Ok(())
    }

    /// Append a spring that reports to `listener`
    pub fn add_spring(&self, listener: Rc<dyn SpringListener>) -> &Self {
        let index = self.inner.springs.borrow().len();
        let spring = self.inner.system.create_spring();
        spring
            .add_listener(Rc::new(ChainLink {
                chain: Rc::downgrade(&self.inner),
                index,
            }))
            .set_config(self.inner.attachment_config.clone());

        self.inner.springs.borrow_mut().push(spring);
        self.inner.listeners.borrow_mut().push(listener);
        self
    }

    /// Make the spring at `index` the control spring
    ///
    /// Every member is switched to the attachment config and the new control
    /// spring to the main config.
    pub fn set_control_spring_index(&self, index: usize) -> Result<&Self> {
        let springs = self.inner.springs.borrow();
        let Some(control) = springs.get(index) else {
            return Err(ReboundError::InvalidArgument(format!(
                "control spring index {} out of range for a chain of {}",
                index,
                springs.len()
            )));
        };

        for spring in springs.iter() {
            spring.set_config(self.inner.attachment_config.clone());
        }
        control.set_config(self.inner.main_config.clone());
        self.inner.control_index.set(Some(index));
        Ok(self)
    }

    pub fn control_spring_index(&self) -> Option<usize> {
        self.inner.control_index.get()
    }

    /// The spring that drives the rest of the chain
    pub fn control_spring(&self) -> Option<Spring> {
        let index = self.inner.control_index.get()?;
        self.spring(index)
    }

    pub fn spring(&self, index: usize) -> Option<Spring> {
        self.inner.springs.borrow().get(index).cloned()
    }

    /// Every spring in chain order
    pub fn all_springs(&self) -> Vec<Spring> {
        self.inner.springs.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.springs.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.springs.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebound_core::{FnSpringListener, SpringEvent};

    type Log = Rc<RefCell<Vec<(usize, SpringEvent)>>>;

    fn quiet() -> Rc<dyn SpringListener> {
        Rc::new(FnSpringListener::new(|_, _: &Spring| {}))
    }

    fn recording(log: &Log, index: usize) -> Rc<dyn SpringListener> {
        let log = log.clone();
        Rc::new(FnSpringListener::new(move |event, _: &Spring| {
            log.borrow_mut().push((index, event));
        }))
    }

    fn chain_of(n: usize) -> (SpringChain, Rc<SteppingLooper>) {
        let (chain, looper) = SpringChain::stepping().unwrap();
        for _ in 0..n {
            chain.add_spring(quiet());
        }
        (chain, looper)
    }

    fn run_until_idle(looper: &SteppingLooper) {
        let mut steps = 0;
        while !looper.step(16.0) {
            steps += 1;
            assert!(steps < 1000, "chain did not settle");
        }
    }

    #[test]
    fn test_default_configs() {
        let (chain, _looper) = SpringChain::stepping().unwrap();
        let main = SpringConfig::from_origami_tension_and_friction(40.0, 6.0);
        let attachment = SpringConfig::from_origami_tension_and_friction(70.0, 10.0);

        assert_eq!(chain.main_config().tension(), main.tension());
        assert_eq!(chain.main_config().friction(), main.friction());
        assert_eq!(chain.attachment_config().tension(), attachment.tension());
        assert_eq!(chain.attachment_config().friction(), attachment.friction());
        assert!(chain.is_empty());
    }

    #[test]
    fn test_added_springs_use_attachment_config() {
        let (chain, _looper) = chain_of(3);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.system().spring_count(), 3);
        for spring in chain.all_springs() {
            assert_eq!(&spring.config(), chain.attachment_config());
        }
        assert!(chain.control_spring().is_none());
    }

    #[test]
    fn test_set_control_spring_index() {
        let (chain, _looper) = chain_of(3);
        chain.set_control_spring_index(1).unwrap();

        let springs = chain.all_springs();
        assert_eq!(&springs[0].config(), chain.attachment_config());
        assert_eq!(&springs[1].config(), chain.main_config());
        assert_eq!(&springs[2].config(), chain.attachment_config());
        assert_eq!(chain.control_spring(), Some(springs[1].clone()));

        chain.set_control_spring_index(2).unwrap();
        assert_eq!(&springs[1].config(), chain.attachment_config());
        assert_eq!(&springs[2].config(), chain.main_config());
    }

    #[test]
    fn test_control_index_out_of_range() {
        let (chain, _looper) = chain_of(2);
        chain.set_control_spring_index(0).unwrap();

        assert!(matches!(
            chain.set_control_spring_index(2),
            Err(ReboundError::InvalidArgument(_))
        ));
        assert_eq!(chain.control_spring_index(), Some(0));
        assert_eq!(&chain.all_springs()[0].config(), chain.main_config());
    }

    #[test]
    fn test_three_spring_cascade() {
        let (chain, looper) = chain_of(3);
        chain.set_control_spring_index(1).unwrap();
        let springs = chain.all_springs();

        chain.control_spring().unwrap().set_end_value(10.0).unwrap();

        // The first tick only moves the control spring
        looper.step(16.0);
        assert!(springs[1].current_value() > 0.0);
        assert_eq!(springs[0].current_value(), 0.0);
        assert_eq!(springs[2].current_value(), 0.0);

        for _ in 0..5 {
            looper.step(16.0);
        }
        let (v0, v1, v2) = (
            springs[0].current_value(),
            springs[1].current_value(),
            springs[2].current_value(),
        );
        assert!(v0 > 0.0 && v0 < v1);
        assert!(v2 > 0.0 && v2 < v1);
        // Both sides follow the control spring the same way
        assert_eq!(v0, v2);

        run_until_idle(&looper);
        for spring in &springs {
            assert_eq!(spring.current_value(), 10.0);
        }
    }

    #[test]
    fn test_cascade_delay_grows_with_distance() {
        let (chain, looper) = chain_of(5);
        chain.set_control_spring_index(2).unwrap();
        let springs = chain.all_springs();

        springs[2].set_end_value(100.0).unwrap();
        for _ in 0..6 {
            looper.step(16.0);
        }

        let values: Vec<f64> = springs.iter().map(Spring::current_value).collect();
        assert!(values[2] > values[1] && values[1] > values[0] && values[0] > 0.0);
        assert!(values[2] > values[3] && values[3] > values[4] && values[4] > 0.0);
        assert_eq!(values[1], values[3]);
        assert_eq!(values[0], values[4]);

        run_until_idle(&looper);
        for spring in &springs {
            assert_eq!(spring.current_value(), 100.0);
        }
    }

    #[test]
    fn test_without_control_spring_motion_flows_forward() {
        let (chain, looper) = chain_of(3);
        let springs = chain.all_springs();

        springs[1].set_end_value(5.0).unwrap();
        run_until_idle(&looper);

        assert_eq!(springs[0].current_value(), 0.0);
        assert_eq!(springs[1].current_value(), 5.0);
        assert_eq!(springs[2].current_value(), 5.0);
    }

    #[test]
    fn test_events_are_forwarded_by_index() {
        let (chain, looper) = SpringChain::stepping().unwrap();
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        chain.add_spring(recording(&log, 0));
        chain.add_spring(recording(&log, 1));
        chain.set_control_spring_index(0).unwrap();

        chain.control_spring().unwrap().set_end_value(1.0).unwrap();
        assert_eq!(*log.borrow(), vec![(0, SpringEvent::EndStateChange)]);

        looper.step(16.0);
        assert_eq!(
            log.borrow()[1..].to_vec(),
            vec![
                (0, SpringEvent::Activate),
                (1, SpringEvent::EndStateChange),
                (0, SpringEvent::Update),
            ]
        );

        run_until_idle(&looper);
        let log = log.borrow();
        for index in 0..2 {
            let rests = log
                .iter()
                .filter(|(i, e)| *i == index && *e == SpringEvent::AtRest)
                .count();
            let last = log.iter().rev().find(|(i, _)| *i == index).map(|(_, e)| *e);
            assert!(rests >= 1);
            assert_eq!(last, Some(SpringEvent::AtRest));
        }
    }

    #[test]
    fn test_register_configs() {
        let (chain, _looper) = chain_of(1);
        let mut registry = SpringConfigRegistry::new();
        chain.register_configs(&mut registry).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.name_of(chain.main_config()), Some("main spring 0"));
        assert_eq!(
            registry.name_of(chain.attachment_config()),
            Some("attachment spring 1")
        );
    }

    #[test]
    fn test_synchronous_chain() {
        let (chain, _looper) = SpringChain::synchronous().unwrap();
        for _ in 0..4 {
            chain.add_spring(quiet());
        }
        chain.set_control_spring_index(0).unwrap();
        chain.control_spring().unwrap().set_end_value(3.0).unwrap();

        assert!(chain.system().is_idle());
        for spring in chain.all_springs() {
            assert_eq!(spring.current_value(), 3.0);
        }
    }
}
