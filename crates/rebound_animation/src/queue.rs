//! Frame-delayed value fan-out
//!
//! An [`AnimationQueue`] takes a stream of values and replays it to an
//! ordered list of callbacks, one frame apart: callback 0 sees each value on
//! the frame it is dequeued, callback 1 one frame later, and so on. This is
//! the building block for trailing effects where several views replay the
//! same gesture with increasing lag.
//!
//! The queue has no clock of its own. Whatever drives frames checks
//! [`AnimationQueue::is_running`] and calls [`AnimationQueue::on_frame`]
//! until it goes false.

use smallvec::SmallVec;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Receives one value per frame from an [`AnimationQueue`]
pub trait QueueCallback {
    fn on_frame(&self, value: f64);
}

impl<F> QueueCallback for F
where
    F: Fn(f64),
{
    fn on_frame(&self, value: f64) {
        self(value)
    }
}

/// Fans a value stream out to callbacks with a one-frame stagger
#[derive(Default)]
pub struct AnimationQueue {
    pending: RefCell<VecDeque<f64>>,
    animation: RefCell<VecDeque<f64>>,
    callbacks: RefCell<Vec<Rc<dyn QueueCallback>>>,
    running: Cell<bool>,
}

impl AnimationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a value and start running if idle
    pub fn add_value(&self, value: f64) {
        self.pending.borrow_mut().push_back(value);
        self.run_if_idle();
    }

    /// Queue several values, consumed one per frame in order
    pub fn add_all_values(&self, values: impl IntoIterator<Item = f64>) {
        self.pending.borrow_mut().extend(values);
        self.run_if_idle();
    }

    /// Drop every queued value without stopping
    pub fn clear_values(&self) {
        self.pending.borrow_mut().clear();
    }

    pub fn add_callback(&self, callback: Rc<dyn QueueCallback>) {
        self.callbacks.borrow_mut().push(callback);
    }

    pub fn remove_callback<C>(&self, callback: &Rc<C>)
    where
        C: QueueCallback + ?Sized,
    {
        let target = Rc::as_ptr(callback) as *const ();
        self.callbacks
            .borrow_mut()
            .retain(|c| Rc::as_ptr(c) as *const () != target);
    }

    pub fn clear_callbacks(&self) {
        self.callbacks.borrow_mut().clear();
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Values not yet pulled into the animation
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    fn run_if_idle(&self) {
        if !self.running.replace(true) {
            tracing::trace!("animation queue started");
        }
    }

    /// Advance the queue by one frame
    ///
    /// Pulls at most one pending value in, hands the in-flight values to the
    /// callbacks newest first, then retires values every callback has seen.
    /// Callbacks may add values or callbacks while being dispatched; those
    /// take effect on the next frame.
    pub fn on_frame(&self) {
        if !self.running.get() {
            return;
        }

        let callbacks: SmallVec<[Rc<dyn QueueCallback>; 8]> =
            self.callbacks.borrow().iter().cloned().collect();
        let next = self.pending.borrow_mut().pop_front();

        let (offset, values) = {
            let mut animation = self.animation.borrow_mut();
            // Once the input dries up, shift the window so trailing
            // callbacks still receive every value
            let offset = match next {
                Some(value) => {
                    animation.push_back(value);
                    0
                }
                None => callbacks.len().saturating_sub(animation.len()),
            };
            let values: SmallVec<[f64; 8]> = animation.iter().rev().copied().collect();
            (offset, values)
        };

        for (distance, value) in values.into_iter().enumerate() {
            if let Some(callback) = callbacks.get(distance + offset) {
                callback.on_frame(value);
            }
        }

        let mut animation = self.animation.borrow_mut();
        while animation.len() + offset >= callbacks.len() {
            if animation.pop_front().is_none() {
                break;
            }
        }

        if animation.is_empty() && self.pending.borrow().is_empty() {
            self.running.set(false);
            tracing::trace!("animation queue drained");
        }
    }
}
