//! Effect Implementation
//!
//! An effect is a subscriber that runs once when it is created, so that its
//! first execution establishes its dependencies. Afterwards every trigger of
//! a dependency either re-runs it synchronously or, when a scheduler was
//! supplied, hands control to the scheduler instead.
//!
//! # Use Cases
//!
//! - Component render effects (scheduler pushes an update job)
//! - Computed cells (scheduler only marks the cache dirty)
//! - Logging or syncing state to the outside world

use std::fmt;

use super::subscriber::Subscriber;

pub(crate) type Scheduler = Box<dyn Fn() + Send + Sync>;
pub(crate) type OnStop = Box<dyn FnOnce() + Send>;

/// Options for [`effect_with`] and [`Subscriber::new`].
#[derive(Default)]
pub struct EffectOptions {
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) on_stop: Option<OnStop>,
}

impl EffectOptions {
    /// Options with no scheduler and no on-stop callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called instead of re-running the effect when a dependency changes.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.scheduler = Some(Box::new(scheduler));
        self
    }

    /// Called once, when the effect is stopped.
    pub fn on_stop<F>(mut self, on_stop: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_stop = Some(Box::new(on_stop));
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

/// Create an effect and run it immediately.
///
/// The returned subscriber is the runner: call [`Subscriber::run`] to run it
/// by hand, or [`stop`] to detach it.
///
/// # Example
///
/// ```rust,ignore
/// let count = Ref::new(0);
///
/// let runner = effect({
///     let count = count.clone();
///     move || println!("count is {}", to_display_string(&count.get()))
/// });
///
/// count.set(5); // prints "count is 5"
/// ```
pub fn effect<F, T>(body: F) -> Subscriber<T>
where
    F: Fn() -> T + Send + Sync + 'static,
    T: 'static,
{
    effect_with(body, EffectOptions::new())
}

/// Create an effect with options and run it immediately.
pub fn effect_with<F, T>(body: F, options: EffectOptions) -> Subscriber<T>
where
    F: Fn() -> T + Send + Sync + 'static,
    T: 'static,
{
    let runner = Subscriber::new(body, options);
    runner.run();
    runner
}

/// Stop an effect. See [`Subscriber::stop`].
pub fn stop<T: 'static>(runner: &Subscriber<T>) {
    runner.stop();
}
