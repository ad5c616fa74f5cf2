//! The `Context` is the single owner of all simulation state: the clock, pending plans and the
//! data plugins that model modules register. Nothing in this crate is held in ambient global
//! state except the logger, so two contexts built from the same seed run identically, even side
//! by side in the same process.
//!
//! Model modules attach behavior through extension traits on `Context` (see
//! `ContextSpatialExt` and `ContextInfectionExt`), storing their data in plugins defined with
//! `define_data_plugin!`.
use std::any::{Any, TypeId};

use log::{debug, trace};

use crate::data_plugin::DataPlugin;
use crate::hashing::HashMap;
use crate::plan::Queue;
#[cfg(feature = "progress_bar")]
use crate::progress::update_timeline_progress;

/// Plans scheduled for the same time run in phase order. Inside a phase they
/// run in the order they were added.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ExecutionPhase {
    First,
    #[default]
    Normal,
    Last,
}

type Callback = dyn FnOnce(&mut Context);

pub struct Context {
    plan_queue: Queue<Box<Callback>, ExecutionPhase>,
    data_plugins: HashMap<TypeId, Box<dyn Any>>,
    current_time: f64,
    shutdown_requested: bool,
}

impl Context {
    #[must_use]
    pub fn new() -> Context {
        Context {
            plan_queue: Queue::new(),
            data_plugins: HashMap::default(),
            current_time: 0.0,
            shutdown_requested: false,
        }
    }

    /// Schedule `callback` to run at `time` in the `Normal` phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite or earlier than the current time.
    pub fn add_plan(&mut self, time: f64, callback: impl FnOnce(&mut Context) + 'static) {
        self.add_plan_with_phase(time, callback, ExecutionPhase::Normal)
    }

    /// Schedule `callback` to run at `time` in the given phase.
    ///
    /// # Panics
    ///
    /// Panics if `time` is NaN, infinite or earlier than the current time.
    pub fn add_plan_with_phase(
        &mut self,
        time: f64,
        callback: impl FnOnce(&mut Context) + 'static,
        phase: ExecutionPhase,
    ) {
        assert!(
            !time.is_nan() && !time.is_infinite() && time >= self.current_time,
            "Time {time} is invalid"
        );
        self.plan_queue.add_plan(time, Box::new(callback), phase);
    }

    /// Stop the simulation once the currently running plan returns. Pending
    /// plans are discarded.
    pub fn shutdown(&mut self) {
        debug!("shutdown requested at t={}", self.current_time);
        self.shutdown_requested = true;
    }

    /// Get the data container for `plugin`, creating it on first use.
    #[allow(clippy::needless_pass_by_value)]
    pub fn get_data_mut<T: DataPlugin>(&mut self, _plugin: T) -> &mut T::DataContainer {
        self.data_plugins
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(T::create_data_container()))
            .downcast_mut::<T::DataContainer>()
            .expect("data plugin container has the wrong type")
    }

    /// Get the data container for `plugin` if it has been created.
    #[allow(clippy::needless_pass_by_value)]
    #[must_use]
    pub fn try_get_data<T: DataPlugin>(&self, _plugin: T) -> Option<&T::DataContainer> {
        self.data_plugins
            .get(&TypeId::of::<T>())
            .and_then(|data| data.downcast_ref::<T::DataContainer>())
    }

    /// Get the data container for `plugin`.
    ///
    /// # Panics
    ///
    /// Panics if the container was never created with `get_data_mut`.
    #[must_use]
    pub fn get_data<T: DataPlugin>(&self, plugin: T) -> &T::DataContainer {
        self.try_get_data(plugin)
            .unwrap_or_else(|| panic!("data plugin {} is not initialized", std::any::type_name::<T>()))
    }

    #[must_use]
    pub fn get_current_time(&self) -> f64 {
        self.current_time
    }

    /// Run plans until none remain or `shutdown` is called.
    pub fn execute(&mut self) {
        trace!("entering event loop");
        loop {
            if self.shutdown_requested {
                self.plan_queue.clear();
                self.shutdown_requested = false;
                break;
            }

            if let Some(plan) = self.plan_queue.get_next_plan() {
                self.current_time = plan.time;
                #[cfg(feature = "progress_bar")]
                update_timeline_progress(self.current_time);
                (plan.data)(self);
            } else {
                break;
            }
        }
        debug!("event loop finished at t={}", self.current_time);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}
