//! Conditions and the per-owner condition registry
//!
//! Conditions are boolean values owned by the host (weather, game mode...).
//! A registry creates each condition lazily the first time something refers
//! to it. Value changes are pushed synchronously to subscribed observers;
//! nothing polls.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, trace};

use daycycle_core::{ConditionId, OwnerId};

use crate::ComposeError;

/// When a condition's startup logic may run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum InitPhase {
    /// As soon as it is first referenced
    #[default]
    Immediate,
    /// Once the host reports that game state is available
    GameStateReady,
}

/// Host-provided condition logic
pub trait Condition: Send {
    fn init_phase(&self) -> InitPhase {
        InitPhase::Immediate
    }

    /// Startup logic; returns the initial value
    fn initialize(&mut self) -> bool;
}

/// Condition whose value is only ever pushed by the host
#[derive(Clone, Copy, Debug)]
pub struct FlagCondition {
    initial: bool,
    phase: InitPhase,
}

impl FlagCondition {
    pub fn new(initial: bool) -> Self {
        FlagCondition {
            initial,
            phase: InitPhase::Immediate,
        }
    }

    /// Starts only once game state is ready
    pub fn deferred(initial: bool) -> Self {
        FlagCondition {
            initial,
            phase: InitPhase::GameStateReady,
        }
    }
}

impl Condition for FlagCondition {
    fn init_phase(&self) -> InitPhase {
        self.phase
    }

    fn initialize(&mut self) -> bool {
        self.initial
    }
}

/// Receives value changes from the conditions it subscribed to
pub trait ConditionObserver: Send + Sync {
    fn on_condition_changed(&self, condition: &ConditionId, value: bool);
}

struct SlotState {
    value: bool,
    initialized: bool,
    condition: Box<dyn Condition>,
    observers: Vec<Weak<dyn ConditionObserver>>,
}

struct ConditionSlot {
    id: ConditionId,
    phase: InitPhase,
    state: Mutex<SlotState>,
    queries: AtomicU64,
}

/// Shared handle to one live condition
#[derive(Clone)]
pub struct ConditionHandle(Arc<ConditionSlot>);

impl ConditionHandle {
    fn new(id: ConditionId, condition: Box<dyn Condition>) -> Self {
        let phase = condition.init_phase();
        ConditionHandle(Arc::new(ConditionSlot {
            id,
            phase,
            state: Mutex::new(SlotState {
                value: false,
                initialized: false,
                condition,
                observers: Vec::new(),
            }),
            queries: AtomicU64::new(0),
        }))
    }

    pub fn id(&self) -> &ConditionId {
        &self.0.id
    }

    pub fn init_phase(&self) -> InitPhase {
        self.0.phase
    }

    /// Current value; `false` until the condition has started
    pub fn evaluate(&self) -> bool {
        self.0.queries.fetch_add(1, Ordering::Relaxed);
        self.0.state.lock().value
    }

    /// How many times [`evaluate`](Self::evaluate) has been called
    pub fn query_count(&self) -> u64 {
        self.0.queries.load(Ordering::Relaxed)
    }

    pub fn is_initialized(&self) -> bool {
        self.0.state.lock().initialized
    }

    /// Subscribe to value changes. Dropped observers are pruned lazily, on
    /// broadcast and on the next subscription.
    pub fn subscribe(&self, observer: Weak<dyn ConditionObserver>) {
        let mut state = self.0.state.lock();
        state.observers.retain(|o| o.strong_count() > 0);
        state.observers.push(observer);
    }

    /// Observers that are still alive
    pub fn observer_count(&self) -> usize {
        self.0
            .state
            .lock()
            .observers
            .iter()
            .filter(|o| o.strong_count() > 0)
            .count()
    }

    /// Push a new value; broadcasts if it changed
    pub fn set_value(&self, value: bool) -> bool {
        {
            let mut state = self.0.state.lock();
            if state.value == value {
                return false;
            }
            state.value = value;
        }
        trace!("Condition {} changed to {}", self.0.id, value);
        self.broadcast(value);
        true
    }

    fn initialize(&self) {
        let value = {
            let mut state = self.0.state.lock();
            if state.initialized {
                return;
            }
            state.initialized = true;
            let value = state.condition.initialize();
            if value == state.value {
                return;
            }
            state.value = value;
            value
        };
        self.broadcast(value);
    }

    fn broadcast(&self, value: bool) {
        // Collect outside of the lock so observers may query other handles
        let observers: Vec<Arc<dyn ConditionObserver>> = {
            let mut state = self.0.state.lock();
            state.observers.retain(|o| o.strong_count() > 0);
            state.observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.on_condition_changed(&self.0.id, value);
        }
    }
}

impl fmt::Debug for ConditionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.0.state.lock();
        f.debug_struct("ConditionHandle")
            .field("id", &self.0.id)
            .field("value", &state.value)
            .field("initialized", &state.initialized)
            .finish()
    }
}

pub type ConditionFactory = Box<dyn Fn() -> Box<dyn Condition> + Send + Sync>;

/// Conditions of one owner
pub struct ConditionRegistry {
    owner: OwnerId,
    factories: HashMap<ConditionId, ConditionFactory>,
    instances: HashMap<ConditionId, ConditionHandle>,
    game_state_ready: bool,
}

impl ConditionRegistry {
    pub fn new(owner: OwnerId) -> Self {
        ConditionRegistry {
            owner,
            factories: HashMap::new(),
            instances: HashMap::new(),
            game_state_ready: false,
        }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Register how to create a condition. Nothing is instantiated yet.
    pub fn register<F>(&mut self, id: impl Into<ConditionId>, factory: F)
    where
        F: Fn() -> Box<dyn Condition> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    /// Shorthand for a host-driven flag
    pub fn register_flag(&mut self, id: impl Into<ConditionId>, initial: bool) {
        self.register(id, move || Box::new(FlagCondition::new(initial)));
    }

    pub fn is_registered(&self, id: &ConditionId) -> bool {
        self.factories.contains_key(id)
    }

    /// Look up a condition, creating it on first reference
    pub fn resolve(&mut self, id: &ConditionId) -> Result<ConditionHandle, ComposeError> {
        if let Some(handle) = self.instances.get(id) {
            return Ok(handle.clone());
        }

        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| ComposeError::UnknownCondition(id.clone()))?;
        let handle = ConditionHandle::new(id.clone(), factory());
        debug!(
            "Instantiated condition {} for {:?} ({:?})",
            id,
            self.owner,
            handle.init_phase()
        );

        if handle.init_phase() == InitPhase::Immediate || self.game_state_ready {
            handle.initialize();
        }
        self.instances.insert(id.clone(), handle.clone());
        Ok(handle)
    }

    /// Existing instance, without creating one
    pub fn get(&self, id: &ConditionId) -> Option<ConditionHandle> {
        self.instances.get(id).cloned()
    }

    /// Push a value to a condition, creating it if needed
    pub fn set_value(&mut self, id: &ConditionId, value: bool) -> Result<bool, ComposeError> {
        Ok(self.resolve(id)?.set_value(value))
    }

    /// Run startup for conditions waiting on game state
    pub fn mark_game_state_ready(&mut self) {
        if self.game_state_ready {
            return;
        }
        self.game_state_ready = true;
        for handle in self.instances.values() {
            if !handle.is_initialized() {
                handle.initialize();
            }
        }
    }

    pub fn is_game_state_ready(&self) -> bool {
        self.game_state_ready
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}

impl fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("owner", &self.owner)
            .field("registered", &self.factories.len())
            .field("instances", &self.instances.len())
            .field("game_state_ready", &self.game_state_ready)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        changes: Mutex<Vec<(ConditionId, bool)>>,
    }

    impl ConditionObserver for Recorder {
        fn on_condition_changed(&self, condition: &ConditionId, value: bool) {
            self.changes.lock().push((condition.clone(), value));
        }
    }

    #[test]
    fn test_lazy_instantiation() {
        let mut registry = ConditionRegistry::new(OwnerId(1));
        registry.register_flag("weather.sunny", true);
        assert_eq!(registry.instance_count(), 0);

        let handle = registry.resolve(&ConditionId::new("weather.sunny")).unwrap();
        assert!(handle.evaluate());
        assert_eq!(registry.instance_count(), 1);

        let again = registry.resolve(&ConditionId::new("weather.sunny")).unwrap();
        again.set_value(false);
        assert!(!handle.evaluate());
    }

    #[test]
    fn test_unknown_condition() {
        let mut registry = ConditionRegistry::new(OwnerId(1));
        assert_eq!(
            registry.resolve(&ConditionId::new("nope")).unwrap_err(),
            ComposeError::UnknownCondition(ConditionId::new("nope"))
        );
    }

    #[test]
    fn test_deferred_condition_waits_for_game_state() {
        let mut registry = ConditionRegistry::new(OwnerId(1));
        registry.register("mode.night", || Box::new(FlagCondition::deferred(true)));

        let handle = registry.resolve(&ConditionId::new("mode.night")).unwrap();
        assert!(!handle.is_initialized());
        assert!(!handle.evaluate());

        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn ConditionObserver> = Arc::downgrade(&recorder) as Weak<dyn ConditionObserver>;
        handle.subscribe(weak);

        registry.mark_game_state_ready();
        assert!(handle.is_initialized());
        assert!(handle.evaluate());
        assert_eq!(
            recorder.changes.lock().as_slice(),
            &[(ConditionId::new("mode.night"), true)]
        );
    }

    #[test]
    fn test_broadcast_only_on_change_and_prunes_dropped() {
        let mut registry = ConditionRegistry::new(OwnerId(1));
        registry.register_flag("rain", false);
        let handle = registry.resolve(&ConditionId::new("rain")).unwrap();

        let kept = Arc::new(Recorder::default());
        let dropped = Arc::new(Recorder::default());
        handle.subscribe(Arc::downgrade(&kept) as Weak<dyn ConditionObserver>);
        handle.subscribe(Arc::downgrade(&dropped) as Weak<dyn ConditionObserver>);
        drop(dropped);
        assert_eq!(handle.observer_count(), 1);

        assert!(!handle.set_value(false));
        assert!(handle.set_value(true));
        assert_eq!(kept.changes.lock().len(), 1);
    }

    #[test]
    fn test_resubscribing_prunes_without_a_change() {
        let mut registry = ConditionRegistry::new(OwnerId(1));
        registry.register_flag("season.winter", false);
        let handle = registry.resolve(&ConditionId::new("season.winter")).unwrap();

        // Each rebuild drops the previous observer and subscribes a new one
        for _ in 0..10 {
            let observer = Arc::new(Recorder::default());
            handle.subscribe(Arc::downgrade(&observer) as Weak<dyn ConditionObserver>);
        }
        let live = Arc::new(Recorder::default());
        handle.subscribe(Arc::downgrade(&live) as Weak<dyn ConditionObserver>);

        assert_eq!(handle.0.state.lock().observers.len(), 1);
        assert_eq!(handle.observer_count(), 1);
    }
}
