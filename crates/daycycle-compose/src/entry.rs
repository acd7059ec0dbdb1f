//! Sub-timeline entries and their condition-driven active flag

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use daycycle_core::{AssetId, ConditionId};

use crate::{ConditionObserver, ConditionRegistry};

/// Expected value per condition; an entry is active when every condition
/// matches
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet(BTreeMap<ConditionId, bool>);

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<ConditionId>, expected: bool) -> Self {
        self.0.insert(id.into(), expected);
        self
    }

    pub fn insert(&mut self, id: impl Into<ConditionId>, expected: bool) {
        self.0.insert(id.into(), expected);
    }

    pub fn expected(&self, id: &ConditionId) -> Option<bool> {
        self.0.get(id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ConditionId, bool)> {
        self.0.iter().map(|(id, expected)| (id, *expected))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Authored reference to a sub-timeline
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubTimelineEntry {
    pub asset: AssetId,
    #[serde(default)]
    pub bias_offset: i32,
    #[serde(default)]
    pub conditions: ConditionSet,
}

impl SubTimelineEntry {
    pub fn new(asset: impl Into<AssetId>) -> Self {
        SubTimelineEntry {
            asset: asset.into(),
            bias_offset: 0,
            conditions: ConditionSet::new(),
        }
    }

    pub fn with_bias(mut self, bias_offset: i32) -> Self {
        self.bias_offset = bias_offset;
        self
    }

    pub fn with_condition(mut self, id: impl Into<ConditionId>, expected: bool) -> Self {
        self.conditions.insert(id, expected);
        self
    }
}

/// Ordered set of entries contributed by one source
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineCollection {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<SubTimelineEntry>,
}

impl TimelineCollection {
    pub fn new(name: impl Into<String>) -> Self {
        TimelineCollection {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: SubTimelineEntry) -> Self {
        self.entries.push(entry);
        self
    }
}

#[derive(Debug)]
struct ActiveState {
    /// Last known value of each referenced condition
    values: BTreeMap<ConditionId, bool>,
    active: bool,
    dirty: bool,
}

/// Live active flag of one entry, kept current by condition broadcasts
#[derive(Debug)]
pub struct EntryActivation {
    conditions: ConditionSet,
    state: Mutex<ActiveState>,
}

impl EntryActivation {
    pub fn new(conditions: ConditionSet) -> Arc<Self> {
        Arc::new(EntryActivation {
            conditions,
            state: Mutex::new(ActiveState {
                values: BTreeMap::new(),
                active: true,
                dirty: false,
            }),
        })
    }

    /// Query every referenced condition and subscribe to their changes.
    /// Conditions that can't be resolved count as `false`.
    pub fn bind(self: &Arc<Self>, registry: &mut ConditionRegistry) {
        let observer: Arc<dyn ConditionObserver> = self.clone();
        let mut values = BTreeMap::new();
        for (id, _) in self.conditions.iter() {
            let value = match registry.resolve(id) {
                Ok(handle) => {
                    handle.subscribe(Arc::downgrade(&observer));
                    handle.evaluate()
                }
                Err(err) => {
                    warn!("Condition {} unavailable, treating as false: {}", id, err);
                    false
                }
            };
            values.insert(id.clone(), value);
        }

        let mut state = self.state.lock();
        state.values = values;
        state.active = self.compute(&state.values);
    }

    /// Re-query every condition without re-subscribing
    pub fn refresh(&self, registry: &ConditionRegistry) {
        let mut state = self.state.lock();
        for (id, _) in self.conditions.iter() {
            if let Some(handle) = registry.get(id) {
                state.values.insert(id.clone(), handle.evaluate());
            }
        }
        let active = self.compute(&state.values);
        if active != state.active {
            state.active = active;
            state.dirty = true;
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    /// Clear the dirty flag, returning whether it was set
    pub fn take_dirty(&self) -> bool {
        std::mem::replace(&mut self.state.lock().dirty, false)
    }

    /// Active unless some condition differs from its expected value
    fn compute(&self, values: &BTreeMap<ConditionId, bool>) -> bool {
        !self
            .conditions
            .iter()
            .any(|(id, expected)| values.get(id).copied().unwrap_or(false) != expected)
    }
}

impl ConditionObserver for EntryActivation {
    fn on_condition_changed(&self, condition: &ConditionId, value: bool) {
        if self.conditions.expected(condition).is_none() {
            return;
        }
        let mut state = self.state.lock();
        state.values.insert(condition.clone(), value);
        let active = self.compute(&state.values);
        if active != state.active {
            trace!("Entry active flag now {} after {} changed", active, condition);
            state.active = active;
            state.dirty = true;
        }
    }
}
