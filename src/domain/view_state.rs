use crate::domain::sensor_data::{SensorId, TimeRange};
use serde::Serialize;

/// Insertion-ordered set of selected sensors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SensorSelection(Vec<SensorId>);

impl SensorSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a selection keeping the first occurrence of every id.
    pub fn from_ids(ids: impl IntoIterator<Item = SensorId>) -> Self {
        let mut selection = Self::new();
        for id in ids {
            selection.insert(id);
        }
        selection
    }

    /// Returns `false` when the id was already selected.
    pub fn insert(&mut self, id: SensorId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn remove(&mut self, id: &SensorId) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != id);
        before != self.0.len()
    }

    pub fn contains(&self, id: &SensorId) -> bool {
        self.0.iter().any(|existing| existing == id)
    }

    pub fn ids(&self) -> &[SensorId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorId> {
        self.0.iter()
    }

    /// Ids selected here but absent from `other`, in selection order.
    pub fn added_since(&self, other: &SensorSelection) -> Vec<SensorId> {
        self.0.iter().filter(|id| !other.contains(id)).cloned().collect()
    }
}

/// What the user is looking at; mirrored into the address bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub selected: SensorSelection,
    pub range: TimeRange,
}

impl ViewState {
    pub fn new(selected: SensorSelection, range: TimeRange) -> Self {
        Self { selected, range }
    }

    pub fn empty(range: TimeRange) -> Self {
        Self::new(SensorSelection::new(), range)
    }
}
