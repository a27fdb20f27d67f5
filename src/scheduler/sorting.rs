/*!
 * Sorting Layers
 * Named buckets that order processes within one queue
 */

use crate::core::limits::{DEFAULT_SORTING_LAYER, DEFAULT_SORTING_LAYER_ID, GENERATED_LAYER_PREFIX};
use crate::core::{ProcessId, SchedulerError, SchedulerResult, SortingLayerId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named sorting layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SortingLayer {
    pub id: SortingLayerId,
    pub name: String,
}

/// Registry of sorting layers for one queue
///
/// Always contains the default layer, which cannot be removed.
#[derive(Debug, Clone)]
pub struct SortingLayers {
    layers: Vec<SortingLayer>,
    next_id: SortingLayerId,
}

impl SortingLayers {
    pub fn new() -> Self {
        Self {
            layers: vec![SortingLayer {
                id: DEFAULT_SORTING_LAYER_ID,
                name: DEFAULT_SORTING_LAYER.to_string(),
            }],
            next_id: DEFAULT_SORTING_LAYER_ID + 1,
        }
    }

    /// Register a new layer, returning its id
    pub fn add(&mut self, name: impl Into<String>) -> SchedulerResult<SortingLayerId> {
        let name = name.into();
        if self.contains(&name) {
            return Err(SchedulerError::SortingLayerExists(name));
        }
        let id = self.allocate_id()?;
        self.layers.push(SortingLayer { id, name });
        Ok(id)
    }

    /// Register a layer with a generated unique name
    pub fn add_unnamed(&mut self) -> SchedulerResult<SortingLayer> {
        let name = format!("{}{}", GENERATED_LAYER_PREFIX, ProcessId::new().short());
        let id = self.allocate_id()?;
        let layer = SortingLayer { id, name };
        self.layers.push(layer.clone());
        Ok(layer)
    }

    fn allocate_id(&mut self) -> SchedulerResult<SortingLayerId> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or_else(|| {
            SchedulerError::Configuration("sorting layer ids exhausted".into())
        })?;
        Ok(id)
    }

    /// Remove a layer by name, returning the id it had
    pub fn remove(&mut self, name: &str) -> SchedulerResult<SortingLayerId> {
        if name == DEFAULT_SORTING_LAYER {
            return Err(SchedulerError::DefaultSortingLayer);
        }
        let index = self
            .layers
            .iter()
            .position(|layer| layer.name == name)
            .ok_or_else(|| SchedulerError::SortingLayerNotFound(name.to_string()))?;
        Ok(self.layers.remove(index).id)
    }

    pub fn get(&self, name: &str) -> Option<&SortingLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn get_by_id(&self, id: SortingLayerId) -> Option<&SortingLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    pub fn id_of(&self, name: &str) -> Option<SortingLayerId> {
        self.get(name).map(|layer| layer.id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn default_layer(&self) -> &SortingLayer {
        &self.layers[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &SortingLayer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// JSON form: `{"sorting_layers": [...]}`, default layer omitted
    pub fn to_json(&self) -> Value {
        let layers: Vec<&SortingLayer> = self
            .layers
            .iter()
            .filter(|layer| layer.id != DEFAULT_SORTING_LAYER_ID)
            .collect();
        serde_json::json!({ "sorting_layers": layers })
    }

    /// Replace every non-default layer with the ones in `json`
    pub fn load_json(&mut self, json: &Value) -> SchedulerResult<()> {
        let Some(layers) = json.get("sorting_layers") else {
            return Ok(());
        };
        let loaded: Vec<SortingLayer> = serde_json::from_value(layers.clone())
            .map_err(|e| SchedulerError::Configuration(format!("sorting layers: {}", e)))?;

        let mut fresh = Self::new();
        for layer in loaded {
            if layer.id == DEFAULT_SORTING_LAYER_ID || fresh.get_by_id(layer.id).is_some() {
                return Err(SchedulerError::Configuration(format!(
                    "duplicate sorting layer id {}",
                    layer.id
                )));
            }
            if fresh.contains(&layer.name) {
                return Err(SchedulerError::SortingLayerExists(layer.name));
            }
            let after = layer.id.checked_add(1).ok_or_else(|| {
                SchedulerError::Configuration(format!("sorting layer id {} out of range", layer.id))
            })?;
            fresh.next_id = fresh.next_id.max(after);
            fresh.layers.push(layer);
        }
        *self = fresh;
        Ok(())
    }
}

impl Default for SortingLayers {
    fn default() -> Self {
        Self::new()
    }
}
