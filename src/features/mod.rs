//! # Feature Model
//!
//! Features are the tunable pieces of a search configuration: an ordered
//! list of weighted fields (a boost clause such as `title^5.0 body^1.2`) or
//! a single bounded scalar (a tie-breaker, a minimum-should-match knob).
//!
//! The original design used an open class hierarchy resolved reflectively at
//! (de)serialization time; here each hierarchy is a closed enum with an
//! explicit `"type"` discriminator.

pub mod factories;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::Result;
use crate::mutate::mutated_weight;
use crate::rng::RandomNumberGenerator;

/// Default weight range used when no palette constrains a free field.
pub const DEFAULT_WEIGHT_MIN: f32 = 0.0;
/// Upper bound of the default free-field weight range.
pub const DEFAULT_WEIGHT_MAX: f32 = 10.0;

/// A single field with a query-time boost weight.
///
/// Fields parsed from a `"name^weight"` spec are *fixed*: their weight is
/// locked and never mutated. Bare `"name"` specs are free fields whose
/// weight the optimizer may assign and perturb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightableField {
    field: String,
    weight: f32,
    #[serde(default)]
    fixed: bool,
}

impl WeightableField {
    /// Parses a field spec. A `^weight` suffix locks the weight.
    pub fn parse(spec: &str) -> Result<Self> {
        match spec.split_once('^') {
            Some((name, w)) => {
                let weight: f32 = w.trim().parse().map_err(|_| {
                    crate::error::TuneError::Configuration(format!(
                        "malformed field spec '{}': bad weight '{}'",
                        spec, w
                    ))
                })?;
                Ok(Self {
                    field: name.trim().to_string(),
                    weight,
                    fixed: true,
                })
            }
            None => Ok(Self {
                field: spec.trim().to_string(),
                weight: 1.0,
                fixed: false,
            }),
        }
    }

    /// A free field with an assigned weight.
    pub fn free(field: &str, weight: f32) -> Self {
        Self {
            field: field.to_string(),
            weight,
            fixed: false,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight;
    }
}

impl fmt::Display for WeightableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.fixed && (self.weight - 1.0).abs() < f32::EPSILON {
            write!(f, "{}", self.field)
        } else {
            write!(f, "{}^{}", self.field, self.weight)
        }
    }
}

impl PartialEq for WeightableField {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.weight.to_bits() == other.weight.to_bits()
    }
}

impl Eq for WeightableField {}

impl PartialOrd for WeightableField {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WeightableField {
    fn cmp(&self, other: &Self) -> Ordering {
        self.field
            .cmp(&other.field)
            .then_with(|| self.weight.total_cmp(&other.weight))
    }
}

/// An ordered, name-deduplicated sequence of weighted fields.
///
/// Order is significant when serialized into a boost clause; equality for
/// permutation dedup is order-insensitive (same field/weight multiset).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightableListFeature {
    name: String,
    fields: Vec<WeightableField>,
}

impl WeightableListFeature {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a field; a field name already present keeps its first weight.
    pub fn add(&mut self, field: WeightableField) {
        if !self.contains_field(field.field()) {
            self.fields.push(field);
        }
    }

    pub fn add_all<I: IntoIterator<Item = WeightableField>>(&mut self, fields: I) {
        for f in fields {
            self.add(f);
        }
    }

    pub fn contains_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field() == field)
    }

    pub fn weight_of(&self, field: &str) -> Option<f32> {
        self.fields
            .iter()
            .find(|f| f.field() == field)
            .map(WeightableField::weight)
    }

    pub fn remove_field(&mut self, field: &str) {
        self.fields.retain(|f| f.field() != field);
    }

    pub fn fields(&self) -> &[WeightableField] {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut Vec<WeightableField> {
        &mut self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Order-insensitive equality on the field/weight multiset.
    pub fn set_equals(&self, other: &Self) -> bool {
        self.set_key() == other.set_key()
    }

    /// Canonical order-insensitive key: `(field, weight bits)` pairs sorted
    /// by field name then weight.
    pub fn set_key(&self) -> Vec<(String, u32)> {
        let mut key: Vec<(String, u32)> = self
            .fields
            .iter()
            .map(|f| (f.field().to_string(), f.weight().to_bits()))
            .collect();
        key.sort();
        key
    }

    /// Perturbs one randomly chosen free field's weight within the default
    /// weight range. A list with only fixed fields is left untouched.
    pub fn mutate(&mut self, amplitude: f64, rng: &mut RandomNumberGenerator) -> Result<()> {
        self.mutate_in_range(DEFAULT_WEIGHT_MIN, DEFAULT_WEIGHT_MAX, amplitude, rng)
    }

    pub(crate) fn mutate_in_range(
        &mut self,
        min: f32,
        max: f32,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let free: Vec<usize> = self
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_fixed())
            .map(|(i, _)| i)
            .collect();
        if free.is_empty() {
            return Ok(());
        }
        let idx = free[rng.uniform_index(free.len())];
        let weight = mutated_weight(min, max, amplitude, rng)?;
        self.fields[idx].set_weight(weight);
        Ok(())
    }
}

impl fmt::Display for WeightableListFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clause: Vec<String> = self.fields.iter().map(|w| w.to_string()).collect();
        write!(f, "{}", clause.join(" "))
    }
}

/// A scalar feature bounded to `[min, max]`, such as `tie` or `mm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FloatFeature {
    name: String,
    value: f32,
    min: f32,
    max: f32,
}

impl FloatFeature {
    pub fn new(name: &str, value: f32, min: f32, max: f32) -> Self {
        Self {
            name: name.to_string(),
            value,
            min,
            max,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    pub fn set_value(&mut self, value: f32) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Redraws the value within the feature's own bounds.
    pub fn mutate(&mut self, amplitude: f64, rng: &mut RandomNumberGenerator) -> Result<()> {
        let v = mutated_weight(self.min, self.max, amplitude, rng)?;
        self.set_value(v);
        Ok(())
    }
}

impl PartialEq for FloatFeature {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.value.to_bits() == other.value.to_bits()
    }
}

/// A tunable piece of a search configuration.
///
/// Closed set of variants with an explicit discriminator; cloning is a deep
/// copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Feature {
    WeightableList(WeightableListFeature),
    Float(FloatFeature),
}

impl Feature {
    pub fn name(&self) -> &str {
        match self {
            Feature::WeightableList(f) => f.name(),
            Feature::Float(f) => f.name(),
        }
    }

    /// Perturbs the feature in place.
    pub fn mutate(&mut self, amplitude: f64, rng: &mut RandomNumberGenerator) -> Result<()> {
        match self {
            Feature::WeightableList(f) => f.mutate(amplitude, rng),
            Feature::Float(f) => f.mutate(amplitude, rng),
        }
    }

    /// An independent copy safe to hand to another owner.
    pub fn deep_copy(&self) -> Feature {
        self.clone()
    }
}
