//! # Feature Factories
//!
//! Factories own a feature's search space: the field universe, the weight
//! palette, and the cardinality bounds on how many free fields may appear
//! together. They produce random candidates for seeding, deterministic
//! enumerations for exhaustive search over small spaces, and crossed-over
//! or mutated variants for the genetic operators.

use std::collections::HashSet;

use crate::error::{Result, TuneError};
use crate::features::{
    Feature, FloatFeature, WeightableField, WeightableListFeature, DEFAULT_WEIGHT_MAX,
    DEFAULT_WEIGHT_MIN,
};
use crate::mutate::mutated_weight;
use crate::rng::RandomNumberGenerator;

/// Unbounded maximum set size marker in configuration files.
pub const UNBOUNDED_SET_SIZE: i32 = -1;

/// Object-safe view over one feature's search space, independent of the
/// feature's concrete variant.
pub trait FeatureFactory: Send + Sync {
    /// The feature slot this factory populates (`qf`, `tie`, ...).
    fn feature_name(&self) -> &str;

    /// A random candidate feature.
    fn random_feature(&self, rng: &mut RandomNumberGenerator) -> Feature;

    /// Up to `max_count` distinct candidates, deterministically enumerated.
    fn permute_features(&self, max_count: usize) -> Vec<Feature>;

    /// A child combining both parents' assignments.
    ///
    /// # Errors
    ///
    /// Fails when a parent is of a different variant than this factory
    /// produces.
    fn crossover_features(
        &self,
        a: &Feature,
        b: &Feature,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Feature>;

    /// Perturbs a feature of this factory's variant in place.
    fn mutate_feature(
        &self,
        feature: &mut Feature,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()>;
}

/// Factory over an ordered field universe with a weight palette.
///
/// Field specs may carry a `^weight` suffix locking that field's weight; the
/// remaining free fields are combined under `[min_set_size, max_set_size]`
/// cardinality bounds (`-1` for unbounded).
#[derive(Debug, Clone)]
pub struct WeightableListFeatureFactory {
    name: String,
    fields: Vec<WeightableField>,
    default_weights: Vec<f32>,
    min_set_size: usize,
    max_set_size: Option<usize>,
}

impl WeightableListFeatureFactory {
    /// Builds a factory, validating bounds against the parsed universe.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error when `min_set_size` exceeds the
    /// number of free fields, when a bounded `max_set_size` is smaller than
    /// `min_set_size`, or when a field spec is malformed. Failing here, at
    /// construction, keeps `random`/`permute` infallible on cardinality.
    pub fn new(
        name: &str,
        field_specs: &[String],
        default_weights: Vec<f32>,
        min_set_size: i32,
        max_set_size: i32,
    ) -> Result<Self> {
        let fields: Vec<WeightableField> = field_specs
            .iter()
            .map(|s| WeightableField::parse(s))
            .collect::<Result<_>>()?;
        if min_set_size < 0 {
            return Err(TuneError::Configuration(format!(
                "{}: minSetSize must be >= 0, got {}",
                name, min_set_size
            )));
        }
        let min_set_size = min_set_size as usize;
        let max_set_size = if max_set_size == UNBOUNDED_SET_SIZE {
            None
        } else if max_set_size < 0 {
            return Err(TuneError::Configuration(format!(
                "{}: maxSetSize must be -1 (unbounded) or >= 0, got {}",
                name, max_set_size
            )));
        } else {
            Some(max_set_size as usize)
        };
        let free_count = fields.iter().filter(|f| !f.is_fixed()).count();
        if min_set_size > free_count {
            return Err(TuneError::Configuration(format!(
                "{}: minSetSize {} exceeds the {} free fields available",
                name, min_set_size, free_count
            )));
        }
        if let Some(max) = max_set_size {
            if max < min_set_size {
                return Err(TuneError::Configuration(format!(
                    "{}: maxSetSize {} is smaller than minSetSize {}",
                    name, max, min_set_size
                )));
            }
        }
        if default_weights.iter().any(|w| !w.is_finite()) {
            return Err(TuneError::Configuration(format!(
                "{}: default weights must be finite",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            fields,
            default_weights,
            min_set_size,
            max_set_size,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn fixed_fields(&self) -> impl Iterator<Item = &WeightableField> {
        self.fields.iter().filter(|f| f.is_fixed())
    }

    fn free_fields(&self) -> Vec<&WeightableField> {
        self.fields.iter().filter(|f| !f.is_fixed()).collect()
    }

    fn weight_bounds(&self) -> (f32, f32) {
        if self.default_weights.len() >= 2 {
            let mut lo = f32::MAX;
            let mut hi = f32::MIN;
            for &w in &self.default_weights {
                lo = lo.min(w);
                hi = hi.max(w);
            }
            (lo, hi)
        } else {
            (DEFAULT_WEIGHT_MIN, DEFAULT_WEIGHT_MAX)
        }
    }

    fn random_weight(&self, rng: &mut RandomNumberGenerator) -> f32 {
        if self.default_weights.is_empty() {
            rng.uniform_f32(DEFAULT_WEIGHT_MIN, DEFAULT_WEIGHT_MAX)
        } else {
            self.default_weights[rng.uniform_index(self.default_weights.len())]
        }
    }

    /// A random candidate: every fixed field at its locked weight plus a
    /// random-size subset of free fields with palette (or default-range)
    /// weights.
    pub fn random(&self, rng: &mut RandomNumberGenerator) -> WeightableListFeature {
        let mut ret = WeightableListFeature::new(&self.name);
        ret.add_all(self.fixed_fields().cloned());
        let free = self.free_fields();
        if free.is_empty() {
            return ret;
        }
        let lower = self.min_set_size.min(free.len());
        let upper = self
            .max_set_size
            .map(|m| m.min(free.len()))
            .unwrap_or(free.len());
        let k = if upper > lower {
            lower + rng.uniform_index(upper - lower + 1)
        } else {
            lower
        };
        let mut order: Vec<usize> = (0..free.len()).collect();
        rng.shuffle(&mut order);
        for &i in order.iter().take(k) {
            let weight = self.random_weight(rng);
            ret.add(WeightableField::free(free[i].field(), weight));
        }
        ret
    }

    /// Deterministically enumerates candidate combinations, stopping once
    /// `max_count` distinct results have been collected.
    ///
    /// The walk starts at every position of the field universe and extends
    /// field by field in order: fixed fields always join at their locked
    /// weight; free fields branch over the palette, where a palette weight
    /// of `0` means the field is skipped (or join unweighted when the
    /// palette is empty). Every intermediate combination whose size lies
    /// within the cardinality bounds is collected, deduplicated as an
    /// order-insensitive field/weight set.
    pub fn permute(&self, max_count: usize) -> Vec<WeightableListFeature> {
        let mut collected = Vec::new();
        let mut seen: HashSet<Vec<(String, u32)>> = HashSet::new();
        for start in 0..self.fields.len() {
            if collected.len() >= max_count {
                break;
            }
            let current = WeightableListFeature::new(&self.name);
            self.extend(start, current, max_count, &mut seen, &mut collected);
        }
        collected
    }

    fn extend(
        &self,
        index: usize,
        current: WeightableListFeature,
        max_count: usize,
        seen: &mut HashSet<Vec<(String, u32)>>,
        collected: &mut Vec<WeightableListFeature>,
    ) {
        if collected.len() >= max_count {
            return;
        }
        if self.within_bounds(current.len()) && seen.insert(current.set_key()) {
            collected.push(current.clone());
        }
        if index >= self.fields.len() {
            return;
        }
        let field = &self.fields[index];
        if field.is_fixed() {
            let mut next = current;
            next.add(field.clone());
            self.extend(index + 1, next, max_count, seen, collected);
        } else if self.default_weights.is_empty() {
            let mut next = current;
            next.add(WeightableField::free(field.field(), 1.0));
            self.extend(index + 1, next, max_count, seen, collected);
        } else {
            for &weight in &self.default_weights {
                if weight > 0.0 {
                    let mut next = current.clone();
                    next.add(WeightableField::free(field.field(), weight));
                    self.extend(index + 1, next, max_count, seen, collected);
                } else {
                    self.extend(index + 1, current.clone(), max_count, seen, collected);
                }
            }
        }
    }

    fn within_bounds(&self, size: usize) -> bool {
        size >= self.min_set_size.max(1)
            && self.max_set_size.map(|m| size <= m).unwrap_or(true)
    }

    /// Produces a child by merging each parent's field/weight assignments.
    ///
    /// Fields present in both parents take either parent's weight at random;
    /// fields present in only one are inherited with a 50% chance of
    /// omission. Fixed fields are always carried. The child's free-field
    /// count is repaired into the configured bounds by random drops or
    /// additions.
    pub fn crossover(
        &self,
        a: &WeightableListFeature,
        b: &WeightableListFeature,
        rng: &mut RandomNumberGenerator,
    ) -> WeightableListFeature {
        let mut child = WeightableListFeature::new(&self.name);
        child.add_all(self.fixed_fields().cloned());
        for field in self.free_fields() {
            let name = field.field();
            match (a.weight_of(name), b.weight_of(name)) {
                (Some(wa), Some(wb)) => {
                    let w = if rng.gen_bool(0.5) { wa } else { wb };
                    child.add(WeightableField::free(name, w));
                }
                (Some(w), None) | (None, Some(w)) => {
                    if rng.gen_bool(0.5) {
                        child.add(WeightableField::free(name, w));
                    }
                }
                (None, None) => {}
            }
        }
        self.repair(&mut child, rng);
        child
    }

    /// Perturbs one free-field weight within the palette's span (or the
    /// default range when the palette is too small to define one).
    pub fn mutate(
        &self,
        feature: &mut WeightableListFeature,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let (lo, hi) = self.weight_bounds();
        feature.mutate_in_range(lo, hi, amplitude, rng)
    }

    fn repair(&self, child: &mut WeightableListFeature, rng: &mut RandomNumberGenerator) {
        let free_in = |c: &WeightableListFeature| -> Vec<String> {
            c.fields()
                .iter()
                .filter(|f| !f.is_fixed())
                .map(|f| f.field().to_string())
                .collect()
        };
        if let Some(max) = self.max_set_size {
            let mut present = free_in(child);
            while present.len() > max {
                let victim = present.swap_remove(rng.uniform_index(present.len()));
                child.remove_field(&victim);
            }
        }
        let free = self.free_fields();
        let lower = self.min_set_size.min(free.len());
        loop {
            let present = free_in(child);
            if present.len() >= lower {
                break;
            }
            let absent: Vec<&&WeightableField> = free
                .iter()
                .filter(|f| !child.contains_field(f.field()))
                .collect();
            if absent.is_empty() {
                break;
            }
            let pick = absent[rng.uniform_index(absent.len())];
            let weight = self.random_weight(rng);
            child.add(WeightableField::free(pick.field(), weight));
        }
    }
}

impl FeatureFactory for WeightableListFeatureFactory {
    fn feature_name(&self) -> &str {
        self.name()
    }

    fn random_feature(&self, rng: &mut RandomNumberGenerator) -> Feature {
        Feature::WeightableList(self.random(rng))
    }

    fn permute_features(&self, max_count: usize) -> Vec<Feature> {
        self.permute(max_count)
            .into_iter()
            .map(Feature::WeightableList)
            .collect()
    }

    fn crossover_features(
        &self,
        a: &Feature,
        b: &Feature,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Feature> {
        match (a, b) {
            (Feature::WeightableList(a), Feature::WeightableList(b)) => {
                Ok(Feature::WeightableList(self.crossover(a, b, rng)))
            }
            _ => Err(TuneError::Configuration(format!(
                "{}: crossover parents must both be weightable lists",
                self.name
            ))),
        }
    }

    fn mutate_feature(
        &self,
        feature: &mut Feature,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        match feature {
            Feature::WeightableList(f) => self.mutate(f, amplitude, rng),
            _ => Err(TuneError::Configuration(format!(
                "{}: cannot mutate a non-list feature",
                self.name
            ))),
        }
    }
}

/// Factory for a scalar feature: a value palette or a bounded range.
#[derive(Debug, Clone)]
pub struct FloatFeatureFactory {
    name: String,
    values: Vec<f32>,
    min: f32,
    max: f32,
}

impl FloatFeatureFactory {
    pub fn new(name: &str, values: Vec<f32>, min: f32, max: f32) -> Result<Self> {
        if min > max {
            return Err(TuneError::Configuration(format!(
                "{}: min {} exceeds max {}",
                name, min, max
            )));
        }
        if values.iter().any(|v| *v < min || *v > max) {
            return Err(TuneError::Configuration(format!(
                "{}: palette value outside [{}, {}]",
                name, min, max
            )));
        }
        Ok(Self {
            name: name.to_string(),
            values,
            min,
            max,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn random(&self, rng: &mut RandomNumberGenerator) -> FloatFeature {
        let value = if self.values.is_empty() {
            rng.uniform_f32(self.min, self.max)
        } else {
            self.values[rng.uniform_index(self.values.len())]
        };
        FloatFeature::new(&self.name, value, self.min, self.max)
    }

    /// The palette in declaration order, capped at `max_count`.
    pub fn permute(&self, max_count: usize) -> Vec<FloatFeature> {
        self.values
            .iter()
            .take(max_count)
            .map(|&v| FloatFeature::new(&self.name, v, self.min, self.max))
            .collect()
    }

    pub fn crossover(
        &self,
        a: &FloatFeature,
        b: &FloatFeature,
        rng: &mut RandomNumberGenerator,
    ) -> FloatFeature {
        let value = if rng.gen_bool(0.5) { a.value() } else { b.value() };
        FloatFeature::new(&self.name, value, self.min, self.max)
    }

    pub fn mutate(
        &self,
        feature: &mut FloatFeature,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        let v = mutated_weight(self.min, self.max, amplitude, rng)?;
        feature.set_value(v);
        Ok(())
    }
}

impl FeatureFactory for FloatFeatureFactory {
    fn feature_name(&self) -> &str {
        self.name()
    }

    fn random_feature(&self, rng: &mut RandomNumberGenerator) -> Feature {
        Feature::Float(self.random(rng))
    }

    fn permute_features(&self, max_count: usize) -> Vec<Feature> {
        self.permute(max_count)
            .into_iter()
            .map(Feature::Float)
            .collect()
    }

    fn crossover_features(
        &self,
        a: &Feature,
        b: &Feature,
        rng: &mut RandomNumberGenerator,
    ) -> Result<Feature> {
        match (a, b) {
            (Feature::Float(a), Feature::Float(b)) => Ok(Feature::Float(self.crossover(a, b, rng))),
            _ => Err(TuneError::Configuration(format!(
                "{}: crossover parents must both be floats",
                self.name
            ))),
        }
    }

    fn mutate_feature(
        &self,
        feature: &mut Feature,
        amplitude: f64,
        rng: &mut RandomNumberGenerator,
    ) -> Result<()> {
        match feature {
            Feature::Float(f) => self.mutate(f, amplitude, rng),
            _ => Err(TuneError::Configuration(format!(
                "{}: cannot mutate a non-float feature",
                self.name
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn factories_agree_through_the_object_safe_view() {
        let list = WeightableListFeatureFactory::new(
            "qf",
            &specs(&["a", "b"]),
            vec![0.0, 1.0],
            1,
            UNBOUNDED_SET_SIZE,
        )
        .unwrap();
        let float = FloatFeatureFactory::new("tie", vec![0.1, 0.3], 0.0, 1.0).unwrap();
        let factories: Vec<&dyn FeatureFactory> = vec![&list, &float];

        let mut rng = RandomNumberGenerator::from_seed(2);
        for factory in &factories {
            let a = factory.random_feature(&mut rng);
            let b = factory.random_feature(&mut rng);
            assert_eq!(a.name(), factory.feature_name());
            let mut child = factory.crossover_features(&a, &b, &mut rng).unwrap();
            factory.mutate_feature(&mut child, 0.5, &mut rng).unwrap();
        }
        assert_eq!(list.permute_features(100).len(), 3);
        assert_eq!(float.permute_features(100).len(), 2);
    }

    #[test]
    fn crossover_across_variants_is_rejected() {
        let list = WeightableListFeatureFactory::new(
            "qf",
            &specs(&["a"]),
            vec![0.0, 1.0],
            1,
            UNBOUNDED_SET_SIZE,
        )
        .unwrap();
        let float = FloatFeatureFactory::new("tie", vec![0.1], 0.0, 1.0).unwrap();
        let mut rng = RandomNumberGenerator::from_seed(2);
        let a = list.random_feature(&mut rng);
        let b = float.random_feature(&mut rng);
        assert!(list.crossover_features(&a, &b, &mut rng).is_err());
    }

    #[test]
    fn min_set_size_beyond_free_fields_fails_at_construction() {
        let err = WeightableListFeatureFactory::new(
            "qf",
            &specs(&["a", "b^2.0"]),
            vec![0.0, 1.0],
            2,
            UNBOUNDED_SET_SIZE,
        );
        assert!(err.is_err());
    }

    #[test]
    fn bounded_max_below_min_fails_at_construction() {
        let err =
            WeightableListFeatureFactory::new("qf", &specs(&["a", "b", "c"]), vec![1.0], 2, 1);
        assert!(err.is_err());
    }

    #[test]
    fn crossover_repairs_free_field_count_into_bounds() {
        let factory = WeightableListFeatureFactory::new(
            "qf",
            &specs(&["a", "b", "c", "d"]),
            vec![0.0, 1.0, 2.0],
            1,
            2,
        )
        .unwrap();
        let mut rng = RandomNumberGenerator::from_seed(5);
        let mut a = WeightableListFeature::new("qf");
        a.add(WeightableField::free("a", 1.0));
        a.add(WeightableField::free("b", 2.0));
        let mut b = WeightableListFeature::new("qf");
        b.add(WeightableField::free("c", 1.0));
        b.add(WeightableField::free("d", 2.0));
        for _ in 0..50 {
            let child = factory.crossover(&a, &b, &mut rng);
            let free = child.fields().iter().filter(|f| !f.is_fixed()).count();
            assert!((1..=2).contains(&free), "free count {} out of bounds", free);
        }
    }

    #[test]
    fn crossover_carries_fixed_fields() {
        let factory = WeightableListFeatureFactory::new(
            "qf",
            &specs(&["a", "b^3.2", "d"]),
            vec![0.0, 1.0],
            1,
            UNBOUNDED_SET_SIZE,
        )
        .unwrap();
        let mut rng = RandomNumberGenerator::from_seed(9);
        let a = factory.random(&mut rng);
        let b = factory.random(&mut rng);
        for _ in 0..20 {
            let child = factory.crossover(&a, &b, &mut rng);
            assert_eq!(child.weight_of("b"), Some(3.2));
        }
    }

    #[test]
    fn float_factory_palette_permute() {
        let factory = FloatFeatureFactory::new("tie", vec![0.0, 0.1, 0.2], 0.0, 1.0).unwrap();
        let values: Vec<f32> = factory.permute(10).iter().map(|f| f.value()).collect();
        assert_eq!(values, vec![0.0, 0.1, 0.2]);
        assert_eq!(factory.permute(2).len(), 2);
    }

    #[test]
    fn float_factory_rejects_palette_outside_bounds() {
        assert!(FloatFeatureFactory::new("tie", vec![2.0], 0.0, 1.0).is_err());
    }
}
