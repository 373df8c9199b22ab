use ranktune::features::factories::{WeightableListFeatureFactory, UNBOUNDED_SET_SIZE};
use ranktune::features::WeightableListFeature;
use ranktune::rng::RandomNumberGenerator;

fn fields(specs: &[&str]) -> Vec<String> {
    specs.iter().map(|s| s.to_string()).collect()
}

#[test]
fn random_qf_always_includes_fixed_fields_at_locked_weights() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b^3.2", "c^1.6", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    let mut rng = RandomNumberGenerator::from_seed(13);

    for _ in 0..10 {
        let list = factory.random(&mut rng);
        let mut found_b = false;
        let mut found_c = false;
        for field in list.fields() {
            match field.field() {
                "b" => {
                    found_b = true;
                    assert!((field.weight() - 3.2).abs() < 0.001);
                }
                "c" => {
                    found_c = true;
                    assert!((field.weight() - 1.6).abs() < 0.001);
                }
                _ => {
                    assert!(field.weight() >= 0.0 && field.weight() <= 10.0);
                }
            }
        }
        assert!(found_b);
        assert!(found_c);
    }
}

#[test]
fn permute_with_fixed_fields_and_palette() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b^3.2", "c^1.6", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    let permutations = factory.permute(200);
    assert_eq!(permutations.len(), 19);
}

#[test]
fn permute_without_weights_walks_bounded_runs() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        Vec::new(),
        1,
        3,
    )
    .unwrap();
    let permutations = factory.permute(1000);
    assert_eq!(permutations.len(), 9);
}

#[test]
fn permute_counts_scale_with_the_palette() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        vec![0.0, 1.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    assert_eq!(factory.permute(1000).len(), 15);

    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    assert_eq!(factory.permute(1000).len(), 80);

    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        2,
    )
    .unwrap();
    assert_eq!(factory.permute(1000).len(), 32);
}

#[test]
fn permute_never_repeats_a_field_weight_combination() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    let permutations = factory.permute(1000);
    for (i, x) in permutations.iter().enumerate() {
        for y in permutations.iter().skip(i + 1) {
            assert!(
                !x.set_equals(y),
                "duplicate combination: {} / {}",
                x,
                y
            );
        }
    }
}

#[test]
fn permute_respects_cardinality_bounds() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        vec![0.0, 1.0, 2.0],
        2,
        3,
    )
    .unwrap();
    let permutations = factory.permute(1000);
    assert!(!permutations.is_empty());
    for p in &permutations {
        assert!((2..=3).contains(&p.len()), "size {} out of bounds", p.len());
    }
}

#[test]
fn permute_stops_at_the_requested_count() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    assert_eq!(factory.permute(7).len(), 7);
}

#[test]
fn permute_is_deterministic() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b^3.2", "c^1.6", "d"]),
        vec![0.0, 1.0, 2.0],
        1,
        UNBOUNDED_SET_SIZE,
    )
    .unwrap();
    let first: Vec<String> = factory.permute(200).iter().map(|p| p.to_string()).collect();
    let second: Vec<String> = factory.permute(200).iter().map(|p| p.to_string()).collect();
    assert_eq!(first, second);
}

#[test]
fn random_subset_sizes_stay_within_bounds() {
    let factory = WeightableListFeatureFactory::new(
        "qf",
        &fields(&["a", "b", "c", "d", "e"]),
        vec![1.0, 2.0],
        2,
        3,
    )
    .unwrap();
    let mut rng = RandomNumberGenerator::from_seed(99);
    for _ in 0..50 {
        let list: WeightableListFeature = factory.random(&mut rng);
        assert!((2..=3).contains(&list.len()), "size {}", list.len());
    }
}
