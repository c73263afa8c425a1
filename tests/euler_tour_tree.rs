use std::collections::BTreeSet;

use common::{init_logger, NaiveForest};
use dynamic_connectivity::{DefaultForest, SkipListConfig, Sketch, XorSketch};
use rand::prelude::*;
use scopeguard::{OnUnwind, ScopeGuard};

mod common;

fn guard<T: std::fmt::Debug>(t: T) -> ScopeGuard<T, impl FnOnce(T), OnUnwind> {
    scopeguard::guard_on_unwind(t, |t| log::error!("Crash with {t:?}"))
}

fn build(n: usize, seed: u64) -> DefaultForest {
    let mut t = DefaultForest::new(
        n,
        XorSketch::new(32, seed),
        SkipListConfig {
            seed,
            height_factor: 1.0,
        },
    );
    // Every vertex contributes one observation of its own id.
    for u in 0..n {
        t.update_sketch(u, u as u64);
    }
    t
}

fn expected_agg(t: &DefaultForest, vertices: &BTreeSet<usize>) -> XorSketch {
    let mut s = t.get_aggregate(0).fresh();
    for &v in vertices {
        s.update(v as u64);
    }
    s
}

/// Component membership, size, root aggregate and structural validity all
/// agree with the expected vertex set.
fn assert_component(t: &mut DefaultForest, u: usize, expected: &BTreeSet<usize>) {
    assert_eq!(&t.get_component(u), expected, "component of {u}");
    assert_eq!(t.get_size(u), expected.len(), "size of {u}");
    t.process_updates(u);
    let want = expected_agg(t, expected);
    assert_eq!(t.get_aggregate(u), &want, "aggregate of {u}");
    for &v in expected {
        assert!(t.is_valid(v), "vertex {v} invalid");
    }
}

#[test]
fn two_vertex_link_cut_cycle() {
    init_logger();
    let mut t = build(2, 5);
    assert!(!t.has_edge(0, 1));
    assert!(t.link(0, 1));
    assert!(t.has_edge(0, 1));
    assert!(t.has_edge(1, 0));
    assert_eq!(t.get_size(0), 2);
    assert_eq!(t.get_size(1), 2);
    // Linking again is a no-op.
    assert!(!t.link(1, 0));
    assert!(t.cut(0, 1));
    assert!(!t.has_edge(0, 1));
    assert_eq!(t.get_size(0), 1);
    assert_eq!(t.get_size(1), 1);
    assert!(!t.cut(0, 1));
    assert_component(&mut t, 0, &BTreeSet::from([0]));
    assert_component(&mut t, 1, &BTreeSet::from([1]));
}

#[test]
fn link_cut_round_trip() {
    init_logger();
    let mut t = build(6, 11);
    for (u, v) in [(0, 1), (1, 2), (3, 4), (4, 5)] {
        assert!(t.link(u, v));
    }
    let left = BTreeSet::from([0, 1, 2]);
    let right = BTreeSet::from([3, 4, 5]);
    assert_component(&mut t, 1, &left);
    assert_component(&mut t, 4, &right);

    assert!(t.link(2, 3));
    assert!(t.is_connected(0, 5));
    assert_component(&mut t, 0, &BTreeSet::from([0, 1, 2, 3, 4, 5]));

    // Cutting the bridge restores both components exactly.
    assert!(t.cut(2, 3));
    assert!(!t.has_edge(2, 3));
    assert!(!t.is_connected(0, 5));
    assert_component(&mut t, 1, &left);
    assert_component(&mut t, 4, &right);
}

#[test]
fn cut_interior_edge_of_a_path() {
    init_logger();
    let n = 8;
    let mut t = build(n, 17);
    for u in 0..n - 1 {
        assert!(t.link(u, u + 1));
    }
    assert!(t.cut(3, 4));
    assert_component(&mut t, 0, &(0..4).collect());
    assert_component(&mut t, 7, &(4..8).collect());
    // The two halves can be relinked at different vertices.
    assert!(t.link(1, 6));
    assert_component(&mut t, 5, &(0..8).collect());
}

#[test]
fn chain_build_teardown() {
    init_logger();
    let n = 1000;
    let mut t = build(n, 2012);

    // Pairwise link adjacent vertices into pairs, then pairs into quads,
    // and so on up to a single tree.
    let mut step = 1;
    while step < n {
        for i in (0..n).step_by(2 * step) {
            if i + step < n {
                assert!(t.link(i, i + step));
            }
        }
        step *= 2;
        for u in 0..n {
            assert!(t.is_valid(u), "vertex {u} invalid at step {step}");
        }
        for i in (0..n).step_by(step) {
            let block: BTreeSet<_> = (i..(i + step).min(n)).collect();
            assert_component(&mut t, i, &block);
        }
    }

    // Reverse by repeated cuts, checking the same properties at each stage.
    while step > 1 {
        step /= 2;
        for i in (0..n).step_by(2 * step) {
            if i + step < n {
                assert!(t.cut(i, i + step));
            }
        }
        for u in 0..n {
            assert!(t.is_valid(u), "vertex {u} invalid at step {step}");
        }
        for i in (0..n).step_by(step) {
            let block: BTreeSet<_> = (i..(i + step).min(n)).collect();
            assert_component(&mut t, i, &block);
        }
    }
}

#[test]
fn random_links_and_cuts() {
    init_logger();
    let n = 120;
    let mut t = guard(build(n, 4635));
    let t: &mut DefaultForest = &mut t;
    let mut naive = NaiveForest::new(n);
    // Every update applied to each vertex's sketch, for the oracle fold.
    let mut applied: Vec<Vec<u64>> = (0..n).map(|u| vec![u as u64]).collect();
    let mut rng = StdRng::seed_from_u64(74828);

    for q in 0..3000 {
        let a = rng.gen_range(0..n);
        let b = rng.gen_range(0..n);
        if a != b {
            if !naive.connected(a, b) {
                assert!(t.link(a, b), "link({a}, {b}) refused");
                assert!(t.is_connected(a, b));
                naive.link(a, b);
            } else if naive.has_edge(a, b) {
                assert!(t.cut(a, b), "cut({a}, {b}) refused");
                assert!(!t.is_connected(a, b));
                naive.cut(a, b);
            } else {
                assert!(!t.link(a, b));
                assert!(!t.cut(a, b));
            }
        }
        match rng.gen_range(0..4) {
            0 => {
                let x = rng.gen_range(1_000..100_000u64);
                let u = rng.gen_range(0..n);
                t.update_sketch(u, x);
                applied[u].push(x);
            }
            1 => {
                let x = rng.gen_range(1_000..100_000u64);
                let (u, v) = (rng.gen_range(0..n), rng.gen_range(0..n));
                t.update_sketches(u, v, x);
                applied[u].push(x);
                applied[v].push(x);
            }
            _ => {}
        }
        if q % 100 == 0 {
            for u in 0..n {
                assert!(t.is_valid(u));
            }
            for _ in 0..5 {
                let u = rng.gen_range(0..n);
                let comp = naive.component(u);
                assert_eq!(t.get_component(u), comp);
                assert_eq!(t.get_size(u), comp.len());
                t.process_updates(u);
                let mut expect = t.get_aggregate(u).fresh();
                for &v in &comp {
                    for &x in &applied[v] {
                        expect.update(x);
                    }
                }
                assert_eq!(t.get_aggregate(u), &expect, "aggregate of {u} at q={q}");
            }
        }
    }
}
