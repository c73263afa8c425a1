use dynamic_connectivity::{DefaultForest, SkipListConfig, XorSketch};

fn link(t: &mut DefaultForest, u: usize, v: usize) {
    println!("Adding edge from {} to {}", u, v);
    t.link(u, v);
}

fn cut(t: &mut DefaultForest, u: usize, v: usize) {
    println!("Removing edge from {} to {}", u, v);
    t.cut(u, v);
}

fn connected(t: &DefaultForest, u: usize, v: usize) {
    println!(
        "Are {} and {} connected? {}",
        u,
        v,
        if t.is_connected(u, v) { "Yes" } else { "No" }
    );
}

fn main() {
    let n = 10;
    let mut t = DefaultForest::new(n, XorSketch::new(16, 7), SkipListConfig::default());
    for u in 0..n {
        t.update_sketch(u, u as u64);
    }
    for u in 0..n - 1 {
        t.link(u, u + 1);
    }
    println!("Created a path of length {} (vertices 0 to {})", n, n - 1);
    connected(&t, 0, 9);
    cut(&mut t, 4, 5);
    connected(&t, 0, 9);
    connected(&t, 0, 4);
    println!("Component of 0: {:?}", t.get_component(0));
    println!("Component size of 7: {}", t.get_size(7));
    link(&mut t, 2, 7);
    connected(&t, 0, 9);
    t.process_updates(0);
    println!("Everything in one component again: {:?}", t.get_component(0));
}
