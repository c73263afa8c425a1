//! Euler tour trees over the augmented skip list: one tour per tree in the
//! forest, re-rooted and spliced through `split`/`join` on every `link`/`cut`.

use std::collections::{BTreeMap, BTreeSet};

use crate::skiplist::{Idx, SkipList, SkipListConfig, EMPTY};
use crate::sketch::Sketch;

pub type Vertex = usize;

fn alg_panic() -> ! {
    panic!("EulerTourTree algorithm incorrect")
}

/// One graph vertex's bookkeeping inside a tour.
#[derive(Debug)]
struct TourVertex {
    /// One occurrence per tour neighbor; the `None` key is the sentinel
    /// marking the tour's cut point. Exactly one vertex per tour holds it.
    edges: BTreeMap<Option<Vertex>, Idx>,
    /// The single occurrence carrying this vertex's own data aggregate.
    canonical: Idx,
}

/// Forest of Euler tours over dense vertex ids `0..num_nodes`. A tier of the
/// forest-maintenance scheme owns one of these.
#[derive(Debug)]
pub struct EulerTourTree<S: Sketch> {
    list: SkipList<S>,
    nodes: Vec<TourVertex>,
    /// Holds a vertex's data aggregate while it transiently has no
    /// occurrence during an edge removal or insertion.
    scratch: S,
}

impl<S: Sketch> EulerTourTree<S> {
    /// `proto` is the prototype aggregate all fabricated sketches copy their
    /// seed and shape from.
    pub fn new(num_nodes: usize, proto: S, config: SkipListConfig) -> Self {
        let scratch = proto.fresh();
        let mut tree = Self {
            list: SkipList::new(num_nodes, proto, config),
            nodes: Vec::with_capacity(num_nodes),
            scratch,
        };
        for u in 0..num_nodes {
            tree.nodes.push(TourVertex {
                edges: BTreeMap::new(),
                canonical: EMPTY,
            });
            tree.make_edge(u, None, false);
        }
        tree
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Underlying occurrence list, for inspection.
    pub fn list(&self) -> &SkipList<S> {
        &self.list
    }

    fn canonical(&self, u: Vertex) -> Idx {
        let c = self.nodes[u].canonical;
        if c == EMPTY {
            alg_panic()
        }
        c
    }

    /// New occurrence of `u` keyed by tour neighbor `to`. If `u` currently
    /// carries no data aggregate the new occurrence becomes canonical, and
    /// with `transplant` the scratch aggregate is folded onto its path.
    fn make_edge(&mut self, u: Vertex, to: Option<Vertex>, transplant: bool) -> Idx {
        let carries_data = self.nodes[u].canonical == EMPTY;
        let occ = self.list.init_element(u, carries_data);
        if carries_data {
            self.nodes[u].canonical = occ;
            if transplant {
                self.list.merge_path_agg(occ, &self.scratch);
                self.scratch.zero_contents();
            }
        }
        let old = self.nodes[u].edges.insert(to, occ);
        debug_assert!(old.is_none());
        occ
    }

    /// Remove `u`'s occurrence keyed `to`, which must already be a singleton
    /// list. A canonical occurrence's aggregate moves to a surviving
    /// occurrence, or out into the scratch when there is none.
    fn delete_edge(&mut self, u: Vertex, to: Option<Vertex>) {
        let Some(occ) = self.nodes[u].edges.remove(&to) else {
            alg_panic()
        };
        if occ == self.nodes[u].canonical {
            self.list.process_updates(occ);
            let Some(agg) = self.list.take_agg(occ) else {
                alg_panic()
            };
            if let Some(&new_canonical) = self.nodes[u].edges.values().next() {
                self.nodes[u].canonical = new_canonical;
                self.list.merge_path_agg(new_canonical, &agg);
            } else {
                self.nodes[u].canonical = EMPTY;
                self.scratch.merge(&agg);
            }
        }
        self.list.remove_element(occ, true);
    }

    /// Add tree edge (u, v), merging their tours. Returns false (and does
    /// nothing) when they are already in the same tree.
    pub fn link(&mut self, u: Vertex, v: Vertex) -> bool {
        let Some(&u_any) = self.nodes[u].edges.values().next() else {
            alg_panic()
        };
        let Some(&v_any) = self.nodes[v].edges.values().next() else {
            alg_panic()
        };
        let u_sent = self.list.get_last(u_any);
        let v_sent = self.list.get_last(v_any);
        // There should always be a sentinel at the end of a tour.
        debug_assert_eq!(
            self.nodes[self.list.owner(u_sent)].edges.get(&None),
            Some(&u_sent)
        );
        debug_assert_eq!(
            self.nodes[self.list.owner(v_sent)].edges.get(&None),
            Some(&v_sent)
        );
        if u_sent == v_sent {
            return false;
        }
        log::trace!("link({u}, {v})");

        // Split u's tour at its entry occurrence.
        let u_post = u_any;
        let u_pre = self.list.split_left(u_post);

        // Open v's tour at its sentinel: removing the sentinel re-roots the
        // circular tour there. A singleton v leaves nothing behind.
        let v_sent_owner = self.list.owner(v_sent);
        let v_opened = self.list.split_left(v_sent);
        self.delete_edge(v_sent_owner, None);

        let (v_prefix, v_suffix) = if v_opened == EMPTY {
            (EMPTY, EMPTY)
        } else {
            let Some(&entry) = self.nodes[v].edges.values().next() else {
                alg_panic()
            };
            (self.list.split_left(entry), entry)
        };

        let edge_uv = self.make_edge(u, Some(v), true);
        let edge_vu = self.make_edge(v, Some(u), true);

        self.list
            .join_all(&[u_pre, edge_uv, v_suffix, v_prefix, edge_vu, u_post]);
        true
    }

    /// Remove tree edge (u, v), splitting the tour in two. Returns false
    /// (and does nothing) when no such tree edge exists.
    pub fn cut(&mut self, u: Vertex, v: Vertex) -> bool {
        if !self.nodes[u].edges.contains_key(&Some(v)) {
            debug_assert!(!self.nodes[v].edges.contains_key(&Some(u)));
            return false;
        }
        log::trace!("cut({u}, {v})");
        let e1 = self.nodes[u].edges[&Some(v)];
        let e2 = self.nodes[v].edges[&Some(u)];

        let frag1r = self.list.split_right(e1);
        let e1_before_e2 = self.list.get_last(e2) != e1;
        let frag1l = self.list.split_left(e1);
        self.delete_edge(u, Some(v));
        let frag2r = self.list.split_right(e2);
        let frag2l = self.list.split_left(e2);
        self.delete_edge(v, Some(u));

        // The fragment strictly between the two occurrences is the subtree
        // hanging off the cut edge; it lost its sentinel, so it gets a fresh
        // one, and the outer fragments close back up.
        if e1_before_e2 {
            let sentinel = self.make_edge(v, None, true);
            self.list.join(frag2l, sentinel);
            self.list.join(frag1l, frag2r);
        } else {
            let sentinel = self.make_edge(u, None, true);
            self.list.join(frag2r, sentinel);
            self.list.join(frag2l, frag1r);
        }
        true
    }

    pub fn has_edge(&self, u: Vertex, v: Vertex) -> bool {
        self.nodes[u].edges.contains_key(&Some(v))
    }

    pub fn is_connected(&self, u: Vertex, v: Vertex) -> bool {
        self.get_root(u) == self.get_root(v)
    }

    /// Root occurrence of `u`'s tour.
    pub fn get_root(&self, u: Vertex) -> Idx {
        self.list.get_root(self.canonical(u))
    }

    /// Aggregate over `u`'s whole component. Does not flush pending buffered
    /// updates; call `process_updates` first when freshness matters.
    pub fn get_aggregate(&self, u: Vertex) -> &S {
        self.list.get_list_aggregate(self.canonical(u))
    }

    /// Number of vertices in `u`'s component. A tour of an n-vertex tree has
    /// 2n - 1 occurrences.
    pub fn get_size(&self, u: Vertex) -> usize {
        (self.list.get_list_size(self.canonical(u)) + 1) / 2
    }

    pub fn get_component(&self, u: Vertex) -> BTreeSet<Vertex> {
        self.list.get_component(self.canonical(u))
    }

    /// Apply a point update along `u`'s canonical ancestor chain. Returns the
    /// tour root.
    pub fn update_sketch(&mut self, u: Vertex, index: u64) -> Idx {
        let c = self.canonical(u);
        self.list.update_path_agg(c, index)
    }

    /// Apply the same point update along both `u`'s and `v`'s ancestor
    /// chains in lockstep, stopping at the first occurrence the chains
    /// share. Above a shared occurrence the two applications would cancel
    /// under the self-inverse merge, so nothing is lost by stopping.
    pub fn update_sketches(&mut self, u: Vertex, v: Vertex, index: u64) -> (Idx, Idx) {
        let mut curr1 = self.canonical(u);
        let mut curr2 = self.canonical(v);
        let (mut prev1, mut prev2) = (curr1, curr2);
        while curr1 != EMPTY || curr2 != EMPTY {
            if curr1 == curr2 {
                let root = self.list.get_root(curr1);
                return (root, root);
            }
            if curr1 != EMPTY {
                self.list.update_agg(curr1, index);
                prev1 = curr1;
                curr1 = self.list.get_parent(prev1);
            }
            if curr2 != EMPTY {
                self.list.update_agg(curr2, index);
                prev2 = curr2;
                curr2 = self.list.get_parent(prev2);
            }
        }
        (prev1, prev2)
    }

    /// Flush buffered updates at `u`'s tour root so the root aggregate is
    /// fresh. Returns the root.
    pub fn process_updates(&mut self, u: Vertex) -> Idx {
        let root = self.get_root(u);
        self.list.process_updates(root);
        root
    }

    /// Structural invariants for every occurrence of `u`. Verification only.
    pub fn is_valid(&self, u: Vertex) -> bool {
        let tv = &self.nodes[u];
        if tv.edges.is_empty() {
            return false;
        }
        if !tv.edges.values().any(|&occ| occ == tv.canonical) {
            return false;
        }
        tv.edges
            .values()
            .all(|&occ| self.list.owner(occ) == u && self.list.is_valid(occ))
    }
}
