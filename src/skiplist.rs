//! Augmented skip list storing Euler tour occurrences.
//!
//! A sequence is a multi-level, doubly-linked list of columns plus one
//! boundary column on the far left; the top boundary node is the sequence
//! root. Every node above the bottom level (and canonical bottom nodes) holds
//! a sketch aggregating the real occurrences it spans, and a `size` counting
//! them, so splits and joins maintain both level-by-level. Subtraction of a
//! sub-range's aggregate is done by merging it a second time (the sketch
//! merge is self-inverse).

use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter, Write as _};

use derivative::Derivative;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::sketch::Sketch;

pub type Idx = usize;
/// Returned when a node doesn't exist.
pub const EMPTY: Idx = usize::MAX;

/// Pending point updates a node buffers before folding them into its sketch.
pub const UPDATE_BUFFER_CAP: usize = 25;

fn idx_fmt(u: &Idx, f: &mut Formatter) -> std::fmt::Result {
    if *u == EMPTY {
        write!(f, "∅")
    } else {
        write!(f, "{u}")
    }
}

/// Tuning for one skip list, fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct SkipListConfig {
    /// Seed for the deterministic tower heights.
    pub seed: u64,
    /// Scales expected tower height against per-occurrence memory.
    pub height_factor: f64,
}

impl Default for SkipListConfig {
    fn default() -> Self {
        Self {
            seed: 2012,
            height_factor: 1.0,
        }
    }
}

#[derive(Derivative)]
#[derivative(Debug)]
struct Node<S: Sketch> {
    #[derivative(Debug(format_with = "idx_fmt"))]
    left: Idx,
    #[derivative(Debug(format_with = "idx_fmt"))]
    right: Idx,
    #[derivative(Debug(format_with = "idx_fmt"))]
    up: Idx,
    #[derivative(Debug(format_with = "idx_fmt"))]
    down: Idx,
    /// Nearest node on the next level up, at or left of this one.
    #[derivative(Debug(format_with = "idx_fmt"))]
    parent: Idx,
    /// Real bottom occurrences this node spans: itself (if real) plus those
    /// strictly to its right before the next same-level node.
    size: usize,
    /// Owning vertex; EMPTY for boundary nodes.
    #[derivative(Debug(format_with = "idx_fmt"))]
    owner: Idx,
    agg: Option<S>,
    #[derivative(Debug = "ignore")]
    buffer: Vec<u64>,
}

/// Arena of skip-list nodes holding any number of disjoint sequences.
pub struct SkipList<S: Sketch> {
    nodes: Vec<Node<S>>,
    free: Vec<Idx>,
    proto: S,
    config: SkipListConfig,
}

impl<S: Sketch> Debug for SkipList<S> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "SkipList {{ nodes: {}, free: {} }}",
            self.nodes.len(),
            self.free.len()
        )
    }
}

impl<S: Sketch> SkipList<S> {
    /// `proto` is the prototype aggregate: every sketch the list fabricates is
    /// a same-seeded empty copy of it.
    pub fn new(capacity: usize, proto: S, config: SkipListConfig) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity * 4),
            free: Vec::new(),
            proto: proto.fresh(),
            config,
        }
    }

    fn alloc(&mut self, owner: Idx, with_agg: bool) -> Idx {
        let node = Node {
            left: EMPTY,
            right: EMPTY,
            up: EMPTY,
            down: EMPTY,
            parent: EMPTY,
            size: usize::from(owner != EMPTY),
            owner,
            agg: with_agg.then(|| self.proto.clone()),
            buffer: Vec::new(),
        };
        match self.free.pop() {
            Some(u) => {
                self.nodes[u] = node;
                u
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn dealloc(&mut self, u: Idx) {
        let n = &mut self.nodes[u];
        n.left = EMPTY;
        n.right = EMPTY;
        n.up = EMPTY;
        n.down = EMPTY;
        n.parent = EMPTY;
        n.size = 0;
        n.owner = EMPTY;
        n.agg = None;
        n.buffer.clear();
        self.free.push(u);
    }

    /// Merge `src`'s sketch into `dst`'s, when both carry one.
    fn merge_agg(&mut self, dst: Idx, src: Idx) {
        if self.nodes[dst].agg.is_none() {
            return;
        }
        let Some(src_agg) = self.nodes[src].agg.take() else {
            return;
        };
        if let Some(d) = self.nodes[dst].agg.as_mut() {
            d.merge(&src_agg);
        }
        self.nodes[src].agg = Some(src_agg);
    }

    /// Tower height for an occurrence of `owner`: deterministic given the
    /// owner id and the list seed.
    fn element_height(&self, owner: Idx) -> usize {
        let mut rng = StdRng::seed_from_u64(
            self.config
                .seed
                .wrapping_add((owner as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        );
        let tz = rng.gen::<u64>().trailing_zeros();
        (self.config.height_factor * tz as f64) as usize + 1
    }

    /// Build a new singleton list holding one occurrence of `owner`. The
    /// bottom node carries a sketch only if `carries_data`; everything above
    /// the bottom level aggregates regardless. Returns the bottom occurrence.
    pub fn init_element(&mut self, owner: Idx, carries_data: bool) -> Idx {
        let height = self.element_height(owner);
        let mut list_prev = EMPTY;
        let mut bdry_prev = EMPTY;
        let mut bottom = EMPTY;
        for level in 0..height {
            let list_node = self.alloc(owner, if level == 0 { carries_data } else { true });
            let bdry_node = self.alloc(EMPTY, level != 0);
            self.nodes[list_node].left = bdry_node;
            self.nodes[bdry_node].right = list_node;
            if level == 0 {
                bottom = list_node;
            } else {
                self.nodes[list_node].down = list_prev;
                self.nodes[list_prev].up = list_node;
                self.nodes[list_prev].parent = list_node;
                self.nodes[bdry_node].down = bdry_prev;
                self.nodes[bdry_prev].up = bdry_node;
                self.nodes[bdry_prev].parent = bdry_node;
            }
            list_prev = list_node;
            bdry_prev = bdry_node;
        }
        // One more boundary level on top: the root of the singleton list.
        let root = self.alloc(EMPTY, true);
        self.nodes[root].size = 1;
        self.nodes[root].down = bdry_prev;
        self.nodes[bdry_prev].up = root;
        self.nodes[bdry_prev].parent = root;
        self.nodes[list_prev].parent = root;
        bottom
    }

    /// Free an occurrence's whole column, and its boundary column too when
    /// `delete_bdry` (used when the occurrence is the last of its list).
    pub fn remove_element(&mut self, u: Idx, delete_bdry: bool) {
        let bdry = self.nodes[u].left;
        let mut curr = u;
        while curr != EMPTY {
            let up = self.nodes[curr].up;
            self.dealloc(curr);
            curr = up;
        }
        if delete_bdry {
            let mut curr = bdry;
            while curr != EMPTY {
                let up = self.nodes[curr].up;
                self.dealloc(curr);
                curr = up;
            }
        }
    }

    pub fn owner(&self, u: Idx) -> Idx {
        self.nodes[u].owner
    }

    /// Next occurrence at the same level.
    pub fn next(&self, u: Idx) -> Idx {
        self.nodes[u].right
    }

    /// Nearest node on the next level up, at or left of `u`.
    pub fn get_parent(&self, u: Idx) -> Idx {
        self.nodes[u].parent
    }

    pub fn aggregate(&self, u: Idx) -> Option<&S> {
        self.nodes[u].agg.as_ref()
    }

    pub fn node_size(&self, u: Idx) -> usize {
        self.nodes[u].size
    }

    pub(crate) fn take_agg(&mut self, u: Idx) -> Option<S> {
        self.nodes[u].agg.take()
    }

    /// Top left root node of the list containing `u`.
    pub fn get_root(&self, u: Idx) -> Idx {
        let mut prev = u;
        let mut curr = u;
        while curr != EMPTY {
            prev = curr;
            curr = self.nodes[prev].parent;
        }
        prev
    }

    /// Bottom left boundary node of the list containing `u`. Goes through the
    /// root rather than walking left, so it takes log instead of linear time.
    pub fn get_first(&self, u: Idx) -> Idx {
        let mut prev = EMPTY;
        let mut curr = self.get_root(u);
        while curr != EMPTY {
            prev = curr;
            curr = self.nodes[prev].down;
        }
        prev
    }

    /// Bottom right node of the list containing `u`.
    pub fn get_last(&self, u: Idx) -> Idx {
        let mut prev = EMPTY;
        let mut curr = self.get_root(u);
        while curr != EMPTY {
            prev = curr;
            let n = &self.nodes[prev];
            curr = if n.right != EMPTY { n.right } else { n.down };
        }
        prev
    }

    /// Number of real occurrences in the list containing `u`.
    pub fn get_list_size(&self, u: Idx) -> usize {
        self.nodes[self.get_root(u)].size
    }

    /// Aggregate at the root of the list containing `u`. Does not flush
    /// pending buffered updates; callers coordinate `process_updates`.
    pub fn get_list_aggregate(&self, u: Idx) -> &S {
        self.nodes[self.get_root(u)]
            .agg
            .as_ref()
            .expect("list root carries an aggregate")
    }

    /// Buffer one point update at `u`; flushes once the buffer fills. Nodes
    /// without a sketch ignore updates.
    pub fn update_agg(&mut self, u: Idx, index: u64) {
        if self.nodes[u].agg.is_none() {
            return;
        }
        self.nodes[u].buffer.push(index);
        if self.nodes[u].buffer.len() >= UPDATE_BUFFER_CAP {
            self.process_updates(u);
        }
    }

    /// Fold all buffered updates at `u` into its sketch.
    pub fn process_updates(&mut self, u: Idx) {
        if let Node {
            agg: Some(agg),
            buffer,
            ..
        } = &mut self.nodes[u]
        {
            for index in buffer.drain(..) {
                agg.update(index);
            }
        }
    }

    /// Apply a point update at `u` and every ancestor along the parent
    /// fingers. Returns the root reached.
    pub fn update_path_agg(&mut self, u: Idx, index: u64) -> Idx {
        let mut prev = u;
        let mut curr = u;
        while curr != EMPTY {
            self.update_agg(curr, index);
            prev = curr;
            curr = self.nodes[prev].parent;
        }
        prev
    }

    /// Merge a whole sketch into `u` and every ancestor; a node without a
    /// sketch adopts a copy. Used to transplant a vertex's data aggregate
    /// onto a new canonical occurrence. Returns the root reached.
    pub fn merge_path_agg(&mut self, u: Idx, sketch: &S) -> Idx {
        let mut prev = u;
        let mut curr = u;
        while curr != EMPTY {
            match self.nodes[curr].agg.as_mut() {
                Some(agg) => agg.merge(sketch),
                None => self.nodes[curr].agg = Some(sketch.clone()),
            }
            prev = curr;
            curr = self.nodes[prev].parent;
        }
        prev
    }

    /// Distinct owners of all occurrences in the list containing `u`.
    pub fn get_component(&self, u: Idx) -> BTreeSet<Idx> {
        let mut vertices = BTreeSet::new();
        // Skip over the boundary node.
        let mut curr = self.nodes[self.get_first(u)].right;
        while curr != EMPTY {
            vertices.insert(self.nodes[curr].owner);
            curr = self.nodes[curr].right;
        }
        vertices
    }

    /// Root of the list formed by joining the lists containing `left` and
    /// `right`, in that order.
    pub fn join(&mut self, left: Idx, right: Idx) -> Idx {
        assert!(left != EMPTY || right != EMPTY);
        if left == EMPTY {
            return self.get_root(right);
        }
        if right == EMPTY {
            return self.get_root(left);
        }
        log::trace!("join({left}, {right})");
        let mut l_curr = self.get_last(left);
        let mut r_curr = self.get_first(right); // bottom boundary node
        let r_first = self.nodes[r_curr].right;
        let mut l_prev = EMPTY;
        let mut r_prev = EMPTY;

        // Go up levels: link pointers across the seam, add aggregates.
        while l_curr != EMPTY && r_curr != EMPTY {
            // Splice over the right list's boundary node at this level.
            let rr = self.nodes[r_curr].right;
            self.nodes[l_curr].right = rr;
            if rr != EMPTY {
                self.nodes[rr].left = l_curr;
            }
            self.process_updates(r_curr);
            self.merge_agg(l_curr, r_curr);
            self.nodes[l_curr].size += self.nodes[r_curr].size;

            if r_prev != EMPTY {
                self.dealloc(r_prev);
            }
            l_prev = l_curr;
            r_prev = r_curr;
            l_curr = self.nodes[l_prev].parent;
            r_curr = self.nodes[r_prev].up;
        }

        // Left list was taller: fold the right root into the rest of the
        // left path.
        while l_curr != EMPTY {
            self.merge_agg(l_curr, r_prev);
            self.nodes[l_curr].size += self.nodes[r_prev].size;
            l_prev = l_curr;
            l_curr = self.nodes[l_prev].parent;
        }

        // Right list was taller: manufacture new boundary levels on the left.
        if r_curr != EMPTY {
            // Recover the left total: l_prev already absorbed r_prev, so a
            // second merge cancels it out.
            self.process_updates(l_prev);
            let mut l_root_agg = self.proto.clone();
            if let Some(a) = self.nodes[l_prev].agg.as_ref() {
                l_root_agg.merge(a);
            }
            if let Some(a) = self.nodes[r_prev].agg.as_ref() {
                l_root_agg.merge(a);
            }
            let l_root_size = self.nodes[l_prev].size - self.nodes[r_prev].size;
            while r_curr != EMPTY {
                let nb = self.alloc(EMPTY, true);
                self.nodes[nb].down = l_prev;
                self.nodes[l_prev].up = nb;
                self.nodes[l_prev].parent = nb;
                let rr = self.nodes[r_curr].right;
                self.nodes[nb].right = rr;
                if rr != EMPTY {
                    self.nodes[rr].left = nb;
                }

                if let Some(a) = self.nodes[nb].agg.as_mut() {
                    a.merge(&l_root_agg);
                }
                self.nodes[nb].size = l_root_size;
                self.process_updates(r_curr);
                self.merge_agg(nb, r_curr);
                self.nodes[nb].size += self.nodes[r_curr].size;

                if r_prev != EMPTY {
                    self.dealloc(r_prev);
                }
                l_prev = nb;
                r_prev = r_curr;
                r_curr = self.nodes[r_prev].up;
            }
        }
        self.dealloc(r_prev);

        // Repair parent fingers along the seam: the right list's leading
        // staircase now has new nearest-left ancestors.
        let mut r = r_first;
        while r != EMPTY {
            while r != EMPTY && self.nodes[r].up == EMPTY {
                self.nodes[r].parent = self.nodes[self.nodes[r].left].parent;
                r = self.nodes[r].right;
            }
            if r != EMPTY {
                r = self.nodes[r].up;
            }
        }
        l_prev
    }

    /// Join a chain of lists, associating `join(a, b, c) = join(a, join(b, c))`.
    /// EMPTY entries are skipped.
    pub fn join_all(&mut self, parts: &[Idx]) -> Idx {
        let mut acc = EMPTY;
        for &p in parts.iter().rev() {
            if p == EMPTY {
                continue;
            }
            acc = if acc == EMPTY { p } else { self.join(p, acc) };
        }
        if acc == EMPTY {
            EMPTY
        } else {
            self.get_root(acc)
        }
    }

    /// Split immediately left of `node`'s column. Returns the root of the
    /// left fragment, or EMPTY if `node` has no real predecessor (then the
    /// split is a no-op). `node` itself stays reachable in the right
    /// fragment via `get_root`.
    pub fn split_left(&mut self, node: Idx) -> Idx {
        assert!(node != EMPTY);
        assert!(self.nodes[node].left != EMPTY && self.nodes[node].down == EMPTY);
        // Just splitting off the boundary nodes: do nothing instead.
        if self.nodes[self.nodes[node].left].left == EMPTY {
            return EMPTY;
        }
        log::trace!("split_left({node})");
        let mut r_curr = node;
        let mut l_curr = self.nodes[node].left;
        // New boundary column for the right fragment, built level by level;
        // each level's aggregate is the sum of the right path at the level
        // below, which is also exactly what each left corner loses.
        let mut bdry = self.alloc(EMPTY, false);
        while r_curr != EMPTY {
            self.nodes[r_curr].left = bdry;
            self.nodes[bdry].right = r_curr;
            self.nodes[l_curr].right = EMPTY;
            // Self-inverse merge doubles as subtraction.
            self.merge_agg(l_curr, bdry);
            self.nodes[l_curr].size -= self.nodes[bdry].size;

            l_curr = self.nodes[l_curr].parent;
            let new_bdry = self.alloc(EMPTY, true);
            self.merge_agg(new_bdry, bdry);
            self.nodes[new_bdry].size = self.nodes[bdry].size;
            while r_curr != EMPTY && self.nodes[r_curr].up == EMPTY {
                self.process_updates(r_curr);
                self.merge_agg(new_bdry, r_curr);
                self.nodes[new_bdry].size += self.nodes[r_curr].size;
                self.nodes[r_curr].parent = new_bdry;
                r_curr = self.nodes[r_curr].right;
            }
            r_curr = if r_curr != EMPTY {
                self.nodes[r_curr].up
            } else {
                EMPTY
            };
            self.nodes[new_bdry].down = bdry;
            self.nodes[bdry].up = new_bdry;
            self.nodes[bdry].parent = new_bdry;
            bdry = new_bdry;
        }
        // Subtract the final right total from the rest of the left path.
        let mut l_prev = EMPTY;
        while l_curr != EMPTY {
            self.merge_agg(l_curr, bdry);
            self.nodes[l_curr].size -= self.nodes[bdry].size;
            l_prev = l_curr;
            l_curr = self.nodes[l_prev].parent;
        }
        // Trim boundary levels on the left that no longer span anything.
        let mut l_curr = self.nodes[l_prev].down;
        while self.nodes[l_curr].right == EMPTY {
            self.dealloc(l_prev);
            l_prev = l_curr;
            l_curr = self.nodes[l_prev].down;
        }
        self.nodes[l_prev].up = EMPTY;
        self.nodes[l_prev].parent = EMPTY;
        l_prev
    }

    /// Split immediately right of `node`'s column. Returns the root of the
    /// right fragment, or EMPTY if `node` has no right neighbor.
    pub fn split_right(&mut self, node: Idx) -> Idx {
        assert!(node != EMPTY);
        let right = self.nodes[node].right;
        if right == EMPTY {
            return EMPTY;
        }
        self.split_left(right);
        self.get_root(right)
    }

    /// Pointer-symmetry invariants for `node`'s column, checked recursively
    /// up. Verification only; not called on production paths.
    pub fn is_valid(&self, node: Idx) -> bool {
        let n = &self.nodes[node];
        let mut valid = true;
        if n.up != EMPTY && self.nodes[n.up].down != node {
            valid = false;
        }
        if n.down != EMPTY && self.nodes[n.down].up != node {
            valid = false;
        }
        if n.left != EMPTY && self.nodes[n.left].right != node {
            valid = false;
        }
        if n.right != EMPTY && self.nodes[n.right].left != node {
            valid = false;
        }
        if n.up != EMPTY && !self.is_valid(n.up) {
            valid = false;
        }
        if n.parent == EMPTY && n.right != EMPTY {
            valid = false;
        }
        valid
    }

    /// Render the towers of the list containing `u`, for debugging.
    pub fn print_list(&self, u: Idx) -> String {
        let mut out = String::new();
        let mut curr = self.get_first(u);
        while curr != EMPTY {
            let n = &self.nodes[curr];
            if n.owner == EMPTY {
                let _ = write!(out, "-inf:\t");
            } else {
                let _ = write!(out, "{}:\t", n.owner);
            }
            let mut col = curr;
            while col != EMPTY {
                out.push('O');
                col = self.nodes[col].up;
            }
            out.push('\n');
            curr = self.nodes[curr].right;
        }
        out
    }
}
