//! The Boykov-Kolmogorov solver: growth, augmentation, adoption, and the
//! tree-reuse re-initialization that repairs the search trees after
//! capacity edits instead of rebuilding them.

use std::collections::VecDeque;
use std::fmt::Debug;

use log;
use num_traits::{NumAssign, Signed};

use crate::error::{Error, Result};
use crate::graph::{sister, ArcId, Graph, NodeId, Parent};

/// Distance label for a node whose walk to a terminal hit an orphan.
const INFINITE_D: usize = usize::MAX;

/// Solves on the orphan deque's retained buffer run this many times before
/// the buffer is dropped and reallocated, capping long-term fragmentation.
const ORPHAN_POOL_RESET_PERIOD: usize = 64;

impl<W> Graph<W>
where
    W: NumAssign + Signed + PartialOrd + Copy + Debug,
{
    /// Computes the maximum flow from source to sink and returns the total
    /// accumulated over the lifetime of the instance, terminal-pair
    /// cancellations from [`add_tweights`](Graph::add_tweights) included.
    ///
    /// With `reuse_trees` the search trees surviving from the previous solve
    /// are repaired around the nodes queued by [`mark_node`](Graph::mark_node)
    /// rather than rebuilt, which is much cheaper when only a few capacities
    /// changed. `changed_list`, if supplied, receives the id of every node
    /// whose tree membership may have changed during this solve, each at
    /// most once until [`remove_from_changed_list`](Graph::remove_from_changed_list)
    /// clears it.
    ///
    /// # Errors
    /// * `InvalidInput` if `reuse_trees` is set on the first solve
    /// * `InvalidInput` if `changed_list` is supplied without `reuse_trees`
    pub fn maxflow(
        &mut self,
        reuse_trees: bool,
        changed_list: Option<&mut Vec<NodeId>>,
    ) -> Result<W> {
        if reuse_trees && self.maxflow_iteration == 0 {
            return Err(Error::invalid_input(
                "reuse_trees requires a completed prior solve",
            ));
        }
        if changed_list.is_some() && !reuse_trees {
            return Err(Error::invalid_input(
                "a changed list can only be collected when reuse_trees is set",
            ));
        }
        self.track_changes = changed_list.is_some();
        self.changed.clear();

        if reuse_trees {
            self.maxflow_reuse_trees_init();
        } else {
            self.maxflow_init();
        }

        let mut augmentations = 0usize;
        let mut current_node: Option<NodeId> = None;
        loop {
            let mut i = current_node;
            if let Some(c) = i {
                // Drop the active flag; the retained node may have been
                // orphaned out of its tree since the last pass.
                self.nodes[c].next = None;
                if !self.nodes[c].parent.is_some() {
                    i = None;
                }
            }
            let i = match i {
                Some(i) => i,
                None => match self.next_active() {
                    Some(i) => i,
                    None => break,
                },
            };

            let boundary = self.grow(i);
            self.time += 1;

            if let Some(middle) = boundary {
                // Keep i active: its scan stopped at the boundary and may
                // find further paths once the trees settle.
                self.nodes[i].next = Some(i);
                current_node = Some(i);

                self.augment(middle);
                augmentations += 1;

                while let Some(orphan) = self.orphans.pop_front() {
                    if self.nodes[orphan].is_sink {
                        self.process_sink_orphan(orphan);
                    } else {
                        self.process_source_orphan(orphan);
                    }
                }
            } else {
                current_node = None;
            }
        }

        if !reuse_trees || self.maxflow_iteration % ORPHAN_POOL_RESET_PERIOD == 0 {
            self.orphans = VecDeque::new();
        }
        self.maxflow_iteration += 1;

        if let Some(sink) = changed_list {
            sink.extend(self.changed.drain(..));
        }
        self.track_changes = false;

        log::debug!(
            "maxflow solve {} finished: flow={:?}, augmentations={}",
            self.maxflow_iteration,
            self.flow,
            augmentations
        );
        Ok(self.flow)
    }

    /// Cold start: every node with terminal capacity becomes an active root
    /// of its tree, everything else is free.
    fn maxflow_init(&mut self) {
        self.queue_first = [None; 2];
        self.queue_last = [None; 2];
        self.orphans.clear();
        self.time = 0;

        for i in 0..self.nodes.len() {
            self.nodes[i].next = None;
            self.nodes[i].is_marked = false;
            self.nodes[i].is_in_changed_list = false;
            self.nodes[i].ts = 0;
            let tr_cap = self.nodes[i].tr_cap;
            if tr_cap == W::zero() {
                self.nodes[i].parent = Parent::None;
            } else {
                self.nodes[i].is_sink = tr_cap < W::zero();
                self.nodes[i].parent = Parent::Terminal;
                self.nodes[i].dist = 1;
                self.set_active(i);
            }
        }
    }

    /// Warm start: walks the nodes queued since the last solve and repairs
    /// their tree membership around the edited terminal capacities, then
    /// re-adopts whatever that severed.
    fn maxflow_reuse_trees_init(&mut self) {
        let mut queue = self.queue_first[1];
        self.queue_first = [None; 2];
        self.queue_last = [None; 2];
        self.orphans.clear();
        self.time += 1;

        let mut reexamined = 0usize;
        while let Some(i) = queue {
            let next = self.nodes[i].next;
            queue = if next == Some(i) { None } else { next };
            self.nodes[i].next = None;
            self.nodes[i].is_marked = false;
            self.set_active(i);
            reexamined += 1;

            let tr_cap = self.nodes[i].tr_cap;
            if tr_cap == W::zero() {
                // The terminal arc is gone; if the node was in a tree it
                // must find a non-terminal parent or leave.
                if self.nodes[i].parent.is_some() {
                    self.set_orphan_rear(i);
                }
                continue;
            }

            if tr_cap > W::zero() {
                if !self.nodes[i].parent.is_some() || self.nodes[i].is_sink {
                    self.nodes[i].is_sink = false;
                    let mut a = self.nodes[i].first;
                    while let Some(ai) = a {
                        let a_next = self.arcs[ai].next;
                        let j = self.arcs[ai].head;
                        if !self.nodes[j].is_marked {
                            if self.nodes[j].parent == Parent::Arc(sister(ai)) {
                                self.set_orphan_rear(j);
                            }
                            if self.nodes[j].parent.is_some()
                                && self.nodes[j].is_sink
                                && self.arcs[ai].r_cap > W::zero()
                            {
                                self.set_active(j);
                            }
                        }
                        a = a_next;
                    }
                    self.add_to_changed_list(i);
                }
            } else if !self.nodes[i].parent.is_some() || !self.nodes[i].is_sink {
                self.nodes[i].is_sink = true;
                let mut a = self.nodes[i].first;
                while let Some(ai) = a {
                    let a_next = self.arcs[ai].next;
                    let j = self.arcs[ai].head;
                    if !self.nodes[j].is_marked {
                        if self.nodes[j].parent == Parent::Arc(sister(ai)) {
                            self.set_orphan_rear(j);
                        }
                        if self.nodes[j].parent.is_some()
                            && !self.nodes[j].is_sink
                            && self.arcs[sister(ai)].r_cap > W::zero()
                        {
                            self.set_active(j);
                        }
                    }
                    a = a_next;
                }
                self.add_to_changed_list(i);
            }
            self.nodes[i].parent = Parent::Terminal;
            self.nodes[i].ts = self.time;
            self.nodes[i].dist = 1;
        }

        log::debug!("tree reuse: re-examined {} marked nodes", reexamined);

        while let Some(orphan) = self.orphans.pop_front() {
            if self.nodes[orphan].is_sink {
                self.process_sink_orphan(orphan);
            } else {
                self.process_source_orphan(orphan);
            }
        }
    }

    /// Scans the incident arcs of active node `i`, extending its tree over
    /// free neighbors. Returns the first source-to-sink boundary arc found,
    /// or `None` once the scan is exhausted.
    fn grow(&mut self, i: NodeId) -> Option<ArcId> {
        let source_side = !self.nodes[i].is_sink;
        let mut a = self.nodes[i].first;
        while let Some(ai) = a {
            let a_next = self.arcs[ai].next;
            let r_cap = if source_side {
                self.arcs[ai].r_cap
            } else {
                self.arcs[sister(ai)].r_cap
            };
            if r_cap > W::zero() {
                let j = self.arcs[ai].head;
                if !self.nodes[j].parent.is_some() {
                    self.nodes[j].is_sink = !source_side;
                    self.nodes[j].parent = Parent::Arc(sister(ai));
                    self.nodes[j].ts = self.nodes[i].ts;
                    self.nodes[j].dist = self.nodes[i].dist + 1;
                    self.set_active(j);
                    self.add_to_changed_list(j);
                } else if self.nodes[j].is_sink != self.nodes[i].is_sink {
                    return Some(if source_side { ai } else { sister(ai) });
                } else if self.nodes[j].ts <= self.nodes[i].ts
                    && self.nodes[j].dist > self.nodes[i].dist
                {
                    // j is in the same tree but farther from the terminal;
                    // rewiring it through i shortens later walks.
                    self.nodes[j].parent = Parent::Arc(sister(ai));
                    self.nodes[j].ts = self.nodes[i].ts;
                    self.nodes[j].dist = self.nodes[i].dist + 1;
                }
            }
            a = a_next;
        }
        None
    }

    /// Pushes the bottleneck of the path source tree -> `middle_arc` ->
    /// sink tree and orphans every node whose parent arc saturates.
    fn augment(&mut self, middle_arc: ArcId) {
        // Bottleneck over the source-side path.
        let mut bottleneck = self.arcs[middle_arc].r_cap;
        let mut i = self.arcs[sister(middle_arc)].head;
        loop {
            let a = match self.nodes[i].parent {
                Parent::Arc(a) => a,
                _ => break,
            };
            let r = self.arcs[sister(a)].r_cap;
            if bottleneck > r {
                bottleneck = r;
            }
            i = self.arcs[a].head;
        }
        if bottleneck > self.nodes[i].tr_cap {
            bottleneck = self.nodes[i].tr_cap;
        }

        // Bottleneck over the sink-side path.
        let mut i = self.arcs[middle_arc].head;
        loop {
            let a = match self.nodes[i].parent {
                Parent::Arc(a) => a,
                _ => break,
            };
            let r = self.arcs[a].r_cap;
            if bottleneck > r {
                bottleneck = r;
            }
            i = self.arcs[a].head;
        }
        let sink_root_cap = -self.nodes[i].tr_cap;
        if bottleneck > sink_root_cap {
            bottleneck = sink_root_cap;
        }

        // Push through the boundary arc.
        self.arcs[sister(middle_arc)].r_cap += bottleneck;
        self.arcs[middle_arc].r_cap -= bottleneck;

        // Push along the source-side path; a saturated parent arc severs
        // the child, and freshly severed nodes go to the front so nearby
        // relatives adopt them first.
        let mut i = self.arcs[sister(middle_arc)].head;
        loop {
            let a = match self.nodes[i].parent {
                Parent::Arc(a) => a,
                _ => break,
            };
            self.arcs[a].r_cap += bottleneck;
            self.arcs[sister(a)].r_cap -= bottleneck;
            if self.arcs[sister(a)].r_cap == W::zero() {
                self.set_orphan_front(i);
            }
            i = self.arcs[a].head;
        }
        self.nodes[i].tr_cap -= bottleneck;
        if self.nodes[i].tr_cap == W::zero() {
            self.set_orphan_front(i);
        }

        // Push along the sink-side path.
        let mut i = self.arcs[middle_arc].head;
        loop {
            let a = match self.nodes[i].parent {
                Parent::Arc(a) => a,
                _ => break,
            };
            self.arcs[sister(a)].r_cap += bottleneck;
            self.arcs[a].r_cap -= bottleneck;
            if self.arcs[a].r_cap == W::zero() {
                self.set_orphan_front(i);
            }
            i = self.arcs[a].head;
        }
        self.nodes[i].tr_cap += bottleneck;
        if self.nodes[i].tr_cap == W::zero() {
            self.set_orphan_front(i);
        }

        self.flow += bottleneck;
    }

    /// Tries to reattach source-tree orphan `i` through an unsaturated arc
    /// to a neighbor that verifiably still reaches the source terminal.
    fn process_source_orphan(&mut self, i: NodeId) {
        let mut a0_min: Option<ArcId> = None;
        let mut d_min = INFINITE_D;

        let mut a0 = self.nodes[i].first;
        while let Some(a0i) = a0 {
            let a0_next = self.arcs[a0i].next;
            if self.arcs[sister(a0i)].r_cap > W::zero() {
                let j0 = self.arcs[a0i].head;
                if !self.nodes[j0].is_sink && self.nodes[j0].parent.is_some() {
                    // Walk j0's ancestors until a vertex already verified
                    // this tick, a terminal, or an orphan settles the origin.
                    let mut d = 0usize;
                    let mut j = j0;
                    loop {
                        if self.nodes[j].ts == self.time {
                            d += self.nodes[j].dist;
                            break;
                        }
                        let parent = self.nodes[j].parent;
                        d += 1;
                        match parent {
                            Parent::Terminal => {
                                self.nodes[j].ts = self.time;
                                self.nodes[j].dist = 1;
                                break;
                            }
                            Parent::Arc(a) => j = self.arcs[a].head,
                            Parent::Orphan | Parent::None => {
                                d = INFINITE_D;
                                break;
                            }
                        }
                    }
                    if d < INFINITE_D {
                        if d < d_min {
                            a0_min = Some(a0i);
                            d_min = d;
                        }
                        // Stamp the walked path so the next origin check
                        // through these nodes stops immediately.
                        let mut j = j0;
                        let mut dd = d;
                        while self.nodes[j].ts != self.time {
                            self.nodes[j].ts = self.time;
                            self.nodes[j].dist = dd;
                            dd -= 1;
                            j = match self.nodes[j].parent {
                                Parent::Arc(a) => self.arcs[a].head,
                                _ => break,
                            };
                        }
                    }
                }
            }
            a0 = a0_next;
        }

        if let Some(a0_min) = a0_min {
            self.nodes[i].parent = Parent::Arc(a0_min);
            self.nodes[i].ts = self.time;
            self.nodes[i].dist = d_min + 1;
        } else {
            // No parent found: i leaves the tree. Neighbors may become
            // frontier nodes, and children of i are orphaned in turn.
            self.add_to_changed_list(i);
            let mut a0 = self.nodes[i].first;
            while let Some(a0i) = a0 {
                let a0_next = self.arcs[a0i].next;
                let j = self.arcs[a0i].head;
                let parent = self.nodes[j].parent;
                if !self.nodes[j].is_sink && parent.is_some() {
                    if self.arcs[sister(a0i)].r_cap > W::zero() {
                        self.set_active(j);
                    }
                    if let Parent::Arc(a) = parent {
                        if self.arcs[a].head == i {
                            self.set_orphan_rear(j);
                        }
                    }
                }
                a0 = a0_next;
            }
            self.nodes[i].parent = Parent::None;
        }
    }

    /// Mirror of [`process_source_orphan`] with the residual direction
    /// swapped at the boundary tests.
    fn process_sink_orphan(&mut self, i: NodeId) {
        let mut a0_min: Option<ArcId> = None;
        let mut d_min = INFINITE_D;

        let mut a0 = self.nodes[i].first;
        while let Some(a0i) = a0 {
            let a0_next = self.arcs[a0i].next;
            if self.arcs[a0i].r_cap > W::zero() {
                let j0 = self.arcs[a0i].head;
                if self.nodes[j0].is_sink && self.nodes[j0].parent.is_some() {
                    let mut d = 0usize;
                    let mut j = j0;
                    loop {
                        if self.nodes[j].ts == self.time {
                            d += self.nodes[j].dist;
                            break;
                        }
                        let parent = self.nodes[j].parent;
                        d += 1;
                        match parent {
                            Parent::Terminal => {
                                self.nodes[j].ts = self.time;
                                self.nodes[j].dist = 1;
                                break;
                            }
                            Parent::Arc(a) => j = self.arcs[a].head,
                            Parent::Orphan | Parent::None => {
                                d = INFINITE_D;
                                break;
                            }
                        }
                    }
                    if d < INFINITE_D {
                        if d < d_min {
                            a0_min = Some(a0i);
                            d_min = d;
                        }
                        let mut j = j0;
                        let mut dd = d;
                        while self.nodes[j].ts != self.time {
                            self.nodes[j].ts = self.time;
                            self.nodes[j].dist = dd;
                            dd -= 1;
                            j = match self.nodes[j].parent {
                                Parent::Arc(a) => self.arcs[a].head,
                                _ => break,
                            };
                        }
                    }
                }
            }
            a0 = a0_next;
        }

        if let Some(a0_min) = a0_min {
            self.nodes[i].parent = Parent::Arc(a0_min);
            self.nodes[i].ts = self.time;
            self.nodes[i].dist = d_min + 1;
        } else {
            self.add_to_changed_list(i);
            let mut a0 = self.nodes[i].first;
            while let Some(a0i) = a0 {
                let a0_next = self.arcs[a0i].next;
                let j = self.arcs[a0i].head;
                let parent = self.nodes[j].parent;
                if self.nodes[j].is_sink && parent.is_some() {
                    if self.arcs[a0i].r_cap > W::zero() {
                        self.set_active(j);
                    }
                    if let Parent::Arc(a) = parent {
                        if self.arcs[a].head == i {
                            self.set_orphan_rear(j);
                        }
                    }
                }
                a0 = a0_next;
            }
            self.nodes[i].parent = Parent::None;
        }
    }

    /// Appends `i` to the collecting queue unless it is already queued.
    pub(crate) fn set_active(&mut self, i: NodeId) {
        if self.nodes[i].next.is_some() {
            return;
        }
        match self.queue_last[1] {
            Some(last) => self.nodes[last].next = Some(i),
            None => self.queue_first[1] = Some(i),
        }
        self.queue_last[1] = Some(i);
        self.nodes[i].next = Some(i);
    }

    /// Dequeues the next node that still has a parent, rotating the
    /// collecting queue in when the draining queue empties. Nodes whose
    /// parent was cleared while queued are dropped silently.
    fn next_active(&mut self) -> Option<NodeId> {
        loop {
            let i = match self.queue_first[0] {
                Some(i) => i,
                None => {
                    self.queue_first[0] = self.queue_first[1];
                    self.queue_last[0] = self.queue_last[1];
                    self.queue_first[1] = None;
                    self.queue_last[1] = None;
                    self.queue_first[0]?
                }
            };

            if self.nodes[i].next == Some(i) {
                self.queue_first[0] = None;
                self.queue_last[0] = None;
            } else {
                self.queue_first[0] = self.nodes[i].next;
            }
            self.nodes[i].next = None;

            if self.nodes[i].parent.is_some() {
                return Some(i);
            }
        }
    }

    fn set_orphan_front(&mut self, i: NodeId) {
        self.nodes[i].parent = Parent::Orphan;
        self.orphans.push_front(i);
    }

    fn set_orphan_rear(&mut self, i: NodeId) {
        self.nodes[i].parent = Parent::Orphan;
        self.orphans.push_back(i);
    }

    fn add_to_changed_list(&mut self, i: NodeId) {
        if self.track_changes && !self.nodes[i].is_in_changed_list {
            self.changed.push(i);
            self.nodes[i].is_in_changed_list = true;
        }
    }
}
