use std::collections::VecDeque;
use std::fmt::Debug;

use num_traits::{NumAssign, Signed};

use crate::error::{Error, Result};

/// Index of a node in the arena. Assigned densely by [`Graph::add_node`].
pub type NodeId = usize;

/// Index of a directed arc in the arena. Arcs are stored in sister pairs,
/// so the reverse of arc `a` is always `a ^ 1`.
pub type ArcId = usize;

/// Side of the cut a node ends up on after a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Source,
    Sink,
}

/// Parent link of a node inside a search tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Parent {
    /// Free node, not in either tree.
    None,
    /// Root: attached directly to its tree's terminal.
    Terminal,
    /// Detached mid-solve, waiting for adoption.
    Orphan,
    /// Attached through an arc pointing away from the node toward its parent.
    Arc(ArcId),
}

impl Parent {
    pub(crate) fn is_some(self) -> bool {
        self != Parent::None
    }
}

pub(crate) fn sister(a: ArcId) -> ArcId {
    a ^ 1
}

#[derive(Debug, Clone)]
pub(crate) struct Node<W> {
    /// Head of this node's outgoing arc list.
    pub(crate) first: Option<ArcId>,
    /// Active-queue link. `Some(self)` marks the queue tail, `None` means
    /// the node is not queued.
    pub(crate) next: Option<NodeId>,
    pub(crate) parent: Parent,
    /// Timestamp of the last verified walk to a terminal.
    pub(crate) ts: usize,
    /// Hop count to the terminal as of `ts`.
    pub(crate) dist: usize,
    /// Which tree the node belongs to while `parent` is set.
    pub(crate) is_sink: bool,
    pub(crate) is_marked: bool,
    pub(crate) is_in_changed_list: bool,
    /// Signed terminal capacity: positive is residual from the source,
    /// negative is residual toward the sink, zero is no terminal arc.
    pub(crate) tr_cap: W,
}

#[derive(Debug, Clone)]
pub(crate) struct Arc<W> {
    pub(crate) head: NodeId,
    /// Next outgoing arc of the node that owns this arc.
    pub(crate) next: Option<ArcId>,
    pub(crate) r_cap: W,
}

/// A capacitated s-t graph and its Boykov-Kolmogorov solver state.
///
/// Nodes and arcs live in contiguous index-addressed arenas; the two
/// terminals are implicit in the signed terminal capacity of each node.
/// Construction ([`add_node`](Graph::add_node), [`add_edge`](Graph::add_edge),
/// [`add_tweights`](Graph::add_tweights)) may grow the arenas; a solve never
/// does. After [`maxflow`](Graph::maxflow) the residual capacities and the
/// tree partition remain available for inspection and for incremental
/// re-solves.
#[derive(Debug, Clone)]
pub struct Graph<W> {
    pub(crate) nodes: Vec<Node<W>>,
    pub(crate) arcs: Vec<Arc<W>>,

    /// Flow accumulated by terminal-pair cancellation and augmentations.
    pub(crate) flow: W,
    pub(crate) maxflow_iteration: usize,

    /// Two FIFO queues threaded through `Node::next`. Queue 0 is drained,
    /// queue 1 collects; queue 1 rotates in when queue 0 empties.
    pub(crate) queue_first: [Option<NodeId>; 2],
    pub(crate) queue_last: [Option<NodeId>; 2],

    /// Pending orphans between augmentation and adoption.
    pub(crate) orphans: VecDeque<NodeId>,

    /// Monotone tick for the adoption origin-check memoization.
    pub(crate) time: usize,

    pub(crate) changed: Vec<NodeId>,
    pub(crate) track_changes: bool,
}

const MIN_CAPACITY: usize = 16;

impl<W> Graph<W>
where
    W: NumAssign + Signed + PartialOrd + Copy + Debug,
{
    /// Creates an empty graph with arena space reserved for roughly
    /// `node_num_max` nodes and `edge_num_max` edges. The hints are rounded
    /// up to a small minimum and do not bound the final size.
    pub fn new(node_num_max: usize, edge_num_max: usize) -> Self {
        let node_num_max = node_num_max.max(MIN_CAPACITY);
        let edge_num_max = edge_num_max.max(MIN_CAPACITY);
        Graph {
            nodes: Vec::with_capacity(node_num_max),
            arcs: Vec::with_capacity(2 * edge_num_max),
            flow: W::zero(),
            maxflow_iteration: 0,
            queue_first: [None; 2],
            queue_last: [None; 2],
            orphans: VecDeque::new(),
            time: 0,
            changed: Vec::new(),
            track_changes: false,
        }
    }

    /// Appends `num` nodes with no terminal capacity and returns the id of
    /// the first one. Ids are dense and stable.
    pub fn add_node(&mut self, num: usize) -> NodeId {
        let first = self.nodes.len();
        for _ in 0..num {
            self.nodes.push(Node {
                first: None,
                next: None,
                parent: Parent::None,
                ts: 0,
                dist: 0,
                is_sink: false,
                is_marked: false,
                is_in_changed_list: false,
                tr_cap: W::zero(),
            });
        }
        first
    }

    /// Adds `cap_source` to the source-to-`i` terminal capacity and
    /// `cap_sink` to the `i`-to-sink one. Calls accumulate. The common part
    /// of the resulting pair cancels immediately into the flow total, and
    /// only the signed difference is stored.
    pub fn add_tweights(&mut self, i: NodeId, cap_source: W, cap_sink: W) -> Result<()> {
        self.check_node(i)?;
        let delta = self.nodes[i].tr_cap;
        let mut cap_source = cap_source;
        let mut cap_sink = cap_sink;
        if delta > W::zero() {
            cap_source += delta;
        } else {
            cap_sink -= delta;
        }
        self.flow += if cap_source < cap_sink {
            cap_source
        } else {
            cap_sink
        };
        self.nodes[i].tr_cap = cap_source - cap_sink;
        Ok(())
    }

    /// Appends the sister pair `i -> j` with residual `cap` and `j -> i`
    /// with residual `rev_cap`, returning the id of the forward arc. The
    /// reverse arc is the returned id xor 1.
    pub fn add_edge(&mut self, i: NodeId, j: NodeId, cap: W, rev_cap: W) -> Result<ArcId> {
        self.check_node(i)?;
        self.check_node(j)?;
        if i == j {
            return Err(Error::invalid_input("self-loop edges are not allowed"));
        }
        if cap < W::zero() || rev_cap < W::zero() {
            return Err(Error::invalid_input("edge capacities must be non-negative"));
        }

        let a = self.arcs.len();
        let a_rev = a + 1;
        self.arcs.push(Arc {
            head: j,
            next: self.nodes[i].first,
            r_cap: cap,
        });
        self.arcs.push(Arc {
            head: i,
            next: self.nodes[j].first,
            r_cap: rev_cap,
        });
        self.nodes[i].first = Some(a);
        self.nodes[j].first = Some(a_rev);
        Ok(a)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of directed arcs in the arena, reverse arcs included. Always
    /// twice the number of edges added.
    pub fn arc_count(&self) -> usize {
        self.arcs.len()
    }

    /// Tail and head of arc `a`.
    pub fn arc_ends(&self, a: ArcId) -> Result<(NodeId, NodeId)> {
        self.check_arc(a)?;
        Ok((self.arcs[sister(a)].head, self.arcs[a].head))
    }

    /// Signed terminal residual of node `i`.
    pub fn trcap(&self, i: NodeId) -> Result<W> {
        self.check_node(i)?;
        Ok(self.nodes[i].tr_cap)
    }

    /// Overwrites the signed terminal residual of node `i`. Between solves
    /// only; the caller must [`mark_node`](Graph::mark_node) every node it
    /// edits before the next reuse solve, otherwise the result is undefined.
    pub fn set_trcap(&mut self, i: NodeId, v: W) -> Result<()> {
        self.check_node(i)?;
        self.nodes[i].tr_cap = v;
        Ok(())
    }

    /// Residual capacity of arc `a`.
    pub fn rcap(&self, a: ArcId) -> Result<W> {
        self.check_arc(a)?;
        Ok(self.arcs[a].r_cap)
    }

    /// Overwrites the residual capacity of arc `a`. Between solves only;
    /// the caller must [`mark_node`](Graph::mark_node) both endpoints before
    /// the next reuse solve, otherwise the result is undefined.
    pub fn set_rcap(&mut self, a: ArcId, v: W) -> Result<()> {
        self.check_arc(a)?;
        if v < W::zero() {
            return Err(Error::invalid_input("residual capacities must be non-negative"));
        }
        self.arcs[a].r_cap = v;
        Ok(())
    }

    /// Queues `i` for re-examination by the next reuse solve. Call after
    /// editing any capacity touching `i`.
    pub fn mark_node(&mut self, i: NodeId) -> Result<()> {
        self.check_node(i)?;
        self.set_active(i);
        self.nodes[i].is_marked = true;
        Ok(())
    }

    /// Side of the minimum cut node `i` ended up on after the last solve.
    /// Free nodes, reachable from neither terminal, report `default_segment`.
    pub fn what_segment(&self, i: NodeId, default_segment: Segment) -> Result<Segment> {
        self.check_node(i)?;
        if self.nodes[i].parent.is_some() {
            Ok(if self.nodes[i].is_sink {
                Segment::Sink
            } else {
                Segment::Source
            })
        } else {
            Ok(default_segment)
        }
    }

    /// Allows `i` to re-enter a caller-held changed list on a later solve.
    /// The dedup flag otherwise persists across solves.
    pub fn remove_from_changed_list(&mut self, i: NodeId) -> Result<()> {
        self.check_node(i)?;
        self.nodes[i].is_in_changed_list = false;
        Ok(())
    }

    /// Returns the instance to the empty state. Arena buffers are kept for
    /// reuse.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.arcs.clear();
        self.flow = W::zero();
        self.maxflow_iteration = 0;
        self.queue_first = [None; 2];
        self.queue_last = [None; 2];
        self.orphans.clear();
        self.time = 0;
        self.changed.clear();
        self.track_changes = false;
    }

    fn check_node(&self, i: NodeId) -> Result<()> {
        if i < self.nodes.len() {
            Ok(())
        } else {
            Err(Error::InvalidNode(i))
        }
    }

    fn check_arc(&self, a: ArcId) -> Result<()> {
        if a < self.arcs.len() {
            Ok(())
        } else {
            Err(Error::InvalidArc(a))
        }
    }
}
