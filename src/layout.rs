//! Top-down tree layout for the agent graph.
//!
//! Generations grow downward and children are centered under their parent.
//! The input is a flat list with `parent_id` back-references rebuilt from an
//! event stream, so it is not trusted to be a tree: dangling parents are
//! laid out as roots, and every descent carries the set of nodes on the
//! current path so a cycle ends the walk instead of recursing forever.

use std::collections::{HashMap, HashSet};

use crate::tracking::AgentNode;

/// Anything with an id and an optional parent reference.
pub trait TreeNode {
    fn node_id(&self) -> &str;
    fn parent_node_id(&self) -> Option<&str>;
}

impl TreeNode for AgentNode {
    fn node_id(&self) -> &str {
        &self.id
    }

    fn parent_node_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }
}

/// Spacing used by the layout, in terminal cells by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Horizontal footprint of a leaf.
    pub unit_width: f32,
    /// Gap between adjacent sibling subtrees and between separate roots.
    pub sibling_gap: f32,
    /// Vertical distance between generations.
    pub rank_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            unit_width: 18.0,
            sibling_gap: 2.0,
            rank_height: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedNode {
    pub id: String,
    /// Horizontal center.
    pub x: f32,
    /// Top edge of the node's rank.
    pub y: f32,
    pub rank: usize,
    /// Declared a parent that does not exist; placed as a root.
    pub is_orphan: bool,
}

/// Parent to child, derived from `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphLayout {
    /// One entry per input node, in input order.
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
    pub bounds: Bounds,
}

impl GraphLayout {
    pub fn position(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Lay out `nodes` from scratch. Footprints can change anywhere in the tree
/// when one node is added, so there is no incremental variant.
pub fn compute<N: TreeNode>(nodes: &[N], config: &LayoutConfig) -> GraphLayout {
    let mut engine = Engine::new(nodes, config);
    engine.run();
    engine.finish(nodes)
}

struct Engine<'a> {
    config: &'a LayoutConfig,
    children: Vec<Vec<usize>>,
    roots: Vec<usize>,
    orphans: HashSet<usize>,
    widths: Vec<Option<f32>>,
    positions: Vec<Option<(f32, usize)>>,
    offset: f32,
    edges: Vec<LayoutEdge>,
}

impl<'a> Engine<'a> {
    fn new<N: TreeNode>(nodes: &[N], config: &'a LayoutConfig) -> Self {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, node) in nodes.iter().enumerate() {
            index.entry(node.node_id()).or_insert(i);
        }

        let mut children = vec![Vec::new(); nodes.len()];
        let mut roots = Vec::new();
        let mut orphans = HashSet::new();
        let mut edges = Vec::new();

        for (i, node) in nodes.iter().enumerate() {
            match node.parent_node_id() {
                None => roots.push(i),
                Some(parent) => match index.get(parent) {
                    Some(&p) => {
                        children[p].push(i);
                        edges.push(LayoutEdge {
                            from: parent.to_string(),
                            to: node.node_id().to_string(),
                        });
                    }
                    None => {
                        tracing::debug!(node = node.node_id(), parent, "orphan node laid out as root");
                        orphans.insert(i);
                        roots.push(i);
                    }
                },
            }
        }

        Self {
            config,
            children,
            roots,
            orphans,
            widths: vec![None; nodes.len()],
            positions: vec![None; nodes.len()],
            offset: 0.0,
            edges,
        }
    }

    fn run(&mut self) {
        for root in self.roots.clone() {
            self.place_tree(root);
        }
        // Members of a parent cycle are unreachable from any root; seed a
        // tree from the first one left unplaced until everything has a spot.
        for i in 0..self.positions.len() {
            if self.positions[i].is_none() {
                self.place_tree(i);
            }
        }
    }

    fn place_tree(&mut self, root: usize) {
        let mut path = HashSet::new();
        let width = self.subtree_width(root, &mut path);
        let left = self.offset;
        self.assign(root, left, 0, &mut path);
        self.offset += width + self.config.sibling_gap;
    }

    /// Leaf: one unit. Internal: children plus gaps, never below one unit.
    /// A node already on the current path counts as a leaf.
    fn subtree_width(&mut self, i: usize, path: &mut HashSet<usize>) -> f32 {
        if path.contains(&i) {
            return self.config.unit_width;
        }
        if let Some(width) = self.widths[i] {
            return width;
        }

        path.insert(i);
        let kids = self.children[i].clone();
        let mut total = 0.0;
        for (n, &child) in kids.iter().enumerate() {
            if n > 0 {
                total += self.config.sibling_gap;
            }
            total += self.subtree_width(child, path);
        }
        path.remove(&i);

        let width = total.max(self.config.unit_width);
        self.widths[i] = Some(width);
        width
    }

    fn assign(&mut self, i: usize, left: f32, rank: usize, path: &mut HashSet<usize>) {
        if path.contains(&i) || self.positions[i].is_some() {
            return;
        }
        let width = self.subtree_width(i, path);
        self.positions[i] = Some((left + width / 2.0, rank));

        path.insert(i);
        let kids = self.children[i].clone();
        let widths: Vec<f32> = kids.iter().map(|&c| self.subtree_width(c, path)).collect();
        let span = widths.iter().sum::<f32>()
            + self.config.sibling_gap * kids.len().saturating_sub(1) as f32;

        let mut child_left = left + (width - span) / 2.0;
        for (&child, child_width) in kids.iter().zip(widths) {
            self.assign(child, child_left, rank + 1, path);
            child_left += child_width + self.config.sibling_gap;
        }
        path.remove(&i);
    }

    fn finish<N: TreeNode>(self, nodes: &[N]) -> GraphLayout {
        let half = self.config.unit_width / 2.0;
        let mut bounds: Option<Bounds> = None;
        let mut placed = Vec::with_capacity(nodes.len());

        for (i, node) in nodes.iter().enumerate() {
            let (x, rank) = self.positions[i].unwrap_or((self.offset + half, 0));
            let y = rank as f32 * self.config.rank_height;
            let b = bounds.get_or_insert(Bounds {
                min_x: x - half,
                max_x: x + half,
                min_y: y,
                max_y: y + 1.0,
            });
            b.min_x = b.min_x.min(x - half);
            b.max_x = b.max_x.max(x + half);
            b.min_y = b.min_y.min(y);
            b.max_y = b.max_y.max(y + 1.0);

            placed.push(PositionedNode {
                id: node.node_id().to_string(),
                x,
                y,
                rank,
                is_orphan: self.orphans.contains(&i),
            });
        }

        GraphLayout {
            nodes: placed,
            edges: self.edges,
            bounds: bounds.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        id: String,
        parent: Option<String>,
    }

    impl TreeNode for Fixture {
        fn node_id(&self) -> &str {
            &self.id
        }

        fn parent_node_id(&self) -> Option<&str> {
            self.parent.as_deref()
        }
    }

    fn n(id: &str, parent: Option<&str>) -> Fixture {
        Fixture {
            id: id.to_string(),
            parent: parent.map(String::from),
        }
    }

    fn unit() -> LayoutConfig {
        LayoutConfig {
            unit_width: 1.0,
            sibling_gap: 1.0,
            rank_height: 1.0,
        }
    }

    #[test]
    fn children_centered_under_parent() {
        let nodes = vec![n("r", None), n("a", Some("r")), n("b", Some("r")), n("c", Some("r"))];
        let layout = compute(&nodes, &unit());

        let r = layout.position("r").unwrap();
        let a = layout.position("a").unwrap();
        let b = layout.position("b").unwrap();
        let c = layout.position("c").unwrap();
        assert_eq!((r.x, r.rank), (2.5, 0));
        assert_eq!((a.x, b.x, c.x), (0.5, 2.5, 4.5));
        assert!(a.rank == 1 && b.rank == 1 && c.rank == 1);
        assert_eq!(layout.edges.len(), 3);
        assert_eq!(layout.bounds.width(), 5.0);
    }

    #[test]
    fn sibling_subtrees_do_not_overlap() {
        let nodes = vec![
            n("r", None),
            n("a", Some("r")),
            n("a1", Some("a")),
            n("a2", Some("a")),
            n("b", Some("r")),
        ];
        let layout = compute(&nodes, &unit());
        let a2 = layout.position("a2").unwrap();
        let b = layout.position("b").unwrap();
        assert!(b.x - a2.x >= 1.0);
        // a spans [0, 3], b sits after the gap.
        assert_eq!(layout.position("a").unwrap().x, 1.5);
        assert_eq!(b.x, 4.5);
    }

    #[test]
    fn orphan_is_placed_as_root() {
        let nodes = vec![n("r", None), n("o", Some("does-not-exist"))];
        let layout = compute(&nodes, &unit());
        let o = layout.position("o").unwrap();
        assert_eq!(o.rank, 0);
        assert!(o.is_orphan);
        assert!(layout.edges.is_empty());
        assert_ne!(o.x, layout.position("r").unwrap().x);
    }

    #[test]
    fn full_cycle_still_positions_every_node() {
        let nodes = vec![n("a", Some("c")), n("b", Some("a")), n("c", Some("b"))];
        let layout = compute(&nodes, &unit());
        assert_eq!(layout.nodes.len(), 3);
        let ids: HashSet<&str> = layout.nodes.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(layout.nodes.iter().all(|p| p.x.is_finite()));
        let ranks: Vec<usize> = layout.nodes.iter().map(|p| p.rank).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }

    #[test]
    fn self_parent_terminates() {
        let nodes = vec![n("a", Some("a")), n("b", Some("b"))];
        let layout = compute(&nodes, &unit());
        assert_eq!(layout.nodes.len(), 2);
        assert_ne!(layout.nodes[0].x, layout.nodes[1].x);
    }

    #[test]
    fn adding_a_node_moves_ancestors() {
        let mut nodes = vec![n("r", None), n("a", Some("r"))];
        let before = compute(&nodes, &unit()).position("r").unwrap().x;
        nodes.push(n("b", Some("r")));
        let after = compute(&nodes, &unit()).position("r").unwrap().x;
        assert!(after > before);
    }

    #[test]
    fn empty_input() {
        let nodes: Vec<Fixture> = Vec::new();
        let layout = compute(&nodes, &unit());
        assert!(layout.nodes.is_empty());
        assert_eq!(layout.bounds, Bounds::default());
    }
}
