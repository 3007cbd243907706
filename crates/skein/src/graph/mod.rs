//! Dependency graph analysis.
//!
//! [`DependencyGraph`] is built once from an issue set and then only read.
//! Construction computes everything the renderers and callers need:
//!
//! - a deterministic topological order (Kahn's algorithm, ties by issue ID)
//! - every node taking part in a cycle (three-colour DFS)
//! - per-node depth and blocked state
//! - the critical path (CPM over priority-derived effort)
//!
//! # Edge Direction Convention
//!
//! Edges point from **dependent -> dependency**: if `bd-2` depends on `bd-1`
//! the edge is `bd-2 -> bd-1`. Outgoing edges of a node are its
//! prerequisites; incoming edges are its dependents. Only ordering
//! dependency types (`blocks`, `parent-child`) become edges.
//!
//! # Closed Issues
//!
//! With `include_closed: false` (the default) closed issues are dropped both
//! as nodes and as dependency targets, so a dependency on finished work
//! simply disappears. Every edge always connects two nodes of the filtered
//! set; dependencies on unknown IDs are dropped.

use crate::domain::{DependencyType, Issue, IssueId, IssueStatus};
use crate::store::IssueStore;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

pub mod render;

/// Maps a priority to a scheduling effort for critical-path analysis.
///
/// Effort is `ceiling - priority`, never below 1, so priority 0 (critical)
/// carries the most effort and priority 4 (trivial) the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffortScale {
    /// Effort of a priority-0 task; default 5.
    pub ceiling: u32,
}

impl EffortScale {
    /// Effort for a priority level.
    #[must_use]
    pub fn effort(self, priority: u8) -> u32 {
        self.ceiling.saturating_sub(u32::from(priority)).max(1)
    }
}

impl Default for EffortScale {
    fn default() -> Self {
        Self { ceiling: 5 }
    }
}

/// Options controlling graph construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct GraphOptions {
    /// Keep closed issues as nodes (they then satisfy dependencies).
    pub include_closed: bool,
    /// Priority-to-effort mapping for the critical path.
    pub effort: EffortScale,
}

/// A node of the built graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    /// Issue ID
    pub id: IssueId,
    /// Issue title
    pub title: String,
    /// Issue status
    pub status: IssueStatus,
    /// Issue priority
    pub priority: u8,
    /// At least one prerequisite is not closed
    pub is_blocked: bool,
    /// On the critical path
    pub is_critical: bool,
    /// Length of the longest prerequisite chain below this node
    pub depth: usize,
    /// In-graph prerequisites, ordered by ID
    pub dependencies: Vec<IssueId>,
    /// In-graph dependents, ordered by ID
    pub dependents: Vec<IssueId>,
}

/// Summary statistics of a built graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphStats {
    /// Number of nodes
    pub total_nodes: usize,
    /// Number of edges
    pub total_edges: usize,
    /// Nodes without prerequisites (can start immediately)
    pub root_nodes: Vec<IssueId>,
    /// Nodes nothing depends on
    pub leaf_nodes: Vec<IssueId>,
    /// Greatest node depth
    pub max_depth: usize,
    /// Whether any cycle exists
    pub has_cycles: bool,
    /// Every node that takes part in a cycle, ordered by ID
    pub cycle_nodes: Vec<IssueId>,
    /// Number of blocked nodes
    pub blocked_nodes: usize,
}

/// Immutable dependency graph over a set of issues.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<IssueId, DependencyType>,
    node_map: HashMap<IssueId, NodeIndex>,
    nodes: Vec<GraphNode>,
    order: Vec<IssueId>,
    cycle_nodes: Vec<IssueId>,
    critical_path: Vec<IssueId>,
    effort: EffortScale,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl DependencyGraph {
    /// Build a graph from issues.
    pub fn build<'a>(issues: impl IntoIterator<Item = &'a Issue>, options: GraphOptions) -> Self {
        let mut included: Vec<&Issue> = issues
            .into_iter()
            .filter(|issue| options.include_closed || !issue.is_closed())
            .collect();
        included.sort_by(|a, b| a.id.cmp(&b.id));
        included.dedup_by(|a, b| a.id == b.id);

        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();
        for issue in &included {
            let node = graph.add_node(issue.id.clone());
            node_map.insert(issue.id.clone(), node);
        }

        let mut seen_edges = HashSet::new();
        for issue in &included {
            let from = node_map[&issue.id];
            for dep in issue.dependencies.iter().filter(|d| d.dep_type.is_ordering()) {
                let Some(&to) = node_map.get(&dep.depends_on_id) else {
                    debug!(
                        from = %issue.id,
                        to = %dep.depends_on_id,
                        "Dropping dependency on issue outside the graph"
                    );
                    continue;
                };
                if seen_edges.insert((from, to)) {
                    graph.add_edge(from, to, dep.dep_type);
                }
            }
        }

        let mut built = Self {
            graph,
            node_map,
            nodes: Vec::new(),
            order: Vec::new(),
            cycle_nodes: Vec::new(),
            critical_path: Vec::new(),
            effort: options.effort,
        };
        built.order = built.kahn_order();
        built.cycle_nodes = built.find_cycle_nodes();
        built.critical_path = built.compute_critical_path(&included);
        built.nodes = built.annotate(&included);
        built
    }

    /// Build a graph from every issue in a store.
    #[must_use]
    pub fn from_store(store: &IssueStore, options: GraphOptions) -> Self {
        Self::build(store.list(), options)
    }

    /// All nodes, ordered by ID.
    #[must_use]
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Look up a node.
    #[must_use]
    pub fn node(&self, id: &IssueId) -> Option<&GraphNode> {
        self.nodes
            .binary_search_by(|n| n.id.cmp(id))
            .ok()
            .map(|i| &self.nodes[i])
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of dependency edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Edges as `(dependent, prerequisite)` pairs, ordered.
    #[must_use]
    pub fn edges(&self) -> Vec<(IssueId, IssueId)> {
        let mut edges: Vec<(IssueId, IssueId)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Summary statistics.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            total_nodes: self.nodes.len(),
            total_edges: self.graph.edge_count(),
            root_nodes: self
                .nodes
                .iter()
                .filter(|n| n.dependencies.is_empty())
                .map(|n| n.id.clone())
                .collect(),
            leaf_nodes: self
                .nodes
                .iter()
                .filter(|n| n.dependents.is_empty())
                .map(|n| n.id.clone())
                .collect(),
            max_depth: self.nodes.iter().map(|n| n.depth).max().unwrap_or(0),
            has_cycles: !self.cycle_nodes.is_empty(),
            cycle_nodes: self.cycle_nodes.clone(),
            blocked_nodes: self.nodes.iter().filter(|n| n.is_blocked).count(),
        }
    }

    /// Topological order: every prerequisite precedes its dependents.
    ///
    /// Nodes on a cycle, and nodes that wait on one, are left out.
    #[must_use]
    pub fn topological_sort(&self) -> Vec<IssueId> {
        self.order.clone()
    }

    /// Whether any cycle exists.
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        !self.cycle_nodes.is_empty()
    }

    /// Nodes taking part in any cycle, ordered by ID.
    #[must_use]
    pub fn cycle_nodes(&self) -> &[IssueId] {
        &self.cycle_nodes
    }

    /// The critical path, from first prerequisite to final dependent.
    #[must_use]
    pub fn critical_path(&self) -> &[IssueId] {
        &self.critical_path
    }

    /// Edges along the critical path as `(prerequisite, dependent)` pairs.
    #[must_use]
    pub fn critical_edges(&self) -> Vec<(IssueId, IssueId)> {
        self.critical_path
            .windows(2)
            .filter(|pair| self.has_edge(&pair[1], &pair[0]))
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect()
    }

    /// Returns `true` if the critical path runs along `prerequisite -> dependent`.
    #[must_use]
    pub fn is_critical_edge(&self, dependent: &IssueId, prerequisite: &IssueId) -> bool {
        self.critical_path
            .windows(2)
            .any(|pair| &pair[0] == prerequisite && &pair[1] == dependent)
    }

    /// Sum of effort along the critical path.
    #[must_use]
    pub fn critical_path_effort(&self) -> u32 {
        self.critical_path
            .iter()
            .filter_map(|id| self.node(id))
            .map(|n| self.effort.effort(n.priority))
            .sum()
    }

    /// Nodes with at least one unfinished prerequisite.
    #[must_use]
    pub fn blocked_nodes(&self) -> Vec<&GraphNode> {
        self.nodes.iter().filter(|n| n.is_blocked).collect()
    }

    /// Unblocked, unfinished nodes: work that can start now.
    #[must_use]
    pub fn ready_nodes(&self) -> Vec<&GraphNode> {
        self.nodes
            .iter()
            .filter(|n| !n.is_blocked && n.status != IssueStatus::Closed)
            .collect()
    }

    /// Nodes grouped by depth: index `d` holds the nodes at depth `d`.
    #[must_use]
    pub fn levels(&self) -> Vec<Vec<&GraphNode>> {
        let max = self.nodes.iter().map(|n| n.depth).max();
        let mut levels: Vec<Vec<&GraphNode>> = vec![Vec::new(); max.map_or(0, |m| m + 1)];
        for node in &self.nodes {
            levels[node.depth].push(node);
        }
        levels
    }

    fn has_edge(&self, dependent: &IssueId, prerequisite: &IssueId) -> bool {
        match (self.node_map.get(dependent), self.node_map.get(prerequisite)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// Prerequisites of a node, ordered by ID.
    fn prerequisites(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(node, Direction::Outgoing)
    }

    /// Dependents of a node, ordered by ID.
    fn dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        self.sorted_neighbors(node, Direction::Incoming)
    }

    fn sorted_neighbors(&self, node: NodeIndex, dir: Direction) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_directed(node, dir).collect();
        out.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));
        out.dedup();
        out
    }

    /// Kahn's algorithm with the ready set ordered by issue ID.
    fn kahn_order(&self) -> Vec<IssueId> {
        let mut remaining: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| (n, self.prerequisites(n).len()))
            .collect();
        let mut ready: BTreeSet<(IssueId, NodeIndex)> = remaining
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(&n, _)| (self.graph[n].clone(), n))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some((id, node)) = ready.pop_first() {
            order.push(id);
            for dependent in self.dependents(node) {
                if let Some(count) = remaining.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((self.graph[dependent].clone(), dependent));
                    }
                }
            }
        }

        if order.len() < self.graph.node_count() {
            debug!(
                sorted = order.len(),
                total = self.graph.node_count(),
                "Topological sort left out nodes on or behind a cycle"
            );
        }
        order
    }

    /// Three-colour DFS; every back edge marks the gray path it closes.
    fn find_cycle_nodes(&self) -> Vec<IssueId> {
        let mut color: HashMap<NodeIndex, Color> = self
            .graph
            .node_indices()
            .map(|n| (n, Color::White))
            .collect();
        let mut in_cycle: BTreeSet<IssueId> = BTreeSet::new();

        let mut starts: Vec<NodeIndex> = self.graph.node_indices().collect();
        starts.sort_by(|a, b| self.graph[*a].cmp(&self.graph[*b]));

        for start in starts {
            if color[&start] != Color::White {
                continue;
            }

            // (node, its prerequisites, next prerequisite to visit)
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
            let mut path: Vec<NodeIndex> = Vec::new();
            color.insert(start, Color::Gray);
            stack.push((start, self.prerequisites(start), 0));
            path.push(start);

            while let Some((node, next, pos)) = stack.last_mut() {
                let Some(&target) = next.get(*pos) else {
                    color.insert(*node, Color::Black);
                    stack.pop();
                    path.pop();
                    continue;
                };
                *pos += 1;

                match color[&target] {
                    Color::White => {
                        color.insert(target, Color::Gray);
                        stack.push((target, self.prerequisites(target), 0));
                        path.push(target);
                    }
                    Color::Gray => {
                        if let Some(from) = path.iter().position(|&n| n == target) {
                            for &member in &path[from..] {
                                in_cycle.insert(self.graph[member].clone());
                            }
                        }
                    }
                    Color::Black => {}
                }
            }
        }

        in_cycle.into_iter().collect()
    }

    /// CPM over the topological order.
    fn compute_critical_path(&self, included: &[&Issue]) -> Vec<IssueId> {
        if self.graph.edge_count() == 0 {
            // Every node stands alone and is trivially critical.
            return included.iter().map(|i| i.id.clone()).collect();
        }

        let priority: HashMap<&IssueId, u8> =
            included.iter().map(|i| (&i.id, i.priority)).collect();
        let mut finish: HashMap<NodeIndex, u32> = HashMap::new();

        for id in &self.order {
            let node = self.node_map[id];
            let longest_prereq = self
                .prerequisites(node)
                .iter()
                .filter_map(|p| finish.get(p))
                .copied()
                .max()
                .unwrap_or(0);
            let effort = self.effort.effort(priority.get(id).copied().unwrap_or(0));
            finish.insert(node, effort + longest_prereq);
        }

        // Ties go to the smallest ID: `order` is scanned by ID.
        let mut by_id: Vec<&IssueId> = self.order.iter().collect();
        by_id.sort();
        let Some(mut current) = by_id
            .into_iter()
            .map(|id| self.node_map[id])
            .fold(None, |best: Option<NodeIndex>, n| match best {
                Some(b) if finish[&b] >= finish[&n] => Some(b),
                _ => Some(n),
            })
        else {
            return Vec::new();
        };

        let mut path = vec![self.graph[current].clone()];
        loop {
            let next = self
                .prerequisites(current)
                .into_iter()
                .filter(|p| finish.contains_key(p))
                .fold(None, |best: Option<NodeIndex>, n| match best {
                    Some(b) if finish[&b] >= finish[&n] => Some(b),
                    _ => Some(n),
                });
            match next {
                Some(prev) => {
                    path.push(self.graph[prev].clone());
                    current = prev;
                }
                None => break,
            }
        }
        path.reverse();
        path
    }

    fn annotate(&self, included: &[&Issue]) -> Vec<GraphNode> {
        let mut depth: HashMap<NodeIndex, usize> = HashMap::new();
        for id in &self.order {
            let node = self.node_map[id];
            let d = self
                .prerequisites(node)
                .iter()
                .filter_map(|p| depth.get(p))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(node, d);
        }

        let status: HashMap<&IssueId, IssueStatus> =
            included.iter().map(|i| (&i.id, i.status)).collect();
        let critical: HashSet<&IssueId> = self.critical_path.iter().collect();

        included
            .iter()
            .map(|issue| {
                let node = self.node_map[&issue.id];
                let dependencies: Vec<IssueId> = self
                    .prerequisites(node)
                    .into_iter()
                    .map(|n| self.graph[n].clone())
                    .collect();
                let is_blocked = dependencies
                    .iter()
                    .any(|dep| status.get(dep) != Some(&IssueStatus::Closed));
                GraphNode {
                    id: issue.id.clone(),
                    title: issue.title.clone(),
                    status: issue.status,
                    priority: issue.priority,
                    is_blocked,
                    is_critical: critical.contains(&issue.id),
                    depth: depth.get(&node).copied().unwrap_or(0),
                    dependents: self
                        .dependents(node)
                        .into_iter()
                        .map(|n| self.graph[n].clone())
                        .collect(),
                    dependencies,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn issue(id: &str, priority: u8) -> Issue {
        Issue::new(id, format!("Task {id}")).with_priority(priority)
    }

    fn build(issues: &[Issue]) -> DependencyGraph {
        DependencyGraph::build(issues, GraphOptions::default())
    }

    fn ids(list: &[IssueId]) -> Vec<&str> {
        list.iter().map(IssueId::as_str).collect()
    }

    fn position(order: &[IssueId], id: &str) -> usize {
        order.iter().position(|i| i.as_str() == id).unwrap()
    }

    #[test]
    fn chain_sorts_prerequisites_first() {
        let graph = build(&[
            issue("bd-3", 2).depends_on("bd-2"),
            issue("bd-2", 2).depends_on("bd-1"),
            issue("bd-1", 2),
        ]);
        assert_eq!(ids(&graph.topological_sort()), vec!["bd-1", "bd-2", "bd-3"]);
    }

    #[test]
    fn diamond_sorts_top_before_middle_before_bottom() {
        // B and C depend on A; D depends on B and C.
        let graph = build(&[
            issue("A", 2),
            issue("B", 2).depends_on("A"),
            issue("C", 2).depends_on("A"),
            issue("D", 2).depends_on("B").depends_on("C"),
        ]);
        let order = graph.topological_sort();
        assert_eq!(order.len(), 4);
        assert!(position(&order, "A") < position(&order, "B"));
        assert!(position(&order, "A") < position(&order, "C"));
        assert!(position(&order, "B") < position(&order, "D"));
        assert!(position(&order, "C") < position(&order, "D"));
    }

    #[test]
    fn ties_are_broken_by_id() {
        let graph = build(&[issue("c", 2), issue("a", 2), issue("b", 2)]);
        assert_eq!(ids(&graph.topological_sort()), vec!["a", "b", "c"]);
    }

    #[test]
    fn mutual_dependency_is_a_cycle() {
        let graph = build(&[issue("A", 2).depends_on("B"), issue("B", 2).depends_on("A")]);
        let stats = graph.stats();
        assert!(stats.has_cycles);
        assert_eq!(ids(&stats.cycle_nodes), vec!["A", "B"]);
        assert!(graph.topological_sort().is_empty());
    }

    #[test]
    fn three_node_cycle_is_detected_and_sort_terminates() {
        let graph = build(&[
            issue("A", 2).depends_on("C"),
            issue("B", 2).depends_on("A"),
            issue("C", 2).depends_on("B"),
            issue("D", 2),
        ]);
        assert!(graph.has_cycles());
        assert_eq!(ids(graph.cycle_nodes()), vec!["A", "B", "C"]);
        assert_eq!(ids(&graph.topological_sort()), vec!["D"]);
    }

    #[test]
    fn disjoint_cycles_are_all_reported() {
        let graph = build(&[
            issue("a", 2).depends_on("b"),
            issue("b", 2).depends_on("a"),
            issue("x", 2).depends_on("y"),
            issue("y", 2).depends_on("z"),
            issue("z", 2).depends_on("x"),
            issue("free", 2),
        ]);
        assert_eq!(ids(graph.cycle_nodes()), vec!["a", "b", "x", "y", "z"]);
    }

    #[test]
    fn acyclic_graph_reports_no_cycles() {
        let graph = build(&[issue("bd-1", 2), issue("bd-2", 2).depends_on("bd-1")]);
        let stats = graph.stats();
        assert!(!stats.has_cycles);
        assert!(stats.cycle_nodes.is_empty());
    }

    #[test]
    fn critical_path_follows_higher_effort_branch() {
        // root -> heavy (P0, effort 5) -> end_heavy ; root -> light (P4, effort 1) -> end_light
        let graph = build(&[
            issue("root", 2),
            issue("heavy", 0).depends_on("root"),
            issue("light", 4).depends_on("root"),
            issue("end_heavy", 2).depends_on("heavy"),
            issue("end_light", 2).depends_on("light"),
        ]);
        assert_eq!(ids(graph.critical_path()), vec!["root", "heavy", "end_heavy"]);
        assert_eq!(graph.critical_path_effort(), 3 + 5 + 3);
        assert!(graph.node(&IssueId::new("heavy")).unwrap().is_critical);
        assert!(!graph.node(&IssueId::new("light")).unwrap().is_critical);
        assert!(graph.is_critical_edge(&IssueId::new("heavy"), &IssueId::new("root")));
        assert_eq!(graph.critical_edges().len(), 2);
    }

    #[test]
    fn independent_nodes_are_all_critical() {
        let graph = build(&[issue("b", 2), issue("a", 1)]);
        assert_eq!(ids(graph.critical_path()), vec!["a", "b"]);
        assert!(graph.nodes().iter().all(|n| n.is_critical));
        assert!(graph.critical_edges().is_empty());
    }

    #[test]
    fn closed_issues_are_excluded_by_default() {
        let issues = [
            issue("done", 2).with_status(IssueStatus::Closed),
            issue("next", 2).depends_on("done"),
        ];

        let graph = build(&issues);
        assert_eq!(graph.stats().total_nodes, 1);
        assert_eq!(graph.edge_count(), 0);
        assert!(!graph.node(&IssueId::new("next")).unwrap().is_blocked);

        let with_closed = DependencyGraph::build(
            &issues,
            GraphOptions {
                include_closed: true,
                ..GraphOptions::default()
            },
        );
        assert_eq!(with_closed.edge_count(), 1);
        assert!(!with_closed.node(&IssueId::new("next")).unwrap().is_blocked);
    }

    #[test]
    fn open_prerequisite_blocks_dependent() {
        let graph = build(&[
            issue("base", 2),
            issue("top", 2).depends_on("base"),
            issue("mid", 2).with_status(IssueStatus::InProgress),
        ]);
        let blocked: Vec<&str> = graph.blocked_nodes().iter().map(|n| n.id.as_str()).collect();
        assert_eq!(blocked, vec!["top"]);
        assert_eq!(graph.stats().blocked_nodes, 1);
        assert_eq!(graph.ready_nodes().len(), 2);
    }

    #[test]
    fn stats_describe_shape() {
        let graph = build(&[
            issue("A", 2),
            issue("B", 2).depends_on("A"),
            issue("C", 2).depends_on("B"),
            issue("X", 2).depends_on("ghost"),
        ]);
        let stats = graph.stats();
        assert_eq!(stats.total_nodes, 4);
        assert_eq!(stats.total_edges, 2);
        assert_eq!(ids(&stats.root_nodes), vec!["A", "X"]);
        assert_eq!(ids(&stats.leaf_nodes), vec!["C", "X"]);
        assert_eq!(stats.max_depth, 2);
    }

    #[test]
    fn informational_dependencies_are_not_edges() {
        let mut related = issue("b", 2);
        related.dependencies.push(crate::domain::Dependency::new(
            IssueId::new("b"),
            IssueId::new("a"),
            DependencyType::Related,
        ));
        let graph = build(&[issue("a", 2), related]);
        assert_eq!(graph.edge_count(), 0);
    }

    #[rstest]
    #[case(0, 5)]
    #[case(1, 4)]
    #[case(2, 3)]
    #[case(3, 2)]
    #[case(4, 1)]
    #[case(9, 1)]
    fn effort_is_monotonic_in_priority(#[case] priority: u8, #[case] effort: u32) {
        assert_eq!(EffortScale::default().effort(priority), effort);
    }
}
