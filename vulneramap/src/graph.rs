use std::collections::{HashMap, HashSet, VecDeque};

use crate::component::Component;
use crate::decode::DependencyEdge;

/// Directed depends-on graph for one analysis run. Built once, read-only
/// afterwards.
///
/// Nodes are keyed by component node id (see [`Component::node_id`]).
/// Edge endpoints are resolved through an alias table so documents that
/// key their dependency section by bom-ref still connect to purl-keyed
/// nodes. Endpoints naming no known component become bare nodes, and
/// duplicate edges collapse to one.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    aliases: HashMap<String, usize>,
    out: Vec<Vec<usize>>,
    edges: Vec<(usize, usize)>,
}

impl DependencyGraph {
    pub fn build(components: &[Component], dependencies: &[DependencyEdge]) -> Self {
        let mut graph = DependencyGraph::default();

        for comp in components {
            let idx = graph.intern(&comp.node_id());
            if let Some(purl) = &comp.purl {
                graph.aliases.entry(purl.clone()).or_insert(idx);
            }
            if let Some(bom_ref) = &comp.bom_ref {
                graph.aliases.entry(bom_ref.clone()).or_insert(idx);
            }
        }

        let mut seen = HashSet::new();
        for dep in dependencies {
            // Edges without a parent ref cannot be attached anywhere.
            let Some(parent) = dep.from_ref.as_deref().filter(|r| !r.is_empty()) else {
                continue;
            };
            let parent = graph.resolve(parent);
            for child in &dep.to_refs {
                let child = graph.resolve(child);
                if seen.insert((parent, child)) {
                    graph.out[parent].push(child);
                    graph.edges.push((parent, child));
                }
            }
        }

        graph
    }

    fn intern(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(id.to_string());
        self.index.insert(id.to_string(), idx);
        self.out.push(vec![]);
        idx
    }

    fn resolve(&mut self, reference: &str) -> usize {
        if let Some(&idx) = self.aliases.get(reference) {
            return idx;
        }
        self.intern(reference)
    }

    fn lookup(&self, reference: &str) -> Option<usize> {
        self.aliases
            .get(reference)
            .or_else(|| self.index.get(reference))
            .copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges
            .iter()
            .map(|&(u, v)| (self.nodes[u].as_str(), self.nodes[v].as_str()))
    }

    /// Shortest hop count from `root` to every reachable node.
    ///
    /// Returns an empty map when the root is not in the graph;
    /// unreachable nodes are absent (callers default their depth to 0).
    pub fn depth_from(&self, root: &str) -> HashMap<String, usize> {
        let Some(start) = self.lookup(root) else {
            return HashMap::new();
        };

        let mut depths = HashMap::new();
        let mut queue = VecDeque::new();
        depths.insert(self.nodes[start].clone(), 0usize);
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            let depth = depths[&self.nodes[node]];
            for &next in &self.out[node] {
                if !depths.contains_key(&self.nodes[next]) {
                    depths.insert(self.nodes[next].clone(), depth + 1);
                    queue.push_back(next);
                }
            }
        }

        depths
    }

    /// All nodes reachable by following depends-on edges forward from
    /// `node`, excluding the node itself. Unknown nodes yield an empty
    /// set.
    pub fn transitive_closure(&self, node: &str) -> HashSet<String> {
        let Some(start) = self.lookup(node) else {
            return HashSet::new();
        };

        let mut visited = HashSet::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for &next in &self.out[current] {
                if next != start && visited.insert(next) {
                    stack.push(next);
                }
            }
        }

        visited.into_iter().map(|i| self.nodes[i].clone()).collect()
    }

    /// Top five nodes by degree centrality (in + out degree over node
    /// count minus one). Ties keep insertion order; a self-loop counts
    /// toward both degrees.
    pub fn critical_hotspots(&self) -> Vec<String> {
        if self.nodes.is_empty() {
            return vec![];
        }

        let mut degree = vec![0usize; self.nodes.len()];
        for &(u, v) in &self.edges {
            degree[u] += 1;
            degree[v] += 1;
        }

        let norm = (self.nodes.len().saturating_sub(1)).max(1) as f64;
        let mut ranked: Vec<(usize, f64)> = degree
            .iter()
            .enumerate()
            .map(|(i, &d)| (i, d as f64 / norm))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        ranked
            .into_iter()
            .take(5)
            .map(|(i, _)| self.nodes[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comp(name: &str, purl: Option<&str>, bom_ref: Option<&str>) -> Component {
        let mut c = Component::new(name);
        c.version = Some("1.0.0".into());
        c.purl = purl.map(String::from);
        c.bom_ref = bom_ref.map(String::from);
        c
    }

    fn edge(from: &str, to: &[&str]) -> DependencyEdge {
        DependencyEdge {
            from_ref: Some(from.to_string()),
            to_refs: to.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn chain() -> DependencyGraph {
        // app -> lib-a -> lib-b, app -> lib-c
        let components = vec![
            comp("app", Some("pkg:app"), None),
            comp("lib-a", Some("pkg:a"), None),
            comp("lib-b", Some("pkg:b"), None),
            comp("lib-c", Some("pkg:c"), None),
        ];
        let deps = vec![
            edge("pkg:app", &["pkg:a", "pkg:c"]),
            edge("pkg:a", &["pkg:b"]),
        ];
        DependencyGraph::build(&components, &deps)
    }

    #[test]
    fn depth_of_root_is_zero() {
        let depths = chain().depth_from("pkg:app");
        assert_eq!(depths["pkg:app"], 0);
    }

    #[test]
    fn depth_is_shortest_hop_count() {
        let depths = chain().depth_from("pkg:app");
        assert_eq!(depths["pkg:a"], 1);
        assert_eq!(depths["pkg:c"], 1);
        assert_eq!(depths["pkg:b"], 2);
    }

    #[test]
    fn depth_from_missing_root_is_empty() {
        assert!(chain().depth_from("pkg:nope").is_empty());
    }

    #[test]
    fn depth_from_isolated_root_is_just_root() {
        let components = vec![comp("app", Some("pkg:app"), None)];
        let graph = DependencyGraph::build(&components, &[]);
        let depths = graph.depth_from("pkg:app");
        assert_eq!(depths.len(), 1);
        assert_eq!(depths["pkg:app"], 0);
    }

    #[test]
    fn depth_terminates_on_cycles() {
        let components = vec![
            comp("a", Some("pkg:a"), None),
            comp("b", Some("pkg:b"), None),
        ];
        let deps = vec![
            edge("pkg:a", &["pkg:b"]),
            edge("pkg:b", &["pkg:a"]),
            edge("pkg:a", &["pkg:a"]),
        ];
        let graph = DependencyGraph::build(&components, &deps);
        let depths = graph.depth_from("pkg:a");
        assert_eq!(depths["pkg:a"], 0);
        assert_eq!(depths["pkg:b"], 1);
        // Never more hops than nodes.
        assert!(depths.values().all(|&d| d < graph.node_count()));
    }

    #[test]
    fn closure_excludes_self_and_is_empty_for_leaf() {
        let graph = chain();
        let closure = graph.transitive_closure("pkg:app");
        assert!(!closure.contains("pkg:app"));
        assert_eq!(closure.len(), 3);
        assert!(graph.transitive_closure("pkg:b").is_empty());
    }

    #[test]
    fn closure_excludes_self_even_in_cycle() {
        let components = vec![
            comp("a", Some("pkg:a"), None),
            comp("b", Some("pkg:b"), None),
        ];
        let deps = vec![edge("pkg:a", &["pkg:b"]), edge("pkg:b", &["pkg:a"])];
        let graph = DependencyGraph::build(&components, &deps);
        let closure = graph.transitive_closure("pkg:a");
        assert_eq!(closure, HashSet::from(["pkg:b".to_string()]));
    }

    #[test]
    fn closure_of_unknown_node_is_empty() {
        assert!(chain().transitive_closure("pkg:nope").is_empty());
    }

    #[test]
    fn hotspots_rank_by_degree_with_stable_ties() {
        let graph = chain();
        let hotspots = graph.critical_hotspots();
        // pkg:app has degree 2, pkg:a has degree 2 but was inserted later.
        assert_eq!(hotspots[0], "pkg:app");
        assert_eq!(hotspots[1], "pkg:a");
        assert_eq!(hotspots.len(), 4);
    }

    #[test]
    fn hotspots_empty_graph() {
        let graph = DependencyGraph::build(&[], &[]);
        assert!(graph.critical_hotspots().is_empty());
    }

    #[test]
    fn hotspots_cap_at_five() {
        let components: Vec<Component> = (0..8)
            .map(|i| comp(&format!("lib{i}"), Some(&format!("pkg:{i}")), None))
            .collect();
        let deps: Vec<DependencyEdge> = (1..8)
            .map(|i| edge("pkg:0", &[&format!("pkg:{i}")]))
            .collect();
        let graph = DependencyGraph::build(&components, &deps);
        let hotspots = graph.critical_hotspots();
        assert_eq!(hotspots.len(), 5);
        assert_eq!(hotspots[0], "pkg:0");
    }

    #[test]
    fn duplicate_edges_collapse() {
        let components = vec![
            comp("a", Some("pkg:a"), None),
            comp("b", Some("pkg:b"), None),
        ];
        let deps = vec![edge("pkg:a", &["pkg:b"]), edge("pkg:a", &["pkg:b"])];
        let graph = DependencyGraph::build(&components, &deps);
        assert_eq!(graph.edges().count(), 1);
    }

    #[test]
    fn parentless_edges_are_dropped() {
        let components = vec![comp("a", Some("pkg:a"), None)];
        let deps = vec![DependencyEdge {
            from_ref: None,
            to_refs: vec!["pkg:a".into()],
        }];
        let graph = DependencyGraph::build(&components, &deps);
        assert_eq!(graph.edges().count(), 0);
    }

    #[test]
    fn bom_ref_edges_connect_to_purl_keyed_nodes() {
        let components = vec![
            comp("app", Some("pkg:app"), Some("ref-app")),
            comp("lib", Some("pkg:lib"), Some("ref-lib")),
        ];
        let deps = vec![edge("ref-app", &["ref-lib"])];
        let graph = DependencyGraph::build(&components, &deps);
        let depths = graph.depth_from("pkg:app");
        assert_eq!(depths["pkg:lib"], 1);
        // No phantom nodes created for the bom-refs.
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn unknown_edge_targets_become_nodes() {
        let components = vec![comp("app", Some("pkg:app"), None)];
        let deps = vec![edge("pkg:app", &["pkg:ghost"])];
        let graph = DependencyGraph::build(&components, &deps);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.depth_from("pkg:app")["pkg:ghost"], 1);
    }
}
