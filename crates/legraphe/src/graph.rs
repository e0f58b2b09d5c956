// Source-code graph
//
// Nodes are functions, classes, modules and other symbols; edges are the
// relations between them (calls, imports, inheritance, ...). Every node gets
// a dense `global_graph_id` equal to its petgraph index, which is the row of
// that node in every node-embedding matrix.

use crate::error::{GraphError, Result};
use candle_core::{Device, Tensor};
use leplongement::compact_property;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Node in the source graph
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeRecord {
    /// Id in the input data
    pub id: i64,

    /// Dense row index
    pub global_graph_id: usize,

    /// Symbol kind (function, class, module, ...)
    pub node_type: String,

    /// Fully qualified, dot-separated name
    pub name: String,
}

impl NodeRecord {
    /// Last dotted segment of the name (`pkg.mod.func` -> `func`)
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Relation between two nodes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Relation kind (call, import, inheritance, ...)
    pub edge_type: String,
}

/// Directed graph of source-code symbols
#[derive(Debug, Clone, Default)]
pub struct SourceGraph {
    /// Internal graph structure
    graph: DiGraph<NodeRecord, EdgeRecord>,

    /// Input id to node index mapping
    id_index: HashMap<i64, NodeIndex>,
}

impl SourceGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its `global_graph_id`
    pub fn add_node(
        &mut self,
        id: i64,
        node_type: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<usize> {
        if self.id_index.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let global_graph_id = self.graph.node_count();
        let idx = self.graph.add_node(NodeRecord {
            id,
            global_graph_id,
            node_type: node_type.into(),
            name: name.into(),
        });
        self.id_index.insert(id, idx);
        Ok(global_graph_id)
    }

    /// Add an edge between two input ids
    pub fn add_edge(&mut self, source: i64, target: i64, edge_type: impl Into<String>) -> Result<()> {
        let from = self.index_of(source)?;
        let to = self.index_of(target)?;
        self.graph.add_edge(
            from,
            to,
            EdgeRecord {
                edge_type: edge_type.into(),
            },
        );
        Ok(())
    }

    fn index_of(&self, id: i64) -> Result<NodeIndex> {
        self.id_index
            .get(&id)
            .copied()
            .ok_or(GraphError::UnknownNode(id))
    }

    /// Node by dense id
    pub fn node(&self, global_graph_id: usize) -> Option<&NodeRecord> {
        self.graph.node_weight(NodeIndex::new(global_graph_id))
    }

    /// Dense id of an input id
    pub fn find_by_id(&self, id: i64) -> Option<usize> {
        self.id_index.get(&id).map(|idx| idx.index())
    }

    /// Nodes in dense id order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRecord> {
        self.graph.node_weights()
    }

    /// Get node count
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get edge count
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Outgoing neighbors of a node, by dense id
    pub fn neighbors(&self, global_graph_id: usize) -> Vec<usize> {
        self.graph
            .neighbors(NodeIndex::new(global_graph_id))
            .map(|n| n.index())
            .collect()
    }

    /// Edge kinds present in the graph, sorted
    pub fn edge_types(&self) -> Vec<String> {
        self.graph
            .edge_references()
            .map(|e| e.weight().edge_type.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Class label per node: the compacted node type
    pub fn labels(&self) -> Vec<usize> {
        let type2id = compact_property(self.nodes().map(|n| n.node_type.clone()));
        self.nodes().map(|n| type2id[&n.node_type]).collect()
    }

    /// Number of distinct node types
    pub fn num_classes(&self) -> usize {
        self.nodes()
            .map(|n| n.node_type.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// `(global_graph_id, short name)` for every node
    ///
    /// These are the relation records of the name-prediction task: each node
    /// is linked to the last segment of its qualified name.
    pub fn element_records(&self) -> Vec<(usize, String)> {
        self.nodes()
            .map(|n| (n.global_graph_id, n.short_name().to_string()))
            .collect()
    }

    /// Symmetrically normalized adjacency with self loops, as a dense tensor
    ///
    /// Edges are treated as undirected and deduplicated; the result is
    /// `D^{-1/2} (A + I) D^{-1/2}`.
    pub fn normalized_adjacency(&self, device: &Device) -> Result<Tensor> {
        let n = self.node_count();
        let mut pairs: BTreeSet<(usize, usize)> = (0..n).map(|i| (i, i)).collect();
        for edge in self.graph.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            pairs.insert((a, b));
            pairs.insert((b, a));
        }

        let mut degree = vec![0f32; n];
        for &(a, _) in &pairs {
            degree[a] += 1.0;
        }

        let mut dense = vec![0f32; n * n];
        for (a, b) in pairs {
            dense[a * n + b] = 1.0 / (degree[a] * degree[b]).sqrt();
        }
        Ok(Tensor::from_vec(dense, (n, n), device)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> SourceGraph {
        let mut g = SourceGraph::new();
        g.add_node(10, "module", "pkg").unwrap();
        g.add_node(20, "function", "pkg.util.parse").unwrap();
        g.add_node(30, "function", "pkg.main").unwrap();
        g.add_edge(30, 20, "call").unwrap();
        g.add_edge(10, 30, "contains").unwrap();
        g
    }

    #[test]
    fn test_graph_creation() {
        let g = SourceGraph::new();
        assert_eq!(g.node_count(), 0);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_dense_ids_and_lookup() {
        let g = sample_graph();
        assert_eq!(g.find_by_id(20), Some(1));
        assert_eq!(g.node(2).map(|n| n.id), Some(30));
        assert_eq!(g.neighbors(2), vec![1]);
        assert_eq!(g.edge_types(), vec!["call".to_string(), "contains".to_string()]);
    }

    #[test]
    fn test_duplicate_and_unknown_nodes() {
        let mut g = sample_graph();
        assert!(matches!(g.add_node(10, "module", "x"), Err(GraphError::DuplicateNode(10))));
        assert!(matches!(g.add_edge(10, 99, "call"), Err(GraphError::UnknownNode(99))));
    }

    #[test]
    fn test_labels_are_compacted_types() {
        let g = sample_graph();
        assert_eq!(g.labels(), vec![1, 0, 0]);
        assert_eq!(g.num_classes(), 2);
    }

    #[test]
    fn test_element_records_use_short_names() {
        let g = sample_graph();
        assert_eq!(
            g.element_records(),
            vec![
                (0, "pkg".to_string()),
                (1, "parse".to_string()),
                (2, "main".to_string())
            ]
        );
    }

    #[test]
    fn test_normalized_adjacency() {
        let g = sample_graph();
        let adj = g
            .normalized_adjacency(&Device::Cpu)
            .unwrap()
            .to_vec2::<f32>()
            .unwrap();
        // 0-2, 1-2 undirected plus self loops
        let nnz = adj.iter().flatten().filter(|w| **w != 0.0).count();
        assert_eq!(nnz, 7);
        assert_eq!(adj[0][1], 0.0);
        // deg(2) = 3, deg(0) = 2
        assert!((adj[2][0] - 1.0 / 6f32.sqrt()).abs() < 1e-6);
        assert!((adj[2][2] - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(adj[0][2], adj[2][0]);
    }
}
