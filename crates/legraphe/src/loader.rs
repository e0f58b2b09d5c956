// Tabular graph loaders
//
// Nodes CSV: `id,type,serialized_name` (extra columns ignored)
// Edges CSV: `type,source_node_id,target_node_id` (extra columns ignored)

use crate::error::{GraphError, Result};
use crate::graph::SourceGraph;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct NodeRow {
    id: i64,
    #[serde(rename = "type")]
    node_type: String,
    serialized_name: String,
}

#[derive(Debug, Deserialize)]
struct EdgeRow {
    #[serde(rename = "type")]
    edge_type: String,
    source_node_id: i64,
    target_node_id: i64,
}

/// Summary of a graph load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadStats {
    /// Nodes added
    pub nodes: usize,
    /// Edges added
    pub edges: usize,
    /// Edges skipped because an endpoint is missing
    pub skipped_edges: usize,
}

/// Load a graph from node and edge CSV files
pub fn load_graph(nodes_path: &Path, edges_path: &Path) -> Result<(SourceGraph, LoadStats)> {
    let nodes = File::open(nodes_path).map_err(|e| GraphError::io(nodes_path, e))?;
    let edges = File::open(edges_path).map_err(|e| GraphError::io(edges_path, e))?;
    let (graph, stats) = read_graph(nodes, edges)?;
    info!(
        nodes = stats.nodes,
        edges = stats.edges,
        skipped = stats.skipped_edges,
        "Loaded source graph"
    );
    Ok((graph, stats))
}

/// Build a graph from node and edge CSV readers
///
/// Nodes are inserted in ascending input-id order, so `global_graph_id` is
/// the rank of the input id. Edges with an unknown endpoint are skipped.
pub fn read_graph<N: Read, E: Read>(nodes: N, edges: E) -> Result<(SourceGraph, LoadStats)> {
    let mut rows = csv::Reader::from_reader(nodes)
        .deserialize::<NodeRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.sort_by_key(|r| r.id);

    let mut graph = SourceGraph::new();
    let mut stats = LoadStats::default();
    for row in rows {
        graph.add_node(row.id, row.node_type, row.serialized_name)?;
        stats.nodes += 1;
    }

    for row in csv::Reader::from_reader(edges).deserialize::<EdgeRow>() {
        let row = row?;
        match graph.add_edge(row.source_node_id, row.target_node_id, row.edge_type) {
            Ok(()) => stats.edges += 1,
            Err(GraphError::UnknownNode(id)) => {
                warn!(node_id = id, "Skipping edge with unknown endpoint");
                stats.skipped_edges += 1;
            }
            Err(e) => return Err(e),
        }
    }

    Ok((graph, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODES: &str = "id,type,serialized_name,extra\n\
                         7,function,pkg.b.run,x\n\
                         3,module,pkg,x\n\
                         5,function,pkg.a.run,x\n";

    const EDGES: &str = "id,type,source_node_id,target_node_id\n\
                         1,call,7,5\n\
                         2,contains,3,7\n\
                         3,call,7,42\n";

    #[test]
    fn test_read_graph_compacts_ids() {
        let (graph, stats) = read_graph(NODES.as_bytes(), EDGES.as_bytes()).unwrap();
        assert_eq!(
            stats,
            LoadStats {
                nodes: 3,
                edges: 2,
                skipped_edges: 1
            }
        );
        assert_eq!(graph.find_by_id(3), Some(0));
        assert_eq!(graph.find_by_id(5), Some(1));
        assert_eq!(graph.find_by_id(7), Some(2));
        assert_eq!(graph.neighbors(2), vec![1]);
    }

    #[test]
    fn test_duplicate_node_rows_fail() {
        let nodes = "id,type,serialized_name\n1,function,a\n1,function,b\n";
        assert!(matches!(
            read_graph(nodes.as_bytes(), "type,source_node_id,target_node_id\n".as_bytes()),
            Err(GraphError::DuplicateNode(1))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = load_graph(Path::new("/nonexistent/nodes.csv"), Path::new("/nonexistent/e.csv"))
            .unwrap_err();
        assert!(matches!(err, GraphError::Io { .. }));
    }
}
