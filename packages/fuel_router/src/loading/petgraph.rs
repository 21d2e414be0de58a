//! Builds the waypoint graph which the cheapest path search runs over. Each
//! vertex is a waypoint visited in a particular speed bucket, and each edge
//! carries the fuel cost of every recorded traversal between two vertices.
//!
//! The graph is built in reverse: if a drive went from A to B, the graph
//! holds an edge from B to A. The search then runs from the end sentinel
//! back towards the start sentinel, and the predecessors it records point
//! forwards along the original direction of travel.

use crate::common::error::{FuelRouteError, Result};
use crate::common::geometry::GeoPoint;
use crate::common::graph_data::{EdgeCost, VertexData, VertexKey};
use crate::loading::ladder::LadderEntry;
use log::debug;
use petgraph::graph::NodeIndex;
use petgraph::{Directed, Graph};
use rustc_hash::FxHashMap;

/// The graph of all recorded drives, along with a lookup from vertex keys to
/// their indexes in the graph
#[derive(Debug, Clone)]
pub struct WaypointGraph {
    graph: Graph<VertexData, EdgeCost, Directed, u32>,
    key_inx_map: FxHashMap<VertexKey, NodeIndex>,
    start_inx: NodeIndex,
    end_inx: NodeIndex,
    finalized: bool,
}

impl Default for WaypointGraph {
    fn default() -> Self {
        WaypointGraph::new()
    }
}

impl WaypointGraph {
    /// Set up an empty graph containing only the start and end sentinels
    pub fn new() -> WaypointGraph {
        let mut graph = Graph::<VertexData, EdgeCost, Directed, u32>::new();
        let mut key_inx_map = FxHashMap::<VertexKey, NodeIndex>::default();

        let start_inx = graph.add_node(VertexData::start());
        let end_inx = graph.add_node(VertexData::end());
        key_inx_map.insert(VertexKey::Start, start_inx);
        key_inx_map.insert(VertexKey::End, end_inx);

        WaypointGraph {
            graph,
            key_inx_map,
            start_inx,
            end_inx,
            finalized: false,
        }
    }

    pub fn start(&self) -> NodeIndex {
        self.start_inx
    }

    pub fn end(&self) -> NodeIndex {
        self.end_inx
    }

    pub fn graph(&self) -> &Graph<VertexData, EdgeCost, Directed, u32> {
        &self.graph
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn vertex(&self, inx: NodeIndex) -> Option<&VertexData> {
        self.graph.node_weight(inx)
    }

    pub fn vertex_index(&self, key: &VertexKey) -> Option<NodeIndex> {
        self.key_inx_map.get(key).copied()
    }

    /// Fetch the accumulated cost of the edge between two vertices, if any
    /// drive has traversed it
    pub fn edge_cost(&self, src: &VertexKey, dst: &VertexKey) -> Option<&EdgeCost> {
        let src_inx = self.vertex_index(src)?;
        let dst_inx = self.vertex_index(dst)?;
        let edge_inx = self.graph.find_edge(src_inx, dst_inx)?;
        self.graph.edge_weight(edge_inx)
    }

    /// Look up the vertex for a waypoint visited in the provided speed
    /// bucket, creating it the first time it is seen
    pub fn get_or_add_vertex(&mut self, point: GeoPoint, speed_bucket: i32) -> NodeIndex {
        let key = VertexKey::waypoint(&point, speed_bucket);
        match self.key_inx_map.get(&key) {
            Some(inx) => *inx,
            None => {
                let inx = self
                    .graph
                    .add_node(VertexData::waypoint(point, speed_bucket));
                self.key_inx_map.insert(key, inx);
                inx
            }
        }
    }

    /// Record one traversal of the edge from src to dst. Repeat traversals
    /// are accumulated onto the existing edge
    pub fn add_observation(
        &mut self,
        src: NodeIndex,
        dst: NodeIndex,
        cost: f64,
    ) -> Result<()> {
        if self.finalized {
            return Err(FuelRouteError::GraphFinalized);
        }

        match self.graph.find_edge(src, dst) {
            Some(edge_inx) => {
                if let Some(edge) = self.graph.edge_weight_mut(edge_inx) {
                    edge.observe(cost);
                }
            }
            None => {
                self.graph.add_edge(src, dst, EdgeCost::new(cost));
            }
        }
        Ok(())
    }
}

/// Merge the cost ladder of a single drive into the graph. Edges are added
/// from each rung back to the one before it, carrying the cost of the
/// segment between them. When requested, the first rung is joined to the
/// start sentinel and the end sentinel is joined to the last rung, both at
/// no cost.
///
/// Ladders with fewer than two rungs contribute no edges; a single rung
/// still registers its vertex
pub fn merge_into_graph(
    graph: &mut WaypointGraph,
    ladder: &[LadderEntry],
    connect_start: bool,
    connect_end: bool,
) -> Result<()> {
    if graph.is_finalized() {
        return Err(FuelRouteError::GraphFinalized);
    }

    let vertices: Vec<NodeIndex> = ladder
        .iter()
        .map(|entry| graph.get_or_add_vertex(entry.point, entry.speed_bucket))
        .collect();

    let (first, last) = match (vertices.first(), vertices.last()) {
        (Some(first), Some(last)) if vertices.len() >= 2 => (*first, *last),
        _ => {
            debug!("Ladder with {} rungs contributes no edges", ladder.len());
            return Ok(());
        }
    };

    if connect_start {
        let start = graph.start();
        graph.add_observation(first, start, 0.0)?;
    }

    for inx in (1..vertices.len()).rev() {
        graph.add_observation(
            vertices[inx],
            vertices[inx - 1],
            ladder[inx - 1].segment_cost,
        )?;
    }

    if connect_end {
        let end = graph.end();
        graph.add_observation(end, last, 0.0)?;
    }

    Ok(())
}

/// Replace the accumulated observations on every edge with their mean. This
/// must be called once all drives have been merged, and before the graph is
/// searched. Calling it again has no effect
pub fn finalize_edges(graph: &mut WaypointGraph) {
    if graph.finalized {
        return;
    }

    for edge in graph.graph.edge_weights_mut() {
        edge.finalize();
    }
    graph.finalized = true;

    debug!(
        "Finalized {} edges across {} vertices",
        graph.graph.edge_count(),
        graph.graph.node_count()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn entry(lat: f64, speed_bucket: i32, segment_cost: f64) -> LadderEntry {
        LadderEntry {
            point: GeoPoint::new(lat, 10.0),
            speed_bucket,
            segment_cost,
        }
    }

    fn key(lat: f64, speed_bucket: i32) -> VertexKey {
        VertexKey::waypoint(&GeoPoint::new(lat, 10.0), speed_bucket)
    }

    /// A fresh graph holds only the two sentinels
    #[test]
    fn test_new_graph() {
        let graph = WaypointGraph::new();

        assert_eq!(graph.graph().node_count(), 2);
        assert_eq!(graph.graph().edge_count(), 0);
        assert_eq!(graph.vertex(graph.start()).unwrap().key, VertexKey::Start);
        assert_eq!(graph.vertex(graph.end()).unwrap().key, VertexKey::End);
    }

    /// The same waypoint and speed bucket must always map to one vertex
    #[test]
    fn test_get_or_add_vertex() {
        let mut graph = WaypointGraph::new();

        let a = graph.get_or_add_vertex(GeoPoint::new(10.0, 10.0), 30);
        let b = graph.get_or_add_vertex(GeoPoint::new(10.0, 10.0), 30);
        let c = graph.get_or_add_vertex(GeoPoint::new(10.0, 10.0), 35);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(graph.graph().node_count(), 4);
    }

    /// Edges should run backwards through the ladder, each carrying the
    /// cost stored on the earlier rung, with the sentinels attached at
    /// either end
    #[test]
    fn test_merge_reversed_edges() {
        let mut graph = WaypointGraph::new();
        let ladder = vec![entry(10.0, 30, 0.5), entry(10.001, 30, 0.25), entry(10.002, 25, 0.0)];

        merge_into_graph(&mut graph, &ladder, true, true).unwrap();

        assert_eq!(graph.graph().node_count(), 5);
        assert_eq!(graph.graph().edge_count(), 4);

        let e21 = graph.edge_cost(&key(10.002, 25), &key(10.001, 30)).unwrap();
        assert_eq!(e21.cost_sum, 0.25);
        let e10 = graph.edge_cost(&key(10.001, 30), &key(10.0, 30)).unwrap();
        assert_eq!(e10.cost_sum, 0.5);

        let to_start = graph.edge_cost(&key(10.0, 30), &VertexKey::Start).unwrap();
        assert_eq!(to_start.cost_sum, 0.0);
        let from_end = graph.edge_cost(&VertexKey::End, &key(10.002, 25)).unwrap();
        assert_eq!(from_end.cost_sum, 0.0);

        // Nothing runs in the direction of travel
        assert!(graph.edge_cost(&key(10.0, 30), &key(10.001, 30)).is_none());
    }

    /// Sentinels are only attached when requested
    #[test]
    fn test_merge_without_sentinels() {
        let mut graph = WaypointGraph::new();
        let ladder = vec![entry(10.0, 30, 0.5), entry(10.001, 30, 0.0)];

        merge_into_graph(&mut graph, &ladder, false, false).unwrap();

        assert_eq!(graph.graph().edge_count(), 1);
        assert!(graph.edge_cost(&key(10.0, 30), &VertexKey::Start).is_none());
    }

    /// Short ladders must not fail, and must not add any edges
    #[test]
    fn test_merge_short_ladders() {
        let mut graph = WaypointGraph::new();

        merge_into_graph(&mut graph, &[], true, true).unwrap();
        merge_into_graph(&mut graph, &[entry(10.0, 30, 0.0)], true, true).unwrap();

        assert_eq!(graph.graph().node_count(), 3);
        assert_eq!(graph.graph().edge_count(), 0);
    }

    /// Repeat traversals accumulate, and are averaged on finalization
    #[test]
    fn test_edge_mean_across_drives() {
        let mut graph = WaypointGraph::new();
        let costs = [0.3, 0.1, 0.8];
        for cost in costs {
            let ladder = vec![entry(10.0, 30, cost), entry(10.001, 30, 0.0)];
            merge_into_graph(&mut graph, &ladder, true, true).unwrap();
        }

        let edge = graph.edge_cost(&key(10.001, 30), &key(10.0, 30)).unwrap();
        assert_eq!(edge.samples, 3);
        assert!(edge.cost().is_none());

        finalize_edges(&mut graph);

        let edge = graph.edge_cost(&key(10.001, 30), &key(10.0, 30)).unwrap();
        assert_abs_diff_eq!(edge.cost().unwrap(), 1.2 / 3.0, epsilon = 1e-15);
        assert_eq!(graph.graph().edge_count(), 3);
    }

    /// Finalizing twice must leave every edge cost untouched
    #[test]
    fn test_finalize_idempotent() {
        let mut graph = WaypointGraph::new();
        merge_into_graph(&mut graph, &[entry(10.0, 30, 0.7), entry(10.001, 30, 0.0)], true, true)
            .unwrap();
        merge_into_graph(&mut graph, &[entry(10.0, 30, 0.2), entry(10.001, 30, 0.0)], true, true)
            .unwrap();

        finalize_edges(&mut graph);
        let first = graph.edge_cost(&key(10.001, 30), &key(10.0, 30)).unwrap().cost();
        finalize_edges(&mut graph);
        let second = graph.edge_cost(&key(10.001, 30), &key(10.0, 30)).unwrap().cost();

        assert_eq!(first, second);
        assert_abs_diff_eq!(second.unwrap(), 0.45, epsilon = 1e-15);
    }

    /// Drives can not be merged once costs have been averaged
    #[test]
    fn test_merge_after_finalize() {
        let mut graph = WaypointGraph::new();
        finalize_edges(&mut graph);

        let result = merge_into_graph(&mut graph, &[entry(10.0, 30, 0.0)], true, true);

        match result {
            Err(FuelRouteError::GraphFinalized) => (),
            other => panic!("Expected GraphFinalized, got {other:?}"),
        }
    }
}
