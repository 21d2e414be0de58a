//! Label-setting search for the cheapest route through the waypoint
//! graph. The search starts at the end sentinel and settles vertices in
//! order of their cost, following the reversed edges back towards the start
//! sentinel. All edge costs are fuel means, so are never negative.
//!
//! The state of a search is held separately from the graph, so a single
//! finalized graph can serve any number of queries.

use crate::common::error::{FuelRouteError, Result};
use crate::loading::petgraph::WaypointGraph;
use crate::routing::structs::{Route, RouteStep};
use log::debug;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Defines the 3 possible states of a vertex during a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStatus {
    Unvisited,
    Frontier,
    Settled,
}

/// The best known cost for a single vertex, and the vertex it was reached
/// from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Label {
    pub cost_to: Option<f64>,
    pub predecessor: Option<NodeIndex>,
    pub status: VertexStatus,
}

impl Default for Label {
    fn default() -> Label {
        Label {
            cost_to: None,
            predecessor: None,
            status: VertexStatus::Unvisited,
        }
    }
}

/// Labels for every vertex in the graph once a search has completed
#[derive(Debug, Clone)]
pub struct SearchState {
    labels: Vec<Label>,
}

impl SearchState {
    fn new(n_vertices: usize) -> SearchState {
        SearchState {
            labels: vec![Label::default(); n_vertices],
        }
    }

    pub fn label(&self, inx: NodeIndex) -> Option<&Label> {
        self.labels.get(inx.index())
    }

    /// Cost of the cheapest path from the end sentinel, if one was found
    pub fn cost_to(&self, inx: NodeIndex) -> Option<f64> {
        self.label(inx).and_then(|label| label.cost_to)
    }

    pub fn status(&self, inx: NodeIndex) -> VertexStatus {
        self.label(inx)
            .map(|label| label.status)
            .unwrap_or(VertexStatus::Unvisited)
    }
}

/// Entry in the frontier queue. Ordering is reversed so that the cheapest
/// entry sits at the top of the max-heap, with ties broken on the vertex
/// index to keep the search deterministic
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrontierEntry {
    cost: f64,
    inx: NodeIndex,
}

impl Eq for FrontierEntry {}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.inx.cmp(&self.inx))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Settle every vertex reachable from the end sentinel. The graph must have
/// been finalized. Frontier entries which have since been improved upon are
/// left in the queue and skipped when popped
pub fn search(graph: &WaypointGraph) -> Result<SearchState> {
    if !graph.is_finalized() {
        return Err(FuelRouteError::GraphNotFinalized);
    }

    let inner = graph.graph();
    let mut state = SearchState::new(inner.node_count());
    let mut frontier = BinaryHeap::<FrontierEntry>::new();

    let end = graph.end();
    state.labels[end.index()] = Label {
        cost_to: Some(0.0),
        predecessor: None,
        status: VertexStatus::Frontier,
    };
    frontier.push(FrontierEntry { cost: 0.0, inx: end });

    let mut n_settled = 0;
    while let Some(FrontierEntry { cost, inx }) = frontier.pop() {
        let label = &mut state.labels[inx.index()];
        if label.status == VertexStatus::Settled {
            continue;
        }
        if label.cost_to.is_some_and(|best| cost > best) {
            continue;
        }
        label.status = VertexStatus::Settled;
        n_settled += 1;

        for eref in inner.edges(inx) {
            let dst = eref.target();
            let edge_cost = eref
                .weight()
                .cost()
                .ok_or(FuelRouteError::GraphNotFinalized)?;

            let neighbour = &mut state.labels[dst.index()];
            if neighbour.status == VertexStatus::Settled {
                continue;
            }

            let candidate = cost + edge_cost;
            let improves = match neighbour.cost_to {
                Some(best) => candidate < best,
                None => true,
            };
            if improves {
                neighbour.cost_to = Some(candidate);
                neighbour.predecessor = Some(inx);
                neighbour.status = VertexStatus::Frontier;
                frontier.push(FrontierEntry {
                    cost: candidate,
                    inx: dst,
                });
            }
        }
    }

    debug!("Settled {n_settled} of {} vertices", inner.node_count());

    Ok(state)
}

/// Walk the predecessors from the start sentinel to the end sentinel,
/// producing the route in the original direction of travel. Each step's
/// cost is the fuel used to get from it to the next step
pub fn reconstruct_route(graph: &WaypointGraph, state: &SearchState) -> Result<Route> {
    let start = graph.start();
    let end = graph.end();

    if state.status(start) != VertexStatus::Settled {
        return Err(FuelRouteError::Unreachable);
    }
    let total_cost = state.cost_to(start).ok_or(FuelRouteError::Unreachable)?;

    // Cumulative cost is the fuel still needed to reach the end
    let mut visited = FxHashSet::<NodeIndex>::default();
    let mut path: Vec<(NodeIndex, f64)> = Vec::new();
    let mut cur = start;
    loop {
        let pred = state
            .label(cur)
            .and_then(|label| label.predecessor)
            .ok_or(FuelRouteError::Unreachable)?;
        if pred == end {
            break;
        }
        // The start sentinel only ever appears at the head of the walk
        if graph.vertex(pred).is_none_or(|vertex| vertex.key.is_sentinel()) {
            return Err(FuelRouteError::Unreachable);
        }
        // Predecessors form a tree, so this only guards against a corrupt
        // state
        if !visited.insert(pred) {
            return Err(FuelRouteError::Unreachable);
        }
        let remaining = state.cost_to(pred).ok_or(FuelRouteError::Unreachable)?;
        path.push((pred, remaining));
        cur = pred;
    }

    let mut steps = Vec::with_capacity(path.len());
    for (pos, (inx, remaining)) in path.iter().enumerate() {
        let vertex = graph.vertex(*inx).ok_or(FuelRouteError::Unreachable)?;
        let incremental_cost = match path.get(pos + 1) {
            Some((_, next)) => remaining - next,
            None => 0.0,
        };
        steps.push(RouteStep {
            lat: vertex.point.lat,
            lon: vertex.point.lon,
            speed: vertex.speed_bucket,
            incremental_cost,
        });
    }

    Ok(Route { steps, total_cost })
}

/// Find the cheapest route from the start sentinel to the end sentinel
pub fn cheapest_route(graph: &WaypointGraph) -> Result<Route> {
    let state = search(graph)?;
    reconstruct_route(graph, &state)
}
