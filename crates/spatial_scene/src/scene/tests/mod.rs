//! Scene-level tests driving nodes, activation and touch routing through a real [`Scene`](super::Scene)

mod support;

mod scene_graph;
