//! Data structures and algorithms for the junction-level road graph.
//!
//! Raw road elements fold into at most one directed edge per ordered pair of
//! junctions; edges carry the full segment metadata needed to weigh, prune,
//! contract and render roads. All containers are insertion-ordered, so every
//! sweep is deterministic for a given operation history.

use crate::*;
use queue::PriorityQueue;

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which derived edge quantity route planning minimizes
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WeightType {
	/// Physical length, metres
	#[serde(rename = "distance")]
	Distance,
	/// Expected travel time, hours
	#[serde(rename = "travel_time")]
	TravelTime,
}

impl fmt::Display for WeightType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			WeightType::Distance => "distance",
			WeightType::TravelTime => "travel_time",
		})
	}
}

impl FromStr for WeightType {
	type Err = GraphError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"distance" => Ok(WeightType::Distance),
			"travel_time" => Ok(WeightType::TravelTime),
			_ => Err(GraphError::UnknownWeightType(s.to_string())),
		}
	}
}

/// Ways a graph operation can fail
#[derive(Error, Clone, PartialEq, Eq, Debug)]
pub enum GraphError {
	#[error("junction {0} is not in the graph")]
	UnknownJunction(JuncId),
	#[error("no road from junction {0} to junction {1}")]
	UnknownEdge(JuncId, JuncId),
	#[error("unknown weight type {0:?}, expected \"distance\" or \"travel_time\"")]
	UnknownWeightType(String),
}

/// One polyline piece of a road element, with homogeneous attributes.
///
/// Immutable once constructed.
#[derive(Clone, PartialEq, Debug)]
pub struct Segment {
	/// Id of the parent road element
	pub ogf_id: OgfId,
	/// Street name, possibly empty
	pub name: String,
	/// Physical length, metres
	pub length: N64,
	pub road_class: String,
	/// km/h
	pub speed_limit: u32,
	/// `[lat, lon]` pairs, at least 2
	pub coordinates: Vec<(f64, f64)>,
}

impl Segment {
	/// Hours needed to traverse the segment at its speed limit
	pub fn travel_time(&self) -> N64 {
		self.length / n64(self.speed_limit as f64 * 1e3)
	}
}

/// A directed junction-to-junction road, owning the segments merged into it
#[derive(Clone, Debug)]
pub struct Edge {
	pub start_id: JuncId,
	pub end_id: JuncId,
	/// Parent road elements (more than one only after simplification)
	pub ogf_ids: BTreeSet<OgfId>,
	segments: Vec<Segment>,
	distance: N64,
	travel_time: N64,
}

impl Edge {
	/// Constructs an edge; travel time is derived from `segments`, distance
	/// is taken from `length` and authoritative thereafter
	pub fn new(start_id: JuncId, end_id: JuncId, ogf_ids: BTreeSet<OgfId>, length: N64, segments: Vec<Segment>) -> Self {
		let mut edge = Edge {
			start_id,
			end_id,
			ogf_ids,
			segments,
			distance: length,
			travel_time: n64(0.0),
		};
		edge.update_travel_time();
		edge
	}
	/// Physical length, metres
	pub fn distance(&self) -> N64 {
		self.distance
	}
	/// Hours to traverse every segment at its speed limit
	pub fn travel_time(&self) -> N64 {
		self.travel_time
	}
	/// The weight under the given criterion
	pub fn weight(&self, weight_type: WeightType) -> N64 {
		match weight_type {
			WeightType::Distance => self.distance,
			WeightType::TravelTime => self.travel_time,
		}
	}
	/// Segments, in merge order
	pub fn segments(&self) -> &[Segment] {
		&self.segments
	}
	/// Recomputes travel time from the current segments
	pub fn update_travel_time(&mut self) {
		self.travel_time = self.segments.iter().map(Segment::travel_time).fold(n64(0.0), |a, t| a + t);
	}
	/// Whether every segment's class is in `road_classes`
	pub fn all_in_road_classes(&self, road_classes: &HashSet<String>) -> bool {
		self.segments.iter().all(|s| road_classes.contains(&s.road_class))
	}
	/// Concatenation of 2 consecutive edges `a → v` and `v → b` into one
	/// `a → b`: union of road elements and segments, summed distance,
	/// re-derived travel time
	fn join(a: &Edge, b: &Edge) -> Edge {
		Edge::new(
			a.start_id,
			b.end_id,
			a.ogf_ids.union(&b.ogf_ids).copied().collect(),
			a.distance + b.distance,
			a.segments.iter().chain(b.segments.iter()).cloned().collect(),
		)
	}
}

/// A junction.
///
/// Adjacency is kept as id relations into the owning graph's vertex map,
/// never as owning references; the graph maintains
/// `v ∈ u.downstream ⇔ u ∈ v.upstream ⇔ edge (u, v) exists`.
#[derive(Clone, Debug)]
pub struct Vertex {
	pub junc_id: JuncId,
	/// `[lat, lon]`
	pub coordinates: (f64, f64),
	/// Popup text shown on rendered markers, possibly empty
	pub message: String,
	upstream: IndexSet<JuncId>,
	downstream: IndexSet<JuncId>,
}

impl Vertex {
	fn new(junc_id: JuncId, coordinates: (f64, f64), message: String) -> Self {
		Vertex {
			junc_id,
			coordinates,
			message,
			upstream: IndexSet::new(),
			downstream: IndexSet::new(),
		}
	}
	/// Junctions with a road into this one
	pub fn upstream(&self) -> impl Iterator<Item = JuncId> + '_ {
		self.upstream.iter().copied()
	}
	/// Junctions this one has a road into
	pub fn downstream(&self) -> impl Iterator<Item = JuncId> + '_ {
		self.downstream.iter().copied()
	}
	pub fn in_degree(&self) -> usize {
		self.upstream.len()
	}
	pub fn out_degree(&self) -> usize {
		self.downstream.len()
	}
}

/// The road network graph, exclusive owner of all vertices and edges
#[derive(Clone, Default, Debug)]
pub struct Graph {
	vertices: IndexMap<JuncId, Vertex>,
	edges: IndexMap<(JuncId, JuncId), Edge>,
}

impl Graph {
	pub fn new() -> Self {
		Default::default()
	}
	pub fn contains_vertex(&self, junc_id: JuncId) -> bool {
		self.vertices.contains_key(&junc_id)
	}
	pub fn contains_edge(&self, start_id: JuncId, end_id: JuncId) -> bool {
		self.edges.contains_key(&(start_id, end_id))
	}
	/// Get a junction by id
	pub fn vertex(&self, junc_id: JuncId) -> Option<&Vertex> {
		self.vertices.get(&junc_id)
	}
	/// Get the road from `start_id` to `end_id`
	pub fn edge(&self, start_id: JuncId, end_id: JuncId) -> Option<&Edge> {
		self.edges.get(&(start_id, end_id))
	}
	/// All junctions
	pub fn vertices(&self) -> impl Iterator<Item = &Vertex> {
		self.vertices.values()
	}
	/// All roads
	pub fn edges(&self) -> impl Iterator<Item = &Edge> {
		self.edges.values()
	}
	pub fn vertex_count(&self) -> usize {
		self.vertices.len()
	}
	pub fn edge_count(&self) -> usize {
		self.edges.len()
	}
	/// Coordinates of a junction
	pub fn vertex_coordinates(&self, junc_id: JuncId) -> Result<(f64, f64), GraphError> {
		self.vertex(junc_id).map(|v| v.coordinates).ok_or(GraphError::UnknownJunction(junc_id))
	}
	/// Adds a junction; does nothing if the id is already present
	pub fn add_vertex(&mut self, junc_id: JuncId, coordinates: (f64, f64), message: &str) {
		self.vertices
			.entry(junc_id)
			.or_insert_with(|| Vertex::new(junc_id, coordinates, message.to_string()));
	}
	/// Attaches popup text to a junction; does nothing for unknown ids
	pub fn set_message(&mut self, junc_id: JuncId, message: &str) {
		if let Some(vertex) = self.vertices.get_mut(&junc_id) {
			vertex.message = message.to_string();
		}
	}
	/// Attaches popup texts in bulk
	pub fn add_messages<'a>(&mut self, messages: impl IntoIterator<Item = (JuncId, &'a str)>) {
		for (junc_id, message) in messages {
			self.set_message(junc_id, message);
		}
	}
	/// Adds a road built from segments.
	///
	/// If a road from `start_id` to `end_id` already exists, the candidate
	/// replaces it only when strictly lighter under `weight_type`, so
	/// duplicate ingestion is idempotent and the lightest parallel road wins.
	pub fn add_edge_with_segments(
		&mut self,
		start_id: JuncId,
		end_id: JuncId,
		ogf_ids: BTreeSet<OgfId>,
		length: N64,
		weight_type: WeightType,
		segments: Vec<Segment>,
	) -> Result<(), GraphError> {
		if !self.vertices.contains_key(&start_id) {
			return Err(GraphError::UnknownJunction(start_id));
		}
		if !self.vertices.contains_key(&end_id) {
			return Err(GraphError::UnknownJunction(end_id));
		}
		let candidate = Edge::new(start_id, end_id, ogf_ids, length, segments);
		match self.edges.get(&(start_id, end_id)) {
			None => {
				self.vertices.get_mut(&start_id).unwrap().downstream.insert(end_id);
				self.vertices.get_mut(&end_id).unwrap().upstream.insert(start_id);
				self.edges.insert((start_id, end_id), candidate);
			}
			Some(existing) if existing.weight(weight_type) > candidate.weight(weight_type) => {
				self.edges.insert((start_id, end_id), candidate);
			}
			Some(_) => {}
		}
		Ok(())
	}
	/// Weight of the road from `start_id` to `end_id`
	pub fn get_weight(&self, start_id: JuncId, end_id: JuncId, weight_type: WeightType) -> Result<N64, GraphError> {
		self.edges
			.get(&(start_id, end_id))
			.map(|e| e.weight(weight_type))
			.ok_or(GraphError::UnknownEdge(start_id, end_id))
	}
	/// Removes the road from `start_id` to `end_id` together with the
	/// adjacency it induced; does nothing if no such road exists
	pub fn remove_edge(&mut self, start_id: JuncId, end_id: JuncId) {
		if self.edges.swap_remove(&(start_id, end_id)).is_some() {
			self.vertices.get_mut(&start_id).unwrap().downstream.swap_remove(&end_id);
			self.vertices.get_mut(&end_id).unwrap().upstream.swap_remove(&start_id);
		}
	}
	/// Removes whole pockets of low-priority roads.
	///
	/// A weakly-connected pocket of roads lying entirely in `pruned_classes`
	/// is deleted only when it touches at most one preserved class: a pocket
	/// bridging 2 preserved classes is the only thing connecting them, so it
	/// stays. Roads with any segment outside `pruned_classes` are never
	/// candidates.
	pub fn prune(&mut self, protected_ids: &HashSet<JuncId>, pruned_classes: &HashSet<String>) {
		let preserved = self.preserved_classes(protected_ids, pruned_classes);
		let prunable = self.prunable_classes(pruned_classes);
		let mut to_prune: HashSet<JuncId> = HashSet::new();
		for class in &prunable {
			let touched = preserved.iter().filter(|p| !p.is_disjoint(class)).count();
			if touched <= 1 {
				to_prune.extend(class.iter().copied());
			}
		}
		let snapshot: Vec<(JuncId, JuncId)> = self.edges.keys().copied().collect();
		for (start_id, end_id) in snapshot {
			if to_prune.contains(&start_id)
				&& to_prune.contains(&end_id)
				&& self
					.edges
					.get(&(start_id, end_id))
					.map_or(false, |e| e.all_in_road_classes(pruned_classes))
			{
				self.remove_edge(start_id, end_id);
			}
		}
	}
	/// Equivalence classes of junctions mutually reachable in both directions
	/// over roads that are not entirely in `pruned_classes`.
	///
	/// Each class is the intersection of a forward BFS over retained
	/// out-roads and a backward BFS over retained in-roads. Junctions
	/// isolated in the retained subgraph form (singleton) classes only when
	/// listed in `protected_ids`.
	pub fn preserved_classes(
		&self,
		protected_ids: &HashSet<JuncId>,
		pruned_classes: &HashSet<String>,
	) -> Vec<HashSet<JuncId>> {
		let mut visited: HashSet<JuncId> = HashSet::new();
		let mut classes = Vec::new();
		for (&k, vertex) in &self.vertices {
			if visited.contains(&k) {
				continue;
			}
			let mut check_down: VecDeque<JuncId> = vertex
				.downstream()
				.filter(|&u| !self.edges[&(k, u)].all_in_road_classes(pruned_classes))
				.collect();
			let mut check_up: VecDeque<JuncId> = vertex
				.upstream()
				.filter(|&u| !self.edges[&(u, k)].all_in_road_classes(pruned_classes))
				.collect();
			if !protected_ids.contains(&k) && (check_down.is_empty() || check_up.is_empty()) {
				continue;
			}
			let mut down_connected: HashSet<JuncId> = check_down.iter().copied().chain(Some(k)).collect();
			let mut up_connected: HashSet<JuncId> = check_up.iter().copied().chain(Some(k)).collect();
			while let Some(u) = check_down.pop_front() {
				for v in self.vertices[&u].downstream() {
					if !down_connected.contains(&v) && !self.edges[&(u, v)].all_in_road_classes(pruned_classes) {
						down_connected.insert(v);
						check_down.push_back(v);
					}
				}
			}
			while let Some(u) = check_up.pop_front() {
				for v in self.vertices[&u].upstream() {
					if !up_connected.contains(&v) && !self.edges[&(v, u)].all_in_road_classes(pruned_classes) {
						up_connected.insert(v);
						check_up.push_back(v);
					}
				}
			}
			let class: HashSet<JuncId> = down_connected.intersection(&up_connected).copied().collect();
			visited.extend(class.iter().copied());
			classes.push(class);
		}
		classes
	}
	/// Weakly-connected equivalence classes of the subgraph of roads lying
	/// entirely in `pruned_classes`: BFS over the symmetric closure of that
	/// road set
	pub fn prunable_classes(&self, pruned_classes: &HashSet<String>) -> Vec<HashSet<JuncId>> {
		let mut visited: HashSet<JuncId> = HashSet::new();
		let mut classes = Vec::new();
		for (&k, vertex) in &self.vertices {
			if visited.contains(&k) {
				continue;
			}
			let adjacent: IndexSet<JuncId> = vertex.upstream().chain(vertex.downstream()).collect();
			let mut check: VecDeque<JuncId> = adjacent
				.into_iter()
				.filter(|&u| self.prunable_between(k, u, pruned_classes))
				.collect();
			if check.is_empty() {
				continue;
			}
			let mut class: HashSet<JuncId> = check.iter().copied().chain(Some(k)).collect();
			while let Some(u) = check.pop_front() {
				let vertex = &self.vertices[&u];
				for v in vertex.upstream().chain(vertex.downstream()) {
					if !class.contains(&v) && self.prunable_between(u, v, pruned_classes) {
						class.insert(v);
						check.push_back(v);
					}
				}
			}
			visited.extend(class.iter().copied());
			classes.push(class);
		}
		classes
	}
	/// Whether some road between `u` and `v`, in either direction, lies
	/// entirely in `pruned_classes`
	fn prunable_between(&self, u: JuncId, v: JuncId, pruned_classes: &HashSet<String>) -> bool {
		self.edges.get(&(u, v)).map_or(false, |e| e.all_in_road_classes(pruned_classes))
			|| self.edges.get(&(v, u)).map_or(false, |e| e.all_in_road_classes(pruned_classes))
	}
	/// Contracts junctions that pruning left degenerate.
	///
	/// One sweep over a snapshot of the junction ids; a junction outside
	/// `protected_ids` is eliminated when its degrees match one of:
	/// - 0 in / 0 out: dropped;
	/// - 1 in / 1 out with distinct neighbours `u → v → w`: replaced by a
	///   through road `u → w`;
	/// - 2 in / 2 out with mirrored neighbours `{a, b}`: replaced by through
	///   roads `a → b` and `b → a`.
	///
	/// Callers wanting further contraction invoke the sweep again.
	pub fn remove_redundant_vertices(&mut self, weight_type: WeightType, protected_ids: &HashSet<JuncId>) {
		let snapshot: Vec<JuncId> = self.vertices.keys().copied().collect();
		for junc_id in snapshot {
			if protected_ids.contains(&junc_id) {
				continue;
			}
			let vertex = match self.vertices.get(&junc_id) {
				Some(v) => v,
				None => continue,
			};
			let (ins, outs) = (vertex.in_degree(), vertex.out_degree());
			if ins == 0 && outs == 0 {
				self.vertices.swap_remove(&junc_id);
			} else if ins == 1 && outs == 1 && vertex.upstream != vertex.downstream {
				let u = *vertex.upstream.get_index(0).unwrap();
				let w = *vertex.downstream.get_index(0).unwrap();
				self.vertices.swap_remove(&junc_id);
				self.contract_through(u, junc_id, w, weight_type);
			} else if ins == 2 && outs == 2 && vertex.upstream == vertex.downstream {
				let a = *vertex.downstream.get_index(0).unwrap();
				let b = *vertex.downstream.get_index(1).unwrap();
				self.vertices.swap_remove(&junc_id);
				self.contract_through(a, junc_id, b, weight_type);
				self.contract_through(b, junc_id, a, weight_type);
			}
		}
	}
	/// Replaces `u → v → w` by a through road `u → w`, `v` having already
	/// been dropped from the vertex map.
	///
	/// An existing direct road is only replaced when strictly heavier than
	/// the two-road sum under `weight_type`; either way the through roads are
	/// removed, which can discard a multi-hop alternative (protect `v` to
	/// keep it).
	fn contract_through(&mut self, u: JuncId, v: JuncId, w: JuncId, weight_type: WeightType) {
		let in_edge = self.edges.swap_remove(&(u, v)).unwrap();
		let out_edge = self.edges.swap_remove(&(v, w)).unwrap();
		self.vertices.get_mut(&u).unwrap().downstream.swap_remove(&v);
		self.vertices.get_mut(&w).unwrap().upstream.swap_remove(&v);
		let replace = match self.edges.get(&(u, w)) {
			None => true,
			Some(direct) => direct.weight(weight_type) > in_edge.weight(weight_type) + out_edge.weight(weight_type),
		};
		if replace {
			self.edges.insert((u, w), Edge::join(&in_edge, &out_edge));
		}
		self.vertices.get_mut(&u).unwrap().downstream.insert(w);
		self.vertices.get_mut(&w).unwrap().upstream.insert(u);
	}
	/// Finds a minimum-weight path between 2 junctions.
	///
	/// Heap-optimized Dijkstra over downstream adjacency, stopping as soon as
	/// the destination is settled. Ties in priority resolve by queue
	/// insertion order, so results are deterministic for a given graph state.
	///
	/// Returns: the junction sequence from `start_id` to `end_id` inclusive
	/// and its total weight, or [`None`] if the destination is unreachable
	pub fn find_shortest_path(
		&self,
		start_id: JuncId,
		end_id: JuncId,
		weight_type: WeightType,
	) -> Result<Option<(Vec<JuncId>, N64)>, GraphError> {
		if !self.vertices.contains_key(&start_id) {
			return Err(GraphError::UnknownJunction(start_id));
		}
		if !self.vertices.contains_key(&end_id) {
			return Err(GraphError::UnknownJunction(end_id));
		}
		if start_id == end_id {
			return Ok(Some((vec![start_id], n64(0.0))));
		}
		let mut dist: HashMap<JuncId, N64> = HashMap::new();
		let mut prev: HashMap<JuncId, JuncId> = HashMap::new();
		let mut visited: HashSet<JuncId> = HashSet::new();
		let mut q = PriorityQueue::new();
		dist.insert(start_id, n64(0.0));
		q.enqueue(start_id, n64(0.0)).unwrap();
		while let Ok(u) = q.dequeue() {
			visited.insert(u);
			if u == end_id {
				break;
			}
			let d = dist[&u];
			for v in self.vertices[&u].downstream() {
				if visited.contains(&v) {
					continue;
				}
				let candidate = d + self.edges[&(u, v)].weight(weight_type);
				if dist.get(&v).map_or(true, |&best| best > candidate) {
					dist.insert(v, candidate);
					prev.insert(v, u);
					if q.contains(v) {
						q.update_priority(v, candidate).unwrap();
					} else {
						q.enqueue(v, candidate).unwrap();
					}
				}
			}
		}
		Ok(dist.get(&end_id).map(|&cost| {
			let mut path = vec![end_id];
			let mut cur = end_id;
			while let Some(&p) = prev.get(&cur) {
				path.push(p);
				cur = p;
			}
			path.reverse();
			(path, cost)
		}))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	const ARTERIAL: &str = "Arterial";
	const LOCAL: &str = "Local / Street";

	fn seg(ogf_id: OgfId, length: f64, road_class: &str, speed_limit: u32) -> Segment {
		Segment {
			ogf_id,
			name: String::new(),
			length: n64(length),
			road_class: road_class.to_string(),
			speed_limit,
			coordinates: vec![(0.0, 0.0), (0.0, 1.0)],
		}
	}

	fn ids(xs: &[JuncId]) -> HashSet<JuncId> {
		xs.iter().copied().collect()
	}

	fn classes(xs: &[&str]) -> HashSet<String> {
		xs.iter().map(|s| s.to_string()).collect()
	}

	/// Builds a graph from `(start, end, ogf_id, length, road_class)` roads,
	/// one segment each, speed limit 50, weighted by distance
	macro_rules! graph {
		($(($s:expr, $t:expr, $ogf:expr, $len:expr, $class:expr)),* $(,)?) => {{
			let mut g = Graph::new();
			$(
				g.add_vertex($s, ($s as f64, 0.0), "");
				g.add_vertex($t, ($t as f64, 0.0), "");
				g.add_edge_with_segments(
					$s,
					$t,
					Some($ogf as OgfId).into_iter().collect(),
					n64($len),
					WeightType::Distance,
					vec![seg($ogf, $len, $class, 50)],
				).unwrap();
			)*
			g
		}};
	}

	fn edge_keys(g: &Graph) -> HashSet<(JuncId, JuncId)> {
		g.edges().map(|e| (e.start_id, e.end_id)).collect()
	}

	#[test]
	fn test_adjacency_mirrors_edge_map() {
		let mut g = graph![(1, 2, 10, 1.0, ARTERIAL), (2, 3, 11, 1.0, ARTERIAL)];
		assert!(g.contains_edge(1, 2));
		assert_eq!(g.vertex(1).unwrap().downstream().collect::<Vec<_>>(), vec![2]);
		assert_eq!(g.vertex(2).unwrap().upstream().collect::<Vec<_>>(), vec![1]);
		assert_eq!(g.vertex(2).unwrap().downstream().collect::<Vec<_>>(), vec![3]);
		g.remove_edge(1, 2);
		assert!(!g.contains_edge(1, 2));
		assert_eq!(g.vertex(1).unwrap().out_degree(), 0);
		assert_eq!(g.vertex(2).unwrap().in_degree(), 0);
		// removing again is a silent no-op
		g.remove_edge(1, 2);
		assert_eq!(g.edge_count(), 1);
	}

	#[test]
	fn test_add_vertex_is_idempotent() {
		let mut g = Graph::new();
		g.add_vertex(1, (43.0, -79.0), "first");
		g.add_vertex(1, (0.0, 0.0), "second");
		assert_eq!(g.vertex_count(), 1);
		assert_eq!(g.vertex_coordinates(1), Ok((43.0, -79.0)));
		assert_eq!(g.vertex(1).unwrap().message, "first");
		assert_eq!(g.vertex_coordinates(4), Err(GraphError::UnknownJunction(4)));
	}

	#[test]
	fn test_parallel_roads_keep_minimum_weight() {
		let mut g = graph![(1, 2, 10, 5.0, ARTERIAL)];
		// heavier candidate loses
		g.add_edge_with_segments(1, 2, Some(11).into_iter().collect(), n64(7.0), WeightType::Distance, vec![seg(11, 7.0, ARTERIAL, 50)])
			.unwrap();
		assert_eq!(g.get_weight(1, 2, WeightType::Distance), Ok(n64(5.0)));
		// equal candidate loses (existing wins ties)
		g.add_edge_with_segments(1, 2, Some(12).into_iter().collect(), n64(5.0), WeightType::Distance, vec![seg(12, 5.0, ARTERIAL, 50)])
			.unwrap();
		assert!(g.edge(1, 2).unwrap().ogf_ids.contains(&10));
		// lighter candidate wins, adjacency unchanged
		g.add_edge_with_segments(1, 2, Some(13).into_iter().collect(), n64(2.0), WeightType::Distance, vec![seg(13, 2.0, ARTERIAL, 50)])
			.unwrap();
		assert_eq!(g.get_weight(1, 2, WeightType::Distance), Ok(n64(2.0)));
		assert_eq!(g.vertex(1).unwrap().out_degree(), 1);
		assert_eq!(
			g.add_edge_with_segments(1, 9, BTreeSet::new(), n64(1.0), WeightType::Distance, vec![]),
			Err(GraphError::UnknownJunction(9))
		);
		assert_eq!(g.get_weight(2, 1, WeightType::Distance), Err(GraphError::UnknownEdge(2, 1)));
	}

	#[test]
	fn test_travel_time_derivation() {
		let g = graph![(1, 2, 10, 1000.0, ARTERIAL)];
		let edge = g.edge(1, 2).unwrap();
		// 1 km at 50 km/h
		assert_eq!(edge.travel_time(), n64(1000.0) / n64(50e3));
		assert_eq!(edge.weight(WeightType::TravelTime), edge.travel_time());
		assert_eq!(edge.weight(WeightType::Distance), n64(1000.0));
	}

	#[test]
	fn test_shortest_path_simple() {
		// S1: 4 junctions, shortest 1→3 goes through 2
		let g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 3, 11, 1.0, ARTERIAL),
			(2, 4, 12, 5.0, ARTERIAL),
		];
		let (path, cost) = g.find_shortest_path(1, 3, WeightType::Distance).unwrap().unwrap();
		assert_eq!(path, vec![1, 2, 3]);
		assert_eq!(cost, n64(2.0));
	}

	#[test]
	fn test_shortest_path_contract() {
		let g = graph![(1, 2, 10, 1.0, ARTERIAL)];
		assert_eq!(g.find_shortest_path(1, 1, WeightType::Distance), Ok(Some((vec![1], n64(0.0)))));
		// unreachable against the direction of traffic
		assert_eq!(g.find_shortest_path(2, 1, WeightType::Distance), Ok(None));
		assert_eq!(
			g.find_shortest_path(1, 9, WeightType::Distance),
			Err(GraphError::UnknownJunction(9))
		);
	}

	#[test]
	fn test_shortest_path_tie_break() {
		// S6: 2 cost-4 paths to 4; the first-enqueued branch wins
		let g = graph![
			(1, 2, 10, 3.0, ARTERIAL),
			(1, 3, 11, 3.0, ARTERIAL),
			(2, 4, 12, 1.0, ARTERIAL),
			(3, 4, 13, 1.0, ARTERIAL),
		];
		let (path, cost) = g.find_shortest_path(1, 4, WeightType::Distance).unwrap().unwrap();
		assert_eq!(cost, n64(4.0));
		assert_eq!(path, vec![1, 2, 4]);
	}

	#[test]
	fn test_shortest_path_scale_invariance() {
		let small = graph![
			(1, 2, 10, 3.0, ARTERIAL),
			(2, 4, 12, 1.0, ARTERIAL),
			(1, 4, 13, 5.0, ARTERIAL),
		];
		let scaled = graph![
			(1, 2, 10, 21.0, ARTERIAL),
			(2, 4, 12, 7.0, ARTERIAL),
			(1, 4, 13, 35.0, ARTERIAL),
		];
		let (path, cost) = small.find_shortest_path(1, 4, WeightType::Distance).unwrap().unwrap();
		let (path_scaled, cost_scaled) = scaled.find_shortest_path(1, 4, WeightType::Distance).unwrap().unwrap();
		assert_eq!(path, path_scaled);
		assert_eq!(cost_scaled, cost * n64(7.0));
	}

	#[test]
	fn test_prune_without_prunable_roads_is_noop() {
		// S2: nothing lies in the pruned classes
		let mut g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 3, 11, 1.0, ARTERIAL),
			(2, 4, 12, 5.0, ARTERIAL),
		];
		g.prune(&ids(&[1, 3]), &classes(&[LOCAL]));
		assert_eq!(g.edge_count(), 3);
		assert_eq!(g.vertex_count(), 4);
	}

	#[test]
	fn test_prune_chain() {
		// S3: low-class chain around one arterial link; every pocket touches
		// at most one preserved class, so only the arterial survives
		let mut g = graph![
			(1, 2, 10, 1.0, LOCAL),
			(2, 3, 11, 1.0, ARTERIAL),
			(3, 4, 12, 1.0, LOCAL),
			(4, 5, 13, 1.0, LOCAL),
		];
		let preserved = g.preserved_classes(&ids(&[1, 5]), &classes(&[LOCAL]));
		assert_eq!(preserved, vec![ids(&[1]), ids(&[5])]);
		let prunable = g.prunable_classes(&classes(&[LOCAL]));
		assert_eq!(prunable, vec![ids(&[1, 2]), ids(&[3, 4, 5])]);
		g.prune(&ids(&[1, 5]), &classes(&[LOCAL]));
		assert_eq!(edge_keys(&g), vec![(2, 3)].into_iter().collect());
	}

	#[test]
	fn test_prune_directed_triangle() {
		// S4: a directed cycle is not retained-strong once one link is
		// prunable, so the prunable link goes
		let mut g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 3, 11, 1.0, LOCAL),
			(3, 1, 12, 1.0, ARTERIAL),
		];
		let preserved = g.preserved_classes(&ids(&[]), &classes(&[LOCAL]));
		assert_eq!(preserved, vec![ids(&[1])]);
		g.prune(&ids(&[]), &classes(&[LOCAL]));
		assert_eq!(edge_keys(&g), vec![(1, 2), (3, 1)].into_iter().collect());
	}

	#[test]
	fn test_prune_keeps_bridging_pocket() {
		// a local pocket joining 2 preserved classes is all that connects
		// them, so it must survive
		let mut g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 1, 11, 1.0, ARTERIAL),
			(3, 4, 12, 1.0, ARTERIAL),
			(4, 3, 13, 1.0, ARTERIAL),
			(2, 3, 14, 1.0, LOCAL),
			(3, 2, 15, 1.0, LOCAL),
		];
		let preserved = g.preserved_classes(&ids(&[]), &classes(&[LOCAL]));
		assert_eq!(preserved, vec![ids(&[1, 2]), ids(&[3, 4])]);
		g.prune(&ids(&[]), &classes(&[LOCAL]));
		assert_eq!(g.edge_count(), 6);
	}

	#[test]
	fn test_prune_removes_dead_end_pocket() {
		let mut g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 1, 11, 1.0, ARTERIAL),
			(2, 5, 14, 1.0, LOCAL),
			(5, 2, 15, 1.0, LOCAL),
		];
		g.prune(&ids(&[]), &classes(&[LOCAL]));
		// only the all-local pocket went; the arterial pair is untouchable
		assert_eq!(edge_keys(&g), vec![(1, 2), (2, 1)].into_iter().collect());
	}

	#[test]
	fn test_prune_spares_mixed_roads() {
		// a road with any segment outside the pruned classes is never removed
		let mut g = graph![(1, 2, 10, 1.0, ARTERIAL), (2, 1, 11, 1.0, ARTERIAL)];
		g.add_vertex(5, (5.0, 0.0), "");
		g.add_edge_with_segments(
			2,
			5,
			Some(14).into_iter().collect(),
			n64(2.0),
			WeightType::Distance,
			vec![seg(14, 1.0, LOCAL, 50), seg(14, 1.0, ARTERIAL, 50)],
		)
		.unwrap();
		g.prune(&ids(&[]), &classes(&[LOCAL]));
		assert!(g.contains_edge(2, 5));
	}

	#[test]
	fn test_simplify_chain_to_single_road() {
		// S5: an unprotected linear chain folds into one road
		let mut g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 3, 11, 2.0, ARTERIAL),
			(3, 4, 12, 3.0, ARTERIAL),
			(4, 5, 13, 4.0, ARTERIAL),
		];
		g.remove_redundant_vertices(WeightType::Distance, &ids(&[1, 5]));
		assert_eq!(g.vertex_count(), 2);
		assert_eq!(edge_keys(&g), vec![(1, 5)].into_iter().collect());
		let edge = g.edge(1, 5).unwrap();
		assert_eq!(edge.distance(), n64(10.0));
		assert_eq!(edge.travel_time(), n64(10.0) / n64(50e3));
		assert_eq!(edge.ogf_ids, vec![10, 11, 12, 13].into_iter().collect());
		assert_eq!(edge.segments().len(), 4);
	}

	#[test]
	fn test_simplify_drops_isolated_vertices() {
		let mut g = graph![(1, 2, 10, 1.0, ARTERIAL)];
		g.add_vertex(9, (9.0, 0.0), "");
		g.remove_redundant_vertices(WeightType::Distance, &ids(&[]));
		assert!(!g.contains_vertex(9));
		// 1 and 2 are 0/1 and 1/0, neither matches a contraction pattern
		assert_eq!(g.vertex_count(), 2);
		assert_eq!(g.edge_count(), 1);
	}

	#[test]
	fn test_simplify_mirrored_twin() {
		// bidirectional chain 1 ↔ 2 ↔ 3: junction 2 is a 2-in/2-out twin
		let mut g = graph![
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 1, 11, 1.0, ARTERIAL),
			(2, 3, 12, 2.0, ARTERIAL),
			(3, 2, 13, 2.0, ARTERIAL),
		];
		g.remove_redundant_vertices(WeightType::Distance, &ids(&[1, 3]));
		assert_eq!(g.vertex_count(), 2);
		assert_eq!(edge_keys(&g), vec![(1, 3), (3, 1)].into_iter().collect());
		let forward = g.edge(1, 3).unwrap();
		assert_eq!(forward.distance(), n64(3.0));
		assert_eq!(forward.ogf_ids, vec![10, 12].into_iter().collect());
		let backward = g.edge(3, 1).unwrap();
		assert_eq!(backward.distance(), n64(3.0));
		assert_eq!(backward.ogf_ids, vec![13, 11].into_iter().collect());
		// adjacency reflects the contraction
		assert_eq!(g.vertex(1).unwrap().downstream().collect::<Vec<_>>(), vec![3]);
		assert_eq!(g.vertex(1).unwrap().upstream().collect::<Vec<_>>(), vec![3]);
	}

	#[test]
	fn test_simplify_keeps_lighter_direct_road() {
		// the direct 1→3 is lighter than the 2-hop sum: it stays, but the
		// through junction and its roads go regardless
		let mut g = graph![
			(1, 3, 9, 1.0, ARTERIAL),
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 3, 11, 2.0, ARTERIAL),
		];
		g.remove_redundant_vertices(WeightType::Distance, &ids(&[1, 3]));
		assert!(!g.contains_vertex(2));
		assert_eq!(edge_keys(&g), vec![(1, 3)].into_iter().collect());
		let edge = g.edge(1, 3).unwrap();
		assert_eq!(edge.distance(), n64(1.0));
		assert_eq!(edge.ogf_ids, Some(9).into_iter().collect());
	}

	#[test]
	fn test_simplify_replaces_heavier_direct_road() {
		let mut g = graph![
			(1, 3, 9, 9.0, ARTERIAL),
			(1, 2, 10, 1.0, ARTERIAL),
			(2, 3, 11, 2.0, ARTERIAL),
		];
		g.remove_redundant_vertices(WeightType::Distance, &ids(&[1, 3]));
		assert!(!g.contains_vertex(2));
		let edge = g.edge(1, 3).unwrap();
		assert_eq!(edge.distance(), n64(3.0));
		assert_eq!(edge.ogf_ids, vec![10, 11].into_iter().collect());
		assert_eq!(edge.segments().len(), 2);
	}

	#[test]
	fn test_simplify_respects_protected_ids() {
		let mut g = graph![(1, 2, 10, 1.0, ARTERIAL), (2, 3, 11, 1.0, ARTERIAL)];
		g.remove_redundant_vertices(WeightType::Distance, &ids(&[1, 2, 3]));
		assert_eq!(g.vertex_count(), 3);
		assert_eq!(g.edge_count(), 2);
	}

	#[test]
	fn test_weight_type_strings() {
		assert_eq!("distance".parse(), Ok(WeightType::Distance));
		assert_eq!("travel_time".parse(), Ok(WeightType::TravelTime));
		assert_eq!(WeightType::TravelTime.to_string(), "travel_time");
		assert!("speed".parse::<WeightType>().is_err());
	}
}
