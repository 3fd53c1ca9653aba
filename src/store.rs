//! Reading and writing the on-disk graph cache.
//!
//! Building, pruning and simplifying a regional network is expensive, so the
//! result is persisted in a line-oriented text format: a 3-line parameter
//! header, a `V` section of vertices, an `E` section of edges (each with its
//! `S` segment blocks) and a closing `END` tag. A cache is only accepted
//! when the header matches the parameters of the current run, and the
//! derived distance/travel-time fields are re-checked on load so silent
//! damage cannot produce wrong routes.

use crate::*;
use graph::{Graph, Segment, WeightType};

use std::collections::{BTreeSet, HashSet};
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use thiserror::Error;

/// Metres of drift tolerated between a stored distance and the sum of its
/// segment lengths (the build phase takes distance from the road element,
/// which rounds differently than the segmentation)
const DISTANCE_TOLERANCE: f64 = 10.0;
/// Hours of drift tolerated between a stored travel time and the one derived
/// from segments
const TRAVEL_TIME_TOLERANCE: f64 = 1e-3;

/// Ways loading a cached graph can fail
#[derive(Error, Debug)]
pub enum StoreError {
	/// The cache was written under different parameters; rebuild from source
	#[error("cached graph parameters differ from the requested ones")]
	Mismatch,
	/// The cache is structurally damaged; rebuilding is not enough, the file
	/// needs to go
	#[error("corrupt graph cache: {0}")]
	Corrupt(String),
	#[error(transparent)]
	Io(#[from] io::Error),
}

fn corrupt(what: impl AsRef<str>) -> StoreError {
	StoreError::Corrupt(what.as_ref().to_string())
}

/// Writes the graph in the canonical cache format.
///
/// Arguments:
/// - `protected_ids`: recorded in the header, in the given order
/// - `pruned_classes`: recorded in the header, `|`-separated
pub fn write_graph<W: Write>(
	mut out: W,
	graph: &Graph,
	weight_type: WeightType,
	protected_ids: &[JuncId],
	pruned_classes: &IndexSet<String>,
) -> io::Result<()> {
	writeln!(out, "{}", weight_type)?;
	writeln!(out, "{}", protected_ids.iter().join(" "))?;
	writeln!(out, "{}", pruned_classes.iter().join("|"))?;
	writeln!(out, "V {}", graph.vertex_count())?;
	for vertex in graph.vertices() {
		writeln!(out, "{}", vertex.junc_id)?;
		writeln!(out, "{} {}", vertex.coordinates.0, vertex.coordinates.1)?;
	}
	writeln!(out, "E {}", graph.edge_count())?;
	for edge in graph.edges() {
		writeln!(out, "e {} {}", edge.start_id, edge.end_id)?;
		writeln!(out, "{}", edge.ogf_ids.iter().join(" "))?;
		writeln!(out, "d {}", edge.distance())?;
		writeln!(out, "t {}", edge.travel_time())?;
		for segment in edge.segments() {
			writeln!(out, "S {}", segment.ogf_id)?;
			writeln!(out, "{}", segment.length)?;
			writeln!(out, "{}", segment.road_class)?;
			writeln!(out, "{}", segment.speed_limit)?;
			writeln!(out, "{}", segment.coordinates.iter().map(|(lat, lon)| format!("{},{}", lat, lon)).join(" "))?;
			writeln!(out, "{}", segment.name)?;
		}
	}
	writeln!(out, "END")?;
	Ok(())
}

/// Sequential line reader with 1 line of lookahead, for the count-less `S`
/// blocks
struct Cursor<R: BufRead> {
	lines: io::Lines<R>,
	peeked: Option<String>,
}

impl<R: BufRead> Cursor<R> {
	fn new(input: R) -> Self {
		Cursor {
			lines: input.lines(),
			peeked: None,
		}
	}
	fn next(&mut self) -> Result<String, StoreError> {
		if let Some(line) = self.peeked.take() {
			return Ok(line);
		}
		match self.lines.next() {
			Some(line) => Ok(line?),
			None => Err(corrupt("unexpected end of file")),
		}
	}
	fn peek(&mut self) -> Result<Option<&str>, StoreError> {
		if self.peeked.is_none() {
			match self.lines.next() {
				Some(line) => self.peeked = Some(line?),
				None => return Ok(None),
			}
		}
		Ok(self.peeked.as_deref())
	}
}

fn parse_num<T: FromStr>(token: &str, what: &str) -> Result<T, StoreError> {
	token.trim().parse().map_err(|_| corrupt(format!("malformed {}: {:?}", what, token)))
}

fn section_count(line: &str, tag: &str) -> Result<usize, StoreError> {
	let mut tokens = line.split_whitespace();
	if tokens.next() != Some(tag) {
		return Err(corrupt(format!("expected {} section, got {:?}", tag, line)));
	}
	let count = tokens.next().ok_or_else(|| corrupt(format!("missing {} section count", tag)))?;
	parse_num(count, "section count")
}

fn tagged_value(line: &str, tag: &str) -> Result<f64, StoreError> {
	let mut tokens = line.split_whitespace();
	if tokens.next() != Some(tag) {
		return Err(corrupt(format!("expected {} line, got {:?}", tag, line)));
	}
	let value = tokens.next().ok_or_else(|| corrupt(format!("missing {} value", tag)))?;
	parse_num(value, "edge attribute")
}

/// Reads a graph previously written by [`write_graph`].
///
/// The header must carry exactly the requested weight type, protected ids
/// and pruned classes, otherwise [`StoreError::Mismatch`] is returned and
/// the caller is expected to rebuild from source. Vertex popup messages are
/// not part of the format; `messages` re-attaches them.
pub fn read_graph<R: BufRead>(
	input: R,
	weight_type: WeightType,
	protected_ids: &HashSet<JuncId>,
	pruned_classes: &HashSet<String>,
	messages: &IndexMap<JuncId, String>,
) -> Result<Graph, StoreError> {
	let mut cur = Cursor::new(input);
	let header_weight: WeightType = {
		let line = cur.next()?;
		line.trim().parse().map_err(|_| corrupt(format!("unknown weight type {:?}", line)))?
	};
	if header_weight != weight_type {
		return Err(StoreError::Mismatch);
	}
	let header_protected: HashSet<JuncId> = cur
		.next()?
		.split_whitespace()
		.map(|t| parse_num(t, "protected id"))
		.collect::<Result<_, _>>()?;
	if &header_protected != protected_ids {
		return Err(StoreError::Mismatch);
	}
	let header_classes: HashSet<String> = cur
		.next()?
		.split('|')
		.filter(|s| !s.is_empty())
		.map(str::to_string)
		.collect();
	if &header_classes != pruned_classes {
		return Err(StoreError::Mismatch);
	}
	let mut graph = Graph::new();
	let vertex_count = section_count(&cur.next()?, "V")?;
	for _ in 0..vertex_count {
		let junc_id: JuncId = parse_num(&cur.next()?, "junction id")?;
		let line = cur.next()?;
		let mut tokens = line.split_whitespace();
		let lat: f64 = parse_num(tokens.next().unwrap_or(""), "junction latitude")?;
		let lon: f64 = parse_num(tokens.next().unwrap_or(""), "junction longitude")?;
		let message = messages.get(&junc_id).map(String::as_str).unwrap_or("");
		graph.add_vertex(junc_id, (lat, lon), message);
	}
	let edge_count = section_count(&cur.next()?, "E")?;
	for _ in 0..edge_count {
		let line = cur.next()?;
		let mut tokens = line.split_whitespace();
		if tokens.next() != Some("e") {
			return Err(corrupt(format!("expected edge tag, got {:?}", line)));
		}
		let start_id: JuncId = parse_num(tokens.next().unwrap_or(""), "edge start")?;
		let end_id: JuncId = parse_num(tokens.next().unwrap_or(""), "edge end")?;
		let ogf_ids: BTreeSet<OgfId> = cur
			.next()?
			.split_whitespace()
			.map(|t| parse_num(t, "road element id"))
			.collect::<Result<_, _>>()?;
		let distance = tagged_value(&cur.next()?, "d")?;
		let travel_time = tagged_value(&cur.next()?, "t")?;
		let mut segments = Vec::new();
		loop {
			match cur.peek()? {
				Some(line) if line.starts_with("S ") => {}
				_ => break,
			}
			let ogf_id: OgfId = parse_num(&cur.next()?[2..], "segment road element id")?;
			if !ogf_ids.contains(&ogf_id) {
				return Err(corrupt(format!(
					"segment element {} does not belong to edge {} {}",
					ogf_id, start_id, end_id
				)));
			}
			let length: f64 = parse_num(&cur.next()?, "segment length")?;
			let road_class = cur.next()?.trim().to_string();
			let speed_limit: u32 = parse_num(&cur.next()?, "segment speed limit")?;
			let coordinates: Vec<(f64, f64)> = cur
				.next()?
				.split_whitespace()
				.map(|pair| {
					let mut halves = pair.splitn(2, ',');
					let lat: f64 = parse_num(halves.next().unwrap_or(""), "segment coordinate")?;
					let lon: f64 = parse_num(halves.next().unwrap_or(""), "segment coordinate")?;
					Ok((lat, lon))
				})
				.collect::<Result<_, StoreError>>()?;
			let name = cur.next()?;
			segments.push(Segment {
				ogf_id,
				name,
				length: n64(length),
				road_class,
				speed_limit,
				coordinates,
			});
		}
		let derived_distance: f64 = segments.iter().map(|s| s.length.raw()).sum();
		if (distance - derived_distance).abs() > DISTANCE_TOLERANCE {
			return Err(corrupt(format!(
				"edge {} {} distance {} does not match its segments' total {}",
				start_id, end_id, distance, derived_distance
			)));
		}
		let derived_time: f64 = segments.iter().map(|s| s.travel_time().raw()).sum();
		if (travel_time - derived_time).abs() > TRAVEL_TIME_TOLERANCE {
			return Err(corrupt(format!(
				"edge {} {} travel time {} does not match its segments' total {}",
				start_id, end_id, travel_time, derived_time
			)));
		}
		graph
			.add_edge_with_segments(start_id, end_id, ogf_ids, n64(distance), weight_type, segments)
			.map_err(|e| corrupt(e.to_string()))?;
	}
	match cur.next()?.trim() {
		"END" => Ok(graph),
		line => Err(corrupt(format!("expected END, got {:?}", line))),
	}
}
