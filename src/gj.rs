//! GeoJSON ingest and conversion functions.
//!
//! The build phase folds the two road-network feature collections (road
//! elements for connectivity, road segments for geometry and attributes)
//! into a [`Graph`]. The reverse direction renders graphs, planned routes
//! and destination markers back to GeoJSON, mainly for visualization.

use crate::*;
use graph::{Graph, Segment, WeightType};

use std::collections::BTreeSet;

use geojson::{Feature, FeatureCollection, Geometry, Value};
use indexmap::IndexMap;
use serde_json::json;

/// Segments of this element type are not traversable roads
const VIRTUAL_ROAD: &str = "VIRTUAL ROAD";
/// The one element type allowed to miss a speed limit
const FERRY_CONNECTION: &str = "FERRY CONNECTION";
/// Assumed ferry speed where the data carries none, km/h
const FERRY_SPEED_LIMIT: u32 = 34;

fn prop_i64(feature: &Feature, key: &str) -> Option<i64> {
	feature.property(key).and_then(|v| v.as_i64())
}

fn prop_f64(feature: &Feature, key: &str) -> Option<f64> {
	feature.property(key).and_then(|v| v.as_f64())
}

fn prop_str<'a>(feature: &'a Feature, key: &str) -> Option<&'a str> {
	feature.property(key).and_then(|v| v.as_str())
}

/// Extracts a feature's LineString geometry as `[lat, lon]` pairs (GeoJSON
/// itself carries `[lon, lat]`)
fn line_coordinates(feature: &Feature) -> Option<Vec<(f64, f64)>> {
	match feature.geometry.as_ref()?.value {
		Value::LineString(ref points) => points
			.iter()
			.map(|p| if p.len() == 2 { Some((p[1], p[0])) } else { None })
			.collect(),
		_ => None,
	}
}

/// Folds the road element and road segment collections into a graph.
///
/// Segments are grouped by their parent element first; an element with no
/// surviving segments, a self-loop, or malformed geometry yields no edge.
/// Directions fan out per `DIRECTION_OF_TRAFFIC_FLOW`, and where 2 elements
/// connect the same junction pair the one lighter under `weight_type` wins.
pub fn data_to_graph(road_elements: &FeatureCollection, road_segments: &FeatureCollection, weight_type: WeightType) -> Graph {
	let mut element_segments: IndexMap<OgfId, Vec<Segment>> = IndexMap::new();
	for feature in &road_segments.features {
		let element_type = prop_str(feature, "ROAD_ELEMENT_TYPE").unwrap_or("");
		if element_type == VIRTUAL_ROAD {
			continue;
		}
		let ogf_id = match prop_i64(feature, "ROAD_NET_ELEMENT_ID") {
			Some(id) => id,
			None => continue,
		};
		let speed_limit = match (prop_i64(feature, "SPEED_LIMIT"), element_type) {
			(Some(limit), _) if limit > 0 => limit as u32,
			(None, FERRY_CONNECTION) => FERRY_SPEED_LIMIT,
			_ => {
				log::debug!("discarding segment of element {} without a speed limit", ogf_id);
				continue;
			}
		};
		let coordinates = match line_coordinates(feature) {
			Some(cs) if cs.len() >= 2 => cs,
			_ => {
				log::debug!("discarding segment of element {} with malformed geometry", ogf_id);
				continue;
			}
		};
		let length = match prop_f64(feature, "LENGTH") {
			Some(l) if l > 0.0 => n64(l),
			_ => continue,
		};
		element_segments.entry(ogf_id).or_default().push(Segment {
			ogf_id,
			name: prop_str(feature, "FULL_STREET_NAME").unwrap_or("").to_string(),
			length,
			road_class: prop_str(feature, "ROAD_CLASS").unwrap_or("").to_string(),
			speed_limit,
			coordinates,
		});
	}
	log::debug!("Collected segments for {} road elements", element_segments.len());
	let mut graph = Graph::new();
	for feature in &road_elements.features {
		let (ogf_id, from_id, to_id) = match (
			prop_i64(feature, "OGF_ID"),
			prop_i64(feature, "FROM_JUNCTION_ID"),
			prop_i64(feature, "TO_JUNCTION_ID"),
		) {
			(Some(ogf_id), Some(from_id), Some(to_id)) => (ogf_id, from_id, to_id),
			_ => continue,
		};
		let segments = match element_segments.get(&ogf_id) {
			Some(segments) => segments,
			None => continue,
		};
		if from_id == to_id {
			log::debug!("discarding self-loop element {}", ogf_id);
			continue;
		}
		let coordinates = match line_coordinates(feature) {
			Some(cs) if cs.len() >= 2 => cs,
			_ => {
				log::debug!("discarding element {} with malformed geometry", ogf_id);
				continue;
			}
		};
		let length = match prop_f64(feature, "LENGTH") {
			Some(l) => n64(l),
			None => continue,
		};
		let direction = prop_str(feature, "DIRECTION_OF_TRAFFIC_FLOW").unwrap_or("Both");
		graph.add_vertex(from_id, coordinates[0], "");
		graph.add_vertex(to_id, *coordinates.last().unwrap(), "");
		let ogf_ids: BTreeSet<OgfId> = Some(ogf_id).into_iter().collect();
		if direction == "Both" || direction == "Positive" {
			graph
				.add_edge_with_segments(from_id, to_id, ogf_ids.clone(), length, weight_type, segments.clone())
				.unwrap();
		}
		if direction == "Both" || direction == "Negative" {
			graph
				.add_edge_with_segments(to_id, from_id, ogf_ids, length, weight_type, segments.clone())
				.unwrap();
		}
	}
	graph
}

fn segment_to_feature(segment: &Segment) -> Feature {
	Feature {
		geometry: Some(Geometry::new(Value::LineString(
			segment.coordinates.iter().map(|&(lat, lon)| vec![lon, lat]).collect(),
		))),
		properties: Some(
			vec![
				("name".to_string(), json!(segment.name)),
				("length_m".to_string(), json!(segment.length.raw())),
				("road_class".to_string(), json!(segment.road_class)),
				("speed_limit".to_string(), json!(segment.speed_limit)),
			]
			.into_iter()
			.collect(),
		),
		bbox: None,
		foreign_members: None,
		id: None,
	}
}

/// Renders destination junctions as point markers with their popup texts
pub fn destinations_to_geojson(graph: &Graph, destinations: impl IntoIterator<Item = JuncId>) -> FeatureCollection {
	FeatureCollection {
		features: destinations
			.into_iter()
			.filter_map(|junc_id| graph.vertex(junc_id))
			.map(|vertex| {
				let (lat, lon) = vertex.coordinates;
				Feature {
					geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
					properties: Some(
						vec![
							("id".to_string(), json!(vertex.junc_id)),
							("message".to_string(), json!(vertex.message)),
						]
						.into_iter()
						.collect(),
					),
					bbox: None,
					foreign_members: None,
					id: None,
				}
			})
			.collect(),
		bbox: None,
		foreign_members: None,
	}
}

/// Renders a planned route as one line feature per traversed road segment
pub fn route_to_geojson(graph: &Graph, route: &[JuncId]) -> FeatureCollection {
	let mut features = Vec::new();
	for pair in route.windows(2) {
		if let Some(edge) = graph.edge(pair[0], pair[1]) {
			features.extend(edge.segments().iter().map(segment_to_feature));
		}
	}
	FeatureCollection {
		features,
		bbox: None,
		foreign_members: None,
	}
}

/// Renders every road segment of the graph, for whole-network visualization
pub fn graph_to_geojson(graph: &Graph) -> FeatureCollection {
	FeatureCollection {
		features: graph
			.edges()
			.flat_map(|e| e.segments().iter().map(segment_to_feature))
			.collect(),
		bbox: None,
		foreign_members: None,
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn collection(features: Vec<serde_json::Value>) -> FeatureCollection {
		serde_json::from_value(json!({
			"type": "FeatureCollection",
			"features": features,
		}))
		.unwrap()
	}

	fn element(ogf_id: i64, from_id: i64, to_id: i64, direction: &str, length: f64) -> serde_json::Value {
		json!({
			"type": "Feature",
			"geometry": {
				"type": "LineString",
				"coordinates": [[-79.0, 43.0], [-79.1, 43.1]],
			},
			"properties": {
				"OGF_ID": ogf_id,
				"FROM_JUNCTION_ID": from_id,
				"TO_JUNCTION_ID": to_id,
				"DIRECTION_OF_TRAFFIC_FLOW": direction,
				"LENGTH": length,
			},
		})
	}

	fn segment(ogf_id: i64, element_type: &str, speed_limit: Option<u32>, road_class: &str, length: f64) -> serde_json::Value {
		json!({
			"type": "Feature",
			"geometry": {
				"type": "LineString",
				"coordinates": [[-79.0, 43.0], [-79.05, 43.05], [-79.1, 43.1]],
			},
			"properties": {
				"ROAD_NET_ELEMENT_ID": ogf_id,
				"ROAD_ELEMENT_TYPE": element_type,
				"FULL_STREET_NAME": "Yonge Street",
				"ROAD_CLASS": road_class,
				"SPEED_LIMIT": speed_limit,
				"LENGTH": length,
			},
		})
	}

	#[test]
	fn test_build_fans_out_directions() {
		let elements = collection(vec![
			element(10, 1, 2, "Both", 100.0),
			element(11, 2, 3, "Positive", 50.0),
			element(12, 3, 4, "Negative", 25.0),
		]);
		let segments = collection(vec![
			segment(10, "ROAD ELEMENT", Some(60), "Arterial", 100.0),
			segment(11, "ROAD ELEMENT", Some(60), "Arterial", 50.0),
			segment(12, "ROAD ELEMENT", Some(60), "Arterial", 25.0),
		]);
		let g = data_to_graph(&elements, &segments, WeightType::Distance);
		assert_eq!(g.vertex_count(), 4);
		assert_eq!(g.edge_count(), 4);
		assert!(g.contains_edge(1, 2) && g.contains_edge(2, 1));
		assert!(g.contains_edge(2, 3) && !g.contains_edge(3, 2));
		assert!(g.contains_edge(4, 3) && !g.contains_edge(3, 4));
		// geometry arrives [lon, lat] and is stored [lat, lon]
		assert_eq!(g.vertex_coordinates(1), Ok((43.0, -79.0)));
		assert_eq!(g.vertex_coordinates(2), Ok((43.1, -79.1)));
		let edge = g.edge(1, 2).unwrap();
		assert_eq!(edge.distance(), n64(100.0));
		assert_eq!(edge.segments().len(), 1);
		assert_eq!(edge.segments()[0].name, "Yonge Street");
		assert_eq!(edge.segments()[0].coordinates[0], (43.0, -79.0));
	}

	#[test]
	fn test_build_discards_unusable_features() {
		let elements = collection(vec![
			// self-loop
			element(10, 1, 1, "Both", 100.0),
			// only a virtual segment: no surviving segments
			element(11, 1, 2, "Both", 100.0),
			// no segment features at all
			element(12, 2, 3, "Both", 100.0),
			element(13, 3, 4, "Both", 100.0),
		]);
		let segments = collection(vec![
			segment(10, "ROAD ELEMENT", Some(60), "Arterial", 100.0),
			segment(11, VIRTUAL_ROAD, Some(60), "Arterial", 100.0),
			// missing speed limit on an ordinary road
			segment(13, "ROAD ELEMENT", None, "Arterial", 100.0),
		]);
		let g = data_to_graph(&elements, &segments, WeightType::Distance);
		assert_eq!(g.edge_count(), 0);
	}

	#[test]
	fn test_build_defaults_ferry_speed() {
		let elements = collection(vec![element(10, 1, 2, "Positive", 500.0)]);
		let segments = collection(vec![segment(10, FERRY_CONNECTION, None, "Ferry", 500.0)]);
		let g = data_to_graph(&elements, &segments, WeightType::Distance);
		let edge = g.edge(1, 2).unwrap();
		assert_eq!(edge.segments()[0].speed_limit, FERRY_SPEED_LIMIT);
		assert_eq!(edge.travel_time(), n64(500.0) / n64(34e3));
	}

	#[test]
	fn test_build_keeps_lighter_parallel_element() {
		let elements = collection(vec![
			element(10, 1, 2, "Positive", 100.0),
			element(11, 1, 2, "Positive", 60.0),
		]);
		let segments = collection(vec![
			segment(10, "ROAD ELEMENT", Some(60), "Arterial", 100.0),
			segment(11, "ROAD ELEMENT", Some(60), "Arterial", 60.0),
		]);
		let g = data_to_graph(&elements, &segments, WeightType::Distance);
		assert_eq!(g.edge_count(), 1);
		assert_eq!(g.get_weight(1, 2, WeightType::Distance), Ok(n64(60.0)));
		assert!(g.edge(1, 2).unwrap().ogf_ids.contains(&11));
	}

	#[test]
	fn test_route_round_trips_coordinates() {
		let elements = collection(vec![element(10, 1, 2, "Both", 100.0)]);
		let segments = collection(vec![segment(10, "ROAD ELEMENT", Some(60), "Arterial", 100.0)]);
		let g = data_to_graph(&elements, &segments, WeightType::Distance);
		let fc = route_to_geojson(&g, &[1, 2]);
		assert_eq!(fc.features.len(), 1);
		let feature = &fc.features[0];
		assert_eq!(feature.property("road_class").and_then(|v| v.as_str()), Some("Arterial"));
		// emitted back in GeoJSON's [lon, lat]
		match feature.geometry.as_ref().unwrap().value {
			Value::LineString(ref points) => assert_eq!(points[0], vec![-79.0, 43.0]),
			_ => panic!("expected a LineString"),
		}
		let markers = destinations_to_geojson(&g, vec![1, 99]);
		assert_eq!(markers.features.len(), 1);
		assert_eq!(markers.features[0].property("id").and_then(|v| v.as_i64()), Some(1));
	}
}
