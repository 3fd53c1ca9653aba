//! # _fold 'em & route 'em_
//!
//! Universal CLI for folding regional road-network extracts into compact
//! routable graphs, as well as planning point-to-point routes over them.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{crate_version, App, Arg, SubCommand};

mod gj;
mod graph;
mod meta;
mod queue;
mod store;

pub use noisy_float::prelude::{n64, Float, N64};

use graph::{Graph, WeightType};

/// Junction identifier, as carried by the source data
pub type JuncId = i64;
/// Road element identifier, as carried by the source data
pub type OgfId = i64;

fn main() -> io::Result<()> {
	env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));
	let inputs = |cmd: App<'static, 'static>| {
		cmd.arg(
			Arg::with_name("road-elements")
				.takes_value(true)
				.required(true)
				.index(1)
				.help("Road elements GeoJSON"),
		)
		.arg(
			Arg::with_name("road-segments")
				.takes_value(true)
				.required(true)
				.index(2)
				.help("Road segments GeoJSON"),
		)
		.arg(
			Arg::with_name("meta")
				.takes_value(true)
				.required(true)
				.index(3)
				.help("Run parameters YAML (destinations & pruned classes)"),
		)
		.arg(
			Arg::with_name("cache-dir")
				.short("c")
				.takes_value(true)
				.default_value(".")
				.help("Directory holding the pruned-graph cache"),
		)
		.arg(
			Arg::with_name("prefix")
				.short("o")
				.takes_value(true)
				.default_value("route")
				.help(r#"Output files prefix - the generated files will be named alike "{prefix}.{...}.geojson""#),
		)
	};
	let matches = App::new("Road Route Planner")
		.version(crate_version!())
		.about("Make 'em routable!")
		.subcommand(inputs(
			SubCommand::with_name("plan").about("Interactively plan point-to-point routes"),
		))
		.subcommand(
			inputs(SubCommand::with_name("export").about("Export the pruned graph and destinations as GeoJSONs")).arg(
				Arg::with_name("weight-type")
					.takes_value(true)
					.required(true)
					.index(4)
					.help("Weight to minimize: distance|travel_time"),
			),
		)
		.get_matches();
	if let Some(matches) = matches.subcommand_matches("plan") {
		let params: meta::Parameters = serde_yaml::from_reader(File::open(matches.value_of("meta").unwrap())?)
			.expect("Run parameters invalid YAML");
		let weight_type = match prompt_weight_type()? {
			Some(weight_type) => weight_type,
			None => return Ok(()),
		};
		let road_graph = load_or_build(matches, &params, weight_type)?;
		let prefix = matches.value_of("prefix").unwrap();
		let destinations = gj::destinations_to_geojson(&road_graph, params.destinations.keys().copied());
		serde_json::to_writer(&File::create(format!("{}.destinations.geojson", prefix))?, &destinations).unwrap();
		log::info!("Available destinations written to {}.destinations.geojson", prefix);
		let mut count = 0usize;
		loop {
			let word = prompt("Enter 'q' to quit. Press enter to proceed to route planning: ")?;
			if word == "q" {
				break;
			}
			let start_id: JuncId = match prompt("Enter the id of the starting point: ")?.parse() {
				Ok(junc_id) => junc_id,
				Err(_) => {
					println!("Invalid input.");
					continue;
				}
			};
			let end_id: JuncId = match prompt("Enter the id of the destination point: ")?.parse() {
				Ok(junc_id) => junc_id,
				Err(_) => {
					println!("Invalid input.");
					continue;
				}
			};
			if !road_graph.contains_vertex(start_id) || !road_graph.contains_vertex(end_id) {
				println!("Invalid input.");
				continue;
			}
			count += 1;
			log::info!("Begin planning route.");
			let res = road_graph.find_shortest_path(start_id, end_id, weight_type).unwrap();
			log::info!("Finished planning route.");
			match res {
				None => println!("No route exists."),
				Some((path, cost)) => {
					let out = format!("{}.{}.geojson", prefix, count);
					serde_json::to_writer(&File::create(&out)?, &gj::route_to_geojson(&road_graph, &path)).unwrap();
					match weight_type {
						WeightType::Distance => println!(
							"The distance from the starting point to the destination is {:.3}km.",
							cost.raw() / 1e3
						),
						WeightType::TravelTime => println!("The expected travel time is {:.3} hours.", cost.raw()),
					}
					println!("The route is written to {}.", out);
				}
			}
		}
	} else if let Some(matches) = matches.subcommand_matches("export") {
		let params: meta::Parameters = serde_yaml::from_reader(File::open(matches.value_of("meta").unwrap())?)
			.expect("Run parameters invalid YAML");
		let weight_type: WeightType = matches
			.value_of("weight-type")
			.unwrap()
			.parse()
			.expect("Invalid weight type");
		let road_graph = load_or_build(matches, &params, weight_type)?;
		let prefix = matches.value_of("prefix").unwrap();
		serde_json::to_writer(
			&File::create(format!("{}.graph.geojson", prefix))?,
			&gj::graph_to_geojson(&road_graph),
		)
		.unwrap();
		serde_json::to_writer(
			&File::create(format!("{}.destinations.geojson", prefix))?,
			&gj::destinations_to_geojson(&road_graph, params.destinations.keys().copied()),
		)
		.unwrap();
		log::info!("Exported {} roads' geometry to {}.graph.geojson", road_graph.edge_count(), prefix);
	}
	Ok(())
}

/// Loads the cached pruned graph for `weight_type` if its parameters still
/// match, otherwise rebuilds the whole pipeline from the GeoJSON sources and
/// refreshes the cache
fn load_or_build(matches: &clap::ArgMatches, params: &meta::Parameters, weight_type: WeightType) -> io::Result<Graph> {
	let cache_path = cache_path(matches.value_of("cache-dir").unwrap(), weight_type);
	if cache_path.exists() {
		log::info!("Begin loading pre-pruned graph from {}. This might take a while...", cache_path.display());
		match store::read_graph(
			BufReader::new(File::open(&cache_path)?),
			weight_type,
			&params.protected_ids(),
			&params.pruned_class_set(),
			&params.destinations,
		) {
			Ok(road_graph) => {
				log::info!(
					"Finished loading pre-pruned graph. {} vertices, {} directed edges.",
					road_graph.vertex_count(),
					road_graph.edge_count()
				);
				return Ok(road_graph);
			}
			Err(store::StoreError::Mismatch) => {
				log::warn!("Graph configuration changed. The graph needs to be constructed from scratch.")
			}
			Err(store::StoreError::Io(e)) => return Err(e),
			Err(e) => panic!("{} is unusable ({}); delete it and rerun", cache_path.display(), e),
		}
	} else {
		log::info!("No cached graph at {}. The graph needs to be constructed from scratch.", cache_path.display());
	}
	let road_elements: geojson::FeatureCollection =
		serde_json::from_reader(BufReader::new(File::open(matches.value_of("road-elements").unwrap())?))
			.expect("Road elements invalid GeoJSON");
	let road_segments: geojson::FeatureCollection =
		serde_json::from_reader(BufReader::new(File::open(matches.value_of("road-segments").unwrap())?))
			.expect("Road segments invalid GeoJSON");
	log::info!("Begin building graph. This might take a while...");
	let mut road_graph = gj::data_to_graph(&road_elements, &road_segments, weight_type);
	road_graph.add_messages(params.destinations.iter().map(|(&junc_id, message)| (junc_id, message.as_str())));
	log::info!(
		"Finished building graph. {} vertices, {} directed edges. Begin pruning graph.",
		road_graph.vertex_count(),
		road_graph.edge_count()
	);
	road_graph.prune(&params.protected_ids(), &params.pruned_class_set());
	log::info!(
		"Finished pruning graph. {} vertices, {} directed edges. Begin removing redundant vertices.",
		road_graph.vertex_count(),
		road_graph.edge_count()
	);
	road_graph.remove_redundant_vertices(weight_type, &params.protected_ids());
	log::info!(
		"Finished removing redundant vertices. {} vertices, {} directed edges. Begin saving graph.",
		road_graph.vertex_count(),
		road_graph.edge_count()
	);
	let mut out = BufWriter::new(File::create(&cache_path)?);
	store::write_graph(&mut out, &road_graph, weight_type, &params.protected_list(), &params.pruned_classes)?;
	out.flush()?;
	log::info!("Finished saving graph to {}.", cache_path.display());
	Ok(road_graph)
}

fn cache_path(cache_dir: &str, weight_type: WeightType) -> PathBuf {
	Path::new(cache_dir).join(format!("{}_weighted_graph.txt", weight_type))
}

fn prompt(message: &str) -> io::Result<String> {
	print!("{}", message);
	io::stdout().flush()?;
	let mut line = String::new();
	io::stdin().read_line(&mut line)?;
	Ok(line.trim().to_string())
}

fn prompt_weight_type() -> io::Result<Option<WeightType>> {
	loop {
		let word = prompt("Press 'q' to quit. What do you want to minimize? Enter 'distance' or 'travel_time': ")?;
		if word == "q" {
			return Ok(None);
		}
		match word.parse() {
			Ok(weight_type) => return Ok(Some(weight_type)),
			Err(_) => println!("Invalid input."),
		}
	}
}
