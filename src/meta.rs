//! Run configuration for the route planner.

use crate::*;
use serde::*;

use std::collections::HashSet;

use indexmap::{IndexMap, IndexSet};

/// Parameters of a planning run.
///
/// The destination table doubles as the protected-id set (its keys) and as
/// the popup texts of the rendered markers (its values); order matters only
/// for reproducible header serialization.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Parameters {
	/// Points of interest that must keep a bidirectional connection into the
	/// retained network, id → popup text
	pub destinations: IndexMap<JuncId, String>,
	/// Road classes eligible for removal
	pub pruned_classes: IndexSet<String>,
}

impl Parameters {
	/// Destination ids, in configuration order
	pub fn protected_list(&self) -> Vec<JuncId> {
		self.destinations.keys().copied().collect()
	}
	/// Destination ids, as a set
	pub fn protected_ids(&self) -> HashSet<JuncId> {
		self.destinations.keys().copied().collect()
	}
	/// Pruned classes, as a set
	pub fn pruned_class_set(&self) -> HashSet<String> {
		self.pruned_classes.iter().cloned().collect()
	}
}
