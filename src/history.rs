//! Declarative per-image usage timelines, and the tracker that threads an
//! image's current usage from one pass to the next.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::usage::ImageUsage;

/// A step index within a pass: one subpass of a graphics pass, or one
/// dispatch group of a compute pass.
///
/// Real steps are `0..num_steps`. The two virtual boundary steps `-1` and
/// `num_steps` represent "before the pass" and "after the pass"; they are
/// reserved for internal bookkeeping and must never be declared directly.
pub type Step = i32;

pub(crate) const VIRTUAL_INITIAL_STEP: Step = -1;

/// The complete timeline of one image's usages across one pass: the usage it
/// arrives in, its usage at each step where it is touched, and optionally
/// the usage it must be left in.
///
/// An image has at most one usage per step. A history is built up by pass
/// configuration code and then handed to a pass, which validates it and
/// treats it as read-only from then on.
pub struct UsageHistory {
	image_name: String,
	/// Ordered so the previous declared usage relative to any step is a
	/// single range lookup. Holds only real steps until the history is
	/// attached to a pass, which injects the boundary usages.
	usage_at_step: BTreeMap<Step, ImageUsage>,
	initial_usage: ImageUsage,
	final_usage: Option<ImageUsage>,
	/// Step count of the pass this history is attached to.
	num_steps: Option<Step>,
}

impl UsageHistory {
	/// Creates a history for the image called `image_name`, which arrives in
	/// `initial_usage` when the pass begins.
	pub fn new(image_name: impl Into<String>, initial_usage: ImageUsage) -> Self {
		Self {
			image_name: image_name.into(),
			usage_at_step: BTreeMap::new(),
			initial_usage,
			final_usage: None,
			num_steps: None,
		}
	}

	/// Declares the usage at `step`. Declaring a step twice is a
	/// configuration error.
	pub fn add_usage(mut self, step: Step, usage: ImageUsage) -> Self {
		let prev = self.usage_at_step.insert(step, usage);
		assert!(
			prev.is_none(),
			"usage already declared for image '{}' at step {step}",
			self.image_name
		);
		self
	}

	/// Declares the same usage for every step in `[step_start, step_end]`.
	pub fn add_usage_range(mut self, step_start: Step, step_end: Step, usage: ImageUsage) -> Self {
		assert!(
			step_start <= step_end,
			"invalid step range [{step_start}, {step_end}] for image '{}'",
			self.image_name
		);
		for step in step_start..=step_end {
			self = self.add_usage(step, usage);
		}
		self
	}

	/// Declares the usage the image must be left in after the pass. Optional:
	/// without it the pass does not force a trailing transition. May be
	/// called at most once.
	pub fn set_final_usage(mut self, usage: ImageUsage) -> Self {
		assert!(
			self.final_usage.is_none(),
			"final usage already declared for image '{}'",
			self.image_name
		);
		self.final_usage = Some(usage);
		self
	}

	/// All usages in timeline order: the initial usage first, then the step
	/// usages in step order, then the final usage if declared. May contain
	/// duplicates. Independent of the order usages were added in.
	pub fn all_usages(&self) -> Vec<ImageUsage> {
		let mut usages = Vec::with_capacity(1 + self.usage_at_step.len() + usize::from(self.final_usage.is_some()));
		usages.push(self.initial_usage);
		usages.extend(
			self.usage_at_step
				.range(0..)
				.filter(|&(&step, _)| Some(step) != self.num_steps)
				.map(|(_, &usage)| usage),
		);
		if let Some(usage) = self.final_usage {
			usages.push(usage);
		}
		usages
	}

	/// The usage declared at `step`, or `None` if the image was not declared
	/// at that exact step. Real steps only.
	pub fn usage_at(&self, step: Step) -> Option<ImageUsage> {
		if step < 0 || self.num_steps.is_some_and(|num| step >= num) {
			return None;
		}
		self.usage_at_step.get(&step).copied()
	}

	pub fn image_name(&self) -> &str { &self.image_name }

	pub fn initial_usage(&self) -> ImageUsage { self.initial_usage }

	pub fn final_usage(&self) -> Option<ImageUsage> { self.final_usage }

	/// The step usages and the final usage, i.e. everything the pass itself
	/// must be able to handle. The initial usage is whatever a previous pass
	/// left behind and is only ever transitioned away from.
	pub(crate) fn declared_usages(&self) -> impl Iterator<Item = ImageUsage> + '_ {
		debug_assert!(self.num_steps.is_none());
		self.usage_at_step.values().copied().chain(self.final_usage)
	}

	/// Called by a pass when the history is added to it: validates that
	/// every declared step is a real step of that pass, then stores the
	/// boundary usages at the virtual steps so that predecessor lookups work
	/// uniformly at the boundaries.
	pub(crate) fn attach(&mut self, num_steps: Step) {
		for &step in self.usage_at_step.keys() {
			assert!(
				(0..num_steps).contains(&step),
				"step {step} out of range [0, {num_steps}) for image '{}'",
				self.image_name
			);
		}
		self.usage_at_step.insert(VIRTUAL_INITIAL_STEP, self.initial_usage);
		if let Some(usage) = self.final_usage {
			self.usage_at_step.insert(num_steps, usage);
		}
		self.num_steps = Some(num_steps);
	}

	/// The full ordered timeline, boundary steps included. Only meaningful
	/// once attached.
	pub(crate) fn ordered(&self) -> &BTreeMap<Step, ImageUsage> { &self.usage_at_step }
}

/// Tracks the current usage of images shared across passes.
///
/// When one pass finishes, its last known usage of each image is written
/// here, and the next pass configures its histories from what it reads back.
/// Neither pass needs to know about the other. The tracker records state
/// only; ordering the passes against each other is the submitter's job.
///
/// Not internally synchronized: command recording is single threaded.
#[derive(Default)]
pub struct UsageTracker {
	image_usages: FxHashMap<String, ImageUsage>,
}

impl UsageTracker {
	pub fn new() -> Self { Self::default() }

	/// Starts tracking `image_name` with `usage` as its current usage.
	/// Tracking the same name twice is a configuration error.
	pub fn track_image(&mut self, image_name: impl Into<String>, usage: ImageUsage) {
		let image_name = image_name.into();
		assert!(
			!self.image_usages.contains_key(&image_name),
			"already tracking image '{image_name}'"
		);
		self.image_usages.insert(image_name, usage);
	}

	pub fn is_tracked(&self, image_name: &str) -> bool { self.image_usages.contains_key(image_name) }

	/// The current usage of `image_name`, which must be tracked.
	pub fn usage(&self, image_name: &str) -> ImageUsage {
		match self.image_usages.get(image_name) {
			Some(&usage) => usage,
			None => panic!("unrecognized image '{image_name}'"),
		}
	}

	/// Updates the current usage of `image_name`, which must be tracked.
	pub fn update_usage(&mut self, image_name: &str, usage: ImageUsage) {
		match self.image_usages.get_mut(image_name) {
			Some(current) => *current = usage,
			None => panic!("unrecognized image '{image_name}'"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::usage::AccessType;

	#[test]
	fn all_usages_are_in_timeline_order() {
		let initial = ImageUsage::sampled_in_fragment_shader();
		let write = ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly);
		let read = ImageUsage::linear_access_in_compute_shader(AccessType::ReadOnly);
		let fin = ImageUsage::transfer(AccessType::ReadOnly);

		// Added out of order on purpose.
		let history = UsageHistory::new("output", initial)
			.set_final_usage(fin)
			.add_usage(2, read)
			.add_usage(0, write)
			.add_usage(1, read);

		assert_eq!(history.all_usages(), vec![initial, write, read, read, fin]);
	}

	#[test]
	fn all_usages_without_final_usage() {
		let initial = ImageUsage::default();
		let write = ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly);
		let history = UsageHistory::new("output", initial).add_usage_range(0, 2, write);
		assert_eq!(history.all_usages(), vec![initial, write, write, write]);
		assert_eq!(history.final_usage(), None);
	}

	#[test]
	#[should_panic(expected = "already declared for image 'output' at step 1")]
	fn duplicate_step_is_rejected() {
		let usage = ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly);
		let _ = UsageHistory::new("output", ImageUsage::default())
			.add_usage(1, usage)
			.add_usage(1, usage);
	}

	#[test]
	#[should_panic(expected = "final usage already declared")]
	fn duplicate_final_usage_is_rejected() {
		let usage = ImageUsage::sampled_in_fragment_shader();
		let _ = UsageHistory::new("output", ImageUsage::default())
			.set_final_usage(usage)
			.set_final_usage(usage);
	}

	#[test]
	#[should_panic(expected = "invalid step range")]
	fn inverted_range_is_rejected() {
		let usage = ImageUsage::sampled_in_fragment_shader();
		let _ = UsageHistory::new("output", ImageUsage::default()).add_usage_range(2, 0, usage);
	}

	#[test]
	fn tracker_hands_usages_between_passes() {
		let sampled = ImageUsage::sampled_in_fragment_shader();
		let written = ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly);

		let mut tracker = UsageTracker::new();
		tracker.track_image("aurora", sampled);
		assert!(tracker.is_tracked("aurora"));
		assert!(!tracker.is_tracked("paths"));
		assert_eq!(tracker.usage("aurora"), sampled);

		tracker.update_usage("aurora", written);
		assert_eq!(tracker.usage("aurora"), written);
	}

	#[test]
	#[should_panic(expected = "already tracking image 'aurora'")]
	fn tracker_rejects_duplicate_names() {
		let mut tracker = UsageTracker::new();
		tracker.track_image("aurora", ImageUsage::default());
		tracker.track_image("aurora", ImageUsage::default());
	}

	#[test]
	#[should_panic(expected = "unrecognized image 'paths'")]
	fn tracker_rejects_unknown_lookup() {
		let tracker = UsageTracker::new();
		tracker.usage("paths");
	}

	#[test]
	#[should_panic(expected = "unrecognized image 'paths'")]
	fn tracker_rejects_unknown_update() {
		let mut tracker = UsageTracker::new();
		tracker.update_usage("paths", ImageUsage::default());
	}
}
