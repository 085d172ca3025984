//! Passes over a set of image usage timelines: validation, layout queries,
//! and the shared synchronization analysis that the compute path turns into
//! pipeline barriers and the graphics path turns into subpass dependencies.

use ash::vk;
use rustc_hash::FxHashMap;

use crate::{
	history::{Step, UsageHistory, UsageTracker, VIRTUAL_INITIAL_STEP},
	usage::{self, ImageUsage},
};

mod compute;
mod graphics;

pub use compute::{ComputeOp, ComputePass, ImageBarrier};
pub use graphics::GraphicsPass;

/// The pair of usages around one step that requires explicit
/// synchronization before the step may execute.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SyncUsages {
	pub prev_usage: ImageUsage,
	/// The step `prev_usage` was declared at. Not necessarily the directly
	/// preceding step index; images may skip steps.
	pub prev_step: Step,
	pub curr_usage: ImageUsage,
}

/// Owns the usage histories of every image touched by one pass, keyed by
/// image name. The pass holds names only; the images themselves belong to
/// whoever created them.
pub struct BasePass {
	num_steps: Step,
	histories: FxHashMap<String, UsageHistory>,
}

impl BasePass {
	pub fn new(num_steps: Step) -> Self {
		assert!(num_steps > 0, "a pass must have at least one step, got {num_steps}");
		Self {
			num_steps,
			histories: FxHashMap::default(),
		}
	}

	/// Adds the usage history of one image. Every declared step must be in
	/// `[0, num_steps)`, and each image may be added only once.
	pub fn add_usage_history(&mut self, mut history: UsageHistory) {
		assert!(
			!self.histories.contains_key(history.image_name()),
			"image '{}' already added to this pass",
			history.image_name()
		);
		history.attach(self.num_steps);
		self.histories.insert(history.image_name().to_string(), history);
	}

	pub fn num_steps(&self) -> Step { self.num_steps }

	/// The usage history of `image_name`, which must have been added.
	pub fn history(&self, image_name: &str) -> &UsageHistory {
		match self.histories.get(image_name) {
			Some(history) => history,
			None => panic!("unrecognized image '{image_name}'"),
		}
	}

	pub(crate) fn histories(&self) -> impl Iterator<Item = (&str, &UsageHistory)> {
		self.histories.iter().map(|(name, history)| (name.as_str(), history))
	}

	/// The layout `image_name` is expected to be in when the pass begins.
	pub fn image_layout_before_pass(&self, image_name: &str) -> vk::ImageLayout {
		self.history(image_name).initial_usage().image_layout()
	}

	/// The layout `image_name` is left in after the pass: the final usage if
	/// one was declared, otherwise the usage at its last declared step.
	pub fn image_layout_after_pass(&self, image_name: &str) -> vk::ImageLayout {
		self.last_usage(image_name).image_layout()
	}

	/// The layout of `image_name` at `step`. The usage must have been
	/// declared at that exact step; a usage at an earlier step does not
	/// carry forward. This keeps schedules self-documenting and catches
	/// missing declarations.
	pub fn image_layout_at_step(&self, image_name: &str, step: Step) -> vk::ImageLayout {
		assert!(
			(0..self.num_steps).contains(&step),
			"step {step} out of range [0, {}) for image '{image_name}'",
			self.num_steps
		);
		match self.history(image_name).usage_at(step) {
			Some(usage) => usage.image_layout(),
			None => panic!("no usage declared for image '{image_name}' at step {step}"),
		}
	}

	/// If `image_name` is used at `step` and getting there from its previous
	/// usage requires explicit synchronization, returns the usages involved.
	/// Returns `None` when the image is not declared at `step` at all, or
	/// when the transition is a read-after-read of identical state.
	///
	/// `step` may be either virtual boundary step; the virtual initial step
	/// has no predecessor and so never requires synchronization.
	pub fn usages_if_need_synchronization(&self, image_name: &str, step: Step) -> Option<SyncUsages> {
		assert!(
			(VIRTUAL_INITIAL_STEP..=self.num_steps).contains(&step),
			"step {step} out of range [-1, {}] for image '{image_name}'",
			self.num_steps
		);
		let ordered = self.history(image_name).ordered();
		let curr_usage = *ordered.get(&step)?;
		let (&prev_step, &prev_usage) = ordered.range(..step).next_back()?;
		usage::need_synchronization(prev_usage, curr_usage).then_some(SyncUsages {
			prev_usage,
			prev_step,
			curr_usage,
		})
	}

	/// The last known usage of `image_name` in this pass.
	pub fn last_usage(&self, image_name: &str) -> ImageUsage {
		let history = self.history(image_name);
		history.final_usage().unwrap_or_else(|| {
			// The virtual initial usage is always present, so the map is
			// never empty.
			*history
				.ordered()
				.last_key_value()
				.expect("attached history has at least the initial usage")
				.1
		})
	}

	/// Writes the last known usage of every image in this pass into
	/// `tracker`, so a later pass can pick up where this one left off.
	/// Images the tracker has not seen yet start being tracked.
	pub fn update_tracker(&self, tracker: &mut UsageTracker) {
		for (name, _) in self.histories() {
			let last = self.last_usage(name);
			if tracker.is_tracked(name) {
				tracker.update_usage(name, last);
			} else {
				tracker.track_image(name, last);
			}
		}
	}
}
