//! Graphics passes: the same usage timelines and the same synchronization
//! predicate as the compute path, but emitted declaratively as the subpass
//! dependency table of a render pass instead of as imperative barriers.

use ash::vk;

use crate::{
	history::{Step, UsageHistory},
	pass::BasePass,
};

/// Analyzes the usage timelines of the images attached to one render pass
/// and derives the subpass dependencies its construction must declare.
///
/// Layout transitions themselves are expressed through the render pass's
/// attachment descriptions, fed from the layout queries on [`BasePass`];
/// this type only decides which pairs of subpasses must be ordered and with
/// what scopes. An image shared with a compute pass through the usage
/// tracker therefore transitions consistently across the boundary, because
/// both paths run the identical analysis.
pub struct GraphicsPass {
	base: BasePass,
}

impl GraphicsPass {
	pub fn new(num_subpasses: Step) -> Self {
		Self {
			base: BasePass::new(num_subpasses),
		}
	}

	/// Adds an image used in this pass along with its usage history.
	pub fn add_image(&mut self, history: UsageHistory) { self.base.add_usage_history(history) }

	/// One dependency per usage transition that requires synchronization,
	/// over every attached image. Transitions across the pass boundaries
	/// use `vk::SUBPASS_EXTERNAL` on the external side.
	pub fn subpass_dependencies(&self) -> Vec<vk::SubpassDependency> {
		let num_steps = self.base.num_steps();
		let mut dependencies = Vec::new();
		for (name, history) in self.base.histories() {
			for &step in history.ordered().keys() {
				let Some(sync) = self.base.usages_if_need_synchronization(name, step) else {
					continue;
				};
				dependencies.push(
					vk::SubpassDependency::builder()
						.src_subpass(subpass_index(sync.prev_step, num_steps))
						.dst_subpass(subpass_index(step, num_steps))
						.src_stage_mask(sync.prev_usage.pipeline_stage_flags())
						.src_access_mask(sync.prev_usage.access_flags())
						.dst_stage_mask(sync.curr_usage.pipeline_stage_flags())
						.dst_access_mask(sync.curr_usage.access_flags())
						.build(),
				);
			}
		}
		dependencies
	}
}

impl std::ops::Deref for GraphicsPass {
	type Target = BasePass;

	fn deref(&self) -> &BasePass { &self.base }
}

fn subpass_index(step: Step, num_steps: Step) -> u32 {
	if (0..num_steps).contains(&step) {
		step as u32
	} else {
		vk::SUBPASS_EXTERNAL
	}
}
