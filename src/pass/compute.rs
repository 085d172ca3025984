//! Compute passes: a sequence of dispatch steps with image memory barriers
//! inserted between them wherever the usage timelines demand it.

use ash::vk;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{
	history::{Step, UsageHistory, VIRTUAL_INITIAL_STEP},
	pass::BasePass,
	usage::UsageType,
};

/// The work recorded for one step of a compute pass.
pub type ComputeOp<'a> = Box<dyn FnMut() + 'a>;

/// One fully resolved image memory barrier, ready to record.
///
/// Source and destination queue family are always the same: cross-queue
/// ownership transfer is not handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageBarrier {
	pub image: vk::Image,
	pub src_access: vk::AccessFlags,
	pub dst_access: vk::AccessFlags,
	pub old_layout: vk::ImageLayout,
	pub new_layout: vk::ImageLayout,
	pub src_stage: vk::PipelineStageFlags,
	pub dst_stage: vk::PipelineStageFlags,
	pub queue_family: u32,
}

/// Drives a sequence of compute dispatches, inserting the barriers the
/// usage analysis calls for before each step and after the last one.
///
/// The pass shape (step count and usage histories) is fixed at
/// configuration time; the concrete images are only supplied at run time,
/// so the same pass can be replayed against different images across frames.
pub struct ComputePass {
	base: BasePass,
}

impl ComputePass {
	pub fn new(num_steps: Step) -> Self {
		Self {
			base: BasePass::new(num_steps),
		}
	}

	/// Adds an image used in this pass along with its usage history.
	///
	/// Compute dispatches can only produce linear access, sampling and
	/// transfer usages; a history declaring any attachment or presentation
	/// usage is a configuration error. The initial usage is exempt, since it
	/// is whatever an earlier pass left behind and is only transitioned
	/// away from.
	pub fn add_image(&mut self, history: UsageHistory) {
		for usage in history.declared_usages() {
			assert!(
				matches!(
					usage.usage_type(),
					UsageType::LinearAccess | UsageType::Sample | UsageType::Transfer
				),
				"a compute pass cannot handle {:?} declared for image '{}'",
				usage.usage_type(),
				history.image_name()
			);
		}
		self.base.add_usage_history(history);
	}

	/// Runs every step in order, recording the required barriers into `buf`
	/// before each step's op, and the trailing barriers for any declared
	/// final usages after the last step. `buf` must be in the recording
	/// state, and all commands execute on a queue of `queue_family`.
	///
	/// `images` resolves each configured image name to the concrete image
	/// for this invocation; every name added via [`Self::add_image`] must be
	/// present. `ops` must contain exactly one op per step.
	pub fn run(
		&self, device: &ash::Device, buf: vk::CommandBuffer, queue_family: u32,
		images: &FxHashMap<String, vk::Image>, ops: &mut [ComputeOp],
	) {
		self.run_with(queue_family, images, ops, |barriers| {
			for barrier in barriers {
				unsafe { record_barrier(device, buf, barrier) }
			}
		})
	}

	/// Like [`Self::run`], but hands the computed barriers for each step to
	/// `emit` instead of recording them itself. Barriers for a step are
	/// always emitted strictly before that step's op runs.
	pub fn run_with(
		&self, queue_family: u32, images: &FxHashMap<String, vk::Image>, ops: &mut [ComputeOp],
		mut emit: impl FnMut(&[ImageBarrier]),
	) {
		let num_steps = self.base.num_steps();
		assert!(
			ops.len() == num_steps as usize,
			"got {} ops for a pass with {num_steps} steps",
			ops.len()
		);

		// The virtual initial step has no predecessor and can never need a
		// barrier, so the walk starts at the first real step and ends on the
		// virtual final step to flush declared final usages.
		for step in 0..=num_steps {
			let barriers = self.barriers_before_step(step, images, queue_family);
			if !barriers.is_empty() {
				emit(&barriers);
			}
			if step < num_steps {
				(ops[step as usize])();
			}
		}
	}

	/// The barriers that must execute before `step` does, one per tracked
	/// image whose transition into `step` requires synchronization.
	pub fn barriers_before_step(
		&self, step: Step, images: &FxHashMap<String, vk::Image>, queue_family: u32,
	) -> Vec<ImageBarrier> {
		debug_assert!(step > VIRTUAL_INITIAL_STEP);
		let mut barriers = Vec::new();
		for (name, _) in self.base.histories() {
			let Some(sync) = self.base.usages_if_need_synchronization(name, step) else {
				continue;
			};
			let image = match images.get(name) {
				Some(&image) => image,
				None => panic!("no image supplied for '{name}'"),
			};
			debug!(image = name, step, "inserting image memory barrier");
			barriers.push(ImageBarrier {
				image,
				src_access: sync.prev_usage.access_flags(),
				dst_access: sync.curr_usage.access_flags(),
				old_layout: sync.prev_usage.image_layout(),
				new_layout: sync.curr_usage.image_layout(),
				src_stage: sync.prev_usage.pipeline_stage_flags(),
				dst_stage: sync.curr_usage.pipeline_stage_flags(),
				queue_family,
			});
		}
		barriers
	}

}

impl std::ops::Deref for ComputePass {
	type Target = BasePass;

	fn deref(&self) -> &BasePass { &self.base }
}

unsafe fn record_barrier(device: &ash::Device, buf: vk::CommandBuffer, barrier: &ImageBarrier) {
	let image_barrier = vk::ImageMemoryBarrier::builder()
		.src_access_mask(barrier.src_access)
		.dst_access_mask(barrier.dst_access)
		.old_layout(barrier.old_layout)
		.new_layout(barrier.new_layout)
		.src_queue_family_index(barrier.queue_family)
		.dst_queue_family_index(barrier.queue_family)
		.image(barrier.image)
		.subresource_range(vk::ImageSubresourceRange {
			aspect_mask: vk::ImageAspectFlags::COLOR,
			base_mip_level: 0,
			level_count: 1,
			base_array_layer: 0,
			layer_count: 1,
		});
	device.cmd_pipeline_barrier(
		buf,
		barrier.src_stage,
		barrier.dst_stage,
		vk::DependencyFlags::empty(),
		&[],
		&[],
		&[image_barrier.build()],
	);
}
