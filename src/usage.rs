//! Describes how an image is used at one point in a pass, and what that
//! usage implies at the Vulkan level: access masks, pipeline stages, layouts
//! and image creation flags.

use ash::vk;

/// The category of access an image undergoes.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UsageType {
	/// The contents of the image are irrelevant.
	DontCare,
	/// Color attachment that is rendered to.
	RenderTarget,
	/// Depth stencil attachment.
	DepthStencil,
	/// A multisample image resolves to this single sample image.
	MultisampleResolve,
	/// Presented to the screen.
	Presentation,
	/// Linearly accessed, e.g. as a storage image.
	LinearAccess,
	/// Sampled as a texture.
	Sample,
	/// Source or destination of a transfer operation, e.g. a blit.
	Transfer,
}

/// Whether an access reads and/or writes the image.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AccessType {
	DontCare,
	ReadOnly,
	WriteOnly,
	ReadWrite,
}

/// Where the access happens. `Other` is distinct from `DontCare`: depth
/// stencil attachments, for example, are not touched by any shader stage,
/// but their access location is very much cared about.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum AccessLocation {
	DontCare,
	Host,
	FragmentShader,
	ComputeShader,
	VertexShader,
	Other,
}

/// An immutable description of one way an image is used.
///
/// Only the default (all-`DontCare`) usage and the named constructors can be
/// built, so any `ImageUsage` in circulation is a valid combination. The
/// constructors panic on combinations that have no defined meaning.
#[derive(Debug, Copy, Clone)]
pub struct ImageUsage {
	usage_type: UsageType,
	access_type: AccessType,
	access_location: AccessLocation,
	high_precision: bool,
}

impl Default for ImageUsage {
	fn default() -> Self {
		Self {
			usage_type: UsageType::DontCare,
			access_type: AccessType::DontCare,
			access_location: AccessLocation::DontCare,
			high_precision: false,
		}
	}
}

// Equality is structural on (type, access, location). Precision affects the
// pixel format an image is created with, never its synchronization, so two
// usages differing only in precision describe the same state.
impl PartialEq for ImageUsage {
	fn eq(&self, other: &Self) -> bool {
		self.usage_type == other.usage_type
			&& self.access_type == other.access_type
			&& self.access_location == other.access_location
	}
}

impl Eq for ImageUsage {}

impl ImageUsage {
	fn new(usage_type: UsageType, access_type: AccessType, access_location: AccessLocation) -> Self {
		Self {
			usage_type,
			access_type,
			access_location,
			high_precision: false,
		}
	}

	/// Usage for images sampled as textures in fragment shaders.
	pub fn sampled_in_fragment_shader() -> Self { Self::sampled(AccessLocation::FragmentShader) }

	/// Usage for images sampled as textures at `location`.
	pub fn sampled(location: AccessLocation) -> Self {
		assert!(
			matches!(
				location,
				AccessLocation::Host | AccessLocation::FragmentShader | AccessLocation::ComputeShader
			),
			"cannot sample an image at {location:?}"
		);
		Self::new(UsageType::Sample, AccessType::ReadOnly, location)
	}

	/// Usage for images used as render targets.
	pub fn render_target() -> Self {
		Self::new(UsageType::RenderTarget, AccessType::ReadWrite, AccessLocation::Other)
	}

	/// Usage for single sample images that multisample images resolve to.
	pub fn multisample_resolve_target() -> Self {
		Self::new(
			UsageType::MultisampleResolve,
			AccessType::WriteOnly,
			AccessLocation::Other,
		)
	}

	/// Usage for images used as depth stencil attachments.
	pub fn depth_stencil(access: AccessType) -> Self {
		assert!(
			access != AccessType::DontCare,
			"must specify an access type for a depth stencil usage"
		);
		Self::new(UsageType::DepthStencil, access, AccessLocation::Other)
	}

	/// Usage for images handed to the presentation engine.
	pub fn presentation() -> Self {
		Self::new(UsageType::Presentation, AccessType::ReadOnly, AccessLocation::Other)
	}

	/// Usage for images linearly accessed in compute shaders.
	pub fn linear_access_in_compute_shader(access: AccessType) -> Self {
		Self::linear_access(access, AccessLocation::ComputeShader)
	}

	/// Usage for images linearly accessed at `location`.
	pub fn linear_access(access: AccessType, location: AccessLocation) -> Self {
		assert!(
			access != AccessType::DontCare,
			"must specify an access type for a linear access usage"
		);
		assert!(
			matches!(
				location,
				AccessLocation::Host | AccessLocation::FragmentShader | AccessLocation::ComputeShader
			),
			"cannot linearly access an image at {location:?}"
		);
		Self::new(UsageType::LinearAccess, access, location)
	}

	/// Usage for images used as the source (`ReadOnly`) or destination
	/// (`WriteOnly`) of a transfer operation.
	pub fn transfer(access: AccessType) -> Self {
		assert!(
			access != AccessType::DontCare,
			"must specify an access type for a transfer usage"
		);
		assert!(
			access != AccessType::ReadWrite,
			"a transfer usage is either a source or a destination, never both"
		);
		Self::new(UsageType::Transfer, access, AccessLocation::Other)
	}

	/// Requests 16-bit float channels instead of the usual 8-bit integers
	/// when the image is created. Orthogonal to synchronization.
	pub fn high_precision(mut self) -> Self {
		self.high_precision = true;
		self
	}

	pub fn usage_type(&self) -> UsageType { self.usage_type }

	pub fn access_type(&self) -> AccessType { self.access_type }

	pub fn access_location(&self) -> AccessLocation { self.access_location }

	pub fn use_high_precision(&self) -> bool { self.high_precision }

	/// The access mask to use when building a barrier around this usage.
	pub fn access_flags(&self) -> vk::AccessFlags {
		match self.usage_type {
			UsageType::DontCare => vk::AccessFlags::empty(),
			// The presentation engine reads outside of any pipeline stage.
			UsageType::Presentation => vk::AccessFlags::empty(),
			UsageType::RenderTarget | UsageType::MultisampleResolve => read_write_flags(
				self.access_type,
				vk::AccessFlags::COLOR_ATTACHMENT_READ,
				vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
			),
			UsageType::DepthStencil => read_write_flags(
				self.access_type,
				vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
				vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
			),
			UsageType::LinearAccess | UsageType::Sample => match self.access_location {
				AccessLocation::Host => {
					read_write_flags(self.access_type, vk::AccessFlags::HOST_READ, vk::AccessFlags::HOST_WRITE)
				},
				AccessLocation::FragmentShader | AccessLocation::ComputeShader | AccessLocation::VertexShader => {
					read_write_flags(
						self.access_type,
						vk::AccessFlags::SHADER_READ,
						vk::AccessFlags::SHADER_WRITE,
					)
				},
				loc => panic!("no access flags for {:?} at {loc:?}", self.usage_type),
			},
			UsageType::Transfer => read_write_flags(
				self.access_type,
				vk::AccessFlags::TRANSFER_READ,
				vk::AccessFlags::TRANSFER_WRITE,
			),
		}
	}

	/// The pipeline stages this usage executes at.
	pub fn pipeline_stage_flags(&self) -> vk::PipelineStageFlags {
		match self.usage_type {
			UsageType::DontCare => vk::PipelineStageFlags::TOP_OF_PIPE,
			UsageType::RenderTarget | UsageType::MultisampleResolve | UsageType::Presentation => {
				vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
			},
			UsageType::DepthStencil => {
				vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
			},
			UsageType::LinearAccess | UsageType::Sample => match self.access_location {
				AccessLocation::Host => vk::PipelineStageFlags::HOST,
				AccessLocation::FragmentShader => vk::PipelineStageFlags::FRAGMENT_SHADER,
				AccessLocation::ComputeShader => vk::PipelineStageFlags::COMPUTE_SHADER,
				AccessLocation::VertexShader => vk::PipelineStageFlags::VERTEX_SHADER,
				loc => panic!("no pipeline stage for {:?} at {loc:?}", self.usage_type),
			},
			UsageType::Transfer => vk::PipelineStageFlags::TRANSFER,
		}
	}

	/// The layout the image must be in before this usage is valid.
	pub fn image_layout(&self) -> vk::ImageLayout {
		match self.usage_type {
			UsageType::DontCare => vk::ImageLayout::UNDEFINED,
			UsageType::RenderTarget | UsageType::MultisampleResolve => vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
			UsageType::DepthStencil => vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
			UsageType::Presentation => vk::ImageLayout::PRESENT_SRC_KHR,
			UsageType::LinearAccess => vk::ImageLayout::GENERAL,
			UsageType::Sample => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
			UsageType::Transfer => match self.access_type {
				AccessType::ReadOnly => vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
				AccessType::WriteOnly => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
				access => panic!("no layout for a transfer usage with access {access:?}"),
			},
		}
	}

	/// The capability bit the image must be created with to ever be put
	/// through this usage. Must not be called on a `DontCare` usage, which
	/// has no corresponding bit.
	pub fn image_usage_flag_bits(&self) -> vk::ImageUsageFlags {
		match self.usage_type {
			UsageType::DontCare => panic!("no image usage flag bits for UsageType::DontCare"),
			UsageType::RenderTarget | UsageType::MultisampleResolve | UsageType::Presentation => {
				vk::ImageUsageFlags::COLOR_ATTACHMENT
			},
			UsageType::DepthStencil => vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
			UsageType::LinearAccess => vk::ImageUsageFlags::STORAGE,
			UsageType::Sample => vk::ImageUsageFlags::SAMPLED,
			UsageType::Transfer => match self.access_type {
				AccessType::ReadOnly => vk::ImageUsageFlags::TRANSFER_SRC,
				AccessType::WriteOnly => vk::ImageUsageFlags::TRANSFER_DST,
				access => panic!("no image usage flag bits for a transfer usage with access {access:?}"),
			},
		}
	}
}

fn read_write_flags(access: AccessType, read: vk::AccessFlags, write: vk::AccessFlags) -> vk::AccessFlags {
	let mut flags = vk::AccessFlags::empty();
	if matches!(access, AccessType::ReadOnly | AccessType::ReadWrite) {
		flags |= read;
	}
	if matches!(access, AccessType::WriteOnly | AccessType::ReadWrite) {
		flags |= write;
	}
	flags
}

/// Returns true if any of `usages` is linearly accessed.
pub fn is_linear_accessed(usages: &[ImageUsage]) -> bool {
	usages.iter().any(|usage| usage.usage_type() == UsageType::LinearAccess)
}

/// Returns true if any of `usages` wants high precision channels.
pub fn use_high_precision(usages: &[ImageUsage]) -> bool { usages.iter().any(|usage| usage.use_high_precision()) }

/// The union of creation flag bits over all of `usages`, for pre-declaring
/// an image that will be put through every one of them.
pub fn image_usage_flags(usages: &[ImageUsage]) -> vk::ImageUsageFlags {
	usages
		.iter()
		.filter(|usage| usage.usage_type() != UsageType::DontCare)
		.fold(vk::ImageUsageFlags::empty(), |flags, usage| {
			flags | usage.image_usage_flag_bits()
		})
}

/// Returns whether going from `prev` to `curr` needs explicit
/// synchronization: a memory barrier in a compute pass, or a subpass
/// dependency in a graphics pass.
///
/// Read-after-read of the same state is the only transition that needs
/// nothing. Every other pair, including a write-after-write of an identical
/// usage, must be ordered explicitly.
pub fn need_synchronization(prev: ImageUsage, curr: ImageUsage) -> bool {
	!(prev == curr && curr.access_type() == AccessType::ReadOnly)
}

#[cfg(test)]
mod tests {
	use super::*;

	// Expected values follow the Khronos synchronization examples.

	#[test]
	fn linear_write_in_compute_shader() {
		let usage = ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly);
		assert_eq!(usage.access_flags(), vk::AccessFlags::SHADER_WRITE);
		assert_eq!(usage.pipeline_stage_flags(), vk::PipelineStageFlags::COMPUTE_SHADER);
		assert_eq!(usage.image_layout(), vk::ImageLayout::GENERAL);
	}

	#[test]
	fn linear_read_in_compute_shader() {
		let usage = ImageUsage::linear_access_in_compute_shader(AccessType::ReadOnly);
		assert_eq!(usage.access_flags(), vk::AccessFlags::SHADER_READ);
		assert_eq!(usage.pipeline_stage_flags(), vk::PipelineStageFlags::COMPUTE_SHADER);
		assert_eq!(usage.image_layout(), vk::ImageLayout::GENERAL);
	}

	#[test]
	fn sample_in_fragment_shader() {
		let usage = ImageUsage::sampled_in_fragment_shader();
		assert_eq!(usage.access_flags(), vk::AccessFlags::SHADER_READ);
		assert_eq!(usage.pipeline_stage_flags(), vk::PipelineStageFlags::FRAGMENT_SHADER);
		assert_eq!(usage.image_layout(), vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
	}

	#[test]
	fn depth_stencil_stages_and_flags() {
		let usage = ImageUsage::depth_stencil(AccessType::ReadWrite);
		assert_eq!(
			usage.access_flags(),
			vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE
		);
		assert_eq!(
			usage.pipeline_stage_flags(),
			vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags::LATE_FRAGMENT_TESTS
		);
		assert_eq!(usage.image_layout(), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
	}

	#[test]
	fn transfer_layouts_follow_direction() {
		assert_eq!(
			ImageUsage::transfer(AccessType::ReadOnly).image_layout(),
			vk::ImageLayout::TRANSFER_SRC_OPTIMAL
		);
		assert_eq!(
			ImageUsage::transfer(AccessType::WriteOnly).image_layout(),
			vk::ImageLayout::TRANSFER_DST_OPTIMAL
		);
	}

	#[test]
	fn read_after_read_is_elided() {
		let usage = ImageUsage::sampled_in_fragment_shader();
		assert!(!need_synchronization(usage, usage));

		let usage = ImageUsage::linear_access_in_compute_shader(AccessType::ReadOnly);
		assert!(!need_synchronization(usage, usage));
	}

	#[test]
	fn everything_else_needs_synchronization() {
		let write = ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly);
		let read = ImageUsage::linear_access_in_compute_shader(AccessType::ReadOnly);
		let sampled = ImageUsage::sampled_in_fragment_shader();

		// Identical non-read-only states still synchronize.
		assert!(need_synchronization(write, write));
		assert!(need_synchronization(
			ImageUsage::render_target(),
			ImageUsage::render_target()
		));
		// Any structural difference synchronizes, even read-only to read-only.
		assert!(need_synchronization(read, sampled));
		assert!(need_synchronization(write, read));
		assert!(need_synchronization(read, write));
	}

	#[test]
	fn precision_does_not_affect_equality() {
		let usage = ImageUsage::sampled_in_fragment_shader();
		assert_eq!(usage, usage.high_precision());
		assert!(!need_synchronization(usage.high_precision(), usage));
	}

	#[test]
	fn usage_flags_are_unioned() {
		let usages = [
			ImageUsage::default(),
			ImageUsage::sampled_in_fragment_shader(),
			ImageUsage::linear_access_in_compute_shader(AccessType::WriteOnly),
			ImageUsage::transfer(AccessType::ReadOnly),
		];
		assert_eq!(
			image_usage_flags(&usages),
			vk::ImageUsageFlags::SAMPLED | vk::ImageUsageFlags::STORAGE | vk::ImageUsageFlags::TRANSFER_SRC
		);
		assert!(is_linear_accessed(&usages));
		assert!(!use_high_precision(&usages));
	}

	#[test]
	#[should_panic(expected = "access type for a depth stencil")]
	fn depth_stencil_requires_access_type() { ImageUsage::depth_stencil(AccessType::DontCare); }

	#[test]
	#[should_panic(expected = "never both")]
	fn transfer_rejects_read_write() { ImageUsage::transfer(AccessType::ReadWrite); }

	#[test]
	#[should_panic(expected = "cannot linearly access")]
	fn linear_access_rejects_vertex_shader() {
		ImageUsage::linear_access(AccessType::ReadOnly, AccessLocation::VertexShader);
	}

	#[test]
	#[should_panic(expected = "cannot sample")]
	fn sample_rejects_other_location() { ImageUsage::sampled(AccessLocation::Other); }
}
