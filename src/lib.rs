//! Tracking of how images are used across the steps of compute and graphics
//! passes, and derivation of the synchronization those usages require.
//!
//! The caller declares, up front, a [`UsageHistory`] for every image a pass
//! touches: the usage the image arrives in, its usage at each step, and
//! optionally the usage it must be left in. A pass validates those timelines
//! once and then answers layout queries and emits exactly the pipeline
//! barriers ([`ComputePass`]) or subpass dependencies ([`GraphicsPass`])
//! needed between steps. Adjacent read-only usages of the same kind are the
//! one case that needs no synchronization; everything else gets a barrier.
//!
//! All of the failure modes here are configuration errors: duplicate
//! declarations, out-of-range steps, unknown image names, usage kinds a pass
//! cannot handle. They are contract violations knowable before any command
//! is recorded, so they panic with a descriptive message rather than
//! surfacing as recoverable errors. An invalid schedule must never silently
//! under-synchronize.
//!
//! [`UsageHistory`]: history::UsageHistory
//! [`ComputePass`]: pass::ComputePass
//! [`GraphicsPass`]: pass::GraphicsPass

pub use ash;

pub mod history;
pub mod pass;
pub mod usage;
