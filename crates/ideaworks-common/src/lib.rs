//! Shared domain types for the ideaworks publishing pipeline.
//!
//! Everything here is pure data plus validation: no I/O, no async. The root
//! crate wires these types to the idea store and the hosting API.

pub mod ids;
pub mod idea;
pub mod plan;
pub mod work;

pub use idea::{Idea, IdeaPatch, IdeaStatus, MAX_TAGS, NewIdea, normalize_tags};
pub use ids::{IdError, IdeaRef, normalize_id, parse_idea_id, slugify};
pub use plan::{CommitPlan, FileChange, FileContent};
pub use work::{DemoDescriptor, WorkMeta, WorkType};
