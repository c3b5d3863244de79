//! Pipeline state selection
//!
//! Maps polygon flags onto one of 32 fixed pipeline configurations. The table
//! is built once per device and never changes afterwards.

mod pipeline_desc;
mod pipeline_key;
mod table;

pub use pipeline_desc::{BlendComponent, BlendFactor, PipelineDesc};
pub use pipeline_key::{BlendClass, PipelineKey, normalize};
pub use table::PipelineTable;

/// Number of pipeline permutations (4 blend classes x invisible x occlude x masked)
pub const PIPELINE_COUNT: usize = 32;
