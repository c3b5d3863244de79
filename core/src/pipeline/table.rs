//! The fixed table of device pipelines.

use crate::device::{DeviceError, GpuDevice, GpuPipelineId};
use crate::flags::PolyFlags;

use super::PIPELINE_COUNT;
use super::pipeline_desc::PipelineDesc;
use super::pipeline_key::PipelineKey;

/// All 32 pipelines, created up front.
///
/// Lookup is a normalization plus an array index. Nothing is created lazily,
/// so a broken pipeline shows up at startup rather than mid-frame.
#[derive(Debug, Clone)]
pub struct PipelineTable {
    pipelines: [GpuPipelineId; PIPELINE_COUNT],
}

impl PipelineTable {
    /// Create every permutation on the device.
    ///
    /// Any failure aborts construction.
    pub fn build<D: GpuDevice>(device: &mut D) -> Result<Self, DeviceError> {
        tracing::info!("Creating {} scene pipelines", PIPELINE_COUNT);

        let mut pipelines = [GpuPipelineId::default(); PIPELINE_COUNT];
        for key in PipelineKey::all() {
            let desc = PipelineDesc::for_key(key);
            pipelines[key.index()] = device.create_pipeline(&desc)?;
        }

        Ok(Self { pipelines })
    }

    /// Pipeline for a polygon's flags.
    pub fn select(&self, flags: PolyFlags) -> GpuPipelineId {
        self.get(PipelineKey::from_flags(flags))
    }

    pub fn get(&self, key: PipelineKey) -> GpuPipelineId {
        self.pipelines[key.index()]
    }
}
