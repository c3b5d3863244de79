//! Recorded scene commands
//!
//! Draws are recorded during the frame and replayed into render passes when
//! the frame is presented. Every buffer and texture write issued through the
//! queue lands before that single submission, so each projection change gets
//! its own uniform slot instead of overwriting a shared one.

use std::ops::Range;

use scenebatch_core::device::GpuPipelineId;
use scenebatch_core::scene::{SceneProjection, Viewport};

use crate::pipelines::SceneUniforms;

/// One recorded scene command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SceneCommand {
    Draw {
        pipeline: GpuPipelineId,
        /// Index into the frame's bind group list
        bind_group: usize,
        /// Projection slot the draw uses
        slot: usize,
        first_index: u32,
        index_count: u32,
    },
    ClearDepth,
}

/// One render pass worth of commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPlan {
    pub clear_color: bool,
    pub clear_depth: bool,
    /// Draw commands only
    pub commands: Range<usize>,
}

/// Projection slot: uniforms plus the viewport they apply to.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionSlot {
    pub uniforms: SceneUniforms,
    pub viewport: Viewport,
}

impl ProjectionSlot {
    pub fn new(projection: &SceneProjection, lod_bias: f32) -> Self {
        Self {
            uniforms: SceneUniforms {
                transform: projection.transform.to_cols_array_2d(),
                lod_bias,
                _pad: [0.0; 3],
            },
            viewport: projection.viewport,
        }
    }
}

/// Commands and projections of the frame being built.
#[derive(Default)]
pub struct FrameRecorder {
    commands: Vec<SceneCommand>,
    slots: Vec<ProjectionSlot>,
    clear_pending: bool,
}

impl FrameRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything recorded and clear the targets on next replay.
    pub fn begin(&mut self) {
        self.commands.clear();
        self.slots.clear();
        self.clear_pending = true;
    }

    pub fn set_projection(&mut self, slot: ProjectionSlot) {
        self.slots.push(slot);
    }

    pub fn push_draw(
        &mut self,
        pipeline: GpuPipelineId,
        bind_group: usize,
        first_index: u32,
        index_count: u32,
    ) {
        let slot = self.slots.len().saturating_sub(1);
        self.commands.push(SceneCommand::Draw {
            pipeline,
            bind_group,
            slot,
            first_index,
            index_count,
        });
    }

    pub fn push_clear_depth(&mut self) {
        self.commands.push(SceneCommand::ClearDepth);
    }

    pub fn commands(&self) -> &[SceneCommand] {
        &self.commands
    }

    pub fn slots(&self) -> &[ProjectionSlot] {
        &self.slots
    }

    pub fn has_projection(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Render passes needed to replay the frame.
    pub fn plan(&self) -> Vec<PassPlan> {
        plan_passes(&self.commands, self.clear_pending)
    }

    /// Mark the frame as replayed. Later replays keep what was drawn.
    pub fn finish(&mut self) {
        self.commands.clear();
        self.slots.clear();
        self.clear_pending = false;
    }
}

/// Split commands into passes at each depth clear.
///
/// The first pass clears color and depth when `clear_frame` is set; each
/// depth clear starts a new pass that loads color and clears depth.
pub fn plan_passes(commands: &[SceneCommand], clear_frame: bool) -> Vec<PassPlan> {
    let mut plans = Vec::new();
    let mut start = 0;
    let mut clear_color = clear_frame;
    let mut clear_depth = clear_frame;

    for (i, command) in commands.iter().enumerate() {
        if *command == SceneCommand::ClearDepth {
            if i > start || clear_color || clear_depth {
                plans.push(PassPlan {
                    clear_color,
                    clear_depth,
                    commands: start..i,
                });
            }
            start = i + 1;
            clear_color = false;
            clear_depth = true;
        }
    }

    if start < commands.len() || clear_color || clear_depth {
        plans.push(PassPlan {
            clear_color,
            clear_depth,
            commands: start..commands.len(),
        });
    }
    plans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(first_index: u32) -> SceneCommand {
        SceneCommand::Draw {
            pipeline: GpuPipelineId(0),
            bind_group: 0,
            slot: 0,
            first_index,
            index_count: 3,
        }
    }

    #[test]
    fn test_empty_frame_still_clears() {
        let plans = plan_passes(&[], true);
        assert_eq!(
            plans,
            vec![PassPlan {
                clear_color: true,
                clear_depth: true,
                commands: 0..0,
            }]
        );
        assert!(plan_passes(&[], false).is_empty());
    }

    #[test]
    fn test_clear_depth_splits_passes() {
        let commands = [draw(0), draw(3), SceneCommand::ClearDepth, draw(6)];
        let plans = plan_passes(&commands, true);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].commands, 0..2);
        assert!(plans[0].clear_color && plans[0].clear_depth);
        assert_eq!(plans[1].commands, 3..4);
        assert!(!plans[1].clear_color && plans[1].clear_depth);
    }

    #[test]
    fn test_leading_clear_depth_merges_with_frame_clear() {
        let commands = [SceneCommand::ClearDepth, draw(0)];
        let plans = plan_passes(&commands, false);
        assert_eq!(
            plans,
            vec![PassPlan {
                clear_color: false,
                clear_depth: true,
                commands: 1..2,
            }]
        );
    }

    #[test]
    fn test_draws_use_latest_projection() {
        let projection = SceneProjection::from_node(
            &scenebatch_core::SceneNode::full(64, 32, 90.0),
            32,
        );
        let mut recorder = FrameRecorder::new();
        recorder.begin();
        recorder.set_projection(ProjectionSlot::new(&projection, -0.5));
        recorder.push_draw(GpuPipelineId(1), 0, 0, 3);
        recorder.set_projection(ProjectionSlot::new(&projection.with_identity_transform(), -0.5));
        recorder.push_draw(GpuPipelineId(1), 0, 3, 3);

        let slots: Vec<_> = recorder
            .commands()
            .iter()
            .map(|c| match c {
                SceneCommand::Draw { slot, .. } => *slot,
                SceneCommand::ClearDepth => usize::MAX,
            })
            .collect();
        assert_eq!(slots, vec![0, 1]);
        assert_eq!(recorder.slots()[1].uniforms.transform, glam::Mat4::IDENTITY.to_cols_array_2d());

        recorder.finish();
        assert!(recorder.commands().is_empty());
        assert!(recorder.plan().is_empty());
    }
}
