//! Batch accumulation and the per-frame state machine
//!
//! Consecutive primitives that share a [`BatchState`] are drawn with a single
//! indexed draw. The state machine here is pure: every transition consumes the
//! old [`FrameState`] and an event and produces the new state plus, at most,
//! one range of indices that must be submitted before continuing.

use crate::device::GpuTextureId;
use crate::flags::PolyFlags;
use crate::pipeline::PipelineKey;

/// Sampler selection for the primary texture slot.
///
/// Bit 0 selects point filtering, bit 1 clamp addressing. The other slots
/// always use the smooth wrapping sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerMode(u8);

impl SamplerMode {
    pub const POINT: u8 = 1;
    pub const CLAMP: u8 = 2;
    pub const COUNT: usize = 4;

    pub fn new(point: bool, clamp: bool) -> Self {
        let mut bits = 0;
        if point {
            bits |= Self::POINT;
        }
        if clamp {
            bits |= Self::CLAMP;
        }
        Self(bits)
    }

    /// Point filtering follows `NO_SMOOTH`.
    pub fn from_flags(flags: PolyFlags, clamp: bool) -> Self {
        Self::new(flags.contains(PolyFlags::NO_SMOOTH), clamp)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_point(self) -> bool {
        self.0 & Self::POINT != 0
    }

    pub fn is_clamped(self) -> bool {
        self.0 & Self::CLAMP != 0
    }
}

/// Texture slot order shared by batches and shaders.
pub mod slot {
    pub const PRIMARY: usize = 0;
    pub const LIGHTMAP: usize = 1;
    pub const MACRO: usize = 2;
    /// Holds either the detail texture or the fog map
    pub const DETAIL_OR_FOG: usize = 3;
}

/// Everything whose change forces a new draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BatchState {
    pub pipeline: PipelineKey,
    /// `None` binds the null texture at submission
    pub textures: [Option<GpuTextureId>; 4],
    pub sampler: SamplerMode,
}

impl BatchState {
    pub fn new(pipeline: PipelineKey) -> Self {
        Self {
            pipeline,
            textures: [None; 4],
            sampler: SamplerMode::default(),
        }
    }
}

/// Indices accumulated under one state and not yet submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenBatch {
    pub state: BatchState,
    pub index_start: u32,
}

/// Indices that must be drawn now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushRange {
    pub state: BatchState,
    pub first_index: u32,
    pub index_count: u32,
}

/// Frame data carried while the host holds the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockedFrame {
    pub batch: Option<OpenBatch>,
}

impl LockedFrame {
    /// Close the open batch, yielding its range if it holds any indices.
    fn close(&mut self, index_cursor: u32) -> Option<FlushRange> {
        let batch = self.batch.take()?;
        let index_count = index_cursor.saturating_sub(batch.index_start);
        (index_count > 0).then_some(FlushRange {
            state: batch.state,
            first_index: batch.index_start,
            index_count,
        })
    }
}

/// Where a frame is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameState {
    #[default]
    Idle,
    Locked(LockedFrame),
    /// Unlocked without presenting. Geometry and the open batch carry over
    /// to the next lock.
    Suspended(LockedFrame),
}

/// Input to [`FrameState::apply`].
///
/// `index_cursor` is the geometry allocator's index write position when the
/// event happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    Lock,
    Draw { state: BatchState, index_cursor: u32 },
    Flush { index_cursor: u32 },
    Unlock { present: bool, index_cursor: u32 },
}

/// Result of applying a [`FrameEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: FrameState,
    /// Submit this before doing anything else
    pub flush: Option<FlushRange>,
}

impl Transition {
    fn stay(state: FrameState) -> Self {
        Self { state, flush: None }
    }
}

impl FrameState {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked(_))
    }

    /// The batch currently accumulating, if any.
    pub fn open_batch(&self) -> Option<&OpenBatch> {
        match self {
            Self::Locked(frame) | Self::Suspended(frame) => frame.batch.as_ref(),
            Self::Idle => None,
        }
    }

    pub fn apply(self, event: FrameEvent) -> Transition {
        match (self, event) {
            (Self::Idle, FrameEvent::Lock) => {
                Transition::stay(Self::Locked(LockedFrame::default()))
            }
            (Self::Suspended(frame), FrameEvent::Lock) => Transition::stay(Self::Locked(frame)),

            (Self::Locked(mut frame), FrameEvent::Draw { state, index_cursor }) => {
                let flush = match frame.batch {
                    Some(open) if open.state == state => None,
                    _ => {
                        let flush = frame.close(index_cursor);
                        frame.batch = Some(OpenBatch {
                            state,
                            index_start: index_cursor,
                        });
                        flush
                    }
                };
                Transition {
                    state: Self::Locked(frame),
                    flush,
                }
            }

            (Self::Locked(mut frame), FrameEvent::Flush { index_cursor }) => Transition {
                flush: frame.close(index_cursor),
                state: Self::Locked(frame),
            },
            (Self::Suspended(mut frame), FrameEvent::Flush { index_cursor }) => Transition {
                flush: frame.close(index_cursor),
                state: Self::Suspended(frame),
            },

            (
                Self::Locked(mut frame),
                FrameEvent::Unlock {
                    present: true,
                    index_cursor,
                },
            ) => Transition {
                flush: frame.close(index_cursor),
                state: Self::Idle,
            },
            (Self::Locked(frame), FrameEvent::Unlock { present: false, .. }) => {
                Transition::stay(Self::Suspended(frame))
            }

            // Draws outside a lock, double locks and stray unlocks change nothing
            (state, _) => Transition::stay(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(pipeline: usize, texture: Option<u32>) -> BatchState {
        let mut state = BatchState::new(PipelineKey::from_index(pipeline).unwrap());
        state.textures[slot::PRIMARY] = texture.map(GpuTextureId);
        state
    }

    fn draw(frame: FrameState, state: BatchState, index_cursor: u32) -> Transition {
        frame.apply(FrameEvent::Draw { state, index_cursor })
    }

    #[test]
    fn test_lock_opens_empty_frame() {
        let t = FrameState::Idle.apply(FrameEvent::Lock);
        assert_eq!(t.state, FrameState::Locked(LockedFrame::default()));
        assert!(t.flush.is_none());
    }

    #[test]
    fn test_same_state_does_not_flush() {
        let s = state(11, Some(1));
        let t = draw(FrameState::Idle.apply(FrameEvent::Lock).state, s, 0);
        assert!(t.flush.is_none());
        let t = draw(t.state, s, 6);
        assert!(t.flush.is_none());
        assert_eq!(t.state.open_batch().unwrap().index_start, 0);
    }

    #[test]
    fn test_state_change_flushes_pending_range() {
        let a = state(11, Some(1));
        let b = state(11, Some(2));
        let t = draw(FrameState::Locked(LockedFrame::default()), a, 0);
        let t = draw(t.state, a, 3);
        let t = draw(t.state, b, 9);

        assert_eq!(
            t.flush,
            Some(FlushRange {
                state: a,
                first_index: 0,
                index_count: 9,
            })
        );
        let open = t.state.open_batch().unwrap();
        assert_eq!(open.state, b);
        assert_eq!(open.index_start, 9);
    }

    #[test]
    fn test_sampler_mode_is_part_of_state() {
        let a = state(11, Some(1));
        let mut b = a;
        b.sampler = SamplerMode::new(true, false);
        let t = draw(FrameState::Locked(LockedFrame::default()), a, 0);
        let t = draw(t.state, b, 3);
        assert_eq!(t.flush.map(|f| f.index_count), Some(3));
    }

    #[test]
    fn test_empty_batch_is_not_submitted() {
        let a = state(11, None);
        let b = state(3, None);
        let t = draw(FrameState::Locked(LockedFrame::default()), a, 12);
        // Nothing was appended under `a`
        let t = draw(t.state, b, 12);
        assert!(t.flush.is_none());
    }

    #[test]
    fn test_flush_closes_batch() {
        let a = state(11, None);
        let t = draw(FrameState::Locked(LockedFrame::default()), a, 0);
        let t = t.state.apply(FrameEvent::Flush { index_cursor: 6 });
        assert_eq!(t.flush.map(|f| f.index_count), Some(6));
        assert!(t.state.open_batch().is_none());
        assert!(t.state.is_locked());

        let t = t.state.apply(FrameEvent::Flush { index_cursor: 6 });
        assert!(t.flush.is_none());
    }

    #[test]
    fn test_unlock_present_flushes_and_idles() {
        let a = state(11, None);
        let t = draw(FrameState::Locked(LockedFrame::default()), a, 0);
        let t = t.state.apply(FrameEvent::Unlock {
            present: true,
            index_cursor: 3,
        });
        assert_eq!(t.state, FrameState::Idle);
        assert_eq!(t.flush.map(|f| f.index_count), Some(3));
    }

    #[test]
    fn test_unlock_without_present_suspends() {
        let a = state(11, None);
        let t = draw(FrameState::Locked(LockedFrame::default()), a, 0);
        let t = t.state.apply(FrameEvent::Unlock {
            present: false,
            index_cursor: 3,
        });
        assert!(t.flush.is_none());
        assert!(matches!(t.state, FrameState::Suspended(_)));

        let t = t.state.apply(FrameEvent::Lock);
        assert_eq!(t.state.open_batch().map(|b| b.state), Some(a));
    }

    #[test]
    fn test_draw_while_idle_is_ignored() {
        let t = draw(FrameState::Idle, state(0, None), 0);
        assert_eq!(t.state, FrameState::Idle);
        assert!(t.flush.is_none());
    }

    #[test]
    fn test_alternating_states_flush_every_transition() {
        let a = state(11, Some(1));
        let b = state(11, Some(2));
        let mut frame = FrameState::Locked(LockedFrame::default());
        let mut flushes = 0;
        for i in 0..8u32 {
            let s = if i % 2 == 0 { a } else { b };
            let t = draw(frame, s, i * 3);
            flushes += t.flush.is_some() as u32;
            frame = t.state;
        }
        let t = frame.apply(FrameEvent::Flush { index_cursor: 24 });
        flushes += t.flush.is_some() as u32;
        assert_eq!(flushes, 8);
    }
}
