use std::fmt;

/// Missing or inconsistent scene data noticed while animating.
///
/// None of these stop the engine: the affected tick or machine is skipped.
/// Each is logged once through `tracing` when raised and also handed back
/// to the caller in tick reports.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// A sprite layer names an animation that isn't declared.
    MissingAnimation { layer_id: String, anim_id: String },
    /// An animation has no frames.
    EmptyAnimation { anim_id: String },
    /// An animation's frame rate is zero, negative or not a number.
    InvalidFps { anim_id: String, fps: f64 },
    /// A frame references a layer id that doesn't exist.
    MissingFrameLayer { anim_id: String, layer_id: String },
    /// Timeline mode without a timeline table.
    MissingTimeline { anim_id: String },
    /// The timeline has no usable successor for this frame.
    MissingTimelineEntry { anim_id: String, frame: usize },
    /// Unrecognized loop mode code.
    UnknownLoopMode { anim_id: String, code: Option<i64> },
    /// A rotating group has fewer than two texture layers.
    TooFewGroupMembers { group: String, members: usize },
}

impl Warning {
    /// Log this warning at `WARN` level with structured fields.
    pub fn emit(&self) {
        match self {
            Warning::MissingAnimation { layer_id, anim_id } => {
                tracing::warn!(%layer_id, %anim_id, "sprite configuration not found")
            }
            Warning::EmptyAnimation { anim_id } => {
                tracing::warn!(%anim_id, "sprite animation has no frames")
            }
            Warning::InvalidFps { anim_id, fps } => {
                tracing::warn!(%anim_id, fps, "sprite animation has an invalid frame rate")
            }
            Warning::MissingFrameLayer { anim_id, layer_id } => {
                tracing::warn!(%anim_id, %layer_id, "frame layer not found")
            }
            Warning::MissingTimeline { anim_id } => {
                tracing::warn!(%anim_id, "timeline not defined, looping instead")
            }
            Warning::MissingTimelineEntry { anim_id, frame } => {
                tracing::warn!(%anim_id, frame, "timeline has no entry for frame, looping instead")
            }
            Warning::UnknownLoopMode { anim_id, code } => {
                tracing::warn!(%anim_id, ?code, "unknown loop type, looping instead")
            }
            Warning::TooFewGroupMembers { group, members } => {
                tracing::warn!(%group, members, "not enough layers found for group")
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingAnimation { layer_id, anim_id } => {
                write!(f, "layer {layer_id}: sprite configuration {anim_id:?} not found")
            }
            Warning::EmptyAnimation { anim_id } => write!(f, "animation {anim_id:?} has no frames"),
            Warning::InvalidFps { anim_id, fps } => {
                write!(f, "animation {anim_id:?} has invalid fps {fps}")
            }
            Warning::MissingFrameLayer { anim_id, layer_id } => {
                write!(f, "animation {anim_id:?}: frame layer {layer_id:?} not found")
            }
            Warning::MissingTimeline { anim_id } => {
                write!(f, "animation {anim_id:?}: timeline not defined")
            }
            Warning::MissingTimelineEntry { anim_id, frame } => {
                write!(f, "animation {anim_id:?}: no timeline entry for frame {frame}")
            }
            Warning::UnknownLoopMode { anim_id, code } => {
                write!(f, "animation {anim_id:?}: unknown loop type {code:?}")
            }
            Warning::TooFewGroupMembers { group, members } => {
                write!(f, "group {group:?} has {members} texture layer(s), need at least 2")
            }
        }
    }
}

/// Log `warning` and return it, for `push(raise(..))` call sites.
pub(crate) fn raise(warning: Warning) -> Warning {
    warning.emit();
    warning
}
