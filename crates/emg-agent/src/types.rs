use emg_config::model::{mapping_key, KEY_SEPARATOR};

/// The live avatar snapshot that drives image resolution.
///
/// Blinking is not part of the state: it is derived by the player (see
/// [`BlinkController`](crate::BlinkController)) and passed to the resolver
/// separately.
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarState {
    /// Emotion half of the mapping key, e.g. `"joy"`.
    pub emotion: String,
    /// Activity half of the mapping key, e.g. `"idle"`.
    pub activity: String,
    /// Mouth is moving; selects lip-sync slots.
    pub speaking: bool,
    /// Asleep; the model's sleep bundle takes over when it has one.
    pub sleep: bool,
    /// Expression strength in `[0, 1]`. Carried but not used for resolution.
    pub intensity: f32,
}

impl Default for AvatarState {
    fn default() -> Self {
        Self::new("idle", "neutral")
    }
}

impl AvatarState {
    /// Awake, silent state for `activity` and `emotion`.
    pub fn new(activity: impl Into<String>, emotion: impl Into<String>) -> Self {
        Self {
            emotion: emotion.into(),
            activity: activity.into(),
            speaking: false,
            sleep: false,
            intensity: 0.0,
        }
    }

    /// Builder-style setter for [`speaking`](Self::speaking).
    pub fn speaking(mut self, speaking: bool) -> Self {
        self.speaking = speaking;
        self
    }

    /// Builder-style setter for [`sleep`](Self::sleep).
    pub fn sleeping(mut self, sleep: bool) -> Self {
        self.sleep = sleep;
        self
    }

    /// Mapping-table key for this state.
    pub fn key(&self) -> String {
        mapping_key(&self.activity, &self.emotion)
    }

    /// Both halves of the key are present.
    pub fn is_well_formed(&self) -> bool {
        !self.activity.is_empty() && !self.emotion.is_empty()
    }

    /// The key can't be split back into this activity and emotion because
    /// one of them contains the separator.
    pub fn has_ambiguous_key(&self) -> bool {
        self.activity.contains(KEY_SEPARATOR) || self.emotion.contains(KEY_SEPARATOR)
    }
}

/// How a sprite animation picks its next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Play through once, then stop (code 0, "none" in model files).
    Once,
    /// Wrap around to the first frame (code 1).
    Loop,
    /// Jump to a uniformly random frame (code 2).
    Random,
    /// Follow the animation's timeline table (code 3).
    Timeline,
    /// Anything else. Advances like [`LoopMode::Loop`].
    Unknown(Option<i64>),
}

impl LoopMode {
    /// Decode the numeric `loop` field of a sprite animation.
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => LoopMode::Once,
            Some(1) => LoopMode::Loop,
            Some(2) => LoopMode::Random,
            Some(3) => LoopMode::Timeline,
            other => LoopMode::Unknown(other),
        }
    }
}

/// A single decoded image: raw RGBA pixel data at a known resolution.
///
/// Stored as a flat `Vec<u8>` in row-major RGBA order (4 bytes per pixel)
/// so consumers don't need to depend on the `image` crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw RGBA pixel data, length = `width * height * 4`.
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}
