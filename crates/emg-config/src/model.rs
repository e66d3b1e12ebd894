use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Separator between activity and emotion in a mapping key.
pub const KEY_SEPARATOR: char = '.';

/// Build the mapping-table key for an `(activity, emotion)` pair.
///
/// Plain concatenation, no escaping: an activity or emotion containing `.`
/// produces a key that cannot be split back unambiguously.
pub fn mapping_key(activity: &str, emotion: &str) -> String {
    format!("{activity}{KEY_SEPARATOR}{emotion}")
}

/// Split a mapping key into `(activity, emotion)`.
///
/// Returns `None` unless the key holds exactly one separator with non-empty
/// text on both sides.
pub fn split_mapping_key(key: &str) -> Option<(&str, &str)> {
    let (activity, emotion) = key.split_once(KEY_SEPARATOR)?;
    if activity.is_empty() || emotion.is_empty() || emotion.contains(KEY_SEPARATOR) {
        return None;
    }
    Some((activity, emotion))
}

/// One named image role within an [`AssetBundle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    Base,
    MouthOpen,
    MouthClosed,
    EyesClosed,
    EyesOpen,
    MouthOpenEyesClosed,
}

impl Slot {
    /// Every slot, in declaration order.
    pub const ALL: [Slot; 6] = [
        Slot::Base,
        Slot::MouthOpen,
        Slot::MouthClosed,
        Slot::EyesClosed,
        Slot::EyesOpen,
        Slot::MouthOpenEyesClosed,
    ];

    /// Identifier used for this slot in model files and `imageConfig`.
    pub fn id(self) -> &'static str {
        match self {
            Slot::Base => "base",
            Slot::MouthOpen => "mouthOpen",
            Slot::MouthClosed => "mouthClosed",
            Slot::EyesClosed => "eyesClosed",
            Slot::EyesOpen => "eyesOpen",
            Slot::MouthOpenEyesClosed => "mouthOpenEyesClosed",
        }
    }
}

/// Per-slot usage flags from a bundle's `imageConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotConfig {
    /// Slot may be shown while blinking.
    #[serde(default = "enabled")]
    pub use_for_blink: bool,
    /// Slot may be shown while speaking.
    #[serde(default = "enabled")]
    pub use_for_lip_sync: bool,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            use_for_blink: true,
            use_for_lip_sync: true,
        }
    }
}

fn enabled() -> bool {
    true
}

/// The images and behaviour flags for one `(activity, emotion)` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBundle {
    /// Fallback image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Mouth open, eyes open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouth_open: Option<String>,
    /// Mouth closed, eyes open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouth_closed: Option<String>,
    /// Eyes closed, mouth closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyes_closed: Option<String>,
    /// Eyes open, mouth closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyes_open: Option<String>,
    /// Mouth open, eyes closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouth_open_eyes_closed: Option<String>,
    /// Blink automatically while this bundle is active.
    #[serde(default)]
    pub auto_blink: bool,
    /// Bundle supports lip sync.
    #[serde(default)]
    pub lip_sync: bool,
    /// Bundle is shown whenever the avatar sleeps.
    #[serde(default)]
    pub is_sleep: bool,
    /// Per-slot usage flags keyed by [`Slot::id`].
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub image_config: BTreeMap<String, SlotConfig>,
}

impl AssetBundle {
    /// The asset assigned to `slot`. Empty strings count as unassigned.
    pub fn slot(&self, slot: Slot) -> Option<&str> {
        let value = match slot {
            Slot::Base => &self.base,
            Slot::MouthOpen => &self.mouth_open,
            Slot::MouthClosed => &self.mouth_closed,
            Slot::EyesClosed => &self.eyes_closed,
            Slot::EyesOpen => &self.eyes_open,
            Slot::MouthOpenEyesClosed => &self.mouth_open_eyes_closed,
        };
        value.as_deref().filter(|s| !s.is_empty())
    }

    /// Usage flags for `slot`, defaulting to "usable for everything".
    pub fn slot_config(&self, slot: Slot) -> SlotConfig {
        self.image_config
            .get(slot.id())
            .copied()
            .unwrap_or_default()
    }
}

/// A complete avatar model: asset root, canvas hints and the mapping table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    /// Prefix joined to relative asset paths.
    #[serde(default)]
    pub assets_root: String,
    /// Native image width hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Native image height hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Horizontal anchor as a fraction of the width.
    #[serde(default = "centered")]
    pub anchor_x: f64,
    /// Vertical anchor as a fraction of the height.
    #[serde(default = "centered")]
    pub anchor_y: f64,
    /// Keyed by [`mapping_key`]. Sorted, so scans are deterministic.
    #[serde(default)]
    pub mapping: BTreeMap<String, AssetBundle>,
}

fn centered() -> f64 {
    0.5
}

impl Default for ModelDefinition {
    fn default() -> Self {
        Self {
            assets_root: "/assets".to_string(),
            width: None,
            height: None,
            anchor_x: centered(),
            anchor_y: centered(),
            mapping: BTreeMap::new(),
        }
    }
}

impl ModelDefinition {
    /// Parse a model definition from JSON.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("failed to parse model definition JSON")
    }

    /// Load a model definition from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read model definition at {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid model definition at {}", path.display()))
    }

    /// Bundle for an `(activity, emotion)` pair.
    pub fn bundle(&self, activity: &str, emotion: &str) -> Option<&AssetBundle> {
        self.mapping.get(&mapping_key(activity, emotion))
    }

    /// First bundle flagged `isSleep`, in key order.
    pub fn sleep_bundle(&self) -> Option<(&str, &AssetBundle)> {
        self.mapping
            .iter()
            .find(|(_, bundle)| bundle.is_sleep)
            .map(|(key, bundle)| (key.as_str(), bundle))
    }

    /// Every distinct asset string referenced by any bundle slot.
    pub fn referenced_assets(&self) -> BTreeSet<&str> {
        self.mapping
            .values()
            .flat_map(|bundle| Slot::ALL.into_iter().filter_map(move |slot| bundle.slot(slot)))
            .collect()
    }

    /// Report problems that won't stop the model from loading but will make
    /// some states resolve surprisingly.
    pub fn lint(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for key in self.mapping.keys() {
            if split_mapping_key(key).is_none() {
                warnings.push(format!(
                    "mapping key {key:?} is not of the form \"<activity>.<emotion>\""
                ));
            }
        }
        let sleepers = self.mapping.values().filter(|b| b.is_sleep).count();
        if sleepers > 1 {
            warnings.push(format!(
                "{sleepers} bundles are flagged isSleep; the first in key order wins"
            ));
        }
        for (key, bundle) in &self.mapping {
            for slot_id in bundle.image_config.keys() {
                if !Slot::ALL.iter().any(|s| s.id() == slot_id) {
                    warnings.push(format!("{key}: imageConfig names unknown slot {slot_id:?}"));
                }
            }
        }
        warnings
    }
}
