//! State-to-image resolution.
//!
//! [`Resolver::resolve`] maps an [`AvatarState`], the derived blink flag and
//! a model's mapping table to one image reference. The slot choice is the
//! ordered rule list [`CASCADE`]; the first rule whose predicate holds wins.

use std::collections::HashMap;

use emg_config::{AssetBundle, LegacyConfig, ModelDefinition, Slot};

use crate::types::AvatarState;

/// Outcome of one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Image chosen from the model's mapping table.
    Asset(String),
    /// Fixed-pattern image for a state the model doesn't map.
    Legacy(String),
    /// A bundle matched but had nothing to show: render nothing.
    Empty,
}

impl Resolution {
    /// The reference string; empty for [`Resolution::Empty`].
    pub fn as_str(&self) -> &str {
        match self {
            Resolution::Asset(r) | Resolution::Legacy(r) => r,
            Resolution::Empty => "",
        }
    }

    /// Whether nothing should be rendered.
    pub fn is_empty(&self) -> bool {
        matches!(self, Resolution::Empty)
    }

    /// Consume into the reference string; empty for [`Resolution::Empty`].
    pub fn into_string(self) -> String {
        match self {
            Resolution::Asset(r) | Resolution::Legacy(r) => r,
            Resolution::Empty => String::new(),
        }
    }
}

/// The two runtime signals the cascade looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cues {
    /// Eyes are currently closed for a blink.
    pub blinking: bool,
    /// Mouth is currently moving.
    pub speaking: bool,
}

/// One step of the slot cascade.
pub struct Rule {
    /// Slot picked when this rule applies.
    pub slot: Slot,
    /// Predicate over the cues and the bundle being resolved.
    pub applies: fn(Cues, &AssetBundle) -> bool,
}

/// Slot priority, highest first. The last rule always applies.
pub const CASCADE: [Rule; 5] = [
    Rule {
        slot: Slot::EyesClosed,
        applies: |cues, bundle| {
            cues.blinking
                && bundle.slot(Slot::EyesClosed).is_some()
                && bundle.slot_config(Slot::EyesClosed).use_for_blink
        },
    },
    Rule {
        slot: Slot::MouthOpen,
        applies: |cues, bundle| {
            cues.speaking
                && bundle.slot(Slot::MouthOpen).is_some()
                && bundle.slot_config(Slot::MouthOpen).use_for_lip_sync
        },
    },
    Rule {
        slot: Slot::MouthClosed,
        applies: |cues, bundle| !cues.speaking && bundle.slot(Slot::MouthClosed).is_some(),
    },
    Rule {
        slot: Slot::EyesOpen,
        applies: |cues, bundle| !cues.blinking && bundle.slot(Slot::EyesOpen).is_some(),
    },
    Rule {
        slot: Slot::Base,
        applies: |_, _| true,
    },
];

/// Pick the slot for `bundle` under `cues`.
pub fn choose_slot(cues: Cues, bundle: &AssetBundle) -> Slot {
    CASCADE
        .iter()
        .find(|rule| (rule.applies)(cues, bundle))
        .map(|rule| rule.slot)
        .unwrap_or(Slot::Base)
}

/// Last path segment of an asset string.
pub fn file_name(asset: &str) -> &str {
    asset
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(asset)
}

/// Locally registered replacements (e.g. in-memory blobs) for model assets.
///
/// Keyed by file name only, so `a/face.png` and `b/face.png` share one
/// entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideRegistry {
    by_file_name: HashMap<String, String>,
}

impl OverrideRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `reference` for every asset whose file name matches `asset`'s.
    pub fn insert(&mut self, asset: &str, reference: impl Into<String>) {
        self.by_file_name
            .insert(file_name(asset).to_string(), reference.into());
    }

    /// Replacement registered under `asset`'s file name, if any.
    pub fn get(&self, asset: &str) -> Option<&str> {
        self.by_file_name.get(file_name(asset)).map(String::as_str)
    }

    /// Number of distinct file names registered.
    pub fn len(&self) -> usize {
        self.by_file_name.len()
    }

    /// Whether no replacement is registered.
    pub fn is_empty(&self) -> bool {
        self.by_file_name.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for OverrideRegistry {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut registry = Self::new();
        for (asset, reference) in iter {
            registry.insert(asset.as_ref(), reference);
        }
        registry
    }
}

/// Already a complete reference: URL, absolute path or explicit relative.
fn is_qualified(asset: &str) -> bool {
    asset.starts_with("http") || asset.starts_with('/') || asset.starts_with("./")
}

/// Resolves avatar states to image references.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    legacy: LegacyConfig,
    overrides: OverrideRegistry,
}

impl Resolver {
    /// Resolver using `legacy` for unmapped states, with no overrides.
    pub fn new(legacy: LegacyConfig) -> Self {
        Self {
            legacy,
            overrides: OverrideRegistry::new(),
        }
    }

    /// Builder-style variant of [`set_overrides`](Self::set_overrides).
    pub fn with_overrides(mut self, overrides: OverrideRegistry) -> Self {
        self.overrides = overrides;
        self
    }

    /// Replace the override registry consulted when joining references.
    pub fn set_overrides(&mut self, overrides: OverrideRegistry) {
        self.overrides = overrides;
    }

    /// The override registry in use.
    pub fn overrides(&self) -> &OverrideRegistry {
        &self.overrides
    }

    /// Resolve `state` against `model`.
    ///
    /// Without a model, with an incomplete state, or when the state's key is
    /// unmapped, the legacy pattern is used. A mapped bundle whose chosen
    /// slot is unset yields [`Resolution::Empty`]; it never falls back.
    pub fn resolve(
        &self,
        state: &AvatarState,
        blinking: bool,
        model: Option<&ModelDefinition>,
    ) -> Resolution {
        let Some(model) = model.filter(|_| state.is_well_formed()) else {
            return Resolution::Legacy(self.legacy_reference(state));
        };
        let Some(own) = model.bundle(&state.activity, &state.emotion) else {
            return Resolution::Legacy(self.legacy_reference(state));
        };

        let mut bundle = own;
        let mut cues = Cues {
            blinking,
            speaking: state.speaking,
        };
        if state.sleep {
            if let Some((_, sleeper)) = model.sleep_bundle() {
                bundle = sleeper;
                cues = Cues {
                    blinking: false,
                    speaking: false,
                };
            }
        }

        match bundle.slot(choose_slot(cues, bundle)) {
            Some(asset) => Resolution::Asset(self.asset_reference(asset, &model.assets_root)),
            None => Resolution::Empty,
        }
    }

    /// Turn a mapping-table asset string into a concrete reference.
    pub fn asset_reference(&self, asset: &str, assets_root: &str) -> String {
        if let Some(local) = self.overrides.get(asset) {
            return local.to_string();
        }
        if is_qualified(asset) {
            return asset.to_string();
        }
        let sep = if assets_root.ends_with('/') { "" } else { "/" };
        format!("{assets_root}{sep}{asset}")
    }

    /// `{base_path}/{emotion}{suffix}{extension}`, where the suffix follows
    /// `speaking` and an empty emotion is replaced by the default one.
    pub fn legacy_reference(&self, state: &AvatarState) -> String {
        let legacy = &self.legacy;
        let emotion = if state.emotion.is_empty() {
            &legacy.default_emotion
        } else {
            &state.emotion
        };
        let suffix = if state.speaking {
            &legacy.talking_suffix
        } else {
            &legacy.silent_suffix
        };
        format!(
            "{}/{}{}{}",
            legacy.base_path, emotion, suffix, legacy.file_extension
        )
    }
}
