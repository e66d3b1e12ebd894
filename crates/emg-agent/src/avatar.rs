use std::sync::Arc;
use std::time::Instant;

use emg_config::{BlinkConfig, LegacyConfig, ModelDefinition, PlayerConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::blink::BlinkController;
use crate::resolver::{OverrideRegistry, Resolution, Resolver};
use crate::types::AvatarState;

/// One avatar: a model, its live state and the image currently shown.
///
/// Every mutator re-resolves and returns `Some(resolution)` only when the
/// image actually changed, so hosts can skip redundant swaps.
#[derive(Debug)]
pub struct Avatar<R = StdRng> {
    resolver: Resolver,
    model: Option<Arc<ModelDefinition>>,
    state: AvatarState,
    blink: BlinkController<R>,
    blinking: bool,
    current: Resolution,
}

impl Avatar {
    /// Avatar with no model, using `config`'s legacy naming and blink timing.
    pub fn new(config: &PlayerConfig) -> Self {
        Self::with_rng(
            config.legacy.clone(),
            config.blink.clone(),
            StdRng::from_entropy(),
        )
    }
}

impl<R: Rng> Avatar<R> {
    /// Avatar with an explicit blink RNG.
    pub fn with_rng(legacy: LegacyConfig, blink: BlinkConfig, rng: R) -> Self {
        let resolver = Resolver::new(legacy);
        let state = AvatarState::default();
        let current = resolver.resolve(&state, false, None);
        Self {
            resolver,
            model: None,
            state,
            blink: BlinkController::with_rng(blink, rng),
            blinking: false,
            current,
        }
    }

    /// Swap in a whole new model. The blink cycle starts over.
    pub fn set_model(&mut self, model: Arc<ModelDefinition>) -> Option<Resolution> {
        for problem in model.lint() {
            tracing::warn!(%problem, "model definition");
        }
        self.model = Some(model);
        self.reset_blink();
        self.refresh()
    }

    /// Drop the model; only legacy references are produced afterwards.
    pub fn clear_model(&mut self) -> Option<Resolution> {
        self.model = None;
        self.reset_blink();
        self.refresh()
    }

    /// Replace the asset overrides and re-resolve.
    pub fn set_overrides(&mut self, overrides: OverrideRegistry) -> Option<Resolution> {
        self.resolver.set_overrides(overrides);
        self.refresh()
    }

    /// Replace the state and re-resolve. Returns the new image only if it changed.
    pub fn set_state(&mut self, state: AvatarState) -> Option<Resolution> {
        if state.has_ambiguous_key() {
            tracing::warn!(
                activity = %state.activity,
                emotion = %state.emotion,
                "activity or emotion contains '.', mapping key is ambiguous"
            );
        }
        self.state = state;
        self.refresh()
    }

    /// Mouth signal from an external producer (e.g. audio level detection).
    pub fn set_speaking(&mut self, speaking: bool) -> Option<Resolution> {
        if self.state.speaking == speaking {
            return None;
        }
        self.state.speaking = speaking;
        self.refresh()
    }

    /// Force the blink flag, bypassing the auto-blink cycle until the next
    /// change it makes.
    pub fn set_blinking(&mut self, blinking: bool) -> Option<Resolution> {
        self.blinking = blinking;
        self.refresh()
    }

    /// Run auto-blink for the current bundle. Bundles without `autoBlink`
    /// (and unmapped states) keep the eyes open.
    pub fn tick(&mut self, now: Instant) -> Option<Resolution> {
        let enabled = self.auto_blink_enabled();
        let changed = self.blink.tick(now, enabled);
        match changed {
            Some(blinking) => self.set_blinking(blinking),
            None if !enabled && self.blinking => self.set_blinking(false),
            None => None,
        }
    }

    /// When the next auto-blink change is due.
    pub fn next_blink_change(&self) -> Option<Instant> {
        self.blink.next_change()
    }

    /// The image currently resolved.
    pub fn current(&self) -> &Resolution {
        &self.current
    }

    /// The live state.
    pub fn state(&self) -> &AvatarState {
        &self.state
    }

    /// The loaded model, if any.
    pub fn model(&self) -> Option<&ModelDefinition> {
        self.model.as_deref()
    }

    /// Whether the eyes are currently closed for a blink.
    pub fn is_blinking(&self) -> bool {
        self.blinking
    }

    /// Image anchor as object-position percentages; centred without a model.
    pub fn anchor(&self) -> (f64, f64) {
        match &self.model {
            Some(model) => (model.anchor_x * 100.0, model.anchor_y * 100.0),
            None => (50.0, 50.0),
        }
    }

    fn auto_blink_enabled(&self) -> bool {
        self.model
            .as_deref()
            .and_then(|m| m.bundle(&self.state.activity, &self.state.emotion))
            .is_some_and(|bundle| bundle.auto_blink)
    }

    fn reset_blink(&mut self) {
        self.blink.reset();
        self.blinking = false;
    }

    fn refresh(&mut self) -> Option<Resolution> {
        let next = self
            .resolver
            .resolve(&self.state, self.blinking, self.model.as_deref());
        if next == self.current {
            return None;
        }
        tracing::debug!(
            key = %self.state.key(),
            blinking = self.blinking,
            image = next.as_str(),
            "resolution changed"
        );
        self.current = next.clone();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_config::AssetBundle;
    use std::time::Duration;

    fn model() -> Arc<ModelDefinition> {
        let json = r#"{
            "assetsRoot": "/m",
            "anchorX": 0.25,
            "mapping": {
                "idle.neutral": {
                    "base": "n.png", "mouthOpen": "n_talk.png", "eyesClosed": "n_blink.png",
                    "autoBlink": true
                },
                "idle.joy": { "base": "j.png", "eyesClosed": "j_blink.png" }
            }
        }"#;
        Arc::new(ModelDefinition::from_json_str(json).unwrap())
    }

    fn timing() -> BlinkConfig {
        BlinkConfig {
            initial_open_ms: [1000, 1000],
            closed_ms: [100, 100],
            open_ms: [2000, 2000],
        }
    }

    fn avatar() -> Avatar {
        Avatar::with_rng(LegacyConfig::default(), timing(), StdRng::seed_from_u64(0))
    }

    fn asset(path: &str) -> Option<Resolution> {
        Some(Resolution::Asset(path.into()))
    }

    #[test]
    fn starts_on_legacy_and_switches_with_model() {
        let mut avatar = avatar();
        assert_eq!(
            avatar.current(),
            &Resolution::Legacy("/assets/neutral_closed.png".into())
        );
        assert_eq!(avatar.set_model(model()), asset("/m/n.png"));
        assert_eq!(avatar.set_model(model()), None, "same image, no change");
    }

    #[test]
    fn only_real_changes_are_reported() {
        let mut avatar = avatar();
        avatar.set_model(model());
        assert_eq!(avatar.set_speaking(true), asset("/m/n_talk.png"));
        assert_eq!(avatar.set_speaking(true), None);
        assert_eq!(
            avatar.set_state(AvatarState::new("idle", "joy").speaking(true)),
            asset("/m/j.png")
        );
        assert_eq!(avatar.set_state(AvatarState::new("idle", "joy")), None);
    }

    #[test]
    fn auto_blink_runs_only_for_auto_blink_bundles() {
        let mut avatar = avatar();
        avatar.set_model(model());
        let t0 = Instant::now();
        assert_eq!(avatar.tick(t0), None);
        assert_eq!(avatar.tick(t0 + Duration::from_millis(1000)), asset("/m/n_blink.png"));
        assert!(avatar.is_blinking());
        assert_eq!(avatar.tick(t0 + Duration::from_millis(1100)), asset("/m/n.png"));

        avatar.set_state(AvatarState::new("idle", "joy"));
        for step in 0..50 {
            assert_eq!(avatar.tick(t0 + Duration::from_millis(1200 + step * 100)), None);
        }
        assert!(!avatar.is_blinking());
    }

    #[test]
    fn leaving_auto_blink_bundle_mid_blink_opens_eyes() {
        let mut avatar = avatar();
        avatar.set_model(model());
        let t0 = Instant::now();
        avatar.tick(t0);
        avatar.tick(t0 + Duration::from_millis(1000));
        assert!(avatar.is_blinking());

        assert_eq!(
            avatar.set_state(AvatarState::new("idle", "joy")),
            asset("/m/j_blink.png"),
            "blink flag still set until the next tick"
        );
        assert_eq!(avatar.tick(t0 + Duration::from_millis(1010)), asset("/m/j.png"));
        assert!(!avatar.is_blinking());
    }

    #[test]
    fn overrides_and_manual_blink() {
        let mut avatar = avatar();
        avatar.set_model(model());
        let overrides: OverrideRegistry = [("n.png", "blob:n")].into_iter().collect();
        assert_eq!(
            avatar.set_overrides(overrides),
            Some(Resolution::Asset("blob:n".into()))
        );
        assert_eq!(avatar.set_blinking(true), asset("/m/n_blink.png"));
    }

    #[test]
    fn anchor_percentages() {
        let mut avatar = avatar();
        assert_eq!(avatar.anchor(), (50.0, 50.0));
        avatar.set_model(model());
        assert_eq!(avatar.anchor(), (25.0, 50.0));
    }

    #[test]
    fn empty_bundle_suppresses_rendering() {
        let mut model = ModelDefinition::default();
        model
            .mapping
            .insert("idle.neutral".into(), AssetBundle::default());
        let mut avatar = avatar();
        assert_eq!(avatar.set_model(Arc::new(model)), Some(Resolution::Empty));
        assert_eq!(avatar.clear_model(), Some(Resolution::Legacy("/assets/neutral_closed.png".into())));
    }
}
