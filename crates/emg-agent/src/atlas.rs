//! Texture atlas addressing and the immutable scene the animators run on.
//!
//! A [`Scene`] is built once from an [`AtlasDescription`] and never patched:
//! swapping models means building a new scene.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use emg_config::{AtlasDescription, ImageKind, LayerDescriptor, SpriteDescriptor};

use crate::types::LoopMode;

/// Shortest delay between two frames of a sprite animation.
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

/// An axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Rect {
    /// X coordinate of the right edge.
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Y coordinate of the bottom edge.
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Lies entirely inside a `width` × `height` area anchored at the origin.
    pub fn fits_within(&self, (width, height): (f64, f64)) -> bool {
        self.x >= 0.0 && self.y >= 0.0 && self.right() <= width && self.bottom() <= height
    }
}

/// What a layer is for, from its `imgType`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerKind {
    /// Static crop; may belong to a rotating group.
    Texture { group: Option<String> },
    /// Animation frame holder; may drive a sprite animation.
    Sprite { animation_id: Option<String> },
    Other,
}

/// One positioned, stackable region cropped from the shared atlas image.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasLayer {
    /// Unique layer id (`textureID` or `assignID`).
    pub id: String,
    /// Layer role and its group or animation link.
    pub kind: LayerKind,
    /// Placement in the composited canvas.
    pub dest: Rect,
    /// Top-left corner of the crop inside the atlas image.
    pub source_origin: (f64, f64),
    /// Stacking position; higher draws on top. Defaults to 0.
    pub z_index: i64,
    /// Position in the description's layer list; breaks z-index ties.
    pub order: usize,
}

impl AtlasLayer {
    fn from_descriptor(id: String, layer: &LayerDescriptor, order: usize) -> Self {
        let non_empty = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());
        let kind = match layer.img_type {
            ImageKind::Texture => LayerKind::Texture {
                group: non_empty(&layer.group),
            },
            ImageKind::Sprite => LayerKind::Sprite {
                animation_id: non_empty(&layer.anim_id),
            },
            ImageKind::Other => LayerKind::Other,
        };
        Self {
            id,
            kind,
            dest: Rect {
                x: layer.base_position_x,
                y: layer.base_position_y,
                width: layer.width,
                height: layer.height,
            },
            source_origin: (layer.x, layer.y),
            z_index: layer.texture_z_index.unwrap_or(0),
            order,
        }
    }

    /// The crop taken from the atlas: declared offset, destination size.
    pub fn crop(&self) -> Rect {
        Rect {
            x: self.source_origin.0,
            y: self.source_origin.1,
            width: self.dest.width,
            height: self.dest.height,
        }
    }

    /// Offset that places the atlas behind a layer-sized viewport so the
    /// crop shows through (CSS `background-position` convention).
    pub fn background_offset(&self) -> (f64, f64) {
        (-self.source_origin.0, -self.source_origin.1)
    }

    /// Rotating group this texture belongs to, if any.
    pub fn group(&self) -> Option<&str> {
        match &self.kind {
            LayerKind::Texture { group } => group.as_deref(),
            _ => None,
        }
    }

    /// Animation this sprite holder drives, if any.
    pub fn animation_id(&self) -> Option<&str> {
        match &self.kind {
            LayerKind::Sprite { animation_id } => animation_id.as_deref(),
            _ => None,
        }
    }

    /// Whether this is a texture layer.
    pub fn is_texture(&self) -> bool {
        matches!(self.kind, LayerKind::Texture { .. })
    }
}

/// A declared sprite animation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteAnimation {
    /// Key the animation is declared under.
    pub id: String,
    /// Layer ids shown one at a time, in order.
    pub frames: Vec<String>,
    /// Frames per second as declared.
    pub fps: f64,
    /// How the next frame is picked.
    pub loop_mode: LoopMode,
    /// `timeline[i]` is the frame that follows frame `i`.
    pub timeline: Option<Vec<i64>>,
}

impl SpriteAnimation {
    /// Build from a parsed `sprites` entry.
    pub fn from_descriptor(id: impl Into<String>, sprite: &SpriteDescriptor) -> Self {
        Self {
            id: id.into(),
            frames: sprite.use_tex.clone(),
            fps: sprite.fps,
            loop_mode: LoopMode::from_code(sprite.loop_mode),
            timeline: sprite.timeline.clone(),
        }
    }

    /// Whether `fps` is finite and positive.
    pub fn has_valid_fps(&self) -> bool {
        self.fps.is_finite() && self.fps > 0.0
    }

    /// Delay between frames, `1000 / fps` ms, never below
    /// [`MIN_FRAME_INTERVAL`]. `None` when the frame rate is unusable.
    pub fn frame_interval(&self) -> Option<Duration> {
        if !self.has_valid_fps() {
            return None;
        }
        let interval = Duration::try_from_secs_f64(1.0 / self.fps).ok()?;
        Some(interval.max(MIN_FRAME_INTERVAL))
    }

    /// Timeline successor of `frame`, if the table has an in-range entry.
    pub fn timeline_next(&self, frame: usize) -> Option<usize> {
        let next = *self.timeline.as_ref()?.get(frame)?;
        usize::try_from(next).ok().filter(|n| *n < self.frames.len())
    }
}

/// Layers, animations and group switches of one loaded atlas.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    layers: Vec<AtlasLayer>,
    by_id: HashMap<String, usize>,
    animations: BTreeMap<String, SpriteAnimation>,
    groups: BTreeMap<String, bool>,
    canvas: (f64, f64),
    atlas_size: Option<(f64, f64)>,
}

impl Scene {
    /// Build a scene. Layers without an identifier can't be addressed and
    /// are dropped; on duplicate identifiers the first layer wins.
    pub fn from_description(description: &AtlasDescription) -> Self {
        let mut layers = Vec::with_capacity(description.layers.len());
        let mut by_id = HashMap::new();
        for (order, descriptor) in description.layers.iter().enumerate() {
            let Some(id) = descriptor.id() else {
                tracing::warn!(order, kind = ?descriptor.img_type, "layer has no identifier, skipping");
                continue;
            };
            if by_id.contains_key(id) {
                tracing::warn!(layer_id = %id, order, "duplicate layer identifier, keeping the first");
                continue;
            }
            by_id.insert(id.to_string(), layers.len());
            layers.push(AtlasLayer::from_descriptor(id.to_string(), descriptor, order));
        }

        let animations = description
            .sprites
            .first()
            .into_iter()
            .flatten()
            .filter_map(|(id, declared)| {
                let sprite = declared.first()?;
                Some((id.clone(), SpriteAnimation::from_descriptor(id, sprite)))
            })
            .collect();

        let scene = Self {
            layers,
            by_id,
            animations,
            groups: description.group_settings(),
            canvas: description.base_canvas(),
            atlas_size: description.texture_size(),
        };
        tracing::debug!(
            layers = scene.layers.len(),
            animations = scene.animations.len(),
            groups = scene.groups.len(),
            "scene built"
        );
        scene
    }

    /// Layers in declaration order.
    pub fn layers(&self) -> &[AtlasLayer] {
        &self.layers
    }

    /// Layer with id `id`.
    pub fn layer(&self, id: &str) -> Option<&AtlasLayer> {
        self.by_id.get(id).map(|&i| &self.layers[i])
    }

    /// Every layer id, in declaration order.
    pub fn layer_ids(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.id.as_str())
    }

    /// Animation declared under `id`.
    pub fn animation(&self, id: &str) -> Option<&SpriteAnimation> {
        self.animations.get(id)
    }

    /// Every declared animation, sorted by id.
    pub fn animations(&self) -> impl Iterator<Item = &SpriteAnimation> {
        self.animations.values()
    }

    /// `group name -> enabled`.
    pub fn group_settings(&self) -> &BTreeMap<String, bool> {
        &self.groups
    }

    /// Groups enabled by `templateGroups`, sorted by name.
    pub fn enabled_groups(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .filter(|(_, enabled)| **enabled)
            .map(|(name, _)| name.as_str())
    }

    /// Texture layers tagged with `group`, in declaration order.
    pub fn group_members(&self, group: &str) -> Vec<&AtlasLayer> {
        self.layers
            .iter()
            .filter(|l| l.group() == Some(group))
            .collect()
    }

    /// Size of the composited canvas.
    pub fn canvas_size(&self) -> (f64, f64) {
        self.canvas
    }

    /// Declared size of the shared atlas image.
    pub fn atlas_size(&self) -> Option<(f64, f64)> {
        self.atlas_size
    }

    /// Layers back to front: ascending z-index, declaration order on ties.
    pub fn stacking_order(&self) -> Vec<&AtlasLayer> {
        let mut ordered: Vec<&AtlasLayer> = self.layers.iter().collect();
        ordered.sort_by_key(|l| (l.z_index, l.order));
        ordered
    }

    /// Ids of layers whose crop reaches outside the declared atlas size.
    pub fn crops_out_of_bounds(&self) -> Vec<&str> {
        let Some(size) = self.atlas_size else {
            return Vec::new();
        };
        self.layers
            .iter()
            .filter(|l| !l.crop().fits_within(size))
            .map(|l| l.id.as_str())
            .collect()
    }
}
