use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Composited canvas size used when the description declares none.
pub const DEFAULT_CANVAS: (f64, f64) = (1920.0, 1080.0);

/// Layer image type (`imgType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Texture,
    Sprite,
    /// Any other `imgType`; such layers are drawn but never animated.
    #[serde(other)]
    Other,
}

/// One entry of the `layers` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LayerDescriptor {
    /// Layer image type.
    #[serde(rename = "imgType")]
    pub img_type: ImageKind,
    /// Id of a texture layer.
    #[serde(rename = "textureID", default, deserialize_with = "opt_id")]
    pub texture_id: Option<String>,
    /// Id of a sprite or other layer.
    #[serde(rename = "assignID", default, deserialize_with = "opt_id")]
    pub assign_id: Option<String>,
    /// Width in pixels, on the canvas and in the atlas.
    #[serde(default)]
    pub width: f64,
    /// Height in pixels, on the canvas and in the atlas.
    #[serde(default)]
    pub height: f64,
    /// Canvas x position.
    #[serde(rename = "basePosition_x", default)]
    pub base_position_x: f64,
    /// Canvas y position.
    #[serde(rename = "basePosition_y", default)]
    pub base_position_y: f64,
    /// Source offset inside the shared atlas image.
    #[serde(default)]
    pub x: f64,
    /// Source y offset inside the shared atlas image.
    #[serde(default)]
    pub y: f64,
    /// Stacking position; absent means 0.
    #[serde(rename = "textureZIndex", default)]
    pub texture_z_index: Option<i64>,
    /// Rotating group a texture belongs to.
    #[serde(default, deserialize_with = "opt_id")]
    pub group: Option<String>,
    /// Animation a sprite holder drives.
    #[serde(rename = "animID", default, deserialize_with = "opt_id")]
    pub anim_id: Option<String>,
}

impl LayerDescriptor {
    /// The identifier this layer is addressed by: `textureID` for textures,
    /// `assignID` for sprites and anything else.
    pub fn id(&self) -> Option<&str> {
        let id = match self.img_type {
            ImageKind::Texture => &self.texture_id,
            ImageKind::Sprite | ImageKind::Other => &self.assign_id,
        };
        id.as_deref().filter(|s| !s.is_empty())
    }
}

/// Full pixel dimensions of the shared source image (`TextureNum[0]`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TextureInfo {
    /// Atlas image width in pixels.
    #[serde(rename = "canvasWidth")]
    pub canvas_width: f64,
    /// Atlas image height in pixels.
    #[serde(rename = "canvasHeight")]
    pub canvas_height: f64,
}

/// One sprite animation declaration (`sprites[0][animId][0]`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpriteDescriptor {
    /// Frame layer ids, in play order.
    #[serde(rename = "useTex", default, deserialize_with = "id_list")]
    pub use_tex: Vec<String>,
    /// Frames per second.
    #[serde(default)]
    pub fps: f64,
    /// 0 = once, 1 = loop, 2 = random, 3 = timeline. Other values are kept
    /// so the engine can warn about them.
    #[serde(rename = "loop", default)]
    pub loop_mode: Option<i64>,
    /// Next-frame table for timeline mode.
    #[serde(default)]
    pub timeline: Option<Vec<i64>>,
}

/// A layered atlas scene: layers, their shared texture, sprite animations
/// and rotating layer groups.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AtlasDescription {
    /// Every layer, in declaration order.
    #[serde(default)]
    pub layers: Vec<LayerDescriptor>,
    /// Shared atlas image size; only the first entry is used.
    #[serde(rename = "TextureNum", default)]
    pub texture_num: Vec<TextureInfo>,
    /// Animation declarations; only the first map is used.
    #[serde(default)]
    pub sprites: Vec<BTreeMap<String, Vec<SpriteDescriptor>>>,
    /// Group toggles, kept loose because exporters vary its shape.
    #[serde(rename = "templateGroups", default)]
    pub template_groups: Option<Value>,
    /// Composited canvas width.
    #[serde(rename = "baseCanvasWidth", default)]
    pub base_canvas_width: Option<f64>,
    /// Composited canvas height.
    #[serde(rename = "baseCanvasHeight", default)]
    pub base_canvas_height: Option<f64>,
}

impl AtlasDescription {
    /// Parse an atlas description from JSON.
    pub fn from_json_str(input: &str) -> Result<Self> {
        serde_json::from_str(input).context("failed to parse atlas description JSON")
    }

    /// Load an atlas description from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read atlas description at {}", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("invalid atlas description at {}", path.display()))
    }

    /// Sprite animation declared under `anim_id`, if any.
    pub fn sprite(&self, anim_id: &str) -> Option<&SpriteDescriptor> {
        self.sprites.first()?.get(anim_id)?.first()
    }

    /// Full size of the shared source image, from `TextureNum[0]`.
    pub fn texture_size(&self) -> Option<(f64, f64)> {
        self.texture_num
            .first()
            .map(|t| (t.canvas_width, t.canvas_height))
    }

    /// Composited canvas size; missing or zero dimensions fall back to
    /// [`DEFAULT_CANVAS`] individually.
    pub fn base_canvas(&self) -> (f64, f64) {
        let pick = |v: Option<f64>, fallback: f64| v.filter(|v| *v > 0.0).unwrap_or(fallback);
        (
            pick(self.base_canvas_width, DEFAULT_CANVAS.0),
            pick(self.base_canvas_height, DEFAULT_CANVAS.1),
        )
    }

    /// Which layer groups rotate, derived from `templateGroups`.
    pub fn group_settings(&self) -> BTreeMap<String, bool> {
        self.template_groups
            .as_ref()
            .map(group_settings_from_template)
            .unwrap_or_default()
    }
}

/// Turn a group template into `group name -> enabled`.
///
/// The template is an array whose first element is an object. Each value is
/// either a group name (enabled) or a `[name, flag]` tuple where only the
/// literal string `"false"` disables the group. Other shapes are ignored.
pub fn group_settings_from_template(template: &Value) -> BTreeMap<String, bool> {
    let mut groups = BTreeMap::new();
    let Some(Value::Object(entries)) = template.as_array().and_then(|a| a.first()) else {
        return groups;
    };
    for value in entries.values() {
        match value {
            Value::String(name) => {
                groups.insert(name.clone(), true);
            }
            Value::Array(tuple) => {
                let Some(Value::String(name)) = tuple.first() else {
                    continue;
                };
                let enabled = !matches!(tuple.get(1), Some(Value::String(flag)) if flag == "false");
                groups.insert(name.clone(), enabled);
            }
            _ => {}
        }
    }
    groups
}

/// Identifiers show up as strings or bare numbers depending on the exporter.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Float(n) => n.to_string(),
        }
    }
}

fn opt_id<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<RawId>::deserialize(de)?.map(String::from))
}

fn id_list<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<String>, D::Error> {
    Ok(Vec::<RawId>::deserialize(de)?
        .into_iter()
        .map(String::from)
        .collect())
}
