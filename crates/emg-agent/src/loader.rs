use std::path::Path;

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};

use crate::atlas::{AtlasLayer, Scene};
use crate::types::Frame;

/// The decoded shared image every layer of a scene crops from.
pub struct AtlasImage {
    image: DynamicImage,
}

impl AtlasImage {
    /// Decode an atlas from raw PNG bytes.
    pub fn from_bytes(png: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(png).context("failed to decode atlas PNG")?;
        Ok(Self { image })
    }

    /// Load an atlas PNG from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let png =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_bytes(&png).with_context(|| format!("invalid atlas image {}", path.display()))
    }

    /// Pixel width and height of the decoded atlas.
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Ensure the image matches the size the scene declares in `TextureNum`.
    /// Scenes that declare no size are accepted as-is.
    pub fn check_declared(&self, scene: &Scene) -> Result<()> {
        let Some((declared_w, declared_h)) = scene.atlas_size() else {
            return Ok(());
        };
        let (w, h) = self.dimensions();
        if f64::from(w) != declared_w || f64::from(h) != declared_h {
            bail!(
                "atlas image is {w}×{h} but the description declares \
                 {declared_w}×{declared_h}"
            );
        }
        Ok(())
    }

    /// Cut one layer's region out of the atlas as RGBA pixels.
    pub fn crop_layer(&self, layer: &AtlasLayer) -> Result<Frame> {
        let rect = layer.crop();
        let (w, h) = self.dimensions();
        if !rect.fits_within((f64::from(w), f64::from(h))) {
            bail!(
                "layer {} crop {}×{} at ({}, {}) falls outside the {w}×{h} atlas",
                layer.id,
                rect.width,
                rect.height,
                rect.x,
                rect.y,
            );
        }
        let (x, y) = (rect.x as u32, rect.y as u32);
        let (width, height) = (rect.width as u32, rect.height as u32);
        let sub = self.image.crop_imm(x, y, width, height);
        Ok(Frame {
            data: sub.to_rgba8().into_raw(),
            width,
            height,
        })
    }

    /// Crop every layer of `scene`, in declaration order.
    pub fn crop_all(&self, scene: &Scene) -> Result<Vec<(String, Frame)>> {
        scene
            .layers()
            .iter()
            .map(|layer| Ok((layer.id.clone(), self.crop_layer(layer)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emg_config::AtlasDescription;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    /// 4×2 atlas whose pixel at (x, y) has red = x, green = y.
    fn atlas_png() -> Vec<u8> {
        let img = RgbaImage::from_fn(4, 2, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        png
    }

    fn scene(declared: &str, layers: &str) -> Scene {
        let json = format!(r#"{{ {declared} "layers": [{layers}] }}"#);
        Scene::from_description(&AtlasDescription::from_json_str(&json).unwrap())
    }

    #[test]
    fn crops_layer_region() {
        let atlas = AtlasImage::from_bytes(&atlas_png()).unwrap();
        let scene = scene(
            "",
            r#"{ "imgType": "Texture", "textureID": "t", "width": 2, "height": 1, "x": 2, "y": 1,
                 "basePosition_x": 100, "basePosition_y": 100 }"#,
        );
        let frame = atlas.crop_layer(scene.layer("t").unwrap()).unwrap();
        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(frame.data, [2, 1, 0, 255, 3, 1, 0, 255]);
    }

    #[test]
    fn out_of_bounds_crop_is_an_error() {
        let atlas = AtlasImage::from_bytes(&atlas_png()).unwrap();
        let scene = scene(
            "",
            r#"{ "imgType": "Texture", "textureID": "t", "width": 3, "height": 1, "x": 2, "y": 0 }"#,
        );
        let err = atlas
            .crop_layer(scene.layer("t").unwrap())
            .unwrap_err()
            .to_string();
        assert!(err.contains("falls outside"), "{err}");
        assert!(atlas.crop_all(&scene).is_err());
    }

    #[test]
    fn declared_size_must_match() {
        let atlas = AtlasImage::from_bytes(&atlas_png()).unwrap();
        assert_eq!(atlas.dimensions(), (4, 2));

        let ok = scene(r#""TextureNum": [{ "canvasWidth": 4, "canvasHeight": 2 }],"#, "");
        assert!(atlas.check_declared(&ok).is_ok());

        let wrong = scene(r#""TextureNum": [{ "canvasWidth": 8, "canvasHeight": 2 }],"#, "");
        let err = atlas.check_declared(&wrong).unwrap_err().to_string();
        assert!(err.contains("declares 8×2"), "{err}");

        assert!(atlas.check_declared(&scene("", "")).is_ok());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let err = AtlasImage::from_bytes(b"not a png").err().unwrap().to_string();
        assert!(err.contains("failed to decode atlas PNG"));
    }
}
