//! String-keyed adjustment values supplied by the session/resolver layer.
//!
//! Unknown or missing keys read as zero/false rather than erroring, so new
//! adjustments can roll out without breaking older sidecars. The crop and
//! perspective keys are the persisted schema round-tripped by the engine;
//! everything is texture-space and rotation-invariant.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crop::CropRect;

pub mod keys {
    pub const CROP_CX: &str = "Crop_CX";
    pub const CROP_CY: &str = "Crop_CY";
    pub const CROP_W: &str = "Crop_W";
    pub const CROP_H: &str = "Crop_H";
    pub const CROP_ROTATE90: &str = "Crop_Rotate90";
    pub const CROP_FLIP_H: &str = "Crop_FlipH";
    pub const CROP_STRAIGHTEN: &str = "Crop_Straighten";
    pub const PERSPECTIVE_VERTICAL: &str = "Perspective_Vertical";
    pub const PERSPECTIVE_HORIZONTAL: &str = "Perspective_Horizontal";

    pub const EXPOSURE: &str = "Exposure";
    pub const CONTRAST: &str = "Contrast";
    pub const BLACK_POINT: &str = "BlackPoint";
    pub const SATURATION: &str = "Saturation";
    pub const GAIN_R: &str = "Gain_R";
    pub const GAIN_G: &str = "Gain_G";
    pub const GAIN_B: &str = "Gain_B";
    pub const BW_ENABLED: &str = "BW_Enabled";
    pub const GRAIN_AMOUNT: &str = "Grain_Amount";
    pub const CURVE_ENABLED: &str = "Curve_Enabled";
    pub const LEVELS_ENABLED: &str = "Levels_Enabled";
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Flag(bool),
    Scalar(f32),
}

/// The adjustments mapping consumed from the host UI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustments(BTreeMap<String, Value>);

impl Adjustments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scalar value for `key`; missing keys default to zero, flags coerce
    /// to 0/1.
    pub fn scalar(&self, key: &str) -> f32 {
        match self.0.get(key) {
            Some(Value::Scalar(v)) => *v,
            Some(Value::Flag(true)) => 1.0,
            _ => 0.0,
        }
    }

    /// Like [`Self::scalar`] but with an explicit fallback for keys whose
    /// neutral value is not zero (e.g. per-channel gain).
    pub fn scalar_or(&self, key: &str, default: f32) -> f32 {
        match self.0.get(key) {
            Some(Value::Scalar(v)) => *v,
            Some(Value::Flag(flag)) => {
                if *flag {
                    1.0
                } else {
                    0.0
                }
            }
            None => default,
        }
    }

    /// Boolean value for `key`; missing keys default to false, scalars are
    /// true when non-zero.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Flag(b)) => *b,
            Some(Value::Scalar(v)) => *v != 0.0,
            None => false,
        }
    }

    pub fn set_scalar(&mut self, key: &str, value: f32) {
        self.0.insert(key.to_string(), Value::Scalar(value));
    }

    pub fn set_flag(&mut self, key: &str, value: bool) {
        self.0.insert(key.to_string(), Value::Flag(value));
    }

    pub fn crop_rect(&self) -> CropRect {
        if self.0.contains_key(keys::CROP_CX) {
            CropRect::new(
                self.scalar(keys::CROP_CX),
                self.scalar(keys::CROP_CY),
                self.scalar_or(keys::CROP_W, 1.0),
                self.scalar_or(keys::CROP_H, 1.0),
            )
            .clamped()
        } else {
            CropRect::full()
        }
    }

    pub fn set_crop_rect(&mut self, rect: CropRect) {
        self.set_scalar(keys::CROP_CX, rect.cx);
        self.set_scalar(keys::CROP_CY, rect.cy);
        self.set_scalar(keys::CROP_W, rect.width);
        self.set_scalar(keys::CROP_H, rect.height);
    }

    pub fn rotation_steps(&self) -> i32 {
        (self.scalar(keys::CROP_ROTATE90).round() as i32).rem_euclid(4)
    }

    /// Loads adjustments from the image sidecar JSON, if present and valid.
    pub fn load(image_path: &Path) -> Option<Self> {
        let json = std::fs::read_to_string(sidecar_path(image_path)).ok()?;
        serde_json::from_str(&json).ok()
    }

    /// Saves the current adjustments to the image sidecar JSON.
    pub fn save(&self, image_path: &Path) -> anyhow::Result<()> {
        let sidecar = sidecar_path(image_path);
        if let Some(parent) = sidecar.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(sidecar, json)?;
        Ok(())
    }
}

fn sidecar_path(image_path: &Path) -> PathBuf {
    let dir = image_path.parent().unwrap_or(Path::new("."));
    let filename = image_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    dir.join(".edits").join(format!("{}.json", filename))
}
