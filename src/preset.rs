//! Soundscape presets
//!
//! A preset names a noise color and a binaural tone pair: the carrier goes
//! to the left ear, carrier + beat to the right. Presets are immutable once
//! loaded; the library rejects duplicate ids.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::dsp::NoiseColor;
use crate::error::{LullError, Result};

/// Beat frequencies outside this range have no known perceptual effect
pub const PERCEPTUAL_BEAT_RANGE: (f64, f64) = (0.5, 40.0);

/// Short unique preset key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetId(String);

impl PresetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PresetId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for PresetId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// A noise bed plus binaural tone pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundPreset {
    pub id: PresetId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Left-ear tone in Hz
    pub base_carrier_frequency: f64,
    /// Right-ear offset in Hz; the perceived beat
    pub beat_frequency: f64,
    pub noise_color: NoiseColor,
}

impl SoundPreset {
    pub fn new(
        id: impl Into<String>,
        base_carrier_frequency: f64,
        beat_frequency: f64,
        noise_color: NoiseColor,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id: PresetId(id),
            description: String::new(),
            base_carrier_frequency,
            beat_frequency,
            noise_color,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Left-ear tone frequency
    pub fn left_frequency(&self) -> f64 {
        self.base_carrier_frequency
    }

    /// Right-ear tone frequency
    pub fn right_frequency(&self) -> f64 {
        self.base_carrier_frequency + self.beat_frequency
    }

    /// The beat only exists with one tone per ear
    pub fn requires_headphones(&self) -> bool {
        true
    }

    /// Reject presets that cannot be played
    ///
    /// # Errors
    /// * `InvalidPreset` - Empty id, or a non-positive / non-finite frequency
    pub fn validate(&self) -> Result<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(LullError::invalid_preset("", "id must not be empty"));
        }
        check_frequency(&self.id, "base carrier frequency", self.base_carrier_frequency)?;
        check_frequency(&self.id, "beat frequency", self.beat_frequency)?;
        if !self.right_frequency().is_finite() {
            return Err(LullError::invalid_preset(
                self.id.as_str(),
                "carrier + beat overflows",
            ));
        }

        let (low, high) = PERCEPTUAL_BEAT_RANGE;
        if self.beat_frequency < low || self.beat_frequency > high {
            warn!(
                preset = %self.id,
                beat_hz = self.beat_frequency,
                "beat frequency outside the {}-{} Hz perceptual range",
                low,
                high
            );
        }
        Ok(())
    }
}

fn check_frequency(id: &PresetId, what: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(LullError::invalid_preset(
            id.as_str(),
            format!("{} must be a positive number of Hz, got {}", what, value),
        ));
    }
    Ok(())
}

/// The three soundscapes shipped with the app
pub fn builtin_presets() -> Vec<SoundPreset> {
    vec![
        SoundPreset::new("delta", 100.0, 2.0, NoiseColor::Brown)
            .with_name("Cosmic Delta")
            .with_description(
                "Deep Sleep (0.5 - 4Hz). Heavy brown noise with slow entrainment for deep restorative rest.",
            ),
        SoundPreset::new("theta", 200.0, 6.0, NoiseColor::Pink)
            .with_name("Lucid Theta")
            .with_description(
                "Dreaming & Creativity (4 - 8Hz). Pink noise wash for meditative drift and visual imagery.",
            ),
        SoundPreset::new("alpha", 300.0, 10.0, NoiseColor::Pink)
            .with_name("Solar Alpha")
            .with_description(
                "Relaxed Focus (8 - 14Hz). Lighter masking for reading or winding down before bed.",
            ),
    ]
}

// ============================================================================
// Library
// ============================================================================

#[derive(Debug, Deserialize)]
struct PresetFile {
    #[serde(default, rename = "preset")]
    presets: Vec<SoundPreset>,
}

/// Ordered table of valid presets with unique ids
#[derive(Debug, Clone, Default)]
pub struct PresetLibrary {
    presets: Vec<SoundPreset>,
}

impl PresetLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding [`builtin_presets`]
    pub fn builtin() -> Self {
        Self {
            presets: builtin_presets(),
        }
    }

    /// Add a preset after validating it
    ///
    /// # Errors
    /// * `InvalidPreset` - If the preset fails validation
    /// * `DuplicatePreset` - If the id is already present
    pub fn insert(&mut self, preset: SoundPreset) -> Result<()> {
        preset.validate()?;
        if self.get(preset.id.as_str()).is_some() {
            return Err(LullError::DuplicatePreset {
                preset_id: preset.id.to_string(),
            });
        }
        self.presets.push(preset);
        Ok(())
    }

    /// Parse `[[preset]]` tables from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut library = Self::new();
        library.extend_from_toml_str(text)?;
        Ok(library)
    }

    /// Load a single TOML file
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Load every `*.toml` file under `dir`, in path order
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut library = Self::new();
        let mut files: Vec<_> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().map(|e| e == "toml").unwrap_or(false))
            .collect();
        files.sort();

        for path in files {
            debug!(path = %path.display(), "loading preset file");
            let text = fs::read_to_string(&path)?;
            library.extend_from_toml_str(&text)?;
        }
        Ok(library)
    }

    /// Load from a file or a directory
    pub fn load(path: &Path) -> Result<Self> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::load_file(path)
        }
    }

    /// Add every preset of `other`, keeping ids unique
    pub fn extend(&mut self, other: PresetLibrary) -> Result<()> {
        for preset in other.presets {
            self.insert(preset)?;
        }
        Ok(())
    }

    fn extend_from_toml_str(&mut self, text: &str) -> Result<()> {
        let file: PresetFile = toml::from_str(text)?;
        for preset in file.presets {
            self.insert(preset)?;
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&SoundPreset> {
        self.presets.iter().find(|p| p.id == *id)
    }

    /// Look up a preset or fail with `PresetNotFound`
    pub fn require(&self, id: &str) -> Result<&SoundPreset> {
        self.get(id).ok_or_else(|| LullError::PresetNotFound {
            preset_id: id.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SoundPreset> {
        self.presets.iter()
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_presets_are_valid() {
        let presets = builtin_presets();
        assert_eq!(presets.len(), 3);
        for preset in &presets {
            preset.validate().unwrap();
            assert!(preset.requires_headphones());
        }
        assert_eq!(presets[0].id.as_str(), "delta");
        assert_eq!(presets[0].noise_color, NoiseColor::Brown);
    }

    #[test]
    fn test_binaural_frequencies() {
        let preset = SoundPreset::new("t", 100.0, 2.0, NoiseColor::Brown);
        assert_eq!(preset.left_frequency(), 100.0);
        assert_eq!(preset.right_frequency(), 102.0);
    }

    #[test]
    fn test_validation_rejects_bad_frequencies() {
        for (base, beat) in [(-1.0, 2.0), (0.0, 2.0), (100.0, 0.0), (100.0, -3.0), (f64::NAN, 2.0), (100.0, f64::INFINITY)] {
            let preset = SoundPreset::new("bad", base, beat, NoiseColor::Pink);
            let err = preset.validate().unwrap_err();
            assert_eq!(err.error_code(), "INVALID_PRESET", "{} / {}", base, beat);
        }
    }

    #[test]
    fn test_validation_rejects_empty_id() {
        let preset = SoundPreset::new("  ", 100.0, 2.0, NoiseColor::Pink);
        assert!(preset.validate().is_err());
    }

    #[test]
    fn test_beat_outside_perceptual_range_is_allowed() {
        let preset = SoundPreset::new("wide", 400.0, 80.0, NoiseColor::Pink);
        assert!(preset.validate().is_ok());
    }

    #[test]
    fn test_library_rejects_duplicates() {
        let mut library = PresetLibrary::builtin();
        let err = library
            .insert(SoundPreset::new("delta", 120.0, 3.0, NoiseColor::Brown))
            .unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_PRESET");
        assert_eq!(library.len(), 3);
    }

    #[test]
    fn test_library_from_toml() {
        let text = r#"
            [[preset]]
            id = "gamma"
            name = "Bright Gamma"
            base_carrier_frequency = 400.0
            beat_frequency = 40.0
            noise_color = "pink"

            [[preset]]
            id = "deep"
            base_carrier_frequency = 90.0
            beat_frequency = 1.5
            noise_color = "brown"
        "#;
        let library = PresetLibrary::from_toml_str(text).unwrap();
        assert_eq!(library.len(), 2);
        assert_eq!(library.require("gamma").unwrap().name, "Bright Gamma");
        assert_eq!(library.require("deep").unwrap().noise_color, NoiseColor::Brown);
        assert!(library.require("missing").is_err());
    }

    #[test]
    fn test_library_from_toml_rejects_invalid_entries() {
        let text = r#"
            [[preset]]
            id = "broken"
            base_carrier_frequency = -5.0
            beat_frequency = 2.0
            noise_color = "brown"
        "#;
        let err = PresetLibrary::from_toml_str(text).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_PRESET");
    }

    #[test]
    fn test_load_dir_merges_files_in_order() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("b.toml"),
            "[[preset]]\nid = \"b\"\nbase_carrier_frequency = 200.0\nbeat_frequency = 4.0\nnoise_color = \"pink\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.toml"),
            "[[preset]]\nid = \"a\"\nbase_carrier_frequency = 100.0\nbeat_frequency = 2.0\nnoise_color = \"brown\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let library = PresetLibrary::load(dir.path()).unwrap();
        let ids: Vec<&str> = library.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_extend_builtin_with_user_presets() {
        let mut library = PresetLibrary::builtin();
        let user = PresetLibrary::from_toml_str(
            r#"
            [[preset]]
            id = "gamma"
            base_carrier_frequency = 400.0
            beat_frequency = 40.0
            noise_color = "pink"
            "#,
        )
        .unwrap();
        library.extend(user).unwrap();
        assert_eq!(library.len(), 4);

        let clash = PresetLibrary::from_toml_str(
            r#"
            [[preset]]
            id = "delta"
            base_carrier_frequency = 90.0
            beat_frequency = 1.0
            noise_color = "brown"
            "#,
        )
        .unwrap();
        let err = library.extend(clash).unwrap_err();
        assert_eq!(err.error_code(), "DUPLICATE_PRESET");
    }
}
