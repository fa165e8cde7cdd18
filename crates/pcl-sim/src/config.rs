//! YAML pipeline configuration and JSON output helpers.

use std::error::Error;
use std::fs;
use std::path::Path;

use pcl_core::labels::SpectrumLabel;
use pcl_kspace::KspaceMask;
use pcl_map::{ApodizationConfig, SourceMaskConfig};
use pcl_mcm::CouplingConfig;
use serde::{Deserialize, Serialize};

/// How the `window` command turns a binary mask into windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Taper of the survey mask edges.
    pub apodization: ApodizationConfig,
    /// Optional simulated point-source holes.
    #[serde(default)]
    pub sources: Option<SourceMaskConfig>,
    /// Taper of the point-source holes; holes stay sharp when absent.
    #[serde(default)]
    pub source_apodization: Option<ApodizationConfig>,
    /// Separate survey taper for the spin-2 window.
    #[serde(default)]
    pub spin2_apodization: Option<ApodizationConfig>,
}

/// Settings shared by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Coupling operator settings, which also fix the analysis.
    pub coupling: CouplingConfig,
    #[serde(default)]
    pub window: Option<WindowConfig>,
    /// Fourier stripes removed from maps before analysis.
    #[serde(default)]
    pub kspace: KspaceMask,
    /// Spectra to estimate; every spectrum the operator supports when empty.
    #[serde(default)]
    pub spectra: Vec<SpectrumLabel>,
}

pub fn load_config(path: &Path) -> Result<PipelineConfig, Box<dyn Error>> {
    let text = fs::read_to_string(path)?;
    let config: PipelineConfig = serde_yaml::from_str(&text)?;
    config.coupling.validate()?;
    Ok(config)
}

pub fn write_json(path: &Path, value: &impl Serialize) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcl_core::labels::{AnalysisMode, Convention};
    use pcl_map::ApodizationKind;

    #[test]
    fn minimal_yaml_uses_defaults() {
        let config: PipelineConfig = serde_yaml::from_str("coupling:\n  lmax: 500\n").unwrap();
        assert_eq!(config.coupling, CouplingConfig::new(500));
        assert!(config.window.is_none());
        assert_eq!(config.kspace, KspaceMask::default());
        assert!(config.spectra.is_empty());
    }

    #[test]
    fn full_yaml_round_trips() {
        let text = r#"
coupling:
  lmax: 1000
  niter: 0
  mode: purified
  convention: Dl
  l3_pad: 500
window:
  apodization: { kind: C1, radius_deg: 1.0 }
  sources: { n_holes: 50, hole_radius_arcmin: 10.0, seed: 3 }
  source_apodization: { kind: C1, radius_deg: 0.3 }
kspace:
  vk_mask: [-90.0, 90.0]
spectra: [TT, EE, BB]
"#;
        let config: PipelineConfig = serde_yaml::from_str(text).unwrap();
        assert_eq!(config.coupling.mode, AnalysisMode::Purified);
        assert_eq!(config.coupling.convention, Convention::Dl);
        assert_eq!(config.coupling.l3_pad, 500);
        let window = config.window.as_ref().unwrap();
        assert_eq!(window.apodization.kind, ApodizationKind::C1);
        assert_eq!(window.sources.unwrap().n_holes, 50);
        assert!(window.spin2_apodization.is_none());
        assert_eq!(config.kspace.vk_mask, Some([-90.0, 90.0]));
        assert_eq!(config.kspace.hk_mask, None);
        assert_eq!(config.spectra, vec![SpectrumLabel::TT, SpectrumLabel::EE, SpectrumLabel::BB]);

        let again: PipelineConfig = serde_yaml::from_str(&serde_yaml::to_string(&config).unwrap()).unwrap();
        assert_eq!(again, config);
    }

    #[test]
    fn write_json_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        write_json(&path, &CouplingConfig::new(10)).unwrap();
        let back: CouplingConfig = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, CouplingConfig::new(10));
    }
}
