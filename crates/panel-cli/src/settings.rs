//! Request and settings files

use anyhow::Context;
use panel_core::{BusinessContext, EngineConfig, SimulationConfig, StakeholderGroup};
use panel_provider::ProviderConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// TOML settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) engine: EngineConfig,
    /// Run options used when the request carries none
    pub(crate) simulation: SimulationConfig,
    pub(crate) provider: ProviderConfig,
}

impl Settings {
    /// Load settings, or defaults when no file is given
    pub(crate) fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing settings {}", path.display()))
    }
}

/// JSON run request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RunRequest {
    pub(crate) business_context: BusinessContext,
    pub(crate) stakeholder_groups: Vec<StakeholderGroup>,
    #[serde(default)]
    pub(crate) config: Option<SimulationConfig>,
}

impl RunRequest {
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading request {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing request {}", path.display()))
    }

    /// Run options: the request's own, else the settings file's
    pub(crate) fn effective_config(&self, settings: &Settings) -> SimulationConfig {
        self.config
            .clone()
            .unwrap_or_else(|| settings.simulation.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_core::Depth;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn settings_default_without_file() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.engine.retention_secs, 3_600);
        assert_eq!(settings.provider.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn settings_tables_are_optional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[engine]\ncache_capacity = 32\n\n[provider]\nmodel = \"llama3\"\nbase_url = \"http://localhost:11434/v1\""
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.engine.cache_capacity, 32);
        assert!(settings.engine.cache_enabled);
        assert_eq!(settings.provider.model, "llama3");
        assert_eq!(settings.simulation.people_per_stakeholder, 3);
    }

    #[test]
    fn request_config_wins_over_settings() {
        let request: RunRequest = serde_json::from_str(
            r#"{
                "business_context": {"business_idea": "Bike repair subscriptions"},
                "stakeholder_groups": [
                    {"id": "riders", "name": "Commuters", "questions": ["How often do you get a flat?"]}
                ],
                "config": {"depth": "quick"}
            }"#,
        )
        .unwrap();

        let mut settings = Settings::default();
        settings.simulation.depth = Depth::Comprehensive;
        assert_eq!(request.effective_config(&settings).depth, Depth::Quick);

        let bare = RunRequest {
            config: None,
            ..request
        };
        assert_eq!(bare.effective_config(&settings).depth, Depth::Comprehensive);
    }

    #[test]
    fn missing_request_file_is_reported() {
        let err = RunRequest::load(Path::new("/nonexistent/request.json")).unwrap_err();
        assert!(err.to_string().contains("reading request"));
    }
}
