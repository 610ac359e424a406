use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::City;

pub const ORIGIN_PLACEHOLDER: &str = "{origin}";
pub const DESTINATION_PLACEHOLDER: &str = "{destination}";

const DEFAULT_WELCOME: &str = "Welcome to Morocco Travel Assistant! 🇲🇦

I can help you find routes between:
- Casablanca ⇔ Rabat
- Casablanca ⇔ Marrakech
- Rabat ⇔ Tangier
- Casablanca ⇔ El Jadida

Try these example questions:
🚗 \"What's the best way to get from Casablanca to Rabat?\"
🚂 \"Show me train options from Rabat to Tangier\"
🚦 \"How's the traffic from Casablanca to Marrakech?\"
🗣️ \"كيف يمكنني السفر من الدار البيضاء إلى مراكش؟\"";

const DEFAULT_FALLBACK: &str = "I can help you find routes between major Moroccan cities.
Try asking about travel between:
- Casablanca ⇔ Rabat
- Casablanca ⇔ Marrakech
- Rabat ⇔ Tangier
- Casablanca ⇔ El Jadida";

const DEFAULT_TRAVEL_OPTIONS: &str = "🚗 Travel options from {origin} to {destination}:

🚘 By Car:
⏱️ Estimated time: 2.5 hours
🚦 Traffic conditions:
- A1: moderate traffic
- Average speed: 90 km/h

🚂 By Train:
Next available Al Boraq:
- 🕒 Departure: 10:00
- 🏁 Arrival: 10:45
- 💺 Available seats: 45";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to read templates from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse templates: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("travel options template is missing the `{placeholder}` placeholder")]
    MissingPlaceholder { placeholder: &'static str },

    #[error("template `{field}` must not be empty")]
    Empty { field: &'static str },
}

/// User-facing reply text. Fields missing from a JSON override keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTemplates {
    pub welcome: String,
    pub fallback: String,
    pub travel_options: String,
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        Self {
            welcome: DEFAULT_WELCOME.to_string(),
            fallback: DEFAULT_FALLBACK.to_string(),
            travel_options: DEFAULT_TRAVEL_OPTIONS.to_string(),
        }
    }
}

impl ResponseTemplates {
    pub fn from_json_str(raw: &str) -> Result<Self, TemplateError> {
        let templates: Self = serde_json::from_str(raw)?;
        templates.validate()?;
        Ok(templates)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.fallback.trim().is_empty() {
            return Err(TemplateError::Empty { field: "fallback" });
        }
        if self.welcome.trim().is_empty() {
            return Err(TemplateError::Empty { field: "welcome" });
        }

        for placeholder in [ORIGIN_PLACEHOLDER, DESTINATION_PLACEHOLDER] {
            if !self.travel_options.contains(placeholder) {
                return Err(TemplateError::MissingPlaceholder { placeholder });
            }
        }

        Ok(())
    }

    pub fn render_travel_options(&self, origin: City, destination: City) -> String {
        self.travel_options
            .replace(ORIGIN_PLACEHOLDER, origin.display_name())
            .replace(DESTINATION_PLACEHOLDER, destination.display_name())
    }
}
