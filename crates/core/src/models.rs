use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum City {
    Casablanca,
    Rabat,
    Marrakech,
    Tangier,
    ElJadida,
}

impl City {
    /// Roster order. Detection reports cities in this order, not input order.
    pub const ALL: [City; 5] = [
        Self::Casablanca,
        Self::Rabat,
        Self::Marrakech,
        Self::Tangier,
        Self::ElJadida,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Casablanca => "Casablanca",
            Self::Rabat => "Rabat",
            Self::Marrakech => "Marrakech",
            Self::Tangier => "Tangier",
            Self::ElJadida => "El Jadida",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let wanted = value.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|city| city.display_name().to_lowercase() == wanted)
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub is_user: bool,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: true,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_user: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interpretation {
    TravelOptions { origin: City, destination: City },
    Fallback,
}

impl Interpretation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TravelOptions { .. } => "travel_options",
            Self::Fallback => "fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback)
    }
}
