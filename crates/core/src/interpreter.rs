use crate::models::{City, Interpretation};
use crate::templates::{ResponseTemplates, TemplateError};

/// Turns free text into either a travel-options reply or the fallback help text.
///
/// Holds only immutable templates, so one instance can be shared across threads
/// and every call is independent of the ones before it.
#[derive(Debug, Clone, Default)]
pub struct QueryInterpreter {
    templates: ResponseTemplates,
}

impl QueryInterpreter {
    pub fn new(templates: ResponseTemplates) -> Result<Self, TemplateError> {
        templates.validate()?;
        Ok(Self { templates })
    }

    pub fn templates(&self) -> &ResponseTemplates {
        &self.templates
    }

    pub fn welcome(&self) -> &str {
        &self.templates.welcome
    }

    pub fn interpret(&self, input: &str) -> Interpretation {
        let found = detect_cities(input);

        match found.as_slice() {
            [origin, destination, ..] => Interpretation::TravelOptions {
                origin: *origin,
                destination: *destination,
            },
            _ => Interpretation::Fallback,
        }
    }

    pub fn render(&self, interpretation: Interpretation) -> String {
        match interpretation {
            Interpretation::TravelOptions {
                origin,
                destination,
            } => self.templates.render_travel_options(origin, destination),
            Interpretation::Fallback => self.templates.fallback.clone(),
        }
    }

    pub fn process(&self, input: &str) -> String {
        self.render(self.interpret(input))
    }
}

/// Roster cities whose lower-cased name occurs anywhere in the lower-cased input.
pub fn detect_cities(input: &str) -> Vec<City> {
    let lower = input.to_lowercase();

    City::ALL
        .into_iter()
        .filter(|city| lower.contains(&city.display_name().to_lowercase()))
        .collect()
}
