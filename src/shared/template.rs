//! Report Templates
//!
//! A template is a named, ordered list of typed input components. The capture
//! form is generated from it: one input per component, repeated per page.

use serde::{Deserialize, Serialize};

use crate::shared::report::ComponentKind;

/// Identifier of the template that ships with the client
pub const TEST_TEMPLATE_ID: &str = "test-template";

/// Template as returned by `GET /api/templates` and `GET /api/templates/{id}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub components: Vec<TemplateComponent>,
}

/// One input slot declared by a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateComponent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(default)]
    pub data: ComponentData,
}

/// Editor-side settings of a component; only the title matters for capture
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl TemplateComponent {
    pub fn new(id: impl Into<String>, kind: ComponentKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            data: ComponentData {
                title: Some(title.into()),
            },
        }
    }

    /// Display title, empty when the editor left it unset
    pub fn title(&self) -> &str {
        self.data.title.as_deref().unwrap_or("")
    }
}

impl Template {
    /// The built-in template: a title, a photo and a notes field
    ///
    /// Always offered to the user, even when the template list cannot be
    /// fetched from the server.
    pub fn test_template() -> Self {
        Self {
            id: TEST_TEMPLATE_ID.to_string(),
            title: "Test Template".to_string(),
            description: "Simple test template with title, image, and text".to_string(),
            components: vec![
                TemplateComponent::new("comp-title-1", ComponentKind::Text, "Title"),
                TemplateComponent::new("comp-image-1", ComponentKind::Image, "Photo"),
                TemplateComponent::new("comp-text-1", ComponentKind::Text, "Notes"),
            ],
        }
    }

    pub fn is_test_template(&self) -> bool {
        self.id == TEST_TEMPLATE_ID
    }

    /// Look up a declared component by id
    pub fn component(&self, component_id: &str) -> Option<&TemplateComponent> {
        self.components.iter().find(|c| c.id == component_id)
    }
}
