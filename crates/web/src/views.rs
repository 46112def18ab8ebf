//! The page model served to clients: a title, a breadcrumb trail, and an
//! ordered list of typed widgets. Rendering to markup is the client's
//! concern; the server only decides structure.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse {
    pub title: String,
    pub crumbs: Vec<Crumb>,
    pub content: Vec<Widget>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crumb {
    pub label: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "widget", rename_all = "snake_case")]
pub enum Widget {
    PropertyList(PropertyListView),
    ActionList(ActionListView),
    LogTable(LogTableView),
    Pager(PagerView),
    Form(FormView),
    ErrorBanner(ErrorBannerView),
    Source(SourceView),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropertyListView {
    pub header: Option<String>,
    pub properties: Vec<Property>,
}

impl PropertyListView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(header: impl Into<String>) -> Self {
        Self {
            header: Some(header.into()),
            properties: Vec::new(),
        }
    }

    pub fn property(mut self, label: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.push(Property {
            label: label.into(),
            value,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    pub label: String,
    pub value: PropertyValue,
}

/// How a property cell renders. `Never` is a deliberate marker ("this
/// lease never expires") and is not the same as an absent value, which
/// renders as a `Placeholder`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Timestamp(String),
    Never,
    Placeholder(String),
    Link { label: String, href: String },
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionListView {
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    pub name: String,
    pub href: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogTableView {
    pub rows: Vec<LogRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub event: String,
    pub detail: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PagerView {
    pub offset: i64,
    pub page_size: i64,
    pub prev_uri: Option<String>,
    pub next_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormView {
    pub action: String,
    pub fields: Vec<FormField>,
    pub submit: SubmitControl,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "control", rename_all = "snake_case")]
pub enum FormField {
    Hidden {
        name: String,
        value: String,
    },
    Text {
        name: String,
        label: String,
        value: String,
    },
    Select {
        name: String,
        label: String,
        value: String,
        options: Vec<SelectOption>,
    },
    TextArea {
        name: String,
        label: String,
        value: String,
        error: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitControl {
    pub label: String,
    pub cancel_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBannerView {
    pub title: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceView {
    pub name: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widgets_carry_a_type_tag() {
        let widget = Widget::PropertyList(
            PropertyListView::new().property("Status", PropertyValue::Text("Active".to_string())),
        );
        let json = serde_json::to_value(&widget).expect("widget should serialize");
        assert_eq!(json["widget"], "property_list");
        assert_eq!(json["properties"][0]["label"], "Status");
        assert_eq!(json["properties"][0]["value"]["kind"], "text");
        assert_eq!(json["properties"][0]["value"]["value"], "Active");
    }

    #[test]
    fn never_marker_is_distinct_from_placeholder() {
        let never = serde_json::to_value(PropertyValue::Never).expect("should serialize");
        assert_eq!(never["kind"], "never");
        assert!(never.get("value").is_none());

        let placeholder =
            serde_json::to_value(PropertyValue::Placeholder("No Resource".to_string()))
                .expect("should serialize");
        assert_eq!(placeholder["kind"], "placeholder");
        assert_eq!(placeholder["value"], "No Resource");
    }

    #[test]
    fn form_fields_carry_a_control_tag() {
        let field = FormField::TextArea {
            name: "text".to_string(),
            label: "Text".to_string(),
            value: String::new(),
            error: Some("Required".to_string()),
        };
        let json = serde_json::to_value(&field).expect("field should serialize");
        assert_eq!(json["control"], "text_area");
        assert_eq!(json["error"], "Required");
    }

    #[test]
    fn format_timestamp_renders_utc() {
        let at = DateTime::from_timestamp(0, 0).expect("epoch should be valid");
        assert_eq!(format_timestamp(&at), "1970-01-01 00:00:00 UTC");
    }
}
