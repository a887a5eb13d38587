//! Forms submitted through the hydrator.
//!
//! Field collection follows what a browser's `FormData` gathers from a
//! `<form>`, and serialization follows a GET form submission: the fields
//! become the action URL's query string.

use scraper::ElementRef;
use url::Url;

use crate::errors::HydrationError;
use crate::request::resolve_against_origin;

/// Declared submission method of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormMethod {
    /// `method="get"` or no method attribute
    #[default]
    Get,
    /// `method="post"`
    Post,
    /// `method="dialog"`
    Dialog,
}

impl FormMethod {
    fn from_attr(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("post") => FormMethod::Post,
            Some("dialog") => FormMethod::Dialog,
            _ => FormMethod::Get,
        }
    }
}

/// A form's action, method and successful controls in document order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HtmlForm {
    /// Action URL as written; empty means the current page
    pub action: String,
    /// Declared method; only GET serialization is performed
    pub method: FormMethod,
    /// Field name/value pairs in document order, duplicates allowed
    pub fields: Vec<(String, String)>,
}

impl HtmlForm {
    /// Creates a GET form targeting `action` with no fields.
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }

    /// Appends a field, keeping any existing field of the same name.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    /// Serializes the fields as `application/x-www-form-urlencoded`.
    pub fn query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.fields)
            .finish()
    }

    /// Builds the GET submission URL: the action with its query replaced by the fields.
    ///
    /// # Errors
    /// - `HydrationError::InvalidUrl` - The action cannot be resolved against `location`
    pub fn submission_url(&self, location: &Url) -> Result<Url, HydrationError> {
        if self.method != FormMethod::Get {
            tracing::warn!(
                method = ?self.method,
                action = %self.action,
                "Only GET serialization is supported, submitting as GET"
            );
        }

        let mut url = if self.action.trim().is_empty() {
            location.clone()
        } else {
            resolve_against_origin(self.action.trim(), location)?
        };

        let query = self.query_string();
        url.set_query((!query.is_empty()).then_some(query.as_str()));
        Ok(url)
    }

    /// Collects the successful controls of a `<form>` element.
    pub(crate) fn from_element(form: ElementRef<'_>) -> Self {
        let mut fields = Vec::new();

        for control in form.descendants().filter_map(ElementRef::wrap) {
            let element = control.value();
            let Some(name) = element.attr("name").filter(|n| !n.is_empty()) else {
                continue;
            };
            if element.attr("disabled").is_some() || in_disabled_fieldset(control, form) {
                continue;
            }

            match element.name() {
                "input" => {
                    if let Some(value) = input_value(control) {
                        fields.push((name.to_string(), value));
                    }
                }
                "select" => {
                    for value in selected_options(control) {
                        fields.push((name.to_string(), value));
                    }
                }
                "textarea" => fields.push((name.to_string(), control.text().collect())),
                _ => {}
            }
        }

        Self {
            action: form.value().attr("action").unwrap_or_default().to_string(),
            method: FormMethod::from_attr(form.value().attr("method")),
            fields,
        }
    }
}

fn input_value(input: ElementRef<'_>) -> Option<String> {
    let element = input.value();
    let input_type = element
        .attr("type")
        .map(|t| t.trim().to_ascii_lowercase())
        .unwrap_or_else(|| "text".to_string());

    match input_type.as_str() {
        "submit" | "button" | "reset" | "image" | "file" => None,
        "checkbox" | "radio" => element
            .attr("checked")
            .map(|_| element.attr("value").unwrap_or("on").to_string()),
        _ => Some(element.attr("value").unwrap_or_default().to_string()),
    }
}

fn selected_options(select: ElementRef<'_>) -> Vec<String> {
    let options: Vec<ElementRef<'_>> = select
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "option" && !option_disabled(*e))
        .collect();

    let selected: Vec<String> = options
        .iter()
        .filter(|o| o.value().attr("selected").is_some())
        .map(|o| option_value(*o))
        .collect();

    if !selected.is_empty() || select.value().attr("multiple").is_some() {
        return selected;
    }

    // A single select with nothing marked shows its first option
    options.first().map(|o| option_value(*o)).into_iter().collect()
}

/// An option is disabled by its own attribute or by a disabled parent `<optgroup>`.
fn option_disabled(option: ElementRef<'_>) -> bool {
    option.value().attr("disabled").is_some()
        || option
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(|group| {
                group.value().name() == "optgroup" && group.value().attr("disabled").is_some()
            })
}

fn option_value(option: ElementRef<'_>) -> String {
    match option.value().attr("value") {
        Some(value) => value.to_string(),
        None => option
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" "),
    }
}

/// Controls inside a disabled fieldset are disabled, except those in its first legend.
fn in_disabled_fieldset(control: ElementRef<'_>, form: ElementRef<'_>) -> bool {
    let mut child = *control;
    for ancestor in control.ancestors() {
        if ancestor.id() == form.id() {
            return false;
        }
        if let Some(fieldset) = ElementRef::wrap(ancestor)
            && fieldset.value().name() == "fieldset"
            && fieldset.value().attr("disabled").is_some()
        {
            let first_legend = fieldset
                .children()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "legend");
            if first_legend.is_none_or(|legend| legend.id() != child.id()) {
                return true;
            }
        }
        child = ancestor;
    }
    false
}
