//! Result converters: raw computation results to display values.
//!
//! Converters are chosen per column, not per unit, so the same unit can
//! feed several display formats. Every converter is total over the three
//! outcomes (`Present`, `Absent`, `Error`) and never panics.
//!
//! | Converter | Renders |
//! |-----------|---------|
//! | [`PassThroughConverter`] | Any payload with default formatting |
//! | [`DateConverter`] | Dates with a fixed `chrono` pattern |
//! | [`TemplateConverter`] | Record fields through `{name}` placeholders |
//! | [`CodedValueConverter`] | Codes through a code → label table |
//! | [`FieldConverter`] | One field of a record, via an inner converter |

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use chrono::NaiveDate;

use cohort_model::{ComputationResult, EngineOptions, ParameterValues, Payload};

/// Formatting inputs available to a converter.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    /// Parameters that were bound for the column's unit.
    pub parameters: &'a ParameterValues,
    /// Date pattern for converters without one of their own.
    pub date_format: &'a str,
    /// Default rendering of `Absent`.
    pub absent: &'a str,
    /// Default rendering of `Error`.
    pub error: &'a str,
}

impl<'a> FormatContext<'a> {
    pub fn new(parameters: &'a ParameterValues, options: &'a EngineOptions) -> Self {
        Self {
            parameters,
            date_format: &options.date_format,
            absent: &options.absent_placeholder,
            error: &options.error_placeholder,
        }
    }
}

/// Converts a computation result into a display value.
pub trait ResultConverter: Send + Sync {
    /// Short name used in logs and column listings.
    fn name(&self) -> &'static str;

    fn convert(&self, result: &ComputationResult, context: &FormatContext<'_>) -> String;
}

/// Optional per-converter overrides for `Absent` and `Error` rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placeholders {
    pub absent: Option<String>,
    pub error: Option<String>,
}

impl Placeholders {
    fn render<F>(&self, result: &ComputationResult, context: &FormatContext<'_>, present: F) -> String
    where
        F: FnOnce(&Payload) -> String,
    {
        match result {
            ComputationResult::Present(payload) => present(payload),
            ComputationResult::Absent => self
                .absent
                .clone()
                .unwrap_or_else(|| context.absent.to_string()),
            ComputationResult::Error(_) => self
                .error
                .clone()
                .unwrap_or_else(|| context.error.to_string()),
        }
    }
}

/// Default rendering of a payload.
pub fn render_payload(payload: &Payload, date_format: &str) -> String {
    match payload {
        Payload::Bool(true) => "Yes".to_string(),
        Payload::Bool(false) => "No".to_string(),
        Payload::Integer(value) => value.to_string(),
        Payload::Decimal(value) => value.to_string(),
        Payload::Text(value) => value.clone(),
        Payload::Date(date) => format_date(*date, date_format),
        Payload::Coded(coded) => coded.label.clone().unwrap_or_else(|| coded.code.clone()),
        Payload::Record(fields) => join(fields.values(), date_format),
        Payload::List(items) => join(items.iter(), date_format),
    }
}

/// Formats a date, falling back to ISO 8601 when `pattern` is not a valid
/// `chrono` format string.
fn format_date(date: NaiveDate, pattern: &str) -> String {
    let mut out = String::new();
    match write!(out, "{}", date.format(pattern)) {
        Ok(()) => out,
        Err(_) => date.to_string(),
    }
}

fn join<'a>(items: impl Iterator<Item = &'a Payload>, date_format: &str) -> String {
    items
        .map(|item| render_payload(item, date_format))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders any payload with default formatting.
#[derive(Debug, Clone, Default)]
pub struct PassThroughConverter {
    placeholders: Placeholders,
}

impl PassThroughConverter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_absent(mut self, display: impl Into<String>) -> Self {
        self.placeholders.absent = Some(display.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, display: impl Into<String>) -> Self {
        self.placeholders.error = Some(display.into());
        self
    }
}

impl ResultConverter for PassThroughConverter {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn convert(&self, result: &ComputationResult, context: &FormatContext<'_>) -> String {
        self.placeholders
            .render(result, context, |payload| render_payload(payload, context.date_format))
    }
}

/// Renders dates with a fixed pattern.
#[derive(Debug, Clone)]
pub struct DateConverter {
    pattern: Option<String>,
    placeholders: Placeholders,
}

impl DateConverter {
    /// Uses the run's configured date format.
    pub fn new() -> Self {
        Self {
            pattern: None,
            placeholders: Placeholders::default(),
        }
    }

    pub fn with_pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            placeholders: Placeholders::default(),
        }
    }
}

impl Default for DateConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultConverter for DateConverter {
    fn name(&self) -> &'static str {
        "date"
    }

    fn convert(&self, result: &ComputationResult, context: &FormatContext<'_>) -> String {
        let pattern = self.pattern.as_deref().unwrap_or(context.date_format);
        self.placeholders
            .render(result, context, |payload| render_payload(payload, pattern))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Substitutes named `{placeholders}` with fields of a record payload.
///
/// Missing fields substitute as the empty string. A scalar payload is
/// substituted for every placeholder, so `"{identifier}"` works on a plain
/// text result. An unterminated `{` is kept literally.
#[derive(Debug, Clone)]
pub struct TemplateConverter {
    template: String,
    segments: Vec<Segment>,
    placeholders: Placeholders,
}

impl TemplateConverter {
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        let segments = parse_template(&template);
        Self {
            template,
            segments,
            placeholders: Placeholders::default(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names in template order.
    pub fn fields(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Field(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    fn render(&self, payload: &Payload, date_format: &str) -> String {
        let mut out = String::with_capacity(self.template.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => match payload {
                    Payload::Record(fields) => {
                        if let Some(value) = fields.get(name) {
                            out.push_str(&render_payload(value, date_format));
                        }
                    }
                    scalar => out.push_str(&render_payload(scalar, date_format)),
                },
            }
        }
        out
    }
}

fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|offset| open + offset) else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        segments.push(Segment::Field(rest[open + 1..close].trim().to_string()));
        rest = &rest[close + 1..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    segments
}

impl ResultConverter for TemplateConverter {
    fn name(&self) -> &'static str {
        "template"
    }

    fn convert(&self, result: &ComputationResult, context: &FormatContext<'_>) -> String {
        self.placeholders
            .render(result, context, |payload| self.render(payload, context.date_format))
    }
}

/// Labels coded values (regimens, eligibility reasons, outcomes).
///
/// Lookup order: the label table, then the label carried by the payload,
/// then the raw code.
#[derive(Debug, Clone, Default)]
pub struct CodedValueConverter {
    labels: BTreeMap<String, String>,
    placeholders: Placeholders,
}

impl CodedValueConverter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_label(mut self, code: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(code.into(), label.into());
        self
    }

    #[must_use]
    pub fn with_labels<I, C, L>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (C, L)>,
        C: Into<String>,
        L: Into<String>,
    {
        for (code, label) in labels {
            self.labels.insert(code.into(), label.into());
        }
        self
    }

    fn label(&self, payload: &Payload, date_format: &str) -> String {
        match payload {
            Payload::Coded(coded) => self
                .labels
                .get(&coded.code)
                .cloned()
                .or_else(|| coded.label.clone())
                .unwrap_or_else(|| coded.code.clone()),
            Payload::Text(code) => self.labels.get(code).cloned().unwrap_or_else(|| code.clone()),
            Payload::List(items) => items
                .iter()
                .map(|item| self.label(item, date_format))
                .collect::<Vec<_>>()
                .join(", "),
            other => render_payload(other, date_format),
        }
    }
}

impl ResultConverter for CodedValueConverter {
    fn name(&self) -> &'static str {
        "coded"
    }

    fn convert(&self, result: &ComputationResult, context: &FormatContext<'_>) -> String {
        self.placeholders
            .render(result, context, |payload| self.label(payload, context.date_format))
    }
}

/// Projects one field out of a record payload and renders it with an
/// inner converter. A record without the field converts as `Absent`.
#[derive(Clone)]
pub struct FieldConverter {
    field: String,
    inner: Arc<dyn ResultConverter>,
}

impl FieldConverter {
    pub fn new(field: impl Into<String>, inner: Arc<dyn ResultConverter>) -> Self {
        Self {
            field: field.into(),
            inner,
        }
    }
}

impl ResultConverter for FieldConverter {
    fn name(&self) -> &'static str {
        "field"
    }

    fn convert(&self, result: &ComputationResult, context: &FormatContext<'_>) -> String {
        match result {
            ComputationResult::Present(payload @ Payload::Record(_)) => {
                let projected =
                    ComputationResult::from_option(payload.field(&self.field).cloned());
                self.inner.convert(&projected, context)
            }
            other => self.inner.convert(other, context),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use cohort_model::CodedValue;

    use super::*;

    fn convert(converter: &dyn ResultConverter, result: &ComputationResult) -> String {
        let parameters = ParameterValues::new();
        let options = EngineOptions::default();
        converter.convert(result, &FormatContext::new(&parameters, &options))
    }

    fn name(family: &str, given: Option<&str>) -> ComputationResult {
        let mut fields = vec![("familyName", Payload::text(family))];
        if let Some(given) = given {
            fields.push(("givenName", Payload::text(given)));
        }
        ComputationResult::Present(Payload::record(fields))
    }

    #[test]
    fn template_formats_names() {
        let converter = TemplateConverter::new("{familyName}, {givenName}");
        assert_eq!(converter.fields(), vec!["familyName", "givenName"]);
        assert_eq!(convert(&converter, &name("Doe", Some("Jane"))), "Doe, Jane");
        assert_eq!(convert(&converter, &name("Doe", None)), "Doe, ");
        assert_eq!(convert(&converter, &ComputationResult::Absent), "");
    }

    #[test]
    fn template_substitutes_scalars_and_keeps_unterminated_braces() {
        let converter = TemplateConverter::new("{identifier}");
        let result = ComputationResult::Present(Payload::text("13939-00012"));
        assert_eq!(convert(&converter, &result), "13939-00012");

        let converter = TemplateConverter::new("UPN {identifier");
        assert_eq!(convert(&converter, &result), "UPN {identifier");
    }

    #[test]
    fn pass_through_renders_each_outcome() {
        let converter = PassThroughConverter::new().with_error("#ERR");
        assert_eq!(
            convert(&converter, &ComputationResult::Present(Payload::Bool(true))),
            "Yes"
        );
        assert_eq!(
            convert(&converter, &ComputationResult::Present(Payload::Decimal(350.0))),
            "350"
        );
        assert_eq!(convert(&converter, &ComputationResult::Absent), "");
        assert_eq!(convert(&converter, &ComputationResult::error("bad obs")), "#ERR");
    }

    #[test]
    fn dates_use_context_or_own_pattern() {
        let date = NaiveDate::from_ymd_opt(2020, 3, 9).unwrap();
        let result = ComputationResult::Present(Payload::Date(date));
        assert_eq!(convert(&DateConverter::new(), &result), "09/03/2020");
        assert_eq!(
            convert(&DateConverter::with_pattern("%Y-%m-%d"), &result),
            "2020-03-09"
        );
        // unknown specifier
        assert_eq!(
            convert(&DateConverter::with_pattern("%Q"), &result),
            "2020-03-09"
        );
    }

    #[test]
    fn coded_values_prefer_table_labels() {
        let converter = CodedValueConverter::new().with_label("AF2B", "AZT+3TC+EFV");
        let coded = |code: &str| ComputationResult::Present(Payload::Coded(CodedValue::new(code)));
        assert_eq!(convert(&converter, &coded("AF2B")), "AZT+3TC+EFV");
        assert_eq!(convert(&converter, &coded("XX1")), "XX1");

        let labelled = ComputationResult::Present(Payload::Coded(
            CodedValue::new("160529").with_label("CD4 count"),
        ));
        assert_eq!(convert(&converter, &labelled), "CD4 count");
    }

    #[test]
    fn field_converter_projects_record() {
        let reason = CodedValueConverter::new().with_label("WHO_STAGE", "WHO stage");
        let converter = FieldConverter::new("reason", Arc::new(reason));
        let record = ComputationResult::Present(Payload::record([
            (
                "date",
                Payload::Date(NaiveDate::from_ymd_opt(2019, 5, 1).unwrap()),
            ),
            ("reason", Payload::Coded(CodedValue::new("WHO_STAGE"))),
        ]));
        assert_eq!(convert(&converter, &record), "WHO stage");

        let without = ComputationResult::Present(Payload::record([("date", Payload::Integer(1))]));
        assert_eq!(convert(&converter, &without), "");
    }
}
