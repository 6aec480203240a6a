//! Runtime filter model bound to request input.
//!
//! The filter model is a map-backed entity: its attribute set is discovered
//! from rule declarations (plus the `columns` pseudo-attribute), values are
//! loaded from the request under the form name, and validation failures are
//! recorded as field errors rather than returned.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::label::{LabelMap, humanize};
use crate::validation::{CompiledRule, FieldError, Rule, ValidatorRegistry, is_empty};

/// Name of the pseudo-attribute carrying the ordered column allowlist.
pub const COLUMNS_ATTRIBUTE: &str = "columns";

/// Pattern rule applied to the `columns` attribute.
pub const COLUMNS_PATTERN: &str = r"^[-\w+\s,]*$";

/// Default form name used to scope input values.
pub const DEFAULT_FORM_NAME: &str = "DynamicModel";

/// Validated filter state for one grid configuration.
#[derive(Debug, Clone, Serialize)]
pub struct FilterModel {
    form_name: String,

    /// Attribute names in definition order.
    attributes: Vec<String>,

    values: BTreeMap<String, Value>,

    labels: LabelMap,

    errors: Vec<FieldError>,

    /// Form data as submitted, kept so attributes defined after loading
    /// still pick up their value.
    #[serde(skip)]
    input: Map<String, Value>,

    #[serde(skip)]
    rules: Vec<CompiledRule>,
}

impl FilterModel {
    /// Create an empty model scoped to `form_name`.
    pub fn new(form_name: impl Into<String>) -> Self {
        Self {
            form_name: form_name.into(),
            attributes: Vec::new(),
            values: BTreeMap::new(),
            labels: LabelMap::new(),
            errors: Vec::new(),
            input: Map::new(),
            rules: Vec::new(),
        }
    }

    /// Form name used to scope input values.
    pub fn form_name(&self) -> &str {
        &self.form_name
    }

    /// Set the form name.
    pub fn set_form_name(&mut self, form_name: impl Into<String>) {
        self.form_name = form_name.into();
    }

    /// Define an attribute. Defining an existing attribute is a no-op.
    ///
    /// If form data has already been loaded, the new attribute takes its
    /// submitted value.
    pub fn define_attribute(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.has_attribute(&name) {
            return;
        }
        if let Some(value) = self.input.get(&name) {
            self.values.insert(name.clone(), value.clone());
        }
        self.attributes.push(name);
    }

    /// Whether the attribute is defined.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    /// Attribute names in definition order.
    pub fn attributes(&self) -> &[String] {
        &self.attributes
    }

    /// Current value of an attribute. Undefined attributes and null values
    /// read as `None`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name).filter(|v| !v.is_null())
    }

    /// Current value as a string slice.
    pub fn str_value(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// Set an attribute value. Undefined attributes are ignored.
    pub fn set_value(&mut self, name: &str, value: Value) {
        if self.has_attribute(name) {
            self.values.insert(name.to_string(), value);
        }
    }

    /// All values keyed by attribute.
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Label for an attribute or column.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name)
    }

    /// Set a label.
    pub fn set_label(&mut self, name: impl Into<String>, label: impl Into<String>) {
        self.labels.insert(name.into(), label.into());
    }

    /// All labels: rule attributes first, then columns in registration
    /// order.
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// Attach a compiled rule.
    pub fn add_rule(&mut self, rule: CompiledRule) {
        self.rules.push(rule);
    }

    /// Load values from request input.
    ///
    /// Values are read from `input[form_name]`; only defined attributes are
    /// assigned. Returns `false` when the input carries no data for this form.
    pub fn load(&mut self, input: &Value) -> bool {
        let Some(Value::Object(data)) = input.get(&self.form_name) else {
            return false;
        };

        self.input = data.clone();
        for (name, value) in data {
            if self.has_attribute(name) {
                self.values.insert(name.clone(), value.clone());
            } else {
                debug!(form = %self.form_name, attribute = %name, "ignoring unknown filter input");
            }
        }
        true
    }

    /// Run every rule against every attribute it targets.
    ///
    /// Errors are recorded on the model; returns `true` when none occurred.
    pub fn validate(&mut self) -> bool {
        self.errors.clear();
        let rules = self.rules.clone();
        for rule in &rules {
            for attribute in &rule.attributes {
                self.run_rule(rule, attribute);
            }
        }
        self.errors.is_empty()
    }

    /// Validate a single attribute against the rules that target it.
    ///
    /// Used for attributes defined after the initial validation pass; errors
    /// from earlier passes are kept.
    pub fn validate_attribute(&mut self, attribute: &str) -> bool {
        self.errors.retain(|e| e.attribute != attribute);
        let rules: Vec<CompiledRule> = self
            .rules
            .iter()
            .filter(|r| r.applies_to(attribute))
            .cloned()
            .collect();
        for rule in &rules {
            self.run_rule(rule, attribute);
        }
        !self.has_error(attribute)
    }

    fn run_rule(&mut self, rule: &CompiledRule, attribute: &str) {
        if self.has_error(attribute) {
            return;
        }

        let value = self.values.get(attribute).cloned().unwrap_or(Value::Null);
        if rule.validator.skip_on_empty() && is_empty(&value) {
            return;
        }

        match rule.validator.validate(&value) {
            Ok(Some(normalized)) => {
                self.values.insert(attribute.to_string(), normalized);
            }
            Ok(None) => {}
            Err(message) => {
                let template = rule.message.as_deref().unwrap_or(&message);
                let label = self
                    .label(attribute)
                    .map(str::to_string)
                    .unwrap_or_else(|| humanize(attribute));
                debug!(attribute = %attribute, validator = %rule.kind, "filter value rejected");
                self.errors.push(FieldError::new(
                    attribute,
                    template.replace("{attribute}", &label),
                ));
            }
        }
    }

    /// Whether an attribute has a recorded error.
    pub fn has_error(&self, attribute: &str) -> bool {
        self.errors.iter().any(|e| e.attribute == attribute)
    }

    /// Whether any errors are recorded.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Recorded field errors in validation order.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// First error message for an attribute.
    pub fn first_error(&self, attribute: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.attribute == attribute)
            .map(|e| e.message.as_str())
    }

    /// Ordered column allowlist from the `columns` attribute.
    ///
    /// Comma separated, trimmed, blank entries dropped. Missing or empty
    /// input yields an empty list.
    pub fn column_order(&self) -> Vec<String> {
        self.str_value(COLUMNS_ATTRIBUTE)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Builds a bound and validated [`FilterModel`] from rule declarations.
#[derive(Debug, Clone, Copy)]
pub struct FilterModelBuilder<'a> {
    validators: &'a ValidatorRegistry,
}

impl<'a> FilterModelBuilder<'a> {
    /// Create a builder using the given validator kinds.
    pub fn new(validators: &'a ValidatorRegistry) -> Self {
        Self { validators }
    }

    /// Build the model: discover attributes, attach rules, add the `columns`
    /// attribute, label everything, load `input` and validate.
    pub fn build(&self, rules: &[Rule], input: &Value, form_name: &str) -> ConfigResult<FilterModel> {
        let attributes = filter_attributes(rules)?;

        let mut model = FilterModel::new(form_name);
        for attribute in &attributes {
            model.define_attribute(attribute.clone());
        }
        for rule in rules {
            model.add_rule(self.validators.compile(rule)?);
        }

        model.define_attribute(COLUMNS_ATTRIBUTE);
        let columns_rule =
            Rule::new([COLUMNS_ATTRIBUTE], "match").option("pattern", COLUMNS_PATTERN);
        model.add_rule(self.validators.compile(&columns_rule)?);

        for attribute in &attributes {
            model.set_label(attribute.clone(), humanize(attribute));
        }

        let loaded = model.load(input);
        let valid = model.validate();
        debug!(
            form = %form_name,
            attributes = attributes.len(),
            loaded,
            valid,
            "filter model built"
        );

        Ok(model)
    }
}

/// De-duplicated rule targets in first-seen order.
pub fn filter_attributes(rules: &[Rule]) -> ConfigResult<Vec<String>> {
    let mut attributes: Vec<String> = Vec::new();
    for rule in rules {
        if rule.attributes.is_empty() {
            return Err(ConfigError::InvalidRuleTarget("empty array".to_string()));
        }
        for attribute in &rule.attributes {
            if !attributes.contains(attribute) {
                attributes.push(attribute.clone());
            }
        }
    }
    Ok(attributes)
}
