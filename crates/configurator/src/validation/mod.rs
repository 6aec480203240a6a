//! Rule declarations and the pluggable validation engine.
//!
//! Rules are declared as `[target, kind, {options}]` where the target is a
//! single attribute name or an array of names. Each kind maps to a
//! [`Validator`] built by a factory in the [`ValidatorRegistry`]; the
//! built-in kinds cover the common cases and callers may register their own.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ConfigError, ConfigResult};

pub use builtin::is_empty;

/// A validation rule bound to one or more attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rule {
    /// Attributes the rule applies to.
    pub attributes: Vec<String>,

    /// Validator kind and its options.
    #[serde(flatten)]
    pub spec: RuleSpec,
}

impl Rule {
    /// Create a rule for the given attributes.
    pub fn new<I, S>(attributes: I, kind: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            spec: RuleSpec::new(kind),
        }
    }

    /// Set a validator option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.spec = self.spec.option(key, value);
        self
    }

    /// Parse a rule from its array form: `[target, kind, {options}...]`.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        let Value::Array(items) = value else {
            return Err(ConfigError::InvalidRule(format!(
                "expected an array, got {}",
                describe(value)
            )));
        };
        let Some((target, rest)) = items.split_first() else {
            return Err(ConfigError::InvalidRule("empty rule".to_string()));
        };

        let attributes = parse_target(target)?;
        let spec = RuleSpec::from_items(rest)?;
        Ok(Self { attributes, spec })
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Rule::from_value(&value).map_err(D::Error::custom)
    }
}

/// A validator kind with options, not yet bound to an attribute.
///
/// Columns carry a `RuleSpec` and bind it to their own name on registration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleSpec {
    /// Validator kind (e.g. "string", "integer", "match").
    pub kind: String,

    /// Validator options.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl RuleSpec {
    /// Create a spec with no options.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            options: Map::new(),
        }
    }

    /// Set an option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Bind this spec to an attribute.
    pub fn bind(self, attribute: impl Into<String>) -> Rule {
        Rule {
            attributes: vec![attribute.into()],
            spec: self,
        }
    }

    /// Parse `kind` or `[kind, {options}...]`.
    pub fn from_value(value: &Value) -> ConfigResult<Self> {
        match value {
            Value::String(kind) => Ok(Self::new(kind.clone())),
            Value::Array(items) => Self::from_items(items),
            other => Err(ConfigError::InvalidRule(format!(
                "expected a validator kind or array, got {}",
                describe(other)
            ))),
        }
    }

    fn from_items(items: &[Value]) -> ConfigResult<Self> {
        let Some((kind, options)) = items.split_first() else {
            return Err(ConfigError::InvalidRule("missing validator kind".to_string()));
        };
        let Value::String(kind) = kind else {
            return Err(ConfigError::InvalidRule(format!(
                "validator kind must be a string, got {}",
                describe(kind)
            )));
        };

        let mut spec = Self::new(kind.clone());
        for item in options {
            let Value::Object(map) = item else {
                return Err(ConfigError::InvalidRule(format!(
                    "options for '{kind}' must be objects, got {}",
                    describe(item)
                )));
            };
            spec.options
                .extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(spec)
    }
}

impl<'de> Deserialize<'de> for RuleSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RuleSpec::from_value(&value).map_err(D::Error::custom)
    }
}

fn parse_target(target: &Value) -> ConfigResult<Vec<String>> {
    match target {
        Value::String(name) => Ok(vec![name.clone()]),
        Value::Array(names) if !names.is_empty() => names
            .iter()
            .map(|name| match name {
                Value::String(name) => Ok(name.clone()),
                other => Err(ConfigError::InvalidRuleTarget(format!(
                    "array containing {}",
                    describe(other)
                ))),
            })
            .collect(),
        Value::Array(_) => Err(ConfigError::InvalidRuleTarget("empty array".to_string())),
        other => Err(ConfigError::InvalidRuleTarget(describe(other))),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "a boolean".to_string(),
        Value::Number(_) => "a number".to_string(),
        Value::String(_) => "a string".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
    }
}

/// Field-level validation error recorded on a filter model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Attribute that failed validation.
    pub attribute: String,

    /// Error message, with `{attribute}` already replaced by the label.
    pub message: String,
}

impl FieldError {
    /// Create a field error.
    pub fn new(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            message: message.into(),
        }
    }
}

/// Checks a single attribute value.
///
/// Returning `Ok(Some(value))` replaces the attribute value with a normalized
/// one; `Err(message)` records a field error. Messages may use the
/// `{attribute}` placeholder.
pub trait Validator: Send + Sync + fmt::Debug {
    /// Validate (and optionally normalize) a value.
    fn validate(&self, value: &Value) -> Result<Option<Value>, String>;

    /// Whether empty values (null, "", []) bypass this validator.
    fn skip_on_empty(&self) -> bool {
        true
    }
}

/// Typed access to a rule's options, reporting bad values as
/// [`ConfigError::InvalidRuleOption`].
#[derive(Debug, Clone, Copy)]
pub struct RuleOptions<'a> {
    kind: &'a str,
    options: &'a Map<String, Value>,
}

impl<'a> RuleOptions<'a> {
    fn new(spec: &'a RuleSpec) -> Self {
        Self {
            kind: &spec.kind,
            options: &spec.options,
        }
    }

    /// Raw option value.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.options.get(key)
    }

    /// Build an option error for this rule.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidRuleOption {
            validator: self.kind.to_string(),
            option: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Optional non-negative integer option.
    pub fn usize(&self, key: &str) -> ConfigResult<Option<usize>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(key, "expected a non-negative integer")),
        }
    }

    /// Optional numeric option.
    pub fn f64(&self, key: &str) -> ConfigResult<Option<f64>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => value
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "expected a number")),
        }
    }

    /// Optional boolean option, defaulting to `false`.
    pub fn flag(&self, key: &str) -> ConfigResult<bool> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.invalid(key, "expected a boolean")),
        }
    }

    /// Optional string option.
    pub fn string(&self, key: &str) -> ConfigResult<Option<&'a str>> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(_) => Err(self.invalid(key, "expected a string")),
        }
    }

    /// Mandatory string option.
    pub fn required_string(&self, key: &str) -> ConfigResult<&'a str> {
        self.string(key)?
            .ok_or_else(|| self.invalid(key, "option is required"))
    }
}

/// Builds a validator from rule options.
pub type ValidatorFactory =
    Arc<dyn Fn(RuleOptions<'_>) -> ConfigResult<Arc<dyn Validator>> + Send + Sync>;

/// A rule whose validator has been built.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    /// Attributes the rule applies to.
    pub attributes: Vec<String>,

    /// Validator kind, for diagnostics.
    pub kind: String,

    /// Message override (`message` option).
    pub message: Option<String>,

    /// The validator instance.
    pub validator: Arc<dyn Validator>,
}

impl CompiledRule {
    /// Whether the rule targets the given attribute.
    pub fn applies_to(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}

/// Registry of validator kinds.
///
/// Kind name -> factory. `ValidatorRegistry::default()` has the built-in
/// kinds pre-registered.
pub struct ValidatorRegistry {
    factories: HashMap<String, ValidatorFactory>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        builtin::register_builtins(&mut registry);
        registry
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<_> = self.kinds();
        kinds.sort_unstable();
        f.debug_struct("ValidatorRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl ValidatorRegistry {
    /// Create a registry without any kinds.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) a validator kind.
    pub fn register<F>(&mut self, kind: &str, factory: F)
    where
        F: Fn(RuleOptions<'_>) -> ConfigResult<Arc<dyn Validator>> + Send + Sync + 'static,
    {
        self.factories.insert(kind.to_string(), Arc::new(factory));
    }

    /// Whether a kind is registered.
    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// List registered kinds.
    pub fn kinds(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    /// Build the validator for a rule.
    pub fn compile(&self, rule: &Rule) -> ConfigResult<CompiledRule> {
        let factory = self
            .factories
            .get(&rule.spec.kind)
            .ok_or_else(|| ConfigError::UnknownValidator(rule.spec.kind.clone()))?;

        let options = RuleOptions::new(&rule.spec);
        let message = options.string("message")?.map(str::to_string);
        let validator = factory(options)?;

        Ok(CompiledRule {
            attributes: rule.attributes.clone(),
            kind: rule.spec.kind.clone(),
            message,
            validator,
        })
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rule_from_single_target() {
        let rule = Rule::from_value(&json!(["age", "integer", {"min": 0}])).unwrap();
        assert_eq!(rule.attributes, vec!["age"]);
        assert_eq!(rule.spec.kind, "integer");
        assert_eq!(rule.spec.options.get("min"), Some(&json!(0)));
    }

    #[test]
    fn rule_from_array_target() {
        let rule = Rule::from_value(&json!([["first_name", "last_name"], "string"])).unwrap();
        assert_eq!(rule.attributes, vec!["first_name", "last_name"]);
        assert!(rule.spec.options.is_empty());
    }

    #[test]
    fn rule_target_must_be_string_or_string_array() {
        let err = Rule::from_value(&json!([42, "integer"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRuleTarget(_)));

        let err = Rule::from_value(&json!([["a", 1], "integer"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRuleTarget(_)));

        let err = Rule::from_value(&json!([[], "integer"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRuleTarget(_)));
    }

    #[test]
    fn rule_requires_kind() {
        let err = Rule::from_value(&json!(["age"])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRule(_)));
    }

    #[test]
    fn rule_deserializes_from_yaml() {
        let rules: Vec<Rule> =
            serde_yml::from_str("- [name, string, {max: 64}]\n- [[a, b], safe]\n").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].spec.options.get("max"), Some(&json!(64)));
        assert_eq!(rules[1].attributes, vec!["a", "b"]);
    }

    #[test]
    fn rule_spec_forms() {
        assert_eq!(RuleSpec::from_value(&json!("safe")).unwrap().kind, "safe");
        let spec = RuleSpec::from_value(&json!(["string", {"max": 64}])).unwrap();
        assert_eq!(spec.options.get("max"), Some(&json!(64)));
        assert!(RuleSpec::from_value(&json!(12)).is_err());
    }

    #[test]
    fn compile_unknown_kind_fails() {
        let registry = ValidatorRegistry::default();
        let err = registry.compile(&Rule::new(["a"], "telepathy")).unwrap_err();
        assert_eq!(err, ConfigError::UnknownValidator("telepathy".to_string()));
    }

    #[test]
    fn compile_reads_message_override() {
        let registry = ValidatorRegistry::default();
        let rule = Rule::new(["a"], "required").option("message", "Fill in {attribute}.");
        let compiled = registry.compile(&rule).unwrap();
        assert_eq!(compiled.message.as_deref(), Some("Fill in {attribute}."));
        assert!(compiled.applies_to("a"));
        assert!(!compiled.applies_to("b"));
    }

    #[test]
    fn custom_kind_can_be_registered() {
        #[derive(Debug)]
        struct Even;
        impl Validator for Even {
            fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
                match value.as_i64() {
                    Some(n) if n % 2 == 0 => Ok(None),
                    _ => Err("{attribute} must be even.".to_string()),
                }
            }
        }

        let mut registry = ValidatorRegistry::default();
        registry.register("even", |_| Ok(Arc::new(Even) as Arc<dyn Validator>));
        let compiled = registry.compile(&Rule::new(["n"], "even")).unwrap();
        assert!(compiled.validator.validate(&json!(4)).is_ok());
        assert!(compiled.validator.validate(&json!(3)).is_err());
    }

    #[test]
    fn bad_option_type_is_reported() {
        let registry = ValidatorRegistry::default();
        let err = registry
            .compile(&Rule::new(["a"], "string").option("max", "long"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRuleOption { ref option, .. } if option == "max"));
    }
}
