//! Built-in validator kinds.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Number, Value};

use super::{RuleOptions, Validator, ValidatorRegistry};
use crate::error::ConfigResult;

/// Null, empty string and empty array count as "no value".
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn shared<V: Validator + 'static>(validator: V) -> Arc<dyn Validator> {
    Arc::new(validator)
}

pub(super) fn register_builtins(registry: &mut ValidatorRegistry) {
    registry.register("required", |_| Ok(shared(Required)));
    registry.register("safe", |_| Ok(shared(Safe)));
    registry.register("string", |o| Ok(shared(StringLength::from_options(o)?)));
    registry.register("integer", |o| {
        Ok(shared(Numeric::from_options(o, true)?))
    });
    registry.register("number", |o| {
        Ok(shared(Numeric::from_options(o, false)?))
    });
    registry.register("boolean", |o| Ok(shared(Boolean::from_options(o)?)));
    registry.register("match", |o| Ok(shared(Pattern::from_options(o)?)));
    registry.register("in", |o| Ok(shared(Range::from_options(o)?)));
    registry.register("email", |_| Ok(shared(Email)));
    registry.register("trim", |_| Ok(shared(Trim)));
    registry.register("default", |o| {
        Ok(shared(DefaultValue {
            value: o.get("value").cloned().unwrap_or(Value::Null),
        }))
    });
}

#[derive(Debug)]
struct Required;

impl Validator for Required {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let blank = is_empty(value) || value.as_str().is_some_and(|s| s.trim().is_empty());
        if blank {
            Err("{attribute} cannot be blank.".to_string())
        } else {
            Ok(None)
        }
    }

    fn skip_on_empty(&self) -> bool {
        false
    }
}

/// Marks an attribute as loadable without constraining it.
#[derive(Debug)]
struct Safe;

impl Validator for Safe {
    fn validate(&self, _value: &Value) -> Result<Option<Value>, String> {
        Ok(None)
    }
}

#[derive(Debug)]
struct StringLength {
    min: Option<usize>,
    max: Option<usize>,
    length: Option<usize>,
}

impl StringLength {
    fn from_options(options: RuleOptions<'_>) -> ConfigResult<Self> {
        Ok(Self {
            min: options.usize("min")?,
            max: options.usize("max")?,
            length: options.usize("length")?,
        })
    }
}

impl Validator for StringLength {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let Value::String(s) = value else {
            return Err("{attribute} must be a string.".to_string());
        };
        let len = s.chars().count();

        if let Some(length) = self.length
            && len != length
        {
            return Err(format!("{{attribute}} should contain {length} characters."));
        }
        if let Some(min) = self.min
            && len < min
        {
            return Err(format!(
                "{{attribute}} should contain at least {min} characters."
            ));
        }
        if let Some(max) = self.max
            && len > max
        {
            return Err(format!(
                "{{attribute}} should contain at most {max} characters."
            ));
        }
        Ok(None)
    }
}

#[derive(Debug)]
struct Numeric {
    integer_only: bool,
    min: Option<f64>,
    max: Option<f64>,
}

impl Numeric {
    fn from_options(options: RuleOptions<'_>, integer_only: bool) -> ConfigResult<Self> {
        Ok(Self {
            integer_only,
            min: options.f64("min")?,
            max: options.f64("max")?,
        })
    }

    fn parse(&self, value: &Value) -> Option<Number> {
        let text = match value {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => return None,
        };
        if let Ok(i) = text.parse::<i64>() {
            return Some(Number::from(i));
        }
        if self.integer_only {
            return None;
        }
        text.parse::<f64>().ok().and_then(Number::from_f64)
    }
}

impl Validator for Numeric {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let Some(number) = self.parse(value) else {
            return Err(if self.integer_only {
                "{attribute} must be an integer.".to_string()
            } else {
                "{attribute} must be a number.".to_string()
            });
        };

        let n = number.as_f64().unwrap_or_default();
        if let Some(min) = self.min
            && n < min
        {
            return Err(format!("{{attribute}} must be no less than {min}."));
        }
        if let Some(max) = self.max
            && n > max
        {
            return Err(format!("{{attribute}} must be no greater than {max}."));
        }
        Ok(Some(Value::Number(number)))
    }
}

#[derive(Debug)]
struct Boolean {
    true_value: String,
    false_value: String,
    strict: bool,
}

impl Boolean {
    fn from_options(options: RuleOptions<'_>) -> ConfigResult<Self> {
        Ok(Self {
            true_value: options.string("true_value")?.unwrap_or("1").to_string(),
            false_value: options.string("false_value")?.unwrap_or("0").to_string(),
            strict: options.flag("strict")?,
        })
    }
}

impl Validator for Boolean {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let text = match value {
            Value::Bool(b) if !self.strict => return Ok(Some(Value::Bool(*b))),
            Value::String(s) => s.clone(),
            Value::Number(n) if !self.strict => n.to_string(),
            _ => String::new(),
        };

        if text == self.true_value || (!self.strict && text == "true") {
            Ok(Some(Value::Bool(true)))
        } else if text == self.false_value || (!self.strict && text == "false") {
            Ok(Some(Value::Bool(false)))
        } else {
            Err(format!(
                "{{attribute}} must be either \"{}\" or \"{}\".",
                self.true_value, self.false_value
            ))
        }
    }
}

#[derive(Debug)]
struct Pattern {
    pattern: Regex,
    not: bool,
}

impl Pattern {
    fn from_options(options: RuleOptions<'_>) -> ConfigResult<Self> {
        let source = options.required_string("pattern")?;
        let pattern = Regex::new(source).map_err(|e| options.invalid("pattern", e.to_string()))?;
        Ok(Self {
            pattern,
            not: options.flag("not")?,
        })
    }
}

impl Validator for Pattern {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let Value::String(s) = value else {
            return Err("{attribute} is invalid.".to_string());
        };
        if self.pattern.is_match(s) != self.not {
            Ok(None)
        } else {
            Err("{attribute} is invalid.".to_string())
        }
    }
}

#[derive(Debug)]
struct Range {
    allowed: Vec<String>,
    not: bool,
}

impl Range {
    fn from_options(options: RuleOptions<'_>) -> ConfigResult<Self> {
        let Some(Value::Array(range)) = options.get("range") else {
            return Err(options.invalid("range", "expected an array"));
        };
        Ok(Self {
            allowed: range.iter().map(scalar_text).collect(),
            not: options.flag("not")?,
        })
    }
}

impl Validator for Range {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let candidates: Vec<String> = match value {
            Value::Array(items) => items.iter().map(scalar_text).collect(),
            other => vec![scalar_text(other)],
        };
        let all_in = candidates.iter().all(|c| self.allowed.contains(c));
        if all_in != self.not {
            Ok(None)
        } else {
            Err("{attribute} is invalid.".to_string())
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug)]
struct Email;

impl Validator for Email {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        let valid = value.as_str().is_some_and(|s| {
            s.split_once('@').is_some_and(|(local, domain)| {
                !local.is_empty()
                    && !local.contains(char::is_whitespace)
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !domain.contains(['@', ' '])
            })
        });
        if valid {
            Ok(None)
        } else {
            Err("{attribute} is not a valid email address.".to_string())
        }
    }
}

#[derive(Debug)]
struct Trim;

impl Validator for Trim {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        match value {
            Value::String(s) => Ok(Some(Value::String(s.trim().to_string()))),
            _ => Ok(None),
        }
    }

    fn skip_on_empty(&self) -> bool {
        false
    }
}

#[derive(Debug)]
struct DefaultValue {
    value: Value,
}

impl Validator for DefaultValue {
    fn validate(&self, value: &Value) -> Result<Option<Value>, String> {
        if is_empty(value) {
            Ok(Some(self.value.clone()))
        } else {
            Ok(None)
        }
    }

    fn skip_on_empty(&self) -> bool {
        false
    }
}
