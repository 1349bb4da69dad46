//! Runtime value validation against manifest definitions.
//!
//! Unlike structural validation, runtime validation never bails on the
//! first problem: every violation in a value is collected so a caller can
//! report all of them at once.

use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::{Map, Value};

use crate::manifest::types::{ArgumentDef, ArgumentType, Manifest, RequestDef};
use crate::manifest::validator::MAX_EXTENDS_DEPTH;

/// One constraint a value failed to meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Dotted path of the offending field (array elements as `[i]`).
    pub field: String,
    /// Human-readable description of the failure.
    pub message: String,
    /// What the definition demanded.
    pub expected: String,
    /// What the value actually was.
    pub actual: String,
}

/// Outcome of one runtime validation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// `true` iff no violations were found.
    pub valid: bool,
    pub violations: Vec<Violation>,
    /// Wall time the pass took.
    pub elapsed: Duration,
    /// Number of fields inspected, nested fields included.
    pub fields_checked: usize,
}

/// Validates runtime values against a manifest's definitions.
///
/// Borrows the manifest so `modelRef` lookups and `extends` merging work
/// against the same definitions structural validation approved.
pub struct ValueValidator<'a> {
    manifest: &'a Manifest,
}

impl<'a> ValueValidator<'a> {
    pub fn new(manifest: &'a Manifest) -> Self {
        Self { manifest }
    }

    /// Validate a single value against a definition.
    pub fn validate_value(&self, value: &Value, def: &ArgumentDef, field: &str) -> ValidationReport {
        let started = Instant::now();
        let mut pass = Pass {
            manifest: self.manifest,
            violations: Vec::new(),
            fields_checked: 0,
        };
        pass.check(value, def, field);
        pass.into_report(started)
    }

    /// Validate a request's argument map against its definition.
    ///
    /// Required-but-absent arguments are violations; optional-and-absent
    /// arguments are skipped entirely.
    pub fn validate_args(
        &self,
        args: &Map<String, Value>,
        request: &RequestDef,
    ) -> ValidationReport {
        let started = Instant::now();
        let mut pass = Pass {
            manifest: self.manifest,
            violations: Vec::new(),
            fields_checked: 0,
        };

        for (name, def) in &request.args {
            match args.get(name) {
                Some(value) => pass.check(value, def, name),
                None if def.required => {
                    pass.fields_checked += 1;
                    pass.violations.push(Violation {
                        field: name.clone(),
                        message: format!("required argument '{name}' is missing"),
                        expected: def.arg_type.to_string(),
                        actual: "absent".to_string(),
                    });
                }
                None => {}
            }
        }

        pass.into_report(started)
    }
}

struct Pass<'a> {
    manifest: &'a Manifest,
    violations: Vec<Violation>,
    fields_checked: usize,
}

impl Pass<'_> {
    fn into_report(self, started: Instant) -> ValidationReport {
        ValidationReport {
            valid: self.violations.is_empty(),
            violations: self.violations,
            elapsed: started.elapsed(),
            fields_checked: self.fields_checked,
        }
    }

    fn violation(&mut self, field: &str, message: String, expected: String, actual: String) {
        self.violations.push(Violation {
            field: field.to_string(),
            message,
            expected,
            actual,
        });
    }

    fn check(&mut self, value: &Value, def: &ArgumentDef, field: &str) {
        self.fields_checked += 1;

        if !type_matches(value, def.arg_type) {
            self.violation(
                field,
                format!(
                    "expected {} but got {}",
                    def.arg_type,
                    json_type_name(value)
                ),
                def.arg_type.to_string(),
                json_type_name(value).to_string(),
            );
            // Remaining constraints assume the right type.
            return;
        }

        if let Some(allowed) = &def.enum_values {
            if !allowed.contains(value) {
                self.violation(
                    field,
                    "value is not one of the permitted set".to_string(),
                    format!("one of {allowed:?}"),
                    value.to_string(),
                );
            }
        }

        match def.arg_type {
            ArgumentType::String => self.check_string(value, def, field),
            ArgumentType::Number | ArgumentType::Integer => {
                self.check_numeric(value, def, field)
            }
            ArgumentType::Array => self.check_array(value, def, field),
            ArgumentType::Object => self.check_object(value, def, field),
            ArgumentType::Boolean => {}
        }
    }

    fn check_string(&mut self, value: &Value, def: &ArgumentDef, field: &str) {
        let Some(s) = value.as_str() else { return };
        let len = s.chars().count();

        if let Some(min) = def.min_length {
            if len < min {
                self.violation(
                    field,
                    format!("string is shorter than {min} characters"),
                    format!("length >= {min}"),
                    format!("length {len}"),
                );
            }
        }
        if let Some(max) = def.max_length {
            if len > max {
                self.violation(
                    field,
                    format!("string is longer than {max} characters"),
                    format!("length <= {max}"),
                    format!("length {len}"),
                );
            }
        }
        if let Some(pattern) = &def.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    self.violation(
                        field,
                        format!("string does not match pattern '{pattern}'"),
                        format!("match for /{pattern}/"),
                        format!("\"{s}\""),
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    // Structural validation catches this first; a manifest
                    // mutated after validation still reports sensibly.
                    self.violation(
                        field,
                        format!("pattern '{pattern}' does not compile: {e}"),
                        "compiling pattern".to_string(),
                        pattern.clone(),
                    );
                }
            }
        }
    }

    fn check_numeric(&mut self, value: &Value, def: &ArgumentDef, field: &str) {
        let Some(n) = value.as_f64() else { return };

        if let Some(min) = def.minimum {
            if n < min {
                self.violation(
                    field,
                    format!("value {n} is below the minimum {min}"),
                    format!(">= {min}"),
                    n.to_string(),
                );
            }
        }
        if let Some(max) = def.maximum {
            if n > max {
                self.violation(
                    field,
                    format!("value {n} is above the maximum {max}"),
                    format!("<= {max}"),
                    n.to_string(),
                );
            }
        }
    }

    fn check_array(&mut self, value: &Value, def: &ArgumentDef, field: &str) {
        let Some(items) = value.as_array() else { return };

        // Inline `items` wins; otherwise a modelRef to an array model
        // supplies the element schema.
        let item_def = match (&def.items, &def.model_ref) {
            (Some(item_def), _) => Some((**item_def).clone()),
            (None, Some(model_ref)) => match self.resolve_array_items(model_ref) {
                Some(item_def) => Some(item_def),
                None => {
                    self.violation(
                        field,
                        format!("modelRef '{model_ref}' does not resolve to an array model"),
                        format!("array model '{model_ref}'"),
                        "missing".to_string(),
                    );
                    return;
                }
            },
            (None, None) => None,
        };

        if let Some(item_def) = item_def {
            for (index, item) in items.iter().enumerate() {
                self.check(item, &item_def, &format!("{field}[{index}]"));
            }
        }
    }

    /// Element schema of an array model, following `extends` to the first
    /// ancestor that declares `items`.
    fn resolve_array_items(&self, name: &str) -> Option<ArgumentDef> {
        let mut current = Some(name);
        let mut depth = 0;
        while let Some(model_name) = current {
            if depth > MAX_EXTENDS_DEPTH {
                return None;
            }
            depth += 1;
            let model = self.manifest.models.get(model_name)?;
            if let Some(items) = &model.items {
                return Some((**items).clone());
            }
            current = model.extends.as_deref();
        }
        None
    }

    fn check_object(&mut self, value: &Value, def: &ArgumentDef, field: &str) {
        let Some(object) = value.as_object() else { return };

        let (properties, required) = match &def.model_ref {
            Some(model_ref) => match self.resolve_model(model_ref) {
                Some(resolved) => resolved,
                None => {
                    self.violation(
                        field,
                        format!("modelRef '{model_ref}' does not resolve"),
                        format!("model '{model_ref}'"),
                        "missing".to_string(),
                    );
                    return;
                }
            },
            None => {
                let required: Vec<String> = def
                    .properties
                    .iter()
                    .filter(|(_, prop)| prop.required)
                    .map(|(name, _)| name.clone())
                    .collect();
                (def.properties.clone(), required)
            }
        };

        for name in &required {
            match object.get(name) {
                None => self.violation(
                    &format!("{field}.{name}"),
                    format!("required property '{name}' is missing"),
                    "present".to_string(),
                    "absent".to_string(),
                ),
                Some(Value::Null) => self.violation(
                    &format!("{field}.{name}"),
                    format!("required property '{name}' is null"),
                    "non-null".to_string(),
                    "null".to_string(),
                ),
                Some(_) => {}
            }
        }

        for (name, prop_def) in &properties {
            // Optional-and-absent is not a violation; null for a required
            // property was already reported above.
            if let Some(prop_value) = object.get(name) {
                if !prop_value.is_null() {
                    self.check(prop_value, prop_def, &format!("{field}.{name}"));
                }
            }
        }
    }

    /// Flatten a model's `extends` chain into one property map. Child
    /// definitions override parents; required lists are unioned.
    fn resolve_model(
        &self,
        name: &str,
    ) -> Option<(std::collections::BTreeMap<String, ArgumentDef>, Vec<String>)> {
        let mut chain = Vec::new();
        let mut current = Some(name);
        while let Some(model_name) = current {
            if chain.len() > MAX_EXTENDS_DEPTH {
                return None;
            }
            let model = self.manifest.models.get(model_name)?;
            chain.push(model);
            current = model.extends.as_deref();
        }

        let mut properties = std::collections::BTreeMap::new();
        let mut required = Vec::new();
        // Parents first so children override.
        for model in chain.iter().rev() {
            for (prop_name, prop) in &model.properties {
                properties.insert(prop_name.clone(), prop.clone());
            }
            for req in &model.required {
                if !required.contains(req) {
                    required.push(req.clone());
                }
            }
        }
        Some((properties, required))
    }
}

fn type_matches(value: &Value, expected: ArgumentType) -> bool {
    match expected {
        ArgumentType::String => value.is_string(),
        ArgumentType::Boolean => value.is_boolean(),
        ArgumentType::Array => value.is_array(),
        ArgumentType::Object => value.is_object(),
        ArgumentType::Number => value.is_number(),
        // An integer is a number with no fractional part; 5.0 qualifies.
        ArgumentType::Integer => match value.as_f64() {
            Some(n) => n.fract() == 0.0,
            None => false,
        },
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
