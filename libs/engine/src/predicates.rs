//! Built-in rule verbs
//!
//! Every predicate receives the field it examines (one element at a time for
//! element-wise verbs). The enclosing message is `field.parent()`.

use crate::engine::{Checker, Verdict};
use crate::expr::evaluate;
use crate::iso3166;
use crate::projection::Projection;
use codec::Navigator;
use prost_reflect::Value;
use rules::{Rule, YamlValue};

pub(crate) fn is_set(_: &mut Checker<'_, '_>, field: &Navigator<'_>, _: &Rule) -> Verdict {
    field.is_present().into()
}

pub(crate) fn is_set_if(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    let Some(condition) = rule.param_str() else {
        return Verdict::Skipped("condition must be a string expression".to_string());
    };
    let Some(parent) = field.parent() else {
        return Verdict::Complies;
    };
    match evaluate(condition, &Projection::new(parent)) {
        Ok(true) => field.is_present().into(),
        Ok(false) => Verdict::Complies,
        Err(e) => Verdict::Skipped(e.to_string()),
    }
}

pub(crate) fn is_valid<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, _: &Rule) -> Verdict {
    checker.descend(field);
    Verdict::Complies
}

pub(crate) fn check_children<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, rule: &Rule) -> Verdict {
    is_valid(checker, field, rule)
}

fn compare_number(field: &Navigator<'_>, rule: &Rule, holds: fn(f64, f64) -> bool) -> Verdict {
    let Some(bound) = rule.param_f64() else {
        return Verdict::Skipped("expects a numeric parameter".to_string());
    };
    match field.as_f64() {
        Some(value) => holds(value, bound).into(),
        None => Verdict::Skipped("field is not numeric".to_string()),
    }
}

pub(crate) fn is_greater_than(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    compare_number(field, rule, |x, k| x > k)
}

pub(crate) fn is_greater_than_or_equal_to(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    compare_number(field, rule, |x, k| x >= k)
}

pub(crate) fn is_less_than(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    compare_number(field, rule, |x, k| x < k)
}

pub(crate) fn is_less_than_or_equal_to(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    compare_number(field, rule, |x, k| x <= k)
}

/// Equality of a scalar field with a rule parameter: numbers, strings and
/// enum names. `None` when the two cannot be compared.
fn scalar_equals(field: &Navigator<'_>, param: &YamlValue) -> Option<bool> {
    match param {
        YamlValue::String(expected) => match field.value()? {
            Value::String(s) => Some(s == expected),
            Value::EnumNumber(_) => Some(field.enum_name().as_deref() == Some(expected.as_str())),
            _ => None,
        },
        YamlValue::Bool(expected) => field.value()?.as_bool().map(|b| b == *expected),
        YamlValue::Number(n) => {
            let expected = n.as_f64()?;
            field.as_f64().map(|x| x == expected)
        }
        _ => None,
    }
}

pub(crate) fn is_equal_to(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    match scalar_equals(field, &rule.params) {
        Some(equal) => equal.into(),
        None => Verdict::Skipped("field and parameter are not comparable".to_string()),
    }
}

pub(crate) fn is_different_to(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    match scalar_equals(field, &rule.params) {
        Some(equal) => (!equal && !field.as_f64().is_some_and(f64::is_nan)).into(),
        None => Verdict::Skipped("field and parameter are not comparable".to_string()),
    }
}

/// Interval bounds parsed from `[min, max]` or `[min, max, mode]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Interval {
    pub min: f64,
    pub max: f64,
    pub left_open: bool,
    pub right_open: bool,
}

impl Interval {
    pub fn from_params(params: &YamlValue) -> Option<Self> {
        let items = params.as_sequence()?;
        let (min, max) = match items.as_slice() {
            [min, max] | [min, max, _] => (min.as_f64()?, max.as_f64()?),
            _ => return None,
        };
        let mode = match items.get(2) {
            Some(mode) => mode.as_str()?,
            None => "",
        };
        Some(Self {
            min,
            max,
            left_open: mode.contains("lo"),
            right_open: mode.contains("ro"),
        })
    }

    /// NaN is never contained
    pub fn contains(&self, x: f64) -> bool {
        let above = if self.left_open { x > self.min } else { x >= self.min };
        let below = if self.right_open { x < self.max } else { x <= self.max };
        above && below
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}{:?}, {:?}{}",
            if self.left_open { '(' } else { '[' },
            self.min,
            self.max,
            if self.right_open { ')' } else { ']' }
        )
    }
}

pub(crate) fn in_range(_: &mut Checker<'_, '_>, field: &Navigator<'_>, rule: &Rule) -> Verdict {
    let Some(interval) = Interval::from_params(&rule.params) else {
        return Verdict::Skipped("expects [min, max] or [min, max, mode]".to_string());
    };
    let Some(x) = field.as_f64() else {
        return Verdict::Skipped("field is not numeric".to_string());
    };
    if interval.contains(x) {
        Verdict::Complies
    } else {
        Verdict::Violates(Some(format!("{:?} not in range {}", x, interval)))
    }
}

/// Identifier carried by an `Identifier` message (`.value`) or a plain
/// integer field
fn identifier_value(field: &Navigator<'_>) -> Option<u64> {
    if field.is_message() {
        if !field.has_field("value") {
            return None;
        }
        field.get_field("value").ok()?.as_u64()
    } else {
        field.as_u64()
    }
}

pub(crate) fn is_globally_unique<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, _: &Rule) -> Verdict {
    let Some(id) = identifier_value(field) else {
        return Verdict::Skipped("no identifier value".to_string());
    };
    let Some(owner) = field.parent() else {
        return Verdict::Skipped("identifier has no owning message".to_string());
    };
    checker.ids_mut().register_message(id, owner.clone());
    Verdict::Complies
}

pub(crate) fn refers_to<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, rule: &Rule) -> Verdict {
    let Some(expected_type) = rule.param_str() else {
        return Verdict::Skipped("expects a message type name".to_string());
    };
    let Some(id) = identifier_value(field) else {
        return Verdict::Skipped("no identifier value".to_string());
    };
    checker
        .ids_mut()
        .refer(field.clone(), id, expected_type, rule.condition.clone());
    Verdict::Complies
}

pub(crate) fn is_iso_country_code(_: &mut Checker<'_, '_>, field: &Navigator<'_>, _: &Rule) -> Verdict {
    field.as_str().is_some_and(iso3166::is_alpha3).into()
}

fn check_element<'a>(
    checker: &mut Checker<'_, 'a>,
    element: Option<Navigator<'a>>,
    rule: &Rule,
) -> Verdict {
    let Some(rules) = rule.element_rules else {
        return Verdict::Skipped("no element rules".to_string());
    };
    if let Some(element) = element {
        checker.check_declared(&element, rules);
    }
    Verdict::Complies
}

pub(crate) fn first_element<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, rule: &Rule) -> Verdict {
    let first = field.elements().into_iter().next();
    check_element(checker, first, rule)
}

pub(crate) fn last_element<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, rule: &Rule) -> Verdict {
    let last = field.elements().pop();
    check_element(checker, last, rule)
}

/// Apply `do_check` when every guard holds for its (targeted) field
pub(crate) fn check_if<'a>(checker: &mut Checker<'_, 'a>, field: &Navigator<'a>, rule: &Rule) -> Verdict {
    let Some(parent) = field.parent() else {
        return Verdict::Complies;
    };
    if rule.guards.iter().all(|guard| checker.holds(parent, guard)) {
        for sub in &rule.do_check {
            checker.apply_rule(parent, sub);
        }
    }
    Verdict::Complies
}

pub(crate) fn is_optional(_: &mut Checker<'_, '_>, _: &Navigator<'_>, _: &Rule) -> Verdict {
    Verdict::Complies
}
