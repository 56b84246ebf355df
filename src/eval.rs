//! Feature value resolution.
//!
//! Resolution never fails: a missing feature, an unknown audience, or a value of the wrong type
//! all degrade to the default supplied by the caller.
use std::collections::HashSet;

use serde::Serialize;

use crate::{
    models::{FeatureDefinition, Value},
    store::FeatureSnapshot,
};

/// A type a raw feature [`Value`] can be coerced into.
pub trait FeatureValue: Sized {
    /// Returns `None` if `value` cannot be represented as `Self`.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FeatureValue for bool {
    /// Only a boolean literal converts. A textual `"true"` does not.
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl FeatureValue for f64 {
    /// Numbers pass through; strings are parsed as decimals. Non-finite results are rejected.
    fn from_value(value: &Value) -> Option<Self> {
        let number = match value {
            Value::Number(n) => *n,
            Value::String(s) => s.parse().ok()?,
            _ => return None,
        };
        number.is_finite().then_some(number)
    }
}

impl FeatureValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

/// Why a particular value was returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
    /// The feature is not in the snapshot.
    FeatureNotFound,
    /// No override matched; the feature's default value was served.
    DefaultValue,
    /// The first override whose audience is in the context was served.
    #[serde(rename_all = "camelCase")]
    AudienceOverride { audience_key: String },
    /// The selected raw value could not be coerced to the requested type.
    CoercionFailed,
}

/// Resolved value together with the reason it was chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDetails<T> {
    pub value: T,
    pub reason: EvaluationReason,
}

/// Resolve `feature_key` against `snapshot` for the given audience.
///
/// ```
/// # use std::collections::HashSet;
/// # use featureboard::{eval, FeatureDefinition, FeatureSnapshot};
/// let snapshot = FeatureSnapshot::from_definitions(vec![
///     FeatureDefinition::new("greeting", "hello").with_override("fr", "bonjour"),
/// ]);
/// let audience: HashSet<String> = ["fr".to_owned()].into();
///
/// assert_eq!(eval::resolve(&snapshot, "greeting", &audience, "hi".to_owned()), "bonjour");
/// assert_eq!(eval::resolve(&snapshot, "missing", &audience, "hi".to_owned()), "hi");
/// ```
pub fn resolve<T: FeatureValue>(
    snapshot: &FeatureSnapshot,
    feature_key: &str,
    audience: &HashSet<String>,
    default: T,
) -> T {
    resolve_details(snapshot, feature_key, audience, default).value
}

/// Same as [`resolve`] but also returns the [`EvaluationReason`].
pub fn resolve_details<T: FeatureValue>(
    snapshot: &FeatureSnapshot,
    feature_key: &str,
    audience: &HashSet<String>,
    default: T,
) -> EvaluationDetails<T> {
    resolve_with(snapshot, feature_key, audience, default, T::from_value)
}

/// Resolve an enumerated feature.
///
/// The raw value must be a string exactly (case-sensitively) equal to one of the names in
/// `variants`. Anything else resolves to `default`.
///
/// ```
/// # use std::collections::HashSet;
/// # use featureboard::{eval, FeatureDefinition, FeatureSnapshot};
/// #[derive(Debug, Clone, PartialEq)]
/// enum Theme { Light, Dark }
///
/// let snapshot = FeatureSnapshot::from_definitions(vec![FeatureDefinition::new("theme", "dark")]);
/// let variants = [("light", Theme::Light), ("dark", Theme::Dark)];
///
/// let theme = eval::resolve_enum(&snapshot, "theme", &HashSet::new(), &variants, Theme::Light);
/// assert_eq!(theme, Theme::Dark);
/// ```
pub fn resolve_enum<T: Clone>(
    snapshot: &FeatureSnapshot,
    feature_key: &str,
    audience: &HashSet<String>,
    variants: &[(&str, T)],
    default: T,
) -> T {
    resolve_with(snapshot, feature_key, audience, default, |value| {
        let Value::String(symbol) = value else {
            return None;
        };
        variants
            .iter()
            .find(|(name, _)| *name == symbol.as_str())
            .map(|(_, variant)| variant.clone())
    })
    .value
}

fn resolve_with<T>(
    snapshot: &FeatureSnapshot,
    feature_key: &str,
    audience: &HashSet<String>,
    default: T,
    coerce: impl FnOnce(&Value) -> Option<T>,
) -> EvaluationDetails<T> {
    let Some(definition) = snapshot.get(feature_key) else {
        log::debug!(target: "featureboard", feature_key; "feature not found, returning caller default");
        return EvaluationDetails {
            value: default,
            reason: EvaluationReason::FeatureNotFound,
        };
    };

    let (raw, reason) = select_value(definition, audience);

    log::trace!(target: "featureboard",
                feature_key,
                value:serde = raw,
                reason:serde = reason;
                "resolved feature");

    match coerce(raw) {
        Some(value) => EvaluationDetails { value, reason },
        None => {
            log::warn!(target: "featureboard",
                       feature_key,
                       value:serde = raw,
                       expected = std::any::type_name::<T>();
                       "unable to coerce feature value to the expected type, returning caller default");
            EvaluationDetails {
                value: default,
                reason: EvaluationReason::CoercionFailed,
            }
        }
    }
}

/// Pick the raw value for `audience`: the first matching override in list order, otherwise the
/// definition's default.
fn select_value<'a>(
    definition: &'a FeatureDefinition,
    audience: &HashSet<String>,
) -> (&'a Value, EvaluationReason) {
    definition
        .audience_overrides
        .iter()
        .find(|o| audience.contains(&o.audience_key))
        .map_or_else(
            || (&definition.default_value, EvaluationReason::DefaultValue),
            |o| {
                (
                    &o.value,
                    EvaluationReason::AudienceOverride {
                        audience_key: o.audience_key.clone(),
                    },
                )
            },
        )
}
