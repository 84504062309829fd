// ── Typed widget values ──
//
// Each widget kind carries its value in a shape of its own, but every value
// still has a canonical string form: that is what users type, what records
// serialize and what idempotency checks compare.

use chrono::DateTime;
use lensctl_transport::{RangeBounds, RawValue, WidgetType};
use serde::Serialize;

/// Choice list reported for a toggle the camera cannot operate.
pub const TOGGLE_UNSUPPORTED: &str = "not supported";

/// State of a toggle widget. The camera reports `2` for "not supported".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleState {
    Off,
    On,
    Unsupported,
}

impl ToggleState {
    fn from_raw(raw: i64) -> Self {
        match raw {
            0 => Self::Off,
            2 => Self::Unsupported,
            _ => Self::On,
        }
    }
}

/// Current value of a widget, tagged by what the widget can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WidgetValue {
    Text { value: String },
    /// Radio or menu selection.
    Choice { current: String, allowed: Vec<String> },
    Toggle { state: ToggleState },
    Range {
        value: f32,
        min: f32,
        max: f32,
        step: f32,
    },
    /// Seconds since the Unix epoch.
    DateTime { seconds: i64 },
    /// Button; pressing it is the only thing it does.
    Trigger,
    /// Window or section.
    Group,
    /// The camera failed to report a value.
    Unreadable,
}

impl WidgetValue {
    pub(crate) fn from_raw(
        kind: WidgetType,
        raw: RawValue,
        choices: Vec<String>,
        range: Option<RangeBounds>,
    ) -> Self {
        match (kind, raw) {
            (WidgetType::Window | WidgetType::Section, _) => Self::Group,
            (WidgetType::Button, _) => Self::Trigger,
            (WidgetType::Toggle, RawValue::Int(v)) => Self::Toggle {
                state: ToggleState::from_raw(v),
            },
            (WidgetType::Date, RawValue::Int(seconds)) => Self::DateTime { seconds },
            (WidgetType::Range, RawValue::Float(value)) => match range {
                Some(b) => Self::Range {
                    value,
                    min: b.min,
                    max: b.max,
                    step: b.step,
                },
                None => Self::Unreadable,
            },
            (WidgetType::Radio | WidgetType::Menu, RawValue::Text(current)) => Self::Choice {
                current,
                allowed: choices,
            },
            (WidgetType::Text, RawValue::Text(value)) => Self::Text { value },
            _ => Self::Unreadable,
        }
    }

    /// Canonical string form. Unsupported toggles, buttons, groups and
    /// unreadable values encode as `""`.
    pub fn encode(&self) -> String {
        match self {
            Self::Text { value } | Self::Choice { current: value, .. } => value.clone(),
            Self::Toggle { state } => match state {
                ToggleState::Off => "0".into(),
                ToggleState::On => "1".into(),
                ToggleState::Unsupported => String::new(),
            },
            Self::Range { value, .. } => value.to_string(),
            Self::DateTime { seconds } => seconds.to_string(),
            Self::Trigger | Self::Group | Self::Unreadable => String::new(),
        }
    }

    /// Values a user may choose from. Toggles always report a synthesized
    /// list; kinds without a fixed set report none.
    pub fn choices(&self) -> Vec<String> {
        match self {
            Self::Choice { allowed, .. } => allowed.clone(),
            Self::Toggle {
                state: ToggleState::Unsupported,
            } => vec![TOGGLE_UNSUPPORTED.to_owned()],
            Self::Toggle { .. } => vec!["0".to_owned(), "1".to_owned()],
            _ => Vec::new(),
        }
    }

    /// The value in protocol form, or `None` for kinds that hold nothing.
    pub(crate) fn raw(&self) -> Option<RawValue> {
        match self {
            Self::Text { value } | Self::Choice { current: value, .. } => {
                Some(RawValue::Text(value.clone()))
            }
            Self::Toggle { state } => match state {
                ToggleState::Off => Some(RawValue::Int(0)),
                ToggleState::On => Some(RawValue::Int(1)),
                ToggleState::Unsupported => Some(RawValue::Int(2)),
            },
            Self::Range { value, .. } => Some(RawValue::Float(*value)),
            Self::DateTime { seconds } => Some(RawValue::Int(*seconds)),
            Self::Trigger | Self::Group | Self::Unreadable => None,
        }
    }

    /// Validate `input` against this value's shape and convert it to the
    /// protocol form. The error is a human-readable reason.
    pub(crate) fn parse_input(&self, input: &str) -> Result<RawValue, String> {
        match self {
            Self::Text { .. } => Ok(RawValue::Text(input.to_owned())),
            Self::Choice { allowed, .. } => {
                if allowed.iter().any(|c| c == input) {
                    Ok(RawValue::Text(input.to_owned()))
                } else {
                    Err(format!("must be one of: {}", allowed.join(", ")))
                }
            }
            Self::Toggle {
                state: ToggleState::Unsupported,
            } => Err("toggle is not supported by this camera".into()),
            Self::Toggle { .. } => match input {
                "0" => Ok(RawValue::Int(0)),
                "1" => Ok(RawValue::Int(1)),
                _ => Err("toggle accepts 0 or 1".into()),
            },
            Self::Range { min, max, step, .. } => {
                let value: f32 = input
                    .trim()
                    .parse()
                    .map_err(|_| "not a number".to_owned())?;
                let bounds = RangeBounds {
                    min: *min,
                    max: *max,
                    step: *step,
                };
                if value.is_finite() && bounds.contains(value) {
                    Ok(RawValue::Float(value))
                } else {
                    Err(format!("outside range {min}..={max}"))
                }
            }
            Self::DateTime { .. } => parse_datetime(input).map(RawValue::Int),
            Self::Trigger => Err("buttons cannot be assigned a value".into()),
            Self::Group => Err("sections hold no value".into()),
            Self::Unreadable => Err("current value could not be read from the camera".into()),
        }
    }
}

/// Epoch seconds, or an RFC 3339 timestamp.
fn parse_datetime(input: &str) -> Result<i64, String> {
    let input = input.trim();
    if let Ok(seconds) = input.parse::<i64>() {
        return Ok(seconds);
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.timestamp())
        .map_err(|_| "expected epoch seconds or an RFC 3339 timestamp".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn toggle(raw: i64) -> WidgetValue {
        WidgetValue::from_raw(WidgetType::Toggle, RawValue::Int(raw), Vec::new(), None)
    }

    #[test]
    fn unsupported_toggle_encodes_empty_with_marker_choice() {
        let value = toggle(2);
        assert_eq!(value.encode(), "");
        assert_eq!(value.choices(), vec![TOGGLE_UNSUPPORTED]);
        assert!(value.parse_input("1").is_err());
    }

    #[test]
    fn toggle_choices_are_synthesized() {
        let value = toggle(1);
        assert_eq!(value.encode(), "1");
        assert_eq!(value.choices(), vec!["0", "1"]);
        assert_eq!(value.parse_input("0"), Ok(RawValue::Int(0)));
        assert!(value.parse_input("yes").is_err());
    }

    #[test]
    fn choice_input_must_be_listed() {
        let value = WidgetValue::from_raw(
            WidgetType::Radio,
            RawValue::Text("100".into()),
            vec!["100".into(), "200".into()],
            None,
        );
        assert_eq!(value.parse_input("200"), Ok(RawValue::Text("200".into())));
        let reason = value.parse_input("12345").unwrap_err();
        assert!(reason.contains("100, 200"));
    }

    #[test]
    fn range_input_is_bounded() {
        let value = WidgetValue::from_raw(
            WidgetType::Range,
            RawValue::Float(0.0),
            Vec::new(),
            Some(RangeBounds {
                min: -3.0,
                max: 3.0,
                step: 0.5,
            }),
        );
        assert_eq!(value.encode(), "0");
        assert_eq!(value.parse_input("1.5"), Ok(RawValue::Float(1.5)));
        assert!(value.parse_input("4").is_err());
        assert!(value.parse_input("NaN").is_err());
        assert!(value.parse_input("bright").is_err());
    }

    #[test]
    fn range_without_bounds_is_unreadable() {
        let value =
            WidgetValue::from_raw(WidgetType::Range, RawValue::Float(1.0), Vec::new(), None);
        assert_eq!(value, WidgetValue::Unreadable);
    }

    #[test]
    fn datetime_accepts_epoch_and_rfc3339() {
        let value =
            WidgetValue::from_raw(WidgetType::Date, RawValue::Int(0), Vec::new(), None);
        assert_eq!(value.parse_input("1700000000"), Ok(RawValue::Int(1_700_000_000)));
        assert_eq!(
            value.parse_input("1970-01-02T00:00:00Z"),
            Ok(RawValue::Int(86_400))
        );
        assert!(value.parse_input("tomorrow").is_err());
    }

    #[test]
    fn mismatched_raw_value_is_unreadable() {
        let value = WidgetValue::from_raw(
            WidgetType::Toggle,
            RawValue::Text("on".into()),
            Vec::new(),
            None,
        );
        assert_eq!(value, WidgetValue::Unreadable);
        assert!(value.raw().is_none());
    }

    #[test]
    fn buttons_and_groups_reject_values() {
        let button =
            WidgetValue::from_raw(WidgetType::Button, RawValue::Text(String::new()), Vec::new(), None);
        assert_eq!(button, WidgetValue::Trigger);
        assert!(button.parse_input("1").is_err());
    }
}
