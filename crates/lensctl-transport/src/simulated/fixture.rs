// ── Simulated device description ──
//
// Serde model for the settings tree and storage contents of a simulated
// camera. Fixtures are usually written in TOML; `lensctl-config` parses them.

use serde::{Deserialize, Serialize};

use crate::types::{RangeBounds, RawValue, WidgetType};

/// Description of a simulated camera.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFixture {
    #[serde(default = "default_model")]
    pub model: String,

    /// Folder new captures are written to.
    #[serde(default = "default_capture_folder")]
    pub capture_folder: String,

    /// Sections of the configuration window, in display order.
    #[serde(default)]
    pub sections: Vec<FixtureSection>,

    /// Absolute paths of files present on the card at start-up.
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureSection {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub widgets: Vec<FixtureWidget>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixtureWidget {
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub info: String,
    #[serde(rename = "type")]
    pub kind: WidgetType,
    #[serde(default)]
    pub readonly: bool,
    pub value: Option<FixtureValue>,
    #[serde(default)]
    pub choices: Vec<String>,
    pub range: Option<RangeBounds>,
    /// Reading the value fails with corrupted data, like a flaky vendor property.
    #[serde(default)]
    pub unreadable: bool,
}

/// Value as written in a fixture file; coerced to the widget kind on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FixtureValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FixtureWidget {
    /// Coerce the fixture value into the protocol representation for this kind.
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub(crate) fn raw_value(&self) -> RawValue {
        match (self.kind, &self.value) {
            (WidgetType::Range, Some(FixtureValue::Float(v))) => RawValue::Float(*v as f32),
            (WidgetType::Range, Some(FixtureValue::Int(v))) => RawValue::Float(*v as f32),
            (WidgetType::Range, Some(FixtureValue::Text(v))) => {
                RawValue::Float(v.parse().unwrap_or_default())
            }
            (WidgetType::Range, None) => RawValue::Float(0.0),
            (WidgetType::Toggle | WidgetType::Date, Some(FixtureValue::Int(v))) => {
                RawValue::Int(*v)
            }
            (WidgetType::Toggle | WidgetType::Date, Some(FixtureValue::Float(v))) => {
                RawValue::Int(*v as i64)
            }
            (WidgetType::Toggle | WidgetType::Date, Some(FixtureValue::Text(v))) => {
                RawValue::Int(v.parse().unwrap_or_default())
            }
            (WidgetType::Toggle | WidgetType::Date, None) => RawValue::Int(0),
            (_, Some(FixtureValue::Text(v))) => RawValue::Text(v.clone()),
            (_, Some(FixtureValue::Int(v))) => RawValue::Text(v.to_string()),
            (_, Some(FixtureValue::Float(v))) => RawValue::Text(v.to_string()),
            (_, None) => RawValue::Text(String::new()),
        }
    }
}

fn default_model() -> String {
    "Simulated DSLR".into()
}

fn default_capture_folder() -> String {
    "/store_00010001/DCIM/100CANON".into()
}

impl Default for DeviceFixture {
    fn default() -> Self {
        Self::generic_dslr()
    }
}

impl DeviceFixture {
    /// An empty camera: no settings, no files.
    pub fn empty() -> Self {
        Self {
            model: default_model(),
            capture_folder: default_capture_folder(),
            sections: Vec::new(),
            files: Vec::new(),
        }
    }

    /// A generic DSLR with the settings most tethering tools touch.
    pub fn generic_dslr() -> Self {
        Self {
            model: default_model(),
            capture_folder: default_capture_folder(),
            sections: vec![
                section(
                    "settings",
                    "Camera Settings",
                    vec![
                        widget("datetime", "Camera Date and Time", WidgetType::Date)
                            .with_value(FixtureValue::Int(1_700_000_000)),
                        choice(
                            "capturetarget",
                            "Capture Target",
                            WidgetType::Radio,
                            "Internal RAM",
                            &["Internal RAM", "Memory card"],
                        ),
                        widget("viewfinder", "Viewfinder", WidgetType::Toggle)
                            .with_value(FixtureValue::Int(0)),
                    ],
                ),
                section(
                    "status",
                    "Camera Status Information",
                    vec![
                        widget("serialnumber", "Serial Number", WidgetType::Text)
                            .with_value(FixtureValue::Text("0123456789".into()))
                            .read_only(),
                        widget("batterylevel", "Battery Level", WidgetType::Text)
                            .with_value(FixtureValue::Text("100%".into()))
                            .read_only(),
                        widget("cameramodel", "Camera Model", WidgetType::Text)
                            .with_value(FixtureValue::Text(default_model()))
                            .read_only(),
                    ],
                ),
                section(
                    "imgsettings",
                    "Image Settings",
                    vec![
                        choice(
                            "iso",
                            "ISO Speed",
                            WidgetType::Radio,
                            "100",
                            &["Auto", "100", "200", "400", "800", "1600", "3200", "6400"],
                        ),
                        choice(
                            "whitebalance",
                            "WhiteBalance",
                            WidgetType::Radio,
                            "Auto",
                            &[
                                "Auto",
                                "Daylight",
                                "Shadow",
                                "Cloudy",
                                "Tungsten",
                                "Fluorescent",
                                "Flash",
                            ],
                        ),
                        choice(
                            "imageformat",
                            "Image Format",
                            WidgetType::Menu,
                            "Large Fine JPEG",
                            &["Large Fine JPEG", "RAW", "RAW + Large Fine JPEG"],
                        ),
                    ],
                ),
                section(
                    "capturesettings",
                    "Capture Settings",
                    vec![
                        choice(
                            "aperture",
                            "Aperture",
                            WidgetType::Radio,
                            "5.6",
                            &["2.8", "4", "5.6", "8", "11", "16"],
                        ),
                        choice(
                            "shutterspeed",
                            "Shutter Speed",
                            WidgetType::Radio,
                            "1/60",
                            &["1/1000", "1/250", "1/60", "1/15", "1"],
                        ),
                        FixtureWidget {
                            range: Some(RangeBounds {
                                min: -3.0,
                                max: 3.0,
                                step: 0.5,
                            }),
                            ..widget(
                                "exposurecompensation",
                                "Exposure Compensation",
                                WidgetType::Range,
                            )
                            .with_value(FixtureValue::Float(0.0))
                        },
                        widget("autofocus", "Autofocus", WidgetType::Toggle)
                            .with_value(FixtureValue::Int(2)),
                    ],
                ),
                section(
                    "actions",
                    "Camera Actions",
                    vec![widget("autofocusdrive", "Drive Canon DSLR Autofocus", WidgetType::Button)],
                ),
            ],
            files: vec!["/store_00010001/DCIM/100CANON/IMG_0001.JPG".into()],
        }
    }
}

fn section(name: &str, label: &str, widgets: Vec<FixtureWidget>) -> FixtureSection {
    FixtureSection {
        name: name.into(),
        label: label.into(),
        widgets,
    }
}

fn widget(name: &str, label: &str, kind: WidgetType) -> FixtureWidget {
    FixtureWidget {
        name: name.into(),
        label: label.into(),
        info: String::new(),
        kind,
        readonly: false,
        value: None,
        choices: Vec::new(),
        range: None,
        unreadable: false,
    }
}

fn choice(
    name: &str,
    label: &str,
    kind: WidgetType,
    value: &str,
    choices: &[&str],
) -> FixtureWidget {
    FixtureWidget {
        choices: choices.iter().map(|c| (*c).to_owned()).collect(),
        ..widget(name, label, kind).with_value(FixtureValue::Text(value.into()))
    }
}

impl FixtureWidget {
    fn with_value(mut self, value: FixtureValue) -> Self {
        self.value = Some(value);
        self
    }

    fn read_only(mut self) -> Self {
        self.readonly = true;
        self
    }
}
