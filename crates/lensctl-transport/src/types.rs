// ── Transport-level value types ──
//
// Opaque handles and the plain data the primitives exchange. Handles are
// `Copy` so they can be passed to every call, but only the session layer
// in `lensctl-core` ever holds on to them.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u64);

        impl $name {
            pub const KIND: &'static str = $kind;

            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $kind, self.0)
            }
        }
    };
}

handle_type!(
    /// Library context the device handle operates within.
    ContextHandle,
    "context"
);
handle_type!(
    /// One opened camera.
    DeviceHandle,
    "device"
);
handle_type!(
    /// A node inside a fetched configuration tree. Only the root of a
    /// fetch is released; children live exactly as long as their root.
    WidgetHandle,
    "widget"
);

/// Location of a file on the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilePath {
    pub folder: String,
    pub name: String,
}

impl FilePath {
    pub fn new(folder: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            name: name.into(),
        }
    }

    /// Split an absolute path into folder and file name.
    ///
    /// Returns `None` for paths without a file component (`"/"`, `"/DCIM/"`).
    pub fn parse(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        if trimmed.len() != path.len() {
            return None;
        }
        let (folder, name) = trimmed.rsplit_once('/')?;
        if name.is_empty() {
            return None;
        }
        let folder = if folder.is_empty() { "/" } else { folder };
        Some(Self::new(folder, name))
    }
}

impl fmt::Display for FilePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.folder.ends_with('/') {
            write!(f, "{}{}", self.folder, self.name)
        } else {
            write!(f, "{}/{}", self.folder, self.name)
        }
    }
}

/// Which rendition of a file to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    /// Thumbnail or preview of an image.
    Preview,
    /// The file as stored.
    #[default]
    Normal,
    /// Raw data; identical to `Normal` on most modern cameras.
    Raw,
    /// Audio attached to the file.
    Audio,
    /// Embedded EXIF block.
    Exif,
    /// Object metadata (MTP devices).
    Metadata,
}

/// Kind of a configuration widget, as reported by the device.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum WidgetType {
    /// Top-level configuration container.
    Window,
    /// Grouping of settings (think tab).
    Section,
    /// Free-form string.
    Text,
    /// Slider over a float range.
    Range,
    /// Check box.
    Toggle,
    /// One-of-N choice.
    Radio,
    /// One-of-N choice rendered as a drop-down.
    Menu,
    /// Action trigger.
    Button,
    /// Date/time as seconds since the epoch.
    Date,
}

impl WidgetType {
    /// Window and section widgets only group other widgets.
    pub fn is_container(self) -> bool {
        matches!(self, Self::Window | Self::Section)
    }
}

/// Raw widget value in the representation the protocol uses for its kind:
/// text for text/radio/menu, float for range, integer for toggle/date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Int(i64),
    Float(f32),
    Text(String),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

/// Bounds of a range widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeBounds {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl RangeBounds {
    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One `(name, value)` pair from a folder or file listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub value: String,
}

/// Event reported by `wait_for_event`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    /// A new file appeared on the device.
    FileAdded(FilePath),
    /// Nothing happened within the poll timeout.
    Timeout,
    /// Any other event (folder added, capture complete, vendor chatter).
    Other(String),
}

impl DeviceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FileAdded(_) => EventKind::FileAdded,
            Self::Timeout => EventKind::Timeout,
            Self::Other(_) => EventKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    FileAdded,
    Timeout,
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_path_parse_splits_folder_and_name() {
        let p = FilePath::parse("/store_00010001/DCIM/100CANON/IMG_0001.JPG").expect("file path");
        assert_eq!(p.folder, "/store_00010001/DCIM/100CANON");
        assert_eq!(p.name, "IMG_0001.JPG");
        assert_eq!(p.to_string(), "/store_00010001/DCIM/100CANON/IMG_0001.JPG");
    }

    #[test]
    fn file_path_parse_handles_root_files() {
        let p = FilePath::parse("/capt0000.jpg").expect("file path");
        assert_eq!(p.folder, "/");
        assert_eq!(p.to_string(), "/capt0000.jpg");
    }

    #[test]
    fn file_path_parse_rejects_folders() {
        assert!(FilePath::parse("/").is_none());
        assert!(FilePath::parse("/DCIM/").is_none());
        assert!(FilePath::parse("relative").is_none());
    }

    #[test]
    fn widget_type_round_trips_through_strings() {
        assert_eq!(WidgetType::Radio.to_string(), "radio");
        assert_eq!("toggle".parse::<WidgetType>().ok(), Some(WidgetType::Toggle));
        assert!(WidgetType::Section.is_container());
        assert!(!WidgetType::Menu.is_container());
    }
}
