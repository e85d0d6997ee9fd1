//! Subpart declarations: which part of the tree becomes which viewer scene.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::matcher::MatchList;

/// Separator between menu levels in scene names.
pub const MENU_SEPARATOR: &str = " > ";

/// Menu location of a subpart, e.g. `Magnet > Coils`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MenuPath(Vec<String>);

impl MenuPath {
    /// Split a `>` separated string into trimmed levels. Empty levels are dropped.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('>')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Build from explicit levels.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Menu levels, outermost first.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Last level, the entry shown to the user.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for MenuPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(MENU_SEPARATOR))
    }
}

impl From<String> for MenuPath {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&str> for MenuPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<MenuPath> for String {
    fn from(path: MenuPath) -> Self {
        path.to_string()
    }
}

/// Initial visibility of a subpart in the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVisibility", into = "RawVisibility")]
pub enum Visibility {
    /// Shown or hidden, fully opaque.
    Shown(bool),
    /// Shown with the given opacity in `0.0..=1.0`.
    Opacity(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawVisibility {
    Shown(bool),
    Opacity(f64),
}

impl TryFrom<RawVisibility> for Visibility {
    type Error = String;

    fn try_from(raw: RawVisibility) -> Result<Self, Self::Error> {
        match raw {
            RawVisibility::Shown(shown) => Ok(Visibility::Shown(shown)),
            RawVisibility::Opacity(opacity) => Visibility::opacity(opacity),
        }
    }
}

impl From<Visibility> for RawVisibility {
    fn from(visibility: Visibility) -> Self {
        match visibility {
            Visibility::Shown(shown) => RawVisibility::Shown(shown),
            Visibility::Opacity(opacity) => RawVisibility::Opacity(opacity),
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Shown(true)
    }
}

impl Visibility {
    /// Opacity value, rejected outside `0.0..=1.0`.
    pub fn opacity(opacity: f64) -> Result<Self, String> {
        if (0.0..=1.0).contains(&opacity) {
            Ok(Visibility::Opacity(opacity))
        } else {
            Err(format!("opacity must be within 0..=1, got {opacity}"))
        }
    }

    /// Whether the subpart starts out shown.
    pub fn is_shown(self) -> bool {
        match self {
            Visibility::Shown(shown) => shown,
            Visibility::Opacity(_) => true,
        }
    }

    /// Scene annotation read by the viewer.
    pub fn annotation(self) -> Value {
        match self {
            Visibility::Shown(shown) => json!({ "visible": shown }),
            Visibility::Opacity(opacity) => json!({ "visible": true, "opacity": opacity }),
        }
    }
}

/// One entry of the viewer menu and the nodes it shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubpartSpec {
    /// Menu location, also used as scene name.
    pub menu: MenuPath,
    /// Nodes selected for this subpart.
    pub paths: MatchList,
    /// Initial visibility.
    #[serde(rename = "visible", default)]
    pub visibility: Visibility,
}

impl SubpartSpec {
    /// Subpart shown by default.
    pub fn new(menu: impl Into<MenuPath>, paths: MatchList) -> Self {
        Self {
            menu: menu.into(),
            paths,
            visibility: Visibility::default(),
        }
    }

    /// Replace the initial visibility.
    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opacity_annotation_is_visible() {
        let annotation = Visibility::opacity(0.5).unwrap().annotation();
        assert_eq!(annotation, json!({ "visible": true, "opacity": 0.5 }));
    }

    #[test]
    fn configured_opacity_is_written_unchanged() {
        for text in ["0.3", "0.1", "0.7"] {
            let visibility: Visibility = serde_json::from_str(text).unwrap();
            let expected: f64 = text.parse().unwrap();
            assert_eq!(visibility.annotation(), json!({ "visible": true, "opacity": expected }));
        }
    }

    #[test]
    fn hidden_annotation_has_no_opacity() {
        let annotation = Visibility::Shown(false).annotation();
        assert_eq!(annotation, json!({ "visible": false }));
        assert!(annotation.get("opacity").is_none());
    }

    #[test]
    fn out_of_range_opacity_is_rejected() {
        assert!(Visibility::opacity(1.5).is_err());
        assert!(Visibility::opacity(-0.1).is_err());
        assert!(serde_json::from_str::<Visibility>("2.0").is_err());
    }

    #[test]
    fn visibility_reads_bool_or_number() {
        assert_eq!(serde_json::from_str::<Visibility>("false").unwrap(), Visibility::Shown(false));
        assert_eq!(
            serde_json::from_str::<Visibility>("0.25").unwrap(),
            Visibility::Opacity(0.25)
        );
        assert_eq!(serde_json::from_str::<Visibility>("1").unwrap(), Visibility::Opacity(1.0));
    }

    #[test]
    fn menu_path_normalizes_separators() {
        let path = MenuPath::parse("Magnet>Coils >  Upper ");
        assert_eq!(path.segments(), ["Magnet", "Coils", "Upper"]);
        assert_eq!(path.to_string(), "Magnet > Coils > Upper");
        assert_eq!(path.leaf(), Some("Upper"));
    }

    #[test]
    fn subpart_deserializes_with_defaults() {
        let spec: SubpartSpec = serde_json::from_value(json!({
            "menu": "VP > Modules",
            "paths": ["VPLeft", { "pattern": "Module[0-9]+" }],
        }))
        .unwrap();
        assert_eq!(spec.menu, MenuPath::from_segments(["VP", "Modules"]));
        assert_eq!(spec.paths.len(), 2);
        assert_eq!(spec.visibility, Visibility::Shown(true));
    }
}
