//! Overlay placement in the target's top-left, y-down coordinate space.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Which pages of a multi-page target receive the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PageSelection {
    /// Every page.
    #[default]
    All,
    /// 1-based page numbers as requested; out-of-range entries are kept
    /// here and dropped when resolved against a page count.
    Pages(Vec<i64>),
}

impl PageSelection {
    /// Whether the 1-based `page` of a `page_count`-page document is selected.
    pub fn includes(&self, page: u32, page_count: u32) -> bool {
        if page == 0 || page > page_count {
            return false;
        }
        match self {
            PageSelection::All => true,
            PageSelection::Pages(pages) => pages.contains(&i64::from(page)),
        }
    }

    /// Selected 1-based page numbers that exist in a `page_count`-page document.
    pub fn resolve(&self, page_count: u32) -> BTreeSet<u32> {
        match self {
            PageSelection::All => (1..=page_count).collect(),
            PageSelection::Pages(pages) => pages
                .iter()
                .filter(|&&p| p >= 1 && p <= i64::from(page_count))
                .map(|&p| p as u32)
                .collect(),
        }
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageSelection::All => f.write_str("all"),
            PageSelection::Pages(pages) => {
                let parts: Vec<String> = pages.iter().map(|p| p.to_string()).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl FromStr for PageSelection {
    type Err = String;

    /// Parses `all` or a comma-separated list such as `1,3,5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(PageSelection::All);
        }
        if s.is_empty() {
            return Ok(PageSelection::Pages(Vec::new()));
        }
        s.split(',')
            .map(|part| {
                part.trim()
                    .parse::<i64>()
                    .map_err(|_| format!("invalid page number: '{}'", part.trim()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(PageSelection::Pages)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PageSelectionRepr {
    Keyword(String),
    Pages(Vec<i64>),
}

impl Serialize for PageSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PageSelection::All => PageSelectionRepr::Keyword("all".to_string()),
            PageSelection::Pages(pages) => PageSelectionRepr::Pages(pages.clone()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PageSelection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match PageSelectionRepr::deserialize(deserializer)? {
            PageSelectionRepr::Keyword(word) if word.eq_ignore_ascii_case("all") => {
                Ok(PageSelection::All)
            }
            PageSelectionRepr::Keyword(word) => Err(serde::de::Error::custom(format!(
                "expected \"all\" or a list of page numbers, got \"{}\"",
                word
            ))),
            PageSelectionRepr::Pages(pages) => Ok(PageSelection::Pages(pages)),
        }
    }
}

/// Where and how large an overlay is drawn.
///
/// Coordinates are in the target's own top-left origin, y-down space (pixels
/// for rasters, points for PDF pages); the compositor converts as needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub pages: PageSelection,
}

impl PlacementSpec {
    /// Placement on every page.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            pages: PageSelection::All,
        }
    }

    /// Restrict to a page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Finite position and strictly positive finite size.
    pub fn validate(&self) -> Result<(), String> {
        if ![self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err("placement values must be finite".to_string());
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(format!(
                "overlay size must be positive, got {}x{}",
                self.width, self.height
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_out_of_range_pages_dropped() {
        let selection = PageSelection::Pages(vec![0, 1, 2, 999]);
        assert_eq!(selection.resolve(2), BTreeSet::from([1, 2]));
        assert!(!selection.includes(0, 2));
        assert!(selection.includes(1, 2));
        assert!(!selection.includes(999, 2));
    }

    #[test]
    fn test_all_includes_every_page() {
        assert_eq!(PageSelection::All.resolve(3), BTreeSet::from([1, 2, 3]));
        assert!(PageSelection::Pages(vec![]).resolve(3).is_empty());
    }

    #[test]
    fn test_parse_page_selection() {
        assert_eq!("all".parse::<PageSelection>().unwrap(), PageSelection::All);
        assert_eq!(
            "1, 3,5".parse::<PageSelection>().unwrap(),
            PageSelection::Pages(vec![1, 3, 5])
        );
        assert!("1,x".parse::<PageSelection>().is_err());
    }

    #[test]
    fn test_placement_json_shape() {
        let spec: PlacementSpec =
            serde_json::from_str(r#"{"x": 10, "y": 20, "width": 50, "height": 30, "pages": [1, 2]}"#)
                .unwrap();
        assert_eq!(spec.pages, PageSelection::Pages(vec![1, 2]));

        let spec: PlacementSpec =
            serde_json::from_str(r#"{"x": 0, "y": 0, "width": 5, "height": 5, "pages": "all"}"#)
                .unwrap();
        assert_eq!(spec.pages, PageSelection::All);
        assert_eq!(
            serde_json::to_value(&spec).unwrap()["pages"],
            serde_json::json!("all")
        );

        let bad = serde_json::from_str::<PlacementSpec>(
            r#"{"x": 0, "y": 0, "width": 5, "height": 5, "pages": "odd"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_size() {
        assert!(PlacementSpec::new(0.0, 0.0, 0.0, 10.0).validate().is_err());
        assert!(PlacementSpec::new(0.0, 0.0, 10.0, f64::NAN).validate().is_err());
        assert!(PlacementSpec::new(-5.0, -5.0, 10.0, 10.0).validate().is_ok());
    }
}
