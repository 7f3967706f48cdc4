// ─── maven-metadata.xml ───
// Version listings for the installer-based loaders, plus the ordering used
// to pick the newest one.

use std::cmp::Ordering;

use quick_xml::de::from_str;
use serde::Deserialize;

use crate::core::error::LauncherResult;

#[derive(Debug, Deserialize, Default)]
pub struct MavenMetadata {
    #[serde(default)]
    versioning: Versioning,
}

#[derive(Debug, Deserialize, Default)]
struct Versioning {
    #[serde(default)]
    versions: Versions,
}

#[derive(Debug, Deserialize, Default)]
struct Versions {
    #[serde(default, rename = "version")]
    items: Vec<String>,
}

impl MavenMetadata {
    pub fn parse(xml: &str) -> LauncherResult<Self> {
        Ok(from_str(xml)?)
    }

    /// Every listed version, in document order.
    pub fn versions(&self) -> &[String] {
        &self.versioning.versions.items
    }

    /// Versions starting with `prefix`, with the prefix stripped.
    pub fn versions_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.versions()
            .iter()
            .filter_map(|v| v.trim().strip_prefix(prefix))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    // Non-numeric parts order below numeric ones at the same position.
    Text(String),
    Num(u64),
}

fn segments(version: &str) -> Vec<Segment> {
    version
        .split(['.', '-'])
        .map(|part| match part.parse::<u64>() {
            Ok(n) => Segment::Num(n),
            Err(_) => Segment::Text(part.to_string()),
        })
        .collect()
}

/// Ascending order over dot/dash-delimited integer tuples, falling back to
/// plain string order when the tuples tie. Total, so safe for `sort_by`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    segments(a).cmp(&segments(b)).then_with(|| a.cmp(b))
}

pub fn newest_version<'a, I>(versions: I) -> Option<String>
where
    I: IntoIterator<Item = &'a String>,
{
    versions
        .into_iter()
        .max_by(|a, b| compare_versions(a, b))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORGE_METADATA: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<metadata>
  <groupId>net.minecraftforge</groupId>
  <artifactId>forge</artifactId>
  <versioning>
    <latest>1.20.4-49.0.3</latest>
    <release>1.20.4-49.0.3</release>
    <versions>
      <version>1.20.1-47.1.0</version>
      <version>1.20.1-47.2.0</version>
      <version>1.20.1-47.10.1</version>
      <version>1.20.4-49.0.3</version>
    </versions>
    <lastUpdated>20240101000000</lastUpdated>
  </versioning>
</metadata>"#;

    #[test]
    fn numeric_tuples_beat_lexical_order() {
        let versions: Vec<String> = ["1.2.10", "1.2.9", "1.10.0"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(newest_version(&versions).as_deref(), Some("1.10.0"));
    }

    #[test]
    fn ties_fall_back_to_string_order() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Less);
        assert_eq!(compare_versions("1.02", "1.2"), Ordering::Less);
        assert_eq!(compare_versions("1.2-beta", "1.2.1"), Ordering::Less);
        assert_eq!(compare_versions("2.0", "2.0"), Ordering::Equal);
    }

    #[test]
    fn sorting_mixed_versions_is_stable() {
        let mut versions = vec!["20.4.80-beta", "20.4.237", "20.4.9", "x", "20.4.237"];
        versions.sort_by(|a, b| compare_versions(a, b));
        assert_eq!(versions, vec!["x", "20.4.9", "20.4.80-beta", "20.4.237", "20.4.237"]);
    }

    #[test]
    fn parses_versions_and_filters_by_game_version() {
        let metadata = MavenMetadata::parse(FORGE_METADATA).unwrap();
        assert_eq!(metadata.versions().len(), 4);

        let for_1201 = metadata.versions_with_prefix("1.20.1-");
        assert_eq!(for_1201, vec!["47.1.0", "47.2.0", "47.10.1"]);
        assert_eq!(newest_version(&for_1201).as_deref(), Some("47.10.1"));
    }

    #[test]
    fn empty_listing_parses() {
        let metadata = MavenMetadata::parse("<metadata><versioning/></metadata>").unwrap();
        assert!(metadata.versions().is_empty());
    }
}
