// ─── Placement convention ───
// On disk a placed file is `{catalogId}__{sanitizedName}[.disabled]`.
// In code it is a `PlacedFile`; the string form only exists at the
// filesystem boundary.

use std::path::{Path, PathBuf};

use crate::core::catalog::ContentKind;
use crate::core::error::LauncherResult;
use crate::core::fs::{list_file_names, remove_file_if_exists};

const SEPARATOR: &str = "__";
const DISABLED_SUFFIX: &str = ".disabled";
const MANAGED_EXTENSIONS: [&str; 3] = [".jar", ".zip", DISABLED_SUFFIX];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedFile {
    pub catalog_id: String,
    pub enabled: bool,
    /// Sanitized upstream filename.
    pub file_name: String,
}

impl PlacedFile {
    pub fn new(catalog_id: &str, upstream_file_name: &str, enabled: bool) -> Self {
        Self {
            catalog_id: catalog_id.to_string(),
            enabled,
            file_name: sanitize_file_name(upstream_file_name),
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (stem, enabled) = match raw.strip_suffix(DISABLED_SUFFIX) {
            Some(stem) => (stem, false),
            None => (raw, true),
        };
        let (catalog_id, file_name) = stem.split_once(SEPARATOR)?;
        if catalog_id.is_empty() || file_name.is_empty() {
            return None;
        }
        Some(Self {
            catalog_id: catalog_id.to_string(),
            enabled,
            file_name: file_name.to_string(),
        })
    }

    pub fn to_file_name(&self) -> String {
        let suffix = if self.enabled { "" } else { DISABLED_SUFFIX };
        format!("{}{}{}{}", self.catalog_id, SEPARATOR, self.file_name, suffix)
    }

    pub fn with_enabled(&self, enabled: bool) -> Self {
        Self {
            enabled,
            ..self.clone()
        }
    }
}

/// Any char outside `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_file_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Files the engine owns inside a content directory.
pub fn is_managed(file_name: &str) -> bool {
    MANAGED_EXTENSIONS
        .iter()
        .any(|ext| file_name.to_ascii_lowercase().ends_with(ext))
}

/// Placed files of one catalog id, in directory order.
pub async fn placed_files_for(dir: &Path, catalog_id: &str) -> LauncherResult<Vec<PlacedFile>> {
    Ok(list_file_names(dir)
        .await?
        .iter()
        .filter_map(|name| PlacedFile::parse(name))
        .filter(|placed| placed.catalog_id == catalog_id)
        .collect())
}

/// Remove every placed file of `catalog_id` (enabled or not) except `keep`.
pub async fn remove_placed(dir: &Path, catalog_id: &str, keep: Option<&str>) -> LauncherResult<()> {
    for placed in placed_files_for(dir, catalog_id).await? {
        let name = placed.to_file_name();
        if keep == Some(name.as_str()) {
            continue;
        }
        remove_file_if_exists(&dir.join(&name)).await?;
    }
    Ok(())
}

/// Cache location of an artifact: `{kind}/{id}-{sha1}.{ext}`, or
/// `{kind}/{id}-{sanitized name}` when no SHA-1 is published.
pub fn cache_path(
    cache_root: &Path,
    kind: ContentKind,
    catalog_id: &str,
    upstream_file_name: &str,
    sha1: Option<&str>,
) -> PathBuf {
    let name = match sha1.filter(|h| !h.trim().is_empty()) {
        Some(sha1) => {
            let ext = Path::new(upstream_file_name)
                .extension()
                .map(|e| sanitize_file_name(&e.to_string_lossy()))
                .unwrap_or_else(|| kind.default_extension().to_string());
            format!("{}-{}.{}", catalog_id, sha1.to_ascii_lowercase(), ext)
        }
        None => format!("{}-{}", catalog_id, sanitize_file_name(upstream_file_name)),
    };
    cache_root.join(kind.dir_name()).join(name)
}
