//! Session loading: reads descriptor, settings and placement files from a
//! data directory and freezes them into a catalog.
//!
//! Every file may be RON, TOML or JSON, chosen by extension. TOML files hold
//! their list under a top-level key named after the file.

use std::path::{Path, PathBuf};

use randopatch_core::catalog::{
    AdditiveGroup, Catalog, CatalogBuilder, CatalogError, ItemDef, LocationDef, ShopDef,
};
use randopatch_core::settings::{Placement, SessionSettings};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::schema::PlacementData;

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: &'static str, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// Descriptors parsed but do not form a valid catalog.
    #[error("invalid catalog in {file}: {source}")]
    Catalog {
        file: PathBuf,
        #[source]
        source: CatalogError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Look for `{base_name}.ron`, `.toml` or `.json` in `dir`.
///
/// Returns `Ok(None)` when none exists and `ConflictingFormats` when more
/// than one does.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }
    Ok(found)
}

pub fn require_data_file(dir: &Path, base_name: &'static str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name,
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Read a file and deserialize it according to its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML files keep the array under `toml_key`; RON and
/// JSON files are the array itself.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let table: toml::Table = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

fn load_list<T: DeserializeOwned>(
    dir: &Path,
    base_name: &'static str,
) -> Result<(Vec<T>, PathBuf), DataLoadError> {
    let path = require_data_file(dir, base_name)?;
    let list = deserialize_list(&path, base_name)?;
    debug!(file = %path.display(), entries = list.len(), "data file loaded");
    Ok((list, path))
}

fn load_optional_list<T: DeserializeOwned>(
    dir: &Path,
    base_name: &'static str,
) -> Result<Option<(Vec<T>, PathBuf)>, DataLoadError> {
    if find_data_file(dir, base_name)?.is_none() {
        return Ok(None);
    }
    load_list(dir, base_name).map(Some)
}

fn catalog_error(file: &Path) -> impl FnOnce(CatalogError) -> DataLoadError + '_ {
    move |source| DataLoadError::Catalog {
        file: file.to_path_buf(),
        source,
    }
}

// ===========================================================================
// Session loading
// ===========================================================================

/// Everything one compile needs.
#[derive(Debug)]
pub struct SessionData {
    pub catalog: Catalog,
    pub settings: SessionSettings,
    pub placements: Vec<Placement>,
}

/// Load a session from `dir`.
///
/// `locations`, `items` and `placements` are required; `shops`,
/// `additive_groups` and `settings` default to empty.
pub fn load_session(dir: &Path) -> Result<SessionData, DataLoadError> {
    let catalog = load_catalog(dir)?;

    let settings = match find_data_file(dir, "settings")? {
        Some(path) => deserialize_file(&path)?,
        None => SessionSettings::default(),
    };

    let (placements, _) = load_list::<PlacementData>(dir, "placements")?;
    let placements: Vec<Placement> = placements.into_iter().map(Placement::from).collect();

    info!(
        dir = %dir.display(),
        locations = catalog.location_count(),
        items = catalog.item_count(),
        shops = catalog.shop_count(),
        placements = placements.len(),
        "session data loaded"
    );
    Ok(SessionData {
        catalog,
        settings,
        placements,
    })
}

/// Load and freeze the catalog files of `dir`.
pub fn load_catalog(dir: &Path) -> Result<Catalog, DataLoadError> {
    let mut builder = CatalogBuilder::new();

    let (locations, path) = load_list::<LocationDef>(dir, "locations")?;
    for def in locations {
        builder.register_location(def).map_err(catalog_error(&path))?;
    }

    let (items, path) = load_list::<ItemDef>(dir, "items")?;
    for def in items {
        builder.register_item(def).map_err(catalog_error(&path))?;
    }

    if let Some((shops, path)) = load_optional_list::<ShopDef>(dir, "shops")? {
        for def in shops {
            builder.register_shop(def).map_err(catalog_error(&path))?;
        }
    }

    // Group membership is checked on build, against the groups file.
    let mut groups_path = dir.to_path_buf();
    if let Some((groups, path)) = load_optional_list::<AdditiveGroup>(dir, "additive_groups")? {
        for group in groups {
            builder
                .register_additive_group(group)
                .map_err(catalog_error(&path))?;
        }
        groups_path = path;
    }

    builder.build().map_err(catalog_error(&groups_path))
}

// ===========================================================================
// Tests
// ===========================================================================
