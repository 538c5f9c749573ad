//! Stereotype definitions store
//!
//! Reference data mapping Region → Category → Superset → Subsets, read once
//! from a delimited file at start-up and never mutated afterwards. Request
//! handlers share it through an `Arc`.
//!
//! Expected header: `Region, Category, Superset, Subsets` (`State` is
//! accepted in place of `Region`). `Subsets` is one field holding a
//! comma-separated list.

use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const REGION_COLUMNS: [&str; 2] = ["Region", "State"];
const CATEGORY_COLUMN: &str = "Category";
const SUPERSET_COLUMN: &str = "Superset";
const SUBSETS_COLUMN: &str = "Subsets";
const DEFAULT_CATEGORY: &str = "Uncategorized";

/// One stereotype item as presented to participants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StereotypeItem {
    pub region: String,
    pub category: String,
    pub superset: String,
    /// Narrower attributes, trimmed and sorted
    pub subsets: Vec<String>,
}

type ItemKey = (String, String, String);

/// Immutable, in-memory definitions store
#[derive(Debug, Default)]
pub struct DefinitionsStore {
    items: Vec<StereotypeItem>,
    regions: Vec<String>,
    index: HashMap<ItemKey, usize>,
    load_error: Option<String>,
}

impl DefinitionsStore {
    /// Load definitions from a file on disk
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading stereotype definitions from {}", path.display());
        if !path.exists() {
            return Err(Error::Config(format!(
                "Definitions file not found: {}",
                path.display()
            )));
        }
        let file = std::fs::File::open(path)?;
        let store = Self::from_reader(file)?;
        info!(
            "Loaded {} stereotype items across {} regions",
            store.items.len(),
            store.regions.len()
        );
        Ok(store)
    }

    /// Load definitions, degrading to an unavailable store on failure
    ///
    /// The survey keeps serving (and reports the problem) instead of
    /// refusing to start when the reference data is broken.
    pub fn load_or_unavailable(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) if store.items.is_empty() => {
                Self::unavailable("Definitions file contains no usable rows")
            }
            Ok(store) => store,
            Err(e) => Self::unavailable(e.to_string()),
        }
    }

    /// Store that signals a load failure to every consumer
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        tracing::error!("Stereotype definitions unavailable: {}", reason);
        Self {
            load_error: Some(reason),
            ..Self::default()
        }
    }

    /// Parse definitions from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let column = |name: &str| headers.iter().position(|h| h == name);
        let region_idx = REGION_COLUMNS.iter().find_map(|name| column(*name));
        let category_idx = column(CATEGORY_COLUMN);
        let superset_idx = column(SUPERSET_COLUMN);
        let subsets_idx = column(SUBSETS_COLUMN);

        let (region_idx, category_idx, superset_idx, subsets_idx) =
            match (region_idx, category_idx, superset_idx, subsets_idx) {
                (Some(r), Some(c), Some(p), Some(s)) => (r, c, p, s),
                _ => {
                    let mut missing = Vec::new();
                    if region_idx.is_none() {
                        missing.push(REGION_COLUMNS[0]);
                    }
                    if category_idx.is_none() {
                        missing.push(CATEGORY_COLUMN);
                    }
                    if superset_idx.is_none() {
                        missing.push(SUPERSET_COLUMN);
                    }
                    if subsets_idx.is_none() {
                        missing.push(SUBSETS_COLUMN);
                    }
                    return Err(Error::Config(format!(
                        "Definitions missing required columns: {:?}. Found: {:?}",
                        missing, headers
                    )));
                }
            };

        let mut items: Vec<StereotypeItem> = Vec::new();
        let mut index = HashMap::new();

        for (row_no, record) in rdr.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping definitions row {}: {}", row_no + 1, e);
                    continue;
                }
            };
            let field = |idx: usize| record.get(idx).unwrap_or("").trim();

            let region = field(region_idx);
            let superset = field(superset_idx);
            if region.is_empty() || superset.is_empty() {
                warn!(
                    "Skipping definitions row {}: missing Region or Superset",
                    row_no + 1
                );
                continue;
            }

            let category = match field(category_idx) {
                "" => DEFAULT_CATEGORY,
                c => c,
            };

            let item = StereotypeItem {
                region: region.to_string(),
                category: category.to_string(),
                superset: superset.to_string(),
                subsets: split_subsets(field(subsets_idx)),
            };

            let key = (
                item.region.clone(),
                item.category.clone(),
                item.superset.clone(),
            );
            // Later rows win for the subset lookup
            index.insert(key, items.len());
            items.push(item);
        }

        let regions: Vec<String> = items
            .iter()
            .map(|item| item.region.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Ok(Self {
            items,
            regions,
            index,
            load_error: None,
        })
    }

    /// False when loading failed and the survey must not start quizzes
    pub fn is_available(&self) -> bool {
        self.load_error.is_none()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// All known regions, sorted and unique
    pub fn regions(&self) -> &[String] {
        &self.regions
    }

    pub fn contains_region(&self, region: &str) -> bool {
        self.regions.binary_search_by(|r| r.as_str().cmp(region)).is_ok()
    }

    /// Number of items loaded
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items for one region in presentation order (category, then superset)
    pub fn items_for_region(&self, region: &str) -> Vec<&StereotypeItem> {
        let mut items: Vec<&StereotypeItem> =
            self.items.iter().filter(|item| item.region == region).collect();
        items.sort_by(|a, b| {
            (a.category.as_str(), a.superset.as_str())
                .cmp(&(b.category.as_str(), b.superset.as_str()))
        });
        items
    }

    /// Subsets registered for (region, category, superset); empty if unknown
    pub fn subsets_of(&self, region: &str, category: &str, superset: &str) -> &[String] {
        self.index
            .get(&(region.to_string(), category.to_string(), superset.to_string()))
            .map(|&idx| self.items[idx].subsets.as_slice())
            .unwrap_or(&[])
    }
}

fn split_subsets(raw: &str) -> Vec<String> {
    let mut subsets: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    subsets.sort();
    subsets
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}Region,Category,Superset,Subsets\n\
        Kerala,Food,Loves coconut,\"toddy, appam ,  \"\n\
        Kerala,,Literate,\n\
        Assam,Culture,Tea drinkers,\"strong tea,chai\"\n\
        ,Food,Orphan,\n\
        Punjab,Food,,butter\n";

    fn sample_store() -> DefinitionsStore {
        DefinitionsStore::from_reader(SAMPLE.as_bytes()).expect("sample parses")
    }

    #[test]
    fn test_rows_missing_region_or_superset_are_skipped() {
        let store = sample_store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.regions(), &["Assam".to_string(), "Kerala".to_string()]);
        assert!(!store.contains_region("Punjab"));
    }

    #[test]
    fn test_subsets_trimmed_and_sorted() {
        let store = sample_store();
        assert_eq!(
            store.subsets_of("Kerala", "Food", "Loves coconut"),
            &["appam".to_string(), "toddy".to_string()]
        );
        assert_eq!(
            store.subsets_of("Assam", "Culture", "Tea drinkers"),
            &["chai".to_string(), "strong tea".to_string()]
        );
        assert!(store.subsets_of("Assam", "Culture", "Unknown").is_empty());
    }

    #[test]
    fn test_empty_category_defaults() {
        let store = sample_store();
        let items = store.items_for_region("Kerala");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].category, "Food");
        assert_eq!(items[1].category, "Uncategorized");
        assert_eq!(items[1].superset, "Literate");
    }

    #[test]
    fn test_state_column_alias() {
        let csv = "State,Category,Superset,Subsets\nGoa,Lifestyle,Relaxed,\n";
        let store = DefinitionsStore::from_reader(csv.as_bytes()).unwrap();
        assert!(store.contains_region("Goa"));
    }

    #[test]
    fn test_missing_columns_is_config_error() {
        let csv = "Region,Category\nGoa,Lifestyle\n";
        let err = DefinitionsStore::from_reader(csv.as_bytes()).unwrap_err();
        match err {
            Error::Config(msg) => {
                assert!(msg.contains("Superset"));
                assert!(msg.contains("Subsets"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_degrades() {
        let store = DefinitionsStore::load_or_unavailable(Path::new("/nonexistent/defs.csv"));
        assert!(!store.is_available());
        assert!(store.load_error().unwrap().contains("not found"));
        assert!(store.regions().is_empty());
    }
}
