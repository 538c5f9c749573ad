//! Report aggregation and spreadsheet export
//!
//! Every annotation counts for its superset attribute and, fanned out, for
//! each subset attribute registered under the same (region, category,
//! superset). Rows are grouped by (region, category, attribute) in
//! ascending key order. Means ignore the `-1` sentinel; an empty group has
//! no mean and is exported as an empty cell.
//!
//! All CSV output starts with a UTF-8 byte-order mark so spreadsheet
//! programs pick the right encoding.

use crate::db::models::{AnnotationRecord, FamiliarityRecord};
use crate::definitions::DefinitionsStore;
use crate::submission::AnnotationLabel;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// UTF-8 byte-order mark
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Aggregated report header, in output order
pub const REPORT_COLUMNS: [&str; 8] = [
    "Region",
    "Category",
    "Attribute",
    "Stereotype_Votes",
    "Not_Stereotype_Votes",
    "Not_Sure_Votes",
    "Avg_Familiarity_Rating",
    "Average_Offensiveness",
];

/// One aggregated (region, category, attribute) row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub region: String,
    pub category: String,
    pub attribute: String,
    pub stereotype_votes: u64,
    pub not_stereotype_votes: u64,
    pub not_sure_votes: u64,
    /// Mean familiarity of the region, `None` when nobody rated it
    pub avg_familiarity: Option<f64>,
    /// Mean of ratings >= 0, `None` when there are none
    pub avg_offensiveness: Option<f64>,
}

#[derive(Debug, Default)]
struct Tally {
    stereotype: u64,
    not_stereotype: u64,
    not_sure: u64,
    rating_sum: i64,
    rating_count: u64,
}

impl Tally {
    fn record(&mut self, label: Option<AnnotationLabel>, rating: i64) {
        match label {
            Some(AnnotationLabel::Stereotype) => self.stereotype += 1,
            Some(AnnotationLabel::NotAStereotype) => self.not_stereotype += 1,
            Some(AnnotationLabel::NotSure) => self.not_sure += 1,
            None => {}
        }
        if rating >= 0 {
            self.rating_sum += rating;
            self.rating_count += 1;
        }
    }
}

#[derive(Debug, Default)]
struct Mean {
    sum: i64,
    count: u64,
}

impl Mean {
    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum as f64 / self.count as f64)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean familiarity per target region over ratings >= 0
pub fn familiarity_by_region(familiarity: &[FamiliarityRecord]) -> HashMap<String, f64> {
    let mut means: HashMap<&str, Mean> = HashMap::new();
    for row in familiarity.iter().filter(|row| row.rating >= 0) {
        let mean = means.entry(row.target_region.as_str()).or_default();
        mean.sum += row.rating;
        mean.count += 1;
    }
    means
        .into_iter()
        .filter_map(|(region, mean)| mean.value().map(|v| (region.to_string(), v)))
        .collect()
}

/// Build the aggregated report
pub fn aggregate(
    annotations: &[AnnotationRecord],
    familiarity: &[FamiliarityRecord],
    definitions: &DefinitionsStore,
) -> Vec<ReportRow> {
    let mut groups: BTreeMap<(String, String, String), Tally> = BTreeMap::new();

    for row in annotations {
        let region = row.target_region.as_str();
        let category = row.category.as_str();
        let superset = row.superset_attribute.as_str();
        if region.is_empty() || category.is_empty() || superset.is_empty() || row.annotation.is_empty() {
            continue;
        }
        let label = AnnotationLabel::parse(&row.annotation);

        let subsets = definitions.subsets_of(region, category, superset);
        for attribute in std::iter::once(superset).chain(subsets.iter().map(String::as_str)) {
            groups
                .entry((region.to_string(), category.to_string(), attribute.to_string()))
                .or_default()
                .record(label, row.offensiveness_rating);
        }
    }

    let familiarity = familiarity_by_region(familiarity);

    groups
        .into_iter()
        .map(|((region, category, attribute), tally)| {
            let avg_offensiveness = Mean {
                sum: tally.rating_sum,
                count: tally.rating_count,
            }
            .value()
            .map(round2);
            let avg_familiarity = familiarity.get(&region).copied().map(round2);
            ReportRow {
                region,
                category,
                attribute,
                stereotype_votes: tally.stereotype,
                not_stereotype_votes: tally.not_stereotype,
                not_sure_votes: tally.not_sure,
                avg_familiarity,
                avg_offensiveness,
            }
        })
        .collect()
}

fn bom_writer(columns: &[&str]) -> Result<csv::Writer<Vec<u8>>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(UTF8_BOM.to_vec());
    writer.write_record(columns)?;
    Ok(writer)
}

fn finish(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Raw annotations as CSV
pub fn annotations_csv(rows: &[AnnotationRecord]) -> Result<Vec<u8>> {
    let mut writer = bom_writer(&AnnotationRecord::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    finish(writer)
}

/// Raw familiarity ratings as CSV
pub fn familiarity_csv(rows: &[FamiliarityRecord]) -> Result<Vec<u8>> {
    let mut writer = bom_writer(&FamiliarityRecord::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    finish(writer)
}

/// Aggregated report as CSV
pub fn report_csv(rows: &[ReportRow]) -> Result<Vec<u8>> {
    let mut writer = bom_writer(&REPORT_COLUMNS)?;
    for row in rows {
        writer.write_record([
            row.region.clone(),
            row.category.clone(),
            row.attribute.clone(),
            row.stereotype_votes.to_string(),
            row.not_stereotype_votes.to_string(),
            row.not_sure_votes.to_string(),
            optional(row.avg_familiarity),
            optional(row.avg_offensiveness),
        ])?;
    }
    finish(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFS: &str = "Region,Category,Superset,Subsets\n\
        Kerala,Food,Loves coconut,\"toddy,appam\"\n\
        Kerala,Culture,Literate,\n";

    fn definitions() -> DefinitionsStore {
        DefinitionsStore::from_reader(DEFS.as_bytes()).unwrap()
    }

    fn annotation(id: i64, category: &str, superset: &str, label: &str, rating: i64) -> AnnotationRecord {
        AnnotationRecord {
            id,
            native_region: "Goa".to_string(),
            target_region: "Kerala".to_string(),
            participant_name: format!("p{id}"),
            age: 30,
            sex: "Female".to_string(),
            category: category.to_string(),
            superset_attribute: superset.to_string(),
            annotation: label.to_string(),
            offensiveness_rating: rating,
            timestamp: "2025-01-01 00:00:00".to_string(),
        }
    }

    fn familiarity(id: i64, region: &str, rating: i64) -> FamiliarityRecord {
        FamiliarityRecord {
            id,
            native_region: "Goa".to_string(),
            target_region: region.to_string(),
            rating,
            participant_name: format!("p{id}"),
            age: 30,
            sex: "Female".to_string(),
            timestamp: "2025-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_subsets_inherit_superset_votes() {
        let annotations = vec![
            annotation(1, "Food", "Loves coconut", "Stereotype", 4),
            annotation(2, "Food", "Loves coconut", "Stereotype", 1),
            annotation(3, "Food", "Loves coconut", "Not sure", -1),
        ];
        let rows = aggregate(&annotations, &[], &definitions());

        let attributes: Vec<&str> = rows.iter().map(|r| r.attribute.as_str()).collect();
        assert_eq!(attributes, vec!["Loves coconut", "appam", "toddy"]);
        for row in &rows {
            assert_eq!(row.stereotype_votes, 2);
            assert_eq!(row.not_sure_votes, 1);
            assert_eq!(row.not_stereotype_votes, 0);
            assert_eq!(row.avg_offensiveness, Some(2.5));
            assert_eq!(row.avg_familiarity, None);
        }
    }

    #[test]
    fn test_sentinel_only_group_has_no_mean() {
        let annotations = vec![annotation(1, "Culture", "Literate", "Not a Stereotype", -1)];
        let rows = aggregate(&annotations, &[familiarity(1, "Kerala", 3)], &definitions());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].avg_offensiveness, None);
        assert_eq!(rows[0].avg_familiarity, Some(3.0));
    }

    #[test]
    fn test_familiarity_mean_rounded() {
        let ratings = vec![
            familiarity(1, "Kerala", 1),
            familiarity(2, "Kerala", 1),
            familiarity(3, "Kerala", 2),
            familiarity(4, "Assam", 5),
        ];
        let rows = aggregate(
            &[annotation(1, "Culture", "Literate", "Stereotype", 2)],
            &ratings,
            &definitions(),
        );
        assert_eq!(rows[0].avg_familiarity, Some(1.33));
        assert_eq!(familiarity_by_region(&ratings).get("Assam"), Some(&5.0));
    }

    #[test]
    fn test_rows_sorted_by_key_and_incomplete_rows_skipped() {
        let annotations = vec![
            annotation(1, "Food", "Loves coconut", "Not sure", -1),
            annotation(2, "Culture", "Literate", "Stereotype", 3),
            annotation(3, "", "Orphan", "Stereotype", 3),
        ];
        let rows = aggregate(&annotations, &[], &definitions());
        assert_eq!(rows[0].category, "Culture");
        assert_eq!(rows.len(), 4);
    }

    #[test]
    fn test_report_csv_has_bom_header_and_empty_nan() {
        let rows = aggregate(
            &[annotation(1, "Culture", "Literate", "Not sure", -1)],
            &[],
            &definitions(),
        );
        let bytes = report_csv(&rows).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(REPORT_COLUMNS.join(",").as_str()));
        assert_eq!(lines.next(), Some("Kerala,Culture,Literate,0,0,1,,"));
    }

    #[test]
    fn test_empty_raw_export_is_header_only() {
        let bytes = familiarity_csv(&[]).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(text.trim_end(), FamiliarityRecord::COLUMNS.join(","));
    }

    #[test]
    fn test_annotations_csv_row_follows_column_order() {
        let bytes = annotations_csv(&[annotation(7, "Food", "Loves coconut", "Stereotype", 4)]).unwrap();
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let row = text.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "7,Goa,Kerala,p7,30,Female,Food,Loves coconut,Stereotype,4,2025-01-01 00:00:00"
        );
    }
}
