//! Database models

use serde::{Deserialize, Serialize};

/// Stored annotation row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnnotationRecord {
    pub id: i64,
    pub native_region: String,
    pub target_region: String,
    pub participant_name: String,
    pub age: i64,
    pub sex: String,
    pub category: String,
    pub superset_attribute: String,
    pub annotation: String,
    /// 0-5, or -1 when not rated
    pub offensiveness_rating: i64,
    pub timestamp: String,
}

impl AnnotationRecord {
    /// CSV header, in table column order
    pub const COLUMNS: [&'static str; 11] = [
        "id",
        "native_region",
        "target_region",
        "participant_name",
        "age",
        "sex",
        "category",
        "superset_attribute",
        "annotation",
        "offensiveness_rating",
        "timestamp",
    ];
}

/// Stored familiarity row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FamiliarityRecord {
    pub id: i64,
    pub native_region: String,
    pub target_region: String,
    pub rating: i64,
    pub participant_name: String,
    pub age: i64,
    pub sex: String,
    pub timestamp: String,
}

impl FamiliarityRecord {
    pub const COLUMNS: [&'static str; 8] = [
        "id",
        "native_region",
        "target_region",
        "rating",
        "participant_name",
        "age",
        "sex",
        "timestamp",
    ];
}
