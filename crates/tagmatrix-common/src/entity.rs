//! Entities, per-entity fetch results, and the fixed metadata header.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::CellValue;
use crate::column::ColumnId;

/// One catalog item. Immutable once read from the source list.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entity {
    #[cfg_attr(feature = "serde", serde(rename = "appid"))]
    pub id: u64,
    #[cfg_attr(feature = "serde", serde(rename = "name", default))]
    pub name: String,
}

impl Entity {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// The header-defined metadata columns, in sheet order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Title,
    Id,
    ScrapedOn,
    ReleaseDate,
    TotalReviewCount,
    ReviewPositivity,
}

impl MetadataField {
    pub const ALL: [MetadataField; 6] = [
        MetadataField::Title,
        MetadataField::Id,
        MetadataField::ScrapedOn,
        MetadataField::ReleaseDate,
        MetadataField::TotalReviewCount,
        MetadataField::ReviewPositivity,
    ];

    /// Header text written into row 1.
    pub fn label(self) -> &'static str {
        match self {
            MetadataField::Title => "Title",
            MetadataField::Id => "ID",
            MetadataField::ScrapedOn => "Scraped On",
            MetadataField::ReleaseDate => "Release Date",
            MetadataField::TotalReviewCount => "Total Review Count",
            MetadataField::ReviewPositivity => "Review Positivity",
        }
    }

    /// 1-based position in the header.
    pub const fn position(self) -> NonZeroU32 {
        const fn pos(n: u32) -> NonZeroU32 {
            match NonZeroU32::new(n) {
                Some(p) => p,
                None => panic!("metadata positions are 1-based"),
            }
        }
        match self {
            MetadataField::Title => pos(1),
            MetadataField::Id => pos(2),
            MetadataField::ScrapedOn => pos(3),
            MetadataField::ReleaseDate => pos(4),
            MetadataField::TotalReviewCount => pos(5),
            MetadataField::ReviewPositivity => pos(6),
        }
    }

    pub fn column(self) -> ColumnId {
        ColumnId::nth(self.position())
    }

    /// First column available for tags, right after the metadata block.
    pub fn first_tag_column() -> ColumnId {
        ColumnId::nth(MetadataField::ReviewPositivity.position().saturating_add(1))
    }
}

/// Outcome of fetching one entity.
///
/// Every field is optional so a failed or partial fetch still produces a
/// row; blank metadata simply renders as empty cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchResult {
    pub scraped_on: Option<DateTime<Utc>>,
    pub release_date: Option<String>,
    pub total_review_count: Option<String>,
    pub review_positivity: Option<String>,
    pub tags: Vec<String>,
}

impl FetchResult {
    /// Result recorded for an entity whose fetch failed outright.
    pub fn failed(scraped_on: DateTime<Utc>) -> Self {
        Self {
            scraped_on: Some(scraped_on),
            ..Default::default()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Trim tags, drop blanks and duplicates, keep first-seen order.
    pub fn normalize_tags(&mut self) {
        let mut seen = HashSet::with_capacity(self.tags.len());
        let tags = std::mem::take(&mut self.tags);
        self.tags = tags
            .into_iter()
            .filter_map(|t| {
                let trimmed = t.trim();
                if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect();
    }

    /// True when nothing besides the timestamp was obtained.
    pub fn is_blank(&self) -> bool {
        self.release_date.is_none()
            && self.total_review_count.is_none()
            && self.review_positivity.is_none()
            && self.tags.is_empty()
    }

    /// Value for one metadata column of `entity`'s row.
    pub fn metadata_value(&self, entity: &Entity, field: MetadataField) -> CellValue {
        match field {
            MetadataField::Title => CellValue::from(entity.name.as_str()),
            MetadataField::Id => CellValue::from(entity.id),
            MetadataField::ScrapedOn => self
                .scraped_on
                .map(|dt| CellValue::DateTime(dt.naive_utc()))
                .unwrap_or_default(),
            MetadataField::ReleaseDate => CellValue::from(self.release_date.clone()),
            MetadataField::TotalReviewCount => CellValue::from(self.total_review_count.clone()),
            MetadataField::ReviewPositivity => CellValue::from(self.review_positivity.clone()),
        }
    }
}
