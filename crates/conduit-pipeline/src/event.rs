//! Narrowed projections of change-log records
//!
//! Synchronizers never see raw change records; the dispatcher hands each one
//! exactly the projection it consumes.

use crate::error::PipelineError;
use conduit_domain::{ArticleId, UserId};
use conduit_index::{IndexAction, IndexWrite};
use conduit_store::{ChangeKind, ChangeRecord};
use serde::{Deserialize, Serialize};

/// Feed-materializer input: an article was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCreated {
    pub article_id: ArticleId,
    pub author_id: UserId,
    /// Article creation time, unix milliseconds; becomes the feed sort key
    pub created_at: i64,
}

/// The fields the feed projection needs out of an article snapshot
#[derive(Debug, Deserialize)]
struct ArticleRow {
    id: ArticleId,
    author_id: UserId,
    created_at: i64,
}

impl ArticleCreated {
    /// Narrow an insert record down to the feed event
    ///
    /// # Errors
    /// `PipelineError::MalformedRecord` when the snapshot is missing or does
    /// not carry the article fields.
    pub fn from_record(record: &ChangeRecord) -> Result<Self, PipelineError> {
        let snapshot = record
            .snapshot()
            .ok_or_else(|| malformed(record, "insert record carries no snapshot"))?;
        let row: ArticleRow = serde_json::from_value(snapshot.clone())
            .map_err(|e| malformed(record, &e.to_string()))?;
        Ok(Self {
            article_id: row.id,
            author_id: row.author_id,
            created_at: row.created_at,
        })
    }
}

/// Search-synchronizer input: any article mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchEvent {
    pub kind: ChangeKind,
    pub article_id: ArticleId,
    /// Store sequence number, used as the external document version
    pub version: u64,
    /// Projection of the article for full-text and tag search; absent on remove
    pub fields: Option<serde_json::Value>,
}

/// Keys of the article snapshot that the search surface indexes
const INDEXED_FIELDS: [&str; 7] = [
    "title",
    "description",
    "body",
    "tags",
    "author_id",
    "slug",
    "created_at",
];

impl SearchEvent {
    /// Narrow a change record down to the search event
    ///
    /// # Errors
    /// `PipelineError::MalformedRecord` when the record has no usable key or
    /// snapshot for its mutation kind.
    pub fn from_record(record: &ChangeRecord) -> Result<Self, PipelineError> {
        let key = record
            .key()
            .ok_or_else(|| malformed(record, "record carries no key"))?;
        let article_id = key
            .as_article_id()
            .ok_or_else(|| malformed(record, "key is not an article id"))?;

        let fields = match record.kind {
            ChangeKind::Insert | ChangeKind::Modify => {
                let snapshot = record
                    .snapshot()
                    .ok_or_else(|| malformed(record, "mutation carries no snapshot"))?;
                Some(project_fields(snapshot))
            }
            ChangeKind::Remove => None,
        };

        Ok(Self {
            kind: record.kind,
            article_id,
            version: record.sequence.0,
            fields,
        })
    }

    /// Map to the index write surface: insert/modify upsert, remove deletes
    #[must_use]
    pub fn into_index_write(self) -> IndexWrite {
        let action = match self.kind {
            ChangeKind::Insert | ChangeKind::Modify => IndexAction::Upsert,
            ChangeKind::Remove => IndexAction::Delete,
        };
        IndexWrite {
            doc_id: self.article_id.to_string(),
            version: self.version,
            action,
            fields: self.fields,
        }
    }
}

fn project_fields(snapshot: &serde_json::Value) -> serde_json::Value {
    let mut projected = serde_json::Map::new();
    if let Some(map) = snapshot.as_object() {
        for field in INDEXED_FIELDS {
            if let Some(value) = map.get(field) {
                projected.insert(field.to_string(), value.clone());
            }
        }
    }
    serde_json::Value::Object(projected)
}

fn malformed(record: &ChangeRecord, reason: &str) -> PipelineError {
    PipelineError::MalformedRecord {
        sequence: record.sequence.0,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_domain::Article;
    use conduit_store::{SequenceNumber, StoreKey};
    use pretty_assertions::assert_eq;

    fn insert_record(article: &Article, sequence: u64) -> ChangeRecord {
        ChangeRecord::insert(
            StoreKey::article(article.id),
            serde_json::to_value(article).unwrap(),
            SequenceNumber(sequence),
        )
    }

    #[test]
    fn article_created_from_insert() {
        let author = UserId::new();
        let article = Article::new(author, "Projection Test", "d", "b", vec![]).unwrap();
        let record = insert_record(&article, 3);

        let event = ArticleCreated::from_record(&record).unwrap();
        assert_eq!(event.article_id, article.id);
        assert_eq!(event.author_id, author);
        assert_eq!(event.created_at, article.created_at.timestamp_millis());
    }

    #[test]
    fn article_created_rejects_snapshotless_record() {
        let mut record = insert_record(
            &Article::new(UserId::new(), "No Snapshot", "d", "b", vec![]).unwrap(),
            1,
        );
        record.after = None;
        assert!(matches!(
            ArticleCreated::from_record(&record),
            Err(PipelineError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn search_event_projects_indexed_fields_only() {
        let article = Article::new(
            UserId::new(),
            "Indexable",
            "a description",
            "a body",
            vec!["rust".into(), "cdc".into()],
        )
        .unwrap();
        let record = insert_record(&article, 11);

        let event = SearchEvent::from_record(&record).unwrap();
        assert_eq!(event.version, 11);
        let fields = event.fields.unwrap();
        assert_eq!(fields["slug"], article.slug.as_str());
        assert_eq!(fields["tags"][1], "cdc");
        // Non-indexed attributes are not mirrored
        assert!(fields.get("favorites_count").is_none());
        assert!(fields.get("id").is_none());
    }

    #[test]
    fn remove_event_maps_to_delete_without_fields() {
        let article = Article::new(UserId::new(), "Removable", "d", "b", vec![]).unwrap();
        let record = ChangeRecord::remove(
            StoreKey::article(article.id),
            serde_json::to_value(&article).unwrap(),
            SequenceNumber(8),
        );

        let event = SearchEvent::from_record(&record).unwrap();
        assert_eq!(event.kind, ChangeKind::Remove);
        assert!(event.fields.is_none());

        let write = event.into_index_write();
        assert_eq!(write.action, IndexAction::Delete);
        assert_eq!(write.version, 8);
    }

    #[test]
    fn search_event_rejects_guard_keys() {
        let record = ChangeRecord::insert(
            StoreKey::slug_guard("some-slug"),
            serde_json::json!({"slug": "some-slug"}),
            SequenceNumber(2),
        );
        assert!(matches!(
            SearchEvent::from_record(&record),
            Err(PipelineError::MalformedRecord { .. })
        ));
    }
}
