//! Aggregate counts for dashboards.

use serde::Serialize;
use std::collections::BTreeMap;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};

/// Status and library counts
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessingStats {
    pub files_by_status: BTreeMap<String, u64>,
    pub batches_by_status: BTreeMap<String, u64>,
    /// Live library documents (reviewed, not deleted) by doc_type
    pub documents_by_type: BTreeMap<String, u64>,
    pub library_total: u64,
    pub review_queue_size: u64,
}

impl Database {
    /// Compute processing and library statistics
    pub fn processing_stats(&self) -> ServiceResult<ProcessingStats> {
        let conn = self.conn()?;

        let grouped = |sql: &str| -> ServiceResult<BTreeMap<String, u64>> {
            let mut stmt = conn.prepare(sql).map_err(DatabaseError::Query)?;
            let counts = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })
                .map_err(DatabaseError::Query)?
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map_err(DatabaseError::Query)?;
            Ok(counts)
        };

        let files_by_status =
            grouped("SELECT status, COUNT(*) FROM processing_files GROUP BY status")?;
        let batches_by_status =
            grouped("SELECT status, COUNT(*) FROM processing_batches GROUP BY status")?;
        let documents_by_type = grouped(
            "SELECT doc_type, COUNT(*) FROM documents WHERE is_reviewed = 1 AND is_deleted = 0 GROUP BY doc_type",
        )?;

        let review_queue_size: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE is_reviewed = 0 AND is_deleted = 0 \
                 AND processing_status IN ('review_pending', 'under_review')",
                [],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(ProcessingStats {
            library_total: documents_by_type.values().sum(),
            files_by_status,
            batches_by_status,
            documents_by_type,
            review_queue_size: review_queue_size as u64,
        })
    }
}
