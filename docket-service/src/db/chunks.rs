//! Chunk and embedding operations.
//!
//! Embeddings are stored as little-endian `f32` blobs and ranked by brute
//! force cosine similarity.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use super::models::{ChunkMatch, DocCategory, DocType, DocumentChunk, NewChunk};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Remove every chunk produced for a file
    pub fn delete_chunks_for_file(&self, file_id: &str) -> ServiceResult<usize> {
        let conn = self.conn()?;

        let rows = conn
            .execute(
                "DELETE FROM document_chunks WHERE processing_file_id = ?1",
                params![file_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows)
    }

    /// Persist one stream batch of embedded chunks
    pub fn insert_chunks(
        &self,
        file_id: &str,
        document_id: Option<&str>,
        chunks: &[NewChunk],
    ) -> ServiceResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(DatabaseError::Query)?;
        let now = Utc::now().to_rfc3339();

        {
            let mut stmt = tx
                .prepare(
                    r#"
                    INSERT INTO document_chunks (id, processing_file_id, document_id, chunk_index, content, embedding, token_count, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    "#,
                )
                .map_err(DatabaseError::Query)?;

            for chunk in chunks {
                let embedding_bytes: Vec<u8> =
                    chunk.embedding.iter().flat_map(|f| f.to_le_bytes()).collect();
                stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    file_id,
                    document_id,
                    chunk.chunk_index,
                    chunk.content,
                    embedding_bytes,
                    chunk.token_count,
                    now,
                ])
                .map_err(DatabaseError::Query)?;
            }
        }

        tx.commit().map_err(DatabaseError::Query)?;
        Ok(())
    }

    /// Count the chunks stored for a file
    pub fn count_chunks_for_file(&self, file_id: &str) -> ServiceResult<u32> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT COUNT(*) FROM document_chunks WHERE processing_file_id = ?1",
            params![file_id],
            |row| row.get(0),
        )
        .map_err(DatabaseError::Query)
        .map_err(Into::into)
    }

    /// List a file's chunks in order, without vectors
    pub fn list_chunks_for_file(&self, file_id: &str) -> ServiceResult<Vec<DocumentChunk>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, processing_file_id, document_id, chunk_index, content, token_count, created_at \
                 FROM document_chunks WHERE processing_file_id = ?1 ORDER BY chunk_index",
            )
            .map_err(DatabaseError::Query)?;

        let chunks = stmt
            .query_map(params![file_id], DocumentChunk::from_row)
            .map_err(DatabaseError::Query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)?;

        Ok(chunks)
    }

    /// Rank chunks of approved library documents against a query vector.
    ///
    /// Returns at most `limit` matches with similarity ≥ `threshold`, best
    /// first, optionally restricted to the given categories.
    pub fn nearest_chunks(
        &self,
        query_embedding: &[f32],
        limit: usize,
        threshold: f32,
        categories: Option<&[DocCategory]>,
    ) -> ServiceResult<Vec<ChunkMatch>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                r#"
                SELECT c.id, c.document_id, c.chunk_index, c.content, c.embedding,
                       d.title, d.original_filename, d.doc_type, d.doc_category
                FROM document_chunks c
                JOIN documents d ON d.id = c.document_id
                WHERE d.is_deleted = 0
                  AND d.is_reviewed = 1
                  AND d.processing_status = 'active'
                "#,
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map([], |row| {
                let embedding_bytes: Vec<u8> = row.get(4)?;
                let doc_type: String = row.get(7)?;
                let doc_category: String = row.get(8)?;
                Ok((
                    ChunkMatch {
                        chunk_id: row.get(0)?,
                        document_id: row.get(1)?,
                        chunk_index: row.get(2)?,
                        content: row.get(3)?,
                        title: row.get(5)?,
                        original_filename: row.get(6)?,
                        doc_type: DocType::from_db(&doc_type),
                        doc_category: DocCategory::from_db(&doc_category),
                        similarity: 0.0,
                    },
                    embedding_bytes,
                ))
            })
            .map_err(DatabaseError::Query)?;

        let mut results = Vec::new();
        for row in rows {
            let (mut chunk, embedding_bytes) = row.map_err(DatabaseError::Query)?;

            if let Some(categories) = categories
                && !categories.contains(&chunk.doc_category)
            {
                continue;
            }

            let embedding = decode_embedding(&embedding_bytes);
            chunk.similarity = cosine_similarity(query_embedding, &embedding);
            if chunk.similarity >= threshold {
                results.push(chunk);
            }
        }

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(limit);

        Ok(results)
    }
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

pub(super) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Document, FileStatus, ProcessingBatch, ProcessingFile};

    fn seed_file(db: &Database, hash: &str, category: DocCategory) -> (String, String) {
        let batch = ProcessingBatch::new("tester");
        db.insert_batch(&batch).unwrap();
        let mut doc = Document::placeholder("a.txt", hash, "text/plain", 10, "tester");
        doc.doc_category = category;
        let now = Utc::now();
        let file = ProcessingFile {
            id: Uuid::new_v4().to_string(),
            batch_id: batch.id.clone(),
            document_id: Some(doc.id.clone()),
            original_filename: "a.txt".to_string(),
            stored_path: "uploads/a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            content_hash: hash.to_string(),
            file_size: 10,
            status: FileStatus::ReviewPending,
            retry_count: 0,
            error_message: None,
            page_count: None,
            word_count: None,
            char_count: None,
            chunk_count: 0,
            uploaded_by: "tester".to_string(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            created_at: now,
            updated_at: now,
        };
        db.insert_upload(&doc, &file).unwrap();
        (file.id, doc.id)
    }

    fn chunk(index: u32, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            chunk_index: index,
            content: format!("chunk {}", index),
            token_count: 2,
            embedding,
        }
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_nearest_chunks_threshold_limit_and_category() {
        let db = Database::open_in_memory().unwrap();
        let (pi_file, pi_doc) = seed_file(&db, "h1", DocCategory::PersonalInjury);
        let (em_file, em_doc) = seed_file(&db, "h2", DocCategory::Employment);
        assert!(db.approve_file(&pi_file, "reviewer", None).unwrap());
        assert!(db.approve_file(&em_file, "reviewer", None).unwrap());

        db.insert_chunks(
            &pi_file,
            Some(&pi_doc),
            &[chunk(0, vec![1.0, 0.0]), chunk(1, vec![0.9, 0.1])],
        )
        .unwrap();
        db.insert_chunks(&em_file, Some(&em_doc), &[chunk(0, vec![0.0, 1.0])])
            .unwrap();

        let all = db.nearest_chunks(&[1.0, 0.0], 10, 0.7, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].chunk_index, 0);
        assert!(all[0].similarity >= all[1].similarity);

        let limited = db.nearest_chunks(&[1.0, 0.0], 1, 0.0, None).unwrap();
        assert_eq!(limited.len(), 1);

        let employment = db
            .nearest_chunks(&[0.0, 1.0], 10, 0.7, Some(&[DocCategory::Employment]))
            .unwrap();
        assert_eq!(employment.len(), 1);
        assert_eq!(employment[0].document_id, em_doc);
    }

    #[test]
    fn test_nearest_chunks_only_searches_approved_documents() {
        let db = Database::open_in_memory().unwrap();
        let (pending_file, pending_doc) = seed_file(&db, "h4", DocCategory::Other);
        let (rejected_file, rejected_doc) = seed_file(&db, "h5", DocCategory::Other);
        let (approved_file, approved_doc) = seed_file(&db, "h6", DocCategory::Other);
        for (file_id, doc_id) in [
            (&pending_file, &pending_doc),
            (&rejected_file, &rejected_doc),
            (&approved_file, &approved_doc),
        ] {
            db.insert_chunks(file_id, Some(doc_id), &[chunk(0, vec![1.0, 0.0])])
                .unwrap();
        }
        assert!(db.reject_file(&rejected_file, "reviewer", "off topic").unwrap());
        assert!(db.approve_file(&approved_file, "reviewer", None).unwrap());

        let results = db.nearest_chunks(&[1.0, 0.0], 10, 0.0, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, approved_doc);
    }

    #[test]
    fn test_chunks_cascade_with_document() {
        let db = Database::open_in_memory().unwrap();
        let (file_id, doc_id) = seed_file(&db, "h3", DocCategory::Other);
        db.insert_chunks(&file_id, Some(&doc_id), &[chunk(0, vec![1.0]), chunk(1, vec![1.0])])
            .unwrap();
        assert_eq!(db.count_chunks_for_file(&file_id).unwrap(), 2);

        assert!(db.delete_document(&doc_id).unwrap());
        assert_eq!(db.count_chunks_for_file(&file_id).unwrap(), 0);
        let file = db.get_file(&file_id).unwrap().unwrap();
        assert!(file.document_id.is_none());
    }
}
