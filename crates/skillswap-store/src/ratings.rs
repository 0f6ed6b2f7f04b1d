//! Post-call ratings, one per session.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use skillswap_shared::{SessionId, UserId};

use crate::database::Database;
use crate::error::{conflict_on_constraint, Result, StoreError};
use crate::models::{CallIssue, CallQuality, CallRating, NewRating, RatingSummary};
use crate::sessions::{conversion_error, parse_session_id, parse_ts, parse_user, parse_uuid};

pub const MAX_FEEDBACK_CHARS: usize = 500;

const RATING_COLUMNS: &str = "id, session_id, rater_id, ratee_id, rating, feedback, \
                              call_duration_secs, call_quality, issues, created_at";

impl Database {
    /// Record `rater`'s verdict on a session. The other participant is the
    /// ratee. A session takes one rating; the second is a conflict.
    pub fn submit_rating(
        &self,
        session_id: SessionId,
        rater: &UserId,
        input: &NewRating,
    ) -> Result<CallRating> {
        if !(1..=10).contains(&input.rating) {
            return Err(StoreError::Validation("Rating must be between 1 and 10".into()));
        }
        if let Some(feedback) = &input.feedback {
            if feedback.chars().count() > MAX_FEEDBACK_CHARS {
                return Err(StoreError::Validation(format!(
                    "Feedback is limited to {MAX_FEEDBACK_CHARS} characters"
                )));
            }
        }

        let session = self.get_session(session_id)?;
        let ratee = session
            .peer_of(rater)
            .cloned()
            .ok_or_else(|| StoreError::Validation("Rater did not take part in the call".into()))?;

        let issues = if input.issues.is_empty() {
            vec![CallIssue::None]
        } else {
            input.issues.clone()
        };
        let feedback = input
            .feedback
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_owned);

        let rating = CallRating {
            id: Uuid::new_v4(),
            session_id,
            rater_id: rater.clone(),
            ratee_id: ratee,
            rating: input.rating,
            feedback,
            call_duration_secs: input.call_duration_secs,
            call_quality: input.call_quality,
            issues,
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                &format!(
                    "INSERT INTO call_ratings ({RATING_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    rating.id.to_string(),
                    session_id.to_string(),
                    rating.rater_id.as_str(),
                    rating.ratee_id.as_str(),
                    rating.rating,
                    rating.feedback,
                    rating.call_duration_secs as i64,
                    rating.call_quality.as_str(),
                    serde_json::to_string(&rating.issues)?,
                    rating.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                conflict_on_constraint(e, "Rating already submitted for this call session")
            })?;

        tracing::debug!(session = %session_id, rater = %rater, "stored call rating");
        Ok(rating)
    }

    /// Ratings `user` gave or received, newest first, plus the total count.
    pub fn ratings_for_user(
        &self,
        user: &UserId,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<CallRating>, u64)> {
        let total: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM call_ratings WHERE rater_id = ?1 OR ratee_id = ?1",
            params![user.as_str()],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(&format!(
            "SELECT {RATING_COLUMNS} FROM call_ratings
             WHERE rater_id = ?1 OR ratee_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![user.as_str(), limit, offset], row_to_rating)?;

        let mut ratings = Vec::new();
        for row in rows {
            ratings.push(row?);
        }
        Ok((ratings, total as u64))
    }

    /// Average over every rating `user` gave or received.
    pub fn rating_summary(&self, user: &UserId) -> Result<RatingSummary> {
        let (count, sum): (i64, i64) = self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(rating), 0) FROM call_ratings
             WHERE rater_id = ?1 OR ratee_id = ?1",
            params![user.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let average_rating = if count == 0 {
            0.0
        } else {
            (sum as f64 / count as f64 * 10.0).round() / 10.0
        };
        Ok(RatingSummary {
            average_rating,
            total_calls: count as u64,
            total_rating: sum as u64,
        })
    }
}

fn row_to_rating(row: &rusqlite::Row<'_>) -> rusqlite::Result<CallRating> {
    let quality_raw: String = row.get(7)?;
    let call_quality = CallQuality::from_str(&quality_raw).map_err(|e| conversion_error(7, e))?;

    let issues_raw: String = row.get(8)?;
    let issues: Vec<CallIssue> =
        serde_json::from_str(&issues_raw).map_err(|e| conversion_error(8, e))?;

    let duration: i64 = row.get(6)?;

    Ok(CallRating {
        id: parse_uuid(row, 0)?,
        session_id: parse_session_id(row, 1)?,
        rater_id: parse_user(row, 2)?,
        ratee_id: parse_user(row, 3)?,
        rating: row.get(4)?,
        feedback: row.get(5)?,
        call_duration_secs: duration.max(0) as u64,
        call_quality,
        issues,
        created_at: parse_ts(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn rating(score: u8) -> NewRating {
        NewRating {
            rating: score,
            ..NewRating::default()
        }
    }

    #[test]
    fn test_submit_rating_names_the_peer() {
        let db = Database::open_in_memory().unwrap();
        let session = db.create_session(&uid("alice"), &uid("bob")).unwrap();

        let input = NewRating {
            rating: 8,
            feedback: Some("  great explanation of lifetimes ".into()),
            call_duration_secs: 1800,
            call_quality: CallQuality::Excellent,
            issues: vec![CallIssue::Lag],
        };
        let stored = db.submit_rating(session.id, &uid("bob"), &input).unwrap();
        assert_eq!(stored.ratee_id, uid("alice"));
        assert_eq!(stored.feedback.as_deref(), Some("great explanation of lifetimes"));

        let (listed, total) = db.ratings_for_user(&uid("alice"), 10, 0).unwrap();
        assert_eq!(total, 1);
        assert_eq!(listed, vec![stored]);
    }

    #[test]
    fn test_defaults_issues_to_none() {
        let db = Database::open_in_memory().unwrap();
        let session = db.create_session(&uid("alice"), &uid("bob")).unwrap();

        let stored = db.submit_rating(session.id, &uid("alice"), &rating(6)).unwrap();
        assert_eq!(stored.issues, vec![CallIssue::None]);
        assert_eq!(stored.call_quality, CallQuality::Good);

        let (listed, _) = db.ratings_for_user(&uid("bob"), 10, 0).unwrap();
        assert_eq!(listed[0].issues, vec![CallIssue::None]);
    }

    #[test]
    fn test_one_rating_per_session() {
        let db = Database::open_in_memory().unwrap();
        let session = db.create_session(&uid("alice"), &uid("bob")).unwrap();

        db.submit_rating(session.id, &uid("alice"), &rating(7)).unwrap();
        assert!(matches!(
            db.submit_rating(session.id, &uid("bob"), &rating(9)),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_rating_refusals() {
        let db = Database::open_in_memory().unwrap();
        let session = db.create_session(&uid("alice"), &uid("bob")).unwrap();

        for score in [0, 11] {
            assert!(matches!(
                db.submit_rating(session.id, &uid("alice"), &rating(score)),
                Err(StoreError::Validation(_))
            ));
        }

        let long = NewRating {
            rating: 5,
            feedback: Some("x".repeat(MAX_FEEDBACK_CHARS + 1)),
            ..NewRating::default()
        };
        assert!(matches!(
            db.submit_rating(session.id, &uid("alice"), &long),
            Err(StoreError::Validation(_))
        ));

        assert!(matches!(
            db.submit_rating(session.id, &uid("mallory"), &rating(5)),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.submit_rating(SessionId::new(), &uid("alice"), &rating(5)),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn test_summary_rounds_to_one_decimal() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(
            db.rating_summary(&uid("alice")).unwrap(),
            RatingSummary {
                average_rating: 0.0,
                total_calls: 0,
                total_rating: 0,
            }
        );

        for (peer, score) in [("bob", 7), ("carol", 8), ("dave", 8)] {
            let session = db.create_session(&uid("alice"), &uid(peer)).unwrap();
            db.submit_rating(session.id, &uid(peer), &rating(score)).unwrap();
        }

        let summary = db.rating_summary(&uid("alice")).unwrap();
        assert_eq!(summary.total_calls, 3);
        assert_eq!(summary.total_rating, 23);
        assert_eq!(summary.average_rating, 7.7);
    }

    #[test]
    fn test_ratings_paginate_newest_first() {
        let db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for peer in ["bob", "carol", "dave"] {
            let session = db.create_session(&uid("alice"), &uid(peer)).unwrap();
            ids.push(db.submit_rating(session.id, &uid("alice"), &rating(5)).unwrap().id);
        }

        let (page, total) = db.ratings_for_user(&uid("alice"), 2, 2).unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[0]);
    }
}
