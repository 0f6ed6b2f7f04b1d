//! Friend requests: the handshake that ends in a row in `friendships`.
//!
//! A pair has at most one pending request, whichever side sent it; the
//! partial unique index turns a second one into [`StoreError::Conflict`].

use std::str::FromStr;

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use skillswap_shared::UserId;

use crate::database::Database;
use crate::error::{conflict_on_constraint, not_found_on_no_rows, Result, StoreError};
use crate::models::{FriendRequest, FriendRequestStatus};
use crate::sessions::{conversion_error, parse_ts, parse_user, parse_uuid};

const REQUEST_COLUMNS: &str = "id, sender_id, receiver_id, status, created_at, updated_at";

impl Database {
    /// Ask `target` to become friends with `sender`.
    pub fn send_friend_request(&self, sender: &UserId, target: &UserId) -> Result<FriendRequest> {
        if sender == target {
            return Err(StoreError::Validation("Cannot friend yourself".into()));
        }
        if !self.user_exists(target)? {
            return Err(StoreError::NotFound);
        }
        if self.are_friends(sender, target)? {
            return Err(StoreError::Conflict("You are already friends".into()));
        }

        let (lo, hi) = UserId::ordered_pair(sender, target);
        let now = Utc::now();
        let request = FriendRequest {
            id: Uuid::new_v4(),
            sender_id: sender.clone(),
            receiver_id: target.clone(),
            status: FriendRequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.conn()
            .execute(
                "INSERT INTO friend_requests
                     (id, sender_id, receiver_id, user_lo, user_hi, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
                params![
                    request.id.to_string(),
                    sender.as_str(),
                    target.as_str(),
                    lo.as_str(),
                    hi.as_str(),
                    FriendRequestStatus::Pending.as_str(),
                    now.to_rfc3339(),
                ],
            )
            .map_err(|e| conflict_on_constraint(e, "A pending friend request already exists"))?;

        tracing::debug!(request = %request.id, "created friend request");
        Ok(request)
    }

    pub fn get_friend_request(&self, id: Uuid) -> Result<FriendRequest> {
        self.conn()
            .query_row(
                &format!("SELECT {REQUEST_COLUMNS} FROM friend_requests WHERE id = ?1"),
                params![id.to_string()],
                row_to_request,
            )
            .map_err(not_found_on_no_rows)
    }

    /// Pending requests addressed to `user`, newest first.
    pub fn incoming_friend_requests(&self, user: &UserId) -> Result<Vec<FriendRequest>> {
        self.pending_requests("receiver_id", user)
    }

    /// Pending requests `user` has sent, newest first.
    pub fn outgoing_friend_requests(&self, user: &UserId) -> Result<Vec<FriendRequest>> {
        self.pending_requests("sender_id", user)
    }

    fn pending_requests(&self, column: &str, user: &UserId) -> Result<Vec<FriendRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM friend_requests
             WHERE {column} = ?1 AND status = 'pending'
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(params![user.as_str()], row_to_request)?;

        let mut requests = Vec::new();
        for row in rows {
            requests.push(row?);
        }
        Ok(requests)
    }

    /// Settle a pending request. Accepting records the friendship in the
    /// same transaction.
    pub fn respond_to_friend_request(&self, id: Uuid, accept: bool) -> Result<FriendRequest> {
        let tx = self.conn().unchecked_transaction()?;
        let request = self.get_friend_request(id)?;
        if request.status != FriendRequestStatus::Pending {
            return Err(StoreError::Conflict("Request is not pending".into()));
        }

        let next = if accept {
            FriendRequestStatus::Accepted
        } else {
            FriendRequestStatus::Rejected
        };
        tx.execute(
            "UPDATE friend_requests SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id.to_string(), next.as_str(), Utc::now().to_rfc3339()],
        )?;
        if accept {
            self.add_friendship(&request.sender_id, &request.receiver_id)?;
        }

        tx.commit()?;
        self.get_friend_request(id)
    }

    /// Withdraw the pending request `sender` sent to `target`.
    /// Returns `false` if there was none.
    pub fn cancel_friend_request(&self, sender: &UserId, target: &UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM friend_requests
             WHERE sender_id = ?1 AND receiver_id = ?2 AND status = 'pending'",
            params![sender.as_str(), target.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Forget every request between the pair, in either direction.
    pub fn clear_friend_requests(&self, a: &UserId, b: &UserId) -> Result<usize> {
        let (lo, hi) = UserId::ordered_pair(a, b);
        let affected = self.conn().execute(
            "DELETE FROM friend_requests WHERE user_lo = ?1 AND user_hi = ?2",
            params![lo.as_str(), hi.as_str()],
        )?;
        Ok(affected)
    }
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequest> {
    let status_raw: String = row.get(3)?;
    let status = FriendRequestStatus::from_str(&status_raw).map_err(|e| conversion_error(3, e))?;

    Ok(FriendRequest {
        id: parse_uuid(row, 0)?,
        sender_id: parse_user(row, 1)?,
        receiver_id: parse_user(row, 2)?,
        status,
        created_at: parse_ts(row, 4)?,
        updated_at: parse_ts(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::new(s).unwrap()
    }

    fn db_with(users: &[&str]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for u in users {
            db.upsert_user(&uid(u), None).unwrap();
        }
        db
    }

    #[test]
    fn test_request_then_accept_makes_friends() {
        let db = db_with(&["alice", "bob"]);

        let request = db.send_friend_request(&uid("alice"), &uid("bob")).unwrap();
        assert_eq!(request.status, FriendRequestStatus::Pending);
        assert_eq!(db.incoming_friend_requests(&uid("bob")).unwrap(), vec![request.clone()]);
        assert_eq!(db.outgoing_friend_requests(&uid("alice")).unwrap().len(), 1);

        let accepted = db.respond_to_friend_request(request.id, true).unwrap();
        assert_eq!(accepted.status, FriendRequestStatus::Accepted);
        assert!(db.are_friends(&uid("bob"), &uid("alice")).unwrap());
        assert!(db.incoming_friend_requests(&uid("bob")).unwrap().is_empty());

        assert!(matches!(
            db.respond_to_friend_request(request.id, false),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_reject_leaves_strangers() {
        let db = db_with(&["alice", "bob"]);
        let request = db.send_friend_request(&uid("alice"), &uid("bob")).unwrap();

        let rejected = db.respond_to_friend_request(request.id, false).unwrap();
        assert_eq!(rejected.status, FriendRequestStatus::Rejected);
        assert!(!db.are_friends(&uid("alice"), &uid("bob")).unwrap());

        // A rejected request does not block a new one.
        assert!(db.send_friend_request(&uid("bob"), &uid("alice")).is_ok());
    }

    #[test]
    fn test_request_refusals() {
        let db = db_with(&["alice", "bob", "carol"]);

        assert!(matches!(
            db.send_friend_request(&uid("alice"), &uid("alice")),
            Err(StoreError::Validation(_))
        ));
        assert!(matches!(
            db.send_friend_request(&uid("alice"), &uid("ghost")),
            Err(StoreError::NotFound)
        ));

        db.send_friend_request(&uid("alice"), &uid("bob")).unwrap();
        assert!(matches!(
            db.send_friend_request(&uid("bob"), &uid("alice")),
            Err(StoreError::Conflict(_))
        ));

        db.add_friendship(&uid("alice"), &uid("carol")).unwrap();
        assert!(matches!(
            db.send_friend_request(&uid("carol"), &uid("alice")),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_cancel_and_clear() {
        let db = db_with(&["alice", "bob"]);
        db.send_friend_request(&uid("alice"), &uid("bob")).unwrap();

        assert!(!db.cancel_friend_request(&uid("bob"), &uid("alice")).unwrap());
        assert!(db.cancel_friend_request(&uid("alice"), &uid("bob")).unwrap());
        assert!(db.outgoing_friend_requests(&uid("alice")).unwrap().is_empty());

        let request = db.send_friend_request(&uid("bob"), &uid("alice")).unwrap();
        db.respond_to_friend_request(request.id, true).unwrap();
        assert_eq!(db.clear_friend_requests(&uid("alice"), &uid("bob")).unwrap(), 1);
        assert!(matches!(
            db.get_friend_request(request.id),
            Err(StoreError::NotFound)
        ));
    }
}
