//! Presence projection
//!
//! The roster is always derived from a room's participant set; it is never
//! stored separately.

use serde::Serialize;

use super::types::{ParticipantId, Session};

/// Public view of a participant. The send capability is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub username: String,
    pub joined_at: i64,
}

/// Participants of a room in join order
pub fn roster(session: &Session) -> Vec<ParticipantInfo> {
    let mut participants: Vec<_> = session.participants.values().collect();
    participants.sort_by_key(|p| p.join_seq);

    participants
        .into_iter()
        .map(|p| ParticipantInfo {
            id: p.id.clone(),
            username: p.username.clone(),
            joined_at: p.joined_at,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::sink::Frame;
    use crate::session::types::{Participant, RegistryConfig};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn participant(id: &str, seq: u64) -> Participant {
        let (tx, _rx) = mpsc::unbounded_channel::<Frame>();
        Participant {
            id: id.to_string(),
            username: format!("user-{}", id),
            sink: Arc::new(tx),
            joined_at: 1_700_000_000_000,
            join_seq: seq,
        }
    }

    #[test]
    fn test_roster_follows_join_order() {
        let mut session = Session::new("r1", &RegistryConfig::default());
        for (id, seq) in [("c", 3), ("a", 1), ("b", 2)] {
            session.participants.insert(id.to_string(), participant(id, seq));
        }

        let ids: Vec<_> = roster(&session).into_iter().map(|p| p.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_roster_serializes_public_fields_only() {
        let mut session = Session::new("r1", &RegistryConfig::default());
        session.participants.insert("a".to_string(), participant("a", 1));

        let json = serde_json::to_value(roster(&session)).unwrap();
        let entry = &json[0];
        assert_eq!(entry["id"], "a");
        assert_eq!(entry["username"], "user-a");
        assert_eq!(entry["joinedAt"], 1_700_000_000_000i64);
        assert_eq!(entry.as_object().unwrap().len(), 3);
    }
}
