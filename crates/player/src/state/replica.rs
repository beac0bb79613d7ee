//! Read-only mirror of the host's session.
//!
//! Replaced wholesale on every broadcast. Identical copies are swallowed so
//! observers only wake for real changes.

use tokio::sync::watch;

use fari_domain::{PeerId, Player, Session};

pub struct SessionReplica {
    state: watch::Sender<Option<Session>>,
}

impl SessionReplica {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Swap in the host's latest copy. Returns true if it differed.
    pub fn replace(&self, session: Session) -> bool {
        self.state.send_if_modified(|current| {
            if current.as_ref() == Some(&session) {
                return false;
            }
            *current = Some(session);
            true
        })
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    pub fn players_with_character_sheets(&self, user_id: &PeerId) -> Vec<Player> {
        self.state
            .borrow()
            .as_ref()
            .map(|session| {
                session
                    .players_with_character_sheets(user_id)
                    .into_iter()
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn user_character_sheet(&self, user_id: &PeerId) -> Option<Player> {
        self.state
            .borrow()
            .as_ref()
            .and_then(|session| session.user_character_sheet(user_id).cloned())
    }
}

impl Default for SessionReplica {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_copies_do_not_notify() {
        let replica = SessionReplica::new();
        let mut rx = replica.subscribe();
        let session = Session::new(PeerId::new("gm"));

        assert!(replica.replace(session.clone()));
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        assert!(!replica.replace(session.clone()));
        assert!(!replica.replace(session));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn a_different_copy_replaces_the_whole_document() {
        let replica = SessionReplica::new();
        replica.replace(Session::new(PeerId::new("gm")));
        let mut next = Session::new(PeerId::new("gm"));
        next.players.push(Player::connected(PeerId::new("p1"), "Magnus"));

        assert!(replica.replace(next.clone()));
        assert_eq!(replica.snapshot(), Some(next));
        assert!(replica.user_character_sheet(&PeerId::new("p1")).is_some());
        assert!(replica.players_with_character_sheets(&PeerId::new("p1")).is_empty());
    }
}
