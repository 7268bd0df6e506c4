use tokio::sync::Mutex;

struct Inner {
    term: i64,
    voted_for: Option<String>,
    current_leader: Option<String>,
}

/// Process-wide `{term, voted_for, current_leader}`, guarded by a single
/// mutex so reads and read-modify-writes never race.
///
/// Votes yes at most once per term, and a higher term always wins. See
/// DESIGN.md for why this is stricter than a bare "yes unless already
/// voted" rule.
pub struct ElectionState {
    inner: Mutex<Inner>,
}

impl Default for ElectionState {
    fn default() -> Self {
        Self::new()
    }
}

impl ElectionState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                term: 0,
                voted_for: None,
                current_leader: None,
            }),
        }
    }

    pub async fn current_leader(&self) -> Option<String> {
        self.inner.lock().await.current_leader.clone()
    }

    pub async fn term(&self) -> i64 {
        self.inner.lock().await.term
    }

    /// Called by `NotifyLeadership` and by a candidate who won its own
    /// election.
    pub async fn set_leader(&self, leader: String) {
        self.inner.lock().await.current_leader = Some(leader);
    }

    /// Bumps the term and votes for self, returning the new term to
    /// broadcast in `TriggerElection(term, self_address)`.
    pub async fn become_candidate(&self, self_address: &str) -> i64 {
        let mut inner = self.inner.lock().await;
        inner.term += 1;
        inner.voted_for = Some(self_address.to_string());
        inner.term
    }

    /// Grants a vote to `candidate` for `candidate_term` iff: the candidate's
    /// term is strictly newer (always wins, resets `voted_for`), or it
    /// matches the current term and we haven't voted for someone else yet
    /// (invariant I6: at most one vote per term).
    pub async fn try_vote(&self, candidate_term: i64, candidate: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if candidate_term > inner.term {
            inner.term = candidate_term;
            inner.voted_for = Some(candidate.to_string());
            return true;
        }
        if candidate_term == inner.term {
            match &inner.voted_for {
                None => {
                    inner.voted_for = Some(candidate.to_string());
                    true
                }
                Some(voted) => voted == candidate,
            }
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_vote_in_a_term_is_granted() {
        let state = ElectionState::new();
        assert!(state.try_vote(1, "b").await);
    }

    #[tokio::test]
    async fn second_candidate_in_the_same_term_is_rejected() {
        let state = ElectionState::new();
        assert!(state.try_vote(1, "b").await);
        assert!(!state.try_vote(1, "c").await);
    }

    #[tokio::test]
    async fn same_candidate_re_requesting_the_same_term_is_idempotent() {
        let state = ElectionState::new();
        assert!(state.try_vote(1, "b").await);
        assert!(state.try_vote(1, "b").await);
    }

    #[tokio::test]
    async fn higher_term_always_wins_even_after_a_prior_vote() {
        let state = ElectionState::new();
        assert!(state.try_vote(1, "b").await);
        assert!(state.try_vote(2, "c").await);
    }

    #[tokio::test]
    async fn stale_term_is_rejected() {
        let state = ElectionState::new();
        assert!(state.try_vote(5, "b").await);
        assert!(!state.try_vote(3, "c").await);
    }

    #[tokio::test]
    async fn become_candidate_increments_term_and_self_votes() {
        let state = ElectionState::new();
        let term = state.become_candidate("a").await;
        assert_eq!(term, 1);
        assert_eq!(state.term().await, 1);
    }
}
