//! Vote/favorite ledger: one toggle algorithm shared by every content kind.
//!
//! The transition table per (user, target):
//! `none -> liked` (+1), `liked -> none` (-1), `disliked -> liked` (+2) and
//! the exact mirror for dislikes. Saves are an independent set toggle with
//! no rating side effect. The store applies the set change and the rating
//! adjustment under one write boundary, so a toggle is all-or-nothing.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{ServiceError, ServiceResult};
use crate::models::Id;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Like,
    Dislike,
}

/// Content kind + id a vote is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTarget {
    Post(Id),
    Comment(Id),
    Question(Id),
    Answer(Id),
}

impl VoteTarget {
    pub fn id(&self) -> Id {
        match *self {
            VoteTarget::Post(id)
            | VoteTarget::Comment(id)
            | VoteTarget::Question(id)
            | VoteTarget::Answer(id) => id,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post",
            VoteTarget::Comment(_) => "comment",
            VoteTarget::Question(_) => "question",
            VoteTarget::Answer(_) => "answer",
        }
    }

    /// Only answers carry an opposing dislike set.
    pub fn supports_dislike(&self) -> bool {
        matches!(self, VoteTarget::Answer(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Post(Id),
    Question(Id),
}

/// Result of a toggle: the target's rating after the write, the applied
/// delta, and whether the user now holds the vote.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct VoteOutcome {
    pub rating: i64,
    pub delta: i64,
    pub engaged: bool,
}

/// Mutable borrow of the interaction-set pair for one content kind.
/// `disliked` is `None` for kinds without an opposing set.
pub struct LedgerSets<'a> {
    pub liked: &'a mut BTreeSet<Id>,
    pub disliked: Option<&'a mut BTreeSet<Id>>,
}

/// Pure toggle transition. Returns (rating delta, engaged-after).
///
/// Callers must pre-check `supports_dislike`; a dislike against a kind with
/// no opposing set is a programming error surfaced as `None`.
pub fn apply_toggle(sets: LedgerSets<'_>, target_id: Id, kind: VoteKind) -> Option<(i64, bool)> {
    match kind {
        VoteKind::Like => {
            if sets.liked.remove(&target_id) {
                return Some((-1, false));
            }
            sets.liked.insert(target_id);
            let mut delta = 1;
            if let Some(disliked) = sets.disliked {
                // switching sides undoes the prior dislike as well
                if disliked.remove(&target_id) {
                    delta += 1;
                }
            }
            Some((delta, true))
        }
        VoteKind::Dislike => {
            let disliked = sets.disliked?;
            if disliked.remove(&target_id) {
                return Some((1, false));
            }
            disliked.insert(target_id);
            let mut delta = -1;
            if sets.liked.remove(&target_id) {
                delta -= 1;
            }
            Some((delta, true))
        }
    }
}

#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn Store>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn toggle_like(&self, user_id: Id, target: VoteTarget) -> ServiceResult<VoteOutcome> {
        Ok(self.store.toggle_vote(user_id, target, VoteKind::Like).await?)
    }

    pub async fn toggle_dislike(
        &self,
        user_id: Id,
        target: VoteTarget,
    ) -> ServiceResult<VoteOutcome> {
        if !target.supports_dislike() {
            return Err(ServiceError::Validation(format!(
                "dislike is not supported for {}s",
                target.kind_name()
            )));
        }
        Ok(self
            .store
            .toggle_vote(user_id, target, VoteKind::Dislike)
            .await?)
    }

    /// Pure set toggle on the user's saved collection; returns whether the
    /// item is saved after the call.
    pub async fn toggle_save(&self, user_id: Id, target: SaveTarget) -> ServiceResult<bool> {
        Ok(self.store.toggle_save(user_id, target).await?)
    }
}
