use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::ErrorCategory;

/// Maximum number of users that may claim a single buddy-request post.
pub const PICKUP_CAPACITY: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClaimError {
    SelfClaim,
    AlreadyClaimed,
    CapacityExceeded,
    PostDecided,
    NotOwner,
    NotAClaimant,
    AlreadyDecided,
    NotABuddyRequest,
    PostDoesNotExist,
}

impl ClaimError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClaimError::SelfClaim => ErrorCategory::Validation,
            ClaimError::AlreadyClaimed => ErrorCategory::StateConflict,
            ClaimError::CapacityExceeded => ErrorCategory::Capacity,
            ClaimError::PostDecided => ErrorCategory::StateConflict,
            ClaimError::NotOwner => ErrorCategory::Authorization,
            ClaimError::NotAClaimant => ErrorCategory::Validation,
            ClaimError::AlreadyDecided => ErrorCategory::StateConflict,
            ClaimError::NotABuddyRequest => ErrorCategory::Validation,
            ClaimError::PostDoesNotExist => ErrorCategory::NotFound,
        }
    }
}

impl std::error::Error for ClaimError {}

impl fmt::Display for ClaimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimError::SelfClaim => write!(f, "ClaimError: Users cannot claim their own post"),
            ClaimError::AlreadyClaimed => {
                write!(f, "ClaimError: User has already claimed this post")
            }
            ClaimError::CapacityExceeded => write!(
                f,
                "ClaimError: Post already has the maximum of {PICKUP_CAPACITY} claims"
            ),
            ClaimError::PostDecided => {
                write!(f, "ClaimError: The owner has already selected a buddy")
            }
            ClaimError::NotOwner => {
                write!(f, "ClaimError: Only the post owner may select a buddy")
            }
            ClaimError::NotAClaimant => {
                write!(f, "ClaimError: Selected user has not claimed this post")
            }
            ClaimError::AlreadyDecided => {
                write!(f, "ClaimError: A different buddy has already been selected")
            }
            ClaimError::NotABuddyRequest => {
                write!(f, "ClaimError: Post is not a buddy request")
            }
            ClaimError::PostDoesNotExist => write!(f, "ClaimError: Post does not exist"),
        }
    }
}

/// The arbitration-relevant state of a post, read under a row lock.
#[derive(Clone, Debug)]
pub struct PostClaimState {
    pub owner_id: Uuid,
    pub selected_buddy_id: Option<Uuid>,
    pub claimant_ids: Vec<Uuid>,
}

impl PostClaimState {
    pub fn is_decided(&self) -> bool {
        self.selected_buddy_id.is_some()
    }

    pub fn remaining_capacity(&self) -> usize {
        PICKUP_CAPACITY.saturating_sub(self.claimant_ids.len())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectOutcome {
    Selected,
    Unchanged,
}

pub fn check_claim(state: &PostClaimState, claimant_id: Uuid) -> Result<(), ClaimError> {
    if claimant_id == state.owner_id {
        return Err(ClaimError::SelfClaim);
    }

    if state.claimant_ids.contains(&claimant_id) {
        return Err(ClaimError::AlreadyClaimed);
    }

    if state.claimant_ids.len() >= PICKUP_CAPACITY {
        return Err(ClaimError::CapacityExceeded);
    }

    if state.is_decided() {
        return Err(ClaimError::PostDecided);
    }

    Ok(())
}

pub fn check_select(
    state: &PostClaimState,
    caller_id: Uuid,
    chosen_id: Uuid,
) -> Result<SelectOutcome, ClaimError> {
    if caller_id != state.owner_id {
        return Err(ClaimError::NotOwner);
    }

    match state.selected_buddy_id {
        Some(selected) if selected == chosen_id => return Ok(SelectOutcome::Unchanged),
        Some(_) => return Err(ClaimError::AlreadyDecided),
        None => (),
    }

    if !state.claimant_ids.contains(&chosen_id) {
        return Err(ClaimError::NotAClaimant);
    }

    Ok(SelectOutcome::Selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_claims(count: usize) -> PostClaimState {
        PostClaimState {
            owner_id: Uuid::now_v7(),
            selected_buddy_id: None,
            claimant_ids: (0..count).map(|_| Uuid::now_v7()).collect(),
        }
    }

    #[test]
    fn test_claim_capacity() {
        let state = state_with_claims(PICKUP_CAPACITY - 1);
        assert!(check_claim(&state, Uuid::now_v7()).is_ok());
        assert_eq!(state.remaining_capacity(), 1);

        let state = state_with_claims(PICKUP_CAPACITY);
        let err = check_claim(&state, Uuid::now_v7()).unwrap_err();
        assert_eq!(err, ClaimError::CapacityExceeded);
        assert_eq!(err.category(), ErrorCategory::Capacity);
        assert_eq!(state.remaining_capacity(), 0);
    }

    #[test]
    fn test_claim_check_order() {
        let mut state = state_with_claims(PICKUP_CAPACITY);
        state.selected_buddy_id = Some(state.claimant_ids[0]);

        // Owner check comes first, even on a full and decided post
        assert_eq!(
            check_claim(&state, state.owner_id).unwrap_err(),
            ClaimError::SelfClaim
        );
        assert_eq!(
            check_claim(&state, state.claimant_ids[1]).unwrap_err(),
            ClaimError::AlreadyClaimed
        );
        assert_eq!(
            check_claim(&state, Uuid::now_v7()).unwrap_err(),
            ClaimError::CapacityExceeded
        );

        let mut state = state_with_claims(1);
        state.selected_buddy_id = Some(state.claimant_ids[0]);
        let err = check_claim(&state, Uuid::now_v7()).unwrap_err();
        assert_eq!(err, ClaimError::PostDecided);
        assert_eq!(err.category(), ErrorCategory::StateConflict);
    }

    #[test]
    fn test_select() {
        let mut state = state_with_claims(3);
        let chosen = state.claimant_ids[1];

        let err = check_select(&state, chosen, chosen).unwrap_err();
        assert_eq!(err, ClaimError::NotOwner);
        assert_eq!(err.category(), ErrorCategory::Authorization);

        assert_eq!(
            check_select(&state, state.owner_id, Uuid::now_v7()).unwrap_err(),
            ClaimError::NotAClaimant
        );
        assert_eq!(
            check_select(&state, state.owner_id, chosen).unwrap(),
            SelectOutcome::Selected
        );

        state.selected_buddy_id = Some(chosen);

        assert_eq!(
            check_select(&state, state.owner_id, chosen).unwrap(),
            SelectOutcome::Unchanged
        );

        let err = check_select(&state, state.owner_id, state.claimant_ids[0]).unwrap_err();
        assert_eq!(err, ClaimError::AlreadyDecided);
        assert_eq!(err.category(), ErrorCategory::StateConflict);
    }
}
