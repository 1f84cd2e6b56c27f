//! Milestone overlay state machine: at most one celebration at a time.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::level::LevelId;
use crate::milestone::{MilestoneToken, UnlockedMilestones, next_eligible_milestone};
use crate::progress::LevelProgress;

/// Which celebration the UI plays when an overlay opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CelebrationCue {
    /// A new stage opened: special review stages and the god title.
    SpecialUnlock,
    /// A new title earned from stars or the perfect campaign.
    EarnTitle,
}

impl CelebrationCue {
    #[must_use]
    pub const fn for_token(token: MilestoneToken) -> Self {
        match token {
            MilestoneToken::Special(_) | MilestoneToken::GodDomain => Self::SpecialUnlock,
            MilestoneToken::Stars(_) | MilestoneToken::PerfectWarrior => Self::EarnTitle,
        }
    }
}

/// Emitted exactly once per transition into [`UnlockState::Pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockEvent {
    pub token: MilestoneToken,
    pub cue: CelebrationCue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnlockState {
    #[default]
    Idle,
    Pending(MilestoneToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UnlockError {
    #[error("no milestone is pending")]
    NothingPending,
    #[error("milestone {0} has no challenge stage")]
    NotChallengeable(MilestoneToken),
}

/// Result of accepting a special-stage challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge {
    pub token: MilestoneToken,
    pub level: LevelId,
}

#[derive(Debug, Clone, Default)]
pub struct UnlockController {
    state: UnlockState,
}

impl UnlockController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn state(&self) -> UnlockState {
        self.state
    }

    #[must_use]
    pub const fn pending(&self) -> Option<MilestoneToken> {
        match self.state {
            UnlockState::Idle => None,
            UnlockState::Pending(token) => Some(token),
        }
    }

    /// Re-evaluate after any change to progress or shown milestones.
    ///
    /// Only an idle controller moves to pending; while an overlay is open a
    /// newly eligible milestone waits for the next refresh.
    pub fn refresh(
        &mut self,
        progress: &LevelProgress,
        shown: &UnlockedMilestones,
    ) -> Option<UnlockEvent> {
        if self.pending().is_some() {
            return None;
        }
        let token = next_eligible_milestone(progress, shown)?;
        self.state = UnlockState::Pending(token);
        log::info!("Milestone {token} unlocked");
        Some(UnlockEvent {
            token,
            cue: CelebrationCue::for_token(token),
        })
    }

    /// Dismiss the overlay. Returns the token to record as shown.
    ///
    /// # Errors
    ///
    /// Returns [`UnlockError::NothingPending`] when no overlay is open.
    pub fn continue_unlock(&mut self) -> Result<MilestoneToken, UnlockError> {
        let token = self.pending().ok_or(UnlockError::NothingPending)?;
        self.state = UnlockState::Idle;
        Ok(token)
    }

    /// Accept the challenge of a special-stage milestone.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing is pending or the pending milestone has
    /// no special stage; the state is left unchanged.
    pub fn challenge_unlock(&mut self) -> Result<Challenge, UnlockError> {
        let token = self.pending().ok_or(UnlockError::NothingPending)?;
        let level = token
            .challenge_level()
            .ok_or(UnlockError::NotChallengeable(token))?;
        self.state = UnlockState::Idle;
        Ok(Challenge { token, level })
    }

    pub fn clear(&mut self) {
        self.state = UnlockState::Idle;
    }
}
