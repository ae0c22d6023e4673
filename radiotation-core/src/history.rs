use thiserror::Error;

use crate::{TrackEntry, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VetoError {
    #[error("Nothing has been played in this room yet")]
    NothingPlayed,
    #[error("The current track has already been vetoed")]
    AlreadyVetoed,
    #[error("You vetoed recently, wait {remaining} more tracks")]
    CoolingDown { remaining: usize },
}

/// Returns the position of the history entry `user_id` is allowed to veto.
///
/// Only the most recent entry can be vetoed, and a member has to let
/// `cooldown` tracks pass between two vetoes. `history` is oldest first.
pub fn veto_target(
    history: &[TrackEntry],
    user_id: &UserId,
    cooldown: usize,
) -> Result<usize, VetoError> {
    let latest = history.last().ok_or(VetoError::NothingPlayed)?;

    if latest.vetoed {
        return Err(VetoError::AlreadyVetoed);
    }

    let recent_veto = history
        .iter()
        .rev()
        .take(cooldown)
        .position(|e| e.vetoed_by.as_ref() == Some(user_id));

    if let Some(age) = recent_veto {
        return Err(VetoError::CoolingDown {
            remaining: cooldown - age,
        });
    }

    Ok(history.len() - 1)
}
