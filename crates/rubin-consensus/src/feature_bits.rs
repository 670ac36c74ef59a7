//! Version-bit deployment state machine.
//!
//! Deployments move through DEFINED → STARTED → LOCKED_IN → ACTIVE (or
//! STARTED → FAILED on timeout) at window boundaries of
//! [`SIGNAL_WINDOW`] blocks, driven by how many blocks in the previous
//! window signaled the deployment's bit. ACTIVE and FAILED are
//! terminal.

use serde::{Deserialize, Serialize};

use rubin_core::constants::{SIGNAL_THRESHOLD, SIGNAL_WINDOW};
use rubin_core::error::{ConsensusError, ErrorCode};

/// Deployment lifecycle state.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    Defined,
    Started,
    LockedIn,
    Active,
    Failed,
}

impl DeploymentState {
    pub const fn as_str(self) -> &'static str {
        match self {
            DeploymentState::Defined => "DEFINED",
            DeploymentState::Started => "STARTED",
            DeploymentState::LockedIn => "LOCKED_IN",
            DeploymentState::Active => "ACTIVE",
            DeploymentState::Failed => "FAILED",
        }
    }
}

/// A configured deployment: which version bit it signals on and the
/// height window in which it may lock in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub name: &'static str,
    pub bit: u8,
    pub start_height: u64,
    pub timeout_height: u64,
}

/// State evaluation at a height, with the inputs that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeploymentEval {
    pub state: DeploymentState,
    pub boundary_height: u64,
    pub prev_window_signal_count: u32,
}

fn next_state(
    prev: DeploymentState,
    boundary_height: u64,
    prev_window_signal_count: u32,
    deployment: &Deployment,
) -> DeploymentState {
    match prev {
        DeploymentState::Defined => {
            if boundary_height >= deployment.start_height {
                DeploymentState::Started
            } else {
                DeploymentState::Defined
            }
        }
        DeploymentState::Started => {
            if prev_window_signal_count >= SIGNAL_THRESHOLD {
                DeploymentState::LockedIn
            } else if boundary_height >= deployment.timeout_height {
                DeploymentState::Failed
            } else {
                DeploymentState::Started
            }
        }
        DeploymentState::LockedIn => DeploymentState::Active,
        DeploymentState::Active => DeploymentState::Active,
        DeploymentState::Failed => DeploymentState::Failed,
    }
}

/// Evaluate a deployment's state at `height` from per-window signal
/// counts (`window_signal_counts[i]` covers heights
/// `[i * SIGNAL_WINDOW, (i+1) * SIGNAL_WINDOW)`).
pub fn deployment_state_at_height(
    deployment: &Deployment,
    height: u64,
    window_signal_counts: &[u32],
) -> Result<DeploymentEval, ConsensusError> {
    if deployment.name.is_empty() {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "deployment name required",
        ));
    }
    if deployment.bit > 31 {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "deployment bit out of range",
        ));
    }
    if deployment.timeout_height < deployment.start_height {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "deployment timeout before start",
        ));
    }

    let boundary_height = height - (height % SIGNAL_WINDOW);
    let target_boundary = boundary_height / SIGNAL_WINDOW;
    if window_signal_counts.len() < target_boundary as usize {
        return Err(ConsensusError::new(
            ErrorCode::BlockParse,
            "insufficient window signal counts",
        ));
    }

    let mut state = DeploymentState::Defined;
    for boundary_index in 0..=target_boundary {
        let bh = boundary_index * SIGNAL_WINDOW;
        let prev_count = if bh < SIGNAL_WINDOW {
            0
        } else {
            window_signal_counts[(boundary_index - 1) as usize]
        };
        state = next_state(state, bh, prev_count, deployment);
    }

    let prev_window_signal_count = if boundary_height < SIGNAL_WINDOW {
        0
    } else {
        window_signal_counts[(target_boundary - 1) as usize]
    };

    Ok(DeploymentEval {
        state,
        boundary_height,
        prev_window_signal_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment(start: u64, timeout: u64) -> Deployment {
        Deployment {
            name: "test-feature",
            bit: 3,
            start_height: start,
            timeout_height: timeout,
        }
    }

    #[test]
    fn defined_before_start_height() {
        let d = deployment(10 * SIGNAL_WINDOW, 20 * SIGNAL_WINDOW);
        let eval = deployment_state_at_height(&d, 0, &[]).unwrap();
        assert_eq!(eval.state, DeploymentState::Defined);
    }

    #[test]
    fn starts_at_first_boundary_past_start() {
        let d = deployment(0, 20 * SIGNAL_WINDOW);
        let eval = deployment_state_at_height(&d, 0, &[]).unwrap();
        assert_eq!(eval.state, DeploymentState::Started);
    }

    #[test]
    fn locks_in_after_threshold_window() {
        let d = deployment(0, 20 * SIGNAL_WINDOW);
        let counts = vec![SIGNAL_THRESHOLD];
        let eval = deployment_state_at_height(&d, SIGNAL_WINDOW, &counts).unwrap();
        assert_eq!(eval.state, DeploymentState::LockedIn);
        assert_eq!(eval.prev_window_signal_count, SIGNAL_THRESHOLD);
    }

    #[test]
    fn below_threshold_stays_started() {
        let d = deployment(0, 20 * SIGNAL_WINDOW);
        let counts = vec![SIGNAL_THRESHOLD - 1];
        let eval = deployment_state_at_height(&d, SIGNAL_WINDOW, &counts).unwrap();
        assert_eq!(eval.state, DeploymentState::Started);
    }

    #[test]
    fn active_one_window_after_lock_in() {
        let d = deployment(0, 20 * SIGNAL_WINDOW);
        let counts = vec![SIGNAL_THRESHOLD, 0];
        let eval = deployment_state_at_height(&d, 2 * SIGNAL_WINDOW, &counts).unwrap();
        assert_eq!(eval.state, DeploymentState::Active);
    }

    #[test]
    fn active_is_terminal() {
        let d = deployment(0, 3 * SIGNAL_WINDOW);
        // Locked in during window 0, active from window 2, stays active
        // long past the timeout.
        let counts = vec![SIGNAL_THRESHOLD, 0, 0, 0, 0];
        let eval = deployment_state_at_height(&d, 5 * SIGNAL_WINDOW, &counts).unwrap();
        assert_eq!(eval.state, DeploymentState::Active);
    }

    #[test]
    fn fails_at_timeout_without_signal() {
        let d = deployment(0, 2 * SIGNAL_WINDOW);
        let counts = vec![0, 0];
        let eval = deployment_state_at_height(&d, 2 * SIGNAL_WINDOW, &counts).unwrap();
        assert_eq!(eval.state, DeploymentState::Failed);
    }

    #[test]
    fn failed_is_terminal() {
        let d = deployment(0, 2 * SIGNAL_WINDOW);
        // Threshold reached only after the timeout boundary.
        let counts = vec![0, 0, SIGNAL_THRESHOLD, 0];
        let eval = deployment_state_at_height(&d, 4 * SIGNAL_WINDOW, &counts).unwrap();
        assert_eq!(eval.state, DeploymentState::Failed);
    }

    #[test]
    fn mid_window_heights_share_boundary_state() {
        let d = deployment(0, 20 * SIGNAL_WINDOW);
        let counts = vec![SIGNAL_THRESHOLD];
        for offset in [0, 1, SIGNAL_WINDOW - 1] {
            let eval =
                deployment_state_at_height(&d, SIGNAL_WINDOW + offset, &counts).unwrap();
            assert_eq!(eval.state, DeploymentState::LockedIn);
            assert_eq!(eval.boundary_height, SIGNAL_WINDOW);
        }
    }

    #[test]
    fn configuration_errors_rejected() {
        let mut d = deployment(10, 5);
        assert!(deployment_state_at_height(&d, 0, &[]).is_err());
        d = deployment(0, 10);
        d.bit = 32;
        assert!(deployment_state_at_height(&d, 0, &[]).is_err());
    }

    #[test]
    fn missing_window_counts_rejected() {
        let d = deployment(0, 20 * SIGNAL_WINDOW);
        assert!(deployment_state_at_height(&d, 3 * SIGNAL_WINDOW, &[0]).is_err());
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(DeploymentState::Defined.as_str(), "DEFINED");
        assert_eq!(DeploymentState::Started.as_str(), "STARTED");
        assert_eq!(DeploymentState::LockedIn.as_str(), "LOCKED_IN");
        assert_eq!(DeploymentState::Active.as_str(), "ACTIVE");
        assert_eq!(DeploymentState::Failed.as_str(), "FAILED");
    }
}
