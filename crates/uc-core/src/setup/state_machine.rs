//! Setup state machine.
//!
//! Defines a pure state transition function for the first-run setup flow.
//! Pairing progress arrives as [`SetupEvent`]s translated from routed
//! verification events; the joining device is always the initiator.

use crate::ids::{PeerId, SessionId};
use crate::pairing::PairingErrorKind;

/// Setup flow state.
///
/// 设置流程状态。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SetupState {
    /// Welcome screen.
    ///
    /// 欢迎页。
    Welcome,
    /// Join-space device picker.
    ///
    /// 加入空间设备选择页。
    JoinSpacePickDevice { error: Option<SetupError> },
    /// Pairing requested, waiting for the peer.
    ///
    /// 已发起配对，等待对端。
    PairingRequested {
        peer_id: PeerId,
        session_id: Option<SessionId>,
    },
    /// Pairing confirmation (short code).
    ///
    /// 配对确认页（短码）。
    PairingConfirm {
        session_id: SessionId,
        short_code: String,
        peer_fingerprint: Option<String>,
        error: Option<SetupError>,
    },
    /// Short code confirmed, waiting for the peer's verdict.
    ///
    /// 已确认短码，等待对端结果。
    PairingVerifying { session_id: SessionId },
    /// Setup completed.
    ///
    /// 设置完成。
    Done,
}

impl SetupState {
    /// Session the state is bound to, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Self::PairingRequested { session_id, .. } => session_id.as_ref(),
            Self::PairingConfirm { session_id, .. } | Self::PairingVerifying { session_id } => {
                Some(session_id)
            }
            _ => None,
        }
    }
}

/// Events that drive the setup flow.
///
/// 驱动设置流程的事件。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SetupEvent {
    /// User chooses to create a new space.
    ///
    /// 用户选择创建新空间。
    ChooseCreateSpace,
    /// User chooses to join an existing space.
    ///
    /// 用户选择加入已有空间。
    ChooseJoinSpace,
    /// Navigate back.
    ///
    /// 返回。
    Back,
    /// Select a peer device.
    ///
    /// 选择设备。
    SelectPeer { peer_id: PeerId },
    /// The pairing service issued a session id.
    ///
    /// 配对服务已分配会话 ID。
    PairingStarted { session_id: SessionId },
    /// Short code available for confirmation (network).
    ///
    /// 短码可供确认（网络回调）。
    PairingVerificationRequired {
        session_id: SessionId,
        short_code: String,
        peer_fingerprint: Option<String>,
    },
    /// User confirms pairing.
    ///
    /// 用户确认配对。
    PairingUserConfirm,
    /// User cancels pairing.
    ///
    /// 用户取消配对。
    PairingUserCancel,
    /// Pairing succeeded (network).
    ///
    /// 配对成功（网络回调）。
    PairingSucceeded,
    /// Pairing failed (network).
    ///
    /// 配对失败（网络回调）。
    PairingFailed { reason: SetupError },
}

/// Side-effects produced by state transitions.
///
/// 状态迁移产生的副作用。
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SetupAction {
    /// Start pairing with peer.
    ///
    /// 启动配对。
    StartPairing { peer_id: PeerId },
    /// Confirm pairing session.
    ///
    /// 确认配对会话。
    ConfirmPairing { session_id: SessionId },
    /// Cancel pairing session.
    ///
    /// 取消配对会话。
    CancelPairing { session_id: SessionId },
    /// Mark setup completed.
    ///
    /// 标记设置完成。
    MarkSetupComplete,
}

/// Setup error types.
///
/// 设置错误类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SetupError {
    NetworkTimeout,
    PeerUnavailable,
    PairingRejected,
    PairingFailed,
}

impl From<PairingErrorKind> for SetupError {
    fn from(kind: PairingErrorKind) -> Self {
        match kind {
            PairingErrorKind::NetworkTimeout => Self::NetworkTimeout,
            PairingErrorKind::PeerUnavailable => Self::PeerUnavailable,
            PairingErrorKind::PairingRejected => Self::PairingRejected,
            PairingErrorKind::PairingFailed
            | PairingErrorKind::PinMismatch
            | PairingErrorKind::CommandDispatchError
            | PairingErrorKind::SessionConflict => Self::PairingFailed,
        }
    }
}

/// Pure setup state machine.
///
/// 纯状态机：不包含副作用。
pub struct SetupStateMachine;

impl SetupStateMachine {
    pub fn transition(state: SetupState, event: SetupEvent) -> (SetupState, Vec<SetupAction>) {
        match (state, event) {
            (SetupState::Welcome, SetupEvent::ChooseCreateSpace) => {
                (SetupState::Done, vec![SetupAction::MarkSetupComplete])
            }
            (SetupState::Welcome, SetupEvent::ChooseJoinSpace) => {
                (SetupState::JoinSpacePickDevice { error: None }, Vec::new())
            }
            (SetupState::JoinSpacePickDevice { .. }, SetupEvent::Back) => {
                (SetupState::Welcome, Vec::new())
            }
            (SetupState::JoinSpacePickDevice { .. }, SetupEvent::SelectPeer { peer_id }) => (
                SetupState::PairingRequested {
                    peer_id: peer_id.clone(),
                    session_id: None,
                },
                vec![SetupAction::StartPairing { peer_id }],
            ),
            (
                SetupState::PairingRequested {
                    peer_id,
                    session_id: None,
                },
                SetupEvent::PairingStarted { session_id },
            ) => (
                SetupState::PairingRequested {
                    peer_id,
                    session_id: Some(session_id),
                },
                Vec::new(),
            ),
            (
                SetupState::PairingRequested { .. },
                SetupEvent::PairingVerificationRequired {
                    session_id,
                    short_code,
                    peer_fingerprint,
                },
            ) => (
                SetupState::PairingConfirm {
                    session_id,
                    short_code,
                    peer_fingerprint,
                    error: None,
                },
                Vec::new(),
            ),
            (SetupState::PairingConfirm { session_id, .. }, SetupEvent::PairingUserConfirm) => (
                SetupState::PairingVerifying {
                    session_id: session_id.clone(),
                },
                vec![SetupAction::ConfirmPairing { session_id }],
            ),
            (state @ SetupState::PairingRequested { .. }, SetupEvent::PairingUserCancel)
            | (state @ SetupState::PairingConfirm { .. }, SetupEvent::PairingUserCancel)
            | (state @ SetupState::PairingVerifying { .. }, SetupEvent::PairingUserCancel) => {
                let actions = state
                    .session_id()
                    .cloned()
                    .map(|session_id| vec![SetupAction::CancelPairing { session_id }])
                    .unwrap_or_default();
                (SetupState::JoinSpacePickDevice { error: None }, actions)
            }
            // The peer may complete before any short code is shown.
            (SetupState::PairingRequested { .. }, SetupEvent::PairingSucceeded)
            | (SetupState::PairingConfirm { .. }, SetupEvent::PairingSucceeded)
            | (SetupState::PairingVerifying { .. }, SetupEvent::PairingSucceeded) => {
                (SetupState::Done, vec![SetupAction::MarkSetupComplete])
            }
            (SetupState::PairingRequested { .. }, SetupEvent::PairingFailed { reason })
            | (SetupState::PairingConfirm { .. }, SetupEvent::PairingFailed { reason })
            | (SetupState::PairingVerifying { .. }, SetupEvent::PairingFailed { reason }) => (
                SetupState::JoinSpacePickDevice {
                    error: Some(reason),
                },
                Vec::new(),
            ),
            (state, _event) => (state, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn confirm_state() -> SetupState {
        SetupState::PairingConfirm {
            session_id: SessionId::from("s1"),
            short_code: "482913".into(),
            peer_fingerprint: Some("fp".into()),
            error: None,
        }
    }

    #[test]
    fn setup_state_machine_choose_create_completes_setup() {
        let (next, actions) =
            SetupStateMachine::transition(SetupState::Welcome, SetupEvent::ChooseCreateSpace);
        assert_eq!(next, SetupState::Done);
        assert_eq!(actions, vec![SetupAction::MarkSetupComplete]);
    }

    #[test]
    fn setup_state_machine_select_peer_starts_pairing() {
        let (next, actions) = SetupStateMachine::transition(
            SetupState::JoinSpacePickDevice { error: None },
            SetupEvent::SelectPeer {
                peer_id: PeerId::from("peer-9"),
            },
        );
        assert_eq!(
            next,
            SetupState::PairingRequested {
                peer_id: PeerId::from("peer-9"),
                session_id: None,
            }
        );
        assert_eq!(
            actions,
            vec![SetupAction::StartPairing {
                peer_id: PeerId::from("peer-9")
            }]
        );
    }

    #[test]
    fn setup_state_machine_verification_shows_short_code() {
        let (next, actions) = SetupStateMachine::transition(
            SetupState::PairingRequested {
                peer_id: PeerId::from("peer-9"),
                session_id: Some(SessionId::from("s1")),
            },
            SetupEvent::PairingVerificationRequired {
                session_id: SessionId::from("s1"),
                short_code: "482913".into(),
                peer_fingerprint: Some("fp".into()),
            },
        );
        assert_eq!(next, confirm_state());
        assert!(actions.is_empty());
    }

    #[test]
    fn setup_state_machine_confirm_then_success_marks_complete() {
        let (next, actions) =
            SetupStateMachine::transition(confirm_state(), SetupEvent::PairingUserConfirm);
        assert_eq!(
            next,
            SetupState::PairingVerifying {
                session_id: SessionId::from("s1")
            }
        );
        assert_eq!(
            actions,
            vec![SetupAction::ConfirmPairing {
                session_id: SessionId::from("s1")
            }]
        );

        let (next, actions) = SetupStateMachine::transition(next, SetupEvent::PairingSucceeded);
        assert_eq!(next, SetupState::Done);
        assert_eq!(actions, vec![SetupAction::MarkSetupComplete]);
    }

    #[test]
    fn setup_state_machine_success_while_requested_marks_complete() {
        let (state, actions) = SetupStateMachine::transition(
            SetupState::PairingRequested {
                peer_id: PeerId::from("peer-9"),
                session_id: Some(SessionId::from("s1")),
            },
            SetupEvent::PairingSucceeded,
        );
        assert_eq!(state, SetupState::Done);
        assert_eq!(actions, vec![SetupAction::MarkSetupComplete]);
    }

    #[test]
    fn setup_state_machine_cancel_before_session_sends_nothing() {
        let (next, actions) = SetupStateMachine::transition(
            SetupState::PairingRequested {
                peer_id: PeerId::from("peer-9"),
                session_id: None,
            },
            SetupEvent::PairingUserCancel,
        );
        assert_eq!(next, SetupState::JoinSpacePickDevice { error: None });
        assert!(actions.is_empty());
    }

    #[test]
    fn setup_state_machine_failure_returns_to_picker_with_reason() {
        let (next, _) = SetupStateMachine::transition(
            confirm_state(),
            SetupEvent::PairingFailed {
                reason: SetupError::PairingRejected,
            },
        );
        assert_eq!(
            next,
            SetupState::JoinSpacePickDevice {
                error: Some(SetupError::PairingRejected)
            }
        );
    }

    #[test]
    fn setup_state_machine_ignores_unrelated_events() {
        let (next, actions) =
            SetupStateMachine::transition(SetupState::Done, SetupEvent::PairingSucceeded);
        assert_eq!(next, SetupState::Done);
        assert!(actions.is_empty());
    }

    #[test]
    fn setup_error_maps_pairing_kinds() {
        assert_eq!(
            SetupError::from(PairingErrorKind::NetworkTimeout),
            SetupError::NetworkTimeout
        );
        assert_eq!(
            SetupError::from(PairingErrorKind::PinMismatch),
            SetupError::PairingFailed
        );
    }
}
