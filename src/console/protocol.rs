use serde::{Deserialize, Serialize};
use uc_core::ids::PeerId;
use uc_core::pairing::{PairingSignal, PairingViewModel, UserAction, VerificationEvent};

/// One input line of the pairing console.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PairingConsoleInput {
    Action { action: UserAction },
    Event { event: VerificationEvent },
}

/// One input line of the setup console.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SetupConsoleInput {
    NewSpace,
    JoinSpace,
    Back,
    #[serde(rename_all = "camelCase")]
    SelectDevice {
        peer_id: PeerId,
    },
    ConfirmPairing,
    CancelPairing,
    Event {
        event: VerificationEvent,
    },
}

/// Records the consoles write besides commands and setup states.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ConsoleOutput<'a> {
    #[serde(rename_all = "camelCase")]
    ViewModel { view_model: &'a PairingViewModel },
    Signal { signal: &'a PairingSignal },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use uc_core::pairing::VerificationKind;

    #[test]
    fn parses_action_and_event_lines() {
        let action: PairingConsoleInput =
            serde_json::from_str(r#"{"type":"action","action":{"type":"accept"}}"#).unwrap();
        assert_eq!(
            action,
            PairingConsoleInput::Action {
                action: UserAction::Accept
            }
        );

        let event: PairingConsoleInput = serde_json::from_str(
            r#"{"type":"event","event":{"sessionId":"s1","kind":"verification","code":"123456"}}"#,
        )
        .unwrap();
        match event {
            PairingConsoleInput::Event { event } => {
                assert_eq!(event.kind, VerificationKind::Verification);
                assert_eq!(event.code.as_deref(), Some("123456"));
            }
            other => panic!("unexpected input: {other:?}"),
        }
    }

    #[test]
    fn parses_setup_select_device() {
        let input: SetupConsoleInput =
            serde_json::from_str(r#"{"type":"selectDevice","peerId":"peer-9"}"#).unwrap();
        assert_eq!(
            input,
            SetupConsoleInput::SelectDevice {
                peer_id: PeerId::from("peer-9")
            }
        );
    }

    #[test]
    fn view_model_record_nests_snapshot() {
        let view_model = PairingViewModel::idle();
        let value = serde_json::to_value(ConsoleOutput::ViewModel {
            view_model: &view_model,
        })
        .unwrap();
        assert_eq!(value["type"], "viewModel");
        assert_eq!(value["viewModel"]["dialogKind"], "none");
    }
}
