//! Invariants of the correlation state machine under arbitrary interleavings
//! of tool calls, dispatch requests and backend traffic.

use std::collections::HashMap;

use chairside_core::bridge::{BridgeCore, Effect};
use chairside_core::{
    BridgeEvent, ChannelEvent, InvocationId, InvocationState, ToolInvocationRegistry,
};
use chairside_proto::{ApiResponse, Command, Endpoint, InboundEvent};
use proptest::prelude::*;
use serde_json::{Value, json};

#[derive(Debug, Clone)]
enum Op {
    Invoke(usize),
    Fire(usize),
    Respond { endpoint: usize, success: bool },
    Stop,
    Disconnect,
    Connect,
}

const ENDPOINTS: [Endpoint; 3] = [Endpoint::Patients, Endpoint::Reports, Endpoint::PatientChart];

fn tool_call(index: usize) -> (&'static str, Value) {
    match index % 3 {
        0 => ("get_patients", json!({})),
        1 => ("get_reports", json!({ "patientName": "Jane Smith" })),
        _ => ("get_patient_chart", json!({ "patientName": "Jane Smith" })),
    }
}

fn response(index: usize, success: bool) -> ApiResponse {
    let endpoint = ENDPOINTS[index % 3].clone();
    if success {
        let data = match endpoint {
            Endpoint::Patients => json!({ "patients": [] }),
            Endpoint::Reports => json!({ "patient_report": {} }),
            _ => json!({ "patient_chart": {} }),
        };
        let data = chairside_proto::ApiData::for_endpoint(&endpoint, data).unwrap();
        ApiResponse::success(endpoint, data)
    } else {
        ApiResponse::error(endpoint, "backend failure")
    }
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..3).prop_map(Op::Invoke),
        4 => (0usize..8).prop_map(Op::Fire),
        3 => ((0usize..3), any::<bool>()).prop_map(|(endpoint, success)| Op::Respond { endpoint, success }),
        1 => Just(Op::Stop),
        1 => Just(Op::Disconnect),
        1 => Just(Op::Connect),
    ]
}

fn rank(state: &InvocationState) -> u8 {
    match state {
        InvocationState::Pending => 0,
        InvocationState::Running => 1,
        InvocationState::Completed { .. } | InvocationState::Failed { .. } => 2,
    }
}

fn run_api_targets(effects: &[Effect]) -> Vec<Option<InvocationId>> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Send {
                command: Command::RunApi(_),
                dispatch,
            } => Some(dispatch.as_ref().and_then(|d| d.invocation)),
            _ => None,
        })
        .collect()
}

fn invocation_changes(effects: &[Effect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, Effect::Emit(BridgeEvent::InvocationChanged { .. })))
        .count()
}

proptest! {
    #[test]
    fn correlation_invariants_hold(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut core = BridgeCore::new(ToolInvocationRegistry::with_builtin_tools(), 32);
        core.handle(ChannelEvent::Connected);

        let mut ids: Vec<InvocationId> = Vec::new();
        let mut last_states: HashMap<InvocationId, InvocationState> = HashMap::new();
        let mut sends: HashMap<InvocationId, usize> = HashMap::new();

        for op in ops {
            let effects = match op {
                Op::Invoke(tool) => {
                    let (name, arguments) = tool_call(tool);
                    let (invocation, _, effects) = core.invoke(name, arguments).unwrap();
                    ids.push(invocation.id);
                    effects
                }
                Op::Fire(index) => match ids.get(index) {
                    Some(id) => core.fire(*id),
                    None => Vec::new(),
                },
                Op::Respond { endpoint, success } => {
                    let response = response(endpoint, success);
                    let matches_running = core.channel().is_running_endpoint(&response.endpoint);
                    let effects = core.handle(ChannelEvent::Inbound(InboundEvent::Response(response)));
                    if !matches_running {
                        // Stale responses never touch an invocation.
                        prop_assert_eq!(invocation_changes(&effects), 0);
                    } else {
                        prop_assert!(invocation_changes(&effects) <= 1);
                        prop_assert!(!core.channel().is_running());
                    }
                    effects
                }
                Op::Stop => core.stop(),
                Op::Disconnect => {
                    let effects = core.handle(ChannelEvent::Disconnected { reason: "test".to_string() });
                    prop_assert!(!core.channel().is_running());
                    effects
                }
                Op::Connect => core.handle(ChannelEvent::Connected),
            };

            for id in run_api_targets(&effects).into_iter().flatten() {
                *sends.entry(id).or_default() += 1;
            }

            let mut running = 0;
            for id in &ids {
                let state = core.invocation_state(*id).unwrap();
                if state == InvocationState::Running {
                    running += 1;
                }
                if let Some(previous) = last_states.get(id) {
                    prop_assert!(rank(&state) >= rank(previous), "state moved backwards");
                    if previous.is_terminal() {
                        prop_assert_eq!(&state, previous, "terminal state changed");
                    }
                }
                last_states.insert(*id, state);
            }

            prop_assert!(running <= 1, "more than one invocation running");
            if running == 1 {
                prop_assert!(core.channel().is_running());
            }
        }

        for count in sends.values() {
            prop_assert_eq!(*count, 1);
        }
    }

    #[test]
    fn fire_once_sends_exactly_one_command(attempts in 1usize..20) {
        let mut core = BridgeCore::new(ToolInvocationRegistry::with_builtin_tools(), 32);
        core.handle(ChannelEvent::Connected);
        let (invocation, _, _) = core.invoke("get_patients", json!({})).unwrap();

        let total: usize = (0..attempts)
            .map(|_| run_api_targets(&core.fire(invocation.id)).len())
            .sum();

        prop_assert_eq!(total, 1);
        prop_assert!(core.tracker().has_fired(invocation.id));
    }
}
