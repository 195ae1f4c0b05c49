use super::*;

pub(super) fn push_alert(state: &mut UiState, text: &str, style: Style) {
    if state.alerts.len() >= MAX_ALERTS {
        state.alerts.pop_front();
    }
    state
        .alerts
        .push_back(PromptLine::plain(text.to_string(), style));
}

pub(super) fn apply_event(state: &mut UiState, event: PilotEvent) {
    match event {
        PilotEvent::Model(view) => state.view = view,
        PilotEvent::StateChanged(connection) => {
            match &connection {
                ConnectionState::Connected => {
                    let text = format!(
                        "CONNECTED {}:{} (stream {})",
                        state.target.address, state.target.rpc_port, state.target.stream_port
                    );
                    push_alert(state, &text, Style::default().fg(COLOR_GREEN));
                }
                ConnectionState::Disconnected => {
                    push_alert(state, "DISCONNECTED", Style::default().fg(COLOR_INFO));
                }
                ConnectionState::Connecting | ConnectionState::Failed(_) => {}
            }
            state.view.state = connection;
        }
        PilotEvent::ConnectionFailed { reason } => {
            let text = format!("[FAILED] {}", single_line(&reason));
            push_alert(state, &text, Style::default().fg(COLOR_RED));
        }
        PilotEvent::CommandRejected { reason } => {
            let text = format!("[REJECTED] {}", single_line(&reason));
            push_alert(state, &text, Style::default().fg(COLOR_AMBER));
        }
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
