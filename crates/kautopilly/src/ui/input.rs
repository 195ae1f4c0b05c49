use super::*;

pub(super) fn handle_key(key: KeyEvent, state: &mut UiState) -> ConsoleAction {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return ConsoleAction::Quit;
    }
    if state.prompt.active {
        return handle_prompt_key(key, state);
    }

    let view = &state.view;
    let target = view.autopilot;
    let command = match key.code {
        KeyCode::Char('/') => {
            state.prompt.activate_with("/");
            return ConsoleAction::None;
        }
        KeyCode::Char('?') => {
            state.prompt.set_output(help_lines());
            return ConsoleAction::None;
        }
        KeyCode::Esc => {
            state.prompt.clear_output();
            return ConsoleAction::None;
        }
        KeyCode::Char('q' | 'Q') => return ConsoleAction::Quit,
        KeyCode::Char('c' | 'C') => state.target.command(),
        KeyCode::Char('d' | 'D') => PilotCommand::Disconnect,
        KeyCode::Left => PilotCommand::SetTargetHeading(target.heading - HEADING_STEP),
        KeyCode::Right => PilotCommand::SetTargetHeading(target.heading + HEADING_STEP),
        KeyCode::Up => PilotCommand::SetTargetPitch(target.pitch + PITCH_STEP),
        KeyCode::Down => PilotCommand::SetTargetPitch(target.pitch - PITCH_STEP),
        KeyCode::Char('[') => PilotCommand::SetTargetRoll(target.roll - ROLL_STEP),
        KeyCode::Char(']') => PilotCommand::SetTargetRoll(target.roll + ROLL_STEP),
        KeyCode::Char('+' | '=') => {
            PilotCommand::SetThrottle((view.controls.throttle + THROTTLE_STEP).clamp(0.0, 1.0))
        }
        KeyCode::Char('-' | '_') => {
            PilotCommand::SetThrottle((view.controls.throttle - THROTTLE_STEP).clamp(0.0, 1.0))
        }
        KeyCode::Char('a' | 'A') => PilotCommand::SetAutopilotEngaged(!target.engaged),
        KeyCode::Char('l' | 'L') => PilotCommand::SetLights(!view.controls.lights),
        KeyCode::Char('g' | 'G') => PilotCommand::SetGear(!view.controls.gear),
        KeyCode::Char('b' | 'B') => PilotCommand::SetBrakes(!view.controls.brakes),
        _ => return ConsoleAction::None,
    };
    ConsoleAction::Send(command)
}

fn handle_prompt_key(key: KeyEvent, state: &mut UiState) -> ConsoleAction {
    match key.code {
        KeyCode::Esc => {
            state.prompt.deactivate();
            state.prompt.clear_output();
        }
        KeyCode::Enter => {
            let input = state.prompt.input.trim().to_string();
            state.prompt.push_history(input.clone());
            state.prompt.deactivate();
            return execute_command(&input, state);
        }
        KeyCode::Backspace => {
            if state.prompt.cursor > 0 {
                state.prompt.cursor -= 1;
                state.prompt.input.remove(state.prompt.cursor);
            }
            if state.prompt.input.is_empty() {
                state.prompt.deactivate();
            }
        }
        KeyCode::Left => {
            state.prompt.cursor = state.prompt.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            state.prompt.cursor = (state.prompt.cursor + 1).min(state.prompt.input.len());
        }
        KeyCode::Up => state.prompt.history_prev(),
        KeyCode::Down => state.prompt.history_next(),
        KeyCode::Char(ch) if ch.is_ascii() && !ch.is_ascii_control() => {
            state.prompt.input.insert(state.prompt.cursor, ch);
            state.prompt.cursor += 1;
        }
        _ => {}
    }
    ConsoleAction::None
}
