use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct CommandHelp {
    pub(super) usage: &'static str,
    pub(super) about: &'static str,
}

const CATALOG: [CommandHelp; 14] = [
    CommandHelp {
        usage: "/heading <deg>",
        about: "Set target heading and engage autopilot",
    },
    CommandHelp {
        usage: "/pitch <deg>",
        about: "Set target pitch and engage autopilot",
    },
    CommandHelp {
        usage: "/roll <deg>",
        about: "Set target roll and engage autopilot",
    },
    CommandHelp {
        usage: "/throttle <0..1|N%>",
        about: "Command throttle",
    },
    CommandHelp {
        usage: "/engage",
        about: "Engage autopilot",
    },
    CommandHelp {
        usage: "/disengage",
        about: "Disengage autopilot, restore SAS",
    },
    CommandHelp {
        usage: "/lights <on|off>",
        about: "Switch lights",
    },
    CommandHelp {
        usage: "/gear <up|down>",
        about: "Raise or lower gear",
    },
    CommandHelp {
        usage: "/brakes <on|off>",
        about: "Set brakes",
    },
    CommandHelp {
        usage: "/connect [addr] [rpc] [stream]",
        about: "Connect (defaults to last target)",
    },
    CommandHelp {
        usage: "/disconnect",
        about: "Close the session",
    },
    CommandHelp {
        usage: "/status",
        about: "Show connection status",
    },
    CommandHelp {
        usage: "/clear",
        about: "Clear output and alerts",
    },
    CommandHelp {
        usage: "/quit",
        about: "Exit console",
    },
];

pub(super) fn command_catalog() -> &'static [CommandHelp] {
    &CATALOG
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum ParsedCommand {
    Pilot(PilotCommand),
    Help,
    Status,
    Clear,
    Quit,
}

pub(super) fn parse_command(input: &str, target: &ConnectTarget) -> Result<ParsedCommand, String> {
    let raw = input.trim();
    let cmd = raw.strip_prefix('/').unwrap_or(raw);
    let mut parts = cmd.split_whitespace();
    let head = parts.next().unwrap_or("").to_ascii_lowercase();
    let arg = parts.next();
    let command = match head.as_str() {
        "" | "help" | "h" | "?" => return Ok(ParsedCommand::Help),
        "status" | "s" => return Ok(ParsedCommand::Status),
        "clear" => return Ok(ParsedCommand::Clear),
        "quit" | "exit" | "q" => return Ok(ParsedCommand::Quit),
        "heading" | "hdg" => {
            PilotCommand::SubmitSetpoint(Setpoint::Heading(number("heading", arg)?))
        }
        "pitch" => PilotCommand::SubmitSetpoint(Setpoint::Pitch(number("pitch", arg)?)),
        "roll" => PilotCommand::SubmitSetpoint(Setpoint::Roll(number("roll", arg)?)),
        "throttle" | "thr" => PilotCommand::SetThrottle(throttle(arg)?),
        "engage" => PilotCommand::SetAutopilotEngaged(true),
        "disengage" => PilotCommand::SetAutopilotEngaged(false),
        "lights" => PilotCommand::SetLights(switch("lights", arg, "on", "off")?),
        "gear" => PilotCommand::SetGear(switch("gear", arg, "down", "up")?),
        "brakes" => PilotCommand::SetBrakes(switch("brakes", arg, "on", "off")?),
        "connect" => PilotCommand::Connect {
            address: arg.map_or_else(|| target.address.clone(), SmolStr::new),
            rpc_port: port("rpc", parts.next(), target.rpc_port)?,
            stream_port: port("stream", parts.next(), target.stream_port)?,
        },
        "disconnect" => PilotCommand::Disconnect,
        other => return Err(format!("Unknown command '/{other}'. Type /help.")),
    };
    Ok(ParsedCommand::Pilot(command))
}

fn number(name: &str, arg: Option<&str>) -> Result<f64, String> {
    let arg = arg.ok_or_else(|| format!("Usage: /{name} <deg>"))?;
    arg.parse::<f64>()
        .map_err(|_| format!("{name}: '{arg}' is not a number"))
}

fn throttle(arg: Option<&str>) -> Result<f64, String> {
    let arg = arg.ok_or_else(|| "Usage: /throttle <0..1|N%>".to_string())?;
    let (digits, scale) = match arg.strip_suffix('%') {
        Some(percent) => (percent, 100.0),
        None => (arg, 1.0),
    };
    digits
        .parse::<f64>()
        .map(|value| value / scale)
        .map_err(|_| format!("throttle: '{arg}' is not a number"))
}

fn switch(name: &str, arg: Option<&str>, on: &str, off: &str) -> Result<bool, String> {
    match arg.map(str::to_ascii_lowercase) {
        Some(value) if value == on => Ok(true),
        Some(value) if value == off => Ok(false),
        _ => Err(format!("Usage: /{name} <{on}|{off}>")),
    }
}

fn port(kind: &str, arg: Option<&str>, default: i64) -> Result<i64, String> {
    match arg {
        None => Ok(default),
        Some(arg) => arg
            .parse::<i64>()
            .map_err(|_| format!("{kind} port '{arg}' is not a number")),
    }
}

pub(super) fn execute_command(input: &str, state: &mut UiState) -> ConsoleAction {
    match parse_command(input, &state.target) {
        Ok(ParsedCommand::Pilot(command)) => {
            if let PilotCommand::Connect {
                address,
                rpc_port,
                stream_port,
            } = &command
            {
                state.target = ConnectTarget {
                    address: address.clone(),
                    rpc_port: *rpc_port,
                    stream_port: *stream_port,
                };
            }
            state.prompt.clear_output();
            ConsoleAction::Send(command)
        }
        Ok(ParsedCommand::Help) => {
            state.prompt.set_output(help_lines());
            ConsoleAction::None
        }
        Ok(ParsedCommand::Status) => {
            state.prompt.set_output(status_lines(state));
            ConsoleAction::None
        }
        Ok(ParsedCommand::Clear) => {
            state.prompt.clear_output();
            state.alerts.clear();
            ConsoleAction::None
        }
        Ok(ParsedCommand::Quit) => ConsoleAction::Quit,
        Err(message) => {
            state.prompt.set_output(vec![PromptLine::plain(
                message,
                Style::default().fg(COLOR_AMBER),
            )]);
            ConsoleAction::None
        }
    }
}

pub(super) fn help_lines() -> Vec<PromptLine> {
    command_catalog()
        .iter()
        .map(|help| {
            PromptLine::from_segments(vec![
                seg(format!("{:<32}", help.usage), label_style()),
                seg(help.about, value_style()),
            ])
        })
        .collect()
}

fn status_lines(state: &UiState) -> Vec<PromptLine> {
    let mut lines = vec![PromptLine::from_segments(vec![
        seg("State   ", label_style()),
        seg(state.view.state.label(), value_style()),
    ])];
    if let ConnectionState::Failed(reason) = &state.view.state {
        lines.push(PromptLine::plain(
            format!("Reason  {}", reason.replace('\n', " ")),
            Style::default().fg(COLOR_RED),
        ));
    }
    lines.push(PromptLine::from_segments(vec![
        seg("Target  ", label_style()),
        seg(
            format!(
                "{}:{} (stream {})",
                state.target.address, state.target.rpc_port, state.target.stream_port
            ),
            value_style(),
        ),
    ]));
    lines.push(PromptLine::from_segments(vec![
        seg("Ticks   ", label_style()),
        seg(state.view.ticks.to_string(), value_style()),
    ]));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> ConnectTarget {
        ConnectTarget {
            address: SmolStr::new("127.0.0.1"),
            rpc_port: 50000,
            stream_port: 50001,
        }
    }

    #[test]
    fn parses_setpoints_and_switches() {
        let target = target();
        assert_eq!(
            parse_command("/roll -15", &target),
            Ok(ParsedCommand::Pilot(PilotCommand::SubmitSetpoint(
                Setpoint::Roll(-15.0)
            )))
        );
        assert_eq!(
            parse_command("throttle 40%", &target),
            Ok(ParsedCommand::Pilot(PilotCommand::SetThrottle(0.4)))
        );
        assert_eq!(
            parse_command("/gear UP", &target),
            Ok(ParsedCommand::Pilot(PilotCommand::SetGear(false)))
        );
        assert_eq!(
            parse_command("/disengage", &target),
            Ok(ParsedCommand::Pilot(PilotCommand::SetAutopilotEngaged(false)))
        );
    }

    #[test]
    fn connect_defaults_to_current_target() {
        assert_eq!(
            parse_command("/connect", &target()),
            Ok(ParsedCommand::Pilot(target().command()))
        );
        assert_eq!(
            parse_command("/connect host 1", &target()),
            Ok(ParsedCommand::Pilot(PilotCommand::Connect {
                address: SmolStr::new("host"),
                rpc_port: 1,
                stream_port: 50001,
            }))
        );
        assert!(parse_command("/connect host abc", &target())
            .expect_err("bad port")
            .contains("rpc port"));
    }

    #[test]
    fn rejects_unknown_and_incomplete_commands() {
        let target = target();
        assert!(parse_command("/warp 9", &target).is_err());
        assert!(parse_command("/lights", &target).is_err());
        assert!(parse_command("/heading", &target)
            .expect_err("missing value")
            .starts_with("Usage"));
    }
}
