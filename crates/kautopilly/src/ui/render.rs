use super::*;

pub(super) fn render_ui(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let shown_alerts = state.alerts.len().min(3);
    let wanted = (shown_alerts + state.prompt.output.len() + 1) as u16;
    let mut prompt_height = wanted.clamp(3, 16);
    let min_panel_height = 12;
    if prompt_height + min_panel_height >= area.height {
        prompt_height = area.height.saturating_sub(min_panel_height).max(3);
    }
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(area.height.saturating_sub(prompt_height)),
            Constraint::Length(prompt_height),
        ])
        .split(area);
    render_panels(layout[0], frame, state);
    render_prompt(layout[1], frame, state);
}

fn render_panels(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let half = [Constraint::Percentage(50), Constraint::Percentage(50)];
    if area.width < 60 {
        let stack = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(25); 4])
            .split(area);
        render_connection_panel(stack[0], frame, state);
        render_telemetry_panel(stack[1], frame, state);
        render_autopilot_panel(stack[2], frame, state);
        render_controls_panel(stack[3], frame, state);
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(half)
        .split(area);
    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(half)
        .split(rows[0]);
    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(half)
        .split(rows[1]);
    render_connection_panel(top[0], frame, state);
    render_telemetry_panel(top[1], frame, state);
    render_autopilot_panel(bottom[0], frame, state);
    render_controls_panel(bottom[1], frame, state);
}

fn state_chip(state: &ConnectionState) -> (String, Style) {
    let color = match state {
        ConnectionState::Connected => COLOR_GREEN,
        ConnectionState::Connecting => COLOR_AMBER,
        ConnectionState::Disconnected => COLOR_INFO,
        ConnectionState::Failed(_) => COLOR_RED,
    };
    (
        state.label().to_ascii_uppercase(),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

fn render_connection_panel(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let chip = state_chip(&state.view.state);
    let mut lines = vec![
        Line::from(vec![
            Span::styled(chip.0, chip.1),
            Span::raw(" "),
            Span::styled(state.source, Style::default().fg(COLOR_INFO)),
        ]),
        label_value_line(
            "Endpoint",
            &format!(
                "{}:{} (stream {})",
                state.target.address, state.target.rpc_port, state.target.stream_port
            ),
            10,
            value_style(),
        ),
        label_value_line("Ticks", &state.view.ticks.to_string(), 10, value_style()),
    ];
    if let ConnectionState::Failed(reason) = &state.view.state {
        let reason = reason.split_whitespace().collect::<Vec<_>>().join(" ");
        lines.push(label_value_line(
            "Reason",
            &reason,
            10,
            Style::default().fg(COLOR_RED),
        ));
    }
    lines.push(Line::from(Span::styled(
        "c connect  d disconnect",
        Style::default().fg(COLOR_INFO).add_modifier(Modifier::DIM),
    )));
    frame.render_widget(
        Paragraph::new(lines)
            .block(panel_block(PanelKind::Connection))
            .wrap(Wrap { trim: true }),
        area,
    );
}

fn telemetry_lines(snapshot: &TelemetrySnapshot) -> Vec<Line<'static>> {
    vec![
        label_value_line(
            "Altitude",
            &format!("{:.1} m", snapshot.altitude),
            10,
            value_style(),
        ),
        label_value_line(
            "Surface",
            &format!("{:.1} m", snapshot.surface_altitude),
            10,
            value_style(),
        ),
        label_value_line(
            "Speed",
            &format!("{:.1} m/s", snapshot.speed),
            10,
            value_style(),
        ),
        label_value_line(
            "Heading",
            &format!("{:.1}°", snapshot.heading),
            10,
            value_style(),
        ),
        label_value_line("Pitch", &format!("{:.1}°", snapshot.pitch), 10, value_style()),
        label_value_line("Roll", &format!("{:.1}°", snapshot.roll), 10, value_style()),
        label_value_line(
            "Latitude",
            &format!("{} ({:.5})", snapshot.latitude_dms(), snapshot.latitude),
            10,
            value_style(),
        ),
        label_value_line(
            "Longitude",
            &format!("{} ({:.5})", snapshot.longitude_dms(), snapshot.longitude),
            10,
            value_style(),
        ),
    ]
}

fn render_telemetry_panel(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let lines = match state.view.snapshot.as_ref() {
        None => vec![Line::from(Span::styled(
            "No telemetry yet.",
            Style::default().fg(COLOR_INFO),
        ))],
        Some(snapshot) => {
            let mut lines = Vec::new();
            if !state.view.state.is_connected() {
                lines.push(Line::from(Span::styled(
                    "Showing last known values",
                    Style::default().fg(COLOR_AMBER),
                )));
            }
            lines.extend(telemetry_lines(snapshot));
            lines
        }
    };
    frame.render_widget(
        Paragraph::new(lines).block(panel_block(PanelKind::Telemetry)),
        area,
    );
}

fn render_autopilot_panel(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let target = state.view.autopilot;
    let chip = if target.engaged {
        Span::styled(
            "ENGAGED",
            Style::default().fg(COLOR_GREEN).add_modifier(Modifier::BOLD),
        )
    } else {
        Span::styled("DISENGAGED", Style::default().fg(COLOR_INFO))
    };
    let lines = vec![
        Line::from(chip),
        label_value_line(
            "Heading",
            &format!("{:.0}°", target.heading),
            10,
            value_style(),
        ),
        label_value_line("Pitch", &format!("{:.0}°", target.pitch), 10, value_style()),
        label_value_line("Roll", &format!("{:.0}°", target.roll), 10, value_style()),
        Line::from(Span::styled(
            "←/→ hdg  ↑/↓ pitch  [ ] roll  a engage",
            Style::default().fg(COLOR_INFO).add_modifier(Modifier::DIM),
        )),
    ];
    frame.render_widget(
        Paragraph::new(lines).block(panel_block(PanelKind::Autopilot)),
        area,
    );
}

fn render_controls_panel(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let block = panel_block(PanelKind::Controls);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let controls = state.view.controls;
    let throttle = controls.throttle.clamp(0.0, 1.0);
    let pending = if state.view.throttle_pending {
        " (pending)"
    } else {
        ""
    };
    let gauge_area = Rect {
        x: inner.x,
        y: inner.y,
        width: inner.width,
        height: 1,
    };
    frame.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(COLOR_TEAL).bg(COLOR_PROMPT_BG))
            .ratio(throttle)
            .label(format!("Throttle {:.0}%{pending}", throttle * 100.0)),
        gauge_area,
    );

    let lines = vec![
        label_value_line("Lights", on_off(controls.lights), 10, value_style()),
        label_value_line(
            "Gear",
            if controls.gear { "DOWN" } else { "UP" },
            10,
            value_style(),
        ),
        label_value_line("Brakes", on_off(controls.brakes), 10, value_style()),
        Line::from(Span::styled(
            "+/- throttle  l g b toggle",
            Style::default().fg(COLOR_INFO).add_modifier(Modifier::DIM),
        )),
    ];
    let text_area = Rect {
        x: inner.x,
        y: inner.y + 1,
        width: inner.width,
        height: inner.height - 1,
    };
    frame.render_widget(Paragraph::new(lines), text_area);
}

fn render_prompt(area: Rect, frame: &mut ratatui::Frame<'_>, state: &UiState) {
    let mut lines: Vec<Line> = Vec::new();
    let skip = state.alerts.len().saturating_sub(3);
    for alert in state.alerts.iter().skip(skip) {
        lines.push(prompt_line_to_line(alert));
    }
    for line in &state.prompt.output {
        lines.push(prompt_line_to_line(line));
    }
    let output_height = area.height.saturating_sub(1);
    let output_area = Rect {
        x: area.x,
        y: area.y,
        width: area.width,
        height: output_height,
    };
    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), output_area);

    let prompt_area = Rect {
        x: area.x,
        y: area.y + output_height,
        width: area.width,
        height: 1,
    };
    if state.prompt.active {
        let prompt = Line::from(vec![
            Span::styled(
                "> ",
                Style::default().fg(COLOR_TEAL).add_modifier(Modifier::BOLD),
            ),
            Span::raw(state.prompt.input.clone()),
        ]);
        frame.render_widget(
            Paragraph::new(prompt).style(Style::default().bg(COLOR_PROMPT_BG)),
            prompt_area,
        );
        frame.set_cursor(
            prompt_area.x + 2 + state.prompt.cursor as u16,
            prompt_area.y,
        );
    } else {
        let hint = Line::from(Span::styled(
            "Press / for commands, ? for help, q to quit",
            Style::default()
                .fg(COLOR_INFO)
                .add_modifier(Modifier::DIM)
                .bg(COLOR_PROMPT_BG),
        ));
        frame.render_widget(
            Paragraph::new(hint).style(Style::default().bg(COLOR_PROMPT_BG)),
            prompt_area,
        );
    }
}

fn prompt_line_to_line(line: &PromptLine) -> Line<'_> {
    let spans = line
        .segments
        .iter()
        .map(|(text, style)| Span::styled(text.clone(), *style))
        .collect::<Vec<_>>();
    Line::from(spans)
}
