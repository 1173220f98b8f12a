use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, Screen};
use crate::auth::{AuthField, AuthForm, AuthMode};
use crate::dashboard::{Dashboard, Focus, FormField, Modal, StatusFilter};
use crate::guard::{GuardState, SessionGuard};
use crate::notify::Level;

const ACCENT: Color = Color::Cyan;

pub fn draw(f: &mut Frame, app: &App) {
    match &app.screen {
        Screen::Auth(form) => draw_auth(f, form),
        Screen::Dashboard { guard, board } => draw_protected(f, guard, board),
        Screen::NotFound => draw_not_found(f),
    }
    draw_toasts(f, app);
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn field_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(ACCENT)
    } else {
        Style::default()
    }
}

fn input_box<'a>(title: &'a str, value: String, focused: bool) -> Paragraph<'a> {
    Paragraph::new(value).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(field_style(focused)),
    )
}

fn error_line(error: Option<&'static str>) -> Paragraph<'static> {
    Paragraph::new(error.unwrap_or_default()).style(Style::default().fg(Color::Red))
}

fn draw_auth(f: &mut Frame, form: &AuthForm) {
    let area = centered(f.area(), 56, 18);
    f.render_widget(
        Block::default()
            .title(" Task Manager ")
            .title_alignment(Alignment::Center)
            .borders(Borders::ALL),
        area,
    );
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(area);

    let heading = if form.loading {
        format!("{}…", form.mode.title())
    } else {
        form.mode.title().to_string()
    };
    f.render_widget(
        Paragraph::new(heading)
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );
    f.render_widget(
        input_box(
            "Email",
            form.email.display(false),
            form.field == AuthField::Email,
        ),
        chunks[1],
    );
    f.render_widget(error_line(form.errors.email), chunks[2]);
    f.render_widget(
        input_box(
            "Password",
            form.password.display(!form.show_password),
            form.field == AuthField::Password,
        ),
        chunks[3],
    );
    f.render_widget(error_line(form.errors.password), chunks[4]);

    let switch = match form.mode {
        AuthMode::SignIn => "Ctrl-S: create an account",
        AuthMode::SignUp => "Ctrl-S: back to sign in",
    };
    f.render_widget(
        Paragraph::new(vec![
            Line::from("Enter submit · Tab next field · Ctrl-P show password"),
            Line::from(switch),
        ])
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true }),
        chunks[6],
    );
}

fn draw_protected(f: &mut Frame, guard: &SessionGuard, board: &Dashboard) {
    match guard.state() {
        GuardState::Checking => draw_loading(f),
        GuardState::Denied => {}
        GuardState::Granted => draw_dashboard(f, board),
    }
}

fn draw_loading(f: &mut Frame) {
    let area = centered(f.area(), 20, 3);
    f.render_widget(
        Paragraph::new("Loading…")
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_dashboard(f: &mut Frame, board: &Dashboard) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let user = board
        .user
        .as_ref()
        .and_then(|claims| claims.display_name())
        .unwrap_or("signed in");
    let header = Line::from(vec![
        Span::styled(
            "Task Dashboard",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  ({user})")),
        Span::raw(if board.is_loading() { "  loading…" } else { "" }),
    ]);
    f.render_widget(
        Paragraph::new(header).block(
            Block::default()
                .borders(Borders::ALL)
                .title_bottom(Line::from(" L: Logout ").right_aligned()),
        ),
        chunks[0],
    );

    f.render_widget(
        input_box(
            "Search tasks",
            board.search.value().to_string(),
            board.focus == Focus::Search,
        ),
        chunks[1],
    );

    let selected_filter = StatusFilter::ALL
        .iter()
        .position(|filter| *filter == board.filter)
        .unwrap_or(0);
    let tabs = Tabs::new(StatusFilter::ALL.iter().map(|filter| filter.label()))
        .select(selected_filter)
        .block(Block::default().title("Filter").borders(Borders::ALL))
        .highlight_style(Style::default().fg(ACCENT).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks[2]);

    let filtered = board.filtered();
    let items: Vec<ListItem> = filtered
        .iter()
        .map(|t| {
            let mark = if board.is_busy(t) {
                "[…] "
            } else if t.complete {
                "[x] "
            } else {
                "[ ] "
            };
            let title_style = if t.complete {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(Color::White)
            };
            ListItem::new(Line::from(vec![
                Span::raw(mark),
                Span::styled(t.title.as_str(), title_style),
                Span::raw(format!(" (Due: {})", t.due_date)),
            ]))
        })
        .collect();
    let title = format!("Tasks ({}/{})", filtered.len(), board.tasks.len());
    let list = List::new(items)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(field_style(board.focus == Focus::List)),
        )
        .highlight_style(Style::default().add_modifier(Modifier::BOLD | Modifier::REVERSED));
    let mut state = ListState::default().with_selected(if filtered.is_empty() {
        None
    } else {
        Some(board.selected)
    });
    f.render_stateful_widget(list, chunks[3], &mut state);

    f.render_widget(
        Paragraph::new(
            "a add · e edit · space toggle · d delete · / search · ←/→ filter · r refresh · q quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
        chunks[4],
    );

    match &board.modal {
        Modal::None => {}
        Modal::Create => draw_task_form(f, board, "Create Task"),
        Modal::Edit(_) => draw_task_form(f, board, "Edit Task"),
        Modal::Delete(_) => draw_confirm(
            f,
            "Delete Task",
            "Are you sure you want to delete this task? (y/n)",
        ),
        Modal::Logout => draw_confirm(f, "Confirm Logout", "Are you sure you want to logout? (y/n)"),
    }
}

fn draw_task_form(f: &mut Frame, board: &Dashboard, title: &str) {
    let area = centered(f.area(), 50, 11);
    f.render_widget(Clear, area);
    f.render_widget(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(ACCENT)),
        area,
    );
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(area);
    let form = &board.form;
    f.render_widget(
        input_box(
            "Title",
            form.title.value().to_string(),
            form.field == FormField::Title,
        ),
        chunks[0],
    );
    f.render_widget(
        input_box(
            "Due date (YYYY-MM-DD)",
            form.due_date.value().to_string(),
            form.field == FormField::DueDate,
        ),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new("Enter save · Tab next field · Esc cancel")
            .style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );
}

fn draw_confirm(f: &mut Frame, title: &str, question: &str) {
    let area = centered(f.area(), 50, 5);
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(question)
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            ),
        area,
    );
}

fn draw_not_found(f: &mut Frame) {
    let area = centered(f.area(), 44, 5);
    f.render_widget(
        Paragraph::new(vec![
            Line::from("404 · Page not found"),
            Line::from("Enter: go to dashboard · q: quit"),
        ])
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL)),
        area,
    );
}

fn draw_toasts(f: &mut Frame, app: &App) {
    let area = f.area();
    let width = 44.min(area.width);
    for (i, toast) in app.toasts.visible().take(3).enumerate() {
        let y = area.y + i as u16 * 3;
        if y + 3 > area.y + area.height {
            break;
        }
        let rect = Rect {
            x: area.x + area.width - width,
            y,
            width,
            height: 3,
        };
        let color = match toast.level {
            Level::Success => Color::Green,
            Level::Error => Color::Red,
        };
        f.render_widget(Clear, rect);
        f.render_widget(
            Paragraph::new(toast.message.as_str())
                .style(Style::default().fg(color))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(color)),
                ),
            rect,
        );
    }
}
