use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
};
use preloved_core::{FeedSnapshot, Item};
use crate::app::{App, InputMode, Screen};

const ACCENT: Color = Color::Rgb(236, 243, 158);

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    let snapshot = app.snapshot();

    render_header(app, &snapshot, frame, header_area);

    match app.screen {
        Screen::Login => render_login_screen(app, frame, body_area),
        Screen::Swipe => render_swipe_screen(app, &snapshot, frame, body_area),
        Screen::Liked => render_liked_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, snapshot: &FeedSnapshot, frame: &mut Frame, area: Rect) {
    let user = match &app.user {
        Some(user) => format!(" Hi {}!", user.name),
        None => String::new(),
    };
    let pending = if snapshot.pending_likes > 0 {
        format!(" [{} unsaved]", snapshot.pending_likes)
    } else {
        String::new()
    };

    let title = Line::from(vec![
        Span::styled(" preloved ", Style::default().fg(ACCENT).bold()),
        Span::styled(user, Style::default().fg(Color::White)),
        Span::styled(pending, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.screen {
        Screen::Login => " LOGIN ",
        Screen::Swipe => " SWIPE ",
        Screen::Liked => " LIKED ",
    };

    let hints = match app.screen {
        Screen::Login => " Enter: log in | Esc: quit",
        Screen::Swipe => " ←/h: skip | →/l: like | f: save likes | r: refresh | s: seed | Tab: liked | L: log out | q: quit",
        Screen::Liked => " j/k: move | f: save likes | Tab: back | q: quit",
    };

    let mut spans = vec![
        Span::styled(mode_text, mode_style.add_modifier(Modifier::BOLD)),
        Span::styled(hints, Style::default().fg(Color::Gray)),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(status.clone(), Style::default().fg(ACCENT)));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_login_screen(app: &App, frame: &mut Frame, area: Rect) {
    let popup = centered_rect(50, 7, area);
    frame.render_widget(Clear, popup);

    let dots = if app.login_pending {
        ".".repeat(app.animation_frame as usize + 1)
    } else {
        String::new()
    };

    let text = Text::from(vec![
        Line::from(Span::styled(
            "Swipe right on what you love",
            Style::default().fg(ACCENT).bold(),
        )),
        Line::default(),
        Line::from(vec![
            Span::raw("Username: "),
            Span::styled(app.login_input.clone(), Style::default().fg(Color::White).bold()),
            Span::styled("█", Style::default().fg(Color::Gray)),
            Span::raw(dots),
        ]),
        Line::from(Span::styled(
            format!("Recommender: {}", app.api_url()),
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let block = Block::default()
        .title(" Log in ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

    frame.render_widget(
        Paragraph::new(text).block(block).alignment(Alignment::Center),
        popup,
    );
}

fn render_swipe_screen(app: &App, snapshot: &FeedSnapshot, frame: &mut Frame, area: Rect) {
    let [card_area, side_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
    let [status_area, shelves_area] =
        Layout::vertical([Constraint::Length(7), Constraint::Min(0)]).areas(side_area);

    render_card(app, snapshot, frame, card_area);
    render_feed_status(app, snapshot, frame, status_area);
    render_shelves(app, frame, shelves_area);
}

fn render_shelves(app: &App, frame: &mut Frame, area: Rect) {
    if app.shelves.is_empty() {
        return;
    }
    let count = app.shelves.len() as u32;
    let areas = Layout::vertical(app.shelves.iter().map(|_| Constraint::Ratio(1, count))).split(area);

    for ((shelf, items), shelf_area) in app.shelves.iter().zip(areas.iter()) {
        let title = format!(" {} ", shelf.title());
        if items.is_empty() {
            let block = Block::default().title(title).borders(Borders::ALL);
            frame.render_widget(
                Paragraph::new("Loading...").style(Style::default().fg(Color::DarkGray)).block(block),
                *shelf_area,
            );
        } else {
            render_item_list(&title, items, frame, *shelf_area, None);
        }
    }
}

fn render_card(app: &App, snapshot: &FeedSnapshot, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .title(" Swipe ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(ACCENT));

    let Some(item) = &snapshot.current else {
        let message = if snapshot.fetching {
            format!("Finding more items{}", ".".repeat(app.animation_frame as usize + 1))
        } else if snapshot.exhausted {
            "You've seen everything for now. Press r to check again.".to_string()
        } else {
            "No items yet. Press r to load some.".to_string()
        };
        frame.render_widget(
            Paragraph::new(message)
                .block(block)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true }),
            area,
        );
        return;
    };

    frame.render_widget(
        Paragraph::new(item_card_text(item))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn item_card_text(item: &Item) -> Text<'static> {
    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(item.name.clone(), Style::default().bold())),
        Line::from(Span::styled(
            item.display_price(),
            Style::default().fg(Color::Green).bold(),
        )),
        Line::default(),
        Line::from(vec![Span::styled("Brand      ", label), Span::raw(item.brand.clone())]),
        Line::from(vec![Span::styled("Condition  ", label), Span::raw(item.condition.clone())]),
        Line::from(vec![Span::styled("Size       ", label), Span::raw(item.size.clone())]),
    ];
    if let Some(color) = &item.color {
        lines.push(Line::from(vec![Span::styled("Color      ", label), Span::raw(color.clone())]));
    }
    if !item.categories.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Categories ", label),
            Span::raw(item.categories.join(", ")),
        ]));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(item.image_url.clone(), label)));
    Text::from(lines)
}

fn render_feed_status(app: &App, snapshot: &FeedSnapshot, frame: &mut Frame, area: Rect) {
    let activity = if snapshot.fetching {
        format!("loading{}", ".".repeat(app.animation_frame as usize + 1))
    } else if snapshot.exhausted {
        "no more items".to_string()
    } else {
        "ready".to_string()
    };

    let lines = vec![
        Line::from(format!("Queued        {}", snapshot.queue_len)),
        Line::from(format!("Unsaved likes {}", snapshot.pending_likes)),
        Line::from(format!("Liked so far  {}", app.liked.len())),
        Line::from(format!(
            "Feed          {}{}",
            activity,
            if snapshot.flushing { ", saving" } else { "" }
        )),
    ];

    let block = Block::default().title(" Feed ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_item_list(
    title: &str,
    items: &[Item],
    frame: &mut Frame,
    area: Rect,
    state: Option<&mut ratatui::widgets::ListState>,
) {
    let list_items: Vec<ListItem> = items
        .iter()
        .map(|item| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>9} ", item.display_price()), Style::default().fg(Color::Green)),
                Span::raw(item.name.clone()),
                Span::styled(format!("  {}", item.brand), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let list = List::new(list_items)
        .block(Block::default().title(title.to_string()).borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");

    match state {
        Some(state) => frame.render_stateful_widget(list, area, state),
        None => frame.render_widget(list, area),
    }
}

fn render_liked_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let [list_area, detail_area] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(area);

    let title = format!(" Liked ({}, ${:.2}) ", app.liked.len(), app.liked_total());
    render_item_list(&title, &app.liked, frame, list_area, Some(&mut app.liked_state));

    let block = Block::default().title(" Details ").borders(Borders::ALL);
    let selected = app.liked_state.selected().and_then(|i| app.liked.get(i));
    let text = match selected {
        Some(item) => item_card_text(item),
        None => Text::from("Nothing liked yet"),
    };
    frame.render_widget(Paragraph::new(text).block(block).wrap(Wrap { trim: false }), detail_area);
}

/// Fixed-height rect centered horizontally at `percent_x` width.
fn centered_rect(percent_x: u16, height: u16, area: Rect) -> Rect {
    let [_, middle, _] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(height),
        Constraint::Min(0),
    ])
    .areas(area);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(middle);
    center
}
