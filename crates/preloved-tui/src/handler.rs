use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crate::app::{App, InputMode, Screen};
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key).await?,
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick(),
        AppEvent::Feed(event) => app.on_feed_event(event),
    }
    Ok(())
}

async fn handle_key(app: &mut App, key: KeyEvent) -> Result<()> {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return Ok(());
    }

    match app.input_mode {
        InputMode::Editing => handle_login_input(app, key),
        InputMode::Normal => match app.screen {
            Screen::Swipe => handle_swipe(app, key).await,
            Screen::Liked => handle_liked(app, key).await,
            Screen::Login => {
                app.input_mode = InputMode::Editing;
            }
        },
    }

    Ok(())
}

fn handle_login_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_login(),
        KeyCode::Esc => app.should_quit = true,
        KeyCode::Backspace => {
            app.login_input.pop();
        }
        KeyCode::Char(c) if !c.is_whitespace() => {
            app.login_input.push(c);
        }
        _ => {}
    }
}

async fn handle_swipe(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        // Swipe right: like
        KeyCode::Right | KeyCode::Char('l') => app.like_current(),
        // Swipe left: skip
        KeyCode::Left | KeyCode::Char('h') => app.skip_current(),

        KeyCode::Char('f') => app.spawn_flush(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('s') => app.spawn_seed(),
        KeyCode::Char('L') => app.logout().await,
        KeyCode::Tab => app.toggle_liked_view(),
        _ => {}
    }
}

async fn handle_liked(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('j') | KeyCode::Down => app.liked_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.liked_nav_up(),
        KeyCode::Char('f') => app.spawn_flush(),
        KeyCode::Char('L') => app.logout().await,
        KeyCode::Tab | KeyCode::Esc => app.toggle_liked_view(),
        _ => {}
    }
}
