// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use peacock_app::{
    AdminAction, AdminEditor, AdminEvent, AdminField, AppCommand, AppEvent, AppState, AuthState,
    Carousel, DetailView, Language, LoginField, LoginFormInput, MenuItem, MenuItemId, MenuRow, MenuService,
    RowStatusKind, Subscription, View, empty_state_message, format_price, serialize_image_urls,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

const STATUS_TTL: Duration = Duration::from_secs(4);
const POLL_INTERVAL: Duration = Duration::from_millis(120);

/// Everything the terminal front end needs from the outside world.
pub trait AppRuntime {
    fn service(&self) -> Arc<dyn MenuService>;
    fn load_language(&mut self) -> Result<Option<Language>>;
    fn save_language(&mut self, language: Language) -> Result<()>;
}

/// Results delivered back to the UI thread by request and timer threads.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    ClearRowStatus {
        id: MenuItemId,
        token: u64,
    },
    MenuLoaded {
        generation: u64,
        result: Result<Vec<MenuRow>, String>,
    },
    DetailLoaded {
        generation: u64,
        result: Result<Option<MenuRow>, String>,
    },
    AdminRowsLoaded {
        generation: u64,
        result: Result<Vec<MenuRow>, String>,
    },
    AuthChanged {
        generation: u64,
        state: AuthState,
    },
    SignInFinished {
        generation: u64,
        result: Result<(), String>,
    },
    SignOutFinished {
        result: Result<(), String>,
    },
    SaveFinished {
        generation: u64,
        id: MenuItemId,
        result: Result<MenuRow, String>,
    },
    ToggleFinished {
        generation: u64,
        id: MenuItemId,
        previous: bool,
        result: Result<MenuRow, String>,
    },
}

#[derive(Default)]
struct AdminUiState {
    generation: u64,
    auth: AuthState,
    login: LoginFormInput,
    editor: AdminEditor,
    cursor: usize,
    editing_urls: bool,
    loading: bool,
    subscription: Option<Subscription>,
}

impl AdminUiState {
    fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    fn selected_id(&self) -> Option<MenuItemId> {
        self.editor
            .rows()
            .get(self.cursor)
            .map(|row| row.id.clone())
    }
}

#[derive(Default)]
struct ViewData {
    catalog: peacock_app::Catalog,
    menu_cursor: usize,
    /// Image position per menu card; cards not yet browsed start at the first image.
    card_images: BTreeMap<MenuItemId, Carousel>,
    search_active: bool,
    menu_generation: u64,
    menu_loading: bool,
    detail: Option<DetailView>,
    detail_generation: u64,
    admin: AdminUiState,
    status_token: u64,
    help_visible: bool,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    match runtime.load_language() {
        Ok(Some(language)) => state.language = language,
        Ok(None) => {}
        Err(error) => {
            tracing::warn!(%error, "reading language preference failed");
            emit_status(
                state,
                &mut view_data,
                &internal_tx,
                format!("language preference unreadable: {error}"),
            );
        }
    }
    request_menu(runtime, &mut view_data, &internal_tx);
    let initial = state.view.clone();
    enter_view(runtime, &mut view_data, &internal_tx, &initial);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(POLL_INTERVAL).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) if key.kind != KeyEventKind::Release => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    unmount_admin(&mut view_data);
    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn spawn_request<T, W, M>(tx: &Sender<InternalEvent>, work: W, wrap: M)
where
    T: Send + 'static,
    W: FnOnce() -> Result<T> + Send + 'static,
    M: FnOnce(Result<T, String>) -> InternalEvent + Send + 'static,
{
    let sender = tx.clone();
    thread::spawn(move || {
        let result = work().map_err(|error| error.to_string());
        let _ = sender.send(wrap(result));
    });
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_TTL);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn schedule_row_status_clear(
    internal_tx: &Sender<InternalEvent>,
    id: MenuItemId,
    token: u64,
    after: Duration,
) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(after);
        let _ = sender.send(InternalEvent::ClearRowStatus { id, token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn request_menu<R: AppRuntime>(runtime: &R, view_data: &mut ViewData, tx: &Sender<InternalEvent>) {
    view_data.menu_generation = view_data.menu_generation.saturating_add(1);
    view_data.menu_loading = true;
    let generation = view_data.menu_generation;
    let service = runtime.service();
    spawn_request(
        tx,
        move || service.list_available_items(),
        move |result| InternalEvent::MenuLoaded { generation, result },
    );
}

fn request_detail<R: AppRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    id: MenuItemId,
) {
    view_data.detail_generation = view_data.detail_generation.saturating_add(1);
    view_data.detail = Some(DetailView::loading(id.clone()));
    let generation = view_data.detail_generation;
    let service = runtime.service();
    spawn_request(
        tx,
        move || service.get_item_by_id(&id),
        move |result| InternalEvent::DetailLoaded { generation, result },
    );
}

fn request_admin_rows<R: AppRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    view_data.admin.loading = true;
    let generation = view_data.admin.generation;
    let service = runtime.service();
    spawn_request(
        tx,
        move || service.list_all_items(),
        move |result| InternalEvent::AdminRowsLoaded { generation, result },
    );
}

fn mount_admin<R: AppRuntime>(runtime: &R, view_data: &mut ViewData, tx: &Sender<InternalEvent>) {
    let service = runtime.service();
    let admin = &mut view_data.admin;
    admin.generation = admin.generation.saturating_add(1);
    // results from the previous mount are dropped, so nothing is in flight
    admin.editor.dispatch(AdminAction::Cleared);
    let generation = admin.generation;
    let sender = tx.clone();
    admin.subscription = Some(service.sessions().subscribe(move |auth| {
        let _ = sender.send(InternalEvent::AuthChanged {
            generation,
            state: auth.clone(),
        });
    }));
    admin.login = LoginFormInput::default();
    admin.cursor = 0;
    admin.editing_urls = false;
    admin.auth = service.auth_state();
    tracing::debug!(authenticated = admin.auth.is_authenticated(), "admin screen mounted");
    if admin.auth.is_authenticated() {
        request_admin_rows(runtime, view_data, tx);
    }
}

fn unmount_admin(view_data: &mut ViewData) {
    if let Some(subscription) = view_data.admin.subscription.take() {
        subscription.unsubscribe();
        tracing::debug!("admin screen unmounted");
    }
    view_data.admin.editing_urls = false;
    view_data.admin.loading = false;
}

fn enter_view<R: AppRuntime>(
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    view: &View,
) {
    match view {
        View::Menu => {
            let leaving_admin = view_data.admin.is_mounted();
            unmount_admin(view_data);
            view_data.detail = None;
            if leaving_admin {
                request_menu(runtime, view_data, tx);
            }
        }
        View::Detail(id) => {
            unmount_admin(view_data);
            request_detail(runtime, view_data, tx, id.clone());
        }
        View::Admin => mount_admin(runtime, view_data, tx),
    }
}

fn dispatch_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    for event in state.dispatch(command) {
        match event {
            AppEvent::LanguageChanged(language) => {
                if let Err(error) = runtime.save_language(language) {
                    tracing::warn!(%error, "saving language preference failed");
                    emit_status(state, view_data, tx, format!("language not saved: {error}"));
                }
            }
            AppEvent::ViewChanged(view) => enter_view(runtime, view_data, tx, &view),
            AppEvent::StatusUpdated(_) | AppEvent::StatusCleared => {}
        }
    }
}

fn dispatch_admin<R: AppRuntime>(
    state: &mut AppState,
    runtime: &R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    action: AdminAction,
) {
    let generation = view_data.admin.generation;
    for event in view_data.admin.editor.dispatch(action) {
        match event {
            AdminEvent::SaveRequested { id, patch } => {
                let service = runtime.service();
                let target = id.clone();
                spawn_request(
                    tx,
                    move || service.update_item(&target, &patch),
                    move |result| InternalEvent::SaveFinished {
                        generation,
                        id,
                        result,
                    },
                );
            }
            AdminEvent::ToggleRequested {
                id,
                patch,
                previous,
            } => {
                let service = runtime.service();
                let target = id.clone();
                spawn_request(
                    tx,
                    move || service.update_item(&target, &patch),
                    move |result| InternalEvent::ToggleFinished {
                        generation,
                        id,
                        previous,
                        result,
                    },
                );
            }
            AdminEvent::ScheduleStatusClear { id, token, after } => {
                schedule_row_status_clear(tx, id, token, after);
            }
            AdminEvent::Rejected { id, reason } => {
                tracing::debug!(%id, %reason, "admin action rejected");
                emit_status(state, view_data, tx, format!("{id}: {reason}"));
            }
            AdminEvent::RowsReplaced(_)
            | AdminEvent::RowsCleared
            | AdminEvent::BufferChanged(_)
            | AdminEvent::StatusCleared(_) => {}
        }
    }
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        handle_internal_event(state, runtime, view_data, tx, event);
    }
}

fn handle_internal_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    event: InternalEvent,
) {
    match event {
        InternalEvent::ClearStatus { token } if token == view_data.status_token => {
            state.dispatch(AppCommand::ClearStatus);
        }
        InternalEvent::ClearStatus { .. } => {}
        InternalEvent::ClearRowStatus { id, token } => {
            dispatch_admin(
                state,
                runtime,
                view_data,
                tx,
                AdminAction::ClearStatus { id, token },
            );
        }
        InternalEvent::MenuLoaded { generation, result } => {
            if generation != view_data.menu_generation {
                return;
            }
            view_data.menu_loading = false;
            match result {
                Ok(rows) => {
                    tracing::info!(rows = rows.len(), "menu loaded");
                    view_data.catalog.replace_rows(rows);
                    view_data.card_images.clear();
                    clamp_menu_cursor(view_data);
                }
                Err(error) => {
                    tracing::warn!(%error, "loading menu failed");
                    if !view_data.catalog.is_loaded() {
                        view_data.catalog.replace_items(Vec::new());
                    }
                    emit_status(state, view_data, tx, format!("menu load failed: {error}"));
                }
            }
        }
        InternalEvent::DetailLoaded { generation, result } => {
            if generation != view_data.detail_generation
                || !matches!(state.view, View::Detail(_))
            {
                return;
            }
            let view = match result {
                Ok(row) => DetailView::resolve(row),
                Err(error) => {
                    tracing::warn!(%error, "loading menu item failed");
                    DetailView::NotFound
                }
            };
            view_data.detail = Some(view);
        }
        InternalEvent::AdminRowsLoaded { generation, result } => {
            if generation != view_data.admin.generation || !view_data.admin.is_mounted() {
                return;
            }
            view_data.admin.loading = false;
            match result {
                Ok(rows) => {
                    tracing::info!(rows = rows.len(), "admin rows loaded");
                    dispatch_admin(state, runtime, view_data, tx, AdminAction::Loaded(rows));
                    clamp_admin_cursor(view_data);
                }
                Err(error) => {
                    tracing::warn!(%error, "loading admin rows failed");
                    emit_status(state, view_data, tx, format!("admin rows failed: {error}"));
                }
            }
        }
        InternalEvent::AuthChanged {
            generation,
            state: auth,
        } => {
            if generation != view_data.admin.generation || !view_data.admin.is_mounted() {
                return;
            }
            let was_authenticated = view_data.admin.auth.is_authenticated();
            view_data.admin.auth = auth;
            if view_data.admin.auth.is_authenticated() {
                if !was_authenticated {
                    request_admin_rows(runtime, view_data, tx);
                }
            } else {
                view_data.admin.editing_urls = false;
                view_data.admin.cursor = 0;
                dispatch_admin(state, runtime, view_data, tx, AdminAction::Cleared);
            }
        }
        InternalEvent::SignInFinished { generation, result } => {
            if generation != view_data.admin.generation || !view_data.admin.is_mounted() {
                return;
            }
            view_data.admin.login.finish_submit(result.err());
        }
        InternalEvent::SignOutFinished { result } => match result {
            Ok(()) => emit_status(state, view_data, tx, "signed out"),
            Err(error) => emit_status(state, view_data, tx, format!("sign out failed: {error}")),
        },
        InternalEvent::SaveFinished {
            generation,
            id,
            result,
        } => {
            if generation != view_data.admin.generation {
                return;
            }
            let action = match result {
                Ok(row) => AdminAction::SaveSucceeded { id, row },
                Err(error) => AdminAction::SaveFailed { id, error },
            };
            dispatch_admin(state, runtime, view_data, tx, action);
        }
        InternalEvent::ToggleFinished {
            generation,
            id,
            previous,
            result,
        } => {
            if generation != view_data.admin.generation {
                return;
            }
            let action = match result {
                Ok(row) => AdminAction::ToggleSucceeded { id, row },
                Err(error) => AdminAction::ToggleFailed {
                    id,
                    previous,
                    error,
                },
            };
            dispatch_admin(state, runtime, view_data, tx, action);
        }
    }
}

fn clamp_menu_cursor(view_data: &mut ViewData) {
    let len = view_data.catalog.visible().len();
    view_data.menu_cursor = view_data.menu_cursor.min(len.saturating_sub(1));
}

fn clamp_admin_cursor(view_data: &mut ViewData) {
    let len = view_data.admin.editor.rows().len();
    view_data.admin.cursor = view_data.admin.cursor.min(len.saturating_sub(1));
}

fn move_cursor(cursor: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    cursor.saturating_add_signed(delta).min(len - 1)
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.view {
        View::Menu => handle_menu_key(state, runtime, view_data, internal_tx, key),
        View::Detail(_) => handle_detail_key(state, runtime, view_data, internal_tx, key),
        View::Admin => handle_admin_key(state, runtime, view_data, internal_tx, key),
    }
}

fn handle_menu_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if view_data.search_active {
        match key.code {
            KeyCode::Esc | KeyCode::Enter => view_data.search_active = false,
            KeyCode::Backspace => {
                view_data.catalog.pop_query_char();
                clamp_menu_cursor(view_data);
            }
            KeyCode::Char(ch) => {
                view_data.catalog.push_query_char(ch);
                clamp_menu_cursor(view_data);
            }
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('/') => view_data.search_active = true,
        KeyCode::Esc if !view_data.catalog.query().is_empty() => {
            view_data.catalog.set_query("");
            clamp_menu_cursor(view_data);
        }
        KeyCode::Char('t') => dispatch_app(state, runtime, view_data, tx, AppCommand::ToggleLanguage),
        KeyCode::Tab | KeyCode::Right | KeyCode::Char(']') => {
            view_data.catalog.cycle_category(1);
            view_data.menu_cursor = 0;
        }
        KeyCode::BackTab | KeyCode::Left | KeyCode::Char('[') => {
            view_data.catalog.cycle_category(-1);
            view_data.menu_cursor = 0;
        }
        KeyCode::Down | KeyCode::Char('j') => {
            let len = view_data.catalog.visible().len();
            view_data.menu_cursor = move_cursor(view_data.menu_cursor, 1, len);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let len = view_data.catalog.visible().len();
            view_data.menu_cursor = move_cursor(view_data.menu_cursor, -1, len);
        }
        KeyCode::Char('l') => step_card_image(view_data, 1),
        KeyCode::Char('h') => step_card_image(view_data, -1),
        KeyCode::Enter => {
            let selected = view_data
                .catalog
                .visible()
                .get(view_data.menu_cursor)
                .map(|item| item.id.clone());
            if let Some(id) = selected {
                dispatch_app(state, runtime, view_data, tx, AppCommand::OpenDetail(id));
            }
        }
        KeyCode::Char('r') => {
            request_menu(runtime, view_data, tx);
            emit_status(state, view_data, tx, "reloading menu");
        }
        KeyCode::Char('a') => dispatch_app(state, runtime, view_data, tx, AppCommand::OpenAdmin),
        _ => {}
    }
    false
}

fn step_card_image(view_data: &mut ViewData, delta: isize) {
    let Some(item) = view_data.catalog.visible().get(view_data.menu_cursor).copied() else {
        return;
    };
    let (id, len) = (item.id.clone(), item.images.len());
    let carousel = view_data
        .card_images
        .entry(id)
        .or_insert_with(|| Carousel::new(len));
    if delta < 0 {
        carousel.prev();
    } else {
        carousel.next();
    }
}

fn card_carousel(view_data: &ViewData, item: &MenuItem) -> Carousel {
    view_data
        .card_images
        .get(&item.id)
        .copied()
        .unwrap_or_else(|| Carousel::new(item.images.len()))
}

fn handle_detail_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
            dispatch_app(state, runtime, view_data, tx, AppCommand::BackToMenu);
        }
        KeyCode::Char('t') => dispatch_app(state, runtime, view_data, tx, AppCommand::ToggleLanguage),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Char('n') => {
            if let Some(carousel) = view_data.detail.as_mut().and_then(DetailView::carousel_mut) {
                carousel.next();
            }
        }
        KeyCode::Left | KeyCode::Char('h') | KeyCode::Char('p') => {
            if let Some(carousel) = view_data.detail.as_mut().and_then(DetailView::carousel_mut) {
                carousel.prev();
            }
        }
        KeyCode::Char(ch) if ch.is_ascii_digit() && ch != '0' => {
            let index = ch.to_digit(10).map_or(0, |digit| digit as usize - 1);
            if let Some(carousel) = view_data.detail.as_mut().and_then(DetailView::carousel_mut) {
                carousel.select(index);
            }
        }
        _ => {}
    }
    false
}

fn handle_admin_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if !view_data.admin.auth.is_authenticated() {
        handle_login_key(state, runtime, view_data, tx, key);
        return false;
    }
    if view_data.admin.editing_urls {
        handle_url_edit_key(state, runtime, view_data, tx, key);
        return false;
    }

    let selected = view_data.admin.selected_id();
    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Esc => dispatch_app(state, runtime, view_data, tx, AppCommand::BackToMenu),
        KeyCode::Char('t') => dispatch_app(state, runtime, view_data, tx, AppCommand::ToggleLanguage),
        KeyCode::Down | KeyCode::Char('j') => {
            let len = view_data.admin.editor.rows().len();
            view_data.admin.cursor = move_cursor(view_data.admin.cursor, 1, len);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            let len = view_data.admin.editor.rows().len();
            view_data.admin.cursor = move_cursor(view_data.admin.cursor, -1, len);
        }
        KeyCode::Char(' ') => {
            if let Some(id) = selected {
                let current = view_data
                    .admin
                    .editor
                    .buffer(&id)
                    .map(|buffer| buffer.is_available);
                if let Some(current) = current {
                    dispatch_admin(
                        state,
                        runtime,
                        view_data,
                        tx,
                        AdminAction::ToggleStarted { id, value: !current },
                    );
                }
            }
        }
        KeyCode::Enter | KeyCode::Char('e') => {
            if selected.is_some() {
                view_data.admin.editing_urls = true;
            }
        }
        KeyCode::Char('s') => {
            let Some(id) = selected else {
                return false;
            };
            if view_data.admin.editor.is_saving(&id) {
                emit_status(state, view_data, tx, "save already in progress");
            } else if !view_data.admin.editor.can_save(&id) {
                emit_status(state, view_data, tx, "nothing to save");
            } else {
                dispatch_admin(state, runtime, view_data, tx, AdminAction::SaveStarted { id });
            }
        }
        KeyCode::Char('r') => {
            request_admin_rows(runtime, view_data, tx);
            emit_status(state, view_data, tx, "refreshing rows");
        }
        KeyCode::Char('o') => {
            let service = runtime.service();
            spawn_request(
                tx,
                move || service.sign_out(),
                |result| InternalEvent::SignOutFinished { result },
            );
        }
        _ => {}
    }
    false
}

fn handle_url_edit_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(id) = view_data.admin.selected_id() else {
        view_data.admin.editing_urls = false;
        return;
    };
    let Some(mut value) = view_data
        .admin
        .editor
        .buffer(&id)
        .map(|buffer| buffer.image_urls.clone())
    else {
        view_data.admin.editing_urls = false;
        return;
    };

    match key.code {
        KeyCode::Esc | KeyCode::Enter => {
            view_data.admin.editing_urls = false;
            return;
        }
        KeyCode::Backspace => {
            value.pop();
        }
        KeyCode::Char(ch) => value.push(ch),
        _ => return,
    }
    dispatch_admin(
        state,
        runtime,
        view_data,
        tx,
        AdminAction::EditField {
            id,
            field: AdminField::ImageUrls(value),
        },
    );
}

fn handle_login_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let login = &mut view_data.admin.login;
    match key.code {
        KeyCode::Esc => dispatch_app(state, runtime, view_data, tx, AppCommand::BackToMenu),
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
            login.focus = login.focus.next();
        }
        KeyCode::Backspace => login.pop_char(),
        KeyCode::Char(ch) => login.push_char(ch),
        KeyCode::Enter => {
            let Some((email, password)) = login.begin_submit() else {
                return;
            };
            let generation = view_data.admin.generation;
            let service = runtime.service();
            spawn_request(
                tx,
                move || service.sign_in(&email, &password).map(|_| ()),
                move |result| InternalEvent::SignInFinished { generation, result },
            );
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_header(frame, layout[0], state, view_data);
    match &state.view {
        View::Menu => render_menu(frame, layout[1], state, view_data),
        View::Detail(_) => render_detail(frame, layout[1], state, view_data),
        View::Admin => render_admin(frame, layout[1], view_data),
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn app_title(language: Language) -> String {
    let marker = match language {
        Language::En => "EN",
        Language::Cn => "中文",
    };
    format!("{} [{marker}]", language.pick("Peacock Menu", "孔雀菜单"))
}

fn render_header(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let block = Block::default()
        .title(app_title(state.language))
        .borders(Borders::ALL);
    if state.view != View::Menu {
        let crumb = match &state.view {
            View::Detail(_) => state.language.pick("Menu > Item", "菜单 > 菜品"),
            _ => "Admin",
        };
        frame.render_widget(Paragraph::new(crumb).block(block), area);
        return;
    }

    let categories = view_data.catalog.categories();
    let selected = categories
        .iter()
        .position(|category| category.en == view_data.catalog.selected_category())
        .unwrap_or(0);
    let titles = categories
        .iter()
        .map(|category| category.label(state.language).to_owned())
        .collect::<Vec<_>>();
    let tabs = Tabs::new(titles)
        .block(block)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
        .select(selected);
    frame.render_widget(tabs, area);
}

fn menu_row_cells(item: &MenuItem, carousel: &Carousel, language: Language) -> [String; 5] {
    let image = if carousel.len() > 1 {
        format!("◀ {}/{} ▶", carousel.index() + 1, carousel.len())
    } else {
        format!("{}/{}", carousel.index() + 1, carousel.len().max(1))
    };
    [
        item.name(language).to_owned(),
        item.alternate_name(language).to_owned(),
        item.category(language).to_owned(),
        image,
        format_price(item.price_pence),
    ]
}

fn search_line(state: &AppState, view_data: &ViewData) -> String {
    let label = state.language.pick("search", "搜索");
    let cursor = if view_data.search_active { "▏" } else { "" };
    format!("{label}: {}{cursor}", view_data.catalog.query())
}

/// First row to draw so that `cursor` stays inside a window of `height` rows.
fn scroll_offset(cursor: usize, height: usize) -> usize {
    if height == 0 {
        return cursor;
    }
    cursor.saturating_sub(height - 1)
}

fn render_menu(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(1)])
        .split(area);

    let search = Paragraph::new(search_line(state, view_data))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(search, parts[0]);

    let visible = view_data.catalog.visible();
    if visible.is_empty() {
        let message = if view_data.catalog.is_loaded() {
            empty_state_message(state.language, view_data.catalog.query())
        } else {
            state.language.pick("Loading...", "加载中...")
        };
        let empty = Paragraph::new(message).block(Block::default().borders(Borders::ALL));
        frame.render_widget(empty, parts[1]);
        return;
    }

    let height = usize::from(parts[1].height.saturating_sub(3));
    let offset = scroll_offset(view_data.menu_cursor, height);
    let rows = visible
        .iter()
        .enumerate()
        .skip(offset)
        .map(|(index, item)| {
            let style = if index == view_data.menu_cursor {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let carousel = card_carousel(view_data, item);
            Row::new(menu_row_cells(item, &carousel, state.language).map(Cell::from)).style(style)
        });
    let header = Row::new(
        [
            state.language.pick("Name", "名称"),
            "",
            state.language.pick("Category", "类别"),
            state.language.pick("Image", "图片"),
            state.language.pick("Price", "价格"),
        ]
        .map(|label| {
            Cell::from(label).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        }),
    );
    let widths = [
        Constraint::Percentage(30),
        Constraint::Percentage(26),
        Constraint::Percentage(18),
        Constraint::Percentage(14),
        Constraint::Percentage(12),
    ];
    let title = format!("{} / {}", visible.len(), view_data.catalog.items().len());
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, parts[1]);
}

fn render_detail(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState, view_data: &ViewData) {
    let lines = view_data
        .detail
        .as_ref()
        .map(|detail| detail.render_lines(state.language))
        .unwrap_or_default();
    let body = Paragraph::new(lines.join("\n"))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(body, area);
}

fn login_text(login: &LoginFormInput) -> String {
    let marker = |field: LoginField| if login.focus == field { ">" } else { " " };
    let mut lines = vec![
        "Admin sign in".to_owned(),
        String::new(),
        format!("{} email:    {}", marker(LoginField::Email), login.email),
        format!(
            "{} password: {}",
            marker(LoginField::Password),
            login.masked_password()
        ),
        String::new(),
    ];
    if login.submitting {
        lines.push("signing in...".to_owned());
    } else if let Some(error) = &login.error {
        lines.push(format!("error: {error}"));
    }
    lines.join("\n")
}

fn admin_status_label(editor: &AdminEditor, id: &MenuItemId) -> String {
    if editor.is_saving(id) {
        return "saving...".to_owned();
    }
    if editor.is_toggling(id) {
        return "updating...".to_owned();
    }
    if let Some(status) = editor.status(id) {
        return match &status.kind {
            RowStatusKind::Saved => "saved".to_owned(),
            RowStatusKind::Failed(error) => format!("error: {error}"),
        };
    }
    if editor.is_dirty(id) {
        return "unsaved (s to save)".to_owned();
    }
    String::new()
}

fn admin_row_cells(editor: &AdminEditor, row: &MenuRow, editing: bool) -> [String; 5] {
    let buffer = editor.buffer(&row.id);
    let available = buffer.map_or(row.is_available, |buffer| buffer.is_available);
    let mut urls = buffer
        .map(|buffer| buffer.image_urls.clone())
        .unwrap_or_else(|| serialize_image_urls(row.image_list()));
    if editing {
        urls.push('▏');
    }
    [
        format!("{} / {}", row.name_en, row.name_cn),
        row.category_en.clone(),
        if available { "[x]" } else { "[ ]" }.to_owned(),
        urls,
        admin_status_label(editor, &row.id),
    ]
}

fn render_admin(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let admin = &view_data.admin;
    if !admin.auth.is_authenticated() {
        let form_area = centered_rect(60, 50, area);
        let form = Paragraph::new(login_text(&admin.login))
            .block(Block::default().title("admin").borders(Borders::ALL));
        frame.render_widget(form, form_area);
        return;
    }

    let title = match admin.auth.session() {
        Some(session) if admin.loading => format!("admin: {} (loading)", session.email),
        Some(session) => format!("admin: {}", session.email),
        None => "admin".to_owned(),
    };
    let height = usize::from(area.height.saturating_sub(3));
    let offset = scroll_offset(admin.cursor, height);
    let rows = admin
        .editor
        .rows()
        .iter()
        .enumerate()
        .skip(offset)
        .map(|(index, row)| {
            let selected = index == admin.cursor;
            let cells = admin_row_cells(&admin.editor, row, selected && admin.editing_urls);
            let style = if selected {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            Row::new(cells.map(Cell::from)).style(style)
        });
    let header = Row::new(
        ["Name", "Category", "Available", "Image URLs", "Status"].map(|label| {
            Cell::from(label).style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
        }),
    );
    let widths = [
        Constraint::Percentage(25),
        Constraint::Percentage(15),
        Constraint::Length(9),
        Constraint::Percentage(35),
        Constraint::Percentage(20),
    ];
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    let hints = match &state.view {
        View::Menu if view_data.search_active => "type to search | enter/esc done",
        View::Menu => {
            "j/k move | h/l image | tab/shift+tab category | / search | enter open | t EN/中文 | a admin | r reload | ? help | q quit"
        }
        View::Detail(_) => "h/l image | 1-9 jump | t EN/中文 | esc back | q quit",
        View::Admin if !view_data.admin.auth.is_authenticated() => {
            "tab field | enter sign in | esc back | ctrl+q quit"
        }
        View::Admin if view_data.admin.editing_urls => {
            "type image URLs, comma separated | enter/esc done"
        }
        View::Admin => {
            "j/k move | space toggle | e edit URLs | s save | r refresh | o logout | esc back"
        }
    };
    match &state.status_line {
        Some(status) => format!("{status} | {hints}"),
        None => hints.to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "menu\n  tab / shift+tab   next / previous category\n  /                 search names and ingredients\n  h / l             previous / next image of the selected card\n  enter             open item\n  t                 switch English / 中文\n  a                 admin panel\n\nitem\n  h / l             previous / next image\n  1-9               jump to image\n  esc               back to menu\n\nadmin\n  space             toggle availability (saved immediately)\n  e                 edit image URLs\n  s                 save row\n  o                 logout\n\nctrl+q quits from anywhere; esc or ? closes this help"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
