// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Language, MenuItemId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Menu,
    Detail(MenuItemId),
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    pub view: View,
    pub language: Language,
    pub status_line: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    ToggleLanguage,
    SetLanguage(Language),
    OpenDetail(MenuItemId),
    BackToMenu,
    OpenAdmin,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// Emitted whenever the language actually changes; the runtime persists it.
    LanguageChanged(Language),
    ViewChanged(View),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn with_language(language: Language) -> Self {
        Self {
            language,
            ..Self::default()
        }
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::ToggleLanguage => self.change_language(self.language.toggled()),
            AppCommand::SetLanguage(language) => {
                if language == self.language {
                    return Vec::new();
                }
                self.change_language(language)
            }
            AppCommand::OpenDetail(id) => self.navigate(View::Detail(id)),
            AppCommand::BackToMenu => self.navigate(View::Menu),
            AppCommand::OpenAdmin => self.navigate(View::Admin),
            AppCommand::SetStatus(message) => {
                self.status_line = Some(message.clone());
                vec![AppEvent::StatusUpdated(message)]
            }
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn change_language(&mut self, language: Language) -> Vec<AppEvent> {
        self.language = language;
        vec![AppEvent::LanguageChanged(language)]
    }

    fn navigate(&mut self, view: View) -> Vec<AppEvent> {
        if self.view == view {
            return Vec::new();
        }
        self.view = view.clone();
        vec![AppEvent::ViewChanged(view)]
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState, View};
    use crate::{Language, MenuItemId};

    #[test]
    fn toggle_language_flips_and_reports() {
        let mut state = AppState::default();
        assert_eq!(state.language, Language::En);

        let events = state.dispatch(AppCommand::ToggleLanguage);
        assert_eq!(state.language, Language::Cn);
        assert_eq!(events, vec![AppEvent::LanguageChanged(Language::Cn)]);

        state.dispatch(AppCommand::ToggleLanguage);
        assert_eq!(state.language, Language::En);
    }

    #[test]
    fn setting_same_language_is_silent() {
        let mut state = AppState::with_language(Language::Cn);
        assert!(state.dispatch(AppCommand::SetLanguage(Language::Cn)).is_empty());
        assert_eq!(
            state.dispatch(AppCommand::SetLanguage(Language::En)),
            vec![AppEvent::LanguageChanged(Language::En)]
        );
    }

    #[test]
    fn navigation_round_trip() {
        let mut state = AppState::default();
        let id = MenuItemId::new("m1");

        let events = state.dispatch(AppCommand::OpenDetail(id.clone()));
        assert_eq!(events, vec![AppEvent::ViewChanged(View::Detail(id))]);

        state.dispatch(AppCommand::BackToMenu);
        assert_eq!(state.view, View::Menu);
        assert!(state.dispatch(AppCommand::BackToMenu).is_empty());

        state.dispatch(AppCommand::OpenAdmin);
        assert_eq!(state.view, View::Admin);
    }

    #[test]
    fn status_line_set_and_cleared() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SetStatus("menu loaded".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("menu loaded"));
        assert_eq!(
            state.dispatch(AppCommand::ClearStatus),
            vec![AppEvent::StatusCleared]
        );
        assert_eq!(state.status_line, None);
    }
}
