// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::{ItemPatch, MenuItemId, MenuRow};

pub const SAVE_SUCCESS_TTL: Duration = Duration::from_secs(2);
pub const SAVE_ERROR_TTL: Duration = Duration::from_secs(3);

/// Splits a comma-delimited list, trimming pieces and dropping blanks.
pub fn parse_image_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_owned)
        .collect()
}

pub fn serialize_image_urls(urls: &[String]) -> String {
    urls.join(", ")
}

/// Staging copy of a row's editable fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowEdit {
    pub image_urls: String,
    pub is_available: bool,
}

impl RowEdit {
    pub fn from_row(row: &MenuRow) -> Self {
        Self {
            image_urls: serialize_image_urls(row.image_list()),
            is_available: row.is_available,
        }
    }

    fn differs_from(&self, row: &MenuRow) -> bool {
        self.is_available != row.is_available
            || parse_image_urls(&self.image_urls).as_slice() != row.image_list()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminField {
    ImageUrls(String),
    Available(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowStatusKind {
    Saved,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowStatus {
    pub kind: RowStatusKind,
    pub token: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdminAction {
    Loaded(Vec<MenuRow>),
    Cleared,
    EditField { id: MenuItemId, field: AdminField },
    SaveStarted { id: MenuItemId },
    SaveSucceeded { id: MenuItemId, row: MenuRow },
    SaveFailed { id: MenuItemId, error: String },
    ToggleStarted { id: MenuItemId, value: bool },
    ToggleSucceeded { id: MenuItemId, row: MenuRow },
    ToggleFailed { id: MenuItemId, previous: bool, error: String },
    ClearStatus { id: MenuItemId, token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminEvent {
    RowsReplaced(usize),
    RowsCleared,
    BufferChanged(MenuItemId),
    /// The caller must send `patch` for `id` and report back with
    /// `SaveSucceeded` or `SaveFailed`.
    SaveRequested { id: MenuItemId, patch: ItemPatch },
    /// The caller must send `patch` for `id` and report back with
    /// `ToggleSucceeded` or `ToggleFailed { previous }`.
    ToggleRequested {
        id: MenuItemId,
        patch: ItemPatch,
        previous: bool,
    },
    /// The caller must dispatch `ClearStatus { id, token }` after `after`.
    ScheduleStatusClear {
        id: MenuItemId,
        token: u64,
        after: Duration,
    },
    StatusCleared(MenuItemId),
    Rejected { id: MenuItemId, reason: String },
}

/// Per-row admin state: persisted snapshots, edit buffers, in-flight flags and
/// transient statuses, all keyed by row id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminEditor {
    rows: Vec<MenuRow>,
    buffers: BTreeMap<MenuItemId, RowEdit>,
    saving: BTreeSet<MenuItemId>,
    toggling: BTreeMap<MenuItemId, usize>,
    statuses: BTreeMap<MenuItemId, RowStatus>,
    next_token: u64,
}

impl AdminEditor {
    pub fn dispatch(&mut self, action: AdminAction) -> Vec<AdminEvent> {
        match action {
            AdminAction::Loaded(rows) => self.load(rows),
            AdminAction::Cleared => {
                self.rows.clear();
                self.buffers.clear();
                self.saving.clear();
                self.toggling.clear();
                self.statuses.clear();
                vec![AdminEvent::RowsCleared]
            }
            AdminAction::EditField { id, field } => {
                let Some(buffer) = self.buffers.get_mut(&id) else {
                    return Vec::new();
                };
                match field {
                    AdminField::ImageUrls(value) => buffer.image_urls = value,
                    AdminField::Available(value) => buffer.is_available = value,
                }
                vec![AdminEvent::BufferChanged(id)]
            }
            AdminAction::SaveStarted { id } => self.start_save(id),
            AdminAction::SaveSucceeded { id, row } => {
                self.saving.remove(&id);
                if let Some(buffer) = self.buffers.get_mut(&id) {
                    *buffer = RowEdit::from_row(&row);
                }
                self.reconcile(&id, row);
                vec![
                    AdminEvent::BufferChanged(id.clone()),
                    self.set_status(id, RowStatusKind::Saved, SAVE_SUCCESS_TTL),
                ]
            }
            AdminAction::SaveFailed { id, error } => {
                tracing::warn!(%id, %error, "saving menu row failed");
                self.saving.remove(&id);
                vec![self.set_status(id, RowStatusKind::Failed(error), SAVE_ERROR_TTL)]
            }
            AdminAction::ToggleStarted { id, value } => {
                let Some(buffer) = self.buffers.get_mut(&id) else {
                    return vec![AdminEvent::Rejected {
                        id,
                        reason: "row is not loaded".to_owned(),
                    }];
                };
                let previous = buffer.is_available;
                buffer.is_available = value;
                *self.toggling.entry(id.clone()).or_default() += 1;
                vec![
                    AdminEvent::BufferChanged(id.clone()),
                    AdminEvent::ToggleRequested {
                        id,
                        patch: ItemPatch::availability(value),
                        previous,
                    },
                ]
            }
            AdminAction::ToggleSucceeded { id, row } => {
                self.finish_toggle(&id);
                self.reconcile(&id, row);
                vec![self.set_status(id, RowStatusKind::Saved, SAVE_SUCCESS_TTL)]
            }
            AdminAction::ToggleFailed {
                id,
                previous,
                error,
            } => {
                tracing::warn!(%id, %error, "toggling availability failed");
                self.finish_toggle(&id);
                if let Some(buffer) = self.buffers.get_mut(&id) {
                    buffer.is_available = previous;
                }
                vec![
                    AdminEvent::BufferChanged(id.clone()),
                    self.set_status(id, RowStatusKind::Failed(error), SAVE_ERROR_TTL),
                ]
            }
            AdminAction::ClearStatus { id, token } => {
                let current = self.statuses.get(&id).map(|status| status.token);
                if current != Some(token) {
                    return Vec::new();
                }
                self.statuses.remove(&id);
                vec![AdminEvent::StatusCleared(id)]
            }
        }
    }

    fn load(&mut self, rows: Vec<MenuRow>) -> Vec<AdminEvent> {
        self.buffers = rows
            .iter()
            .map(|row| (row.id.clone(), RowEdit::from_row(row)))
            .collect();
        self.statuses.clear();
        let ids = self.buffers.keys().cloned().collect::<BTreeSet<_>>();
        self.saving.retain(|id| ids.contains(id));
        self.toggling.retain(|id, _| ids.contains(id));
        self.rows = rows;
        vec![AdminEvent::RowsReplaced(self.rows.len())]
    }

    fn start_save(&mut self, id: MenuItemId) -> Vec<AdminEvent> {
        let Some(buffer) = self.buffers.get(&id) else {
            return vec![AdminEvent::Rejected {
                id,
                reason: "row is not loaded".to_owned(),
            }];
        };
        if self.saving.contains(&id) {
            return vec![AdminEvent::Rejected {
                id,
                reason: "save already in progress".to_owned(),
            }];
        }

        let patch = ItemPatch {
            image_urls: Some(parse_image_urls(&buffer.image_urls)),
            is_available: Some(buffer.is_available),
        };
        self.saving.insert(id.clone());
        vec![AdminEvent::SaveRequested { id, patch }]
    }

    fn finish_toggle(&mut self, id: &MenuItemId) {
        if let Some(count) = self.toggling.get_mut(id) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.toggling.remove(id);
            }
        }
    }

    fn reconcile(&mut self, id: &MenuItemId, row: MenuRow) {
        match self.rows.iter_mut().find(|existing| &existing.id == id) {
            Some(existing) => *existing = row,
            None => tracing::debug!(%id, "update returned a row that is no longer loaded"),
        }
    }

    fn set_status(&mut self, id: MenuItemId, kind: RowStatusKind, after: Duration) -> AdminEvent {
        self.next_token = self.next_token.saturating_add(1);
        let token = self.next_token;
        self.statuses.insert(id.clone(), RowStatus { kind, token });
        AdminEvent::ScheduleStatusClear { id, token, after }
    }

    pub fn rows(&self) -> &[MenuRow] {
        &self.rows
    }

    pub fn row(&self, id: &MenuItemId) -> Option<&MenuRow> {
        self.rows.iter().find(|row| &row.id == id)
    }

    pub fn buffer(&self, id: &MenuItemId) -> Option<&RowEdit> {
        self.buffers.get(id)
    }

    pub fn status(&self, id: &MenuItemId) -> Option<&RowStatus> {
        self.statuses.get(id)
    }

    pub fn is_saving(&self, id: &MenuItemId) -> bool {
        self.saving.contains(id)
    }

    pub fn is_toggling(&self, id: &MenuItemId) -> bool {
        self.toggling.contains_key(id)
    }

    pub fn is_dirty(&self, id: &MenuItemId) -> bool {
        match (self.buffers.get(id), self.row(id)) {
            (Some(buffer), Some(row)) => buffer.differs_from(row),
            _ => false,
        }
    }

    pub fn can_save(&self, id: &MenuItemId) -> bool {
        self.is_dirty(id) && !self.is_saving(id)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AdminAction, AdminEditor, AdminEvent, AdminField, RowStatusKind, SAVE_ERROR_TTL,
        SAVE_SUCCESS_TTL, parse_image_urls, serialize_image_urls,
    };
    use crate::{ItemPatch, MenuItemId, MenuRow};

    fn row(id: &str, images: &[&str], available: bool) -> MenuRow {
        MenuRow {
            id: MenuItemId::new(id),
            category_en: "Meat".to_owned(),
            category_cn: "肉类".to_owned(),
            name_en: format!("Dish {id}"),
            name_cn: format!("菜 {id}"),
            price: 10.0,
            image_urls: Some(images.iter().map(|url| (*url).to_owned()).collect()),
            ingredients_en: None,
            ingredients_cn: None,
            is_available: available,
            display_order: 0,
        }
    }

    fn loaded(rows: Vec<MenuRow>) -> AdminEditor {
        let mut editor = AdminEditor::default();
        editor.dispatch(AdminAction::Loaded(rows));
        editor
    }

    fn edit_urls(editor: &mut AdminEditor, id: &MenuItemId, value: &str) {
        editor.dispatch(AdminAction::EditField {
            id: id.clone(),
            field: AdminField::ImageUrls(value.to_owned()),
        });
    }

    #[test]
    fn parse_trims_and_drops_blank_pieces() {
        assert_eq!(parse_image_urls("a, ,b,"), vec!["a", "b"]);
        assert_eq!(parse_image_urls("a, , b"), vec!["a", "b"]);
        assert!(parse_image_urls("").is_empty());
        assert!(parse_image_urls(" , ").is_empty());
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let list = vec![
            "https://cdn.example/a.jpg".to_owned(),
            "/b.png".to_owned(),
            "c".to_owned(),
        ];
        assert_eq!(parse_image_urls(&serialize_image_urls(&list)), list);
        assert_eq!(parse_image_urls(&serialize_image_urls(&[])), Vec::<String>::new());
    }

    #[test]
    fn load_seeds_buffers_from_rows() {
        let editor = loaded(vec![row("r1", &["a", "b"], false)]);
        let id = MenuItemId::new("r1");
        let buffer = editor.buffer(&id).expect("buffer for loaded row");
        assert_eq!(buffer.image_urls, "a, b");
        assert!(!buffer.is_available);
    }

    #[test]
    fn save_enablement_follows_dirtiness_and_flight() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        assert!(!editor.can_save(&id));

        edit_urls(&mut editor, &id, "a, b");
        assert!(editor.can_save(&id));

        let events = editor.dispatch(AdminAction::SaveStarted { id: id.clone() });
        assert_eq!(
            events,
            vec![AdminEvent::SaveRequested {
                id: id.clone(),
                patch: ItemPatch {
                    image_urls: Some(vec!["a".to_owned(), "b".to_owned()]),
                    is_available: Some(true),
                },
            }]
        );
        assert!(editor.is_saving(&id));
        assert!(!editor.can_save(&id));

        editor.dispatch(AdminAction::SaveSucceeded {
            id: id.clone(),
            row: row("r1", &["a", "b"], true),
        });
        assert!(!editor.is_saving(&id));
        assert!(!editor.can_save(&id));
        let persisted = editor.row(&id).map(MenuRow::image_list).unwrap_or_default();
        assert_eq!(persisted, ["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn whitespace_only_edits_are_not_dirty() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a", "b"], true)]);
        edit_urls(&mut editor, &id, "a,b, ");
        assert!(!editor.is_dirty(&id));
    }

    #[test]
    fn second_save_while_in_flight_is_rejected() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        edit_urls(&mut editor, &id, "b");
        editor.dispatch(AdminAction::SaveStarted { id: id.clone() });

        let events = editor.dispatch(AdminAction::SaveStarted { id: id.clone() });
        assert!(matches!(events.as_slice(), [AdminEvent::Rejected { .. }]));
    }

    #[test]
    fn save_failure_keeps_buffer_for_retry() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        edit_urls(&mut editor, &id, "a, new");
        editor.dispatch(AdminAction::SaveStarted { id: id.clone() });

        let events = editor.dispatch(AdminAction::SaveFailed {
            id: id.clone(),
            error: "network down".to_owned(),
        });

        let token = editor.status(&id).expect("error status").token;
        assert_eq!(
            events,
            vec![AdminEvent::ScheduleStatusClear {
                id: id.clone(),
                token,
                after: SAVE_ERROR_TTL,
            }]
        );
        assert_eq!(
            editor.buffer(&id).map(|buffer| buffer.image_urls.as_str()),
            Some("a, new")
        );
        assert!(editor.can_save(&id));
    }

    #[test]
    fn toggle_failure_reverts_and_status_clears() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], false)]);

        let events = editor.dispatch(AdminAction::ToggleStarted {
            id: id.clone(),
            value: true,
        });
        assert!(events.contains(&AdminEvent::ToggleRequested {
            id: id.clone(),
            patch: ItemPatch::availability(true),
            previous: false,
        }));
        assert_eq!(editor.buffer(&id).map(|b| b.is_available), Some(true));
        assert!(editor.is_toggling(&id));

        editor.dispatch(AdminAction::ToggleFailed {
            id: id.clone(),
            previous: false,
            error: "permission denied".to_owned(),
        });
        assert_eq!(editor.buffer(&id).map(|b| b.is_available), Some(false));
        assert!(!editor.is_toggling(&id));
        let status = editor.status(&id).cloned().expect("error status");
        assert_eq!(
            status.kind,
            RowStatusKind::Failed("permission denied".to_owned())
        );

        let cleared = editor.dispatch(AdminAction::ClearStatus {
            id: id.clone(),
            token: status.token,
        });
        assert_eq!(cleared, vec![AdminEvent::StatusCleared(id.clone())]);
        assert!(editor.status(&id).is_none());
    }

    #[test]
    fn toggle_success_reconciles_snapshot() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], false)]);
        editor.dispatch(AdminAction::ToggleStarted {
            id: id.clone(),
            value: true,
        });
        let events = editor.dispatch(AdminAction::ToggleSucceeded {
            id: id.clone(),
            row: row("r1", &["a"], true),
        });
        assert!(matches!(
            events.as_slice(),
            [AdminEvent::ScheduleStatusClear { after, .. }] if *after == SAVE_SUCCESS_TTL
        ));
        assert_eq!(editor.row(&id).map(|r| r.is_available), Some(true));
        assert!(!editor.is_dirty(&id));
    }

    #[test]
    fn toggle_is_not_blocked_by_pending_text_edit_or_save() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        edit_urls(&mut editor, &id, "a, b");
        editor.dispatch(AdminAction::SaveStarted { id: id.clone() });

        let events = editor.dispatch(AdminAction::ToggleStarted {
            id: id.clone(),
            value: false,
        });
        assert!(
            events
                .iter()
                .any(|event| matches!(event, AdminEvent::ToggleRequested { .. }))
        );
        assert_eq!(
            editor.buffer(&id).map(|b| b.image_urls.as_str()),
            Some("a, b")
        );
    }

    #[test]
    fn stale_clear_token_does_not_remove_newer_status() {
        let id = MenuItemId::new("r1");
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        editor.dispatch(AdminAction::ToggleStarted {
            id: id.clone(),
            value: false,
        });
        editor.dispatch(AdminAction::ToggleSucceeded {
            id: id.clone(),
            row: row("r1", &["a"], false),
        });
        let first = editor.status(&id).expect("first status").token;

        editor.dispatch(AdminAction::ToggleStarted {
            id: id.clone(),
            value: true,
        });
        editor.dispatch(AdminAction::ToggleFailed {
            id: id.clone(),
            previous: false,
            error: "boom".to_owned(),
        });

        assert!(
            editor
                .dispatch(AdminAction::ClearStatus {
                    id: id.clone(),
                    token: first,
                })
                .is_empty()
        );
        assert!(editor.status(&id).is_some());
    }

    #[test]
    fn rows_are_independent() {
        let first = MenuItemId::new("r1");
        let second = MenuItemId::new("r2");
        let mut editor = loaded(vec![row("r1", &["a"], true), row("r2", &["b"], true)]);
        edit_urls(&mut editor, &first, "x");
        edit_urls(&mut editor, &second, "y");
        editor.dispatch(AdminAction::SaveStarted { id: first.clone() });

        assert!(editor.is_saving(&first));
        assert!(editor.can_save(&second));
        let events = editor.dispatch(AdminAction::SaveStarted { id: second.clone() });
        assert!(matches!(events.as_slice(), [AdminEvent::SaveRequested { .. }]));
    }

    #[test]
    fn edits_to_unknown_rows_are_ignored() {
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        let events = editor.dispatch(AdminAction::EditField {
            id: MenuItemId::new("missing"),
            field: AdminField::Available(false),
        });
        assert!(events.is_empty());
    }

    #[test]
    fn clearing_drops_all_row_state() {
        let mut editor = loaded(vec![row("r1", &["a"], true)]);
        let events = editor.dispatch(AdminAction::Cleared);
        assert_eq!(events, vec![AdminEvent::RowsCleared]);
        assert!(editor.rows().is_empty());
        assert!(editor.buffer(&MenuItemId::new("r1")).is_none());
    }
}
