// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;

use crate::{AuthState, ItemPatch, MenuItemId, MenuRow, Session, SessionHub};

/// The hosted data service as the menu and admin screens consume it.
///
/// Implementations are shared across worker threads, so every call takes
/// `&self`.
pub trait MenuService: Send + Sync {
    /// Available rows, ascending by display order. Public read.
    fn list_available_items(&self) -> Result<Vec<MenuRow>>;

    fn get_item_by_id(&self, id: &MenuItemId) -> Result<Option<MenuRow>>;

    /// Every row including unavailable ones. Requires a session.
    fn list_all_items(&self) -> Result<Vec<MenuRow>>;

    /// Partial update; returns the full updated row. Requires a session.
    fn update_item(&self, id: &MenuItemId, patch: &ItemPatch) -> Result<MenuRow>;

    fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    fn sign_out(&self) -> Result<()>;

    fn current_session(&self) -> Option<Session>;

    fn sessions(&self) -> &SessionHub;

    fn auth_state(&self) -> AuthState {
        AuthState::from_session(self.current_session())
    }
}
