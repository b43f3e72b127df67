// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use peacock_app::{Language, MenuService};
use peacock_db::Store;
use std::sync::Arc;

/// Wires the terminal front end to a data service and the local store.
pub struct StoreRuntime<'a> {
    store: &'a Store,
    service: Arc<dyn MenuService>,
}

impl<'a> StoreRuntime<'a> {
    pub fn new(store: &'a Store, service: Arc<dyn MenuService>) -> Self {
        Self { store, service }
    }
}

impl peacock_tui::AppRuntime for StoreRuntime<'_> {
    fn service(&self) -> Arc<dyn MenuService> {
        Arc::clone(&self.service)
    }

    fn load_language(&mut self) -> Result<Option<Language>> {
        self.store.get_language()
    }

    fn save_language(&mut self, language: Language) -> Result<()> {
        tracing::debug!(language = language.as_str(), "saving language preference");
        self.store.put_language(language)
    }
}
