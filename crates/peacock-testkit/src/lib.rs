// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use peacock_app::{
    AuthState, ItemPatch, MenuItemId, MenuRow, MenuService, Session, SessionHub,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

pub const FIXTURE_ADMIN_EMAIL: &str = "owner@example.com";
pub const FIXTURE_ADMIN_PASSWORD: &str = "correct horse";

const CATEGORIES: [(&str, &str); 8] = [
    ("Appetisers", "开胃菜"),
    ("BBQ", "烧味"),
    ("DimSum", "点心"),
    ("Soup", "汤"),
    ("Meat", "肉类"),
    ("Rice & Noodles", "饭面"),
    ("Desserts", "甜品"),
    ("House Specials", "招牌菜"),
];

const DISH_WORDS: [(&str, &str); 12] = [
    ("Crispy", "脆"),
    ("Braised", "红烧"),
    ("Steamed", "蒸"),
    ("Garlic", "蒜蓉"),
    ("Ginger", "姜"),
    ("Pepper", "椒盐"),
    ("Honey", "蜜汁"),
    ("Chilli", "辣"),
    ("Sesame", "芝麻"),
    ("Black Bean", "豉汁"),
    ("Lemon", "柠檬"),
    ("Scallion", "葱油"),
];

const MAINS: [(&str, &str); 10] = [
    ("Chicken", "鸡"),
    ("Beef", "牛肉"),
    ("Pork", "猪肉"),
    ("Prawns", "虾"),
    ("Sea Bass", "鲈鱼"),
    ("Tofu", "豆腐"),
    ("Aubergine", "茄子"),
    ("Duck", "鸭"),
    ("Squid", "鱿鱼"),
    ("Pak Choi", "白菜"),
];

const INGREDIENTS: [&str; 12] = [
    "garlic",
    "ginger",
    "spring onion",
    "soy sauce",
    "rice wine",
    "star anise",
    "chilli",
    "sesame oil",
    "oyster sauce",
    "black bean",
    "lemon",
    "honey",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator of plausible menu rows.
#[derive(Debug, Clone)]
pub struct MenuFaker {
    rng: DeterministicRng,
    next_id: usize,
}

impl MenuFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 0,
        }
    }

    pub fn row(&mut self) -> MenuRow {
        let (category_en, category_cn) = CATEGORIES[self.rng.int_n(CATEGORIES.len())];
        self.row_in(category_en, category_cn)
    }

    pub fn row_in(&mut self, category_en: &str, category_cn: &str) -> MenuRow {
        self.next_id += 1;
        let (word_en, word_cn) = DISH_WORDS[self.rng.int_n(DISH_WORDS.len())];
        let (main_en, main_cn) = MAINS[self.rng.int_n(MAINS.len())];
        let pence = 350 + self.rng.int_n(3_000);
        let image_count = self.rng.int_n(4);
        let images = (0..image_count)
            .map(|index| format!("/images/item-{}-{index}.jpg", self.next_id))
            .collect::<Vec<_>>();
        let ingredients = self.rng.bool().then(|| self.ingredient_list());

        MenuRow {
            id: MenuItemId::new(format!("item-{}", self.next_id)),
            category_en: category_en.to_owned(),
            category_cn: category_cn.to_owned(),
            name_en: format!("{word_en} {main_en}"),
            name_cn: format!("{word_cn}{main_cn}"),
            price: pence as f64 / 100.0,
            image_urls: (!images.is_empty()).then_some(images),
            ingredients_en: ingredients.clone(),
            ingredients_cn: ingredients.map(|_| format!("{word_cn}, {main_cn}")),
            is_available: self.rng.int_n(5) != 0,
            display_order: i32::try_from(self.next_id).unwrap_or(i32::MAX),
        }
    }

    pub fn menu(&mut self, count: usize) -> Vec<MenuRow> {
        (0..count).map(|_| self.row()).collect()
    }

    fn ingredient_list(&mut self) -> String {
        let count = 2 + self.rng.int_n(3);
        (0..count)
            .map(|_| INGREDIENTS[self.rng.int_n(INGREDIENTS.len())])
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Three rows in two categories; the last has no ingredients and no images.
pub fn fixture_rows() -> Vec<MenuRow> {
    vec![
        MenuRow {
            id: MenuItemId::new("soup-1"),
            category_en: "Soup".to_owned(),
            category_cn: "汤".to_owned(),
            name_en: "Wonton Soup".to_owned(),
            name_cn: "云吞汤".to_owned(),
            price: 6.5,
            image_urls: Some(vec!["/images/wonton.jpg".to_owned()]),
            ingredients_en: Some("pork, prawn, chicken broth".to_owned()),
            ingredients_cn: Some("猪肉, 虾, 鸡汤".to_owned()),
            is_available: true,
            display_order: 1,
        },
        MenuRow {
            id: MenuItemId::new("dimsum-1"),
            category_en: "DimSum".to_owned(),
            category_cn: "点心".to_owned(),
            name_en: "Char Siu Bao".to_owned(),
            name_cn: "叉烧包".to_owned(),
            price: 4.8,
            image_urls: Some(vec![
                "/images/bao-1.jpg".to_owned(),
                "/images/bao-2.jpg".to_owned(),
            ]),
            ingredients_en: Some("roast pork, oyster sauce, steamed bun".to_owned()),
            ingredients_cn: Some("叉烧, 蚝油, 包子".to_owned()),
            is_available: true,
            display_order: 2,
        },
        MenuRow {
            id: MenuItemId::new("soup-2"),
            category_en: "Soup".to_owned(),
            category_cn: "汤".to_owned(),
            name_en: "Egg Drop Soup".to_owned(),
            name_cn: "蛋花汤".to_owned(),
            price: 5.0,
            image_urls: None,
            ingredients_en: None,
            ingredients_cn: None,
            is_available: true,
            display_order: 3,
        },
    ]
}

pub fn fixture_session() -> Session {
    Session {
        access_token: "fixture-token".to_owned(),
        refresh_token: None,
        email: FIXTURE_ADMIN_EMAIL.to_owned(),
        expires_at: Some(OffsetDateTime::now_utc() + time::Duration::hours(1)),
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("peacock.db");
    Ok((dir, db_path))
}

#[derive(Debug, Default)]
struct FakeState {
    rows: Vec<MenuRow>,
    session: Option<Session>,
    fail_listing: Option<String>,
    update_failures: VecDeque<String>,
    update_delay: Duration,
    updates: Vec<(MenuItemId, ItemPatch)>,
}

/// Scriptable in-memory [`MenuService`] for exercising callers.
#[derive(Debug, Default)]
pub struct FakeMenuService {
    state: Mutex<FakeState>,
    hub: SessionHub,
}

impl FakeMenuService {
    pub fn new(rows: Vec<MenuRow>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                rows,
                ..FakeState::default()
            }),
            hub: SessionHub::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Makes every list call fail with `message` until cleared with `None`.
    pub fn fail_listing(&self, message: Option<&str>) {
        self.state().fail_listing = message.map(str::to_owned);
    }

    /// Queues a failure for the next update call.
    pub fn fail_next_update(&self, message: &str) {
        self.state().update_failures.push_back(message.to_owned());
    }

    pub fn set_update_delay(&self, delay: Duration) {
        self.state().update_delay = delay;
    }

    /// Installs a session without going through `sign_in`.
    pub fn force_session(&self, session: Option<Session>) {
        self.state().session = session.clone();
        self.hub.publish(&AuthState::from_session(session));
    }

    pub fn updates(&self) -> Vec<(MenuItemId, ItemPatch)> {
        self.state().updates.clone()
    }

    pub fn rows(&self) -> Vec<MenuRow> {
        self.state().rows.clone()
    }

    fn listing(&self, only_available: bool) -> Result<Vec<MenuRow>> {
        let state = self.state();
        if let Some(message) = &state.fail_listing {
            bail!("{message}");
        }
        let mut rows = state
            .rows
            .iter()
            .filter(|row| !only_available || row.is_available)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|row| row.display_order);
        Ok(rows)
    }
}

impl MenuService for FakeMenuService {
    fn list_available_items(&self) -> Result<Vec<MenuRow>> {
        self.listing(true)
    }

    fn get_item_by_id(&self, id: &MenuItemId) -> Result<Option<MenuRow>> {
        let state = self.state();
        if let Some(message) = &state.fail_listing {
            bail!("{message}");
        }
        Ok(state.rows.iter().find(|row| &row.id == id).cloned())
    }

    fn list_all_items(&self) -> Result<Vec<MenuRow>> {
        if self.current_session().is_none() {
            bail!("not signed in");
        }
        self.listing(false)
    }

    fn update_item(&self, id: &MenuItemId, patch: &ItemPatch) -> Result<MenuRow> {
        let delay = self.state().update_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.state();
        state.updates.push((id.clone(), patch.clone()));
        if state.session.is_none() {
            bail!("not signed in");
        }
        if let Some(message) = state.update_failures.pop_front() {
            bail!("{message}");
        }
        let row = state
            .rows
            .iter_mut()
            .find(|row| &row.id == id)
            .ok_or_else(|| anyhow!("menu item {id} not found"))?;
        patch.apply_to(row);
        Ok(row.clone())
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        if email != FIXTURE_ADMIN_EMAIL || password != FIXTURE_ADMIN_PASSWORD {
            bail!("invalid login credentials");
        }
        let session = fixture_session();
        self.force_session(Some(session.clone()));
        Ok(session)
    }

    fn sign_out(&self) -> Result<()> {
        self.force_session(None);
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        self.state().session.clone()
    }

    fn sessions(&self) -> &SessionHub {
        &self.hub
    }
}
