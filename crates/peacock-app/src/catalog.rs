// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::{Category, Language, MenuItem, MenuRow};

/// Display order for known categories. Anything not listed sorts after these,
/// alphabetically by English label.
pub const CATEGORY_ORDER: [&str; 15] = [
    "All",
    "Appetisers",
    "BBQ",
    "DimSum",
    "Cold-dressed",
    "Soup",
    "Meat",
    "Superior Luxurious",
    "Emperor's Seafood",
    "Global Seafood",
    "Tofu & Vegetables",
    "Rice & Noodles",
    "Desserts",
    "Beverages",
    "Other",
];

fn preference_rank(category_en: &str) -> Option<usize> {
    CATEGORY_ORDER.iter().position(|name| *name == category_en)
}

fn compare_categories(a: &Category, b: &Category) -> Ordering {
    match (preference_rank(&a.en), preference_rank(&b.en)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.en.cmp(&b.en),
    }
}

/// Distinct categories in display order, with the synthetic `All` entry first.
pub fn derive_categories(items: &[MenuItem]) -> Vec<Category> {
    let mut seen = BTreeSet::new();
    let mut unique = Vec::new();
    for item in items {
        if seen.insert(item.category_en.as_str()) {
            unique.push(Category::new(&item.category_en, &item.category_cn));
        }
    }
    unique.sort_by(compare_categories);

    let mut categories = Vec::with_capacity(unique.len() + 1);
    categories.push(Category::all());
    categories.extend(unique);
    categories
}

fn matches_category(item: &MenuItem, category: &str) -> bool {
    category == Category::ALL_EN || item.category_en == category
}

fn matches_query(item: &MenuItem, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let folded = query.to_lowercase();
    item.name_en.to_lowercase().contains(&folded)
        || item.name_cn.contains(query)
        || item.ingredients_en.to_lowercase().contains(&folded)
        || item.ingredients_cn.contains(query)
}

/// Items in `category` matching `query`, in source order.
///
/// English fields match case-insensitively; Chinese fields are compared
/// as-is.
pub fn filter_items<'a>(items: &'a [MenuItem], category: &str, query: &str) -> Vec<&'a MenuItem> {
    items
        .iter()
        .filter(|item| matches_category(item, category) && matches_query(item, query))
        .collect()
}

/// Converts fetched rows, skipping any that cannot be displayed.
pub fn items_from_rows(rows: Vec<MenuRow>) -> Vec<MenuItem> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match MenuItem::from_row(row) {
                Ok(item) => Some(item),
                Err(error) => {
                    tracing::warn!(%id, %error, "skipping menu row");
                    None
                }
            }
        })
        .collect()
}

pub fn empty_state_message(language: Language, query: &str) -> &'static str {
    match (language, query.is_empty()) {
        (Language::En, false) => "No items match your search",
        (Language::En, true) => "No items found in this category",
        (Language::Cn, false) => "没有找到匹配的菜品",
        (Language::Cn, true) => "此类别中没有项目",
    }
}

/// Loaded menu plus the live filter inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    items: Vec<MenuItem>,
    categories: Vec<Category>,
    selected_category: String,
    query: String,
    loaded: bool,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            categories: vec![Category::all()],
            selected_category: Category::ALL_EN.to_owned(),
            query: String::new(),
            loaded: false,
        }
    }
}

impl Catalog {
    /// Swaps in a freshly fetched collection and recomputes the categories.
    pub fn replace_items(&mut self, items: Vec<MenuItem>) {
        self.categories = derive_categories(&items);
        self.items = items;
        self.loaded = true;
        if !self
            .categories
            .iter()
            .any(|category| category.en == self.selected_category)
        {
            self.selected_category = Category::ALL_EN.to_owned();
        }
    }

    pub fn replace_rows(&mut self, rows: Vec<MenuRow>) {
        self.replace_items(items_from_rows(rows));
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn selected_category(&self) -> &str {
        &self.selected_category
    }

    pub fn select_category(&mut self, category_en: &str) {
        self.selected_category = category_en.to_owned();
    }

    /// Moves the category selection by `delta`, wrapping at both ends.
    pub fn cycle_category(&mut self, delta: isize) {
        let len = self.categories.len() as isize;
        if len == 0 {
            return;
        }
        let current = self
            .categories
            .iter()
            .position(|category| category.en == self.selected_category)
            .unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.selected_category = self.categories[next].en.clone();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    pub fn push_query_char(&mut self, ch: char) {
        self.query.push(ch);
    }

    pub fn pop_query_char(&mut self) {
        self.query.pop();
    }

    pub fn visible(&self) -> Vec<&MenuItem> {
        filter_items(&self.items, &self.selected_category, &self.query)
    }

    pub fn find(&self, id: &crate::MenuItemId) -> Option<&MenuItem> {
        self.items.iter().find(|item| &item.id == id)
    }
}

/// Cyclic position within an item's image list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Carousel {
    index: usize,
    len: usize,
}

impl Carousel {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn next(&mut self) {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
    }

    pub fn prev(&mut self) {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
    }

    pub fn select(&mut self, index: usize) {
        if self.len > 0 {
            self.index = index.min(self.len - 1);
        }
    }

    pub fn current<'a>(&self, images: &'a [String]) -> Option<&'a str> {
        images.get(self.index).map(String::as_str)
    }
}
