// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Carousel, Language, MenuItem, MenuItemId, MenuRow, format_price};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailView {
    Loading(MenuItemId),
    NotFound,
    Loaded { item: MenuItem, carousel: Carousel },
}

impl DetailView {
    pub fn loading(id: MenuItemId) -> Self {
        Self::Loading(id)
    }

    /// Resolves a lookup result. A row that fails conversion is treated the
    /// same as a missing one.
    pub fn resolve(row: Option<MenuRow>) -> Self {
        let Some(row) = row else {
            return Self::NotFound;
        };
        let id = row.id.clone();
        match MenuItem::from_row(row) {
            Ok(item) => Self::from_item(item),
            Err(error) => {
                tracing::warn!(%id, %error, "menu item cannot be displayed");
                Self::NotFound
            }
        }
    }

    pub fn from_item(item: MenuItem) -> Self {
        let carousel = Carousel::new(item.images.len());
        Self::Loaded { item, carousel }
    }

    pub fn carousel_mut(&mut self) -> Option<&mut Carousel> {
        match self {
            Self::Loaded { carousel, .. } => Some(carousel),
            Self::Loading(_) | Self::NotFound => None,
        }
    }

    pub fn render_lines(&self, language: Language) -> Vec<String> {
        match self {
            Self::Loading(_) => vec![language.pick("Loading...", "加载中...").to_owned()],
            Self::NotFound => vec![
                language.pick("Product not found", "未找到产品").to_owned(),
                String::new(),
                language
                    .pick("esc: Back to Menu", "esc: 返回菜单")
                    .to_owned(),
            ],
            Self::Loaded { item, carousel } => render_item(item, carousel, language),
        }
    }
}

fn render_item(item: &MenuItem, carousel: &Carousel, language: Language) -> Vec<String> {
    let mut lines = vec![format!("[{}]", item.category(language)), item.name(language).to_owned()];
    let alternate = item.alternate_name(language);
    if !alternate.is_empty() {
        lines.push(alternate.to_owned());
    }
    lines.push(format_price(item.price_pence));
    lines.push(String::new());

    let image = carousel.current(&item.images).unwrap_or_default();
    lines.push(format!(
        "{} {}/{}: {}",
        language.pick("image", "图片"),
        carousel.index() + 1,
        carousel.len(),
        image
    ));
    if carousel.len() > 1 {
        let dots = (0..carousel.len())
            .map(|index| if index == carousel.index() { "●" } else { "○" })
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(dots);
    }

    if item.has_description() {
        lines.push(String::new());
        lines.push(language.pick("Description", "描述").to_owned());
        lines.push(item.ingredients(language).to_owned());
    }

    lines.push(String::new());
    lines.push(format!(
        "{}: {}",
        language.pick("Category", "类别"),
        item.category(language)
    ));
    lines.push(format!(
        "{}: {}",
        language.pick("Price", "价格"),
        format_price(item.price_pence)
    ));
    lines
}

#[cfg(test)]
mod tests {
    use super::DetailView;
    use crate::{Language, MenuItemId, MenuRow};

    fn row(images: Option<Vec<&str>>) -> MenuRow {
        MenuRow {
            id: MenuItemId::new("d1"),
            category_en: "Desserts".to_owned(),
            category_cn: "甜品".to_owned(),
            name_en: "Mango Pudding".to_owned(),
            name_cn: "芒果布丁".to_owned(),
            price: 5.0,
            image_urls: images.map(|list| list.into_iter().map(str::to_owned).collect()),
            ingredients_en: None,
            ingredients_cn: None,
            is_available: true,
            display_order: 4,
        }
    }

    #[test]
    fn missing_row_resolves_to_not_found() {
        let view = DetailView::resolve(None);
        assert_eq!(view, DetailView::NotFound);
        assert_eq!(view.render_lines(Language::En)[0], "Product not found");
    }

    #[test]
    fn carousel_advances_through_images() {
        let mut view = DetailView::resolve(Some(row(Some(vec!["/a.jpg", "/b.jpg"]))));
        let carousel = view.carousel_mut().expect("loaded view has a carousel");
        carousel.next();
        let lines = view.render_lines(Language::En);
        assert!(lines.iter().any(|line| line == "image 2/2: /b.jpg"));
        assert!(lines.iter().any(|line| line == "○ ●"));
    }

    #[test]
    fn description_is_hidden_without_ingredients() {
        let view = DetailView::resolve(Some(row(None)));
        let lines = view.render_lines(Language::Cn);
        assert_eq!(lines[1], "芒果布丁");
        assert_eq!(lines[2], "Mango Pudding");
        assert!(!lines.iter().any(|line| line == "描述"));
        assert!(lines.iter().any(|line| line == "图片 1/1: /placeholder.svg"));
    }
}
