// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::ids::*;

pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    En,
    Cn,
}

impl Language {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Cn => "cn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "en" => Some(Self::En),
            "cn" => Some(Self::Cn),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Self {
        match self {
            Self::En => Self::Cn,
            Self::Cn => Self::En,
        }
    }

    /// Picks the label for this language out of an en/cn pair.
    pub fn pick<'a>(self, en: &'a str, cn: &'a str) -> &'a str {
        match self {
            Self::En => en,
            Self::Cn => cn,
        }
    }
}

/// A `menu_items` record as the data service returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuRow {
    pub id: MenuItemId,
    pub category_en: String,
    pub category_cn: String,
    pub name_en: String,
    pub name_cn: String,
    pub price: f64,
    #[serde(default)]
    pub image_urls: Option<Vec<String>>,
    #[serde(default)]
    pub ingredients_en: Option<String>,
    #[serde(default)]
    pub ingredients_cn: Option<String>,
    #[serde(default)]
    pub is_available: bool,
    #[serde(default)]
    pub display_order: i32,
}

impl MenuRow {
    pub fn image_list(&self) -> &[String] {
        self.image_urls.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: MenuItemId,
    pub category_en: String,
    pub category_cn: String,
    pub name_en: String,
    pub name_cn: String,
    pub price_pence: i64,
    pub images: Vec<String>,
    pub ingredients_en: String,
    pub ingredients_cn: String,
}

impl MenuItem {
    pub fn from_row(row: MenuRow) -> Result<Self> {
        let price_pence = price_to_pence(row.price)?;
        let images = match row.image_urls {
            Some(urls) if !urls.is_empty() => urls,
            _ => vec![PLACEHOLDER_IMAGE.to_owned()],
        };

        Ok(Self {
            id: row.id,
            category_en: row.category_en,
            category_cn: row.category_cn,
            name_en: row.name_en,
            name_cn: row.name_cn,
            price_pence,
            images,
            ingredients_en: row.ingredients_en.unwrap_or_default(),
            ingredients_cn: row.ingredients_cn.unwrap_or_default(),
        })
    }

    pub fn name(&self, language: Language) -> &str {
        language.pick(&self.name_en, &self.name_cn)
    }

    /// The name in the language not currently shown, used as a subtitle.
    pub fn alternate_name(&self, language: Language) -> &str {
        language.toggled().pick(&self.name_en, &self.name_cn)
    }

    pub fn category(&self, language: Language) -> &str {
        language.pick(&self.category_en, &self.category_cn)
    }

    pub fn ingredients(&self, language: Language) -> &str {
        language.pick(&self.ingredients_en, &self.ingredients_cn)
    }

    pub fn has_description(&self) -> bool {
        !self.ingredients_en.is_empty() || !self.ingredients_cn.is_empty()
    }
}

fn price_to_pence(price: f64) -> Result<i64> {
    if !price.is_finite() {
        bail!("price {price} is not a finite number");
    }
    if price < 0.0 {
        bail!("price {price} is negative");
    }
    Ok((price * 100.0).round() as i64)
}

pub fn format_price(pence: i64) -> String {
    format!("£{}.{:02}", pence / 100, pence % 100)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub en: String,
    pub cn: String,
}

impl Category {
    pub const ALL_EN: &'static str = "All";
    pub const ALL_CN: &'static str = "全部";

    pub fn new(en: impl Into<String>, cn: impl Into<String>) -> Self {
        Self {
            en: en.into(),
            cn: cn.into(),
        }
    }

    pub fn all() -> Self {
        Self::new(Self::ALL_EN, Self::ALL_CN)
    }

    pub fn label(&self, language: Language) -> &str {
        language.pick(&self.en, &self.cn)
    }
}

/// Partial update for a single row. Absent fields are left untouched by the
/// service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
}

impl ItemPatch {
    pub fn availability(value: bool) -> Self {
        Self {
            image_urls: None,
            is_available: Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.image_urls.is_none() && self.is_available.is_none()
    }

    pub fn apply_to(&self, row: &mut MenuRow) {
        if let Some(urls) = &self.image_urls {
            row.image_urls = Some(urls.clone());
        }
        if let Some(available) = self.is_available {
            row.is_available = available;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub email: String,
    pub expires_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKey {
    UiLanguage,
}

impl SettingKey {
    pub const ALL: [Self; 1] = [Self::UiLanguage];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UiLanguage => "ui.language",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ui.language" => Some(Self::UiLanguage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingValue {
    Language(Language),
}

impl SettingValue {
    pub fn parse_for_key(key: SettingKey, raw: &str) -> Option<Self> {
        match key {
            SettingKey::UiLanguage => Language::parse(raw.trim()).map(Self::Language),
        }
    }

    pub fn to_storage(&self, key: SettingKey) -> Option<String> {
        match (key, self) {
            (SettingKey::UiLanguage, Self::Language(language)) => {
                Some(language.as_str().to_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Category, ItemPatch, Language, MenuItem, MenuRow, PLACEHOLDER_IMAGE, SettingKey,
        SettingValue, format_price,
    };
    use crate::MenuItemId;

    fn row() -> MenuRow {
        MenuRow {
            id: MenuItemId::new("a1"),
            category_en: "Soup".to_owned(),
            category_cn: "汤".to_owned(),
            name_en: "Hot and Sour Soup".to_owned(),
            name_cn: "酸辣汤".to_owned(),
            price: 6.5,
            image_urls: None,
            ingredients_en: None,
            ingredients_cn: None,
            is_available: true,
            display_order: 1,
        }
    }

    #[test]
    fn missing_images_fall_back_to_placeholder() -> anyhow::Result<()> {
        let item = MenuItem::from_row(row())?;
        assert_eq!(item.images, vec![PLACEHOLDER_IMAGE.to_owned()]);

        let empty = MenuItem::from_row(MenuRow {
            image_urls: Some(Vec::new()),
            ..row()
        })?;
        assert_eq!(empty.images, vec![PLACEHOLDER_IMAGE.to_owned()]);
        Ok(())
    }

    #[test]
    fn missing_ingredients_become_empty_strings() -> anyhow::Result<()> {
        let item = MenuItem::from_row(row())?;
        assert_eq!(item.ingredients_en, "");
        assert_eq!(item.ingredients_cn, "");
        assert!(!item.has_description());
        Ok(())
    }

    #[test]
    fn price_converts_to_pence_and_formats() -> anyhow::Result<()> {
        let item = MenuItem::from_row(MenuRow {
            price: 9.99,
            ..row()
        })?;
        assert_eq!(item.price_pence, 999);
        assert_eq!(format_price(item.price_pence), "£9.99");
        assert_eq!(format_price(700), "£7.00");
        Ok(())
    }

    #[test]
    fn negative_price_is_rejected() {
        let error = MenuItem::from_row(MenuRow {
            price: -1.0,
            ..row()
        })
        .expect_err("negative price should fail");
        assert!(error.to_string().contains("negative"));
    }

    #[test]
    fn row_decodes_with_absent_optional_columns() -> anyhow::Result<()> {
        let decoded: MenuRow = serde_json::from_str(
            r#"{"id":"x","category_en":"BBQ","category_cn":"烧味","name_en":"Char Siu","name_cn":"叉烧","price":12}"#,
        )?;
        assert_eq!(decoded.image_urls, None);
        assert!(!decoded.is_available);
        assert_eq!(decoded.display_order, 0);
        Ok(())
    }

    #[test]
    fn patch_serializes_only_present_fields() -> anyhow::Result<()> {
        let json = serde_json::to_string(&ItemPatch::availability(false))?;
        assert_eq!(json, r#"{"is_available":false}"#);
        assert!(ItemPatch::default().is_empty());
        Ok(())
    }

    #[test]
    fn language_toggle_and_labels() {
        assert_eq!(Language::En.toggled(), Language::Cn);
        assert_eq!(Language::parse("cn"), Some(Language::Cn));
        assert_eq!(Language::parse("fr"), None);
        assert_eq!(Category::all().label(Language::Cn), "全部");
    }

    #[test]
    fn language_setting_round_trip() {
        let parsed = SettingValue::parse_for_key(SettingKey::UiLanguage, "cn")
            .expect("parse language setting");
        assert_eq!(parsed, SettingValue::Language(Language::Cn));
        assert_eq!(
            parsed.to_storage(SettingKey::UiLanguage),
            Some("cn".to_owned())
        );
        assert!(SettingValue::parse_for_key(SettingKey::UiLanguage, "de").is_none());
    }
}
