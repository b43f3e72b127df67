// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use peacock_app::{
    AuthState, ItemPatch, MenuItemId, MenuRow, MenuService, Session, SessionHub,
};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

pub const DEMO_ADMIN_EMAIL: &str = "admin@peacock.local";
pub const DEMO_ADMIN_PASSWORD: &str = "peacock";

const SESSION_TTL: time::Duration = time::Duration::hours(1);

const DEMO_SCHEMA: &str = "
CREATE TABLE menu_items (
  id TEXT PRIMARY KEY,
  category_en TEXT NOT NULL,
  category_cn TEXT NOT NULL,
  name_en TEXT NOT NULL,
  name_cn TEXT NOT NULL,
  price REAL NOT NULL,
  ingredients_en TEXT,
  ingredients_cn TEXT,
  is_available INTEGER NOT NULL DEFAULT 1,
  display_order INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE menu_item_images (
  item_id TEXT NOT NULL REFERENCES menu_items (id) ON DELETE CASCADE,
  position INTEGER NOT NULL,
  url TEXT NOT NULL,
  PRIMARY KEY (item_id, position)
);
CREATE TABLE admins (
  email TEXT PRIMARY KEY,
  password_sha256 TEXT NOT NULL
);
";

struct DemoItem {
    id: &'static str,
    category: (&'static str, &'static str),
    name: (&'static str, &'static str),
    price: f64,
    images: &'static [&'static str],
    ingredients: Option<(&'static str, &'static str)>,
    available: bool,
}

const DEMO_MENU: [DemoItem; 10] = [
    DemoItem {
        id: "spring-rolls",
        category: ("Appetisers", "开胃菜"),
        name: ("Vegetable Spring Rolls", "素春卷"),
        price: 5.5,
        images: &["/images/spring-rolls.jpg", "/images/spring-rolls-2.jpg"],
        ingredients: Some(("cabbage, carrot, glass noodles", "白菜, 胡萝卜, 粉丝")),
        available: true,
    },
    DemoItem {
        id: "char-siu",
        category: ("BBQ", "烧味"),
        name: ("Honey Roast Pork", "蜜汁叉烧"),
        price: 12.8,
        images: &["/images/char-siu.jpg"],
        ingredients: Some(("pork shoulder, honey, five spice", "猪肩肉, 蜂蜜, 五香粉")),
        available: true,
    },
    DemoItem {
        id: "har-gow",
        category: ("DimSum", "点心"),
        name: ("Prawn Dumplings", "虾饺"),
        price: 6.2,
        images: &[
            "/images/har-gow.jpg",
            "/images/har-gow-2.jpg",
            "/images/har-gow-3.jpg",
        ],
        ingredients: Some(("prawn, bamboo shoot, wheat starch", "虾仁, 笋, 澄面")),
        available: true,
    },
    DemoItem {
        id: "siu-mai",
        category: ("DimSum", "点心"),
        name: ("Pork and Prawn Siu Mai", "烧卖"),
        price: 5.9,
        images: &[],
        ingredients: None,
        available: true,
    },
    DemoItem {
        id: "hot-sour-soup",
        category: ("Soup", "汤"),
        name: ("Hot and Sour Soup", "酸辣汤"),
        price: 6.5,
        images: &["/images/hot-sour-soup.jpg"],
        ingredients: Some(("tofu, wood ear, bamboo, egg", "豆腐, 木耳, 笋, 鸡蛋")),
        available: true,
    },
    DemoItem {
        id: "lobster-noodles",
        category: ("Emperor's Seafood", "皇帝海鲜"),
        name: ("Lobster with Ginger and Spring Onion", "姜葱龙虾"),
        price: 48.0,
        images: &["/images/lobster.jpg"],
        ingredients: Some(("lobster, ginger, spring onion, e-fu noodles", "龙虾, 姜, 葱, 伊面")),
        available: false,
    },
    DemoItem {
        id: "mapo-tofu",
        category: ("Tofu & Vegetables", "豆腐蔬菜"),
        name: ("Mapo Tofu", "麻婆豆腐"),
        price: 10.5,
        images: &["/images/mapo-tofu.jpg"],
        ingredients: Some(("silken tofu, minced beef, chilli bean paste", "嫩豆腐, 牛肉末, 豆瓣酱")),
        available: true,
    },
    DemoItem {
        id: "yangzhou-rice",
        category: ("Rice & Noodles", "饭面"),
        name: ("Yangzhou Fried Rice", "扬州炒饭"),
        price: 9.0,
        images: &["/images/yangzhou-rice.jpg"],
        ingredients: Some(("rice, char siu, prawn, egg, peas", "米饭, 叉烧, 虾仁, 鸡蛋, 青豆")),
        available: true,
    },
    DemoItem {
        id: "mango-pudding",
        category: ("Desserts", "甜品"),
        name: ("Mango Pudding", "芒果布丁"),
        price: 5.0,
        images: &["/images/mango-pudding.jpg"],
        ingredients: Some(("mango, evaporated milk, gelatin", "芒果, 淡奶, 明胶")),
        available: true,
    },
    DemoItem {
        id: "chef-duck",
        category: ("Chef's Specials", "厨师推荐"),
        name: ("Crispy Aromatic Duck", "香酥鸭"),
        price: 28.0,
        images: &["/images/duck.jpg", "/images/duck-pancakes.jpg"],
        ingredients: Some(("duck, pancakes, cucumber, hoisin", "鸭, 薄饼, 黄瓜, 海鲜酱")),
        available: true,
    },
];

/// In-process stand-in for the hosted data service, backed by an in-memory
/// SQLite database with a seeded menu and one admin account.
pub struct LocalMenuService {
    conn: Mutex<Connection>,
    session: Mutex<Option<Session>>,
    hub: SessionHub,
}

impl std::fmt::Debug for LocalMenuService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMenuService")
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

fn recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl LocalMenuService {
    /// Empty schema plus the demo admin; no menu rows.
    pub fn open_empty() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open demo database")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("configure demo database")?;
        conn.execute_batch(DEMO_SCHEMA)
            .context("create demo schema")?;
        let service = Self {
            conn: Mutex::new(conn),
            session: Mutex::new(None),
            hub: SessionHub::default(),
        };
        service.add_admin(DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)?;
        Ok(service)
    }

    pub fn open_seeded() -> Result<Self> {
        let service = Self::open_empty()?;
        for (order, item) in DEMO_MENU.iter().enumerate() {
            let order = i32::try_from(order).context("demo menu is too large")?;
            service.insert_row(&demo_row(item, order))?;
        }
        tracing::info!(rows = DEMO_MENU.len(), "demo menu seeded");
        Ok(service)
    }

    pub fn add_admin(&self, email: &str, password: &str) -> Result<()> {
        recover(&self.conn)
            .execute(
                "INSERT OR REPLACE INTO admins (email, password_sha256) VALUES (?, ?)",
                params![email.trim().to_lowercase(), password_digest(password)],
            )
            .with_context(|| format!("insert admin {email}"))?;
        Ok(())
    }

    pub fn insert_row(&self, row: &MenuRow) -> Result<()> {
        let mut conn = recover(&self.conn);
        let tx = conn.transaction().context("begin insert")?;
        tx.execute(
            "
            INSERT INTO menu_items (
              id, category_en, category_cn, name_en, name_cn, price,
              ingredients_en, ingredients_cn, is_available, display_order
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                row.id.as_str(),
                row.category_en,
                row.category_cn,
                row.name_en,
                row.name_cn,
                row.price,
                row.ingredients_en,
                row.ingredients_cn,
                row.is_available,
                row.display_order,
            ],
        )
        .with_context(|| format!("insert menu item {}", row.id))?;
        if let Some(urls) = &row.image_urls {
            write_images(&tx, &row.id, urls)?;
        }
        tx.commit().context("commit insert")?;
        Ok(())
    }

    fn query_rows(&self, only_available: bool) -> Result<Vec<MenuRow>> {
        let conn = recover(&self.conn);
        let sql = if only_available {
            "SELECT id FROM menu_items WHERE is_available = 1 ORDER BY display_order ASC, id ASC"
        } else {
            "SELECT id FROM menu_items ORDER BY display_order ASC, id ASC"
        };
        let mut stmt = conn.prepare(sql).context("prepare menu query")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("list menu items")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read menu item ids")?;
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = read_row(&conn, &MenuItemId::new(id))? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn require_session(&self) -> Result<Session> {
        self.current_session()
            .ok_or_else(|| anyhow!("not signed in -- sign in as an admin first"))
    }

    fn replace_session(&self, session: Option<Session>) {
        *recover(&self.session) = session.clone();
        self.hub.publish(&AuthState::from_session(session));
    }

    /// Forces the current session to expire, as if its lifetime ran out.
    pub fn expire_session(&self) {
        if let Some(session) = recover(&self.session).as_mut() {
            session.expires_at = Some(OffsetDateTime::now_utc() - time::Duration::seconds(1));
        }
    }
}

impl MenuService for LocalMenuService {
    fn list_available_items(&self) -> Result<Vec<MenuRow>> {
        self.query_rows(true)
    }

    fn get_item_by_id(&self, id: &MenuItemId) -> Result<Option<MenuRow>> {
        read_row(&recover(&self.conn), id)
    }

    fn list_all_items(&self) -> Result<Vec<MenuRow>> {
        self.require_session()?;
        self.query_rows(false)
    }

    fn update_item(&self, id: &MenuItemId, patch: &ItemPatch) -> Result<MenuRow> {
        if patch.is_empty() {
            bail!("nothing to update for menu item {id}");
        }
        self.require_session()?;

        let mut conn = recover(&self.conn);
        let tx = conn.transaction().context("begin update")?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM menu_items WHERE id = ?",
                params![id.as_str()],
                |_| Ok(()),
            )
            .optional()
            .with_context(|| format!("look up menu item {id}"))?
            .is_some();
        if !exists {
            bail!("menu item {id} no longer exists -- refresh the admin table");
        }
        if let Some(available) = patch.is_available {
            tx.execute(
                "UPDATE menu_items SET is_available = ? WHERE id = ?",
                params![available, id.as_str()],
            )
            .with_context(|| format!("update availability of {id}"))?;
        }
        if let Some(urls) = &patch.image_urls {
            tx.execute(
                "DELETE FROM menu_item_images WHERE item_id = ?",
                params![id.as_str()],
            )
            .with_context(|| format!("clear images of {id}"))?;
            write_images(&tx, id, urls)?;
        }
        tx.commit().context("commit update")?;

        let row = read_row(&conn, id)?
            .ok_or_else(|| anyhow!("menu item {id} vanished during update"))?;
        tracing::info!(%id, available = row.is_available, "menu row updated");
        Ok(row)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        let stored: Option<String> = recover(&self.conn)
            .query_row(
                "SELECT password_sha256 FROM admins WHERE email = ?",
                params![email],
                |row| row.get(0),
            )
            .optional()
            .context("look up admin")?;
        if stored.as_deref() != Some(password_digest(password).as_str()) {
            tracing::warn!(%email, "sign-in rejected");
            bail!("invalid login credentials");
        }

        let now = OffsetDateTime::now_utc();
        let session = Session {
            access_token: password_digest(&format!("{email}:{}", now.unix_timestamp_nanos())),
            refresh_token: None,
            email,
            expires_at: Some(now + SESSION_TTL),
        };
        tracing::info!(email = %session.email, "signed in");
        self.replace_session(Some(session.clone()));
        Ok(session)
    }

    fn sign_out(&self) -> Result<()> {
        if recover(&self.session).is_none() {
            return Ok(());
        }
        self.replace_session(None);
        tracing::info!("signed out");
        Ok(())
    }

    fn current_session(&self) -> Option<Session> {
        let mut guard = recover(&self.session);
        let expired = guard
            .as_ref()
            .is_some_and(|session| session.is_expired_at(OffsetDateTime::now_utc()));
        if expired {
            *guard = None;
            drop(guard);
            tracing::info!("session expired");
            self.hub.publish(&AuthState::Unauthenticated);
            return None;
        }
        guard.clone()
    }

    fn sessions(&self) -> &SessionHub {
        &self.hub
    }
}

fn demo_row(item: &DemoItem, display_order: i32) -> MenuRow {
    MenuRow {
        id: MenuItemId::new(item.id),
        category_en: item.category.0.to_owned(),
        category_cn: item.category.1.to_owned(),
        name_en: item.name.0.to_owned(),
        name_cn: item.name.1.to_owned(),
        price: item.price,
        image_urls: (!item.images.is_empty())
            .then(|| item.images.iter().map(|url| (*url).to_owned()).collect()),
        ingredients_en: item.ingredients.map(|(en, _)| en.to_owned()),
        ingredients_cn: item.ingredients.map(|(_, cn)| cn.to_owned()),
        is_available: item.available,
        display_order,
    }
}

fn write_images(conn: &Connection, id: &MenuItemId, urls: &[String]) -> Result<()> {
    for (position, url) in urls.iter().enumerate() {
        let position = i64::try_from(position).context("too many images")?;
        conn.execute(
            "INSERT INTO menu_item_images (item_id, position, url) VALUES (?, ?, ?)",
            params![id.as_str(), position, url],
        )
        .with_context(|| format!("insert image {position} of {id}"))?;
    }
    Ok(())
}

fn read_row(conn: &Connection, id: &MenuItemId) -> Result<Option<MenuRow>> {
    let row = conn
        .query_row(
            "
            SELECT id, category_en, category_cn, name_en, name_cn, price,
                   ingredients_en, ingredients_cn, is_available, display_order
            FROM menu_items
            WHERE id = ?
            ",
            params![id.as_str()],
            |row| {
                Ok(MenuRow {
                    id: MenuItemId::new(row.get::<_, String>(0)?),
                    category_en: row.get(1)?,
                    category_cn: row.get(2)?,
                    name_en: row.get(3)?,
                    name_cn: row.get(4)?,
                    price: row.get(5)?,
                    image_urls: None,
                    ingredients_en: row.get(6)?,
                    ingredients_cn: row.get(7)?,
                    is_available: row.get(8)?,
                    display_order: row.get(9)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("read menu item {id}"))?;
    let Some(mut row) = row else {
        return Ok(None);
    };

    let mut stmt = conn
        .prepare("SELECT url FROM menu_item_images WHERE item_id = ? ORDER BY position")
        .context("prepare image query")?;
    let urls = stmt
        .query_map(params![id.as_str()], |row| row.get::<_, String>(0))
        .with_context(|| format!("list images of {id}"))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read images of {id}"))?;
    if !urls.is_empty() {
        row.image_urls = Some(urls);
    }
    Ok(Some(row))
}

fn password_digest(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::password_digest;

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = password_digest("peacock");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
        assert_ne!(digest, password_digest("Peacock"));
    }
}
