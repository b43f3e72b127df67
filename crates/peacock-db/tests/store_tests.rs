// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use peacock_app::{ItemPatch, Language, MenuItemId, MenuService, derive_categories, items_from_rows};
use peacock_db::{
    DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD, LocalMenuService, Store, validate_db_path,
};
use peacock_testkit::{MenuFaker, temp_db_path};
use std::sync::mpsc;

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("/tmp/peacock.db").is_ok());
}

#[test]
fn language_preference_survives_reopen() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        store.put_language(Language::Cn)?;
    }

    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert_eq!(store.get_language()?, Some(Language::Cn));
    Ok(())
}

#[test]
fn invalid_stored_language_is_actionable() -> Result<()> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    store.raw_connection().execute(
        "INSERT INTO settings (key, value, updated_at) VALUES ('ui.language', 'fr', 'now')",
        [],
    )?;

    let error = store
        .get_language()
        .expect_err("unknown language should be rejected");
    assert!(error.to_string().contains("ui.language"));
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_settings_table() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE settings (name TEXT PRIMARY KEY);")?;

    let error = store
        .bootstrap()
        .expect_err("incompatible settings table should be rejected");
    assert!(error.to_string().contains("missing column"));
    Ok(())
}

#[test]
fn demo_menu_lists_only_available_rows_in_order() -> Result<()> {
    let service = LocalMenuService::open_seeded()?;
    let rows = service.list_available_items()?;

    assert!(!rows.is_empty());
    assert!(rows.iter().all(|row| row.is_available));
    assert!(
        rows.windows(2)
            .all(|pair| pair[0].display_order <= pair[1].display_order)
    );

    let categories = derive_categories(&items_from_rows(rows));
    let labels = categories
        .iter()
        .map(|category| category.en.as_str())
        .collect::<Vec<_>>();
    assert_eq!(labels.first(), Some(&"All"));
    assert_eq!(labels.last(), Some(&"Chef's Specials"));
    Ok(())
}

#[test]
fn demo_lookup_returns_images_in_order() -> Result<()> {
    let service = LocalMenuService::open_seeded()?;
    let row = service
        .get_item_by_id(&MenuItemId::new("har-gow"))?
        .expect("seeded row");
    assert_eq!(row.image_list().len(), 3);
    assert_eq!(row.image_list()[0], "/images/har-gow.jpg");

    let bare = service
        .get_item_by_id(&MenuItemId::new("siu-mai"))?
        .expect("seeded row");
    assert_eq!(bare.image_urls, None);

    assert!(service.get_item_by_id(&MenuItemId::new("nope"))?.is_none());
    Ok(())
}

#[test]
fn demo_admin_flow_requires_valid_credentials() -> Result<()> {
    let service = LocalMenuService::open_seeded()?;
    assert!(service.list_all_items().is_err());

    let error = service
        .sign_in(DEMO_ADMIN_EMAIL, "wrong")
        .expect_err("bad password should fail");
    assert_eq!(error.to_string(), "invalid login credentials");

    let (tx, rx) = mpsc::channel();
    let subscription = service.sessions().subscribe(move |state| {
        let _ = tx.send(state.is_authenticated());
    });

    service.sign_in(DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)?;
    let all = service.list_all_items()?;
    let available = service.list_available_items()?;
    assert!(all.len() > available.len());

    service.sign_out()?;
    subscription.unsubscribe();
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![true, false]);
    assert!(service.list_all_items().is_err());
    Ok(())
}

#[test]
fn demo_updates_are_partial_and_persisted() -> Result<()> {
    let service = LocalMenuService::open_seeded()?;
    service.sign_in(DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)?;
    let id = MenuItemId::new("mapo-tofu");

    let row = service.update_item(&id, &ItemPatch::availability(false))?;
    assert!(!row.is_available);
    assert_eq!(row.image_list(), ["/images/mapo-tofu.jpg".to_owned()]);

    let row = service.update_item(
        &id,
        &ItemPatch {
            image_urls: Some(vec!["/a.jpg".to_owned(), "/b.jpg".to_owned()]),
            is_available: None,
        },
    )?;
    assert!(!row.is_available);
    assert_eq!(row.image_list(), ["/a.jpg".to_owned(), "/b.jpg".to_owned()]);

    let listed = service.list_available_items()?;
    assert!(listed.iter().all(|row| row.id != id));

    assert!(
        service
            .update_item(&MenuItemId::new("missing"), &ItemPatch::availability(true))
            .is_err()
    );
    Ok(())
}

#[test]
fn expired_demo_session_counts_as_signed_out() -> Result<()> {
    let service = LocalMenuService::open_seeded()?;
    service.sign_in(DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)?;
    service.expire_session();

    assert!(service.current_session().is_none());
    assert!(!service.auth_state().is_authenticated());
    assert!(service.list_all_items().is_err());
    Ok(())
}

#[test]
fn faker_rows_round_trip_through_demo_backend() -> Result<()> {
    let service = LocalMenuService::open_empty()?;
    let mut faker = MenuFaker::new(11);
    let rows = faker.menu(12);
    for row in &rows {
        service.insert_row(row)?;
    }

    service.sign_in(DEMO_ADMIN_EMAIL, DEMO_ADMIN_PASSWORD)?;
    let mut stored = service.list_all_items()?;
    stored.sort_by_key(|row| row.display_order);
    assert_eq!(stored, rows);
    Ok(())
}
