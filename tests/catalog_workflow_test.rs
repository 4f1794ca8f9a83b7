mod common;

use common::TestApp;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use storefront_admin::{
    entities::{catalog, item, item_region, product},
    errors::ServiceError,
    services::{
        categories::{CreateCategory, UpdateCategory},
        items::RegionBinding,
        Deletable,
    },
};

async fn seed_category(app: &TestApp, parent: Option<i32>, shortname: &str) -> i32 {
    app.state
        .services
        .categories
        .create(CreateCategory {
            parent,
            title: shortname.to_uppercase(),
            shortname: shortname.to_string(),
            description: None,
            always_visible: false,
        })
        .await
        .expect("category")
        .id
}

#[tokio::test]
async fn clone_copies_products_items_and_prices() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let source = app.seed_catalog("Spring").await;
    let product = app.seed_product(source, "tent").await;
    let item_id = app.seed_item(product, "TENT-2P").await;
    app.state
        .services
        .items
        .set_region_binding(item_id, region, RegionBinding { price: dec!(199.99), enabled: true })
        .await
        .unwrap();

    let copy = app.state.services.catalogs.clone_catalog(source).await.unwrap();
    assert_eq!(copy.clone_of, Some(source));
    assert_eq!(copy.title, "Spring (clone)");

    let copied_products = product::Entity::find()
        .filter(product::Column::Catalog.eq(copy.id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(copied_products.len(), 1);
    assert_eq!(copied_products[0].shortname, "tent");

    let copied_items = item::Entity::find()
        .filter(item::Column::Product.eq(copied_products[0].id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(copied_items.len(), 1);
    assert_eq!(copied_items[0].sku, "TENT-2P");

    let price = item_region::Entity::find_by_id((copied_items[0].id, region))
        .one(app.db())
        .await
        .unwrap()
        .expect("copied price");
    assert_eq!(price.price, dec!(199.99));

    // A catalog has at most one clone partner
    let err = app.state.services.catalogs.clone_catalog(source).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
    let err = app.state.services.catalogs.clone_catalog(copy.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn enabling_a_clone_disables_its_partner_everywhere() {
    let app = TestApp::new().await;
    let canada = app.seed_region("Canada").await;
    let usa = app.seed_region("USA").await;
    let source = app.seed_catalog("Summer").await;
    let catalogs = &app.state.services.catalogs;

    catalogs.set_region_enabled(source, canada, true).await.unwrap();
    catalogs.set_region_enabled(source, usa, true).await.unwrap();
    let copy = catalogs.clone_catalog(source).await.unwrap();
    assert!(catalogs.get(copy.id).await.unwrap().regions.is_empty());

    catalogs.set_region_enabled(copy.id, canada, true).await.unwrap();

    let source_summary = catalogs.get(source).await.unwrap();
    assert!(source_summary.regions.is_empty());
    assert_eq!(source_summary.clone_partner, Some(copy.id));
    assert_eq!(catalogs.get(copy.id).await.unwrap().regions, vec![canada]);
}

#[tokio::test]
async fn catalog_delete_follows_the_guard() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let empty = app.seed_catalog("Empty").await;
    let busy = app.seed_catalog("Busy").await;
    app.seed_product(busy, "stove").await;
    let catalogs = &app.state.services.catalogs;
    catalogs.set_region_enabled(busy, region, true).await.unwrap();

    let summary = catalogs.delete_summary(&[empty, busy]).await.unwrap();
    assert_eq!(summary.deletable_ids(), vec![empty]);
    assert!(summary.entries[1].message.contains("cannot be deleted"));

    // The refused catalog is skipped, the empty one goes
    assert_eq!(catalogs.delete(&[empty, busy]).await.unwrap(), 1);
    assert!(catalog::Entity::find_by_id(empty).one(app.db()).await.unwrap().is_none());

    // Once cloned and switched off, the original may go and the clone stands alone
    let copy = catalogs.clone_catalog(busy).await.unwrap();
    catalogs.set_region_enabled(copy.id, region, true).await.unwrap();
    assert_eq!(catalogs.delete_summary(&[busy]).await.unwrap().deletable_ids(), vec![busy]);
    assert_eq!(catalogs.delete(&[busy]).await.unwrap(), 1);

    let survivor = catalog::Entity::find_by_id(copy.id).one(app.db()).await.unwrap().unwrap();
    assert_eq!(survivor.clone_of, None);
    assert_eq!(
        product::Entity::find()
            .filter(product::Column::Catalog.eq(busy))
            .all(app.db())
            .await
            .unwrap()
            .len(),
        0
    );
}

#[tokio::test]
async fn deleting_an_original_removes_its_items_and_frees_the_clone() {
    let app = TestApp::new().await;
    let canada = app.seed_region("Canada").await;
    let usa = app.seed_region("USA").await;
    let original = app.seed_catalog("Winter").await;
    let product_id = app.seed_product(original, "parka").await;
    let item_id = app.seed_item(product_id, "PARKA-M").await;
    let services = &app.state.services;
    services
        .items
        .set_region_binding(item_id, canada, RegionBinding { price: dec!(249.00), enabled: true })
        .await
        .unwrap();
    let catalogs = &services.catalogs;
    catalogs.set_region_enabled(original, canada, true).await.unwrap();

    let copy = catalogs.clone_catalog(original).await.unwrap();
    catalogs.set_region_enabled(copy.id, canada, true).await.unwrap();
    assert!(catalogs.get(original).await.unwrap().regions.is_empty());
    assert_eq!(catalogs.delete(&[original]).await.unwrap(), 1);

    assert!(item::Entity::find_by_id(item_id).one(app.db()).await.unwrap().is_none());
    let orphan_prices = item_region::Entity::find()
        .filter(item_region::Column::Item.eq(item_id))
        .all(app.db())
        .await
        .unwrap();
    assert!(orphan_prices.is_empty());

    let cloned_product = product::Entity::find()
        .filter(product::Column::Catalog.eq(copy.id))
        .one(app.db())
        .await
        .unwrap()
        .expect("cloned product");
    let cloned_items = item::Entity::find()
        .filter(item::Column::Product.eq(cloned_product.id))
        .all(app.db())
        .await
        .unwrap();
    assert_eq!(cloned_items.len(), 1);
    let cloned_price = item_region::Entity::find_by_id((cloned_items[0].id, canada))
        .one(app.db())
        .await
        .unwrap();
    assert!(cloned_price.is_some());

    // The survivor has no partner left, so enabling it elsewhere keeps its regions
    assert_eq!(catalogs.clone_partner(copy.id).await.unwrap(), None);
    catalogs.set_region_enabled(copy.id, usa, true).await.unwrap();
    let mut regions = catalogs.get(copy.id).await.unwrap().regions;
    regions.sort_unstable();
    assert_eq!(regions, vec![canada, usa]);

    // and it may be cloned again
    let second = catalogs.clone_catalog(copy.id).await.unwrap();
    assert_eq!(second.clone_of, Some(copy.id));
}

#[tokio::test]
async fn category_delete_removes_subtree_and_keeps_products() {
    let app = TestApp::new().await;
    let catalog = app.seed_catalog("Main").await;
    let product_id = app.seed_product(catalog, "lantern").await;

    let root = seed_category(&app, None, "camping").await;
    let child = seed_category(&app, Some(root), "lighting").await;
    let grandchild = seed_category(&app, Some(child), "lanterns").await;
    let other = seed_category(&app, None, "fishing").await;

    let categories = &app.state.services.categories;
    categories.bind_products(grandchild, &[product_id], false).await.unwrap();

    let summary = categories.delete_summary(&[root]).await.unwrap();
    assert!(summary.entries[0].message.contains("2 sub-categories and 1 products"));

    assert_eq!(categories.delete(&[root]).await.unwrap(), 3);
    assert!(categories.get(child).await.is_err());
    assert!(categories.get(grandchild).await.is_err());
    assert!(categories.get(other).await.is_ok());
    assert!(categories.products(grandchild).await.unwrap().is_empty());
    assert!(product::Entity::find_by_id(product_id).one(app.db()).await.unwrap().is_some());
}

#[tokio::test]
async fn category_cannot_move_below_itself() {
    let app = TestApp::new().await;
    let root = seed_category(&app, None, "camping").await;
    let child = seed_category(&app, Some(root), "tents").await;

    let err = app
        .state
        .services
        .categories
        .update(
            root,
            UpdateCategory {
                parent: Some(Some(child)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOperation(_)));

    let navbar = app.state.services.categories.navbar(child).await.unwrap();
    let ids: Vec<i32> = navbar.iter().map(|entry| entry.id).collect();
    assert_eq!(ids, vec![root, child]);
}

#[tokio::test]
async fn visibility_needs_enabled_item_and_catalog() {
    let app = TestApp::new().await;
    let region = app.seed_region("Canada").await;
    let catalog = app.seed_catalog("Main").await;
    let product_id = app.seed_product(catalog, "kettle").await;
    let item_id = app.seed_item(product_id, "KETTLE-1").await;
    let category = seed_category(&app, None, "kitchen").await;

    let services = &app.state.services;
    services.categories.bind_products(category, &[product_id], false).await.unwrap();
    services
        .items
        .set_region_binding(item_id, region, RegionBinding { price: dec!(25), enabled: true })
        .await
        .unwrap();
    assert_eq!(services.categories.visible_product_count(category, region).await.unwrap(), 0);

    services.catalogs.set_region_enabled(catalog, region, true).await.unwrap();
    assert_eq!(services.categories.visible_product_count(category, region).await.unwrap(), 1);

    services
        .categories
        .set_items_enabled(category, Some(region), false)
        .await
        .unwrap();
    assert_eq!(services.categories.visible_product_count(category, region).await.unwrap(), 0);
}
