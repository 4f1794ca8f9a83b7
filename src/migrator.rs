use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_geography_tables::Migration),
            Box::new(m20240301_000002_create_catalog_tables::Migration),
            Box::new(m20240301_000003_create_account_tables::Migration),
            Box::new(m20240301_000004_create_order_tables::Migration),
            Box::new(m20240301_000005_create_invoice_tables::Migration),
            Box::new(m20240301_000006_create_pricing_tables::Migration),
            Box::new(m20240301_000007_create_image_tables::Migration),
        ]
    }
}

fn pk_auto<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

/// Precision and scale shared by every money column. SQLite rejects a
/// precision above 16.
pub(crate) const MONEY_PRECISION: u32 = 16;
pub(crate) const MONEY_SCALE: u32 = 4;

fn money<T: IntoIden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .decimal_len(MONEY_PRECISION, MONEY_SCALE)
        .not_null()
        .default(0)
        .to_owned()
}

async fn index<T, C>(manager: &SchemaManager<'_>, name: &str, table: T, col: C) -> Result<(), DbErr>
where
    T: IntoTableRef + 'static,
    C: IntoIndexColumn + 'static,
{
    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name(name)
                .table(table)
                .col(col)
                .to_owned(),
        )
        .await
}

mod m20240301_000001_create_geography_tables {
    use super::pk_auto;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_geography_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Regions::Table)
                        .if_not_exists()
                        .col(pk_auto(Regions::Id))
                        .col(ColumnDef::new(Regions::Title).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Locales::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Locales::Id)
                                .string_len(10)
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Locales::Region).integer().not_null())
                        .col(ColumnDef::new(Locales::Currency).string_len(3).not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Countries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Countries::Id)
                                .string_len(2)
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Countries::Title).string().not_null())
                        .col(
                            ColumnDef::new(Countries::Visible)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Provstates::Table)
                        .if_not_exists()
                        .col(pk_auto(Provstates::Id))
                        .col(ColumnDef::new(Provstates::Country).string_len(2).not_null())
                        .col(ColumnDef::new(Provstates::Title).string().not_null())
                        .col(ColumnDef::new(Provstates::Abbreviation).string().not_null())
                        .to_owned(),
                )
                .await?;

            super::index(manager, "idx_locales_region", Locales::Table, Locales::Region).await?;
            super::index(
                manager,
                "idx_provstates_country",
                Provstates::Table,
                Provstates::Country,
            )
            .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Provstates::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Countries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Locales::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Regions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Regions {
        Table,
        Id,
        Title,
    }

    #[derive(DeriveIden)]
    enum Locales {
        Table,
        Id,
        Region,
        Currency,
    }

    #[derive(DeriveIden)]
    enum Countries {
        Table,
        Id,
        Title,
        Visible,
    }

    #[derive(DeriveIden)]
    enum Provstates {
        Table,
        Id,
        Country,
        Title,
        Abbreviation,
    }
}

mod m20240301_000002_create_catalog_tables {
    use super::{index, money, pk_auto};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Catalogs::Table)
                        .if_not_exists()
                        .col(pk_auto(Catalogs::Id))
                        .col(ColumnDef::new(Catalogs::Title).string().not_null())
                        .col(ColumnDef::new(Catalogs::CloneOf).integer().null())
                        .col(
                            ColumnDef::new(Catalogs::InSeason)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CatalogRegions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CatalogRegions::Catalog).integer().not_null())
                        .col(ColumnDef::new(CatalogRegions::Region).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(CatalogRegions::Catalog)
                                .col(CatalogRegions::Region),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Categories::Table)
                        .if_not_exists()
                        .col(pk_auto(Categories::Id))
                        .col(ColumnDef::new(Categories::Parent).integer().null())
                        .col(ColumnDef::new(Categories::Title).string().not_null())
                        .col(ColumnDef::new(Categories::Shortname).string().not_null())
                        .col(ColumnDef::new(Categories::Description).text().null())
                        .col(
                            ColumnDef::new(Categories::Displayorder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Categories::AlwaysVisible)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Categories::Image).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(pk_auto(Products::Id))
                        .col(ColumnDef::new(Products::Catalog).integer().not_null())
                        .col(ColumnDef::new(Products::Title).string().not_null())
                        .col(ColumnDef::new(Products::Shortname).string().not_null())
                        .col(ColumnDef::new(Products::Bodytext).text().null())
                        .col(ColumnDef::new(Products::PrimaryImage).integer().null())
                        .col(
                            ColumnDef::new(Products::Createdate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CategoryProducts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(CategoryProducts::Category).integer().not_null())
                        .col(ColumnDef::new(CategoryProducts::Product).integer().not_null())
                        .col(
                            ColumnDef::new(CategoryProducts::Displayorder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(CategoryProducts::Minor)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .primary_key(
                            Index::create()
                                .col(CategoryProducts::Category)
                                .col(CategoryProducts::Product),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Attributes::Table)
                        .if_not_exists()
                        .col(pk_auto(Attributes::Id))
                        .col(ColumnDef::new(Attributes::Shortname).string().not_null())
                        .col(ColumnDef::new(Attributes::Title).string().not_null())
                        .col(
                            ColumnDef::new(Attributes::AttributeType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Attributes::Displayorder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductAttributes::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ProductAttributes::Product).integer().not_null())
                        .col(
                            ColumnDef::new(ProductAttributes::Attribute)
                                .integer()
                                .not_null(),
                        )
                        .primary_key(
                            Index::create()
                                .col(ProductAttributes::Product)
                                .col(ProductAttributes::Attribute),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemGroups::Table)
                        .if_not_exists()
                        .col(pk_auto(ItemGroups::Id))
                        .col(ColumnDef::new(ItemGroups::Product).integer().not_null())
                        .col(ColumnDef::new(ItemGroups::Title).string().not_null())
                        .col(
                            ColumnDef::new(ItemGroups::Displayorder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(MinimumQuantityGroups::Table)
                        .if_not_exists()
                        .col(pk_auto(MinimumQuantityGroups::Id))
                        .col(ColumnDef::new(MinimumQuantityGroups::Title).string().not_null())
                        .col(
                            ColumnDef::new(MinimumQuantityGroups::Shortname)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MinimumQuantityGroups::MinimumQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MinimumQuantityGroups::Description).text().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(pk_auto(Items::Id))
                        .col(ColumnDef::new(Items::Product).integer().not_null())
                        .col(ColumnDef::new(Items::Sku).string().not_null())
                        .col(ColumnDef::new(Items::Description).string().not_null())
                        .col(ColumnDef::new(Items::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Items::Displayorder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Items::ItemGroup).integer().null())
                        .col(ColumnDef::new(Items::SaleDiscount).integer().null())
                        .col(ColumnDef::new(Items::MinimumQuantityGroup).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemRegions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ItemRegions::Item).integer().not_null())
                        .col(ColumnDef::new(ItemRegions::Region).integer().not_null())
                        .col(money(ItemRegions::Price))
                        .col(
                            ColumnDef::new(ItemRegions::Enabled)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .primary_key(
                            Index::create()
                                .col(ItemRegions::Item)
                                .col(ItemRegions::Region),
                        )
                        .to_owned(),
                )
                .await?;

            index(manager, "idx_catalogs_clone_of", Catalogs::Table, Catalogs::CloneOf).await?;
            index(manager, "idx_categories_parent", Categories::Table, Categories::Parent)
                .await?;
            index(manager, "idx_products_catalog", Products::Table, Products::Catalog).await?;
            index(
                manager,
                "idx_category_products_product",
                CategoryProducts::Table,
                CategoryProducts::Product,
            )
            .await?;
            index(manager, "idx_items_product", Items::Table, Items::Product).await?;
            index(manager, "idx_items_sku", Items::Table, Items::Sku).await?;
            index(
                manager,
                "idx_item_groups_product",
                ItemGroups::Table,
                ItemGroups::Product,
            )
            .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ItemRegions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MinimumQuantityGroups::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ItemGroups::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductAttributes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Attributes::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CategoryProducts::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Categories::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CatalogRegions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Catalogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Catalogs {
        Table,
        Id,
        Title,
        CloneOf,
        InSeason,
    }

    #[derive(DeriveIden)]
    enum CatalogRegions {
        Table,
        Catalog,
        Region,
    }

    #[derive(DeriveIden)]
    enum Categories {
        Table,
        Id,
        Parent,
        Title,
        Shortname,
        Description,
        Displayorder,
        AlwaysVisible,
        Image,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Catalog,
        Title,
        Shortname,
        Bodytext,
        PrimaryImage,
        Createdate,
    }

    #[derive(DeriveIden)]
    enum CategoryProducts {
        Table,
        Category,
        Product,
        Displayorder,
        Minor,
    }

    #[derive(DeriveIden)]
    enum Attributes {
        Table,
        Id,
        Shortname,
        Title,
        AttributeType,
        Displayorder,
    }

    #[derive(DeriveIden)]
    enum ProductAttributes {
        Table,
        Product,
        Attribute,
    }

    #[derive(DeriveIden)]
    enum ItemGroups {
        Table,
        Id,
        Product,
        Title,
        Displayorder,
    }

    #[derive(DeriveIden)]
    enum MinimumQuantityGroups {
        Table,
        Id,
        Title,
        Shortname,
        MinimumQuantity,
        Description,
    }

    #[derive(DeriveIden)]
    enum Items {
        Table,
        Id,
        Product,
        Sku,
        Description,
        Status,
        Displayorder,
        ItemGroup,
        SaleDiscount,
        MinimumQuantityGroup,
    }

    #[derive(DeriveIden)]
    enum ItemRegions {
        Table,
        Item,
        Region,
        Price,
        Enabled,
    }
}

mod m20240301_000003_create_account_tables {
    use super::{index, pk_auto};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_account_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Accounts::Table)
                        .if_not_exists()
                        .col(pk_auto(Accounts::Id))
                        .col(ColumnDef::new(Accounts::Fullname).string().not_null())
                        .col(ColumnDef::new(Accounts::Email).string().not_null())
                        .col(ColumnDef::new(Accounts::Phone).string().null())
                        .col(ColumnDef::new(Accounts::Company).string().null())
                        .col(
                            ColumnDef::new(Accounts::Suspicious)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Accounts::Createdate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AccountAddresses::Table)
                        .if_not_exists()
                        .col(pk_auto(AccountAddresses::Id))
                        .col(ColumnDef::new(AccountAddresses::Account).integer().not_null())
                        .col(ColumnDef::new(AccountAddresses::Fullname).string().not_null())
                        .col(ColumnDef::new(AccountAddresses::Line1).string().not_null())
                        .col(ColumnDef::new(AccountAddresses::Line2).string().null())
                        .col(ColumnDef::new(AccountAddresses::City).string().not_null())
                        .col(ColumnDef::new(AccountAddresses::Provstate).integer().null())
                        .col(ColumnDef::new(AccountAddresses::ProvstateOther).string().null())
                        .col(ColumnDef::new(AccountAddresses::PostalCode).string().not_null())
                        .col(
                            ColumnDef::new(AccountAddresses::Country)
                                .string_len(2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(AccountAddresses::Phone).string().null())
                        .col(
                            ColumnDef::new(AccountAddresses::DefaultBilling)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(AccountAddresses::DefaultShipping)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(AccountPaymentMethods::Table)
                        .if_not_exists()
                        .col(pk_auto(AccountPaymentMethods::Id))
                        .col(
                            ColumnDef::new(AccountPaymentMethods::Account)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountPaymentMethods::PaymentType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountPaymentMethods::CardFullname)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountPaymentMethods::CardLastdigits)
                                .string_len(4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountPaymentMethods::CardExpiryMonth)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountPaymentMethods::CardExpiryYear)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AccountPaymentMethods::DefaultMethod)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            index(manager, "idx_accounts_email", Accounts::Table, Accounts::Email).await?;
            index(
                manager,
                "idx_account_addresses_account",
                AccountAddresses::Table,
                AccountAddresses::Account,
            )
            .await?;
            index(
                manager,
                "idx_account_payment_methods_account",
                AccountPaymentMethods::Table,
                AccountPaymentMethods::Account,
            )
            .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AccountPaymentMethods::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(AccountAddresses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Accounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Accounts {
        Table,
        Id,
        Fullname,
        Email,
        Phone,
        Company,
        Suspicious,
        Createdate,
    }

    #[derive(DeriveIden)]
    enum AccountAddresses {
        Table,
        Id,
        Account,
        Fullname,
        Line1,
        Line2,
        City,
        Provstate,
        ProvstateOther,
        PostalCode,
        Country,
        Phone,
        DefaultBilling,
        DefaultShipping,
    }

    #[derive(DeriveIden)]
    enum AccountPaymentMethods {
        Table,
        Id,
        Account,
        PaymentType,
        CardFullname,
        CardLastdigits,
        CardExpiryMonth,
        CardExpiryYear,
        DefaultMethod,
    }
}

mod m20240301_000004_create_order_tables {
    use super::{index, money, pk_auto};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderAddresses::Table)
                        .if_not_exists()
                        .col(pk_auto(OrderAddresses::Id))
                        .col(ColumnDef::new(OrderAddresses::Fullname).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Line1).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Line2).string().null())
                        .col(ColumnDef::new(OrderAddresses::City).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::ProvstateTitle).string().null())
                        .col(ColumnDef::new(OrderAddresses::PostalCode).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Country).string().not_null())
                        .col(ColumnDef::new(OrderAddresses::Phone).string().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(pk_auto(Orders::Id))
                        .col(ColumnDef::new(Orders::Account).integer().null())
                        .col(ColumnDef::new(Orders::Email).string().not_null())
                        .col(ColumnDef::new(Orders::Phone).string().null())
                        .col(ColumnDef::new(Orders::Locale).string_len(10).not_null())
                        .col(ColumnDef::new(Orders::BillingAddress).integer().null())
                        .col(ColumnDef::new(Orders::ShippingAddress).integer().null())
                        .col(money(Orders::Subtotal))
                        .col(money(Orders::ShippingTotal))
                        .col(money(Orders::SurchargeTotal))
                        .col(money(Orders::PromotionTotal))
                        .col(money(Orders::TaxTotal))
                        .col(money(Orders::Total))
                        .col(ColumnDef::new(Orders::Notes).text().null())
                        .col(ColumnDef::new(Orders::Comments).text().null())
                        .col(
                            ColumnDef::new(Orders::Createdate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::CancelDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(pk_auto(OrderItems::Id))
                        .col(ColumnDef::new(OrderItems::Ordr).integer().not_null())
                        .col(ColumnDef::new(OrderItems::Item).integer().null())
                        .col(ColumnDef::new(OrderItems::Sku).string().not_null())
                        .col(ColumnDef::new(OrderItems::Description).string().not_null())
                        .col(money(OrderItems::Price))
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(money(OrderItems::Extension))
                        .to_owned(),
                )
                .await?;

            index(manager, "idx_orders_account", Orders::Table, Orders::Account).await?;
            index(manager, "idx_orders_email", Orders::Table, Orders::Email).await?;
            index(manager, "idx_orders_createdate", Orders::Table, Orders::Createdate).await?;
            index(manager, "idx_order_items_ordr", OrderItems::Table, OrderItems::Ordr).await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderAddresses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OrderAddresses {
        Table,
        Id,
        Fullname,
        Line1,
        Line2,
        City,
        ProvstateTitle,
        PostalCode,
        Country,
        Phone,
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        Account,
        Email,
        Phone,
        Locale,
        BillingAddress,
        ShippingAddress,
        Subtotal,
        ShippingTotal,
        SurchargeTotal,
        PromotionTotal,
        TaxTotal,
        Total,
        Notes,
        Comments,
        Createdate,
        CancelDate,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        Ordr,
        Item,
        Sku,
        Description,
        Price,
        Quantity,
        Extension,
    }
}

mod m20240301_000005_create_invoice_tables {
    use super::{index, money, pk_auto};
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_invoice_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(pk_auto(Invoices::Id))
                        .col(ColumnDef::new(Invoices::Account).integer().not_null())
                        .col(ColumnDef::new(Invoices::Locale).string_len(10).not_null())
                        .col(ColumnDef::new(Invoices::Comments).text().null())
                        .col(money(Invoices::ShippingTotal))
                        .col(money(Invoices::TaxTotal))
                        .col(money(Invoices::ItemTotal))
                        .col(money(Invoices::Total))
                        .col(
                            ColumnDef::new(Invoices::Createdate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InvoiceItems::Table)
                        .if_not_exists()
                        .col(pk_auto(InvoiceItems::Id))
                        .col(ColumnDef::new(InvoiceItems::Invoice).integer().not_null())
                        .col(ColumnDef::new(InvoiceItems::Sku).string().not_null())
                        .col(ColumnDef::new(InvoiceItems::Description).string().not_null())
                        .col(ColumnDef::new(InvoiceItems::Quantity).integer().not_null())
                        .col(money(InvoiceItems::Price))
                        .col(
                            ColumnDef::new(InvoiceItems::Displayorder)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            index(manager, "idx_invoices_account", Invoices::Table, Invoices::Account).await?;
            index(
                manager,
                "idx_invoice_items_invoice",
                InvoiceItems::Table,
                InvoiceItems::Invoice,
            )
            .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InvoiceItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Invoices {
        Table,
        Id,
        Account,
        Locale,
        Comments,
        ShippingTotal,
        TaxTotal,
        ItemTotal,
        Total,
        Createdate,
    }

    #[derive(DeriveIden)]
    enum InvoiceItems {
        Table,
        Id,
        Invoice,
        Sku,
        Description,
        Quantity,
        Price,
        Displayorder,
    }
}

mod m20240301_000006_create_pricing_tables {
    use super::pk_auto;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000006_create_pricing_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SaleDiscounts::Table)
                        .if_not_exists()
                        .col(pk_auto(SaleDiscounts::Id))
                        .col(ColumnDef::new(SaleDiscounts::Title).string().not_null())
                        .col(ColumnDef::new(SaleDiscounts::Shortname).string().not_null())
                        .col(
                            ColumnDef::new(SaleDiscounts::DiscountPercentage)
                                .decimal_len(5, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleDiscounts::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SaleDiscounts::EndDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(SaleDiscounts::Region).integer().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PriceRanges::Table)
                        .if_not_exists()
                        .col(pk_auto(PriceRanges::Id))
                        .col(
                            ColumnDef::new(PriceRanges::StartPrice)
                                .decimal_len(super::MONEY_PRECISION, super::MONEY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PriceRanges::EndPrice)
                                .decimal_len(super::MONEY_PRECISION, super::MONEY_SCALE)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PriceRanges::OriginalPrice)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Features::Table)
                        .if_not_exists()
                        .col(pk_auto(Features::Id))
                        .col(ColumnDef::new(Features::Title).string().not_null())
                        .col(ColumnDef::new(Features::Shortname).string().not_null())
                        .col(ColumnDef::new(Features::Link).string().null())
                        .col(ColumnDef::new(Features::Description).text().null())
                        .col(
                            ColumnDef::new(Features::StartDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Features::EndDate)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Features::Region).integer().null())
                        .col(ColumnDef::new(Features::DisplaySlot).string().not_null())
                        .col(
                            ColumnDef::new(Features::Enabled)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Features::Priority)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Features::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PriceRanges::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SaleDiscounts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SaleDiscounts {
        Table,
        Id,
        Title,
        Shortname,
        DiscountPercentage,
        StartDate,
        EndDate,
        Region,
    }

    #[derive(DeriveIden)]
    enum PriceRanges {
        Table,
        Id,
        StartPrice,
        EndPrice,
        OriginalPrice,
    }

    #[derive(DeriveIden)]
    enum Features {
        Table,
        Id,
        Title,
        Shortname,
        Link,
        Description,
        StartDate,
        EndDate,
        Region,
        DisplaySlot,
        Enabled,
        Priority,
    }
}

mod m20240301_000007_create_image_tables {
    use super::pk_auto;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000007_create_image_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Images::Table)
                        .if_not_exists()
                        .col(pk_auto(Images::Id))
                        .col(ColumnDef::new(Images::Title).string().not_null())
                        .col(ColumnDef::new(Images::Filename).string().not_null())
                        .col(
                            ColumnDef::new(Images::Createdate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ImageDimensions::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(ImageDimensions::Image).integer().not_null())
                        .col(
                            ColumnDef::new(ImageDimensions::Dimension)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(ColumnDef::new(ImageDimensions::Width).integer().not_null())
                        .col(ColumnDef::new(ImageDimensions::Height).integer().not_null())
                        .primary_key(
                            Index::create()
                                .col(ImageDimensions::Image)
                                .col(ImageDimensions::Dimension),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ImageDimensions::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Images::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Images {
        Table,
        Id,
        Title,
        Filename,
        Createdate,
    }

    #[derive(DeriveIden)]
    enum ImageDimensions {
        Table,
        Image,
        Dimension,
        Width,
        Height,
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{establish_connection_with_config, run_migrations, DbConfig};
    use crate::entities::price_range;
    use rust_decimal_macros::dec;
    use sea_orm::{ActiveModelTrait, EntityTrait, Set};

    #[tokio::test]
    async fn money_columns_survive_sqlite() {
        let pool = establish_connection_with_config(&DbConfig::single("sqlite::memory:"))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let saved = price_range::ActiveModel {
            start_price: Set(Some(dec!(1999.99))),
            end_price: Set(None),
            original_price: Set(false),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();

        let loaded = price_range::Entity::find_by_id(saved.id)
            .one(&pool)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.start_price, Some(dec!(1999.99)));
        assert_eq!(loaded.end_price, None);
    }
}
