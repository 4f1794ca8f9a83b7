//! Storefront entities.

pub mod account;
pub mod account_address;
pub mod account_payment_method;
pub mod attribute;
pub mod catalog;
pub mod catalog_region;
pub mod category;
pub mod category_product;
pub mod country;
pub mod feature;
pub mod image;
pub mod image_dimension;
pub mod invoice;
pub mod invoice_item;
pub mod item;
pub mod item_group;
pub mod item_region;
pub mod locale;
pub mod minimum_quantity_group;
pub mod order;
pub mod order_address;
pub mod order_item;
pub mod price_range;
pub mod product;
pub mod product_attribute;
pub mod provstate;
pub mod region;
pub mod sale_discount;

// Re-export entities
pub use account::{Entity as Account, Model as AccountModel};
pub use attribute::{AttributeType, Entity as Attribute, Model as AttributeModel};
pub use catalog::{Entity as Catalog, Model as CatalogModel};
pub use category::{Entity as Category, Model as CategoryModel};
pub use invoice::{Entity as Invoice, Model as InvoiceModel};
pub use item::{Entity as Item, ItemStatus, Model as ItemModel};
pub use order::{Entity as Order, Model as OrderModel};
pub use product::{Entity as Product, Model as ProductModel};
pub use region::{Entity as Region, Model as RegionModel};
