//! Application services: the product list widget and its collaborators.

pub mod catalog_product;
pub mod composer;
pub mod error;
pub mod faults;
pub mod i18n;
pub mod search;
pub mod stock;
pub mod widgets;
