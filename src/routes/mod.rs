//! Route handlers, grouped by resource. All of them are thin: parse and
//! validate the payload, talk to the database (through the cache or the order
//! queue where it applies), map failures onto [`crate::error::AppError`].

pub mod auth;
pub mod canteens;
pub mod feedback;
pub mod menu;
pub mod orders;
pub mod payments;

pub use auth::{login_handler, me_handler, register_handler};
pub use canteens::{
    create_canteen_handler, delete_canteen_handler, get_canteen_handler, list_canteens_handler,
    update_canteen_handler,
};
pub use feedback::{create_feedback_handler, list_feedback_handler};
pub use menu::{
    create_menu_item_handler, delete_menu_item_handler, list_menu_handler,
    update_menu_item_handler,
};
pub use orders::{
    create_order_handler, get_order_handler, list_my_orders_handler, update_order_status_handler,
};
pub use payments::{get_payment_handler, set_payment_handler};
