mod order_number;

pub use order_number::{generate_order_number, jst_today, DEFAULT_ORDER_NUMBER_PREFIX};
