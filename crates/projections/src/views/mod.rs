pub mod order_search;

pub use order_search::{OrderSearch, OrderSearchView, OrderSummary};
