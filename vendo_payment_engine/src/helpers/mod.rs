mod recharge_number;
mod stock_count;

pub use recharge_number::new_recharge_no;
pub use stock_count::apply_stock_counts;
