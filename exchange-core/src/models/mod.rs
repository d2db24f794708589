pub mod balance;
pub mod order;
pub mod trade;
pub mod user;

pub use balance::{Balance, Ledger};
pub use order::{Order, OrderStore};
pub use trade::{Trade, TradeLog};
pub use user::User;
