use serde::{Deserialize, Serialize};

/// The distinguished quote currency every user implicitly holds a balance in.
pub const RUB: &str = "RUB";

/// Uppercase A-Z, length 2..10 (spec §3 Instrument).
pub fn is_valid_ticker(ticker: &str) -> bool {
    let len = ticker.len();
    (2..=10).contains(&len) && ticker.bytes().all(|b| b.is_ascii_uppercase())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    /// The direction of resting orders a taker with this direction crosses.
    pub fn counterparty(self) -> Direction {
        match self {
            Direction::Buy => Direction::Sell,
            Direction::Sell => Direction::Buy,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    Market,
    Limit,
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Market => write!(f, "MARKET"),
            OrderKind::Limit => write!(f, "LIMIT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR")]
pub enum OrderStatus {
    #[sqlx(rename = "NEW")]
    #[serde(rename = "NEW")]
    New,
    #[sqlx(rename = "PART_EXECUTED")]
    #[serde(rename = "PART_EXECUTED")]
    PartExecuted,
    #[sqlx(rename = "EXECUTED")]
    #[serde(rename = "EXECUTED")]
    Executed,
    #[sqlx(rename = "CANCELLED")]
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Executed | OrderStatus::Cancelled)
    }

    /// Recompute status from (filled, qty) per spec §3's invariants.
    pub fn from_fill(filled: i64, qty: i64) -> OrderStatus {
        if filled >= qty {
            OrderStatus::Executed
        } else if filled > 0 {
            OrderStatus::PartExecuted
        } else {
            OrderStatus::New
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::New => write!(f, "NEW"),
            OrderStatus::PartExecuted => write!(f, "PART_EXECUTED"),
            OrderStatus::Executed => write!(f, "EXECUTED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

/// The opaque (user_id, role) tuple the glue layer hands to the core
/// (spec §6: "the core does not parse credentials").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: uuid::Uuid,
    pub role: Role,
}

impl CallerIdentity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn may_act_as(&self, user_id: uuid::Uuid) -> bool {
        self.is_admin() || self.user_id == user_id
    }
}
