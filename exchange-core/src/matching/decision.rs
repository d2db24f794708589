use uuid::Uuid;

use crate::types::Direction;

/// A read-only view of one resting order, the minimum an offer-walk needs
/// to decide fills. Kept separate from `models::order::Order` so this
/// module stays pure and can be unit-tested without a database, the same
/// separation the teacher draws between its in-memory `Order` and the
/// persisted `accounts` row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestingOffer {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub price: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedFill {
    pub maker_order_id: Uuid,
    pub maker_user_id: Uuid,
    pub qty: i64,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchPlan {
    pub fills: Vec<PlannedFill>,
    pub remaining: i64,
}

impl MatchPlan {
    pub fn filled(&self) -> i64 {
        self.fills.iter().map(|f| f.qty).sum()
    }
}

/// Walks `offers` — already ordered best-price-for-the-taker first, then
/// oldest-first, by the caller (`OrderStore::fetch_offers`) — and greedily
/// fills `taker_qty` against them up to `price_limit` (the taker's limit
/// price, or `None` for a market order that accepts any resting price).
/// This is the price-time-priority algorithm at the heart of
/// `OrderBook::match_order`, rewritten over a slice of durable rows instead
/// of a `BTreeMap` walk, since here the book lives in Postgres rather than
/// process memory.
///
/// Pure and side-effect free: applying the plan (writing fills, updating
/// balances) is the caller's job.
pub fn plan_match(
    taker_direction: Direction,
    taker_qty: i64,
    price_limit: Option<i64>,
    offers: &[RestingOffer],
) -> MatchPlan {
    let mut remaining = taker_qty;
    let mut fills = Vec::new();

    for offer in offers {
        if remaining <= 0 {
            break;
        }

        let crosses = match (taker_direction, price_limit) {
            (_, None) => true,
            (Direction::Buy, Some(limit)) => offer.price <= limit,
            (Direction::Sell, Some(limit)) => offer.price >= limit,
        };
        if !crosses {
            break;
        }

        let fill_qty = remaining.min(offer.remaining);
        if fill_qty <= 0 {
            continue;
        }

        fills.push(PlannedFill {
            maker_order_id: offer.order_id,
            maker_user_id: offer.user_id,
            qty: fill_qty,
            price: offer.price,
        });
        remaining -= fill_qty;
    }

    MatchPlan { fills, remaining }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offer(id: u8, user: u8, price: i64, remaining: i64) -> RestingOffer {
        RestingOffer {
            order_id: Uuid::from_u128(id as u128),
            user_id: Uuid::from_u128(user as u128),
            price,
            remaining,
        }
    }

    #[test]
    fn market_buy_sweeps_full_depth_in_order() {
        let offers = vec![offer(1, 10, 100, 5), offer(2, 11, 101, 5)];
        let plan = plan_match(Direction::Buy, 7, None, &offers);
        assert_eq!(plan.fills.len(), 2);
        assert_eq!(plan.fills[0].qty, 5);
        assert_eq!(plan.fills[0].price, 100);
        assert_eq!(plan.fills[1].qty, 2);
        assert_eq!(plan.fills[1].price, 101);
        assert_eq!(plan.remaining, 0);
    }

    #[test]
    fn limit_buy_stops_at_price_limit() {
        let offers = vec![offer(1, 10, 100, 5), offer(2, 11, 105, 5)];
        let plan = plan_match(Direction::Buy, 10, Some(100), &offers);
        assert_eq!(plan.fills.len(), 1);
        assert_eq!(plan.fills[0].qty, 5);
        assert_eq!(plan.remaining, 5);
    }

    #[test]
    fn limit_sell_only_crosses_at_or_above_limit() {
        let offers = vec![offer(1, 10, 95, 5)];
        let plan = plan_match(Direction::Sell, 5, Some(100), &offers);
        assert!(plan.fills.is_empty());
        assert_eq!(plan.remaining, 5);
    }

    #[test]
    fn partial_fill_leaves_remainder_on_taker() {
        let offers = vec![offer(1, 10, 100, 3)];
        let plan = plan_match(Direction::Buy, 10, Some(100), &offers);
        assert_eq!(plan.filled(), 3);
        assert_eq!(plan.remaining, 7);
    }

    #[test]
    fn empty_book_fills_nothing() {
        let plan = plan_match(Direction::Buy, 10, None, &[]);
        assert!(plan.fills.is_empty());
        assert_eq!(plan.remaining, 10);
    }

    #[test]
    fn time_priority_preserved_when_book_is_pre_sorted() {
        let offers = vec![offer(1, 10, 100, 2), offer(2, 11, 100, 2)];
        let plan = plan_match(Direction::Buy, 3, None, &offers);
        assert_eq!(plan.fills.len(), 2);
        assert_eq!(plan.fills[0].maker_order_id, Uuid::from_u128(1));
        assert_eq!(plan.fills[0].qty, 2);
        assert_eq!(plan.fills[1].maker_order_id, Uuid::from_u128(2));
        assert_eq!(plan.fills[1].qty, 1);
    }
}
