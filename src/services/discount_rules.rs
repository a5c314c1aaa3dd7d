//! Coupon rules over already-loaded data: eligibility, stacking and the
//! discount amount. Nothing here touches the database.

use crate::entities::{CouponScope, DiscountType, coupon_entity, order_item_entity};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

/// Everything eligibility needs to know about one (order, coupon) pair.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityContext<'a> {
    pub order_owner: i64,
    /// Product ids of the order's items
    pub order_products: &'a [i64],
    pub coupon: &'a coupon_entity::Model,
    pub coupon_products: &'a [i64],
    pub coupon_users: &'a [i64],
}

/// `valid_from <= now` and, when bounded, `now <= valid_until`.
pub fn is_within_validity(coupon: &coupon_entity::Model, now: DateTime<Utc>) -> bool {
    if now < coupon.valid_from {
        return false;
    }
    match coupon.valid_until {
        Some(until) => now <= until,
        None => true,
    }
}

pub fn can_apply_discount(ctx: &EligibilityContext<'_>, now: DateTime<Utc>) -> bool {
    if !is_within_validity(ctx.coupon, now) {
        return false;
    }

    let restricted_products = !ctx.coupon_products.is_empty();
    let restricted_users = !ctx.coupon_users.is_empty();

    let owner_allowed = || ctx.coupon_users.contains(&ctx.order_owner);
    let product_overlap = || {
        let allowed: HashSet<i64> = ctx.coupon_products.iter().copied().collect();
        ctx.order_products.iter().any(|p| allowed.contains(p))
    };

    match (restricted_products, restricted_users) {
        (false, false) => true,
        (true, true) => owner_allowed() && product_overlap(),
        (true, false) => product_overlap(),
        (false, true) => owner_allowed(),
    }
}

/// An order's first discount is always allowed; further ones need a recursive coupon.
pub fn can_stack(existing_discounts: u64, coupon: &coupon_entity::Model) -> bool {
    existing_discounts == 0 || coupon.recursive
}

/// Amount `coupon` takes off the order made of `items`.
///
/// Product-restricted coupons only look at items whose product is in
/// `coupon_products`; the other scopes discount the whole order. The result
/// is rounded to cents and never exceeds the subtotal it was computed from.
pub fn calculate_discount(
    coupon: &coupon_entity::Model,
    coupon_products: &[i64],
    items: &[order_item_entity::Model],
) -> Decimal {
    let hundred = Decimal::ONE_HUNDRED;

    let (base, raw) = if coupon.can_use_for.is_product_restricted() {
        let allowed: HashSet<i64> = coupon_products.iter().copied().collect();
        let matching: Vec<&order_item_entity::Model> = items
            .iter()
            .filter(|i| allowed.contains(&i.product_id))
            .collect();
        let base: Decimal = matching.iter().map(|i| i.subtotal).sum();

        let raw = match coupon.discount_type {
            DiscountType::Percent => matching
                .iter()
                .map(|i| i.subtotal * coupon.discount / hundred)
                .sum(),
            DiscountType::Currency => matching
                .iter()
                .map(|i| Decimal::from(i.quantity) * coupon.discount)
                .sum(),
            DiscountType::Free => base,
        };
        (base, raw)
    } else {
        let base: Decimal = items.iter().map(|i| i.subtotal).sum();
        let raw = match coupon.discount_type {
            DiscountType::Percent => base * coupon.discount / hundred,
            DiscountType::Currency => coupon.discount,
            DiscountType::Free => base,
        };
        (base, raw)
    };

    raw.round_dp(2).clamp(Decimal::ZERO, base.max(Decimal::ZERO))
}

/// Scope stored on the coupon, from which restriction sets are non-empty.
pub fn derive_scope(products: &[i64], users: &[i64]) -> CouponScope {
    CouponScope::from_restrictions(!products.is_empty(), !users.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn coupon(discount_type: DiscountType, discount: Decimal, scope: CouponScope) -> coupon_entity::Model {
        coupon_entity::Model {
            id: 1,
            code: "SUMMER".to_string(),
            valid_from: now() - Duration::days(1),
            valid_until: Some(now() + Duration::days(1)),
            quantity: 10,
            discount_type,
            discount,
            can_use_for: scope,
            recursive: false,
            created_at: None,
            updated_at: None,
        }
    }

    fn item(id: i64, product_id: i64, quantity: i32, subtotal: Decimal) -> order_item_entity::Model {
        order_item_entity::Model {
            id,
            order_id: 1,
            product_id,
            quantity,
            subtotal,
            created_at: None,
            updated_at: None,
        }
    }

    fn ctx<'a>(
        owner: i64,
        order_products: &'a [i64],
        coupon: &'a coupon_entity::Model,
        coupon_products: &'a [i64],
        coupon_users: &'a [i64],
    ) -> EligibilityContext<'a> {
        EligibilityContext {
            order_owner: owner,
            order_products,
            coupon,
            coupon_products,
            coupon_users,
        }
    }

    #[test]
    fn test_unrestricted_coupon_applies_to_any_order() {
        let c = coupon(DiscountType::Percent, dec!(10), CouponScope::All);
        assert!(can_apply_discount(&ctx(7, &[1, 2], &c, &[], &[]), now()));
        assert!(can_apply_discount(&ctx(8, &[], &c, &[], &[]), now()));
    }

    #[test]
    fn test_product_restriction_needs_overlap() {
        let c = coupon(DiscountType::Percent, dec!(10), CouponScope::Product);
        assert!(!can_apply_discount(&ctx(7, &[2], &c, &[1], &[]), now()));
        assert!(can_apply_discount(&ctx(7, &[2, 1], &c, &[1], &[]), now()));
    }

    #[test]
    fn test_user_restriction_checks_owner() {
        let c = coupon(DiscountType::Currency, dec!(5), CouponScope::Client);
        assert!(can_apply_discount(&ctx(7, &[1], &c, &[], &[7, 9]), now()));
        assert!(!can_apply_discount(&ctx(8, &[1], &c, &[], &[7, 9]), now()));
    }

    #[test]
    fn test_product_and_user_restriction_needs_both() {
        let c = coupon(DiscountType::Free, dec!(0), CouponScope::ProductClient);
        assert!(can_apply_discount(&ctx(7, &[1], &c, &[1], &[7]), now()));
        assert!(!can_apply_discount(&ctx(8, &[1], &c, &[1], &[7]), now()));
        assert!(!can_apply_discount(&ctx(7, &[2], &c, &[1], &[7]), now()));
    }

    #[test]
    fn test_validity_window() {
        let mut c = coupon(DiscountType::Percent, dec!(10), CouponScope::All);
        assert!(can_apply_discount(&ctx(1, &[], &c, &[], &[]), now()));

        c.valid_from = now() + Duration::hours(1);
        assert!(!can_apply_discount(&ctx(1, &[], &c, &[], &[]), now()));

        c.valid_from = now() - Duration::days(10);
        c.valid_until = Some(now() - Duration::seconds(1));
        assert!(!can_apply_discount(&ctx(1, &[], &c, &[], &[]), now()));

        c.valid_until = None;
        assert!(can_apply_discount(&ctx(1, &[], &c, &[], &[]), now()));
    }

    #[test]
    fn test_validity_bounds_are_inclusive() {
        let mut c = coupon(DiscountType::Percent, dec!(10), CouponScope::All);
        c.valid_from = now();
        c.valid_until = Some(now());
        assert!(is_within_validity(&c, now()));
    }

    #[test]
    fn test_stacking() {
        let mut c = coupon(DiscountType::Percent, dec!(10), CouponScope::All);
        assert!(can_stack(0, &c));
        assert!(!can_stack(1, &c));
        c.recursive = true;
        assert!(can_stack(1, &c));
        assert!(can_stack(3, &c));
    }

    #[test]
    fn test_percent_on_whole_order() {
        let c = coupon(DiscountType::Percent, dec!(10), CouponScope::All);
        let items = vec![item(1, 1, 2, dec!(150.00)), item(2, 2, 1, dec!(50.00))];
        assert_eq!(calculate_discount(&c, &[], &items), dec!(20.00));
    }

    #[test]
    fn test_percent_on_restricted_products() {
        let c = coupon(DiscountType::Percent, dec!(25), CouponScope::Product);
        let items = vec![item(1, 1, 2, dec!(80.00)), item(2, 2, 1, dec!(50.00))];
        assert_eq!(calculate_discount(&c, &[1], &items), dec!(20.00));
    }

    #[test]
    fn test_currency_per_unit_on_restricted_products() {
        let c = coupon(DiscountType::Currency, dec!(3), CouponScope::ProductClient);
        let items = vec![item(1, 1, 4, dec!(40.00)), item(2, 2, 5, dec!(50.00))];
        assert_eq!(calculate_discount(&c, &[1], &items), dec!(12.00));
    }

    #[test]
    fn test_currency_flat_on_whole_order() {
        let c = coupon(DiscountType::Currency, dec!(15), CouponScope::Client);
        let items = vec![item(1, 1, 4, dec!(40.00))];
        assert_eq!(calculate_discount(&c, &[], &items), dec!(15));
    }

    #[test]
    fn test_free_covers_matching_subtotal() {
        let c = coupon(DiscountType::Free, dec!(0), CouponScope::Product);
        let items = vec![item(1, 1, 1, dec!(9.99)), item(2, 2, 1, dec!(5.00))];
        assert_eq!(calculate_discount(&c, &[2], &items), dec!(5.00));

        let c = coupon(DiscountType::Free, dec!(0), CouponScope::All);
        assert_eq!(calculate_discount(&c, &[], &items), dec!(14.99));
    }

    #[test]
    fn test_discount_never_exceeds_base() {
        let c = coupon(DiscountType::Currency, dec!(100), CouponScope::All);
        let items = vec![item(1, 1, 1, dec!(30.00))];
        assert_eq!(calculate_discount(&c, &[], &items), dec!(30.00));

        let c = coupon(DiscountType::Percent, dec!(10), CouponScope::All);
        assert_eq!(calculate_discount(&c, &[], &[]), Decimal::ZERO);
    }

    #[test]
    fn test_discount_rounded_to_cents() {
        let c = coupon(DiscountType::Percent, dec!(15), CouponScope::All);
        let items = vec![item(1, 1, 1, dec!(33.33))];
        assert_eq!(calculate_discount(&c, &[], &items), dec!(5.00));
    }

    #[test]
    fn test_derive_scope() {
        assert_eq!(derive_scope(&[1], &[2]), CouponScope::ProductClient);
        assert_eq!(derive_scope(&[1], &[]), CouponScope::Product);
        assert_eq!(derive_scope(&[], &[2]), CouponScope::Client);
        assert_eq!(derive_scope(&[], &[]), CouponScope::All);
    }
}
