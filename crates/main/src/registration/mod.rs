//! Public registration flow: the form, the review step, the stored
//! registration and the payment-status lookup that follows it.

pub mod register;
pub mod status;

use db::participant;

/// Ticket prices in rupiah.
pub const PRICE_GENERAL: i64 = 750_000;
pub const PRICE_WORKSHOP: i64 = 1_250_000;

pub fn price_of(participant_type: &str) -> i64 {
    match participant_type {
        participant::TYPE_WORKSHOP => PRICE_WORKSHOP,
        _ => PRICE_GENERAL,
    }
}

/// Applies a percentage discount, rounding the discounted amount down to
/// the nearest rupiah.
pub fn apply_discount(total: i64, discount_percent: i64) -> i64 {
    total - (total * discount_percent) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_by_participant_type() {
        assert_eq!(price_of("general"), PRICE_GENERAL);
        assert_eq!(price_of("workshop"), PRICE_WORKSHOP);
    }

    #[test]
    fn discounts_are_percentages_of_the_total() {
        assert_eq!(apply_discount(1_000_000, 0), 1_000_000);
        assert_eq!(apply_discount(1_000_000, 10), 900_000);
        assert_eq!(apply_discount(1_000_000, 100), 0);
        // rounds in the attendee's favour
        assert_eq!(apply_discount(999, 10), 900);
    }
}
