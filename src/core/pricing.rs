//! Seat pricing.
//!
//! A seat costs its trip's zone price; front seats carry a 20% premium. Each seat is
//! rounded to whole currency units (banker's rounding) before summing, so the booking
//! total is the sum of individually rounded seat prices.

use crate::entities::{SeatZone, trip};
use rust_decimal::{Decimal, RoundingStrategy};

/// Multiplier applied to front-zone seats.
pub const FRONT_SEAT_MULTIPLIER: Decimal = Decimal::from_parts(12, 0, 0, false, 1);

/// Price multiplier of a zone.
#[must_use]
pub const fn zone_multiplier(zone: SeatZone) -> Decimal {
    match zone {
        SeatZone::Front => FRONT_SEAT_MULTIPLIER,
        SeatZone::Middle | SeatZone::Back => Decimal::ONE,
    }
}

/// Price of one seat in `zone` on `trip`, rounded half-to-even to whole units.
#[must_use]
pub fn seat_price(trip: &trip::Model, zone: SeatZone) -> Decimal {
    snapshot_price(trip.zone_price(zone), zone)
}

/// Price of a seat whose zone price was snapshotted as `cost`.
#[must_use]
pub fn snapshot_price(cost: Decimal, zone: SeatZone) -> Decimal {
    (cost * zone_multiplier(zone)).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
}

/// Sum of [`seat_price`] over `zones`.
#[must_use]
pub fn total_price<I>(trip: &trip::Model, zones: I) -> Decimal
where
    I: IntoIterator<Item = SeatZone>,
{
    zones.into_iter().map(|zone| seat_price(trip, zone)).sum()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::sample_trip_model;

    fn d(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_front_multiplier_value() {
        assert_eq!(FRONT_SEAT_MULTIPLIER, d("1.2"));
    }

    #[test]
    fn test_seat_price_by_zone() {
        let trip = sample_trip_model(d("1000"), d("900"), d("800"));
        assert_eq!(seat_price(&trip, SeatZone::Front), d("1200"));
        assert_eq!(seat_price(&trip, SeatZone::Middle), d("900"));
        assert_eq!(seat_price(&trip, SeatZone::Back), d("800"));
    }

    #[test]
    fn test_rounding_is_per_seat_half_even() {
        // 1002.5 * 1.2 = 1203.0; 10.5 back rounds to 10, 11.5 rounds to 12
        let trip = sample_trip_model(d("1002.5"), d("11.5"), d("10.5"));
        assert_eq!(seat_price(&trip, SeatZone::Front), d("1203"));
        assert_eq!(seat_price(&trip, SeatZone::Back), d("10"));
        assert_eq!(seat_price(&trip, SeatZone::Middle), d("12"));
        assert_eq!(
            total_price(&trip, [SeatZone::Back, SeatZone::Back]),
            d("20")
        );
    }

    #[test]
    fn test_snapshot_price_matches_seat_price() {
        let trip = sample_trip_model(d("1002.5"), d("900"), d("10.5"));
        assert_eq!(
            snapshot_price(d("1002.5"), SeatZone::Front),
            seat_price(&trip, SeatZone::Front)
        );
        assert_eq!(snapshot_price(d("10.5"), SeatZone::Back), d("10"));
    }

    #[test]
    fn test_front_plus_back_total() {
        let trip = sample_trip_model(d("1000"), d("1000"), d("1000"));
        assert_eq!(
            total_price(&trip, [SeatZone::Front, SeatZone::Back]),
            d("2200")
        );
    }
}
