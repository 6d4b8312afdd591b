//! Unit-price resolution for normalized tariff products
//!
//! Pure functions that pick the product currently in force and compute the
//! applicable EUR/kWh rate for a point in time, honoring the Italian F1/F2/F3
//! time-of-use bands and forecast-based dynamic pricing. All functions operate
//! on immutable snapshots; no locking is required.

use crate::model::{ProductEntry, UnitRateInformation};
use crate::normalize::{cents_str_to_eur, cents_to_eur};
use chrono::{DateTime, Datelike, Local, NaiveDateTime, Timelike, Utc};

/// Italian regulatory time-of-use bands: F1 peak, F2 mid, F3 off-peak
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfUseBand {
    F1,
    F2,
    F3,
}

impl TimeOfUseBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfUseBand::F1 => "F1",
            TimeOfUseBand::F2 => "F2",
            TimeOfUseBand::F3 => "F3",
        }
    }
}

/// Local "now" formatted for lexicographic ISO-8601 comparison
pub fn local_now_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

/// Return the most recent product that is currently valid
///
/// Validity windows are compared lexicographically as ISO-8601 strings; an
/// absent `validTo` is an unbounded future. Among matches the entry with the
/// greatest `validFrom` wins (first occurrence on ties). Entries without a
/// `validFrom` never match.
pub fn select_current_product<'a>(
    products: &'a [ProductEntry],
    now_iso: &str,
) -> Option<&'a ProductEntry> {
    let mut best: Option<&ProductEntry> = None;

    for product in products {
        let Some(valid_from) = product.valid_from.as_deref() else {
            continue;
        };
        if valid_from > now_iso {
            continue;
        }
        if let Some(valid_to) = product.valid_to.as_deref()
            && now_iso > valid_to
        {
            continue;
        }

        match best {
            Some(current) if product.valid_from <= current.valid_from => {}
            _ => best = Some(product),
        }
    }

    best
}

/// Approximate the Italian F1/F2/F3 band for the given local time
///
/// Monday-Friday: F1 08:00-19:00, F2 07:00-08:00 and 19:00-23:00, else F3.
/// Saturday: F2 07:00-23:00, else F3. Sunday: always F3.
pub fn determine_time_of_use_band(now: NaiveDateTime) -> TimeOfUseBand {
    let day = now.weekday().num_days_from_monday();
    let minutes = now.hour() * 60 + now.minute();

    if day < 5 {
        if (480..1140).contains(&minutes) {
            return TimeOfUseBand::F1;
        }
        if (420..480).contains(&minutes) || (1140..1380).contains(&minutes) {
            return TimeOfUseBand::F2;
        }
        return TimeOfUseBand::F3;
    }

    if day == 5 {
        if (420..1380).contains(&minutes) {
            return TimeOfUseBand::F2;
        }
        return TimeOfUseBand::F3;
    }

    TimeOfUseBand::F3
}

/// Determine the active rate for the supplied product at a local time
///
/// Non-time-of-use products yield their base rate (falling back to the legacy
/// gross-cents field). Time-of-use products map the current band to a rate,
/// with each tier falling back toward lower tiers, never upward.
pub fn active_timeslot_rate(product: &ProductEntry, now: NaiveDateTime) -> Option<f64> {
    let pricing = &product.pricing;

    if !product.is_time_of_use {
        return pricing
            .base
            .or_else(|| cents_str_to_eur(&product.gross_rate));
    }

    let band = determine_time_of_use_band(now);
    let rate = match band {
        TimeOfUseBand::F1 => pricing.base,
        TimeOfUseBand::F2 => pricing.f2.or(pricing.base),
        TimeOfUseBand::F3 => pricing.f3.or(pricing.f2).or(pricing.base),
    };

    rate.or_else(|| cents_str_to_eur(&product.gross_rate))
}

/// Get the current rate from the unit-rate forecast for dynamic pricing
///
/// Scans the forecast windows for the first whose half-open interval
/// `[validFrom, validTo)` contains `now`; a time-of-use variant reads the
/// first rate of its list, a simple variant its single rate, both converted
/// from cents to EUR. Returns `None` when no window matches.
pub fn current_forecast_rate(product: &ProductEntry, now: DateTime<Utc>) -> Option<f64> {
    for entry in &product.unit_rate_forecast {
        let (Some(valid_from_str), Some(valid_to_str)) =
            (entry.valid_from.as_deref(), entry.valid_to.as_deref())
        else {
            continue;
        };

        let parsed = (
            DateTime::parse_from_rfc3339(valid_from_str),
            DateTime::parse_from_rfc3339(valid_to_str),
        );
        let (Ok(valid_from), Ok(valid_to)) = parsed else {
            tracing::warn!("Unparseable forecast window {:?}-{:?}", valid_from_str, valid_to_str);
            continue;
        };

        if valid_from.with_timezone(&Utc) <= now && now < valid_to.with_timezone(&Utc) {
            let rate = match entry.unit_rate_information.as_ref() {
                Some(UnitRateInformation::TimeOfUse { rates }) => rates
                    .first()
                    .and_then(|r| cents_to_eur(r.latest_gross_unit_rate_cents_per_kwh.as_ref())),
                Some(UnitRateInformation::Simple {
                    latest_gross_unit_rate_cents_per_kwh,
                }) => cents_to_eur(latest_gross_unit_rate_cents_per_kwh.as_ref()),
                None => None,
            };
            if rate.is_some() {
                return rate;
            }
        }
    }

    None
}

/// Resolve the unit price to display for a product "now"
///
/// Time-of-use products try the forecast first, then the band rate, then the
/// base rate and legacy gross-cents fallback. Simple products start at the
/// base rate.
pub fn current_unit_price(
    product: &ProductEntry,
    now_local: NaiveDateTime,
    now_utc: DateTime<Utc>,
) -> Option<f64> {
    if product.is_time_of_use {
        if let Some(rate) = current_forecast_rate(product, now_utc) {
            return Some(rate);
        }
        if let Some(rate) = active_timeslot_rate(product, now_local) {
            return Some(rate);
        }
    }

    if let Some(rate) = product.pricing.base {
        return Some(rate);
    }

    cents_str_to_eur(&product.gross_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ForecastEntry, ForecastRate, ProductPricing};
    use chrono::{NaiveDate, TimeZone};
    use serde_json::json;

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn product(valid_from: Option<&str>, valid_to: Option<&str>) -> ProductEntry {
        ProductEntry {
            valid_from: valid_from.map(str::to_string),
            valid_to: valid_to.map(str::to_string),
            ..ProductEntry::default()
        }
    }

    #[test]
    fn band_approximation_matches_regulation() {
        // 2023-01-03 is a Tuesday
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 3, 9, 0)),
            TimeOfUseBand::F1
        );
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 3, 7, 30)),
            TimeOfUseBand::F2
        );
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 3, 19, 30)),
            TimeOfUseBand::F2
        );
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 3, 23, 30)),
            TimeOfUseBand::F3
        );
        // Saturday
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 7, 8, 0)),
            TimeOfUseBand::F2
        );
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 7, 6, 59)),
            TimeOfUseBand::F3
        );
        // Sunday noon
        assert_eq!(
            determine_time_of_use_band(naive(2023, 1, 8, 12, 0)),
            TimeOfUseBand::F3
        );
    }

    #[test]
    fn select_most_recently_started_valid_product() {
        let products = vec![
            product(Some("2023-01-01"), Some("2023-06-01")),
            product(Some("2023-06-01"), None),
        ];
        let selected = select_current_product(&products, "2023-07-01T00:00:00").unwrap();
        assert_eq!(selected.valid_from.as_deref(), Some("2023-06-01"));
    }

    #[test]
    fn select_skips_entries_without_valid_from() {
        let products = vec![product(None, None)];
        assert!(select_current_product(&products, "2023-07-01").is_none());

        let products = vec![product(Some("2024-01-01"), None)];
        assert!(select_current_product(&products, "2023-07-01").is_none());
    }

    #[test]
    fn select_prefers_first_on_equal_valid_from() {
        let mut first = product(Some("2023-01-01"), None);
        first.code = Some("FIRST".into());
        let mut second = product(Some("2023-01-01"), None);
        second.code = Some("SECOND".into());
        let products = vec![first, second];
        let selected = select_current_product(&products, "2023-07-01").unwrap();
        assert_eq!(selected.code.as_deref(), Some("FIRST"));
    }

    fn tou_product(base: Option<f64>, f2: Option<f64>, f3: Option<f64>) -> ProductEntry {
        ProductEntry {
            is_time_of_use: true,
            pricing: ProductPricing {
                base,
                f2,
                f3,
                ..ProductPricing::default()
            },
            gross_rate: "0".to_string(),
            ..ProductEntry::default()
        }
    }

    #[test]
    fn timeslot_rate_falls_back_downward() {
        let sunday_noon = naive(2023, 1, 8, 12, 0); // F3
        let product = tou_product(Some(0.10), Some(0.08), None);
        assert_eq!(active_timeslot_rate(&product, sunday_noon), Some(0.08));

        let product = tou_product(Some(0.10), None, None);
        assert_eq!(active_timeslot_rate(&product, sunday_noon), Some(0.10));

        let tuesday_nine = naive(2023, 1, 3, 9, 0); // F1
        let product = tou_product(Some(0.10), Some(0.08), Some(0.05));
        assert_eq!(active_timeslot_rate(&product, tuesday_nine), Some(0.10));
    }

    #[test]
    fn simple_product_uses_base_then_gross() {
        let now = naive(2023, 1, 3, 9, 0);
        let mut product = ProductEntry {
            gross_rate: "24.5".to_string(),
            ..ProductEntry::default()
        };
        assert_eq!(active_timeslot_rate(&product, now), Some(0.245));

        product.pricing.base = Some(0.30);
        assert_eq!(active_timeslot_rate(&product, now), Some(0.30));
    }

    fn forecast_entry(from: &str, to: &str, info: UnitRateInformation) -> ForecastEntry {
        ForecastEntry {
            valid_from: Some(from.to_string()),
            valid_to: Some(to.to_string()),
            unit_rate_information: Some(info),
        }
    }

    #[test]
    fn forecast_rate_picks_containing_window() {
        let mut product = tou_product(Some(0.10), None, None);
        product.unit_rate_forecast = vec![
            forecast_entry(
                "2023-07-01T00:00:00Z",
                "2023-07-01T01:00:00Z",
                UnitRateInformation::Simple {
                    latest_gross_unit_rate_cents_per_kwh: Some(json!("31.5")),
                },
            ),
            forecast_entry(
                "2023-07-01T01:00:00Z",
                "2023-07-01T02:00:00Z",
                UnitRateInformation::TimeOfUse {
                    rates: vec![ForecastRate {
                        latest_gross_unit_rate_cents_per_kwh: Some(json!(42.0)),
                    }],
                },
            ),
        ];

        let in_first = Utc.with_ymd_and_hms(2023, 7, 1, 0, 30, 0).unwrap();
        assert_eq!(current_forecast_rate(&product, in_first), Some(0.315));

        // Window start is inclusive, end exclusive
        let at_boundary = Utc.with_ymd_and_hms(2023, 7, 1, 1, 0, 0).unwrap();
        assert_eq!(current_forecast_rate(&product, at_boundary), Some(0.42));

        let outside = Utc.with_ymd_and_hms(2023, 7, 1, 3, 0, 0).unwrap();
        assert_eq!(current_forecast_rate(&product, outside), None);
    }

    #[test]
    fn price_priority_forecast_then_band_then_base() {
        let now_local = naive(2023, 7, 1, 12, 0); // Saturday noon: F2
        let now_utc = Utc.with_ymd_and_hms(2023, 7, 1, 10, 0, 0).unwrap();

        let mut product = tou_product(Some(0.10), Some(0.08), None);
        product.unit_rate_forecast = vec![forecast_entry(
            "2023-07-01T00:00:00Z",
            "2023-07-02T00:00:00Z",
            UnitRateInformation::Simple {
                latest_gross_unit_rate_cents_per_kwh: Some(json!("20")),
            },
        )];
        assert_eq!(current_unit_price(&product, now_local, now_utc), Some(0.20));

        product.unit_rate_forecast.clear();
        assert_eq!(current_unit_price(&product, now_local, now_utc), Some(0.08));

        let simple = ProductEntry {
            pricing: ProductPricing {
                base: Some(0.25),
                ..ProductPricing::default()
            },
            ..ProductEntry::default()
        };
        assert_eq!(current_unit_price(&simple, now_local, now_utc), Some(0.25));

        let legacy = ProductEntry {
            gross_rate: "18".to_string(),
            ..ProductEntry::default()
        };
        assert_eq!(current_unit_price(&legacy, now_local, now_utc), Some(0.18));

        let empty = ProductEntry {
            gross_rate: "n/a".to_string(),
            ..ProductEntry::default()
        };
        assert_eq!(current_unit_price(&empty, now_local, now_utc), None);
    }
}
