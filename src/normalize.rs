//! Normalization of the raw comprehensive-query payload
//!
//! Pure transforms that flatten Relay-style connections, merge the per-field
//! price sources and produce de-duplicated [`ProductEntry`] values from the
//! account / supply-point / agreement tree. No I/O and no shared state; the
//! caller owns the snapshot these functions produce.

use crate::model::{ProductEntry, ProductKind, ProductPricing, SupplyPointRef};
use serde_json::Value;
use std::collections::HashSet;

/// Convert a Relay-style connection to a plain list of nodes
///
/// Accepts `{edges: [{node}, ...]}` or an already-flat list; anything else
/// yields an empty list. Idempotent: flattening a flat list returns it as is.
pub fn flatten_connection(connection: Option<&Value>) -> Vec<Value> {
    match connection {
        Some(Value::Object(map)) => map
            .get("edges")
            .and_then(Value::as_array)
            .map(|edges| {
                edges
                    .iter()
                    .filter_map(|edge| edge.get("node"))
                    .filter(|node| !node.is_null())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default(),
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// Ensure property collections are present and agreements are flat lists
///
/// Mutates the raw account payload in place: `properties` becomes an array
/// (never absent), and each supply point's `agreements` connection is
/// replaced by its flattened node list.
pub fn normalize_account_properties(account: &mut Value) {
    let Some(account_map) = account.as_object_mut() else {
        return;
    };

    if !matches!(account_map.get("properties"), Some(Value::Array(_))) {
        account_map.insert("properties".to_string(), Value::Array(Vec::new()));
    }
    let Some(properties) = account_map
        .get_mut("properties")
        .and_then(Value::as_array_mut)
    else {
        return;
    };

    for property in properties.iter_mut() {
        let Some(property_map) = property.as_object_mut() else {
            continue;
        };
        for key in ["electricitySupplyPoints", "gasSupplyPoints"] {
            if !matches!(property_map.get(key), Some(Value::Array(_))) {
                property_map.insert(key.to_string(), Value::Array(Vec::new()));
                continue;
            }
            let Some(supply_points) = property_map.get_mut(key).and_then(Value::as_array_mut)
            else {
                continue;
            };
            for supply_point in supply_points.iter_mut() {
                let Some(sp_map) = supply_point.as_object_mut() else {
                    continue;
                };
                let flattened = flatten_connection(sp_map.get("agreements"));
                sp_map.insert("agreements".to_string(), Value::Array(flattened));
            }
        }
    }
}

/// Best-effort conversion of API decimal values to floats
pub fn to_float_or_none(value: Option<&Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Convert a cent value (number or numeric string) to EUR
pub fn cents_to_eur(value: Option<&Value>) -> Option<f64> {
    to_float_or_none(value).map(|cents| cents / 100.0)
}

/// Convert a cents string to EUR, tolerating malformed input
pub fn cents_str_to_eur(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().map(|cents| cents / 100.0)
}

/// Convert an amount in EUR/kWh to a string of cents for legacy consumers
///
/// Formatted to 6 decimal digits with trailing zeros stripped; `None` or a
/// malformed amount renders as "0".
pub fn format_cents_from_eur(amount: Option<f64>) -> String {
    let Some(amount) = amount else {
        return "0".to_string();
    };
    if !amount.is_finite() {
        return "0".to_string();
    }
    let cents = amount * 100.0;
    let formatted = format!("{:.6}", cents);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn get_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn get_bool(value: &Value, key: &str) -> Option<bool> {
    value.get(key).and_then(Value::as_bool)
}

/// Render an id field (string or number on the wire) as a string
fn id_to_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Prefer the "prices" value over the "params" value for one field
fn pick_value<'a>(prices: &'a Value, params: &'a Value, key: &str) -> Option<&'a Value> {
    match prices.get(key) {
        Some(value) if !value.is_null() => Some(value),
        _ => match params.get(key) {
            Some(value) if !value.is_null() => Some(value),
            _ => None,
        },
    }
}

static EMPTY_OBJECT: Value = Value::Null;

fn product_sources<'a>(
    supply_point: &'a Value,
    agreement: Option<&'a Value>,
) -> (Option<&'a Value>, Option<String>, Option<String>, Option<String>) {
    match agreement {
        Some(agreement) => (
            agreement.get("product").filter(|p| p.is_object()),
            get_str(agreement, "validFrom"),
            get_str(agreement, "validTo"),
            id_to_string(agreement.get("id")),
        ),
        None => (
            supply_point.get("product").filter(|p| p.is_object()),
            None,
            None,
            None,
        ),
    }
}

fn supply_point_ref(supply_point: &Value) -> SupplyPointRef {
    SupplyPointRef {
        id: id_to_string(supply_point.get("id")),
        pod: get_str(supply_point, "pod"),
        pdr: get_str(supply_point, "pdr"),
        status: get_str(supply_point, "status"),
        enrolment_status: get_str(supply_point, "enrolmentStatus"),
        enrolment_start_date: get_str(supply_point, "enrolmentStartDate"),
        supply_start_date: get_str(supply_point, "supplyStartDate"),
        is_smart_meter: get_bool(supply_point, "isSmartMeter"),
        cancellation_reason: get_str(supply_point, "cancellationReason"),
    }
}

/// Create a simplified product descriptor for electricity tariffs
pub fn build_electricity_product_entry(
    supply_point: &Value,
    agreement: Option<&Value>,
) -> Option<ProductEntry> {
    let (product, valid_from, valid_to, agreement_id) =
        product_sources(supply_point, agreement);
    let product = product?;
    if product.as_object().is_some_and(serde_json::Map::is_empty) {
        return None;
    }

    let params = product.get("params").unwrap_or(&EMPTY_OBJECT);
    let prices = product.get("prices").unwrap_or(&EMPTY_OBJECT);

    let base_rate = to_float_or_none(pick_value(prices, params, "consumptionCharge"));
    let f2_rate = to_float_or_none(pick_value(prices, params, "consumptionChargeF2"));
    let f3_rate = to_float_or_none(pick_value(prices, params, "consumptionChargeF3"));
    let annual_charge = to_float_or_none(pick_value(prices, params, "annualStandingCharge"));
    let units = pick_value(prices, params, "consumptionChargeUnits")
        .and_then(Value::as_str)
        .map(str::to_string);
    let annual_units = pick_value(prices, params, "annualStandingChargeUnits")
        .and_then(Value::as_str)
        .map(str::to_string);

    let product_type = get_str(params, "productType").or_else(|| get_str(prices, "productType"));
    let normalized_type = product_type
        .as_deref()
        .map(str::to_lowercase)
        .unwrap_or_default();
    let is_time_of_use = f2_rate.is_some()
        || f3_rate.is_some()
        || matches!(normalized_type.as_str(), "time_of_use" | "timeofuse" | "tou");

    Some(ProductEntry {
        code: get_str(product, "code"),
        description: get_str(product, "description"),
        name: get_str(product, "fullName").or_else(|| get_str(product, "displayName")),
        display_name: get_str(product, "displayName"),
        valid_from,
        valid_to,
        agreement_id,
        product_type,
        is_time_of_use,
        kind: if is_time_of_use {
            ProductKind::TimeOfUse
        } else {
            ProductKind::Simple
        },
        terms_and_conditions_url: get_str(product, "termsAndConditionsUrl"),
        pricing: ProductPricing {
            base: base_rate,
            f2: f2_rate,
            f3: f3_rate,
            units,
            annual_standing_charge: annual_charge,
            annual_standing_charge_units: annual_units,
        },
        supply_point: supply_point_ref(supply_point),
        gross_rate: format_cents_from_eur(base_rate),
        unit_rate_forecast: Vec::new(),
    })
}

/// Create a simplified product descriptor for gas tariffs
pub fn build_gas_product_entry(
    supply_point: &Value,
    agreement: Option<&Value>,
) -> Option<ProductEntry> {
    let (product, valid_from, valid_to, agreement_id) =
        product_sources(supply_point, agreement);
    let product = product?;
    if product.as_object().is_some_and(serde_json::Map::is_empty) {
        return None;
    }

    let params = product.get("params").unwrap_or(&EMPTY_OBJECT);
    let prices = product.get("prices").unwrap_or(&EMPTY_OBJECT);

    let base_rate = to_float_or_none(pick_value(prices, params, "consumptionCharge"));
    let annual_charge = to_float_or_none(pick_value(prices, params, "annualStandingCharge"));
    // Gas tariffs carry their units on the params object only
    let units = params
        .get("consumptionChargeUnits")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(ProductEntry {
        code: get_str(product, "code"),
        description: get_str(product, "description"),
        name: get_str(product, "fullName").or_else(|| get_str(product, "displayName")),
        display_name: get_str(product, "displayName"),
        valid_from,
        valid_to,
        agreement_id,
        product_type: None,
        is_time_of_use: false,
        kind: ProductKind::Simple,
        terms_and_conditions_url: get_str(product, "termsAndConditionsUrl"),
        pricing: ProductPricing {
            base: base_rate,
            f2: None,
            f3: None,
            units,
            annual_standing_charge: annual_charge,
            annual_standing_charge_units: None,
        },
        supply_point: supply_point_ref(supply_point),
        gross_rate: format_cents_from_eur(base_rate),
        unit_rate_forecast: Vec::new(),
    })
}

type EntryKey = (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
);

fn entry_key(entry: &ProductEntry) -> EntryKey {
    (
        entry.code.clone(),
        entry.valid_from.clone(),
        entry.valid_to.clone(),
        entry.agreement_id.clone(),
        entry.supply_point.id.clone(),
    )
}

fn extract_products<F>(account: &Value, supply_point_key: &str, build: F) -> Vec<ProductEntry>
where
    F: Fn(&Value, Option<&Value>) -> Option<ProductEntry>,
{
    let mut products = Vec::new();
    let mut seen_keys: HashSet<EntryKey> = HashSet::new();

    let properties = account
        .get("properties")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for property in &properties {
        let supply_points = property
            .get(supply_point_key)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for supply_point in &supply_points {
            let agreements = flatten_connection(supply_point.get("agreements"));

            if agreements.is_empty() {
                if let Some(entry) = build(supply_point, None)
                    && seen_keys.insert(entry_key(&entry))
                {
                    products.push(entry);
                }
                continue;
            }

            for agreement in &agreements {
                if let Some(entry) = build(supply_point, Some(agreement))
                    && seen_keys.insert(entry_key(&entry))
                {
                    products.push(entry);
                }
            }
        }
    }

    products
}

/// Collect electricity products from the account payload
///
/// One entry per agreement where agreements exist, otherwise one entry from
/// the supply point's bare product. Duplicate keys keep the first occurrence.
pub fn extract_electricity_products(account: &Value) -> Vec<ProductEntry> {
    extract_products(
        account,
        "electricitySupplyPoints",
        build_electricity_product_entry,
    )
}

/// Collect gas products from the account payload
pub fn extract_gas_products(account: &Value) -> Vec<ProductEntry> {
    extract_products(account, "gasSupplyPoints", build_gas_product_entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_connection_unwraps_edges() {
        let connection = json!({"edges": [{"node": {"id": 1}}, {"node": {"id": 2}}]});
        let nodes = flatten_connection(Some(&connection));
        assert_eq!(nodes, vec![json!({"id": 1}), json!({"id": 2})]);
    }

    #[test]
    fn flatten_connection_is_idempotent() {
        let flat = json!([{"id": 1}]);
        let once = flatten_connection(Some(&flat));
        assert_eq!(once, vec![json!({"id": 1})]);
        let twice = flatten_connection(Some(&Value::Array(once.clone())));
        assert_eq!(once, twice);

        assert!(flatten_connection(Some(&json!({"edges": []}))).is_empty());
        assert!(flatten_connection(None).is_empty());
        assert!(flatten_connection(Some(&Value::Null)).is_empty());
        assert!(flatten_connection(Some(&json!("bogus"))).is_empty());
    }

    #[test]
    fn flatten_connection_skips_empty_edges() {
        let connection = json!({"edges": [{"node": {"id": 1}}, {}, {"node": null}]});
        let nodes = flatten_connection(Some(&connection));
        assert_eq!(nodes.len(), 1);
    }

    #[test]
    fn normalize_fills_missing_collections() {
        let mut account = json!({"id": "A-1"});
        normalize_account_properties(&mut account);
        assert_eq!(account["properties"], json!([]));

        let mut account = json!({
            "properties": [{
                "id": "P-1",
                "electricitySupplyPoints": [{
                    "id": "SP-1",
                    "agreements": {"edges": [{"node": {"id": 7}}]}
                }]
            }]
        });
        normalize_account_properties(&mut account);
        assert_eq!(
            account["properties"][0]["electricitySupplyPoints"][0]["agreements"],
            json!([{"id": 7}])
        );
        assert_eq!(account["properties"][0]["gasSupplyPoints"], json!([]));
    }

    #[test]
    fn to_float_handles_strings_and_numbers() {
        assert_eq!(to_float_or_none(Some(&json!(1.5))), Some(1.5));
        assert_eq!(to_float_or_none(Some(&json!("0.245"))), Some(0.245));
        assert_eq!(to_float_or_none(Some(&json!("n/a"))), None);
        assert_eq!(to_float_or_none(Some(&Value::Null)), None);
        assert_eq!(to_float_or_none(None), None);
    }

    #[test]
    fn cents_conversions_are_symmetric() {
        let eur = cents_str_to_eur("24.5").unwrap();
        assert!((eur - 0.245).abs() < 1e-9);
        assert_eq!(format_cents_from_eur(Some(eur)), "24.5");

        assert_eq!(format_cents_from_eur(Some(0.1)), "10");
        assert_eq!(format_cents_from_eur(None), "0");
        assert_eq!(format_cents_from_eur(Some(f64::NAN)), "0");
        assert_eq!(cents_str_to_eur("garbage"), None);
    }

    fn electricity_supply_point(agreements: Value) -> Value {
        json!({
            "id": "SP-1",
            "pod": "IT001E123",
            "status": "ACTIVE",
            "isSmartMeter": true,
            "product": {
                "code": "BARE",
                "displayName": "Bare Product",
                "params": {"consumptionCharge": "0.30"}
            },
            "agreements": agreements
        })
    }

    fn agreement(id: u64, code: &str) -> Value {
        json!({
            "id": id,
            "validFrom": "2023-01-01",
            "validTo": "2023-06-01",
            "product": {
                "code": code,
                "fullName": "Full Name",
                "displayName": "Display",
                "params": {
                    "productType": "standard",
                    "consumptionCharge": "0.30",
                    "annualStandingCharge": "60"
                },
                "prices": {
                    "consumptionCharge": "0.25",
                    "consumptionChargeUnits": "EUR/kWh"
                }
            }
        })
    }

    #[test]
    fn prices_preferred_over_params_per_field() {
        let sp = electricity_supply_point(json!([agreement(1, "TARIFF")]));
        let account = json!({"properties": [{"electricitySupplyPoints": [sp]}]});
        let products = extract_electricity_products(&account);
        assert_eq!(products.len(), 1);
        let entry = &products[0];
        // consumptionCharge comes from prices, annualStandingCharge from params
        assert_eq!(entry.pricing.base, Some(0.25));
        assert_eq!(entry.pricing.annual_standing_charge, Some(60.0));
        assert_eq!(entry.pricing.units.as_deref(), Some("EUR/kWh"));
        assert_eq!(entry.name.as_deref(), Some("Full Name"));
        assert_eq!(entry.agreement_id.as_deref(), Some("1"));
        assert_eq!(entry.gross_rate, "25");
        assert!(!entry.is_time_of_use);
    }

    #[test]
    fn duplicate_agreements_keep_first_entry() {
        let sp = electricity_supply_point(json!([agreement(1, "TARIFF"), agreement(1, "TARIFF")]));
        let account = json!({"properties": [{"electricitySupplyPoints": [sp]}]});
        let products = extract_electricity_products(&account);
        assert_eq!(products.len(), 1);
    }

    #[test]
    fn bare_product_used_without_agreements() {
        let sp = electricity_supply_point(json!([]));
        let account = json!({"properties": [{"electricitySupplyPoints": [sp]}]});
        let products = extract_electricity_products(&account);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].code.as_deref(), Some("BARE"));
        assert!(products[0].valid_from.is_none());
        assert!(products[0].agreement_id.is_none());
    }

    #[test]
    fn tou_classification_by_tier_or_type() {
        let mut agr = agreement(1, "TOU-TARIFF");
        agr["product"]["prices"]["consumptionChargeF2"] = json!("0.22");
        let sp = electricity_supply_point(json!([agr]));
        let account = json!({"properties": [{"electricitySupplyPoints": [sp]}]});
        let products = extract_electricity_products(&account);
        assert!(products[0].is_time_of_use);
        assert_eq!(products[0].kind, ProductKind::TimeOfUse);

        let mut agr = agreement(2, "TYPE-TARIFF");
        agr["product"]["params"]["productType"] = json!("TIME_OF_USE");
        let sp = electricity_supply_point(json!([agr]));
        let account = json!({"properties": [{"electricitySupplyPoints": [sp]}]});
        let products = extract_electricity_products(&account);
        assert!(products[0].is_time_of_use);
    }

    #[test]
    fn gas_entries_have_no_tiers() {
        let account = json!({
            "properties": [{
                "gasSupplyPoints": [{
                    "id": "GSP-1",
                    "pdr": "00123",
                    "product": {
                        "code": "GAS",
                        "displayName": "Gas Tariff",
                        "params": {
                            "consumptionCharge": "0.95",
                            "consumptionChargeUnits": "EUR/Smc"
                        },
                        "prices": {"consumptionCharge": "0.90"}
                    },
                    "agreements": []
                }]
            }]
        });
        let products = extract_gas_products(&account);
        assert_eq!(products.len(), 1);
        let entry = &products[0];
        assert_eq!(entry.pricing.base, Some(0.90));
        assert!(entry.pricing.f2.is_none());
        assert_eq!(entry.pricing.units.as_deref(), Some("EUR/Smc"));
        assert_eq!(entry.supply_point.pdr.as_deref(), Some("00123"));
        assert!(!entry.is_time_of_use);
    }

    #[test]
    fn missing_product_yields_no_entry() {
        let account = json!({
            "properties": [{
                "electricitySupplyPoints": [{"id": "SP-1", "agreements": []}]
            }]
        });
        assert!(extract_electricity_products(&account).is_empty());
    }
}
