//! Typed records for the Kraken account, tariff and device data
//!
//! These structs mirror the wire schema (camelCase) after the normalizer has
//! flattened Relay-style connections. Decimal values arrive from the API as
//! either JSON numbers or strings, so raw price fields stay as
//! `serde_json::Value` and are converted with the normalizer's numeric
//! helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ledger entry attached to an account (balance in cents)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Ledger {
    pub balance: Option<Value>,
    pub ledger_type: Option<String>,
}

/// Immutable account snapshot produced by one comprehensive fetch
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub id: Option<String>,
    pub ledgers: Vec<Ledger>,
    pub properties: Vec<Property>,
}

/// Property holding the supply points of an account
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Property {
    pub id: Option<String>,
    pub electricity_supply_points: Vec<ElectricitySupplyPoint>,
    pub gas_supply_points: Vec<GasSupplyPoint>,
}

/// Electricity supply point (POD) with its current product and agreements
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ElectricitySupplyPoint {
    pub id: Option<String>,
    pub pod: Option<String>,
    pub status: Option<String>,
    pub enrolment_status: Option<String>,
    pub enrolment_start_date: Option<String>,
    pub supply_start_date: Option<String>,
    pub cancellation_reason: Option<String>,
    pub is_smart_meter: Option<bool>,
    pub product: Option<Product>,
    /// Flattened agreement nodes (the normalizer unwraps the connection)
    pub agreements: Vec<Agreement>,
}

/// Gas supply point (PDR) with its current product and agreements
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GasSupplyPoint {
    pub id: Option<String>,
    pub pdr: Option<String>,
    pub status: Option<String>,
    pub enrolment_status: Option<String>,
    pub enrolment_start_date: Option<String>,
    pub supply_start_date: Option<String>,
    pub cancellation_reason: Option<String>,
    pub is_smart_meter: Option<bool>,
    pub product: Option<Product>,
    pub agreements: Vec<Agreement>,
}

/// Bounded-validity contractual assignment of a product to a supply point
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Agreement {
    pub id: Option<Value>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub agreed_at: Option<String>,
    pub terminated_at: Option<String>,
    pub is_active: Option<bool>,
    pub product: Option<Product>,
}

/// Tariff product as reported by the API
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Product {
    pub code: Option<String>,
    pub description: Option<String>,
    pub display_name: Option<String>,
    pub full_name: Option<String>,
    pub terms_and_conditions_url: Option<String>,
    pub valid_to: Option<String>,
    pub params: Option<ProductParams>,
    pub prices: Option<ProductPrices>,
}

/// Contract parameter set; secondary price source
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductParams {
    pub product_type: Option<String>,
    pub annual_standing_charge: Option<Value>,
    pub consumption_charge: Option<Value>,
    pub consumption_charge_f2: Option<Value>,
    pub consumption_charge_f3: Option<Value>,
    pub consumption_charge_units: Option<String>,
}

/// Published price set; preferred price source
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductPrices {
    pub product_type: Option<String>,
    pub annual_standing_charge: Option<Value>,
    pub annual_standing_charge_units: Option<String>,
    pub consumption_charge: Option<Value>,
    pub consumption_charge_f2: Option<Value>,
    pub consumption_charge_f3: Option<Value>,
    pub consumption_charge_units: Option<String>,
}

/// Smart device attached to an account
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Device {
    pub id: Option<String>,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub integration_device_id: Option<String>,
    pub provider: Option<String>,
    pub status: Option<DeviceStatus>,
    pub preferences: Option<DevicePreferences>,
    pub preference_setting: Option<PreferenceSetting>,
    pub alerts: Vec<DeviceAlert>,
    /// Only present on SmartFlexVehicle devices
    pub vehicle_variant: Option<VehicleVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceStatus {
    pub current: Option<String>,
    pub current_state: Option<String>,
    pub is_suspended: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DevicePreferences {
    pub mode: Option<String>,
    pub schedules: Vec<PreferenceSchedule>,
    pub target_type: Option<String>,
    pub unit: Option<String>,
    pub grid_export: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceSchedule {
    pub day_of_week: Option<String>,
    pub max: Option<Value>,
    pub min: Option<Value>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceSetting {
    pub device_type: Option<String>,
    pub id: Option<String>,
    pub mode: Option<String>,
    pub schedule_settings: Vec<ScheduleSetting>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleSetting {
    pub id: Option<String>,
    pub max: Option<Value>,
    pub min: Option<Value>,
    pub step: Option<Value>,
    pub time_from: Option<String>,
    pub time_step: Option<Value>,
    pub time_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceAlert {
    pub message: Option<String>,
    pub published_at: Option<String>,
}

/// Vehicle metadata present on SmartFlexVehicle devices
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleVariant {
    pub model: Option<String>,
    pub battery_size: Option<Value>,
}

/// Energy-delivery window, historical or (reshaped) forward-looking
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Dispatch {
    pub start: Option<String>,
    pub start_dt: Option<String>,
    pub end: Option<String>,
    pub end_dt: Option<String>,
    pub delta: Option<Value>,
    pub delta_kwh: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub meta: Option<DispatchMeta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchMeta {
    pub location: Option<String>,
    pub source: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub device_id: Option<String>,
}

/// Forward-looking dispatch as returned by the per-device flex query
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FlexPlannedDispatch {
    pub start: Option<String>,
    pub end: Option<String>,
    pub energy_added_kwh: Option<Value>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Latest reading of a gas or electricity meter
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct MeterReading {
    pub value: Option<Value>,
    pub read_at: Option<String>,
    pub register_obis_code: Option<String>,
    pub type_of_read: Option<String>,
    pub origin: Option<String>,
    pub meter_id: Option<String>,
    pub register_type: Option<String>,
}

/// Account entry returned by the discovery query
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountSummary {
    pub number: String,
    pub ledgers: Vec<Ledger>,
}

/// Simple vs time-of-use tariff classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProductKind {
    #[default]
    Simple,
    TimeOfUse,
}

/// Resolved per-field price view of a product
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductPricing {
    /// Base (F1) consumption charge in EUR/kWh
    pub base: Option<f64>,
    /// F2 tier consumption charge, if the tariff has one
    pub f2: Option<f64>,
    /// F3 tier consumption charge, if the tariff has one
    pub f3: Option<f64>,
    pub units: Option<String>,
    pub annual_standing_charge: Option<f64>,
    pub annual_standing_charge_units: Option<String>,
}

/// Supply point identity carried on each normalized product entry
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SupplyPointRef {
    pub id: Option<String>,
    pub pod: Option<String>,
    pub pdr: Option<String>,
    pub status: Option<String>,
    pub enrolment_status: Option<String>,
    pub enrolment_start_date: Option<String>,
    pub supply_start_date: Option<String>,
    pub is_smart_meter: Option<bool>,
    pub cancellation_reason: Option<String>,
}

/// De-duplicated product view bound to a supply point and optional agreement
///
/// Uniqueness key: (code, validFrom, validTo, agreementId, supplyPoint.id).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductEntry {
    pub code: Option<String>,
    pub description: Option<String>,
    /// Full name, falling back to display name
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub agreement_id: Option<String>,
    pub product_type: Option<String>,
    pub is_time_of_use: bool,
    pub kind: ProductKind,
    pub terms_and_conditions_url: Option<String>,
    pub pricing: ProductPricing,
    pub supply_point: SupplyPointRef,
    /// Base rate in cents as a string, kept for legacy consumers
    pub gross_rate: String,
    /// Dynamic price forecast windows, when the tariff publishes them
    pub unit_rate_forecast: Vec<ForecastEntry>,
}

/// One window of a dynamic-pricing forecast series
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastEntry {
    pub valid_from: Option<String>,
    pub valid_to: Option<String>,
    pub unit_rate_information: Option<UnitRateInformation>,
}

/// Per-window rate details, tagged by GraphQL typename
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum UnitRateInformation {
    #[serde(rename = "TimeOfUseProductUnitRateInformation")]
    TimeOfUse {
        #[serde(default)]
        rates: Vec<ForecastRate>,
    },
    #[serde(rename = "SimpleProductUnitRateInformation")]
    Simple {
        #[serde(rename = "latestGrossUnitRateCentsPerKwh", default)]
        latest_gross_unit_rate_cents_per_kwh: Option<Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ForecastRate {
    pub latest_gross_unit_rate_cents_per_kwh: Option<Value>,
}

/// Result of one comprehensive fetch, ready for rate resolution
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AccountBundle {
    pub account: Account,
    /// Normalized, de-duplicated electricity product entries
    pub products: Vec<ProductEntry>,
    /// Normalized, de-duplicated gas product entries
    pub gas_products: Vec<ProductEntry>,
    pub completed_dispatches: Vec<Dispatch>,
    /// Forward-looking dispatches reshaped into the completed-dispatch shape
    pub planned_dispatches: Vec<Dispatch>,
    pub devices: Vec<Device>,
}
