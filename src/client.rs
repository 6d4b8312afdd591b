//! Resilient Kraken GraphQL client
//!
//! Wraps a [`GraphqlTransport`] with token lifecycle handling, rate-limit
//! backoff and a bounded re-login retry for expired tokens. Every fetch
//! method ensures a valid token first, and any response carrying the
//! expired-token error code triggers exactly one transparent re-login
//! before the call is repeated.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;

use crate::config::{AuthConfig, Config, RetryConfig};
use crate::error::{PolpoError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::model::{
    AccountBundle, AccountSummary, Device, Dispatch, DispatchMeta, FlexPlannedDispatch,
    MeterReading,
};
use crate::normalize::{
    extract_electricity_products, extract_gas_products, normalize_account_properties,
};
use crate::queries;
use crate::token::{LoginFn, TokenManager};
use crate::transport::{GraphqlTransport, HttpTransport};

/// Device type string the provider uses for EV integrations
pub const DEVICE_TYPE_ELECTRIC_VEHICLES: &str = "ELECTRIC_VEHICLES";

const SCHEDULE_DAYS: [&str; 7] = [
    "MONDAY",
    "TUESDAY",
    "WEDNESDAY",
    "THURSDAY",
    "FRIDAY",
    "SATURDAY",
    "SUNDAY",
];

/// High-level client for the provider API
///
/// Cheap to share behind an [`Arc`]; all state lives in the token manager,
/// which is internally synchronized.
pub struct ApiClient {
    transport: Arc<dyn GraphqlTransport>,
    tokens: Arc<TokenManager>,
    auth: AuthConfig,
    retry: RetryConfig,
    log_api_responses: bool,
    logger: StructuredLogger,
}

impl ApiClient {
    /// Build a client with an explicit transport and token manager
    ///
    /// Used directly by tests; production code goes through
    /// [`ApiClient::from_config`].
    pub fn new(
        transport: Arc<dyn GraphqlTransport>,
        tokens: Arc<TokenManager>,
        config: &Config,
    ) -> Self {
        Self {
            transport,
            tokens,
            auth: config.auth.clone(),
            retry: config.retry.clone(),
            log_api_responses: config.logging.log_api_responses,
            logger: get_logger("api_client"),
        }
    }

    /// Build a client backed by an HTTP transport from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(
            &config.api.endpoint,
            config.api.timeout_secs,
        )?);
        let tokens = Arc::new(TokenManager::new(&config.token));
        Ok(Self::new(transport, tokens, config))
    }

    /// Shared token manager backing this client
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Start the background token refresh loop, wired to [`ApiClient::login`]
    pub fn start_auto_refresh(self: &Arc<Self>) {
        let client = Arc::clone(self);
        let login: LoginFn = Arc::new(move || {
            let client = Arc::clone(&client);
            Box::pin(async move { client.login().await })
        });
        self.tokens.start_auto_refresh(login);
    }

    /// Stop the background token refresh loop
    pub fn stop_auto_refresh(&self) {
        self.tokens.stop_auto_refresh();
    }

    /// Authenticate and store a fresh token
    ///
    /// Serialized on the token manager's login lock so concurrent callers
    /// collapse into a single attempt; whoever wins the lock logs in and the
    /// rest observe the fresh token. Rate-limit responses and transport
    /// failures are retried with exponential backoff up to the configured
    /// attempt budget.
    pub async fn login(&self) -> bool {
        let _guard = self.tokens.login_lock().lock().await;
        if self.tokens.is_valid() {
            self.logger.debug("Token still valid after lock, skipping login");
            return true;
        }

        let variables = json!({
            "email": self.auth.email,
            "password": self.auth.password,
        });

        let attempts = self.retry.login_attempts.max(1);
        let max_delay = Duration::from_secs(self.retry.max_backoff_secs);
        let mut delay = Duration::from_secs(self.retry.initial_backoff_secs);

        for attempt in 1..=attempts {
            self.logger
                .debug(&format!("Login attempt {attempt} of {attempts}"));

            match self
                .transport
                .execute(queries::LOGIN_MUTATION, variables.clone(), None)
                .await
            {
                Ok(response) => {
                    if let Some((code, message)) = first_graphql_error(&response) {
                        if code.as_deref() == Some(queries::ERROR_RATE_LIMITED) {
                            self.logger.warn(&format!(
                                "Rate limit hit, retrying in {}s (attempt {attempt} of {attempts})",
                                delay.as_secs()
                            ));
                        } else {
                            self.logger.error(&format!(
                                "Login failed: {message} (attempt {attempt} of {attempts})"
                            ));
                        }
                    } else if let Some(token_data) = response.pointer("/data/obtainKrakenToken") {
                        if let Some(token) = token_data.get("token").and_then(Value::as_str) {
                            let expiry =
                                token_data.pointer("/payload/exp").and_then(Value::as_f64);
                            self.tokens.set_token(token, expiry);
                            self.logger
                                .debug(&format!("Obtained token {}", mask_token(token)));
                            return true;
                        }
                        self.logger.error(&format!(
                            "No token in login response (attempt {attempt} of {attempts})"
                        ));
                    } else {
                        self.logger.error(&format!(
                            "Unexpected login response shape (attempt {attempt} of {attempts})"
                        ));
                    }
                }
                Err(err) => {
                    self.logger
                        .error(&format!("Error during login attempt {attempt}: {err}"));
                }
            }

            if attempt < attempts {
                sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }

        self.logger
            .error(&format!("All {attempts} login attempts failed"));
        false
    }

    /// Ensure a valid token is available, logging in if necessary
    pub async fn ensure_token(&self) -> bool {
        if self.tokens.is_valid() {
            return true;
        }
        self.logger.debug("Token invalid or expired, logging in again");
        self.login().await
    }

    /// Execute an authenticated operation with one bounded re-login retry
    ///
    /// The expired-token error code clears the stored token, re-logs in and
    /// repeats the call exactly once; a second expiry surfaces as an error in
    /// the returned document.
    async fn execute_with_reauth(&self, query: &str, variables: Value) -> Result<Value> {
        if !self.ensure_token().await {
            return Err(PolpoError::auth("Could not obtain a valid API token"));
        }

        let mut retried = false;
        loop {
            let token = self.tokens.token();
            let response = self
                .transport
                .execute(query, variables.clone(), token.as_deref())
                .await?;

            if !retried && has_error_code(&response, queries::ERROR_TOKEN_EXPIRED) {
                self.logger.warn("Token expired, refreshing");
                self.tokens.clear();
                if !self.login().await {
                    return Err(PolpoError::auth("Re-login after token expiry failed"));
                }
                retried = true;
                continue;
            }

            return Ok(response);
        }
    }

    /// Discover the accounts visible to the authenticated user
    pub async fn fetch_accounts(&self) -> Result<Vec<AccountSummary>> {
        let response = self
            .execute_with_reauth(queries::ACCOUNT_DISCOVERY_QUERY, json!({}))
            .await?;

        if let Some((_, message)) = first_graphql_error(&response) {
            return Err(PolpoError::api(format!(
                "Account discovery failed: {message}"
            )));
        }

        match response.pointer("/data/viewer/accounts") {
            Some(accounts @ Value::Array(_)) => Ok(serde_json::from_value(accounts.clone())?),
            _ => Err(PolpoError::api(
                "Unexpected account discovery response shape",
            )),
        }
    }

    /// Fetch all data for an account in a single comprehensive query
    ///
    /// The account payload is normalized and flattened into product entries.
    /// Missing devices or dispatches (the not-found error code on those
    /// paths) are tolerated with a warning; each device is then enriched
    /// with its forward-looking flex dispatches, and a per-device failure
    /// skips that device rather than failing the whole fetch.
    pub async fn fetch_all_data(&self, account_number: &str) -> Result<AccountBundle> {
        let variables = json!({ "accountNumber": account_number });
        self.logger.debug(&format!(
            "Fetching comprehensive data for account {account_number}"
        ));

        let response = self
            .execute_with_reauth(queries::COMPREHENSIVE_QUERY, variables)
            .await?;

        if self.log_api_responses {
            self.logger.debug(&format!("API response: {response}"));
        }

        let Some(data) = response.get("data").filter(|d| !d.is_null()) else {
            let message = first_graphql_error(&response)
                .map(|(_, message)| message)
                .unwrap_or_else(|| "API response contains neither data nor errors".to_string());
            return Err(PolpoError::api(format!(
                "Comprehensive query failed: {message}"
            )));
        };

        self.log_partial_errors(&response);

        let mut bundle = AccountBundle::default();

        if let Some(account) = data.get("account").filter(|a| !a.is_null()) {
            let mut account = account.clone();
            normalize_account_properties(&mut account);
            bundle.products = extract_electricity_products(&account);
            bundle.gas_products = extract_gas_products(&account);
            self.logger.debug(&format!(
                "Extracted {} electricity and {} gas products",
                bundle.products.len(),
                bundle.gas_products.len()
            ));
            bundle.account = serde_json::from_value(account)?;
        } else {
            self.logger.debug("No account payload returned in response");
        }

        if let Some(devices @ Value::Array(_)) = data.get("devices") {
            bundle.devices = serde_json::from_value(devices.clone())?;
        }
        if let Some(dispatches @ Value::Array(_)) = data.get("completedDispatches") {
            bundle.completed_dispatches = serde_json::from_value(dispatches.clone())?;
        }

        for device in &bundle.devices {
            let Some(device_id) = device.id.as_deref() else {
                continue;
            };
            match self.fetch_flex_planned_dispatches(device_id).await {
                Ok(dispatches) => {
                    if !dispatches.is_empty() {
                        self.logger.debug(&format!(
                            "Adding {} flex planned dispatches from device {device_id}",
                            dispatches.len()
                        ));
                    }
                    bundle.planned_dispatches.extend(
                        dispatches
                            .iter()
                            .map(|dispatch| reshape_flex_dispatch(dispatch, device_id)),
                    );
                }
                Err(err) => {
                    self.logger.warn(&format!(
                        "Failed to fetch flex planned dispatches for device {device_id}: {err}"
                    ));
                }
            }
        }

        Ok(bundle)
    }

    /// Forward-looking dispatches for one device
    ///
    /// The not-found error code means the device does not support flex
    /// dispatches and yields an empty list rather than an error.
    pub async fn fetch_flex_planned_dispatches(
        &self,
        device_id: &str,
    ) -> Result<Vec<FlexPlannedDispatch>> {
        let variables = json!({ "deviceId": device_id });
        let response = self
            .execute_with_reauth(queries::FLEX_PLANNED_DISPATCHES_QUERY, variables)
            .await?;

        if let Some((code, message)) = first_graphql_error(&response) {
            if code.as_deref() == Some(queries::ERROR_NOT_FOUND) {
                self.logger.debug(&format!(
                    "Device {device_id} does not support flex planned dispatches: {message}"
                ));
                return Ok(Vec::new());
            }
            return Err(PolpoError::api(format!(
                "Flex planned dispatches query failed: {message}"
            )));
        }

        match response.pointer("/data/flexPlannedDispatches") {
            Some(dispatches @ Value::Array(_)) => Ok(serde_json::from_value(dispatches.clone())?),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(_) => Err(PolpoError::api(
                "Unexpected flex planned dispatches response shape",
            )),
        }
    }

    /// Vehicle devices with preference settings for an account
    pub async fn get_vehicle_devices(&self, account_number: &str) -> Result<Vec<Device>> {
        let variables = json!({ "accountNumber": account_number });
        let response = self
            .execute_with_reauth(queries::VEHICLE_DETAILS_QUERY, variables)
            .await?;

        if let Some((_, message)) = first_graphql_error(&response) {
            return Err(PolpoError::api(format!(
                "Vehicle devices query failed: {message}"
            )));
        }

        match response.pointer("/data/devices") {
            Some(devices @ Value::Array(_)) => {
                let devices: Vec<Device> = serde_json::from_value(devices.clone())?;
                Ok(devices
                    .into_iter()
                    .filter(|device| {
                        device.device_type.as_deref() == Some(DEVICE_TYPE_ELECTRIC_VEHICLES)
                    })
                    .collect())
            }
            _ => Err(PolpoError::api(
                "Unexpected vehicle devices response shape",
            )),
        }
    }

    /// Suspend or resume smart control for a device
    ///
    /// Returns the device id echoed by the provider on success.
    pub async fn change_device_suspension(
        &self,
        device_id: &str,
        action: &str,
    ) -> Result<Option<String>> {
        let variables = json!({ "deviceId": device_id, "action": action });
        self.logger.debug(&format!(
            "Changing device suspension: device_id={device_id}, action={action}"
        ));

        let response = self
            .execute_with_reauth(queries::CHANGE_DEVICE_SUSPENSION_MUTATION, variables)
            .await?;

        if let Some((_, message)) = first_graphql_error(&response) {
            return Err(PolpoError::api(format!(
                "Device suspension change failed: {message}"
            )));
        }

        Ok(response
            .pointer("/data/updateDeviceSmartControl/id")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    /// Set the weekly charging preference for a device
    ///
    /// The target percentage must lie in 20..=100 in steps of 5 and the
    /// ready-by time between 04:00 and 17:59; both are validated before any
    /// network traffic. The same schedule is applied to all seven days.
    pub async fn set_device_preferences(
        &self,
        device_id: &str,
        target_percentage: u32,
        target_time: &str,
    ) -> Result<()> {
        if !(20..=100).contains(&target_percentage) {
            return Err(PolpoError::validation(
                "target_percentage".to_string(),
                format!("{target_percentage} is out of range, must be between 20 and 100"),
            ));
        }
        if target_percentage % 5 != 0 {
            return Err(PolpoError::validation(
                "target_percentage".to_string(),
                format!("{target_percentage} is not a multiple of 5"),
            ));
        }

        let formatted_time = format_time_to_hh_mm(target_time)?;
        let hour: u32 = formatted_time
            .split(':')
            .next()
            .and_then(|h| h.parse().ok())
            .unwrap_or(0);
        if !(4..=17).contains(&hour) {
            return Err(PolpoError::validation(
                "target_time".to_string(),
                format!("{formatted_time} is outside the allowed 04:00-17:00 window"),
            ));
        }

        let schedules: Vec<Value> = SCHEDULE_DAYS
            .iter()
            .map(|day| {
                json!({
                    "dayOfWeek": day,
                    "time": formatted_time,
                    "max": target_percentage,
                })
            })
            .collect();
        let variables = json!({ "deviceId": device_id, "schedules": schedules });

        self.logger.debug(&format!(
            "Setting device preferences: device_id={device_id}, target={target_percentage}%, time={formatted_time}"
        ));

        let response = self
            .execute_with_reauth(queries::SET_DEVICE_PREFERENCES_MUTATION, variables)
            .await?;

        if let Some((code, message)) = first_graphql_error(&response) {
            return Err(PolpoError::api(format!(
                "Setting device preferences failed: {message} (code: {})",
                code.unwrap_or_default()
            )));
        }

        Ok(())
    }

    /// Latest gas meter reading for a meter, if any exists
    pub async fn fetch_gas_meter_reading(
        &self,
        account_number: &str,
        meter_id: &str,
    ) -> Result<Option<MeterReading>> {
        self.fetch_latest_reading(
            queries::GAS_METER_READINGS_QUERY,
            "/data/gasMeterReadings/edges/0/node",
            account_number,
            meter_id,
        )
        .await
    }

    /// Latest electricity meter reading for a meter, if any exists
    pub async fn fetch_electricity_meter_reading(
        &self,
        account_number: &str,
        meter_id: &str,
    ) -> Result<Option<MeterReading>> {
        self.fetch_latest_reading(
            queries::ELECTRICITY_METER_READINGS_QUERY,
            "/data/electricityMeterReadings/edges/0/node",
            account_number,
            meter_id,
        )
        .await
    }

    async fn fetch_latest_reading(
        &self,
        query: &str,
        node_pointer: &str,
        account_number: &str,
        meter_id: &str,
    ) -> Result<Option<MeterReading>> {
        let variables = json!({ "accountNumber": account_number, "meterId": meter_id });
        let response = self.execute_with_reauth(query, variables).await?;

        if let Some((_, message)) = first_graphql_error(&response) {
            return Err(PolpoError::api(format!(
                "Meter reading query failed: {message}"
            )));
        }

        match response.pointer(node_pointer) {
            Some(node) if !node.is_null() => Ok(Some(serde_json::from_value(node.clone())?)),
            _ => {
                self.logger
                    .warn(&format!("No readings found for meter {meter_id}"));
                Ok(None)
            }
        }
    }

    /// Split response errors into tolerated and real ones and log both
    ///
    /// Not-found errors on the dispatch and device paths are expected for
    /// accounts without smart devices.
    fn log_partial_errors(&self, response: &Value) {
        let Some(errors) = response.get("errors").and_then(Value::as_array) else {
            return;
        };

        let (non_critical, critical): (Vec<&Value>, Vec<&Value>) =
            errors.iter().partition(|error| {
                let on_optional_path = error
                    .get("path")
                    .and_then(Value::as_array)
                    .and_then(|path| path.first())
                    .and_then(Value::as_str)
                    .is_some_and(|root| root == "completedDispatches" || root == "devices");
                on_optional_path
                    && error
                        .pointer("/extensions/errorCode")
                        .and_then(Value::as_str)
                        == Some(queries::ERROR_NOT_FOUND)
            });

        if !non_critical.is_empty() {
            self.logger.warn(&format!(
                "API returned non-critical errors (expected for accounts without devices or dispatches): {non_critical:?}"
            ));
        }
        if !critical.is_empty() {
            self.logger
                .error(&format!("API returned critical errors: {critical:?}"));
        }
    }
}

/// First GraphQL error in a response as (errorCode, message)
fn first_graphql_error(response: &Value) -> Option<(Option<String>, String)> {
    let error = response.get("errors")?.as_array()?.first()?;
    let code = error
        .pointer("/extensions/errorCode")
        .and_then(Value::as_str)
        .map(str::to_string);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string();
    Some((code, message))
}

/// Whether any error in the response carries the given provider code
fn has_error_code(response: &Value, code: &str) -> bool {
    response
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| {
            errors.iter().any(|error| {
                error
                    .pointer("/extensions/errorCode")
                    .and_then(Value::as_str)
                    == Some(code)
            })
        })
}

/// Reshape a flex dispatch into the completed-dispatch layout
///
/// The flex API has no separate wall-clock and datetime fields, so start and
/// end are mirrored into both slots; the meta block records the source and
/// the owning device.
fn reshape_flex_dispatch(dispatch: &FlexPlannedDispatch, device_id: &str) -> Dispatch {
    let kind = dispatch
        .kind
        .clone()
        .unwrap_or_else(|| "UNKNOWN".to_string());
    Dispatch {
        start: dispatch.start.clone(),
        start_dt: dispatch.start.clone(),
        end: dispatch.end.clone(),
        end_dt: dispatch.end.clone(),
        delta: dispatch.energy_added_kwh.clone(),
        delta_kwh: dispatch.energy_added_kwh.clone(),
        kind: Some(kind.clone()),
        meta: Some(DispatchMeta {
            location: None,
            source: Some("flex_api".to_string()),
            kind: Some(kind),
            device_id: Some(device_id.to_string()),
        }),
    }
}

/// Normalize a time string to the HH:MM shape the provider expects
pub fn format_time_to_hh_mm(time_str: &str) -> Result<String> {
    if time_str.is_empty() {
        return Err(PolpoError::validation(
            "target_time",
            "empty time value provided",
        ));
    }

    let mut parts = time_str.split(':');
    let (Some(hours_part), Some(minutes_part)) = (parts.next(), parts.next()) else {
        return Err(PolpoError::validation(
            "target_time".to_string(),
            format!("could not parse time '{time_str}', use HH:MM"),
        ));
    };

    let hours: u32 = hours_part.trim().parse().map_err(|_| {
        PolpoError::validation(
            "target_time".to_string(),
            format!("invalid hour in '{time_str}'"),
        )
    })?;
    let minutes: u32 = minutes_part.trim().parse().map_err(|_| {
        PolpoError::validation(
            "target_time".to_string(),
            format!("invalid minute in '{time_str}'"),
        )
    })?;

    if hours > 23 {
        return Err(PolpoError::validation(
            "target_time".to_string(),
            format!("hour {hours} is out of range"),
        ));
    }
    if minutes > 59 {
        return Err(PolpoError::validation(
            "target_time".to_string(),
            format!("minute {minutes} is out of range"),
        ));
    }

    Ok(format!("{hours:02}:{minutes:02}"))
}

/// Keep the first and last five characters of a token, mask the rest
///
/// Operates on characters, not bytes, so a token containing multibyte
/// UTF-8 never slices mid-character.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..5].iter().collect();
        let tail: String = chars[chars.len() - 5..].iter().collect();
        format!("{head}{}{tail}", "*".repeat(chars.len() - 10))
    } else {
        "*".repeat(chars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn masks_middle_of_long_tokens() {
        assert_eq!(mask_token("abcde12345fghij"), "abcde*****fghij");
        assert_eq!(mask_token("short"), "*****");
    }

    #[test]
    fn masks_multibyte_tokens_by_character() {
        // Eleven two-byte characters: byte index 5 is mid-character
        assert_eq!(mask_token("ééééééééééé"), "ééééé*ééééé");
        assert_eq!(mask_token("ééé"), "***");
    }

    #[test]
    fn formats_times_to_hh_mm() {
        assert_eq!(format_time_to_hh_mm("5:00").unwrap(), "05:00");
        assert_eq!(format_time_to_hh_mm("05:00:30").unwrap(), "05:00");
        assert_eq!(format_time_to_hh_mm("17:45").unwrap(), "17:45");
        assert!(format_time_to_hh_mm("").is_err());
        assert!(format_time_to_hh_mm("noon").is_err());
        assert!(format_time_to_hh_mm("25:00").is_err());
        assert!(format_time_to_hh_mm("12:75").is_err());
    }

    #[test]
    fn extracts_first_error_code_and_message() {
        let response = json!({
            "errors": [
                {"message": "rate limited", "extensions": {"errorCode": "KT-CT-1199"}},
                {"message": "second"},
            ]
        });
        let (code, message) = first_graphql_error(&response).unwrap();
        assert_eq!(code.as_deref(), Some("KT-CT-1199"));
        assert_eq!(message, "rate limited");

        assert!(first_graphql_error(&json!({"data": {}})).is_none());
    }

    #[test]
    fn detects_error_code_anywhere_in_list() {
        let response = json!({
            "errors": [
                {"message": "other"},
                {"message": "expired", "extensions": {"errorCode": "KT-CT-1124"}},
            ]
        });
        assert!(has_error_code(&response, "KT-CT-1124"));
        assert!(!has_error_code(&response, "KT-CT-4301"));
    }

    #[test]
    fn reshaped_flex_dispatch_mirrors_fields() {
        let dispatch = FlexPlannedDispatch {
            start: Some("2024-01-01T01:00:00Z".to_string()),
            end: Some("2024-01-01T02:00:00Z".to_string()),
            energy_added_kwh: Some(json!(3.2)),
            kind: Some("SMART".to_string()),
        };
        let reshaped = reshape_flex_dispatch(&dispatch, "dev-1");
        assert_eq!(reshaped.start, reshaped.start_dt);
        assert_eq!(reshaped.end, reshaped.end_dt);
        assert_eq!(reshaped.delta, reshaped.delta_kwh);
        assert_eq!(reshaped.kind.as_deref(), Some("SMART"));
        let meta = reshaped.meta.unwrap();
        assert_eq!(meta.source.as_deref(), Some("flex_api"));
        assert_eq!(meta.kind.as_deref(), Some("SMART"));
        assert_eq!(meta.device_id.as_deref(), Some("dev-1"));
    }

    #[test]
    fn missing_kind_defaults_to_unknown() {
        let reshaped = reshape_flex_dispatch(&FlexPlannedDispatch::default(), "dev-2");
        assert_eq!(reshaped.kind.as_deref(), Some("UNKNOWN"));
    }
}
