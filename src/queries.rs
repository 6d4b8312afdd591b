//! GraphQL documents and provider error codes for the Kraken API
//!
//! The comprehensive query consolidates account, ledger, tariff, dispatch and
//! device data into a single round trip to keep API usage low.

/// Kraken error code: too many requests, retry with backoff
pub const ERROR_RATE_LIMITED: &str = "KT-CT-1199";

/// Kraken error code: JWT expired, clear the token and re-login
pub const ERROR_TOKEN_EXPIRED: &str = "KT-CT-1124";

/// Kraken error code: resource not found; empty result on dispatch queries
pub const ERROR_NOT_FOUND: &str = "KT-CT-4301";

/// Authentication mutation exchanging credentials for a token and its payload
pub const LOGIN_MUTATION: &str = r#"
mutation krakenTokenAuthentication($email: String!, $password: String!) {
  obtainKrakenToken(input: { email: $email, password: $password }) {
    token
    payload
  }
}
"#;

/// Comprehensive query that gets all account data in one go
pub const COMPREHENSIVE_QUERY: &str = r#"
query ComprehensiveDataQuery($accountNumber: String!) {
  account(accountNumber: $accountNumber) {
    id
    ledgers {
      balance
      ledgerType
    }
    properties {
      id
      electricitySupplyPoints {
        id
        pod
        status
        enrolmentStatus
        enrolmentStartDate
        supplyStartDate
        cancellationReason
        isSmartMeter
        product {
          __typename
          ... on ElectricityProductType {
            code
            description
            displayName
            fullName
            termsAndConditionsUrl
            validTo
            params {
              productType
              annualStandingCharge
              consumptionCharge
              consumptionChargeF2
              consumptionChargeF3
            }
            prices {
              productType
              annualStandingCharge
              annualStandingChargeUnits
              consumptionCharge
              consumptionChargeF2
              consumptionChargeF3
              consumptionChargeUnits
            }
          }
        }
        agreements(first: 10) {
          edges {
            node {
              id
              validFrom
              validTo
              agreedAt
              terminatedAt
              isActive
              product {
                __typename
                ... on ElectricityProductType {
                  code
                  description
                  displayName
                  fullName
                  termsAndConditionsUrl
                  validTo
                  params {
                    productType
                    annualStandingCharge
                    consumptionCharge
                    consumptionChargeF2
                    consumptionChargeF3
                  }
                  prices {
                    productType
                    annualStandingCharge
                    annualStandingChargeUnits
                    consumptionCharge
                    consumptionChargeF2
                    consumptionChargeF3
                    consumptionChargeUnits
                  }
                }
              }
            }
          }
        }
      }
      gasSupplyPoints {
        id
        pdr
        status
        enrolmentStatus
        enrolmentStartDate
        supplyStartDate
        cancellationReason
        isSmartMeter
        product {
          __typename
          ... on GasProductType {
            code
            description
            displayName
            fullName
            termsAndConditionsUrl
            validTo
            params {
              productType
              annualStandingCharge
              consumptionCharge
            }
            prices {
              annualStandingCharge
              consumptionCharge
            }
          }
        }
        agreements(first: 10) {
          edges {
            node {
              id
              validFrom
              validTo
              agreedAt
              terminatedAt
              isActive
              product {
                __typename
                ... on GasProductType {
                  code
                  description
                  displayName
                  fullName
                  termsAndConditionsUrl
                  validTo
                  params {
                    productType
                    annualStandingCharge
                    consumptionCharge
                  }
                  prices {
                    annualStandingCharge
                    consumptionCharge
                  }
                }
              }
            }
          }
        }
      }
    }
  }
  completedDispatches(accountNumber: $accountNumber) {
    delta
    deltaKwh
    end
    endDt
    meta {
      location
      source
    }
    start
    startDt
  }
  devices(accountNumber: $accountNumber) {
    status {
      current
      currentState
      isSuspended
    }
    provider
    preferences {
      mode
      schedules {
        dayOfWeek
        max
        min
        time
      }
      targetType
      unit
      gridExport
    }
    preferenceSetting {
      deviceType
      id
      mode
      scheduleSettings {
        id
        max
        min
        step
        timeFrom
        timeStep
        timeTo
      }
      unit
    }
    name
    integrationDeviceId
    id
    deviceType
    alerts {
      message
      publishedAt
    }
    ... on SmartFlexVehicle {
      id
      name
      status {
        current
        currentState
        isSuspended
      }
      vehicleVariant {
        model
        batterySize
      }
    }
  }
}
"#;

/// Latest gas meter reading (most recent edge only)
pub const GAS_METER_READINGS_QUERY: &str = r#"
query GasMeterReadings($accountNumber: String!, $meterId: ID!) {
  gasMeterReadings(accountNumber: $accountNumber, meterId: $meterId, first: 1) {
    edges {
      node {
        value
        readAt
        registerObisCode
        typeOfRead
        origin
        meterId
      }
    }
  }
}
"#;

/// Latest electricity meter reading (most recent edge only)
pub const ELECTRICITY_METER_READINGS_QUERY: &str = r#"
query ElectricityMeterReadings($accountNumber: String!, $meterId: ID!) {
  electricityMeterReadings(accountNumber: $accountNumber, meterId: $meterId, first: 1) {
    edges {
      node {
        value
        readAt
        registerObisCode
        typeOfRead
        origin
        meterId
        registerType
      }
    }
  }
}
"#;

/// Vehicle device details with preference settings
pub const VEHICLE_DETAILS_QUERY: &str = r#"
query Vehicle($accountNumber: String = "") {
  devices(accountNumber: $accountNumber) {
    deviceType
    id
    integrationDeviceId
    name
    preferenceSetting {
      deviceType
      id
      mode
      scheduleSettings {
        id
        max
        min
        step
        timeFrom
        timeStep
        timeTo
      }
      unit
    }
    preferences {
      gridExport
      mode
      targetType
      unit
    }
  }
}
"#;

/// Simple account discovery query
pub const ACCOUNT_DISCOVERY_QUERY: &str = r#"
query {
  viewer {
    accounts {
      number
      ledgers {
        balance
        ledgerType
      }
    }
  }
}
"#;

/// Device suspension mutation
pub const CHANGE_DEVICE_SUSPENSION_MUTATION: &str = r#"
mutation ChangeDeviceSuspension($deviceId: ID = "", $action: SmartControlAction!) {
  updateDeviceSmartControl(input: {deviceId: $deviceId, action: $action}) {
    id
  }
}
"#;

/// Per-device forward-looking dispatch query
pub const FLEX_PLANNED_DISPATCHES_QUERY: &str = r#"
query flexPlannedDispatches($deviceId: ID!) {
  flexPlannedDispatches(deviceId: $deviceId) {
    end
    energyAddedKwh
    start
    type
  }
}
"#;

/// Weekly charging preference mutation
pub const SET_DEVICE_PREFERENCES_MUTATION: &str = r#"
mutation setDevicePreferences($deviceId: ID!, $schedules: [ScheduleInput!]!) {
  setDevicePreferences(
    input: {
      deviceId: $deviceId,
      mode: CHARGE,
      unit: PERCENTAGE,
      schedules: $schedules
    }
  ) {
    id
  }
}
"#;
