//! Config validation
//!
//! Rules:
//! - field ranges (derive-based): non-empty names, positive timeouts and rates
//! - sensor names unique across streams
//! - online: every configured stream has `data_frequency_hz`
//! - a configured data rate is at least `MIN_DATA_FREQUENCY_HZ`
//! - offline: every stream reads from the recorded dataset
//! - any replay stream requires `[replay].path`
//! - a movement sensor advertises at least one capability

use std::collections::HashSet;

use ::validator::{Validate, ValidationErrors};
use contracts::{
    ContractError, IngestionBlueprint, IngestionMode, SourceKind, MIN_DATA_FREQUENCY_HZ,
};

/// Validate an IngestionBlueprint
///
/// Returns the first error encountered.
pub fn validate(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    validate_fields(blueprint)?;
    validate_sensor_names(blueprint)?;
    validate_rates(blueprint)?;
    validate_mode_requirements(blueprint)?;
    validate_replay(blueprint)?;
    validate_movement_capabilities(blueprint)?;
    Ok(())
}

fn field_error(section: &str, errors: ValidationErrors) -> ContractError {
    let fields: Vec<_> = errors.field_errors().keys().map(|k| k.to_string()).collect();
    let field = match fields.first() {
        Some(first) => format!("{section}.{first}"),
        None => section.to_string(),
    };
    ContractError::config_validation(field, errors.to_string())
}

fn validate_fields(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    blueprint
        .session
        .validate()
        .map_err(|e| field_error("session", e))?;
    blueprint
        .lidar
        .validate()
        .map_err(|e| field_error("lidar", e))?;
    if let Some(movement) = &blueprint.movement_sensor {
        movement
            .validate()
            .map_err(|e| field_error("movement_sensor", e))?;
    }
    blueprint
        .engine
        .validate()
        .map_err(|e| field_error("engine", e))?;
    Ok(())
}

fn validate_sensor_names(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for name in blueprint.sensor_names() {
        if !seen.insert(name) {
            return Err(ContractError::config_validation(
                format!("sensors[name={name}]"),
                "duplicate sensor name",
            ));
        }
    }
    Ok(())
}

fn validate_rates(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    let rates = [
        ("lidar.data_frequency_hz", blueprint.lidar.data_frequency_hz),
        (
            "movement_sensor.data_frequency_hz",
            blueprint
                .movement_sensor
                .as_ref()
                .and_then(|m| m.data_frequency_hz),
        ),
    ];
    for (field, rate) in rates {
        if let Some(hz) = rate {
            if !(hz.is_finite() && hz >= MIN_DATA_FREQUENCY_HZ) {
                return Err(ContractError::config_validation(
                    field,
                    format!("data rate must be at least {MIN_DATA_FREQUENCY_HZ} Hz, got {hz}"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_mode_requirements(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    match blueprint.session.mode {
        IngestionMode::Online => {
            if blueprint.lidar.data_frequency_hz.is_none() {
                return Err(ContractError::config_validation(
                    "lidar.data_frequency_hz",
                    "online mode requires a data rate for every stream",
                ));
            }
            if let Some(movement) = &blueprint.movement_sensor {
                if movement.data_frequency_hz.is_none() {
                    return Err(ContractError::config_validation(
                        "movement_sensor.data_frequency_hz",
                        "online mode requires a data rate for every stream",
                    ));
                }
            }
        }
        IngestionMode::Offline => {
            if blueprint.lidar.source != SourceKind::Replay {
                return Err(ContractError::config_validation(
                    "lidar.source",
                    "offline mode requires a replay source",
                ));
            }
            if let Some(movement) = &blueprint.movement_sensor {
                if movement.source != SourceKind::Replay {
                    return Err(ContractError::config_validation(
                        "movement_sensor.source",
                        "offline mode requires a replay source",
                    ));
                }
            }
        }
    }
    Ok(())
}

fn validate_replay(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    if !blueprint.uses_replay() {
        return Ok(());
    }
    match &blueprint.replay {
        Some(replay) if !replay.path.as_os_str().is_empty() => Ok(()),
        _ => Err(ContractError::config_validation(
            "replay.path",
            "replay sources require a dataset path",
        )),
    }
}

fn validate_movement_capabilities(blueprint: &IngestionBlueprint) -> Result<(), ContractError> {
    if let Some(movement) = &blueprint.movement_sensor {
        if movement.capabilities().is_empty() {
            return Err(ContractError::config_validation(
                "movement_sensor",
                "movement sensor must support imu and/or odometer",
            ));
        }
    }
    Ok(())
}
