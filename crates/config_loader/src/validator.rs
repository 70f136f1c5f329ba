//! Configuration validation
//!
//! Rules:
//! - input/consumer capacities >= 1
//! - dispatcher name non-empty when present
//! - workload producers/consumers >= 1
//! - workload timeout >= 1ms

use contracts::{ContractError, DispatcherConfig, FanoutBlueprint, WorkloadConfig};

/// Validate a FanoutBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &FanoutBlueprint) -> Result<(), ContractError> {
    validate_dispatcher(&blueprint.dispatcher)?;
    validate_workload(&blueprint.workload)?;
    Ok(())
}

/// Validate dispatcher construction parameters
pub fn validate_dispatcher(config: &DispatcherConfig) -> Result<(), ContractError> {
    if let Some(name) = &config.name {
        if name.trim().is_empty() {
            return Err(ContractError::config_validation(
                "dispatcher.name",
                "dispatcher name cannot be empty",
            ));
        }
    }

    if config.input_capacity == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.input_capacity",
            "input_capacity must be >= 1",
        ));
    }

    if config.consumer_capacity == 0 {
        return Err(ContractError::config_validation(
            "dispatcher.consumer_capacity",
            "consumer_capacity must be >= 1",
        ));
    }

    Ok(())
}

fn validate_workload(workload: &WorkloadConfig) -> Result<(), ContractError> {
    if workload.producers == 0 {
        return Err(ContractError::config_validation(
            "workload.producers",
            "producers must be >= 1",
        ));
    }

    if workload.consumers == 0 {
        return Err(ContractError::config_validation(
            "workload.consumers",
            "consumers must be >= 1",
        ));
    }

    if workload.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "workload.timeout_ms",
            "timeout_ms must be >= 1",
        ));
    }

    Ok(())
}
