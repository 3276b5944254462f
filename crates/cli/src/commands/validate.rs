//! `dirflow validate` — Run the command validator on a JSON literal.

use dirflow_config::AppConfig;
use dirflow_security::{CommandValidator, ValidationPolicy};
use serde_json::{Value, json};

pub fn run(config: AppConfig, input: &str) -> Result<(), Box<dyn std::error::Error>> {
    let validator = CommandValidator::new(ValidationPolicy::from(&config.security));
    let report = validate(&validator, input)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn validate(validator: &CommandValidator, input: &str) -> Result<Value, serde_json::Error> {
    let parsed: Value = serde_json::from_str(input)?;
    let proposed = match parsed {
        Value::Array(items) => items,
        single => vec![single],
    };

    let batch = validator.validate_all(&proposed);
    Ok(json!({
        "accepted": batch.accepted,
        "advisories": batch.advisories,
        "rejected": batch.rejected,
    }))
}
