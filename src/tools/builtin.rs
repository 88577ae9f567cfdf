use super::{HandlerError, ParamType, ToolArguments, ToolDescriptor, ToolHandler, ToolRegistry};
use crate::core::error::ChatError;
use async_trait::async_trait;

/// Canned weather reports for a couple of cities.
pub struct GetWeather;

#[async_trait]
impl ToolHandler for GetWeather {
    async fn call(&self, args: &ToolArguments) -> Result<String, HandlerError> {
        let city = args.str("city")?;
        let lower = city.to_lowercase();
        let report = if lower.contains("paris") {
            format!("The weather in {} is 20°C and sunny.", city)
        } else if lower.contains("london") {
            format!("The weather in {} is 15°C and cloudy.", city)
        } else {
            format!("Sorry, I don't have the weather for {}.", city)
        };
        Ok(report)
    }
}

pub struct SumNumbers;

#[async_trait]
impl ToolHandler for SumNumbers {
    async fn call(&self, args: &ToolArguments) -> Result<String, HandlerError> {
        let sum = args.number("a")? + args.number("b")?;
        // f64's Display drops a zero fraction: 5.0 renders as "5"
        Ok(sum.to_string())
    }
}

pub struct CurrentTime;

#[async_trait]
impl ToolHandler for CurrentTime {
    async fn call(&self, args: &ToolArguments) -> Result<String, HandlerError> {
        if args.flag("utc") {
            Ok(chrono::Utc::now().to_rfc3339())
        } else {
            Ok(chrono::Local::now().to_rfc3339())
        }
    }
}

pub fn descriptors() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("Weather.get_weather", "Gets the weather for a city", GetWeather)
            .param("city", ParamType::String, "Name of the city"),
        ToolDescriptor::new("Math.sum_numbers", "Adds two numbers together", SumNumbers)
            .param("a", ParamType::Number, "First addend")
            .param("b", ParamType::Number, "Second addend"),
        ToolDescriptor::new(
            "Time.current_time",
            "Returns the current date and time",
            CurrentTime,
        )
        .optional_param("utc", ParamType::Boolean, "Report UTC instead of local time"),
    ]
}

pub fn default_registry() -> Result<ToolRegistry, ChatError> {
    descriptors()
        .into_iter()
        .try_fold(ToolRegistry::builder(), |builder, descriptor| {
            builder.register(descriptor)
        })
        .map(|builder| builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    async fn run(name: &str, args: serde_json::Value) -> String {
        let registry = default_registry().unwrap();
        registry
            .invoke(name, args.as_object().unwrap(), Duration::from_secs(1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn weather_knows_paris_and_london() {
        assert_eq!(
            run("Weather.get_weather", json!({"city": "Paris"})).await,
            "The weather in Paris is 20°C and sunny."
        );
        assert_eq!(
            run("Weather.get_weather", json!({"city": "london"})).await,
            "The weather in london is 15°C and cloudy."
        );
        assert_eq!(
            run("Weather.get_weather", json!({"city": "Bern"})).await,
            "Sorry, I don't have the weather for Bern."
        );
    }

    #[tokio::test]
    async fn sum_keeps_fractions() {
        assert_eq!(run("Math.sum_numbers", json!({"a": 2, "b": 3})).await, "5");
        assert_eq!(
            run("Math.sum_numbers", json!({"a": 2.5, "b": "1"})).await,
            "3.5"
        );
    }

    #[tokio::test]
    async fn current_time_is_rfc3339() {
        let now = run("Time.current_time", json!({})).await;
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());

        let utc = run("Time.current_time", json!({"utc": true})).await;
        assert!(utc.ends_with("+00:00"));
    }

    #[test]
    fn registers_all_builtins() {
        let registry = default_registry().unwrap();
        let names: Vec<_> = registry.tools().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Math.sum_numbers", "Time.current_time", "Weather.get_weather"]
        );
    }
}
