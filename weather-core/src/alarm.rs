use crate::model::Forecast;

/// Returns the first forecast, in input order, whose condition is not benign.
pub fn evaluate(forecasts: &[Forecast]) -> Option<&Forecast> {
    forecasts.iter().find(|f| !f.condition.is_benign())
}
