//! JSON wire format shared with the analysis engine.
//!
//! Request: `{"series": [{"name", "data"}], "target_index"}`. A successful
//! run prints an [`AnalysisResult`]; a domain failure prints
//! `{"error": code, "message": text}`. Unknown response fields are ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::BridgeError;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesData {
    pub name: String,
    pub data: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub series: Vec<SeriesData>,
    #[serde(default)]
    pub target_index: Option<usize>,
}

impl AnalysisRequest {
    /// Reject requests the engine cannot process: no series, unequal
    /// lengths, non-finite values or an out-of-range target.
    pub fn validate(&self) -> Result<(), BridgeError> {
        let Some(first) = self.series.first() else {
            return Err(BridgeError::InvalidRequest("no series".into()));
        };
        let len = first.data.len();
        for s in &self.series {
            if s.data.len() != len {
                return Err(BridgeError::InvalidRequest(format!(
                    "series '{}' has {} points, expected {len}",
                    s.name,
                    s.data.len()
                )));
            }
            if s.data.iter().any(|v| !v.is_finite()) {
                return Err(BridgeError::InvalidRequest(format!(
                    "series '{}' contains NaN or infinite values",
                    s.name
                )));
            }
        }
        if let Some(t) = self.target_index {
            if t >= self.series.len() {
                return Err(BridgeError::InvalidRequest(format!(
                    "target index {t} out of range for {} series",
                    self.series.len()
                )));
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self).map_err(|e| BridgeError::InvalidRequest(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    FullStationary,
    FullNonStationary,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub series_count: usize,
    pub variable_names: Vec<String>,
    pub target_variable: String,
    pub model_type: ModelType,
    pub has_structural_break: bool,
    #[serde(default)]
    pub structural_breaks: Option<Vec<StructuralBreak>>,
    pub series_orders: Vec<SeriesOrder>,
    #[serde(default)]
    pub transformations: Option<Vec<TransformationInfo>>,
    #[serde(default)]
    pub model_results: Option<ModelResults>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralBreak {
    pub index: usize,
    pub series_index: usize,
}

/// Integration order and diagnostics of one series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOrder {
    /// 0 = I(0), 1 = I(1), 2 = I(2).
    pub order: u8,
    /// ADF and KPSS disagree.
    pub has_conflict: bool,
    pub adf: AdfTestResult,
    pub kpss: KpssTestResult,
    #[serde(default)]
    pub za: Option<ZivotAndrewsResult>,
    #[serde(default)]
    pub structural_break: Option<usize>,
    pub has_trend: bool,
    pub has_seasonality: bool,
    pub trend_strength: f64,
    pub seasonal_strength: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    pub one_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdfTestResult {
    pub test_statistic: f64,
    pub p_value: f64,
    pub used_lag: u32,
    pub n_obs: u32,
    pub critical_values: CriticalValues,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpssCriticalValues {
    pub one_percent: f64,
    pub two_and_half_percent: f64,
    pub five_percent: f64,
    pub ten_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpssTestResult {
    pub kpss_stat: f64,
    pub p_value: f64,
    pub lags: u32,
    pub crit: KpssCriticalValues,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZivotAndrewsResult {
    pub test_statistic: f64,
    pub p_value: f64,
    pub used_lag: u32,
    pub breakpoint: usize,
    pub critical_values: CriticalValues,
    pub is_stationary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transformation {
    None,
    FirstDifference,
    SecondDifference,
}

/// How a series was differenced before modelling a mixed-order set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationInfo {
    pub series_index: usize,
    pub variable_name: String,
    pub original_order: u8,
    pub transformation: Transformation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResults {
    #[serde(default)]
    pub cointegration: Option<CointegrationResult>,
    #[serde(default)]
    pub regression: Option<RegressionResult>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub has_structural_break: bool,
    #[serde(default)]
    pub structural_breaks: Option<Vec<StructuralBreak>>,
    #[serde(default)]
    pub periods: Option<Vec<PeriodInfo>>,
    #[serde(default)]
    pub period_results: Option<Vec<PeriodModelResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CointegrationTest {
    Aeg,
    Johansen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CointegrationResult {
    pub test_type: CointegrationTest,
    pub n_series: usize,
    pub is_cointegrated: bool,
    #[serde(default)]
    pub aeg_result: Option<AegTestResult>,
    #[serde(default)]
    pub johansen_eigenvalues: Option<Vec<f64>>,
    #[serde(default)]
    pub johansen_trace_stats: Option<Vec<f64>>,
    #[serde(default)]
    pub n_cointegration_relations: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AegTestResult {
    pub coint_t: f64,
    pub p_value: f64,
    pub crit_values: CriticalValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub coefficients: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub t_values: Vec<f64>,
    pub p_values: Vec<f64>,
    pub r_squared: f64,
    pub adj_r_squared: f64,
    pub f_statistic: f64,
    pub f_pvalue: f64,
    pub durbin_watson: DurbinWatsonResult,
    pub n_obs: u32,
    #[serde(default)]
    pub has_lags: bool,
    #[serde(default)]
    pub uses_newey_west: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurbinWatsonResult {
    pub statistic: f64,
    pub has_autocorrelation: bool,
}

/// Sub-sample delimited by structural breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodInfo {
    pub period_number: u32,
    pub start_index: usize,
    pub end_index: usize,
    pub data_size: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodType {
    BeforeBreak,
    AfterBreak,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodModelResult {
    pub period_type: PeriodType,
    pub period_number: u32,
    pub start_index: usize,
    pub end_index: usize,
    pub model_type: ModelType,
    pub data_size: usize,
    pub series_orders: Vec<SeriesOrder>,
    #[serde(default)]
    pub cointegration: Option<CointegrationResult>,
    #[serde(default)]
    pub regression: Option<RegressionResult>,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    error: String,
    message: String,
}

/// Classify the engine's stdout from a successful exit.
pub fn decode_response(stdout: &str) -> Result<AnalysisResult, BridgeError> {
    let value: JsonValue = serde_json::from_str(stdout.trim())
        .map_err(|e| BridgeError::ProtocolError(format!("response is not JSON: {e}")))?;

    if value.get("error").is_some() {
        let payload: ErrorPayload = serde_json::from_value(value)
            .map_err(|e| BridgeError::ProtocolError(format!("malformed error payload: {e}")))?;
        return Err(BridgeError::ApplicationError {
            code: payload.error,
            message: payload.message,
        });
    }

    serde_json::from_value(value).map_err(|e| BridgeError::ProtocolError(e.to_string()))
}
