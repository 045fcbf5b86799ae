use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::analysis::decompose::{decompose, DecompositionResult};
use crate::analysis::interpolate::interpolate;
use crate::analysis::normality::{jarque_bera, JbResult};
use crate::analysis::outliers::{detect_and_fix, OutlierResult, OutlierStrategy};
use crate::analysis::periodicity::{resolve_period, Period};
use crate::analysis::vif::{reduce_by_vif, VifOutcome};
use crate::bridge::{AnalysisClient, AnalysisRequest, AnalysisResult, CancellationToken, SeriesData};
use crate::config::PipelineConfig;
use crate::data::filter::filter_rows;
use crate::data::model::Dataset;
use crate::error::{AnalysisError, PipelineError, Result};

// ---------------------------------------------------------------------------
// Stages and operations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PipelineStage {
    Loaded,
    Interpolated,
    NormalityTested,
    Decomposed,
    OutliersHandled,
    TargetChosen,
    VifPruned,
}

impl PipelineStage {
    const ALL: [PipelineStage; 7] = [
        PipelineStage::Loaded,
        PipelineStage::Interpolated,
        PipelineStage::NormalityTested,
        PipelineStage::Decomposed,
        PipelineStage::OutliersHandled,
        PipelineStage::TargetChosen,
        PipelineStage::VifPruned,
    ];
}

/// One user action. Applied with [`apply`].
#[derive(Debug, Clone)]
pub enum Operation {
    LoadDataset(Dataset),
    /// Keep only rows of the loaded table whose `column` equals `value`.
    FilterRows { column: usize, value: String },
    ClearFilter,
    ToggleColumn(usize),
    SelectAll,
    SelectNone,
    Interpolate,
    TestNormality,
    Decompose { period: Period },
    HandleOutliers { strategy: OutlierStrategy },
    ChooseTarget(usize),
    ReduceVif { threshold: f64 },
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Snapshot of a pipeline session. Never mutated after construction: every
/// transition returns a new value and shares unchanged parts through `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PipelineState {
    /// Table as loaded, before any row filter.
    source: Option<Arc<Dataset>>,
    /// Working table: filtered and gap-filled.
    dataset: Option<Arc<Dataset>>,
    filter: Option<(usize, String)>,
    selection: BTreeSet<usize>,

    /// Columns each per-column stage has been run on, failures included.
    attempted: BTreeMap<PipelineStage, BTreeSet<usize>>,
    normality: Arc<BTreeMap<usize, JbResult>>,
    decompositions: Arc<BTreeMap<usize, DecompositionResult>>,
    outliers: Arc<BTreeMap<usize, OutlierResult>>,
    target: Option<usize>,
    vif: Option<Arc<VifOutcome>>,

    column_errors: BTreeMap<(PipelineStage, usize), AnalysisError>,
    status: Option<String>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_deref()
    }

    pub fn filter(&self) -> Option<(usize, &str)> {
        self.filter.as_ref().map(|(c, v)| (*c, v.as_str()))
    }

    pub fn selection(&self) -> &BTreeSet<usize> {
        &self.selection
    }

    pub fn normality(&self) -> &BTreeMap<usize, JbResult> {
        &self.normality
    }

    pub fn decompositions(&self) -> &BTreeMap<usize, DecompositionResult> {
        &self.decompositions
    }

    pub fn outliers(&self) -> &BTreeMap<usize, OutlierResult> {
        &self.outliers
    }

    pub fn target(&self) -> Option<usize> {
        self.target
    }

    pub fn vif(&self) -> Option<&VifOutcome> {
        self.vif.as_deref()
    }

    /// Per-column failures, keyed by the stage that produced them.
    pub fn column_errors(&self) -> &BTreeMap<(PipelineStage, usize), AnalysisError> {
        &self.column_errors
    }

    /// Summary of the last transition.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Furthest stage reached by every selected column.
    pub fn stage(&self) -> Option<PipelineStage> {
        self.dataset.as_ref()?;
        if self.selection.is_empty() {
            return Some(PipelineStage::Loaded);
        }
        PipelineStage::ALL
            .into_iter()
            .take_while(|&s| self.selection.iter().all(|&c| self.has_completed(s, c)))
            .last()
    }

    pub fn has_completed(&self, stage: PipelineStage, column: usize) -> bool {
        match stage {
            PipelineStage::Loaded => self.dataset.is_some(),
            PipelineStage::TargetChosen => {
                self.target.is_some() && self.has_completed(PipelineStage::OutliersHandled, column)
            }
            PipelineStage::VifPruned => {
                self.vif.is_some() && self.has_completed(PipelineStage::TargetChosen, column)
            }
            s => self.attempted.get(&s).is_some_and(|cols| cols.contains(&column)),
        }
    }

    /// Outlier-cleaned series of a column, or the working column when the
    /// outlier stage produced nothing for it.
    pub fn cleaned_column(&self, column: usize) -> std::result::Result<Vec<f64>, AnalysisError> {
        if let Some(r) = self.outliers.get(&column) {
            return Ok(r.clean_data.clone());
        }
        match &self.dataset {
            Some(ds) => ds.column_values(column),
            None => Err(AnalysisError::Validation("no dataset loaded".into())),
        }
    }

    /// Named cleaned series of the selection in column order, with the
    /// target's position in that list. Every selected column must have been
    /// through the outlier stage.
    pub fn build_request(&self) -> Result<AnalysisRequest> {
        let ds = self.working()?;
        let target = self
            .target
            .ok_or_else(|| AnalysisError::Validation("no target variable chosen".into()))?;
        self.require("build_request", PipelineStage::OutliersHandled)?;
        let series = self
            .selection
            .iter()
            .map(|&col| {
                Ok(SeriesData {
                    name: ds.column_names()[col].clone(),
                    data: self.cleaned_column(col)?,
                })
            })
            .collect::<std::result::Result<Vec<_>, AnalysisError>>()?;
        let target_index = self.selection.iter().position(|&c| c == target);
        Ok(AnalysisRequest {
            series,
            target_index,
        })
    }

    // -- helpers --------------------------------------------------------------

    fn working(&self) -> Result<&Arc<Dataset>> {
        self.dataset.as_ref().ok_or(PipelineError::NoDataset)
    }

    fn column_name(&self, column: usize) -> String {
        self.dataset
            .as_ref()
            .and_then(|ds| ds.column_name(column))
            .map_or_else(|| format!("#{column}"), str::to_string)
    }

    fn require(&self, operation: &'static str, required: PipelineStage) -> Result<()> {
        self.working()?;
        if self.selection.is_empty() {
            return Err(AnalysisError::Validation("no columns selected".into()).into());
        }
        match self.selection.iter().find(|&&c| !self.has_completed(required, c)) {
            Some(&column) => Err(PipelineError::StageNotReady {
                operation,
                required,
                column,
            }),
            None => Ok(()),
        }
    }

    /// Drop results of `stage` and everything after it.
    fn invalidate_from(&mut self, stage: PipelineStage) {
        self.attempted.retain(|&s, _| s < stage);
        self.column_errors.retain(|&(s, _), _| s < stage);
        if stage <= PipelineStage::NormalityTested {
            self.normality = Arc::default();
        }
        if stage <= PipelineStage::Decomposed {
            self.decompositions = Arc::default();
        }
        if stage <= PipelineStage::OutliersHandled {
            self.outliers = Arc::default();
        }
        if stage <= PipelineStage::TargetChosen {
            self.target = None;
        }
        self.vif = None;
    }

    /// Run `f` on every selected column in parallel. Failures are logged
    /// and recorded; every selected column is marked as attempted.
    fn per_column<T, F>(&mut self, stage: PipelineStage, f: F) -> BTreeMap<usize, T>
    where
        T: Send,
        F: Fn(usize) -> std::result::Result<T, AnalysisError> + Sync,
    {
        let outcomes: Vec<(usize, std::result::Result<T, AnalysisError>)> =
            self.selection.par_iter().map(|&col| (col, f(col))).collect();

        let mut results = BTreeMap::new();
        for (col, outcome) in outcomes {
            match outcome {
                Ok(v) => {
                    results.insert(col, v);
                }
                Err(e) => {
                    warn!("{stage:?} failed for column '{}': {e}", self.column_name(col));
                    self.column_errors.insert((stage, col), e);
                }
            }
        }
        self.attempted.insert(stage, self.selection.clone());
        results
    }

    fn summarize(&mut self, stage: PipelineStage, succeeded: usize) {
        let failed = self.selection.len() - succeeded;
        let msg = format!("{stage:?}: {succeeded} column(s) ok, {failed} failed");
        info!("{msg}");
        self.status = Some(msg);
    }

    // -- transitions ------------------------------------------------------------

    fn load(dataset: Arc<Dataset>) -> Self {
        Self {
            status: Some(format!("{} rows x {} columns", dataset.len(), dataset.width())),
            source: Some(Arc::clone(&dataset)),
            dataset: Some(dataset),
            ..Self::default()
        }
    }

    fn filtered(&self, column: usize, value: String) -> Result<Self> {
        let source = self.source.as_ref().ok_or(PipelineError::NoDataset)?;
        let ds = filter_rows(source, column, &value)?;
        info!(
            "filter '{}' = '{value}': {} of {} rows",
            source.column_names()[column],
            ds.len(),
            source.len()
        );
        Ok(Self {
            status: Some(format!("{} rows where column {column} = '{value}'", ds.len())),
            source: Some(Arc::clone(source)),
            dataset: Some(Arc::new(ds)),
            filter: Some((column, value)),
            ..Self::default()
        })
    }

    fn unfiltered(&self) -> Result<Self> {
        let source = self.source.as_ref().ok_or(PipelineError::NoDataset)?;
        Ok(Self::load(Arc::clone(source)))
    }

    fn toggled(&self, column: usize) -> Result<Self> {
        let ds = self.working()?;
        if column >= ds.width() {
            return Err(AnalysisError::Validation(format!("column index {column} out of range")).into());
        }
        if !ds.is_numeric(column) {
            return Err(AnalysisError::Validation(format!(
                "column '{}' is not numeric",
                ds.column_names()[column]
            ))
            .into());
        }
        let mut next = self.clone();
        if !next.selection.remove(&column) {
            next.selection.insert(column);
        } else if next.target == Some(column) {
            next.target = None;
        }
        next.vif = None;
        Ok(next)
    }

    fn with_selection(&self, selection: BTreeSet<usize>) -> Result<Self> {
        self.working()?;
        let mut next = self.clone();
        if next.target.is_some_and(|t| !selection.contains(&t)) {
            next.target = None;
        }
        next.selection = selection;
        next.vif = None;
        Ok(next)
    }

    fn interpolated(&self) -> Result<Self> {
        self.require("interpolate", PipelineStage::Loaded)?;
        let ds = self.working()?;
        let columns: Vec<usize> = self.selection.iter().copied().collect();
        let filled = interpolate(ds, &columns)?;

        let mut next = self.clone();
        next.invalidate_from(PipelineStage::Interpolated);
        next.dataset = Some(Arc::new(filled));
        next.attempted.insert(PipelineStage::Interpolated, self.selection.clone());
        next.summarize(PipelineStage::Interpolated, columns.len());
        Ok(next)
    }

    fn normality_tested(&self, config: &PipelineConfig) -> Result<Self> {
        self.require("test_normality", PipelineStage::Interpolated)?;
        let ds = Arc::clone(self.working()?);
        let critical = config.jb_critical_value;

        let mut next = self.clone();
        next.invalidate_from(PipelineStage::NormalityTested);
        let results = next.per_column(PipelineStage::NormalityTested, |col| {
            jarque_bera(&ds.column_values(col)?, critical)
        });
        next.summarize(PipelineStage::NormalityTested, results.len());
        next.normality = Arc::new(results);
        Ok(next)
    }

    fn decomposed(&self, period: Period, config: &PipelineConfig) -> Result<Self> {
        self.require("decompose", PipelineStage::NormalityTested)?;
        let ds = Arc::clone(self.working()?);

        let mut next = self.clone();
        next.invalidate_from(PipelineStage::Decomposed);
        let results = next.per_column(PipelineStage::Decomposed, |col| {
            let values = ds.column_values(col)?;
            let p = resolve_period(period, &values, config.max_auto_period);
            decompose(&values, p, config.stl_robust_iterations)
        });
        next.summarize(PipelineStage::Decomposed, results.len());
        next.decompositions = Arc::new(results);
        Ok(next)
    }

    fn outliers_handled(&self, strategy: OutlierStrategy, config: &PipelineConfig) -> Result<Self> {
        self.require("handle_outliers", PipelineStage::Decomposed)?;
        let ds = Arc::clone(self.working()?);
        let normality = Arc::clone(&self.normality);
        let decompositions = Arc::clone(&self.decompositions);
        let thresholds = config.outlier_thresholds();

        let mut next = self.clone();
        next.invalidate_from(PipelineStage::OutliersHandled);
        let results = next.per_column(PipelineStage::OutliersHandled, |col| {
            let parts = decompositions.get(&col).ok_or_else(|| {
                AnalysisError::Degenerate(format!("column {col} has no decomposition"))
            })?;
            // Columns without a normality verdict fall back to IQR.
            let is_normal = normality.get(&col).is_some_and(|jb| jb.is_normal);
            let original = ds.column_values(col)?;
            detect_and_fix(&parts.residual, is_normal, &original, strategy, thresholds)
        });
        let flagged: usize = results.values().map(|r| r.outlier_indices.len()).sum();
        info!("{flagged} outlier(s) replaced using {strategy}");
        next.summarize(PipelineStage::OutliersHandled, results.len());
        next.outliers = Arc::new(results);
        Ok(next)
    }

    fn target_chosen(&self, column: usize) -> Result<Self> {
        self.working()?;
        if !self.selection.contains(&column) {
            return Err(AnalysisError::Validation(format!(
                "target column {column} is not selected"
            ))
            .into());
        }
        self.require("choose_target", PipelineStage::OutliersHandled)?;

        let mut next = self.clone();
        next.invalidate_from(PipelineStage::TargetChosen);
        next.target = Some(column);
        let msg = format!("target variable: {}", self.column_name(column));
        info!("{msg}");
        next.status = Some(msg);
        Ok(next)
    }

    fn vif_reduced(&self, threshold: f64) -> Result<Self> {
        let target = self
            .target
            .ok_or_else(|| AnalysisError::Validation("no target variable chosen".into()))?;
        self.require("reduce_vif", PipelineStage::TargetChosen)?;

        let y = self.cleaned_column(target)?;
        let predictors = self
            .selection
            .iter()
            .filter(|&&c| c != target)
            .map(|&c| Ok((c, self.cleaned_column(c)?)))
            .collect::<std::result::Result<BTreeMap<_, _>, AnalysisError>>()?;
        let outcome = reduce_by_vif(&predictors, &y, threshold)?;

        let mut next = self.clone();
        next.selection = outcome.kept.iter().copied().chain([target]).collect();
        let dropped: Vec<String> = outcome.dropped.iter().map(|&c| self.column_name(c)).collect();
        let msg = format!("VIF: dropped {dropped:?}, {} predictor(s) kept", outcome.kept.len());
        info!("{msg}");
        next.status = Some(msg);
        next.vif = Some(Arc::new(outcome));
        Ok(next)
    }
}

/// Apply one operation to `state`, returning the next state. `state` is
/// left untouched, including on error.
pub fn apply(state: &PipelineState, op: Operation, config: &PipelineConfig) -> Result<PipelineState> {
    match op {
        Operation::LoadDataset(ds) => Ok(PipelineState::load(Arc::new(ds))),
        Operation::FilterRows { column, value } => state.filtered(column, value),
        Operation::ClearFilter => state.unfiltered(),
        Operation::ToggleColumn(column) => state.toggled(column),
        Operation::SelectAll => {
            let all = state.working()?.numeric_columns().into_iter().collect();
            state.with_selection(all)
        }
        Operation::SelectNone => state.with_selection(BTreeSet::new()),
        Operation::Interpolate => state.interpolated(),
        Operation::TestNormality => state.normality_tested(config),
        Operation::Decompose { period } => state.decomposed(period, config),
        Operation::HandleOutliers { strategy } => state.outliers_handled(strategy, config),
        Operation::ChooseTarget(column) => state.target_chosen(column),
        Operation::ReduceVif { threshold } => state.vif_reduced(threshold),
    }
}

/// Send the cleaned selection to the engine.
pub fn run_analysis(
    state: &PipelineState,
    client: &dyn AnalysisClient,
    cancel: &CancellationToken,
) -> Result<AnalysisResult> {
    let request = state.build_request()?;
    let result = client.analyze(&request, cancel)?;
    info!(
        "engine result: {:?} model over {} series",
        result.model_type, result.series_count
    );
    Ok(result)
}
