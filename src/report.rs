use crate::{
    backend::{Diagnosis, FailureKind},
    discovery::ImageTask,
    jpeg_quality::JpegQualityResult,
    metadata::ImageMetadata,
    util::display_title,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BackendSlot {
    Saas,
    Sdk(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub image_id: String,
    pub backend_id: String,
    pub slot: BackendSlot,
    pub diagnosis: Diagnosis,
}

/// Optional columns, fixed once per run by the enabled features.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportLayout {
    pub jpeg_quality: bool,
    pub saas_column: Option<String>,
    pub sdk_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageReportRow {
    pub ordinal: usize,
    pub title: String,
    pub image_path: PathBuf,
    pub metadata: ImageMetadata,
    pub jpeg_quality: Option<JpegQualityResult>,
    pub saas_diagnosis: Option<Diagnosis>,
    pub sdk_diagnoses: Vec<Diagnosis>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started: String,
    pub finished: String,
    pub layout: ReportLayout,
    pub total_images: usize,
    pub interrupted: bool,
    pub rows: Vec<ImageReportRow>,
}

impl RunReport {
    pub fn is_partial(&self) -> bool {
        self.interrupted || self.rows.len() < self.total_images
    }
}

/// Merges one image's collected results into its row. SDK diagnoses follow
/// the configured SDK order whatever order the outcomes arrived in.
pub fn aggregate_row(
    task: &ImageTask,
    layout: &ReportLayout,
    outcomes: Vec<EvaluationOutcome>,
    jpeg_quality: Option<JpegQualityResult>,
    metadata: ImageMetadata,
) -> ImageReportRow {
    let mut saas = None;
    let mut sdk: Vec<Option<Diagnosis>> = vec![None; layout.sdk_columns.len()];
    for outcome in outcomes {
        match outcome.slot {
            BackendSlot::Saas => saas = Some(outcome.diagnosis),
            BackendSlot::Sdk(i) => {
                if let Some(cell) = sdk.get_mut(i) {
                    *cell = Some(outcome.diagnosis);
                }
            }
        }
    }

    let saas_diagnosis = layout
        .saas_column
        .as_ref()
        .map(|_| saas.unwrap_or_else(not_collected));
    let sdk_diagnoses = sdk
        .into_iter()
        .map(|d| d.unwrap_or_else(not_collected))
        .collect();

    ImageReportRow {
        ordinal: task.ordinal,
        title: display_title(&task.path),
        image_path: task.path.clone(),
        metadata,
        jpeg_quality: if layout.jpeg_quality {
            Some(jpeg_quality.unwrap_or_else(|| JpegQualityResult::Error {
                message: "not analyzed".to_string(),
            }))
        } else {
            None
        },
        saas_diagnosis,
        sdk_diagnoses,
    }
}

fn not_collected() -> Diagnosis {
    Diagnosis::failure(FailureKind::NotEvaluated, "no result collected")
}

/// Collects rows as images finish and hands them out in ordinal order.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    rows: BTreeMap<usize, ImageReportRow>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: ImageReportRow) {
        self.rows.insert(row.ordinal, row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<ImageReportRow> {
        self.rows.into_values().collect()
    }
}
