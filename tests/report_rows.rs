use liveness_check::backend::{Diagnosis, FailureKind};
use liveness_check::discovery::ImageTask;
use liveness_check::jpeg_quality::JpegQualityResult;
use liveness_check::metadata::ImageMetadata;
use liveness_check::report::{
    BackendSlot, EvaluationOutcome, ReportLayout, ResultAggregator, aggregate_row,
};
use std::path::PathBuf;

fn layout() -> ReportLayout {
    ReportLayout {
        jpeg_quality: false,
        saas_column: Some("Diagnostic SaaS".into()),
        sdk_columns: vec!["Diagnostic SDK v1".into(), "Diagnostic SDK v2".into()],
    }
}

fn task(ordinal: usize) -> ImageTask {
    ImageTask {
        id: format!("img-{ordinal:04}"),
        path: PathBuf::from(format!("imgs/face_{ordinal}.jpg")),
        ordinal,
    }
}

fn outcome(slot: BackendSlot, label: &str) -> EvaluationOutcome {
    EvaluationOutcome {
        image_id: "img-0000".into(),
        backend_id: format!("{slot:?}"),
        slot,
        diagnosis: Diagnosis::Success {
            label: label.into(),
            payload: serde_json::Value::Null,
        },
    }
}

#[test]
fn sdk_order_follows_configuration() {
    let outcomes = vec![
        outcome(BackendSlot::Sdk(1), "second"),
        outcome(BackendSlot::Saas, "saas"),
        outcome(BackendSlot::Sdk(0), "first"),
    ];
    let row = aggregate_row(&task(0), &layout(), outcomes, None, ImageMetadata::default());
    let cells: Vec<_> = row.sdk_diagnoses.iter().map(Diagnosis::cell).collect();
    assert_eq!(cells, ["first", "second"]);
    assert_eq!(row.saas_diagnosis.unwrap().cell(), "saas");
    assert_eq!(row.title, "face_0");
    assert!(row.jpeg_quality.is_none());
}

#[test]
fn missing_outcome_is_marked_not_evaluated() {
    let outcomes = vec![outcome(BackendSlot::Sdk(0), "first")];
    let row = aggregate_row(&task(0), &layout(), outcomes, None, ImageMetadata::default());
    let expected = Diagnosis::failure(FailureKind::NotEvaluated, "no result collected");
    assert_eq!(row.sdk_diagnoses[1], expected);
    assert_eq!(row.saas_diagnosis, Some(expected));
    assert_eq!(row.sdk_diagnoses[1].cell(), "Error: no result collected");
}

#[test]
fn disabled_columns_stay_empty() {
    let layout = ReportLayout {
        jpeg_quality: false,
        saas_column: None,
        sdk_columns: vec![],
    };
    let row = aggregate_row(
        &task(0),
        &layout,
        vec![],
        Some(JpegQualityResult::NotJpeg),
        ImageMetadata::default(),
    );
    assert!(row.saas_diagnosis.is_none());
    assert!(row.sdk_diagnoses.is_empty());
    assert!(row.jpeg_quality.is_none());
}

#[test]
fn aggregator_sorts_by_ordinal() {
    let mut agg = ResultAggregator::new();
    for ordinal in [2, 0, 1] {
        let row = aggregate_row(&task(ordinal), &layout(), vec![], None, ImageMetadata::default());
        agg.push(row);
    }
    assert_eq!(agg.len(), 3);
    let ordinals: Vec<_> = agg.into_rows().iter().map(|r| r.ordinal).collect();
    assert_eq!(ordinals, [0, 1, 2]);
}
