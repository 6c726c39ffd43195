use liveness_check::config::{Config, EvaluateRequest, MAX_SDK_TARGETS, RunConfig};

#[test]
fn parse_example_config() {
    let raw = include_str!("../liveness-check.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert!(cfg.processing.workers >= 1);
    assert!(!cfg.output.default_path.is_empty());
    assert_eq!(cfg.sdk.result_field, "diagnostic");
    assert_eq!(cfg.saas.result_field, "serviceResultLog");
}

#[test]
fn partial_config_keeps_defaults() {
    let cfg: Config = toml::from_str("[processing]\nworkers = 9\n").expect("parse TOML");
    assert_eq!(cfg.processing.workers, 9);
    assert_eq!(cfg.http.timeout_seconds, 30);
    assert!(cfg.discovery.extensions.iter().any(|e| e == "jpg"));
}

#[test]
fn example_config_builds_sdk_urls() {
    let cfg: Config = toml::from_str(include_str!("../liveness-check.example.toml")).unwrap();
    let req = EvaluateRequest {
        image: Some("face.jpg".into()),
        use_sdk: true,
        sdk_ports: vec![8080; MAX_SDK_TARGETS],
        ..EvaluateRequest::default()
    };
    let run = RunConfig::build(&req, &cfg).unwrap();
    assert_eq!(run.sdk_targets.len(), MAX_SDK_TARGETS);
    assert_eq!(
        run.sdk_targets[0].url,
        "http://localhost:8080/api/v1/selphid/passive-liveness/evaluate"
    );
    assert_eq!(run.sdk_targets[2].version, "v3");
}
