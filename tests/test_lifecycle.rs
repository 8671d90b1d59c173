// tests/test_lifecycle.rs — Registry, pipeline configuration and chained
// operators.

use vivid_vision::config::PipelineConfig;
use vivid_vision::pixel::{PixelBuffer, OPAQUE_BLACK};
use vivid_vision::{
    register_vision_operators, vision_registry, ConfigError, Contours, Operator, OperatorRegistry,
    ParamError, CATEGORY,
};

/// Route operator logs to the test harness; `RUST_LOG=debug` shows cooks.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn frame_with_square() -> PixelBuffer {
    let mut buf = PixelBuffer::filled(64, 64, OPAQUE_BLACK);
    for y in 22..42 {
        for x in 22..42 {
            buf.set_pixel(x, y, [255, 255, 255, 255]);
        }
    }
    buf
}

// ===== Registry =====

#[test]
fn registry_lists_vision_operators_in_name_order() {
    let registry = vision_registry();
    let names: Vec<_> = registry.names().collect();
    assert_eq!(names, ["BlobTrack", "Contours", "OpticalFlow"]);
    for (_, reg) in registry.iter() {
        assert_eq!(reg.category, CATEGORY);
        assert!(!reg.description.is_empty());
    }
}

#[test]
fn registering_twice_keeps_first_entry() {
    let mut registry = OperatorRegistry::new();
    register_vision_operators(&mut registry);
    register_vision_operators(&mut registry);
    assert_eq!(registry.len(), 3);
    assert!(!registry.register("Contours", "Other", "dup", Contours::boxed));
    assert_eq!(registry.get("Contours").map(|r| r.category), Some(CATEGORY));
}

#[test]
fn factories_produce_fresh_operators() {
    let registry = vision_registry();
    for name in ["Contours", "OpticalFlow", "BlobTrack"] {
        let op = registry.create(name).expect("registered");
        assert_eq!(op.name(), name);
        assert!(op.needs_cook());
        assert_eq!(op.cook_count(), 0);
        assert!(!op.output().is_valid());
    }
    assert!(registry.create("Sharpen").is_none());
}

// ===== Pipeline configuration =====

const PIPELINE: &str = r#"
[[operator]]
name = "edges"
kind = "Contours"
params = { threshold1 = 50, threshold2 = 150, lineWidth = 40 }

[[operator]]
name = "motion"
kind = "OpticalFlow"
params = { vizMode = 2, scale = 0.5 }

[[operator]]
name = "blobs"
kind = "BlobTrack"
"#;

#[test]
fn pipeline_toml_instantiates_with_params_applied() {
    init_tracing();
    let config = PipelineConfig::from_toml_str(PIPELINE).unwrap();
    assert_eq!(config.operators.len(), 3);
    let ops = config.instantiate(&vision_registry()).unwrap();

    let names: Vec<_> = ops.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, ["edges", "motion", "blobs"]);

    let edges = &ops[0].operator;
    assert_eq!(edges.param("threshold1"), Some(50.0));
    assert_eq!(edges.param("threshold2"), Some(150.0));
    // Clamped to the declared range.
    assert_eq!(edges.param("lineWidth"), Some(20.0));

    let motion = &ops[1].operator;
    assert_eq!(motion.param("vizMode"), Some(2.0));
    assert_eq!(motion.param("scale"), Some(0.5));

    let blobs = &ops[2].operator;
    assert_eq!(blobs.param("threshold"), Some(128.0));
}

#[test]
fn unknown_kind_is_reported() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [[operator]]
        name = "x"
        kind = "Sharpen"
        "#,
    )
    .unwrap();
    let err = config.instantiate(&vision_registry()).err().expect("should fail");
    assert!(matches!(err, ConfigError::UnknownKind(ref k) if k == "Sharpen"));
}

#[test]
fn unknown_param_is_reported() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [[operator]]
        name = "edges"
        kind = "Contours"
        params = { sigma = 2.0 }
        "#,
    )
    .unwrap();
    let err = config.instantiate(&vision_registry()).err().expect("should fail");
    match err {
        ConfigError::Param(ParamError::Unknown { operator, name }) => {
            assert_eq!(operator, "Contours");
            assert_eq!(name, "sigma");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn duplicate_instance_names_are_reported() {
    let config = PipelineConfig::from_toml_str(
        r#"
        [[operator]]
        name = "a"
        kind = "Contours"

        [[operator]]
        name = "a"
        kind = "BlobTrack"
        "#,
    )
    .unwrap();
    let err = config.instantiate(&vision_registry()).err().expect("should fail");
    assert!(matches!(err, ConfigError::DuplicateName(ref n) if n == "a"));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let err = PipelineConfig::from_toml_str("[[operator]\nname = ").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn captured_pipeline_survives_save_and_load() {
    let registry = vision_registry();
    let mut ops = PipelineConfig::from_toml_str(PIPELINE).unwrap().instantiate(&registry).unwrap();
    ops[2].operator.set_param("minArea", 250.0).unwrap();

    let captured = PipelineConfig::capture(ops.iter().map(|o| (o.name.as_str(), o.operator.as_ref())));
    assert_eq!(captured.operators[2].params.get("minArea"), Some(&250.0));

    let path = std::env::temp_dir().join(format!("vivid-vision-{}.toml", std::process::id()));
    captured.save(&path).unwrap();
    let loaded = PipelineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, captured);

    let rebuilt = loaded.instantiate(&registry).unwrap();
    for (a, b) in ops.iter().zip(&rebuilt) {
        assert_eq!(a.operator.params().snapshot(), b.operator.params().snapshot());
    }
}

#[test]
fn missing_config_file_is_an_io_error() {
    let err = PipelineConfig::load("/nonexistent/vivid-vision/pipeline.toml").unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

// ===== Chained operators =====

#[test]
fn operators_chain_through_pixel_views() {
    init_tracing();
    let registry = vision_registry();
    let mut ops = PipelineConfig::from_toml_str(PIPELINE).unwrap().instantiate(&registry).unwrap();
    let frame = frame_with_square();

    for i in 0..3u64 {
        let mut upstream = frame.clone();
        for op in ops.iter_mut() {
            op.operator.new_frame(i);
            op.operator.process(&upstream.view());
            let out = op.operator.output();
            assert!(out.is_valid(), "{} produced no output", op.name);
            assert_eq!((out.width(), out.height()), (64, 64));
            let mut next = PixelBuffer::default();
            next.copy_from_view(&out);
            upstream = next;
        }
    }
    for op in &ops {
        assert_eq!(op.operator.cook_count(), 3, "{}", op.name);
    }

    for op in ops.iter_mut() {
        op.operator.cleanup();
        assert!(!op.operator.output().is_valid());
    }
}
