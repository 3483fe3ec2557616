// Integration tests for mbnas
//
// Blocks are built on the CPU backend. The large shape-law cases use the
// resolution and channel counts of a real first bottleneck stage.

use mbnas::prelude::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config() -> BlockConfig {
    BlockConfig::default()
}

fn assert_vec_approx(got: &[f64], expected: &[f64], tol: f64) {
    assert_eq!(got.len(), expected.len(), "length mismatch");
    for (i, (g, e)) in got.iter().zip(expected.iter()).enumerate() {
        assert!((g - e).abs() < tol, "index {}: got {} expected {}", i, g, e);
    }
}

// Shape law

#[test]
fn test_shape_law_ungrouped() -> Result<()> {
    let block = MobileBlock::<CpuBackend>::factory("w112_i16_o32_s1_e10_k3_g1", &config(), &CpuDevice)?;
    let x = CpuTensor::randn((1, 16, 112, 112), DType::F32, &CpuDevice)?;
    let y = block.forward(&x)?;
    assert_eq!(y.dims(), &[1, 32, 112, 112]);
    assert!(!block.has_shuffle());
    Ok(())
}

#[test]
fn test_shape_law_grouped() -> Result<()> {
    let block = MobileBlock::<CpuBackend>::factory("w112_i16_o32_s1_e10_k3_g2", &config(), &CpuDevice)?;
    let x = CpuTensor::randn((1, 16, 112, 112), DType::F32, &CpuDevice)?;
    let y = block.forward(&x)?;
    assert_eq!(y.dims(), &[1, 32, 112, 112]);
    assert!(block.has_shuffle());
    Ok(())
}

#[test]
fn test_shape_law_strided() -> Result<()> {
    let spec = BlockSpec::new(32, 8, 16, 2, 4, 5, 1);
    let block = MobileBlock::<CpuBackend>::new(spec, &config(), &CpuDevice)?;
    let x = CpuTensor::randn((2, 8, 32, 32), DType::F32, &CpuDevice)?;
    let y = block.forward(&x)?;
    assert_eq!(y.dims(), &[2, 16, 16, 16]);
    assert_eq!(spec.output_size(), Some(16));
    Ok(())
}

#[test]
fn test_input_size_is_descriptive_only() -> Result<()> {
    // Declared for 112x112, run on 10x10.
    let block = MobileBlock::<CpuBackend>::factory("w112_i4_o4_s1_e2_k3_g1", &config(), &CpuDevice)?;
    let x = CpuTensor::randn((1, 4, 10, 10), DType::F32, &CpuDevice)?;
    assert_eq!(block.forward(&x)?.dims(), &[1, 4, 10, 10]);
    Ok(())
}

#[test]
fn test_wrong_channel_count_fails() -> Result<()> {
    let block = MobileBlock::<CpuBackend>::factory("w8_i4_o4_s1_e2_k3_g1", &config(), &CpuDevice)?;
    let x = CpuTensor::randn((1, 6, 8, 8), DType::F32, &CpuDevice)?;
    assert!(block.forward(&x).is_err());
    Ok(())
}

// Construction from ids

#[test]
fn test_factory_rejects_invalid_id() {
    let err = MobileBlock::<CpuBackend>::factory("not_a_valid_id", &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(err.is_parse());
    assert_eq!(err.to_string(), "ParseError: not_a_valid_id");
}

#[test]
fn test_factory_keeps_original_case_in_error() {
    let err = MobileBlock::<CpuBackend>::factory("W112_I16_oops", &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Parse { ref input } if input == "W112_I16_oops"));
}

#[test]
fn test_factory_search_mode() -> Result<()> {
    init_tracing();
    let loose = config().with_id_match(IdMatch::Search);
    let block = MobileBlock::<CpuBackend>::factory("cell_0/W8_I4_O8_S1_E2_K3_G2", &loose, &CpuDevice)?;
    assert_eq!(block.block_id(), "w8_i4_o8_s1_e2_k3_g2");
    assert!(MobileBlock::<CpuBackend>::factory("cell_0/w8_i4_o8_s1_e2_k3_g2", &config(), &CpuDevice).is_err());
    Ok(())
}

#[test]
fn test_indivisible_groups_is_tensor_error() {
    // 6 input channels cannot be split into 4 groups.
    let err = MobileBlock::<CpuBackend>::factory("w8_i6_o8_s1_e2_k3_g4", &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));
}

#[test]
fn test_zero_expansion_is_tensor_error() {
    // e0 leaves no inner channels to split into depthwise groups.
    let err = MobileBlock::<CpuBackend>::factory("w8_i4_o4_s1_e0_k3_g1", &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));
}

#[test]
fn test_zero_kernel_is_tensor_error() {
    let err = MobileBlock::<CpuBackend>::factory("w8_i4_o4_s1_e2_k0_g1", &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));
}

#[test]
fn test_overflowing_inner_channels_is_tensor_error() -> Result<()> {
    init_tracing();
    let id = format!("w1_i{}_o1_s1_e2_k1_g1", usize::MAX / 2 + 1);

    // The id itself is well-formed; only building the block fails.
    let spec = BlockId::decode(&id)?;
    assert_eq!(spec.inner_channels(), None);
    let err = MobileBlock::<CpuBackend>::new(spec, &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));

    let err = MobileBlock::<CpuBackend>::factory(&id, &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));
    assert!(err.to_string().contains("overflows"));

    let err = BlockFactory::factory("K1E2G1Block")?
        .build::<CpuBackend>(1, usize::MAX / 2 + 1, 1, 1, &config(), &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));
    Ok(())
}

#[test]
fn test_accessors_mirror_id() -> Result<()> {
    let block = MobileBlock::<CpuBackend>::factory("w56_i24_o40_s2_e3_k5_g1", &config(), &CpuDevice)?;
    assert_eq!(block.input_size(), 56);
    assert_eq!(block.in_channels(), 24);
    assert_eq!(block.out_channels(), 40);
    assert_eq!(block.stride(), 2);
    assert_eq!(block.expansion(), 3);
    assert_eq!(block.kernel(), 5);
    assert_eq!(block.groups(), 1);
    assert_eq!(block.spec().inner_channels(), Some(72));
    assert_eq!(block.block_id(), "w56_i24_o40_s2_e3_k5_g1");
    Ok(())
}

// Named factories

#[test]
fn test_named_construction() -> Result<()> {
    init_tracing();
    let factory = BlockFactory::factory("K3E10G2Block")?;
    assert_eq!(factory.block_name(), "K3E10G2Block");
    let block = factory.build::<CpuBackend>(112, 16, 32, 1, &config(), &CpuDevice)?;
    assert!(!block.is_skip());
    assert_eq!(block.block_id().as_deref(), Some("w112_i16_o32_s1_e10_k3_g2"));
    Ok(())
}

#[test]
fn test_skip_factory_builds_skip_variant() -> Result<()> {
    let factory = BlockFactory::factory("SkipBlock")?;
    assert!(factory.is_skip());

    let identity = factory.build::<CpuBackend>(56, 24, 24, 1, &config(), &CpuDevice)?;
    assert!(identity.is_skip());
    assert_eq!(identity.block_id(), None);
    assert!(identity.as_skip().map(SkipBlock::is_identity).unwrap_or(false));

    let projection = factory.build::<CpuBackend>(56, 24, 32, 2, &config(), &CpuDevice)?;
    assert!(projection.as_skip().is_some());
    assert!(projection.as_mobile().is_none());
    let x = CpuTensor::randn((1, 24, 8, 8), DType::F32, &CpuDevice)?;
    assert_eq!(projection.forward(&x)?.dims(), &[1, 32, 4, 4]);
    Ok(())
}

#[test]
fn test_unknown_factory_name() {
    for name in ["K3E10Block", "MobileBlock", "skipblock", "K3E10G2Block "] {
        let err = BlockFactory::factory(name).unwrap_err();
        assert_eq!(err.to_string(), format!("ParseError: {name}"));
    }
}

#[test]
fn test_factory_reuse_across_positions() -> Result<()> {
    let factory = BlockFactory::factory("K5E6G1Block")?;
    let a = factory.build::<CpuBackend>(112, 16, 24, 2, &config(), &CpuDevice)?;
    let b = factory.build::<CpuBackend>(56, 24, 24, 1, &config(), &CpuDevice)?;
    assert_eq!(a.block_id().as_deref(), Some("w112_i16_o24_s2_e6_k5_g1"));
    assert_eq!(b.block_id().as_deref(), Some("w56_i24_o24_s1_e6_k5_g1"));
    assert_eq!((a.in_channels(), a.out_channels(), a.stride()), (16, 24, 2));
    Ok(())
}

fn legacy_alias(caps: &regex::Captures<'_>) -> Option<FactoryKind> {
    let kernel = caps.get(2)?.as_str().parse().ok()?;
    let expansion = caps.get(1)?.as_str().parse().ok()?;
    Some(FactoryKind::Mobile {
        kernel,
        expansion,
        groups: 1,
    })
}

#[test]
fn test_custom_registry_rule() -> Result<()> {
    let registry = BlockFactoryRegistry::new()?.with_rule(
        "mbconv",
        r"^MBConv([0-9]+)_([0-9]+)x[0-9]+$",
        legacy_alias,
    )?;
    assert_eq!(registry.rule_names(), vec!["mobile", "skip", "mbconv"]);

    let factory = registry.resolve("MBConv6_3x3")?;
    assert_eq!(factory.block_name(), "MBConv6_3x3");
    let spec = factory.spec(28, 32, 32, 1).unwrap();
    assert_eq!(spec.to_string(), "w28_i32_o32_s1_e6_k3_g1");

    // The global registry knows nothing about the alias.
    assert!(BlockFactory::factory("MBConv6_3x3").is_err());
    Ok(())
}

// Configuration

#[test]
fn test_f64_config() -> Result<()> {
    let config = config().with_dtype(DType::F64);
    let block = MobileBlock::<CpuBackend>::factory("w8_i4_o8_s1_e2_k3_g2", &config, &CpuDevice)?;
    assert!(block.parameters().iter().all(|p| p.dtype() == DType::F64));
    let x = CpuTensor::randn((1, 4, 8, 8), DType::F64, &CpuDevice)?;
    assert_eq!(block.forward(&x)?.dims(), &[1, 8, 8, 8]);
    Ok(())
}

#[test]
fn test_invalid_bn_eps_fails_construction() {
    let bad = config().with_bn_eps(0.0);
    let err = MobileBlock::<CpuBackend>::factory("w8_i4_o8_s1_e2_k3_g1", &bad, &CpuDevice)
        .err()
        .unwrap();
    assert!(matches!(err, Error::Tensor(_)));
}

#[test]
fn test_eval_mode_is_deterministic() -> Result<()> {
    let block = MobileBlock::<CpuBackend>::factory("w6_i4_o4_s1_e2_k3_g2", &config(), &CpuDevice)?;
    block.eval();
    let x = CpuTensor::randn((2, 4, 6, 6), DType::F32, &CpuDevice)?;
    let a = block.forward(&x)?.to_f64_vec()?;
    let b = block.forward(&x)?.to_f64_vec()?;
    assert_vec_approx(&a, &b, 1e-12);
    Ok(())
}

#[test]
fn test_projection_output_is_normalized_in_training() -> Result<()> {
    // No activation after the projection: outputs are batch-normalized per
    // channel, so each channel has mean ~0 and some negative values.
    let config = config().with_dtype(DType::F64);
    let block = MobileBlock::<CpuBackend>::factory("w8_i4_o2_s1_e2_k3_g1", &config, &CpuDevice)?;
    let x = CpuTensor::randn((4, 4, 8, 8), DType::F64, &CpuDevice)?;
    let y = block.forward(&x)?;
    let (mean, _) = y.channel_stats()?;
    assert_vec_approx(&mean, &[0.0, 0.0], 1e-6);
    assert!(y.to_f64_vec()?.iter().any(|v| *v < 0.0));
    Ok(())
}

#[test]
fn test_minimal_block_parameter_count() -> Result<()> {
    let relu = config().with_activation(Activation::Relu);
    let block = MobileBlock::<CpuBackend>::factory("w4_i1_o1_s1_e1_k1_g1", &relu, &CpuDevice)?;
    // Three 1x1 single-channel convs, each followed by a norm with gamma and beta.
    assert_eq!(block.num_parameters(), 3 * (1 + 2));
    let x = CpuTensor::randn((2, 1, 4, 4), DType::F32, &CpuDevice)?;
    assert_eq!(block.forward(&x)?.dims(), &[2, 1, 4, 4]);
    Ok(())
}

#[test]
fn test_config_json_round_trip() {
    let config = config()
        .with_dtype(DType::F64)
        .with_activation(Activation::Relu)
        .with_id_match(IdMatch::Search);
    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"activation\":\"relu\""));
    let back: BlockConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);
}

#[test]
fn test_config_json_defaults_missing_fields() {
    let config: BlockConfig = serde_json::from_str(r#"{"bn_eps": 0.001}"#).unwrap();
    assert_eq!(config.bn_eps, 0.001);
    assert_eq!(config.activation, Activation::Relu6);
    assert_eq!(config.id_match, IdMatch::Exact);
}

#[test]
fn test_spec_json_round_trip() {
    let spec = BlockSpec::new(112, 16, 32, 1, 10, 3, 2);
    let json = serde_json::to_string(&spec).unwrap();
    assert!(json.contains("\"expansion\":10"));
    let back: BlockSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
}
