use std::fs;

use alibi_attention::AttentionError;
use alibi_model::{AlibiConfig, AlibiTransformer, AlibiTransformerLayer, ModelError};
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};

fn small_config() -> AlibiConfig {
    AlibiConfig {
        num_layers: 2,
        d_model: 8,
        num_heads: 2,
        max_len: 16,
        expansion_factor: 2,
        ..AlibiConfig::default()
    }
}

fn max_abs_diff(a: &Tensor, b: &Tensor) -> Result<f32> {
    Ok(a.sub(b)?.abs()?.max_all()?.to_vec0::<f32>()?)
}

#[test]
fn stack_runs_every_layer() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let model = AlibiTransformer::load(small_config(), vb)?;
    model.set_training(false);

    assert_eq!(model.layers().len(), 2);
    // Per layer: two norms (2 each), kqv weight, two ffn projections (2 each).
    assert_eq!(varmap.all_vars().len(), 2 * 9);

    let input = Tensor::randn(0f32, 1.0, (3, 7, 8), &Device::Cpu)?;
    let output = model.forward(&input)?;
    assert_eq!(output.dims(), &[3, 7, 8]);

    let mut manual = input.clone();
    for layer in model.layers() {
        manual = layer.forward(&manual)?;
    }
    assert_eq!(max_abs_diff(&output, &manual)?, 0.0);
    Ok(())
}

#[test]
fn layer_does_not_leak_future_positions() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let layer = AlibiTransformerLayer::load(&small_config(), vb, 0)?;
    layer.set_training(false);

    let device = Device::Cpu;
    let input = Tensor::randn(0f32, 1.0, (1, 6, 8), &device)?;
    let prefix = input.narrow(1, 0, 4)?;
    let altered_tail = Tensor::randn(0f32, 5.0, (1, 2, 8), &device)?;
    let altered = Tensor::cat(&[&prefix, &altered_tail], 1)?;

    let original = layer.forward(&input)?.narrow(1, 0, 4)?;
    let changed = layer.forward(&altered)?.narrow(1, 0, 4)?;
    assert!(max_abs_diff(&original, &changed)? < 1e-5);
    Ok(())
}

#[test]
fn zero_sublayers_leave_residual_stream_unchanged() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let model = AlibiTransformer::load(small_config(), vb)?;

    {
        let data = varmap.data().lock().unwrap();
        for (name, var) in data.iter() {
            if name.contains("kqv") || name.contains("fc2") {
                var.set(&var.zeros_like()?)?;
            }
        }
    }

    // Training mode: dropout of zero outputs is still zero.
    let input = Tensor::randn(0f32, 1.0, (2, 4, 8), &Device::Cpu)?;
    let output = model.forward(&input)?;
    assert_eq!(max_abs_diff(&output, &input)?, 0.0);
    Ok(())
}

#[test]
fn training_mode_applies_dropout() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let config = AlibiConfig {
        dropout: 0.5,
        ..small_config()
    };
    let model = AlibiTransformer::load(config, vb)?;
    let input = Tensor::randn(0f32, 1.0, (2, 5, 8), &Device::Cpu)?;

    let trained = model.forward(&input)?;
    model.set_training(false);
    let first = model.forward(&input)?;
    let second = model.forward(&input)?;

    assert_eq!(max_abs_diff(&first, &second)?, 0.0);
    assert!(max_abs_diff(&trained, &first)? > 0.0);
    Ok(())
}

#[test]
fn four_wide_layer_handles_patterned_batch() -> Result<()> {
    let config = AlibiConfig {
        num_layers: 1,
        d_model: 4,
        num_heads: 2,
        max_len: 8,
        ..AlibiConfig::default()
    };
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let layer = AlibiTransformerLayer::load(&config, vb, 0)?;
    layer.set_training(false);

    let data: Vec<f32> = (0..12).map(|i| (i % 5) as f32 * 0.25 - 0.5).collect();
    let input = Tensor::from_vec(data, (1, 3, 4), &Device::Cpu)?;
    let output = layer.forward(&input)?;
    assert_eq!(output.dims(), &[1, 3, 4]);

    let (_, weights) = layer.attention().forward_with_weights(&input)?;
    let first_row = weights.get(0)?.get(0)?.get(0)?.to_vec1::<f32>()?;
    assert!((first_row[0] - 1.0).abs() < 1e-6);
    assert_eq!(&first_row[1..], &[0.0, 0.0]);
    Ok(())
}

#[test]
fn sequences_longer_than_max_len_are_rejected() -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let model = AlibiTransformer::load(small_config(), vb)?;

    let input = Tensor::zeros((1, 17, 8), DType::F32, &Device::Cpu)?;
    let err = model.forward(&input).unwrap_err();
    assert!(matches!(
        err,
        ModelError::Attention(AttentionError::SequenceTooLong {
            seq_len: 17,
            max_len: 16
        })
    ));
    Ok(())
}

#[test]
fn invalid_configs_fail_before_allocation() {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

    let indivisible = AlibiConfig {
        d_model: 10,
        num_heads: 4,
        ..small_config()
    };
    assert!(matches!(
        AlibiTransformer::load(indivisible, vb.clone()),
        Err(ModelError::Config(_))
    ));

    let window_without_causal = AlibiConfig {
        causal: false,
        window: Some(2),
        ..small_config()
    };
    assert!(matches!(
        AlibiTransformer::load(window_without_causal, vb),
        Err(ModelError::Config(_))
    ));
    assert!(varmap.all_vars().is_empty());
}

#[test]
fn config_loads_from_toml_and_json_files() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let toml_path = dir.path().join("alibi.toml");
    fs::write(&toml_path, "num_layers = 3\nd_model = 64\nnum_heads = 4\nwindow = 8\n")?;
    let from_toml = AlibiConfig::from_path(&toml_path)?;
    assert_eq!(from_toml.num_layers, 3);
    assert_eq!(from_toml.window, Some(8));
    assert_eq!(from_toml.lnorm_eps, 1e-6);

    let json_path = dir.path().join("alibi.json");
    fs::write(&json_path, serde_json::to_string(&from_toml)?)?;
    assert_eq!(AlibiConfig::from_path(&json_path)?, from_toml);

    let bare_path = dir.path().join("alibi");
    fs::write(&bare_path, "causal = false\n")?;
    assert!(!AlibiConfig::from_path(&bare_path)?.causal);

    let yaml_path = dir.path().join("alibi.yaml");
    fs::write(&yaml_path, "d_model: 64\n")?;
    assert!(matches!(
        AlibiConfig::from_path(&yaml_path),
        Err(ModelError::UnsupportedFormat(_))
    ));

    assert!(matches!(
        AlibiConfig::from_path(dir.path().join("missing.toml")),
        Err(ModelError::Io(_))
    ));
    Ok(())
}

#[test]
fn gradients_reach_every_parameter_through_windowed_attention() -> Result<()> {
    let config = AlibiConfig {
        num_layers: 1,
        window: Some(1),
        ..small_config()
    };
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let layer = AlibiTransformerLayer::load(&config, vb, 0)?;

    // Training mode keeps the dropout multiply in the graph.
    let input = Tensor::randn(0f32, 1.0, (2, 5, 8), &Device::Cpu)?;
    let grads = layer.forward(&input)?.sqr()?.sum_all()?.backward()?;

    let data = varmap.data().lock().unwrap();
    let mut names: Vec<_> = data.keys().cloned().collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "attn.kqv.weight",
            "attn_norm.bias",
            "attn_norm.weight",
            "ffn.fc1.bias",
            "ffn.fc1.weight",
            "ffn.fc2.bias",
            "ffn.fc2.weight",
            "ffn_norm.bias",
            "ffn_norm.weight",
        ]
    );

    for (name, var) in data.iter() {
        let grad = grads
            .get(var.as_tensor())
            .unwrap_or_else(|| panic!("no gradient for {name}"));
        assert_eq!(grad.dims(), var.dims(), "gradient shape for {name}");
        let values = grad.flatten_all()?.to_vec1::<f32>()?;
        assert!(values.iter().all(|v| v.is_finite()), "non-finite gradient for {name}");
        assert!(values.iter().any(|v| *v != 0.0), "zero gradient for {name}");
    }
    Ok(())
}
