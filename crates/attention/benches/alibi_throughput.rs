use alibi_attention::{AlibiMultiHeadAttention, AttentionConfig};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

fn bench_alibi_attention(c: &mut Criterion) {
    let device = Device::Cpu;
    let batch = 4usize;
    let d_model = 256usize;
    let seq_lengths = &[32usize, 128, 256];
    let windows = &[None, Some(16usize)];

    for &window in windows {
        let label = match window {
            Some(w) => format!("alibi/window{w}"),
            None => "alibi/causal".to_string(),
        };
        let mut group = c.benchmark_group(label);
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let config = AttentionConfig {
            window,
            ..AttentionConfig::new(d_model, 8, 256)
        };
        let attention = AlibiMultiHeadAttention::load(config, vb.pp("attn"), 0).expect("attention");
        attention.set_training(false);

        for &seq_len in seq_lengths {
            let input =
                Tensor::randn(0f32, 1.0, (batch, seq_len, d_model), &device).expect("input");
            group.throughput(Throughput::Elements((batch * seq_len) as u64));
            group.bench_with_input(BenchmarkId::new("forward", seq_len), &input, |b, input| {
                b.iter(|| {
                    let out = attention.forward(black_box(input)).expect("forward");
                    black_box(out);
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_alibi_attention);
criterion_main!(benches);
