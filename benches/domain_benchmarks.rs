use alloy::primitives::U256;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use evm_rpc_facade::app::facade::format_balance;
use evm_rpc_facade::domain::{ChainConfig, ChainId};
use validator::Validate;

fn bench_chain_id_parsing(c: &mut Criterion) {
    c.bench_function("parse_hex_chain_id", |b| {
        b.iter(|| black_box("0x14A34").parse::<ChainId>())
    });

    c.bench_function("parse_decimal_chain_id", |b| {
        b.iter(|| black_box("11155111").parse::<ChainId>())
    });
}

fn bench_balance_formatting(c: &mut Criterion) {
    let wei = U256::from(1_234_567_890_123_456_789u128);

    c.bench_function("format_balance", |b| {
        b.iter(|| format_balance(black_box(wei)))
    });
}

fn bench_chain_config_validation(c: &mut Criterion) {
    let config = ChainConfig::ethereum_sepolia();

    c.bench_function("validate_chain_config", |b| {
        b.iter(|| {
            let _ = black_box(&config).validate();
        })
    });
}

criterion_group!(
    benches,
    bench_chain_id_parsing,
    bench_balance_formatting,
    bench_chain_config_validation
);
criterion_main!(benches);
