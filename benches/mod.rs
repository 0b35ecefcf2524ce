use criterion::{criterion_group, criterion_main};


criterion_group!(
    benches,
    homeassistant::bench_discovery_payload,
    homeassistant::bench_state_payload,
    homeassistant::bench_dispatch,
    mqtt::bench_publish,
    mqtt::bench_poll
);
criterion_main!(benches);
