//! Benchmark forward passes of each network.
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rlnets::models::{
    Actor, ActorConfig, CnnStem, CnnStemConfig, Critic, CriticConfig, PpoActor, PpoActorConfig,
    SplitCritic, SplitCriticConfig,
};
use rlnets::torch::FeedForwardModule;
use rlnets::StateActionModule;
use tch::{nn::VarStore, Device, Kind, Tensor};

const OBS_DIM: usize = 17;
const ACTION_DIM: usize = 6;

fn rand(shape: &[i64]) -> Tensor {
    Tensor::rand(shape, (Kind::Float, Device::Cpu))
}

/// Flat actor networks on batches of observations
fn actors(c: &mut Criterion) {
    let _no_grad = tch::no_grad_guard();
    let vs = VarStore::new(Device::Cpu);
    let actor = Actor::new(&(vs.root() / "actor"), OBS_DIM, ACTION_DIM, &ActorConfig::default());
    let ppo_actor = PpoActor::new(
        &(vs.root() / "ppo_actor"),
        OBS_DIM,
        ACTION_DIM,
        &PpoActorConfig::default(),
    );

    let mut group = c.benchmark_group("actors");
    for batch_size in [1, 32, 256] {
        let obs = rand(&[batch_size, OBS_DIM as i64]);
        group.bench_with_input(BenchmarkId::new("actor", batch_size), &obs, |b, obs| {
            b.iter(|| actor.forward(obs))
        });
        group.bench_with_input(BenchmarkId::new("ppo_actor", batch_size), &obs, |b, obs| {
            b.iter(|| ppo_actor.forward(obs))
        });
    }
}

/// Critics of (observation, action) pairs
fn critics(c: &mut Criterion) {
    let _no_grad = tch::no_grad_guard();
    let vs = VarStore::new(Device::Cpu);
    let critic = Critic::new(&(vs.root() / "critic"), OBS_DIM, ACTION_DIM, &CriticConfig::default());
    let split_critic = SplitCritic::new(
        &(vs.root() / "split_critic"),
        OBS_DIM,
        ACTION_DIM,
        &SplitCriticConfig::default(),
    );
    let obs = rand(&[64, OBS_DIM as i64]);
    let action = rand(&[64, ACTION_DIM as i64]);

    let mut group = c.benchmark_group("critics");
    group.bench_function("critic", |b| b.iter(|| critic.forward(&obs, &action)));
    group.bench_function("split_critic", |b| {
        b.iter(|| split_critic.forward(&obs, &action))
    });
}

/// Convolutional stem on batches and sequences of frames
fn cnn_stem(c: &mut Criterion) {
    let _no_grad = tch::no_grad_guard();
    let vs = VarStore::new(Device::Cpu);
    let stem = CnnStem::new(&vs.root(), [4, 84, 84], 256, &CnnStemConfig::default())
        .expect("valid observation shape");

    let mut group = c.benchmark_group("cnn_stem");
    let batch = rand(&[32, 4, 84, 84]);
    let sequences = rand(&[4, 8, 4, 84, 84]);
    group.bench_function("batch", |b| b.iter(|| stem.forward(&batch)));
    group.bench_function("sequences", |b| b.iter(|| stem.forward(&sequences)));
}

criterion_group!(benches, actors, critics, cnn_stem);
criterion_main!(benches);
