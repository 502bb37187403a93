//! Cross-module scenarios: buffer traffic between devices, layer pipelines,
//! and host/accelerator agreement on the same inputs.
//!
//! Accelerator cases probe for a usable adapter first and skip quietly on
//! machines without one, so the suite passes on headless CI.

use std::sync::Arc;

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::alloc::{allocator_for, DeviceAllocator};
use crate::buffer::Buffer;
use crate::device::Device;
use crate::dtype::DType;
use crate::gpu::WgpuContext;
use crate::kernels;
use crate::layers::{
    EmbeddingLayer, Layer, MatmulLayer, MhaLayer, RmsNormLayer, RopeLayer, SwigluLayer,
    VecAddLayer,
};
use crate::tensor::Tensor;

/// Honors `RUST_LOG` in test runs; safe to call from every test.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn cpu() -> Arc<dyn DeviceAllocator> {
    init_logging();
    allocator_for(Device::Cpu)
}

fn gpu_or_skip(test: &str) -> Option<Arc<dyn DeviceAllocator>> {
    init_logging();
    if WgpuContext::is_available() {
        Some(allocator_for(Device::Wgpu))
    } else {
        eprintln!("skipping {test}: no wgpu adapter on this machine");
        None
    }
}

fn random_vec(len: usize, seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

#[test]
fn host_device_host_round_trip() {
    let Some(gpu) = gpu_or_skip("host_device_host_round_trip") else {
        return;
    };
    let data = random_vec(32, 7);
    let device_tensor = Tensor::from_f32(&[32], &data, gpu).unwrap();
    assert_eq!(device_tensor.device(), Device::Wgpu);
    assert_eq!(device_tensor.to_vec_f32().unwrap(), data);
}

#[test]
fn device_fill_and_device_to_device_copy() {
    let Some(gpu) = gpu_or_skip("device_fill_and_device_to_device_copy") else {
        return;
    };
    let a = Tensor::zeros(&[64], DType::F32, gpu.clone()).unwrap();
    kernels::gpu::fill(&a, 1.0).unwrap();
    let b = Tensor::zeros(&[64], DType::F32, gpu).unwrap();
    b.buffer().copy_from(a.buffer()).unwrap();
    assert_eq!(b.to_vec_f32().unwrap(), vec![1.0f32; 64]);
}

#[test]
fn external_host_memory_feeds_a_device_buffer() {
    let Some(gpu) = gpu_or_skip("external_host_memory_feeds_a_device_buffer") else {
        return;
    };
    let mut backing = vec![2.5f32; 16];
    let staging = unsafe {
        Buffer::from_host_ptr(backing.as_mut_ptr() as *mut u8, 16 * 4)
    }
    .unwrap();
    let device = Buffer::new(16 * 4, gpu).unwrap();
    device.copy_from(&staging).unwrap();
    let tensor = Tensor::from_buffer(&[16], DType::F32, device).unwrap();
    assert_eq!(tensor.to_vec_f32().unwrap(), vec![2.5f32; 16]);
    // backing is still the caller's to free.
    drop(staging);
    assert_eq!(backing[0], 2.5);
}

#[test]
fn external_device_buffer_wraps_without_taking_ownership() {
    init_logging();
    if !WgpuContext::is_available() {
        eprintln!("skipping external_device_buffer_wraps_without_taking_ownership: no wgpu adapter");
        return;
    }
    let context = WgpuContext::create().unwrap();
    let raw = Arc::new(context.create_storage_buffer(64, "caller owned"));
    {
        let buffer = Buffer::from_wgpu(raw.clone(), 64, context.clone()).unwrap();
        assert!(buffer.is_external());
        assert_eq!(buffer.device(), Device::Wgpu);
        buffer.zero();
    }
    // Dropping the wrapper must leave the caller's buffer usable.
    let bytes = context.read_buffer(&raw, 64).unwrap();
    assert!(bytes.iter().all(|&b| b == 0));

    // Undersized backing is rejected up front.
    let err = Buffer::from_wgpu(raw, 128, context).unwrap_err();
    assert_eq!(err.code(), 6);
}

#[test]
fn add_layer_agrees_across_devices() {
    let Some(gpu) = gpu_or_skip("add_layer_agrees_across_devices") else {
        return;
    };
    let a = random_vec(256, 11);
    let b = random_vec(256, 12);
    let expected: Vec<f32> = a.iter().zip(&b).map(|(a, b)| a + b).collect();

    for (device, alloc) in [(Device::Cpu, cpu()), (Device::Wgpu, gpu)] {
        let mut layer = VecAddLayer::new(device);
        layer
            .set_input(0, Tensor::from_f32(&[256], &a, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[256], &b, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[256], DType::F32, alloc).unwrap())
            .unwrap();
        layer.forward().unwrap();
        let got = layer.output(0).unwrap().to_vec_f32().unwrap();
        for (g, e) in got.iter().zip(&expected) {
            assert_relative_eq!(g, e, epsilon = 1e-5);
        }
    }
}

#[test]
fn matmul_layer_agrees_across_devices() {
    let Some(gpu) = gpu_or_skip("matmul_layer_agrees_across_devices") else {
        return;
    };
    let (m, k) = (8, 16);
    let weight = random_vec(m * k, 21);
    let input = random_vec(k, 22);

    let run = |device, alloc: Arc<dyn DeviceAllocator>| {
        let mut layer = MatmulLayer::new(device, 1.0);
        layer
            .set_input(0, Tensor::from_f32(&[k], &input, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[m, k], &weight, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[m], DType::F32, alloc).unwrap())
            .unwrap();
        layer.forward().unwrap();
        layer.output(0).unwrap().to_vec_f32().unwrap()
    };

    let host = run(Device::Cpu, cpu());
    let accel = run(Device::Wgpu, gpu);
    for (h, a) in host.iter().zip(&accel) {
        assert_relative_eq!(h, a, epsilon = 1e-3);
    }
}

#[test]
fn rmsnorm_layer_agrees_across_devices() {
    let Some(gpu) = gpu_or_skip("rmsnorm_layer_agrees_across_devices") else {
        return;
    };
    let dim = 128;
    let input = random_vec(dim, 31);
    let weight = random_vec(dim, 32);

    let run = |device, alloc: Arc<dyn DeviceAllocator>| {
        let mut layer = RmsNormLayer::new(device, dim, 1e-5);
        layer
            .set_input(0, Tensor::from_f32(&[dim], &input, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[dim], &weight, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[dim], DType::F32, alloc).unwrap())
            .unwrap();
        layer.forward().unwrap();
        layer.output(0).unwrap().to_vec_f32().unwrap()
    };

    let host = run(Device::Cpu, cpu());
    let accel = run(Device::Wgpu, gpu);
    for (h, a) in host.iter().zip(&accel) {
        assert_relative_eq!(h, a, epsilon = 1e-4);
    }
}

#[test]
fn attention_block_agrees_across_devices() {
    let Some(gpu) = gpu_or_skip("attention_block_agrees_across_devices") else {
        return;
    };
    let (head_num, head_size, seq_len) = (4, 8, 16);
    let kv_dim = head_num * head_size;
    let pos = 3;
    let query = random_vec(kv_dim, 41);
    let key_cache = random_vec(seq_len * kv_dim, 42);
    let value_cache = random_vec(seq_len * kv_dim, 43);

    let run = |device, alloc: Arc<dyn DeviceAllocator>| {
        let mut layer = MhaLayer::new(device, 0, head_num, seq_len, kv_dim, 1, head_size);
        layer.set_pos(pos);
        layer
            .set_input(0, Tensor::from_f32(&[kv_dim], &query, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(
                1,
                Tensor::zeros(&[head_num, seq_len], DType::F32, alloc.clone()).unwrap(),
            )
            .unwrap();
        layer
            .set_input(
                2,
                Tensor::from_f32(&[seq_len, kv_dim], &key_cache, alloc.clone()).unwrap(),
            )
            .unwrap();
        layer
            .set_input(
                3,
                Tensor::from_f32(&[seq_len, kv_dim], &value_cache, alloc.clone()).unwrap(),
            )
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[kv_dim], DType::F32, alloc).unwrap())
            .unwrap();
        layer.forward().unwrap();
        layer.output(0).unwrap().to_vec_f32().unwrap()
    };

    let host = run(Device::Cpu, cpu());
    let accel = run(Device::Wgpu, gpu);
    for (h, a) in host.iter().zip(&accel) {
        assert_relative_eq!(h, a, epsilon = 1e-3);
    }
}

#[test]
fn rope_layer_agrees_across_devices() {
    let Some(gpu) = gpu_or_skip("rope_layer_agrees_across_devices") else {
        return;
    };
    let (head_size, dim, kv_dim, max_seq) = (8, 32, 16, 64);
    let (sin, cos) = kernels::sin_cos_cache(head_size, max_seq, 10000.0);
    let q_data = random_vec(dim, 51);
    let k_data = random_vec(kv_dim, 52);

    let run = |device, alloc: Arc<dyn DeviceAllocator>| {
        let mut layer = RopeLayer::new(device, dim, kv_dim, head_size);
        let q = Tensor::from_f32(&[dim], &q_data, alloc.clone()).unwrap();
        let k = Tensor::from_f32(&[kv_dim], &k_data, alloc.clone()).unwrap();
        layer.set_input(0, q.clone()).unwrap();
        layer.set_input(1, k.clone()).unwrap();
        layer
            .set_input(2, Tensor::from_i32(&[1], &[5], alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(3, Tensor::from_array2(&sin, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(4, Tensor::from_array2(&cos, alloc).unwrap())
            .unwrap();
        layer.forward().unwrap();
        (q.to_vec_f32().unwrap(), k.to_vec_f32().unwrap())
    };

    let (host_q, host_k) = run(Device::Cpu, cpu());
    let (accel_q, accel_k) = run(Device::Wgpu, gpu);
    for (h, a) in host_q.iter().zip(&accel_q).chain(host_k.iter().zip(&accel_k)) {
        assert_relative_eq!(h, a, epsilon = 1e-4);
    }
}

#[test]
fn feed_forward_block_runs_end_to_end_on_host() {
    // rmsnorm -> two matmul projections -> swiglu -> down projection -> add,
    // the shape of one transformer feed-forward block at decode time.
    let cpu = cpu();
    let (dim, hidden) = (8, 16);
    let x = Tensor::from_f32(&[dim], &random_vec(dim, 61), cpu.clone()).unwrap();
    let norm_w = Tensor::from_f32(&[dim], &vec![1.0; dim], cpu.clone()).unwrap();
    let normed = Tensor::zeros(&[dim], DType::F32, cpu.clone()).unwrap();

    let mut rms = RmsNormLayer::new(Device::Cpu, dim, 1e-5);
    rms.set_input(0, x.clone()).unwrap();
    rms.set_input(1, norm_w).unwrap();
    rms.set_output(0, normed.clone()).unwrap();
    rms.forward().unwrap();

    let gate = Tensor::zeros(&[hidden], DType::F32, cpu.clone()).unwrap();
    let up = Tensor::zeros(&[hidden], DType::F32, cpu.clone()).unwrap();
    for (weight_seed, out) in [(62, &gate), (63, &up)] {
        let mut proj = MatmulLayer::new(Device::Cpu, 1.0);
        proj.set_input(0, normed.clone()).unwrap();
        proj.set_input(
            1,
            Tensor::from_f32(&[hidden, dim], &random_vec(hidden * dim, weight_seed), cpu.clone())
                .unwrap(),
        )
        .unwrap();
        proj.set_output(0, out.clone()).unwrap();
        proj.forward().unwrap();
    }

    let activated = Tensor::zeros(&[hidden], DType::F32, cpu.clone()).unwrap();
    let mut swiglu = SwigluLayer::new(Device::Cpu, hidden);
    swiglu.set_input(0, gate).unwrap();
    swiglu.set_input(1, up).unwrap();
    swiglu.set_output(0, activated.clone()).unwrap();
    swiglu.forward().unwrap();

    let down = Tensor::zeros(&[dim], DType::F32, cpu.clone()).unwrap();
    let mut proj = MatmulLayer::new(Device::Cpu, 1.0);
    proj.set_input(0, activated).unwrap();
    proj.set_input(
        1,
        Tensor::from_f32(&[dim, hidden], &random_vec(dim * hidden, 64), cpu.clone()).unwrap(),
    )
    .unwrap();
    proj.set_output(0, down.clone()).unwrap();
    proj.forward().unwrap();

    let residual = Tensor::zeros(&[dim], DType::F32, cpu.clone()).unwrap();
    let mut add = VecAddLayer::new(Device::Cpu);
    add.set_input(0, x.clone()).unwrap();
    add.set_input(1, down.clone()).unwrap();
    add.set_output(0, residual.clone()).unwrap();
    add.forward().unwrap();

    let x_host = x.to_vec_f32().unwrap();
    let down_host = down.to_vec_f32().unwrap();
    let got = residual.to_vec_f32().unwrap();
    for i in 0..dim {
        assert_relative_eq!(got[i], x_host[i] + down_host[i], epsilon = 1e-5);
    }
}

#[test]
fn embedding_layer_agrees_across_devices() {
    let Some(gpu) = gpu_or_skip("embedding_layer_agrees_across_devices") else {
        return;
    };
    let (vocab, dim) = (16, 8);
    let table = random_vec(vocab * dim, 71);
    let ids = [3i32, 0, 15];

    let run = |device, alloc: Arc<dyn DeviceAllocator>| {
        let mut layer = EmbeddingLayer::new(device, dim, vocab);
        layer
            .set_input(0, Tensor::from_i32(&[3], &ids, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(1, Tensor::from_f32(&[vocab, dim], &table, alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[3, dim], DType::F32, alloc).unwrap())
            .unwrap();
        layer.forward().unwrap();
        layer.output(0).unwrap().to_vec_f32().unwrap()
    };

    let host = run(Device::Cpu, cpu());
    let accel = run(Device::Wgpu, gpu);
    assert_eq!(host, accel);
}

#[test]
fn embedding_rejects_out_of_vocab_ids_on_both_devices() {
    let Some(gpu) = gpu_or_skip("embedding_rejects_out_of_vocab_ids_on_both_devices") else {
        return;
    };
    let (vocab, dim) = (4, 2);
    for alloc in [cpu(), gpu] {
        let device = alloc.device();
        let mut layer = EmbeddingLayer::new(device, dim, vocab);
        layer
            .set_input(0, Tensor::from_i32(&[2], &[1, vocab as i32], alloc.clone()).unwrap())
            .unwrap();
        layer
            .set_input(
                1,
                Tensor::zeros(&[vocab, dim], DType::F32, alloc.clone()).unwrap(),
            )
            .unwrap();
        layer
            .set_output(0, Tensor::zeros(&[2, dim], DType::F32, alloc).unwrap())
            .unwrap();
        let err = layer.forward().unwrap_err();
        assert_eq!(err.code(), 6, "device {device}");
    }
}

#[test]
fn mixed_device_binding_fails_check_recoverably() {
    let Some(gpu) = gpu_or_skip("mixed_device_binding_fails_check_recoverably") else {
        return;
    };
    let mut layer = VecAddLayer::new(Device::Cpu);
    layer
        .set_input(0, Tensor::zeros(&[4], DType::F32, cpu()).unwrap())
        .unwrap();
    layer
        .set_input(1, Tensor::zeros(&[4], DType::F32, gpu).unwrap())
        .unwrap();
    layer
        .set_output(0, Tensor::zeros(&[4], DType::F32, cpu()).unwrap())
        .unwrap();
    let err = layer.forward().unwrap_err();
    assert_eq!(err.code(), 6);
}
