//! Scalar host kernels.
//!
//! These are the reference implementations the accelerator shaders are
//! checked against. They read and write tensors through the host views and
//! assume the owning layer has already validated devices, dtypes, and
//! shapes. Only the row loop of matmul is parallelized; everything else in
//! single-token decode is memory bound and not worth the fork/join cost.

use ndarray::Array2;
use rayon::prelude::*;

use crate::error::{HugurError, Result};
use crate::kernels::{MhaArgs, RopeArgs};
use crate::tensor::Tensor;

pub(crate) fn add(in1: &Tensor, in2: &Tensor, out: &Tensor) -> Result<()> {
    let a = in1.host_f32()?;
    let b = in2.host_f32()?;
    let y = out.host_f32_mut()?;
    for ((y, a), b) in y.iter_mut().zip(a).zip(b) {
        *y = a + b;
    }
    Ok(())
}

/// out[row] = scale * dot(weight[row, :], input), one rayon task per row.
pub(crate) fn matmul(input: &Tensor, weight: &Tensor, out: &Tensor, scale: f32) -> Result<()> {
    let k = input.numel();
    let x = input.host_f32()?;
    let w = weight.host_f32()?;
    let y = out.host_f32_mut()?;
    y.par_iter_mut().enumerate().for_each(|(row, y)| {
        let w_row = &w[row * k..(row + 1) * k];
        *y = w_row.iter().zip(x).map(|(w, x)| w * x).sum::<f32>() * scale;
    });
    Ok(())
}

/// Groupwise int8 matmul: weights are dequantized on the fly with one f32
/// scale per `group_size` consecutive weights.
pub(crate) fn matmul_quant8(
    input: &Tensor,
    weight: &Tensor,
    scales: &Tensor,
    group_size: usize,
    out: &Tensor,
) -> Result<()> {
    let k = input.numel();
    let x = input.host_f32()?;
    let w = weight.host_i8()?;
    let s = scales.host_f32()?;
    let y = out.host_f32_mut()?;
    y.par_iter_mut().enumerate().for_each(|(row, y)| {
        let base = row * k;
        let mut acc = 0.0f32;
        let mut col = 0;
        while col < k {
            let group = (base + col) / group_size;
            let group_scale = s[group];
            let end = (k - col).min(group_size - (base + col) % group_size);
            let mut partial = 0.0f32;
            for i in 0..end {
                partial += w[base + col + i] as f32 * x[col + i];
            }
            acc += partial * group_scale;
            col += end;
        }
        *y = acc;
    });
    Ok(())
}

/// Copies one `dim`-wide table row per token id.
pub(crate) fn embedding(
    tokens: &Tensor,
    table: &Tensor,
    out: &Tensor,
    vocab_size: usize,
) -> Result<()> {
    let dim = table.shape()[1];
    let ids = tokens.host_i32()?;
    let rows = table.host_f32()?;
    let y = out.host_f32_mut()?;
    for (t, &id) in ids.iter().enumerate() {
        if id < 0 || id as usize >= vocab_size {
            return Err(HugurError::InvalidArgument(format!(
                "token {id} outside vocabulary of {vocab_size}"
            )));
        }
        let row = id as usize * dim;
        y[t * dim..(t + 1) * dim].copy_from_slice(&rows[row..row + dim]);
    }
    Ok(())
}

/// Rotates (even, odd) pairs by the cached angle for this position. The
/// angle depends only on the index within a head, so all heads share the
/// [max_seq_len, head_size] caches. Keys stop at `kv_dim` under grouped
/// query attention.
pub(crate) fn rope(args: &RopeArgs) -> Result<()> {
    let pos = args.pos.host_i32()?[0] as usize;
    let sin = args.sin_cache.host_f32()?;
    let cos = args.cos_cache.host_f32()?;
    let q = args.q.host_f32_mut()?;
    let k = args.k.host_f32_mut()?;
    for i in (0..args.dim).step_by(2) {
        let head_dim = i % args.head_size;
        let fcr = cos[pos * args.head_size + head_dim];
        let fci = sin[pos * args.head_size + head_dim];
        let (q0, q1) = (q[i], q[i + 1]);
        q[i] = q0 * fcr - q1 * fci;
        q[i + 1] = q0 * fci + q1 * fcr;
        if i < args.kv_dim {
            let (k0, k1) = (k[i], k[i + 1]);
            k[i] = k0 * fcr - k1 * fci;
            k[i + 1] = k0 * fci + k1 * fcr;
        }
    }
    Ok(())
}

/// Precomputes sin/cos rotation tables for [`rope`], one row per position.
pub fn sin_cos_cache(head_size: usize, max_seq_len: usize, theta: f32) -> (Array2<f32>, Array2<f32>) {
    let angle = |pos: usize, head_dim: usize| {
        let freq = 1.0 / theta.powf(head_dim as f32 / head_size as f32);
        pos as f32 * freq
    };
    let sin = Array2::from_shape_fn((max_seq_len, head_size), |(p, h)| angle(p, h).sin());
    let cos = Array2::from_shape_fn((max_seq_len, head_size), |(p, h)| angle(p, h).cos());
    (sin, cos)
}

pub(crate) fn swiglu(in1: &Tensor, in2: &Tensor, out: &Tensor) -> Result<()> {
    let gate = in1.host_f32()?;
    let up = in2.host_f32()?;
    let y = out.host_f32_mut()?;
    for ((y, &g), u) in y.iter_mut().zip(gate).zip(up) {
        let silu = g / (1.0 + (-g).exp());
        *y = silu * u;
    }
    Ok(())
}

pub(crate) fn rmsnorm(input: &Tensor, weight: &Tensor, out: &Tensor, eps: f32) -> Result<()> {
    let n = input.numel();
    let x = input.host_f32()?;
    let w = weight.host_f32()?;
    let y = out.host_f32_mut()?;
    let mean_sq = x.iter().map(|v| v * v).sum::<f32>() / n as f32;
    let inv_rms = 1.0 / (mean_sq + eps).sqrt();
    for ((y, x), w) in y.iter_mut().zip(x).zip(w) {
        *y = w * x * inv_rms;
    }
    Ok(())
}

pub(crate) fn softmax_inplace(t: &Tensor) -> Result<()> {
    softmax_slice(t.host_f32_mut()?);
    Ok(())
}

pub(crate) fn scale_inplace(t: &Tensor, scale: f32) -> Result<()> {
    for v in t.host_f32_mut()? {
        *v *= scale;
    }
    Ok(())
}

/// Accumulates scaled value rows into `out`; callers zero `out` first.
pub(crate) fn scale_sum(
    value: &Tensor,
    scale: &Tensor,
    out: &Tensor,
    pos: usize,
    size: usize,
    stride: usize,
) -> Result<()> {
    let v = value.host_f32()?;
    let s = scale.host_f32()?;
    let y = out.host_f32_mut()?;
    for t in 0..=pos {
        let st = s[t];
        let row = &v[t * stride..t * stride + size];
        for (y, v) in y[..size].iter_mut().zip(row) {
            *y += st * v;
        }
    }
    Ok(())
}

/// Per-head attention: scaled dot products against the cached keys up to
/// `pos`, softmax, then a weighted sum of cached values.
pub(crate) fn mha(args: &MhaArgs) -> Result<()> {
    let scale = 1.0 / (args.head_size as f32).sqrt();
    let layer_offset = args.layer_index * args.seq_len * args.kv_dim;
    let q = args.query.host_f32()?;
    let kc = args.key_cache.host_f32()?;
    let vc = args.value_cache.host_f32()?;
    let scores = args.score.host_f32_mut()?;
    let out = args.output.host_f32_mut()?;
    for h in 0..args.head_num {
        let q_h = &q[h * args.head_size..(h + 1) * args.head_size];
        let score_h = &mut scores[h * args.seq_len..(h + 1) * args.seq_len];
        let kv_base = (h / args.kv_mul) * args.head_size;
        for t in 0..=args.pos {
            let k_row = &kc[layer_offset + t * args.kv_dim + kv_base..][..args.head_size];
            let dot: f32 = q_h.iter().zip(k_row).map(|(q, k)| q * k).sum();
            score_h[t] = dot * scale;
        }
        softmax_slice(&mut score_h[..=args.pos]);
        let out_h = &mut out[h * args.head_size..(h + 1) * args.head_size];
        out_h.fill(0.0);
        for t in 0..=args.pos {
            let v_row = &vc[layer_offset + t * args.kv_dim + kv_base..][..args.head_size];
            let weight = score_h[t];
            for (o, v) in out_h.iter_mut().zip(v_row) {
                *o += weight * v;
            }
        }
    }
    Ok(())
}

// Max-subtracted for stability; matches the shader exactly.
fn softmax_slice(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut denom = 0.0f32;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        denom += *v;
    }
    for v in values.iter_mut() {
        *v /= denom;
    }
}
