//! Accelerator kernels.
//!
//! Thin blocking wrappers over the compute primitives: each call encodes
//! one pass, submits it, and waits for the queue to drain, so tensors are
//! consistent the moment the call returns. Per-op submission costs
//! throughput but keeps the execution model identical to the host path.

use std::sync::Arc;

use crate::error::{HugurError, Result};
use crate::gpu::primitives::MhaParams;
use crate::gpu::WgpuContext;
use crate::kernels::{MhaArgs, RopeArgs};
use crate::tensor::Tensor;

fn parts(t: &Tensor) -> Result<(&Arc<wgpu::Buffer>, &Arc<WgpuContext>)> {
    t.buffer().wgpu_parts().ok_or_else(|| {
        HugurError::InternalError("accelerator kernel bound to a host tensor".into())
    })
}

fn submit(ctx: &WgpuContext, encoder: wgpu::CommandEncoder) -> Result<()> {
    ctx.queue.submit(std::iter::once(encoder.finish()));
    ctx.synchronize()
}

fn encoder(ctx: &WgpuContext, label: &str) -> wgpu::CommandEncoder {
    ctx.device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
}

pub(crate) fn add(in1: &Tensor, in2: &Tensor, out: &Tensor) -> Result<()> {
    let (a, _) = parts(in1)?;
    let (b, _) = parts(in2)?;
    let (y, ctx) = parts(out)?;
    let mut enc = encoder(ctx, "add");
    ctx.kernels()
        .add
        .encode(&ctx.device, &mut enc, a, b, y, out.numel() as u32);
    submit(ctx, enc)
}

pub(crate) fn matmul(input: &Tensor, weight: &Tensor, out: &Tensor, scale: f32) -> Result<()> {
    let (x, _) = parts(input)?;
    let (w, _) = parts(weight)?;
    let (y, ctx) = parts(out)?;
    let m = weight.shape()[0] as u32;
    let k = weight.shape()[1] as u32;
    let mut enc = encoder(ctx, "matmul");
    ctx.kernels()
        .matmul
        .encode(&ctx.device, &mut enc, x, w, y, m, k, scale);
    submit(ctx, enc)
}

pub(crate) fn embedding(
    tokens: &Tensor,
    table: &Tensor,
    out: &Tensor,
    vocab_size: usize,
) -> Result<()> {
    // The host kernel rejects out-of-range ids; the shader cannot report, so
    // validate through a readback here to keep the devices in agreement.
    // Token batches are tiny relative to the lookup itself.
    for id in tokens.to_vec_i32()? {
        if id < 0 || id as usize >= vocab_size {
            return Err(HugurError::InvalidArgument(format!(
                "token {id} outside vocabulary of {vocab_size}"
            )));
        }
    }
    let (ids, _) = parts(tokens)?;
    let (rows, _) = parts(table)?;
    let (y, ctx) = parts(out)?;
    let dim = table.shape()[1] as u32;
    let mut enc = encoder(ctx, "embedding");
    ctx.kernels().lookup.encode(
        &ctx.device,
        &mut enc,
        ids,
        rows,
        y,
        tokens.numel() as u32,
        dim,
        vocab_size as u32,
    );
    submit(ctx, enc)
}

pub(crate) fn rope(args: &RopeArgs) -> Result<()> {
    let (pos, _) = parts(args.pos)?;
    let (sin, _) = parts(args.sin_cache)?;
    let (cos, _) = parts(args.cos_cache)?;
    let (q, _) = parts(args.q)?;
    let (k, ctx) = parts(args.k)?;
    let mut enc = encoder(ctx, "rope");
    ctx.kernels().rope.encode(
        &ctx.device,
        &mut enc,
        pos,
        sin,
        cos,
        q,
        k,
        args.dim as u32,
        args.kv_dim as u32,
        args.head_size as u32,
    );
    submit(ctx, enc)
}

pub(crate) fn swiglu(in1: &Tensor, in2: &Tensor, out: &Tensor) -> Result<()> {
    let (gate, _) = parts(in1)?;
    let (up, _) = parts(in2)?;
    let (y, ctx) = parts(out)?;
    let mut enc = encoder(ctx, "swiglu");
    ctx.kernels()
        .swiglu
        .encode(&ctx.device, &mut enc, gate, up, y, out.numel() as u32);
    submit(ctx, enc)
}

pub(crate) fn rmsnorm(input: &Tensor, weight: &Tensor, out: &Tensor, eps: f32) -> Result<()> {
    let (x, _) = parts(input)?;
    let (w, _) = parts(weight)?;
    let (y, ctx) = parts(out)?;
    let mut enc = encoder(ctx, "rmsnorm");
    ctx.kernels()
        .rmsnorm
        .encode(&ctx.device, &mut enc, x, w, y, input.numel() as u32, eps);
    submit(ctx, enc)
}

pub(crate) fn mha(args: &MhaArgs) -> Result<()> {
    let (q, _) = parts(args.query)?;
    let (kc, _) = parts(args.key_cache)?;
    let (vc, _) = parts(args.value_cache)?;
    let (score, _) = parts(args.score)?;
    let (y, ctx) = parts(args.output)?;
    let params = MhaParams {
        pos: args.pos as u32,
        head_num: args.head_num as u32,
        seq_len: args.seq_len as u32,
        kv_dim: args.kv_dim as u32,
        kv_mul: args.kv_mul as u32,
        head_size: args.head_size as u32,
        layer_offset: (args.layer_index * args.seq_len * args.kv_dim) as u32,
        scale: 1.0 / (args.head_size as f32).sqrt(),
    };
    let mut enc = encoder(ctx, "mha");
    ctx.kernels()
        .mha
        .encode(&ctx.device, &mut enc, q, kc, vc, score, y, params);
    submit(ctx, enc)
}

/// Device-side constant fill, used to seed accelerator tensors without a
/// host round trip.
pub(crate) fn fill(t: &Tensor, value: f32) -> Result<()> {
    let (y, ctx) = parts(t)?;
    let mut enc = encoder(ctx, "fill");
    ctx.kernels()
        .fill
        .encode(&ctx.device, &mut enc, y, t.numel() as u32, value);
    submit(ctx, enc)
}
