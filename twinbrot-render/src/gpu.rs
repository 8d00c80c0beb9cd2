use std::num::NonZeroU64;
use std::sync::mpsc;
use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::util::DeviceExt;

use twinbrot_core::{EscapeMode, Viewport};

use crate::backend::{ComputeBackend, FieldJob, RowsReady};
use crate::gate::CancelToken;
use crate::gray_field::GrayField;
use crate::RenderError;

const WORKGROUP_SIZE: u32 = 16;

/// Uniform block shared with `escape.wgsl`. 48 bytes, no implicit padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct EscapeUniforms {
    x_min: f32,
    x_max: f32,
    y_min: f32,
    y_max: f32,
    c_re: f32,
    c_im: f32,
    width: u32,
    height: u32,
    max_iter: u32,
    mode: u32,
    _pad0: u32,
    _pad1: u32,
}

impl EscapeUniforms {
    fn from_job(job: &FieldJob) -> Self {
        let (mode, c) = match job.mode {
            EscapeMode::Mandelbrot => (0, twinbrot_core::Complex::ZERO),
            EscapeMode::Julia { c } => (1, c),
        };
        Self {
            x_min: job.viewport.x_min as f32,
            x_max: job.viewport.x_max as f32,
            y_min: job.viewport.y_min as f32,
            y_max: job.viewport.y_max as f32,
            c_re: c.re as f32,
            c_im: c.im as f32,
            width: job.width,
            height: job.height,
            max_iter: job.params.max_iterations,
            mode,
            _pad0: 0,
            _pad1: 0,
        }
    }
}

/// Compute-shader backend in `f32`.
///
/// Agrees with the CPU backend to within one level wherever `f32` resolves
/// the pixel spacing; deep zooms lose precision here first.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    adapter_name: String,
    max_storage_bytes: u64,
}

impl GpuBackend {
    /// Request an adapter and device and build the compute pipeline.
    pub fn try_new() -> crate::Result<Self> {
        pollster::block_on(Self::init())
    }

    async fn init() -> crate::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| RenderError::GpuUnavailable("no adapter found".into()))?;

        let info = adapter.get_info();
        let limits = adapter.limits();
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("twinbrot"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits.clone(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        device.on_uncaptured_error(Box::new(|e| {
            tracing::error!(error = %e, "Uncaptured GPU error");
        }));

        push_scopes(&device);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("escape-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("escape.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("escape-bind-group-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<EscapeUniforms>() as u64
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("escape-pipeline-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("escape-pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        pop_scopes(&device).await?;

        let max_storage_bytes = u64::from(limits.max_storage_buffer_binding_size)
            .min(limits.max_buffer_size);

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            adapter_name: format!("{} ({:?})", info.name, info.backend),
            max_storage_bytes,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn dispatch(&self, job: &FieldJob) -> crate::Result<Vec<u32>> {
        let pixel_count = job.pixel_count() as u64;
        let byte_len = pixel_count * std::mem::size_of::<u32>() as u64;
        if byte_len > self.max_storage_bytes {
            return Err(RenderError::GpuValidation(format!(
                "field of {byte_len} bytes exceeds the {} byte storage limit",
                self.max_storage_bytes
            )));
        }
        let groups_x = job.width.div_ceil(WORKGROUP_SIZE);
        let groups_y = job.height.div_ceil(WORKGROUP_SIZE);
        let max_groups = self.device.limits().max_compute_workgroups_per_dimension;
        if groups_x > max_groups || groups_y > max_groups {
            return Err(RenderError::GpuValidation(format!(
                "dispatch {groups_x}×{groups_y} exceeds {max_groups} workgroups per dimension"
            )));
        }

        push_scopes(&self.device);

        let uniforms = EscapeUniforms::from_job(job);
        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("escape-uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("escape-output"),
            size: byte_len,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("escape-staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("escape-bind-group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("escape-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("escape-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, 1);
        }
        encoder.copy_buffer_to_buffer(&output, 0, &staging, 0, byte_len);
        self.queue.submit(std::iter::once(encoder.finish()));

        pollster::block_on(pop_scopes(&self.device))?;

        self.read_back(&staging)
    }

    fn read_back(&self, staging: &wgpu::Buffer) -> crate::Result<Vec<u32>> {
        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|_| RenderError::GpuUnavailable("map callback dropped".into()))??;

        let data = {
            let view = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, u32>(&view).to_vec()
        };
        staging.unmap();
        Ok(data)
    }
}

/// Capture out-of-memory and validation errors raised by the calls that
/// follow, until [`pop_scopes`].
fn push_scopes(device: &wgpu::Device) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
}

/// Pop both scopes in reverse push order. Both are always popped.
async fn pop_scopes(device: &wgpu::Device) -> crate::Result<()> {
    let validation = device.pop_error_scope().await;
    let out_of_memory = device.pop_error_scope().await;
    match out_of_memory.or(validation) {
        Some(e) => Err(RenderError::from_scope(e)),
        None => Ok(()),
    }
}

/// Whether `f32` separates neighbouring pixel centres of `viewport` at
/// `width × height`.
///
/// Requires the pixel spacing to be at least four `f32` ulps of the
/// largest coordinate magnitude in the view (floored at 1).
pub fn f32_resolves(viewport: &Viewport, width: u32, height: u32) -> bool {
    if width == 0 || height == 0 {
        return false;
    }
    let pixel = (viewport.span_x() / width as f64).min(viewport.span_y() / height as f64);
    let magnitude = [viewport.x_min, viewport.x_max, viewport.y_min, viewport.y_max]
        .into_iter()
        .fold(1.0_f64, |m, v| m.max(v.abs()));
    pixel >= 4.0 * f32::EPSILON as f64 * magnitude
}

impl ComputeBackend for GpuBackend {
    fn render(
        &mut self,
        job: &FieldJob,
        cancel: &CancelToken,
        _rows_ready: &mut RowsReady<'_>,
    ) -> crate::Result<GrayField> {
        job.validate()?;
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }
        let start = Instant::now();
        let raw = self.dispatch(job)?;
        let data = raw.into_iter().map(|v| v.min(255) as u8).collect();
        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            width = job.width,
            height = job.height,
            "GPU field complete"
        );
        GrayField::from_data(job.width, job.height, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twinbrot_core::{Complex, FractalParams};

    use crate::cpu::CpuBackend;

    #[test]
    fn uniforms_are_48_bytes() {
        assert_eq!(std::mem::size_of::<EscapeUniforms>(), 48);
    }

    #[test]
    fn gpu_init_fails_cleanly() {
        match GpuBackend::try_new() {
            Ok(gpu) => assert!(!gpu.adapter_name().is_empty()),
            Err(e) => assert!(
                matches!(
                    e,
                    RenderError::GpuUnavailable(_)
                        | RenderError::GpuDevice(_)
                        | RenderError::GpuValidation(_)
                        | RenderError::GpuOutOfMemory(_)
                ),
                "unexpected init error: {e}"
            ),
        }
    }

    #[test]
    fn precision_check_scales_with_magnitude() {
        // Same 2e-5 pixel spacing, different distance from the origin.
        let near_origin = Viewport::new(-1e-3, 1e-3, -1e-3, 1e-3).unwrap();
        assert!(f32_resolves(&near_origin, 100, 100));
        let far_out = Viewport::new(1000.0, 1000.002, 0.0, 0.002).unwrap();
        assert!(!f32_resolves(&far_out, 100, 100));
    }

    #[test]
    fn gpu_agrees_with_cpu() {
        let Ok(mut gpu) = GpuBackend::try_new() else {
            println!("Skipping test: no GPU available");
            return;
        };
        // Outside both sets, so every orbit escapes within a few
        // iterations. With N = 512 one iteration is at most one level.
        let params = FractalParams::with_max_iterations(512).unwrap();
        let cases = [
            (
                EscapeMode::Mandelbrot,
                Viewport::new(0.5, 1.5, 0.5, 1.5).unwrap(),
            ),
            (
                EscapeMode::Julia {
                    c: Complex::new(-0.5125, -0.5213),
                },
                Viewport::new(2.0, 3.0, 2.0, 3.0).unwrap(),
            ),
        ];
        for (mode, viewport) in cases {
            let job = FieldJob {
                mode,
                params,
                viewport,
                width: 64,
                height: 48,
            };
            assert!(f32_resolves(&viewport, 64, 48));
            let token = CancelToken::detached();
            let g = gpu.render(&job, &token, &mut |_, _| {}).unwrap();
            let c = CpuBackend::new()
                .render(&job, &token, &mut |_, _| {})
                .unwrap();

            for (i, (a, b)) in g.data.iter().zip(&c.data).enumerate() {
                assert!(
                    a.abs_diff(*b) <= 1,
                    "{mode:?}: pixel {i} gpu {a} cpu {b}"
                );
            }
        }
    }
}
