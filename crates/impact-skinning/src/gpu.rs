//! Vulkan compute skinning
//!
//! Runs `shaders/skin.comp` with one invocation per vertex. The static
//! vertex data of each [`SkinningInput`] is uploaded once and stays resident;
//! a dispatch only writes the bone matrices, records a one-shot command buffer
//! and waits on a fence before reading the results back, so callers see a
//! completed result.

use std::collections::HashMap;
use std::sync::Arc;

use glam::Mat4;
use tracing::{debug, info};
use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::{
        allocator::StandardCommandBufferAllocator, AutoCommandBufferBuilder, CommandBufferUsage,
    },
    descriptor_set::{
        allocator::StandardDescriptorSetAllocator, DescriptorSet, WriteDescriptorSet,
    },
    device::{
        physical::PhysicalDeviceType, Device, DeviceCreateInfo, Queue, QueueCreateInfo, QueueFlags,
    },
    instance::{Instance, InstanceCreateFlags, InstanceCreateInfo},
    memory::allocator::{AllocationCreateInfo, MemoryTypeFilter, StandardMemoryAllocator},
    pipeline::{
        compute::ComputePipelineCreateInfo, layout::PipelineDescriptorSetLayoutCreateInfo,
        ComputePipeline, Pipeline, PipelineBindPoint, PipelineLayout,
        PipelineShaderStageCreateInfo,
    },
    sync::{self, GpuFuture},
    VulkanLibrary,
};

use crate::dispatch::{SkinnedBuffers, SkinningDispatcher, SkinningInput};
use crate::error::SkinningError;
use crate::vertex::{matrix_columns, pad};

const WORKGROUP_SIZE: u32 = 64;

mod cs {
    vulkano_shaders::shader! {
        ty: "compute",
        path: "shaders/skin.comp",
    }
}

fn compute_err(e: impl std::fmt::Debug) -> SkinningError {
    SkinningError::Compute(format!("{e:?}"))
}

fn device_err(e: impl std::fmt::Debug) -> SkinningError {
    SkinningError::NoDevice(format!("{e:?}"))
}

type BoneMatrix = [[f32; 4]; 4];

/// Device buffers bound to the seven shader bindings.
struct MeshBuffers {
    positions: Subbuffer<[[f32; 4]]>,
    normals: Subbuffer<[[f32; 4]]>,
    joints: Subbuffer<[[u32; 4]]>,
    weights: Subbuffer<[[f32; 4]]>,
    /// Host-writable, rewritten every dispatch
    bones: Subbuffer<[BoneMatrix]>,
    out_positions: Subbuffer<[[f32; 4]]>,
    out_normals: Subbuffer<[[f32; 4]]>,
}

/// One uploaded [`SkinningInput`] and the descriptor set binding it.
struct ResidentMesh {
    buffers: MeshBuffers,
    set: Arc<DescriptorSet>,
}

/// Compute-shader dispatcher on the first suitable Vulkan device.
pub struct GpuSkinner {
    device: Arc<Device>,
    queue: Arc<Queue>,
    pipeline: Arc<ComputePipeline>,
    memory_allocator: Arc<StandardMemoryAllocator>,
    descriptor_set_allocator: Arc<StandardDescriptorSetAllocator>,
    command_buffer_allocator: Arc<StandardCommandBufferAllocator>,
    resident: HashMap<u64, ResidentMesh>,
}

impl GpuSkinner {
    /// Create a headless device with a compute queue and build the pipeline.
    pub fn new() -> Result<Self, SkinningError> {
        let library = VulkanLibrary::new().map_err(device_err)?;
        let instance = Instance::new(
            library,
            InstanceCreateInfo {
                flags: InstanceCreateFlags::ENUMERATE_PORTABILITY,
                ..Default::default()
            },
        )
        .map_err(device_err)?;

        let (physical_device, queue_family_index) = instance
            .enumerate_physical_devices()
            .map_err(device_err)?
            .filter_map(|p| {
                p.queue_family_properties()
                    .iter()
                    .position(|q| q.queue_flags.intersects(QueueFlags::COMPUTE))
                    .map(|i| (p, i as u32))
            })
            .min_by_key(|(p, _)| match p.properties().device_type {
                PhysicalDeviceType::DiscreteGpu => 0,
                PhysicalDeviceType::IntegratedGpu => 1,
                PhysicalDeviceType::VirtualGpu => 2,
                PhysicalDeviceType::Cpu => 3,
                _ => 4,
            })
            .ok_or_else(|| SkinningError::NoDevice("no device with a compute queue".into()))?;

        info!(
            "Skinning on GPU: {} ({:?})",
            physical_device.properties().device_name,
            physical_device.properties().device_type
        );

        let (device, mut queues) = Device::new(
            physical_device,
            DeviceCreateInfo {
                queue_create_infos: vec![QueueCreateInfo {
                    queue_family_index,
                    ..Default::default()
                }],
                ..Default::default()
            },
        )
        .map_err(device_err)?;
        let queue = queues
            .next()
            .ok_or_else(|| SkinningError::NoDevice("device created without a queue".into()))?;

        let pipeline = {
            let module = cs::load(device.clone()).map_err(compute_err)?;
            let entry_point = module
                .entry_point("main")
                .ok_or_else(|| SkinningError::Compute("skinning shader has no main".into()))?;
            let stage = PipelineShaderStageCreateInfo::new(entry_point);
            let layout = PipelineLayout::new(
                device.clone(),
                PipelineDescriptorSetLayoutCreateInfo::from_stages([&stage])
                    .into_pipeline_layout_create_info(device.clone())
                    .map_err(compute_err)?,
            )
            .map_err(compute_err)?;
            ComputePipeline::new(
                device.clone(),
                None,
                ComputePipelineCreateInfo::stage_layout(stage, layout),
            )
            .map_err(compute_err)?
        };

        let memory_allocator = Arc::new(StandardMemoryAllocator::new_default(device.clone()));
        let descriptor_set_allocator = Arc::new(StandardDescriptorSetAllocator::new(
            device.clone(),
            Default::default(),
        ));
        let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
            device.clone(),
            Default::default(),
        ));

        Ok(Self {
            device,
            queue,
            pipeline,
            memory_allocator,
            descriptor_set_allocator,
            command_buffer_allocator,
            resident: HashMap::new(),
        })
    }

    fn upload<T, I>(&self, data: I) -> Result<Subbuffer<[T]>, SkinningError>
    where
        T: BufferContents,
        I: IntoIterator<Item = T>,
        I::IntoIter: ExactSizeIterator,
    {
        Buffer::from_iter(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                    | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            data,
        )
        .map_err(compute_err)
    }

    fn output(&self, vertex_count: usize) -> Result<Subbuffer<[[f32; 4]]>, SkinningError> {
        Buffer::from_iter(
            self.memory_allocator.clone(),
            BufferCreateInfo {
                usage: BufferUsage::STORAGE_BUFFER,
                ..Default::default()
            },
            AllocationCreateInfo {
                memory_type_filter: MemoryTypeFilter::PREFER_HOST
                    | MemoryTypeFilter::HOST_RANDOM_ACCESS,
                ..Default::default()
            },
            vec![[0.0f32; 4]; vertex_count],
        )
        .map_err(compute_err)
    }

    /// Room for `bone_count` matrices, at least one so the binding is never empty.
    fn bone_buffer(&self, bone_count: usize) -> Result<Subbuffer<[BoneMatrix]>, SkinningError> {
        self.upload(vec![matrix_columns(&Mat4::IDENTITY); bone_count.max(1)])
    }

    fn descriptor_set(&self, buffers: &MeshBuffers) -> Result<Arc<DescriptorSet>, SkinningError> {
        let layout = self
            .pipeline
            .layout()
            .set_layouts()
            .first()
            .cloned()
            .ok_or_else(|| SkinningError::Compute("pipeline has no descriptor set".into()))?;
        DescriptorSet::new(
            self.descriptor_set_allocator.clone(),
            layout,
            [
                WriteDescriptorSet::buffer(0, buffers.positions.clone()),
                WriteDescriptorSet::buffer(1, buffers.normals.clone()),
                WriteDescriptorSet::buffer(2, buffers.joints.clone()),
                WriteDescriptorSet::buffer(3, buffers.weights.clone()),
                WriteDescriptorSet::buffer(4, buffers.bones.clone()),
                WriteDescriptorSet::buffer(5, buffers.out_positions.clone()),
                WriteDescriptorSet::buffer(6, buffers.out_normals.clone()),
            ],
            [],
        )
        .map_err(compute_err)
    }

    /// Upload the static data of `input` and allocate its output buffers.
    fn make_resident(&self, input: &SkinningInput, bone_count: usize) -> Result<ResidentMesh, SkinningError> {
        let vertex_count = input.vertex_count();
        let buffers = MeshBuffers {
            positions: self.upload(input.positions().iter().map(|&p| pad(p, 1.0)))?,
            normals: self.upload(input.normals().iter().map(|&n| pad(n, 0.0)))?,
            joints: self.upload(input.influences().iter().map(|i| i.joints))?,
            weights: self.upload(input.influences().iter().map(|i| i.weights))?,
            bones: self.bone_buffer(bone_count)?,
            out_positions: self.output(vertex_count)?,
            out_normals: self.output(vertex_count)?,
        };
        let set = self.descriptor_set(&buffers)?;

        debug!(
            "Uploaded skinning input {} ({} vertices) to the GPU",
            input.id(),
            vertex_count
        );
        Ok(ResidentMesh { buffers, set })
    }

    /// Write `pose` into the mesh's bone buffer, growing it when the pose
    /// has more bones than it holds.
    fn write_pose(&self, mesh: &mut ResidentMesh, pose: &[Mat4]) -> Result<(), SkinningError> {
        if pose.len() as u64 > mesh.buffers.bones.len() {
            mesh.buffers.bones = self.bone_buffer(pose.len())?;
            mesh.set = self.descriptor_set(&mesh.buffers)?;
        }

        // Slots past the pose are never read: weighted bones were checked
        // against the pose and the shader skips zero weights.
        let mut bones = mesh.buffers.bones.write().map_err(compute_err)?;
        for (slot, matrix) in bones.iter_mut().zip(pose) {
            *slot = matrix_columns(matrix);
        }
        Ok(())
    }
}

impl SkinningDispatcher for GpuSkinner {
    fn name(&self) -> &str {
        "gpu"
    }

    fn dispatch(&mut self, input: &SkinningInput, pose: &[Mat4]) -> Result<SkinnedBuffers, SkinningError> {
        input.check_pose(pose.len())?;

        let vertex_count = input.vertex_count();
        // Zero-sized buffers are invalid in Vulkan.
        if vertex_count == 0 {
            return Ok(SkinnedBuffers::default());
        }

        let mut mesh = match self.resident.remove(&input.id()) {
            Some(mesh) => mesh,
            None => self.make_resident(input, pose.len())?,
        };
        self.write_pose(&mut mesh, pose)?;
        let set = mesh.set.clone();
        let out_positions = mesh.buffers.out_positions.clone();
        let out_normals = mesh.buffers.out_normals.clone();
        self.resident.insert(input.id(), mesh);

        let mut builder = AutoCommandBufferBuilder::primary(
            self.command_buffer_allocator.clone(),
            self.queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(compute_err)?;

        let groups = (vertex_count as u32).div_ceil(WORKGROUP_SIZE);
        builder
            .bind_pipeline_compute(self.pipeline.clone())
            .map_err(compute_err)?
            .bind_descriptor_sets(
                PipelineBindPoint::Compute,
                self.pipeline.layout().clone(),
                0,
                set,
            )
            .map_err(compute_err)?;
        // SAFETY: the shader bounds-checks its index against the input length
        // and every bone index was checked against the pose above.
        unsafe { builder.dispatch([groups, 1, 1]) }.map_err(compute_err)?;
        let command_buffer = builder.build().map_err(compute_err)?;

        sync::now(self.device.clone())
            .then_execute(self.queue.clone(), command_buffer)
            .map_err(compute_err)?
            .then_signal_fence_and_flush()
            .map_err(compute_err)?
            .wait(None)
            .map_err(compute_err)?;

        debug!("GPU skinned {vertex_count} vertices in {groups} workgroups");

        let positions = out_positions.read().map_err(compute_err)?;
        let normals = out_normals.read().map_err(compute_err)?;
        SkinnedBuffers::from_padded(bytemuck::cast_slice(&positions[..]), bytemuck::cast_slice(&normals[..]))
    }
}

#[cfg(test)]
mod tests {
    use impact_assets::procedural;

    use super::*;
    use crate::cpu::CpuSkinner;

    fn gpu_or_skip() -> Option<GpuSkinner> {
        match GpuSkinner::new() {
            Ok(gpu) => Some(gpu),
            Err(e) => {
                eprintln!("skipping GPU skinning test: {e}");
                None
            }
        }
    }

    fn assert_close(actual: &SkinnedBuffers, expected: &SkinnedBuffers) {
        assert_eq!(actual.vertex_count(), expected.vertex_count());
        for (a, e) in actual.positions.iter().zip(&expected.positions) {
            assert!((*a - *e).length() < 1e-4, "{a} != {e}");
        }
    }

    #[test]
    fn test_matches_cpu_when_a_device_is_available() {
        let Some(mut gpu) = gpu_or_skip() else {
            return;
        };

        let limb = procedural::jointed_limb().unwrap();
        let skeleton = limb.skeleton.as_ref().unwrap();
        let animation = limb.animation(0).unwrap();
        let pose = skeleton.pose_matrices(animation, animation.last_frame());
        let input = SkinningInput::from_mesh(&limb.mesh).unwrap();

        let expected = CpuSkinner::new().dispatch(&input, &pose).unwrap();
        assert_close(&gpu.dispatch(&input, &pose).unwrap(), &expected);
    }

    #[test]
    fn test_vertex_data_stays_resident_across_poses() {
        let Some(mut gpu) = gpu_or_skip() else {
            return;
        };
        let mut cpu = CpuSkinner::new();

        let limb = procedural::jointed_limb().unwrap();
        let skeleton = limb.skeleton.as_ref().unwrap();
        let animation = limb.animation(0).unwrap();
        let input = SkinningInput::from_mesh(&limb.mesh).unwrap();

        // Each pose must be picked up even though only the bones are rewritten.
        for frame in [0, animation.last_frame(), 0] {
            let pose = skeleton.pose_matrices(animation, frame);
            assert_close(&gpu.dispatch(&input, &pose).unwrap(), &cpu.dispatch(&input, &pose).unwrap());
        }
        assert_eq!(gpu.resident.len(), 1);

        // A rigid input starts with a single-bone buffer that grows on demand.
        let tool = SkinningInput::from_mesh(&procedural::tool_scene().mesh).unwrap();
        let small = [Mat4::from_translation(glam::Vec3::X)];
        assert_close(&gpu.dispatch(&tool, &small).unwrap(), &cpu.dispatch(&tool, &small).unwrap());
        let large = [Mat4::from_translation(glam::Vec3::Y), Mat4::IDENTITY, Mat4::IDENTITY];
        assert_close(&gpu.dispatch(&tool, &large).unwrap(), &cpu.dispatch(&tool, &large).unwrap());
        assert_eq!(gpu.resident.len(), 2);
    }
}
