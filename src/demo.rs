//! Per-frame orchestration
//!
//! One [`DemoState::step`] skins the body and the tool at the before and after
//! poses, asks the detector when the swept tool first touches the body, clamps
//! the displayed blend to that instant, skins the blended pose and finally
//! applies camera movement and pose captures.

use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use tracing::{debug, info};

use impact_assets::{Animation, AssetServer, SceneAsset, Skeleton};
use impact_collision::{ContinuousDetector, MovingMesh, TriangleMesh};
use impact_core::{AnimationPhase, PoseInterpolator, PoseSet, Transform};
use impact_skinning::{SkinnedBuffers, SkinningDispatcher, SkinningInput};

use crate::camera::FlyCamera;
use crate::input::{DemoAction, InputState};
use crate::settings::{DemoSettings, ToolPose};

/// What one frame produced
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: u64,
    /// First contact along the before-to-after sweep, if any
    pub collision_t: Option<f32>,
    /// Blend parameter actually shown
    pub display_t: f32,
    /// Unclamped animation phase for this frame
    pub phase: f32,
    /// Body at the displayed blend
    pub body: SkinnedBuffers,
    /// Tool at the displayed blend
    pub tool: SkinnedBuffers,
    /// Model-space joint positions for the markers
    pub joints: Vec<Vec3>,
    /// Quit was requested this frame
    pub quit: bool,
}

/// A skinned or rigid mesh ready for dispatch and collision
struct DemoMesh {
    input: SkinningInput,
    topology: TriangleMesh,
}

impl DemoMesh {
    fn from_scene(scene: &SceneAsset) -> Result<Self> {
        let input = SkinningInput::from_mesh(&scene.mesh)
            .with_context(|| format!("Invalid skinning data in mesh '{}'", scene.mesh.name))?;
        let topology = TriangleMesh::new(scene.mesh.positions.clone(), scene.mesh.indices.clone())
            .with_context(|| format!("Invalid topology in mesh '{}'", scene.mesh.name))?;
        Ok(Self { input, topology })
    }

    fn at(&self, buffers: &SkinnedBuffers) -> Result<TriangleMesh> {
        Ok(self.topology.with_positions(buffers.positions.clone())?)
    }
}

/// Skeleton and the animation whose first and last frames bound the sweep
struct BodyRig {
    skeleton: Skeleton,
    animation: Option<Animation>,
}

impl BodyRig {
    fn pose(&self, frame: usize) -> PoseSet {
        match &self.animation {
            Some(animation) => self.skeleton.pose_matrices(animation, frame).into(),
            None => self.skeleton.bind_pose_matrices().into(),
        }
    }

    fn last_frame(&self) -> usize {
        self.animation.as_ref().map_or(0, Animation::last_frame)
    }

    /// Key frame shown at a phase in `[0, 1)`
    fn frame_at(&self, phase: f32) -> usize {
        let frames = self.animation.as_ref().map_or(1, Animation::frame_count);
        ((phase * frames as f32) as usize).min(self.last_frame())
    }

    fn joints(&self, frame: usize) -> Vec<Vec3> {
        let transforms = match &self.animation {
            Some(animation) => self.skeleton.joint_transforms(animation, frame),
            None => self.skeleton.model_transforms(&self.skeleton.rest_locals()),
        };
        transforms.iter().map(|m| m.w_axis.truncate()).collect()
    }
}

/// Everything the frame loop owns
pub struct DemoState {
    body: DemoMesh,
    tool: DemoMesh,
    rig: Option<BodyRig>,
    before_bones: PoseSet,
    after_bones: PoseSet,
    interpolator: PoseInterpolator,
    detector: ContinuousDetector,
    camera: FlyCamera,
    tool_scale: f32,
    dispatcher: Box<dyn SkinningDispatcher>,
    frame: u64,
}

impl DemoState {
    /// Load the configured scenes, or the procedural ones when no path is set
    pub fn load(settings: &DemoSettings, dispatcher: Box<dyn SkinningDispatcher>) -> Result<Self> {
        let mut server = AssetServer::new(&settings.scene.asset_root);

        let body = match &settings.scene.humanoid {
            Some(path) => {
                let handle = server
                    .load_scene(path, settings.scene.humanoid_mesh)
                    .context("Failed to load humanoid scene")?;
                server.get(handle).cloned().context("Humanoid scene missing from cache")?
            }
            None => {
                info!("No humanoid scene configured, using the procedural limb");
                impact_assets::procedural::jointed_limb()?
            }
        };

        let tool = match &settings.scene.tool {
            Some(path) => {
                let handle = server
                    .load_scene(path, settings.scene.tool_mesh)
                    .context("Failed to load tool scene")?;
                server.get(handle).cloned().context("Tool scene missing from cache")?
            }
            None => {
                info!("No tool scene configured, using the procedural box");
                impact_assets::procedural::tool_scene()
            }
        };

        Self::new(settings, body, settings.scene.animation, tool, dispatcher)
    }

    pub fn new(
        settings: &DemoSettings,
        body: SceneAsset,
        animation_index: usize,
        tool: SceneAsset,
        dispatcher: Box<dyn SkinningDispatcher>,
    ) -> Result<Self> {
        let detector = ContinuousDetector::new(settings.collision).context("Invalid collision settings")?;

        let rig = match body.skeleton.clone() {
            Some(skeleton) => {
                let animation = body.animation(animation_index).cloned();
                if let Some(animation) = &animation {
                    animation
                        .validate_for(&skeleton)
                        .with_context(|| format!("Animation '{}' does not fit the skeleton", animation.name))?;
                } else {
                    info!("Humanoid has no animation {animation_index}, holding the bind pose");
                }
                Some(BodyRig { skeleton, animation })
            }
            None => None,
        };

        let (before_bones, after_bones) = match &rig {
            Some(rig) => (rig.pose(0), rig.pose(rig.last_frame())),
            None => (PoseSet::identity(1), PoseSet::identity(1)),
        };

        let body_mesh = DemoMesh::from_scene(&body)?;
        let tool_mesh = DemoMesh::from_scene(&tool)?;
        info!(
            "Body: {} vertices, {} triangles, {} bones; tool: {} vertices, {} triangles",
            body_mesh.input.vertex_count(),
            body_mesh.topology.triangle_count(),
            before_bones.len(),
            tool_mesh.input.vertex_count(),
            tool_mesh.topology.triangle_count()
        );

        let camera = FlyCamera::new(settings.camera.clone());
        let tool_scale = settings.motion.tool_scale;
        let place = |pose: Option<ToolPose>| match pose {
            Some(pose) => tool_matrix(pose, tool_scale),
            None => camera.tool_transform(tool_scale),
        };
        let interpolator = PoseInterpolator::new(
            place(settings.motion.tool_before),
            place(settings.motion.tool_after),
            AnimationPhase::new(settings.motion.cycle_seconds),
            settings.motion.blend_mode,
        );

        info!("Skinning with the {} dispatcher", dispatcher.name());

        Ok(Self {
            body: body_mesh,
            tool: tool_mesh,
            rig,
            before_bones,
            after_bones,
            interpolator,
            detector,
            camera,
            tool_scale,
            dispatcher,
            frame: 0,
        })
    }

    /// Earliest contact between the tool and body sweeps
    fn detect(&mut self) -> Result<Option<f32>> {
        let tools = self.interpolator.tool_poses(0.0);
        let dispatcher = self.dispatcher.as_mut();

        let body_before = skin(dispatcher, &self.body, &self.before_bones)?;
        let body_after = skin(dispatcher, &self.body, &self.after_bones)?;
        let tool_before = skin(dispatcher, &self.tool, &tools.before)?;
        let tool_after = skin(dispatcher, &self.tool, &tools.after)?;

        let body = MovingMesh::new(&self.body.at(&body_before)?, &self.body.at(&body_after)?)?;
        let tool = MovingMesh::new(&self.tool.at(&tool_before)?, &self.tool.at(&tool_after)?)?;
        Ok(self.detector.intersection_time(&tool, &body))
    }

    /// Run one frame of `delta` seconds with this frame's input
    pub fn step(&mut self, delta: f32, input: &InputState) -> Result<FrameReport> {
        let collision_t = self.detect()?;
        let phase = self.interpolator.phase();
        let display_t = self.interpolator.display_t(collision_t);

        let bones = self
            .interpolator
            .bone_poses(self.before_bones.clone(), self.after_bones.clone(), display_t)?;
        let tools = self.interpolator.tool_poses(display_t);
        let body = skin(self.dispatcher.as_mut(), &self.body, &bones.blended)?;
        let tool = skin(self.dispatcher.as_mut(), &self.tool, &tools.blended)?;

        let joints = match &self.rig {
            Some(rig) => rig.joints(rig.frame_at(phase)),
            None => Vec::new(),
        };

        debug!(
            "Frame {}: phase {:.3}, contact {:?}, shown {:.3}",
            self.frame, phase, collision_t, display_t
        );

        self.interpolator.advance(delta);
        self.camera.update(input, delta);
        if input.is_held(DemoAction::CaptureBefore) {
            self.interpolator.capture_before(self.camera.tool_transform(self.tool_scale));
            debug!("Captured tool start pose along {}", self.camera.forward());
        }
        if input.is_held(DemoAction::CaptureAfter) {
            self.interpolator.capture_after(self.camera.tool_transform(self.tool_scale));
            debug!("Captured tool end pose along {}", self.camera.forward());
        }

        let report = FrameReport {
            frame: self.frame,
            collision_t,
            display_t,
            phase,
            body,
            tool,
            joints,
            quit: input.is_held(DemoAction::Quit),
        };
        self.frame += 1;
        Ok(report)
    }
}

fn skin(dispatcher: &mut dyn SkinningDispatcher, mesh: &DemoMesh, pose: &PoseSet) -> Result<SkinnedBuffers> {
    Ok(dispatcher.dispatch(&mesh.input, pose.matrices())?)
}

/// Tool transform for a pose given in settings
pub fn tool_matrix(pose: ToolPose, scale: f32) -> Mat4 {
    Transform::from_view(pose.position, pose.yaw, pose.pitch, scale).matrix()
}
