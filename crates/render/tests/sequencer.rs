use std::f32::consts::FRAC_PI_4;

use glam::{Mat4, Vec3, Vec4};
use lumen_camera::Camera;
use lumen_common::{RenderMode, Viewport};
use lumen_lights::{LightUploadError, PointLight};
use lumen_mesh::{Material, shapes};
use lumen_render::{
    Command, FrameInput, FrameReport, GBufferSlot, GeometryId, RenderError, RenderSequencer,
    RenderBackend, RenderableMesh, SceneMesh, SoftwareBackend, TargetKind, Technique,
};

const AMBIENT: Vec3 = Vec3::new(0.2, 0.25, 0.3);
const MATERIAL: Material = Material {
    diffuse: Vec3::new(0.8, 0.6, 0.4),
    specular: 0.5,
};

struct Scene {
    backend: SoftwareBackend,
    sequencer: RenderSequencer,
    camera: Camera,
    cube: SceneMesh,
}

impl Scene {
    fn new() -> Self {
        let viewport = Viewport::new(64, 48);
        let mut backend = SoftwareBackend::new(viewport, 16);
        let sequencer = RenderSequencer::new(&mut backend, AMBIENT).unwrap();
        let mesh = shapes::cube(10.0, MATERIAL).unwrap();
        let cube = SceneMesh::upload(
            &mut backend,
            &mesh,
            Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0)),
        )
        .unwrap();
        let mut camera = Camera::new(Vec3::ZERO, Vec3::ZERO, FRAC_PI_4, 1.0, 1000.0);
        camera.set_aspect(viewport.aspect());
        camera.update_matrices();
        Self {
            backend,
            sequencer,
            camera,
            cube,
        }
    }

    fn render(
        &mut self,
        mode: RenderMode,
        lights: &[PointLight],
    ) -> Result<FrameReport, RenderError> {
        let opaque: [&dyn RenderableMesh; 1] = [&self.cube];
        let frame = FrameInput {
            camera: &self.camera,
            mode,
            lights,
            opaque: &opaque,
            background: &[],
        };
        self.sequencer.render_frame(&mut self.backend, &frame)
    }

    /// Command log without the per-draw world matrix updates.
    fn commands(&mut self) -> Vec<Command> {
        self.backend
            .take_commands()
            .into_iter()
            .filter(|c| *c != Command::SetWorldMatrix)
            .collect()
    }
}

fn light_in_front() -> PointLight {
    PointLight::new(Vec3::new(0.0, 0.0, 30.0), 25.0, Vec4::new(1.0, 0.9, 0.8, 0.0))
}

#[test]
fn deferred_frame_runs_passes_in_order() {
    let mut scene = Scene::new();
    scene.backend.take_commands();
    let lights = [light_in_front()];
    let report = scene.render(RenderMode::Deferred, &lights).unwrap();
    assert_eq!(report.draw_calls, 4);
    assert_eq!(report.light_count, 1);

    let g = scene.sequencer.gbuffer().id();
    let viewport = scene.backend.viewport();
    assert_eq!(
        scene.commands(),
        vec![
            Command::SetFrameUniforms,
            Command::SetViewport(viewport),
            Command::WriteLights(1),
            Command::SetLightCount(1),
            Command::ClearBackBuffer,
            Command::ClearDepth,
            Command::BindTargets(TargetKind::GBuffer(g)),
            Command::DrawGeometry {
                geometry: GeometryId(0),
                technique: Technique::GBufferFill
            },
            Command::BindTargets(TargetKind::BackBuffer),
            Command::BindInputs(Some(g)),
            Command::DrawFullscreenQuad(Technique::AmbientResolve),
            Command::DrawLightPoints {
                count: 1,
                technique: Technique::PointLightAccumulate
            },
            Command::BindInputs(None),
            Command::DrawLightPoints {
                count: 1,
                technique: Technique::LightFlares
            },
            Command::Present,
        ]
    );
}

#[test]
fn forward_frame_never_touches_gbuffer() {
    let mut scene = Scene::new();
    scene.backend.take_commands();
    scene.render(RenderMode::Forward, &[light_in_front()]).unwrap();
    let commands = scene.commands();
    assert!(commands.contains(&Command::DrawGeometry {
        geometry: GeometryId(0),
        technique: Technique::PixelLit
    }));
    assert!(!commands.iter().any(|c| matches!(
        c,
        Command::BindTargets(TargetKind::GBuffer(_))
            | Command::BindInputs(Some(_))
            | Command::DrawFullscreenQuad(_)
            | Command::DrawLightPoints {
                technique: Technique::PointLightAccumulate,
                ..
            }
    )));
}

#[test]
fn background_drawn_forward_after_lighting() {
    let mut scene = Scene::new();
    let sky_mesh = shapes::skybox(500.0).unwrap();
    let sky = SceneMesh::upload(&mut scene.backend, &sky_mesh, Mat4::IDENTITY).unwrap();
    let sky_id = sky.geometry().next().unwrap();
    scene.backend.take_commands();

    let opaque: [&dyn RenderableMesh; 1] = [&scene.cube];
    let background: [&dyn RenderableMesh; 1] = [&sky];
    let frame = FrameInput {
        camera: &scene.camera,
        mode: RenderMode::Deferred,
        lights: &[],
        opaque: &opaque,
        background: &background,
    };
    scene
        .sequencer
        .render_frame(&mut scene.backend, &frame)
        .unwrap();

    let commands = scene.commands();
    let position = |wanted: &Command| commands.iter().position(|c| c == wanted).unwrap();
    let unbind = position(&Command::BindInputs(None));
    let sky_draw = position(&Command::DrawGeometry {
        geometry: sky_id,
        technique: Technique::Background,
    });
    let flares = position(&Command::DrawLightPoints {
        count: 0,
        technique: Technique::LightFlares,
    });
    assert!(unbind < sky_draw);
    assert!(sky_draw < flares);
    assert_eq!(commands.last(), Some(&Command::Present));
}

#[test]
fn background_receives_ambient_only() {
    let mut scene = Scene::new();
    let sky_mesh = shapes::skybox(500.0).unwrap();
    let expected = sky_mesh.sub_meshes()[0].material().diffuse * AMBIENT;
    let sky = SceneMesh::upload(&mut scene.backend, &sky_mesh, Mat4::IDENTITY).unwrap();
    // Sits just inside the face the camera looks at
    let lights = [PointLight::new(
        Vec3::new(0.0, 0.0, 450.0),
        400.0,
        Vec4::new(1.0, 1.0, 1.0, 0.0),
    )];

    for mode in [RenderMode::Forward, RenderMode::Deferred] {
        let background: [&dyn RenderableMesh; 1] = [&sky];
        let frame = FrameInput {
            camera: &scene.camera,
            mode,
            lights: &lights,
            opaque: &[],
            background: &background,
        };
        scene
            .sequencer
            .render_frame(&mut scene.backend, &frame)
            .unwrap();

        // Flares add on top of the sky, so look away from the light's sprite
        let front = scene.backend.front_buffer();
        let viewport = scene.backend.viewport();
        let corner = front[0];
        let edge = front[(viewport.height as usize / 2) * viewport.width as usize];
        for pixel in [corner, edge] {
            assert!(
                (pixel.truncate() - expected).abs().max_element() < 1e-6,
                "{mode:?}: {pixel} vs {expected}"
            );
        }
    }
}

#[test]
fn ambient_only_frame_is_diffuse_times_ambient() {
    let mut scene = Scene::new();
    scene.render(RenderMode::Deferred, &[]).unwrap();

    let gbuffer = scene.sequencer.gbuffer().clone();
    let normals = scene
        .backend
        .gbuffer_target(&gbuffer, GBufferSlot::WorldNormal)
        .unwrap();
    let front = scene.backend.front_buffer();
    let expected = MATERIAL.diffuse * AMBIENT;

    let mut covered = 0;
    for (pixel, normal) in front.iter().zip(normals) {
        if normal.truncate() != Vec3::ZERO {
            covered += 1;
            assert_eq!(pixel.truncate(), expected);
        } else {
            assert_eq!(*pixel, Vec4::new(0.0, 0.0, 0.0, 1.0));
        }
    }
    assert!(covered > 0);
    assert!(covered < front.len());
}

#[test]
fn forward_and_deferred_agree() {
    let lights = [light_in_front()];

    let mut forward = Scene::new();
    forward.render(RenderMode::Forward, &lights).unwrap();
    let mut deferred = Scene::new();
    deferred.render(RenderMode::Deferred, &lights).unwrap();

    let mut lit = 0;
    for (f, d) in forward
        .backend
        .front_buffer()
        .iter()
        .zip(deferred.backend.front_buffer())
    {
        assert!((*f - *d).abs().max_element() < 1e-4, "{f} vs {d}");
        if f.truncate().max_element() > (MATERIAL.diffuse * AMBIENT).max_element() + 0.01 {
            lit += 1;
        }
    }
    assert!(lit > 0);
}

#[test]
fn mode_toggle_never_resolves_stale_gbuffer() {
    let moved = Mat4::from_translation(Vec3::new(14.0, 0.0, 50.0));

    let mut scene = Scene::new();
    scene.render(RenderMode::Deferred, &[]).unwrap();

    scene.cube.set_world(moved);
    scene.render(RenderMode::Forward, &[]).unwrap();
    scene.backend.take_commands();

    scene.render(RenderMode::Deferred, &[]).unwrap();
    let commands = scene.commands();
    let fill = commands
        .iter()
        .position(|c| matches!(c, Command::BindTargets(TargetKind::GBuffer(_))))
        .unwrap();
    let read = commands
        .iter()
        .position(|c| matches!(c, Command::BindInputs(Some(_))))
        .unwrap();
    assert!(fill < read);

    // Same image as a renderer that only ever saw the moved cube
    let mut fresh = Scene::new();
    fresh.cube.set_world(moved);
    fresh.render(RenderMode::Deferred, &[]).unwrap();
    assert_eq!(scene.backend.front_buffer(), fresh.backend.front_buffer());
}

#[test]
fn gbuffer_inputs_released_each_frame() {
    let mut scene = Scene::new();
    for _ in 0..3 {
        scene.render(RenderMode::Deferred, &[]).unwrap();
        assert_eq!(scene.backend.inputs_bound(), None);
    }
    assert_eq!(scene.backend.frames_presented(), 3);
    assert_eq!(scene.sequencer.frame_index(), 3);
}

#[test]
fn upload_failure_drops_the_frame() {
    let mut scene = Scene::new();
    let lights = vec![light_in_front(); 17];
    let err = scene.render(RenderMode::Deferred, &lights).unwrap_err();
    assert!(matches!(
        err,
        RenderError::LightUpload(LightUploadError::CapacityExceeded {
            count: 17,
            capacity: 16
        })
    ));
    assert_eq!(scene.backend.frames_presented(), 0);
}

#[test]
fn resize_reallocates_gbuffer() {
    let mut scene = Scene::new();
    let before = scene.sequencer.gbuffer().id();
    scene.backend.resize(Viewport::new(32, 24));
    scene.render(RenderMode::Deferred, &[]).unwrap();
    let gbuffer = scene.sequencer.gbuffer();
    assert_ne!(gbuffer.id(), before);
    assert_eq!(gbuffer.viewport(), Viewport::new(32, 24));
    assert_eq!(scene.backend.front_buffer().len(), 32 * 24);
}
