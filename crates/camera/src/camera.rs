use glam::{Mat4, Vec3};
use lumen_common::{CameraConfig, StereoMode};
use lumen_input::{Key, Keyboard};

/// Cached matrices derived from the camera state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    /// Camera-as-object transform.
    pub world: Mat4,
    /// Inverse of `world`.
    pub view: Mat4,
    pub projection: Mat4,
    /// `projection * view`.
    pub view_projection: Mat4,
}

impl CameraMatrices {
    /// Derive all four matrices from the camera parameters.
    ///
    /// The world matrix applies the Z rotation first, then X, then Y, then
    /// the translation. `fov` must lie in `(0, π)`.
    pub fn compute(
        position: Vec3,
        rotation: Vec3,
        fov: f32,
        aspect: f32,
        near_clip: f32,
        far_clip: f32,
    ) -> Self {
        let world = Mat4::from_translation(position)
            * Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_z(rotation.z);
        let view = world.inverse();
        let projection = Mat4::perspective_lh(fov, aspect, near_clip, far_clip);
        Self {
            world,
            view,
            projection,
            view_projection: projection * view,
        }
    }
}

/// Keys used by [`Camera::control`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraBindings {
    pub turn_up: Key,
    pub turn_down: Key,
    pub turn_left: Key,
    pub turn_right: Key,
    pub move_forward: Key,
    pub move_backward: Key,
    pub move_left: Key,
    pub move_right: Key,
}

impl Default for CameraBindings {
    fn default() -> Self {
        Self {
            turn_up: Key::Up,
            turn_down: Key::Down,
            turn_left: Key::Left,
            turn_right: Key::Right,
            move_forward: Key::W,
            move_backward: Key::S,
            move_left: Key::A,
            move_right: Key::D,
        }
    }
}

/// Navigation speeds: world units per second and radians per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSpeeds {
    pub movement: f32,
    pub rotation: f32,
}

impl Default for CameraSpeeds {
    fn default() -> Self {
        Self {
            movement: 120.0,
            rotation: 1.3,
        }
    }
}

/// Perspective camera treated as a scene object with its own world matrix.
#[derive(Debug, Clone)]
pub struct Camera {
    position: Vec3,
    /// Euler angles in radians.
    rotation: Vec3,
    fov: f32,
    aspect: f32,
    near_clip: f32,
    far_clip: f32,
    speeds: CameraSpeeds,
    matrices: CameraMatrices,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(
            Vec3::ZERO,
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_4,
            1.0,
            50_000.0,
        )
    }
}

impl Camera {
    pub const DEFAULT_ASPECT: f32 = 1.333;

    /// Build a camera and compute its matrices once.
    pub fn new(position: Vec3, rotation: Vec3, fov: f32, near_clip: f32, far_clip: f32) -> Self {
        let aspect = Self::DEFAULT_ASPECT;
        Self {
            position,
            rotation,
            fov,
            aspect,
            near_clip,
            far_clip,
            speeds: CameraSpeeds::default(),
            matrices: CameraMatrices::compute(position, rotation, fov, aspect, near_clip, far_clip),
        }
    }

    /// Build from configuration; rotation is converted from degrees.
    pub fn from_config(config: &CameraConfig, aspect: f32) -> Self {
        let rotation = Vec3::new(
            config.rotation_degrees.x.to_radians(),
            config.rotation_degrees.y.to_radians(),
            config.rotation_degrees.z.to_radians(),
        );
        let mut camera = Self::new(
            config.position,
            rotation,
            config.fov,
            config.near_clip,
            config.far_clip,
        );
        camera.speeds = CameraSpeeds {
            movement: config.move_speed,
            rotation: config.rotation_speed,
        };
        camera.aspect = aspect;
        camera.update_matrices();
        camera
    }

    /// Recompute every cached matrix from the current state.
    pub fn update_matrices(&mut self) {
        self.matrices = CameraMatrices::compute(
            self.position,
            self.rotation,
            self.fov,
            self.aspect,
            self.near_clip,
            self.far_clip,
        );
    }

    pub fn matrices(&self) -> &CameraMatrices {
        &self.matrices
    }

    /// Camera position, shifted half the interocular distance along the local
    /// right axis for a stereo eye.
    pub fn position(&self, stereo: StereoMode, interocular: f32) -> Vec3 {
        match stereo.eye_offset(interocular) {
            None => self.position,
            Some(offset) => self.position + self.right_axis() * offset,
        }
    }

    pub fn world_matrix(&self, stereo: StereoMode, interocular: f32) -> Mat4 {
        match stereo.eye_offset(interocular) {
            None => self.matrices.world,
            Some(offset) => self.offset_world(offset),
        }
    }

    /// Stereo views invert the offset world matrix rather than translating the
    /// cached view, since inversion does not commute with the offset.
    pub fn view_matrix(&self, stereo: StereoMode, interocular: f32) -> Mat4 {
        match stereo.eye_offset(interocular) {
            None => self.matrices.view,
            Some(offset) => self.offset_world(offset).inverse(),
        }
    }

    /// Stereo projections shear the frustum so both eyes converge at
    /// `screen_distance`.
    pub fn projection_matrix(
        &self,
        stereo: StereoMode,
        interocular: f32,
        screen_distance: f32,
    ) -> Mat4 {
        match stereo.eye_offset(interocular) {
            None => self.matrices.projection,
            Some(offset) => {
                let mut projection = self.matrices.projection;
                projection.z_axis.x =
                    (offset / screen_distance) / (self.aspect * (self.fov / 2.0).tan());
                projection
            }
        }
    }

    /// Stereo variants are multiplied fresh on every call.
    pub fn view_projection_matrix(
        &self,
        stereo: StereoMode,
        interocular: f32,
        screen_distance: f32,
    ) -> Mat4 {
        match stereo {
            StereoMode::Monoscopic => self.matrices.view_projection,
            _ => {
                self.projection_matrix(stereo, interocular, screen_distance)
                    * self.view_matrix(stereo, interocular)
            }
        }
    }

    /// Apply keyboard navigation for one frame.
    ///
    /// Movement follows the local axes of the world matrix from the last
    /// [`update_matrices`](Self::update_matrices) call.
    pub fn control(&mut self, frame_time: f32, keyboard: &impl Keyboard, keys: &CameraBindings) {
        let turn = self.speeds.rotation * frame_time;
        if keyboard.is_key_held(keys.turn_down) {
            self.rotation.x += turn;
        }
        if keyboard.is_key_held(keys.turn_up) {
            self.rotation.x -= turn;
        }
        if keyboard.is_key_held(keys.turn_right) {
            self.rotation.y += turn;
        }
        if keyboard.is_key_held(keys.turn_left) {
            self.rotation.y -= turn;
        }

        let step = self.speeds.movement * frame_time;
        let right = self.right_axis();
        let forward = self.forward_axis();
        if keyboard.is_key_held(keys.move_right) {
            self.position += right * step;
        }
        if keyboard.is_key_held(keys.move_left) {
            self.position -= right * step;
        }
        if keyboard.is_key_held(keys.move_forward) {
            self.position += forward * step;
        }
        if keyboard.is_key_held(keys.move_backward) {
            self.position -= forward * step;
        }
    }

    /// Facing direction taken from the view matrix.
    pub fn facing(&self) -> Vec3 {
        self.matrices.view.row(2).truncate()
    }

    pub fn rotation(&self) -> Vec3 {
        self.rotation
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn set_rotation(&mut self, rotation: Vec3) {
        self.rotation = rotation;
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn set_fov(&mut self, fov: f32) {
        self.fov = fov;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Typically the viewport aspect, updated on resize.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    pub fn set_near_clip(&mut self, near_clip: f32) {
        self.near_clip = near_clip;
    }

    pub fn far_clip(&self) -> f32 {
        self.far_clip
    }

    pub fn set_far_clip(&mut self, far_clip: f32) {
        self.far_clip = far_clip;
    }

    pub fn speeds(&self) -> CameraSpeeds {
        self.speeds
    }

    pub fn set_speeds(&mut self, speeds: CameraSpeeds) {
        self.speeds = speeds;
    }

    fn right_axis(&self) -> Vec3 {
        self.matrices.world.x_axis.truncate()
    }

    fn forward_axis(&self) -> Vec3 {
        self.matrices.world.z_axis.truncate()
    }

    fn offset_world(&self, offset: f32) -> Mat4 {
        let mut world = self.matrices.world;
        world.w_axis += (self.right_axis() * offset).extend(0.0);
        world
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_input::KeyState;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

    const EPS: f32 = 1e-3;

    fn sample_cameras() -> Vec<Camera> {
        vec![
            Camera::default(),
            Camera::new(
                Vec3::new(-320.0, 70.0, 100.0),
                Vec3::new(8f32.to_radians(), 115f32.to_radians(), 0.0),
                FRAC_PI_4,
                1.0,
                50_000.0,
            ),
            Camera::new(
                Vec3::new(12.5, -3.0, 7.25),
                Vec3::new(-0.4, 2.9, 1.1),
                1.2,
                0.5,
                900.0,
            ),
        ]
    }

    #[test]
    fn view_is_inverse_of_world() {
        for camera in sample_cameras() {
            let m = camera.matrices();
            assert!((m.view * m.world).abs_diff_eq(Mat4::IDENTITY, EPS));
            assert!(m.view.abs_diff_eq(m.world.inverse(), EPS));
        }
    }

    #[test]
    fn world_applies_z_then_x_then_y_then_translation() {
        let rotation = Vec3::new(0.3, -1.1, 0.7);
        let position = Vec3::new(4.0, 5.0, 6.0);
        let m = CameraMatrices::compute(position, rotation, FRAC_PI_4, 1.5, 1.0, 100.0);

        let p = Vec3::new(1.0, 2.0, 3.0);
        let manual = Mat4::from_rotation_y(rotation.y).transform_vector3(
            Mat4::from_rotation_x(rotation.x)
                .transform_vector3(Mat4::from_rotation_z(rotation.z).transform_vector3(p)),
        ) + position;
        assert!(m.world.transform_point3(p).abs_diff_eq(manual, EPS));
    }

    #[test]
    fn combined_is_projection_times_view() {
        let camera = &sample_cameras()[1];
        let m = camera.matrices();
        assert_eq!(m.view_projection, m.projection * m.view);
    }

    #[test]
    fn update_is_idempotent() {
        let mut camera = sample_cameras()[2].clone();
        let before = *camera.matrices();
        camera.update_matrices();
        camera.update_matrices();
        assert_eq!(*camera.matrices(), before);
    }

    #[test]
    fn matrices_stale_until_update() {
        let mut camera = Camera::default();
        let before = *camera.matrices();
        camera.set_position(Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(*camera.matrices(), before);
        camera.update_matrices();
        assert_eq!(camera.matrices().world.w_axis.truncate(), Vec3::new(10.0, 0.0, 0.0));
        assert!((camera.matrices().view * camera.matrices().world).abs_diff_eq(Mat4::IDENTITY, EPS));
    }

    #[test]
    fn monoscopic_position_ignores_interocular() {
        let camera = &sample_cameras()[1];
        for d in [0.0, 0.65, 3.0, -8.0] {
            assert_eq!(camera.position(StereoMode::Monoscopic, d), Vec3::new(-320.0, 70.0, 100.0));
        }
    }

    #[test]
    fn stereo_positions_symmetric_about_centre() {
        for camera in sample_cameras() {
            let centre = camera.position(StereoMode::Monoscopic, 0.65);
            let left = camera.position(StereoMode::Left, 0.65);
            let right = camera.position(StereoMode::Right, 0.65);
            assert!((right - centre).abs_diff_eq(-(left - centre), EPS));
            assert!(((right - left).length() - 0.65).abs() < EPS);

            // Offset lies along the local right axis
            let axis = camera.matrices().world.x_axis.truncate();
            assert!((right - centre).normalize().abs_diff_eq(axis, EPS));
        }
    }

    #[test]
    fn monoscopic_matrices_are_the_cached_ones() {
        let camera = &sample_cameras()[1];
        let m = camera.matrices();
        assert_eq!(camera.world_matrix(StereoMode::Monoscopic, 5.0), m.world);
        assert_eq!(camera.view_matrix(StereoMode::Monoscopic, 5.0), m.view);
        assert_eq!(camera.projection_matrix(StereoMode::Monoscopic, 5.0, 20.0), m.projection);
    }

    #[test]
    fn stereo_world_translation_matches_stereo_position() {
        let camera = &sample_cameras()[2];
        for eye in [StereoMode::Left, StereoMode::Right] {
            let world = camera.world_matrix(eye, 0.65);
            assert!(world.w_axis.truncate().abs_diff_eq(camera.position(eye, 0.65), EPS));
            // Rotation part untouched
            assert_eq!(world.x_axis, camera.matrices().world.x_axis);
        }
    }

    #[test]
    fn stereo_view_reinverts_offset_world() {
        let camera = &sample_cameras()[1];
        for eye in [StereoMode::Left, StereoMode::Right] {
            let view = camera.view_matrix(eye, 0.65);
            let world = camera.world_matrix(eye, 0.65);
            assert!((view * world).abs_diff_eq(Mat4::IDENTITY, EPS));
            // The eye sits at the view-space origin
            let eye_pos = camera.position(eye, 0.65);
            assert!(view.transform_point3(eye_pos).abs_diff_eq(Vec3::ZERO, 1e-3));
        }
    }

    #[test]
    fn stereo_projection_shear() {
        let camera = Camera::new(Vec3::ZERO, Vec3::ZERO, FRAC_PI_2, 1.0, 100.0);
        // aspect 1.333, tan(pi/4) = 1, offset = ±0.5, screen distance 10
        let expected = (0.5 / 10.0) / (Camera::DEFAULT_ASPECT * 1.0);
        let right = camera.projection_matrix(StereoMode::Right, 1.0, 10.0);
        let left = camera.projection_matrix(StereoMode::Left, 1.0, 10.0);
        assert!((right.z_axis.x - expected).abs() < 1e-6);
        assert!((left.z_axis.x + expected).abs() < 1e-6);

        // Everything else matches the cached projection
        let mut unsheared = right;
        unsheared.z_axis.x = camera.matrices().projection.z_axis.x;
        assert_eq!(unsheared, camera.matrices().projection);
    }

    #[test]
    fn monoscopic_view_projection_is_exactly_cached() {
        let camera = Camera::new(
            Vec3::new(3.0, 4.0, -5.0),
            Vec3::new(0.1, 0.2, 0.3),
            1.0,
            0.1,
            500.0,
        );
        let cached = camera.matrices().view_projection;
        for _ in 0..10 {
            assert_eq!(camera.view_projection_matrix(StereoMode::Monoscopic, 0.65, 20.0), cached);
        }
    }

    #[test]
    fn stereo_view_projection_is_fresh_product() {
        let camera = &sample_cameras()[1];
        let eye = StereoMode::Left;
        let expected = camera.projection_matrix(eye, 0.65, 20.0) * camera.view_matrix(eye, 0.65);
        assert_eq!(camera.view_projection_matrix(eye, 0.65, 20.0), expected);
        assert_ne!(expected, camera.matrices().view_projection);
    }

    #[test]
    fn control_moves_along_local_forward() {
        let mut camera = Camera::default();
        let mut keys = KeyState::new();
        keys.handle_key(Key::W, true);
        camera.control(0.5, &keys, &CameraBindings::default());
        // Unrotated camera looks down +Z
        assert!(camera.position(StereoMode::Monoscopic, 0.0).abs_diff_eq(Vec3::new(0.0, 0.0, 60.0), EPS));
    }

    #[test]
    fn control_strafes_along_local_right_of_rotated_camera() {
        let mut camera = Camera::new(Vec3::ZERO, Vec3::new(0.0, FRAC_PI_2, 0.0), FRAC_PI_4, 1.0, 100.0);
        let mut keys = KeyState::new();
        keys.handle_key(Key::D, true);
        camera.control(1.0, &keys, &CameraBindings::default());
        // Yawed 90 degrees: local right is world -Z
        assert!(camera.position(StereoMode::Monoscopic, 0.0).abs_diff_eq(Vec3::new(0.0, 0.0, -120.0), 1e-3));
    }

    #[test]
    fn control_rotates_but_leaves_matrices_alone() {
        let mut camera = Camera::default();
        let before = *camera.matrices();
        let mut keys = KeyState::new();
        keys.handle_key(Key::Right, true);
        keys.handle_key(Key::Down, true);
        camera.control(1.0, &keys, &CameraBindings::default());
        assert!((camera.rotation() - Vec3::new(1.3, 1.3, 0.0)).length() < EPS);
        assert_eq!(*camera.matrices(), before);
    }

    #[test]
    fn opposite_keys_cancel() {
        let mut camera = Camera::default();
        let mut keys = KeyState::new();
        keys.handle_key(Key::A, true);
        keys.handle_key(Key::D, true);
        keys.handle_key(Key::Left, true);
        keys.handle_key(Key::Right, true);
        camera.control(0.25, &keys, &CameraBindings::default());
        assert!(camera.position(StereoMode::Monoscopic, 0.0).abs_diff_eq(Vec3::ZERO, EPS));
        assert!(camera.rotation().abs_diff_eq(Vec3::ZERO, EPS));
    }

    #[test]
    fn from_config_uses_degrees_and_aspect() {
        let config = CameraConfig::default();
        let camera = Camera::from_config(&config, 2.0);
        assert_eq!(camera.aspect(), 2.0);
        assert!((camera.rotation().y - 115f32.to_radians()).abs() < 1e-6);
        assert_eq!(camera.speeds().movement, 120.0);
        // Projection reflects the configured aspect
        let expected = Mat4::perspective_lh(config.fov, 2.0, config.near_clip, config.far_clip);
        assert_eq!(camera.matrices().projection, expected);
    }

    #[test]
    fn facing_of_unrotated_camera_is_forward() {
        let camera = Camera::default();
        assert!(camera.facing().abs_diff_eq(Vec3::Z, EPS));
    }
}
