//! Movement math: hop arcs, facing, and the mover transform.

pub use glam::{Quat, Vec3};

/// Rotations whose dot product is within this of one count as already facing.
pub const FACING_EPSILON: f32 = 1.0e-6;

/// Position and facing of a mover in world space.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Transform {
    pub position: Vec3,
    /// Rotation about the world up axis (Y).
    pub rotation: Quat,
}

impl Transform {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }

    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Unit vector the mover is facing (local +Z).
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

/// Height of a single hop arch at normalized progress `t`.
///
/// Zero at both ends, peaks at `jump_height` at `t = 0.5`.
pub fn hop_height(t: f32, jump_height: f32) -> f32 {
    (t.clamp(0.0, 1.0) * std::f32::consts::PI).sin() * jump_height
}

/// Point along a hop from `start` to `end` at normalized progress `t`.
///
/// `t >= 1` returns `end` exactly, with no arch offset.
pub fn hop_position(start: Vec3, end: Vec3, t: f32, jump_height: f32) -> Vec3 {
    if t >= 1.0 {
        return end;
    }
    let t = t.max(0.0);
    let mut position = start.lerp(end, t);
    position.y += hop_height(t, jump_height);
    position
}

/// Rotation about Y that faces along the horizontal part of `direction`.
///
/// Returns `None` for a direction with no horizontal component.
pub fn look_rotation(direction: Vec3) -> Option<Quat> {
    let flat = Vec3::new(direction.x, 0.0, direction.z);
    if flat.length_squared() <= f32::EPSILON {
        return None;
    }
    let flat = flat.normalize();
    Some(Quat::from_rotation_y(flat.x.atan2(flat.z)))
}

/// Whether `from` and `to` describe the same facing.
pub fn is_facing(from: Quat, to: Quat) -> bool {
    from.dot(to).abs() >= 1.0 - FACING_EPSILON
}

/// Seconds needed to turn from `from` to `to` at `degrees_per_second`.
///
/// Zero when already facing or when the speed is not positive.
pub fn rotation_duration(from: Quat, to: Quat, degrees_per_second: f32) -> f32 {
    // `angle_between` is approximate and never reaches zero for equal inputs.
    if is_facing(from, to) || degrees_per_second <= 0.0 {
        return 0.0;
    }
    from.angle_between(to).to_degrees() / degrees_per_second
}

/// Normalized progress of `elapsed` over `duration`, clamped to `[0, 1]`.
pub fn progress(elapsed: f32, duration: f32) -> f32 {
    if duration <= 0.0 {
        return 1.0;
    }
    (elapsed / duration).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_arch_peaks_at_midpoint() {
        assert_eq!(hop_height(0.0, 0.5), 0.0);
        assert!((hop_height(0.5, 0.5) - 0.5).abs() < 1e-6);
        assert!(hop_height(1.0, 0.5).abs() < 1e-6);
        assert!(hop_height(0.25, 0.5) < hop_height(0.5, 0.5));
    }

    #[test]
    fn hop_end_is_exact() {
        let start = Vec3::new(0.3, 0.5, 0.7);
        let end = Vec3::new(1.3, 0.5, 0.7);
        assert_eq!(hop_position(start, end, 1.0, 0.5), end);
        assert_eq!(hop_position(start, end, 1.7, 0.5), end);
        let mid = hop_position(start, end, 0.5, 0.5);
        assert!((mid.x - 0.8).abs() < 1e-6);
        assert!((mid.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn look_rotation_faces_direction() {
        let rotation = look_rotation(Vec3::new(1.0, 0.3, 0.0)).unwrap();
        let forward = rotation * Vec3::Z;
        assert!((forward - Vec3::X).length() < 1e-5);
        assert!(look_rotation(Vec3::Y).is_none());
    }

    #[test]
    fn quarter_turn_at_720_takes_an_eighth_of_a_second() {
        let to = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let duration = rotation_duration(Quat::IDENTITY, to, 720.0);
        assert!((duration - 0.125).abs() < 1e-4);
        assert_eq!(rotation_duration(to, to, 720.0), 0.0);
    }

    #[test]
    fn recomputed_facing_counts_as_already_facing() {
        let first = look_rotation(Vec3::new(1.0, 0.0, 0.0)).unwrap();
        let again = look_rotation(Vec3::new(2.0, 0.0, 0.0)).unwrap();
        assert!(is_facing(first, again));
        assert!(is_facing(first, -first));
        assert_eq!(rotation_duration(first, again, 720.0), 0.0);
        assert!(!is_facing(Quat::IDENTITY, first));
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(progress(0.5, 0.0), 1.0);
        assert_eq!(progress(3.0, 2.0), 1.0);
        assert_eq!(progress(-1.0, 2.0), 0.0);
        assert_eq!(progress(1.0, 4.0), 0.25);
    }
}
