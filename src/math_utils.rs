use glam::{DVec2, Vec3};

/// Calculates the (x, y) position that results from orbiting around `pivot` at
/// a distance of `radius`.
pub fn rotate_around_pivot(pivot: DVec2, radius: f64, angle_radian: f64) -> DVec2 {
    elliptical_orbit(pivot, DVec2::splat(radius), angle_radian)
}

/// Like `rotate_around_pivot` but with independent radii along each axis.
pub fn elliptical_orbit(pivot: DVec2, radii: DVec2, angle_radian: f64) -> DVec2 {
    DVec2 {
        x: pivot.x + radii.x * f64::cos(angle_radian),
        y: pivot.y + radii.y * f64::sin(angle_radian),
    }
}

/// Converts a packed `0xRRGGBB` color into normalized sRGB components.
pub fn rgb_hex(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// Converts an sRGB encoded color to linear space.
pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    fn channel(c: f32) -> f32 {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    }

    Vec3::new(channel(color.x), channel(color.y), channel(color.z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colors_unpack_per_channel() {
        assert_eq!(Vec3::new(1.0, 0.0, 1.0), rgb_hex(0xff00ff));
        assert_eq!(Vec3::new(0.0, 1.0, 1.0), rgb_hex(0x00ffff));
    }

    #[test]
    fn orbit_starts_on_the_positive_x_axis() {
        let p = rotate_around_pivot(DVec2::new(1.0, 2.0), 3.0, 0.0);
        assert!((p - DVec2::new(4.0, 2.0)).length() < 1e-12);
    }

    #[test]
    fn srgb_endpoints_are_preserved() {
        assert_eq!(Vec3::ZERO, srgb_to_linear(Vec3::ZERO));
        assert!((srgb_to_linear(Vec3::ONE) - Vec3::ONE).length() < 1e-6);
    }
}
