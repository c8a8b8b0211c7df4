//! Compositing pass kernels
//!
//! Stateless per-pixel operations, each a pure function of its input and
//! output targets. These are the reference implementations the pass graph
//! records and executes; they carry the exact numeric semantics of the
//! GPU shaders they stand in for.
//!
//! 8-bit formats carry implicit sRGB encoding decided at target-creation
//! time, so every kernel converts on the read/write boundary from the
//! target's declared format rather than per-instruction.

use crate::foundation::math::{Quat, Vec3};
use crate::render::target::{PixelFormat, RenderTarget};

/// Depth-equality tolerance used by segmentation.
pub const SEGMENT_DEPTH_TOLERANCE: f32 = 1e-4;

/// Number of bins in the eye-adaptation luminance histogram.
const HISTOGRAM_BINS: usize = 64;

/// Log2-luminance range covered by the histogram.
const HISTOGRAM_MIN_LOG: f32 = -10.0;
const HISTOGRAM_MAX_LOG: f32 = 10.0;

fn srgb_encode(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn srgb_decode(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn to_linear(format: PixelFormat, px: [f32; 4]) -> [f32; 4] {
    match format {
        PixelFormat::Rgba8Srgb => [
            srgb_decode(px[0]),
            srgb_decode(px[1]),
            srgb_decode(px[2]),
            px[3],
        ],
        _ => px,
    }
}

fn from_linear(format: PixelFormat, px: [f32; 4]) -> [f32; 4] {
    match format {
        PixelFormat::Rgba8Srgb => [
            srgb_encode(px[0].clamp(0.0, 1.0)),
            srgb_encode(px[1].clamp(0.0, 1.0)),
            srgb_encode(px[2].clamp(0.0, 1.0)),
            px[3].clamp(0.0, 1.0),
        ],
        PixelFormat::Rgba8 => [
            px[0].clamp(0.0, 1.0),
            px[1].clamp(0.0, 1.0),
            px[2].clamp(0.0, 1.0),
            px[3].clamp(0.0, 1.0),
        ],
        _ => px,
    }
}

/// Identity copy with format conversion.
///
/// Used where the source is a floating-point HDR buffer and the
/// destination is 8-bit sRGB; the conversion happens at the write.
pub fn full_scene_color_copy(src: &RenderTarget, dst: &mut RenderTarget) {
    let (w, h) = dst.dimensions();
    let src_format = src.desc().format;
    let dst_format = dst.desc().format;
    for y in 0..h {
        for x in 0..w {
            let linear = to_linear(src_format, src.read(x, y));
            dst.write(x, y, from_linear(dst_format, linear));
        }
    }
}

/// Copy scene color and scene depth into two reference targets for later
/// segmentation.
pub fn scene_color_and_depth_copy(
    color: &RenderTarget,
    depth: &RenderTarget,
    out_color: &mut RenderTarget,
    out_depth: &mut RenderTarget,
) {
    full_scene_color_copy(color, out_color);
    let (w, h) = out_depth.dimensions();
    for y in 0..h {
        for x in 0..w {
            out_depth.write(x, y, depth.read(x, y));
        }
    }
}

/// Per-pixel foreground extraction against a recorded background.
///
/// Runs after the clip planes were rasterized into the current depth
/// buffer. A pixel whose depth still matches the recorded reference within
/// tolerance sits in front of every clip plane and classifies foreground
/// with full alpha; a displaced depth means a plane overwrote it, so the
/// geometry there belongs to the background. The background output always
/// receives the untouched reference color. The post-processed variant
/// reads already tone-mapped color and skips linearization.
#[allow(clippy::too_many_arguments)]
pub fn segment(
    current_color: &RenderTarget,
    current_depth: &RenderTarget,
    reference_color: &RenderTarget,
    reference_depth: &RenderTarget,
    out_foreground: &mut RenderTarget,
    out_background: &mut RenderTarget,
    post_processed: bool,
) {
    let (w, h) = out_foreground.dimensions();
    let cur_format = current_color.desc().format;
    let ref_format = reference_color.desc().format;
    let fg_format = out_foreground.desc().format;
    let bg_format = out_background.desc().format;

    for y in 0..h {
        for x in 0..w {
            let cur_depth = current_depth.read(x, y)[0];
            let ref_depth = reference_depth.read(x, y)[0];
            let is_foreground =
                (cur_depth - ref_depth).abs() <= SEGMENT_DEPTH_TOLERANCE;

            if is_foreground {
                let mut color = if post_processed {
                    current_color.read(x, y)
                } else {
                    to_linear(cur_format, current_color.read(x, y))
                };
                color[3] = 1.0;
                out_foreground.write(x, y, from_linear(fg_format, color));
            } else {
                out_foreground.write(x, y, [0.0, 0.0, 0.0, 0.0]);
            }

            let reference = if post_processed {
                reference_color.read(x, y)
            } else {
                to_linear(ref_format, reference_color.read(x, y))
            };
            out_background.write(x, y, from_linear(bg_format, reference));
        }
    }
}

/// Write `alpha`'s coverage into `color`'s alpha channel in place.
///
/// Used by the transparency path, where scene alpha is carried in a
/// separate buffer until final output.
pub fn combine_alpha(color: &mut RenderTarget, alpha: &RenderTarget) {
    let (w, h) = color.dimensions();
    for y in 0..h {
        for x in 0..w {
            let mut px = color.read(x, y);
            px[3] = alpha.read(x, y)[3];
            color.write(x, y, px);
        }
    }
}

/// Two-stage log-luminance auto-exposure: histogram build, then reduce to
/// a single exposure scalar.
pub fn eye_adaptation_histogram(src: &RenderTarget) -> f32 {
    let mut bins = [0u32; HISTOGRAM_BINS];
    let (w, h) = src.dimensions();
    let format = src.desc().format;

    for y in 0..h {
        for x in 0..w {
            let px = to_linear(format, src.read(x, y));
            let luminance =
                0.2126 * px[0] + 0.7152 * px[1] + 0.0722 * px[2];
            let log_lum = luminance.max(1e-6).log2();
            let t = (log_lum - HISTOGRAM_MIN_LOG)
                / (HISTOGRAM_MAX_LOG - HISTOGRAM_MIN_LOG);
            let bin = ((t.clamp(0.0, 1.0) * (HISTOGRAM_BINS - 1) as f32) as usize)
                .min(HISTOGRAM_BINS - 1);
            bins[bin] += 1;
        }
    }

    let total: u32 = bins.iter().sum();
    if total == 0 {
        return 1.0;
    }

    let mut weighted = 0.0f32;
    for (i, count) in bins.iter().enumerate() {
        let bin_log = HISTOGRAM_MIN_LOG
            + (i as f32 + 0.5) / HISTOGRAM_BINS as f32
                * (HISTOGRAM_MAX_LOG - HISTOGRAM_MIN_LOG);
        weighted += bin_log * *count as f32;
    }
    let average_log = weighted / total as f32;

    // Exposure that maps the average luminance to middle gray
    0.18 / average_log.exp2().max(1e-6)
}

/// Write one exposure scalar into a 1x1 exposure target.
pub fn eye_adaptation_apply(exposure: f32, dst: &mut RenderTarget) {
    dst.write(0, 0, [exposure, exposure, exposure, 1.0]);
}

/// Camera parameters for the clip-plane occluder raster.
#[derive(Debug, Clone, Copy)]
pub struct OccluderCamera {
    /// Camera position, host space
    pub position: Vec3,
    /// Camera rotation, host space; forward is local +X, up is local +Z
    pub rotation: Quat,
    /// Horizontal field of view, degrees
    pub horizontal_fov: f32,
}

/// Rasterize a clip plane as an occluder into a depth and color pair.
///
/// Suppresses sky and distant geometry that would otherwise leak behind
/// the plane's silhouette in the foreground capture. Per pixel, the view
/// ray is intersected with the plane; hits inside the plane's extents that
/// are closer than the stored depth overwrite depth and clear color.
pub fn render_clip_plane_occluder(
    camera: &OccluderCamera,
    plane: &crate::foundation::math::Transform,
    depth: &mut RenderTarget,
    color: &mut RenderTarget,
) {
    let (w, h) = depth.dimensions();
    if w == 0 || h == 0 {
        return;
    }

    let forward = camera.rotation * Vec3::x();
    let right = camera.rotation * Vec3::y();
    let up = camera.rotation * Vec3::z();

    let aspect = w as f32 / h as f32;
    let tan_h = (camera.horizontal_fov.to_radians() * 0.5).tan();
    let tan_v = tan_h / aspect;

    let normal = plane.rotation * Vec3::x();
    let axis_y = plane.rotation * Vec3::y();
    let axis_z = plane.rotation * Vec3::z();
    let half_y = plane.scale.y * 0.5;
    let half_z = plane.scale.z * 0.5;
    if half_y <= 0.0 || half_z <= 0.0 {
        return;
    }

    for py in 0..h {
        for px in 0..w {
            let ndc_x = (px as f32 + 0.5) / w as f32 * 2.0 - 1.0;
            let ndc_y = (py as f32 + 0.5) / h as f32 * 2.0 - 1.0;
            let dir = forward + right * (ndc_x * tan_h) - up * (ndc_y * tan_v);

            let denom = dir.dot(&normal);
            if denom.abs() < 1e-6 {
                continue;
            }
            let t = (plane.position - camera.position).dot(&normal) / denom;
            if t <= 0.0 {
                continue;
            }

            let hit = camera.position + dir * t;
            let local = hit - plane.position;
            if local.dot(&axis_y).abs() > half_y
                || local.dot(&axis_z).abs() > half_z
            {
                continue;
            }

            if t < depth.read(px, py)[0] {
                depth.write(px, py, [t, 0.0, 0.0, 1.0]);
                color.write(px, py, [0.0, 0.0, 0.0, 0.0]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Transform;
    use crate::render::target::{TargetDesc, TargetPool};
    use approx::assert_relative_eq;

    fn hdr_target(pool: &mut TargetPool, w: u32, h: u32) -> crate::render::target::TargetKey {
        pool.create(TargetDesc::color(w, h, PixelFormat::Rgba32F))
            .unwrap()
    }

    #[test]
    fn copy_encodes_srgb_on_eight_bit_destination() {
        let mut pool = TargetPool::new();
        let src_key = hdr_target(&mut pool, 1, 1);
        let dst_key = pool.create(TargetDesc::shared_output(1, 1)).unwrap();

        pool.get_mut(src_key).unwrap().clear([0.5, 0.5, 0.5, 1.0]);
        let [src, dst] = pool.get_disjoint_mut(src_key, dst_key).unwrap();
        full_scene_color_copy(src, dst);

        let px = pool.get(dst_key).unwrap().read(0, 0);
        assert_relative_eq!(px[0], srgb_encode(0.5), epsilon = 1e-5);
        assert_relative_eq!(px[3], 1.0);
    }

    #[test]
    fn segmentation_keeps_undisplaced_depth_as_foreground() {
        let mut pool = TargetPool::new();
        let cur_color = hdr_target(&mut pool, 2, 1);
        let ref_color = hdr_target(&mut pool, 2, 1);
        let cur_depth = pool.create(TargetDesc::depth(2, 1)).unwrap();
        let ref_depth = pool.create(TargetDesc::depth(2, 1)).unwrap();
        let out_fg = hdr_target(&mut pool, 2, 1);
        let out_bg = hdr_target(&mut pool, 2, 1);

        // Pixel 0 still carries the recorded depth; a clip plane displaced
        // pixel 1
        pool.get_mut(cur_depth).unwrap().write(0, 0, [10.0, 0.0, 0.0, 1.0]);
        pool.get_mut(cur_depth).unwrap().write(1, 0, [2.0, 0.0, 0.0, 1.0]);
        pool.get_mut(ref_depth).unwrap().clear([10.0, 0.0, 0.0, 1.0]);
        pool.get_mut(cur_color).unwrap().clear([0.8, 0.1, 0.1, 1.0]);
        pool.get_mut(ref_color).unwrap().clear([0.2, 0.2, 0.9, 1.0]);

        {
            let cur_c = pool.get(cur_color).unwrap().clone();
            let cur_d = pool.get(cur_depth).unwrap().clone();
            let ref_c = pool.get(ref_color).unwrap().clone();
            let ref_d = pool.get(ref_depth).unwrap().clone();
            let [fg, bg] = pool.get_disjoint_mut(out_fg, out_bg).unwrap();
            segment(&cur_c, &cur_d, &ref_c, &ref_d, fg, bg, false);
        }

        let fg = pool.get(out_fg).unwrap();
        assert_eq!(fg.read(0, 0)[3], 1.0);
        assert_relative_eq!(fg.read(0, 0)[0], 0.8);
        assert_eq!(fg.read(1, 0)[3], 0.0);

        // The background keeps the reference color on both sides
        let bg = pool.get(out_bg).unwrap();
        assert_relative_eq!(bg.read(0, 0)[2], 0.9);
        assert_relative_eq!(bg.read(1, 0)[2], 0.9);
    }

    #[test]
    fn combine_alpha_only_touches_alpha() {
        let mut pool = TargetPool::new();
        let color = hdr_target(&mut pool, 1, 1);
        let alpha = hdr_target(&mut pool, 1, 1);
        pool.get_mut(color).unwrap().clear([0.3, 0.6, 0.9, 1.0]);
        pool.get_mut(alpha).unwrap().clear([0.0, 0.0, 0.0, 0.25]);

        let [c, a] = pool.get_disjoint_mut(color, alpha).unwrap();
        combine_alpha(c, a);

        let px = pool.get(color).unwrap().read(0, 0);
        assert_relative_eq!(px[0], 0.3);
        assert_relative_eq!(px[3], 0.25);
    }

    #[test]
    fn exposure_tracks_scene_brightness() {
        let mut pool = TargetPool::new();
        let dark = hdr_target(&mut pool, 4, 4);
        let bright = hdr_target(&mut pool, 4, 4);
        pool.get_mut(dark).unwrap().clear([0.01, 0.01, 0.01, 1.0]);
        pool.get_mut(bright).unwrap().clear([2.0, 2.0, 2.0, 1.0]);

        let dark_exposure = eye_adaptation_histogram(pool.get(dark).unwrap());
        let bright_exposure = eye_adaptation_histogram(pool.get(bright).unwrap());
        assert!(dark_exposure > bright_exposure);
    }

    #[test]
    fn occluder_raster_then_segmentation_splits_at_the_plane() {
        let mut pool = TargetPool::new();
        let color_key = hdr_target(&mut pool, 3, 1);
        let depth_key = pool.create(TargetDesc::depth(3, 1)).unwrap();
        let ref_color = hdr_target(&mut pool, 3, 1);
        let ref_depth = pool.create(TargetDesc::depth(3, 1)).unwrap();
        let fg_key = hdr_target(&mut pool, 3, 1);
        let bg_key = hdr_target(&mut pool, 3, 1);

        pool.get_mut(color_key).unwrap().clear([0.6, 0.2, 0.2, 1.0]);
        // Pixel 0 in front of the plane, pixels 1 and 2 behind it
        pool.get_mut(depth_key).unwrap().write(0, 0, [40.0, 0.0, 0.0, 1.0]);
        pool.get_mut(depth_key).unwrap().write(1, 0, [500.0, 0.0, 0.0, 1.0]);
        pool.get_mut(depth_key).unwrap().write(2, 0, [500.0, 0.0, 0.0, 1.0]);

        let camera = OccluderCamera {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            horizontal_fov: 90.0,
        };
        let plane = Transform {
            position: Vec3::new(100.0, 0.0, 0.0),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 10_000.0, 10_000.0),
        };

        {
            let color = pool.get(color_key).unwrap().clone();
            let depth = pool.get(depth_key).unwrap().clone();
            let [ref_c, ref_d] = pool.get_disjoint_mut(ref_color, ref_depth).unwrap();
            scene_color_and_depth_copy(&color, &depth, ref_c, ref_d);
        }
        {
            let [depth, color] = pool.get_disjoint_mut(depth_key, color_key).unwrap();
            render_clip_plane_occluder(&camera, &plane, depth, color);
        }
        {
            let cur_c = pool.get(color_key).unwrap().clone();
            let cur_d = pool.get(depth_key).unwrap().clone();
            let ref_c = pool.get(ref_color).unwrap().clone();
            let ref_d = pool.get(ref_depth).unwrap().clone();
            let [fg, bg] = pool.get_disjoint_mut(fg_key, bg_key).unwrap();
            segment(&cur_c, &cur_d, &ref_c, &ref_d, fg, bg, false);
        }

        let fg = pool.get(fg_key).unwrap();
        assert_eq!(fg.read(0, 0)[3], 1.0);
        assert_relative_eq!(fg.read(0, 0)[0], 0.6);
        assert_eq!(fg.read(1, 0)[3], 0.0);
        assert_eq!(fg.read(2, 0)[3], 0.0);

        // The background never shows the occluder's clear color
        let bg = pool.get(bg_key).unwrap();
        assert_relative_eq!(bg.read(1, 0)[0], 0.6);
    }

    #[test]
    fn occluder_covers_pixels_in_front_of_the_plane() {
        let mut pool = TargetPool::new();
        let depth_key = pool.create(TargetDesc::depth(8, 8)).unwrap();
        let color_key = hdr_target(&mut pool, 8, 8);
        pool.get_mut(depth_key).unwrap().clear([1_000.0, 0.0, 0.0, 1.0]);
        pool.get_mut(color_key).unwrap().clear([0.5, 0.5, 0.5, 1.0]);

        let camera = OccluderCamera {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            horizontal_fov: 90.0,
        };
        // Large plane facing the camera, 100 units down +X
        let plane = Transform {
            position: Vec3::new(100.0, 0.0, 0.0),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 10_000.0, 10_000.0),
        };

        let [depth, color] = pool.get_disjoint_mut(depth_key, color_key).unwrap();
        render_clip_plane_occluder(&camera, &plane, depth, color);

        let depth = pool.get(depth_key).unwrap();
        assert!(depth.read(4, 4)[0] < 1_000.0);
        assert_eq!(pool.get(color_key).unwrap().read(4, 4)[3], 0.0);
    }
}
