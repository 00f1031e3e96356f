//! sRGB / grayscale to CIELAB conversion.
//!
//! Reference formulas from <http://www.easyrgb.com/en/math.php> and
//! <https://en.wikipedia.org/wiki/CIELAB_color_space>, D65 whitepoint.

use static_init::dynamic;

/// D65 whitepoint, input values are sRGB.
const D65_WHITE: [f32; 3] = [0.950_456, 1.0, 1.088_754];

// Linear sRGB -> XYZ, row major.
const SRGB_TO_XYZ: [f32; 9] = [
    0.412_453, 0.357_580, 0.180_423, //
    0.212_671, 0.715_160, 0.072_169, //
    0.019_334, 0.119_193, 0.950_227,
];

#[dynamic(65535)]
static SRGB_GAMMA_TBL: [f32; 256] = core::array::from_fn(|i| gamma_corr(i as f32 / 255.0));

/// Gamma expansion of a [0,1]-normalized sRGB sample.
#[inline]
pub fn gamma_corr(v: f32) -> f32 {
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

/// The CIELAB `f` function on a whitepoint-normalized XYZ component.
#[inline]
pub fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.powf(1.0 / 3.0)
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

#[inline]
fn linearize(sample: u32, normval: u32) -> f32 {
    // 8-bit samples hit the table, 16-bit ones pay for the powf.
    if normval == 255 {
        unsafe { SRGB_GAMMA_TBL[(sample & 0xFF) as usize] }
    } else {
        gamma_corr(sample as f32 / normval as f32)
    }
}

/// Converts one sRGB pixel into a CIELAB feature vector.
pub fn srgb_to_lab(srgb: [u32; 3], normval: u32) -> [f32; 3] {
    let r = linearize(srgb[0], normval);
    let g = linearize(srgb[1], normval);
    let b = linearize(srgb[2], normval);

    let x = (SRGB_TO_XYZ[0] * r + SRGB_TO_XYZ[1] * g + SRGB_TO_XYZ[2] * b) / D65_WHITE[0];
    let y = (SRGB_TO_XYZ[3] * r + SRGB_TO_XYZ[4] * g + SRGB_TO_XYZ[5] * b) / D65_WHITE[1];
    let z = (SRGB_TO_XYZ[6] * r + SRGB_TO_XYZ[7] * g + SRGB_TO_XYZ[8] * b) / D65_WHITE[2];

    let fx = lab_f(x);
    let fy = lab_f(y);
    let fz = lab_f(z);

    [
        116.0 * fy - 16.0,
        500.0 * (fx - fy),
        200.0 * (fy - fz),
    ]
}

/// Converts one grayscale pixel into a CIELAB feature vector by replicating
/// the sample over R, G and B.
pub fn gray_to_lab(gray: u32, normval: u32) -> [f32; 3] {
    srgb_to_lab([gray, gray, gray], normval)
}

#[cfg(test)]
mod tests {
    use super::{gray_to_lab, srgb_to_lab};

    #[test]
    fn white_maps_to_l100() {
        let [l, a, b] = srgb_to_lab([255, 255, 255], 255);
        assert!((l - 100.0).abs() < 0.1, "L = {l}");
        assert!(a.abs() < 0.2, "a = {a}");
        assert!(b.abs() < 0.2, "b = {b}");
    }

    #[test]
    fn black_maps_to_origin() {
        let [l, a, b] = srgb_to_lab([0, 0, 0], 255);
        assert!(l.abs() < 1e-3);
        assert!(a.abs() < 1e-3);
        assert!(b.abs() < 1e-3);
    }

    #[test]
    fn gray_is_achromatic() {
        for v in [1u32, 64, 128, 200, 254] {
            let [_, a, b] = gray_to_lab(v, 255);
            assert!(a.abs() < 0.2, "a({v}) = {a}");
            assert!(b.abs() < 0.2, "b({v}) = {b}");
        }
    }

    #[test]
    fn sixteen_bit_matches_eight_bit_endpoints() {
        let lab8 = srgb_to_lab([255, 255, 255], 255);
        let lab16 = srgb_to_lab([65535, 65535, 65535], 65535);
        for i in 0..3 {
            assert!((lab8[i] - lab16[i]).abs() < 0.1);
        }
    }

    #[test]
    fn luminance_is_monotonic() {
        let mut last = -1.0f32;
        for v in 0..=255u32 {
            let [l, _, _] = gray_to_lab(v, 255);
            assert!(l >= last, "L({v}) = {l} < {last}");
            last = l;
        }
    }
}
