use nalgebra::Matrix4;

/// Column-major 4x4 matrix in double precision, the layout the scene provider
/// hands out.
pub type Matrix = Matrix4<f64>;

/// Translation, rotation and scale recovered from an affine matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: [f32; 3],
    /// Unit quaternion stored as `[x, y, z, w]`.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Decomposed {
    pub const IDENTITY: Self = Self {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };
}

impl Default for Decomposed {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Multiplies two column-major matrices, accumulating each output column in
/// source column order.
///
/// # Arguments
///
/// * `a` - Left-hand matrix.
/// * `b` - Right-hand matrix.
///
/// # Returns
///
/// The product `a * b`.
pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let a = a.as_slice();
    let b = b.as_slice();
    let mut out = [0.0f64; 16];

    for d in 0..4 {
        for c in 0..4 {
            let component = b[d * 4 + c];
            for r in 0..4 {
                out[d * 4 + r] += a[c * 4 + r] * component;
            }
        }
    }

    Matrix::from_column_slice(&out)
}

/// Transforms a point by the affine part of `mat`.
pub fn transform_point(mat: &Matrix, point: [f64; 3]) -> [f64; 3] {
    let m = mat.as_slice();
    let mut out = [m[12], m[13], m[14]];
    for (c, component) in point.iter().enumerate() {
        out[0] += m[c * 4] * component;
        out[1] += m[c * 4 + 1] * component;
        out[2] += m[c * 4 + 2] * component;
    }
    out
}

/// Transforms a direction by the upper 3x3 of `mat` and renormalizes it.
/// Zero-length results are returned unchanged.
pub fn transform_direction(mat: &Matrix, direction: [f64; 3]) -> [f64; 3] {
    let m = mat.as_slice();
    let mut out = [0.0f64; 3];
    for (c, component) in direction.iter().enumerate() {
        out[0] += m[c * 4] * component;
        out[1] += m[c * 4 + 1] * component;
        out[2] += m[c * 4 + 2] * component;
    }

    let len = (out[0] * out[0] + out[1] * out[1] + out[2] * out[2]).sqrt();
    if len != 0.0 {
        let inv = 1.0 / len;
        out.iter_mut().for_each(|v| *v *= inv);
    }
    out
}

/// Inverts a 4x4 matrix by cofactor expansion.
///
/// # Arguments
///
/// * `mat` - Matrix to invert.
///
/// # Returns
///
/// `Some(inverse)` when the determinant is non-zero, otherwise `None`.
pub fn invert(mat: &Matrix) -> Option<Matrix> {
    let m = mat.as_slice();
    let mut inv = [0.0f64; 16];

    inv[0] = m[5] * m[10] * m[15] - m[5] * m[11] * m[14] - m[9] * m[6] * m[15]
        + m[9] * m[7] * m[14]
        + m[13] * m[6] * m[11]
        - m[13] * m[7] * m[10];

    inv[4] = -m[4] * m[10] * m[15] + m[4] * m[11] * m[14] + m[8] * m[6] * m[15]
        - m[8] * m[7] * m[14]
        - m[12] * m[6] * m[11]
        + m[12] * m[7] * m[10];

    inv[8] = m[4] * m[9] * m[15] - m[4] * m[11] * m[13] - m[8] * m[5] * m[15]
        + m[8] * m[7] * m[13]
        + m[12] * m[5] * m[11]
        - m[12] * m[7] * m[9];

    inv[12] = -m[4] * m[9] * m[14] + m[4] * m[10] * m[13] + m[8] * m[5] * m[14]
        - m[8] * m[6] * m[13]
        - m[12] * m[5] * m[10]
        + m[12] * m[6] * m[9];

    inv[1] = -m[1] * m[10] * m[15] + m[1] * m[11] * m[14] + m[9] * m[2] * m[15]
        - m[9] * m[3] * m[14]
        - m[13] * m[2] * m[11]
        + m[13] * m[3] * m[10];

    inv[5] = m[0] * m[10] * m[15] - m[0] * m[11] * m[14] - m[8] * m[2] * m[15]
        + m[8] * m[3] * m[14]
        + m[12] * m[2] * m[11]
        - m[12] * m[3] * m[10];

    inv[9] = -m[0] * m[9] * m[15] + m[0] * m[11] * m[13] + m[8] * m[1] * m[15]
        - m[8] * m[3] * m[13]
        - m[12] * m[1] * m[11]
        + m[12] * m[3] * m[9];

    inv[13] = m[0] * m[9] * m[14] - m[0] * m[10] * m[13] - m[8] * m[1] * m[14]
        + m[8] * m[2] * m[13]
        + m[12] * m[1] * m[10]
        - m[12] * m[2] * m[9];

    inv[2] = m[1] * m[6] * m[15] - m[1] * m[7] * m[14] - m[5] * m[2] * m[15]
        + m[5] * m[3] * m[14]
        + m[13] * m[2] * m[7]
        - m[13] * m[3] * m[6];

    inv[6] = -m[0] * m[6] * m[15] + m[0] * m[7] * m[14] + m[4] * m[2] * m[15]
        - m[4] * m[3] * m[14]
        - m[12] * m[2] * m[7]
        + m[12] * m[3] * m[6];

    inv[10] = m[0] * m[5] * m[15] - m[0] * m[7] * m[13] - m[4] * m[1] * m[15]
        + m[4] * m[3] * m[13]
        + m[12] * m[1] * m[7]
        - m[12] * m[3] * m[5];

    inv[14] = -m[0] * m[5] * m[14] + m[0] * m[6] * m[13] + m[4] * m[1] * m[14]
        - m[4] * m[2] * m[13]
        - m[12] * m[1] * m[6]
        + m[12] * m[2] * m[5];

    inv[3] = -m[1] * m[6] * m[11] + m[1] * m[7] * m[10] + m[5] * m[2] * m[11]
        - m[5] * m[3] * m[10]
        - m[9] * m[2] * m[7]
        + m[9] * m[3] * m[6];

    inv[7] = m[0] * m[6] * m[11] - m[0] * m[7] * m[10] - m[4] * m[2] * m[11]
        + m[4] * m[3] * m[10]
        + m[8] * m[2] * m[7]
        - m[8] * m[3] * m[6];

    inv[11] = -m[0] * m[5] * m[11] + m[0] * m[7] * m[9] + m[4] * m[1] * m[11]
        - m[4] * m[3] * m[9]
        - m[8] * m[1] * m[7]
        + m[8] * m[3] * m[5];

    inv[15] = m[0] * m[5] * m[10] - m[0] * m[6] * m[9] - m[4] * m[1] * m[10]
        + m[4] * m[2] * m[9]
        + m[8] * m[1] * m[6]
        - m[8] * m[2] * m[5];

    let det = m[0] * inv[0] + m[1] * inv[4] + m[2] * inv[8] + m[3] * inv[12];
    if det == 0.0 {
        return None;
    }

    let inv_det = 1.0 / det;
    inv.iter_mut().for_each(|value| *value *= inv_det);

    Some(Matrix::from_column_slice(&inv))
}

/// Splits an affine matrix into translation, rotation and scale.
///
/// Scale is the length of each basis column, so mirrored or sheared inputs
/// are not recovered faithfully. The rotation uses the four-branch
/// trace/diagonal selection so the divisor never approaches zero.
///
/// # Arguments
///
/// * `mat` - Affine matrix with orthogonal, positively scaled basis columns.
///
/// # Returns
///
/// The decomposed components narrowed to `f32`.
pub fn decompose(mat: &Matrix) -> Decomposed {
    let m = mat.as_slice();

    let sx = (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]).sqrt();
    let sy = (m[4] * m[4] + m[5] * m[5] + m[6] * m[6]).sqrt();
    let sz = (m[8] * m[8] + m[9] * m[9] + m[10] * m[10]).sqrt();

    let reciprocal = |s: f64| if s != 0.0 { 1.0 / s } else { 0.0 };
    let isx = reciprocal(sx);
    let isy = reciprocal(sy);
    let isz = reciprocal(sz);

    let rxx = m[0] * isx;
    let rxy = m[1] * isx;
    let rxz = m[2] * isx;
    let ryx = m[4] * isy;
    let ryy = m[5] * isy;
    let ryz = m[6] * isy;
    let rzx = m[8] * isz;
    let rzy = m[9] * isz;
    let rzz = m[10] * isz;

    let (t, qx, qy, qz, qw) = if rzz < 0.0 {
        if rxx > ryy {
            let t = 1.0 + rxx - ryy - rzz;
            (t, t, rxy + ryx, rzx + rxz, ryz - rzy)
        } else {
            let t = 1.0 - rxx + ryy - rzz;
            (t, rxy + ryx, t, ryz + rzy, rzx - rxz)
        }
    } else if rxx < -ryy {
        let t = 1.0 - rxx - ryy + rzz;
        (t, rzx + rxz, ryz + rzy, t, rxy - ryx)
    } else {
        let t = 1.0 + rxx + ryy + rzz;
        (t, ryz - rzy, rzx - rxz, rxy - ryx, t)
    };

    let qn = 0.5 / t.sqrt();

    Decomposed {
        translation: [m[12] as f32, m[13] as f32, m[14] as f32],
        rotation: [
            (qx * qn) as f32,
            (qy * qn) as f32,
            (qz * qn) as f32,
            (qw * qn) as f32,
        ],
        scale: [sx as f32, sy as f32, sz as f32],
    }
}

/// Builds the covector (normal/tangent) transform for `transform`: the
/// inverse transpose of its rotation and scale part.
///
/// # Arguments
///
/// * `transform` - Vector transform applied to positions.
///
/// # Returns
///
/// `None` when the linear part is singular.
pub fn normal_matrix(transform: &Matrix) -> Option<Matrix> {
    let mut tmp = *transform;
    {
        let m = tmp.as_mut_slice();
        m[3] = 0.0;
        m[7] = 0.0;
        m[11] = 0.0;
        m[12] = 0.0;
        m[13] = 0.0;
        m[14] = 0.0;
        m[15] = 1.0;
    }

    invert(&tmp).map(|inverse| inverse.transpose())
}
