//! 256-entry RGB lookup tables consumed by the fragment stage.
//!
//! Tables are produced by external resolvers (curves, levels); the engine
//! only stores them, substitutes the identity table when an adjustment is
//! disabled, and re-uploads a table wholesale whenever it changes.

pub const LUT_SIZE: usize = 256;

/// A full 256×3 table of normalized output values.
#[derive(Clone, PartialEq)]
pub struct LookupTable {
    rows: Vec<[f32; 3]>,
}

impl std::fmt::Debug for LookupTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LookupTable({} rows)", self.rows.len())
    }
}

impl Default for LookupTable {
    fn default() -> Self {
        Self::identity()
    }
}

impl LookupTable {
    /// The pass-through table: entry i maps to i/255 on every channel.
    pub fn identity() -> Self {
        let rows = (0..LUT_SIZE)
            .map(|i| {
                let v = i as f32 / (LUT_SIZE - 1) as f32;
                [v, v, v]
            })
            .collect();
        Self { rows }
    }

    /// Builds a table from resolver output. Rows are clamped to `[0, 1]`;
    /// inputs of the wrong length are rejected.
    pub fn from_rows(rows: Vec<[f32; 3]>) -> anyhow::Result<Self> {
        if rows.len() != LUT_SIZE {
            anyhow::bail!("lookup table must have {} rows, got {}", LUT_SIZE, rows.len());
        }
        let rows = rows
            .into_iter()
            .map(|r| r.map(|v| v.clamp(0.0, 1.0)))
            .collect();
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[[f32; 3]] {
        &self.rows
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Texel data for a 256×1 rgba32float texture; alpha padded to 1.0.
    pub fn as_rgba_f32(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(LUT_SIZE * 4);
        for row in &self.rows {
            out.extend_from_slice(&[row[0], row[1], row[2], 1.0]);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_endpoints_and_monotonicity() {
        let lut = LookupTable::identity();
        let rows = lut.rows();
        assert_eq!(rows[0], [0.0, 0.0, 0.0]);
        assert_eq!(rows[255], [1.0, 1.0, 1.0]);
        for w in rows.windows(2) {
            assert!(w[1][0] >= w[0][0]);
        }
        assert!(lut.is_identity());
    }

    #[test]
    fn from_rows_rejects_wrong_length() {
        assert!(LookupTable::from_rows(vec![[0.0; 3]; 10]).is_err());
        assert!(LookupTable::from_rows(vec![[0.5; 3]; LUT_SIZE]).is_ok());
    }

    #[test]
    fn from_rows_clamps_out_of_range_values() {
        let mut rows = vec![[0.5f32; 3]; LUT_SIZE];
        rows[0] = [-1.0, 2.0, 0.5];
        let lut = LookupTable::from_rows(rows).unwrap();
        assert_eq!(lut.rows()[0], [0.0, 1.0, 0.5]);
    }

    #[test]
    fn rgba_packing_has_opaque_alpha() {
        let data = LookupTable::identity().as_rgba_f32();
        assert_eq!(data.len(), LUT_SIZE * 4);
        assert_eq!(data[3], 1.0);
        assert_eq!(data[data.len() - 1], 1.0);
        assert_eq!(data[data.len() - 4], 1.0);
    }
}
