//! Parameter and output types of the kernel language.
//!
//! Type names are accepted in a GLSL-like short form (`float`, `vec3`,
//! `ivec2`, `mat4`) and in WGSL form (`f32`, `vec3<f32>`, `vec2i`,
//! `mat4x4<f32>`). Generated code always uses the WGSL spelling.

// ── ValueType ─────────────────────────────────────────────────────────────

/// Type of a value parameter or output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Int,
    IVec2,
    IVec3,
    IVec4,
    /// 4x4 float matrix, column-major.
    Mat4,
}

impl ValueType {
    /// Parses a type name; whitespace inside the name is ignored.
    pub fn parse(name: &str) -> Option<Self> {
        let name: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        Some(match name.as_str() {
            "float" | "f32" => Self::Float,
            "vec2" | "vec2f" | "vec2<f32>" => Self::Vec2,
            "vec3" | "vec3f" | "vec3<f32>" => Self::Vec3,
            "vec4" | "vec4f" | "vec4<f32>" => Self::Vec4,
            "int" | "i32" => Self::Int,
            "ivec2" | "vec2i" | "vec2<i32>" => Self::IVec2,
            "ivec3" | "vec3i" | "vec3<i32>" => Self::IVec3,
            "ivec4" | "vec4i" | "vec4<i32>" => Self::IVec4,
            "mat4" | "mat4x4" | "mat4x4f" | "mat4x4<f32>" => Self::Mat4,
            _ => return None,
        })
    }

    pub fn wgsl(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Vec2 => "vec2<f32>",
            Self::Vec3 => "vec3<f32>",
            Self::Vec4 => "vec4<f32>",
            Self::Int => "i32",
            Self::IVec2 => "vec2<i32>",
            Self::IVec3 => "vec3<i32>",
            Self::IVec4 => "vec4<i32>",
            Self::Mat4 => "mat4x4<f32>",
        }
    }

    /// Number of scalar components (16 for `Mat4`).
    pub fn components(self) -> usize {
        match self {
            Self::Float | Self::Int => 1,
            Self::Vec2 | Self::IVec2 => 2,
            Self::Vec3 | Self::IVec3 => 3,
            Self::Vec4 | Self::IVec4 => 4,
            Self::Mat4 => 16,
        }
    }

    pub fn is_int(self) -> bool {
        matches!(self, Self::Int | Self::IVec2 | Self::IVec3 | Self::IVec4)
    }

    /// Size in bytes inside a uniform block.
    pub fn size(self) -> u32 {
        4 * self.components() as u32
    }

    /// Alignment in bytes inside a uniform block (WGSL rules: `vec3` aligns
    /// like `vec4`, matrices align to their column).
    pub fn align(self) -> u32 {
        match self {
            Self::Float | Self::Int => 4,
            Self::Vec2 | Self::IVec2 => 8,
            _ => 16,
        }
    }

    /// Whether this type may be declared with `#out`.
    pub fn is_output(self) -> bool {
        matches!(self, Self::Float | Self::Vec2 | Self::Vec3 | Self::Vec4)
    }

    /// Expression widening a value of this output type to `vec4<f32>`.
    /// Missing components are zero, so they add nothing to the target.
    pub(crate) fn widen_to_vec4(self, expr: &str) -> String {
        match self {
            Self::Float => format!("vec4<f32>({expr}, 0.0, 0.0, 0.0)"),
            Self::Vec2 => format!("vec4<f32>({expr}, 0.0, 0.0)"),
            Self::Vec3 => format!("vec4<f32>({expr}, 0.0)"),
            _ => expr.to_owned(),
        }
    }
}

// ── Arrays ────────────────────────────────────────────────────────────────

/// Sampling shape of an array parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArrayKind {
    Array1D,
    Array2D,
}

/// Channel count of an array element type: `float` 1, `vec2` 2, `vec4` 4.
pub fn array_channels(ty: ValueType) -> Option<u32> {
    match ty {
        ValueType::Float => Some(1),
        ValueType::Vec2 => Some(2),
        ValueType::Vec4 => Some(4),
        _ => None,
    }
}

/// What a `#param` declaration binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Value(ValueType),
    Array { kind: ArrayKind, channels: u32 },
}

impl ParamKind {
    /// Parses the `kind` argument of the three-argument `#param` form.
    pub(crate) fn parse(kind: &str, ty: &str) -> Result<Self, String> {
        let value = ValueType::parse(ty).ok_or_else(|| format!("unsupported type `{ty}`"))?;
        let array = |kind| {
            array_channels(value)
                .map(|channels| Self::Array { kind, channels })
                .ok_or_else(|| format!("array element type must be float, vec2 or vec4, got `{ty}`"))
        };
        match kind.trim() {
            "value" => Ok(Self::Value(value)),
            "array1D" | "sampler1D" => array(ArrayKind::Array1D),
            "array2D" | "sampler2D" => array(ArrayKind::Array2D),
            other => Err(format!("unknown parameter kind `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_glsl_and_wgsl_spellings() {
        assert_eq!(ValueType::parse("float"), Some(ValueType::Float));
        assert_eq!(ValueType::parse("vec3< f32 >"), Some(ValueType::Vec3));
        assert_eq!(ValueType::parse("ivec2"), Some(ValueType::IVec2));
        assert_eq!(ValueType::parse("mat4x4f"), Some(ValueType::Mat4));
        assert_eq!(ValueType::parse("double"), None);
    }

    #[test]
    fn uniform_layout_rules() {
        assert_eq!(ValueType::Vec3.size(), 12);
        assert_eq!(ValueType::Vec3.align(), 16);
        assert_eq!(ValueType::Vec2.align(), 8);
        assert_eq!(ValueType::Mat4.size(), 64);
    }

    #[test]
    fn array_kinds() {
        assert_eq!(
            ParamKind::parse("array2D", "vec4"),
            Ok(ParamKind::Array { kind: ArrayKind::Array2D, channels: 4 })
        );
        assert!(ParamKind::parse("array1D", "vec3").is_err());
        assert!(ParamKind::parse("texture", "float").is_err());
        assert_eq!(ParamKind::parse("value", "int"), Ok(ParamKind::Value(ValueType::Int)));
    }

    #[test]
    fn widen_outputs() {
        assert_eq!(ValueType::Float.widen_to_vec4("y"), "vec4<f32>(y, 0.0, 0.0, 0.0)");
        assert_eq!(ValueType::Vec3.widen_to_vec4("n"), "vec4<f32>(n, 0.0)");
        assert_eq!(ValueType::Vec4.widen_to_vec4("c"), "c");
    }
}
