use wgpu::naga;

use crate::host::ShaderStage;
use crate::shader::{RESOLUTION_UNIFORM, TIME_UNIFORM};

/// Byte offsets of the known uniforms inside the fragment stage's uniform
/// block, as laid out by the GLSL front end (std140).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UniformBlock {
    pub resolution: Option<u32>,
    pub time: Option<u32>,
    /// Size of the block in bytes; zero when the stage declares none.
    pub size: u32,
}

impl UniformBlock {
    /// Offset of the uniform called `name`, if the block declares it.
    pub fn offset_of(&self, name: &str) -> Option<u32> {
        match name {
            RESOLUTION_UNIFORM => self.resolution,
            TIME_UNIFORM => self.time,
            _ => None,
        }
    }
}

/// Parses and validates one GLSL stage.
///
/// Returns the naga module on success, or the front end / validator report
/// as plain text.
pub fn parse_stage(stage: ShaderStage, source: &str) -> Result<naga::Module, String> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(naga_stage), source)
        .map_err(|errors| errors.to_string())?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| err.to_string())?;

    Ok(module)
}

/// Finds the `resolution` and `time` members of any uniform block.
pub fn reflect_uniforms(module: &naga::Module) -> UniformBlock {
    let mut block = UniformBlock::default();
    for (_, global) in module.global_variables.iter() {
        if global.space != naga::AddressSpace::Uniform {
            continue;
        }
        let naga::TypeInner::Struct { members, span } = &module.types[global.ty].inner else {
            continue;
        };
        block.size = block.size.max(*span);
        for member in members {
            match member.name.as_deref() {
                Some(RESOLUTION_UNIFORM) => block.resolution = Some(member.offset),
                Some(TIME_UNIFORM) => block.time = Some(member.offset),
                _ => {}
            }
        }
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::{FRAGMENT_SHADER_GLSL, VERTEX_SHADER_GLSL};

    #[test]
    fn bundled_stages_validate() {
        parse_stage(ShaderStage::Vertex, VERTEX_SHADER_GLSL).expect("vertex stage");
        parse_stage(ShaderStage::Fragment, FRAGMENT_SHADER_GLSL).expect("fragment stage");
    }

    #[test]
    fn fragment_block_exposes_resolution_then_time() {
        let module = parse_stage(ShaderStage::Fragment, FRAGMENT_SHADER_GLSL).unwrap();
        let block = reflect_uniforms(&module);
        assert_eq!(block.resolution, Some(0));
        assert_eq!(block.time, Some(8));
        assert!(block.size >= 12);
        assert_eq!(block.offset_of("time"), Some(8));
        assert_eq!(block.offset_of("mouse"), None);
    }

    #[test]
    fn vertex_stage_has_no_uniforms() {
        let module = parse_stage(ShaderStage::Vertex, VERTEX_SHADER_GLSL).unwrap();
        assert_eq!(reflect_uniforms(&module), UniformBlock::default());
    }

    #[test]
    fn malformed_source_reports_diagnostics() {
        let source = r"#version 450
layout(location = 0) out vec4 fragColor;
void main() {
    fragColor = vec4(undefined_value, 1.0);
}
";
        let diagnostics = parse_stage(ShaderStage::Fragment, source).unwrap_err();
        assert!(!diagnostics.is_empty());
    }
}
