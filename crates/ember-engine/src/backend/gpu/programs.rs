//! WGSL program sources, validation and link checks.
//!
//! Every program is parsed and validated with naga before wgpu sees it, so
//! a broken shader surfaces as a typed [`RendererError`] at construction
//! instead of a device-lost panic mid-frame.

use std::collections::BTreeSet;

use crate::error::RendererError;

/// One WGSL program: a `vs_main` / `fs_main` pair.
#[derive(Debug, Copy, Clone)]
pub(super) struct ProgramSource {
    pub name: &'static str,
    pub wgsl: &'static str,
}

pub(super) const COMMAND: ProgramSource = ProgramSource {
    name: "command",
    wgsl: include_str!("shaders/command.wgsl"),
};

pub(super) const IMAGE_LOAD: ProgramSource = ProgramSource {
    name: "image-load",
    wgsl: include_str!("shaders/image_load.wgsl"),
};

pub(super) const DOWNSAMPLE: ProgramSource = ProgramSource {
    name: "downsample",
    wgsl: include_str!("shaders/downsample.wgsl"),
};

pub(super) const OUTPUT: ProgramSource = ProgramSource {
    name: "output",
    wgsl: include_str!("shaders/output.wgsl"),
};

pub(super) const VERTEX_ENTRY: &str = "vs_main";
pub(super) const FRAGMENT_ENTRY: &str = "fs_main";

/// Parses and validates `source`.
pub(super) fn validate(source: &ProgramSource) -> Result<naga::Module, RendererError> {
    let module = naga::front::wgsl::parse_str(source.wgsl).map_err(|e| RendererError::ShaderCompile {
        program: source.name,
        message: e.emit_to_string(source.wgsl),
    })?;

    naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all())
        .validate(&module)
        .map_err(|e| RendererError::ShaderCompile {
            program: source.name,
            message: e.emit_to_string(source.wgsl),
        })?;

    Ok(module)
}

/// Vertex input locations consumed by the program's vertex entry point.
fn vertex_inputs(source: &ProgramSource, module: &naga::Module) -> Result<BTreeSet<u32>, RendererError> {
    let entry = module
        .entry_points
        .iter()
        .find(|e| e.stage == naga::ShaderStage::Vertex && e.name == VERTEX_ENTRY)
        .ok_or_else(|| RendererError::ProgramLink {
            program: source.name,
            message: format!("missing vertex entry point `{VERTEX_ENTRY}`"),
        })?;

    let mut locations = BTreeSet::new();
    for arg in &entry.function.arguments {
        match &arg.binding {
            Some(naga::Binding::Location { location, .. }) => {
                locations.insert(*location);
            }
            Some(naga::Binding::BuiltIn(_)) => {}
            None => {
                if let naga::TypeInner::Struct { members, .. } = &module.types[arg.ty].inner {
                    for member in members {
                        if let Some(naga::Binding::Location { location, .. }) = &member.binding {
                            locations.insert(*location);
                        }
                    }
                }
            }
        }
    }
    Ok(locations)
}

/// Checks that both entry points exist and that `layouts` feed every
/// vertex input of the program.
pub(super) fn link_check(
    source: &ProgramSource,
    module: &naga::Module,
    layouts: &[wgpu::VertexBufferLayout<'_>],
) -> Result<(), RendererError> {
    let has_fragment = module
        .entry_points
        .iter()
        .any(|e| e.stage == naga::ShaderStage::Fragment && e.name == FRAGMENT_ENTRY);
    if !has_fragment {
        return Err(RendererError::ProgramLink {
            program: source.name,
            message: format!("missing fragment entry point `{FRAGMENT_ENTRY}`"),
        });
    }

    let provided: BTreeSet<u32> = layouts
        .iter()
        .flat_map(|l| l.attributes.iter().map(|a| a.shader_location))
        .collect();
    let missing: Vec<u32> = vertex_inputs(source, module)?
        .difference(&provided)
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(RendererError::ProgramLink {
            program: source.name,
            message: format!("vertex inputs {missing:?} have no vertex attribute"),
        });
    }
    Ok(())
}

/// Validates, link-checks and creates the shader module.
pub(super) fn compile(
    device: &wgpu::Device,
    source: &ProgramSource,
    layouts: &[wgpu::VertexBufferLayout<'_>],
) -> Result<wgpu::ShaderModule, RendererError> {
    let module = validate(source)?;
    link_check(source, &module, layouts)?;
    log::debug!("program `{}` validated", source.name);

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(source.name),
        source: wgpu::ShaderSource::Wgsl(source.wgsl.into()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vertex::{CommandVertex, ImageLoadVertex, OutputVertex, VertexLayout};

    #[test]
    fn bundled_programs_validate_and_link() {
        let cases: [(ProgramSource, Vec<wgpu::VertexBufferLayout<'static>>); 4] = [
            (COMMAND, vec![CommandVertex::layout()]),
            (IMAGE_LOAD, vec![ImageLoadVertex::layout()]),
            (DOWNSAMPLE, vec![]),
            (OUTPUT, vec![OutputVertex::layout()]),
        ];
        for (source, layouts) in cases {
            let module = validate(&source).unwrap_or_else(|e| panic!("{e}"));
            link_check(&source, &module, &layouts).unwrap_or_else(|e| panic!("{e}"));
        }
    }

    #[test]
    fn syntax_error_is_a_compile_error() {
        let source = ProgramSource {
            name: "broken",
            wgsl: "fn vs_main( {",
        };
        assert!(matches!(validate(&source), Err(RendererError::ShaderCompile { program: "broken", .. })));
    }

    #[test]
    fn missing_attribute_is_a_link_error() {
        let module = validate(&COMMAND).unwrap();
        let err = link_check(&COMMAND, &module, &[ImageLoadVertex::layout()]).unwrap_err();
        assert!(matches!(err, RendererError::ProgramLink { program: "command", .. }));
    }
}
