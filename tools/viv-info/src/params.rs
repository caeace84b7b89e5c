//! GPU parameter table and identity report rendering.

use std::io::{self, Write};

/// UAPI parameter numbers for the etnaviv GET_PARAM ioctl.
pub mod param {
    pub const GPU_MODEL: u32 = 0x01;
    pub const GPU_REVISION: u32 = 0x02;
    pub const GPU_FEATURES_0: u32 = 0x03;
    pub const GPU_FEATURES_1: u32 = 0x04;
    pub const GPU_FEATURES_2: u32 = 0x05;
    pub const GPU_FEATURES_3: u32 = 0x06;
    pub const GPU_FEATURES_4: u32 = 0x07;
    pub const GPU_FEATURES_5: u32 = 0x08;
    pub const GPU_FEATURES_6: u32 = 0x09;
    pub const GPU_STREAM_COUNT: u32 = 0x10;
    pub const GPU_REGISTER_MAX: u32 = 0x11;
    pub const GPU_THREAD_COUNT: u32 = 0x12;
    pub const GPU_VERTEX_CACHE_SIZE: u32 = 0x13;
    pub const GPU_SHADER_CORE_COUNT: u32 = 0x14;
    pub const GPU_PIXEL_PIPES: u32 = 0x15;
    pub const GPU_VERTEX_OUTPUT_BUFFER_SIZE: u32 = 0x16;
    pub const GPU_BUFFER_SIZE: u32 = 0x17;
    pub const GPU_INSTRUCTION_COUNT: u32 = 0x18;
    pub const GPU_NUM_CONSTANTS: u32 = 0x19;
    pub const GPU_NUM_VARYINGS: u32 = 0x1a;
}

/// Source of parameter values, normally a DRM device.
pub trait ParamSource {
    /// `None` when the kernel does not answer this pipe/param pair.
    fn get_param(&mut self, pipe: u32, param: u32) -> Option<u64>;
}

enum Format {
    Model,
    Revision,
    Hex,
    Dec,
    KiB,
}

struct ParamDesc {
    param: u32,
    label: &'static str,
    format: Format,
}

const PARAMS: [ParamDesc; 20] = [
    ParamDesc {
        param: param::GPU_MODEL,
        label: "Chip model",
        format: Format::Model,
    },
    ParamDesc {
        param: param::GPU_REVISION,
        label: "Chip revision",
        format: Format::Revision,
    },
    ParamDesc {
        param: param::GPU_FEATURES_0,
        label: "Chip features",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_FEATURES_1,
        label: "Chip minor features 0",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_FEATURES_2,
        label: "Chip minor features 1",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_FEATURES_3,
        label: "Chip minor features 2",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_FEATURES_4,
        label: "Chip minor features 3",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_FEATURES_5,
        label: "Chip minor features 4",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_FEATURES_6,
        label: "Chip minor features 5",
        format: Format::Hex,
    },
    ParamDesc {
        param: param::GPU_STREAM_COUNT,
        label: "Stream count",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_REGISTER_MAX,
        label: "Register max",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_THREAD_COUNT,
        label: "Thread count",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_SHADER_CORE_COUNT,
        label: "Shader core count",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_VERTEX_CACHE_SIZE,
        label: "Vertex cache size",
        format: Format::KiB,
    },
    ParamDesc {
        param: param::GPU_VERTEX_OUTPUT_BUFFER_SIZE,
        label: "Vertex output buffer size",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_PIXEL_PIPES,
        label: "Pixel pipes",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_INSTRUCTION_COUNT,
        label: "Instruction count",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_NUM_CONSTANTS,
        label: "Num constants",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_BUFFER_SIZE,
        label: "Buffer size",
        format: Format::Dec,
    },
    ParamDesc {
        param: param::GPU_NUM_VARYINGS,
        label: "Varyings count",
        format: Format::Dec,
    },
];

fn render(format: &Format, value: u64) -> String {
    // Parameter values are 32-bit quantities carried in a 64-bit field.
    let value = value as u32;
    match format {
        Format::Model => format!("GC{value:x}"),
        Format::Revision => format!("0x{value:04x}"),
        Format::Hex => format!("0x{value:08x}"),
        Format::Dec => format!("{value}"),
        Format::KiB => format!("{value}kB"),
    }
}

/// Writes the identity block for one core.  Parameters an older kernel does
/// not know are skipped, not reported as zero.
pub fn write_core_info<W: Write>(
    out: &mut W,
    source: &mut dyn ParamSource,
    pipe: u32,
) -> io::Result<()> {
    writeln!(out, "********** core: {pipe} ***********")?;
    writeln!(out, "* Chip identity:")?;
    for desc in &PARAMS {
        let Some(value) = source.get_param(pipe, desc.param) else {
            continue;
        };
        writeln!(out, "{}: {}", desc.label, render(&desc.format, value))?;
    }
    writeln!(out)?;
    Ok(())
}

/// Probes pipes 0 through 4 and reports every core that answers a model
/// query.  Returns how many cores were reported.
pub fn write_gpu_report<W: Write>(out: &mut W, source: &mut dyn ParamSource) -> io::Result<usize> {
    let mut cores = 0;
    for pipe in 0..5 {
        if source.get_param(pipe, param::GPU_MODEL).is_none() {
            continue;
        }
        write_core_info(out, source, pipe)?;
        cores += 1;
    }
    Ok(cores)
}
