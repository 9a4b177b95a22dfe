use num_enum::{FromPrimitive, IntoPrimitive};

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive)]
#[repr(u16)]
pub enum PhotometricInterpretation {
    BlackIsZero = 1,
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum SampleFormat {
    Unsigned = 1,
    Signed = 2,
    Float = 3,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive, FromPrimitive)]
#[repr(u16)]
pub enum PlanarConfiguration {
    Chunky = 1,
    Planar = 2,

    #[num_enum(default)]
    Unknown = 0xFFFF,
}

/// Written for every sample past the first; waterline bands carry no alpha.
#[derive(Debug, PartialEq, Clone, Copy, IntoPrimitive)]
#[repr(u16)]
pub enum ExtraSamples {
    Unspecified = 0,
}
