// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Decoded views over Maxwell 3D register words.
//!
//! Registers store whatever the guest wrote. The types here interpret those
//! words on demand; unknown encodings log a warning and fall back to a
//! default in the decoded value only, the stored word is never touched.

use bitflags::bitflags;

/// Pack a `{high, low}` register pair into a 64-bit GPU address.
#[inline]
pub fn pack_address(high: u32, low: u32) -> u64 {
    ((high as u64) << 32) | low as u64
}

// ── Pipeline state enums ────────────────────────────────────────────────────

/// Depth/stencil/alpha comparison function. Accepts both D3D (1-8) and GL
/// (0x200-0x207) encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl ComparisonOp {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 | 0x200 => Self::Never,
            2 | 0x201 => Self::Less,
            3 | 0x202 => Self::Equal,
            4 | 0x203 => Self::LessEqual,
            5 | 0x204 => Self::Greater,
            6 | 0x205 => Self::NotEqual,
            7 | 0x206 => Self::GreaterEqual,
            8 | 0x207 => Self::Always,
            _ => {
                log::warn!("Maxwell3D: unknown ComparisonOp 0x{:X}, defaulting to Always", value);
                Self::Always
            }
        }
    }

    /// D3D encoding, used for register defaults.
    pub const fn to_raw(self) -> u32 {
        self as u32 + 1
    }
}

/// Blend equation. Accepts both D3D (1-5) and GL (0x8006-0x800B) encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendOp {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

impl BlendOp {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 | 0x8006 => Self::Add,
            2 | 0x800A => Self::Subtract,
            3 | 0x800B => Self::ReverseSubtract,
            4 | 0x8007 => Self::Min,
            5 | 0x8008 => Self::Max,
            _ => {
                log::warn!("Maxwell3D: unknown BlendOp 0x{:X}, defaulting to Add", value);
                Self::Add
            }
        }
    }

    pub const fn to_raw(self) -> u32 {
        self as u32 + 1
    }
}

/// Blend factor. Accepts both D3D (0x1-0x14) and GL (0x4000+) encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    DstColor,
    OneMinusDstColor,
    SrcAlphaSaturate,
    Src1Color,
    OneMinusSrc1Color,
    Src1Alpha,
    OneMinusSrc1Alpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
}

impl BlendFactor {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0x01 | 0x4000 => Self::Zero,
            0x02 | 0x4001 => Self::One,
            0x03 | 0x4300 => Self::SrcColor,
            0x04 | 0x4301 => Self::OneMinusSrcColor,
            0x05 | 0x4302 => Self::SrcAlpha,
            0x06 | 0x4303 => Self::OneMinusSrcAlpha,
            0x07 | 0x4304 => Self::DstAlpha,
            0x08 | 0x4305 => Self::OneMinusDstAlpha,
            0x09 | 0x4306 => Self::DstColor,
            0x0A | 0x4307 => Self::OneMinusDstColor,
            0x0B | 0x4308 => Self::SrcAlphaSaturate,
            0x0D | 0xC900 => Self::Src1Color,
            0x0E | 0xC901 => Self::OneMinusSrc1Color,
            0x0F | 0xC902 => Self::Src1Alpha,
            0x10 | 0xC903 => Self::OneMinusSrc1Alpha,
            0x11 | 0xC001 => Self::ConstantColor,
            0x12 | 0xC002 => Self::OneMinusConstantColor,
            0x13 | 0xC003 => Self::ConstantAlpha,
            0x14 | 0xC004 => Self::OneMinusConstantAlpha,
            _ => {
                log::warn!("Maxwell3D: unknown BlendFactor 0x{:X}, defaulting to One", value);
                Self::One
            }
        }
    }
}

/// D3D encodings of the blend factors written at reset.
pub const BLEND_FACTOR_ZERO: u32 = 0x01;
pub const BLEND_FACTOR_ONE: u32 = 0x02;

/// Stencil operation. Accepts both D3D (1-8) and GL encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    IncrSat,
    DecrSat,
    Invert,
    Incr,
    Decr,
}

impl StencilOp {
    pub fn from_raw(value: u32) -> Self {
        match value {
            1 | 0x1E00 => Self::Keep,
            2 | 0x0000 => Self::Zero,
            3 | 0x1E01 => Self::Replace,
            4 | 0x1E02 => Self::IncrSat,
            5 | 0x1E03 => Self::DecrSat,
            6 | 0x150A => Self::Invert,
            7 | 0x8507 => Self::Incr,
            8 | 0x8508 => Self::Decr,
            _ => {
                log::warn!("Maxwell3D: unknown StencilOp 0x{:X}, defaulting to Keep", value);
                Self::Keep
            }
        }
    }

    pub const fn to_raw(self) -> u32 {
        self as u32 + 1
    }
}

/// Cull face mode (GL encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CullFace {
    Front = 0x0404,
    Back = 0x0405,
    FrontAndBack = 0x0408,
}

impl CullFace {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0x0404 => Self::Front,
            0x0405 => Self::Back,
            0x0408 => Self::FrontAndBack,
            _ => {
                log::warn!("Maxwell3D: unknown CullFace 0x{:X}, defaulting to Back", value);
                Self::Back
            }
        }
    }
}

/// Front face winding order (GL encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FrontFace {
    CW = 0x0900,
    CCW = 0x0901,
}

impl FrontFace {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0x0900 => Self::CW,
            0x0901 => Self::CCW,
            _ => {
                log::warn!("Maxwell3D: unknown FrontFace 0x{:X}, defaulting to CCW", value);
                Self::CCW
            }
        }
    }
}

/// Polygon rasterization mode (GL encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PolygonMode {
    Point = 0x1B00,
    Line = 0x1B01,
    Fill = 0x1B02,
}

impl PolygonMode {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0x1B00 => Self::Point,
            0x1B01 => Self::Line,
            0x1B02 => Self::Fill,
            _ => {
                log::warn!("Maxwell3D: unknown PolygonMode 0x{:X}, defaulting to Fill", value);
                Self::Fill
            }
        }
    }
}

/// Depth range mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthMode {
    MinusOneToOne,
    ZeroToOne,
}

impl DepthMode {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::MinusOneToOne,
            1 => Self::ZeroToOne,
            _ => {
                log::warn!("Maxwell3D: unknown DepthMode {}, defaulting to ZeroToOne", value);
                Self::ZeroToOne
            }
        }
    }
}

// ── MME shadow RAM ──────────────────────────────────────────────────────────

/// Routing mode for method writes between the live and shadow register files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum MmeShadowRamControl {
    /// Write both copies.
    MethodTrack = 0,
    /// Stage into the shadow copy only.
    MethodTrackWithFilter = 1,
    /// Write the live copy only.
    MethodPassthrough = 2,
    /// Replace the argument with the shadow word and write it to the live copy.
    MethodReplay = 3,
}

impl MmeShadowRamControl {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0 => Self::MethodTrack,
            1 => Self::MethodTrackWithFilter,
            2 => Self::MethodPassthrough,
            3 => Self::MethodReplay,
            _ => {
                log::warn!(
                    "Maxwell3D: unknown shadow RAM control {}, treating as passthrough",
                    value
                );
                Self::MethodPassthrough
            }
        }
    }

    /// Whether a routed write lands in the shadow copy.
    pub fn writes_shadow(self) -> bool {
        matches!(self, Self::MethodTrack | Self::MethodTrackWithFilter)
    }

    /// Whether a routed write lands in the live copy.
    pub fn writes_live(self) -> bool {
        !matches!(self, Self::MethodTrackWithFilter)
    }
}

// ── Semaphore ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreOperation {
    Release = 0,
    Acquire = 1,
    Counter = 2,
    Trap = 3,
}

/// Width of the result record written by a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemaphoreStructureSize {
    /// 8-byte result, optionally followed by a timestamp.
    TwoWords = 0,
    /// 4-byte result.
    OneWord = 1,
}

/// Counter sources selectable by a `Counter` semaphore operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterType {
    Zero,
    InputVertices,
    InputPrimitives,
    VertexShaderInvocations,
    GeometryShaderInvocations,
    GeometryShaderPrimitives,
    TransformFeedbackPrimitivesWritten,
    ClipperInputPrimitives,
    ClipperOutputPrimitives,
    PrimitivesGenerated,
    FragmentShaderInvocations,
    SamplesPassed,
    Other(u32),
}

impl CounterType {
    pub fn from_raw(value: u32) -> Self {
        match value {
            0x00 => Self::Zero,
            0x01 => Self::InputVertices,
            0x03 => Self::InputPrimitives,
            0x05 => Self::VertexShaderInvocations,
            0x07 => Self::GeometryShaderInvocations,
            0x09 => Self::GeometryShaderPrimitives,
            0x0B => Self::TransformFeedbackPrimitivesWritten,
            0x0F => Self::ClipperInputPrimitives,
            0x11 => Self::ClipperOutputPrimitives,
            0x12 => Self::PrimitivesGenerated,
            0x13 => Self::FragmentShaderInvocations,
            0x15 => Self::SamplesPassed,
            other => Self::Other(other),
        }
    }
}

/// Semaphore info word (0x6C3). Writing it triggers the operation.
///
/// | Bits  | Field          |
/// |-------|----------------|
/// | 1:0   | Operation      |
/// | 21    | Release timestamp |
/// | 27:23 | Counter type   |
/// | 28    | Structure size |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SemaphoreInfo(pub u32);

impl SemaphoreInfo {
    pub const TIMESTAMP_BIT: u32 = 1 << 21;
    pub const ONE_WORD_BIT: u32 = 1 << 28;

    pub fn operation(self) -> SemaphoreOperation {
        match self.0 & 0x3 {
            0 => SemaphoreOperation::Release,
            1 => SemaphoreOperation::Acquire,
            2 => SemaphoreOperation::Counter,
            _ => SemaphoreOperation::Trap,
        }
    }

    pub fn timestamp(self) -> bool {
        self.0 & Self::TIMESTAMP_BIT != 0
    }

    pub fn counter_type(self) -> CounterType {
        CounterType::from_raw((self.0 >> 23) & 0x1F)
    }

    pub fn structure_size(self) -> SemaphoreStructureSize {
        if self.0 & Self::ONE_WORD_BIT != 0 {
            SemaphoreStructureSize::OneWord
        } else {
            SemaphoreStructureSize::TwoWords
        }
    }
}

// ── Syncpoint action ────────────────────────────────────────────────────────

/// `syncpointAction` (0xB2): bits[11:0] id, bit 20 increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncpointAction(pub u32);

impl SyncpointAction {
    pub fn id(self) -> u32 {
        self.0 & 0xFFF
    }

    pub fn increment(self) -> bool {
        (self.0 >> 20) & 1 != 0
    }
}

// ── Clear ───────────────────────────────────────────────────────────────────

bitflags! {
    /// Surface components selected by a `clearBuffers` write.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearComponents: u32 {
        const DEPTH = 1 << 0;
        const STENCIL = 1 << 1;
        const RED = 1 << 2;
        const GREEN = 1 << 3;
        const BLUE = 1 << 4;
        const ALPHA = 1 << 5;
        const COLOR = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// `clearBuffers` (0x674): components in bits[5:0], RT index in bits[9:6],
/// layer in bits[20:10].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearBuffers {
    pub components: ClearComponents,
    pub render_target: u32,
    pub layer: u32,
}

impl ClearBuffers {
    pub fn from_raw(value: u32) -> Self {
        Self {
            components: ClearComponents::from_bits_truncate(value),
            render_target: (value >> 6) & 0xF,
            layer: (value >> 10) & 0x7FF,
        }
    }
}

// ── Structured views ────────────────────────────────────────────────────────

/// Number of colour render targets.
pub const RENDER_TARGET_COUNT: usize = 8;
/// Number of viewports, viewport transforms and scissors.
pub const VIEWPORT_COUNT: usize = 16;
/// Number of vertex attribute slots.
pub const VERTEX_ATTRIBUTE_COUNT: usize = 32;

/// One colour render target (16 words).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub address: u64,
    pub width: u32,
    pub height: u32,
    pub format: u32,
    pub tile_mode: u32,
    pub array_depth: u32,
    pub volume: bool,
    /// Layer stride in bytes (stored >> 2).
    pub layer_stride: u64,
    pub base_layer: u32,
}

impl RenderTarget {
    pub const WORDS: u32 = 0x10;

    pub fn from_words(w: &[u32]) -> Self {
        Self {
            address: pack_address(w[0], w[1]),
            width: w[2],
            height: w[3],
            format: w[4],
            tile_mode: w[5],
            array_depth: w[6] & 0xFFFF,
            volume: (w[6] >> 16) & 1 != 0,
            layer_stride: (w[7] as u64) << 2,
            base_layer: w[8],
        }
    }
}

/// Component selector in a viewport swizzle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ViewportSwizzle {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
    PositiveW = 6,
    NegativeW = 7,
}

impl ViewportSwizzle {
    fn from_raw(value: u32) -> Self {
        match value & 0x7 {
            0 => Self::PositiveX,
            1 => Self::NegativeX,
            2 => Self::PositiveY,
            3 => Self::NegativeY,
            4 => Self::PositiveZ,
            5 => Self::NegativeZ,
            6 => Self::PositiveW,
            _ => Self::NegativeW,
        }
    }
}

/// Identity swizzle (+X, +Y, +Z, +W) packed 4 bits per component.
pub const IDENTITY_SWIZZLE: u32 = (ViewportSwizzle::PositiveX as u32)
    | (ViewportSwizzle::PositiveY as u32) << 4
    | (ViewportSwizzle::PositiveZ as u32) << 8
    | (ViewportSwizzle::PositiveW as u32) << 12;

/// Viewport scale/translate transform (8 words).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportTransform {
    pub scale: [f32; 3],
    pub translate: [f32; 3],
    pub swizzle: [ViewportSwizzle; 4],
    pub subpixel_precision_bias: u32,
}

impl ViewportTransform {
    pub const WORDS: u32 = 8;
    pub const SWIZZLE_WORD: u32 = 6;

    pub fn from_words(w: &[u32]) -> Self {
        let sw = w[6];
        Self {
            scale: [f32::from_bits(w[0]), f32::from_bits(w[1]), f32::from_bits(w[2])],
            translate: [f32::from_bits(w[3]), f32::from_bits(w[4]), f32::from_bits(w[5])],
            swizzle: [
                ViewportSwizzle::from_raw(sw),
                ViewportSwizzle::from_raw(sw >> 4),
                ViewportSwizzle::from_raw(sw >> 8),
                ViewportSwizzle::from_raw(sw >> 12),
            ],
            subpixel_precision_bias: w[7],
        }
    }
}

/// Viewport rectangle and depth range (4 words).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: u16,
    pub width: u16,
    pub y: u16,
    pub height: u16,
    pub depth_range_near: f32,
    pub depth_range_far: f32,
}

impl Viewport {
    pub const WORDS: u32 = 4;
    pub const DEPTH_NEAR_WORD: u32 = 2;
    pub const DEPTH_FAR_WORD: u32 = 3;

    pub fn from_words(w: &[u32]) -> Self {
        Self {
            x: w[0] as u16,
            width: (w[0] >> 16) as u16,
            y: w[1] as u16,
            height: (w[1] >> 16) as u16,
            depth_range_near: f32::from_bits(w[2]),
            depth_range_far: f32::from_bits(w[3]),
        }
    }
}

/// Scissor rectangle (4 words).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scissor {
    pub enabled: bool,
    pub min_x: u16,
    pub max_x: u16,
    pub min_y: u16,
    pub max_y: u16,
}

impl Scissor {
    pub const WORDS: u32 = 4;

    pub fn from_words(w: &[u32]) -> Self {
        Self {
            enabled: w[0] != 0,
            min_x: w[1] as u16,
            max_x: (w[1] >> 16) as u16,
            min_y: w[2] as u16,
            max_y: (w[2] >> 16) as u16,
        }
    }
}

/// Blend equation for one render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Blend {
    pub separate_alpha: bool,
    pub color_op: BlendOp,
    pub color_src: BlendFactor,
    pub color_dst: BlendFactor,
    pub alpha_op: BlendOp,
    pub alpha_src: BlendFactor,
    pub alpha_dst: BlendFactor,
}

impl Blend {
    /// Per-target (`independentBlend`) entries are 8 words:
    /// separate_alpha, color op/src/dst, alpha op/src/dst, pad.
    pub const WORDS: u32 = 8;

    pub fn from_independent_words(w: &[u32]) -> Self {
        Self {
            separate_alpha: w[0] != 0,
            color_op: BlendOp::from_raw(w[1]),
            color_src: BlendFactor::from_raw(w[2]),
            color_dst: BlendFactor::from_raw(w[3]),
            alpha_op: BlendOp::from_raw(w[4]),
            alpha_src: BlendFactor::from_raw(w[5]),
            alpha_dst: BlendFactor::from_raw(w[6]),
        }
    }
}

/// Global blend state (`blendState`, 0x4CF..0x4DF).
///
/// +0 separate_alpha, +1 color_op, +2 color_src, +3 color_dst,
/// +4 alpha_op, +5 alpha_src, +6 color_key, +7 alpha_dst,
/// +8 enable_common, +9..+16 enable[0..7]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendState {
    pub blend: Blend,
    pub enable_common: bool,
    pub enable: [bool; RENDER_TARGET_COUNT],
}

impl BlendState {
    pub const WORDS: u32 = 17;
    pub const COLOR_OP: u32 = 1;
    pub const COLOR_SRC: u32 = 2;
    pub const COLOR_DST: u32 = 3;
    pub const ALPHA_OP: u32 = 4;
    pub const ALPHA_SRC: u32 = 5;
    pub const ALPHA_DST: u32 = 7;
    pub const ENABLE: u32 = 9;

    pub fn from_words(w: &[u32]) -> Self {
        let mut enable = [false; RENDER_TARGET_COUNT];
        for (i, e) in enable.iter_mut().enumerate() {
            *e = w[Self::ENABLE as usize + i] != 0;
        }
        Self {
            blend: Blend {
                separate_alpha: w[0] != 0,
                color_op: BlendOp::from_raw(w[1]),
                color_src: BlendFactor::from_raw(w[2]),
                color_dst: BlendFactor::from_raw(w[3]),
                alpha_op: BlendOp::from_raw(w[4]),
                alpha_src: BlendFactor::from_raw(w[5]),
                alpha_dst: BlendFactor::from_raw(w[7]),
            },
            enable_common: w[8] != 0,
            enable,
        }
    }
}

/// Stencil state for one face, gathered from its (non-contiguous) registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StencilFace {
    pub fail_op: StencilOp,
    pub zfail_op: StencilOp,
    pub zpass_op: StencilOp,
    pub compare_op: ComparisonOp,
    pub reference: u32,
    pub compare_mask: u32,
    pub write_mask: u32,
}

/// Per-RT colour write mask: R=bit 0, G=bit 4, B=bit 8, A=bit 12.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorWriteMask(pub u32);

impl ColorWriteMask {
    pub const ALL: u32 = 0x1111;

    pub fn red(self) -> bool {
        self.0 & 0x1 != 0
    }

    pub fn green(self) -> bool {
        self.0 & 0x10 != 0
    }

    pub fn blue(self) -> bool {
        self.0 & 0x100 != 0
    }

    pub fn alpha(self) -> bool {
        self.0 & 0x1000 != 0
    }
}

/// Vertex attribute format word.
///
/// bits[4:0] buffer, bit[6] fixed (constant), bits[20:7] offset,
/// bits[26:21] size, bits[29:27] type, bit[31] bgra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute(pub u32);

impl VertexAttribute {
    pub const FIXED_BIT: u32 = 1 << 6;

    pub fn buffer(self) -> u32 {
        self.0 & 0x1F
    }

    pub fn fixed(self) -> bool {
        self.0 & Self::FIXED_BIT != 0
    }

    pub fn offset(self) -> u32 {
        (self.0 >> 7) & 0x3FFF
    }

    pub fn size(self) -> u32 {
        (self.0 >> 21) & 0x3F
    }

    pub fn attrib_type(self) -> u32 {
        (self.0 >> 27) & 0x7
    }

    pub fn bgra(self) -> bool {
        self.0 >> 31 != 0
    }
}

/// `renderTargetControl`: count in bits[3:0], 3-bit target map entries from bit 4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetControl(pub u32);

impl RenderTargetControl {
    pub fn count(self) -> u32 {
        self.0 & 0xF
    }

    pub fn map(self, index: usize) -> u32 {
        (self.0 >> (4 + index * 3)) & 0x7
    }
}
