// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

//! Maxwell 3D register file and its named layout.
//!
//! The register file is a flat array of `0xE00` words. Named fields are
//! described by a schema table (`LAYOUT`) rather than an overlaid struct, so
//! the guest-visible offsets are spelled out once and checked by tests:
//! every field is in bounds, the table is sorted, and no two fields overlap.
//!
//! Offsets are in words (method numbers), not bytes.

use std::ops::Range;

use super::types::*;

/// Number of 32-bit registers in the Maxwell 3D class.
pub const REGISTER_COUNT: usize = 0xE00;

/// A named, fixed-offset view over a contiguous run of registers.
///
/// A scalar has stride 1 and count 1, a struct has stride N and count 1, and
/// an array of structs has stride N and count K.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub offset: u32,
    pub stride: u32,
    pub count: u32,
}

impl Field {
    pub const fn scalar(name: &'static str, offset: u32) -> Self {
        Self { name, offset, stride: 1, count: 1 }
    }

    pub const fn block(name: &'static str, offset: u32, words: u32) -> Self {
        Self { name, offset, stride: words, count: 1 }
    }

    pub const fn array(name: &'static str, offset: u32, stride: u32, count: u32) -> Self {
        Self { name, offset, stride, count }
    }

    /// Total words covered by the field.
    pub const fn words(&self) -> u32 {
        self.stride * self.count
    }

    /// One past the last word of the field.
    pub const fn end(&self) -> u32 {
        self.offset + self.words()
    }

    /// First word of element `index`. `index` must be below `count`.
    pub const fn element(&self, index: usize) -> u32 {
        self.offset + self.stride * index as u32
    }

    pub fn element_range(&self, index: u32) -> Range<u32> {
        let start = self.offset + self.stride * index;
        start..start + self.stride
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.offset && offset < self.end()
    }
}

// ── Schema ──────────────────────────────────────────────────────────────────

pub const NO_OPERATION: Field = Field::scalar("noOperation", 0x40);
pub const WAIT_FOR_IDLE: Field = Field::scalar("waitForIdle", 0x44);
pub const MME_INSTRUCTION_RAM_POINTER: Field = Field::scalar("mme.instructionRamPointer", 0x45);
pub const MME_INSTRUCTION_RAM_LOAD: Field = Field::scalar("mme.instructionRamLoad", 0x46);
pub const MME_START_ADDRESS_RAM_POINTER: Field = Field::scalar("mme.startAddressRamPointer", 0x47);
pub const MME_START_ADDRESS_RAM_LOAD: Field = Field::scalar("mme.startAddressRamLoad", 0x48);
pub const MME_SHADOW_RAM_CONTROL: Field = Field::scalar("mme.shadowRamControl", 0x49);
pub const SYNCPOINT_ACTION: Field = Field::scalar("syncpointAction", 0xB2);
pub const RASTERIZER_ENABLE: Field = Field::scalar("rasterizerEnable", 0xDF);
pub const RENDER_TARGETS: Field =
    Field::array("renderTargets", 0x200, RenderTarget::WORDS, RENDER_TARGET_COUNT as u32);
pub const VIEWPORT_TRANSFORMS: Field =
    Field::array("viewportTransforms", 0x280, ViewportTransform::WORDS, VIEWPORT_COUNT as u32);
pub const VIEWPORTS: Field =
    Field::array("viewports", 0x300, Viewport::WORDS, VIEWPORT_COUNT as u32);
pub const DEPTH_MODE: Field = Field::scalar("depthMode", 0x35F);
pub const CLEAR_COLOR_VALUE: Field = Field::array("clearColorValue", 0x360, 1, 4);
pub const CLEAR_DEPTH_VALUE: Field = Field::scalar("clearDepthValue", 0x364);
pub const CLEAR_STENCIL_VALUE: Field = Field::scalar("clearStencilValue", 0x368);
pub const POLYGON_MODE: Field = Field::array("polygonMode", 0x36B, 1, 2);
pub const SCISSORS: Field = Field::array("scissors", 0x380, Scissor::WORDS, VIEWPORT_COUNT as u32);
pub const STENCIL_BACK_EXTRA: Field = Field::block("stencilBackExtra", 0x3D5, 3);
pub const TILED_CACHE_ENABLE: Field = Field::scalar("tiledCacheEnable", 0x3D8);
pub const TILED_CACHE_SIZE: Field = Field::scalar("tiledCacheSize", 0x3D9);
pub const RT_SEPARATE_FRAG_DATA: Field = Field::scalar("rtSeparateFragData", 0x3EB);
pub const VERTEX_ATTRIBUTE_STATE: Field =
    Field::array("vertexAttributeState", 0x458, 1, VERTEX_ATTRIBUTE_COUNT as u32);
pub const RENDER_TARGET_CONTROL: Field = Field::scalar("renderTargetControl", 0x487);
pub const DEPTH_TEST_ENABLE: Field = Field::scalar("depthTestEnable", 0x4B3);
pub const DEPTH_WRITE_ENABLE: Field = Field::scalar("depthWriteEnable", 0x4BA);
pub const DEPTH_TEST_FUNC: Field = Field::scalar("depthTestFunc", 0x4C3);
pub const ALPHA_TEST_REF: Field = Field::scalar("alphaTestRef", 0x4C4);
pub const ALPHA_TEST_FUNC: Field = Field::scalar("alphaTestFunc", 0x4C5);
pub const DRAW_TFB_STRIDE: Field = Field::scalar("drawTFBStride", 0x4C6);
pub const BLEND_CONSTANT: Field = Field::array("blendConstant", 0x4C7, 1, 4);
pub const BLEND_STATE: Field = Field::block("blendState", 0x4CF, BlendState::WORDS);
pub const STENCIL_ENABLE: Field = Field::scalar("stencilEnable", 0x4E0);
pub const STENCIL_FRONT: Field = Field::block("stencilFront", 0x4E1, 7);
pub const LINE_WIDTH_SMOOTH: Field = Field::scalar("lineWidthSmooth", 0x4EC);
pub const LINE_WIDTH_ALIASED: Field = Field::scalar("lineWidthAliased", 0x4ED);
pub const DRAW_BASE_VERTEX: Field = Field::scalar("drawBaseVertex", 0x50D);
pub const DRAW_BASE_INSTANCE: Field = Field::scalar("drawBaseInstance", 0x50E);
pub const CLIP_DISTANCE_ENABLE: Field = Field::scalar("clipDistanceEnable", 0x544);
pub const SAMPLE_COUNTER_ENABLE: Field = Field::scalar("sampleCounterEnable", 0x545);
pub const POINT_SPRITE_SIZE: Field = Field::scalar("pointSpriteSize", 0x546);
pub const ZCULL_STAT_COUNTERS_ENABLE: Field = Field::scalar("zCullStatCountersEnable", 0x547);
pub const POINT_SPRITE_ENABLE: Field = Field::scalar("pointSpriteEnable", 0x548);
pub const SHADER_EXCEPTIONS: Field = Field::scalar("shaderExceptions", 0x54A);
pub const MULTISAMPLE_ENABLE: Field = Field::scalar("multisampleEnable", 0x54D);
pub const DEPTH_TARGET_ENABLE: Field = Field::scalar("depthTargetEnable", 0x54E);
pub const MULTISAMPLE_CONTROL: Field = Field::scalar("multisampleControl", 0x54F);
pub const SAMPLER_POOL: Field = Field::block("samplerPool", 0x557, 3);
pub const POLYGON_OFFSET_FACTOR: Field = Field::scalar("polygonOffsetFactor", 0x55B);
pub const LINE_SMOOTH_ENABLE: Field = Field::scalar("lineSmoothEnable", 0x55C);
pub const TEXTURE_POOL: Field = Field::block("texturePool", 0x55D, 3);
pub const STENCIL_TWO_SIDE_ENABLE: Field = Field::scalar("stencilTwoSideEnable", 0x565);
pub const STENCIL_BACK: Field = Field::block("stencilBack", 0x566, 4);
pub const POINT_COORD_REPLACE: Field = Field::scalar("pointCoordReplace", 0x581);
pub const CULL_FACE_ENABLE: Field = Field::scalar("cullFaceEnable", 0x646);
pub const FRONT_FACE: Field = Field::scalar("frontFace", 0x647);
pub const CULL_FACE: Field = Field::scalar("cullFace", 0x648);
pub const PIXEL_CENTRE_IMAGE: Field = Field::scalar("pixelCentreImage", 0x649);
pub const VIEWPORT_TRANSFORM_ENABLE: Field = Field::scalar("viewportTransformEnable", 0x64B);
pub const CLEAR_BUFFERS: Field = Field::scalar("clearBuffers", 0x674);
pub const COLOR_MASK: Field = Field::array("colorMask", 0x680, 1, RENDER_TARGET_COUNT as u32);
pub const SEMAPHORE: Field = Field::block("semaphore", 0x6C0, 4);
pub const INDEPENDENT_BLEND: Field =
    Field::array("independentBlend", 0x780, Blend::WORDS, RENDER_TARGET_COUNT as u32);
pub const FIRMWARE_CALL: Field = Field::array("firmwareCall", 0x8C0, 1, 32);
pub const FIRMWARE_CALL_RESULT: Field = Field::scalar("firmwareCallResult", 0xD00);

/// Every named field, sorted by offset.
pub const LAYOUT: &[Field] = &[
    NO_OPERATION,
    WAIT_FOR_IDLE,
    MME_INSTRUCTION_RAM_POINTER,
    MME_INSTRUCTION_RAM_LOAD,
    MME_START_ADDRESS_RAM_POINTER,
    MME_START_ADDRESS_RAM_LOAD,
    MME_SHADOW_RAM_CONTROL,
    SYNCPOINT_ACTION,
    RASTERIZER_ENABLE,
    RENDER_TARGETS,
    VIEWPORT_TRANSFORMS,
    VIEWPORTS,
    DEPTH_MODE,
    CLEAR_COLOR_VALUE,
    CLEAR_DEPTH_VALUE,
    CLEAR_STENCIL_VALUE,
    POLYGON_MODE,
    SCISSORS,
    STENCIL_BACK_EXTRA,
    TILED_CACHE_ENABLE,
    TILED_CACHE_SIZE,
    RT_SEPARATE_FRAG_DATA,
    VERTEX_ATTRIBUTE_STATE,
    RENDER_TARGET_CONTROL,
    DEPTH_TEST_ENABLE,
    DEPTH_WRITE_ENABLE,
    DEPTH_TEST_FUNC,
    ALPHA_TEST_REF,
    ALPHA_TEST_FUNC,
    DRAW_TFB_STRIDE,
    BLEND_CONSTANT,
    BLEND_STATE,
    STENCIL_ENABLE,
    STENCIL_FRONT,
    LINE_WIDTH_SMOOTH,
    LINE_WIDTH_ALIASED,
    DRAW_BASE_VERTEX,
    DRAW_BASE_INSTANCE,
    CLIP_DISTANCE_ENABLE,
    SAMPLE_COUNTER_ENABLE,
    POINT_SPRITE_SIZE,
    ZCULL_STAT_COUNTERS_ENABLE,
    POINT_SPRITE_ENABLE,
    SHADER_EXCEPTIONS,
    MULTISAMPLE_ENABLE,
    DEPTH_TARGET_ENABLE,
    MULTISAMPLE_CONTROL,
    SAMPLER_POOL,
    POLYGON_OFFSET_FACTOR,
    LINE_SMOOTH_ENABLE,
    TEXTURE_POOL,
    STENCIL_TWO_SIDE_ENABLE,
    STENCIL_BACK,
    POINT_COORD_REPLACE,
    CULL_FACE_ENABLE,
    FRONT_FACE,
    CULL_FACE,
    PIXEL_CENTRE_IMAGE,
    VIEWPORT_TRANSFORM_ENABLE,
    CLEAR_BUFFERS,
    COLOR_MASK,
    SEMAPHORE,
    INDEPENDENT_BLEND,
    FIRMWARE_CALL,
    FIRMWARE_CALL_RESULT,
];

/// Method numbers the dispatcher matches on.
pub mod method {
    use super::*;

    pub const NO_OPERATION: u32 = super::NO_OPERATION.offset;
    pub const WAIT_FOR_IDLE: u32 = super::WAIT_FOR_IDLE.offset;
    pub const INSTRUCTION_RAM_POINTER: u32 = MME_INSTRUCTION_RAM_POINTER.offset;
    pub const INSTRUCTION_RAM_LOAD: u32 = MME_INSTRUCTION_RAM_LOAD.offset;
    pub const START_ADDRESS_RAM_POINTER: u32 = MME_START_ADDRESS_RAM_POINTER.offset;
    pub const START_ADDRESS_RAM_LOAD: u32 = MME_START_ADDRESS_RAM_LOAD.offset;
    pub const SHADOW_RAM_CONTROL: u32 = MME_SHADOW_RAM_CONTROL.offset;
    pub const SYNCPOINT_ACTION: u32 = super::SYNCPOINT_ACTION.offset;
    pub const CLEAR_BUFFERS: u32 = super::CLEAR_BUFFERS.offset;
    pub const SEMAPHORE_ADDRESS_HIGH: u32 = SEMAPHORE.offset;
    pub const SEMAPHORE_ADDRESS_LOW: u32 = SEMAPHORE.offset + 1;
    pub const SEMAPHORE_PAYLOAD: u32 = SEMAPHORE.offset + 2;
    pub const SEMAPHORE_INFO: u32 = SEMAPHORE.offset + 3;
    pub const FIRMWARE_CALL_4: u32 = FIRMWARE_CALL.element(4);
    pub const FIRMWARE_CALL_RESULT: u32 = super::FIRMWARE_CALL_RESULT.offset;
    /// First macro invocation method; everything from here up is macro range.
    pub const MACRO_BASE: u32 = REGISTER_COUNT as u32;
}

/// Resolve a word offset to the field containing it and the element index.
pub fn lookup(offset: u32) -> Option<(&'static Field, u32)> {
    let idx = LAYOUT.partition_point(|f| f.offset <= offset);
    let field = LAYOUT.get(idx.checked_sub(1)?)?;
    if field.contains(offset) {
        Some((field, (offset - field.offset) / field.stride))
    } else {
        None
    }
}

/// Word range reported to the sink for a write at `offset`: the containing
/// field element, or the single word for unnamed registers.
pub fn notify_range(offset: u32) -> Range<u32> {
    match lookup(offset) {
        Some((field, index)) => field.element_range(index),
        None => offset..offset + 1,
    }
}

/// Human-readable name of a register, e.g. `renderTargets[2]+3`.
pub fn describe(offset: u32) -> String {
    match lookup(offset) {
        Some((field, index)) => {
            let within = offset - field.element(index as usize);
            match (field.count > 1, field.stride > 1) {
                (false, false) => field.name.to_string(),
                (false, true) => format!("{}+{}", field.name, within),
                (true, false) => format!("{}[{}]", field.name, index),
                (true, true) => format!("{}[{}]+{}", field.name, index, within),
            }
        }
        None => format!("reg_0x{:03X}", offset),
    }
}

// ── Register file ───────────────────────────────────────────────────────────

/// One copy (live or shadow) of the Maxwell 3D registers.
#[derive(Clone, PartialEq, Eq)]
pub struct RegisterFile {
    raw: Box<[u32; REGISTER_COUNT]>,
}

impl std::fmt::Debug for RegisterFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.raw.iter().filter(|&&w| w != 0).count();
        f.debug_struct("RegisterFile").field("non_zero", &non_zero).finish()
    }
}

impl RegisterFile {
    /// All registers zero.
    pub fn new() -> Self {
        Self {
            raw: Box::new([0; REGISTER_COUNT]),
        }
    }

    /// Registers at their hardware reset values.
    pub fn with_defaults() -> Self {
        let mut regs = Self::new();
        regs.reset();
        regs
    }

    pub fn words(&self) -> &[u32; REGISTER_COUNT] {
        &self.raw
    }

    /// Read a register. Offsets past the end read as zero.
    pub fn read(&self, offset: u32) -> u32 {
        match self.raw.get(offset as usize) {
            Some(&value) => value,
            None => {
                log::warn!("Maxwell3D: register read out of range: 0x{:X}", offset);
                0
            }
        }
    }

    /// Write a register, returning the previous value. Offsets past the end
    /// are dropped and return `None`.
    pub fn write(&mut self, offset: u32, value: u32) -> Option<u32> {
        match self.raw.get_mut(offset as usize) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                log::warn!(
                    "Maxwell3D: register write out of range: 0x{:X} = 0x{:X}",
                    offset,
                    value
                );
                None
            }
        }
    }

    pub fn read_f32(&self, offset: u32) -> f32 {
        f32::from_bits(self.read(offset))
    }

    /// Words of element `index` of `field`.
    pub fn element(&self, field: &Field, index: usize) -> &[u32] {
        let start = field.element(index) as usize;
        &self.raw[start..start + field.stride as usize]
    }

    fn set(&mut self, offset: u32, value: u32) {
        self.raw[offset as usize] = value;
    }

    fn set_f32(&mut self, offset: u32, value: f32) {
        self.set(offset, value.to_bits());
    }

    /// Restore hardware defaults: zero everything, then apply the non-zero
    /// reset values.
    pub fn reset(&mut self) {
        self.raw.fill(0);

        self.set(RASTERIZER_ENABLE.offset, 1);

        for i in 0..VIEWPORT_COUNT {
            let transform = VIEWPORT_TRANSFORMS.element(i);
            self.set(transform + ViewportTransform::SWIZZLE_WORD, IDENTITY_SWIZZLE);
            let viewport = VIEWPORTS.element(i);
            self.set_f32(viewport + Viewport::DEPTH_NEAR_WORD, 0.0);
            self.set_f32(viewport + Viewport::DEPTH_FAR_WORD, 1.0);
        }

        self.set(POLYGON_MODE.element(0), PolygonMode::Fill as u32);
        self.set(POLYGON_MODE.element(1), PolygonMode::Fill as u32);

        // Front: fail, zfail, zpass, compare, ref, compare mask, write mask.
        let keep = StencilOp::Keep.to_raw();
        let always = ComparisonOp::Always.to_raw();
        for word in 0..3 {
            self.set(STENCIL_FRONT.offset + word, keep);
            self.set(STENCIL_BACK.offset + word, keep);
        }
        self.set(STENCIL_FRONT.offset + 3, always);
        self.set(STENCIL_BACK.offset + 3, always);
        self.set(STENCIL_FRONT.offset + 5, u32::MAX);
        self.set(STENCIL_FRONT.offset + 6, u32::MAX);
        // Back extra: ref, write mask, compare mask.
        self.set(STENCIL_BACK_EXTRA.offset + 1, u32::MAX);
        self.set(STENCIL_BACK_EXTRA.offset + 2, u32::MAX);
        self.set(STENCIL_TWO_SIDE_ENABLE.offset, 1);

        for i in 0..VERTEX_ATTRIBUTE_COUNT {
            self.set(VERTEX_ATTRIBUTE_STATE.element(i), VertexAttribute::FIXED_BIT);
        }

        self.set(DEPTH_TEST_FUNC.offset, always);

        let add = BlendOp::Add.to_raw();
        let blend = BLEND_STATE.offset;
        self.set(blend + BlendState::COLOR_OP, add);
        self.set(blend + BlendState::COLOR_SRC, BLEND_FACTOR_ONE);
        self.set(blend + BlendState::COLOR_DST, BLEND_FACTOR_ZERO);
        self.set(blend + BlendState::ALPHA_OP, add);
        self.set(blend + BlendState::ALPHA_SRC, BLEND_FACTOR_ONE);
        self.set(blend + BlendState::ALPHA_DST, BLEND_FACTOR_ZERO);

        for i in 0..RENDER_TARGET_COUNT {
            let rt = INDEPENDENT_BLEND.element(i);
            self.set(rt + 1, add);
            self.set(rt + 2, BLEND_FACTOR_ONE);
            self.set(rt + 3, BLEND_FACTOR_ZERO);
            self.set(rt + 4, add);
            self.set(rt + 5, BLEND_FACTOR_ONE);
            self.set(rt + 6, BLEND_FACTOR_ZERO);

            self.set(COLOR_MASK.element(i), ColorWriteMask::ALL);
        }

        self.set_f32(LINE_WIDTH_SMOOTH.offset, 1.0);
        self.set_f32(LINE_WIDTH_ALIASED.offset, 1.0);

        self.set(POINT_SPRITE_ENABLE.offset, 1);
        self.set_f32(POINT_SPRITE_SIZE.offset, 1.0);

        self.set(FRONT_FACE.offset, FrontFace::CCW as u32);
        self.set(CULL_FACE.offset, CullFace::Back as u32);

        self.set(VIEWPORT_TRANSFORM_ENABLE.offset, 1);

        self.set(
            MME_SHADOW_RAM_CONTROL.offset,
            MmeShadowRamControl::MethodPassthrough as u32,
        );
    }

    // ── Decoded views ───────────────────────────────────────────────────────

    pub fn shadow_ram_control(&self) -> MmeShadowRamControl {
        MmeShadowRamControl::from_raw(self.read(MME_SHADOW_RAM_CONTROL.offset))
    }

    pub fn render_target(&self, index: usize) -> RenderTarget {
        RenderTarget::from_words(self.element(&RENDER_TARGETS, index))
    }

    pub fn render_target_control(&self) -> RenderTargetControl {
        RenderTargetControl(self.read(RENDER_TARGET_CONTROL.offset))
    }

    pub fn viewport_transform(&self, index: usize) -> ViewportTransform {
        ViewportTransform::from_words(self.element(&VIEWPORT_TRANSFORMS, index))
    }

    pub fn viewport(&self, index: usize) -> Viewport {
        Viewport::from_words(self.element(&VIEWPORTS, index))
    }

    pub fn scissor(&self, index: usize) -> Scissor {
        Scissor::from_words(self.element(&SCISSORS, index))
    }

    pub fn blend_state(&self) -> BlendState {
        BlendState::from_words(self.element(&BLEND_STATE, 0))
    }

    pub fn independent_blend(&self, index: usize) -> Blend {
        Blend::from_independent_words(self.element(&INDEPENDENT_BLEND, index))
    }

    pub fn color_mask(&self, index: usize) -> ColorWriteMask {
        ColorWriteMask(self.read(COLOR_MASK.element(index)))
    }

    pub fn vertex_attribute(&self, index: usize) -> VertexAttribute {
        VertexAttribute(self.read(VERTEX_ATTRIBUTE_STATE.element(index)))
    }

    pub fn stencil_front(&self) -> StencilFace {
        let w = self.element(&STENCIL_FRONT, 0);
        StencilFace {
            fail_op: StencilOp::from_raw(w[0]),
            zfail_op: StencilOp::from_raw(w[1]),
            zpass_op: StencilOp::from_raw(w[2]),
            compare_op: ComparisonOp::from_raw(w[3]),
            reference: w[4],
            compare_mask: w[5],
            write_mask: w[6],
        }
    }

    pub fn stencil_back(&self) -> StencilFace {
        let w = self.element(&STENCIL_BACK, 0);
        let extra = self.element(&STENCIL_BACK_EXTRA, 0);
        StencilFace {
            fail_op: StencilOp::from_raw(w[0]),
            zfail_op: StencilOp::from_raw(w[1]),
            zpass_op: StencilOp::from_raw(w[2]),
            compare_op: ComparisonOp::from_raw(w[3]),
            reference: extra[0],
            write_mask: extra[1],
            compare_mask: extra[2],
        }
    }

    pub fn depth_test_func(&self) -> ComparisonOp {
        ComparisonOp::from_raw(self.read(DEPTH_TEST_FUNC.offset))
    }

    pub fn depth_mode(&self) -> DepthMode {
        DepthMode::from_raw(self.read(DEPTH_MODE.offset))
    }

    pub fn polygon_mode_front(&self) -> PolygonMode {
        PolygonMode::from_raw(self.read(POLYGON_MODE.element(0)))
    }

    pub fn polygon_mode_back(&self) -> PolygonMode {
        PolygonMode::from_raw(self.read(POLYGON_MODE.element(1)))
    }

    pub fn front_face(&self) -> FrontFace {
        FrontFace::from_raw(self.read(FRONT_FACE.offset))
    }

    pub fn cull_face(&self) -> CullFace {
        CullFace::from_raw(self.read(CULL_FACE.offset))
    }

    pub fn clear_color(&self) -> [f32; 4] {
        let mut color = [0.0; 4];
        for (i, c) in color.iter_mut().enumerate() {
            *c = self.read_f32(CLEAR_COLOR_VALUE.element(i));
        }
        color
    }

    pub fn clear_depth(&self) -> f32 {
        self.read_f32(CLEAR_DEPTH_VALUE.offset)
    }

    pub fn clear_stencil(&self) -> u32 {
        self.read(CLEAR_STENCIL_VALUE.offset)
    }

    pub fn line_width_smooth(&self) -> f32 {
        self.read_f32(LINE_WIDTH_SMOOTH.offset)
    }

    pub fn line_width_aliased(&self) -> f32 {
        self.read_f32(LINE_WIDTH_ALIASED.offset)
    }

    pub fn point_sprite_size(&self) -> f32 {
        self.read_f32(POINT_SPRITE_SIZE.offset)
    }

    pub fn semaphore_address(&self) -> u64 {
        pack_address(
            self.read(method::SEMAPHORE_ADDRESS_HIGH),
            self.read(method::SEMAPHORE_ADDRESS_LOW),
        )
    }

    pub fn semaphore_payload(&self) -> u32 {
        self.read(method::SEMAPHORE_PAYLOAD)
    }

    pub fn semaphore_info(&self) -> SemaphoreInfo {
        SemaphoreInfo(self.read(method::SEMAPHORE_INFO))
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::with_defaults()
    }
}
