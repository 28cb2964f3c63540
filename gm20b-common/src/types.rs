// SPDX-FileCopyrightText: 2025 gm20b contributors
// SPDX-License-Identifier: GPL-3.0-or-later

/// GPU page size (4 KiB).
pub const PAGE_SIZE: usize = 0x1000;

/// Page size as u64 for address math.
pub const PAGE_SIZE_U64: u64 = PAGE_SIZE as u64;

/// Page mask for alignment checks.
pub const PAGE_MASK: u64 = PAGE_SIZE_U64 - 1;

/// GPU timestamp clock (19.2 MHz).
pub const GPU_TICK_HZ: u64 = 19_200_000;

/// Convert nanoseconds to GPU ticks: ns * 19.2 MHz / 1 GHz, widened so large
/// inputs do not overflow.
#[inline]
pub const fn ns_to_gpu_ticks(ns: u64) -> u64 {
    (ns as u128 * GPU_TICK_HZ as u128 / 1_000_000_000u128) as u64
}

/// Align a value up to the given alignment.
#[inline]
pub const fn align_up(value: u64, alignment: u64) -> u64 {
    let mask = alignment - 1;
    (value + mask) & !mask
}
