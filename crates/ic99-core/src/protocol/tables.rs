//! Channel-index permutation tables
//!
//! The charger's four channels are wired in a different order than they are
//! numbered, and the order differs again between the mode bytes and the
//! charge/discharge bits. Each table maps a logical channel (0..4) to its
//! 1-based physical position for one family of fields.

/// Number of channels on the charger
pub const CHANNEL_COUNT: usize = 4;

/// Physical position of each logical channel in the front-panel layout
pub const CHANNEL_INDEX_NORMAL: [usize; CHANNEL_COUNT] = [3, 4, 1, 2];

/// Physical position of each logical channel among the mode bytes and the
/// per-channel value slots. On the wire the mode bytes run 4, 3, 1, 2.
pub const CHANNEL_INDEX_MODE: [usize; CHANNEL_COUNT] = revmap([4, 3, 1, 2]);

/// Physical position of each logical channel among the status bit pairs.
/// Only channels 1 and 3 are actually swapped.
pub const CHANNEL_INDEX_STATUS_1_3: [usize; CHANNEL_COUNT] = revmap([2, 1, 3, 4]);

/// Invert a wire order (physical slot -> logical channel, 1-based) into a
/// logical channel -> physical slot table.
pub const fn revmap(order: [usize; CHANNEL_COUNT]) -> [usize; CHANNEL_COUNT] {
    let mut out = [0; CHANNEL_COUNT];
    let mut i = 0;
    while i < CHANNEL_COUNT {
        out[order[i] - 1] = i + 1;
        i += 1;
    }
    out
}

/// Zero-based value slot of a channel, shared by the mode byte and every
/// multi-byte field family
#[inline]
pub fn value_slot(channel: usize) -> usize {
    CHANNEL_INDEX_MODE[channel] - 1
}

/// Byte offset of a channel's mode byte
#[inline]
pub fn mode_offset(channel: usize) -> usize {
    2 + value_slot(channel)
}

/// Right shift that brings a channel's charge/discharge bit pair in byte 6
/// down to bits 0 and 1. Half of it selects the repause bit in byte 8.
#[inline]
pub fn status_shift(channel: usize) -> u32 {
    (2 * (4 - CHANNEL_INDEX_STATUS_1_3[channel])) as u32
}
