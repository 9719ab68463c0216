// endian.rs — byte order conversion for on-disk lump data
//
// Map files are little-endian. Every multi-byte field is read in host order
// and then passed through `to_host`, which swaps when the file order differs
// from the host. Files written in the other order load through the same path.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    pub const HOST: ByteOrder = if cfg!(target_endian = "big") {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };

    #[inline]
    pub fn needs_swap(self) -> bool {
        self != Self::HOST
    }
}

impl Default for ByteOrder {
    fn default() -> Self {
        ByteOrder::Little
    }
}

pub trait ByteSwap: Copy {
    fn byte_swapped(self) -> Self;
}

impl ByteSwap for i16 {
    #[inline]
    fn byte_swapped(self) -> Self {
        self.swap_bytes()
    }
}

impl ByteSwap for u16 {
    #[inline]
    fn byte_swapped(self) -> Self {
        self.swap_bytes()
    }
}

impl ByteSwap for i32 {
    #[inline]
    fn byte_swapped(self) -> Self {
        self.swap_bytes()
    }
}

impl ByteSwap for u32 {
    #[inline]
    fn byte_swapped(self) -> Self {
        self.swap_bytes()
    }
}

impl ByteSwap for f32 {
    #[inline]
    fn byte_swapped(self) -> Self {
        f32::from_bits(self.to_bits().swap_bytes())
    }
}

/// Convert a value read in host order from a file stored in `order`.
#[inline]
pub fn to_host<T: ByteSwap>(v: T, order: ByteOrder) -> T {
    if order.needs_swap() {
        v.byte_swapped()
    } else {
        v
    }
}

#[inline]
pub fn little_short(v: i16) -> i16 {
    to_host(v, ByteOrder::Little)
}

#[inline]
pub fn little_long(v: i32) -> i32 {
    to_host(v, ByteOrder::Little)
}

#[inline]
pub fn little_float(v: f32) -> f32 {
    to_host(v, ByteOrder::Little)
}

/// Typed reads from a map image. Offsets are absolute within the image and
/// must already be bounds-checked against the lump table.
#[derive(Debug, Clone, Copy)]
pub struct LumpReader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> LumpReader<'a> {
    pub fn new(data: &'a [u8], order: ByteOrder) -> Self {
        Self { data, order }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self, offset: usize, len: usize) -> &'a [u8] {
        &self.data[offset..offset + len]
    }

    #[inline]
    fn array<const N: usize>(&self, offset: usize) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.data[offset..offset + N]);
        out
    }

    #[inline]
    pub fn i16(&self, offset: usize) -> i16 {
        to_host(i16::from_ne_bytes(self.array(offset)), self.order)
    }

    #[inline]
    pub fn u16(&self, offset: usize) -> u16 {
        to_host(u16::from_ne_bytes(self.array(offset)), self.order)
    }

    #[inline]
    pub fn i32(&self, offset: usize) -> i32 {
        to_host(i32::from_ne_bytes(self.array(offset)), self.order)
    }

    #[inline]
    pub fn u32(&self, offset: usize) -> u32 {
        to_host(u32::from_ne_bytes(self.array(offset)), self.order)
    }

    #[inline]
    pub fn f32(&self, offset: usize) -> f32 {
        to_host(f32::from_ne_bytes(self.array(offset)), self.order)
    }

    pub fn vec3(&self, offset: usize) -> [f32; 3] {
        [self.f32(offset), self.f32(offset + 4), self.f32(offset + 8)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_is_an_involution() {
        assert_eq!(0x1234i16.byte_swapped(), 0x3412);
        assert_eq!(0x0102_0304i32.byte_swapped().byte_swapped(), 0x0102_0304);
        assert_eq!(1.5f32.byte_swapped().byte_swapped(), 1.5);
    }

    #[test]
    fn test_little_helpers_are_identity_on_little_hosts() {
        if ByteOrder::HOST == ByteOrder::Little {
            assert_eq!(little_long(38), 38);
            assert_eq!(little_short(-2), -2);
            assert_eq!(little_float(0.25), 0.25);
        } else {
            assert_eq!(little_long(38), 38i32.swap_bytes());
        }
    }

    #[test]
    fn test_reader_decodes_both_orders() {
        let mut le = Vec::new();
        le.extend_from_slice(&(-7i32).to_le_bytes());
        le.extend_from_slice(&0xbeefu16.to_le_bytes());
        le.extend_from_slice(&(-3i16).to_le_bytes());
        le.extend_from_slice(&64.5f32.to_le_bytes());

        let mut be = Vec::new();
        be.extend_from_slice(&(-7i32).to_be_bytes());
        be.extend_from_slice(&0xbeefu16.to_be_bytes());
        be.extend_from_slice(&(-3i16).to_be_bytes());
        be.extend_from_slice(&64.5f32.to_be_bytes());

        for (data, order) in [(&le, ByteOrder::Little), (&be, ByteOrder::Big)] {
            let r = LumpReader::new(data, order);
            assert_eq!(r.i32(0), -7);
            assert_eq!(r.u16(4), 0xbeef);
            assert_eq!(r.i16(6), -3);
            assert_eq!(r.f32(8), 64.5);
        }
    }

    #[test]
    fn test_foreign_order_takes_the_swap_path() {
        let foreign = match ByteOrder::HOST {
            ByteOrder::Little => ByteOrder::Big,
            ByteOrder::Big => ByteOrder::Little,
        };
        assert!(foreign.needs_swap());
        assert!(!ByteOrder::HOST.needs_swap());
        assert_eq!(to_host(0x11223344u32, foreign), 0x44332211);
    }
}
