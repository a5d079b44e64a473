//! Integer helpers the decode engine calls inline: the overflow-trapping
//! add/sub/mul family, population counts, and the byte zap/insert/extract
//! group.

use thiserror::Error;

/// Fault raised by a trapping integer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticTrap {
    #[error("integer overflow")]
    IntegerOverflow,
}

/// ADDQ/V: 64-bit add, trapping on signed overflow.
pub fn addqv(a: u64, b: u64) -> Result<u64, ArithmeticTrap> {
    let res = a.wrapping_add(b);
    if !(a ^ b) & (a ^ res) & (1 << 63) != 0 {
        return Err(ArithmeticTrap::IntegerOverflow);
    }
    Ok(res)
}

/// ADDL/V: 32-bit add on the low longwords, trapping on signed overflow.
/// The result is the zero-extended longword.
pub fn addlv(a: u64, b: u64) -> Result<u64, ArithmeticTrap> {
    let res = a.wrapping_add(b) as u32 as u64;
    if !(a ^ b) & (a ^ res) & (1 << 31) != 0 {
        return Err(ArithmeticTrap::IntegerOverflow);
    }
    Ok(res)
}

/// SUBQ/V: 64-bit subtract, trapping on signed overflow.
pub fn subqv(a: u64, b: u64) -> Result<u64, ArithmeticTrap> {
    let res = a.wrapping_sub(b);
    if (a ^ b) & (res ^ a) & (1 << 63) != 0 {
        return Err(ArithmeticTrap::IntegerOverflow);
    }
    Ok(res)
}

/// SUBL/V: 32-bit subtract on the low longwords, trapping on signed
/// overflow.
pub fn sublv(a: u64, b: u64) -> Result<u64, ArithmeticTrap> {
    let res = a.wrapping_sub(b) as u32 as u64;
    if (a ^ b) & (res ^ a) & (1 << 31) != 0 {
        return Err(ArithmeticTrap::IntegerOverflow);
    }
    Ok(res)
}

/// MULL/V: 32-bit multiply, trapping when the full product does not fit a
/// longword. The result is the sign-extended longword.
pub fn mullv(a: u64, b: u64) -> Result<u64, ArithmeticTrap> {
    let res = (a as i64).wrapping_mul(b as i64);
    if res as i32 as i64 != res {
        return Err(ArithmeticTrap::IntegerOverflow);
    }
    Ok(res as i32 as i64 as u64)
}

/// MULQ/V: 64-bit multiply, trapping when the signed product overflows.
pub fn mulqv(a: u64, b: u64) -> Result<u64, ArithmeticTrap> {
    let wide = (a as i64 as i128) * (b as i64 as i128);
    let high = (wide >> 64) as u64;
    // The high half must be pure sign extension of the low half's sign.
    if high.wrapping_add(1) > 1 {
        return Err(ArithmeticTrap::IntegerOverflow);
    }
    Ok(wide as u64)
}

/// UMULH: high 64 bits of the unsigned 128-bit product.
pub fn umulh(a: u64, b: u64) -> u64 {
    ((a as u128 * b as u128) >> 64) as u64
}

pub fn ctpop(a: u64) -> u64 {
    a.count_ones() as u64
}

pub fn ctlz(a: u64) -> u64 {
    a.leading_zeros() as u64
}

pub fn cttz(a: u64) -> u64 {
    a.trailing_zeros() as u64
}

/// Clear the bytes of `op` selected by the low 8 mask bits.
fn byte_zap(op: u64, mskb: u8) -> u64 {
    let mut mask = 0u64;
    for i in 0..8 {
        if mskb & (1 << i) != 0 {
            mask |= 0xffu64 << (8 * i);
        }
    }
    op & !mask
}

/// ZAP: clear bytes selected by the mask.
pub fn zap(val: u64, mask: u64) -> u64 {
    byte_zap(val, mask as u8)
}

/// ZAPNOT: keep only bytes selected by the mask.
pub fn zapnot(val: u64, mask: u64) -> u64 {
    byte_zap(val, !(mask as u8))
}

pub fn mskbl(val: u64, pos: u64) -> u64 {
    byte_zap(val, 0x01 << (pos & 7))
}

pub fn insbl(val: u64, pos: u64) -> u64 {
    let val = val << ((pos & 7) * 8);
    byte_zap(val, !(0x01u8 << (pos & 7)))
}

pub fn mskwl(val: u64, pos: u64) -> u64 {
    byte_zap(val, (0x03u16 << (pos & 7)) as u8)
}

pub fn inswl(val: u64, pos: u64) -> u64 {
    let val = val << ((pos & 7) * 8);
    byte_zap(val, !(0x03u16 << (pos & 7)) as u8)
}

pub fn mskll(val: u64, pos: u64) -> u64 {
    byte_zap(val, (0x0fu16 << (pos & 7)) as u8)
}

pub fn insll(val: u64, pos: u64) -> u64 {
    let val = val << ((pos & 7) * 8);
    byte_zap(val, !(0x0fu16 << (pos & 7)) as u8)
}

pub fn mskql(val: u64, pos: u64) -> u64 {
    byte_zap(val, (0xffu16 << (pos & 7)) as u8)
}

pub fn insql(val: u64, pos: u64) -> u64 {
    let val = val << ((pos & 7) * 8);
    byte_zap(val, !(0xffu16 << (pos & 7)) as u8)
}

#[inline]
fn high_shift(pos: u64) -> u32 {
    // A byte position of zero selects nothing in the high half; the zap mask
    // below already clears everything, so the shift amount only needs to be
    // well defined.
    ((64 - (pos & 7) * 8) & 63) as u32
}

pub fn mskwh(val: u64, pos: u64) -> u64 {
    byte_zap(val, ((0x03u32 << (pos & 7)) >> 8) as u8)
}

pub fn inswh(val: u64, pos: u64) -> u64 {
    let val = val >> high_shift(pos);
    byte_zap(val, !((0x03u32 << (pos & 7)) >> 8) as u8)
}

pub fn msklh(val: u64, pos: u64) -> u64 {
    byte_zap(val, ((0x0fu32 << (pos & 7)) >> 8) as u8)
}

pub fn inslh(val: u64, pos: u64) -> u64 {
    let val = val >> high_shift(pos);
    byte_zap(val, !((0x0fu32 << (pos & 7)) >> 8) as u8)
}

pub fn mskqh(val: u64, pos: u64) -> u64 {
    byte_zap(val, ((0xffu32 << (pos & 7)) >> 8) as u8)
}

pub fn insqh(val: u64, pos: u64) -> u64 {
    let val = val >> high_shift(pos);
    byte_zap(val, !((0xffu32 << (pos & 7)) >> 8) as u8)
}

/// CMPBGE: per-byte unsigned >= comparison, one result bit per byte.
pub fn cmpbge(a: u64, b: u64) -> u64 {
    let mut res = 0u64;
    for i in 0..8 {
        let ba = (a >> (i * 8)) as u8;
        let bb = (b >> (i * 8)) as u8;
        if ba >= bb {
            res |= 1 << i;
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addqv_boundaries() {
        assert_eq!(addqv(1, 2), Ok(3));
        assert_eq!(
            addqv(i64::MAX as u64, 1),
            Err(ArithmeticTrap::IntegerOverflow)
        );
        assert_eq!(
            addqv(i64::MIN as u64, (-1i64) as u64),
            Err(ArithmeticTrap::IntegerOverflow)
        );
        assert_eq!(addqv(i64::MAX as u64, 0), Ok(i64::MAX as u64));
        assert_eq!(
            addqv(i64::MIN as u64, i64::MAX as u64),
            Ok((-1i64) as u64)
        );
    }

    #[test]
    fn sublv_and_addlv_boundaries() {
        assert_eq!(addlv(5, 7), Ok(12));
        assert_eq!(
            addlv(i32::MAX as u64, 1),
            Err(ArithmeticTrap::IntegerOverflow)
        );
        assert_eq!(subqv(0, 1), Ok((-1i64) as u64));
        assert_eq!(
            subqv(i64::MIN as u64, 1),
            Err(ArithmeticTrap::IntegerOverflow)
        );
        assert_eq!(
            sublv(i32::MIN as u32 as u64, 1),
            Err(ArithmeticTrap::IntegerOverflow)
        );
        // 32-bit results come back as the raw longword.
        assert_eq!(sublv(1, 2), Ok(0xffff_ffff));
    }

    #[test]
    fn mul_overflow() {
        assert_eq!(mullv(6, 7), Ok(42));
        assert_eq!(mullv(0x10000, 0x10000), Err(ArithmeticTrap::IntegerOverflow));
        assert_eq!(
            mullv((-1i64) as u64, 1),
            Ok((-1i64) as u64)
        );
        assert_eq!(mulqv(1 << 31, 1 << 31), Ok(1 << 62));
        assert_eq!(mulqv(1 << 32, 1 << 32), Err(ArithmeticTrap::IntegerOverflow));
        assert_eq!(
            mulqv((-1i64) as u64, i64::MAX as u64),
            Ok((i64::MIN + 1) as u64)
        );
        assert_eq!(umulh(1 << 32, 1 << 32), 1);
    }

    #[test]
    fn counts() {
        assert_eq!(ctpop(0xff00_ff00), 16);
        assert_eq!(ctlz(1), 63);
        assert_eq!(ctlz(0), 64);
        assert_eq!(cttz(0x8000_0000_0000_0000), 63);
        assert_eq!(cttz(0), 64);
    }

    #[test]
    fn byte_zaps() {
        assert_eq!(zap(0x1122_3344_5566_7788, 0x0f), 0x1122_3344_0000_0000);
        assert_eq!(zapnot(0x1122_3344_5566_7788, 0x0f), 0x0000_0000_5566_7788);
        assert_eq!(mskbl(0x1122_3344_5566_7788, 0), 0x1122_3344_5566_7700);
        assert_eq!(insbl(0xaa, 1), 0xaa00);
        assert_eq!(mskql(0xffff_ffff_ffff_ffff, 0), 0);
        assert_eq!(insql(0x1122, 1), 0x11_2200);
    }

    #[test]
    fn high_half_inserts() {
        // Byte position 0: nothing spills into the high half.
        assert_eq!(inswh(0xffff, 0), 0);
        assert_eq!(insqh(0xffff_ffff_ffff_ffff, 0), 0);
        // Position 7 of a word insert: the high byte lands at byte 0.
        assert_eq!(inswh(0xaabb, 7), 0xaa);
        assert_eq!(mskwh(0xffff_ffff_ffff_ffff, 7), 0xffff_ffff_ffff_ff00);
    }

    #[test]
    fn cmpbge_per_byte() {
        assert_eq!(cmpbge(0, 0), 0xff);
        assert_eq!(cmpbge(0x0102, 0x0201), 0xfd);
        assert_eq!(cmpbge(0xff00_0000_0000_0000, 0x0100_0000_0000_0000), 0xff);
    }
}
