//! CRC-8 as spoken by the microcontroller firmware.
//!
//! Polynomial 0x07, initial value 0, MSB-first, no reflection, no final XOR
//! (the "CRC-8/SMBUS" parameter set).

const POLYNOMIAL: u8 = 0x07;

/// Compute the CRC8 of `data`.
pub fn crc8(data: &[u8]) -> u8 {
    crc8_update(0, data)
}

/// Continue a CRC8 computation over another slice.
///
/// `crc8_update(crc8(a), b) == crc8(a ‖ b)`.
pub fn crc8_update(mut crc: u8, data: &[u8]) -> u8 {
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc8(&[]), 0x00);
    }

    #[test]
    fn standard_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF4);
    }

    #[test]
    fn firmware_golden_values() {
        // len=1, type=EVENT, ALARM_TRIP
        assert_eq!(crc8(&[0x01, 0x01, 0x0A]), 0x48);
        // len=0, type=ACK
        assert_eq!(crc8(&[0x00, 0x03]), 0x09);
        // len=1, type=COMMAND, SHUTDOWN
        assert_eq!(crc8(&[0x01, 0x02, 0x01]), 0x46);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let data = [0x03, 0x01, 0x0B, 0x00, 0x7C];
        let split = crc8_update(crc8(&data[..2]), &data[2..]);
        assert_eq!(split, crc8(&data));
        assert_eq!(split, 0x2F);
    }

    #[test]
    fn single_bit_flips_always_change_crc() {
        let data = [0x05, 0x02, 0x03, 0x00, 0x00, 0x00, 0x3C];
        let reference = crc8(&data);
        for byte in 0..data.len() {
            for bit in 0..8 {
                let mut mutated = data;
                mutated[byte] ^= 1 << bit;
                assert_ne!(crc8(&mutated), reference, "byte {byte} bit {bit}");
            }
        }
    }
}
