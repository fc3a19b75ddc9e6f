use primitive_types::U256 as PrimitiveU256;

pub type U256 = PrimitiveU256;

pub trait UintExt {
    /// 32-byte big-endian word.
    fn to_be_bytes32(&self) -> [u8; 32];
}

impl UintExt for U256 {
    fn to_be_bytes32(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        self.to_big_endian(&mut bytes);
        bytes
    }
}
