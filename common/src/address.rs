use primitive_types::H160;

pub const ADDRESS_SIZE: usize = 20;

/// Account or contract identifier on the external ledger
pub type Address = H160;

pub const ZERO_ADDRESS: Address = H160::zero();

// Deterministic address for test accounts and simulated contracts
pub fn address_from_index(index: u64) -> Address {
    H160::from_low_u64_be(index)
}

/// Parse a `0x`-prefixed (or bare) 40 character hex string
pub fn parse_address(value: &str) -> Result<Address, &'static str> {
    let trimmed = value.strip_prefix("0x").unwrap_or(value);
    let bytes = hex::decode(trimmed).map_err(|_| "Invalid hex string")?;
    let bytes: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| "Invalid address length")?;
    Ok(H160::from(bytes))
}

/// Full lowercase hex representation with `0x` prefix
pub fn to_hex(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

/// Shortened representation used in diagnostic tables (`0x1234…cdef`)
pub fn short(address: &Address) -> String {
    let full = hex::encode(address.as_bytes());
    format!("0x{}…{}", &full[..4], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_hex() {
        let addr = address_from_index(0xccee);
        let parsed = parse_address(&to_hex(&addr)).unwrap();
        assert_eq!(parsed, addr);
    }

    #[test]
    fn test_parse_rejects_short_input() {
        assert!(parse_address("0x1234").is_err());
        assert!(parse_address("not hex").is_err());
    }

    #[test]
    fn test_short_form() {
        let addr = address_from_index(1);
        assert_eq!(short(&addr), "0x0000…0001");
    }
}
