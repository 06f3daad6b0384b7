use ethers::types::{Address, U256};
use once_cell::sync::Lazy;

/// Wrapped ether, the preferred valuation numeraire.
pub static WETH: Lazy<Address> = Lazy::new(|| {
    "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".parse().expect("valid address")
});

pub static USDC: Lazy<Address> = Lazy::new(|| {
    "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".parse().expect("valid address")
});

pub static USDT: Lazy<Address> = Lazy::new(|| {
    "0xdac17f958d2ee523a2206206994597c13d831ec7".parse().expect("valid address")
});

pub static DAI: Lazy<Address> = Lazy::new(|| {
    "0x6b175474e89094c44da98b954eedeac495271d0f".parse().expect("valid address")
});

pub static TUSD: Lazy<Address> = Lazy::new(|| {
    "0x0000000000085d4780b73119b644ae5ecd22b376".parse().expect("valid address")
});

pub static PAXG: Lazy<Address> = Lazy::new(|| {
    "0x45804880de22913dafe09f4980848ece6ecbaf78".parse().expect("valid address")
});

pub static WBTC: Lazy<Address> = Lazy::new(|| {
    "0x2260fac5e5542a773aa44fbcfedf7c193bc2c599".parse().expect("valid address")
});

/// Stablecoins usable as a valuation reference, in lookup order.
pub static STABLECOINS: Lazy<[Address; 3]> = Lazy::new(|| [*USDC, *USDT, *DAI]);

/// Tokens whose ERC-20 interface is trusted without an explorer lookup.
pub static KNOWN_ERC20: Lazy<[Address; 3]> = Lazy::new(|| [*USDC, *TUSD, *PAXG]);

pub fn is_stablecoin(token: &Address) -> bool {
    STABLECOINS.contains(token)
}

/// Scale factor from raw token amounts to token-natural units.
///
/// Defaults to 1e18; the handful of mainnet tokens that deviate are listed
/// explicitly.
pub fn coin_decimals(token: &Address) -> f64 {
    if *token == *USDC || *token == *USDT {
        1e6
    } else if *token == *WBTC {
        1e8
    } else {
        1e18
    }
}

const LIMB: f64 = 18_446_744_073_709_551_616.0; // 2^64

/// Lossy conversion of a 256-bit unsigned amount.
pub fn u256_to_f64(x: U256) -> f64 {
    x.0.iter().rev().fold(0.0, |acc, &limb| acc * LIMB + limb as f64)
}

/// Interpret a 256-bit word as two's-complement signed and convert.
pub fn s256_to_f64(x: U256) -> f64 {
    if x.bit(255) {
        let (magnitude, _) = (!x).overflowing_add(U256::one());
        -u256_to_f64(magnitude)
    } else {
        u256_to_f64(x)
    }
}

pub fn wei_to_ether(x: U256) -> f64 {
    u256_to_f64(x) / 1e18
}

/// Raw amount scaled to the token's natural units.
pub fn token_units(amount: U256, token: &Address) -> f64 {
    u256_to_f64(amount) / coin_decimals(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_unsigned_words() {
        assert_eq!(u256_to_f64(U256::zero()), 0.0);
        assert_eq!(u256_to_f64(U256::from(12345u64)), 12345.0);
        let one_ether = U256::exp10(18);
        assert_eq!(wei_to_ether(one_ether), 1.0);
        let hundred_ether = U256::exp10(18) * U256::from(100u64);
        assert_eq!(wei_to_ether(hundred_ether), 100.0);
    }

    #[test]
    fn converts_twos_complement_words() {
        assert_eq!(s256_to_f64(U256::from(7u64)), 7.0);
        let minus_one = U256::MAX;
        assert_eq!(s256_to_f64(minus_one), -1.0);
        let minus_five_ether = {
            let (neg, _) = (!(U256::exp10(18) * U256::from(5u64))).overflowing_add(U256::one());
            neg
        };
        assert_eq!(s256_to_f64(minus_five_ether), -5e18);
    }

    #[test]
    fn token_decimals_table() {
        assert_eq!(coin_decimals(&USDC), 1e6);
        assert_eq!(coin_decimals(&USDT), 1e6);
        assert_eq!(coin_decimals(&WBTC), 1e8);
        assert_eq!(coin_decimals(&WETH), 1e18);
        assert_eq!(coin_decimals(&DAI), 1e18);
    }

    #[test]
    fn stablecoin_membership() {
        assert!(is_stablecoin(&USDC));
        assert!(is_stablecoin(&DAI));
        assert!(!is_stablecoin(&WETH));
        assert!(!is_stablecoin(&WBTC));
    }
}
