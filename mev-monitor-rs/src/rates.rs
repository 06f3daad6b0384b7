use crate::{
    tokens::{is_stablecoin, STABLECOINS},
    types::{Asset, PairKey, RateMap},
};
use ethers::types::Address;

/// Orient a stored rate from `token`'s side of the pair. Stored rates are
/// expressed from the smaller address; a zero rate inverts to a sentinel
/// rather than dividing by zero.
pub fn revert_rate(token: Address, pair: &PairKey, rate: f64) -> f64 {
    if token == pair.0 {
        rate
    } else if rate == 0.0 {
        1e100
    } else {
        1.0 / rate
    }
}

/// Quantity of `b` per unit of `a`, resolved from observed swap rates.
///
/// Resolution order: identity, direct pair, stablecoin identities and
/// substitutions, then a single two-hop bridge. Native ether never appears
/// in the rate graph, so it only resolves against itself.
pub fn find_rate(a: Asset, b: Asset, rates: &RateMap) -> Option<f64> {
    if a == b {
        return Some(1.0);
    }
    let (token_a, token_b) = match (a.as_token(), b.as_token()) {
        (Some(ta), Some(tb)) => (ta, tb),
        _ => return None,
    };

    let direct = PairKey::new(token_a, token_b);
    if let Some(&rate) = rates.get(&direct) {
        return Some(revert_rate(token_a, &direct, rate));
    }

    let a_stable = is_stablecoin(&token_a);
    let b_stable = is_stablecoin(&token_b);
    if a_stable && b_stable {
        return Some(1.0);
    }
    if a_stable {
        for stable in STABLECOINS.iter().filter(|s| **s != token_a) {
            let bridge = PairKey::new(*stable, token_b);
            if let Some(&rate) = rates.get(&bridge) {
                return Some(revert_rate(*stable, &bridge, rate));
            }
        }
    }
    if b_stable {
        for stable in STABLECOINS.iter().filter(|s| **s != token_b) {
            let bridge = PairKey::new(*stable, token_a);
            if let Some(&rate) = rates.get(&bridge) {
                return Some(revert_rate(token_a, &bridge, rate));
            }
        }
    }

    for (pair, &rate) in rates {
        let has_a = pair.contains(token_a);
        let has_b = pair.contains(token_b);
        if has_a && !has_b {
            let via = pair.other(token_a);
            let bridge = PairKey::new(via, token_b);
            if let Some(&bridge_rate) = rates.get(&bridge) {
                return Some(
                    revert_rate(token_a, pair, rate) / revert_rate(token_b, &bridge, bridge_rate),
                );
            }
        } else if has_b && !has_a {
            let via = pair.other(token_b);
            let bridge = PairKey::new(via, token_a);
            if let Some(&bridge_rate) = rates.get(&bridge) {
                return Some(
                    revert_rate(token_a, &bridge, bridge_rate) / revert_rate(token_b, pair, rate),
                );
            }
        }
    }
    None
}
