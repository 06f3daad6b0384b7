use crate::{
    rates::find_rate,
    tokens::{is_stablecoin, STABLECOINS, WETH},
    types::{Asset, Bundle, PairKey, Valuation},
};
use ethers::types::Address;
use std::collections::BTreeMap;

/// Compute a decoded bundle's valuation in its base token: total fronted
/// capital, profit estimation and the share paid to the miner. Bundles with
/// no observed rates or no candidate base token stay unvalued.
pub fn finalize(bundle: &mut Bundle, eth_usd: f64) {
    bundle.valuation = None;
    let Some(state) = bundle.state.as_mut() else {
        return;
    };
    if state.rates.is_empty() {
        return;
    }

    let weth = *WETH;
    let weth_asset = Asset::Token(weth);
    let base = if state.capital_requirements.contains_key(&weth_asset) {
        Some(weth)
    } else {
        STABLECOINS
            .iter()
            .find(|stable| state.capital_requirements.contains_key(&Asset::Token(**stable)))
            .copied()
    };
    let Some(base) = base else {
        return;
    };

    inject_reference_edges(state, eth_usd);

    let mut total_capital = 0.0;
    let mut profit_estimation = 0.0;
    let mut reduced: BTreeMap<Asset, f64> = BTreeMap::new();
    let mut irreducible_tokens = 0u64;
    for (asset, &capital) in &state.capital_requirements {
        let rate = if (*asset == Asset::Eth || *asset == weth_asset) && base == weth {
            1.0
        } else if *asset == Asset::Token(base) {
            1.0
        } else {
            match find_rate(Asset::Token(base), *asset, &state.rates) {
                Some(rate) => rate,
                None => {
                    irreducible_tokens = 1;
                    continue;
                }
            }
        };
        let capital_in_base = capital / rate;
        total_capital += capital_in_base;
        profit_estimation += state.saldo.get(asset).copied().unwrap_or(0.0) / rate;
        reduced.insert(*asset, capital_in_base);
    }

    if is_stablecoin(&base) {
        total_capital /= eth_usd;
        profit_estimation /= eth_usd;
    }

    let start_token = reduced
        .iter()
        .fold(None::<(Asset, f64)>, |best, (asset, &capital)| match best {
            Some((_, max)) if capital <= max => best,
            _ => Some((*asset, capital)),
        })
        .map(|(asset, _)| asset);
    let n_start_tokens = state
        .capital_requirements
        .iter()
        .filter(|(asset, &capital)| capital > 0.0 && **asset != Asset::Eth)
        .count() as u64;

    let before_bribes = profit_estimation + state.direct_bribe + state.gas_overpay;
    let bribes_ratio = if before_bribes > 0.0 {
        Some((state.direct_bribe + state.gas_overpay) / before_bribes)
    } else {
        None
    };

    bundle.valuation = Some(Valuation {
        base_token: base,
        total_capital,
        profit_estimation,
        start_token,
        complexity: state.charged.len() as u64,
        n_start_tokens,
        irreducible_tokens,
        before_bribes,
        bribes_ratio,
    });
}

/// Guarantee WETH↔stablecoin and stablecoin↔stablecoin edges whenever the
/// bundle requires capital on both sides: the configured ETH/USD quote
/// backs the former, parity backs the latter.
fn inject_reference_edges(state: &mut crate::types::SaldoState, eth_usd: f64) {
    let weth = *WETH;
    let weth_asset = Asset::Token(weth);
    let has = |state: &crate::types::SaldoState, token: &Address| {
        state.capital_requirements.contains_key(&Asset::Token(*token))
    };
    for stable in STABLECOINS.iter() {
        if state.capital_requirements.contains_key(&weth_asset)
            && has(state, stable)
            && find_rate(weth_asset, Asset::Token(*stable), &state.rates).is_none()
        {
            if weth <= *stable {
                state.rates.insert(PairKey(weth, *stable), eth_usd);
            } else {
                state.rates.insert(PairKey(*stable, weth), 1.0 / eth_usd);
            }
        }
        for other in STABLECOINS.iter() {
            if stable != other
                && has(state, stable)
                && has(state, other)
                && find_rate(Asset::Token(*other), Asset::Token(*stable), &state.rates).is_none()
            {
                state.rates.insert(PairKey::new(*other, *stable), 1.0);
            }
        }
    }
}
